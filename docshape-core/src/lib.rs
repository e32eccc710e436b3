//! Failure-tolerant conversion between loosely typed host values and BSON documents.
//!
//! This crate is the core of the docshape project and provides:
//!
//! - **Host model** ([`host`]) - Mappings, sequences, property bags and opaque objects
//! - **Value conversion** ([`convert`]) - Depth-bounded host value to document value conversion
//! - **Document building** ([`builder`], [`selector`]) - Whole, partial and renamed documents
//! - **Read-back** ([`reader`], [`view`]) - Materialised property bags or lazy wrapper views
//! - **Derived specifications** ([`query`], [`update`], [`sort`], [`projection`])
//! - **Type handlers** ([`registry`]) - One-time registration of custom object coercions
//! - **Typed values** ([`document`]) - serde bridge for strongly typed structs
//! - **Collection seam** ([`backend`]) - Traits implemented by storage backends
//! - **Configuration** ([`config`]) and **error handling** ([`error`])
//!
//! # Example
//!
//! ```ignore
//! use docshape_core::{convert::Converter, host::{HostMap, HostValue}};
//!
//! let input = HostMap::new()
//!     .with("_id", 1)
//!     .with("name", "Alice")
//!     .with("tags", vec![HostValue::from("admin")]);
//!
//! let converter = Converter::new();
//! let document = converter.to_document(None, &input.clone().into(), None)?;
//! let by_id = converter.identity_query(&input.into())?;
//! ```

pub mod backend;
pub mod builder;
pub mod config;
pub mod convert;
pub mod depth;
pub mod document;
pub mod error;
pub mod host;
pub mod projection;
pub mod query;
pub mod reader;
pub mod registry;
pub mod selector;
pub mod sort;
pub mod update;
pub mod view;
