//! Main docshape crate: conversion between loosely typed host values and documents.
//!
//! This crate is the primary entry point for users of docshape. It re-exports the
//! conversion engine from `docshape-core` together with the collection backends.
//!
//! # Features
//!
//! - **Failure-tolerant conversion** - Mappings, property bags, sequences and opaque
//!   objects become documents; one unreadable property never discards a document
//! - **Depth-bounded** - Every conversion stops at a configurable recursion ceiling
//! - **Identity-preserving views** - Documents read back can be edited in place
//! - **Derived specifications** - Identity queries, updates, sorts and projections
//! - **Multiple backends** - In-memory and MongoDB collections behind one trait
//!
//! # Quick Start
//!
//! ```ignore
//! use docshape::{prelude::*, memory::InMemoryCollection};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let collection = InMemoryCollection::builder().name("users").build().await?;
//!     let converter = Converter::new();
//!
//!     let input = HostMap::new().with("_id", 1).with("name", "Alice");
//!     let document = converter.to_document(None, &input.clone().into(), None)?.borrow().clone();
//!     collection.add_data(document).await?;
//!
//!     // `{"name": "Bob"}` replaces the document; modifiers are explicit
//!     let filter = converter.identity_query(&input.into())?;
//!     collection
//!         .update_data(filter, Update::set("name", "Bob"), UpdateOptions::default())
//!         .await?;
//!
//!     let sort = converter.sort_spec(&HostValue::from("name"))?;
//!     for document in collection.get_data(None, FindOptions::new().sort(sort)).await? {
//!         let view = converter.to_host(document.into());
//!         println!("{view:?}");
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Custom types
//!
//! Opaque host objects are coerced by their own [`HostObject::coerce`](host::HostObject::coerce),
//! then by a handler installed once per process with
//! [`register_type_handlers`](registry::register_type_handlers), then by an optional
//! per-converter fallback hook.
//!
//! # Backends
//!
//! - [`memory`] - In-memory collections for development and testing
//! - [`mongodb`] - MongoDB collections (requires `mongodb` feature)

pub mod prelude;

pub use docshape_core::{
    backend, builder, config, convert, depth, document, error, host, projection, query, reader,
    registry, selector, sort, update, view,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory collection backend.
pub mod memory {
    pub use docshape_memory::{InMemoryCollection, InMemoryCollectionBuilder};
}

/// MongoDB collection backend.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docshape_mongodb::{MongoDataCollection, MongoDataCollectionBuilder};
}
