//! In-memory collection backend for docshape.
//!
//! This crate provides a thread-safe, in-memory implementation of the `DataCollection`
//! trait. It evaluates filters, sorts, projections and updates itself, which makes it a
//! stand-in for a real database in development and tests.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using an async-aware RwLock
//! - **Filter evaluation** - Dotted field paths and array-aware equality
//! - **Updates** - Replacements and the `$set`, `$unset`, `$inc` and `$push` modifiers
//! - **Upserts** - New documents seeded from the filter's equality clauses
//!
//! # Quick Start
//!
//! ```ignore
//! use docshape::{prelude::*, memory::InMemoryCollection};
//!
//! let collection = InMemoryCollection::builder().name("users").build().await?;
//! let converter = Converter::new();
//!
//! let input = HostMap::new().with("_id", 1).with("name", "Alice");
//! let document = converter.to_document(None, &input.into(), None)?.borrow().clone();
//! collection.add_data(document).await?;
//! ```

mod apply;
mod evaluator;
pub mod store;

pub use store::{InMemoryCollection, InMemoryCollectionBuilder};
