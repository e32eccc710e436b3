//! MongoDB collection backend for docshape.
//!
//! This crate provides a MongoDB-based implementation of the `DataCollection` trait.
//! Filters, updates, sorts and projections derived by the conversion engine are rendered
//! into driver documents and executed by MongoDB itself.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docshape = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! Replacement updates go through `replace_one`, modifier updates through `update_one`
//! or `update_many`.
//!
//! # Example
//!
//! ```ignore
//! use docshape::{backend::CollectionBuilder, mongodb::MongoDataCollection};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let users = MongoDataCollection::builder("mongodb://localhost:27017", "my_database", "users")
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod store;

pub use store::{MongoDataCollection, MongoDataCollectionBuilder};
