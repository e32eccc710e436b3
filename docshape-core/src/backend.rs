//! Collection seam for storage backends.
//!
//! The conversion engine never talks to storage itself. Callers derive documents and
//! specifications from host values with a [`Converter`](crate::convert::Converter) and
//! hand them to a [`DataCollection`], which stores, finds, updates and removes them.
//!
//! # Examples
//!
//! ```ignore
//! use docshape::prelude::*;
//!
//! let converter = Converter::new();
//! let document = converter.to_document(None, &input, None)?.borrow().clone();
//! collection.add_data(document).await?;
//!
//! let filter = converter.identity_query(&input)?;
//! let update = converter.update_spec(&changes)?;
//! collection.update_data(filter, update, UpdateOptions::default()).await?;
//! ```

use async_trait::async_trait;
use bson::{Bson, Document};
use std::fmt::Debug;

use crate::{error::StoreResult, projection::Projection, query::Expr, sort::Sort, update::Update};

/// Options of a find operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Sort keys, applied in order.
    pub sort: Vec<Sort>,
    /// Fields to include or exclude from returned documents.
    pub projection: Option<Projection>,
    /// Number of matching documents to skip.
    pub skip: Option<u64>,
    /// Maximum number of documents to return.
    pub limit: Option<u64>,
}

impl FindOptions {
    pub fn new() -> Self {
        FindOptions::default()
    }

    pub fn sort(mut self, sort: Vec<Sort>) -> Self {
        self.sort = sort;
        self
    }

    pub fn projection(mut self, projection: Option<Projection>) -> Self {
        self.projection = projection;
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Options of an update operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Update every matching document instead of the first one.
    pub many: bool,
    /// Insert a new document when nothing matches.
    pub upsert: bool,
}

impl UpdateOptions {
    pub fn many() -> Self {
        UpdateOptions {
            many: true,
            upsert: false,
        }
    }

    pub fn upsert() -> Self {
        UpdateOptions {
            many: false,
            upsert: true,
        }
    }
}

/// Outcome of an update operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateResult {
    /// Number of documents that matched the filter.
    pub matched: u64,
    /// Number of documents actually changed.
    pub modified: u64,
    /// Identity of the inserted document, if the update upserted one.
    pub upserted_id: Option<Bson>,
}

/// A collection of documents in some storage backend.
///
/// Implementations must be safe to share between tasks. Every operation takes documents
/// and specifications already derived from host values, so nothing host-specific crosses
/// this seam.
///
/// # Errors
///
/// Operations return [`StoreResult<T>`](crate::error::StoreResult). Specifications that
/// cannot be rendered surface as [`StoreError::Conversion`](crate::error::StoreError::Conversion).
#[async_trait]
pub trait DataCollection: Send + Sync + Debug {
    /// Inserts a document, assigning an `ObjectId` identity when it has none.
    ///
    /// Returns the identity of the stored document. Fails with
    /// [`StoreError::DocumentAlreadyExists`](crate::error::StoreError::DocumentAlreadyExists)
    /// if a document with the same identity is already stored.
    async fn add_data(&self, document: Document) -> StoreResult<Bson>;

    /// Returns the documents matching `filter`, or every document when `filter` is `None`.
    async fn get_data(&self, filter: Option<Expr>, options: FindOptions) -> StoreResult<Vec<Document>>;

    /// Counts the documents matching `filter`.
    async fn count_data(&self, filter: Option<Expr>) -> StoreResult<u64>;

    /// Updates the first, or with [`UpdateOptions::many`] every, document matching `filter`.
    ///
    /// A replacement update targets a single document; combining one with `many` is
    /// rejected.
    async fn update_data(
        &self,
        filter: Expr,
        update: Update,
        options: UpdateOptions,
    ) -> StoreResult<UpdateResult>;

    /// Removes the first, or with `many` every, document matching `filter`.
    ///
    /// Returns the number of removed documents.
    async fn remove_data(&self, filter: Expr, many: bool) -> StoreResult<u64>;
}

#[async_trait]
impl<C> DataCollection for &C
where
    C: DataCollection,
{
    async fn add_data(&self, document: Document) -> StoreResult<Bson> {
        (*self).add_data(document).await
    }

    async fn get_data(&self, filter: Option<Expr>, options: FindOptions) -> StoreResult<Vec<Document>> {
        (*self).get_data(filter, options).await
    }

    async fn count_data(&self, filter: Option<Expr>) -> StoreResult<u64> {
        (*self).count_data(filter).await
    }

    async fn update_data(
        &self,
        filter: Expr,
        update: Update,
        options: UpdateOptions,
    ) -> StoreResult<UpdateResult> {
        (*self).update_data(filter, update, options).await
    }

    async fn remove_data(&self, filter: Expr, many: bool) -> StoreResult<u64> {
        (*self).remove_data(filter, many).await
    }
}

/// Builds a [`DataCollection`], possibly connecting to external services.
#[async_trait]
pub trait CollectionBuilder {
    type Collection: DataCollection;

    async fn build(self) -> StoreResult<Self::Collection>;
}
