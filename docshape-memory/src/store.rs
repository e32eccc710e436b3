//! In-memory collection implementation.
//!
//! Documents are kept in insertion order behind an async-aware read-write lock. Every
//! operation scans the whole collection; there are no indexes.

use std::{cmp::Ordering, sync::Arc};

use async_trait::async_trait;
use bson::{Bson, Document, oid::ObjectId};
use mea::rwlock::RwLock;
use tracing::debug;

use docshape_core::{
    backend::{CollectionBuilder, DataCollection, FindOptions, UpdateOptions, UpdateResult},
    error::{StoreError, StoreResult},
    query::{Expr, ID_FIELD},
    sort::{Sort, SortDirection},
    update::{RenderedUpdate, Update},
};

use crate::{
    apply::{apply_update, project, upsert_seed},
    evaluator::{Comparable, DocumentEvaluator, lookup},
};

/// Thread-safe in-memory collection.
///
/// `InMemoryCollection` is cloneable; clones share the same documents.
///
/// # Example
///
/// ```ignore
/// use docshape_memory::InMemoryCollection;
/// use docshape_core::{backend::DataCollection, query::Filter};
/// use bson::doc;
///
/// let collection = InMemoryCollection::new("users");
/// let id = collection.add_data(doc! { "name": "Alice" }).await?;
/// let found = collection.get_data(Some(Filter::id(id)), Default::default()).await?;
/// assert_eq!(found.len(), 1);
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryCollection {
    name: String,
    documents: Arc<RwLock<Vec<Document>>>,
}

impl Default for InMemoryCollection {
    fn default() -> Self {
        InMemoryCollection::new("default")
    }
}

impl InMemoryCollection {
    /// Creates an empty collection.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Creates a builder for an `InMemoryCollection`.
    pub fn builder() -> InMemoryCollectionBuilder {
        InMemoryCollectionBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

fn identity_of(document: &Document) -> Option<&Bson> {
    document.get(ID_FIELD)
}

fn same_identity(left: &Bson, right: &Bson) -> bool {
    Comparable::from(left) == Comparable::from(right)
}

fn contains_identity(documents: &[Document], id: &Bson) -> bool {
    documents
        .iter()
        .filter_map(identity_of)
        .any(|existing| same_identity(existing, id))
}

fn compare_by(sorts: &[Sort], left: &Document, right: &Document) -> Ordering {
    for sort in sorts {
        let null = Bson::Null;
        let a = Comparable::from(lookup(left, &sort.field).unwrap_or(&null));
        let b = Comparable::from(lookup(right, &sort.field).unwrap_or(&null));

        let ordering = match sort.direction {
            SortDirection::Asc => a.total_cmp(&b),
            SortDirection::Desc => b.total_cmp(&a),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn to_usize(value: Option<u64>, default: usize) -> usize {
    value.map_or(default, |value| usize::try_from(value).unwrap_or(usize::MAX))
}

/// Puts `_id` first, assigning a fresh `ObjectId` when missing.
fn with_identity(mut document: Document) -> (Bson, Document) {
    let id = document
        .remove(ID_FIELD)
        .unwrap_or_else(|| Bson::ObjectId(ObjectId::new()));

    let mut stored = Document::new();
    stored.insert(ID_FIELD, id.clone());
    stored.extend(document);
    (id, stored)
}

#[async_trait]
impl DataCollection for InMemoryCollection {
    async fn add_data(&self, document: Document) -> StoreResult<Bson> {
        let (id, document) = with_identity(document);
        let mut documents = self.documents.write().await;

        if contains_identity(&documents, &id) {
            return Err(StoreError::DocumentAlreadyExists(id.to_string()));
        }

        debug!(collection = %self.name, id = %id, "adding document");
        documents.push(document);
        Ok(id)
    }

    async fn get_data(&self, filter: Option<Expr>, options: FindOptions) -> StoreResult<Vec<Document>> {
        let documents = self.documents.read().await;

        let mut matched = Vec::new();
        for document in documents.iter() {
            if DocumentEvaluator::matches(document, filter.as_ref())? {
                matched.push(document);
            }
        }

        if !options.sort.is_empty() {
            matched.sort_by(|a, b| compare_by(&options.sort, a, b));
        }

        matched
            .into_iter()
            .skip(to_usize(options.skip, 0))
            .take(to_usize(options.limit, usize::MAX))
            .map(|document| match &options.projection {
                Some(projection) => project(document, projection),
                None => Ok(document.clone()),
            })
            .collect()
    }

    async fn count_data(&self, filter: Option<Expr>) -> StoreResult<u64> {
        let documents = self.documents.read().await;

        let mut count = 0;
        for document in documents.iter() {
            if DocumentEvaluator::matches(document, filter.as_ref())? {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn update_data(
        &self,
        filter: Expr,
        update: Update,
        options: UpdateOptions,
    ) -> StoreResult<UpdateResult> {
        let update = update.resolve()?;
        if options.many && update.is_replacement() {
            return Err(StoreError::InvalidDocument(
                "a replacement cannot be applied to many documents".to_string(),
            ));
        }

        let mut documents = self.documents.write().await;
        let mut result = UpdateResult::default();

        // Nothing is written back until every match has been updated.
        let mut pending = Vec::new();
        for (index, document) in documents.iter().enumerate() {
            if !DocumentEvaluator::matches(document, Some(&filter))? {
                continue;
            }

            pending.push((index, apply_update(document, &update)?));
            if !options.many {
                break;
            }
        }

        result.matched = pending.len() as u64;
        for (index, updated) in pending {
            if let Some(updated) = updated {
                documents[index] = updated;
                result.modified += 1;
            }
        }

        if result.matched == 0 && options.upsert {
            let mut seed = upsert_seed(&filter);
            if let RenderedUpdate::Replacement(replacement) = &update {
                seed = seed
                    .remove(ID_FIELD)
                    .map(|id| Document::from_iter([(ID_FIELD.to_string(), id)]))
                    .unwrap_or_default();
                seed.extend(replacement.clone());
            } else {
                seed = apply_update(&seed, &update)?.unwrap_or(seed);
            }

            let (id, document) = with_identity(seed);
            if contains_identity(&documents, &id) {
                return Err(StoreError::DocumentAlreadyExists(id.to_string()));
            }

            debug!(collection = %self.name, id = %id, "upserting document");
            documents.push(document);
            result.upserted_id = Some(id);
        }

        debug!(
            collection = %self.name,
            matched = result.matched,
            modified = result.modified,
            "updated documents"
        );
        Ok(result)
    }

    async fn remove_data(&self, filter: Expr, many: bool) -> StoreResult<u64> {
        let mut documents = self.documents.write().await;

        let mut removed = 0;
        let mut index = 0;
        while index < documents.len() {
            if (many || removed == 0) && DocumentEvaluator::matches(&documents[index], Some(&filter))? {
                documents.remove(index);
                removed += 1;
            } else {
                index += 1;
            }
        }

        debug!(collection = %self.name, removed, "removed documents");
        Ok(removed)
    }
}

/// Builder for [`InMemoryCollection`] instances.
#[derive(Debug, Default)]
pub struct InMemoryCollectionBuilder {
    name: Option<String>,
    documents: Vec<Document>,
}

impl InMemoryCollectionBuilder {
    /// Sets the collection name used in log events.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Seeds the collection with documents.
    pub fn documents(mut self, documents: impl IntoIterator<Item = Document>) -> Self {
        self.documents.extend(documents);
        self
    }
}

#[async_trait]
impl CollectionBuilder for InMemoryCollectionBuilder {
    type Collection = InMemoryCollection;

    /// Builds the collection, failing if two seed documents share an identity.
    async fn build(self) -> StoreResult<Self::Collection> {
        let collection = match self.name {
            Some(name) => InMemoryCollection::new(name),
            None => InMemoryCollection::default(),
        };

        for document in self.documents {
            collection.add_data(document).await?;
        }
        Ok(collection)
    }
}
