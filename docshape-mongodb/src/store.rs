use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{ClientOptions, FindOptions as MongoFindOptions},
};
use tracing::debug;

use docshape_core::{
    backend::{CollectionBuilder, DataCollection, FindOptions, UpdateOptions, UpdateResult},
    error::{StoreError, StoreResult},
    query::{Expr, render_filter},
    sort::render_sort,
    update::{RenderedUpdate, Update},
};

const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug, Clone)]
pub struct MongoDataCollection {
    collection: MongoCollection<Document>,
}

impl MongoDataCollection {
    pub fn new(collection: MongoCollection<Document>) -> Self {
        Self { collection }
    }

    pub fn builder(dsn: &str, database: &str, collection: &str) -> MongoDataCollectionBuilder {
        MongoDataCollectionBuilder::new(dsn, database, collection)
    }

    pub fn name(&self) -> &str {
        self.collection.name()
    }
}

fn backend(error: MongoError) -> StoreError {
    StoreError::Backend(error.to_string())
}

fn is_duplicate_key(error: &MongoError) -> bool {
    matches!(
        error.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY
    )
}

fn render_optional(filter: Option<&Expr>) -> StoreResult<Document> {
    Ok(match filter {
        Some(expr) => render_filter(expr)?,
        None => doc! {},
    })
}

/// Translates find options into the driver's options.
pub(crate) fn find_options(options: &FindOptions) -> MongoFindOptions {
    let mut translated = MongoFindOptions::default();

    if !options.sort.is_empty() {
        translated.sort = Some(render_sort(&options.sort));
    }
    if let Some(projection) = options.projection.as_ref().filter(|p| !p.is_empty()) {
        translated.projection = Some(projection.render());
    }
    translated.skip = options.skip;
    translated.limit = options
        .limit
        .map(|limit| i64::try_from(limit).unwrap_or(i64::MAX));

    translated
}

fn update_result(result: mongodb::results::UpdateResult) -> UpdateResult {
    UpdateResult {
        matched: result.matched_count,
        modified: result.modified_count,
        upserted_id: result.upserted_id,
    }
}

#[async_trait]
impl DataCollection for MongoDataCollection {
    async fn add_data(&self, document: Document) -> StoreResult<Bson> {
        let result = self.collection.insert_one(document).await.map_err(|e| {
            if is_duplicate_key(&e) {
                StoreError::DocumentAlreadyExists(e.to_string())
            } else {
                backend(e)
            }
        })?;

        debug!(collection = self.name(), id = %result.inserted_id, "added document");
        Ok(result.inserted_id)
    }

    async fn get_data(&self, filter: Option<Expr>, options: FindOptions) -> StoreResult<Vec<Document>> {
        self.collection
            .find(render_optional(filter.as_ref())?)
            .with_options(find_options(&options))
            .await
            .map_err(backend)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(backend)
    }

    async fn count_data(&self, filter: Option<Expr>) -> StoreResult<u64> {
        self.collection
            .count_documents(render_optional(filter.as_ref())?)
            .await
            .map_err(backend)
    }

    async fn update_data(
        &self,
        filter: Expr,
        update: Update,
        options: UpdateOptions,
    ) -> StoreResult<UpdateResult> {
        let filter = render_filter(&filter)?;

        let result = match update.resolve()? {
            RenderedUpdate::Replacement(_) if options.many => {
                return Err(StoreError::InvalidDocument(
                    "a replacement cannot be applied to many documents".to_string(),
                ));
            }
            RenderedUpdate::Replacement(replacement) => self
                .collection
                .replace_one(filter, replacement)
                .upsert(options.upsert)
                .await,
            RenderedUpdate::Modifiers(modifiers) if options.many => self
                .collection
                .update_many(filter, modifiers)
                .upsert(options.upsert)
                .await,
            RenderedUpdate::Modifiers(modifiers) => self
                .collection
                .update_one(filter, modifiers)
                .upsert(options.upsert)
                .await,
        }
        .map_err(backend)?;

        debug!(
            collection = self.name(),
            matched = result.matched_count,
            modified = result.modified_count,
            "updated documents"
        );
        Ok(update_result(result))
    }

    async fn remove_data(&self, filter: Expr, many: bool) -> StoreResult<u64> {
        let filter = render_filter(&filter)?;

        let result = if many {
            self.collection.delete_many(filter).await
        } else {
            self.collection.delete_one(filter).await
        }
        .map_err(backend)?;

        debug!(collection = self.name(), removed = result.deleted_count, "removed documents");
        Ok(result.deleted_count)
    }
}

pub struct MongoDataCollectionBuilder {
    dsn: String,
    database: String,
    collection: String,
}

impl MongoDataCollectionBuilder {
    pub fn new(dsn: &str, database: &str, collection: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
            collection: collection.to_string(),
        }
    }
}

#[async_trait]
impl CollectionBuilder for MongoDataCollectionBuilder {
    type Collection = MongoDataCollection;

    async fn build(self) -> StoreResult<Self::Collection> {
        let client = Client::with_options(
            ClientOptions::parse(&self.dsn)
                .await
                .map_err(|e| StoreError::Initialization(e.to_string()))?,
        )
        .map_err(|e| StoreError::Initialization(e.to_string()))?;

        Ok(MongoDataCollection::new(
            client.database(&self.database).collection(&self.collection),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docshape_core::{projection::Projection, sort::Sort};

    #[test]
    fn test_find_options_translation() {
        let options = FindOptions::new()
            .sort(vec![Sort::desc("age"), Sort::asc("name")])
            .projection(Some(Projection::fields(["name"])))
            .skip(5)
            .limit(10);

        let translated = find_options(&options);
        assert_eq!(translated.sort, Some(doc! { "age": -1, "name": 1 }));
        assert_eq!(translated.projection, Some(doc! { "name": 1 }));
        assert_eq!(translated.skip, Some(5));
        assert_eq!(translated.limit, Some(10));
    }

    #[test]
    fn test_empty_find_options() {
        let translated = find_options(&FindOptions::new().projection(Some(Projection::new())));
        assert_eq!(translated.sort, None);
        assert_eq!(translated.projection, None);
        assert_eq!(translated.limit, None);
    }

    #[test]
    fn test_optional_filter_renders_everything() {
        assert_eq!(render_optional(None).unwrap(), doc! {});
        assert_eq!(
            render_optional(Some(&docshape_core::query::Filter::eq("a", 1))).unwrap(),
            doc! { "a": 1 }
        );
    }
}
