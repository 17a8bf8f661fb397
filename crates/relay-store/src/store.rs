use std::future::Future;

use bson::{Bson, Document};
use futures::StreamExt;
use futures::stream::BoxStream;
use relay_protocol::{
    CountOptions, DeleteResult, FindOptions, InsertManyResult, InsertOneResult, UpdateOptions,
    UpdateResult,
};

use crate::error::StoreError;

/// Documents produced lazily by a find. Each poll pulls at most one record
/// from the backend.
pub type DocumentCursor = BoxStream<'static, Result<Document, StoreError>>;

/// The database capability a gateway executes operations against.
///
/// Implementations must tolerate concurrent independent calls; the gateway
/// shares one instance across every in-flight request.
pub trait DocumentStore: Send + Sync + 'static {
    /// Open a cursor over the documents matching `filter`, with sort, skip,
    /// limit and projection from `options` applied.
    fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> impl Future<Output = Result<DocumentCursor, StoreError>> + Send;

    fn find_one(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> impl Future<Output = Result<Option<Document>, StoreError>> + Send {
        async move {
            let options = FindOptions {
                limit: Some(1),
                ..options
            };
            let mut cursor = self.find(collection, filter, options).await?;
            cursor.next().await.transpose()
        }
    }

    fn insert_one(
        &self,
        collection: &str,
        document: Document,
    ) -> impl Future<Output = Result<InsertOneResult, StoreError>> + Send;

    fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> impl Future<Output = Result<InsertManyResult, StoreError>> + Send;

    fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> impl Future<Output = Result<UpdateResult, StoreError>> + Send;

    fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> impl Future<Output = Result<UpdateResult, StoreError>> + Send;

    fn replace_one(
        &self,
        collection: &str,
        filter: Document,
        replacement: Document,
        options: UpdateOptions,
    ) -> impl Future<Output = Result<UpdateResult, StoreError>> + Send;

    fn delete_one(
        &self,
        collection: &str,
        filter: Document,
    ) -> impl Future<Output = Result<DeleteResult, StoreError>> + Send;

    fn delete_many(
        &self,
        collection: &str,
        filter: Document,
    ) -> impl Future<Output = Result<DeleteResult, StoreError>> + Send;

    fn count_documents(
        &self,
        collection: &str,
        filter: Document,
        options: CountOptions,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Collection size without applying any filter.
    fn estimated_document_count(
        &self,
        collection: &str,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Distinct values of `field` across matching documents, in first-seen
    /// order. Array values contribute their elements.
    fn distinct(
        &self,
        collection: &str,
        field: &str,
        filter: Document,
    ) -> impl Future<Output = Result<Vec<Bson>, StoreError>> + Send;
}
