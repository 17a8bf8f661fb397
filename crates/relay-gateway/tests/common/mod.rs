#![allow(dead_code)]

use std::future::{Future, Ready, ready};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bson::{Bson, Document};
use bytes::Bytes;
use futures::StreamExt;
use futures::stream;
use http::{Request, Response};
use relay_gateway::{Gateway, GatewayConfig, RelayBody};
use relay_protocol::{
    Codec, CountOptions, DeleteResult, Envelope, FindOptions, InsertManyResult, InsertOneResult,
    UpdateOptions, UpdateResult,
};
use relay_store::{DocumentCursor, DocumentStore, MemoryStore, StoreError};

pub const PASSWORD: &str = "s3cret";

pub fn memory_gateway() -> Gateway<MemoryStore> {
    Gateway::new(MemoryStore::new(), GatewayConfig::with_password(PASSWORD)).unwrap()
}

pub fn post(op: &str, coll: &str, body: &str) -> Request<Bytes> {
    Request::builder()
        .method("POST")
        .uri(format!("/relay?op={op}&coll={coll}"))
        .header("bearer", PASSWORD)
        .header("content-type", "application/json")
        .body(Bytes::from(body.to_string()))
        .unwrap()
}

pub fn post_bson(op: &str, coll: &str, payload: &Bson) -> Request<Bytes> {
    Request::builder()
        .method("POST")
        .uri(format!("/relay?op={op}&coll={coll}"))
        .header("bearer", PASSWORD)
        .header("content-type", "application/bson")
        .body(Bytes::from(Codec::Bson.encode(payload).unwrap()))
        .unwrap()
}

pub fn content_type(response: &Response<RelayBody>) -> &str {
    response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
}

/// Send a JSON request and decode the envelope it answers with.
pub async fn call<S: DocumentStore>(gateway: &Gateway<S>, op: &str, coll: &str, body: &str) -> Envelope {
    let response = gateway.handle(post(op, coll, body)).await;
    assert_eq!(response.status(), 200);
    let bytes = response.into_body().collect().await.unwrap();
    Codec::ExtendedJson.decode_envelope(&bytes).unwrap()
}

// ── Stub store ──────────────────────────────────────────────────

/// A store that counts every call and serves `find` from a synthetic
/// cursor of `records` documents, counting how many were pulled.
#[derive(Default)]
pub struct CountingStore {
    pub calls: Arc<AtomicUsize>,
    pub pulled: Arc<AtomicUsize>,
    pub records: usize,
    /// Fail the cursor after this many records.
    pub fail_after: Option<usize>,
    pub panic_on_insert: bool,
}

impl CountingStore {
    pub fn with_records(records: usize) -> Self {
        Self {
            records,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn unused<T>(&self) -> Ready<Result<T, StoreError>> {
        self.touch();
        ready(Err(StoreError::Storage("not supported by stub".into())))
    }
}

impl DocumentStore for CountingStore {
    fn find(
        &self,
        _collection: &str,
        _filter: Document,
        _options: FindOptions,
    ) -> impl Future<Output = Result<DocumentCursor, StoreError>> + Send {
        self.touch();
        let pulled = Arc::clone(&self.pulled);
        let fail_after = self.fail_after;
        let cursor: DocumentCursor = stream::iter(0..self.records)
            .map(move |i| {
                pulled.fetch_add(1, Ordering::SeqCst);
                if fail_after == Some(i) {
                    return Err(StoreError::Storage("cursor lost".into()));
                }
                Ok(bson::doc! { "i": i as i64 })
            })
            .boxed();
        ready(Ok(cursor))
    }

    fn insert_one(
        &self,
        _collection: &str,
        _document: Document,
    ) -> impl Future<Output = Result<InsertOneResult, StoreError>> + Send {
        self.touch();
        let panic_on_insert = self.panic_on_insert;
        async move {
            if panic_on_insert {
                panic!("store exploded");
            }
            Err(StoreError::Storage("not supported by stub".into()))
        }
    }

    fn insert_many(
        &self,
        _collection: &str,
        _documents: Vec<Document>,
    ) -> impl Future<Output = Result<InsertManyResult, StoreError>> + Send {
        self.unused()
    }

    fn update_one(
        &self,
        _collection: &str,
        _filter: Document,
        _update: Document,
        _options: UpdateOptions,
    ) -> impl Future<Output = Result<UpdateResult, StoreError>> + Send {
        self.unused()
    }

    fn update_many(
        &self,
        _collection: &str,
        _filter: Document,
        _update: Document,
        _options: UpdateOptions,
    ) -> impl Future<Output = Result<UpdateResult, StoreError>> + Send {
        self.unused()
    }

    fn replace_one(
        &self,
        _collection: &str,
        _filter: Document,
        _replacement: Document,
        _options: UpdateOptions,
    ) -> impl Future<Output = Result<UpdateResult, StoreError>> + Send {
        self.unused()
    }

    fn delete_one(
        &self,
        _collection: &str,
        _filter: Document,
    ) -> impl Future<Output = Result<DeleteResult, StoreError>> + Send {
        self.unused()
    }

    fn delete_many(
        &self,
        _collection: &str,
        _filter: Document,
    ) -> impl Future<Output = Result<DeleteResult, StoreError>> + Send {
        self.unused()
    }

    fn count_documents(
        &self,
        _collection: &str,
        _filter: Document,
        _options: CountOptions,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send {
        self.unused()
    }

    fn estimated_document_count(
        &self,
        _collection: &str,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send {
        self.unused()
    }

    fn distinct(
        &self,
        _collection: &str,
        _field: &str,
        _filter: Document,
    ) -> impl Future<Output = Result<Vec<Bson>, StoreError>> + Send {
        self.unused()
    }
}

pub fn counting_gateway(store: CountingStore) -> Gateway<CountingStore> {
    Gateway::new(store, GatewayConfig::with_password(PASSWORD)).unwrap()
}
