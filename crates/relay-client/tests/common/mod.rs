#![allow(dead_code)]

use std::future::{Future, Ready, ready};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bson::{Bson, Document};
use futures::StreamExt;
use futures::stream;
use relay_client::RelayClient;
use relay_gateway::{Gateway, GatewayConfig};
use relay_protocol::{
    CountOptions, DeleteResult, FindOptions, InsertManyResult, InsertOneResult, UpdateOptions,
    UpdateResult,
};
use relay_store::{DocumentCursor, DocumentStore, StoreError};
use tokio::net::TcpListener;

pub const PASSWORD: &str = "correct horse";

/// Serve `store` through the hyper adapter on an ephemeral port.
pub async fn serve<S: DocumentStore>(store: S) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let gateway = Gateway::new(store, GatewayConfig::with_password(PASSWORD)).unwrap();
    tokio::spawn(relay_gateway_http::serve(listener, gateway, std::future::pending()));
    format!("http://{addr}/")
}

pub async fn client_for<S: DocumentStore>(store: S) -> RelayClient {
    RelayClient::new(&serve(store).await, PASSWORD).unwrap()
}

// ── Synthetic store ─────────────────────────────────────────────

/// Serves `find` from `records` generated `{ i }` documents, counting how
/// many the gateway pulled. Every other operation fails.
#[derive(Default)]
pub struct SyntheticStore {
    pub pulled: Arc<AtomicUsize>,
    pub records: usize,
    /// The cursor errors instead of yielding this record.
    pub fail_at: Option<usize>,
}

impl SyntheticStore {
    pub fn new(records: usize) -> Self {
        Self {
            records,
            ..Default::default()
        }
    }

    pub fn failing_at(records: usize, fail_at: usize) -> Self {
        Self {
            records,
            fail_at: Some(fail_at),
            ..Default::default()
        }
    }

    fn unsupported<T>(&self) -> Ready<Result<T, StoreError>> {
        ready(Err(StoreError::Storage("not supported by synthetic store".into())))
    }
}

impl DocumentStore for SyntheticStore {
    fn find(
        &self,
        _collection: &str,
        _filter: Document,
        _options: FindOptions,
    ) -> impl Future<Output = Result<DocumentCursor, StoreError>> + Send {
        let pulled = Arc::clone(&self.pulled);
        let fail_at = self.fail_at;
        let cursor: DocumentCursor = stream::iter(0..self.records)
            .map(move |i| {
                pulled.fetch_add(1, Ordering::SeqCst);
                if fail_at == Some(i) {
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
        self.unsupported()
    }

    fn insert_many(
        &self,
        _collection: &str,
        _documents: Vec<Document>,
    ) -> impl Future<Output = Result<InsertManyResult, StoreError>> + Send {
        self.unsupported()
    }

    fn update_one(
        &self,
        _collection: &str,
        _filter: Document,
        _update: Document,
        _options: UpdateOptions,
    ) -> impl Future<Output = Result<UpdateResult, StoreError>> + Send {
        self.unsupported()
    }

    fn update_many(
        &self,
        _collection: &str,
        _filter: Document,
        _update: Document,
        _options: UpdateOptions,
    ) -> impl Future<Output = Result<UpdateResult, StoreError>> + Send {
        self.unsupported()
    }

    fn replace_one(
        &self,
        _collection: &str,
        _filter: Document,
        _replacement: Document,
        _options: UpdateOptions,
    ) -> impl Future<Output = Result<UpdateResult, StoreError>> + Send {
        self.unsupported()
    }

    fn delete_one(
        &self,
        _collection: &str,
        _filter: Document,
    ) -> impl Future<Output = Result<DeleteResult, StoreError>> + Send {
        self.unsupported()
    }

    fn delete_many(
        &self,
        _collection: &str,
        _filter: Document,
    ) -> impl Future<Output = Result<DeleteResult, StoreError>> + Send {
        self.unsupported()
    }

    fn count_documents(
        &self,
        _collection: &str,
        _filter: Document,
        _options: CountOptions,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send {
        self.unsupported()
    }

    fn estimated_document_count(
        &self,
        _collection: &str,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send {
        self.unsupported()
    }

    fn distinct(
        &self,
        _collection: &str,
        _field: &str,
        _filter: Document,
    ) -> impl Future<Output = Result<Vec<Bson>, StoreError>> + Send {
        self.unsupported()
    }
}
