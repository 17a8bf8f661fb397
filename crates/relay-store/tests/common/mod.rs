#![allow(dead_code)]

use bson::{Document, doc};
use futures::TryStreamExt;
use relay_protocol::FindOptions;
use relay_store::{DocumentStore, MemoryStore};

pub const COLLECTION: &str = "accounts";

/// Insert 5 seed records.
pub async fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    store
        .insert_many(
            COLLECTION,
            vec![
                doc! { "_id": "acct-1", "name": "Acme Corp", "revenue": 50000.0, "status": "active", "tags": ["b2b"] },
                doc! { "_id": "acct-2", "name": "Globex", "revenue": 80000.0, "status": "snoozed", "tags": ["b2b", "eu"] },
                doc! { "_id": "acct-3", "name": "Initech", "revenue": 12000.0, "status": "rejected" },
                doc! { "_id": "acct-4", "name": "Umbrella", "revenue": 95000.0, "status": "active", "tags": ["eu"] },
                doc! { "_id": "acct-5", "name": "Stark Industries", "revenue": 200000.0, "status": "active" },
            ],
        )
        .await
        .unwrap();
    store
}

pub async fn find_all(store: &MemoryStore, filter: Document, options: FindOptions) -> Vec<Document> {
    store
        .find(COLLECTION, filter, options)
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap()
}

pub fn ids(docs: &[Document]) -> Vec<&str> {
    docs.iter().map(|d| d.get_str("_id").unwrap()).collect()
}
