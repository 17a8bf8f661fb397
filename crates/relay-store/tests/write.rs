mod common;
use common::*;

use bson::{Bson, doc};
use relay_protocol::{CountOptions, FindOptions, UpdateOptions};
use relay_store::{DocumentStore, MemoryStore, StoreError};

const UPSERT: UpdateOptions = UpdateOptions { upsert: true };

// ── Insert ──────────────────────────────────────────────────────

#[tokio::test]
async fn insert_generates_object_id_first() {
    let store = MemoryStore::new();
    let result = store.insert_one("items", doc! { "a": 1 }).await.unwrap();
    assert!(matches!(result.inserted_id, Bson::ObjectId(_)));

    let doc = store
        .find_one("items", doc! {}, FindOptions::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.keys().next().map(String::as_str), Some("_id"));
    assert_eq!(doc.get("_id"), Some(&result.inserted_id));
    assert_eq!(doc.get_i32("a").unwrap(), 1);
}

#[tokio::test]
async fn duplicate_id_is_rejected() {
    let store = seeded_store().await;
    let err = store
        .insert_one(COLLECTION, doc! { "_id": "acct-1" })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey(_)));
    assert_eq!(err.name(), "DuplicateKeyError");
}

#[tokio::test]
async fn numeric_ids_collide_across_widths() {
    let store = MemoryStore::new();
    store.insert_one("n", doc! { "_id": 1 }).await.unwrap();
    let err = store.insert_one("n", doc! { "_id": 1_i64 }).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey(_)));
}

#[tokio::test]
async fn insert_many_is_all_or_nothing() {
    let store = seeded_store().await;
    let err = store
        .insert_many(COLLECTION, vec![doc! { "_id": "new" }, doc! { "_id": "acct-2" }])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey(_)));
    assert_eq!(store.estimated_document_count(COLLECTION).await.unwrap(), 5);
}

// ── Update ──────────────────────────────────────────────────────

#[tokio::test]
async fn update_one_touches_first_match() {
    let store = seeded_store().await;
    let result = store
        .update_one(
            COLLECTION,
            doc! { "status": "active" },
            doc! { "$set": { "status": "churned" } },
            UpdateOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!((result.matched_count, result.modified_count), (1, 1));

    let churned = find_all(&store, doc! { "status": "churned" }, FindOptions::default()).await;
    assert_eq!(ids(&churned), ["acct-1"]);
}

#[tokio::test]
async fn update_many_counts_only_changed_documents() {
    let store = seeded_store().await;
    let result = store
        .update_many(
            COLLECTION,
            doc! {},
            doc! { "$set": { "status": "active" } },
            UpdateOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(result.matched_count, 5);
    assert_eq!(result.modified_count, 2);
    assert_eq!(result.upserted_id, None);
}

#[tokio::test]
async fn upsert_seeds_from_filter() {
    let store = seeded_store().await;
    let result = store
        .update_one(
            COLLECTION,
            doc! { "_id": "acct-9", "region": "apac" },
            doc! { "$inc": { "visits": 1 } },
            UPSERT,
        )
        .await
        .unwrap();
    assert_eq!(result.upserted_count, 1);
    assert_eq!(result.upserted_id, Some(Bson::from("acct-9")));

    let doc = store
        .find_one(COLLECTION, doc! { "_id": "acct-9" }, FindOptions::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc, doc! { "_id": "acct-9", "region": "apac", "visits": 1 });
}

#[tokio::test]
async fn update_rejects_bare_fields() {
    let store = seeded_store().await;
    let err = store
        .update_one(COLLECTION, doc! {}, doc! { "status": "x" }, UpdateOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidUpdate(_)));
}

#[tokio::test]
async fn failed_update_leaves_collection_untouched() {
    let store = seeded_store().await;
    let err = store
        .update_many(
            COLLECTION,
            doc! {},
            doc! { "$inc": { "name": 1 } },
            UpdateOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidUpdate(_)));
    let docs = find_all(&store, doc! { "name": "Acme Corp" }, FindOptions::default()).await;
    assert_eq!(docs.len(), 1);
}

// ── Replace ─────────────────────────────────────────────────────

#[tokio::test]
async fn replace_keeps_id() {
    let store = seeded_store().await;
    let result = store
        .replace_one(
            COLLECTION,
            doc! { "_id": "acct-3" },
            doc! { "name": "Initrode" },
            UpdateOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!((result.matched_count, result.modified_count), (1, 1));

    let doc = store
        .find_one(COLLECTION, doc! { "_id": "acct-3" }, FindOptions::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc, doc! { "_id": "acct-3", "name": "Initrode" });
}

#[tokio::test]
async fn replace_cannot_change_id() {
    let store = seeded_store().await;
    let err = store
        .replace_one(
            COLLECTION,
            doc! { "_id": "acct-3" },
            doc! { "_id": "other" },
            UpdateOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidUpdate(_)));
}

#[tokio::test]
async fn replace_upsert_inserts() {
    let store = MemoryStore::new();
    let result = store
        .replace_one("items", doc! { "_id": 5 }, doc! { "a": 1 }, UPSERT)
        .await
        .unwrap();
    assert_eq!(result.upserted_id, Some(Bson::Int32(5)));
    assert_eq!(
        store.count_documents("items", doc! { "a": 1 }, CountOptions::default()).await.unwrap(),
        1
    );
}

// ── Delete ──────────────────────────────────────────────────────

#[tokio::test]
async fn delete_one_and_many() {
    let store = seeded_store().await;
    let one = store
        .delete_one(COLLECTION, doc! { "status": "active" })
        .await
        .unwrap();
    assert_eq!(one.deleted_count, 1);

    let many = store
        .delete_many(COLLECTION, doc! { "status": "active" })
        .await
        .unwrap();
    assert_eq!(many.deleted_count, 2);
    assert_eq!(store.estimated_document_count(COLLECTION).await.unwrap(), 2);

    // The freed _id can be reused.
    store
        .insert_one(COLLECTION, doc! { "_id": "acct-1" })
        .await
        .unwrap();
}
