use std::collections::HashMap;
use std::future::{Future, ready};
use std::ops::Bound;
use std::sync::{Arc, Mutex, RwLock};

use arc_swap::ArcSwap;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use futures::StreamExt;
use futures::stream;
use imbl::OrdMap;
use relay_protocol::{
    CountOptions, DeleteResult, FindOptions, InsertManyResult, InsertOneResult, SortDirection,
    UpdateOptions, UpdateResult,
};

use crate::compare::{compare_values, display_id, id_key, values_equal};
use crate::error::StoreError;
use crate::filter::{Expression, parse_filter};
use crate::mutation::{Update, parse_update, validate_replacement};
use crate::path;
use crate::projection::Projection;
use crate::store::{DocumentCursor, DocumentStore};

/// One collection's contents. Documents are keyed by insertion sequence so
/// natural order is stable; `ids` is the unique `_id` index.
#[derive(Clone, Default)]
struct CollectionData {
    docs: OrdMap<u64, Document>,
    ids: OrdMap<String, u64>,
    next_seq: u64,
}

impl CollectionData {
    fn insert(&mut self, mut doc: Document) -> Result<Bson, StoreError> {
        let id = match doc.get("_id") {
            Some(id) => id.clone(),
            None => {
                let id = Bson::ObjectId(ObjectId::new());
                let mut with_id = Document::new();
                with_id.insert("_id", id.clone());
                for (k, v) in doc {
                    with_id.insert(k, v);
                }
                doc = with_id;
                id
            }
        };

        let key = id_key(&id);
        if self.ids.contains_key(&key) {
            return Err(StoreError::DuplicateKey(display_id(&id)));
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.ids.insert(key, seq);
        self.docs.insert(seq, doc);
        Ok(id)
    }

    fn remove(&mut self, seq: u64) {
        if let Some(doc) = self.docs.remove(&seq) {
            if let Some(id) = doc.get("_id") {
                self.ids.remove(&id_key(id));
            }
        }
    }

    /// Sequence numbers of matching documents in natural order.
    fn matching(&self, filter: &Expression) -> Vec<u64> {
        self.docs
            .iter()
            .filter(|(_, doc)| filter.matches(doc))
            .map(|(seq, _)| *seq)
            .collect()
    }
}

/// In-process document store. Readers work on an immutable snapshot of a
/// collection; writers serialize on one lock and publish a new snapshot.
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Arc<ArcSwap<CollectionData>>>>,
    write_lock: Mutex<()>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Current snapshot of a collection. Missing collections read as empty.
    fn snapshot(&self, name: &str) -> Result<Arc<CollectionData>, StoreError> {
        let collections = self
            .collections
            .read()
            .map_err(|e| StoreError::Storage(format!("collection map poisoned: {e}")))?;
        Ok(match collections.get(name) {
            Some(arc) => arc.load_full(),
            None => Arc::new(CollectionData::default()),
        })
    }

    /// Run `f` against a private copy of the collection and publish it when
    /// `f` succeeds. A failed write leaves the collection untouched.
    fn write<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut CollectionData) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| StoreError::Storage(format!("write lock poisoned: {e}")))?;

        let arc = {
            let mut collections = self
                .collections
                .write()
                .map_err(|e| StoreError::Storage(format!("collection map poisoned: {e}")))?;
            collections
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(ArcSwap::from_pointee(CollectionData::default())))
                .clone()
        };

        let mut data = (**arc.load()).clone();
        let out = f(&mut data).inspect_err(|e| {
            tracing::debug!(collection = name, error = %e, "write rejected");
        })?;
        arc.store(Arc::new(data));
        Ok(out)
    }

    fn open_cursor(
        &self,
        collection: &str,
        filter: &Document,
        options: &FindOptions,
    ) -> Result<DocumentCursor, StoreError> {
        let expr = parse_filter(filter)?;
        let sort = options.sort_fields()?;
        let projection = match &options.projection {
            Some(spec) => Projection::parse(spec)?,
            None => None,
        };
        let skip = options.skip.map_or(0, to_usize);
        let limit = options.limit.map_or(usize::MAX, to_usize);
        let snapshot = self.snapshot(collection)?;

        let matched: DocumentCursor = if sort.is_empty() {
            scan(snapshot, expr).boxed()
        } else {
            let mut docs: Vec<Document> = snapshot
                .docs
                .values()
                .filter(|doc| expr.matches(doc))
                .cloned()
                .collect();
            docs.sort_by(|a, b| compare_by_sort(a, b, &sort));
            stream::iter(docs.into_iter().map(Ok)).boxed()
        };

        Ok(matched
            .skip(skip)
            .take(limit)
            .map(move |doc| match &projection {
                Some(p) => doc.map(|d| p.apply(d)),
                None => doc,
            })
            .boxed())
    }

    fn update(
        &self,
        collection: &str,
        filter: &Document,
        update: Document,
        options: UpdateOptions,
        multi: bool,
    ) -> Result<UpdateResult, StoreError> {
        let expr = parse_filter(filter)?;
        let update = parse_update(&update)?;

        self.write(collection, |data| {
            let mut targets = data.matching(&expr);
            if !multi {
                targets.truncate(1);
            }

            if targets.is_empty() && options.upsert {
                let mut seed = seed_from_filter(&expr)?;
                update
                    .apply(&mut seed, true)
                    .map_err(|e| StoreError::InvalidUpdate(e.0))?;
                let id = data.insert(seed)?;
                return Ok(upserted(id));
            }

            let mut modified = 0;
            for seq in &targets {
                if apply_update(data, *seq, &update)? {
                    modified += 1;
                }
            }
            Ok(UpdateResult {
                acknowledged: true,
                matched_count: targets.len() as u64,
                modified_count: modified,
                upserted_count: 0,
                upserted_id: None,
            })
        })
    }

    fn replace(
        &self,
        collection: &str,
        filter: &Document,
        replacement: Document,
        options: UpdateOptions,
    ) -> Result<UpdateResult, StoreError> {
        let expr = parse_filter(filter)?;
        validate_replacement(&replacement)?;

        self.write(collection, |data| {
            let Some(seq) = data.matching(&expr).first().copied() else {
                if !options.upsert {
                    return Ok(UpdateResult {
                        acknowledged: true,
                        matched_count: 0,
                        modified_count: 0,
                        upserted_count: 0,
                        upserted_id: None,
                    });
                }
                let mut doc = Document::new();
                if let Some(id) = replacement.get("_id").cloned().or_else(|| {
                    let seed = seed_from_filter(&expr).ok()?;
                    seed.get("_id").cloned()
                }) {
                    doc.insert("_id", id);
                }
                for (k, v) in replacement {
                    doc.insert(k, v);
                }
                let id = data.insert(doc)?;
                return Ok(upserted(id));
            };

            let Some(existing) = data.docs.get(&seq) else {
                return Err(StoreError::Storage(format!("missing document {seq}")));
            };
            let id = existing.get("_id").cloned().unwrap_or(Bson::Null);
            if let Some(new_id) = replacement.get("_id") {
                if !values_equal(new_id, &id) {
                    return Err(StoreError::InvalidUpdate(
                        "replacement cannot change the _id field".into(),
                    ));
                }
            }

            let mut doc = Document::new();
            doc.insert("_id", id);
            for (k, v) in replacement {
                if k != "_id" {
                    doc.insert(k, v);
                }
            }
            let modified = existing != &doc;
            if modified {
                data.docs.insert(seq, doc);
            }
            Ok(UpdateResult {
                acknowledged: true,
                matched_count: 1,
                modified_count: u64::from(modified),
                upserted_count: 0,
                upserted_id: None,
            })
        })
    }

    fn delete(&self, collection: &str, filter: &Document, multi: bool) -> Result<DeleteResult, StoreError> {
        let expr = parse_filter(filter)?;
        self.write(collection, |data| {
            let mut targets = data.matching(&expr);
            if !multi {
                targets.truncate(1);
            }
            for seq in &targets {
                data.remove(*seq);
            }
            Ok(DeleteResult {
                acknowledged: true,
                deleted_count: targets.len() as u64,
            })
        })
    }

    fn count(&self, collection: &str, filter: &Document, options: CountOptions) -> Result<u64, StoreError> {
        let expr = parse_filter(filter)?;
        let snapshot = self.snapshot(collection)?;
        let matched = snapshot.docs.values().filter(|doc| expr.matches(doc)).count();
        let after_skip = matched.saturating_sub(options.skip.map_or(0, to_usize));
        let counted = after_skip.min(options.limit.map_or(usize::MAX, to_usize));
        Ok(counted as u64)
    }

    fn distinct_values(&self, collection: &str, field: &str, filter: &Document) -> Result<Vec<Bson>, StoreError> {
        let expr = parse_filter(filter)?;
        let snapshot = self.snapshot(collection)?;
        let mut out: Vec<Bson> = Vec::new();
        for doc in snapshot.docs.values().filter(|doc| expr.matches(doc)) {
            for value in path::resolve(doc, field) {
                let values = match value {
                    Bson::Array(items) => items.iter().collect(),
                    other => vec![other],
                };
                for v in values {
                    if !out.iter().any(|seen| values_equal(seen, v)) {
                        out.push(v.clone());
                    }
                }
            }
        }
        Ok(out)
    }
}

/// Lazily walk a snapshot in natural order, resuming after the last
/// sequence number handed out on each pull.
fn scan(
    snapshot: Arc<CollectionData>,
    filter: Expression,
) -> impl futures::Stream<Item = Result<Document, StoreError>> + Send + 'static {
    stream::unfold(
        (snapshot, filter, Bound::Unbounded),
        |(snapshot, filter, from)| async move {
            let (seq, doc) = snapshot
                .docs
                .range((from, Bound::Unbounded))
                .find(|(_, doc)| filter.matches(doc))
                .map(|(seq, doc)| (*seq, doc.clone()))?;
            Some((Ok(doc), (snapshot, filter, Bound::Excluded(seq))))
        },
    )
}

fn compare_by_sort(a: &Document, b: &Document, sort: &[(String, SortDirection)]) -> std::cmp::Ordering {
    let null = Bson::Null;
    for (field, direction) in sort {
        let left = path::get(a, field).unwrap_or(&null);
        let right = path::get(b, field).unwrap_or(&null);
        let ord = match direction {
            SortDirection::Asc => compare_values(left, right),
            SortDirection::Desc => compare_values(right, left),
        };
        if ord.is_ne() {
            return ord;
        }
    }
    std::cmp::Ordering::Equal
}

/// Starting document for an upsert: the filter's equality conditions.
fn seed_from_filter(expr: &Expression) -> Result<Document, StoreError> {
    let mut seed = Document::new();
    for (field, value) in expr.equality_fields() {
        path::set(&mut seed, field, value.clone()).map_err(StoreError::InvalidUpdate)?;
    }
    Ok(seed)
}

fn apply_update(data: &mut CollectionData, seq: u64, update: &Update) -> Result<bool, StoreError> {
    let Some(existing) = data.docs.get(&seq) else {
        return Ok(false);
    };
    let mut doc = existing.clone();
    let changed = update
        .apply(&mut doc, false)
        .map_err(|e| StoreError::InvalidUpdate(e.0))?;
    if changed {
        data.docs.insert(seq, doc);
    }
    Ok(changed)
}

fn upserted(id: Bson) -> UpdateResult {
    UpdateResult {
        acknowledged: true,
        matched_count: 0,
        modified_count: 0,
        upserted_count: 1,
        upserted_id: Some(id),
    }
}

fn to_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

impl DocumentStore for MemoryStore {
    fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> impl Future<Output = Result<DocumentCursor, StoreError>> + Send {
        ready(self.open_cursor(collection, &filter, &options))
    }

    fn insert_one(
        &self,
        collection: &str,
        document: Document,
    ) -> impl Future<Output = Result<InsertOneResult, StoreError>> + Send {
        ready(self.write(collection, |data| {
            let inserted_id = data.insert(document)?;
            Ok(InsertOneResult {
                acknowledged: true,
                inserted_id,
            })
        }))
    }

    /// All-or-nothing: a duplicate anywhere in the batch inserts nothing.
    fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> impl Future<Output = Result<InsertManyResult, StoreError>> + Send {
        ready(self.write(collection, |data| {
            let inserted_ids = documents
                .into_iter()
                .map(|doc| data.insert(doc))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(InsertManyResult {
                acknowledged: true,
                inserted_count: inserted_ids.len() as u64,
                inserted_ids,
            })
        }))
    }

    fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> impl Future<Output = Result<UpdateResult, StoreError>> + Send {
        ready(self.update(collection, &filter, update, options, false))
    }

    fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> impl Future<Output = Result<UpdateResult, StoreError>> + Send {
        ready(self.update(collection, &filter, update, options, true))
    }

    fn replace_one(
        &self,
        collection: &str,
        filter: Document,
        replacement: Document,
        options: UpdateOptions,
    ) -> impl Future<Output = Result<UpdateResult, StoreError>> + Send {
        ready(self.replace(collection, &filter, replacement, options))
    }

    fn delete_one(
        &self,
        collection: &str,
        filter: Document,
    ) -> impl Future<Output = Result<DeleteResult, StoreError>> + Send {
        ready(self.delete(collection, &filter, false))
    }

    fn delete_many(
        &self,
        collection: &str,
        filter: Document,
    ) -> impl Future<Output = Result<DeleteResult, StoreError>> + Send {
        ready(self.delete(collection, &filter, true))
    }

    fn count_documents(
        &self,
        collection: &str,
        filter: Document,
        options: CountOptions,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send {
        ready(self.count(collection, &filter, options))
    }

    fn estimated_document_count(
        &self,
        collection: &str,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send {
        ready(self.snapshot(collection).map(|data| data.docs.len() as u64))
    }

    fn distinct(
        &self,
        collection: &str,
        field: &str,
        filter: Document,
    ) -> impl Future<Output = Result<Vec<Bson>, StoreError>> + Send {
        ready(self.distinct_values(collection, field, &filter))
    }
}
