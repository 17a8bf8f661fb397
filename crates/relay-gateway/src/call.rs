use bson::{Bson, Document};
use futures::TryStreamExt;
use relay_protocol::{
    CountOptions, FindOptions, OperationFamily, OperationName, QueryRequest, UpdateOptions, results,
};
use relay_store::{DocumentCursor, DocumentStore};

use crate::error::OperationError;

/// Decode and execute a buffered operation.
pub(crate) async fn run<S: DocumentStore>(
    store: &S,
    collection: &str,
    op: OperationName,
    payload: Option<Bson>,
) -> Result<Bson, OperationError> {
    Call::decode(op, payload)?.execute(store, collection).await
}

/// Decode a stream request and open its cursor.
pub(crate) async fn open_stream<S: DocumentStore>(
    store: &S,
    collection: &str,
    op: OperationName,
    payload: Option<Bson>,
) -> Result<DocumentCursor, OperationError> {
    match Call::decode(op, payload)? {
        Call::FindStream { filter, options } => Ok(store.find(collection, filter, options).await?),
        _ => Err(OperationError::arguments(op, "operation does not stream")),
    }
}

/// A resolved operation with its arguments decoded into typed form.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Find { filter: Document, options: FindOptions },
    FindOne { filter: Document, options: FindOptions },
    FindToArray { filter: Document, options: FindOptions },
    FindStream { filter: Document, options: FindOptions },
    InsertOne(Document),
    InsertMany(Vec<Document>),
    UpdateOne { filter: Document, update: Document, options: UpdateOptions },
    UpdateMany { filter: Document, update: Document, options: UpdateOptions },
    ReplaceOne { filter: Document, replacement: Document, options: UpdateOptions },
    DeleteOne(Document),
    DeleteMany(Document),
    CountDocuments { filter: Document, options: CountOptions },
    EstimatedDocumentCount,
    Distinct { field: String, filter: Document },
}

impl Call {
    /// Decode the request payload according to the operation's family and
    /// positional contract.
    pub(crate) fn decode(op: OperationName, payload: Option<Bson>) -> Result<Self, OperationError> {
        match op.family() {
            OperationFamily::Query | OperationFamily::Stream => {
                let request = match payload {
                    None | Some(Bson::Null) => QueryRequest::default(),
                    Some(Bson::Document(doc)) => QueryRequest::from_document(&doc)
                        .map_err(|e| OperationError::arguments(op, e.to_string()))?,
                    Some(_) => {
                        return Err(OperationError::arguments(
                            op,
                            "body must be a { filter, opts } document",
                        ));
                    }
                };
                let QueryRequest { filter, options } = request;
                Ok(match op {
                    OperationName::FindStream => Call::FindStream { filter, options },
                    _ => Call::FindToArray { filter, options },
                })
            }
            OperationFamily::Positional => {
                let args = match payload {
                    None | Some(Bson::Null) => Vec::new(),
                    Some(Bson::Array(args)) => args,
                    Some(_) => {
                        return Err(OperationError::arguments(
                            op,
                            "body must be an array of positional arguments",
                        ));
                    }
                };
                let arity = op.arity();
                if !arity.accepts(args.len()) {
                    return Err(OperationError::arguments(
                        op,
                        format!("expected {arity} arguments, got {}", args.len()),
                    ));
                }
                Args { op, args }.into_call()
            }
        }
    }

    /// Run a buffered call and produce the value for its `$result`.
    pub(crate) async fn execute<S: DocumentStore>(
        self,
        store: &S,
        collection: &str,
    ) -> Result<Bson, OperationError> {
        let value = match self {
            Call::Find { filter, options }
            | Call::FindToArray { filter, options }
            | Call::FindStream { filter, options } => {
                let docs: Vec<Document> = store
                    .find(collection, filter, options)
                    .await?
                    .try_collect()
                    .await?;
                Bson::Array(docs.into_iter().map(Bson::Document).collect())
            }
            Call::FindOne { filter, options } => store
                .find_one(collection, filter, options)
                .await?
                .map_or(Bson::Null, Bson::Document),
            Call::InsertOne(doc) => encode(&store.insert_one(collection, doc).await?)?,
            Call::InsertMany(docs) => encode(&store.insert_many(collection, docs).await?)?,
            Call::UpdateOne { filter, update, options } => {
                encode(&store.update_one(collection, filter, update, options).await?)?
            }
            Call::UpdateMany { filter, update, options } => {
                encode(&store.update_many(collection, filter, update, options).await?)?
            }
            Call::ReplaceOne { filter, replacement, options } => {
                encode(&store.replace_one(collection, filter, replacement, options).await?)?
            }
            Call::DeleteOne(filter) => encode(&store.delete_one(collection, filter).await?)?,
            Call::DeleteMany(filter) => encode(&store.delete_many(collection, filter).await?)?,
            Call::CountDocuments { filter, options } => {
                count(store.count_documents(collection, filter, options).await?)
            }
            Call::EstimatedDocumentCount => count(store.estimated_document_count(collection).await?),
            Call::Distinct { field, filter } => {
                Bson::Array(store.distinct(collection, &field, filter).await?)
            }
        };
        Ok(value)
    }
}

fn encode<T: serde::Serialize>(result: &T) -> Result<Bson, OperationError> {
    results::to_bson(result).map_err(OperationError::Encode)
}

fn count(n: u64) -> Bson {
    match i32::try_from(n) {
        Ok(small) => Bson::Int32(small),
        Err(_) => Bson::Int64(i64::try_from(n).unwrap_or(i64::MAX)),
    }
}

/// Positional arguments of one call, consumed left to right.
struct Args {
    op: OperationName,
    args: Vec<Bson>,
}

impl Args {
    fn into_call(self) -> Result<Call, OperationError> {
        let op = self.op;
        let mut args = self.args.into_iter();
        let mut next = move || args.next();

        Ok(match op {
            OperationName::Find | OperationName::FindOne => {
                let filter = optional_document(op, "filter", next())?;
                let options = match optional_document(op, "options", next())? {
                    doc if doc.is_empty() => FindOptions::default(),
                    doc => FindOptions::from_document(&doc)
                        .map_err(|e| OperationError::arguments(op, e.to_string()))?,
                };
                match op {
                    OperationName::Find => Call::Find { filter, options },
                    _ => Call::FindOne { filter, options },
                }
            }
            OperationName::InsertOne => Call::InsertOne(required_document(op, "document", next())?),
            OperationName::InsertMany => match next() {
                Some(Bson::Array(items)) => Call::InsertMany(
                    items
                        .into_iter()
                        .map(|item| required_document(op, "documents[]", Some(item)))
                        .collect::<Result<_, _>>()?,
                ),
                _ => return Err(OperationError::arguments(op, "documents must be an array")),
            },
            OperationName::UpdateOne | OperationName::UpdateMany | OperationName::ReplaceOne => {
                let filter = optional_document(op, "filter", next())?;
                let second = required_document(op, "update", next())?;
                let options = UpdateOptions::from_document(&optional_document(op, "options", next())?)
                    .map_err(|e| OperationError::arguments(op, e.to_string()))?;
                match op {
                    OperationName::UpdateOne => Call::UpdateOne { filter, update: second, options },
                    OperationName::UpdateMany => Call::UpdateMany { filter, update: second, options },
                    _ => Call::ReplaceOne { filter, replacement: second, options },
                }
            }
            OperationName::DeleteOne => Call::DeleteOne(required_document(op, "filter", next())?),
            OperationName::DeleteMany => Call::DeleteMany(required_document(op, "filter", next())?),
            OperationName::CountDocuments => {
                let filter = optional_document(op, "filter", next())?;
                let options = CountOptions::from_document(&optional_document(op, "options", next())?)
                    .map_err(|e| OperationError::arguments(op, e.to_string()))?;
                Call::CountDocuments { filter, options }
            }
            OperationName::EstimatedDocumentCount => {
                // Options such as maxTimeMS are accepted and ignored.
                optional_document(op, "options", next())?;
                Call::EstimatedDocumentCount
            }
            OperationName::Distinct => {
                let field = match next() {
                    Some(Bson::String(field)) if !field.is_empty() => field,
                    _ => {
                        return Err(OperationError::arguments(
                            op,
                            "field must be a non-empty string",
                        ));
                    }
                };
                let filter = optional_document(op, "filter", next())?;
                Call::Distinct { field, filter }
            }
            OperationName::FindToArray | OperationName::FindStream => {
                return Err(OperationError::arguments(op, "takes a { filter, opts } body"));
            }
        })
    }
}

fn required_document(op: OperationName, what: &str, arg: Option<Bson>) -> Result<Document, OperationError> {
    match arg {
        Some(Bson::Document(doc)) => Ok(doc),
        _ => Err(OperationError::arguments(op, format!("{what} must be a document"))),
    }
}

/// Absent and null arguments read as an empty document.
fn optional_document(op: OperationName, what: &str, arg: Option<Bson>) -> Result<Document, OperationError> {
    match arg {
        None | Some(Bson::Null) => Ok(Document::new()),
        other => required_document(op, what, other),
    }
}
