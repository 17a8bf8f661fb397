use std::sync::Arc;

use bson::{Bson, Document};
use relay_protocol::results;
use relay_protocol::{
    CountOptions, DeleteResult, FindOptions, InsertManyResult, InsertOneResult, OperationName,
    UpdateOptions, UpdateResult,
};
use serde::de::DeserializeOwned;

use crate::cursor::Cursor;
use crate::error::RelayError;
use crate::transport::{RequestOptions, Transport};

/// Operation methods for one collection. Holds no state besides its name
/// and request options; every call is a round trip.
#[derive(Clone)]
pub struct Collection {
    name: Arc<str>,
    transport: Arc<Transport>,
    options: RequestOptions,
}

impl Collection {
    pub(crate) fn new(name: &str, transport: Arc<Transport>) -> Self {
        Self {
            name: Arc::from(name),
            transport,
            options: RequestOptions::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A handle whose requests carry `options`. The original is unaffected.
    pub fn with_options(&self, options: RequestOptions) -> Self {
        Self {
            options,
            ..self.clone()
        }
    }

    /// Start a query. Nothing is sent until the cursor is consumed.
    pub fn find(&self, filter: Document) -> Cursor {
        Cursor::new(self.clone(), filter)
    }

    pub async fn find_one(&self, filter: Document) -> Result<Option<Document>, RelayError> {
        self.find_one_with(filter, FindOptions::default()).await
    }

    pub async fn find_one_with(
        &self,
        filter: Document,
        options: FindOptions,
    ) -> Result<Option<Document>, RelayError> {
        let args = vec![filter.into(), options.to_document().into()];
        match self.call(OperationName::FindOne, args).await? {
            Bson::Null => Ok(None),
            Bson::Document(doc) => Ok(Some(doc)),
            other => Err(unexpected("a document or null", &other)),
        }
    }

    pub async fn insert_one(&self, document: Document) -> Result<InsertOneResult, RelayError> {
        self.call_typed(OperationName::InsertOne, vec![document.into()])
            .await
    }

    pub async fn insert_many(
        &self,
        documents: Vec<Document>,
    ) -> Result<InsertManyResult, RelayError> {
        let docs = documents.into_iter().map(Bson::Document).collect();
        self.call_typed(OperationName::InsertMany, vec![Bson::Array(docs)])
            .await
    }

    pub async fn update_one(
        &self,
        filter: Document,
        update: Document,
        options: impl Into<Option<UpdateOptions>>,
    ) -> Result<UpdateResult, RelayError> {
        self.call_typed(OperationName::UpdateOne, update_args(filter, update, options.into()))
            .await
    }

    pub async fn update_many(
        &self,
        filter: Document,
        update: Document,
        options: impl Into<Option<UpdateOptions>>,
    ) -> Result<UpdateResult, RelayError> {
        self.call_typed(OperationName::UpdateMany, update_args(filter, update, options.into()))
            .await
    }

    pub async fn replace_one(
        &self,
        filter: Document,
        replacement: Document,
        options: impl Into<Option<UpdateOptions>>,
    ) -> Result<UpdateResult, RelayError> {
        let args = update_args(filter, replacement, options.into());
        self.call_typed(OperationName::ReplaceOne, args).await
    }

    pub async fn delete_one(&self, filter: Document) -> Result<DeleteResult, RelayError> {
        self.call_typed(OperationName::DeleteOne, vec![filter.into()])
            .await
    }

    pub async fn delete_many(&self, filter: Document) -> Result<DeleteResult, RelayError> {
        self.call_typed(OperationName::DeleteMany, vec![filter.into()])
            .await
    }

    pub async fn count_documents(
        &self,
        filter: Document,
        options: impl Into<Option<CountOptions>>,
    ) -> Result<u64, RelayError> {
        let mut args = vec![filter.into()];
        if let Some(options) = options.into() {
            args.push(options.to_document().into());
        }
        let count = self.call(OperationName::CountDocuments, args).await?;
        as_count(&count)
    }

    pub async fn estimated_document_count(&self) -> Result<u64, RelayError> {
        let count = self
            .call(OperationName::EstimatedDocumentCount, Vec::new())
            .await?;
        as_count(&count)
    }

    pub async fn distinct(&self, field: &str, filter: Document) -> Result<Vec<Bson>, RelayError> {
        let args = vec![field.into(), filter.into()];
        match self.call(OperationName::Distinct, args).await? {
            Bson::Array(values) => Ok(values),
            other => Err(unexpected("an array", &other)),
        }
    }

    pub(crate) fn request_options(&self) -> &RequestOptions {
        &self.options
    }

    pub(crate) fn transport(&self) -> &Transport {
        &self.transport
    }

    async fn call(&self, op: OperationName, args: Vec<Bson>) -> Result<Bson, RelayError> {
        self.transport
            .call(op, &self.name, &Bson::Array(args), &self.options)
            .await
    }

    async fn call_typed<T: DeserializeOwned>(
        &self,
        op: OperationName,
        args: Vec<Bson>,
    ) -> Result<T, RelayError> {
        let value = self.call(op, args).await?;
        Ok(results::from_bson(value)?)
    }
}

fn update_args(filter: Document, update: Document, options: Option<UpdateOptions>) -> Vec<Bson> {
    let mut args = vec![filter.into(), update.into()];
    if let Some(options) = options {
        args.push(options.to_document().into());
    }
    args
}

fn as_count(value: &Bson) -> Result<u64, RelayError> {
    let n = match value {
        Bson::Int32(n) => i64::from(*n),
        Bson::Int64(n) => *n,
        other => return Err(unexpected("a count", other)),
    };
    u64::try_from(n).map_err(|_| RelayError::UnexpectedResult(format!("negative count {n}")))
}

pub(crate) fn unexpected(expected: &str, got: &Bson) -> RelayError {
    RelayError::UnexpectedResult(format!("expected {expected}, got {got}"))
}
