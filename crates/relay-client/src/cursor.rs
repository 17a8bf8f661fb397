use bson::{Bson, Document};
use relay_protocol::{FindOptions, OperationName, QueryRequest, SortDirection};

use crate::collection::{Collection, unexpected};
use crate::error::RelayError;
use crate::transport::RecordStream;

/// A pending query. Modifiers consume the cursor and return an updated one,
/// so a clone taken earlier keeps its own modifiers. Consuming methods send
/// whatever the cursor holds at that point and may be called repeatedly.
#[derive(Clone)]
pub struct Cursor {
    collection: Collection,
    query: QueryRequest,
}

impl Cursor {
    pub(crate) fn new(collection: Collection, filter: Document) -> Self {
        Self {
            collection,
            query: QueryRequest {
                filter,
                options: FindOptions::default(),
            },
        }
    }

    /// Add a sort key. Keys apply in the order they were added.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query
            .options
            .sort
            .get_or_insert_with(Document::new)
            .insert(field.into(), direction.to_bson());
        self
    }

    /// Zero means no limit.
    pub fn limit(mut self, limit: u64) -> Self {
        self.query.options.limit = (limit > 0).then_some(limit);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.query.options.skip = Some(skip);
        self
    }

    pub fn project(mut self, projection: Document) -> Self {
        self.query.options.projection = Some(projection);
        self
    }

    pub fn filter(&self) -> &Document {
        &self.query.filter
    }

    pub fn options(&self) -> &FindOptions {
        &self.query.options
    }

    /// Fetch every matching document in one buffered response.
    pub async fn to_array(&self) -> Result<Vec<Document>, RelayError> {
        let value = self
            .collection
            .transport()
            .call(
                OperationName::FindToArray,
                self.collection.name(),
                &self.payload(),
                self.collection.request_options(),
            )
            .await?;
        let items = match value {
            Bson::Array(items) => items,
            other => return Err(unexpected("an array of documents", &other)),
        };
        items
            .into_iter()
            .map(|item| match item {
                Bson::Document(doc) => Ok(doc),
                other => Err(unexpected("a document", &other)),
            })
            .collect()
    }

    /// Stream matching documents one record at a time.
    ///
    /// Errors raised before the gateway starts streaming (a bad filter, for
    /// one) come back from this call. A failure after that ends the stream
    /// with [`RelayError::StreamInterrupted`] when the transport notices it;
    /// a stream cut exactly between records looks complete.
    pub async fn stream(&self) -> Result<RecordStream, RelayError> {
        self.collection
            .transport()
            .open_stream(
                OperationName::FindStream,
                self.collection.name(),
                &self.payload(),
                self.collection.request_options(),
            )
            .await
    }

    fn payload(&self) -> Bson {
        Bson::Document(self.query.to_document())
    }
}
