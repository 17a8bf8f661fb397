use std::time::Duration;

use bson::{Bson, Document};
use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use relay_protocol::{
    BEARER_HEADER, COLLECTION_PARAM, Codec, OPERATION_PARAM, OperationName, RecordDecoder,
};
use reqwest::Response;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::error::RelayError;

/// Documents of a streamed find, decoded as they arrive.
pub type RecordStream = BoxStream<'static, Result<Document, RelayError>>;

/// Overrides for the requests sent through one collection handle.
///
/// Headers are merged over the client's defaults; a timeout replaces the
/// client's.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: HeaderMap,
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

pub(crate) struct Transport {
    pub(crate) http: reqwest::Client,
    pub(crate) endpoint: Url,
    pub(crate) password: String,
    pub(crate) codec: Codec,
}

impl Transport {
    fn url(&self, op: OperationName, collection: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair(COLLECTION_PARAM, collection)
            .append_pair(OPERATION_PARAM, op.as_str());
        url
    }

    async fn send(
        &self,
        op: OperationName,
        collection: &str,
        payload: &Bson,
        options: &RequestOptions,
    ) -> Result<Response, RelayError> {
        tracing::debug!(op = %op, coll = collection, "relaying operation");
        let body = self.codec.encode(payload)?;
        let mut request = self
            .http
            .post(self.url(op, collection))
            .header(BEARER_HEADER, self.password.as_str())
            .header(CONTENT_TYPE, self.codec.content_type())
            .headers(options.headers.clone())
            .body(body);
        if !op.is_read_only() {
            request = request.header(CACHE_CONTROL, "no-store");
        }
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }
        check_status(request.send().await?).await
    }

    /// Send a buffered operation and unwrap its envelope.
    pub(crate) async fn call(
        &self,
        op: OperationName,
        collection: &str,
        payload: &Bson,
        options: &RequestOptions,
    ) -> Result<Bson, RelayError> {
        let response = self.send(op, collection, payload, options).await?;
        let codec = match content_type(&response) {
            Some(ct) => Codec::from_content_type(&ct).ok_or_else(|| {
                RelayError::UnexpectedResult(format!("unexpected content-type {ct}"))
            })?,
            None => self.codec,
        };
        let bytes = response.bytes().await?;
        Ok(codec.decode_envelope(&bytes)?.into_result()?)
    }

    /// Send a streaming operation. A buffered reply means the stream never
    /// started, and carries the reason in its envelope.
    pub(crate) async fn open_stream(
        &self,
        op: OperationName,
        collection: &str,
        payload: &Bson,
        options: &RequestOptions,
    ) -> Result<RecordStream, RelayError> {
        let response = self.send(op, collection, payload, options).await?;
        let ct = content_type(&response).unwrap_or_default();
        if let Some(codec) = Codec::from_stream_content_type(&ct) {
            return Ok(records(response, codec));
        }
        let Some(codec) = Codec::from_content_type(&ct) else {
            return Err(RelayError::UnexpectedResult(format!(
                "expected a record stream, got content-type {ct:?}"
            )));
        };
        let bytes = response.bytes().await?;
        match codec.decode_envelope(&bytes)?.into_result() {
            Err(e) => Err(RelayError::Operation(e)),
            Ok(value) => Err(RelayError::UnexpectedResult(format!(
                "expected a record stream, got a buffered result: {value}"
            ))),
        }
    }
}

async fn check_status(response: Response) -> Result<Response, RelayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RelayError::Transport { status, body })
}

fn content_type(response: &Response) -> Option<String> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

struct StreamState {
    body: BoxStream<'static, Result<Bytes, RelayError>>,
    decoder: RecordDecoder,
}

/// Decode records from the body as chunks arrive. Dropping the stream
/// drops the connection, which stops the gateway pulling from its cursor.
fn records(response: Response, codec: Codec) -> RecordStream {
    let state = StreamState {
        body: response
            .bytes_stream()
            .map_err(|e| RelayError::StreamInterrupted(e.to_string()))
            .boxed(),
        decoder: RecordDecoder::new(codec),
    };
    stream::try_unfold(state, next_record).boxed()
}

async fn next_record(
    mut state: StreamState,
) -> Result<Option<(Document, StreamState)>, RelayError> {
    loop {
        if let Some(doc) = state.decoder.next_record()? {
            return Ok(Some((doc, state)));
        }
        match state.body.next().await {
            Some(chunk) => state.decoder.push(&chunk?),
            None => {
                // A body that ends inside a record was cut off mid-stream.
                state
                    .decoder
                    .finish()
                    .map_err(|e| RelayError::StreamInterrupted(e.to_string()))?;
                return Ok(None);
            }
        }
    }
}
