use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::Bytes;
use futures::FutureExt;
use http::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use http::{Request, Response, StatusCode};
use relay_protocol::{BEARER_HEADER, Codec, Envelope, OperationName};
use relay_store::DocumentStore;

use crate::body::RelayBody;
use crate::call;
use crate::config::GatewayConfig;
use crate::error::{AuthenticationError, ConfigError, OperationError, ProtocolError};
use crate::request::RelayRequest;
use crate::stream::record_stream;
use crate::wrap::{panic_message, wrap};

/// Executes relayed operations against a shared [`DocumentStore`].
///
/// Cheap to clone; clones share the store and credential.
pub struct Gateway<S> {
    inner: Arc<Inner<S>>,
}

struct Inner<S> {
    store: S,
    password: String,
}

impl<S> Clone for Gateway<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: DocumentStore> Gateway<S> {
    /// Fails when the config carries no usable credential.
    pub fn new(store: S, config: GatewayConfig) -> Result<Self, ConfigError> {
        let password = config.into_credential()?;
        Ok(Self {
            inner: Arc::new(Inner { store, password }),
        })
    }

    /// Like [`Gateway::new`], reading the credential from `RELAY_PASSWORD`.
    pub fn from_env(store: S) -> Result<Self, ConfigError> {
        Self::new(store, GatewayConfig::from_env())
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    /// Handle one relay request end to end. Never fails: every outcome is
    /// expressed as a response.
    pub async fn handle(&self, req: Request<Bytes>) -> Response<RelayBody> {
        if let Err(e) = self.authenticate(req.headers()) {
            tracing::warn!(method = %req.method(), "rejected request: {e}");
            return text_response(StatusCode::UNAUTHORIZED, e.to_string());
        }

        let request = match RelayRequest::parse(&req) {
            Ok(r) => r,
            Err(e) => return protocol_error_response(&e),
        };
        drop(req);

        let op = match request.op.parse::<OperationName>() {
            Ok(op) => op,
            Err(e) => {
                tracing::debug!(op = %e.0, coll = %request.collection, "unknown operation");
                return envelope_response(request.codec, &Envelope::unknown_operation(&e.0));
            }
        };
        tracing::debug!(op = %op, coll = %request.collection, "dispatching");

        let RelayRequest {
            collection,
            codec,
            payload,
            ..
        } = request;

        if op == OperationName::FindStream {
            return self.stream(op, collection, codec, payload).await;
        }

        let envelope = wrap(call::run(&self.inner.store, &collection, op, payload)).await;
        envelope_response(codec, &envelope)
    }

    fn authenticate(&self, headers: &HeaderMap) -> Result<(), AuthenticationError> {
        match headers.get(BEARER_HEADER) {
            Some(value) if value.as_bytes() == self.inner.password.as_bytes() => Ok(()),
            _ => Err(AuthenticationError),
        }
    }

    /// Open the cursor first so that bad arguments or an unopenable cursor
    /// still get a buffered `$error` envelope. Only then switch to streaming.
    async fn stream(
        &self,
        op: OperationName,
        collection: String,
        codec: Codec,
        payload: Option<bson::Bson>,
    ) -> Response<RelayBody> {
        let opened = AssertUnwindSafe(call::open_stream(&self.inner.store, &collection, op, payload))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(OperationError::Panic(panic_message(panic.as_ref()))));

        match opened {
            Ok(cursor) => {
                let body = RelayBody::Stream(record_stream(cursor, codec, collection));
                with_content_type(StatusCode::OK, codec.stream_content_type(), body)
            }
            Err(e) => envelope_response(codec, &Envelope::Error(e.to_remote())),
        }
    }
}

fn envelope_response(codec: Codec, envelope: &Envelope) -> Response<RelayBody> {
    let encoded = codec.encode_envelope(envelope).or_else(|e| {
        tracing::error!(error = %e, "envelope could not be encoded");
        let fallback = Envelope::Error(OperationError::Encode(e).to_remote());
        codec.encode_envelope(&fallback)
    });

    match encoded {
        Ok(bytes) => {
            with_content_type(StatusCode::OK, codec.content_type(), Bytes::from(bytes).into())
        }
        Err(e) => {
            tracing::error!(error = %e, "error envelope could not be encoded");
            text_response(StatusCode::INTERNAL_SERVER_ERROR, "response could not be encoded")
        }
    }
}

/// The plain-text response for a request that never reached dispatch.
pub fn protocol_error_response(e: &ProtocolError) -> Response<RelayBody> {
    tracing::warn!(status = %e.status_code(), "protocol error: {e}");
    text_response(e.status_code(), e.to_string())
}

fn text_response(status: StatusCode, message: impl Into<String>) -> Response<RelayBody> {
    let body = Bytes::from(message.into()).into();
    with_content_type(status, "text/plain; charset=utf-8", body)
}

fn with_content_type(
    status: StatusCode,
    content_type: &'static str,
    body: RelayBody,
) -> Response<RelayBody> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
