use http::{Method, StatusCode};
use relay_protocol::{CodecError, OperationName, RemoteError};
use relay_store::StoreError;

/// Gateway construction failed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no relay password configured; pass one explicitly or set RELAY_PASSWORD")]
    MissingCredential,
}

/// The `bearer` header was missing or did not match.
#[derive(Debug, thiserror::Error)]
#[error("Unauthorized")]
pub struct AuthenticationError;

/// A request the gateway cannot interpret. Answered with a non-2xx status
/// and a plain-text body; never reaches the store.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("method {0} not allowed; use GET or POST")]
    MethodNotAllowed(Method),
    #[error("missing query parameter: {0}")]
    MissingParameter(&'static str),
    #[error("unsupported content-type: {0}")]
    UnsupportedContentType(String),
    #[error("malformed request body: {0}")]
    MalformedBody(#[from] CodecError),
    #[error("request body could not be read: {0}")]
    BodyRead(String),
}

impl ProtocolError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProtocolError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ProtocolError::UnsupportedContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ProtocolError::MissingParameter(_)
            | ProtocolError::MalformedBody(_)
            | ProtocolError::BodyRead(_) => StatusCode::BAD_REQUEST,
        }
    }
}

/// A known operation that failed. Travels to the client inside a `$error`
/// envelope with HTTP 200.
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid arguments for {op}: {message}")]
    InvalidArguments { op: OperationName, message: String },
    #[error("result could not be encoded")]
    Encode(#[source] CodecError),
    #[error("operation panicked: {0}")]
    Panic(String),
}

impl OperationError {
    pub(crate) fn arguments(op: OperationName, message: impl Into<String>) -> Self {
        OperationError::InvalidArguments {
            op,
            message: message.into(),
        }
    }

    /// Error name carried in the envelope.
    pub fn name(&self) -> &str {
        match self {
            OperationError::Store(e) => e.name(),
            OperationError::InvalidArguments { .. } => "InvalidArgumentsError",
            OperationError::Encode(_) => "CodecError",
            OperationError::Panic(_) => "Panic",
        }
    }

    pub fn to_remote(&self) -> RemoteError {
        RemoteError::from_error(self.name(), self)
    }
}

/// A failure after a record stream has started. The response body is
/// aborted; there is no channel left to report it to the client.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("cursor failed mid-stream")]
    Cursor(#[source] StoreError),
    #[error("record could not be encoded")]
    Encode(#[source] CodecError),
}
