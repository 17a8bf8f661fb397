use relay_protocol::{CodecError, RemoteError};
use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The gateway answered with a non-2xx status. Checked before any
    /// attempt to read the body as an envelope.
    #[error("gateway responded {status}: {body}")]
    Transport { status: StatusCode, body: String },
    /// The operation ran and failed; the gateway's error, reconstructed.
    #[error(transparent)]
    Operation(#[from] RemoteError),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// The record stream ended abnormally. Records already yielded are
    /// valid, but the result is incomplete.
    #[error("record stream interrupted: {0}")]
    StreamInterrupted(String),
    #[error("unexpected result: {0}")]
    UnexpectedResult(String),
    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl RelayError {
    /// Name of the remote error, for operation failures.
    pub fn remote_name(&self) -> Option<&str> {
        match self {
            RelayError::Operation(e) => Some(e.name()),
            _ => None,
        }
    }
}
