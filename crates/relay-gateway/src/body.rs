use std::fmt;

use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream};
use futures::StreamExt;

use crate::error::StreamError;

/// Response body produced by the gateway: a complete buffer, or a record
/// stream pulled chunk by chunk by the transport.
pub enum RelayBody {
    Full(Bytes),
    Stream(BoxStream<'static, Result<Bytes, StreamError>>),
}

impl RelayBody {
    pub fn empty() -> Self {
        RelayBody::Full(Bytes::new())
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, RelayBody::Stream(_))
    }

    /// View either variant as a stream of chunks.
    pub fn into_stream(self) -> BoxStream<'static, Result<Bytes, StreamError>> {
        match self {
            RelayBody::Full(bytes) => stream::once(async move { Ok(bytes) }).boxed(),
            RelayBody::Stream(s) => s,
        }
    }

    /// Drain the body into one buffer, stopping at the first stream error.
    pub async fn collect(self) -> Result<Bytes, StreamError> {
        match self {
            RelayBody::Full(bytes) => Ok(bytes),
            RelayBody::Stream(mut s) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = s.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(buf.freeze())
            }
        }
    }
}

impl From<Bytes> for RelayBody {
    fn from(bytes: Bytes) -> Self {
        RelayBody::Full(bytes)
    }
}

impl fmt::Debug for RelayBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayBody::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            RelayBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}
