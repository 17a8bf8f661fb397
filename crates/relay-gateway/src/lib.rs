//! Server side of the relay: authenticates requests, decodes operations,
//! runs them against a [`DocumentStore`](relay_store::DocumentStore) and
//! answers with an envelope or a record stream.
//!
//! The gateway works on `http` types with a [`Bytes`](bytes::Bytes) request
//! body; adapting a particular server is left to the caller.

mod body;
mod call;
mod config;
mod error;
mod gateway;
mod request;
mod stream;
mod wrap;

pub use body::RelayBody;
pub use config::GatewayConfig;
pub use error::{AuthenticationError, ConfigError, OperationError, ProtocolError, StreamError};
pub use gateway::{Gateway, protocol_error_response};
pub use wrap::wrap;
