//! Wire-level pieces shared by the relay gateway and client: the value
//! encodings, result envelopes, record framing and the operation table.

mod codec;
mod envelope;
mod error;
mod framing;
mod operation;
mod options;
pub mod results;
pub mod value;

pub use bson;

pub use codec::{
    BSON_CONTENT_TYPE, BSON_STREAM_CONTENT_TYPE, Codec, JSON_CONTENT_TYPE, NDJSON_CONTENT_TYPE,
};
pub use envelope::{ERROR_KEY, Envelope, RESULT_KEY, RemoteError};
pub use error::{CodecError, OptionsError};
pub use framing::RecordDecoder;
pub use operation::{Arity, OperationFamily, OperationName, UnknownOperation};
pub use options::{CountOptions, FindOptions, QueryRequest, SortDirection, UpdateOptions};
pub use results::{DeleteResult, InsertManyResult, InsertOneResult, UpdateResult};

/// Query parameter naming the operation.
pub const OPERATION_PARAM: &str = "op";
/// Query parameter naming the target collection.
pub const COLLECTION_PARAM: &str = "coll";
/// Request header carrying the shared secret.
pub const BEARER_HEADER: &str = "bearer";
/// Environment variable holding the shared secret on both ends.
pub const PASSWORD_ENV: &str = "RELAY_PASSWORD";
