mod compare;
mod error;
mod filter;
mod memory;
mod mutation;
mod path;
mod projection;
mod store;

pub use error::StoreError;
pub use filter::{Expression, FilterParseError, parse_filter};
pub use memory::MemoryStore;
pub use mutation::{FieldUpdate, Update, UpdateError, UpdateOp, parse_update};
pub use store::{DocumentCursor, DocumentStore};
