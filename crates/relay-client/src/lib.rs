//! Client for a relay gateway, shaped like a document database driver:
//! [`RelayClient`] → [`Database`] → [`Collection`] → [`Cursor`].
//!
//! ```no_run
//! # async fn demo() -> Result<(), relay_client::RelayError> {
//! use relay_client::{RelayClient, SortDirection};
//! use relay_client::bson::doc;
//!
//! let client = RelayClient::new("http://localhost:8080/", "s3cret")?;
//! let accounts = client.db("crm").collection("accounts");
//! accounts.insert_one(doc! { "name": "Acme", "revenue": 50_000 }).await?;
//! let top = accounts
//!     .find(doc! {})
//!     .sort("revenue", SortDirection::Desc)
//!     .limit(10)
//!     .to_array()
//!     .await?;
//! # let _ = top;
//! # Ok(())
//! # }
//! ```

mod client;
mod collection;
mod cursor;
mod database;
mod error;
mod transport;

pub use bson;
pub use client::{ClientBuilder, RelayClient};
pub use collection::Collection;
pub use cursor::Cursor;
pub use database::Database;
pub use error::RelayError;
pub use relay_protocol::{
    Codec, CountOptions, DeleteResult, FindOptions, InsertManyResult, InsertOneResult,
    RemoteError, SortDirection, UpdateOptions, UpdateResult,
};
pub use transport::{RecordStream, RequestOptions};
