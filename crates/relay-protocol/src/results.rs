//! Write-operation acknowledgements, shaped the way document database drivers report them.

use bson::Bson;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::CodecError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOneResult {
    pub acknowledged: bool,
    pub inserted_id: Bson,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertManyResult {
    pub acknowledged: bool,
    pub inserted_count: u64,
    pub inserted_ids: Vec<Bson>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upserted_id: Option<Bson>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

/// Convert a result struct into the value carried by a `$result` envelope.
pub fn to_bson<T: Serialize>(result: &T) -> Result<Bson, CodecError> {
    Ok(bson::serialize_to_bson(result)?)
}

/// Read a `$result` value back into a result struct.
pub fn from_bson<T: DeserializeOwned>(value: Bson) -> Result<T, CodecError> {
    Ok(bson::deserialize_from_bson(value)?)
}
