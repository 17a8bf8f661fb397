//! Extended JSON form of [`Bson`] values.
//!
//! Plain JSON keeps null, booleans, strings, arrays, objects, 32-bit integers
//! and finite doubles. Everything else travels as a single-key object whose
//! key is a reserved tag:
//!
//! | kind | wire form |
//! |---|---|
//! | date | `{"$date": {"$numberLong": "<ms>"}}` |
//! | object id | `{"$oid": "<24 hex>"}` |
//! | 64-bit integer | `{"$numberLong": "<decimal>"}` |
//! | non-finite double | `{"$numberDouble": "NaN"}` |
//!
//! A document that itself has exactly one reserved key is wrapped as
//! `{"$doc": {...}}` so the decoder never mistakes it for a tagged scalar.

use bson::oid::ObjectId;
use bson::{Bson, DateTime, Document};
use serde_json::{Map, Number, Value as Json};

use crate::error::CodecError;

pub const DATE_TAG: &str = "$date";
pub const OID_TAG: &str = "$oid";
pub const LONG_TAG: &str = "$numberLong";
pub const DOUBLE_TAG: &str = "$numberDouble";
pub const ESCAPE_TAG: &str = "$doc";

const RESERVED_TAGS: [&str; 5] = [DATE_TAG, OID_TAG, LONG_TAG, DOUBLE_TAG, ESCAPE_TAG];

/// Encode a value into its extended JSON tree.
pub fn to_extended_json(value: &Bson) -> Result<Json, CodecError> {
    match value {
        Bson::Null => Ok(Json::Null),
        Bson::Boolean(b) => Ok(Json::Bool(*b)),
        Bson::Int32(i) => Ok(Json::from(*i)),
        Bson::Int64(i) => Ok(tagged(LONG_TAG, Json::String(i.to_string()))),
        Bson::Double(f) => Ok(double_to_json(*f)),
        Bson::String(s) => Ok(Json::String(s.clone())),
        Bson::Array(items) => items
            .iter()
            .map(to_extended_json)
            .collect::<Result<Vec<_>, _>>()
            .map(Json::Array),
        Bson::Document(doc) => document_to_json(doc),
        Bson::DateTime(dt) => Ok(tagged(
            DATE_TAG,
            tagged(LONG_TAG, Json::String(dt.timestamp_millis().to_string())),
        )),
        Bson::ObjectId(oid) => Ok(tagged(OID_TAG, Json::String(oid.to_hex()))),
        other => Err(CodecError::Unsupported(kind_name(other))),
    }
}

pub(crate) fn document_to_json(doc: &Document) -> Result<Json, CodecError> {
    let mut map = Map::with_capacity(doc.len());
    for (key, value) in doc {
        map.insert(key.clone(), to_extended_json(value)?);
    }

    let collides = doc.len() == 1 && doc.keys().next().is_some_and(|k| reserved_tag(k).is_some());
    if collides {
        Ok(tagged(ESCAPE_TAG, Json::Object(map)))
    } else {
        Ok(Json::Object(map))
    }
}

/// Decode an extended JSON tree back into a value.
pub fn from_extended_json(json: Json) -> Result<Bson, CodecError> {
    match json {
        Json::Null => Ok(Bson::Null),
        Json::Bool(b) => Ok(Bson::Boolean(b)),
        Json::Number(n) => Ok(number_to_bson(&n)),
        Json::String(s) => Ok(Bson::String(s)),
        Json::Array(items) => items
            .into_iter()
            .map(from_extended_json)
            .collect::<Result<Vec<_>, _>>()
            .map(Bson::Array),
        Json::Object(map) => object_to_bson(map),
    }
}

/// Reject any value (at any depth) the wire form cannot represent.
pub fn ensure_supported(value: &Bson) -> Result<(), CodecError> {
    match value {
        Bson::Null
        | Bson::Boolean(_)
        | Bson::Int32(_)
        | Bson::Int64(_)
        | Bson::Double(_)
        | Bson::String(_)
        | Bson::DateTime(_)
        | Bson::ObjectId(_) => Ok(()),
        Bson::Array(items) => items.iter().try_for_each(ensure_supported),
        Bson::Document(doc) => doc.values().try_for_each(ensure_supported),
        other => Err(CodecError::Unsupported(kind_name(other))),
    }
}

/// Human-readable name of a value's kind, used in error messages.
pub fn kind_name(value: &Bson) -> String {
    let name = match value {
        Bson::Double(_) => "double",
        Bson::String(_) => "string",
        Bson::Array(_) => "array",
        Bson::Document(_) => "document",
        Bson::Boolean(_) => "bool",
        Bson::Null => "null",
        Bson::RegularExpression(_) => "regex",
        Bson::JavaScriptCode(_) => "javascript",
        Bson::JavaScriptCodeWithScope(_) => "javascriptWithScope",
        Bson::Int32(_) => "int",
        Bson::Int64(_) => "long",
        Bson::Timestamp(_) => "timestamp",
        Bson::Binary(_) => "binData",
        Bson::ObjectId(_) => "objectId",
        Bson::DateTime(_) => "date",
        Bson::Symbol(_) => "symbol",
        Bson::Decimal128(_) => "decimal",
        Bson::Undefined => "undefined",
        Bson::MaxKey => "maxKey",
        Bson::MinKey => "minKey",
        Bson::DbPointer(_) => "dbPointer",
    };
    name.to_string()
}

fn tagged(tag: &str, payload: Json) -> Json {
    let mut map = Map::with_capacity(1);
    map.insert(tag.to_string(), payload);
    Json::Object(map)
}

fn reserved_tag(key: &str) -> Option<&'static str> {
    RESERVED_TAGS.iter().copied().find(|tag| *tag == key)
}

fn double_to_json(f: f64) -> Json {
    match Number::from_f64(f) {
        Some(n) => Json::Number(n),
        None => {
            let text = if f.is_nan() {
                "NaN"
            } else if f.is_sign_positive() {
                "Infinity"
            } else {
                "-Infinity"
            };
            tagged(DOUBLE_TAG, Json::String(text.to_string()))
        }
    }
}

fn number_to_bson(n: &Number) -> Bson {
    if let Some(i) = n.as_i64() {
        return match i32::try_from(i) {
            Ok(small) => Bson::Int32(small),
            Err(_) => Bson::Int64(i),
        };
    }
    // u64 beyond i64::MAX and every float land here.
    Bson::Double(n.as_f64().unwrap_or(f64::NAN))
}

fn object_to_bson(map: Map<String, Json>) -> Result<Bson, CodecError> {
    let tag = match map.len() {
        1 => map.keys().next().and_then(|k| reserved_tag(k)),
        _ => None,
    };

    match tag {
        Some(tag) => {
            let payload = map.into_iter().next().map(|(_, v)| v).unwrap_or(Json::Null);
            decode_tagged(tag, payload)
        }
        None => plain_document(map).map(Bson::Document),
    }
}

fn plain_document(map: Map<String, Json>) -> Result<Document, CodecError> {
    let mut doc = Document::new();
    for (key, value) in map {
        doc.insert(key, from_extended_json(value)?);
    }
    Ok(doc)
}

fn decode_tagged(tag: &'static str, payload: Json) -> Result<Bson, CodecError> {
    match tag {
        DATE_TAG => decode_date(payload).map(Bson::DateTime),
        OID_TAG => match payload {
            Json::String(hex) => ObjectId::parse_str(&hex)
                .map(Bson::ObjectId)
                .map_err(|e| invalid(OID_TAG, e.to_string())),
            _ => Err(invalid(OID_TAG, "expected a hex string")),
        },
        LONG_TAG => decode_long(&payload).map(Bson::Int64),
        DOUBLE_TAG => decode_double(&payload).map(Bson::Double),
        ESCAPE_TAG => match payload {
            Json::Object(inner) => plain_document(inner).map(Bson::Document),
            _ => Err(invalid(ESCAPE_TAG, "expected an object")),
        },
        _ => Err(invalid(tag, "unknown tag")),
    }
}

fn decode_date(payload: Json) -> Result<DateTime, CodecError> {
    match payload {
        Json::Object(map) => match map.get(LONG_TAG) {
            Some(long) if map.len() == 1 => decode_long(long).map(DateTime::from_millis),
            _ => Err(invalid(DATE_TAG, "expected {\"$numberLong\": ...}")),
        },
        Json::String(text) => {
            DateTime::parse_rfc3339_str(&text).map_err(|e| invalid(DATE_TAG, e.to_string()))
        }
        Json::Number(n) => n
            .as_i64()
            .map(DateTime::from_millis)
            .ok_or_else(|| invalid(DATE_TAG, "milliseconds must be an integer")),
        _ => Err(invalid(DATE_TAG, "unexpected payload")),
    }
}

fn decode_long(payload: &Json) -> Result<i64, CodecError> {
    match payload {
        Json::String(text) => text
            .parse::<i64>()
            .map_err(|e| invalid(LONG_TAG, e.to_string())),
        _ => Err(invalid(LONG_TAG, "expected a decimal string")),
    }
}

fn decode_double(payload: &Json) -> Result<f64, CodecError> {
    match payload {
        Json::String(text) => match text.as_str() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            other => other
                .parse::<f64>()
                .map_err(|e| invalid(DOUBLE_TAG, e.to_string())),
        },
        _ => Err(invalid(DOUBLE_TAG, "expected a string")),
    }
}

fn invalid(tag: &'static str, message: impl Into<String>) -> CodecError {
    CodecError::InvalidTag {
        tag,
        message: message.into(),
    }
}
