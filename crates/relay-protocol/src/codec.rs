use bson::{Bson, Document};

use crate::envelope::Envelope;
use crate::error::CodecError;
use crate::value::{document_to_json, ensure_supported, from_extended_json, to_extended_json};

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";
pub const BSON_CONTENT_TYPE: &str = "application/bson";
pub const BSON_STREAM_CONTENT_TYPE: &str = "application/x-bson-stream";

/// Key of the single-field document a bare value is wrapped in for BSON,
/// whose top level must always be a document.
const BSON_VALUE_KEY: &str = "$v";

/// Wire codec, selected per request by `content-type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    /// Extended JSON text (see [`crate::value`]).
    #[default]
    ExtendedJson,
    /// Binary BSON documents.
    Bson,
}

impl Codec {
    /// Match a buffered payload content type, ignoring parameters such as
    /// `charset`.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        match essence(content_type) {
            ct if ct.eq_ignore_ascii_case(JSON_CONTENT_TYPE) => Some(Codec::ExtendedJson),
            ct if ct.eq_ignore_ascii_case(BSON_CONTENT_TYPE) => Some(Codec::Bson),
            _ => None,
        }
    }

    /// Match a record stream content type.
    pub fn from_stream_content_type(content_type: &str) -> Option<Self> {
        match essence(content_type) {
            ct if ct.eq_ignore_ascii_case(NDJSON_CONTENT_TYPE) => Some(Codec::ExtendedJson),
            ct if ct.eq_ignore_ascii_case(BSON_STREAM_CONTENT_TYPE) => Some(Codec::Bson),
            _ => None,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Codec::ExtendedJson => JSON_CONTENT_TYPE,
            Codec::Bson => BSON_CONTENT_TYPE,
        }
    }

    pub fn stream_content_type(self) -> &'static str {
        match self {
            Codec::ExtendedJson => NDJSON_CONTENT_TYPE,
            Codec::Bson => BSON_STREAM_CONTENT_TYPE,
        }
    }

    pub fn encode(self, value: &Bson) -> Result<Vec<u8>, CodecError> {
        match self {
            Codec::ExtendedJson => Ok(serde_json::to_vec(&to_extended_json(value)?)?),
            Codec::Bson => {
                ensure_supported(value)?;
                let mut doc = Document::new();
                doc.insert(BSON_VALUE_KEY, value.clone());
                Ok(bson::serialize_to_vec(&doc)?)
            }
        }
    }

    pub fn decode(self, bytes: &[u8]) -> Result<Bson, CodecError> {
        match self {
            Codec::ExtendedJson => {
                let json: serde_json::Value = serde_json::from_slice(bytes)?;
                from_extended_json(json)
            }
            Codec::Bson => {
                let mut doc: Document = bson::deserialize_from_slice(bytes)?;
                let value = doc.remove(BSON_VALUE_KEY).ok_or_else(|| {
                    CodecError::Syntax(format!("BSON payload has no {BSON_VALUE_KEY} field"))
                })?;
                if !doc.is_empty() {
                    return Err(CodecError::Syntax(format!(
                        "BSON payload has fields besides {BSON_VALUE_KEY}"
                    )));
                }
                ensure_supported(&value)?;
                Ok(value)
            }
        }
    }

    /// Encode one streamed record. The output is self-delimiting, so records
    /// can be written back to back without any enclosing structure.
    pub fn encode_record(self, doc: &Document) -> Result<Vec<u8>, CodecError> {
        match self {
            Codec::ExtendedJson => {
                let mut line = serde_json::to_vec(&document_to_json(doc)?)?;
                line.push(b'\n');
                Ok(line)
            }
            Codec::Bson => {
                doc.values().try_for_each(ensure_supported)?;
                Ok(bson::serialize_to_vec(doc)?)
            }
        }
    }

    /// Decode one framed record, without its delimiter.
    pub fn decode_record(self, bytes: &[u8]) -> Result<Document, CodecError> {
        match self {
            Codec::ExtendedJson => {
                let json: serde_json::Value = serde_json::from_slice(bytes)?;
                match from_extended_json(json)? {
                    Bson::Document(doc) => Ok(doc),
                    other => Err(CodecError::Syntax(format!(
                        "record must be a document, got {}",
                        crate::value::kind_name(&other)
                    ))),
                }
            }
            Codec::Bson => {
                let doc: Document = bson::deserialize_from_slice(bytes)?;
                doc.values().try_for_each(ensure_supported)?;
                Ok(doc)
            }
        }
    }

    pub fn encode_envelope(self, envelope: &Envelope) -> Result<Vec<u8>, CodecError> {
        self.encode(&Bson::Document(envelope.to_document()))
    }

    pub fn decode_envelope(self, bytes: &[u8]) -> Result<Envelope, CodecError> {
        match self.decode(bytes)? {
            Bson::Document(doc) => Envelope::from_document(doc),
            _ => Err(CodecError::InvalidEnvelope(
                "envelope must be a document".into(),
            )),
        }
    }
}

fn essence(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or_default().trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::oid::ObjectId;
    use bson::{DateTime, doc};

    #[test]
    fn content_type_ignores_parameters() {
        assert_eq!(
            Codec::from_content_type("application/json; charset=utf-8"),
            Some(Codec::ExtendedJson)
        );
        assert_eq!(Codec::from_content_type("Application/BSON"), Some(Codec::Bson));
        assert_eq!(Codec::from_content_type("text/plain"), None);
        assert_eq!(
            Codec::from_stream_content_type("application/x-ndjson"),
            Some(Codec::ExtendedJson)
        );
    }

    #[test]
    fn both_codecs_round_trip_documents() {
        let value = Bson::Document(doc! {
            "_id": ObjectId::new(),
            "at": DateTime::from_millis(42),
            "n": 1_i64 << 40,
            "tags": ["a", "b"],
        });
        for codec in [Codec::ExtendedJson, Codec::Bson] {
            let bytes = codec.encode(&value).unwrap();
            assert_eq!(codec.decode(&bytes).unwrap(), value, "{codec:?}");
        }
    }

    #[test]
    fn bson_codec_wraps_scalars() {
        let bytes = Codec::Bson.encode(&Bson::Int32(5)).unwrap();
        assert_eq!(Codec::Bson.decode(&bytes).unwrap(), Bson::Int32(5));
    }

    #[test]
    fn json_record_is_one_line() {
        let doc = doc! { "text": "line one\nline two" };
        let bytes = Codec::ExtendedJson.encode_record(&doc).unwrap();
        assert_eq!(bytes.iter().filter(|b| **b == b'\n').count(), 1);
        assert_eq!(bytes.last(), Some(&b'\n'));
        let decoded = Codec::ExtendedJson
            .decode_record(&bytes[..bytes.len() - 1])
            .unwrap();
        assert_eq!(decoded, doc);
    }

    #[test]
    fn envelope_survives_both_codecs() {
        let env = Envelope::Result(Bson::Array(vec![Bson::Document(doc! { "a": 1 })]));
        for codec in [Codec::ExtendedJson, Codec::Bson] {
            let bytes = codec.encode_envelope(&env).unwrap();
            assert_eq!(codec.decode_envelope(&bytes).unwrap(), env);
        }
    }

    #[test]
    fn malformed_json_is_a_syntax_error() {
        assert!(matches!(
            Codec::ExtendedJson.decode(b"{not json"),
            Err(CodecError::Syntax(_))
        ));
    }
}
