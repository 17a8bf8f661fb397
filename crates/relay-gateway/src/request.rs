use bson::Bson;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{Method, Request};
use relay_protocol::{COLLECTION_PARAM, Codec, OPERATION_PARAM};

use crate::error::ProtocolError;

/// An authenticated request reduced to what dispatch needs.
#[derive(Debug)]
pub(crate) struct RelayRequest {
    pub op: String,
    pub collection: String,
    /// Codec of the request body, reused for the response.
    pub codec: Codec,
    /// Decoded body, absent for GET and empty POST bodies.
    pub payload: Option<Bson>,
}

impl RelayRequest {
    pub(crate) fn parse(req: &Request<Bytes>) -> Result<Self, ProtocolError> {
        let method = req.method();
        if method != Method::GET && method != Method::POST {
            return Err(ProtocolError::MethodNotAllowed(method.clone()));
        }

        let mut op = None;
        let mut collection = None;
        let query = req.uri().query().unwrap_or("");
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                OPERATION_PARAM => op = Some(value.into_owned()),
                COLLECTION_PARAM => collection = Some(value.into_owned()),
                _ => {}
            }
        }
        let op = op
            .filter(|o| !o.is_empty())
            .ok_or(ProtocolError::MissingParameter(OPERATION_PARAM))?;
        let collection = collection
            .filter(|c| !c.is_empty())
            .ok_or(ProtocolError::MissingParameter(COLLECTION_PARAM))?;

        let (codec, payload) = if method == Method::POST {
            decode_body(req)?
        } else {
            (Codec::ExtendedJson, None)
        };

        Ok(Self {
            op,
            collection,
            codec,
            payload,
        })
    }
}

fn decode_body(req: &Request<Bytes>) -> Result<(Codec, Option<Bson>), ProtocolError> {
    let body = req.body();
    let has_body = !body.iter().all(u8::is_ascii_whitespace);

    let codec = match req.headers().get(CONTENT_TYPE) {
        Some(value) => {
            let text = value
                .to_str()
                .map_err(|_| ProtocolError::UnsupportedContentType("<non-ascii>".into()))?;
            Codec::from_content_type(text)
                .ok_or_else(|| ProtocolError::UnsupportedContentType(text.to_string()))?
        }
        None if has_body => {
            return Err(ProtocolError::UnsupportedContentType("<missing>".into()));
        }
        None => Codec::ExtendedJson,
    };

    let payload = if has_body { Some(codec.decode(body)?) } else { None };
    Ok((codec, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    fn request(method: &str, uri: &str, content_type: Option<&str>, body: &str) -> Request<Bytes> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(ct) = content_type {
            builder = builder.header(CONTENT_TYPE, ct);
        }
        builder.body(Bytes::from(body.to_string())).unwrap()
    }

    #[test]
    fn parses_query_and_json_body() {
        let req = request(
            "POST",
            "/relay?op=insertOne&coll=my%20items",
            Some("application/json; charset=utf-8"),
            r#"[{"a":1}]"#,
        );
        let parsed = RelayRequest::parse(&req).unwrap();
        assert_eq!(parsed.op, "insertOne");
        assert_eq!(parsed.collection, "my items");
        assert_eq!(parsed.codec, Codec::ExtendedJson);
        assert_eq!(parsed.payload, Some(bson::bson!([{ "a": 1 }])));
    }

    #[test]
    fn get_has_no_payload() {
        let req = request("GET", "/?op=estimatedDocumentCount&coll=x", None, "");
        let parsed = RelayRequest::parse(&req).unwrap();
        assert_eq!(parsed.payload, None);
    }

    #[test]
    fn empty_post_body_without_content_type() {
        let req = request("POST", "/?op=findToArray&coll=x", None, "  ");
        assert_eq!(RelayRequest::parse(&req).unwrap().payload, None);
    }

    #[test]
    fn protocol_errors_map_to_statuses() {
        let cases = [
            (request("PUT", "/?op=find&coll=x", None, ""), StatusCode::METHOD_NOT_ALLOWED),
            (request("GET", "/?coll=x", None, ""), StatusCode::BAD_REQUEST),
            (request("GET", "/?op=find&coll=", None, ""), StatusCode::BAD_REQUEST),
            (
                request("POST", "/?op=find&coll=x", Some("text/plain"), "[]"),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            (
                request("POST", "/?op=find&coll=x", None, "[]"),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            (
                request("POST", "/?op=find&coll=x", Some("application/json"), "[{"),
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (req, status) in cases {
            let err = RelayRequest::parse(&req).unwrap_err();
            assert_eq!(err.status_code(), status, "{err}");
        }
    }
}
