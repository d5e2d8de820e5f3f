// MIT License
//
// Copyright (c) 2022 Ankur Srivastava
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Transport-independent request construction and response handling.

use crate::errors::RegistryError;
use isahc::http::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use url::Url;

/// Media type requested from the registry.
pub const REGISTRY_MEDIA_TYPE: &str = "application/vnd.schemaregistry.v1+json";

/// Content type of JSON request bodies.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

const JSON_MEDIA_TYPES: [&str; 2] = ["application/json", REGISTRY_MEDIA_TYPE];

/// Headers sent with every registry request.
pub fn make_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(REGISTRY_MEDIA_TYPE));
    headers
}

/// Build an absolute URL from the registry host and a templated path.
///
/// The path may contain `{var}` and `{/var}` placeholders. Values are
/// percent-encoded. Placeholders without a value expand to nothing and
/// unused variables are ignored.
pub fn format_url(host: &str, path: &str, url_vars: &[(&str, &str)]) -> Result<String, RegistryError> {
    let expanded = expand_template(path, url_vars);
    let url = Url::parse(host)?.join(&expanded)?;
    Ok(url.into())
}

fn expand_template(template: &str, url_vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let expression = &rest[start + 1..start + len];
        let (separator, names) = match expression.strip_prefix('/') {
            Some(names) => (Some('/'), names),
            None => (None, expression),
        };
        let values = names.split(',').filter_map(|name| {
            url_vars
                .iter()
                .find(|(var, _)| *var == name.trim())
                .map(|(_, value)| urlencoding::encode(value))
        });
        for (i, value) in values.enumerate() {
            match separator {
                Some(sep) => out.push(sep),
                None if i > 0 => out.push(','),
                None => {}
            }
            out.push_str(&value);
        }
        rest = &rest[start + len + 1..];
    }
    out.push_str(rest);
    out
}

/// Split a content-type header into its lowercased media type and charset.
pub fn parse_content_type(content_type: Option<&str>) -> (Option<String>, String) {
    let Some(content_type) = content_type.filter(|c| !c.trim().is_empty()) else {
        return (None, "utf-8".into());
    };
    let mut parts = content_type.split(';');
    let media_type = parts.next().map(|m| m.trim().to_ascii_lowercase());
    let charset = parts
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("charset"))
        .map(|(_, value)| value.trim().trim_matches('"').to_ascii_lowercase())
        .unwrap_or_else(|| "utf-8".into());
    (media_type, charset)
}

/// Decode a response body according to its content type.
///
/// JSON media types are parsed, anything else is returned as a string.
/// An empty body or a missing content type gives `Value::Null`.
pub fn decode_body(content_type: Option<&str>, body: &[u8]) -> Result<Value, RegistryError> {
    let (media_type, charset) = parse_content_type(content_type);
    let Some(media_type) = media_type else {
        return Ok(Value::Null);
    };
    if body.is_empty() {
        return Ok(Value::Null);
    }
    if charset != "utf-8" && charset != "utf8" {
        tracing::warn!("Unsupported charset {charset:?}, decoding the body as UTF-8.");
    }
    if JSON_MEDIA_TYPES.contains(&media_type.as_str()) {
        return Ok(serde_json::from_slice(body)?);
    }
    tracing::warn!(
        "Unrecognized content type: {media_type:?}. The message is being decoded into a string."
    );
    Ok(Value::String(String::from_utf8_lossy(body).into_owned()))
}

/// Turn a raw registry response into its decoded body or a classified error.
pub fn decipher_response(status: u16, headers: &HeaderMap, body: &[u8]) -> Result<Value, RegistryError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());

    if matches!(status, 200 | 201 | 204) {
        return decode_body(content_type, body);
    }

    let data = decode_body(content_type, body).unwrap_or(Value::Null);
    let (error_code, message) = error_envelope(&data);
    tracing::debug!(status, ?error_code, ?message, "Registry returned an error status");

    Err(match status {
        500.. => RegistryError::Server {
            status_code: status,
            error_code,
            message,
        },
        400..=499 => RegistryError::BadRequest {
            status_code: status,
            error_code,
            message,
        },
        300..=399 => RegistryError::Redirection { status_code: status },
        _ => RegistryError::Http { status_code: status },
    })
}

/// `{"error_code": ..., "message": ...}`, or nothing if either is missing.
fn error_envelope(data: &Value) -> (Option<i32>, Option<String>) {
    let error_code = data
        .get("error_code")
        .and_then(Value::as_i64)
        .and_then(|code| i32::try_from(code).ok());
    let message = data.get("message").map(|message| match message {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    });
    match (error_code, message) {
        (Some(code), Some(message)) => (Some(code), Some(message)),
        _ => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn json_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(REGISTRY_MEDIA_TYPE));
        headers
    }

    fn envelope() -> Vec<u8> {
        serde_json::to_vec(&json!({"error_code": 40403, "message": "Schema not found"})).unwrap()
    }

    #[test]
    fn test_make_headers() {
        let headers = make_headers();
        assert_eq!(headers[ACCEPT], REGISTRY_MEDIA_TYPE);
        assert!(headers.get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn test_format_url() {
        let url = format_url(
            "http://registry:8081",
            "/subjects{/subject}/versions",
            &[("subject", "helloworld"), ("unused", "x")],
        )
        .unwrap();
        assert_eq!(url, "http://registry:8081/subjects/helloworld/versions");

        let url = format_url(
            "http://registry:8081",
            "/subjects/{subject}/versions/{version}",
            &[("subject", "a b"), ("version", "latest")],
        )
        .unwrap();
        assert_eq!(url, "http://registry:8081/subjects/a%20b/versions/latest");

        let url = format_url("http://registry:8081", "/a{/b}", &[]).unwrap();
        assert_eq!(url, "http://registry:8081/a");

        assert!(format_url("not a url", "/a", &[]).is_err());
    }

    #[test]
    fn test_parse_content_type() {
        assert_eq!(parse_content_type(None), (None, "utf-8".to_string()));
        assert_eq!(
            parse_content_type(Some("Application/JSON; charset=\"ISO-8859-1\"")),
            (Some("application/json".to_string()), "iso-8859-1".to_string())
        );
        assert_eq!(
            parse_content_type(Some(REGISTRY_MEDIA_TYPE)),
            (Some(REGISTRY_MEDIA_TYPE.to_string()), "utf-8".to_string())
        );
    }

    #[test]
    fn test_decode_body() {
        assert_eq!(
            decode_body(Some("application/json"), b"[1, 2, 3]").unwrap(),
            json!([1, 2, 3])
        );
        assert_eq!(decode_body(Some("text/plain"), b"hello").unwrap(), json!("hello"));
        assert_eq!(decode_body(None, b"[1]").unwrap(), Value::Null);
        assert_eq!(decode_body(Some("application/json"), b"").unwrap(), Value::Null);
        assert!(decode_body(Some("application/json"), b"{oops").is_err());
    }

    #[test]
    fn test_decipher_response_success() {
        for status in [200, 201, 204] {
            let data = decipher_response(status, &json_headers(), b"[1, 2, 3]").unwrap();
            assert_eq!(data, json!([1, 2, 3]));
        }
        let data = decipher_response(200, &json_headers(), b"").unwrap();
        assert_eq!(data, Value::Null);
    }

    #[test]
    fn test_decipher_response_server_error() {
        match decipher_response(500, &json_headers(), b"") {
            Err(RegistryError::Server {
                status_code: 500,
                error_code: None,
                message: None,
            }) => {}
            other => panic!("unexpected {other:?}"),
        }
        let err = decipher_response(503, &json_headers(), &envelope()).unwrap_err();
        assert_eq!(err.status_code(), Some(503));
        assert_eq!(err.error_code(), Some(40403));
        assert_eq!(err.message(), Some("Schema not found"));
    }

    #[test]
    fn test_decipher_response_bad_request() {
        for status in [400, 401, 404, 409, 422, 499] {
            let err = decipher_response(status, &json_headers(), &envelope()).unwrap_err();
            assert!(matches!(err, RegistryError::BadRequest { .. }), "{status}");
            assert_eq!(err.error_code(), Some(40403));
        }
        let err = decipher_response(401, &json_headers(), b"").unwrap_err();
        assert!(matches!(
            err,
            RegistryError::BadRequest {
                status_code: 401,
                error_code: None,
                message: None
            }
        ));
    }

    #[test]
    fn test_decipher_response_partial_envelope() {
        let body = serde_json::to_vec(&json!({"error": 12345, "message": "I've got reasons"})).unwrap();
        let err = decipher_response(401, &json_headers(), &body).unwrap_err();
        assert_eq!(err.error_code(), None);
        assert_eq!(err.message(), None);

        let err = decipher_response(500, &json_headers(), b"[1, 2]").unwrap_err();
        assert!(matches!(err, RegistryError::Server { error_code: None, .. }));

        let err = decipher_response(500, &json_headers(), b"not json").unwrap_err();
        assert!(matches!(err, RegistryError::Server { message: None, .. }));
    }

    #[test]
    fn test_decipher_response_redirection() {
        for status in [300, 301, 307, 399] {
            let err = decipher_response(status, &json_headers(), &envelope()).unwrap_err();
            assert!(matches!(err, RegistryError::Redirection { status_code } if status_code == status));
            assert_eq!(err.message(), None);
        }
    }

    #[test]
    fn test_decipher_response_unexpected_status() {
        for status in [100, 202, 206] {
            let err = decipher_response(status, &json_headers(), b"").unwrap_err();
            assert!(matches!(err, RegistryError::Http { status_code } if status_code == status));
        }
    }
}
