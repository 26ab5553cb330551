//! Wire shapes shared by every route: URLs, response envelopes, error bodies.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use trellis_core::RemoteError;

/// Parse the configured API URL; it must be able to take path segments.
pub(crate) fn parse_base_url(api_url: &str) -> Result<Url, RemoteError> {
    let invalid = |message: String| RemoteError::InvalidUrl {
        url: api_url.to_owned(),
        message,
    };
    let url = Url::parse(api_url.trim()).map_err(|e| invalid(e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(invalid("not a hierarchical http(s) URL".into()));
    }
    Ok(url)
}

/// `base` extended with percent-encoded path segments.
pub(crate) fn join_url(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// Decode a 2xx body. The service wraps some payloads as `{"data": ...}`.
pub(crate) fn decode_body<T: DeserializeOwned>(url: &str, body: &str) -> Result<T, RemoteError> {
    let decode_err = |message: String| RemoteError::Decode {
        url: url.to_owned(),
        message,
    };
    let value: Value = serde_json::from_str(body).map_err(|e| decode_err(e.to_string()))?;
    let value = match value {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or_default()
        }
        other => other,
    };
    serde_json::from_value(value).map_err(|e| decode_err(e.to_string()))
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
    code: Option<String>,
}

/// Build [`RemoteError::Api`] from a non-2xx response body.
///
/// Understands `{"message", "code"}` (and `"error"` in place of
/// `"message"`); anything else is reported as the raw body text.
pub(crate) fn api_error(status: u16, body: &str) -> RemoteError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .or(parsed.error)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            let raw = body.trim();
            if raw.is_empty() {
                format!("HTTP {status} with empty body")
            } else {
                raw.to_owned()
            }
        });
    RemoteError::Api {
        status,
        message,
        code: parsed.code,
    }
}
