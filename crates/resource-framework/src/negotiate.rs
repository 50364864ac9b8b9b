//! # Content Negotiation
//!
//! The API speaks exactly one media type, `application/json`, in both
//! directions. Requests without a body parse to an empty JSON object so that
//! bodiless verbs (`GET`, `DELETE`, parameterless actions) flow through the
//! same code path as `POST`.

use axum::http::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING};
use axum::http::HeaderMap;
use serde_json::{Map, Value};

use crate::error::DispatchError;

/// The single media type accepted and produced.
pub const JSON: &str = "application/json";

/// Whether the header `name` lists `mime`.
///
/// A missing header counts as `application/json`. Parameters after `;` are
/// ignored, as is case. The wildcards `*/*` and `application/*` are honoured
/// so ordinary clients sending `Accept: */*` are served.
pub fn mime_in_header(headers: &HeaderMap, name: &str, mime: &str) -> bool {
    let Some(value) = headers.get(name) else {
        return mime.eq_ignore_ascii_case(JSON);
    };
    let Ok(value) = value.to_str() else {
        return false;
    };
    value
        .split(',')
        .map(|entry| entry.split(';').next().unwrap_or_default().trim())
        .any(|entry| media_matches(entry, mime))
}

fn media_matches(offered: &str, wanted: &str) -> bool {
    if offered.eq_ignore_ascii_case(wanted) || offered == "*/*" {
        return true;
    }
    match (offered.split_once('/'), wanted.split_once('/')) {
        (Some((kind, "*")), Some((wanted_kind, _))) => kind.eq_ignore_ascii_case(wanted_kind),
        _ => false,
    }
}

/// Fails with 406 unless the client accepts JSON.
pub fn check_accept(headers: &HeaderMap) -> Result<(), DispatchError> {
    if mime_in_header(headers, ACCEPT.as_str(), JSON) {
        Ok(())
    } else {
        Err(DispatchError::NotAcceptable(format!(
            "This API only produces '{JSON}'"
        )))
    }
}

fn has_body(headers: &HeaderMap) -> bool {
    if headers.contains_key(TRANSFER_ENCODING) {
        return true;
    }
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .is_some_and(|len| len > 0)
}

/// Decodes the request body into a structured value.
///
/// - no length indicator: empty object;
/// - content type other than JSON: 415;
/// - bytes that are not JSON: 400.
pub fn parse_request(headers: &HeaderMap, body: &[u8]) -> Result<Value, DispatchError> {
    if !has_body(headers) {
        return Ok(Value::Object(Map::new()));
    }
    if !headers.contains_key(CONTENT_TYPE) || !mime_in_header(headers, CONTENT_TYPE.as_str(), JSON) {
        return Err(DispatchError::UnsupportedMediaType(format!(
            "This API only supports '{JSON}'"
        )));
    }
    serde_json::from_slice(body)
        .map_err(|e| DispatchError::BadRequest(format!("Unable to parse JSON request: {e}")))
}

/// Like [`parse_request`], but the value must be a JSON object.
pub fn parse_params(headers: &HeaderMap, body: &[u8]) -> Result<Map<String, Value>, DispatchError> {
    match parse_request(headers, body)? {
        Value::Object(map) => Ok(map),
        other => Err(DispatchError::BadRequest(format!(
            "Request body must be a JSON object, got {}",
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
