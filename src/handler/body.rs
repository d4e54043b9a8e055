//! JSON body decoding stage
//!
//! Parses `application/json` request bodies before routing. Requests with
//! another content type, or with an empty body, pass through with no body.

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{self, HeaderMap};
use hyper::{Response, StatusCode};
use serde_json::Value;
use thiserror::Error;

use crate::http;

/// Reasons a request body is rejected before it reaches a handler
#[derive(Debug, Error)]
pub enum BodyError {
    #[error("request entity too large")]
    TooLarge,

    #[error("failed to read request body: {0}")]
    Read(String),

    #[error("{0}")]
    Malformed(#[from] serde_json::Error),

    #[error("request body must be a JSON object or array")]
    NotStructured,
}

impl BodyError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Read(_) | Self::Malformed(_) | Self::NotStructured => StatusCode::BAD_REQUEST,
        }
    }

    pub fn to_response(&self) -> Response<Full<Bytes>> {
        http::build_message_response(self.status(), &self.to_string())
    }
}

/// Read and parse a JSON body, if the request declares one
pub async fn decode_json<B>(
    headers: &HeaderMap,
    body: B,
    max_body_size: usize,
) -> Result<Option<Value>, BodyError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    if !is_json(headers) {
        return Ok(None);
    }

    if declared_length(headers).is_some_and(|len| len > max_body_size) {
        return Err(BodyError::TooLarge);
    }

    let bytes = Limited::new(body, max_body_size)
        .collect()
        .await
        .map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                BodyError::TooLarge
            } else {
                BodyError::Read(e.to_string())
            }
        })?
        .to_bytes();

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let value: Value = serde_json::from_slice(&bytes)?;
    if !(value.is_object() || value.is_array()) {
        return Err(BodyError::NotStructured);
    }
    Ok(Some(value))
}

/// `Content-Type` media type is `application/json`, parameters ignored
fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|media_type| media_type.trim().eq_ignore_ascii_case("application/json"))
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
