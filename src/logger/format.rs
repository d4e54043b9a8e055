//! Request log line module
//!
//! `RequestInfo` is captured once per request before any other processing
//! and rendered in one of the configured access log formats:
//! - `default`: `[<timestamp>] <method> <url>`
//! - `json`: `{"timestamp":...,"method":...,"url":...}`

use chrono::{DateTime, SecondsFormat, Utc};
use hyper::{Method, Uri};

use crate::config::AccessLogFormat;

/// Timestamp, method and URL of an inbound request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInfo {
    pub time: DateTime<Utc>,
    pub method: String,
    /// Path plus query string, as received
    pub url: String,
}

impl RequestInfo {
    /// Stamp a request with the current time
    pub fn capture(method: &Method, uri: &Uri) -> Self {
        Self::at(Utc::now(), method, uri)
    }

    pub fn at(time: DateTime<Utc>, method: &Method, uri: &Uri) -> Self {
        let url = uri
            .path_and_query()
            .map_or_else(|| uri.path().to_string(), ToString::to_string);
        Self {
            time,
            method: method.as_str().to_string(),
            url,
        }
    }

    /// ISO 8601 in UTC with millisecond precision, e.g. `2024-05-01T12:00:00.000Z`
    pub fn timestamp(&self) -> String {
        self.time.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn format(&self, format: AccessLogFormat) -> String {
        match format {
            AccessLogFormat::Default => {
                format!("[{}] {} {}", self.timestamp(), self.method, self.url)
            }
            AccessLogFormat::Json => serde_json::json!({
                "timestamp": self.timestamp(),
                "method": self.method,
                "url": self.url,
            })
            .to_string(),
        }
    }
}
