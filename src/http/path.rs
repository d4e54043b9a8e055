//! Request path decoding

use percent_encoding::percent_decode_str;
use std::borrow::Cow;

/// Percent-decode a request path or a single path segment
///
/// `+` is left alone. Returns `None` when the decoded bytes are not UTF-8,
/// which callers treat as a route miss.
pub fn decode(raw: &str) -> Option<String> {
    percent_decode_str(raw)
        .decode_utf8()
        .ok()
        .map(Cow::into_owned)
}
