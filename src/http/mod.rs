//! HTTP protocol layer module
//!
//! Response builders, MIME detection and cache validation, shared by the
//! static responder and the user resource handlers.

pub mod cache;
pub mod mime;
pub mod path;
pub mod response;

// Re-export commonly used builders
pub use response::{
    build_304_response, build_json_response, build_message_response, build_options_response,
    build_route_not_found, build_static_response, set_server_header, without_body,
};
