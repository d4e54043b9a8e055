//! Request handler module
//!
//! The request pipeline and its stages: body decoding, static assets and
//! the user resource routes.

pub mod body;
pub mod router;
pub mod static_files;
pub mod users;

// Re-export main entry point
pub use router::handle_request;
