//! Static file serving module
//!
//! Serves files from the public directory when the request path names one.
//! Anything else falls through to the user routes.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Method, Response};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::config::StaticFilesConfig;
use crate::handler::router::RequestContext;
use crate::http::{self, cache, mime};
use crate::logger;

/// Serve the requested path from the public directory
///
/// Returns `None` when the request is not a GET/HEAD or no file matches.
pub async fn serve(
    ctx: &RequestContext,
    config: &StaticFilesConfig,
) -> Option<Response<Full<Bytes>>> {
    if ctx.method != Method::GET && ctx.method != Method::HEAD {
        return None;
    }

    let (content, content_type) =
        load_from_directory(&config.public_dir, &ctx.path, &config.index_files).await?;

    let etag = cache::generate_etag(&content);
    if cache::check_etag_match(ctx.if_none_match.as_deref(), &etag) {
        return Some(http::build_304_response(&etag));
    }

    Some(http::build_static_response(content, content_type, &etag))
}

/// Load a file below `public_dir`, resolving directories to index files
pub async fn load_from_directory(
    public_dir: &str,
    path: &str,
    index_files: &[String],
) -> Option<(Vec<u8>, &'static str)> {
    // Decode first so encoded dots can't slip past the traversal guard
    let decoded = http::path::decode(path)?;

    // Remove leading slash and prevent directory traversal
    let cleaned = decoded.replace("..", "");
    let relative_path = cleaned.trim_start_matches('/');

    let root = match fs::canonicalize(public_dir).await {
        Ok(p) => p,
        Err(e) => {
            logger::log_warning(&format!(
                "Public directory not found or inaccessible '{public_dir}': {e}"
            ));
            return None;
        }
    };

    // Missing files are the common case for API routes, no log
    let mut file_path = fs::canonicalize(Path::new(public_dir).join(relative_path))
        .await
        .ok()?;

    if !file_path.starts_with(&root) {
        logger::log_warning(&format!(
            "Path traversal attempt blocked: {} -> {}",
            path,
            file_path.display()
        ));
        return None;
    }

    if fs::metadata(&file_path).await.ok()?.is_dir() {
        file_path = find_index_file(&file_path, index_files).await?;
    }

    let content = match fs::read(&file_path).await {
        Ok(c) => c,
        Err(e) => {
            logger::log_error(&format!(
                "Failed to read file '{}': {}",
                file_path.display(),
                e
            ));
            return None;
        }
    };

    let content_type = mime::get_content_type(file_path.extension().and_then(|e| e.to_str()));
    Some((content, content_type))
}

async fn find_index_file(dir: &Path, index_files: &[String]) -> Option<PathBuf> {
    for index_file in index_files {
        let candidate = dir.join(index_file);
        if fs::metadata(&candidate).await.is_ok_and(|m| m.is_file()) {
            return Some(candidate);
        }
    }
    None
}
