//! Request pipeline module
//!
//! Entry point for HTTP request processing. Every request runs the same
//! ordered stages, each of which may end the request early:
//!
//! 1. Request logger (never ends the request)
//! 2. JSON body decoder (400/413 on bad bodies)
//! 3. Static asset responder
//! 4. User resource routes
//! 5. Route-not-found fallback

use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::header;
use hyper::http::request::Parts;
use hyper::{Method, Request, Response};
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;

use crate::config::AppState;
use crate::handler::{body, static_files, users};
use crate::http;
use crate::logger::{self, RequestInfo};

/// Per-request state threaded through the pipeline stages
#[derive(Debug)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    /// Attached by the request logger
    pub info: RequestInfo,
    pub if_none_match: Option<String>,
    /// Attached by the body decoder
    pub body: Option<Value>,
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, req_body) = req.into_parts();
    let is_head = parts.method == Method::HEAD;

    let mut ctx = log_request(&parts, &state);

    let mut response = dispatch(&mut ctx, &parts.headers, req_body, &state).await;

    if is_head {
        response = http::without_body(response);
    }
    http::set_server_header(&mut response, &state.config.http.server_name);
    Ok(response)
}

/// Stage 1: stamp the request, log it if enabled and start its context
///
/// The `RequestInfo` is attached whether or not the access log is on.
fn log_request(parts: &Parts, state: &AppState) -> RequestContext {
    let info = RequestInfo::capture(&parts.method, &parts.uri);
    if state.config.logging.access_log {
        logger::log_request(&info, state.config.logging.access_log_format);
    }

    RequestContext {
        method: parts.method.clone(),
        path: parts.uri.path().to_string(),
        info,
        if_none_match: parts
            .headers
            .get(header::IF_NONE_MATCH)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string),
        body: None,
    }
}

/// Stages 2-5
async fn dispatch<B>(
    ctx: &mut RequestContext,
    headers: &header::HeaderMap,
    req_body: B,
    state: &AppState,
) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    // 2. Body decoder
    match body::decode_json(headers, req_body, state.config.http.max_body_size).await {
        Ok(decoded) => ctx.body = decoded,
        Err(e) => {
            logger::log_warning(&format!(
                "Rejected body for {} {}: {e}",
                ctx.info.method, ctx.info.url
            ));
            return e.to_response();
        }
    }

    // 3. Static assets
    if let Some(response) = static_files::serve(ctx, &state.config.static_files).await {
        return response;
    }

    // 4. User routes
    if let Some(response) = users::route(ctx, &state.users).await {
        return response;
    }

    // 5. Nothing matched
    http::build_route_not_found(&ctx.method, &ctx.path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use http_body_util::BodyExt;
    use hyper::StatusCode;
    use serde_json::json;

    struct TestServer {
        state: Arc<AppState>,
        public: tempfile::TempDir,
    }

    impl TestServer {
        fn new() -> Self {
            let public = tempfile::tempdir().unwrap();
            std::fs::write(public.path().join("index.html"), "<h1>Usuarios</h1>").unwrap();

            let mut config = Config::default();
            config.logging.access_log = false;
            config.static_files.public_dir = public.path().to_str().unwrap().to_string();
            Self {
                state: Arc::new(AppState::new(config)),
                public,
            }
        }

        async fn send(
            &self,
            method: Method,
            uri: &str,
            body: Option<&str>,
        ) -> (StatusCode, Response<Full<Bytes>>) {
            let mut builder = Request::builder().method(method).uri(uri);
            if body.is_some() {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
            }
            let req = builder
                .body(Full::new(Bytes::from(body.unwrap_or("").to_string())))
                .unwrap();
            let response = handle_request(req, Arc::clone(&self.state)).await.unwrap();
            (response.status(), response)
        }

        async fn json(&self, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
            let (status, response) = self.send(method, uri, body).await;
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            (status, serde_json::from_slice(&bytes).unwrap())
        }
    }

    #[tokio::test]
    async fn test_reference_scenario() {
        let server = TestServer::new();

        let (status, body) = server
            .json(Method::POST, "/users", Some(r#"{"name":"Ana"}"#))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body, json!({"id": 1, "name": "Ana"}));

        let (status, body) = server
            .json(Method::POST, "/users", Some(r#"{"name":"Leo"}"#))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body, json!({"id": 2, "name": "Leo"}));

        let (status, body) = server.json(Method::GET, "/users", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([{"id": 1, "name": "Ana"}, {"id": 2, "name": "Leo"}]));

        let (status, body) = server
            .json(Method::PUT, "/users/1", Some(r#"{"age":30}"#))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"id": 1, "name": "Ana", "age": 30}));

        let (status, body) = server.json(Method::DELETE, "/users/2", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"message": "Usuário excluído com sucesso"}));

        let (status, body) = server.json(Method::GET, "/users/2", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"message": "Usuário não encontrado"}));
    }

    #[tokio::test]
    async fn test_created_record_serializes_id_first() {
        let server = TestServer::new();
        let (_, response) = server
            .send(Method::POST, "/users", Some(r#"{"name":"Ana","id":50}"#))
            .await;
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], br#"{"id":1,"name":"Ana"}"#);
    }

    #[tokio::test]
    async fn test_created_record_is_readable() {
        let server = TestServer::new();
        let (_, created) = server
            .json(Method::POST, "/users", Some(r#"{"name":"Ana","tags":["a"]}"#))
            .await;
        let (status, fetched) = server.json(Method::GET, "/users/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_update_then_get_returns_merged_record() {
        let server = TestServer::new();
        server
            .json(Method::POST, "/users", Some(r#"{"name":"Ana","city":"Recife"}"#))
            .await;
        let (_, updated) = server
            .json(Method::PUT, "/users/1", Some(r#"{"city":"Olinda","age":30}"#))
            .await;

        let (status, fetched) = server.json(Method::GET, "/users/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, updated);
        assert_eq!(
            fetched,
            json!({"id": 1, "name": "Ana", "city": "Olinda", "age": 30})
        );
    }

    #[test]
    fn test_logger_stage_attaches_request_info() {
        for access_log in [false, true] {
            let mut config = Config::default();
            config.logging.access_log = access_log;
            let state = AppState::new(config);

            let (parts, ()) = Request::builder()
                .method(Method::DELETE)
                .uri("/users/3?force=1")
                .header(header::IF_NONE_MATCH, "\"abc\"")
                .body(())
                .unwrap()
                .into_parts();
            let ctx = log_request(&parts, &state);

            assert_eq!(ctx.info.method, "DELETE");
            assert_eq!(ctx.info.url, "/users/3?force=1");
            assert_eq!(ctx.path, "/users/3");
            assert_eq!(ctx.if_none_match.as_deref(), Some("\"abc\""));
            assert!(ctx.body.is_none());
        }
    }

    #[tokio::test]
    async fn test_percent_encoded_paths_are_decoded() {
        let server = TestServer::new();
        std::fs::write(server.public.path().join("café.html"), "cafe").unwrap();
        std::fs::write(server.public.path().join("my page.html"), "page").unwrap();
        server
            .json(Method::POST, "/users", Some(r#"{"name":"Ana"}"#))
            .await;

        for (uri, expected) in [("/caf%C3%A9.html", "cafe"), ("/my%20page.html", "page")] {
            let (status, response) = server.send(Method::GET, uri, None).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            assert_eq!(&bytes[..], expected.as_bytes());
        }

        let (status, body) = server.json(Method::GET, "/users/%31", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"id": 1, "name": "Ana"}));

        // ids that are not UTF-8 once decoded match no record
        let (status, _) = server.send(Method::GET, "/users/%FF", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_users_prefix_ignores_case() {
        let server = TestServer::new();
        server
            .json(Method::POST, "/USERS", Some(r#"{"name":"Ana"}"#))
            .await;
        let (status, body) = server.json(Method::GET, "/Users/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"id": 1, "name": "Ana"}));
    }

    #[tokio::test]
    async fn test_missing_ids_are_not_found_everywhere() {
        let server = TestServer::new();
        let expected = json!({"message": "Usuário não encontrado"});

        for (method, body) in [
            (Method::GET, None),
            (Method::PUT, Some(r#"{"name":"X"}"#)),
            (Method::DELETE, None),
        ] {
            let (status, value) = server.json(method, "/users/9", body).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(value, expected);
        }

        let (status, _) = server.json(Method::GET, "/users/abc", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_keeps_insertion_order_after_updates() {
        let server = TestServer::new();
        for name in ["a", "b", "c"] {
            let body = json!({ "name": name }).to_string();
            server.json(Method::POST, "/users", Some(&body)).await;
        }
        server
            .json(Method::PUT, "/users/1", Some(r#"{"name":"z"}"#))
            .await;
        server.json(Method::DELETE, "/users/2", None).await;

        let (_, body) = server.json(Method::GET, "/users", None).await;
        assert_eq!(body, json!([{"id": 1, "name": "z"}, {"id": 3, "name": "c"}]));
    }

    #[tokio::test]
    async fn test_malformed_json_never_reaches_handlers() {
        let server = TestServer::new();
        let (status, body) = server
            .json(Method::POST, "/users", Some(r#"{"name":"#))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string());

        let (_, body) = server.json(Method::GET, "/users", None).await;
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_create_without_body_and_with_array_body() {
        let server = TestServer::new();
        let (status, body) = server.json(Method::POST, "/users", None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body, json!({"id": 1}));

        let (status, _) = server.json(Method::POST, "/users", Some("[1,2]")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_static_files_take_precedence() {
        let server = TestServer::new();
        let (status, response) = server.send(Method::GET, "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/html; charset=UTF-8"
        );

        // a file named like a route wins for GET, but not for POST
        std::fs::write(server.public.path().join("users"), "shadowing file").unwrap();
        let (status, _) = server.send(Method::GET, "/users", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = server.send(Method::POST, "/users", Some("{}")).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_unknown_route_and_method() {
        let server = TestServer::new();
        let (status, response) = server.send(Method::GET, "/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(String::from_utf8_lossy(&bytes).contains("Cannot GET /nope"));

        let (status, _) = server.send(Method::PATCH, "/users/1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_head_and_options() {
        let server = TestServer::new();
        server
            .json(Method::POST, "/users", Some(r#"{"name":"Ana"}"#))
            .await;

        let (status, response) = server.send(Method::HEAD, "/users/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(response.headers().contains_key(header::CONTENT_LENGTH));
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.is_empty());

        let (status, response) = server.send(Method::OPTIONS, "/users/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.headers()[header::ALLOW], "GET,HEAD,PUT,DELETE");
    }

    #[tokio::test]
    async fn test_server_header_on_every_response() {
        let server = TestServer::new();
        let (_, response) = server.send(Method::GET, "/nope", None).await;
        assert_eq!(response.headers()[header::SERVER], "users-server");
    }
}
