//! User resource handlers
//!
//! `/users` and `/users/:id` routes over the shared `UserStore`.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Method, Response, StatusCode};
use serde_json::Value;

use crate::handler::router::RequestContext;
use crate::http;
use crate::store::{User, UserStore};

pub const NOT_FOUND_MESSAGE: &str = "Usuário não encontrado";
pub const DELETED_MESSAGE: &str = "Usuário excluído com sucesso";
const NOT_AN_OBJECT_MESSAGE: &str = "request body must be a JSON object";

/// Collection path, matched ASCII case-insensitively
const COLLECTION_PATH: &str = "/users";

const COLLECTION_METHODS: &str = "GET,HEAD,POST";
const ITEM_METHODS: &str = "GET,HEAD,PUT,DELETE";

/// Path shapes owned by this module
#[derive(Debug, PartialEq, Eq)]
enum UserRoute<'a> {
    /// `/users`
    Collection,
    /// `/users/:id`, still percent-encoded
    Item(&'a str),
}

fn match_route(path: &str) -> Option<UserRoute<'_>> {
    let path = path.strip_suffix('/').unwrap_or(path);
    let head = path.get(..COLLECTION_PATH.len())?;
    if !head.eq_ignore_ascii_case(COLLECTION_PATH) {
        return None;
    }
    let rest = &path[COLLECTION_PATH.len()..];
    if rest.is_empty() {
        return Some(UserRoute::Collection);
    }
    let segment = rest.strip_prefix('/')?;
    if segment.is_empty() || segment.contains('/') {
        return None;
    }
    Some(UserRoute::Item(segment))
}

/// Dispatch a request to the matching user handler
///
/// Returns `None` when neither path nor method matches a route.
pub async fn route(ctx: &mut RequestContext, store: &UserStore) -> Option<Response<Full<Bytes>>> {
    let body = ctx.body.take();
    let response = match (match_route(&ctx.path)?, &ctx.method) {
        (UserRoute::Collection, &Method::GET | &Method::HEAD) => list(store).await,
        (UserRoute::Collection, &Method::POST) => create(store, body).await,
        (UserRoute::Collection, &Method::OPTIONS) => {
            http::build_options_response(COLLECTION_METHODS)
        }
        (UserRoute::Item(raw), &Method::GET | &Method::HEAD) => get(store, raw).await,
        (UserRoute::Item(raw), &Method::PUT) => update(store, raw, body).await,
        (UserRoute::Item(raw), &Method::DELETE) => delete(store, raw).await,
        (UserRoute::Item(_), &Method::OPTIONS) => http::build_options_response(ITEM_METHODS),
        _ => return None,
    };
    Some(response)
}

/// `POST /users`
pub async fn create(store: &UserStore, body: Option<Value>) -> Response<Full<Bytes>> {
    match body_fields(body) {
        Ok(fields) => {
            let user = store.create(fields).await;
            http::build_json_response(StatusCode::CREATED, &user)
        }
        Err(response) => response,
    }
}

/// `GET /users`
pub async fn list(store: &UserStore) -> Response<Full<Bytes>> {
    http::build_json_response(StatusCode::OK, &store.list().await)
}

/// `GET /users/:id`
pub async fn get(store: &UserStore, raw_id: &str) -> Response<Full<Bytes>> {
    let user = match item_id(raw_id) {
        Some(id) => store.get(id).await,
        None => None,
    };
    match user {
        Some(user) => http::build_json_response(StatusCode::OK, &user),
        None => not_found(),
    }
}

/// `PUT /users/:id`
pub async fn update(store: &UserStore, raw_id: &str, body: Option<Value>) -> Response<Full<Bytes>> {
    let Some(id) = item_id(raw_id) else {
        return not_found();
    };
    let fields = match body_fields(body) {
        Ok(fields) => fields,
        Err(response) => return response,
    };
    match store.update(id, fields).await {
        Some(user) => http::build_json_response(StatusCode::OK, &user),
        None => not_found(),
    }
}

/// `DELETE /users/:id`
pub async fn delete(store: &UserStore, raw_id: &str) -> Response<Full<Bytes>> {
    let deleted = match item_id(raw_id) {
        Some(id) => store.delete(id).await,
        None => false,
    };
    if deleted {
        http::build_message_response(StatusCode::OK, DELETED_MESSAGE)
    } else {
        not_found()
    }
}

fn not_found() -> Response<Full<Bytes>> {
    http::build_message_response(StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE)
}

/// Field set carried by a request body; no body means no fields
#[allow(clippy::result_large_err)]
fn body_fields(body: Option<Value>) -> Result<User, Response<Full<Bytes>>> {
    match body {
        None => Ok(User::new()),
        Some(Value::Object(fields)) => Ok(fields),
        Some(_) => Err(http::build_message_response(
            StatusCode::BAD_REQUEST,
            NOT_AN_OBJECT_MESSAGE,
        )),
    }
}

/// Id carried by an encoded `:id` segment
fn item_id(raw: &str) -> Option<i64> {
    parse_id(&http::path::decode(raw)?)
}

/// Parse a path id the lenient way: leading whitespace, optional sign,
/// then as many decimal digits as follow (`"12abc"` is 12)
///
/// No digits means no id, which matches no record.
pub fn parse_id(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let magnitude: i64 = digits[..end].parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}
