//! Response envelope stage.
//!
//! Rewrites successful JSON bodies of the form `{"response": ..., "total_count"?: n}`
//! into `{"meta_data": {...}, "response": ...}`. What goes into `meta_data` depends on
//! the request method and on whether `response` is a list or a single object:
//!
//! | method        | `response` | meta_data                                                  |
//! |---------------|------------|------------------------------------------------------------|
//! | POST          | any        | status_code, message, location (request URL + "/" + id)    |
//! | PUT / PATCH   | any        | status_code, message, location (request URL)               |
//! | GET           | list       | status_code, message, offset, limit, page, page_count, total_count |
//! | GET           | object     | status_code, message                                       |
//!
//! Anything else passes through byte-for-byte: non-JSON bodies, the OpenAPI
//! document, bodies without a `response` key (errors, health), and bodies that
//! fail to parse.

use crate::pagination::PageWindow;
use crate::response::CreatedId;
use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{Query, Request},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Path suffix of the schema document, which is never rewritten.
const OPENAPI_SUFFIX: &str = "/openapi.json";

enum Shape {
    List(u64),
    Object,
    Scalar,
}

struct RequestInfo {
    method: Method,
    url: String,
    window: PageWindow,
    exempt: bool,
}

impl RequestInfo {
    fn capture(request: &Request) -> Self {
        let uri = request.uri();
        let window = Query::<HashMap<String, String>>::try_from_uri(uri)
            .map(|Query(q)| PageWindow::from_query_lenient(&q))
            .unwrap_or_default();
        RequestInfo {
            method: request.method().clone(),
            url: request_url(request.headers(), uri),
            window,
            exempt: uri.path().ends_with(OPENAPI_SUFFIX),
        }
    }
}

/// Absolute URL of the request without its query string. Falls back to the bare
/// path when no Host header is present.
fn request_url(headers: &HeaderMap, uri: &Uri) -> String {
    let path = uri.path();
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| uri.authority().map(|a| a.as_str()));
    match host {
        Some(host) => {
            let scheme = headers
                .get("x-forwarded-proto")
                .and_then(|h| h.to_str().ok())
                .or_else(|| uri.scheme_str())
                .unwrap_or("http");
            format!("{}://{}{}", scheme, host, path)
        }
        None => path.to_string(),
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| {
            let mime = mime.trim();
            mime == "application/json" || mime.ends_with("+json")
        })
}

/// Middleware entry point; install with `axum::middleware::from_fn(envelope)`.
pub async fn envelope(request: Request, next: Next) -> Response {
    let info = RequestInfo::capture(&request);
    let response = next.run(request).await;
    if info.exempt || !is_json(response.headers()) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(b) => b,
        Err(e) => {
            tracing::error!(error = %e, "failed to read response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let rewritten = match serde_json::from_slice::<Value>(&bytes) {
        Ok(value) => wrap(&info, parts.status, parts.extensions.get::<CreatedId>().copied(), value),
        Err(e) => {
            tracing::warn!(error = %e, url = %info.url, "response body is not valid JSON; passing through");
            None
        }
    };
    let Some(value) = rewritten else {
        return Response::from_parts(parts, Body::from(bytes));
    };

    let out = match serde_json::to_vec(&value) {
        Ok(v) => Bytes::from(v),
        Err(e) => {
            tracing::warn!(error = %e, "failed to serialize envelope; passing through");
            return Response::from_parts(parts, Body::from(bytes));
        }
    };
    parts
        .headers
        .insert(header::CONTENT_LENGTH, HeaderValue::from(out.len()));
    Response::from_parts(parts, Body::from(out))
}

/// The rewritten body, or None when the response is to pass through unchanged.
fn wrap(info: &RequestInfo, status: StatusCode, created: Option<CreatedId>, value: Value) -> Option<Value> {
    let Value::Object(mut body) = value else {
        return None;
    };
    let shape = match body.get("response")? {
        Value::Array(items) => Shape::List(items.len() as u64),
        Value::Object(_) => Shape::Object,
        _ => Shape::Scalar,
    };

    let mut meta = Map::new();
    meta.insert("status_code".into(), Value::from(status.as_u16()));
    meta.insert(
        "message".into(),
        Value::from(status.canonical_reason().unwrap_or_default()),
    );

    let method = &info.method;
    if method == Method::POST {
        let base = info.url.trim_end_matches('/');
        let location = match created {
            Some(CreatedId(id)) => format!("{}/{}", base, id),
            None => base.to_string(),
        };
        meta.insert("location".into(), Value::String(location));
    } else if method == Method::PUT || method == Method::PATCH {
        meta.insert("location".into(), Value::String(info.url.clone()));
    } else if method == Method::GET {
        match shape {
            Shape::List(len) => {
                let total = body.remove("total_count").and_then(|v| v.as_u64()).unwrap_or(len);
                let window = info.window;
                meta.insert("offset".into(), Value::from(window.offset()));
                meta.insert("limit".into(), Value::from(window.limit()));
                meta.insert("page".into(), Value::from(window.page()));
                meta.insert("page_count".into(), Value::from(window.page_count(total)));
                meta.insert("total_count".into(), Value::from(total));
            }
            Shape::Object => {}
            Shape::Scalar => return None,
        }
    } else {
        return None;
    }

    body.insert("meta_data".into(), Value::Object(meta));
    Some(Value::Object(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn info(method: Method, query: &str) -> RequestInfo {
        let uri: Uri = format!("/api/v1/albums/{}", query).parse().unwrap();
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::HOST, "example.test")
            .body(Body::empty())
            .unwrap();
        RequestInfo::capture(&request)
    }

    #[test]
    fn list_meta_folds_total_count() {
        let out = wrap(
            &info(Method::GET, "?offset=20&limit=10"),
            StatusCode::OK,
            None,
            json!({"response": [{"id": 21}], "total_count": 25}),
        )
        .unwrap();
        assert!(out.get("total_count").is_none());
        assert_eq!(
            out["meta_data"],
            json!({"status_code": 200, "message": "OK", "offset": 20, "limit": 10,
                   "page": 3, "page_count": 3, "total_count": 25})
        );
    }

    #[test]
    fn post_location_ends_with_id() {
        let out = wrap(
            &info(Method::POST, ""),
            StatusCode::CREATED,
            Some(CreatedId(42)),
            json!({"response": {"id": 42}}),
        )
        .unwrap();
        assert_eq!(out["meta_data"]["location"], "http://example.test/api/v1/albums/42");
        assert_eq!(out["meta_data"]["message"], "Created");
    }

    #[test]
    fn single_get_has_status_only() {
        let out = wrap(&info(Method::GET, ""), StatusCode::OK, None, json!({"response": {"id": 1}})).unwrap();
        assert_eq!(out["meta_data"], json!({"status_code": 200, "message": "OK"}));
    }

    #[test]
    fn bodies_without_response_pass_through() {
        assert!(wrap(&info(Method::GET, ""), StatusCode::NOT_FOUND, None, json!({"detail": "x"})).is_none());
        assert!(wrap(&info(Method::DELETE, ""), StatusCode::OK, None, json!({"response": {}})).is_none());
        assert!(wrap(&info(Method::GET, ""), StatusCode::OK, None, json!([1, 2])).is_none());
    }

    #[test]
    fn url_uses_forwarded_proto() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("api.example"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        let uri: Uri = "/api/v1/artists/3?x=1".parse().unwrap();
        assert_eq!(request_url(&headers, &uri), "https://api.example/api/v1/artists/3");
        assert_eq!(request_url(&HeaderMap::new(), &uri), "/api/v1/artists/3");
    }
}
