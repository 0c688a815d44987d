//! Responses produced by the router itself.
//!
//! # Responsibilities
//! - Not-found answer for routing misses
//! - Redirect to the index page, keeping the query string verbatim
//! - Method-not-allowed answer for non-GET requests to the index page
//!
//! # Design Decisions
//! - Redirects use `302 Found`
//! - Routing misses are answered, never logged as service errors

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

/// Plain `404 Not Found`.
pub fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

/// `405 Method Not Allowed` listing the `allow`ed methods.
pub fn method_not_allowed(allow: &'static str) -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, HeaderValue::from_static(allow))],
    )
        .into_response()
}

/// `302 Found` pointing at `location`.
pub fn redirect(location: &str) -> Response {
    match HeaderValue::try_from(location) {
        Ok(value) => {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::FOUND;
            response.headers_mut().insert(header::LOCATION, value);
            response
        }
        Err(_) => {
            tracing::warn!(location = %location, "Index URL is not a valid header value");
            not_found()
        }
    }
}

/// Append `query` to `url` unless it is empty.
pub fn with_query(url: &str, query: Option<&str>) -> String {
    match query {
        Some(q) if !q.is_empty() => format!("{url}?{q}"),
        _ => url.to_string(),
    }
}
