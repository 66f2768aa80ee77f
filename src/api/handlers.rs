//! Illustrative API handlers (§4.3, §8 scenario 5). The registry itself is
//! agnostic to what's registered here; these exist so the crate is runnable
//! out of the box and so the `api` route type has something to point at.

use axum::body::Body;
use http::{Response, StatusCode};

/// Returns `{"status":"ok"}`. Used by the readiness scenario in §8 and as a
/// template for real handlers registered by embedders of this crate.
pub async fn health(_req: http::Request<Body>) -> Response<Body> {
	Response::builder()
		.status(StatusCode::OK)
		.header(http::header::CONTENT_TYPE, "application/json")
		.body(Body::from(r#"{"status":"ok"}"#))
		.expect("static response is valid")
}

/// Echoes the request path back as JSON. Kept around as a second registered
/// name so duplicate-registration and lookup-miss paths have more than one
/// real entry to exercise in tests.
pub async fn echo_path(req: http::Request<Body>) -> Response<Body> {
	let body = serde_json::json!({ "path": req.uri().path() }).to_string();
	Response::builder()
		.status(StatusCode::OK)
		.header(http::header::CONTENT_TYPE, "application/json")
		.body(Body::from(body))
		.expect("static response is valid")
}
