//! HTTP Basic authentication against the static user directory.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Request, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ragdesk_core::access::{User, UserDirectory};

use crate::server::AppState;

/// Decode `Authorization: Basic <base64(name:password)>`.
pub fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value
        .strip_prefix("Basic ")
        .or_else(|| value.strip_prefix("basic "))?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (name, password) = decoded.split_once(':')?;
    Some((name.to_string(), password.to_string()))
}

pub fn authenticate(users: &UserDirectory, headers: &HeaderMap) -> Option<User> {
    let (name, password) = basic_credentials(headers)?;
    users.authenticate(&name, &password)
}

/// Rejects requests without valid credentials; stores the `User` in the
/// request extensions for handlers.
pub async fn require_user(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    match authenticate(&state.ctx.users, req.headers()) {
        Some(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        None => {
            tracing::warn!("🔒 Rejected request to {}: invalid credentials", req.uri().path());
            (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, "Basic realm=\"ragdesk\"")],
                axum::Json(serde_json::json!({"ok": false, "error": "Invalid credentials"})),
            )
                .into_response()
        }
    }
}
