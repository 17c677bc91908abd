use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::app::AppState;
use crate::types::Role;

/// Resolves the caller's [`Role`] and stores it in request extensions.
/// Never rejects a request: unverifiable credentials become guests.
pub async fn resolve_role_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    let credential = extract_authorization(&headers);
    let role = state.authorizer.resolve_role(credential).await;

    request.extensions_mut().insert(role);
    next.run(request).await
}

/// Raw Authorization header value, if present and valid UTF-8
fn extract_authorization(headers: &HeaderMap) -> Option<&str> {
    headers.get(AUTHORIZATION)?.to_str().ok()
}
