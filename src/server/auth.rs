//! Bearer API-key check for the `/v1` routes.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use secrecy::ExposeSecret;
use tracing::warn;

use crate::server::error::ApiError;
use crate::server::openai_api::AppState;

/// Reject requests whose bearer token does not match `server.api_key`.
/// Without a configured key every request passes.
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = &state.api_key else {
        return Ok(next.run(request).await);
    };

    match bearer_token(request.headers()) {
        None => {
            warn!(path = %request.uri().path(), "Missing API key");
            Err(ApiError::Unauthorized(
                "Missing API key. Pass it as 'Authorization: Bearer <key>'.".to_string(),
            ))
        }
        Some(key) if key == expected.expose_secret() => Ok(next.run(request).await),
        Some(_) => {
            warn!(path = %request.uri().path(), "Invalid API key");
            Err(ApiError::Unauthorized("Incorrect API key provided.".to_string()))
        }
    }
}

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(&headers("Bearer sk-abc")), Some("sk-abc"));
        assert_eq!(bearer_token(&headers("bearer  sk-abc ")), Some("sk-abc"));
        assert_eq!(bearer_token(&headers("Basic dXNlcg==")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
