//! Shared-secret guard for the internal trigger endpoints.
//!
//! The external scheduler (cron or a platform trigger) authenticates with a
//! constant `X-Internal-Token` header. There is no user auth here — user
//! identity is out of scope for this service.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use contrail_common::error::AppError;

use crate::state::AppState;

/// Axum extractor that admits a request only when the internal token
/// header matches the configured secret.
#[derive(Debug, Clone, Copy)]
pub struct InternalAuth;

impl FromRequestParts<AppState> for InternalAuth {
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let expected = state.config.internal_api_token.clone();
        let provided = parts
            .headers
            .get("x-internal-token")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        async move {
            match provided {
                Some(token) if token == expected => Ok(InternalAuth),
                _ => Err(AppError::Auth(
                    "Missing or invalid X-Internal-Token header".to_string(),
                )),
            }
        }
    }
}
