//! Bearer credential extraction.
//!
//! Pulls the opaque token out of the Authorization header; verification is
//! the identity resolver's job, so handlers call
//! `state.identity.resolve(&token.0)` themselves.

use access_core::error::AppError;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};

#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Unauthenticated(anyhow::anyhow!("Missing Authorization header"))
            })?;

        let token = header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Unauthenticated(anyhow::anyhow!("Authorization header is not a bearer token"))
        })?;

        if token.is_empty() {
            return Err(AppError::Unauthenticated(anyhow::anyhow!(
                "Empty bearer token"
            )));
        }

        Ok(BearerToken(token.to_string()))
    }
}
