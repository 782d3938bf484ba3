//! Bearer-token authentication seam.
//!
//! Token validation belongs to an external identity collaborator (an OIDC
//! provider); the services only extract the bearer token and pass or
//! reject based on the collaborator's verdict. No authorization logic
//! lives here.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use thiserror::Error;
use tracing::trace;

use crate::errors::ApiError;
use crate::state::AppState;

/// An authenticated caller, opaque to the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Subject reported by the identity collaborator.
    pub subject: String,
}

/// Errors from the identity collaborator.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token failed validation.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// No bearer token was presented.
    #[error("Missing bearer token")]
    MissingToken,
}

/// Verdict provider for bearer tokens.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Validate the bearer token, if any, and return the caller identity.
    async fn authenticate(&self, token: Option<&str>) -> Result<Principal, AuthError>;
}

/// Devmode authenticator accepting every request, including anonymous ones.
#[derive(Debug, Clone, Default)]
pub struct NoopAuthenticator;

#[async_trait]
impl Authenticator for NoopAuthenticator {
    async fn authenticate(&self, token: Option<&str>) -> Result<Principal, AuthError> {
        Ok(Principal {
            subject: token.unwrap_or("anonymous").to_string(),
        })
    }
}

/// Middleware gating every document route on the collaborator's verdict.
pub(crate) async fn require_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let principal = state
        .authenticator
        .authenticate(token)
        .await
        .map_err(|err| ApiError::Unauthorized(err.to_string()))?;

    trace!(subject = %principal.subject, "Authenticated request");
    Ok(next.run(request).await)
}
