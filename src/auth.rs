//! Shared-secret bearer authentication.
//!
//! Every protected route requires `Authorization: Bearer <secret>` with the
//! secret configured at startup. This runs before any handler touches the
//! database. Per-task ownership is checked separately by the task store.

use crate::error::{ApiError, ApiResult};
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use std::fmt;
use std::sync::Arc;

/// Accepts exactly one `Authorization` header value.
#[derive(Clone)]
pub struct BearerAuth {
    expected: String,
}

impl BearerAuth {
    pub fn new(secret: &str) -> Self {
        Self {
            expected: format!("Bearer {}", secret),
        }
    }

    /// Check a raw `Authorization` header value.
    pub fn verify(&self, header: Option<&str>) -> ApiResult<()> {
        match header {
            Some(value) if constant_time_eq(value.as_bytes(), self.expected.as_bytes()) => Ok(()),
            Some(_) => {
                tracing::warn!("Rejected request with invalid bearer token");
                Err(ApiError::unauthorized())
            }
            None => {
                tracing::warn!("Rejected request without Authorization header");
                Err(ApiError::unauthorized())
            }
        }
    }
}

impl fmt::Debug for BearerAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerAuth").finish_non_exhaustive()
    }
}

/// Middleware rejecting requests that fail [`BearerAuth::verify`].
pub async fn require_bearer(
    State(auth): State<Arc<BearerAuth>>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    auth.verify(header)?;
    Ok(next.run(request).await)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
