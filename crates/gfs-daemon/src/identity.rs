//! Caller identity.
//!
//! The upstream auth proxy authenticates the session and forwards the user
//! id in `x-gfs-user`. Handlers take [`AuthUser`] and use it as
//! `approved_by` / `created_by`; client-supplied actor fields are never
//! trusted.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::error::ApiError;

pub const USER_HEADER: &str = "x-gfs-user";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_HEADER)
            .ok_or_else(|| ApiError::unauthorized(format!("missing {USER_HEADER} header")))?;
        let user = raw
            .to_str()
            .map_err(|_| ApiError::unauthorized(format!("{USER_HEADER} is not valid text")))?
            .trim();
        if user.is_empty() {
            return Err(ApiError::unauthorized(format!("{USER_HEADER} is blank")));
        }
        Ok(AuthUser(user.to_string()))
    }
}
