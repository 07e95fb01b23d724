use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::{dto::caller::Caller, error::AppError};

/// Header carrying the authenticated user id, set by the gateway.
pub const USER_ID_HEADER: &str = "X-User-Id";
/// Optional header carrying the authenticated user's display name.
pub const USER_NAME_HEADER: &str = "X-User-Name";

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized(format!("missing `{USER_ID_HEADER}` header")))?;
        let user_id = raw
            .to_str()
            .ok()
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .ok_or_else(|| {
                AppError::Unauthorized(format!("`{USER_ID_HEADER}` header is not a valid id"))
            })?;

        let name = parts
            .headers
            .get(USER_NAME_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_owned);

        Ok(Caller { user_id, name })
    }
}
