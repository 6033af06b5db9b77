use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;

/// Header carrying the authenticated user id, set by the upstream auth layer
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the user's verified phone number
pub const USER_PHONE_HEADER: &str = "x-user-phone";
/// Header carrying the role granted by the upstream auth layer
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const ADMIN_ROLE: &str = "admin";

/// The authenticated caller. A phone number is required because it becomes
/// the wallet's contact handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub phone: String,
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header_value(parts, USER_ID_HEADER).ok_or(AppError::Unauthorized)?;
        let phone = header_value(parts, USER_PHONE_HEADER).ok_or(AppError::PhoneRequired)?;
        Ok(Caller { user_id, phone })
    }
}

/// An authenticated caller holding the admin role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminCaller {
    pub user_id: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminCaller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header_value(parts, USER_ID_HEADER).ok_or(AppError::Unauthorized)?;
        match header_value(parts, USER_ROLE_HEADER) {
            Some(role) if role.eq_ignore_ascii_case(ADMIN_ROLE) => Ok(AdminCaller { user_id }),
            _ => Err(AppError::Forbidden),
        }
    }
}
