use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use serde::Serialize;
use tracing::{instrument, trace};
use utoipa::ToSchema;

use crate::{
    AppState,
    auth::{cookies::read_cookie, session},
    errors::{Error, Result},
    types::UserId,
};

/// The signed-in administrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CurrentUser {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub email: String,
}

/// Access token from the session cookie, falling back to an `Authorization: Bearer` header
pub(crate) fn access_token<'a>(parts: &'a Parts, cookie_name: &str) -> Option<&'a str> {
    read_cookie(&parts.headers, cookie_name).or_else(|| {
        parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
    })
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        // Already resolved (and possibly refreshed) by the admin gate
        if let Some(user) = parts.extensions.get::<CurrentUser>() {
            trace!("Using user resolved by the session gate");
            return Ok(user.clone());
        }

        let auth = &state.config.auth;
        let token = access_token(parts, &auth.session.cookie_name).ok_or(Error::Unauthenticated { message: None })?;
        session::verify_access_token(token, auth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(name: &str, value: &str) -> Parts {
        let (parts, _) = Request::builder().header(name, value).body(()).unwrap().into_parts();
        parts
    }

    #[test]
    fn test_access_token_prefers_cookie() {
        let parts = parts_with("cookie", "atelier_session=from-cookie");
        assert_eq!(access_token(&parts, "atelier_session"), Some("from-cookie"));
    }

    #[test]
    fn test_access_token_from_bearer_header() {
        let parts = parts_with("authorization", "Bearer from-header");
        assert_eq!(access_token(&parts, "atelier_session"), Some("from-header"));

        let parts = parts_with("authorization", "Basic dXNlcjpwYXNz");
        assert_eq!(access_token(&parts, "atelier_session"), None);
    }
}
