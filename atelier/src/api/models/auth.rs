//! API request/response models for admin sign-in.

use crate::auth::{cookies::append_cookies, current_user::CurrentUser};
use axum::{
    Json,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Request a sign-in link by email
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct MagicLinkRequest {
    #[schema(example = "artist@example.com")]
    pub email: String,
    /// Site-relative path to land on after following the link
    #[schema(example = "/admin/works")]
    pub next: Option<String>,
}

/// Sign in with email and password
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "artist@example.com")]
    pub email: String,
    pub password: String,
}

/// Query string the provider appends when a magic link is followed
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct CallbackQuery {
    /// One-time code to exchange for a session
    pub code: Option<String>,
    /// Site-relative path to land on after sign-in
    pub next: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionResponse {
    pub user: CurrentUser,
}

/// A JSON body sent together with `Set-Cookie` headers
pub struct WithCookies<T> {
    pub body: T,
    pub cookies: Vec<String>,
}

impl<T: Serialize> IntoResponse for WithCookies<T> {
    fn into_response(self) -> Response {
        let mut response = Json(self.body).into_response();
        append_cookies(&mut response, self.cookies);
        response
    }
}
