use axum::{
    Json,
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};
use lettre::Address;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::{
    AppState,
    api::models::auth::{AuthResponse, CallbackQuery, LoginRequest, MagicLinkRequest, SessionResponse, WithCookies},
    auth::{
        cookies::{append_cookies, build_cookie, clear_cookie, read_cookie, session_cookies},
        current_user::CurrentUser,
        pkce,
        session::verify_access_token,
    },
    errors::Error,
};

/// How long a magic link's PKCE verifier is kept
const VERIFIER_TTL: Duration = Duration::from_secs(60 * 60);

/// Accept only site-relative paths so the callback cannot be used as an open redirect
pub(crate) fn safe_next(next: Option<&str>, default: &str) -> String {
    match next.map(str::trim) {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.starts_with("/\\") => path.to_string(),
        _ => default.to_string(),
    }
}

fn parse_email(email: &str) -> Result<String, Error> {
    let email = email.trim();
    email.parse::<Address>().map_err(|_| Error::BadRequest {
        message: "Invalid email address".to_string(),
    })?;
    Ok(email.to_string())
}

/// Send a sign-in link
#[utoipa::path(
    post,
    path = "/auth/magic-link",
    tag = "auth",
    request_body = MagicLinkRequest,
    responses(
        (status = 200, description = "Link sent", body = AuthResponse),
        (status = 400, description = "Invalid email or unknown account"),
        (status = 502, description = "Auth provider unavailable"),
    )
)]
#[instrument(skip_all)]
pub async fn magic_link(State(state): State<AppState>, Json(request): Json<MagicLinkRequest>) -> Result<WithCookies<AuthResponse>, Error> {
    let email = parse_email(&request.email)?;

    let mut redirect_to = state.config.auth_callback_url();
    if let Some(next) = request.next.as_deref() {
        let next = safe_next(Some(next), &state.config.auth.default_redirect);
        let encoded: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
        redirect_to = format!("{redirect_to}?next={encoded}");
    }

    let verifier = pkce::generate_verifier();
    state
        .auth_client
        .send_magic_link(&email, &redirect_to, &pkce::challenge_for(&verifier))
        .await?;

    let session = &state.config.auth.session;
    Ok(WithCookies {
        body: AuthResponse {
            message: "Check your email for the sign-in link".to_string(),
        },
        cookies: vec![build_cookie(session, &session.verifier_cookie_name, &verifier, VERIFIER_TTL)],
    })
}

/// Sign in with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = SessionResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Invalid credentials or account not allowed"),
        (status = 502, description = "Auth provider unavailable"),
    )
)]
#[instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<WithCookies<SessionResponse>, Error> {
    let email = parse_email(&request.email)?;
    if request.password.is_empty() {
        return Err(Error::BadRequest {
            message: "Password is required".to_string(),
        });
    }

    let tokens = state.auth_client.sign_in_with_password(&email, &request.password).await?;
    let user = verify_access_token(&tokens.access_token, &state.config.auth)?;
    info!("Admin {} signed in with password", user.email);

    Ok(WithCookies {
        body: SessionResponse { user },
        cookies: session_cookies(&state.config.auth.session, &tokens).to_vec(),
    })
}

/// Complete a magic link sign-in and redirect into the admin area
#[utoipa::path(
    get,
    path = "/auth/callback",
    tag = "auth",
    params(CallbackQuery),
    responses(
        (status = 303, description = "Redirect to `next` on success, to the login page otherwise"),
    )
)]
#[instrument(skip_all)]
pub async fn callback(State(state): State<AppState>, Query(query): Query<CallbackQuery>, headers: HeaderMap) -> Response {
    let auth = &state.config.auth;
    let clear_verifier = clear_cookie(&auth.session, &auth.session.verifier_cookie_name);

    let outcome = match (query.code.as_deref(), read_cookie(&headers, &auth.session.verifier_cookie_name)) {
        (Some(code), Some(verifier)) if !code.is_empty() => match state.auth_client.exchange_code(code, verifier).await {
            Ok(tokens) => verify_access_token(&tokens.access_token, auth).map(|user| (user, tokens)),
            Err(e) => Err(e),
        },
        (Some(_), None) => Err(Error::BadRequest {
            message: "Sign-in link opened without a pending request".to_string(),
        }),
        _ => Err(Error::BadRequest {
            message: "Missing sign-in code".to_string(),
        }),
    };

    match outcome {
        Ok((user, tokens)) => {
            info!("Admin {} signed in with magic link", user.email);
            let target = safe_next(query.next.as_deref(), &auth.default_redirect);
            let mut response = Redirect::to(&target).into_response();
            append_cookies(&mut response, session_cookies(&auth.session, &tokens));
            append_cookies(&mut response, [clear_verifier]);
            response
        }
        Err(e) => {
            warn!("Magic link sign-in failed: {}", e);
            let mut response = Redirect::to(&auth.login_path).into_response();
            append_cookies(&mut response, [clear_verifier]);
            response
        }
    }
}

/// Sign out and clear the session cookies
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Signed out", body = AuthResponse),
    )
)]
#[instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> WithCookies<AuthResponse> {
    let session = &state.config.auth.session;

    if let Some(token) = read_cookie(&headers, &session.cookie_name) {
        // Revoking upstream is best effort; the cookies go either way
        if let Err(e) = state.auth_client.sign_out(token).await {
            warn!("Provider sign-out failed: {}", e);
        }
    }

    WithCookies {
        body: AuthResponse {
            message: "Signed out".to_string(),
        },
        cookies: vec![
            clear_cookie(session, &session.cookie_name),
            clear_cookie(session, &session.refresh_cookie_name),
        ],
    }
}

/// The signed-in admin
#[utoipa::path(
    get,
    path = "/auth/session",
    tag = "auth",
    responses(
        (status = 200, description = "Current session", body = SessionResponse),
        (status = 401, description = "Not signed in"),
    ),
    security(("CookieAuth" = []), ("BearerAuth" = []))
)]
#[instrument(skip_all)]
pub async fn session(user: CurrentUser) -> Json<SessionResponse> {
    Json(SessionResponse { user })
}
