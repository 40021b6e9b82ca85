//! The gate in front of every admin route.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::debug;

use crate::{
    AppState,
    auth::{
        cookies::{append_cookies, clear_cookie, read_cookie, session_cookies},
        current_user::{CurrentUser, access_token},
        session::verify_access_token,
    },
    errors::Error,
};

/// Require a verified admin session.
///
/// A valid access token lets the request through with the [`CurrentUser`] attached. An invalid
/// or expired one is renewed with the refresh cookie when present, and the new cookies are set on
/// the response. Otherwise browsers are redirected to the login page and API clients get a 401.
pub async fn require_admin_session(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let auth = &state.config.auth;
    let (mut parts, body) = request.into_parts();

    if let Some(token) = access_token(&parts, &auth.session.cookie_name) {
        match verify_access_token(token, auth) {
            Ok(user) => {
                parts.extensions.insert(user);
                return next.run(Request::from_parts(parts, body)).await;
            }
            Err(Error::Unauthenticated { message: Some(message) }) => {
                // Valid token for an account that may not manage the portfolio; refreshing won't help
                return reject(&state, &parts.headers, Some(message));
            }
            Err(Error::Unauthenticated { message: None }) => debug!("Access token rejected, trying refresh"),
            Err(e) => return e.into_response(),
        }
    }

    let Some(refresh_token) = read_cookie(&parts.headers, &auth.session.refresh_cookie_name) else {
        return reject(&state, &parts.headers, None);
    };

    let refreshed = match state.auth_client.refresh_session(refresh_token).await {
        Ok(session) => session,
        Err(Error::Unauthenticated { .. }) => return reject(&state, &parts.headers, None),
        Err(e) => return e.into_response(),
    };
    let user = match verify_access_token(&refreshed.access_token, auth) {
        Ok(user) => user,
        Err(Error::Unauthenticated { message }) => return reject(&state, &parts.headers, message),
        Err(e) => return e.into_response(),
    };
    debug!("Session refreshed for {}", user.email);

    parts.extensions.insert::<CurrentUser>(user);
    let mut response = next.run(Request::from_parts(parts, body)).await;
    append_cookies(&mut response, session_cookies(&auth.session, &refreshed));
    response
}

fn wants_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}

/// Unauthenticated response that also drops any stale session cookies
fn reject(state: &AppState, headers: &HeaderMap, message: Option<String>) -> Response {
    let session = &state.config.auth.session;
    let mut response = if wants_html(headers) {
        Redirect::to(&state.config.auth.login_path).into_response()
    } else {
        Error::Unauthenticated { message }.into_response()
    };

    let stale = [&session.cookie_name, &session.refresh_cookie_name]
        .into_iter()
        .filter(|name| read_cookie(headers, name).is_some())
        .map(|name| clear_cookie(session, name));
    append_cookies(&mut response, stale);
    response
}
