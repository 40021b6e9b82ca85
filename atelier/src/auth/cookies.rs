//! Reading and writing the auth cookies.

use axum::{
    http::{HeaderMap, HeaderValue, header},
    response::Response,
};
use std::time::Duration;
use tracing::warn;

use crate::{auth::provider::ProviderSession, config::SessionConfig};

/// Value of the named cookie, if the request carries it.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(cookie_name, _)| *cookie_name == name)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

/// A `Set-Cookie` value for an HttpOnly cookie scoped to the whole site.
pub fn build_cookie(session: &SessionConfig, name: &str, value: &str, max_age: Duration) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite={}; Max-Age={}",
        name,
        value,
        same_site(&session.cookie_same_site),
        max_age.as_secs()
    );
    if session.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// The access and refresh cookies for a freshly issued provider session.
pub fn session_cookies(session: &SessionConfig, tokens: &ProviderSession) -> [String; 2] {
    [
        build_cookie(session, &session.cookie_name, &tokens.access_token, session.timeout),
        build_cookie(session, &session.refresh_cookie_name, &tokens.refresh_token, session.timeout),
    ]
}

/// A `Set-Cookie` value that removes the named cookie.
pub fn clear_cookie(session: &SessionConfig, name: &str) -> String {
    build_cookie(session, name, "", Duration::ZERO)
}

/// Add `Set-Cookie` headers to a response
pub fn append_cookies(response: &mut Response, cookies: impl IntoIterator<Item = String>) {
    for cookie in cookies {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => warn!("Dropping cookie that is not a valid header value: {}", e),
        }
    }
}

fn same_site(value: &str) -> &'static str {
    match value {
        "strict" => "Strict",
        "none" => "None",
        _ => "Lax",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_read_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; atelier_session=abc.def; empty="));

        assert_eq!(read_cookie(&headers, "atelier_session"), Some("abc.def"));
        assert_eq!(read_cookie(&headers, "theme"), Some("dark"));
        assert_eq!(read_cookie(&headers, "empty"), None);
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_read_cookie_across_headers() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("a=1"));
        headers.append(header::COOKIE, HeaderValue::from_static("b=2"));
        assert_eq!(read_cookie(&headers, "b"), Some("2"));
    }

    #[test]
    fn test_build_and_clear_cookie() {
        let session = SessionConfig::default();
        assert_eq!(
            build_cookie(&session, "atelier_session", "tok", Duration::from_secs(60)),
            "atelier_session=tok; Path=/; HttpOnly; SameSite=Lax; Max-Age=60; Secure"
        );

        let insecure = SessionConfig {
            cookie_secure: false,
            cookie_same_site: "strict".to_string(),
            ..Default::default()
        };
        assert_eq!(
            clear_cookie(&insecure, "atelier_pkce"),
            "atelier_pkce=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0"
        );
    }
}
