//! Admin authentication.
//!
//! Identities live with the hosted auth provider. The artist signs in either with a magic link
//! (PKCE flow, see [`pkce`]) or with email and password; both end with the provider issuing an
//! access token and a refresh token, which this service stores in HttpOnly cookies.
//!
//! Every admin route sits behind [`middleware::require_admin_session`], which verifies the
//! access token's signature, expiry and audience server-side and renews it with the refresh
//! token when it has expired. Handlers read the signed-in admin through the
//! [`current_user::CurrentUser`] extractor.
//!
//! # Modules
//!
//! - [`cookies`]: reading and building the session cookies
//! - [`current_user`]: extractor for the signed-in admin
//! - [`middleware`]: the admin route gate
//! - [`pkce`]: verifier and challenge generation
//! - [`provider`]: HTTP client for the auth provider
//! - [`session`]: access token verification

pub mod cookies;
pub mod current_user;
pub mod middleware;
pub mod pkce;
pub mod provider;
pub mod session;
