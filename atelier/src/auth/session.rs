//! Verification of access tokens issued by the auth provider.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::{auth::current_user::CurrentUser, config::AuthConfig, errors::Error, types::UserId};

/// Audience the provider stamps on tokens for signed-in users
pub const AUTHENTICATED_AUDIENCE: &str = "authenticated";

/// Claims carried by a provider access token
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: UserId,
    #[serde(default)]
    pub email: Option<String>,
    pub aud: String,
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Verify an access token and resolve the admin it belongs to.
///
/// The signature, expiry and audience are all checked. When `allowed_emails` is non-empty the
/// token's email must be on the list (case-insensitive).
pub fn verify_access_token(token: &str, config: &AuthConfig) -> Result<CurrentUser, Error> {
    let secret = config
        .jwt_secret
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Internal {
            operation: "verify session: auth.jwt_secret is required".to_string(),
        })?;

    let key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[AUTHENTICATED_AUDIENCE]);

    let token_data = decode::<SessionClaims>(token, &key, &validation).map_err(|e| match e.kind() {
        // Client errors (401) - malformed tokens, invalid claims, expired tokens
        jsonwebtoken::errors::ErrorKind::InvalidToken
        | jsonwebtoken::errors::ErrorKind::InvalidSignature
        | jsonwebtoken::errors::ErrorKind::ExpiredSignature
        | jsonwebtoken::errors::ErrorKind::MissingRequiredClaim(_)
        | jsonwebtoken::errors::ErrorKind::InvalidIssuer
        | jsonwebtoken::errors::ErrorKind::InvalidAudience
        | jsonwebtoken::errors::ErrorKind::InvalidSubject
        | jsonwebtoken::errors::ErrorKind::ImmatureSignature
        | jsonwebtoken::errors::ErrorKind::Base64(_)
        | jsonwebtoken::errors::ErrorKind::Json(_)
        | jsonwebtoken::errors::ErrorKind::Utf8(_)
        | jsonwebtoken::errors::ErrorKind::InvalidAlgorithm => Error::Unauthenticated { message: None },

        // Server errors (500) - key issues, internal failures
        jsonwebtoken::errors::ErrorKind::InvalidEcdsaKey
        | jsonwebtoken::errors::ErrorKind::InvalidRsaKey(_)
        | jsonwebtoken::errors::ErrorKind::RsaFailedSigning
        | jsonwebtoken::errors::ErrorKind::InvalidAlgorithmName
        | jsonwebtoken::errors::ErrorKind::InvalidKeyFormat
        | jsonwebtoken::errors::ErrorKind::MissingAlgorithm
        | jsonwebtoken::errors::ErrorKind::Crypto(_) => Error::Internal {
            operation: format!("JWT verification: {e}"),
        },

        _ => Error::Internal {
            operation: format!("JWT verification (unknown error): {e}"),
        },
    })?;

    let claims = token_data.claims;
    let email = claims.email.unwrap_or_default();

    if !config.allowed_emails.is_empty() && !config.allowed_emails.iter().any(|allowed| allowed.eq_ignore_ascii_case(&email)) {
        tracing::warn!("Rejected session for {} - not in auth.allowed_emails", email);
        return Err(Error::Unauthenticated {
            message: Some("This account is not allowed to manage the portfolio".to_string()),
        });
    }

    Ok(CurrentUser { id: claims.sub, email })
}
