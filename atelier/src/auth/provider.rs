//! HTTP client for the hosted auth provider (GoTrue API).
//!
//! The provider owns identities and issues the access and refresh tokens; this service only
//! relays the sign-in flows and verifies the tokens it gets back (see [`super::session`]).

use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::{config::AuthConfig, errors::Error, types::UserId};

const SERVICE: &str = "auth";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Tokens returned by a successful sign-in, code exchange or refresh
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSession {
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime of the access token in seconds
    pub expires_in: u64,
    pub user: ProviderUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderUser {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
}

/// The provider reports errors under a handful of field names depending on the endpoint
#[derive(Debug, Default, Deserialize)]
struct ProviderErrorBody {
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

impl ProviderErrorBody {
    fn into_message(self) -> Option<String> {
        self.error_description.or(self.msg).or(self.message).or(self.error)
    }
}

pub struct GoTrueClient {
    client: Client,
    base_url: Url,
    anon_key: String,
}

impl GoTrueClient {
    pub fn new(config: &AuthConfig) -> Result<Self, Error> {
        crate::install_crypto_provider();
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Internal {
                operation: format!("create auth HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: config.provider_url.clone(),
            anon_key: config.anon_key.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url.as_str().trim_end_matches('/'))
    }

    fn endpoint_with_query(&self, path: &str, key: &str, value: &str) -> Result<Url, Error> {
        let mut url = Url::parse(&self.endpoint(path)).map_err(|e| Error::Internal {
            operation: format!("build auth URL: {e}"),
        })?;
        url.query_pairs_mut().append_pair(key, value);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder, bearer: Option<&str>) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer.unwrap_or(&self.anon_key))
    }

    /// Send a sign-in link to an existing account. New accounts are never created.
    #[instrument(skip(self, code_challenge), err)]
    pub async fn send_magic_link(&self, email: &str, redirect_to: &str, code_challenge: &str) -> Result<(), Error> {
        let url = self.endpoint_with_query("otp", "redirect_to", redirect_to)?;
        let request = self.client.post(url).json(&json!({
            "email": email,
            "create_user": false,
            "code_challenge": code_challenge,
            "code_challenge_method": "s256",
        }));
        let response = self.authorize(request, None).send().await.map_err(transport_error)?;
        check(response, |message| Error::BadRequest { message }).await?;
        debug!("Magic link requested");
        Ok(())
    }

    #[instrument(skip(self, password), err)]
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<ProviderSession, Error> {
        self.token_grant("password", json!({ "email": email, "password": password })).await
    }

    /// Exchange the code from a magic link callback for a session
    #[instrument(skip_all, err)]
    pub async fn exchange_code(&self, auth_code: &str, code_verifier: &str) -> Result<ProviderSession, Error> {
        self.token_grant("pkce", json!({ "auth_code": auth_code, "code_verifier": code_verifier }))
            .await
    }

    #[instrument(skip_all, err)]
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<ProviderSession, Error> {
        self.token_grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
    }

    /// Revoke the session behind an access token
    #[instrument(skip_all, err)]
    pub async fn sign_out(&self, access_token: &str) -> Result<(), Error> {
        let request = self.client.post(self.endpoint("logout"));
        let response = self.authorize(request, Some(access_token)).send().await.map_err(transport_error)?;
        check(response, |message| Error::Unauthenticated { message: Some(message) }).await?;
        Ok(())
    }

    async fn token_grant(&self, grant_type: &str, body: serde_json::Value) -> Result<ProviderSession, Error> {
        let url = self.endpoint_with_query("token", "grant_type", grant_type)?;
        let request = self.client.post(url).json(&body);
        let response = self.authorize(request, None).send().await.map_err(transport_error)?;
        let response = check(response, |message| Error::Unauthenticated { message: Some(message) }).await?;
        response.json::<ProviderSession>().await.map_err(|e| Error::Upstream {
            service: SERVICE.to_string(),
            message: format!("decode session: {e}"),
        })
    }
}

fn transport_error(e: reqwest::Error) -> Error {
    Error::Upstream {
        service: SERVICE.to_string(),
        message: e.to_string(),
    }
}

/// Map a non-success response: 4xx through `client_error`, anything else to [`Error::Upstream`]
async fn check(response: Response, client_error: impl FnOnce(String) -> Error) -> Result<Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ProviderErrorBody>(&body)
        .ok()
        .and_then(ProviderErrorBody::into_message)
        .unwrap_or_else(|| format!("status {}", status.as_u16()));

    if status.is_client_error() && status.as_u16() != 429 {
        Err(client_error(message))
    } else {
        Err(Error::Upstream {
            service: SERVICE.to_string(),
            message,
        })
    }
}
