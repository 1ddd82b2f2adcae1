//! OAuth2 authorization-code flow against the Box token endpoint.

use reqwest::{Client, StatusCode, Url};
use tracing::{debug, info, warn};

use crate::config::{Credentials, Endpoints};
use crate::error::AuthError;
use crate::models::{TokenErrorResponse, TokenResponse};

/// Bearer token returned by a successful exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for the `Authorization` header.
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Turns authorization codes into access tokens.
///
/// Codes are single use, so a failed exchange is never retried.
#[derive(Clone)]
pub struct TokenExchanger {
    credentials: Credentials,
    authorize_url: String,
    token_url: String,
    http: Client,
}

impl TokenExchanger {
    pub fn new(credentials: Credentials, endpoints: &Endpoints) -> Self {
        Self::with_client(Client::new(), credentials, endpoints)
    }

    pub fn with_client(http: Client, credentials: Credentials, endpoints: &Endpoints) -> Self {
        Self {
            credentials,
            authorize_url: endpoints.authorize_url.clone(),
            token_url: endpoints.token_url.clone(),
            http,
        }
    }

    /// URL the user has to visit to grant access.
    pub fn authorize_url(&self, state: Option<&str>) -> Result<String, AuthError> {
        let mut params = vec![
            ("response_type", "code"),
            ("client_id", self.credentials.client_id.as_str()),
            ("redirect_uri", self.credentials.redirect_uri.as_str()),
        ];
        if let Some(state) = state {
            params.push(("state", state));
        }

        let url = Url::parse_with_params(&self.authorize_url, &params)
            .map_err(|e| AuthError::InvalidEndpoint(format!("{}: {}", self.authorize_url, e)))?;
        Ok(url.into())
    }

    /// Exchange an authorization code for an access token.
    pub async fn exchange(&self, code: &str) -> Result<AccessToken, AuthError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(AuthError::EmptyCode);
        }

        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("redirect_uri", self.credentials.redirect_uri.as_str()),
        ];

        debug!(token_url = %self.token_url, "Exchanging authorization code");
        let response = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            let provider_message = serde_json::from_str::<TokenErrorResponse>(&body)
                .unwrap_or_default()
                .error_description
                .unwrap_or_default();
            warn!(status = status.as_u16(), %provider_message, "Token exchange rejected");
            return Err(AuthError::TokenExchangeFailed {
                status_code: status.as_u16(),
                provider_message,
            });
        }

        let token_response: TokenResponse = response.json().await?;
        match token_response.access_token {
            Some(token) if !token.is_empty() => {
                info!(
                    expires_in = ?token_response.expires_in,
                    "Authorization code exchanged"
                );
                Ok(AccessToken(token))
            }
            _ => Err(AuthError::MissingAccessToken),
        }
    }
}
