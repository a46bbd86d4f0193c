//! Backend identity exchange client
//!
//! Trades the identity provider's artifact for a backend session token and
//! fetches the user the token belongs to.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::provider::{MessagingTokenSource, NoMessaging};
use super::token::CredentialPair;
use crate::error::{Result, SessionError};
use crate::types::{ClientConfig, User, UserRole};
use crate::utils::error_message_from_body;

const EXCHANGE_PATH: &str = "auth/firebase";
const CURRENT_USER_PATH: &str = "auth/me";

/// Device details sent with every exchange
#[derive(Debug, Serialize)]
struct DeviceData {
    #[serde(skip_serializing_if = "Option::is_none")]
    fcm_token: Option<String>,
    timezone: String,
}

/// Body of the exchange request
#[derive(Debug, Serialize)]
struct ExchangeRequest<'a> {
    firebase_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    device_data: DeviceData,
}

/// Response from the exchange endpoint
#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    message: Option<String>,
}

/// The user endpoint answers with either a bare user or `{ "user": ... }`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UserEnvelope {
    Wrapped { user: User },
    Bare(User),
}

impl From<UserEnvelope> for User {
    fn from(envelope: UserEnvelope) -> Self {
        match envelope {
            UserEnvelope::Wrapped { user } | UserEnvelope::Bare(user) => user,
        }
    }
}

/// Successful exchange result
#[derive(Debug, Clone)]
pub struct ExchangeOutcome {
    /// Credential pair to persist
    pub credentials: CredentialPair,
    /// User the session belongs to
    pub user: User,
    /// Token type reported by the backend (usually "bearer")
    pub token_type: String,
    /// Session lifetime in seconds, if reported
    pub expires_in: Option<u64>,
}

/// Builder for [`IdentityExchangeClient`]
#[derive(Default)]
pub struct IdentityExchangeClientBuilder {
    config: Option<ClientConfig>,
    messaging: Option<Arc<dyn MessagingTokenSource>>,
    http_client: Option<reqwest::Client>,
}

impl IdentityExchangeClientBuilder {
    /// Create a new builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the client configuration
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the device push-token capability
    #[must_use]
    pub fn messaging(mut self, messaging: Arc<dyn MessagingTokenSource>) -> Self {
        self.messaging = Some(messaging);
        self
    }

    /// Reuse an existing HTTP client
    #[must_use]
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Build the exchange client
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidConfig` if no configuration was given.
    pub fn build(self) -> Result<IdentityExchangeClient> {
        let config = self
            .config
            .ok_or_else(|| SessionError::invalid_config("exchange client needs a ClientConfig"))?;
        Ok(IdentityExchangeClient {
            request_timeout: config.request_timeout,
            config,
            messaging: self.messaging.unwrap_or_else(|| Arc::new(NoMessaging)),
            http_client: self.http_client.unwrap_or_default(),
        })
    }
}

/// Client for the backend's identity exchange and user endpoints
#[derive(Clone)]
pub struct IdentityExchangeClient {
    config: ClientConfig,
    messaging: Arc<dyn MessagingTokenSource>,
    http_client: reqwest::Client,
    request_timeout: Duration,
}

impl std::fmt::Debug for IdentityExchangeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityExchangeClient")
            .field("api_base_url", &self.config.api_base_url)
            .finish_non_exhaustive()
    }
}

impl IdentityExchangeClient {
    /// Create an exchange client with no messaging capability
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            request_timeout: config.request_timeout,
            config,
            messaging: Arc::new(NoMessaging),
            http_client: reqwest::Client::new(),
        }
    }

    /// Create a builder for custom configuration
    #[must_use]
    pub fn builder() -> IdentityExchangeClientBuilder {
        IdentityExchangeClientBuilder::new()
    }

    /// Get the client configuration
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Exchange an identity-provider artifact for a backend session
    ///
    /// Performs one exchange round trip, then fetches the user with the new
    /// session token.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::BackendRejected` if the backend refuses the
    /// artifact, or `SessionError::Network` if it cannot be reached.
    pub async fn exchange_authorization_code(
        &self,
        code: &str,
        role: Option<&UserRole>,
    ) -> Result<ExchangeOutcome> {
        let body = ExchangeRequest {
            firebase_token: code,
            role: role.map(UserRole::as_str),
            device_data: DeviceData {
                fcm_token: self.messaging.device_token().await,
                timezone: self.config.timezone.clone(),
            },
        };

        tracing::debug!(role = ?body.role, "Exchanging identity token with backend");

        let response = self
            .http_client
            .post(self.config.endpoint(EXCHANGE_PATH))
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if status.is_server_error() {
            return Err(SessionError::network(format!(
                "exchange endpoint returned {status}"
            )));
        }
        if !status.is_success() {
            let fallback = status.canonical_reason().unwrap_or("exchange rejected");
            return Err(SessionError::backend_rejected(
                status.as_u16(),
                error_message_from_body(&response_text, fallback),
            ));
        }

        let parsed: ExchangeResponse = serde_json::from_str(&response_text).map_err(|e| {
            SessionError::backend_rejected(
                status.as_u16(),
                format!("unreadable exchange response: {e}"),
            )
        })?;

        if parsed
            .status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("error"))
        {
            return Err(SessionError::backend_rejected(
                status.as_u16(),
                parsed
                    .message
                    .unwrap_or_else(|| "exchange refused".to_string()),
            ));
        }

        let access_token = parsed
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                SessionError::backend_rejected(status.as_u16(), "exchange returned no access token")
            })?;

        let user = self.fetch_current_user(&access_token).await?;
        tracing::debug!(user_id = %user.id, "Identity exchange succeeded");

        Ok(ExchangeOutcome {
            credentials: CredentialPair::new(code, access_token),
            user,
            token_type: parsed.token_type.unwrap_or_else(|| "bearer".to_string()),
            expires_in: parsed.expires_in,
        })
    }

    /// Fetch the user a session token belongs to
    ///
    /// # Errors
    ///
    /// Returns `SessionError::BackendRejected` if the token is invalid or
    /// expired, or `SessionError::Network` if the backend cannot be reached.
    pub async fn fetch_current_user(&self, session_token: &str) -> Result<User> {
        let response = self
            .http_client
            .get(self.config.endpoint(CURRENT_USER_PATH))
            .timeout(self.request_timeout)
            .bearer_auth(session_token)
            .send()
            .await?;

        let status = response.status();
        if status.is_server_error() {
            return Err(SessionError::network(format!(
                "user endpoint returned {status}"
            )));
        }
        if !status.is_success() {
            let fallback = status.canonical_reason().unwrap_or("session rejected");
            let body = response.text().await.unwrap_or_default();
            return Err(SessionError::backend_rejected(
                status.as_u16(),
                error_message_from_body(&body, fallback),
            ));
        }

        let body = response.text().await?;
        let envelope: UserEnvelope = serde_json::from_str(&body).map_err(|e| {
            SessionError::backend_rejected(status.as_u16(), format!("unreadable user: {e}"))
        })?;
        Ok(envelope.into())
    }
}
