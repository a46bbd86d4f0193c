//! Client configuration options

use std::path::PathBuf;
use std::time::Duration;
use typed_builder::TypedBuilder;

use crate::error::{Result, SessionError};

// ============================================================================
// Environment
// ============================================================================

/// Environment variable holding the backend base URL (required)
pub const ENV_API_URL: &str = "TUTOR_API_URL";
/// Environment variable holding the OAuth client identifier (optional)
pub const ENV_GOOGLE_CLIENT_ID: &str = "TUTOR_GOOGLE_CLIENT_ID";
/// Environment variable holding the IANA timezone reported at sign-in
pub const ENV_TIMEZONE: &str = "TUTOR_TIMEZONE";
/// Environment variable holding the auth request timeout in seconds
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "TUTOR_REQUEST_TIMEOUT_SECS";
/// Environment variable overriding the session file location
pub const ENV_SESSION_FILE: &str = "TUTOR_SESSION_FILE";

const DEFAULT_TIMEZONE: &str = "UTC";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Client Config
// ============================================================================

/// Configuration shared by the session manager and the chat transport
///
/// ```
/// use tutor_session_sdk::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .api_base_url("https://api.example.edu")
///     .google_client_id("1234.apps.googleusercontent.com")
///     .build();
/// assert!(config.provider_enabled());
/// assert_eq!(config.endpoint("chat"), "https://api.example.edu/chat");
/// ```
#[derive(Debug, Clone, TypedBuilder)]
#[builder(
    builder_method(doc = "Create a new builder for ClientConfig"),
    builder_type(doc = "Builder for ClientConfig", vis = "pub"),
    build_method(doc = "Build the ClientConfig")
)]
pub struct ClientConfig {
    /// Backend base URL, e.g. `https://api.example.edu`
    #[builder(setter(into))]
    pub api_base_url: String,

    /// OAuth client identifier; `None` disables the identity provider
    #[builder(default, setter(strip_option, into))]
    pub google_client_id: Option<String>,

    /// IANA timezone sent with the device data at sign-in
    #[builder(default = DEFAULT_TIMEZONE.to_string(), setter(into))]
    pub timezone: String,

    /// Timeout for auth exchange and user fetch requests (never the chat stream)
    #[builder(default = DEFAULT_REQUEST_TIMEOUT)]
    pub request_timeout: Duration,

    /// Session file override; `None` uses the platform config directory
    #[builder(default, setter(strip_option, into))]
    pub session_file: Option<PathBuf>,
}

impl ClientConfig {
    /// Load configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidConfig` if the base URL is missing or a
    /// value cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidConfig` if the base URL is missing or a
    /// value cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_base_url = non_empty(ENV_API_URL)
            .ok_or_else(|| SessionError::invalid_config(format!("{ENV_API_URL} is not set")))?;

        let request_timeout = match non_empty(ENV_REQUEST_TIMEOUT_SECS) {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    SessionError::invalid_config(format!(
                        "{ENV_REQUEST_TIMEOUT_SECS} must be a number of seconds, got {raw:?}"
                    ))
                })?;
                Duration::from_secs(secs)
            }
            None => DEFAULT_REQUEST_TIMEOUT,
        };

        let google_client_id = non_empty(ENV_GOOGLE_CLIENT_ID);
        if google_client_id.is_none() {
            tracing::warn!("{ENV_GOOGLE_CLIENT_ID} not set, Google sign-in is disabled");
        }

        Ok(Self {
            api_base_url,
            google_client_id,
            timezone: non_empty(ENV_TIMEZONE).unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
            request_timeout,
            session_file: non_empty(ENV_SESSION_FILE).map(PathBuf::from),
        })
    }

    /// Whether an OAuth client identifier is configured
    #[must_use]
    pub fn provider_enabled(&self) -> bool {
        self.google_client_id.is_some()
    }

    /// Absolute URL of a backend endpoint
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_from_lookup_minimal() {
        let config = ClientConfig::from_lookup(lookup(&[(ENV_API_URL, "http://localhost:8000/")]))
            .unwrap();
        assert_eq!(config.api_base_url, "http://localhost:8000/");
        assert!(!config.provider_enabled());
        assert_eq!(config.timezone, "UTC");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.session_file.is_none());
    }

    #[test]
    fn test_from_lookup_missing_base_url() {
        let result = ClientConfig::from_lookup(lookup(&[(ENV_GOOGLE_CLIENT_ID, "abc")]));
        assert!(matches!(result, Err(SessionError::InvalidConfig(_))));
    }

    #[test]
    fn test_from_lookup_blank_client_id_disables_provider() {
        let config = ClientConfig::from_lookup(lookup(&[
            (ENV_API_URL, "http://localhost:8000"),
            (ENV_GOOGLE_CLIENT_ID, "   "),
        ]))
        .unwrap();
        assert!(!config.provider_enabled());
    }

    #[test]
    fn test_from_lookup_full() {
        let config = ClientConfig::from_lookup(lookup(&[
            (ENV_API_URL, "https://api.example.edu"),
            (ENV_GOOGLE_CLIENT_ID, "client-1"),
            (ENV_TIMEZONE, "Europe/Berlin"),
            (ENV_REQUEST_TIMEOUT_SECS, "5"),
            (ENV_SESSION_FILE, "/tmp/session.json"),
        ]))
        .unwrap();
        assert_eq!(config.google_client_id.as_deref(), Some("client-1"));
        assert_eq!(config.timezone, "Europe/Berlin");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.session_file, Some(PathBuf::from("/tmp/session.json")));
    }

    #[test]
    fn test_from_lookup_bad_timeout() {
        let result = ClientConfig::from_lookup(lookup(&[
            (ENV_API_URL, "https://api.example.edu"),
            (ENV_REQUEST_TIMEOUT_SECS, "soon"),
        ]));
        assert!(matches!(result, Err(SessionError::InvalidConfig(_))));
    }

    #[test]
    fn test_endpoint_joins_slashes() {
        let config = ClientConfig::builder()
            .api_base_url("http://localhost:8000/")
            .build();
        assert_eq!(config.endpoint("/auth/me"), "http://localhost:8000/auth/me");
    }
}
