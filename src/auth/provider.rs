//! Identity provider seam
//!
//! The external identity provider is a black box reached through one
//! callback contract: it either yields an authorization artifact (the
//! identity token) or fails. [`IdentityProvider`] expresses that contract;
//! [`BrowserCodeProvider`] implements it by sending the user through the
//! provider's consent page and reading back the code they paste.

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
use std::io::{BufRead, Write};

use crate::error::{Result, SessionError};
use crate::types::ClientConfig;

const DEFAULT_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const DEFAULT_REDIRECT_URI: &str = "http://localhost/auth/callback";
const DEFAULT_SCOPES: &str = "openid email profile";

/// Artifact returned by a successful provider authorization
#[derive(Clone, PartialEq, Eq)]
pub struct IdentityGrant {
    /// Token or code to exchange with the backend
    pub identity_token: String,
}

impl IdentityGrant {
    /// Create a grant
    pub fn new(identity_token: impl Into<String>) -> Self {
        Self {
            identity_token: identity_token.into(),
        }
    }
}

impl std::fmt::Debug for IdentityGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityGrant").finish_non_exhaustive()
    }
}

/// External identity provider
///
/// Denial, cancellation, and provider-side failures are all reported as
/// `SessionError::Exchange` so callers can tell them apart from backend
/// rejections.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Run the provider's authorization flow
    ///
    /// # Errors
    /// Returns `SessionError::Exchange` if the user declines or the provider fails
    async fn authorize(&self) -> Result<IdentityGrant>;
}

/// Provider used when no OAuth client identifier is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledProvider;

#[async_trait]
impl IdentityProvider for DisabledProvider {
    async fn authorize(&self) -> Result<IdentityGrant> {
        Err(SessionError::exchange("identity provider not configured"))
    }
}

/// Optional device push-token capability, reported at sign-in
#[async_trait]
pub trait MessagingTokenSource: Send + Sync {
    /// Current device token, if the capability is available
    async fn device_token(&self) -> Option<String>;
}

/// Messaging capability that is never available
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMessaging;

#[async_trait]
impl MessagingTokenSource for NoMessaging {
    async fn device_token(&self) -> Option<String> {
        None
    }
}

/// Select the provider matching a configuration
///
/// Without a client identifier the provider degrades to [`DisabledProvider`]
/// instead of failing construction.
#[must_use]
pub fn provider_for(config: &ClientConfig) -> Box<dyn IdentityProvider> {
    match config.google_client_id {
        Some(ref client_id) => Box::new(BrowserCodeProvider::new(client_id.clone())),
        None => {
            tracing::debug!("No OAuth client id configured, using disabled provider");
            Box::new(DisabledProvider)
        }
    }
}

// ============================================================================
// Browser Code Provider
// ============================================================================

/// Provider that opens the consent page and reads the pasted code
#[derive(Debug, Clone)]
pub struct BrowserCodeProvider {
    client_id: String,
    auth_url: String,
    redirect_uri: String,
    scopes: String,
    auto_open_browser: bool,
}

impl BrowserCodeProvider {
    /// Create a provider for an OAuth client identifier
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scopes: DEFAULT_SCOPES.to_string(),
            auto_open_browser: true,
        }
    }

    /// Override the authorization endpoint
    #[must_use]
    pub fn auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = url.into();
        self
    }

    /// Override the redirect URI registered for the client
    #[must_use]
    pub fn redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = uri.into();
        self
    }

    /// Set whether to automatically open browser (default: true)
    #[must_use]
    pub fn auto_open_browser(mut self, auto_open: bool) -> Self {
        self.auto_open_browser = auto_open;
        self
    }

    /// Build the consent URL carrying the anti-forgery state
    fn build_auth_url(&self, state: &str) -> Result<String> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("response_type", "code"),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("scope", self.scopes.as_str()),
            ("state", state),
            ("prompt", "select_account"),
        ];

        let url = reqwest::Url::parse_with_params(&self.auth_url, &params)
            .map_err(|e| SessionError::exchange(format!("invalid authorization URL: {e}")))?;
        Ok(url.into())
    }

    /// Generate the anti-forgery state (base64url of a SHA-256 over per-call entropy)
    fn generate_state() -> String {
        use std::time::{SystemTime, UNIX_EPOCH};

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();

        let mut hasher = Sha256::new();
        hasher.update(timestamp.to_le_bytes());
        hasher.update(std::process::id().to_le_bytes());
        hasher.update(format!("{:?}", std::thread::current().id()).as_bytes());
        let hash = hasher.finalize();
        URL_SAFE_NO_PAD.encode(&hash[..24])
    }

    /// Open URL in default browser
    fn open_browser(url: &str) -> std::io::Result<()> {
        #[cfg(target_os = "macos")]
        {
            std::process::Command::new("open").arg(url).spawn()?;
        }

        #[cfg(target_os = "linux")]
        {
            std::process::Command::new("xdg-open").arg(url).spawn()?;
        }

        #[cfg(target_os = "windows")]
        {
            std::process::Command::new("cmd")
                .args(["/C", "start", "", url])
                .spawn()?;
        }

        Ok(())
    }

    fn prompt_for_code() -> std::io::Result<String> {
        print!("Paste the authorization code (or 'cancel' to abort): ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().lock().read_line(&mut input)?;
        Ok(input)
    }
}

/// Split pasted callback input into code and optional state (`code#state`)
fn parse_callback_input(input: &str) -> (String, Option<String>) {
    let input = input.trim();
    match input.split_once('#') {
        Some((code, state)) => (code.to_string(), Some(state.to_string())),
        None => (input.to_string(), None),
    }
}

/// Validate pasted callback input against the state sent with the request
fn grant_from_callback(input: &str, expected_state: &str) -> Result<IdentityGrant> {
    let (code, state) = parse_callback_input(input);

    if code.is_empty() || code.eq_ignore_ascii_case("cancel") {
        return Err(SessionError::exchange("sign-in cancelled by user"));
    }

    if let Some(state) = state {
        if state != expected_state {
            return Err(SessionError::exchange("authorization state mismatch"));
        }
    }

    Ok(IdentityGrant::new(code))
}

#[async_trait]
impl IdentityProvider for BrowserCodeProvider {
    async fn authorize(&self) -> Result<IdentityGrant> {
        let state = Self::generate_state();
        let url = self.build_auth_url(&state)?;

        println!("\nSign in with Google");
        println!("  {url}\n");

        if self.auto_open_browser {
            if let Err(e) = Self::open_browser(&url) {
                tracing::debug!("Could not open browser: {e}");
                println!("(Could not open browser automatically - please open the URL manually)");
            }
        }

        let input = tokio::task::spawn_blocking(Self::prompt_for_code)
            .await
            .map_err(|e| SessionError::exchange(format!("prompt task failed: {e}")))?
            .map_err(|e| SessionError::exchange(format!("could not read code: {e}")))?;

        grant_from_callback(&input, &state)
    }
}
