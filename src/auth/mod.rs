//! Session authentication for the tutoring backend
//!
//! # Overview
//!
//! Signing in trades an identity-provider artifact for a backend session:
//!
//! 1. The [`IdentityProvider`] runs the provider's consent flow and yields an
//!    identity token
//! 2. The [`IdentityExchangeClient`] posts it to the backend and receives a
//!    session token, then fetches the signed-in [`User`](crate::types::User)
//! 3. The [`TokenStore`] persists both tokens together
//! 4. The [`SessionManager`] publishes the new [`AuthState`](crate::types::AuthState)
//!
//! On the next start, [`SessionManager::check_auth_state`] rehydrates the
//! session from the stored pair without another interactive sign-in.
//!
//! # Example
//!
//! ```no_run
//! use tutor_session_sdk::auth::{SessionManager, TokenStore};
//! use tutor_session_sdk::{ClientConfig, UserRole};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = SessionManager::builder()
//!         .config(ClientConfig::from_env()?)
//!         .store(TokenStore::file("/tmp/tutor-session.json"))
//!         .build()?;
//!
//!     if !session.check_auth_state().await.is_authenticated() {
//!         session.sign_in_with_google(UserRole::Student).await?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Token Storage
//!
//! Tokens are stored in the platform-specific config directory by default
//! (e.g., `~/.config/tutor-session/session.json` on Linux), under the keys
//! `firebase_token` and `backend_token`. The file is written with user-only
//! permissions (600) and replaced atomically.

mod exchange;
mod provider;
mod session;
mod token;

pub use exchange::{ExchangeOutcome, IdentityExchangeClient, IdentityExchangeClientBuilder};
pub use provider::{
    BrowserCodeProvider, DisabledProvider, IdentityGrant, IdentityProvider, MessagingTokenSource,
    NoMessaging, provider_for,
};
pub use session::{SessionManager, SessionManagerBuilder};
pub use token::{
    CredentialPair, FileStorage, IDENTITY_TOKEN_KEY, MemoryStorage, SESSION_TOKEN_KEY,
    StorageArea, TokenStore, UnavailableStorage,
};
