//! Session lifecycle orchestration
//!
//! [`SessionManager`] owns the single [`AuthState`] and is the only writer of
//! the [`TokenStore`]. It drives three transitions: the startup check
//! (rehydration), interactive sign-in, and sign-out.
//!
//! # State machine
//!
//! ```text
//! Unknown ──check──▶ Checking ──▶ Authenticated | Anonymous
//! Anonymous | Authenticated ──sign_in──▶ SigningIn ──▶ Authenticated | (prior phase)
//! Authenticated ──sign_out──▶ SigningOut ──▶ Anonymous
//! ```
//!
//! Every transition is published to subscribers through a `watch` channel as
//! soon as it is applied.
//!
//! # Ordering
//!
//! Completions are applied in the order they finish, guarded by a session
//! epoch: sign-out and successful sign-in advance it, and a check or sign-in
//! that started in an older epoch is discarded when it completes. A slow
//! sign-in therefore cannot resurrect a session the user already signed out
//! of.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

use super::exchange::IdentityExchangeClient;
use super::provider::{IdentityProvider, MessagingTokenSource, provider_for};
use super::token::TokenStore;
use crate::error::{Result, SessionError};
use crate::transport::ChatTransport;
use crate::types::{AuthPhase, AuthState, ClientConfig, User, UserRole};

/// Memoized in-flight (or finished) startup check
type SharedCheck = Shared<BoxFuture<'static, ()>>;

struct Inner {
    store: TokenStore,
    exchange: IdentityExchangeClient,
    provider: Box<dyn IdentityProvider>,
    state_tx: watch::Sender<AuthState>,
    /// Session epoch; held while a completion is applied
    epoch: Mutex<u64>,
    check: Mutex<Option<SharedCheck>>,
}

impl Inner {
    fn lock_epoch(&self) -> MutexGuard<'_, u64> {
        self.epoch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_epoch(&self) -> u64 {
        *self.lock_epoch()
    }

    fn publish(&self, state: AuthState) {
        tracing::debug!(phase = ?state.phase, authenticated = state.is_authenticated(), "Auth state transition");
        self.state_tx.send_replace(state);
    }

    async fn run_check(&self) {
        let epoch = self.current_epoch();

        self.state_tx.send_if_modified(|state| {
            if state.phase == AuthPhase::Unknown {
                state.phase = AuthPhase::Checking;
                true
            } else {
                false
            }
        });

        let Some(credentials) = self.store.credentials() else {
            let guard = self.lock_epoch();
            if *guard != epoch {
                return;
            }
            // Drop any orphaned half of a pair
            self.store.clear_tokens();
            tracing::debug!("No stored session, continuing anonymously");
            self.publish(AuthState::anonymous(None));
            return;
        };

        let result = self
            .exchange
            .fetch_current_user(&credentials.session_token)
            .await;

        let guard = self.lock_epoch();
        if *guard != epoch {
            tracing::debug!("Discarding startup check superseded by a newer transition");
            return;
        }

        match result {
            Ok(user) => {
                tracing::debug!(user_id = %user.id, "Restored stored session");
                self.publish(AuthState::authenticated(
                    user,
                    credentials.identity_token,
                    credentials.session_token,
                ));
            }
            Err(e) => {
                tracing::warn!("Stored session could not be restored: {e}");
                self.store.clear_tokens();
                let error = match e {
                    SessionError::BackendRejected { .. } => None,
                    other => Some(other.to_string()),
                };
                self.publish(AuthState::anonymous(error));
            }
        }
        drop(guard);
    }
}

/// Builder for [`SessionManager`]
#[derive(Default)]
pub struct SessionManagerBuilder {
    config: Option<ClientConfig>,
    store: Option<TokenStore>,
    provider: Option<Box<dyn IdentityProvider>>,
    messaging: Option<Arc<dyn MessagingTokenSource>>,
    http_client: Option<reqwest::Client>,
}

impl SessionManagerBuilder {
    /// Create a new builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the client configuration (required)
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set custom token storage
    #[must_use]
    pub fn store(mut self, store: TokenStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the identity provider
    #[must_use]
    pub fn provider(mut self, provider: impl IdentityProvider + 'static) -> Self {
        self.provider = Some(Box::new(provider));
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

    /// Build the session manager
    ///
    /// Without an explicit provider, the provider is chosen from the
    /// configuration; a missing OAuth client id yields a disabled provider.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidConfig` if no configuration was given.
    pub fn build(self) -> Result<SessionManager> {
        let config = self
            .config
            .ok_or_else(|| SessionError::invalid_config("session manager needs a ClientConfig"))?;

        let store = self.store.unwrap_or_else(|| match config.session_file {
            Some(ref path) => TokenStore::file(path),
            None => TokenStore::default(),
        });
        let provider = self.provider.unwrap_or_else(|| provider_for(&config));

        let mut exchange = IdentityExchangeClient::builder().config(config);
        if let Some(messaging) = self.messaging {
            exchange = exchange.messaging(messaging);
        }
        if let Some(client) = self.http_client {
            exchange = exchange.http_client(client);
        }

        let (state_tx, _) = watch::channel(AuthState::default());

        Ok(SessionManager {
            inner: Arc::new(Inner {
                store,
                exchange: exchange.build()?,
                provider,
                state_tx,
                epoch: Mutex::new(0),
                check: Mutex::new(None),
            }),
        })
    }
}

/// Owner of the session lifecycle and the published [`AuthState`]
///
/// Cheap to clone; clones share the same state, store, and check guard.
///
/// # Example
///
/// ```no_run
/// use tutor_session_sdk::{ClientConfig, SessionManager, UserRole};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ClientConfig::from_env()?;
/// let session = SessionManager::new(config)?;
///
/// let state = session.check_auth_state().await;
/// if !state.is_authenticated() {
///     let user = session.sign_in_with_google(UserRole::Student).await?;
///     println!("Signed in as {}", user.email);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("phase", &self.inner.state_tx.borrow().phase)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Create a session manager from configuration with default storage
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is unusable.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    /// Create a builder for custom configuration
    #[must_use]
    pub fn builder() -> SessionManagerBuilder {
        SessionManagerBuilder::new()
    }

    /// Snapshot of the current auth state
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.inner.state_tx.borrow().clone()
    }

    /// Subscribe to auth state transitions
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.state_tx.subscribe()
    }

    /// Whether a user is signed in
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.state_tx.borrow().is_authenticated()
    }

    /// Token store shared with the chat transport
    #[must_use]
    pub fn token_store(&self) -> &TokenStore {
        &self.inner.store
    }

    /// Chat transport authenticated with this manager's token store
    #[must_use]
    pub fn chat_transport(&self) -> ChatTransport {
        ChatTransport::new(self.inner.exchange.config().clone(), self.inner.store.clone())
    }

    /// Restore the session from stored tokens
    ///
    /// Runs at most once per manager (until [`reset_check`](Self::reset_check));
    /// concurrent and later callers await the same check instead of issuing
    /// another backend validation. The check runs on its own task and keeps
    /// going if the caller's future is dropped.
    pub async fn check_auth_state(&self) -> AuthState {
        let check = {
            let mut slot = self
                .inner
                .check
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            slot.get_or_insert_with(|| {
                let inner = Arc::clone(&self.inner);
                let handle = tokio::spawn(async move { inner.run_check().await });
                async move {
                    if let Err(e) = handle.await {
                        tracing::error!("Startup auth check task failed: {e}");
                    }
                }
                .boxed()
                .shared()
            })
            .clone()
        };

        check.await;
        self.state()
    }

    /// Allow the next [`check_auth_state`](Self::check_auth_state) to run again
    pub fn reset_check(&self) {
        let mut slot = self
            .inner
            .check
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = None;
    }

    /// Sign in through the identity provider and exchange for a session
    ///
    /// On success the credential pair is persisted and the state becomes
    /// `Authenticated`. On failure the error is recorded in the state, any
    /// existing session is left in place, and the error is returned.
    ///
    /// # Errors
    ///
    /// - `SessionError::Exchange` if the provider declines or is not configured
    /// - `SessionError::BackendRejected` if the backend refuses the credential
    /// - `SessionError::Network` if the backend cannot be reached
    /// - `SessionError::Superseded` if a sign-out or another sign-in finished first
    pub async fn sign_in_with_google(&self, role: UserRole) -> Result<User> {
        let inner = &self.inner;
        let (epoch, prior_phase) = {
            let guard = inner.lock_epoch();
            let prior_phase = inner.state_tx.borrow().phase;
            inner.state_tx.send_modify(|state| {
                state.phase = AuthPhase::SigningIn;
                state.error = None;
            });
            (*guard, prior_phase)
        };
        tracing::debug!(%role, "Starting sign-in");

        let result = async {
            let grant = inner.provider.authorize().await?;
            inner
                .exchange
                .exchange_authorization_code(&grant.identity_token, Some(&role))
                .await
        }
        .await;

        let mut guard = inner.lock_epoch();
        if *guard != epoch {
            tracing::debug!("Discarding sign-in superseded by a newer transition");
            return Err(SessionError::Superseded);
        }

        match result {
            Ok(outcome) => {
                *guard += 1;
                inner.store.set_credentials(&outcome.credentials);
                let user = outcome.user.clone();
                inner.publish(AuthState::authenticated(
                    outcome.user,
                    outcome.credentials.identity_token,
                    outcome.credentials.session_token,
                ));
                tracing::info!(user_id = %user.id, "Signed in");
                Ok(user)
            }
            Err(e) => {
                tracing::warn!("Sign-in failed: {e}");
                let message = e.to_string();
                inner.state_tx.send_modify(|state| {
                    if state.phase == AuthPhase::SigningIn {
                        state.phase = match prior_phase {
                            AuthPhase::SigningIn | AuthPhase::SigningOut => {
                                if state.user.is_some() {
                                    AuthPhase::Authenticated
                                } else {
                                    AuthPhase::Anonymous
                                }
                            }
                            other => other,
                        };
                    }
                    state.error = Some(message);
                });
                Err(e)
            }
        }
    }

    /// Sign out and forget the stored credential pair
    ///
    /// Idempotent: signing out while already signed out succeeds.
    pub fn sign_out(&self) {
        let inner = &self.inner;
        let mut guard = inner.lock_epoch();
        *guard += 1;

        inner.state_tx.send_modify(|state| state.phase = AuthPhase::SigningOut);
        inner.store.clear_tokens();
        inner.publish(AuthState::anonymous(None));
        tracing::info!("Signed out");
    }

    /// Re-fetch the signed-in user with the stored session token
    ///
    /// A rejected token signs the session out; a network failure only
    /// records the error.
    ///
    /// # Errors
    ///
    /// - `SessionError::NotAuthenticated` if no session token is stored
    /// - `SessionError::BackendRejected` if the session is no longer valid
    /// - `SessionError::Network` if the backend cannot be reached
    /// - `SessionError::Superseded` if a sign-in or sign-out finished first
    pub async fn refresh_user(&self) -> Result<User> {
        let inner = &self.inner;
        let epoch = inner.current_epoch();
        let credentials = inner
            .store
            .credentials()
            .ok_or(SessionError::NotAuthenticated)?;

        let result = inner
            .exchange
            .fetch_current_user(&credentials.session_token)
            .await;

        let mut guard = inner.lock_epoch();
        if *guard != epoch {
            return Err(SessionError::Superseded);
        }

        match result {
            Ok(user) => {
                inner.publish(AuthState::authenticated(
                    user.clone(),
                    credentials.identity_token,
                    credentials.session_token,
                ));
                Ok(user)
            }
            Err(e @ SessionError::BackendRejected { .. }) => {
                tracing::warn!("Session rejected on refresh: {e}");
                *guard += 1;
                inner.store.clear_tokens();
                inner.publish(AuthState::anonymous(Some(e.to_string())));
                Err(e)
            }
            Err(e) => {
                let message = e.to_string();
                inner
                    .state_tx
                    .send_modify(|state| state.error = Some(message));
                Err(e)
            }
        }
    }
}
