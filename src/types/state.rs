//! Published authentication state

use serde::Serialize;

use super::user::User;

/// Lifecycle phase of the session manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthPhase {
    /// Startup check has not run yet
    #[default]
    Unknown,
    /// Startup check in flight
    Checking,
    /// A user is signed in
    Authenticated,
    /// No user is signed in
    Anonymous,
    /// Interactive sign-in in flight
    SigningIn,
    /// Sign-out in flight
    SigningOut,
}

impl AuthPhase {
    /// Whether the phase is a transient, in-flight phase
    #[must_use]
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            Self::Unknown | Self::Checking | Self::SigningIn | Self::SigningOut
        )
    }
}

/// Snapshot of the session as seen by subscribers
///
/// `is_authenticated` and `is_loading` are derived from the other fields and
/// cannot be set independently.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct AuthState {
    /// Current lifecycle phase
    pub phase: AuthPhase,
    /// Signed-in user, if any
    pub user: Option<User>,
    /// Last user-facing error
    pub error: Option<String>,
    /// Identity-provider token of the stored credential pair
    #[serde(skip)]
    pub identity_token: Option<String>,
    /// Backend session token of the stored credential pair
    #[serde(skip)]
    pub session_token: Option<String>,
}

impl AuthState {
    /// Whether a user is signed in
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Whether a transition is still resolving
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.phase.is_transient()
    }

    pub(crate) fn authenticated(user: User, identity_token: String, session_token: String) -> Self {
        Self {
            phase: AuthPhase::Authenticated,
            user: Some(user),
            error: None,
            identity_token: Some(identity_token),
            session_token: Some(session_token),
        }
    }

    pub(crate) fn anonymous(error: Option<String>) -> Self {
        Self {
            phase: AuthPhase::Anonymous,
            user: None,
            error,
            identity_token: None,
            session_token: None,
        }
    }
}
