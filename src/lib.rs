//! # Tutor Session SDK
//!
//! Session lifecycle and authenticated chat streaming for the tutoring
//! backend. Async/await, strong typing, tokio-based.
//!
//! ## Quick Start
//!
//! ```no_run
//! use futures::StreamExt;
//! use tutor_session_sdk::{ChatStreamRequest, ClientConfig, SessionManager, UserRole};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = SessionManager::new(ClientConfig::from_env()?)?;
//!
//!     // Restore the previous session, or sign in interactively
//!     if !session.check_auth_state().await.is_authenticated() {
//!         session.sign_in_with_google(UserRole::Student).await?;
//!     }
//!
//!     let chat = session.chat_transport();
//!     let request = ChatStreamRequest::builder()
//!         .query("Explain the second half of today's lecture")
//!         .lecture_id("lec-12")
//!         .build();
//!
//!     let mut events = chat.stream_chat_events(&request).await?;
//!     while let Some(event) = events.next().await {
//!         print!("{}", event?.data);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Core Features
//!
//! ### 1. Session lifecycle with [`SessionManager`]
//!
//! - [`check_auth_state`](SessionManager::check_auth_state) rehydrates the
//!   session from stored tokens, at most once, sharing one in-flight check
//!   between concurrent callers
//! - [`sign_in_with_google`](SessionManager::sign_in_with_google) runs the
//!   identity provider and exchanges its token for a backend session
//! - [`sign_out`](SessionManager::sign_out) forgets the session; idempotent
//! - [`subscribe`](SessionManager::subscribe) yields every [`AuthState`]
//!   transition through a `tokio::sync::watch` channel
//!
//! ### 2. Token persistence with [`auth::TokenStore`]
//!
//! The identity token and the backend session token are stored together and
//! removed together. Storage failures never surface as errors: reads come
//! back empty and writes are skipped.
//!
//! ### 3. Streaming chat with [`transport::ChatTransport`]
//!
//! [`stream_chat`](transport::ChatTransport::stream_chat) returns the raw
//! event-stream body chunk by chunk; [`transport::sse`] frames it into
//! records when wanted.
//!
//! ## Architecture
//!
//! - [`auth`]: token store, identity provider seam, exchange client, session manager
//! - [`transport`]: chat transport and event-stream decoder
//! - [`types`]: identifiers, user, auth state, chat request, configuration
//! - [`error`]: error types and handling
//! - [`utils`]: UTF-8 safe message helpers
//!
//! ## Configuration
//!
//! [`ClientConfig::from_env`] reads `TUTOR_API_URL` (required),
//! `TUTOR_GOOGLE_CLIENT_ID` (optional; without it sign-in is disabled rather
//! than failing at startup), `TUTOR_TIMEZONE`, `TUTOR_REQUEST_TIMEOUT_SECS`,
//! and `TUTOR_SESSION_FILE`.
//!
//! ## Logging
//!
//! This crate uses [`tracing`](https://crates.io/crates/tracing) for structured logging.
//! Tracing events are always emitted but are zero-cost when no subscriber is attached.
//! Tokens are never written to logs. To see logs, attach a subscriber:
//!
//! ```rust,ignore
//! tracing_subscriber::fmt::init();
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, SessionError>`](Result):
//!
//! ```no_run
//! # use tutor_session_sdk::{ChatStreamRequest, SessionError, SessionManager};
//! # async fn example(session: SessionManager) {
//! match session.chat_transport().stream_chat(&ChatStreamRequest::new("hi")).await {
//!     Ok(_stream) => { /* consume chunks */ }
//!     Err(SessionError::ChatRequestFailed { status, status_text }) => {
//!         eprintln!("Backend refused the chat: {status} {status_text}");
//!     }
//!     Err(e) if e.is_retryable() => eprintln!("Try again: {e}"),
//!     Err(e) => eprintln!("Error: {e}"),
//! }
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod error;
pub mod transport;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use auth::{CredentialPair, IdentityExchangeClient, IdentityProvider, SessionManager, TokenStore};
pub use error::{Result, SessionError};
pub use futures::StreamExt;
pub use transport::{ByteStream, ChatTransport, SseEvent};
pub use types::{
    AuthPhase, AuthState, ChatStreamRequest, ClientConfig, LectureId, User, UserId, UserRole,
};

/// Version of the SDK
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
