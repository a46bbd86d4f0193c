//! Type definitions for the tutor session SDK
//!
//! This module contains the value types shared across the SDK: identifiers
//! for type safety, the user profile, the published auth state, chat
//! requests, and client configuration.

// Module declarations
pub mod chat;
pub mod identifiers;
pub mod options;
pub mod state;
pub mod user;

pub use chat::{ChatStreamRequest, ChatStreamRequestBuilder};
pub use identifiers::{LectureId, UserId};
pub use options::{ClientConfig, ClientConfigBuilder};
pub use state::{AuthPhase, AuthState};
pub use user::{User, UserRole};
