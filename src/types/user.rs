//! Authenticated user profile

use serde::{Deserialize, Deserializer, Serialize};

use super::identifiers::UserId;

/// Role a user signs in as
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Attends lectures and chats about them
    Student,
    /// Owns lectures
    Teacher,
    /// Platform administrator
    Admin,
    /// Role string the SDK does not know about
    #[serde(untagged)]
    Other(String),
}

impl UserRole {
    /// Wire representation of the role
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
            Self::Admin => "admin",
            Self::Other(role) => role,
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for UserRole {
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "student" => Self::Student,
            "teacher" => Self::Teacher,
            "admin" => Self::Admin,
            _ => Self::Other(s.to_string()),
        }
    }
}

/// User profile returned by the backend
///
/// Immutable once fetched; the session manager replaces it wholesale on
/// re-authentication and drops it on sign-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Backend user ID (accepted as a JSON string or number)
    #[serde(deserialize_with = "user_id_from_string_or_number")]
    pub id: UserId,
    /// Account email
    pub email: String,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Role assigned by the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
}

fn user_id_from_string_or_number<'de, D>(deserializer: D) -> Result<UserId, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => UserId::new(s),
        RawId::Number(n) => UserId::new(n.to_string()),
    })
}
