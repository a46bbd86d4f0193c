//! Chat request types

use typed_builder::TypedBuilder;

use super::identifiers::LectureId;

/// One streaming chat query
///
/// ```
/// use tutor_session_sdk::types::ChatStreamRequest;
///
/// let request = ChatStreamRequest::builder()
///     .query("What is a monad?")
///     .lecture_id("lec-7")
///     .build();
/// assert_eq!(request.lecture_id.as_deref(), Some("lec-7"));
/// ```
#[derive(Debug, Clone, TypedBuilder)]
#[builder(
    builder_method(doc = "Create a new builder for ChatStreamRequest"),
    builder_type(doc = "Builder for ChatStreamRequest", vis = "pub"),
    build_method(doc = "Build the ChatStreamRequest")
)]
pub struct ChatStreamRequest {
    /// User question
    #[builder(setter(into))]
    pub query: String,

    /// Lecture the question is about
    #[builder(default, setter(strip_option, into))]
    pub lecture_id: Option<LectureId>,
}

impl ChatStreamRequest {
    /// Create a request without a lecture scope
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            lecture_id: None,
        }
    }

    /// Query-string parameters for the chat endpoint
    pub(crate) fn query_params(&self) -> Vec<(&'static str, &str)> {
        let mut params = vec![("query", self.query.as_str())];
        if let Some(ref lecture_id) = self.lecture_id {
            params.push(("lecture_id", lecture_id.as_str()));
        }
        params
    }
}

impl From<&str> for ChatStreamRequest {
    fn from(query: &str) -> Self {
        Self::new(query)
    }
}

impl From<String> for ChatStreamRequest {
    fn from(query: String) -> Self {
        Self::new(query)
    }
}
