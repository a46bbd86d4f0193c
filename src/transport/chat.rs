//! Authenticated chat transport over an event-stream response

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use std::pin::Pin;

use super::sse::{self, SseEvent};
use crate::auth::TokenStore;
use crate::error::{Result, SessionError};
use crate::types::{ChatStreamRequest, ClientConfig};

const CHAT_PATH: &str = "chat";
const EVENT_STREAM: &str = "text/event-stream";

/// Raw response body of a chat request, chunk by chunk
///
/// Dropping the stream aborts the request and releases the connection.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Issues chat requests authenticated with the stored session token
///
/// # Example
///
/// ```no_run
/// use futures::StreamExt;
/// use tutor_session_sdk::auth::TokenStore;
/// use tutor_session_sdk::transport::ChatTransport;
/// use tutor_session_sdk::{ChatStreamRequest, ClientConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = ChatTransport::new(ClientConfig::from_env()?, TokenStore::default());
/// let mut events = transport
///     .stream_chat_events(&ChatStreamRequest::new("Summarize lecture 3"))
///     .await?;
///
/// while let Some(event) = events.next().await {
///     print!("{}", event?.data);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ChatTransport {
    config: ClientConfig,
    store: TokenStore,
    http_client: reqwest::Client,
}

impl ChatTransport {
    /// Create a chat transport reading tokens from `store`
    #[must_use]
    pub fn new(config: ClientConfig, store: TokenStore) -> Self {
        Self::with_http_client(config, store, reqwest::Client::new())
    }

    /// Create a chat transport on an existing HTTP client
    #[must_use]
    pub fn with_http_client(
        config: ClientConfig,
        store: TokenStore,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            config,
            store,
            http_client,
        }
    }

    /// Start a chat request and return its unconsumed body stream
    ///
    /// The session token is read once, when this is called; a token rotated
    /// while the request is in flight is not picked up. Without a stored
    /// token the `Authorization` header is left out. No retry is attempted.
    ///
    /// # Errors
    ///
    /// - `SessionError::Network` if the request could not be sent
    /// - `SessionError::ChatRequestFailed` on a non-success status
    /// - `SessionError::EmptyResponseBody` if the response ends without any data
    /// - `SessionError::StreamInterrupted` if the body fails before its first chunk
    ///
    /// Failures after the stream has started arrive as
    /// `SessionError::StreamInterrupted` items instead.
    pub async fn stream_chat(&self, request: &ChatStreamRequest) -> Result<ByteStream> {
        let session_token = self.store.session_token();

        let mut builder = self
            .http_client
            .post(self.config.endpoint(CHAT_PATH))
            .query(&request.query_params())
            .header(ACCEPT, EVENT_STREAM);
        if let Some(ref token) = session_token {
            builder = builder.bearer_auth(token);
        }

        tracing::debug!(
            lecture_id = ?request.lecture_id,
            authenticated = session_token.is_some(),
            "Starting chat stream"
        );

        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let status_text = status_text(&response);
            tracing::warn!(%status, %status_text, "Chat request failed");
            return Err(SessionError::chat_request_failed(status.as_u16(), status_text));
        }

        if status == StatusCode::NO_CONTENT
            || status == StatusCode::RESET_CONTENT
            || response.content_length() == Some(0)
        {
            return Err(SessionError::EmptyResponseBody);
        }

        let mut body = Box::pin(response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| {
                tracing::debug!("Chat stream interrupted: {e}");
                SessionError::stream_interrupted(e.to_string())
            })
        }));

        // A chunked body may still end without data; wait for the first chunk
        let first = loop {
            match body.next().await {
                Some(Ok(chunk)) if chunk.is_empty() => {}
                Some(Ok(chunk)) => break chunk,
                Some(Err(e)) => return Err(e),
                None => return Err(SessionError::EmptyResponseBody),
            }
        };

        Ok(Box::pin(futures::stream::once(async move { Ok(first) }).chain(body)))
    }

    /// Start a chat request and decode its body into event-stream records
    ///
    /// # Errors
    ///
    /// Same as [`stream_chat`](Self::stream_chat).
    pub async fn stream_chat_events(
        &self,
        request: &ChatStreamRequest,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<SseEvent>> + Send>>> {
        let bytes = self.stream_chat(request).await?;
        Ok(Box::pin(sse::decode(bytes)))
    }
}

/// Reason phrase the server sent, else the canonical one, else the code
fn status_text(response: &reqwest::Response) -> String {
    let status = response.status();
    response
        .extensions()
        .get::<hyper::ext::ReasonPhrase>()
        .filter(|reason| !reason.as_bytes().is_empty())
        .map(|reason| String::from_utf8_lossy(reason.as_bytes()).into_owned())
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_else(|| status.as_str().to_string())
}
