//! Transport layer for talking to the tutoring backend
//!
//! [`ChatTransport`] issues authenticated chat requests and hands back the
//! response body as a stream of byte chunks, as they arrive. The
//! [`sse`] module frames those chunks into event-stream records for callers
//! that do not want to parse `event:`/`data:` lines themselves.

pub mod chat;
pub mod sse;

pub use chat::{ByteStream, ChatTransport};
pub use sse::{SseDecoder, SseEvent, decode};
