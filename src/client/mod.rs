//! Chat-completion transport.
//!
//! The chat endpoint accepts the whole conversation as JSON and answers with
//! a chunked stream of raw text octets. This module defines the
//! [`ChatTransport`] seam the controller depends on, the request body, and
//! the HTTP implementation.
//!
//! # Wire contract
//!
//! ```text
//! POST /chat/stream
//! Content-Type: application/json
//!
//! {"messages": [{"role": "user", "content": "Hello"}]}
//! ```
//!
//! The response body is plain text with no framing; the stream ends when
//! the connection closes.

pub mod decode;
pub mod http;

pub use decode::{Utf8StreamDecoder, decode_stream};
pub use http::HttpTransport;

use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;
use serde::Serialize;

use crate::error::Result;
use crate::session::Message;

/// Boxed stream of raw body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Request body sent to the chat endpoint.
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    /// Full conversation so far, including the latest user turn.
    pub messages: &'a [Message],
}

/// Opens a streamed chat completion for a conversation.
#[async_trait::async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send `messages` and return the response body as a chunk stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent or the endpoint
    /// answers with a non-success status.
    async fn open_stream(&self, messages: &[Message]) -> Result<ByteStream>;
}

#[async_trait::async_trait]
impl<T: ChatTransport + ?Sized> ChatTransport for std::sync::Arc<T> {
    async fn open_stream(&self, messages: &[Message]) -> Result<ByteStream> {
        (**self).open_stream(messages).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let messages = vec![Message::user("Hello"), Message::assistant("Hi")];
        let body = serde_json::to_value(ChatRequest {
            messages: &messages,
        })
        .unwrap();

        assert_eq!(
            body,
            serde_json::json!({
                "messages": [
                    {"role": "user", "content": "Hello"},
                    {"role": "assistant", "content": "Hi"}
                ]
            })
        );
    }
}
