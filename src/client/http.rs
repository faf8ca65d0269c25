//! HTTP transport for the streaming chat endpoint.

use std::time::Duration;

use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;
use url::Url;

use crate::config::AppConfig;
use crate::error::{ChatError, Result};
use crate::session::Message;

use super::{ByteStream, ChatRequest, ChatTransport};

/// Streams chat completions over HTTP with `reqwest`.
///
/// # Example
///
/// ```rust,no_run
/// use futures::StreamExt;
/// use streamchat::client::{ChatTransport, HttpTransport};
/// use streamchat::session::Message;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = HttpTransport::new("http://localhost:8000", "/chat/stream")?;
/// let mut body = transport.open_stream(&[Message::user("Hello!")]).await?;
/// while let Some(chunk) = body.next().await {
///     println!("{} bytes", chunk?.len());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    endpoint: Url,
    http: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport posting to `stream_path` under `base_url`.
    pub fn new(base_url: impl AsRef<str>, stream_path: &str) -> Result<Self> {
        Self::with_client(base_url, stream_path, reqwest::Client::new())
    }

    /// Create a transport with a custom reqwest client.
    pub fn with_client(
        base_url: impl AsRef<str>,
        stream_path: &str,
        http: reqwest::Client,
    ) -> Result<Self> {
        let endpoint = Url::parse(base_url.as_ref())?.join(stream_path)?;
        Ok(Self { endpoint, http })
    }

    /// Build a transport from loaded configuration, applying its timeouts.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.http.connect_timeout_secs));
        if let Some(secs) = config.http.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Self::with_client(
            &config.server.base_url,
            &config.server.stream_path,
            builder.build()?,
        )
    }

    /// Full URL requests are posted to.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl ChatTransport for HttpTransport {
    async fn open_stream(&self, messages: &[Message]) -> Result<ByteStream> {
        let body = serde_json::to_vec(&ChatRequest { messages })?;

        debug!(
            name: "chat.request.sent",
            endpoint = %self.endpoint,
            message_count = messages.len(),
            body_bytes = body.len(),
            "Posting conversation"
        );

        let response = self
            .http
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".into());
            return Err(ChatError::Api {
                status: status.as_u16(),
                message,
            });
        }

        debug!(name: "chat.response.headers", status = status.as_u16(), "Response stream opened");

        Ok(Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(ChatError::from)),
        ))
    }
}
