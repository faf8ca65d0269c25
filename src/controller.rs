//! Chat view controller.
//!
//! The controller owns the [`Conversation`], renders messages to a
//! [`ChatSurface`], and streams the assistant reply from a
//! [`ChatTransport`]:
//!
//! 1. Trim the input; ignore it if nothing is left
//! 2. Clear the input field, append and render the user message
//! 3. Render an empty assistant node
//! 4. Post the whole conversation and decode the body chunk by chunk,
//!    writing the accumulated text into the node after every chunk
//! 5. Append the finished reply as an assistant message
//!
//! # Example
//!
//! ```rust,ignore
//! let transport = HttpTransport::new("http://localhost:8000", "/chat/stream")?;
//! let mut controller = ChatController::new(transport, surface);
//!
//! let outcome = controller.submit("Hello").await?;
//! ```

use std::future::{self, Future};
use std::pin::pin;

use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::client::{ChatTransport, decode_stream};
use crate::error::{ChatError, Result};
use crate::session::{Conversation, Message, Role};
use crate::ui::ChatSurface;

/// Result of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The input was empty after trimming; nothing was sent.
    Ignored,
    /// The reply streamed to completion and was appended.
    Completed(Message),
}

/// Drives one chat session over a transport and a surface.
#[derive(Debug)]
pub struct ChatController<T, S> {
    transport: T,
    surface: S,
    conversation: Conversation,
}

impl<T, S> ChatController<T, S>
where
    T: ChatTransport,
    S: ChatSurface,
{
    /// Create a controller with an empty conversation.
    pub fn new(transport: T, surface: S) -> Self {
        Self {
            transport,
            surface,
            conversation: Conversation::new(),
        }
    }

    /// Messages exchanged so far.
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// The surface this controller renders to.
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Mutable access to the surface, for input handling between submissions.
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Give back the surface and the conversation.
    pub fn into_parts(self) -> (S, Conversation) {
        (self.surface, self.conversation)
    }

    /// Render a role label and content area, keeping it in view.
    ///
    /// Returns a handle to the content area for later updates.
    pub fn render(&mut self, role: Role, content: &str) -> Result<S::Node> {
        let node = self.surface.render(role, content)?;
        self.surface.scroll_to_bottom()?;
        Ok(node)
    }

    /// Submit whatever is in the surface's input field.
    pub async fn submit_input(&mut self) -> Result<SubmitOutcome> {
        self.submit_input_until(future::pending()).await
    }

    /// Like [`submit_input`](Self::submit_input), abandoning the reply once
    /// `cancel` completes.
    pub async fn submit_input_until<F>(&mut self, cancel: F) -> Result<SubmitOutcome>
    where
        F: Future<Output = ()>,
    {
        let text = self.surface.input_text();
        self.submit_until(&text, cancel).await
    }

    /// Send `user_text` and stream the reply into a new assistant node.
    ///
    /// On a transport failure the node keeps the partial text plus an error
    /// marker, the user message stays in the conversation, no assistant
    /// message is appended, and the error is returned.
    pub async fn submit(&mut self, user_text: &str) -> Result<SubmitOutcome> {
        self.submit_until(user_text, future::pending()).await
    }

    /// Like [`submit`](Self::submit), but stops waiting for the reply once
    /// `cancel` completes. A cancelled reply is handled like a transport
    /// failure and reported as [`ChatError::Cancelled`].
    pub async fn submit_until<F>(&mut self, user_text: &str, cancel: F) -> Result<SubmitOutcome>
    where
        F: Future<Output = ()>,
    {
        let text = user_text.trim();
        if text.is_empty() {
            debug!(name: "chat.submit.ignored", "Ignoring empty input");
            return Ok(SubmitOutcome::Ignored);
        }

        self.surface.clear_input()?;
        self.conversation.push_user(text);
        self.render(Role::User, text)?;
        let node = self.render(Role::Assistant, "")?;

        info!(
            name: "chat.submit.started",
            message_count = self.conversation.len(),
            "Submitting conversation"
        );

        let mut reply = String::new();
        match self.stream_reply(&node, &mut reply, cancel).await {
            Ok(()) => {
                let message = self.conversation.push_assistant(reply).clone();
                self.surface.ready_for_input()?;
                info!(
                    name: "chat.submit.completed",
                    reply_chars = message.content.chars().count(),
                    message_count = self.conversation.len(),
                    "Reply complete"
                );
                Ok(SubmitOutcome::Completed(message))
            }
            Err(err) => {
                warn!(
                    name: "chat.submit.failed",
                    error = %err,
                    partial_chars = reply.chars().count(),
                    "Reply stream failed"
                );
                if err.is_recoverable() {
                    self.surface.show_error(&node, &reply, &err)?;
                    self.surface.scroll_to_bottom()?;
                    self.surface.ready_for_input()?;
                }
                Err(err)
            }
        }
    }

    async fn stream_reply<F>(&mut self, node: &S::Node, reply: &mut String, cancel: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut cancel = pin!(cancel);
        let body = tokio::select! {
            body = self.transport.open_stream(self.conversation.messages()) => body?,
            () = &mut cancel => return Err(ChatError::Cancelled),
        };
        let fragments = decode_stream(body);
        futures::pin_mut!(fragments);

        let mut chunks = 0usize;
        loop {
            let fragment = tokio::select! {
                fragment = fragments.next() => fragment,
                () = &mut cancel => return Err(ChatError::Cancelled),
            };
            let Some(fragment) = fragment else {
                break;
            };
            reply.push_str(&fragment?);
            chunks += 1;
            // Full text every time, not just the new fragment.
            self.surface.set_text(node, reply)?;
            self.surface.scroll_to_bottom()?;
        }

        debug!(name: "chat.stream.closed", chunks, "Response stream closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use bytes::Bytes;

    use super::*;
    use crate::client::ByteStream;

    /// Replays canned chunks and records every request.
    #[derive(Debug, Default, Clone)]
    struct FakeTransport {
        chunks: Vec<&'static [u8]>,
        requests: Arc<Mutex<Vec<Vec<Message>>>>,
    }

    #[async_trait::async_trait]
    impl ChatTransport for FakeTransport {
        async fn open_stream(&self, messages: &[Message]) -> Result<ByteStream> {
            self.requests.lock().unwrap().push(messages.to_vec());
            let chunks: Vec<Result<Bytes>> = self
                .chunks
                .iter()
                .map(|c| Ok(Bytes::from_static(c)))
                .collect();
            Ok(Box::pin(futures::stream::iter(chunks)))
        }
    }

    /// Surface calls in the order they happened.
    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Render(Role),
        Update(String),
        Scroll,
    }

    /// Records what the controller asked the surface to do.
    #[derive(Debug, Default)]
    struct RecordingSurface {
        input: String,
        nodes: Vec<(Role, String)>,
        updates: Vec<String>,
        calls: Vec<Call>,
        cleared: usize,
        errors: usize,
    }

    impl ChatSurface for RecordingSurface {
        type Node = usize;

        fn render(&mut self, role: Role, content: &str) -> std::io::Result<usize> {
            self.nodes.push((role, content.to_owned()));
            self.calls.push(Call::Render(role));
            Ok(self.nodes.len() - 1)
        }

        fn set_text(&mut self, node: &usize, text: &str) -> std::io::Result<()> {
            self.nodes[*node].1 = text.to_owned();
            self.updates.push(text.to_owned());
            self.calls.push(Call::Update(text.to_owned()));
            Ok(())
        }

        fn scroll_to_bottom(&mut self) -> std::io::Result<()> {
            self.calls.push(Call::Scroll);
            Ok(())
        }

        fn input_text(&self) -> String {
            self.input.clone()
        }

        fn clear_input(&mut self) -> std::io::Result<()> {
            self.input.clear();
            self.cleared += 1;
            Ok(())
        }

        fn show_error(&mut self, node: &usize, partial: &str, _: &ChatError) -> std::io::Result<()> {
            self.errors += 1;
            self.nodes[*node].1 = format!("{partial} [error]");
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_hello_scenario() {
        let transport = FakeTransport {
            chunks: vec![&b"Hi"[..], &b" there!"[..]],
            ..Default::default()
        };
        let requests = Arc::clone(&transport.requests);
        let mut controller = ChatController::new(transport, RecordingSurface::default());

        let outcome = controller.submit("Hello").await.unwrap();

        assert_eq!(
            outcome,
            SubmitOutcome::Completed(Message::assistant("Hi there!"))
        );
        assert_eq!(
            requests.lock().unwrap().as_slice(),
            &[vec![Message::user("Hello")]]
        );
        let surface = controller.surface();
        assert_eq!(surface.updates, vec!["Hi", "Hi there!"]);
        assert_eq!(
            surface.calls,
            vec![
                Call::Render(Role::User),
                Call::Scroll,
                Call::Render(Role::Assistant),
                Call::Scroll,
                Call::Update("Hi".into()),
                Call::Scroll,
                Call::Update("Hi there!".into()),
                Call::Scroll,
            ]
        );
        assert_eq!(surface.nodes[0], (Role::User, "Hello".to_owned()));
        assert_eq!(surface.nodes[1], (Role::Assistant, "Hi there!".to_owned()));
        assert_eq!(
            controller.conversation().messages(),
            &[Message::user("Hello"), Message::assistant("Hi there!")]
        );
    }

    #[tokio::test]
    async fn test_whitespace_input_is_noop() {
        let transport = FakeTransport::default();
        let requests = Arc::clone(&transport.requests);
        let surface = RecordingSurface {
            input: "   ".into(),
            ..Default::default()
        };
        let mut controller = ChatController::new(transport, surface);

        let outcome = controller.submit_input().await.unwrap();

        assert_eq!(outcome, SubmitOutcome::Ignored);
        assert!(controller.conversation().is_empty());
        assert!(requests.lock().unwrap().is_empty());
        assert_eq!(controller.surface().cleared, 0);
        assert_eq!(controller.surface().input, "   ");
        assert!(controller.surface().nodes.is_empty());
    }

    #[tokio::test]
    async fn test_input_is_trimmed_and_cleared() {
        let transport = FakeTransport {
            chunks: vec![&b"ok"[..]],
            ..Default::default()
        };
        let surface = RecordingSurface {
            input: "  spaced out \n".into(),
            ..Default::default()
        };
        let mut controller = ChatController::new(transport, surface);

        controller.submit_input().await.unwrap();

        assert_eq!(controller.surface().cleared, 1);
        assert!(controller.surface().input.is_empty());
        assert_eq!(
            controller.conversation().messages()[0],
            Message::user("spaced out")
        );
    }

    /// Refuses every request.
    #[derive(Debug)]
    struct RefusingTransport;

    #[async_trait::async_trait]
    impl ChatTransport for RefusingTransport {
        async fn open_stream(&self, _: &[Message]) -> Result<ByteStream> {
            Err(ChatError::Api {
                status: 503,
                message: "unavailable".into(),
            })
        }
    }

    #[tokio::test]
    async fn test_refused_request_is_surfaced() {
        let mut controller = ChatController::new(RefusingTransport, RecordingSurface::default());

        let err = controller.submit("Hello").await.unwrap_err();

        assert!(matches!(err, ChatError::Api { status: 503, .. }));
        assert_eq!(controller.surface().errors, 1);
        assert_eq!(controller.surface().nodes[1].1, " [error]");
        assert_eq!(
            controller.conversation().messages(),
            &[Message::user("Hello")]
        );
    }

    /// Sends one chunk, then keeps the connection open forever.
    #[derive(Debug)]
    struct HangingTransport;

    #[async_trait::async_trait]
    impl ChatTransport for HangingTransport {
        async fn open_stream(&self, _: &[Message]) -> Result<ByteStream> {
            let first = futures::stream::iter(vec![Ok(Bytes::from_static(b"Thinking"))]);
            Ok(Box::pin(first.chain(futures::stream::pending())))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_abandons_hanging_reply() {
        let mut controller = ChatController::new(HangingTransport, RecordingSurface::default());

        let cancel = tokio::time::sleep(std::time::Duration::from_secs(30));
        let err = controller.submit_until("Hello", cancel).await.unwrap_err();

        assert!(matches!(err, ChatError::Cancelled));
        assert!(err.is_recoverable());
        assert_eq!(controller.surface().updates, vec!["Thinking"]);
        assert_eq!(controller.surface().nodes[1].1, "Thinking [error]");
        assert_eq!(
            controller.conversation().messages(),
            &[Message::user("Hello")]
        );
    }
}
