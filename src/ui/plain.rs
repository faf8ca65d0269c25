//! Line-oriented surface for pipes, redirected stdin, and one-shot prompts.
//!
//! Every input line is one submission. Output is the same labelled
//! transcript the terminal shows, without raw mode or an input echo.

use std::io::{self, Write};

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

use crate::client::ChatTransport;
use crate::config::UiConfig;
use crate::controller::{ChatController, SubmitOutcome};
use crate::error::{ChatError, Result};
use crate::session::{Conversation, Role};

use super::{ChatSurface, NodeId, Transcript, TranscriptStyle};

/// Surface that writes a transcript to `W` and holds the pending input line.
#[derive(Debug)]
pub struct PlainSurface<W> {
    transcript: Transcript<W>,
    input: String,
}

impl<W: Write> PlainSurface<W> {
    pub fn new(out: W, style: TranscriptStyle) -> Self {
        Self {
            transcript: Transcript::new(out, style),
            input: String::new(),
        }
    }

    /// Put a line into the input field.
    pub fn set_input(&mut self, line: impl Into<String>) {
        self.input = line.into();
    }

    pub fn transcript(&self) -> &Transcript<W> {
        &self.transcript
    }

    pub fn into_inner(self) -> W {
        self.transcript.into_inner()
    }
}

impl<W: Write> ChatSurface for PlainSurface<W> {
    type Node = NodeId;

    fn render(&mut self, role: Role, content: &str) -> io::Result<NodeId> {
        self.transcript.render(role, content)
    }

    fn set_text(&mut self, node: &NodeId, text: &str) -> io::Result<()> {
        self.transcript.set_text(*node, text)
    }

    fn scroll_to_bottom(&mut self) -> io::Result<()> {
        self.transcript.flush()
    }

    fn input_text(&self) -> String {
        self.input.clone()
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.input.clear();
        Ok(())
    }

    fn show_error(&mut self, node: &NodeId, partial: &str, error: &ChatError) -> io::Result<()> {
        self.transcript.show_error(*node, partial, error)
    }

    fn ready_for_input(&mut self) -> io::Result<()> {
        self.transcript.end_block()
    }
}

/// Submit each line of `input` in turn until it is exhausted.
///
/// Transport failures are shown in the transcript and the loop moves on to
/// the next line; output failures end the loop.
pub async fn run<T, R, W>(transport: T, ui: &UiConfig, input: R, out: W) -> Result<Conversation>
where
    T: ChatTransport,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let surface = PlainSurface::new(out, TranscriptStyle::from_ui(ui));
    let mut controller = ChatController::new(transport, surface);

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        controller.surface_mut().set_input(line);
        match controller.submit_input().await {
            Ok(SubmitOutcome::Ignored) => debug!(name: "plain.line.skipped", "Skipping blank line"),
            Ok(SubmitOutcome::Completed(_)) => {}
            Err(err) if err.is_recoverable() => {}
            Err(err) => return Err(err),
        }
    }

    let (_, conversation) = controller.into_parts();
    Ok(conversation)
}

/// Send a single prompt and print only the reply text.
pub async fn run_once<T, W>(transport: T, ui: &UiConfig, prompt: &str, out: W) -> Result<SubmitOutcome>
where
    T: ChatTransport,
    W: Write,
{
    let surface = PlainSurface::new(out, TranscriptStyle::from_ui(ui).quiet());
    let mut controller = ChatController::new(transport, surface);
    controller.submit(prompt).await
}
