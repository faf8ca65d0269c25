//! Chat surfaces.
//!
//! The controller never touches a terminal directly. It talks to a
//! [`ChatSurface`], which renders labelled message nodes and owns the input
//! field, and it reacts to [`ChatSignal`]s produced by whatever event source
//! drives the surface.
//!
//! # Structure
//!
//! - [`composer`]: input field model and abstract key input
//! - [`transcript`]: writes labelled nodes to any [`std::io::Write`]
//! - [`terminal`]: interactive raw-mode surface (crossterm)
//! - [`plain`]: line-oriented surface for pipes and one-shot prompts

pub mod composer;
pub mod plain;
pub mod terminal;
pub mod transcript;

pub use composer::{Composer, ComposerEffect, KeyInput};
pub use plain::PlainSurface;
pub use terminal::TerminalSurface;
pub use transcript::{NodeId, Transcript, TranscriptStyle};

use std::io;

use crate::error::ChatError;
use crate::session::Role;

/// Signals a surface's event source sends to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatSignal {
    /// The user asked to send the current input.
    SubmitRequested,
    /// The user asked to leave the session.
    Quit,
}

/// Rendering target and input field for a chat session.
pub trait ChatSurface {
    /// Handle to a rendered content area that can be updated in place.
    type Node;

    /// Append a role label and content area; return a handle to the content area.
    fn render(&mut self, role: Role, content: &str) -> io::Result<Self::Node>;

    /// Replace the text shown in `node` with `text`.
    fn set_text(&mut self, node: &Self::Node, text: &str) -> io::Result<()>;

    /// Keep the newest output in view.
    fn scroll_to_bottom(&mut self) -> io::Result<()>;

    /// Current contents of the input field.
    fn input_text(&self) -> String;

    /// Empty the input field.
    fn clear_input(&mut self) -> io::Result<()>;

    /// Mark `node` as failed, keeping the `partial` text received so far.
    fn show_error(&mut self, node: &Self::Node, partial: &str, error: &ChatError)
    -> io::Result<()>;

    /// Called once an exchange has finished and input is accepted again.
    fn ready_for_input(&mut self) -> io::Result<()> {
        Ok(())
    }
}
