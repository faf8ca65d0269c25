//! Labelled message nodes written to a byte sink.
//!
//! A terminal cannot rewrite earlier output cheaply, so a node's text is
//! replaced by writing only the new suffix whenever the replacement extends
//! what is already shown. Any other replacement reprints the node on a
//! fresh line.
//!
//! Node text is written inert: control characters other than `\n` and `\t`
//! never reach the sink, so a reply cannot move the cursor or issue escape
//! sequences.

use std::borrow::Cow;
use std::io::{self, Write};

use crossterm::style::{Color, Stylize};

use crate::config::UiConfig;
use crate::error::ChatError;
use crate::session::Role;

/// Handle to a node written by a [`Transcript`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// How a transcript lays out its nodes.
#[derive(Debug, Clone)]
pub struct TranscriptStyle {
    /// Label printed above user nodes.
    pub user_label: String,
    /// Label printed above assistant nodes.
    pub assistant_label: String,
    /// Prefix of the annotation written into a failed node.
    pub error_marker: String,
    /// Emit ANSI colours for role labels.
    pub color: bool,
    /// Translate `\n` to `\r\n` (the terminal is in raw mode).
    pub raw_newlines: bool,
    /// Print a label line above each node.
    pub show_labels: bool,
    /// Print user nodes at all.
    pub show_user: bool,
}

impl TranscriptStyle {
    #[must_use]
    pub fn from_ui(ui: &UiConfig) -> Self {
        Self {
            user_label: ui.user_label.clone(),
            assistant_label: ui.assistant_label.clone(),
            error_marker: ui.error_marker.clone(),
            color: ui.color,
            raw_newlines: false,
            show_labels: true,
            show_user: true,
        }
    }

    /// Layout for a raw-mode terminal.
    #[must_use]
    pub fn raw(mut self) -> Self {
        self.raw_newlines = true;
        self
    }

    /// Assistant text only, no labels.
    #[must_use]
    pub fn quiet(mut self) -> Self {
        self.show_labels = false;
        self.show_user = false;
        self
    }
}

#[derive(Debug)]
struct Node {
    visible: bool,
    shown: String,
}

/// Writes chat nodes to `W`.
#[derive(Debug)]
pub struct Transcript<W> {
    out: W,
    style: TranscriptStyle,
    nodes: Vec<Node>,
    /// The cursor is not at the start of a line.
    line_open: bool,
    /// A blank line is due before the next node.
    needs_gap: bool,
}

impl<W: Write> Transcript<W> {
    pub fn new(out: W, style: TranscriptStyle) -> Self {
        Self {
            out,
            style,
            nodes: Vec::new(),
            line_open: false,
            needs_gap: false,
        }
    }

    pub fn style(&self) -> &TranscriptStyle {
        &self.style
    }

    /// Direct access to the sink, for output that is not part of a node.
    pub fn writer_mut(&mut self) -> &mut W {
        &mut self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Text currently shown for `node`.
    pub fn text(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(node.0).map(|n| n.shown.as_str())
    }

    /// Append a node with a role label and optional initial content.
    pub fn render(&mut self, role: Role, content: &str) -> io::Result<NodeId> {
        let visible = role == Role::Assistant || self.style.show_user;
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            visible,
            shown: String::new(),
        });

        if visible {
            self.open_block()?;
            if self.style.show_labels {
                self.write_label(role)?;
                self.write_text("\n")?;
                self.needs_gap = true;
            }
        }

        if !content.is_empty() {
            self.set_text(id, content)?;
        }
        Ok(id)
    }

    /// Replace the text of `node`.
    pub fn set_text(&mut self, node: NodeId, text: &str) -> io::Result<()> {
        let is_last = node.0 + 1 == self.nodes.len();
        let Some(state) = self.nodes.get(node.0) else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unknown transcript node {}", node.0),
            ));
        };

        if !state.visible {
            self.nodes[node.0].shown = text.to_owned();
            return Ok(());
        }

        if is_last && text.starts_with(state.shown.as_str()) {
            let suffix = &text[state.shown.len()..];
            if !suffix.is_empty() {
                self.write_text(suffix)?;
                self.nodes[node.0].shown.push_str(suffix);
            }
        } else {
            if self.line_open {
                self.write_text("\n")?;
            }
            self.write_text(text)?;
            self.nodes[node.0].shown = text.to_owned();
        }
        Ok(())
    }

    /// Annotate `node` with the error marker after the `partial` text.
    pub fn show_error(&mut self, node: NodeId, partial: &str, error: &ChatError) -> io::Result<()> {
        let separator = if partial.is_empty() || partial.ends_with('\n') {
            ""
        } else {
            "\n"
        };
        let text = format!("{partial}{separator}{} {error}", self.style.error_marker);
        self.set_text(node, &text)
    }

    /// Close the current block so that following output starts on a fresh line.
    pub fn end_block(&mut self) -> io::Result<()> {
        if self.line_open {
            self.write_text("\n")?;
        }
        if self.needs_gap {
            self.write_text("\n")?;
            self.needs_gap = false;
        }
        self.flush()
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    fn open_block(&mut self) -> io::Result<()> {
        if self.line_open {
            self.write_text("\n")?;
        }
        if self.needs_gap {
            self.write_text("\n")?;
            self.needs_gap = false;
        }
        Ok(())
    }

    fn write_label(&mut self, role: Role) -> io::Result<()> {
        let (label, color) = match role {
            Role::User => (self.style.user_label.as_str(), Color::Cyan),
            Role::Assistant => (self.style.assistant_label.as_str(), Color::Green),
        };
        if self.style.color {
            write!(self.out, "{}", label.with(color).bold())?;
        } else {
            self.out.write_all(label.as_bytes())?;
        }
        self.line_open = true;
        Ok(())
    }

    fn write_text(&mut self, text: &str) -> io::Result<()> {
        let text = inert(text);
        if text.is_empty() {
            return Ok(());
        }
        if self.style.raw_newlines {
            self.out.write_all(text.replace('\n', "\r\n").as_bytes())?;
        } else {
            self.out.write_all(text.as_bytes())?;
        }
        self.line_open = !text.ends_with('\n');
        Ok(())
    }
}

/// Drop `\r` and replace every other control character except `\n` and `\t`
/// with U+FFFD.
fn inert(text: &str) -> Cow<'_, str> {
    let is_unsafe = |c: char| c.is_control() && c != '\n' && c != '\t';
    if !text.chars().any(is_unsafe) {
        return Cow::Borrowed(text);
    }
    text.chars()
        .filter(|&c| c != '\r')
        .map(|c| {
            if is_unsafe(c) {
                char::REPLACEMENT_CHARACTER
            } else {
                c
            }
        })
        .collect()
}
