//! Input field model.

/// Terminal-independent key input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyInput {
    /// A printable character.
    Char(char),
    /// A block of pasted text, inserted verbatim.
    Paste(String),
    /// The confirm key. `line_break` is set when a newline modifier was held.
    Enter {
        /// Insert a literal newline instead of submitting.
        line_break: bool,
    },
    /// The explicit send control.
    Send,
    /// Delete the character before the cursor.
    Backspace,
    /// Discard the whole input.
    ClearLine,
    /// Interrupt (Ctrl-C).
    Interrupt,
    /// End of input (Ctrl-D).
    EndOfInput,
}

/// What a key did to the composer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposerEffect {
    /// The buffer changed and should be redrawn.
    Edited,
    /// Submission was requested.
    Submit,
    /// The user wants to quit.
    Quit,
    /// Nothing happened.
    Ignored,
}

/// Editable input buffer. Editing happens at the end of the buffer only.
#[derive(Debug, Default, Clone)]
pub struct Composer {
    buffer: String,
}

impl Composer {
    /// Create an empty composer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one key.
    pub fn handle(&mut self, key: KeyInput) -> ComposerEffect {
        match key {
            KeyInput::Char(c) if c.is_control() => ComposerEffect::Ignored,
            KeyInput::Char(c) => {
                self.buffer.push(c);
                ComposerEffect::Edited
            }
            KeyInput::Paste(text) => {
                let before = self.buffer.len();
                let text = text.replace("\r\n", "\n").replace('\r', "\n");
                self.buffer
                    .extend(text.chars().filter(|&c| c == '\n' || !c.is_control()));
                if self.buffer.len() == before {
                    ComposerEffect::Ignored
                } else {
                    ComposerEffect::Edited
                }
            }
            KeyInput::Enter { line_break: true } => {
                self.buffer.push('\n');
                ComposerEffect::Edited
            }
            KeyInput::Enter { line_break: false } | KeyInput::Send => ComposerEffect::Submit,
            KeyInput::Backspace => {
                if self.buffer.pop().is_some() {
                    ComposerEffect::Edited
                } else {
                    ComposerEffect::Ignored
                }
            }
            KeyInput::ClearLine if self.buffer.is_empty() => ComposerEffect::Ignored,
            KeyInput::ClearLine => {
                self.buffer.clear();
                ComposerEffect::Edited
            }
            KeyInput::Interrupt => ComposerEffect::Quit,
            KeyInput::EndOfInput if self.buffer.is_empty() => ComposerEffect::Quit,
            KeyInput::EndOfInput => ComposerEffect::Ignored,
        }
    }

    /// Current buffer contents.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// Replace the buffer contents.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.buffer = text.into();
    }

    /// Empty the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_str(composer: &mut Composer, s: &str) {
        for c in s.chars() {
            assert_eq!(composer.handle(KeyInput::Char(c)), ComposerEffect::Edited);
        }
    }

    #[test]
    fn test_enter_submits_without_modifier() {
        let mut composer = Composer::new();
        type_str(&mut composer, "Hello");
        assert_eq!(
            composer.handle(KeyInput::Enter { line_break: false }),
            ComposerEffect::Submit
        );
        // Submitting does not clear; the controller decides that.
        assert_eq!(composer.text(), "Hello");
    }

    #[test]
    fn test_modified_enter_inserts_newline() {
        let mut composer = Composer::new();
        type_str(&mut composer, "line one");
        assert_eq!(
            composer.handle(KeyInput::Enter { line_break: true }),
            ComposerEffect::Edited
        );
        type_str(&mut composer, "line two");
        assert_eq!(composer.text(), "line one\nline two");
    }

    #[test]
    fn test_send_control_submits() {
        let mut composer = Composer::new();
        assert_eq!(composer.handle(KeyInput::Send), ComposerEffect::Submit);
    }

    #[test]
    fn test_backspace_removes_whole_char() {
        let mut composer = Composer::new();
        type_str(&mut composer, "hé👋");
        assert_eq!(composer.handle(KeyInput::Backspace), ComposerEffect::Edited);
        assert_eq!(composer.text(), "hé");
        composer.clear();
        assert_eq!(composer.handle(KeyInput::Backspace), ComposerEffect::Ignored);
    }

    #[test]
    fn test_quit_keys() {
        let mut composer = Composer::new();
        assert_eq!(composer.handle(KeyInput::EndOfInput), ComposerEffect::Quit);

        type_str(&mut composer, "draft");
        assert_eq!(composer.handle(KeyInput::EndOfInput), ComposerEffect::Ignored);
        assert_eq!(composer.handle(KeyInput::Interrupt), ComposerEffect::Quit);
    }

    #[test]
    fn test_control_chars_ignored() {
        let mut composer = Composer::new();
        assert_eq!(composer.handle(KeyInput::Char('\u{7}')), ComposerEffect::Ignored);
        assert!(composer.text().is_empty());
    }

    #[test]
    fn test_clear_line() {
        let mut composer = Composer::new();
        assert_eq!(composer.handle(KeyInput::ClearLine), ComposerEffect::Ignored);
        type_str(&mut composer, "oops");
        assert_eq!(composer.handle(KeyInput::ClearLine), ComposerEffect::Edited);
        assert!(composer.text().is_empty());
    }

    #[test]
    fn test_paste_keeps_line_breaks() {
        let mut composer = Composer::new();
        type_str(&mut composer, "see: ");
        assert_eq!(
            composer.handle(KeyInput::Paste("first\r\nsecond\n\x1bthird".into())),
            ComposerEffect::Edited
        );
        assert_eq!(composer.text(), "see: first\nsecond\nthird");
        assert_eq!(
            composer.handle(KeyInput::Paste(String::new())),
            ComposerEffect::Ignored
        );
    }
}
