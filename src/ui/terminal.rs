//! Interactive raw-mode terminal surface.
//!
//! The transcript scrolls above a prompt. Typed input is echoed at the
//! prompt and redrawn on every edit; Enter submits, Shift+Enter or
//! Alt+Enter inserts a newline, Ctrl-S sends, Ctrl-C or Ctrl-D on an empty
//! prompt quits.
//!
//! Keys pressed while a reply is streaming are queued and handled once the
//! reply has finished, except Ctrl-C, which abandons the reply. Pastes arrive
//! as one block and never submit on their own.

use std::collections::VecDeque;
use std::io::{self, Write};

use crossterm::event::{
    DisableBracketedPaste, EnableBracketedPaste, Event, EventStream, KeyCode, KeyEvent,
    KeyEventKind, KeyModifiers, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use crossterm::style::Stylize;
use crossterm::{cursor, execute, queue, terminal};
use futures::StreamExt;
use tracing::debug;
use unicode_width::UnicodeWidthStr;
use url::Url;

use crate::client::ChatTransport;
use crate::config::UiConfig;
use crate::controller::ChatController;
use crate::error::{ChatError, Result};
use crate::session::Role;

use super::{
    ChatSignal, ChatSurface, Composer, ComposerEffect, KeyInput, NodeId, Transcript,
    TranscriptStyle,
};

const PROMPT: &str = "> ";
const CONTINUATION: &str = "  ";

/// Map a terminal event to abstract key input.
pub fn translate(event: &Event) -> Option<KeyInput> {
    if let Event::Paste(text) = event {
        return Some(KeyInput::Paste(text.clone()));
    }
    let Event::Key(KeyEvent {
        code,
        modifiers,
        kind,
        ..
    }) = event
    else {
        return None;
    };
    if *kind == KeyEventKind::Release {
        return None;
    }

    let ctrl = modifiers.contains(KeyModifiers::CONTROL);
    match code {
        KeyCode::Enter => Some(KeyInput::Enter {
            line_break: modifiers.intersects(KeyModifiers::SHIFT | KeyModifiers::ALT),
        }),
        KeyCode::Char('c') if ctrl => Some(KeyInput::Interrupt),
        KeyCode::Char('d') if ctrl => Some(KeyInput::EndOfInput),
        KeyCode::Char('u') if ctrl => Some(KeyInput::ClearLine),
        KeyCode::Char('s') if ctrl => Some(KeyInput::Send),
        // Terminals without keyboard enhancement send Ctrl-J for a bare newline.
        KeyCode::Char('j') if ctrl => Some(KeyInput::Enter { line_break: true }),
        KeyCode::Char(_) if ctrl => None,
        KeyCode::Char(c) => Some(KeyInput::Char(*c)),
        KeyCode::Tab => Some(KeyInput::Char(' ')),
        KeyCode::Backspace => Some(KeyInput::Backspace),
        _ => None,
    }
}

/// Number of screen rows the prompt plus `text` occupies at `width` columns.
fn input_rows(text: &str, width: u16) -> u16 {
    let width = usize::from(width.max(1));
    let rows: usize = text
        .split('\n')
        .map(|line| {
            let cols = PROMPT.len() + line.width();
            cols.div_ceil(width).max(1)
        })
        .sum();
    u16::try_from(rows).unwrap_or(u16::MAX)
}

/// Chat surface on a raw-mode terminal.
#[derive(Debug)]
pub struct TerminalSurface<W: Write> {
    transcript: Transcript<W>,
    composer: Composer,
    /// Rows the prompt currently occupies; zero when it is not drawn.
    prompt_rows: u16,
}

impl<W: Write> TerminalSurface<W> {
    pub fn new(out: W, style: TranscriptStyle) -> Self {
        Self {
            transcript: Transcript::new(out, style.raw()),
            composer: Composer::new(),
            prompt_rows: 0,
        }
    }

    /// Apply one key to the input field and redraw it.
    pub fn handle_key(&mut self, key: KeyInput) -> io::Result<Option<ChatSignal>> {
        match self.composer.handle(key) {
            ComposerEffect::Edited => {
                self.erase_prompt()?;
                self.draw_prompt()?;
                Ok(None)
            }
            ComposerEffect::Submit => Ok(Some(ChatSignal::SubmitRequested)),
            ComposerEffect::Quit => Ok(Some(ChatSignal::Quit)),
            ComposerEffect::Ignored => Ok(None),
        }
    }

    /// Print a one-line banner above the first prompt.
    pub fn banner(&mut self, endpoint: &Url) -> io::Result<()> {
        let line = format!(
            "streamchat: {endpoint} (Enter to send, Shift+Enter for a new line, Ctrl-D to quit)"
        );
        let color = self.transcript.style().color;
        let out = self.transcript.writer_mut();
        if color {
            write!(out, "{}\r\n\r\n", line.as_str().dark_grey())?;
        } else {
            write!(out, "{line}\r\n\r\n")?;
        }
        Ok(())
    }

    fn draw_prompt(&mut self) -> io::Result<()> {
        let text = self.composer.text().replace('\n', &format!("\r\n{CONTINUATION}"));
        let width = terminal::size().map_or(80, |(cols, _)| cols);
        self.prompt_rows = input_rows(self.composer.text(), width);

        let out = self.transcript.writer_mut();
        write!(out, "{PROMPT}{text}")?;
        out.flush()
    }

    fn erase_prompt(&mut self) -> io::Result<()> {
        if self.prompt_rows == 0 {
            return Ok(());
        }
        let up = self.prompt_rows - 1;
        let out = self.transcript.writer_mut();
        queue!(out, cursor::MoveToColumn(0))?;
        if up > 0 {
            queue!(out, cursor::MoveUp(up))?;
        }
        queue!(out, terminal::Clear(terminal::ClearType::FromCursorDown))?;
        self.prompt_rows = 0;
        Ok(())
    }
}

impl<W: Write> ChatSurface for TerminalSurface<W> {
    type Node = NodeId;

    fn render(&mut self, role: Role, content: &str) -> io::Result<NodeId> {
        self.transcript.render(role, content)
    }

    fn set_text(&mut self, node: &NodeId, text: &str) -> io::Result<()> {
        self.transcript.set_text(*node, text)
    }

    fn scroll_to_bottom(&mut self) -> io::Result<()> {
        // The terminal follows the cursor; making output visible is enough.
        self.transcript.flush()
    }

    fn input_text(&self) -> String {
        self.composer.text().to_owned()
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.erase_prompt()?;
        self.composer.clear();
        Ok(())
    }

    fn show_error(&mut self, node: &NodeId, partial: &str, error: &ChatError) -> io::Result<()> {
        self.transcript.show_error(*node, partial, error)
    }

    fn ready_for_input(&mut self) -> io::Result<()> {
        self.transcript.end_block()?;
        self.draw_prompt()
    }
}

/// Terminal mode switches used by [`RawModeGuard`].
trait TerminalModes {
    fn enable_raw(&mut self) -> io::Result<()>;
    fn disable_raw(&mut self) -> io::Result<()>;
    fn supports_enhancement(&mut self) -> bool;
    fn push_enhancement(&mut self) -> io::Result<()>;
    fn pop_enhancement(&mut self) -> io::Result<()>;
    fn set_bracketed_paste(&mut self, enabled: bool) -> io::Result<()>;
}

/// The process terminal, via crossterm.
#[derive(Debug)]
struct Crossterm;

impl TerminalModes for Crossterm {
    fn enable_raw(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()
    }

    fn disable_raw(&mut self) -> io::Result<()> {
        terminal::disable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, crossterm::style::Print("\r\n"))
    }

    fn supports_enhancement(&mut self) -> bool {
        matches!(terminal::supports_keyboard_enhancement(), Ok(true))
    }

    fn push_enhancement(&mut self) -> io::Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES)
        )
    }

    fn pop_enhancement(&mut self) -> io::Result<()> {
        let mut stdout = io::stdout();
        execute!(stdout, PopKeyboardEnhancementFlags)
    }

    fn set_bracketed_paste(&mut self, enabled: bool) -> io::Result<()> {
        let mut stdout = io::stdout();
        if enabled {
            execute!(stdout, EnableBracketedPaste)
        } else {
            execute!(stdout, DisableBracketedPaste)
        }
    }
}

/// Puts the terminal in raw mode and restores it on drop.
///
/// The guard exists as soon as raw mode is on, so a failure while enabling
/// the other modes still restores the terminal.
#[derive(Debug)]
struct RawModeGuard<M: TerminalModes> {
    modes: M,
    enhanced: bool,
    paste: bool,
}

impl<M: TerminalModes> RawModeGuard<M> {
    fn enter(mut modes: M) -> io::Result<Self> {
        modes.enable_raw()?;
        let mut guard = Self {
            modes,
            enhanced: false,
            paste: false,
        };
        if guard.modes.supports_enhancement() {
            guard.modes.push_enhancement()?;
            guard.enhanced = true;
        }
        guard.modes.set_bracketed_paste(true)?;
        guard.paste = true;
        Ok(guard)
    }
}

impl<M: TerminalModes> Drop for RawModeGuard<M> {
    fn drop(&mut self) {
        if self.paste {
            let _ = self.modes.set_bracketed_paste(false);
        }
        if self.enhanced {
            let _ = self.modes.pop_enhancement();
        }
        let _ = self.modes.disable_raw();
    }
}

/// Resolve on Ctrl-C, queueing every other key for later.
async fn interrupted(events: &mut EventStream, queued: &mut VecDeque<KeyInput>) {
    while let Some(event) = events.next().await {
        match event.ok().as_ref().and_then(translate) {
            Some(KeyInput::Interrupt) => return,
            Some(key) => queued.push_back(key),
            None => {}
        }
    }
    std::future::pending::<()>().await;
}

/// Run an interactive session on stdout until the user quits.
pub async fn run<T: ChatTransport>(transport: T, ui: &UiConfig, endpoint: &Url) -> Result<()> {
    let _guard = RawModeGuard::enter(Crossterm)?;

    let surface = TerminalSurface::new(io::stdout(), TranscriptStyle::from_ui(ui));
    let mut controller = ChatController::new(transport, surface);
    controller.surface_mut().banner(endpoint)?;
    controller.surface_mut().ready_for_input()?;

    let mut events = EventStream::new();
    let mut queued = VecDeque::new();
    loop {
        let key = match queued.pop_front() {
            Some(key) => key,
            None => match events.next().await {
                Some(event) => match translate(&event?) {
                    Some(key) => key,
                    None => continue,
                },
                None => break,
            },
        };
        match controller.surface_mut().handle_key(key)? {
            Some(ChatSignal::SubmitRequested) => {
                let cancel = interrupted(&mut events, &mut queued);
                match controller.submit_input_until(cancel).await {
                    Ok(_) => {}
                    // Already shown in the transcript; keep the prompt alive for a retry.
                    Err(err) if err.is_recoverable() => {}
                    Err(err) => return Err(err),
                }
            }
            Some(ChatSignal::Quit) => break,
            None => {}
        }
    }

    debug!(
        name: "terminal.session.closed",
        messages = controller.conversation().len(),
        "Interactive session closed"
    );
    Ok(())
}
