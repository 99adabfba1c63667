//! Interactive raw-mode message composer
//!
//! Reads key events one at a time with echo under this module's control
//! and assembles them into a growable body buffer. The editing state
//! machine ([`Composer`]) is pure over the buffer and an echo sink, so it
//! is testable without a terminal; the interactive loop owns raw mode and
//! the mid-compose filename prompt.

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::fs;
use std::io::{self, Write};

use crate::prompt::gather;

/// Word-delete stops at these; they never count as word characters.
const WORD_SEPARATORS: [char; 4] = [' ', '\t', ',', '\n'];

/// One editing action, decoded from a key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditCommand {
    /// Erase the last character, echoing it after an escape indicator.
    DeleteChar,
    /// Prompt for a file and splice its contents into the buffer.
    InsertFile,
    /// Discard the whole session.
    Abort,
    /// Finalize the body.
    Finish,
    /// Erase the last character with a correcting echo.
    Backspace,
    /// Reprint the buffer back to the latest newline.
    RetypeLine,
    /// Reprint the entire buffer.
    RetypeMessage,
    /// Erase trailing whitespace, then the word before it.
    DeleteWord,
    /// Erase back to the latest newline.
    DeleteLine,
    /// Take the next keystroke as literal data.
    LiteralNext,
    /// Append a character.
    Insert(char),
}

/// Decode a key press; `None` for keys with no editing meaning.
pub fn map_key(code: KeyCode, modifiers: KeyModifiers) -> Option<EditCommand> {
    let ctrl = modifiers.contains(KeyModifiers::CONTROL);
    match code {
        KeyCode::Char(c) if ctrl => match c.to_ascii_lowercase() {
            'a' => Some(EditCommand::DeleteChar),
            'b' | 'f' => Some(EditCommand::InsertFile),
            'c' => Some(EditCommand::Abort),
            'd' | 'z' => Some(EditCommand::Finish),
            'h' => Some(EditCommand::Backspace),
            'r' => Some(EditCommand::RetypeLine),
            's' => Some(EditCommand::RetypeMessage),
            'w' => Some(EditCommand::DeleteWord),
            'x' => Some(EditCommand::DeleteLine),
            _ => None,
        },
        KeyCode::Backspace => Some(EditCommand::Backspace),
        KeyCode::Char('\\') => Some(EditCommand::LiteralNext),
        KeyCode::Char(c) => Some(EditCommand::Insert(c)),
        KeyCode::Enter => Some(EditCommand::Insert('\n')),
        KeyCode::Tab => Some(EditCommand::Insert('\t')),
        _ => None,
    }
}

/// What the interactive loop should do after applying a command.
#[derive(Debug, PartialEq, Eq)]
pub enum Step {
    Continue,
    NeedFile,
    Finished,
    Aborted,
}

/// The editing state machine: a growable body buffer plus the pending
/// literal-escape flag.
pub struct Composer {
    buf: String,
    literal_next: bool,
    half_duplex: bool,
}

impl Composer {
    pub fn new(half_duplex: bool) -> Self {
        Self {
            buf: String::new(),
            literal_next: false,
            half_duplex,
        }
    }

    /// Whether the previous keystroke was the literal escape.
    pub fn literal_pending(&self) -> bool {
        self.literal_next
    }

    /// Apply one command, writing any echo output to `echo`.
    pub fn apply<W: Write>(&mut self, cmd: EditCommand, echo: &mut W) -> io::Result<Step> {
        match cmd {
            EditCommand::Insert(c) => self.insert(c, echo)?,

            EditCommand::DeleteChar => {
                if let Some(c) = self.buf.pop() {
                    write!(echo, "\\{c}")?;
                }
            }

            EditCommand::Backspace => {
                if self.buf.pop().is_some() {
                    echo.write_all(b"\x08 \x08")?;
                }
            }

            EditCommand::RetypeLine => {
                let start = self.buf.rfind('\n').map(|i| i + 1).unwrap_or(0);
                echo.write_all(b"\r\n")?;
                echo_text(echo, &self.buf[start..])?;
            }

            EditCommand::RetypeMessage => {
                echo.write_all(b"\r\n")?;
                echo_text(echo, &self.buf)?;
            }

            EditCommand::DeleteWord => self.delete_word(echo)?,

            EditCommand::DeleteLine => {
                echo.write_all(b"XXX\r\n")?;
                let keep = self.buf.rfind('\n').map(|i| i + 1).unwrap_or(0);
                self.buf.truncate(keep);
            }

            EditCommand::LiteralNext => self.literal_next = true,

            EditCommand::InsertFile => return Ok(Step::NeedFile),

            EditCommand::Abort => return Ok(Step::Aborted),

            EditCommand::Finish => {
                if !self.buf.ends_with('\n') {
                    self.buf.push('\n');
                    echo.write_all(b"\r\n")?;
                }
                return Ok(Step::Finished);
            }
        }
        Ok(Step::Continue)
    }

    /// Insert the escaped keystroke, translating for half-duplex terminals.
    pub fn insert_literal<W: Write>(&mut self, c: char, echo: &mut W) -> io::Result<()> {
        self.literal_next = false;
        let c = if self.half_duplex {
            half_duplex_translate(c)
        } else {
            c
        };
        self.insert(c, echo)
    }

    fn insert<W: Write>(&mut self, c: char, echo: &mut W) -> io::Result<()> {
        self.buf.push(c);
        if c == '\n' {
            echo.write_all(b"\r\n")
        } else {
            write!(echo, "{c}")
        }
    }

    fn delete_word<W: Write>(&mut self, echo: &mut W) -> io::Result<()> {
        while self.buf.ends_with([' ', '\t']) {
            self.buf.pop();
            echo.write_all(b"\x08 \x08")?;
        }
        while self
            .buf
            .chars()
            .next_back()
            .is_some_and(|c| !WORD_SEPARATORS.contains(&c))
        {
            self.buf.pop();
            echo.write_all(b"\x08 \x08")?;
        }
        Ok(())
    }

    /// Splice file contents in at the current position.
    pub fn insert_file(&mut self, contents: &str) {
        self.buf.push_str(contents);
    }

    pub fn into_body(self) -> String {
        self.buf
    }

    #[cfg(test)]
    fn buffer(&self) -> &str {
        &self.buf
    }
}

/// Echo buffered text, translating newlines for a raw-mode terminal.
fn echo_text<W: Write>(echo: &mut W, text: &str) -> io::Result<()> {
    for c in text.chars() {
        if c == '\n' {
            echo.write_all(b"\r\n")?;
        } else {
            write!(echo, "{c}")?;
        }
    }
    Ok(())
}

/// Literal-escape translation for half-duplex terminals: uppercase the
/// letters, map each reachable punctuation character to its unreachable
/// partner.
pub fn half_duplex_translate(c: char) -> char {
    match c {
        'a'..='z' => c.to_ascii_uppercase(),
        '!' => '|',
        '\'' => '`',
        '^' => '~',
        '(' => '{',
        ')' => '}',
        _ => c,
    }
}

/// How composition ended.
pub enum ComposeOutcome {
    Body(String),
    Aborted,
}

/// Restores cooked mode on every exit path, including abort and error.
struct RawModeGuard;

impl RawModeGuard {
    fn acquire() -> Result<Self> {
        enable_raw_mode().context("enable raw mode")?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

/// Run the composer against the interactive terminal.
pub fn compose_interactive(half_duplex: bool) -> Result<ComposeOutcome> {
    let mut composer = Composer::new(half_duplex);
    let guard = RawModeGuard::acquire()?;
    let mut out = io::stdout();

    loop {
        let Event::Key(KeyEvent {
            code,
            modifiers,
            kind,
            ..
        }) = event::read().context("read key event")?
        else {
            continue;
        };
        if kind != KeyEventKind::Press {
            continue;
        }

        if composer.literal_pending() {
            if let Some(c) = key_char(code) {
                composer.insert_literal(c, &mut out)?;
                out.flush()?;
            }
            continue;
        }

        let Some(cmd) = map_key(code, modifiers) else {
            continue;
        };
        let step = composer.apply(cmd, &mut out)?;
        out.flush()?;

        match step {
            Step::Continue => {}
            Step::NeedFile => prompt_insert_file(&mut composer)?,
            Step::Finished => {
                drop(guard);
                println!("-----");
                return Ok(ComposeOutcome::Body(composer.into_body()));
            }
            Step::Aborted => {
                drop(guard);
                println!();
                return Ok(ComposeOutcome::Aborted);
            }
        }
    }
}

/// The keystroke as literal data, ignoring any editing meaning.
fn key_char(code: KeyCode) -> Option<char> {
    match code {
        KeyCode::Char(c) => Some(c),
        KeyCode::Enter => Some('\n'),
        KeyCode::Tab => Some('\t'),
        _ => None,
    }
}

/// Leave raw mode for the filename prompt, splice the file in, come back.
fn prompt_insert_file(composer: &mut Composer) -> Result<()> {
    disable_raw_mode().context("leave raw mode")?;
    println!();

    let name = gather("Input file: ")?;
    match fs::read_to_string(&name) {
        Ok(contents) => {
            composer.insert_file(&contents);
            println!("{name} has been included");
        }
        Err(e) => println!("Couldn't open {name}: {e}"),
    }

    enable_raw_mode().context("re-enter raw mode")?;
    Ok(())
}
