//! Crossterm-backed [`Terminal`]
//!
//! The message area takes every row but the last, which holds the status
//! line and the label chooser prompt.

use crate::error::{Error, Result};
use crate::review::{Key, Status, StatusKind, Terminal};
use async_trait::async_trait;
use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use crossterm::terminal::{
    self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode,
    enable_raw_mode,
};
use crossterm::{execute, queue};
use std::io::{self, Stdout, Write};

const FALLBACK_SIZE: (u16, u16) = (80, 24);

pub struct CrosstermTerminal {
    out: Stdout,
    active: bool,
}

impl CrosstermTerminal {
    /// Switch to raw mode on the alternate screen.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal cannot be configured.
    pub fn enter() -> Result<Self> {
        let mut term = Self {
            out: io::stdout(),
            active: false,
        };
        term.activate()?;
        Ok(term)
    }

    fn activate(&mut self) -> io::Result<()> {
        enable_raw_mode()?;
        execute!(self.out, EnterAlternateScreen, Hide, Clear(ClearType::All))?;
        self.active = true;
        Ok(())
    }

    fn deactivate(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        execute!(self.out, Show, LeaveAlternateScreen)?;
        disable_raw_mode()
    }

    fn screen() -> (u16, u16) {
        terminal::size().unwrap_or(FALLBACK_SIZE)
    }

    fn status_row() -> u16 {
        Self::screen().1.saturating_sub(1)
    }

    fn paint_status(&mut self, color: Color, text: &str) -> io::Result<()> {
        let width = usize::from(Self::screen().0);
        queue!(
            self.out,
            MoveTo(0, Self::status_row()),
            Clear(ClearType::CurrentLine),
            SetForegroundColor(color),
            Print(clip(text, width)),
            ResetColor,
        )?;
        self.out.flush()
    }
}

impl Drop for CrosstermTerminal {
    fn drop(&mut self) {
        self.deactivate().ok();
    }
}

fn clip(line: &str, width: usize) -> &str {
    line.char_indices().nth(width).map_or(line, |(i, _)| &line[..i])
}

fn key_from_event(key: KeyEvent) -> Key {
    match key.code {
        KeyCode::Char(c) if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Key::Ctrl(c.to_ascii_lowercase())
        }
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::PageUp => Key::PageUp,
        KeyCode::PageDown => Key::PageDown,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Enter => Key::Enter,
        KeyCode::Tab => Key::Tab,
        KeyCode::Esc => Key::Esc,
        other => Key::Other(format!("{other:?}")),
    }
}

/// Block on a worker thread until a key is pressed.
async fn read_key() -> Result<Key> {
    tokio::task::spawn_blocking(|| -> io::Result<Key> {
        loop {
            if let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
            {
                return Ok(key_from_event(key));
            }
        }
    })
    .await
    .map_err(|e| Error::Io(io::Error::other(e)))?
    .map_err(Error::from)
}

/// Longest prefix shared by every string in `options`.
fn common_prefix<'a>(options: &[&'a str]) -> &'a str {
    let Some((first, rest)) = options.split_first() else {
        return "";
    };
    let mut len = first.len();
    for other in rest {
        len = first
            .char_indices()
            .zip(other.chars())
            .find(|((_, a), b)| a != b)
            .map_or(len.min(other.len()), |((i, _), _)| len.min(i));
    }
    while !first.is_char_boundary(len) {
        len -= 1;
    }
    &first[..len]
}

/// Resolve what was typed into the chooser to one of `options`.
fn resolve(typed: &str, options: &[String]) -> Option<String> {
    if options.iter().any(|o| o == typed) {
        return Some(typed.to_string());
    }
    let mut matches = options.iter().filter(|o| o.starts_with(typed));
    match (matches.next(), matches.next()) {
        (Some(only), None) => Some(only.clone()),
        _ => None,
    }
}

#[async_trait]
impl Terminal for CrosstermTerminal {
    async fn next_key(&mut self) -> Result<Key> {
        read_key().await
    }

    fn size(&self) -> (usize, usize) {
        let (cols, rows) = Self::screen();
        (usize::from(cols), usize::from(rows.saturating_sub(1)))
    }

    fn draw(&mut self, lines: &[String]) -> Result<()> {
        let (width, height) = self.size();
        for (row, line) in lines.iter().take(height).enumerate() {
            queue!(
                self.out,
                MoveTo(0, u16::try_from(row).unwrap_or(u16::MAX)),
                Clear(ClearType::CurrentLine),
                Print(clip(line, width)),
            )?;
        }
        self.out.flush()?;
        Ok(())
    }

    fn status(&mut self, status: &Status) -> Result<()> {
        let color = match status.kind {
            StatusKind::Info => Color::Reset,
            StatusKind::Ok => Color::Green,
            StatusKind::Error => Color::Red,
        };
        Ok(self.paint_status(color, &status.text)?)
    }

    async fn help(&mut self, text: &str) -> Result<()> {
        let lines: Vec<String> = text.lines().map(str::to_string).collect();
        queue!(self.out, Clear(ClearType::All))?;
        self.draw(&lines)?;
        self.paint_status(Color::Reset, "Press any key to continue")?;
        read_key().await?;
        Ok(())
    }

    async fn choose(&mut self, prompt: &str, options: &[String]) -> Result<Option<String>> {
        let mut typed = String::new();
        loop {
            let candidates: Vec<&str> = options
                .iter()
                .map(String::as_str)
                .filter(|o| o.starts_with(typed.as_str()))
                .collect();
            let line = format!("{prompt} {typed}    [{}]", candidates.join(" "));
            self.paint_status(Color::Reset, &line)?;

            match read_key().await? {
                Key::Esc | Key::Ctrl('c') => return Ok(None),
                Key::Enter => {
                    return Ok(if typed.is_empty() {
                        None
                    } else {
                        resolve(&typed, options)
                    });
                }
                Key::Tab => typed = common_prefix(&candidates).to_string(),
                Key::Backspace => {
                    typed.pop();
                }
                Key::Char(c) => typed.push(c),
                _ => {}
            }
        }
    }

    fn suspend(&mut self) -> Result<()> {
        Ok(self.deactivate()?)
    }

    fn resume(&mut self) -> Result<()> {
        Ok(self.activate()?)
    }
}
