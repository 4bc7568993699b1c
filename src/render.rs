//! Text layout for the feed and the message viewer
//!
//! Everything here is pure: it turns messages into lines of text and
//! leaves painting to the caller.

use crate::label::{LabelTable, sort_names};
use crate::message::Message;

const FROM_WIDTH: usize = 20;

/// Number of lines above the body in [`message_view`].
pub const HEADER_LINES: usize = 8;

/// One feed line: timestamp, quoted sender, quoted subject.
///
/// ```text
/// 2024-01-01 12:30  "alice@example.com": "Lunch?"
/// ```
#[must_use]
pub fn feed_line(message: &Message) -> String {
    let timestamp = message.date().map_or_else(
        || "Unknown".to_string(),
        |d| d.format("%Y-%m-%d %H:%M").to_string(),
    );
    let from = format!("{:?}", truncate_chars(message.header("From"), FROM_WIDTH));
    format!(
        "{timestamp:>16.16} {from:>20}: {:?}",
        message.header("Subject")
    )
}

fn truncate_chars(s: &str, max: usize) -> &str {
    s.char_indices().nth(max).map_or(s, |(i, _)| &s[..i])
}

/// Largest scroll offset for `content_lines` of body in a view of
/// `view_height` rows. The last half page may stay on screen.
#[must_use]
pub fn max_scroll(content_lines: usize, view_height: usize) -> i64 {
    to_i64(content_lines) - to_i64(view_height / 2)
}

/// Clamp `scroll` into `[0, max_scroll]`; zero wins when the content is
/// shorter than half a page.
#[must_use]
pub fn clamp_scroll(scroll: i64, content_lines: usize, view_height: usize) -> i64 {
    scroll.min(max_scroll(content_lines, view_height)).max(0)
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Break `body` into lines no wider than `width` characters.
///
/// Lines are broken at spaces where possible; words longer than the
/// width are split.
#[must_use]
pub fn wrap_body(body: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut out = Vec::new();
    for line in body.lines() {
        wrap_line(line.trim_end(), width, &mut out);
    }
    out
}

fn wrap_line(line: &str, width: usize, out: &mut Vec<String>) {
    if line.chars().count() <= width {
        out.push(line.to_string());
        return;
    }

    // Leading indentation stays with the first word.
    let words = line.trim_start_matches(' ');
    let indent = &line[..line.len() - words.len()];
    let indent = if indent.len() < width { indent } else { "" };

    let mut current = indent.to_string();
    let mut len = indent.len();
    for (i, word) in words.split(' ').enumerate() {
        let mut word = word;
        if i > 0 && len > 0 && len + 1 + word.chars().count() > width {
            out.push(std::mem::take(&mut current));
            len = 0;
        } else if i > 0 && len > 0 {
            current.push(' ');
            len += 1;
        }
        while len + word.chars().count() > width {
            let (head, tail) = word.split_at(byte_offset(word, width - len));
            current.push_str(head);
            out.push(std::mem::take(&mut current));
            len = 0;
            word = tail;
        }
        current.push_str(word);
        len += word.chars().count();
    }
    if !current.is_empty() {
        out.push(current);
    }
}

fn byte_offset(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map_or(s.len(), |(i, _)| i)
}

/// Everything needed to lay out one message in the viewer.
#[derive(Debug, Clone, Copy)]
pub struct MessageView<'a> {
    pub message: &'a Message,
    /// Zero-based position in the message list.
    pub position: usize,
    pub total: usize,
    pub marked: bool,
    /// Label id of the list the viewer was opened from.
    pub current_label: &'a str,
    pub labels: &'a LabelTable,
    pub width: usize,
    pub height: usize,
    pub scroll: i64,
}

/// Headers, a rule, and the visible window of the wrapped body, padded
/// to `height` lines.
#[must_use]
pub fn message_view(view: &MessageView<'_>) -> Vec<String> {
    let m = view.message;
    let marked = if view.marked { ", MARKED" } else { "" };

    let mut others: Vec<String> = m
        .label_ids
        .iter()
        .filter(|id| *id != view.current_label)
        .map(|id| view.labels.name(id).to_string())
        .collect();
    sort_names(&mut others);
    let mut labels = view.labels.name(view.current_label).to_string();
    for name in &others {
        labels.push_str(", ");
        labels.push_str(name);
    }

    let mut lines = vec![
        format!("Email {} of {}{marked}", view.position + 1, view.total),
        format!("From: {}", m.header("From")),
        format!("To: {}", m.header("To")),
        format!("CC: {}", m.header("Cc")),
        format!("Date: {}", m.header("Date")),
        format!("Subject: {}", m.header("Subject")),
        format!("Labels: {labels}"),
        "-".repeat(view.width),
    ];

    let body = wrap_body(&m.body(), view.width);
    let scroll = clamp_scroll(view.scroll, body.len(), view.height);
    let skip = usize::try_from(scroll).unwrap_or(0);
    let body_height = view.height.saturating_sub(HEADER_LINES);

    lines.extend(body.into_iter().skip(skip).take(body_height));
    lines.resize(HEADER_LINES + body_height, String::new());
    lines
}
