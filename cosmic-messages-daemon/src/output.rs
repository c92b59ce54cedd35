//! Terminal output formatting

use chrono::{DateTime, Local, TimeZone, Utc};
use cosmic_messages_core::{Conversation, DiffOp, DiffScript, Direction, RenderedMessage};
use std::fmt::Display;

const NAME_WIDTH: usize = 20;
const SNIPPET_WIDTH: usize = 60;

/// Format a millisecond timestamp in local time
pub fn format_timestamp(ms: i64) -> String {
    format_timestamp_in(ms, &Local)
}

pub fn format_timestamp_in<Tz>(ms: i64, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    if ms <= 0 {
        return "-".to_string();
    }
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.with_timezone(tz).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Shorten `text` to at most `max` characters
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut shortened: String = text.chars().take(max.saturating_sub(1)).collect();
    shortened.push('…');
    shortened
}

/// One line of the conversation list
pub fn conversation_row(conversation: &Conversation) -> String {
    let unread = if conversation.unread_count > 0 {
        format!("({}) ", conversation.unread_count)
    } else {
        String::new()
    };
    format!(
        "{:>6}  {:<16}  {:<width$}  {}{}",
        conversation.thread_id.0,
        format_timestamp(conversation.timestamp),
        truncate(conversation.display_name(), NAME_WIDTH),
        unread,
        truncate(conversation.display_snippet(), SNIPPET_WIDTH),
        width = NAME_WIDTH,
    )
}

fn summary(conversation: &Conversation) -> String {
    format!(
        "{}: {}",
        conversation.display_name(),
        truncate(conversation.display_snippet(), SNIPPET_WIDTH)
    )
}

/// Human-readable lines for a diff script
pub fn script_lines(script: &DiffScript) -> Vec<String> {
    script
        .iter()
        .map(|op| match op {
            DiffOp::Remove { position } => format!("- [{}]", position),
            DiffOp::Move { from, to } => format!("~ [{}] -> [{}]", from, to),
            DiffOp::Insert { position, item } => format!("+ [{}] {}", position, summary(item)),
            DiffOp::Update { position, item } => format!("* [{}] {}", position, summary(item)),
        })
        .collect()
}

/// One line of a thread view
pub fn message_line(rendered: &RenderedMessage, timestamp: &str) -> String {
    let marker = if rendered.is_system {
        "--"
    } else {
        match rendered.direction {
            Direction::Incoming => "<<",
            Direction::Outgoing => ">>",
        }
    };

    let mut line = format!("{}  {} {}", timestamp, marker, rendered.main_text);
    if rendered.show_play_button {
        line.push_str(" [▶]");
    }
    if let Some(original) = &rendered.original_text {
        line.push_str(&format!("\n{:>width$}{}", "", original, width = timestamp.len() + 5));
    }
    line
}
