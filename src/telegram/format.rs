//! View-tracking text rendering for whisper messages

use chrono::{DateTime, FixedOffset};

/// Offset used when rendering view times (UTC+03:30)
const VIEW_TIME_OFFSET_SECS: i32 = 3 * 3600 + 30 * 60;

/// Placeholder shown before the receiver has opened the whisper
const NOT_SEEN: &str = "not seen yet";

/// View-tracking state rendered under a whisper message
#[derive(Debug, Clone, Default)]
pub struct ViewStatus {
    /// Receiver's display name
    pub receiver_display_name: String,
    /// Unix timestamps of the receiver's views, oldest first
    pub receiver_views: Vec<i64>,
    /// Display names of non-receivers who tried to open the whisper
    pub curious_users: Vec<String>,
}

/// Escape MarkdownV2 special characters
#[must_use]
pub fn escape_markdown(text: &str) -> String {
    const SPECIAL: &[char] = &[
        '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
    ];

    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if SPECIAL.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Render a unix timestamp as `HH:MM` at the fixed view-time offset
#[must_use]
pub fn local_view_time(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .zip(FixedOffset::east_opt(VIEW_TIME_OFFSET_SECS))
        .map_or_else(
            || NOT_SEEN.to_string(),
            |(utc, offset)| utc.with_timezone(&offset).format("%H:%M").to_string(),
        )
}

/// Render the view-tracking block for a whisper
///
/// First line: receiver name, view count, last view time (or a placeholder).
/// After the separator: one curious user per line, or `Nothing`.
#[must_use]
pub fn format_view_status(status: &ViewStatus) -> String {
    let view_count = status.receiver_views.len();
    let last_view = status
        .receiver_views
        .last()
        .map_or_else(|| NOT_SEEN.to_string(), |ts| local_view_time(*ts));

    let mut block = format!(
        "{} {view_count} | {last_view}\n___\n",
        escape_markdown(&status.receiver_display_name)
    );

    if status.curious_users.is_empty() {
        block.push_str("Nothing");
    } else {
        let users: Vec<String> = status
            .curious_users
            .iter()
            .map(|u| escape_markdown(u))
            .collect();
        block.push_str(&users.join("\n"));
    }

    block
}
