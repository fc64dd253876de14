//! Terminal commands beside `serve`.

pub mod chat;
pub mod doctor;
pub mod re_embed;
pub mod search;
pub mod seed;

/// Shorten `text` to `max` characters, appending `...` when cut.
pub(crate) fn preview(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
