//! # User Message Formatting
//!
//! Uplinked user messages are shown on a small character display. Messages
//! are reflowed into lines of at most 20 characters separated by a backtick,
//! and terminated with `\n` (end of message).

/// Characters per display line
pub const DISPLAY_LINE_CHARS: usize = 20;

/// Line separator understood by the display driver
pub const LINE_SEPARATOR: char = '`';

/// Reflow a user message for the display
///
/// Whitespace runs collapse to one space, words longer than a display line
/// are split into line-sized chunks, and words are packed greedily.
///
/// # Examples
///
/// ```
/// use telemetry_node::command::display::format_user_message;
///
/// assert_eq!(
///     format_user_message("The quick brown fox jumps over the lazy dog"),
///     "The quick brown fox`jumps over the lazy`dog\n"
/// );
/// ```
pub fn format_user_message(message: &str) -> String {
    let words: Vec<String> = message
        .split_whitespace()
        .flat_map(split_long_word)
        .collect();

    if words.is_empty() {
        return String::new();
    }

    let mut out = String::new();
    // Width of the current line, counting one trailing space per word
    let mut line_width = 0;

    for word in words {
        let width = word.chars().count();
        if line_width > 0 && line_width + width > DISPLAY_LINE_CHARS {
            out.push(LINE_SEPARATOR);
            line_width = 0;
        } else if line_width > 0 {
            out.push(' ');
        }
        out.push_str(&word);
        line_width += width + 1;
    }

    out.push('\n');
    out
}

fn split_long_word(word: &str) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    chars
        .chunks(DISPLAY_LINE_CHARS)
        .map(|chunk| chunk.iter().collect())
        .collect()
}
