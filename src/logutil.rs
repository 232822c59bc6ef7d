//! Keep chat text on one log line.
//!
//! Nicknames and command arguments come straight from chat platforms and may
//! carry newlines or control characters; everything user-supplied goes
//! through [`escape_log`] before it reaches a log macro.

use std::fmt::Write;

/// Longest preview kept from a single piece of user text.
pub const MAX_PREVIEW: usize = 200;

/// Escape `\n`, `\r`, `\t`, backslashes and other control characters, then
/// cut the result at [`MAX_PREVIEW`] characters with an ellipsis.
pub fn escape_log(s: &str) -> String {
    escape_log_limited(s, MAX_PREVIEW)
}

pub fn escape_log_limited(s: &str, limit: usize) -> String {
    let mut out = String::with_capacity(s.len().min(limit) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= limit {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Hide all but the first four characters after the `VIP-` prefix.
pub fn mask_code(code: &str) -> String {
    let body = code.strip_prefix("VIP-").unwrap_or(code);
    let visible: String = body.chars().take(4).collect();
    let hidden = body.chars().count().saturating_sub(4);
    format!("VIP-{}{}", visible, "*".repeat(hidden))
}

/// One-line rendering of a command and its arguments for the log.
pub fn command_preview(name: &str, args: &[String]) -> String {
    if args.is_empty() {
        escape_log(name)
    } else {
        escape_log(&format!("{} {}", name, args.join(" ")))
    }
}
