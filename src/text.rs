//! Text helpers for composing result comments.

use std::sync::LazyLock;

use regex::Regex;

/// CSI sequences (colors, cursor movement) and OSC sequences (hyperlinks, titles).
static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)")
        .expect("ANSI escape pattern is valid")
});

/// Removes ANSI escape sequences from terminal-formatted text.
///
/// Assertion libraries colorize their diffs; the service renders comments
/// verbatim, so the escapes would show up as garbage.
pub fn strip_ansi(input: &str) -> String {
    ANSI_ESCAPE.replace_all(input, "").into_owned()
}
