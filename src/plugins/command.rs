//! Line-anchored slash-command matching.
//!
//! A command is recognized only at the start of a line: `/name` alone, or
//! `/name` followed by spaces/tabs and arguments. HTML comments are removed
//! first, so commands inside `<!-- ... -->` blocks (quoted templates, hidden
//! text) never fire.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

static HTML_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("static pattern is valid"));

/// Removes every `<!-- ... -->` block, including multi-line ones.
pub fn strip_html_comments(body: &str) -> Cow<'_, str> {
    HTML_COMMENT.replace_all(body, "")
}

/// Pattern matching `/name [args]` on its own line.
pub fn command_pattern(name: &str) -> Regex {
    Regex::new(&format!(r"(?m)^/{}(?:[ \t]+(.*?))?\s*$", regex::escape(name)))
        .expect("escaped command pattern is valid")
}

/// Pattern matching exactly `/name argument` on its own line.
pub fn argument_pattern(name: &str, argument: &str) -> Regex {
    Regex::new(&format!(
        r"(?m)^/{}[ \t]+{}\s*$",
        regex::escape(name),
        regex::escape(argument)
    ))
    .expect("escaped command pattern is valid")
}

/// Every match of `pattern` in `body`, trimmed and split on single spaces.
///
/// The command itself is the first element. Consecutive spaces yield empty
/// elements, which callers treat as malformed.
pub fn invocations<'a>(pattern: &Regex, body: &'a str) -> Vec<Vec<&'a str>> {
    pattern
        .find_iter(body)
        .map(|m| m.as_str().trim().split(' ').collect())
        .collect()
}
