//! Markdown cleanup pipeline for rendered message bodies.
//!
//! Each cleanup pass is a function `&str -> String` applied in sequence.
//! One round runs every pass once; rounds repeat until the text stops
//! changing, so cleaning already-clean text is a no-op.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::LINE_BREAK;

/// Upper bound on cleanup rounds. Real bodies settle in two or three.
const MAX_ROUNDS: usize = 16;

/// Clean up markdown produced by the renderer (or plain text carrying
/// `<br>` markers).
///
/// Trims emphasis spans, normalizes line-break markers and spacing, and
/// trims every visual line. Idempotent: `clean_markdown(&clean_markdown(s))
/// == clean_markdown(s)`.
pub fn clean_markdown(md: &str) -> String {
    let mut current = md.to_string();

    for _ in 0..MAX_ROUNDS {
        let next = run_round(&current);
        if next == current {
            return next;
        }
        current = next;
    }

    tracing::debug!(len = current.len(), "markdown cleanup did not settle");
    current
}

/// Run every cleanup pass once, in order.
fn run_round(md: &str) -> String {
    let mut result = collapse_star_runs(md);

    result = trim_bold_spans(&result);
    result = trim_italic_spans(&result);
    result = space_delimiters_around_breaks(&result);
    result = pull_punctuation_into_bold(&result);
    result = collapse_spaces(&result);
    result = normalize_line_breaks(&result);
    result = space_bold_before_link(&result);
    result = trim_lines(&result);

    result
}

// ---------------------------------------------------------------------------
// Pass 1: Collapse star runs
// ---------------------------------------------------------------------------

/// `***text***` and longer runs become plain bold delimiters.
fn collapse_star_runs(md: &str) -> String {
    static STARS_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\*{3,}").expect("valid regex"));

    STARS_RE.replace_all(md, "**").into_owned()
}

// ---------------------------------------------------------------------------
// Passes 2-3: Trim emphasis spans
// ---------------------------------------------------------------------------

/// `** text **` → `**text**`; a bold span with nothing in it disappears.
fn trim_bold_spans(md: &str) -> String {
    static BOLD_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\*\*([^*]+?)\*\*").expect("valid regex"));

    BOLD_RE
        .replace_all(md, |caps: &Captures| {
            let inner = caps[1].trim();
            if inner.is_empty() {
                String::new()
            } else {
                format!("**{inner}**")
            }
        })
        .into_owned()
}

/// `* text *` → `*text*`; an italic span with nothing in it disappears.
fn trim_italic_spans(md: &str) -> String {
    static ITALIC_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(^|[^*])\*([^*]+?)\*([^*]|$)").expect("valid regex")
    });

    ITALIC_RE
        .replace_all(md, |caps: &Captures| {
            let inner = caps[2].trim();
            if inner.is_empty() {
                format!("{}{}", &caps[1], &caps[3])
            } else {
                format!("{}*{inner}*{}", &caps[1], &caps[3])
            }
        })
        .into_owned()
}

// ---------------------------------------------------------------------------
// Pass 4: Delimiters next to line breaks
// ---------------------------------------------------------------------------

/// Separate emphasis delimiters from an adjacent `<br>` with one space.
fn space_delimiters_around_breaks(md: &str) -> String {
    static CLOSE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(\*{1,2})<br>").expect("valid regex"));
    static OPEN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"<br>(\*{1,2})").expect("valid regex"));

    let result = CLOSE_RE.replace_all(md, "$1 <br>");
    OPEN_RE.replace_all(&result, "<br> $1").into_owned()
}

// ---------------------------------------------------------------------------
// Pass 5: Trailing punctuation inside bold
// ---------------------------------------------------------------------------

/// `**word ,**` → `**word,**` (single comma or period only).
fn pull_punctuation_into_bold(md: &str) -> String {
    static PUNCT_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\*\*([^*]*?[^*\s])\s+([,.])\*\*").expect("valid regex"));

    PUNCT_RE.replace_all(md, "**${1}${2}**").into_owned()
}

// ---------------------------------------------------------------------------
// Passes 6-7: Spaces and line-break markers
// ---------------------------------------------------------------------------

fn collapse_spaces(md: &str) -> String {
    static SPACES_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r" {2,}").expect("valid regex"));

    SPACES_RE.replace_all(md, " ").into_owned()
}

/// `<br/>`, `<br />`, `<BR>`, `< br >` → `<br>`.
fn normalize_line_breaks(md: &str) -> String {
    static BR_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)<\s*br\s*/?\s*>").expect("valid regex"));

    BR_RE.replace_all(md, LINE_BREAK).into_owned()
}

// ---------------------------------------------------------------------------
// Pass 8: Bold followed by a link
// ---------------------------------------------------------------------------

fn space_bold_before_link(md: &str) -> String {
    static BOLD_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(\*\*[^*]+\*\*)[ \t]*(\[[^\]]*\]\([^)]*\))").expect("valid regex")
    });

    BOLD_LINK_RE.replace_all(md, "$1 $2").into_owned()
}

// ---------------------------------------------------------------------------
// Pass 9: Trim visual lines
// ---------------------------------------------------------------------------

fn trim_lines(md: &str) -> String {
    md.split(LINE_BREAK)
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(LINE_BREAK)
}
