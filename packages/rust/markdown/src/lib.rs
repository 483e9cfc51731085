//! HTML-to-Markdown rendering for help-desk message bodies.
//!
//! Bodies are rendered into a markdown-flavored string that keeps `<br>` as
//! its line separator, so the result stays embeddable in rich-text fields of
//! the target platform. Rendering is an ordered chain of regex rewrites
//! followed by the [`clean_markdown`] pipeline. It never fails: markup the
//! rules do not recognize passes through or is stripped.

mod cleanup;

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::instrument;

pub use cleanup::clean_markdown;

/// The line-break marker used in every rendered body.
pub const LINE_BREAK: &str = "<br>";

/// Alt text used for images without one.
const DEFAULT_ALT: &str = "image";

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Render an HTML fragment to markdown with `<br>` line breaks.
///
/// Images become `![alt](src)`, anchors ` [text](href) `, strong/b and
/// em/i become `**…**` / `*…*`, paragraph and div boundaries become `<br>`.
/// Every other tag is stripped, the five common entities are decoded and
/// whitespace is collapsed before the cleanup pipeline runs.
#[instrument(level = "trace", skip_all, fields(len = html.len()))]
pub fn render_html(html: &str) -> String {
    let mut result = convert_images(html);

    result = convert_links(&result);
    result = convert_emphasis(&result);
    result = convert_blocks(&result);
    result = strip_tags(&result);
    result = decode_entities(&result);
    result = collapse_inline_whitespace(&result);
    result = collapse_line_breaks(&result);

    clean_markdown(&result)
}

/// Render a plain-text body: newlines become `<br>`, then cleanup runs.
pub fn plain_text_to_markdown(text: &str) -> String {
    let with_breaks = text.replace("\r\n", LINE_BREAK).replace('\n', LINE_BREAK);
    clean_markdown(&with_breaks)
}

/// Render an HTML fragment onto a single line (used for titles).
pub fn render_inline(html: &str) -> String {
    static SPACES_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\s{2,}").expect("valid regex"));

    let rendered = render_html(html).replace(LINE_BREAK, " ");
    SPACES_RE.replace_all(&rendered, " ").trim().to_string()
}

// ---------------------------------------------------------------------------
// Step 1: Images
// ---------------------------------------------------------------------------

/// `<img>` → `![alt](src)`, whichever order the attributes come in.
fn convert_images(html: &str) -> String {
    static ALT_SRC_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r#"(?is)<img\b[^>]*?\salt\s*=\s*["']([^"']*)["'][^>]*?\ssrc\s*=\s*["']([^"']*)["'][^>]*>"#,
        )
        .expect("valid regex")
    });
    static SRC_ALT_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r#"(?is)<img\b[^>]*?\ssrc\s*=\s*["']([^"']*)["'][^>]*?\salt\s*=\s*["']([^"']*)["'][^>]*>"#,
        )
        .expect("valid regex")
    });
    static SRC_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"(?is)<img\b[^>]*?\ssrc\s*=\s*["']([^"']*)["'][^>]*>"#)
            .expect("valid regex")
    });

    let result = ALT_SRC_RE.replace_all(html, |caps: &Captures| image(&caps[1], &caps[2]));
    let result = SRC_ALT_RE.replace_all(&result, |caps: &Captures| image(&caps[2], &caps[1]));
    SRC_RE
        .replace_all(&result, |caps: &Captures| image("", &caps[1]))
        .into_owned()
}

fn image(alt: &str, src: &str) -> String {
    let alt = alt.trim();
    let alt = if alt.is_empty() { DEFAULT_ALT } else { alt };
    format!("![{alt}]({})", src.trim())
}

// ---------------------------------------------------------------------------
// Step 2: Links
// ---------------------------------------------------------------------------

/// `<a href="h">t</a>` → ` [t](h) `. The surrounding spaces keep the link
/// from fusing with adjacent words.
fn convert_links(html: &str) -> String {
    static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"(?is)<a\b[^>]*?\shref\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a\s*>"#)
            .expect("valid regex")
    });

    LINK_RE
        .replace_all(html, |caps: &Captures| {
            format!(" [{}]({}) ", &caps[2], caps[1].trim())
        })
        .into_owned()
}

// ---------------------------------------------------------------------------
// Step 3: Emphasis
// ---------------------------------------------------------------------------

fn convert_emphasis(html: &str) -> String {
    static STRONG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?is)<strong\b[^>]*>(.*?)</strong\s*>").expect("valid regex")
    });
    // `<b>` but never `<br>`.
    static B_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?is)<b(?:\s[^>]*)?>(.*?)</b\s*>").expect("valid regex")
    });
    static EM_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?is)<em\b[^>]*>(.*?)</em\s*>").expect("valid regex")
    });
    // `<i>` but never `<img>`.
    static I_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?is)<i(?:\s[^>]*)?>(.*?)</i\s*>").expect("valid regex")
    });

    let result = wrap_emphasis(&STRONG_RE, html, "**");
    let result = wrap_emphasis(&B_RE, &result, "**");
    let result = wrap_emphasis(&EM_RE, &result, "*");
    wrap_emphasis(&I_RE, &result, "*")
}

/// Replace each match with its inner text wrapped in `delimiter`; blank
/// inner text drops the whole tag.
fn wrap_emphasis(re: &Regex, html: &str, delimiter: &str) -> String {
    re.replace_all(html, |caps: &Captures| {
        let inner = &caps[1];
        if inner.trim().is_empty() {
            String::new()
        } else {
            format!("{delimiter}{inner}{delimiter}")
        }
    })
    .into_owned()
}

// ---------------------------------------------------------------------------
// Steps 4-5: Blocks and leftover tags
// ---------------------------------------------------------------------------

fn convert_blocks(html: &str) -> String {
    static BLOCK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)</?(?:p|div)\b[^>]*>").expect("valid regex"));

    BLOCK_RE.replace_all(html, LINE_BREAK).into_owned()
}

/// Remove every tag except line-break markers.
fn strip_tags(html: &str) -> String {
    static TAG_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"<[^<>]+>").expect("valid regex"));
    static BR_TAG_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)^<\s*br\s*/?\s*>$").expect("valid regex"));

    TAG_RE
        .replace_all(html, |caps: &Captures| {
            let tag = &caps[0];
            if BR_TAG_RE.is_match(tag) {
                tag.to_string()
            } else {
                String::new()
            }
        })
        .into_owned()
}

// ---------------------------------------------------------------------------
// Steps 6-8: Entities and whitespace
// ---------------------------------------------------------------------------

/// Decode the five entities help-desk editors emit. `&amp;` goes last so
/// `&amp;lt;` ends up as the literal text `&lt;`.
fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}

fn collapse_inline_whitespace(text: &str) -> String {
    static WS_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[ \t]{2,}").expect("valid regex"));

    WS_RE.replace_all(text, " ").into_owned()
}

/// Three or more consecutive line breaks become exactly two.
fn collapse_line_breaks(text: &str) -> String {
    static BREAKS_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)(?:<\s*br\s*/?\s*>\s*){3,}").expect("valid regex")
    });

    BREAKS_RE.replace_all(text, "<br><br>").into_owned()
}
