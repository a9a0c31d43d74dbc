//! Small fenced-code markdown formatter.
//!
//! Only three constructs are recognized: triple-backtick fences, `**bold**`
//! and blank-line paragraph breaks. Anything else is emitted as escaped text.

use crate::render::{escape_attr, escape_html};
use regex::Regex;
use std::sync::LazyLock;

pub const FENCE: &str = "```";

static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("valid regex"));
static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{2,}").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Prose(&'a str),
    Code { lang: &'a str, code: &'a str },
}

impl Segment<'_> {
    /// Language label for a code segment, `text` when the fence has none.
    pub fn lang_or_default(&self) -> &str {
        match self {
            Segment::Code { lang, .. } if !lang.is_empty() => *lang,
            _ => "text",
        }
    }
}

pub fn has_fence(text: &str) -> bool {
    text.contains(FENCE)
}

/// Splits on fences. Odd pieces are code, even pieces are prose; blank prose
/// is dropped and both kinds come back trimmed.
pub fn segments(text: &str) -> Vec<Segment<'_>> {
    let mut parts = Vec::new();
    for (index, piece) in text.split(FENCE).enumerate() {
        if index % 2 == 1 {
            let (first_line, rest) = piece.split_once('\n').unwrap_or((piece, ""));
            parts.push(Segment::Code {
                lang: first_line.trim(),
                code: rest.trim(),
            });
        } else {
            let trimmed = piece.trim();
            if !trimmed.is_empty() {
                parts.push(Segment::Prose(trimmed));
            }
        }
    }
    parts
}

pub fn to_html(text: &str) -> String {
    let parts = segments(text);
    if parts.is_empty() {
        return format!("<p>{}</p>", escape_html(text));
    }

    parts
        .iter()
        .map(|segment| match segment {
            Segment::Prose(prose) => prose_html(prose),
            Segment::Code { code, .. } => format!(
                "<pre><code class=\"language-{}\">{}</code></pre>",
                escape_attr(segment.lang_or_default()),
                escape_html(code)
            ),
        })
        .collect()
}

fn prose_html(prose: &str) -> String {
    let escaped = escape_html(prose);
    let bold = BOLD.replace_all(&escaped, "<strong>$1</strong>");
    let paragraphs = PARAGRAPH_BREAK.replace_all(&bold, "</p><p>");
    format!("<p>{}</p>", paragraphs.replace('\n', "<br>"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_prose_bold_and_fenced_code() {
        let input = "before\n\n**bold**\n\n```js\nconsole.log(1)\n```\n\nafter";
        assert_eq!(
            to_html(input),
            "<p>before</p><p><strong>bold</strong></p>\
             <pre><code class=\"language-js\">console.log(1)</code></pre>\
             <p>after</p>"
        );
    }

    #[test]
    fn fence_without_language_is_tagged_text() {
        let html = to_html("```\nlet x = 1;\n```");
        assert_eq!(html, "<pre><code class=\"language-text\">let x = 1;</code></pre>");
    }

    #[test]
    fn single_newlines_become_line_breaks() {
        let html = to_html("one\ntwo\n\n\n\nthree\n```py\npass\n```");
        assert!(html.starts_with("<p>one<br>two</p><p>three</p>"));
    }

    #[test]
    fn prose_is_escaped_but_code_is_escaped_too() {
        let html = to_html("<script>alert(1)</script>\n```html\n<b>x</b>\n```");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(html.contains("&lt;b&gt;x&lt;/b&gt;"));
    }

    #[test]
    fn unterminated_fence_still_renders_code() {
        let parts = segments("intro\n```rust\nfn main() {}");
        assert_eq!(
            parts,
            vec![
                Segment::Prose("intro"),
                Segment::Code {
                    lang: "rust",
                    code: "fn main() {}"
                },
            ]
        );
    }

    #[test]
    fn bare_fence_falls_back_to_first_line_as_language() {
        // Nothing after the fence on the same line: the whole segment is the label.
        let parts = segments("```python```");
        assert_eq!(
            parts,
            vec![Segment::Code {
                lang: "python",
                code: ""
            }]
        );
    }

    #[test]
    fn whitespace_only_input_falls_back_to_raw_text() {
        assert_eq!(to_html("   "), "<p>   </p>");
        assert_eq!(to_html(""), "<p></p>");
    }

    #[test]
    fn language_label_cannot_break_out_of_the_class_attribute() {
        let html = to_html("```x\"><script>\nbody\n```");
        assert!(html.contains("class=\"language-x&quot;&gt;&lt;script&gt;\""));
    }

    #[test]
    fn bold_does_not_span_lines() {
        let html = to_html("**open\nclose**\n```\n```");
        assert!(!html.contains("<strong>"));
    }
}
