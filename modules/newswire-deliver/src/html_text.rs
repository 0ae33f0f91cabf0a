//! HTML → wrapped plain text, for the e-mail text alternative and the
//! plain-only artifact copy.

use regex::Regex;
use std::sync::OnceLock;

const WRAP_WIDTH: usize = 78;
const BODY_CAP: usize = 8000;

fn patterns() -> &'static [(Regex, &'static str); 6] {
    static PATTERNS: OnceLock<[(Regex, &'static str); 6]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (Regex::new(r"(?i)<br\s*/?>").expect("br pattern"), "\n"),
            (
                Regex::new(r"(?i)</(p|div|section|article|h[1-6]|tr)>").expect("block pattern"),
                "\n",
            ),
            (Regex::new(r"(?i)<li[^>]*>").expect("li pattern"), "\n- "),
            (Regex::new(r"(?is)<script.*?</script>").expect("script pattern"), " "),
            (Regex::new(r"(?is)<style.*?</style>").expect("style pattern"), " "),
            (Regex::new(r"<[^>]+>").expect("tag pattern"), " "),
        ]
    })
}

fn unescape_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn wrap_paragraph(paragraph: &str, width: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    for word in paragraph.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
        } else if current.chars().count() + 1 + word.chars().count() <= width {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines.join("\n")
}

/// Reduce an HTML document to readable wrapped text (<= 78 columns,
/// paragraphs preserved, capped to keep the plain body bounded).
pub fn html_to_wrapped_text(html: &str) -> String {
    let mut text = html.to_string();
    for (pattern, replacement) in patterns() {
        text = pattern.replace_all(&text, *replacement).into_owned();
    }
    text = unescape_entities(&text);

    static SPACES: OnceLock<Regex> = OnceLock::new();
    let spaces = SPACES.get_or_init(|| Regex::new(r"[\t\x0b\x0c\r ]+").expect("space pattern"));
    text = spaces.replace_all(&text, " ").into_owned();

    static BLANKS: OnceLock<Regex> = OnceLock::new();
    let blanks = BLANKS.get_or_init(|| Regex::new(r"\n{3,}").expect("blank pattern"));
    text = blanks.replace_all(&text, "\n\n").into_owned();

    let wrapped: Vec<String> = text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| wrap_paragraph(p, WRAP_WIDTH))
        .collect();
    let mut out = wrapped.join("\n\n").trim().to_string();
    if out.len() > BODY_CAP {
        let mut cut = BODY_CAP;
        while !out.is_char_boundary(cut) {
            cut -= 1;
        }
        out.truncate(cut);
        out.push_str("\n...");
    }
    if out.is_empty() {
        "(digest content)".to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_and_wraps() {
        let html = "<html><style>body{}</style><body><h1>Digest</h1>\n\n<p>First paragraph with some words.</p><p>Second&nbsp;&amp; last.</p></body></html>";
        let text = html_to_wrapped_text(html);
        assert!(text.contains("Digest"));
        assert!(text.contains("First paragraph with some words."));
        assert!(text.contains("Second & last."));
        assert!(!text.contains('<'));
    }

    #[test]
    fn long_lines_wrap_at_width() {
        let words = vec!["word"; 60].join(" ");
        let text = html_to_wrapped_text(&format!("<p>{words}</p>"));
        assert!(text.lines().all(|line| line.chars().count() <= 78));
    }

    #[test]
    fn empty_input_yields_placeholder() {
        assert_eq!(html_to_wrapped_text(""), "(digest content)");
    }
}
