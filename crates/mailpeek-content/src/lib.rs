//! Body extraction: MIME part selection and markup-to-text normalization.

use std::rc::Rc;
use std::sync::LazyLock;

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use mailparse::{DispositionType, ParsedMail};
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use regex::Regex;
use tracing::debug;

static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Elements whose whole subtree is dropped.
const HIDDEN_TAGS: [&str; 5] = ["style", "script", "head", "meta", "link"];
/// Elements that start a new line.
const BREAK_TAGS: [&str; 4] = ["p", "div", "br", "tr"];

/// Converts an HTML document into plain text.
///
/// Never fails: if the markup cannot be read, the input comes back verbatim.
pub fn normalize_html(markup: &str) -> String {
    if markup.is_empty() {
        return String::new();
    }
    let dom = match parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut markup.as_bytes())
    {
        Ok(dom) => dom,
        Err(err) => {
            debug!(error = %err, "markup unreadable, keeping raw body");
            return markup.to_string();
        }
    };
    let mut out = String::with_capacity(markup.len() / 2);
    write_text(&dom.document, &mut out);
    collapse_blank_lines(out.trim())
}

/// Replaces every run of three or more newlines with a single newline.
pub fn collapse_blank_lines(text: &str) -> String {
    BLANK_RUNS.replace_all(text, "\n").into_owned()
}

fn write_text(root: &Handle, out: &mut String) {
    // Explicit stack: mail HTML can nest deeply enough to blow recursion.
    let mut stack: Vec<Handle> = vec![Rc::clone(root)];
    while let Some(node) = stack.pop() {
        match &node.data {
            NodeData::Text { contents } => {
                let contents = contents.borrow();
                let text = contents.trim();
                if !text.is_empty() {
                    out.push_str(text);
                    out.push(' ');
                }
            }
            NodeData::Element { name, .. } => {
                let tag: &str = &name.local;
                if HIDDEN_TAGS.contains(&tag) {
                    continue;
                }
                if BREAK_TAGS.contains(&tag) {
                    out.push('\n');
                } else if tag == "li" {
                    out.push_str("\n- ");
                }
            }
            _ => {}
        }
        let children = node.children.borrow();
        stack.extend(children.iter().rev().cloned());
    }
}

/// The body text chosen for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyPart {
    Html(String),
    Plain(String),
    Missing,
}

impl BodyPart {
    /// Plain text for display: HTML is normalized, plain text passes through.
    pub fn into_text(self) -> String {
        match self {
            BodyPart::Html(html) => collapse_blank_lines(&normalize_html(&html)),
            BodyPart::Plain(text) => text,
            BodyPart::Missing => String::new(),
        }
    }
}

/// Picks the first inline `text/html` part, else the first inline
/// `text/plain` part.
pub fn select_body(parsed: &ParsedMail) -> BodyPart {
    let mut html: Option<String> = None;
    let mut plain: Option<String> = None;
    walk_leaves(parsed, &mut |part| {
        if matches!(
            part.get_content_disposition().disposition,
            DispositionType::Attachment
        ) {
            return;
        }
        let ctype = part.ctype.mimetype.to_ascii_lowercase();
        if ctype.starts_with("text/html") && html.is_none() {
            html = part.get_body().ok();
        } else if ctype.starts_with("text/plain") && plain.is_none() {
            plain = part.get_body().ok();
        }
    });
    match (html, plain) {
        (Some(html), _) => BodyPart::Html(html),
        (None, Some(plain)) => BodyPart::Plain(plain),
        (None, None) => BodyPart::Missing,
    }
}

/// Parses a raw RFC 822 message and returns its display text.
///
/// Unparseable messages yield an empty body.
pub fn extract_body(raw: &[u8]) -> String {
    match mailparse::parse_mail(raw) {
        Ok(parsed) => select_body(&parsed).into_text(),
        Err(err) => {
            debug!(error = %err, "message unparseable, empty body");
            String::new()
        }
    }
}

fn walk_leaves<F>(parsed: &ParsedMail, cb: &mut F)
where
    F: FnMut(&ParsedMail),
{
    if parsed.subparts.is_empty() {
        cb(parsed);
        return;
    }
    for part in &parsed.subparts {
        walk_leaves(part, cb);
    }
}

#[cfg(test)]
mod tests {
    use super::{BodyPart, collapse_blank_lines, extract_body, normalize_html, select_body};

    #[test]
    fn empty_input_is_empty_output() {
        assert_eq!(normalize_html(""), "");
    }

    #[test]
    fn script_and_style_text_is_dropped() {
        let html = "<html><head><title>t</title><style>.x{color:red}</style></head>\
                    <body><script>alert('boom')</script><p>Hello</p>\
                    <style>p{margin:0}</style></body></html>";
        let text = normalize_html(html);
        assert_eq!(text, "Hello");
        assert!(!text.contains("alert"));
        assert!(!text.contains("color"));
        assert!(!text.contains("margin"));
    }

    #[test]
    fn blocks_break_lines_and_list_items_get_dashes() {
        let html = "<body><div>Agenda</div><ul><li>one</li><li>two</li></ul></body>";
        assert_eq!(normalize_html(html), "Agenda \n- one \n- two");
    }

    #[test]
    fn anchor_keeps_text_not_target() {
        let html = r#"<p>Read <a href="https://example.com/x">the post</a> now</p>"#;
        let text = normalize_html(html);
        assert_eq!(text, "Read the post now");
        assert!(!text.contains("example.com"));
    }

    #[test]
    fn whitespace_in_text_nodes_is_trimmed() {
        assert_eq!(normalize_html("<p>   spaced   </p>"), "spaced");
    }

    #[test]
    fn long_newline_runs_collapse() {
        let html = "<div><br><br><br><br>a</div>";
        let text = normalize_html(html);
        assert!(!text.contains("\n\n\n"));
        assert_eq!(text, "a");
        assert_eq!(collapse_blank_lines("a\n\n\n\nb\n\nc"), "a\nb\n\nc");
    }

    #[test]
    fn malformed_markup_still_yields_text() {
        let text = normalize_html("<div><p>unclosed <b>bold");
        assert_eq!(text, "unclosed bold");
    }

    #[test]
    fn deep_nesting_does_not_overflow() {
        let html = format!("{}deep{}", "<div>".repeat(2000), "</div>".repeat(2000));
        let text = normalize_html(&html);
        assert_eq!(text, "deep");
    }

    #[test]
    fn html_part_wins_over_plain() {
        let raw = b"Content-Type: multipart/alternative; boundary=\"b\"\r\n\r\n\
--b\r\nContent-Type: text/plain; charset=utf-8\r\n\r\nplain body\r\n\
--b\r\nContent-Type: text/html; charset=utf-8\r\n\r\n<p>html body</p>\r\n\
--b--\r\n";
        let parsed = mailparse::parse_mail(raw).unwrap();
        assert!(matches!(select_body(&parsed), BodyPart::Html(_)));
        assert_eq!(extract_body(raw), "html body");
    }

    #[test]
    fn plain_only_passes_through() {
        let raw = b"Content-Type: text/plain; charset=utf-8\r\n\r\nline one\nline two";
        assert_eq!(extract_body(raw), "line one\nline two");
    }

    #[test]
    fn attachments_are_not_bodies() {
        let raw = b"Content-Type: multipart/mixed; boundary=\"b\"\r\n\r\n\
--b\r\nContent-Type: text/html\r\nContent-Disposition: attachment; filename=\"a.html\"\r\n\r\n<p>attached</p>\r\n\
--b\r\nContent-Type: text/plain\r\n\r\ninline text\r\n\
--b--\r\n";
        assert_eq!(extract_body(raw).trim_end(), "inline text");
    }

    #[test]
    fn no_text_part_means_empty_body() {
        let raw = b"Content-Type: image/png\r\n\r\nxxxx";
        assert_eq!(extract_body(raw), "");
    }
}
