//! Inline markup → markdown normalization for change fragments.
//!
//! A change fragment is the inner markup of one list entry. Normalization
//! resolves relative links against the release's documentation root, drops
//! decorative paragraph-link anchors, and renders the remaining inline markup
//! (emphasis, code, links) as markdown. Text whitespace is collapsed the way a
//! browser would, so hard-wrapped source paragraphs become single lines.
//!
//! ## Examples
//!
//! ```
//! use relnotes_lib::extract::normalize::normalize_fragment;
//!
//! let markdown = normalize_fragment(
//!     r#"<p>Fix <a href="sql-vacuum.html"><code>VACUUM</code></a> crash (Alice)</p>"#,
//!     "https://www.postgresql.org/docs",
//!     "16",
//! );
//! assert_eq!(
//!     markdown,
//!     "Fix [`VACUUM`](https://www.postgresql.org/docs/16/sql-vacuum.html) crash (Alice)"
//! );
//! ```

use scraper::{ElementRef, Html, Node};
use tracing::debug;
use url::Url;

/// Link texts that mark decorative self-anchors rather than content.
pub const DECORATIVE_ANCHOR_MARKERS: &[&str] = &["§", "¶", "#"];

/// Elements whose content is never rendered.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "head", "title"];

/// Elements rendered as standalone paragraphs.
const BLOCK_ELEMENTS: &[&str] = &[
    "p",
    "div",
    "blockquote",
    "ul",
    "ol",
    "dl",
    "dd",
    "dt",
    "table",
    "tr",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
];

/// Normalizes one fragment of inner markup into markdown text.
///
/// Total for any input: malformed markup is parsed leniently and rendered on
/// a best-effort basis.
pub fn normalize_fragment(inner_html: &str, docs_base: &str, major: &str) -> String {
    let fragment = Html::parse_fragment(inner_html);
    normalize_element(fragment.root_element(), docs_base, major)
}

/// Normalizes the children of an already-parsed element.
pub fn normalize_element(element: ElementRef<'_>, docs_base: &str, major: &str) -> String {
    let mut writer = MarkdownWriter::new(docs_base, major);
    writer.children(element);
    tidy(&writer.out)
}

/// Resolves a link target against the documentation root of `major`.
///
/// Absolute URLs (any scheme), protocol-relative URLs and in-page anchors are
/// returned unchanged. Everything else is joined onto `{docs_base}/{major}/`,
/// so `./` and `../` segments are normalized and root-relative targets land
/// on the origin of `docs_base`. A target that cannot be joined is kept as is.
///
/// ## Examples
///
/// ```
/// use relnotes_lib::extract::normalize::resolve_href;
///
/// let base = "https://www.postgresql.org/docs";
/// assert_eq!(resolve_href("func.html", base, "16"), "https://www.postgresql.org/docs/16/func.html");
/// assert_eq!(resolve_href("../static/x.html", base, "16"), "https://www.postgresql.org/docs/static/x.html");
/// assert_eq!(resolve_href("#anchor", base, "16"), "#anchor");
/// assert_eq!(resolve_href("https://example.com", base, "16"), "https://example.com");
/// ```
pub fn resolve_href(href: &str, docs_base: &str, major: &str) -> String {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("//") || has_scheme(href) {
        return href.to_string();
    }

    let root = format!("{}/{}/", docs_base.trim_end_matches('/'), major);
    match Url::parse(&root).and_then(|base| base.join(href)) {
        Ok(url) => url.into(),
        Err(e) => {
            debug!(href, root = %root, error = %e, "Cannot resolve link target; keeping it");
            href.to_string()
        }
    }
}

/// Whether `href` is an absolute URL such as `https://..` or `mailto:..`.
pub fn has_scheme(href: &str) -> bool {
    Url::parse(href).is_ok()
}

fn is_decorative_anchor(element: ElementRef<'_>) -> bool {
    let text: String = element.text().collect();
    DECORATIVE_ANCHOR_MARKERS.contains(&text.trim())
}

struct MarkdownWriter<'a> {
    out: String,
    docs_base: &'a str,
    major: &'a str,
    /// Renders inline content for a wrapper; leading whitespace is significant
    inline_only: bool,
}

impl<'a> MarkdownWriter<'a> {
    fn new(docs_base: &'a str, major: &'a str) -> Self {
        Self {
            out: String::new(),
            docs_base,
            major,
            inline_only: false,
        }
    }

    /// Renders into a fresh buffer with the same link context.
    fn nested(&self, element: ElementRef<'_>) -> String {
        let mut inner = MarkdownWriter::new(self.docs_base, self.major);
        inner.inline_only = true;
        inner.children(element);
        inner.out
    }

    fn children(&mut self, element: ElementRef<'_>) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => self.text(text),
                Node::Element(_) => {
                    if let Some(child_element) = ElementRef::wrap(child) {
                        self.element(child_element);
                    }
                }
                _ => {}
            }
        }
    }

    fn element(&mut self, element: ElementRef<'_>) {
        let name = element.value().name();
        match name {
            _ if SKIPPED_ELEMENTS.contains(&name) => {}
            "a" => self.anchor(element),
            "em" | "i" | "cite" | "var" | "dfn" => {
                let inner = self.nested(element);
                self.wrapped("*", &inner);
            }
            "strong" | "b" => {
                let inner = self.nested(element);
                self.wrapped("**", &inner);
            }
            "code" | "tt" | "kbd" | "samp" => {
                let inner = collapse_whitespace(&element.text().collect::<String>());
                self.wrapped("`", &inner);
            }
            "br" => self.out.push('\n'),
            "pre" => {
                self.paragraph_break();
                let raw: String = element.text().collect();
                self.out.push_str("```\n");
                self.out.push_str(raw.trim_matches('\n'));
                self.out.push_str("\n```");
                self.paragraph_break();
            }
            "li" => {
                self.line_break();
                self.out.push_str("- ");
                self.children(element);
                self.line_break();
            }
            _ if BLOCK_ELEMENTS.contains(&name) => {
                self.paragraph_break();
                self.children(element);
                self.paragraph_break();
            }
            _ => self.children(element),
        }
    }

    fn anchor(&mut self, element: ElementRef<'_>) {
        if is_decorative_anchor(element) {
            return;
        }

        let text = self.nested(element);
        let label = text.trim();
        match element.value().attr("href").map(str::trim) {
            Some(href) if !href.is_empty() && !label.is_empty() => {
                let target = resolve_href(href, self.docs_base, self.major);
                self.wrapped_link(&text, &target);
            }
            _ => self.inline(&text),
        }
    }

    fn text(&mut self, text: &str) {
        let collapsed = collapse_whitespace(text);
        self.inline(&collapsed);
    }

    /// Appends inline text, dropping whitespace at the start of a line.
    fn inline(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let at_line_start = self.out.ends_with('\n') || (self.out.is_empty() && !self.inline_only);
        if at_line_start {
            self.out.push_str(text.trim_start());
        } else if self.out.ends_with(' ') && text.starts_with(' ') {
            self.out.push_str(&text[1..]);
        } else {
            self.out.push_str(text);
        }
    }

    /// Wraps trimmed content in `marker`, keeping surrounding spaces outside.
    fn wrapped(&mut self, marker: &str, inner: &str) {
        let trimmed = inner.trim();
        if trimmed.is_empty() {
            self.inline(inner);
            return;
        }
        if inner.starts_with(char::is_whitespace) {
            self.inline(" ");
        }
        self.inline(&format!("{marker}{trimmed}{marker}"));
        if inner.ends_with(char::is_whitespace) {
            self.inline(" ");
        }
    }

    fn wrapped_link(&mut self, inner: &str, target: &str) {
        if inner.starts_with(char::is_whitespace) {
            self.inline(" ");
        }
        self.inline(&format!("[{}]({})", inner.trim(), target));
        if inner.ends_with(char::is_whitespace) {
            self.inline(" ");
        }
    }

    /// Whether the current line holds only a freshly opened bullet.
    fn at_bullet_start(&self) -> bool {
        self.out == "- " || self.out.ends_with("\n- ")
    }

    fn line_break(&mut self) {
        if self.at_bullet_start() {
            return;
        }
        trim_trailing_spaces(&mut self.out);
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
    }

    fn paragraph_break(&mut self) {
        if self.at_bullet_start() {
            return;
        }
        trim_trailing_spaces(&mut self.out);
        if self.out.is_empty() {
            return;
        }
        while !self.out.ends_with("\n\n") {
            self.out.push('\n');
        }
    }
}

fn trim_trailing_spaces(out: &mut String) {
    let trimmed_len = out.trim_end_matches([' ', '\t']).len();
    out.truncate(trimmed_len);
}

/// Collapses every whitespace run (including newlines) to a single space.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Trims line ends and collapses runs of blank lines.
fn tidy(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len());
    let mut blank_run = 0;
    for line in markdown.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}
