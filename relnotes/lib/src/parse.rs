//! Title, description, contributor, and CVE parsing of normalized fragments.
//!
//! Attribution is recovered heuristically: the last parenthesized group in a
//! fragment that passes [`ATTRIBUTION_EXCLUSIONS`] is taken as the list of
//! contributors. A fragment ending in an unrelated aside such as
//! `"(see below)"` is therefore misread as attribution; that false positive is
//! accepted rather than papered over with stricter rules.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// `CVE-<year>-<sequence>` identifiers.
static CVE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"CVE-\d{4}-\d+").expect("valid CVE regex"));

/// Innermost non-empty parenthesized groups; call syntax such as `now()` never matches.
static PAREN_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^()]+)\)").expect("valid group regex"));

/// Keywords marking an entry as high-impact.
const SIGNIFICANCE_KEYWORDS: &[&str] = &["significant", "major"];

/// A parenthesized group together with the text that precedes it.
#[derive(Debug, Clone, Copy)]
pub struct ParenGroup<'a> {
    /// Text between the parentheses
    pub content: &'a str,
    /// Fragment text before the opening parenthesis
    pub preceding: &'a str,
}

/// Named predicates that disqualify a group from being attribution.
///
/// A group matching any of these is never read as a contributor list.
pub const ATTRIBUTION_EXCLUSIONS: &[(&str, fn(&ParenGroup<'_>) -> bool)] = &[
    ("blank", is_blank),
    ("url scheme", contains_scheme_marker),
    ("www host", contains_www),
    ("cve reference", contains_cve),
    ("link target", follows_link_text),
    ("url annotation", follows_url_token),
];

fn is_blank(group: &ParenGroup<'_>) -> bool {
    group.content.trim().is_empty()
}

fn contains_scheme_marker(group: &ParenGroup<'_>) -> bool {
    group.content.contains("://")
}

fn contains_www(group: &ParenGroup<'_>) -> bool {
    group.content.contains("www.")
}

fn contains_cve(group: &ParenGroup<'_>) -> bool {
    CVE_PATTERN.is_match(group.content)
}

/// `[text](target)`: the group is a markdown link target.
fn follows_link_text(group: &ParenGroup<'_>) -> bool {
    group.preceding.ends_with(']')
}

/// `https://host/path (label)`: the group annotates a bare URL.
///
/// Only a bare token counts; a markdown link such as `[text](https://..)`
/// right before the group does not.
fn follows_url_token(group: &ParenGroup<'_>) -> bool {
    let Some(token) = group.preceding.split_whitespace().last() else {
        return false;
    };
    if token.ends_with(')') || token.contains("](") {
        return false;
    }
    token.starts_with("www.") || Url::parse(token).is_ok_and(|url| url.has_host())
}

/// Whether a parenthesized group may be read as contributor attribution.
pub fn is_attribution(group: &ParenGroup<'_>) -> bool {
    !ATTRIBUTION_EXCLUSIONS
        .iter()
        .any(|(_, excluded)| excluded(group))
}

/// Result of parsing one normalized fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedEntry {
    pub title: String,
    pub description: String,
    pub contributors: Vec<String>,
}

/// Parses a fragment into title, description, and contributors.
///
/// ## Examples
///
/// ```
/// use relnotes_lib::parse::parse_entry;
///
/// let entry = parse_entry("Fix bug in index (Alice, Bob)\n\nIndexes could corrupt.");
/// assert_eq!(entry.title, "Fix bug in index");
/// assert_eq!(entry.description, "Indexes could corrupt.");
/// assert_eq!(entry.contributors, vec!["Alice", "Bob"]);
/// ```
pub fn parse_entry(fragment: &str) -> ParsedEntry {
    let (title, description) = split_title(fragment);
    ParsedEntry {
        title: strip_attribution(title).to_string(),
        description: description.to_string(),
        contributors: extract_contributors(fragment),
    }
}

/// Splits at the first line break: `(title, trimmed rest)`.
pub fn split_title(fragment: &str) -> (&str, &str) {
    let fragment = fragment.trim();
    match fragment.split_once('\n') {
        Some((title, rest)) => (title.trim(), rest.trim()),
        None => (fragment, ""),
    }
}

/// Removes a trailing attribution group from a title line.
fn strip_attribution(title: &str) -> &str {
    let title = title.trim_end();
    let Some(last) = groups(title).last() else {
        return title;
    };
    let ends_title = last.preceding.len() + last.content.len() + 2 == title.len();
    if ends_title && is_attribution(&last) {
        last.preceding.trim_end()
    } else {
        title
    }
}

/// Contributor names from the last group that passes [`is_attribution`].
///
/// Names are split on commas, trimmed, and de-duplicated in order.
pub fn extract_contributors(fragment: &str) -> Vec<String> {
    let Some(group) = groups(fragment).filter(is_attribution).last() else {
        return Vec::new();
    };

    let mut names: Vec<String> = Vec::new();
    for name in group.content.split(',').map(str::trim) {
        if !name.is_empty() && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// The first CVE identifier anywhere in the fragment.
pub fn extract_cve(fragment: &str) -> Option<String> {
    CVE_PATTERN
        .find(fragment)
        .map(|m| m.as_str().to_string())
}

/// Whether the fragment describes itself as significant or major.
pub fn is_significant(fragment: &str) -> bool {
    let lower = fragment.to_lowercase();
    SIGNIFICANCE_KEYWORDS.iter().any(|k| lower.contains(k))
}

fn groups(text: &str) -> impl Iterator<Item = ParenGroup<'_>> {
    PAREN_GROUP.captures_iter(text).filter_map(move |caps| {
        let whole = caps.get(0)?;
        let content = caps.get(1)?;
        Some(ParenGroup {
            content: content.as_str(),
            preceding: &text[..whole.start()],
        })
    })
}
