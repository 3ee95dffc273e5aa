//! Release document parsing: version heading, release date, change list.

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use super::normalize::normalize_element;
use crate::types::{Release, major_version};

/// Heading selectors tried in order; the first match carries the version.
const HEADING_SELECTORS: &[&str] = &["h2.title", "h1.title"];

/// Container class wrapping the list of change items.
const ITEMIZED_LIST_SELECTOR: &str = "div.itemizedlist";

/// Label of the paragraph carrying the release date.
const RELEASE_DATE_LABEL: &str = "release date";

/// Parses one cached release document into a [`Release`].
///
/// Missing pieces degrade to empty fields: no heading gives an empty version,
/// no date paragraph gives `None`, no list container gives no changes. `key`
/// is only used to identify the document in logs.
///
/// ## Examples
///
/// ```
/// use relnotes_lib::extract::extract_release;
///
/// let html = r#"
///   <h2 class="title">E.1. Release 16.1</h2>
///   <p><strong>Release date: </strong>2023-11-09</p>
///   <div class="itemizedlist"><ul><li><p>Fix crash in parser (Carol)</p></li></ul></div>
/// "#;
/// let release = extract_release("16.1", html, "https://www.postgresql.org/docs");
/// assert_eq!(release.version, "16.1");
/// assert_eq!(release.release_date.as_deref(), Some("2023-11-09"));
/// assert_eq!(release.changes, vec!["Fix crash in parser (Carol)"]);
/// ```
pub fn extract_release(key: &str, html: &str, docs_base: &str) -> Release {
    let document = Html::parse_document(html);

    let version = extract_version(&document).unwrap_or_else(|| {
        warn!(key, "No version heading found; leaving version empty");
        String::new()
    });

    let release_date = extract_release_date(&document);
    if release_date.is_none() {
        warn!(key, "No release date paragraph found");
    }

    let major = major_version(&version).to_string();
    let changes = extract_changes(&document, docs_base, &major);
    if changes.is_empty() {
        warn!(key, "No change items found");
    }

    debug!(
        key,
        version = %version,
        changes = changes.len(),
        "Extracted release document"
    );

    Release {
        version,
        release_date,
        changes,
    }
}

/// Last whitespace-delimited token of the first matching heading.
fn extract_version(document: &Html) -> Option<String> {
    HEADING_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|selector| document.select(&selector).next())
        .and_then(|heading| {
            // Rendering drops decorative self-anchors trailing the title
            let text = normalize_element(heading, "", "");
            text.split_whitespace().last().map(str::to_string)
        })
}

/// Text after the first colon of the "Release date: ..." paragraph.
fn extract_release_date(document: &Html) -> Option<String> {
    let selector = Selector::parse("p").ok()?;
    document.select(&selector).find_map(|paragraph| {
        let text = collapse(&paragraph.text().collect::<String>());
        if !text.to_lowercase().starts_with(RELEASE_DATE_LABEL) {
            return None;
        }
        let (_, date) = text.split_once(':')?;
        let date = date.trim();
        (!date.is_empty()).then(|| date.to_string())
    })
}

/// Normalized fragments of every top-level itemized list entry, in order.
fn extract_changes(document: &Html, docs_base: &str, major: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse(ITEMIZED_LIST_SELECTOR) else {
        return Vec::new();
    };

    let mut changes = Vec::new();
    for container in document.select(&selector) {
        // Lists nested inside an entry belong to that entry's text
        if has_list_item_ancestor(container) {
            continue;
        }

        for list in child_elements(container).filter(|e| matches!(e.value().name(), "ul" | "ol")) {
            for item in child_elements(list).filter(|e| e.value().name() == "li") {
                let fragment = normalize_element(item, docs_base, major);
                if fragment.is_empty() {
                    debug!("Skipping empty list item");
                    continue;
                }
                changes.push(fragment);
            }
        }
    }
    changes
}

fn child_elements<'a>(element: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    element.children().filter_map(ElementRef::wrap)
}

fn has_list_item_ancestor(element: ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| ancestor.value().name() == "li")
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://www.postgresql.org/docs";

    const RELEASE_16_1: &str = r##"<!DOCTYPE html>
<html><body>
<div class="sect1" id="RELEASE-16-1">
  <div class="titlepage"><div><div>
    <h2 class="title" style="clear: both">E.1. Release 16.1 <a href="#RELEASE-16-1" class="id_link">§</a></h2>
  </div></div></div>
  <p><strong>Release date: </strong>2023-11-09</p>
  <div class="sect2">
    <div class="itemizedlist">
      <ul class="itemizedlist" style="list-style-type: disc;">
        <li class="listitem"><p>Fix handling of unknown-type
          arguments in <code class="literal">DISTINCT</code> (Tom Lane)</p>
          <p>See <a class="xref" href="sql-select.html">SELECT</a>.</p></li>
        <li class="listitem"><p>Prevent overflow in
          <code class="function">date_bin()</code> (Moaaz Assali)</p>
          <div class="itemizedlist"><ul><li><p>nested detail</p></li></ul></div></li>
      </ul>
    </div>
  </div>
</div>
</body></html>"##;

    #[test]
    fn test_extracts_version_from_heading_ignoring_section_marker() {
        let release = extract_release("16.1", RELEASE_16_1, BASE);
        assert_eq!(release.version, "16.1");
    }

    #[test]
    fn test_extracts_release_date_after_colon() {
        let release = extract_release("16.1", RELEASE_16_1, BASE);
        assert_eq!(release.release_date.as_deref(), Some("2023-11-09"));
    }

    #[test]
    fn test_extracts_top_level_items_in_order() {
        let release = extract_release("16.1", RELEASE_16_1, BASE);

        assert_eq!(release.changes.len(), 2);
        assert_eq!(
            release.changes[0],
            "Fix handling of unknown-type arguments in `DISTINCT` (Tom Lane)\n\n\
             See [SELECT](https://www.postgresql.org/docs/16/sql-select.html)."
        );
        assert!(release.changes[1].starts_with("Prevent overflow in `date_bin()` (Moaaz Assali)"));
        assert!(release.changes[1].contains("- nested detail"));
    }

    #[test]
    fn test_missing_heading_yields_empty_version() {
        let html = r#"<p>Release date: 2023-11-09</p>
            <div class="itemizedlist"><ul><li><p>Fix thing</p></li></ul></div>"#;
        let release = extract_release("16.1", html, BASE);

        assert_eq!(release.version, "");
        assert_eq!(release.release_date.as_deref(), Some("2023-11-09"));
        assert_eq!(release.changes, vec!["Fix thing"]);
    }

    #[test]
    fn test_missing_date_and_list_yield_empty_fields() {
        let html = r#"<h2 class="title">Release 15.0</h2><p>Nothing here.</p>"#;
        let release = extract_release("15.0", html, BASE);

        assert_eq!(release.version, "15.0");
        assert!(release.release_date.is_none());
        assert!(release.changes.is_empty());
    }

    #[test]
    fn test_garbage_input_does_not_panic() {
        let release = extract_release("x", "<<<>>> not html at all", BASE);
        assert_eq!(release, Release::default());
    }

    #[test]
    fn test_links_use_major_of_extracted_version() {
        let html = r#"<h2 class="title">E.3. Release 9.6.24</h2>
            <div class="itemizedlist"><ul><li><p><a href="func.html">f</a></p></li></ul></div>"#;
        let release = extract_release("9.6.24", html, BASE);

        assert_eq!(
            release.changes,
            vec!["[f](https://www.postgresql.org/docs/9/func.html)"]
        );
    }
}
