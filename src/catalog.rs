use regex::Regex;
use url::Url;

use crate::formats::{BookDescriptor, ExtractionRule};

pub const LINK_GROUP: &str = "link";
pub const TITLE_GROUP: &str = "title";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub index: u32,
    pub title: String,
    pub link: String,
}

/// What a catalog rule produced for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogOutcome {
    Matched(Vec<CatalogEntry>),
    /// Empty document, empty pattern, or no usable match.
    Unmatched,
    /// The pattern compiles but does not declare the named group.
    MalformedGroups { missing: &'static str },
    InvalidPattern(String),
}

impl CatalogOutcome {
    pub fn into_catalog(self) -> Vec<BookDescriptor> {
        match self {
            CatalogOutcome::Matched(entries) => entries
                .into_iter()
                .map(|e| BookDescriptor::chapter(e.index, e.title, e.link))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Builds the ordered chapter list for `book` from its catalog page.
pub fn extract_catalog(book: &BookDescriptor, html: &str) -> Vec<BookDescriptor> {
    let outcome = scan_catalog(&book.regex, &book.link, html);
    match &outcome {
        CatalogOutcome::Matched(entries) => {
            tracing::debug!(book = %book.title, chapters = entries.len(), "catalog extracted");
        }
        CatalogOutcome::Unmatched => {
            tracing::debug!(book = %book.title, "catalog pattern matched nothing");
        }
        CatalogOutcome::MalformedGroups { missing } => {
            tracing::warn!(book = %book.title, missing, "catalog pattern lacks named group");
        }
        CatalogOutcome::InvalidPattern(err) => {
            tracing::warn!(book = %book.title, "catalog pattern does not compile: {err}");
        }
    }
    outcome.into_catalog()
}

pub fn scan_catalog(rule: &ExtractionRule, base_link: &str, html: &str) -> CatalogOutcome {
    if html.is_empty() || rule.pattern.is_empty() {
        return CatalogOutcome::Unmatched;
    }

    let regex = match Regex::new(&rule.pattern) {
        Ok(regex) => regex,
        Err(err) => return CatalogOutcome::InvalidPattern(err.to_string()),
    };
    for group in [LINK_GROUP, TITLE_GROUP] {
        if !has_group(&regex, group) {
            return CatalogOutcome::MalformedGroups { missing: group };
        }
    }

    let window = catalog_window(html, &rule.start, &rule.end);
    let mut entries = Vec::new();
    for caps in regex.captures_iter(window) {
        let (Some(link), Some(title)) = (caps.name(LINK_GROUP), caps.name(TITLE_GROUP)) else {
            tracing::debug!(matched = &caps[0], "skipping match without link/title");
            continue;
        };
        entries.push(CatalogEntry {
            index: 0,
            title: title.as_str().to_owned(),
            link: resolve_link(base_link, link.as_str()),
        });
    }

    if entries.is_empty() {
        return CatalogOutcome::Unmatched;
    }
    for (position, entry) in entries.iter_mut().enumerate() {
        entry.index = u32::try_from(position + 1).unwrap_or(u32::MAX);
    }
    CatalogOutcome::Matched(entries)
}

pub(crate) fn has_group(regex: &Regex, group: &str) -> bool {
    regex.capture_names().flatten().any(|name| name == group)
}

/// Slice of `html` between the `start` and `end` markers; empty markers mean the whole document.
pub fn catalog_window<'a>(html: &'a str, start: &str, end: &str) -> &'a str {
    let from = if start.is_empty() {
        0
    } else {
        html.find(start).unwrap_or(0)
    };

    let to = if end.is_empty() {
        html.len()
    } else {
        match html.find(end) {
            Some(to) if to >= from => to,
            Some(_) => html[from..]
                .find(end)
                .map_or(html.len(), |offset| from + offset),
            None => html.len(),
        }
    };

    &html[from..to]
}

/// Absolute links pass through; anything else is joined onto `base`.
pub fn resolve_link(base: &str, link: &str) -> String {
    if starts_with_http(link) {
        return link.to_owned();
    }
    match Url::parse(base).and_then(|base| base.join(link)) {
        Ok(url) => url.to_string(),
        Err(err) => {
            tracing::debug!(base, link, "cannot resolve link: {err}");
            link.to_owned()
        }
    }
}

pub(crate) fn starts_with_http(link: &str) -> bool {
    link.get(..4)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("http"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANCHOR: &str = r#"<a href="(?<link>[^"]+)">(?<title>[^<]+)</a>"#;

    fn book(pattern: &str, link: &str) -> BookDescriptor {
        BookDescriptor {
            title: "Book".to_owned(),
            link: link.to_owned(),
            regex: ExtractionRule {
                pattern: pattern.to_owned(),
                ..ExtractionRule::default()
            },
            ..BookDescriptor::default()
        }
    }

    #[test]
    fn anchors_become_indexed_chapters() {
        let html = r#"<a href="c1.html">Ch1</a><a href="c2.html">Ch2</a>"#;
        let catalog = extract_catalog(&book(ANCHOR, "http://x/"), html);

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[0].index, Some(1));
        assert_eq!(catalog[0].title, "Ch1");
        assert_eq!(catalog[0].link, "http://x/c1.html");
        assert_eq!(catalog[1].index, Some(2));
        assert_eq!(catalog[1].title, "Ch2");
        assert_eq!(catalog[1].link, "http://x/c2.html");
        for chapter in &catalog {
            assert!(chapter.catalog.is_empty());
            assert_eq!(chapter.regex, ExtractionRule::default());
            assert_eq!((chapter.page, chapter.page_size), (0, 0));
        }
    }

    #[test]
    fn indices_follow_document_order_not_source_numbering() {
        let html = r#"<a href="/9">第九章</a><a href="/2">第二章</a><a href="/5">第五章</a>"#;
        let catalog = extract_catalog(&book(ANCHOR, "http://x/book/"), html);
        let indices: Vec<_> = catalog.iter().filter_map(|c| c.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert_eq!(catalog[0].link, "http://x/9");
        assert_eq!(catalog[2].title, "第五章");
    }

    #[test]
    fn relative_and_absolute_links() {
        assert_eq!(
            resolve_link("http://example.com/book/", "ch1.html"),
            "http://example.com/book/ch1.html"
        );
        assert_eq!(
            resolve_link("http://example.com/book/", "http://other.com/x"),
            "http://other.com/x"
        );
        assert_eq!(
            resolve_link("http://example.com/book/index.html", "../ch2.html"),
            "http://example.com/ch2.html"
        );
        assert_eq!(resolve_link("http://example.com/", "HTTPS://A/b"), "HTTPS://A/b");
        assert_eq!(resolve_link("", "ch1.html"), "ch1.html");
    }

    #[test]
    fn empty_input_or_pattern_yields_nothing() {
        assert!(extract_catalog(&book(ANCHOR, "http://x/"), "").is_empty());
        assert!(extract_catalog(&book("", "http://x/"), "<a href=\"a\">A</a>").is_empty());
        assert_eq!(
            scan_catalog(&ExtractionRule::default(), "http://x/", "<p></p>"),
            CatalogOutcome::Unmatched
        );
    }

    #[test]
    fn window_limits_matching() {
        let html = r#"<a href="skip">Latest</a><div id="list"><a href="c1">One</a><a href="c2">Two</a></div><a href="tail">Tail</a>"#;
        let mut b = book(ANCHOR, "http://x/");
        b.regex.start = r#"<div id="list">"#.to_owned();
        b.regex.end = "</div>".to_owned();
        let titles: Vec<_> = extract_catalog(&b, html)
            .into_iter()
            .map(|c| c.title)
            .collect();
        assert_eq!(titles, vec!["One", "Two"]);
    }

    #[test]
    fn window_markers_missing_or_misordered() {
        let html = "aaENDbbSTARTccENDdd";
        assert_eq!(catalog_window(html, "", ""), html);
        assert_eq!(catalog_window(html, "nope", ""), html);
        assert_eq!(catalog_window(html, "", "nope"), html);
        assert_eq!(catalog_window(html, "START", "END"), "STARTcc");
        assert_eq!(catalog_window(html, "START", "nope"), "STARTccENDdd");
        assert_eq!(catalog_window("xxSTARTyy", "START", "xx"), "STARTyy");
    }

    #[test]
    fn pattern_problems_are_reported() {
        let rule = |p: &str| ExtractionRule {
            pattern: p.to_owned(),
            ..ExtractionRule::default()
        };
        assert_eq!(
            scan_catalog(&rule(r#"href="(?<link>[^"]+)""#), "", "<a href=\"x\">"),
            CatalogOutcome::MalformedGroups { missing: TITLE_GROUP }
        );
        assert!(matches!(
            scan_catalog(&rule("(?<link>"), "", "<a>"),
            CatalogOutcome::InvalidPattern(_)
        ));
        assert_eq!(
            scan_catalog(&rule(ANCHOR), "", "<p>no links</p>"),
            CatalogOutcome::Unmatched
        );
    }

    #[test]
    fn matches_with_non_participating_groups_are_skipped() {
        let pattern = r#"<a href="(?<link>[^"]+)">(?:(?<title>[^<]+)|<img>)</a>"#;
        let html = r#"<a href="c1">One</a><a href="banner"><img></a><a href="c2">Two</a>"#;
        let catalog = extract_catalog(&book(pattern, "http://x/"), html);
        let got: Vec<_> = catalog
            .iter()
            .map(|c| (c.index.unwrap_or(0), c.link.as_str()))
            .collect();
        assert_eq!(got, vec![(1, "http://x/c1"), (2, "http://x/c2")]);
    }
}
