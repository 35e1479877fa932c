use std::collections::HashSet;

use regex::{Regex, RegexBuilder};

use crate::catalog::{has_group, resolve_link};
use crate::fetch::Fetch;
use crate::formats::BookDescriptor;

pub const CONTENT_GROUP: &str = "content";

/// Joins the raw content of consecutive pages before plain-text conversion.
pub const PAGE_SEPARATOR: &str = "<br />";

/// Wide enough that html2text never re-wraps prose lines.
const TEXT_WIDTH: usize = 10_000;

/// Body and continuation rules of a book, borrowed from its descriptor.
#[derive(Debug, Clone, Copy)]
pub struct ChapterRules<'a> {
    pub detail_pattern: &'a str,
    pub next_key: &'a str,
    pub next_regex: &'a str,
}

impl ChapterRules<'_> {
    pub fn follows_continuations(&self) -> bool {
        !self.next_key.is_empty() && !self.next_regex.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyOutcome {
    /// Raw (still HTML) `content` of the first match.
    Matched(String),
    /// No match, or the `content` group is empty.
    Unmatched,
    MalformedGroups { missing: &'static str },
    InvalidPattern(String),
}

pub fn match_body(detail_pattern: &str, html: &str) -> BodyOutcome {
    if detail_pattern.is_empty() {
        return BodyOutcome::Unmatched;
    }
    let regex = match Regex::new(detail_pattern) {
        Ok(regex) => regex,
        Err(err) => return BodyOutcome::InvalidPattern(err.to_string()),
    };
    if !has_group(&regex, CONTENT_GROUP) {
        return BodyOutcome::MalformedGroups {
            missing: CONTENT_GROUP,
        };
    }

    match regex
        .captures(html)
        .and_then(|caps| caps.name(CONTENT_GROUP))
        .map(|m| m.as_str())
    {
        Some(content) if !content.is_empty() => BodyOutcome::Matched(content.to_owned()),
        _ => BodyOutcome::Unmatched,
    }
}

/// Link to the next page of the same chapter, if `html` advertises one.
pub fn find_next_link(rules: &ChapterRules<'_>, html: &str, current_link: &str) -> Option<String> {
    if !rules.follows_continuations() || !html.contains(rules.next_key) {
        return None;
    }
    let regex = match RegexBuilder::new(rules.next_regex)
        .case_insensitive(true)
        .build()
    {
        Ok(regex) => regex,
        Err(err) => {
            tracing::warn!("next-page pattern does not compile: {err}");
            return None;
        }
    };
    let candidate = regex.captures(html)?.get(1)?.as_str();
    Some(resolve_link(current_link, candidate))
}

/// Plain text of one already-fetched page, without following continuations.
pub fn extract_body_text(rules: &ChapterRules<'_>, html: &str) -> Option<String> {
    match match_body(rules.detail_pattern, html) {
        BodyOutcome::Matched(content) => html_to_text(&content),
        outcome => {
            log_body_failure(&outcome, None);
            None
        }
    }
}

/// Fetches a chapter and every continuation page, returning its plain text.
///
/// Page contents are concatenated raw with [`PAGE_SEPARATOR`] and converted once at the end.
/// Any failed page fails the whole chapter, as does a chapter with no text after conversion.
///
/// A next link that points back to a page already fetched for this chapter ends the chain
/// there; the pages gathered so far are returned as the chapter.
pub async fn extract_chapter_text(
    fetcher: &dyn Fetch,
    chapter: &BookDescriptor,
    rules: &ChapterRules<'_>,
) -> Option<String> {
    let mut raw_pages: Vec<String> = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut link = chapter.link.clone();

    loop {
        let html = fetcher.fetch(&link).await;
        if html.is_empty() {
            tracing::warn!(chapter = %chapter.title, url = %link, "chapter request failed");
            return None;
        }

        let content = match match_body(rules.detail_pattern, &html) {
            BodyOutcome::Matched(content) => content,
            outcome => {
                log_body_failure(&outcome, Some(&link));
                return None;
            }
        };
        raw_pages.push(content);
        visited.insert(link.clone());

        let Some(next) = find_next_link(rules, &html, &link) else {
            break;
        };
        if visited.contains(&next) {
            tracing::warn!(chapter = %chapter.title, url = %next, "next page already visited; stopping");
            break;
        }
        tracing::debug!(chapter = %chapter.title, url = %next, "following next page");
        link = next;
    }

    tracing::debug!(chapter = %chapter.title, pages = raw_pages.len(), "chapter extracted");
    html_to_text(&raw_pages.join(PAGE_SEPARATOR))
}

/// Plain text of `html`; `None` when conversion fails or leaves only whitespace.
pub fn html_to_text(html: &str) -> Option<String> {
    match html2text::config::plain().string_from_read(html.as_bytes(), TEXT_WIDTH) {
        Ok(text) if text.trim().is_empty() => {
            tracing::warn!("chapter content has no text");
            None
        }
        Ok(text) => Some(text),
        Err(err) => {
            tracing::warn!("html to text conversion failed: {err}");
            None
        }
    }
}

fn log_body_failure(outcome: &BodyOutcome, url: Option<&str>) {
    let url = url.unwrap_or_default();
    match outcome {
        BodyOutcome::Matched(_) => {}
        BodyOutcome::Unmatched => tracing::warn!(url, "chapter content not found"),
        BodyOutcome::MalformedGroups { missing } => {
            tracing::warn!(url, missing, "detail pattern lacks named group");
        }
        BodyOutcome::InvalidPattern(err) => {
            tracing::warn!(url, "detail pattern does not compile: {err}");
        }
    }
}
