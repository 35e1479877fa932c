use serde::{Deserialize, Serialize};

/// Extraction rules stored under the `regex` key of a book's `config.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRule {
    /// Catalog pattern with named groups `link` and `title`.
    #[serde(rename = "regex", alias = "pattern", default)]
    pub pattern: String,
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub end: String,
    /// Chapter body pattern with a named group `content`.
    #[serde(rename = "detailRegex", alias = "detailPattern", default)]
    pub detail_pattern: String,
}

/// A book, or (when `index` is set) one chapter of a book's catalog.
///
/// `page`/`page_size` use `0` for "unset", matching what older configs contain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookDescriptor {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    #[serde(default)]
    pub regex: ExtractionRule,
    #[serde(default)]
    pub catalog: Vec<BookDescriptor>,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub page_size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_regex: Option<String>,

    /// Fields written by other tools are carried through rewrites untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl BookDescriptor {
    /// Blank descriptor for a book that is about to be configured.
    pub fn blank() -> Self {
        Self {
            page: 1,
            page_size: crate::pagination::DEFAULT_PAGE_SIZE,
            ..Self::default()
        }
    }

    /// Leaf entry produced by catalog extraction.
    pub fn chapter(index: u32, title: String, link: String) -> Self {
        Self {
            title,
            link,
            index: Some(index),
            ..Self::default()
        }
    }

    pub fn is_chapter(&self) -> bool {
        self.index.is_some_and(|index| index > 0)
    }

    pub fn find_chapter(&self, index: u32) -> Option<&BookDescriptor> {
        self.catalog.iter().find(|c| c.index == Some(index))
    }

    pub fn chapter_rules(&self) -> crate::chapter::ChapterRules<'_> {
        crate::chapter::ChapterRules {
            detail_pattern: &self.regex.detail_pattern,
            next_key: self.next_key.as_deref().unwrap_or_default(),
            next_regex: self.next_regex.as_deref().unwrap_or_default(),
        }
    }
}
