use anyhow::Context as _;

use crate::catalog::extract_catalog;
use crate::chapter::extract_chapter_text;
use crate::fetch::Fetch;
use crate::formats::BookDescriptor;
use crate::library::Library;
use crate::pagination::{self, Step};

/// One line of a book's current page listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterLine {
    pub index: u32,
    pub label: String,
    pub downloaded: bool,
}

/// Reader actions over a library, each attempted exactly once per call.
pub struct Reader<F> {
    library: Library,
    fetcher: F,
}

impl<F: Fetch> Reader<F> {
    pub fn new(library: Library, fetcher: F) -> Self {
        Self { library, fetcher }
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Labels of every book, defaulting and persisting missing pagination on the way.
    pub fn labels(&self) -> anyhow::Result<Vec<String>> {
        let mut labels = Vec::new();
        for mut book in self.library.list()? {
            labels.push(pagination::compute_label(&self.library, &mut book, false)?);
        }
        Ok(labels)
    }

    pub fn label(&self, title: &str) -> anyhow::Result<String> {
        let mut book = self.library.load(title)?;
        pagination::compute_label(&self.library, &mut book, false)
    }

    /// Chapters on the book's current page.
    pub fn chapter_lines(&self, title: &str) -> anyhow::Result<Vec<ChapterLine>> {
        let mut book = self.library.load(title)?;
        pagination::compute_label(&self.library, &mut book, false)?;
        Ok(pagination::page_chapters(&book)
            .filter_map(|chapter| {
                let index = chapter.index?;
                Some(ChapterLine {
                    index,
                    label: pagination::chapter_label(index, &chapter.title),
                    downloaded: self.library.is_downloaded(&book.title, chapter),
                })
            })
            .collect())
    }

    /// Re-fetches the catalog page. A fetch or extraction that yields nothing keeps the
    /// stored catalog and returns `None`.
    pub async fn refresh_catalog(&self, title: &str) -> anyhow::Result<Option<String>> {
        let mut book = self.library.load(title)?;
        let html = self.fetcher.fetch(&book.link).await;
        if html.is_empty() {
            tracing::warn!(book = %book.title, "catalog request failed");
            return Ok(None);
        }

        let catalog = extract_catalog(&book, &html);
        if catalog.is_empty() {
            tracing::warn!(book = %book.title, "catalog extraction found no chapters");
            return Ok(None);
        }

        tracing::info!(book = %book.title, chapters = catalog.len(), "catalog refreshed");
        book.catalog = catalog;
        if pagination::clamp_page(&mut book) {
            tracing::debug!(book = %book.title, page = book.page, "catalog shrank; page clamped");
        }
        let label = pagination::compute_label(&self.library, &mut book, true)?;
        Ok(Some(label))
    }

    /// Fetches a chapter (following continuation pages) and stores its text.
    pub async fn load_chapter(&self, title: &str, index: u32) -> anyhow::Result<bool> {
        let mut book = self.library.load(title)?;
        let chapter = book
            .find_chapter(index)
            .ok_or_else(|| anyhow::anyhow!("{title} has no chapter {index}"))?
            .clone();

        let rules = book.chapter_rules();
        let Some(text) = extract_chapter_text(&self.fetcher, &chapter, &rules).await else {
            return Ok(false);
        };

        let path = self
            .library
            .write_chapter(&book.title, &chapter, &text)
            .context("store chapter text")?;
        tracing::info!(book = %book.title, index, path = %path.display(), "chapter stored");
        pagination::compute_label(&self.library, &mut book, true)?;
        Ok(true)
    }

    /// Stored chapter text, fetching it first when it is not on disk yet.
    pub async fn view_chapter(&self, title: &str, index: u32) -> anyhow::Result<Option<String>> {
        let book = self.library.load(title)?;
        let chapter = book
            .find_chapter(index)
            .ok_or_else(|| anyhow::anyhow!("{title} has no chapter {index}"))?;

        if let Some(text) = self.library.read_chapter(&book.title, chapter)? {
            return Ok(Some(text));
        }
        if !self.load_chapter(title, index).await? {
            return Ok(None);
        }
        self.library.read_chapter(&book.title, chapter)
    }

    /// Views the chapter before or after `index`; `None` past either end of the catalog.
    pub async fn adjacent_chapter(
        &self,
        title: &str,
        index: u32,
        step: Step,
    ) -> anyhow::Result<Option<(u32, String)>> {
        let book = self.library.load(title)?;
        let Some(target) = pagination::adjacent_chapter(&book, index, step).and_then(|c| c.index)
        else {
            return Ok(None);
        };
        Ok(self
            .view_chapter(title, target)
            .await?
            .map(|text| (target, text)))
    }

    /// Moves one page back or forward; returns the new label when the page changed.
    pub fn turn_page(&self, title: &str, step: Step) -> anyhow::Result<Option<String>> {
        self.update_pages(title, |book| pagination::turn_page(book, step))
    }

    /// Jumps to a page typed by the user.
    pub fn jump(&self, title: &str, input: &str) -> anyhow::Result<Option<String>> {
        let page = pagination::parse_number_input(input).context("page number")?;
        self.update_pages(title, |book| pagination::jump_to_page(book, page))
    }

    /// Changes the page size to a value typed by the user.
    pub fn resize(&self, title: &str, input: &str) -> anyhow::Result<Option<String>> {
        let size = pagination::parse_number_input(input).context("page size")?;
        self.update_pages(title, |book| pagination::set_page_size(book, size))
    }

    fn update_pages(
        &self,
        title: &str,
        update: impl FnOnce(&mut BookDescriptor) -> bool,
    ) -> anyhow::Result<Option<String>> {
        let mut book = self.library.load(title)?;
        if !update(&mut book) {
            tracing::debug!(book = %book.title, page = book.page, "page unchanged");
            return Ok(None);
        }
        pagination::compute_label(&self.library, &mut book, true).map(Some)
    }
}
