use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::formats::BookDescriptor;
use crate::pagination::BookStore;

pub const CONFIG_FILE: &str = "config.json";
pub const CHAPTER_EXTENSION: &str = "txt";
pub const COPY_SUFFIX: &str = "-copy";

/// Result of saving an edited book under a possibly new title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// Another book already uses the new title and overwriting was not allowed.
    TitleTaken(String),
}

/// A directory of books, one subdirectory per title holding `config.json` and chapter files.
#[derive(Debug, Clone)]
pub struct Library {
    root: PathBuf,
}

impl Library {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn book_dir(&self, title: &str) -> anyhow::Result<PathBuf> {
        validate_title(title)?;
        Ok(self.root.join(title))
    }

    pub fn config_path(&self, title: &str) -> anyhow::Result<PathBuf> {
        Ok(self.book_dir(title)?.join(CONFIG_FILE))
    }

    pub fn chapter_path(
        &self,
        book_title: &str,
        chapter: &BookDescriptor,
    ) -> anyhow::Result<PathBuf> {
        let index = chapter
            .index
            .ok_or_else(|| anyhow::anyhow!("chapter has no index: {}", chapter.title))?;
        Ok(self
            .book_dir(book_title)?
            .join(chapter_file_name(index, &chapter.title)))
    }

    pub fn exists(&self, title: &str) -> bool {
        self.config_path(title).is_ok_and(|path| path.exists())
    }

    /// Every book with a readable config, sorted by title.
    pub fn list(&self) -> anyhow::Result<Vec<BookDescriptor>> {
        if !self.root.exists() {
            std::fs::create_dir_all(&self.root)
                .with_context(|| format!("create library dir: {}", self.root.display()))?;
        }

        let mut books = Vec::new();
        for entry in std::fs::read_dir(&self.root)
            .with_context(|| format!("read library dir: {}", self.root.display()))?
        {
            let entry = entry?;
            let config = entry.path().join(CONFIG_FILE);
            if !config.is_file() {
                continue;
            }
            match read_config(&config) {
                Ok(book) => books.push(book),
                Err(err) => tracing::warn!(path = %config.display(), "skipping book: {err:#}"),
            }
        }
        books.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(books)
    }

    pub fn load(&self, title: &str) -> anyhow::Result<BookDescriptor> {
        let path = self.config_path(title)?;
        if !path.exists() {
            anyhow::bail!("no such book: {title}");
        }
        read_config(&path)
    }

    /// Creates the directory of a new book; fails if the title is already used.
    pub fn create(&self, book: &BookDescriptor) -> anyhow::Result<()> {
        let dir = self.book_dir(&book.title)?;
        if dir.exists() {
            anyhow::bail!("book already exists: {}", book.title);
        }
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create book dir: {}", dir.display()))?;
        self.save(book)
    }

    /// Saves `book`, moving the directory of `old_title` when the title changed.
    ///
    /// A different book already stored under the new title is only replaced when
    /// `overwrite` is set; an empty `old_title` (a new book) counts as a different title.
    pub fn save_renamed(
        &self,
        book: &BookDescriptor,
        old_title: &str,
        overwrite: bool,
    ) -> anyhow::Result<SaveOutcome> {
        let new_dir = self.book_dir(&book.title)?;
        let retitled = old_title != book.title;
        if retitled && new_dir.exists() {
            if !overwrite {
                return Ok(SaveOutcome::TitleTaken(book.title.clone()));
            }
            std::fs::remove_dir_all(&new_dir)
                .with_context(|| format!("remove overwritten book: {}", new_dir.display()))?;
        }

        let old_dir = if old_title.is_empty() {
            None
        } else {
            Some(self.book_dir(old_title)?)
        };
        match old_dir {
            Some(old_dir) if retitled && old_dir.exists() => {
                std::fs::rename(&old_dir, &new_dir).with_context(|| {
                    format!(
                        "rename book dir: {} -> {}",
                        old_dir.display(),
                        new_dir.display()
                    )
                })?;
                tracing::info!(from = old_title, to = %book.title, "renamed book");
            }
            _ => {
                std::fs::create_dir_all(&new_dir)
                    .with_context(|| format!("create book dir: {}", new_dir.display()))?;
            }
        }

        self.save(book)?;
        Ok(SaveOutcome::Saved)
    }

    /// Duplicates a book's config under `"{title}-copy"`; chapter files are not copied.
    pub fn copy(&self, title: &str) -> anyhow::Result<BookDescriptor> {
        let mut book = self.load(title)?;
        book.title = format!("{title}{COPY_SUFFIX}");
        let dir = self.book_dir(&book.title)?;
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create book dir: {}", dir.display()))?;
        self.save(&book)?;
        Ok(book)
    }

    /// Removes the book directory and everything in it.
    pub fn delete(&self, title: &str) -> anyhow::Result<()> {
        let dir = self.book_dir(title)?;
        if !dir.exists() {
            anyhow::bail!("no such book: {title}");
        }
        std::fs::remove_dir_all(&dir)
            .with_context(|| format!("delete book dir: {}", dir.display()))?;
        tracing::info!(book = title, "deleted book");
        Ok(())
    }

    pub fn write_chapter(
        &self,
        book_title: &str,
        chapter: &BookDescriptor,
        text: &str,
    ) -> anyhow::Result<PathBuf> {
        let path = self.chapter_path(book_title, chapter)?;
        std::fs::write(&path, text)
            .with_context(|| format!("write chapter: {}", path.display()))?;
        Ok(path)
    }

    pub fn read_chapter(
        &self,
        book_title: &str,
        chapter: &BookDescriptor,
    ) -> anyhow::Result<Option<String>> {
        let path = self.chapter_path(book_title, chapter)?;
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("read chapter: {}", path.display()))?;
        Ok(Some(text))
    }

    pub fn is_downloaded(&self, book_title: &str, chapter: &BookDescriptor) -> bool {
        self.chapter_path(book_title, chapter)
            .is_ok_and(|path| path.exists())
    }
}

impl BookStore for Library {
    fn save(&self, book: &BookDescriptor) -> anyhow::Result<()> {
        let path = self.config_path(&book.title)?;
        let json = serde_json::to_string_pretty(book).context("serialize book config")?;
        std::fs::write(&path, json)
            .with_context(|| format!("write book config: {}", path.display()))?;
        tracing::debug!(path = %path.display(), "saved book config");
        Ok(())
    }

    fn downloaded_count(&self, book: &BookDescriptor) -> anyhow::Result<usize> {
        let dir = self.book_dir(&book.title)?;
        if !dir.exists() {
            return Ok(0);
        }
        let mut count = 0_usize;
        for entry in std::fs::read_dir(&dir)
            .with_context(|| format!("read book dir: {}", dir.display()))?
        {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(CHAPTER_EXTENSION) {
                count += 1;
            }
        }
        Ok(count)
    }
}

/// `"{index}. {title}.txt"`, with path separators in the title replaced.
pub fn chapter_file_name(index: u32, title: &str) -> String {
    let title: String = title
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    format!("{index}. {title}.{CHAPTER_EXTENSION}")
}

fn validate_title(title: &str) -> anyhow::Result<()> {
    if title.trim().is_empty() {
        anyhow::bail!("book title must not be empty");
    }
    if title == "." || title == ".." || title.contains('/') || title.contains('\\') {
        anyhow::bail!("book title cannot be used as a directory name: {title:?}");
    }
    Ok(())
}

fn read_config(path: &Path) -> anyhow::Result<BookDescriptor> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("read book config: {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("parse book config: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(title: &str) -> BookDescriptor {
        BookDescriptor {
            title: title.to_owned(),
            link: "http://x/".to_owned(),
            catalog: vec![
                BookDescriptor::chapter(1, "Ch1".to_owned(), "http://x/1".to_owned()),
                BookDescriptor::chapter(2, "A/B".to_owned(), "http://x/2".to_owned()),
            ],
            ..BookDescriptor::blank()
        }
    }

    #[test]
    fn config_is_pretty_printed_with_two_spaces() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let library = Library::new(temp.path());
        library.create(&sample("Book"))?;

        let json = std::fs::read_to_string(temp.path().join("Book").join(CONFIG_FILE))?;
        assert!(json.starts_with("{\n  \"title\": \"Book\""), "json={json}");
        assert!(json.contains("\n  \"pageSize\": 100"));
        assert_eq!(library.load("Book")?, sample("Book"));
        Ok(())
    }

    #[test]
    fn list_skips_directories_without_config() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let library = Library::new(temp.path());
        library.create(&sample("B"))?;
        library.create(&sample("A"))?;
        std::fs::create_dir_all(temp.path().join("stray"))?;
        std::fs::create_dir_all(temp.path().join("broken"))?;
        std::fs::write(temp.path().join("broken").join(CONFIG_FILE), "{not json")?;

        let titles: Vec<_> = library.list()?.into_iter().map(|b| b.title).collect();
        assert_eq!(titles, vec!["A", "B"]);
        Ok(())
    }

    #[test]
    fn chapter_files_count_as_downloaded() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let library = Library::new(temp.path());
        let book = sample("Book");
        library.create(&book)?;
        assert_eq!(library.downloaded_count(&book)?, 0);

        let path = library.write_chapter("Book", &book.catalog[1], "text")?;
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("2. A_B.txt")
        );
        assert!(library.is_downloaded("Book", &book.catalog[1]));
        assert!(!library.is_downloaded("Book", &book.catalog[0]));
        assert_eq!(library.downloaded_count(&book)?, 1);
        assert_eq!(
            library.read_chapter("Book", &book.catalog[1])?.as_deref(),
            Some("text")
        );
        assert_eq!(library.read_chapter("Book", &book.catalog[0])?, None);
        Ok(())
    }

    #[test]
    fn rename_moves_chapter_files() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let library = Library::new(temp.path());
        let book = sample("Old");
        library.create(&book)?;
        library.write_chapter("Old", &book.catalog[0], "one")?;

        let renamed = BookDescriptor {
            title: "New".to_owned(),
            ..book.clone()
        };
        assert_eq!(
            library.save_renamed(&renamed, "Old", false)?,
            SaveOutcome::Saved
        );
        assert!(!temp.path().join("Old").exists());
        assert_eq!(
            library.read_chapter("New", &book.catalog[0])?.as_deref(),
            Some("one")
        );
        Ok(())
    }

    #[test]
    fn rename_onto_existing_title_needs_overwrite() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let library = Library::new(temp.path());
        library.create(&sample("A"))?;
        library.create(&sample("B"))?;

        let renamed = sample("B");
        assert_eq!(
            library.save_renamed(&renamed, "A", false)?,
            SaveOutcome::TitleTaken("B".to_owned())
        );
        assert!(library.exists("A"));

        assert_eq!(
            library.save_renamed(&renamed, "A", true)?,
            SaveOutcome::Saved
        );
        assert!(!library.exists("A"));
        assert!(library.exists("B"));
        Ok(())
    }

    #[test]
    fn new_book_cannot_silently_replace_existing_title() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let library = Library::new(temp.path());
        let existing = sample("A");
        library.create(&existing)?;
        library.write_chapter("A", &existing.catalog[0], "one")?;

        let draft = BookDescriptor {
            title: "A".to_owned(),
            ..BookDescriptor::blank()
        };
        assert_eq!(
            library.save_renamed(&draft, "", false)?,
            SaveOutcome::TitleTaken("A".to_owned())
        );
        assert_eq!(library.load("A")?.catalog.len(), 2);
        assert!(library.is_downloaded("A", &existing.catalog[0]));

        assert_eq!(library.save_renamed(&draft, "", true)?, SaveOutcome::Saved);
        assert!(library.load("A")?.catalog.is_empty());
        assert!(!library.is_downloaded("A", &existing.catalog[0]));
        Ok(())
    }

    #[test]
    fn resaving_under_same_title_needs_no_overwrite() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let library = Library::new(temp.path());
        let mut book = sample("A");
        library.create(&book)?;

        book.link = "http://y/".to_owned();
        assert_eq!(library.save_renamed(&book, "A", false)?, SaveOutcome::Saved);
        assert_eq!(library.load("A")?.link, "http://y/");
        Ok(())
    }

    #[test]
    fn copy_and_delete() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let library = Library::new(temp.path());
        library.create(&sample("Book"))?;

        let copy = library.copy("Book")?;
        assert_eq!(copy.title, "Book-copy");
        assert_eq!(library.load("Book-copy")?.catalog.len(), 2);

        library.delete("Book")?;
        assert!(!library.exists("Book"));
        assert!(library.delete("Book").is_err());
        Ok(())
    }

    #[test]
    fn titles_must_be_plain_directory_names() {
        let library = Library::new("books");
        for title in ["", "  ", ".", "..", "a/b", "a\\b"] {
            assert!(library.book_dir(title).is_err(), "title={title:?}");
        }
        assert!(library.book_dir("三体").is_ok());
    }
}
