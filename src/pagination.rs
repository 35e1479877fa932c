use anyhow::Context as _;

use crate::formats::BookDescriptor;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Where label computation writes a book back and counts its downloaded chapters.
pub trait BookStore {
    fn save(&self, book: &BookDescriptor) -> anyhow::Result<()>;
    fn downloaded_count(&self, book: &BookDescriptor) -> anyhow::Result<usize>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Previous,
    Next,
}

/// Fills in unset pagination; returns whether anything changed.
pub fn normalize(book: &mut BookDescriptor) -> bool {
    if book.is_chapter() || (book.page > 0 && book.page_size > 0) {
        return false;
    }
    book.page = DEFAULT_PAGE;
    book.page_size = DEFAULT_PAGE_SIZE;
    true
}

pub fn total_pages(catalog_len: usize, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    let pages = catalog_len.div_ceil(page_size as usize);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Display label for a book or chapter.
///
/// Books get their pagination normalized first; the store is written when that changed
/// something or when `persist` is set. Chapters never touch the store.
pub fn compute_label(
    store: &dyn BookStore,
    book: &mut BookDescriptor,
    persist: bool,
) -> anyhow::Result<String> {
    if let Some(index) = book.index.filter(|index| *index > 0) {
        return Ok(chapter_label(index, &book.title));
    }

    let changed = normalize(book);
    if changed || persist {
        if changed {
            tracing::debug!(book = %book.title, "defaulting pagination");
        }
        store
            .save(book)
            .with_context(|| format!("save book: {}", book.title))?;
    }

    let downloaded = store
        .downloaded_count(book)
        .with_context(|| format!("count downloaded chapters: {}", book.title))?;
    let pages = total_pages(book.catalog.len(), book.page_size);
    Ok(format!(
        "{} - ({downloaded}/{}) ~ [{}/{pages}]",
        book.title,
        book.catalog.len(),
        book.page
    ))
}

pub fn chapter_label(index: u32, title: &str) -> String {
    format!("{index}. {title}")
}

pub fn next_page(book: &mut BookDescriptor) -> bool {
    if book.page == 0 || book.page_size == 0 {
        return false;
    }
    if book.page >= total_pages(book.catalog.len(), book.page_size) {
        return false;
    }
    book.page += 1;
    true
}

pub fn previous_page(book: &mut BookDescriptor) -> bool {
    if book.page <= 1 {
        return false;
    }
    book.page -= 1;
    true
}

pub fn turn_page(book: &mut BookDescriptor, step: Step) -> bool {
    match step {
        Step::Previous => previous_page(book),
        Step::Next => next_page(book),
    }
}

/// Moves to `page` when it lies within `1..=total_pages`.
pub fn jump_to_page(book: &mut BookDescriptor, page: u32) -> bool {
    if book.page_size == 0 {
        return false;
    }
    let total = total_pages(book.catalog.len(), book.page_size);
    if page < 1 || page > total {
        return false;
    }
    book.page = page;
    true
}

/// Pulls `page` back into `1..=total_pages` after the catalog changed size.
/// Unpaginated books are left for [`normalize`]; returns whether the page moved.
pub fn clamp_page(book: &mut BookDescriptor) -> bool {
    if book.page == 0 || book.page_size == 0 {
        return false;
    }
    let total = total_pages(book.catalog.len(), book.page_size);
    let page = book.page.min(total).max(DEFAULT_PAGE);
    if page == book.page {
        return false;
    }
    book.page = page;
    true
}

/// Regroups the catalog into pages of `size` and goes back to the first page.
pub fn set_page_size(book: &mut BookDescriptor, size: u32) -> bool {
    if book.page_size == 0 || size == 0 {
        return false;
    }
    book.page = DEFAULT_PAGE;
    book.page_size = size;
    true
}

/// Chapters shown on the book's current page.
pub fn page_chapters(book: &BookDescriptor) -> impl Iterator<Item = &BookDescriptor> {
    let size = u64::from(book.page_size);
    let page = u64::from(book.page);
    let first = page.saturating_sub(1) * size;
    let last = page * size;
    book.catalog.iter().filter(move |chapter| {
        chapter
            .index
            .map(u64::from)
            .is_some_and(|index| index > first && index <= last)
    })
}

/// The chapter next to `index` in the book's catalog, if there is one.
pub fn adjacent_chapter(book: &BookDescriptor, index: u32, step: Step) -> Option<&BookDescriptor> {
    let target = match step {
        Step::Previous => index.checked_sub(1).filter(|i| *i > 0)?,
        Step::Next => {
            if usize::try_from(index).map_or(true, |i| i >= book.catalog.len()) {
                return None;
            }
            index + 1
        }
    };
    book.find_chapter(target)
}

/// Validates free-text page or page-size input before it reaches the engine.
pub fn parse_number_input(input: &str) -> anyhow::Result<u32> {
    let trimmed = input.trim();
    trimmed
        .parse::<u32>()
        .with_context(|| format!("not a number: {trimmed:?}"))
}
