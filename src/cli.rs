use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Directory holding one subdirectory per book.
    #[arg(long, global = true, env = "LBOOK_LIBRARY", default_value = "books")]
    pub library: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the label of every book.
    List,
    /// Create a book from extraction rules.
    Add(AddArgs),
    /// Edit a book over line-delimited JSON on stdin/stdout.
    Edit(EditArgs),
    /// Fetch the catalog page and rebuild the chapter list.
    Refresh(BookArgs),
    /// List the chapters on the book's current page.
    Chapters(BookArgs),
    /// Print a chapter, fetching it when it is not stored yet.
    Read(ChapterArgs),
    /// Fetch a chapter again and store it.
    Load(ChapterArgs),
    /// Show the next page of the chapter list.
    NextPage(BookArgs),
    /// Show the previous page of the chapter list.
    PrevPage(BookArgs),
    /// Go to a page of the chapter list.
    Jump(JumpArgs),
    /// Change how many chapters are shown per page.
    PageSize(PageSizeArgs),
    /// Print the chapter after `--index`.
    NextChapter(ChapterArgs),
    /// Print the chapter before `--index`.
    PrevChapter(ChapterArgs),
    /// Duplicate a book's configuration.
    Copy(BookArgs),
    /// Delete a book and its stored chapters.
    Delete(DeleteArgs),
}

#[derive(Debug, Args)]
pub struct BookArgs {
    /// Book title (its directory name).
    #[arg(long)]
    pub book: String,
}

#[derive(Debug, Args)]
pub struct ChapterArgs {
    #[arg(long)]
    pub book: String,

    /// 1-based chapter index.
    #[arg(long)]
    pub index: u32,
}

#[derive(Debug, Args)]
pub struct JumpArgs {
    #[arg(long)]
    pub book: String,

    /// Page number as typed; must be numeric.
    #[arg(long)]
    pub page: String,
}

#[derive(Debug, Args)]
pub struct PageSizeArgs {
    #[arg(long)]
    pub book: String,

    /// Chapters per page as typed; must be numeric.
    #[arg(long)]
    pub size: String,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    #[arg(long)]
    pub book: String,

    /// Confirm the deletion; it cannot be undone.
    #[arg(long)]
    pub yes: bool,
}

#[derive(Debug, Args)]
pub struct EditArgs {
    /// Existing book to edit (omit to configure a new one).
    #[arg(long)]
    pub book: Option<String>,
}

#[derive(Debug, Args)]
pub struct AddArgs {
    #[arg(long)]
    pub title: String,

    /// Catalog page URL.
    #[arg(long)]
    pub link: String,

    /// Catalog regex with named groups `link` and `title`.
    #[arg(long)]
    pub pattern: String,

    /// Marker where the catalog starts.
    #[arg(long, default_value = "")]
    pub start: String,

    /// Marker where the catalog ends.
    #[arg(long, default_value = "")]
    pub end: String,

    /// Chapter body regex with a named group `content`.
    #[arg(long)]
    pub detail_pattern: String,

    /// Text that signals a chapter continues on another page.
    #[arg(long)]
    pub next_key: Option<String>,

    /// Regex whose first group is the next page link.
    #[arg(long)]
    pub next_regex: Option<String>,
}
