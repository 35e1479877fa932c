use anyhow::Context as _;

use crate::cli::{
    AddArgs, BookArgs, ChapterArgs, Command, DeleteArgs, EditArgs, JumpArgs, PageSizeArgs,
};
use crate::fetch::HttpFetcher;
use crate::formats::{BookDescriptor, ExtractionRule};
use crate::library::Library;
use crate::pagination::{self, Step};
use crate::reader::Reader;
use crate::session::{self, SessionRegistry};

pub async fn run(library: Library, command: Command) -> anyhow::Result<()> {
    let reader = Reader::new(library, HttpFetcher::new()?);

    match command {
        Command::List => list(&reader),
        Command::Add(args) => add(&reader, args),
        Command::Edit(args) => edit(&reader, args).await,
        Command::Refresh(args) => refresh(&reader, args).await,
        Command::Chapters(args) => chapters(&reader, args),
        Command::Read(args) => read(&reader, args).await,
        Command::Load(args) => load(&reader, args).await,
        Command::NextPage(args) => turn_page(&reader, args, Step::Next),
        Command::PrevPage(args) => turn_page(&reader, args, Step::Previous),
        Command::Jump(args) => jump(&reader, args),
        Command::PageSize(args) => page_size(&reader, args),
        Command::NextChapter(args) => adjacent(&reader, args, Step::Next).await,
        Command::PrevChapter(args) => adjacent(&reader, args, Step::Previous).await,
        Command::Copy(args) => copy(&reader, args),
        Command::Delete(args) => delete(&reader, args),
    }
}

fn list(reader: &Reader<HttpFetcher>) -> anyhow::Result<()> {
    for label in reader.labels().context("list books")? {
        println!("{label}");
    }
    Ok(())
}

fn add(reader: &Reader<HttpFetcher>, args: AddArgs) -> anyhow::Result<()> {
    let mut book = BookDescriptor {
        title: args.title,
        link: args.link,
        regex: ExtractionRule {
            pattern: args.pattern,
            start: args.start,
            end: args.end,
            detail_pattern: args.detail_pattern,
        },
        next_key: args.next_key.filter(|s| !s.is_empty()),
        next_regex: args.next_regex.filter(|s| !s.is_empty()),
        ..BookDescriptor::blank()
    };
    reader.library().create(&book).context("create book")?;
    let label = pagination::compute_label(reader.library(), &mut book, false)?;
    println!("{label}");
    Ok(())
}

async fn edit(reader: &Reader<HttpFetcher>, args: EditArgs) -> anyhow::Result<()> {
    let book = match args.book.as_deref() {
        Some(title) => Some(reader.library().load(title)?),
        None => None,
    };
    let mut registry = SessionRegistry::new();
    let key = registry.open(book);
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    session::serve(
        &mut registry,
        key,
        stdin,
        tokio::io::stdout(),
        reader.fetcher(),
        reader.library(),
    )
    .await
}

async fn refresh(reader: &Reader<HttpFetcher>, args: BookArgs) -> anyhow::Result<()> {
    match reader.refresh_catalog(&args.book).await? {
        Some(label) => {
            println!("{label}");
            Ok(())
        }
        None => anyhow::bail!("catalog refresh failed: {}", args.book),
    }
}

fn chapters(reader: &Reader<HttpFetcher>, args: BookArgs) -> anyhow::Result<()> {
    for line in reader.chapter_lines(&args.book)? {
        let marker = if line.downloaded { "*" } else { " " };
        println!("{marker} {}", line.label);
    }
    Ok(())
}

async fn read(reader: &Reader<HttpFetcher>, args: ChapterArgs) -> anyhow::Result<()> {
    match reader.view_chapter(&args.book, args.index).await? {
        Some(text) => {
            print!("{text}");
            Ok(())
        }
        None => anyhow::bail!("chapter request failed: {} #{}", args.book, args.index),
    }
}

async fn load(reader: &Reader<HttpFetcher>, args: ChapterArgs) -> anyhow::Result<()> {
    if !reader.load_chapter(&args.book, args.index).await? {
        anyhow::bail!("chapter request failed: {} #{}", args.book, args.index);
    }
    println!("{}", reader.label(&args.book)?);
    Ok(())
}

fn turn_page(reader: &Reader<HttpFetcher>, args: BookArgs, step: Step) -> anyhow::Result<()> {
    print_page_change(reader, &args.book, reader.turn_page(&args.book, step)?)
}

fn jump(reader: &Reader<HttpFetcher>, args: JumpArgs) -> anyhow::Result<()> {
    print_page_change(reader, &args.book, reader.jump(&args.book, &args.page)?)
}

fn page_size(reader: &Reader<HttpFetcher>, args: PageSizeArgs) -> anyhow::Result<()> {
    print_page_change(reader, &args.book, reader.resize(&args.book, &args.size)?)
}

fn print_page_change(
    reader: &Reader<HttpFetcher>,
    title: &str,
    changed: Option<String>,
) -> anyhow::Result<()> {
    let label = match changed {
        Some(label) => label,
        None => reader.label(title)?,
    };
    println!("{label}");
    Ok(())
}

async fn adjacent(
    reader: &Reader<HttpFetcher>,
    args: ChapterArgs,
    step: Step,
) -> anyhow::Result<()> {
    match reader.adjacent_chapter(&args.book, args.index, step).await? {
        Some((index, text)) => {
            tracing::info!(book = %args.book, index, "showing chapter");
            print!("{text}");
        }
        None => tracing::info!(book = %args.book, index = args.index, "no adjacent chapter"),
    }
    Ok(())
}

fn copy(reader: &Reader<HttpFetcher>, args: BookArgs) -> anyhow::Result<()> {
    let copy = reader.library().copy(&args.book).context("copy book")?;
    println!("{}", copy.title);
    Ok(())
}

fn delete(reader: &Reader<HttpFetcher>, args: DeleteArgs) -> anyhow::Result<()> {
    if !args.yes {
        anyhow::bail!(
            "deleting {} cannot be undone; pass --yes to confirm",
            args.book
        );
    }
    reader.library().delete(&args.book).context("delete book")?;
    Ok(())
}
