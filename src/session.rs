use std::collections::HashMap;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt as _, AsyncWrite, AsyncWriteExt as _};

use crate::catalog::extract_catalog;
use crate::chapter::extract_body_text;
use crate::fetch::Fetch;
use crate::formats::BookDescriptor;
use crate::library::{Library, SaveOutcome};

/// Messages sent by a book configuration editor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Request {
    GetBookHtml {
        url: String,
    },
    GetChapterHtml {
        url: String,
    },
    GetCatalog {
        book: BookDescriptor,
        html: String,
    },
    GetChapterTxt {
        book: BookDescriptor,
        html: String,
    },
    Save {
        book_new: BookDescriptor,
        #[serde(default)]
        book_old: BookDescriptor,
        #[serde(default)]
        overwrite: bool,
    },
    Opened,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Reply {
    SetBook {
        book: BookDescriptor,
    },
    SetBookHtml {
        text: String,
    },
    SetChapterHtml {
        text: String,
    },
    SetCatalog {
        catalog_html: Vec<CatalogLink>,
        catalog: Vec<BookDescriptor>,
    },
    SetChapterTxt {
        text: String,
    },
    Saved {
        title: String,
    },
    TitleTaken {
        title: String,
    },
    Ready,
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogLink {
    pub link: String,
    pub title: String,
}

/// The draft of one book being configured.
#[derive(Debug, Clone)]
pub struct EditSession {
    book: BookDescriptor,
}

impl EditSession {
    pub fn new(book: Option<BookDescriptor>) -> Self {
        Self {
            book: book.unwrap_or_else(BookDescriptor::blank),
        }
    }

    pub fn book(&self) -> &BookDescriptor {
        &self.book
    }

    pub async fn handle(
        &mut self,
        request: Request,
        fetcher: &dyn Fetch,
        library: &Library,
    ) -> Reply {
        match request {
            Request::GetBookHtml { url } => Reply::SetBookHtml {
                text: fetcher.fetch(&url).await,
            },
            Request::GetChapterHtml { url } => Reply::SetChapterHtml {
                text: fetcher.fetch(&url).await,
            },
            Request::GetCatalog { book, html } => {
                let catalog = extract_catalog(&book, &html);
                let catalog_html = catalog
                    .iter()
                    .map(|c| CatalogLink {
                        link: c.link.clone(),
                        title: c.title.clone(),
                    })
                    .collect();
                Reply::SetCatalog {
                    catalog_html,
                    catalog,
                }
            }
            Request::GetChapterTxt { book, html } => Reply::SetChapterTxt {
                text: extract_body_text(&book.chapter_rules(), &html).unwrap_or_default(),
            },
            Request::Save {
                book_new,
                book_old,
                overwrite,
            } => match library.save_renamed(&book_new, &book_old.title, overwrite) {
                Ok(SaveOutcome::Saved) => {
                    tracing::info!(book = %book_new.title, "book config saved");
                    let title = book_new.title.clone();
                    self.book = book_new;
                    Reply::Saved { title }
                }
                Ok(SaveOutcome::TitleTaken(title)) => Reply::TitleTaken { title },
                Err(err) => Reply::Error {
                    message: format!("{err:#}"),
                },
            },
            Request::Opened => Reply::Ready,
        }
    }
}

/// Open edit sessions keyed by book title; a new, untitled book uses the empty key.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<String, EditSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the key of the session for `book`, reusing an open one.
    pub fn open(&mut self, book: Option<BookDescriptor>) -> String {
        let key = book.as_ref().map(|b| b.title.clone()).unwrap_or_default();
        self.sessions
            .entry(key.clone())
            .or_insert_with(|| EditSession::new(book));
        key
    }

    pub fn get(&self, key: &str) -> Option<&EditSession> {
        self.sessions.get(key)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Re-keys a session; a session already open under `new_key` is evicted.
    pub fn rename(&mut self, old_key: &str, new_key: &str) -> bool {
        let Some(session) = self.sessions.remove(old_key) else {
            return false;
        };
        if self.sessions.insert(new_key.to_owned(), session).is_some() {
            tracing::debug!(key = new_key, "evicted session replaced by rename");
        }
        true
    }

    pub fn close(&mut self, key: &str) -> Option<EditSession> {
        self.sessions.remove(key)
    }

    /// Routes `request` to the session under `key` and returns the reply plus the
    /// session's key afterwards (saving under a new title moves it).
    pub async fn dispatch(
        &mut self,
        key: &str,
        request: Request,
        fetcher: &dyn Fetch,
        library: &Library,
    ) -> (String, Reply) {
        let Some(session) = self.sessions.get_mut(key) else {
            return (
                key.to_owned(),
                Reply::Error {
                    message: format!("no open session: {key:?}"),
                },
            );
        };
        let reply = session.handle(request, fetcher, library).await;
        if let Reply::Saved { title } = &reply
            && title != key
        {
            self.rename(key, title);
            return (title.clone(), reply);
        }
        (key.to_owned(), reply)
    }
}

/// Serves one session over line-delimited JSON until `input` is exhausted.
pub async fn serve<R, W>(
    registry: &mut SessionRegistry,
    mut key: String,
    input: R,
    mut output: W,
    fetcher: &dyn Fetch,
    library: &Library,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let book = registry
        .get(&key)
        .map(|s| s.book().clone())
        .ok_or_else(|| anyhow::anyhow!("no open session: {key:?}"))?;
    write_reply(&mut output, &Reply::SetBook { book }).await?;

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await.context("read request line")? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = match serde_json::from_str::<Request>(&line) {
            Ok(request) => {
                tracing::debug!(?request, "session request");
                let (next_key, reply) = registry.dispatch(&key, request, fetcher, library).await;
                key = next_key;
                reply
            }
            Err(err) => Reply::Error {
                message: format!("invalid request: {err}"),
            },
        };
        write_reply(&mut output, &reply).await?;
    }

    output.flush().await.context("flush replies")?;
    Ok(())
}

async fn write_reply<W: AsyncWrite + Unpin>(output: &mut W, reply: &Reply) -> anyhow::Result<()> {
    let mut json = serde_json::to_vec(reply).context("serialize reply")?;
    json.push(b'\n');
    output.write_all(&json).await.context("write reply")?;
    output.flush().await.context("flush reply")?;
    Ok(())
}
