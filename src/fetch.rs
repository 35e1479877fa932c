use std::sync::LazyLock;

use anyhow::Context as _;
use async_trait::async_trait;
use encoding_rs::{Encoding, UTF_8};
use regex::Regex;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use url::Url;

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/99.0.4844.82 Safari/537.36";

/// How much of the payload is scanned for a `<meta charset>` declaration.
pub const META_PRESCAN_BYTES: usize = 4096;

const DEFAULT_CHARSET: &str = "utf-8";

static HEADER_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)charset=([^;]+)").unwrap_or_else(|err| panic!("header charset regex: {err}"))
});

static META_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]+charset=["']?([^"'>]+)"#)
        .unwrap_or_else(|err| panic!("meta charset regex: {err}"))
});

/// Single best-effort GET returning decoded text, or an empty string on any failure.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str) -> String;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("build http client")?;
        Ok(Self { client })
    }

    async fn try_fetch(&self, url: &str) -> anyhow::Result<String> {
        let url = Url::parse(url).with_context(|| format!("parse url: {url}"))?;
        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("GET {url}: unexpected status {status}");
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response
            .bytes()
            .await
            .with_context(|| format!("read body: {url}"))?;

        Ok(decode_html(&body, content_type.as_deref()))
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> String {
        match self.try_fetch(url).await {
            Ok(text) => {
                tracing::debug!(url, bytes = text.len(), "fetched");
                text
            }
            Err(err) => {
                tracing::warn!(url, "fetch failed: {err:#}");
                String::new()
            }
        }
    }
}

/// Decodes a response body, preferring the header charset and then a `<meta>` declaration.
pub fn decode_html(bytes: &[u8], content_type: Option<&str>) -> String {
    let mut label = content_type
        .and_then(charset_from_content_type)
        .unwrap_or_else(|| DEFAULT_CHARSET.to_owned());

    if is_default_charset(&label) {
        let head = &bytes[..bytes.len().min(META_PRESCAN_BYTES)];
        let provisional = String::from_utf8_lossy(head);
        if let Some(declared) = charset_from_meta(&provisional) {
            label = declared;
        }
    }

    let encoding = match Encoding::for_label(label.as_bytes()) {
        Some(encoding) => encoding,
        None => {
            tracing::debug!(charset = %label, "unknown charset; decoding as utf-8");
            UTF_8
        }
    };
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        tracing::debug!(charset = encoding.name(), "replaced malformed sequences");
    }
    text.into_owned()
}

pub fn charset_from_content_type(content_type: &str) -> Option<String> {
    HEADER_CHARSET
        .captures(content_type)
        .and_then(|caps| caps.get(1))
        .map(|m| normalize_label(m.as_str()))
        .filter(|label| !label.is_empty())
}

fn charset_from_meta(html: &str) -> Option<String> {
    META_CHARSET
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| normalize_label(m.as_str()))
        .filter(|label| !label.is_empty())
}

fn normalize_label(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| c == '"' || c == '\'')
        .trim()
        .to_ascii_lowercase()
}

fn is_default_charset(label: &str) -> bool {
    label == DEFAULT_CHARSET || label == "utf8"
}
