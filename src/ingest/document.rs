//! Document ingestion: fetch raw bytes, then parse them into text and tables.
//!
//! - `DocumentFetcher`: local path, `file://` or http(s) URL to bytes
//! - `DocumentParser`: bytes to [`ParsedDocument`]; PDF via lopdf, UTF-8 text otherwise

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::ai::timeout::with_timeout;
use crate::types::{ParsedDocument, Result, SiftError};

pub type SharedFetcher = Arc<dyn DocumentFetcher>;
pub type SharedParser = Arc<dyn DocumentParser>;

// =============================================================================
// Fetching
// =============================================================================

#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>>;
}

/// Where a location string points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Remote(url::Url),
    Local(PathBuf),
}

impl Location {
    pub fn resolve(location: &str) -> Result<Self> {
        let trimmed = location.trim();
        if trimmed.is_empty() {
            return Err(SiftError::ingest(location, "empty location"));
        }
        match url::Url::parse(trimmed) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(Self::Remote(url)),
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map(Self::Local)
                .map_err(|_| SiftError::ingest(location, "invalid file URL")),
            // Windows drive letters parse as a one-letter scheme
            Ok(url) if url.scheme().len() > 1 => Err(SiftError::ingest(
                location,
                format!("unsupported scheme '{}'", url.scheme()),
            )),
            _ => Ok(Self::Local(PathBuf::from(trimmed))),
        }
    }
}

/// Reads local files and downloads http(s) resources under a timeout.
pub struct HttpFileFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFileFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| SiftError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, timeout })
    }

    async fn download(&self, url: url::Url) -> Result<Vec<u8>> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SiftError::ingest(url.as_str(), format!("HTTP {}", status)));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl DocumentFetcher for HttpFileFetcher {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>> {
        let bytes = match Location::resolve(location)? {
            Location::Remote(url) => {
                debug!(url = %url, "Downloading document");
                let operation = format!("download {}", url);
                with_timeout(self.timeout, self.download(url), &operation).await?
            }
            Location::Local(path) => tokio::fs::read(&path)
                .await
                .map_err(|e| SiftError::ingest(location, e.to_string()))?,
        };
        if bytes.is_empty() {
            return Err(SiftError::ingest(location, "empty document"));
        }
        Ok(bytes)
    }
}

// =============================================================================
// Parsing
// =============================================================================

pub trait DocumentParser: Send + Sync {
    fn parse(&self, bytes: &[u8]) -> Result<ParsedDocument>;
}

/// Run a parser on the blocking pool; PDF decoding is CPU-bound.
pub async fn parse_blocking(parser: SharedParser, bytes: Vec<u8>) -> Result<ParsedDocument> {
    tokio::task::spawn_blocking(move || parser.parse(&bytes))
        .await
        .map_err(|e| SiftError::ingest("document", format!("parser task failed: {}", e)))?
}

/// PDF text via lopdf; anything else must be UTF-8 text (markdown, txt).
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfParser;

const PDF_MAGIC: &[u8] = b"%PDF";

impl DocumentParser for PdfParser {
    fn parse(&self, bytes: &[u8]) -> Result<ParsedDocument> {
        let _span = tracing::debug_span!("ingest.parse", bytes = bytes.len()).entered();

        let content_sha256 = format!("{:x}", Sha256::digest(bytes));
        let mut parsed = if bytes.starts_with(PDF_MAGIC) {
            parse_pdf(bytes)?
        } else {
            parse_text(bytes)?
        };
        parsed.content_sha256 = content_sha256;

        if parsed.is_empty() {
            return Err(SiftError::ingest(
                "document",
                "no extractable text (scanned or empty document)",
            ));
        }
        Ok(parsed)
    }
}

fn parse_pdf(bytes: &[u8]) -> Result<ParsedDocument> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| SiftError::ingest("document", format!("failed to load PDF: {}", e)))?;

    let page_texts: Vec<String> = doc
        .get_pages()
        .keys()
        .map(|&page| {
            doc.extract_text(&[page])
                .map(|t| t.trim().to_string())
                .unwrap_or_default()
        })
        .collect();

    let plain_text = page_texts
        .iter()
        .filter(|t| !t.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join("\n\n");
    let tables = extract_delimited_tables(&plain_text);

    Ok(ParsedDocument {
        plain_text,
        page_texts,
        tables,
        content_sha256: String::new(),
    })
}

fn parse_text(bytes: &[u8]) -> Result<ParsedDocument> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| SiftError::ingest("document", "unsupported binary format"))?
        .trim_start_matches('\u{feff}');
    Ok(ParsedDocument {
        plain_text: text.trim().to_string(),
        page_texts: vec![text.trim().to_string()],
        tables: extract_delimited_tables(text),
        content_sha256: String::new(),
    })
}

/// Pipe-delimited tables (`| a | b |`), skipping markdown separator rows.
fn extract_delimited_tables(text: &str) -> Vec<Vec<Vec<String>>> {
    let mut tables = Vec::new();
    let mut current: Vec<Vec<String>> = Vec::new();

    for line in text.lines().map(str::trim) {
        if line.starts_with('|') && line.ends_with('|') && line.len() > 1 {
            let cells: Vec<String> = line[1..line.len() - 1]
                .split('|')
                .map(|c| c.trim().to_string())
                .collect();
            let is_separator = cells
                .iter()
                .all(|c| !c.is_empty() && c.chars().all(|ch| matches!(ch, '-' | ':')));
            if !is_separator {
                current.push(cells);
            }
        } else if !current.is_empty() {
            tables.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tables.push(current);
    }
    tables.retain(|t| t.len() > 1);
    tables
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_location_resolution() {
        assert!(matches!(
            Location::resolve("https://example.com/deck.pdf").unwrap(),
            Location::Remote(_)
        ));
        assert_eq!(
            Location::resolve("decks/acme.pdf").unwrap(),
            Location::Local(PathBuf::from("decks/acme.pdf"))
        );
        assert!(Location::resolve("ftp://example.com/x").is_err());
        assert!(Location::resolve("   ").is_err());
    }

    #[test]
    fn test_text_document_with_table() {
        let text = "# Acme\n\nWe build payments.\n\n| Metric | Value |\n|---|---|\n| MRR | $40k |\n";
        let parsed = PdfParser.parse(text.as_bytes()).unwrap();
        assert!(parsed.plain_text.starts_with("# Acme"));
        assert_eq!(parsed.tables.len(), 1);
        assert_eq!(parsed.tables[0][1], vec!["MRR", "$40k"]);
        assert_eq!(parsed.content_sha256.len(), 64);
    }

    #[test]
    fn test_pipe_rows_form_tables() {
        let text = "Intro\n| Name | Stage |\n|---|:---:|\n| Acme | Seed |\nbreak\n| lone | row |\n\n  | A | B |\n| 1 | 2 |";
        let tables = extract_delimited_tables(text);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0], vec![vec!["Name", "Stage"], vec!["Acme", "Seed"]]);
        assert_eq!(tables[1][1], vec!["1", "2"]);

        let aligned = "Name     Stage\nAcme     Seed\nBeta     Series A";
        assert!(extract_delimited_tables(aligned).is_empty());
    }

    #[test]
    fn test_binary_and_empty_rejected() {
        assert!(PdfParser.parse(&[0xff, 0xfe, 0x00, 0x81]).is_err());
        assert!(PdfParser.parse(b"   \n ").is_err());
    }

    #[test]
    fn test_broken_pdf_is_ingest_error() {
        let err = PdfParser.parse(b"%PDF-1.7 truncated").unwrap_err();
        assert!(matches!(err, SiftError::Ingest { .. }));
    }

    #[tokio::test]
    async fn test_fetch_local_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Acme deck").unwrap();
        let fetcher = HttpFileFetcher::new(Duration::from_secs(5)).unwrap();

        let bytes = fetcher.fetch(file.path().to_str().unwrap()).await.unwrap();
        assert_eq!(bytes, b"Acme deck");

        let missing = fetcher.fetch("/definitely/not/here.pdf").await;
        assert!(matches!(missing, Err(SiftError::Ingest { .. })));
    }

    #[tokio::test]
    async fn test_parse_blocking() {
        let parser: SharedParser = Arc::new(PdfParser);
        let parsed = parse_blocking(parser, b"hello".to_vec()).await.unwrap();
        assert_eq!(parsed.plain_text, "hello");
    }
}
