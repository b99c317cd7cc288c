//! One-shot push to Readwise
//!
//! Sends every highlight in the database to the Readwise highlight API in a
//! single request. There is no cursor and no merge: Readwise deduplicates
//! on its side.

use chrono::SecondsFormat;
use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::config::Config;
use crate::models::Highlight;
use crate::remote::{tls, RemoteError};
use crate::source::{parse_timestamp, HighlightSource, KoboDatabase};
use crate::sync::error::SyncError;

#[derive(Error, Debug)]
pub enum ReadwiseError {
    #[error(transparent)]
    Source(#[from] SyncError),

    #[error("Unable to build HTTP client: {0}")]
    Client(#[from] RemoteError),

    #[error("Readwise request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Readwise rejected the highlights ({status}): {body}")]
    Rejected { status: StatusCode, body: String },
}

#[derive(Debug, Serialize, PartialEq)]
struct ReadwiseHighlight<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    highlighted_at: Option<String>,
    source_type: &'static str,
}

#[derive(Debug, Serialize)]
struct HighlightPost<'a> {
    highlights: Vec<ReadwiseHighlight<'a>>,
}

/// Outcome of a push
#[derive(Debug, Clone, Serialize)]
pub struct PushReport {
    pub sent: usize,
    /// Rows without text, which Readwise cannot store
    pub skipped: usize,
}

fn payload(highlights: &[Highlight]) -> HighlightPost<'_> {
    let highlights = highlights
        .iter()
        .filter_map(|h| {
            let text = h.text.as_deref().filter(|t| !t.trim().is_empty())?;
            Some(ReadwiseHighlight {
                text,
                title: h.book.as_deref(),
                note: h.note.as_deref(),
                highlighted_at: h.timestamp.as_deref().and_then(iso_timestamp),
                source_type: "kobo",
            })
        })
        .collect();
    HighlightPost { highlights }
}

fn iso_timestamp(raw: &str) -> Option<String> {
    parse_timestamp(raw).map(|ts| ts.and_utc().to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Post highlights to `api_url`
pub fn push(
    client: &Client,
    api_url: &str,
    token: &str,
    highlights: &[Highlight],
) -> Result<PushReport, ReadwiseError> {
    let body = payload(highlights);
    let report = PushReport {
        sent: body.highlights.len(),
        skipped: highlights.len() - body.highlights.len(),
    };

    let response = client
        .post(api_url)
        .header(AUTHORIZATION, format!("Token {}", token))
        .json(&body)
        .send()?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(ReadwiseError::Rejected { status, body });
    }

    info!("pushed {} highlights to Readwise", report.sent);
    Ok(report)
}

/// Push every highlight in the configured database
pub fn push_from_config(config: &Config, token: &str) -> Result<PushReport, ReadwiseError> {
    let client = tls::build_client(config.ca_cert_dir.as_deref())?;
    let source = KoboDatabase::open(&config.database_path)?;
    let highlights = source.fetch_all()?;
    push(&client, &config.readwise.api_url, token, &highlights)
}
