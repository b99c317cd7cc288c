//! Markdown rendering
//!
//! Turns a book's highlights into document text with handlebars templates.
//! The header (title line) and body (highlight entries) are rendered
//! separately so new entries can be appended to a document without
//! re-rendering what it already holds.
//!
//! ## Template data
//!
//! | field                     | meaning                              |
//! |---------------------------|--------------------------------------|
//! | `title`                   | book title                           |
//! | `sync_date`               | when this run started                |
//! | `highlights[].timestamp`  | display timestamp                    |
//! | `highlights[].text`       | quoted passage, null when empty      |
//! | `highlights[].note`       | reader's note, null when empty       |
//!
//! Templates render in strict mode: a reference to any other field fails
//! the book rather than producing a silently blank document.
//!
//! ## Entry markers
//!
//! After the template output, the body carries one HTML comment per entry:
//!
//! ```text
//! <!-- kobosync:entry eyJ0ZXh0IjoiLi4uIn0 -->
//! ```
//!
//! The payload is the raw (text, note, timestamp) as base64url JSON. Markdown
//! viewers hide the comments; [`parse_entries`] reads them back to learn
//! which highlights a document already holds, whatever template wrote it.

use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64_URL;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use handlebars::Handlebars;
use serde::{Deserialize, Serialize};

use crate::config::Templates;
use crate::models::Highlight;
use crate::source::parse_timestamp;
use crate::sync::error::{SyncError, SyncResult};

/// Built-in body template
pub const DEFAULT_BODY_TEMPLATE: &str = "

{{#each highlights}}
---
**{{timestamp}}**
{{#if text}}> {{text}}{{/if}}
{{#if note}}*{{note}}*{{/if}}
{{/each}}";

/// Built-in header template
pub const DEFAULT_HEADER_TEMPLATE: &str = "# {{title}}\n\n";

/// Display format for timestamps, e.g. `Mon, 02 Jan 2006 15:04:05 UTC`
const DISPLAY_FORMAT: &str = "%a, %d %b %Y %H:%M:%S UTC";

const MARKER_PREFIX: &str = "<!-- kobosync:entry ";
const MARKER_SUFFIX: &str = " -->";

/// Rendered header and body of one document
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDocument {
    pub header: String,
    pub body: String,
}

#[derive(Serialize)]
struct TemplateEntry<'a> {
    timestamp: String,
    text: Option<&'a str>,
    note: Option<&'a str>,
}

#[derive(Serialize)]
struct TemplateData<'a> {
    title: &'a str,
    sync_date: String,
    highlights: Vec<TemplateEntry<'a>>,
}

/// What an entry marker records
#[derive(Serialize, Deserialize)]
struct EntryRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
}

/// Renders documents with the configured (or built-in) templates
pub struct Renderer {
    registry: Handlebars<'static>,
    body_template: String,
    header_template: String,
    synced_at: DateTime<Utc>,
}

impl Renderer {
    pub fn new(templates: &Templates, synced_at: DateTime<Utc>) -> Self {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(handlebars::no_escape);

        Self {
            registry,
            body_template: templates
                .body
                .clone()
                .unwrap_or_else(|| DEFAULT_BODY_TEMPLATE.to_string()),
            header_template: templates
                .header
                .clone()
                .unwrap_or_else(|| DEFAULT_HEADER_TEMPLATE.to_string()),
            synced_at,
        }
    }

    /// Render header and body for `highlights`
    pub fn render(&self, title: &str, highlights: &[Highlight]) -> SyncResult<RenderedDocument> {
        Ok(RenderedDocument {
            header: self.render_header(title)?,
            body: self.render_body(title, highlights)?,
        })
    }

    pub fn render_header(&self, title: &str) -> SyncResult<String> {
        let data = TemplateData {
            title,
            sync_date: self.sync_date(),
            highlights: Vec::new(),
        };
        self.apply(&self.header_template, title, &data)
    }

    /// Render entries oldest first, followed by their markers
    pub fn render_body(&self, title: &str, highlights: &[Highlight]) -> SyncResult<String> {
        let mut sorted = highlights.to_vec();
        sort_by_timestamp(&mut sorted);

        let entries = sorted
            .iter()
            .map(|h| TemplateEntry {
                timestamp: h
                    .timestamp
                    .as_deref()
                    .map(display_timestamp)
                    .unwrap_or_default(),
                text: h.text.as_deref().filter(|t| !t.is_empty()),
                note: h.note.as_deref().filter(|n| !n.is_empty()),
            })
            .collect();

        let data = TemplateData {
            title,
            sync_date: self.sync_date(),
            highlights: entries,
        };

        let mut body = self.apply(&self.body_template, title, &data)?;
        if !body.is_empty() && !body.ends_with('\n') {
            body.push('\n');
        }
        for highlight in &sorted {
            body.push_str(&entry_marker(highlight));
            body.push('\n');
        }
        Ok(body)
    }

    fn apply(&self, template: &str, title: &str, data: &TemplateData<'_>) -> SyncResult<String> {
        self.registry
            .render_template(template, data)
            .map_err(|e| SyncError::RenderFailure {
                title: title.to_string(),
                details: e.to_string(),
            })
    }

    fn sync_date(&self) -> String {
        self.synced_at.format(DISPLAY_FORMAT).to_string()
    }
}

/// Stable sort, oldest first
///
/// Highlights whose timestamp is missing or unparsable never move ahead of
/// one that parses, and keep their relative order.
pub fn sort_by_timestamp(highlights: &mut [Highlight]) {
    highlights.sort_by_cached_key(|h| {
        let parsed = h.timestamp.as_deref().and_then(parse_timestamp);
        (parsed.is_none(), parsed)
    });
}

/// Long display form of a source timestamp; unparsable input is returned as is
pub fn display_timestamp(raw: &str) -> String {
    match parse_timestamp(raw) {
        Some(ts) => ts.format(DISPLAY_FORMAT).to_string(),
        None => raw.to_string(),
    }
}

fn entry_marker(highlight: &Highlight) -> String {
    let record = EntryRecord {
        text: highlight.text.clone(),
        note: highlight.note.clone(),
        timestamp: highlight.timestamp.clone(),
    };
    // Serializing plain strings cannot fail
    let json = serde_json::to_vec(&record).unwrap_or_default();
    format!("{}{}{}", MARKER_PREFIX, B64_URL.encode(json), MARKER_SUFFIX)
}

/// Highlights recorded by entry markers in a document kobosync wrote
///
/// Lines that are not markers, or markers that do not decode, are ignored.
/// The returned highlights carry no book.
pub fn parse_entries(document: &str) -> Vec<Highlight> {
    document
        .lines()
        .filter_map(|line| {
            let payload = line
                .trim()
                .strip_prefix(MARKER_PREFIX)?
                .strip_suffix(MARKER_SUFFIX)?;
            let bytes = B64_URL.decode(payload.trim()).ok()?;
            let record: EntryRecord = serde_json::from_slice(&bytes).ok()?;
            Some(Highlight::new(record.text, record.note, None, record.timestamp))
        })
        .collect()
}
