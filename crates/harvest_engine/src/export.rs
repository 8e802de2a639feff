use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use harvest_core::{Message, Range, Snowflake};
use serde::{Deserialize, Serialize};

use crate::persist::{AtomicFileWriter, PersistError};

/// Shown in text exports for messages without any text.
pub const EMPTY_MESSAGE_PLACEHOLDER: &str = "[Empty message]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Text,
    Structured,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Text => "txt",
            ExportFormat::Structured => "json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Text => write!(f, "text"),
            ExportFormat::Structured => write!(f, "structured"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(ExportFormat::Text),
            "structured" | "json" => Ok(ExportFormat::Structured),
            other => Err(format!("unknown export format {other:?} (expected text or structured)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub message_count: usize,
    pub format: ExportFormat,
    pub output_path: PathBuf,
    pub bytes_written: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Receives the final ordered slice and persists it.
pub trait Exporter {
    fn export(&self, messages: &[Message], format: ExportFormat) -> Result<ExportSummary, ExportError>;
}

/// Writes `{stem}.txt` or `{stem}.json` into an output directory.
pub struct FileExporter {
    output_dir: PathBuf,
    file_stem: String,
}

impl FileExporter {
    pub fn new(output_dir: impl Into<PathBuf>, file_stem: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            file_stem: file_stem.into(),
        }
    }
}

impl Exporter for FileExporter {
    fn export(&self, messages: &[Message], format: ExportFormat) -> Result<ExportSummary, ExportError> {
        let content = match format {
            ExportFormat::Text => render_text(messages),
            ExportFormat::Structured => render_structured(messages)?,
        };
        let filename = format!("{}.{}", self.file_stem, format.extension());
        let output_path = AtomicFileWriter::new(self.output_dir.clone()).write(&filename, content.as_bytes())?;
        Ok(ExportSummary {
            message_count: messages.len(),
            format,
            output_path,
            bytes_written: content.len() as u64,
        })
    }
}

/// `messages_{guild}_{channel}_{older}_{newer}`
pub fn export_file_stem(guild: &str, channel: &Snowflake, range: &Range) -> String {
    let guild: String = guild
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("messages_{guild}_{channel}_{}_{}", range.older(), range.newer())
}

/// One block per message, blocks separated by a blank line:
///
/// ```text
/// 2024-03-01 12:00:00 UTC | ann#1234 (42)
/// hello
/// [Message ID: 1151456287954198578]
/// ```
pub fn render_text(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| {
            let content = if m.content.is_empty() {
                EMPTY_MESSAGE_PLACEHOLDER
            } else {
                m.content.as_str()
            };
            format!(
                "{} | {} ({})\n{}\n[Message ID: {}]",
                format_timestamp(&m.timestamp),
                m.author.tag(),
                m.author.id,
                content,
                m.id
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[derive(Serialize)]
struct StructuredExport<'a> {
    message_count: usize,
    messages: &'a [Message],
}

pub fn render_structured(messages: &[Message]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&StructuredExport {
        message_count: messages.len(),
        messages,
    })
}

// Falls back to the raw value when the remote sends something unexpected.
fn format_timestamp(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc).format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|_| raw.to_string())
}
