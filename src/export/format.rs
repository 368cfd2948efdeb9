//! Export formats offered by the service.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Format a document is rendered into by the server-side export job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Markdown text (`.md`).
    #[default]
    Markdown,
    /// PDF document (`.pdf`).
    Pdf,
    /// Word document (`.docx`).
    Word,
    /// Native archive format (`.lakebook`).
    Lakebook,
}

impl ExportFormat {
    /// Every supported format, in display order.
    pub const ALL: [Self; 4] = [Self::Markdown, Self::Pdf, Self::Word, Self::Lakebook];

    /// Name sent in the `type` field of an export request.
    #[must_use]
    pub fn api_name(self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Pdf => "pdf",
            Self::Word => "word",
            Self::Lakebook => "lakebook",
        }
    }

    /// File extension of the downloaded artifact, without the dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Pdf => "pdf",
            Self::Word => "docx",
            Self::Lakebook => "lakebook",
        }
    }

    /// Text formats receive a front-matter block after download.
    #[must_use]
    pub fn is_text(self) -> bool {
        matches!(self, Self::Markdown)
    }

    /// JSON-encoded `options` string for the export request.
    ///
    /// Markdown asks for LaTeX formulas and the enhanced converter; every
    /// other format sends an empty string.
    #[must_use]
    pub fn request_options(self) -> String {
        match self {
            Self::Markdown => serde_json::json!({"latexType": 1, "useMdai": 1}).to_string(),
            Self::Pdf | Self::Word | Self::Lakebook => String::new(),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_name())
    }
}

/// Error for an unrecognized format name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown export format '{0}' (expected one of: markdown, pdf, word, lakebook)")]
pub struct UnknownFormat(pub String);

impl FromStr for ExportFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        match wanted.as_str() {
            "md" => return Ok(Self::Markdown),
            "docx" => return Ok(Self::Word),
            _ => {}
        }
        Self::ALL
            .into_iter()
            .find(|format| format.api_name() == wanted)
            .ok_or_else(|| UnknownFormat(s.to_string()))
    }
}
