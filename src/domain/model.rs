use std::fmt;

use bytes::Bytes;
use url::Url;

/// A PDF picked by the user, held in memory until it is uploaded
#[derive(Clone)]
pub struct SelectedFile {
    pub name: String,
    pub contents: Bytes,
}

// Contents are omitted; they can be megabytes.
impl fmt::Debug for SelectedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedFile")
            .field("name", &self.name)
            .field("size", &self.contents.len())
            .finish()
    }
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, contents: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }
}

/// Target formats offered by the conversion service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Markdown,
    Text,
    Docx,
    Odt,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::Markdown,
        OutputFormat::Text,
        OutputFormat::Docx,
        OutputFormat::Odt,
    ];

    /// Identifier sent as `output_format`
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Text => "txt",
            OutputFormat::Docx => "docx",
            OutputFormat::Odt => "odt",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OutputFormat::Markdown => "Markdown (.md)",
            OutputFormat::Text => "Plain text (.txt)",
            OutputFormat::Docx => "Word (.docx)",
            OutputFormat::Odt => "OpenDocument (.odt)",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a successful conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionResult {
    pub output_file: String,
    pub message: Option<String>,
    pub download_url: Url,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    FileSelected,
    Uploading,
    Converting,
    Ready,
    Failed,
}
