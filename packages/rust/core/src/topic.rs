//! Routing keys for the dispatcher.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A named channel that plugins subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// Entry point for every ingested document.
    ProcessFile,
    /// Documents that need the external extraction service.
    ExternalExtractor,
    /// Documents whose payload is already text.
    PlainText,
    /// Containers to unpack into child documents.
    Archive,
    /// Documents whose `text` has been set.
    ProcessText,
    /// Last phase of every document, after its subtree is done.
    FinishDocument,
}

impl Topic {
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::ProcessFile => "process_file",
            Topic::ExternalExtractor => "external_extractor",
            Topic::PlainText => "plain_text",
            Topic::Archive => "archive",
            Topic::ProcessText => "process_text",
            Topic::FinishDocument => "finish_document",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
