//! Document bytes and plugin emissions.

use gransk_shared::Document;

use crate::topic::Topic;

/// Raw bytes travelling alongside a [`Document`].
///
/// A plugin may replace the bytes (and the content type) in place; later
/// plugins on the same document see the replacement.
#[derive(Debug, Clone, Default)]
pub struct Payload {
    bytes: Vec<u8>,
    content_type: Option<String>,
}

impl Payload {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            content_type: None,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Content type override set by a plugin that rewrote the bytes.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Swap in new bytes with the content type they carry.
    pub fn replace(&mut self, bytes: Vec<u8>, content_type: impl Into<String>) {
        self.bytes = bytes;
        self.content_type = Some(content_type.into());
    }
}

/// Follow-up work requested by a plugin.
#[derive(Debug)]
pub enum Emit {
    /// Route the same document to another topic.
    Forward(Topic),
    /// Ingest a derived document, starting at `topic`.
    Child {
        doc: Document,
        payload: Payload,
        topic: Topic,
    },
    /// A problem that did not stop the plugin, such as a skipped archive
    /// entry. Recorded in the dispatch report against the emitting plugin.
    Failed(String),
}

impl Emit {
    pub fn child(doc: Document, payload: Payload) -> Self {
        Self::Child {
            doc,
            payload,
            topic: Topic::ProcessFile,
        }
    }
}
