//! Regex entity detection over document text.

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use gransk_core::{Emit, Payload, Subscriber, Topic};
use gransk_shared::{Document, Entity, Result};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b[a-z0-9._%+-]+@[a-z0-9-]+(?:\.[a-z0-9-]+)*\.[a-z]{2,}\b")
        .expect("valid email regex")
});

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bhttps?://[^\s<>"'()\[\]]+"#).expect("valid url regex")
});

static IPV4_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:(?:25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])\.){3}(?:25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])\b")
        .expect("valid ipv4 regex")
});

// No lookbehind: the tag is capture group 1, preceded by start or a non-word char.
static HASHTAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\w&#/])(#\w{2,})").expect("valid hashtag regex")
});

fn entity(kind: &str, value: &str, offset: usize) -> Entity {
    Entity {
        id: format!("{kind}:{}", value.to_lowercase()),
        entity_type: kind.to_string(),
        value: value.to_string(),
        offset,
    }
}

/// Find entities in `text`, ordered by first occurrence.
///
/// Repeated values collapse into one entity carrying the first offset.
pub fn detect_entities(text: &str) -> Vec<Entity> {
    let mut found = Vec::new();

    for m in EMAIL_RE.find_iter(text) {
        found.push(entity("email", m.as_str(), m.start()));
    }
    for m in URL_RE.find_iter(text) {
        let value = m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?']);
        found.push(entity("url", value, m.start()));
    }
    for m in IPV4_RE.find_iter(text) {
        found.push(entity("ipv4", m.as_str(), m.start()));
    }
    for caps in HASHTAG_RE.captures_iter(text) {
        if let Some(m) = caps.get(1) {
            found.push(entity("hashtag", m.as_str(), m.start()));
        }
    }

    found.sort_by_key(|e| e.offset);
    let mut seen = HashSet::new();
    found.retain(|e| seen.insert(e.id.clone()));
    found
}

/// Stores detected entities on `Document::entities`.
#[derive(Debug, Default)]
pub struct EntityDetector;

#[async_trait]
impl Subscriber for EntityDetector {
    fn name(&self) -> &'static str {
        "entities"
    }

    fn consumes(&self) -> &'static [Topic] {
        &[Topic::ProcessText]
    }

    fn accept(&self, doc: &Document) -> bool {
        doc.text.is_some()
    }

    async fn consume(&self, doc: &mut Document, _payload: &mut Payload) -> Result<Vec<Emit>> {
        let Some(text) = doc.text.as_deref() else {
            return Ok(vec![]);
        };
        let entities = detect_entities(text);
        debug!(doc_id = %doc.id.short(), count = entities.len(), "entities detected");
        doc.entities = entities;
        Ok(vec![])
    }
}
