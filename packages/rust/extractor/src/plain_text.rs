//! Reader for payloads that are already text.

use async_trait::async_trait;

use gransk_core::{Emit, Payload, Subscriber, Topic};
use gransk_shared::{Document, Result};

#[derive(Debug, Default)]
pub struct PlainText;

#[async_trait]
impl Subscriber for PlainText {
    fn name(&self) -> &'static str {
        "plain_text"
    }

    fn consumes(&self) -> &'static [Topic] {
        &[Topic::PlainText]
    }

    async fn consume(&self, doc: &mut Document, payload: &mut Payload) -> Result<Vec<Emit>> {
        let text = String::from_utf8_lossy(payload.bytes());
        let text = text.trim();
        if text.is_empty() {
            return Ok(vec![]);
        }
        doc.text = Some(text.to_string());
        Ok(vec![Emit::Forward(Topic::ProcessText)])
    }
}
