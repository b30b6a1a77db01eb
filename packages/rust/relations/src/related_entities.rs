//! Entities that appear together in documents.

use async_trait::async_trait;
use tracing::debug;

use gransk_core::{Injector, Related, Service};
use gransk_shared::{Document, Result};

use crate::graph::CoOccurrence;
use crate::index::{DocumentIndex, State};
use crate::snapshot;

pub const NAME: &str = "related_entities";

/// Answers `get_related_to(entity_id)` with co-occurring entities.
#[derive(Debug, Default)]
pub struct RelatedEntities {
    state: State<CoOccurrence>,
}

impl RelatedEntities {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentIndex for RelatedEntities {
    fn index(&self, doc: &Document) {
        let ids: Vec<&str> = doc.entities.iter().map(|e| e.id.as_str()).collect();
        if self.state.write().add_document(doc.id.as_str(), &ids) {
            debug!(doc_id = %doc.id.short(), entities = ids.len(), "indexed co-occurrences");
        }
    }
}

#[async_trait]
impl Service for RelatedEntities {
    fn name(&self) -> &str {
        NAME
    }

    async fn load_all(&self, injector: &Injector) -> Result<()> {
        if let Some(graph) = snapshot::load::<CoOccurrence>(injector, NAME).await? {
            *self.state.write() = graph;
        }
        Ok(())
    }

    async fn save_all(&self, injector: &Injector) -> Result<()> {
        let json = snapshot::encode(NAME, &*self.state.read())?;
        snapshot::save(injector, NAME, json).await
    }

    async fn clear(&self, injector: &Injector) -> Result<()> {
        *self.state.write() = CoOccurrence::default();
        snapshot::delete(injector, NAME).await
    }

    fn get_related_to(&self, id: &str) -> Result<Vec<Related>> {
        Ok(self.state.read().neighbours(id))
    }
}
