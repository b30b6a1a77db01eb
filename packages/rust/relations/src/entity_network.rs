//! Entity graph queried as a neighbourhood.

use async_trait::async_trait;

use gransk_core::{Injector, Network, Service};
use gransk_shared::{Document, Result};

use crate::graph::CoOccurrence;
use crate::index::{DocumentIndex, State};
use crate::snapshot;

pub const NAME: &str = "entity_network";

/// Answers `get_for(entity_id, hops)` with nodes and links around the entity.
#[derive(Debug, Default)]
pub struct EntityNetwork {
    state: State<CoOccurrence>,
}

impl EntityNetwork {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentIndex for EntityNetwork {
    fn index(&self, doc: &Document) {
        let ids: Vec<&str> = doc.entities.iter().map(|e| e.id.as_str()).collect();
        self.state.write().add_document(doc.id.as_str(), &ids);
    }
}

#[async_trait]
impl Service for EntityNetwork {
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

    fn get_for(&self, id: &str, hops: usize) -> Result<Network> {
        Ok(self.state.read().network(id, hops))
    }
}
