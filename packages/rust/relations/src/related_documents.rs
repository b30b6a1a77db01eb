//! Documents that mention the same entities.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use gransk_core::{Injector, Related, Service};
use gransk_shared::{Document, Result};

use crate::index::{DocumentIndex, State};
use crate::snapshot;

pub const NAME: &str = "related_documents";

/// Inverted index in both directions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Postings {
    by_entity: BTreeMap<String, BTreeSet<String>>,
    by_document: BTreeMap<String, BTreeSet<String>>,
}

impl Postings {
    /// Replace the entity set recorded for `doc_id`.
    fn insert(&mut self, doc_id: &str, entity_ids: BTreeSet<String>) {
        if let Some(previous) = self.by_document.remove(doc_id) {
            for entity in previous {
                if let Some(docs) = self.by_entity.get_mut(&entity) {
                    docs.remove(doc_id);
                    if docs.is_empty() {
                        self.by_entity.remove(&entity);
                    }
                }
            }
        }
        for entity in &entity_ids {
            self.by_entity
                .entry(entity.clone())
                .or_default()
                .insert(doc_id.to_string());
        }
        self.by_document.insert(doc_id.to_string(), entity_ids);
    }

    fn related(&self, doc_id: &str) -> Vec<Related> {
        let Some(entities) = self.by_document.get(doc_id) else {
            return Vec::new();
        };

        let mut shared: BTreeMap<&str, u64> = BTreeMap::new();
        for entity in entities {
            for other in self.by_entity.get(entity).into_iter().flatten() {
                if other != doc_id {
                    *shared.entry(other.as_str()).or_default() += 1;
                }
            }
        }

        let mut related: Vec<Related> = shared
            .into_iter()
            .map(|(id, weight)| Related {
                id: id.to_string(),
                weight,
            })
            .collect();
        related.sort_by(|a, b| b.weight.cmp(&a.weight).then_with(|| a.id.cmp(&b.id)));
        related
    }
}

/// Answers `get_related_to(doc_id)` with documents weighted by shared entities.
#[derive(Debug, Default)]
pub struct RelatedDocuments {
    state: State<Postings>,
}

impl RelatedDocuments {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentIndex for RelatedDocuments {
    fn index(&self, doc: &Document) {
        let entity_ids: BTreeSet<String> = doc.entities.iter().map(|e| e.id.clone()).collect();
        debug!(doc_id = %doc.id.short(), entities = entity_ids.len(), "indexed document");
        self.state.write().insert(doc.id.as_str(), entity_ids);
    }
}

#[async_trait]
impl Service for RelatedDocuments {
    fn name(&self) -> &str {
        NAME
    }

    async fn load_all(&self, injector: &Injector) -> Result<()> {
        if let Some(postings) = snapshot::load::<Postings>(injector, NAME).await? {
            *self.state.write() = postings;
        }
        Ok(())
    }

    async fn save_all(&self, injector: &Injector) -> Result<()> {
        let json = snapshot::encode(NAME, &*self.state.read())?;
        snapshot::save(injector, NAME, json).await
    }

    async fn clear(&self, injector: &Injector) -> Result<()> {
        *self.state.write() = Postings::default();
        snapshot::delete(injector, NAME).await
    }

    fn get_related_to(&self, id: &str) -> Result<Vec<Related>> {
        Ok(self.state.read().related(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn weights_by_shared_entities() {
        let mut p = Postings::default();
        p.insert("d1", set(&["a", "b", "c"]));
        p.insert("d2", set(&["a", "b"]));
        p.insert("d3", set(&["c"]));
        p.insert("d4", set(&["z"]));

        let related = p.related("d1");
        assert_eq!(
            related,
            vec![
                Related { id: "d2".into(), weight: 2 },
                Related { id: "d3".into(), weight: 1 },
            ]
        );
        assert!(p.related("d4").is_empty());
        assert!(p.related("unknown").is_empty());
    }

    #[test]
    fn reindexing_replaces_postings() {
        let mut p = Postings::default();
        p.insert("d1", set(&["a"]));
        p.insert("d2", set(&["a"]));
        p.insert("d1", set(&["b"]));

        assert!(p.related("d2").is_empty());
        assert_eq!(p.by_entity["a"], set(&["d2"]));
        assert_eq!(p.by_entity["b"], set(&["d1"]));
    }
}
