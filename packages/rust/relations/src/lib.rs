//! Entity detection and the relation services built on it.
//!
//! [`EntityDetector`] fills `Document::entities` on `process_text`. The three
//! index services learn from finished documents and answer queries through
//! the [`gransk_core::Service`] interface:
//!
//! - [`RelatedEntities`]: `get_related_to(entity_id)`
//! - [`RelatedDocuments`]: `get_related_to(doc_id)`
//! - [`EntityNetwork`]: `get_for(entity_id, hops)`
//!
//! State survives restarts through JSON snapshots in the injector's store.

pub mod entities;
pub mod entity_network;
pub mod graph;
pub mod index;
pub mod related_documents;
pub mod related_entities;
pub mod snapshot;

use std::sync::Arc;

pub use entities::{EntityDetector, detect_entities};
pub use entity_network::EntityNetwork;
pub use graph::CoOccurrence;
pub use index::{DocumentIndex, IndexPlugin};
pub use related_documents::RelatedDocuments;
pub use related_entities::RelatedEntities;

pub fn related_entities_plugin() -> IndexPlugin<RelatedEntities> {
    IndexPlugin::new(related_entities::NAME, Arc::new(RelatedEntities::new()))
}

pub fn related_documents_plugin() -> IndexPlugin<RelatedDocuments> {
    IndexPlugin::new(related_documents::NAME, Arc::new(RelatedDocuments::new()))
}

pub fn entity_network_plugin() -> IndexPlugin<EntityNetwork> {
    IndexPlugin::new(entity_network::NAME, Arc::new(EntityNetwork::new()))
}
