//! Queryable state built up by plugins as documents flow.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use gransk_shared::{GranskError, Result};

use crate::injector::Injector;

// ---------------------------------------------------------------------------
// Query results
// ---------------------------------------------------------------------------

/// One related item with its relation strength.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Related {
    pub id: String,
    pub weight: u64,
}

/// A node of an entity network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkNode {
    pub id: String,
    /// Distance in hops from the queried entity.
    pub hops: usize,
}

/// An undirected, weighted edge between two network nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkLink {
    pub source: String,
    pub target: String,
    pub weight: u64,
}

/// Neighbourhood of an entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub nodes: Vec<NetworkNode>,
    pub links: Vec<NetworkLink>,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A named, stateful service registered by a plugin.
///
/// State lives in memory and is only persisted by an explicit
/// [`save_all`](Service::save_all). There is no implicit checkpointing, so
/// anything recorded after the last save is lost if the process dies.
#[async_trait]
pub trait Service: Send + Sync {
    /// Registry key.
    fn name(&self) -> &str;

    /// Hydrate in-memory state from the last snapshot, if any.
    async fn load_all(&self, _injector: &Injector) -> Result<()> {
        Ok(())
    }

    /// Persist in-memory state.
    async fn save_all(&self, _injector: &Injector) -> Result<()> {
        Ok(())
    }

    /// Drop in-memory state and any persisted snapshot.
    async fn clear(&self, injector: &Injector) -> Result<()>;

    /// Items related to `id`, strongest first.
    fn get_related_to(&self, _id: &str) -> Result<Vec<Related>> {
        Err(GranskError::unsupported(self.name(), "get_related_to"))
    }

    /// Network around `id` up to `hops` steps away.
    fn get_for(&self, _id: &str, _hops: usize) -> Result<Network> {
        Err(GranskError::unsupported(self.name(), "get_for"))
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Services in registration order, looked up by name.
#[derive(Default)]
pub struct ServiceRegistry {
    services: Vec<Arc<dyn Service>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a service. Two services with the same name are a configuration error.
    pub fn register(&mut self, service: Arc<dyn Service>) -> Result<()> {
        if self.get(service.name()).is_some() {
            return Err(GranskError::config(format!(
                "service {:?} registered twice",
                service.name()
            )));
        }
        self.services.push(service);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Service>> {
        self.services
            .iter()
            .find(|s| s.name() == name)
            .map(Arc::clone)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Service>> {
        self.services.iter()
    }
}
