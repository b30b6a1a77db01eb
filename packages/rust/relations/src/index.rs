//! Plugin adapter feeding finished documents into an index service.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use gransk_core::{Emit, Payload, Service, Subscriber, Topic};
use gransk_shared::{Document, Result};

/// A service that learns from each finished document.
pub trait DocumentIndex: Service + 'static {
    fn index(&self, doc: &Document);
}

/// Subscribes an index to [`Topic::FinishDocument`] and registers it as a
/// service under the same name.
pub struct IndexPlugin<S> {
    name: &'static str,
    service: Arc<S>,
}

impl<S: DocumentIndex> IndexPlugin<S> {
    pub fn new(name: &'static str, service: Arc<S>) -> Self {
        Self { name, service }
    }
}

#[async_trait]
impl<S: DocumentIndex> Subscriber for IndexPlugin<S> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn consumes(&self) -> &'static [Topic] {
        &[Topic::FinishDocument]
    }

    fn services(&self) -> Vec<Arc<dyn Service>> {
        vec![Arc::clone(&self.service) as Arc<dyn Service>]
    }

    async fn consume(&self, doc: &mut Document, _payload: &mut Payload) -> Result<Vec<Emit>> {
        self.service.index(doc);
        Ok(vec![])
    }
}

/// `RwLock` that keeps serving its data after a panicking writer.
#[derive(Debug, Default)]
pub(crate) struct State<T>(RwLock<T>);

impl<T> State<T> {
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, T> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}
