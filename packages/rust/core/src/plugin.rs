//! Plugin contract.
//!
//! A plugin declares the topics it consumes and the services it registers,
//! is set up once per worker, and is then handed documents one at a time.

use std::sync::Arc;

use async_trait::async_trait;

use gransk_shared::{Document, ExtractorConfig, GranskConfig, PipelineSettings, Result, ToolsConfig};

use crate::injector::Injector;
use crate::payload::{Emit, Payload};
use crate::service::Service;
use crate::topic::Topic;

/// Everything a plugin may read during [`Subscriber::setup`].
#[derive(Clone)]
pub struct SetupContext {
    config: Arc<GranskConfig>,
    pub injector: Arc<Injector>,
}

impl SetupContext {
    /// Build a context whose injector shares `config`.
    pub fn new(config: GranskConfig) -> Self {
        let config = Arc::new(config);
        let injector = Arc::new(Injector::new(Arc::clone(&config)));
        Self { config, injector }
    }

    pub fn config(&self) -> &GranskConfig {
        &self.config
    }

    pub fn extractor(&self) -> &ExtractorConfig {
        &self.config.extractor
    }

    pub fn tools(&self) -> &ToolsConfig {
        &self.config.tools
    }

    pub fn pipeline(&self) -> &PipelineSettings {
        &self.config.pipeline
    }
}

/// A pipeline stage subscribed to one or more topics.
///
/// Plugins subscribed to the same topic run in registration order.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Name used in logs and failure reports.
    fn name(&self) -> &'static str;

    /// Topics this plugin consumes.
    fn consumes(&self) -> &'static [Topic];

    /// Services this plugin registers. Called once, after `setup`.
    fn services(&self) -> Vec<Arc<dyn Service>> {
        Vec::new()
    }

    /// One-time preparation before any document is consumed.
    async fn setup(&mut self, _ctx: &SetupContext) -> Result<()> {
        Ok(())
    }

    /// Cheap predicate deciding whether `consume` runs for `doc`.
    fn accept(&self, _doc: &Document) -> bool {
        true
    }

    /// Handle one document, optionally requesting follow-up work.
    async fn consume(&self, doc: &mut Document, payload: &mut Payload) -> Result<Vec<Emit>>;

    /// Release held resources.
    async fn stop(&self) {}
}
