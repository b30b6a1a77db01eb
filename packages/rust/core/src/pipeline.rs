//! Topic dispatcher: document → subscribers → emissions → children.
//!
//! Each ingested document runs through two phases, its entry topic
//! (normally [`Topic::ProcessFile`]) and then [`Topic::FinishDocument`].
//! Emissions are handled depth-first, right after the plugin that produced
//! them and before the next plugin on the same topic.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tracing::{debug, info, instrument, trace, warn};

use gransk_shared::{Document, GranskError, Result};

use crate::injector::Injector;
use crate::payload::{Emit, Payload};
use crate::plugin::{SetupContext, Subscriber};
use crate::service::{Service, ServiceRegistry};
use crate::topic::Topic;

type DispatchFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

// ---------------------------------------------------------------------------
// DispatchReport
// ---------------------------------------------------------------------------

/// A plugin error recorded while processing a document tree.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchFailure {
    pub doc_id: String,
    pub path: String,
    pub plugin: String,
    pub message: String,
}

/// Outcome of one [`Pipeline::add_file`] call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    /// Documents ingested, the root included.
    pub documents: usize,
    pub failures: Vec<DispatchFailure>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, doc: &Document, plugin: &str, message: String) {
        self.failures.push(DispatchFailure {
            doc_id: doc.id.to_string(),
            path: doc.path.clone(),
            plugin: plugin.to_string(),
            message,
        });
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// A set-up plugin chain with its routing table and services.
pub struct Pipeline {
    injector: Arc<Injector>,
    plugins: Vec<Box<dyn Subscriber>>,
    routes: HashMap<Topic, Vec<usize>>,
    services: ServiceRegistry,
    max_depth: usize,
    stopped: AtomicBool,
}

impl Pipeline {
    /// Set up `plugins` in order, register their services and build the
    /// topic table.
    #[instrument(skip_all, fields(plugins = plugins.len()))]
    pub async fn build(ctx: &SetupContext, mut plugins: Vec<Box<dyn Subscriber>>) -> Result<Self> {
        let mut services = ServiceRegistry::new();
        let mut routes: HashMap<Topic, Vec<usize>> = HashMap::new();

        for (idx, plugin) in plugins.iter_mut().enumerate() {
            plugin
                .setup(ctx)
                .await
                .map_err(|e| GranskError::plugin(plugin.name(), format!("setup: {e}")))?;

            for service in plugin.services() {
                services.register(service)?;
            }
            for topic in plugin.consumes() {
                routes.entry(*topic).or_default().push(idx);
            }
            debug!(plugin = plugin.name(), topics = ?plugin.consumes(), "registered plugin");
        }

        info!(
            plugins = plugins.len(),
            services = services.iter().count(),
            "pipeline ready"
        );

        Ok(Self {
            injector: Arc::clone(&ctx.injector),
            plugins,
            routes,
            services,
            max_depth: ctx.pipeline().max_depth,
            stopped: AtomicBool::new(false),
        })
    }

    pub fn injector(&self) -> &Arc<Injector> {
        &self.injector
    }

    /// Names of the set-up plugins, in registration order.
    pub fn plugin_names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// Ingest `doc` and everything derived from it.
    ///
    /// Plugin errors do not abort ingestion; they are collected in the
    /// returned report.
    #[instrument(skip_all, fields(doc_id = %doc.id.short(), path = %doc.path))]
    pub async fn add_file(&self, doc: &mut Document, payload: Payload) -> Result<DispatchReport> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(GranskError::Stopped);
        }

        let mut payload = payload;
        let mut report = DispatchReport::default();
        self.ingest(doc, &mut payload, Topic::ProcessFile, 0, &mut report)
            .await;

        info!(
            documents = report.documents,
            failures = report.failures.len(),
            "document tree processed"
        );
        Ok(report)
    }

    fn ingest<'a>(
        &'a self,
        doc: &'a mut Document,
        payload: &'a mut Payload,
        topic: Topic,
        depth: usize,
        report: &'a mut DispatchReport,
    ) -> DispatchFuture<'a> {
        Box::pin(async move {
            report.documents += 1;
            self.dispatch(topic, doc, payload, depth, report).await;
            self.dispatch(Topic::FinishDocument, doc, payload, depth, report)
                .await;
        })
    }

    fn dispatch<'a>(
        &'a self,
        topic: Topic,
        doc: &'a mut Document,
        payload: &'a mut Payload,
        depth: usize,
        report: &'a mut DispatchReport,
    ) -> DispatchFuture<'a> {
        Box::pin(async move {
            let Some(indices) = self.routes.get(&topic) else {
                trace!(%topic, "no subscribers");
                return;
            };

            for &idx in indices {
                let plugin = &self.plugins[idx];
                if !plugin.accept(doc) {
                    trace!(plugin = plugin.name(), %topic, "not accepted");
                    continue;
                }

                let emits = match plugin.consume(doc, payload).await {
                    Ok(emits) => emits,
                    Err(e) => {
                        warn!(
                            plugin = plugin.name(),
                            %topic,
                            doc_id = %doc.id.short(),
                            error = %e,
                            "plugin failed"
                        );
                        report.record(doc, plugin.name(), e.to_string());
                        continue;
                    }
                };

                for emit in emits {
                    if let Emit::Failed(message) = emit {
                        warn!(
                            plugin = plugin.name(),
                            doc_id = %doc.id.short(),
                            %message,
                            "plugin reported a problem"
                        );
                        report.record(doc, plugin.name(), message);
                        continue;
                    }
                    if depth >= self.max_depth {
                        warn!(plugin = plugin.name(), depth, "dispatch depth limit reached");
                        report.record(
                            doc,
                            plugin.name(),
                            format!("dispatch depth limit {} reached", self.max_depth),
                        );
                        continue;
                    }

                    match emit {
                        Emit::Forward(next) => {
                            self.dispatch(next, doc, payload, depth + 1, report).await;
                        }
                        Emit::Child {
                            doc: mut child,
                            payload: mut child_payload,
                            topic: next,
                        } => {
                            self.ingest(&mut child, &mut child_payload, next, depth + 1, report)
                                .await;
                        }
                        Emit::Failed(_) => {}
                    }
                }
            }
        })
    }

    // -----------------------------------------------------------------------
    // Services
    // -----------------------------------------------------------------------

    /// Look up a registered service. `None` is a normal outcome.
    pub fn get_service(&self, name: &str) -> Option<Arc<dyn Service>> {
        self.services.get(name)
    }

    /// Hydrate every service from its snapshot.
    pub async fn load_all(&self) -> Result<()> {
        for service in self.services.iter() {
            service.load_all(&self.injector).await?;
            debug!(service = service.name(), "service loaded");
        }
        Ok(())
    }

    /// Persist every service.
    pub async fn save_all(&self) -> Result<()> {
        for service in self.services.iter() {
            service.save_all(&self.injector).await?;
            debug!(service = service.name(), "service saved");
        }
        Ok(())
    }

    /// Clear every service and remove all files owned by the pipeline.
    #[instrument(skip_all)]
    pub async fn clear_all(&self) -> Result<()> {
        for service in self.services.iter() {
            service.clear(&self.injector).await?;
        }

        let files = self.injector.files_dir();
        match tokio::fs::remove_dir_all(&files).await {
            Ok(()) => info!(path = %files.display(), "removed stored files"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(GranskError::io(files, e)),
        }
        Ok(())
    }

    /// Stop every plugin once. Later calls are no-ops.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        for plugin in &self.plugins {
            plugin.stop().await;
        }
        info!("pipeline stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}
