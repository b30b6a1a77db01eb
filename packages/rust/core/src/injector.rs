//! Shared resources handed to plugins and services.
//!
//! The [`Injector`] owns everything a plugin must not build for itself: the
//! pooled HTTP client for the extraction service, the snapshot database and
//! the worker's scratch area. One instance exists per worker.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use reqwest::Client;
use tokio::sync::OnceCell;
use url::Url;

use gransk_shared::{GranskConfig, GranskError, Result};
use gransk_storage::Storage;

/// User-Agent string for extraction requests.
const USER_AGENT: &str = concat!("gransk/", env!("CARGO_PKG_VERSION"));

/// Per-worker resource provider.
pub struct Injector {
    config: Arc<GranskConfig>,
    client: OnceLock<Client>,
    storage: OnceCell<Arc<Storage>>,
}

impl Injector {
    pub fn new(config: Arc<GranskConfig>) -> Self {
        Self {
            config,
            client: OnceLock::new(),
            storage: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &GranskConfig {
        &self.config
    }

    /// Stable identity of this worker.
    pub fn worker_id(&self) -> u32 {
        self.config.worker_id
    }

    /// Scratch directory for temporary artifacts (`<data_root>/files/.tmp`).
    pub fn temp_dir(&self) -> PathBuf {
        self.config.tmp_dir()
    }

    /// Root of all files owned by the pipeline (`<data_root>/files`).
    pub fn files_dir(&self) -> PathBuf {
        self.config.files_dir()
    }

    /// Connection to the configured extraction service.
    ///
    /// The underlying client is built on first use and shared afterwards.
    pub fn get_http_connection(&self) -> Result<ExtractorConnection> {
        let endpoint = extractor_endpoint(&self.config)?;

        let client = match self.client.get() {
            Some(client) => client.clone(),
            None => {
                let built = Client::builder()
                    .user_agent(USER_AGENT)
                    .timeout(Duration::from_secs(self.config.extractor.timeout_secs))
                    .build()
                    .map_err(|e| {
                        GranskError::Network(format!("failed to build HTTP client: {e}"))
                    })?;
                self.client.get_or_init(|| built).clone()
            }
        };

        Ok(ExtractorConnection { client, endpoint })
    }

    /// Snapshot database at `<data_root>/gransk.db`, opened on first use.
    pub async fn snapshot_store(&self) -> Result<Arc<Storage>> {
        let storage = self
            .storage
            .get_or_try_init(|| async {
                let path = self.config.snapshot_db_path();
                tracing::debug!(?path, "opening snapshot store");
                Storage::open(&path).await.map(Arc::new)
            })
            .await?;
        Ok(Arc::clone(storage))
    }
}

fn extractor_endpoint(config: &GranskConfig) -> Result<Url> {
    let raw = format!(
        "{}{}",
        config.extractor.url.trim_end_matches('/'),
        config.extractor.path
    );
    Url::parse(&raw).map_err(|e| GranskError::config(format!("extractor endpoint {raw:?}: {e}")))
}

// ---------------------------------------------------------------------------
// ExtractorConnection
// ---------------------------------------------------------------------------

/// Handle to the extraction service endpoint.
#[derive(Debug, Clone)]
pub struct ExtractorConnection {
    client: Client,
    endpoint: Url,
}

impl ExtractorConnection {
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Start a PUT request against the endpoint.
    pub fn put(&self) -> reqwest::RequestBuilder {
        self.client.put(self.endpoint.clone())
    }
}
