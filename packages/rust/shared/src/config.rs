//! Application configuration for gransk.
//!
//! User config lives at `~/.gransk/gransk.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{GranskError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "gransk.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".gransk";

// ---------------------------------------------------------------------------
// Config structs (matching gransk.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GranskConfig {
    /// Root directory for stored originals, scratch files and service snapshots.
    #[serde(default = "default_data_root")]
    pub data_root: String,

    /// Identity of this worker; namespaces temporary files.
    #[serde(default)]
    pub worker_id: u32,

    /// Extraction service settings.
    #[serde(default)]
    pub extractor: ExtractorConfig,

    /// External PDF tools.
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Plugin chain and dispatch limits.
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

impl Default for GranskConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            worker_id: 0,
            extractor: ExtractorConfig::default(),
            tools: ToolsConfig::default(),
            pipeline: PipelineSettings::default(),
        }
    }
}

fn default_data_root() -> String {
    "~/.gransk/data".into()
}

/// `[extractor]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Base URL of the extraction service.
    #[serde(default = "default_extractor_url")]
    pub url: String,

    /// Request path for document submission.
    #[serde(default = "default_extractor_path")]
    pub path: String,

    /// Documents at or above this many bytes are not submitted.
    #[serde(default = "default_max_size")]
    pub max_size: u64,

    /// Optional OCR language hint (e.g. `eng`, `eng+nor`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_language: Option<String>,

    /// Rasterize PDFs that look like page scans before submission.
    #[serde(default = "default_true")]
    pub detect_scanned_pdf: bool,

    /// Request timeout in seconds.
    #[serde(default = "default_extractor_timeout")]
    pub timeout_secs: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            url: default_extractor_url(),
            path: default_extractor_path(),
            max_size: default_max_size(),
            ocr_language: None,
            detect_scanned_pdf: true,
            timeout_secs: default_extractor_timeout(),
        }
    }
}

fn default_extractor_url() -> String {
    "http://127.0.0.1:9998".into()
}
fn default_extractor_path() -> String {
    "/tika".into()
}
fn default_max_size() -> u64 {
    64 * 1024 * 1024
}
fn default_extractor_timeout() -> u64 {
    300
}
fn default_true() -> bool {
    true
}

/// `[tools]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Page-info tool binary.
    #[serde(default = "default_pdfinfo")]
    pub pdfinfo: String,

    /// Image-listing tool binary.
    #[serde(default = "default_pdfimages")]
    pub pdfimages: String,

    /// Rasterizer binary.
    #[serde(default = "default_ghostscript")]
    pub ghostscript: String,

    /// Upper bound for any single tool invocation.
    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            pdfinfo: default_pdfinfo(),
            pdfimages: default_pdfimages(),
            ghostscript: default_ghostscript(),
            timeout_secs: default_tool_timeout(),
        }
    }
}

fn default_pdfinfo() -> String {
    "pdfinfo".into()
}
fn default_pdfimages() -> String {
    "pdfimages".into()
}
fn default_ghostscript() -> String {
    "gs".into()
}
fn default_tool_timeout() -> u64 {
    120
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Plugin names, in registration order.
    #[serde(default = "default_plugins")]
    pub plugins: Vec<String>,

    /// Maximum nesting of forwards and child documents.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Maximum number of entries unpacked from one archive.
    #[serde(default = "default_max_archive_entries")]
    pub max_archive_entries: usize,

    /// Maximum decompressed bytes read from one archive.
    #[serde(default = "default_max_archive_bytes")]
    pub max_archive_bytes: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            plugins: default_plugins(),
            max_depth: default_max_depth(),
            max_archive_entries: default_max_archive_entries(),
            max_archive_bytes: default_max_archive_bytes(),
        }
    }
}

fn default_plugins() -> Vec<String> {
    [
        "store_file",
        "file_meta",
        "plain_text",
        "archive",
        "tika_extractor",
        "entities",
        "related_entities",
        "related_documents",
        "entity_network",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_max_depth() -> usize {
    16
}
fn default_max_archive_entries() -> usize {
    10_000
}
fn default_max_archive_bytes() -> u64 {
    256 * 1024 * 1024
}

impl GranskConfig {
    /// Data root with a leading `~` expanded to the home directory.
    pub fn data_root(&self) -> PathBuf {
        expand_home(&self.data_root)
    }

    /// Directory holding stored originals and scratch files.
    pub fn files_dir(&self) -> PathBuf {
        self.data_root().join("files")
    }

    /// Scratch directory for temporary artifacts.
    pub fn tmp_dir(&self) -> PathBuf {
        self.files_dir().join(".tmp")
    }

    /// Path of the snapshot database used by persistable services.
    pub fn snapshot_db_path(&self) -> PathBuf {
        self.data_root().join("gransk.db")
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<()> {
        if self.data_root.trim().is_empty() {
            return Err(GranskError::config("data_root must not be empty"));
        }

        let url = Url::parse(&self.extractor.url).map_err(|e| {
            GranskError::config(format!("extractor.url {:?}: {e}", self.extractor.url))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(GranskError::config(format!(
                "extractor.url must be http or https, got {}",
                url.scheme()
            )));
        }

        if !self.extractor.path.starts_with('/') {
            return Err(GranskError::config("extractor.path must start with '/'"));
        }

        if self.pipeline.max_depth == 0 {
            return Err(GranskError::config("pipeline.max_depth must be at least 1"));
        }

        Ok(())
    }
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.gransk/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| GranskError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.gransk/gransk.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<GranskConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(GranskConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<GranskConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| GranskError::io(path, e))?;

    let config: GranskConfig = toml::from_str(&content).map_err(|e| {
        GranskError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| GranskError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = GranskConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| GranskError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| GranskError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
