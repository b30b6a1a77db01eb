//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use gransk_core::{DispatchReport, Payload, Pipeline, SetupContext};
use gransk_shared::{Document, GranskConfig, init_config, load_config, load_config_from};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::catalog;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// gransk: extract text and relations from document collections.
#[derive(Parser)]
#[command(
    name = "gransk",
    version,
    about = "Extract text, entities and relations from files.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.gransk/gransk.toml).
    #[arg(long, global = true, env = "GRANSK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// What `related` looks up.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum RelatedKind {
    Document,
    Entity,
}

impl RelatedKind {
    fn service(self) -> &'static str {
        match self {
            Self::Document => "related_documents",
            Self::Entity => "related_entities",
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run files (or directories, recursively) through the pipeline.
    Ingest {
        /// Files or directories to ingest.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Tag recorded on every ingested document.
        #[arg(long, default_value = "upload")]
        tag: String,
    },

    /// Documents or entities related to an id.
    Related {
        #[arg(long, value_enum)]
        kind: RelatedKind,

        /// Document id or entity id (e.g. `email:someone@example.org`).
        id: String,
    },

    /// Entity network around an entity.
    Network {
        entity_id: String,

        /// Breadth of the neighbourhood.
        #[arg(long, default_value = "1")]
        hops: usize,
    },

    /// Forget every service's state and remove stored files.
    Clear,

    /// Show configured plugins and saved service snapshots.
    Status,

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "gransk=info",
        1 => "gransk=debug",
        _ => "gransk=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Application context
// ---------------------------------------------------------------------------

/// Loaded config and the pipeline built from it, once per invocation.
pub(crate) struct AppContext {
    pub config: GranskConfig,
    pub pipeline: Pipeline,
}

impl AppContext {
    /// Build the configured plugin chain and hydrate its services.
    pub(crate) async fn open(config: GranskConfig) -> Result<Self> {
        let plugins = catalog::create_all(&config.pipeline.plugins)?;
        let ctx = SetupContext::new(config.clone());
        let pipeline = Pipeline::build(&ctx, plugins).await?;
        pipeline.load_all().await?;
        info!(
            worker = config.worker_id,
            plugins = pipeline.plugin_names().len(),
            "services loaded"
        );
        Ok(Self { config, pipeline })
    }

    async fn close(self) {
        self.pipeline.stop().await;
    }
}

fn resolve_config(path: Option<&Path>) -> Result<GranskConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    if let Command::Config { action } = &cli.command {
        return match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(cli.config.as_deref()),
        };
    }

    let app = AppContext::open(resolve_config(cli.config.as_deref())?).await?;
    let result = match cli.command {
        Command::Ingest { paths, tag } => cmd_ingest(&app, &paths, &tag).await,
        Command::Related { kind, id } => cmd_related(&app, kind, &id),
        Command::Network { entity_id, hops } => cmd_network(&app, &entity_id, hops),
        Command::Clear => cmd_clear(&app).await,
        Command::Status => cmd_status(&app).await,
        Command::Config { .. } => Ok(()),
    };
    app.close().await;
    result
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_ingest(app: &AppContext, paths: &[PathBuf], tag: &str) -> Result<()> {
    let files = collect_files(paths)?;
    let root = Document::get_document("root", None, false)?;

    info!(files = files.len(), tag, "ingesting");
    let spinner = spinner();
    let mut total = DispatchReport::default();

    for (i, file) in files.iter().enumerate() {
        let name = file.to_string_lossy();
        spinner.set_message(format!("[{}/{}] {name}", i + 1, files.len()));

        let bytes = match tokio::fs::read(file).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %file.display(), error = %e, "skipping unreadable file");
                continue;
            }
        };
        let mut doc = match Document::get_document(&name, Some(&root), true) {
            Ok(doc) => doc.with_tag(tag),
            Err(e) => {
                warn!(path = %file.display(), error = %e, "skipping file");
                continue;
            }
        };

        let report = app.pipeline.add_file(&mut doc, Payload::new(bytes)).await?;
        total.documents += report.documents;
        total.failures.extend(report.failures);
    }

    spinner.set_message("Saving services");
    app.pipeline.save_all().await?;
    spinner.finish_and_clear();

    println!();
    println!("  Ingest finished");
    println!("  Files:     {}", files.len());
    println!("  Documents: {}", total.documents);
    println!("  Failures:  {}", total.failures.len());
    for failure in &total.failures {
        println!("    {} [{}] {}", failure.path, failure.plugin, failure.message);
    }
    println!("  Data root: {}", app.config.data_root().display());
    println!();

    Ok(())
}

fn cmd_related(app: &AppContext, kind: RelatedKind, id: &str) -> Result<()> {
    let Some(service) = app.pipeline.get_service(kind.service()) else {
        return print_missing_service();
    };
    let related = service.get_related_to(id)?;
    println!("{}", serde_json::to_string_pretty(&related)?);
    Ok(())
}

fn cmd_network(app: &AppContext, entity_id: &str, hops: usize) -> Result<()> {
    let Some(service) = app.pipeline.get_service("entity_network") else {
        return print_missing_service();
    };
    let network = service.get_for(entity_id, hops)?;
    println!("{}", serde_json::to_string_pretty(&network)?);
    Ok(())
}

fn print_missing_service() -> Result<()> {
    println!("{}", serde_json::json!({ "error": "service not found" }));
    Ok(())
}

async fn cmd_clear(app: &AppContext) -> Result<()> {
    app.pipeline.clear_all().await?;
    println!("Cleared {}", app.config.data_root().display());
    Ok(())
}

async fn cmd_status(app: &AppContext) -> Result<()> {
    let snapshots = app
        .pipeline
        .injector()
        .snapshot_store()
        .await?
        .list_snapshots()
        .await?;

    println!();
    println!("  Data root: {}", app.config.data_root().display());
    println!("  Plugins:   {}", app.pipeline.plugin_names().join(", "));
    println!("  Snapshots: {}", snapshots.len());
    for snapshot in &snapshots {
        println!("    {:<20} saved {}", snapshot.service, snapshot.saved_at);
    }
    println!();
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Expand directories into the files below them, sorted per directory.
fn collect_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending: Vec<PathBuf> = paths.iter().rev().cloned().collect();

    while let Some(path) = pending.pop() {
        let meta = std::fs::metadata(&path)
            .map_err(|e| eyre!("cannot read '{}': {e}", path.display()))?;
        if meta.is_dir() {
            let mut children = std::fs::read_dir(&path)?
                .map(|entry| entry.map(|e| e.path()))
                .collect::<std::io::Result<Vec<_>>>()?;
            children.sort();
            pending.extend(children.into_iter().rev());
        } else if meta.is_file() {
            files.push(path);
        }
    }
    Ok(files)
}

fn spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        spinner.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
    }
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner
}
