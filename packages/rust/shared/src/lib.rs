//! Shared types, error model, and configuration for gransk.
//!
//! This crate is the foundation depended on by all other gransk crates.
//! It provides:
//! - [`GranskError`]: the unified error type
//! - The document model ([`Document`], [`DocId`], [`MetaValue`], [`Entity`])
//!   and path sanitization ([`secure_path`], [`resolve_under`])
//! - Configuration ([`GranskConfig`], config loading)

pub mod config;
pub mod document;
pub mod error;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    ExtractorConfig, GranskConfig, PipelineSettings, ToolsConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from,
};
pub use document::{DocId, Document, Entity, MetaValue, resolve_under, secure_path};
pub use error::{GranskError, Result};
