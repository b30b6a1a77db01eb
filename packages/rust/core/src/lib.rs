//! Core document pipeline for gransk.
//!
//! This crate holds the plugin contract, the topic dispatcher, the service
//! registry and the [`Injector`] that hands shared resources to plugins.
//! Concrete plugins live in `gransk-extractor` and `gransk-relations`.

pub mod injector;
pub mod payload;
pub mod pipeline;
pub mod plugin;
pub mod service;
pub mod topic;

pub use injector::{ExtractorConnection, Injector};
pub use payload::{Emit, Payload};
pub use pipeline::{DispatchFailure, DispatchReport, Pipeline};
pub use plugin::{SetupContext, Subscriber};
pub use service::{Network, NetworkLink, NetworkNode, Related, Service, ServiceRegistry};
pub use topic::Topic;
