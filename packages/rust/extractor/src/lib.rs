//! File-level plugins: metadata detection, storage of originals, text
//! extraction and archive unpacking.
//!
//! This crate provides:
//! - [`FileMeta`]: size, content type and routing for every new document
//! - [`StoreFile`]: keeps originals under the data root
//! - [`PlainText`] and [`TikaExtractor`]: produce `Document::text`
//! - [`ArchiveUnpacker`]: turns tar and tar.gz entries into child documents
//! - [`scanned`]: the scanned-PDF heuristic and [`tools`] it relies on

pub mod archive;
pub mod file_meta;
pub mod plain_text;
pub mod scanned;
pub mod store;
pub mod tika;
pub mod tools;

pub use archive::ArchiveUnpacker;
pub use file_meta::{FileMeta, detect_content_type};
pub use plain_text::PlainText;
pub use scanned::{NotScanned, Verdict};
pub use store::StoreFile;
pub use tika::TikaExtractor;
pub use tools::PdfTools;
