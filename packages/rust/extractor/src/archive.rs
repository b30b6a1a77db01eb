//! Unpacks tar, tar.gz and single-file gzip payloads into child documents.

use std::io::Read;

use async_trait::async_trait;
use flate2::read::GzDecoder;
use tracing::{debug, warn};

use gransk_core::{Emit, Payload, SetupContext, Subscriber, Topic};
use gransk_shared::{Document, GranskError, PipelineSettings, Result};

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
const TAR_BLOCK: usize = 512;

/// Every regular file in the archive becomes a child tagged `archive`.
#[derive(Debug)]
pub struct ArchiveUnpacker {
    max_entries: usize,
    max_bytes: u64,
}

impl ArchiveUnpacker {
    pub fn new() -> Self {
        let settings = PipelineSettings::default();
        Self {
            max_entries: settings.max_archive_entries,
            max_bytes: settings.max_archive_bytes,
        }
    }

    fn read_entries<R: Read>(&self, reader: R) -> Result<Unpacked> {
        let mut archive = tar::Archive::new(reader);
        let mut unpacked = Unpacked::default();
        let mut remaining = self.max_bytes;

        let iter = archive
            .entries()
            .map_err(|e| GranskError::parse(format!("tar: {e}")))?;
        for entry in iter {
            let mut entry = entry.map_err(|e| GranskError::parse(format!("tar entry: {e}")))?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            if unpacked.entries.len() >= self.max_entries || entry.size() > remaining {
                unpacked.truncated = true;
                break;
            }

            let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
            let mut data = Vec::new();
            (&mut entry)
                .take(remaining)
                .read_to_end(&mut data)
                .map_err(|e| GranskError::parse(format!("tar entry {name:?}: {e}")))?;
            remaining -= data.len() as u64;
            unpacked.entries.push((name, data));
        }

        Ok(unpacked)
    }

    /// A gzip stream that is not a tar holds one file, named after the
    /// payload without its `.gz` suffix.
    fn read_member<R: Read>(&self, reader: R, file_name: &str) -> Result<Unpacked> {
        let mut data = Vec::new();
        reader
            .take(self.max_bytes.saturating_add(1))
            .read_to_end(&mut data)
            .map_err(|e| GranskError::parse(format!("gzip: {e}")))?;

        if data.len() as u64 > self.max_bytes {
            return Ok(Unpacked {
                entries: Vec::new(),
                truncated: true,
            });
        }

        let name = file_name
            .strip_suffix(".gz")
            .filter(|stem| !stem.is_empty())
            .unwrap_or("decompressed");
        Ok(Unpacked {
            entries: vec![(name.to_string(), data)],
            truncated: false,
        })
    }
}

impl Default for ArchiveUnpacker {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
struct Unpacked {
    entries: Vec<(String, Vec<u8>)>,
    truncated: bool,
}

fn is_tar_header(block: &[u8]) -> bool {
    block.get(257..262) == Some(b"ustar".as_slice())
}

#[async_trait]
impl Subscriber for ArchiveUnpacker {
    fn name(&self) -> &'static str {
        "archive"
    }

    fn consumes(&self) -> &'static [Topic] {
        &[Topic::Archive]
    }

    async fn setup(&mut self, ctx: &SetupContext) -> Result<()> {
        self.max_entries = ctx.pipeline().max_archive_entries;
        self.max_bytes = ctx.pipeline().max_archive_bytes;
        Ok(())
    }

    async fn consume(&self, doc: &mut Document, payload: &mut Payload) -> Result<Vec<Emit>> {
        let bytes = payload.bytes();
        let unpacked = if bytes.starts_with(&GZIP_MAGIC) {
            let mut decoder = GzDecoder::new(bytes);
            let mut head = Vec::with_capacity(TAR_BLOCK);
            (&mut decoder)
                .take(TAR_BLOCK as u64)
                .read_to_end(&mut head)
                .map_err(|e| GranskError::parse(format!("gzip: {e}")))?;

            let stream = head.as_slice().chain(decoder);
            if is_tar_header(&head) {
                self.read_entries(stream)?
            } else {
                self.read_member(stream, doc.file_name())?
            }
        } else {
            self.read_entries(bytes)?
        };

        let mut emits = Vec::with_capacity(unpacked.entries.len() + 1);
        if unpacked.truncated {
            warn!(
                doc_id = %doc.id.short(),
                max_entries = self.max_entries,
                max_bytes = self.max_bytes,
                "archive truncated"
            );
            doc.set_meta("archive.truncated", true);
        }

        let mut children = 0usize;
        for (name, data) in unpacked.entries {
            match Document::get_document(&name, Some(&*doc), true) {
                Ok(child) => {
                    emits.push(Emit::child(child.with_tag("archive"), Payload::new(data)));
                    children += 1;
                }
                Err(e) => {
                    warn!(entry = %name, error = %e, "skipping archive entry");
                    emits.push(Emit::Failed(format!("skipped archive entry {name:?}: {e}")));
                }
            }
        }

        debug!(doc_id = %doc.id.short(), children, "archive unpacked");
        doc.set_meta("archive.entries", children);
        Ok(emits)
    }
}
