//! Keeps a copy of every ingested original under `<data_root>/files`.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use gransk_core::{Emit, Payload, SetupContext, Subscriber, Topic};
use gransk_shared::{Document, GranskError, Result, resolve_under};

/// Writes the payload to `files/<ext>/<id16>-<file name>`.
#[derive(Debug, Default)]
pub struct StoreFile {
    files_dir: Option<PathBuf>,
}

impl StoreFile {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Lower-cased alphanumeric extension, `bin` when there is none.
fn extension_dir(file_name: &str) -> String {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "bin".to_string())
}

#[async_trait]
impl Subscriber for StoreFile {
    fn name(&self) -> &'static str {
        "store_file"
    }

    fn consumes(&self) -> &'static [Topic] {
        &[Topic::ProcessFile]
    }

    async fn setup(&mut self, ctx: &SetupContext) -> Result<()> {
        self.files_dir = Some(ctx.injector.files_dir());
        Ok(())
    }

    async fn consume(&self, doc: &mut Document, payload: &mut Payload) -> Result<Vec<Emit>> {
        let files_dir = self
            .files_dir
            .as_ref()
            .ok_or_else(|| GranskError::plugin(self.name(), "not set up"))?;

        let name = doc.file_name();
        let id = doc.id.as_str();
        let prefix = id.get(..16).unwrap_or(id);
        let dest = resolve_under(files_dir, &format!("{}/{prefix}-{name}", extension_dir(name)))?;
        let dir = dest.parent().unwrap_or(files_dir).to_path_buf();

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| GranskError::io(&dir, e))?;
        tokio::fs::write(&dest, payload.bytes())
            .await
            .map_err(|e| GranskError::io(&dest, e))?;

        debug!(doc_id = %doc.id.short(), path = %dest.display(), "stored original");
        doc.set_meta("store.path", dest.display().to_string());
        Ok(vec![])
    }
}
