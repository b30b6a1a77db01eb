//! Text extraction through an Apache Tika compatible service.
//!
//! The payload is PUT to the configured endpoint and the response body
//! becomes the document text. PDFs that look like page scans are first
//! rasterized to TIFF so the service runs OCR on them instead of returning
//! an empty text layer.

use std::sync::Arc;

use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use tracing::{debug, error, info, instrument, warn};

use gransk_core::{Emit, Injector, Payload, SetupContext, Subscriber, Topic};
use gransk_shared::{Document, ExtractorConfig, GranskError, Result};

use crate::file_meta::OCTET_STREAM;
use crate::scanned::{self, Verdict};
use crate::tools::{PdfTools, ScratchFile};

const PDF: &str = "application/pdf";
const TIFF: &str = "image/tiff";

/// Characters left unescaped in the attachment filename.
const FILENAME: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b'/');

/// Plugin sending documents to the extraction service.
pub struct TikaExtractor {
    max_size: u64,
    ocr_language: Option<String>,
    detect_scanned_pdf: bool,
    tools: Option<PdfTools>,
    injector: Option<Arc<Injector>>,
}

impl TikaExtractor {
    pub fn new() -> Self {
        let defaults = ExtractorConfig::default();
        Self {
            max_size: defaults.max_size,
            ocr_language: defaults.ocr_language,
            detect_scanned_pdf: defaults.detect_scanned_pdf,
            tools: None,
            injector: None,
        }
    }

    fn injector(&self) -> Result<&Arc<Injector>> {
        self.injector
            .as_ref()
            .ok_or_else(|| GranskError::plugin(self.name(), "not set up"))
    }

    /// Rasterize `bytes` when they form a scanned PDF.
    ///
    /// Every failure along the way leaves the original payload in use.
    async fn rasterize_if_scanned(
        &self,
        injector: &Injector,
        doc: &Document,
        bytes: &[u8],
    ) -> Option<Vec<u8>> {
        let tools = self.tools.as_ref()?;
        let tmp_root = injector.temp_dir();
        if let Err(e) = tokio::fs::create_dir_all(&tmp_root).await {
            warn!(path = %tmp_root.display(), error = %e, "cannot create scratch dir");
            return None;
        }

        let pdf = ScratchFile::new(tmp_root.join(format!(
            "{}-{}.pdf",
            injector.worker_id(),
            doc.id.short()
        )));
        if let Err(e) = tokio::fs::write(pdf.path(), bytes).await {
            warn!(path = %pdf.path().display(), error = %e, "cannot write scratch pdf");
            return None;
        }

        match scanned::detect(tools, pdf.path()).await {
            Verdict::Scanned => {}
            Verdict::NotScanned(reason) => {
                debug!(doc_id = %doc.id.short(), %reason, "keeping pdf as is");
                return None;
            }
        }

        let tiff = ScratchFile::new(pdf.path().with_extension("pdf.tiff"));
        let converted = tools.rasterize(pdf.path(), tiff.path()).await;
        if converted.is_some() {
            info!(doc_id = %doc.id.short(), "rasterized scanned pdf");
        }
        converted
    }
}

impl Default for TikaExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Subscriber for TikaExtractor {
    fn name(&self) -> &'static str {
        "tika_extractor"
    }

    fn consumes(&self) -> &'static [Topic] {
        &[Topic::ExternalExtractor]
    }

    async fn setup(&mut self, ctx: &SetupContext) -> Result<()> {
        let extractor = ctx.extractor();
        self.max_size = extractor.max_size;
        self.ocr_language = extractor.ocr_language.clone();
        self.detect_scanned_pdf = extractor.detect_scanned_pdf;
        self.tools = Some(PdfTools::from_config(ctx.tools()));
        self.injector = Some(Arc::clone(&ctx.injector));
        Ok(())
    }

    /// Only documents with a recorded size below the limit.
    fn accept(&self, doc: &Document) -> bool {
        match doc.meta_i64("size") {
            Some(size) => u64::try_from(size).is_ok_and(|s| s < self.max_size),
            None => false,
        }
    }

    #[instrument(skip_all, fields(doc_id = %doc.id.short(), path = %doc.path))]
    async fn consume(&self, doc: &mut Document, payload: &mut Payload) -> Result<Vec<Emit>> {
        let injector = self.injector()?;

        let mut filename = doc.file_name().to_string();
        let mut content_type = payload
            .content_type()
            .or_else(|| doc.meta_str("content_type"))
            .unwrap_or(OCTET_STREAM)
            .to_string();
        doc.size = payload.len() as u64;

        if content_type == PDF && self.detect_scanned_pdf {
            if let Some(tiff) = self.rasterize_if_scanned(injector, doc, payload.bytes()).await {
                payload.replace(tiff, TIFF);
                filename = format!("{filename}.tiff");
                content_type = TIFF.to_string();
                doc.size = payload.len() as u64;
                doc.set_meta("extractor.scanned", true);
            }
        }

        let connection = injector.get_http_connection()?;
        let mut request = connection
            .put()
            .header(
                CONTENT_DISPOSITION,
                format!(
                    "attachment; filename={}",
                    utf8_percent_encode(&filename, FILENAME)
                ),
            )
            .header(CONTENT_TYPE, content_type.as_str())
            .body(payload.bytes().to_vec());
        if let Some(lang) = &self.ocr_language {
            request = request.header("X-Tika-OCRLanguage", lang.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| GranskError::Network(format!("{}: {e}", connection.endpoint())))?;

        let status = response.status();
        if status.as_u16() >= 400 {
            error!(
                status = status.as_u16(),
                reason = status.canonical_reason().unwrap_or("unknown"),
                path = %doc.path,
                "extraction service error"
            );
            return Ok(vec![]);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| GranskError::Network(format!("{}: {e}", connection.endpoint())))?;

        let text = match std::str::from_utf8(&body) {
            Ok(text) => text.trim(),
            Err(e) => {
                warn!(path = %doc.path, error = %e, "extraction response is not UTF-8");
                return Ok(vec![]);
            }
        };

        if text.is_empty() {
            debug!("no text extracted");
            doc.text = Some(String::new());
            return Ok(vec![]);
        }

        debug!(chars = text.len(), "text extracted");
        doc.text = Some(text.to_string());
        Ok(vec![Emit::Forward(Topic::ProcessText)])
    }
}
