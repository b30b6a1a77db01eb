//! Size and content type detection, and routing by content type.

use async_trait::async_trait;
use tracing::debug;

use gransk_core::{Emit, Payload, Subscriber, Topic};
use gransk_shared::{Document, Result};

pub const OCTET_STREAM: &str = "application/octet-stream";
pub const TAR: &str = "application/x-tar";
pub const GZIP: &str = "application/gzip";

/// Detect the content type of `bytes`, named `path`.
///
/// Magic bytes win over the file name; a name without a known extension
/// falls back to a UTF-8 check.
pub fn detect_content_type(bytes: &[u8], path: &str) -> String {
    if let Some(mime) = sniff_magic(bytes) {
        return mime.to_string();
    }
    if let Some(mime) = mime_guess::from_path(path).first_raw() {
        return mime.to_string();
    }
    if is_likely_text(bytes) {
        return "text/plain".to_string();
    }
    OCTET_STREAM.to_string()
}

fn sniff_magic(bytes: &[u8]) -> Option<&'static str> {
    let mime = match bytes {
        [0x25, 0x50, 0x44, 0x46, ..] => "application/pdf",
        [0x89, 0x50, 0x4E, 0x47, ..] => "image/png",
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => "image/tiff",
        [0x1F, 0x8B, ..] => GZIP,
        [0x50, 0x4B, 0x03, 0x04, ..] => "application/zip",
        _ if bytes.len() >= 262 && &bytes[257..262] == b"ustar" => TAR,
        _ => return None,
    };
    Some(mime)
}

/// Valid UTF-8 with mostly printable characters.
fn is_likely_text(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(4096)];
    if head.is_empty() {
        return false;
    }
    // A multi-byte character may straddle the cut.
    let text = match std::str::from_utf8(head) {
        Ok(t) => t,
        Err(e) if e.error_len().is_none() => {
            std::str::from_utf8(&head[..e.valid_up_to()]).unwrap_or_default()
        }
        Err(_) => return false,
    };

    let total = text.chars().count().max(1);
    let printable = text
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .count();
    printable as f64 / total as f64 > 0.80
}

/// Topic a document of `content_type` continues on.
pub fn route(content_type: &str) -> Topic {
    if content_type.starts_with("text/") {
        Topic::PlainText
    } else if content_type == TAR || content_type == GZIP {
        Topic::Archive
    } else {
        Topic::ExternalExtractor
    }
}

/// Records `size` and `content_type`, then routes the document onward.
#[derive(Debug, Default)]
pub struct FileMeta;

#[async_trait]
impl Subscriber for FileMeta {
    fn name(&self) -> &'static str {
        "file_meta"
    }

    fn consumes(&self) -> &'static [Topic] {
        &[Topic::ProcessFile]
    }

    async fn consume(&self, doc: &mut Document, payload: &mut Payload) -> Result<Vec<Emit>> {
        let size = payload.len() as u64;
        doc.size = size;
        doc.set_meta("size", size);

        let content_type = detect_content_type(payload.bytes(), &doc.path);
        let next = route(&content_type);
        debug!(doc_id = %doc.id.short(), %content_type, topic = %next, "detected content type");
        doc.set_meta("content_type", content_type);

        Ok(vec![Emit::Forward(next)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_bytes_beat_extension() {
        assert_eq!(detect_content_type(b"%PDF-1.7\n", "notes.txt"), "application/pdf");
        assert_eq!(
            detect_content_type(&[0x89, 0x50, 0x4E, 0x47, 0x0D], "x.bin"),
            "image/png"
        );
        assert_eq!(detect_content_type(&[0x1F, 0x8B, 0x08], "a"), GZIP);
    }

    #[test]
    fn tar_is_detected_by_ustar_marker() {
        let mut header = vec![0u8; 512];
        header[257..262].copy_from_slice(b"ustar");
        assert_eq!(detect_content_type(&header, "bundle"), TAR);
    }

    #[test]
    fn extension_then_text_sniffing() {
        assert_eq!(detect_content_type(b"a,b\n1,2\n", "data.csv"), "text/csv");
        assert_eq!(detect_content_type("hei på deg".as_bytes(), "README"), "text/plain");
        assert_eq!(detect_content_type(&[0, 1, 2, 3, 0xFE], "blob"), OCTET_STREAM);
        assert_eq!(detect_content_type(b"", "empty"), OCTET_STREAM);
    }

    #[test]
    fn routing_by_content_type() {
        assert_eq!(route("text/plain"), Topic::PlainText);
        assert_eq!(route(TAR), Topic::Archive);
        assert_eq!(route(GZIP), Topic::Archive);
        assert_eq!(route("application/pdf"), Topic::ExternalExtractor);
        assert_eq!(route("application/zip"), Topic::ExternalExtractor);
    }

    #[tokio::test]
    async fn consume_sets_size_and_type() {
        let mut doc = Document::get_document("scan.pdf", None, false).unwrap();
        let mut payload = Payload::new(b"%PDF-1.4 rest".to_vec());
        let emits = FileMeta.consume(&mut doc, &mut payload).await.unwrap();

        assert_eq!(doc.size, 13);
        assert_eq!(doc.meta_i64("size"), Some(13));
        assert_eq!(doc.meta_str("content_type"), Some("application/pdf"));
        assert!(matches!(emits.as_slice(), [Emit::Forward(Topic::ExternalExtractor)]));
    }
}
