//! Document model and path sanitization.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{GranskError, Result};

// ---------------------------------------------------------------------------
// DocId
// ---------------------------------------------------------------------------

/// Deterministic document identifier: lowercase hex SHA-256.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(String);

impl DocId {
    /// Derive an id from the parent id (if any) and the document path.
    pub fn derive(parent: Option<&DocId>, path: &str) -> Self {
        let mut hasher = Sha256::new();
        if let Some(parent) = parent {
            hasher.update(parent.0.as_bytes());
        }
        hasher.update([0u8]);
        hasher.update(path.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    /// First eight hex characters, used to name temporary artifacts.
    pub fn short(&self) -> &str {
        let end = self.0.char_indices().nth(8).map_or(self.0.len(), |(i, _)| i);
        &self.0[..end]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Metadata & entities
// ---------------------------------------------------------------------------

/// A single metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl MetaValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for MetaValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u64> for MetaValue {
    fn from(value: u64) -> Self {
        Self::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<usize> for MetaValue {
    fn from(value: usize) -> Self {
        Self::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<bool> for MetaValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// An entity detected in a document's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// `"<type>:<lower-cased value>"`.
    pub id: String,
    /// Detector name (`email`, `url`, `ipv4`, `hashtag`).
    #[serde(rename = "type")]
    pub entity_type: String,
    /// Value as it appears in the text.
    pub value: String,
    /// Byte offset of the first occurrence.
    pub offset: usize,
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// Unit of work flowing through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<DocId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default)]
    pub meta: BTreeMap<String, MetaValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl Document {
    /// Create a document named `name`, optionally under `parent`.
    ///
    /// With `need_secure_path` the name is passed through [`secure_path`]
    /// first, and an unusable name is an error. The id depends only on the
    /// final path and the parent id, so repeated calls yield the same id.
    pub fn get_document(
        name: &str,
        parent: Option<&Document>,
        need_secure_path: bool,
    ) -> Result<Self> {
        let path = if need_secure_path {
            secure_path(name)?
        } else {
            name.to_string()
        };
        let parent_id = parent.map(|p| p.id.clone());
        let id = DocId::derive(parent_id.as_ref(), &path);

        Ok(Self {
            id,
            path,
            parent: parent_id,
            tag: None,
            meta: BTreeMap::new(),
            text: None,
            size: 0,
            entities: Vec::new(),
        })
    }

    /// Builder-style provenance tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Last path component, or the whole path when there is no separator.
    pub fn file_name(&self) -> &str {
        self.path
            .rsplit(['/', '\\'])
            .find(|part| !part.is_empty())
            .unwrap_or(&self.path)
    }

    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<MetaValue>) {
        self.meta.insert(key.into(), value.into());
    }

    pub fn meta_i64(&self, key: &str) -> Option<i64> {
        self.meta.get(key).and_then(MetaValue::as_i64)
    }

    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.meta.get(key).and_then(MetaValue::as_str)
    }
}

// ---------------------------------------------------------------------------
// Path sanitization
// ---------------------------------------------------------------------------

/// Turn an untrusted name into a safe relative path joined with `/`.
///
/// NUL bytes are removed, both `/` and `\` separate components, and empty,
/// `.`, `..` and drive (`C:`) components are dropped.
pub fn secure_path(name: &str) -> Result<String> {
    let cleaned: String = name.chars().filter(|c| *c != '\0').collect();

    let parts: Vec<&str> = cleaned
        .split(['/', '\\'])
        .map(str::trim)
        .filter(|part| !part.is_empty() && *part != "." && *part != "..")
        .filter(|part| !is_drive_prefix(part))
        .collect();

    if parts.is_empty() {
        return Err(GranskError::unsafe_path(name, "no usable path components"));
    }

    Ok(parts.join("/"))
}

fn is_drive_prefix(part: &str) -> bool {
    let bytes = part.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Join a sanitized form of `relative` under `root`.
pub fn resolve_under(root: &Path, relative: &str) -> Result<PathBuf> {
    let safe = secure_path(relative)?;
    let mut out = root.to_path_buf();
    for part in safe.split('/') {
        out.push(part);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secure_path_strips_traversal() {
        assert_eq!(secure_path("../../etc/passwd").unwrap(), "etc/passwd");
        assert_eq!(secure_path("/abs/./file.txt").unwrap(), "abs/file.txt");
        assert_eq!(secure_path(r"C:\Users\bob\doc.pdf").unwrap(), "Users/bob/doc.pdf");
        assert_eq!(secure_path("a\0b/c").unwrap(), "ab/c");
    }

    #[test]
    fn secure_path_is_idempotent() {
        for name in ["../x/../y", r"..\..\z.txt", "plain.txt", "a//b///c", "D:/q"] {
            let once = secure_path(name).unwrap();
            assert_eq!(secure_path(&once).unwrap(), once);
        }
    }

    #[test]
    fn secure_path_rejects_empty_result() {
        for name in ["", "..", "../..", "/", "\0", r"\.\"] {
            let err = secure_path(name).unwrap_err();
            assert!(matches!(err, GranskError::UnsafePath { .. }), "{name:?}");
        }
    }

    #[test]
    fn short_id_respects_char_boundaries() {
        let id: DocId = serde_json::from_str("\"åæøåæøåæø\"").unwrap();
        assert_eq!(id.short(), "åæøåæøåæ");
        let tiny: DocId = serde_json::from_str("\"ab\"").unwrap();
        assert_eq!(tiny.short(), "ab");
    }

    #[test]
    fn resolve_under_never_escapes_root() {
        let root = Path::new("/srv/gransk/files");
        let resolved = resolve_under(root, "../../../etc/shadow").unwrap();
        assert!(resolved.starts_with(root));
        assert_eq!(resolved, root.join("etc").join("shadow"));
    }

    #[test]
    fn get_document_is_deterministic() {
        let root = Document::get_document("root", None, false).unwrap();
        let a = Document::get_document("dir/report.pdf", Some(&root), true).unwrap();
        let b = Document::get_document("dir/report.pdf", Some(&root), true).unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.parent.as_ref(), Some(&root.id));
        assert_eq!(a.id.as_str().len(), 64);
        assert_eq!(a.id.short().len(), 8);
    }

    #[test]
    fn get_document_id_depends_on_parent_and_sanitized_name() {
        let root = Document::get_document("root", None, false).unwrap();
        let other = Document::get_document("other", None, false).unwrap();

        let a = Document::get_document("x.txt", Some(&root), true).unwrap();
        let b = Document::get_document("x.txt", Some(&other), true).unwrap();
        assert_ne!(a.id, b.id);

        let c = Document::get_document("../x.txt", Some(&root), true).unwrap();
        assert_eq!(a.id, c.id);
        assert_eq!(c.path, "x.txt");
    }

    #[test]
    fn get_document_strict_rejects_unusable_name() {
        assert!(Document::get_document("../..", None, true).is_err());
        assert!(Document::get_document("../..", None, false).is_ok());
    }

    #[test]
    fn file_name_takes_last_component() {
        let doc = Document::get_document("a/b/scan.pdf", None, false).unwrap();
        assert_eq!(doc.file_name(), "scan.pdf");
        let doc = Document::get_document("plain", None, false).unwrap();
        assert_eq!(doc.file_name(), "plain");
    }

    #[test]
    fn meta_values_serialize_untagged() {
        let mut doc = Document::get_document("m", None, false).unwrap();
        doc.set_meta("size", 12u64);
        doc.set_meta("content_type", "application/pdf");
        doc.set_meta("extractor.scanned", true);
        let json = serde_json::to_value(&doc.meta).unwrap();
        assert_eq!(json["size"], 12);
        assert_eq!(json["content_type"], "application/pdf");
        assert_eq!(json["extractor.scanned"], true);
        assert_eq!(doc.meta_i64("size"), Some(12));
        assert_eq!(doc.meta_str("content_type"), Some("application/pdf"));
    }
}
