//! External PDF tools: page info, image listing and rasterization.
//!
//! Every invocation is bounded by a timeout and the child is killed when the
//! wait is abandoned. Any failure yields `None` ("no information"); callers
//! treat that as a negative answer, never as an error.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use gransk_shared::ToolsConfig;

/// `key: value` pairs from the page-info tool, keys lower-cased.
pub type PageInfo = BTreeMap<String, String>;

/// One row of the image listing, keyed by header column.
pub type ImageRow = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Process runner
// ---------------------------------------------------------------------------

/// Spawn `program` and wait for it, giving up after `limit`.
///
/// Returns `None` when the program cannot be spawned or does not finish in
/// time.
pub async fn run_tool<I, S>(program: &str, args: I, limit: Duration) -> Option<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    match tokio::time::timeout(limit, command.output()).await {
        Ok(Ok(output)) => Some(output),
        Ok(Err(e)) => {
            warn!(program, error = %e, "failed to run tool");
            None
        }
        Err(_) => {
            warn!(program, timeout_secs = limit.as_secs(), "tool timed out");
            None
        }
    }
}

/// Stdout of a run that exited successfully without writing to stderr.
fn clean_stdout(program: &str, output: Output) -> Option<String> {
    if !output.status.success() {
        debug!(program, status = ?output.status.code(), "tool exited with failure");
        return None;
    }
    if !output.stderr.is_empty() {
        debug!(
            program,
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "tool wrote to stderr"
        );
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).into_owned())
}

// ---------------------------------------------------------------------------
// Parsers
// ---------------------------------------------------------------------------

/// Parse `key: value` lines. Lines without a colon are ignored.
pub fn parse_page_info(stdout: &str) -> PageInfo {
    stdout
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

/// Parse a whitespace-aligned table: header, separator, rows.
///
/// Returns `None` if there is no row or any row's column count differs
/// from the header's.
pub fn parse_image_list(stdout: &str) -> Option<Vec<ImageRow>> {
    let lines: Vec<&str> = stdout.trim().lines().collect();
    if lines.len() < 3 {
        return None;
    }

    let header: Vec<&str> = lines[0].split_whitespace().collect();
    if header.is_empty() {
        return None;
    }

    let mut rows = Vec::with_capacity(lines.len() - 2);
    for line in &lines[2..] {
        let cells: Vec<&str> = line.split_whitespace().collect();
        if cells.len() != header.len() {
            return None;
        }
        rows.push(
            header
                .iter()
                .zip(cells)
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
    }
    Some(rows)
}

// ---------------------------------------------------------------------------
// PdfTools
// ---------------------------------------------------------------------------

/// Configured PDF tool binaries.
#[derive(Debug, Clone)]
pub struct PdfTools {
    pdfinfo: String,
    pdfimages: String,
    ghostscript: String,
    timeout: Duration,
}

impl PdfTools {
    pub fn from_config(config: &ToolsConfig) -> Self {
        Self {
            pdfinfo: config.pdfinfo.clone(),
            pdfimages: config.pdfimages.clone(),
            ghostscript: config.ghostscript.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// `pdfinfo <file>`.
    pub async fn page_info(&self, pdf: &Path) -> Option<PageInfo> {
        let output = run_tool(&self.pdfinfo, [pdf], self.timeout).await?;
        clean_stdout(&self.pdfinfo, output).map(|out| parse_page_info(&out))
    }

    /// `pdfimages -list <file>`.
    pub async fn image_list(&self, pdf: &Path) -> Option<Vec<ImageRow>> {
        let args = [OsStr::new("-list"), pdf.as_os_str()];
        let output = run_tool(&self.pdfimages, args, self.timeout).await?;
        clean_stdout(&self.pdfimages, output).and_then(|out| parse_image_list(&out))
    }

    /// Render `pdf` to a Group 4 TIFF at 300 dpi, written to `out`.
    pub async fn rasterize(&self, pdf: &Path, out: &Path) -> Option<Vec<u8>> {
        let args = [
            OsStr::new("-o"),
            out.as_os_str(),
            OsStr::new("-sDEVICE=tiffg4"),
            OsStr::new("-r300"),
            pdf.as_os_str(),
        ];
        let output = run_tool(&self.ghostscript, args, self.timeout).await?;
        if !output.status.success() {
            warn!(status = ?output.status.code(), "rasterization failed");
            return None;
        }

        match tokio::fs::read(out).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(path = %out.display(), error = %e, "rasterized output missing");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ScratchFile
// ---------------------------------------------------------------------------

/// A temporary file path that is removed when the guard drops.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => debug!(path = %self.path.display(), error = %e, "failed to remove scratch file"),
        }
    }
}
