//! Heuristic deciding whether a PDF is a stack of page scans.
//!
//! A PDF counts as scanned when every page carries an image and every image
//! covers its page to within [`TOLERANCE_INCHES`] on both axes. The checks
//! run in order and the first one that fails names the reason.

use std::collections::HashSet;
use std::path::Path;

use tracing::debug;

use crate::tools::{ImageRow, PageInfo, PdfTools};

/// Maximum allowed difference between page and image size, per axis.
pub const TOLERANCE_INCHES: f64 = 0.2;

const POINTS_PER_INCH: f64 = 72.0;

/// Outcome of [`assess`].
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Scanned,
    NotScanned(NotScanned),
}

impl Verdict {
    pub fn is_scanned(&self) -> bool {
        matches!(self, Verdict::Scanned)
    }
}

/// Why a PDF was not considered scanned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NotScanned {
    #[error("page info unavailable")]
    NoPageInfo,
    #[error("page count missing or not an integer")]
    PageCount,
    #[error("image list unavailable")]
    NoImages,
    #[error("{pages_with_images} of {pages} pages carry an image")]
    PageWithoutImage {
        pages: usize,
        pages_with_images: usize,
    },
    #[error("page size missing or malformed")]
    PageSize,
    #[error("image dimensions missing or malformed")]
    ImageSize,
    #[error("no rows of type image")]
    NoImageRows,
    #[error("image deviates {deviation:.2} in from page size")]
    OutOfTolerance { deviation: f64 },
}

/// Width and height in inches, ordered (short side, long side).
#[derive(Debug, Clone, Copy, PartialEq)]
struct Extent {
    short: f64,
    long: f64,
}

impl Extent {
    fn new(a: f64, b: f64) -> Self {
        Self {
            short: a.min(b),
            long: a.max(b),
        }
    }
}

/// Run both tools on `pdf` and assess the result.
pub async fn detect(tools: &PdfTools, pdf: &Path) -> Verdict {
    let Some(info) = tools.page_info(pdf).await else {
        return Verdict::NotScanned(NotScanned::NoPageInfo);
    };
    if let Err(reason) = page_count(&info) {
        return Verdict::NotScanned(reason);
    }
    let images = tools.image_list(pdf).await;
    assess(Some(&info), images.as_deref())
}

/// Apply every check to already-parsed tool output.
pub fn assess(info: Option<&PageInfo>, images: Option<&[ImageRow]>) -> Verdict {
    match check(info, images) {
        Ok(()) => Verdict::Scanned,
        Err(reason) => {
            debug!(%reason, "not a scanned pdf");
            Verdict::NotScanned(reason)
        }
    }
}

fn check(info: Option<&PageInfo>, images: Option<&[ImageRow]>) -> Result<(), NotScanned> {
    let info = info.ok_or(NotScanned::NoPageInfo)?;
    let pages = page_count(info)?;
    let images = images_present(images)?;
    every_page_has_image(pages, images)?;
    let page = page_size(info)?;
    let sizes = image_sizes(images)?;
    within_tolerance(page, &sizes)
}

fn page_count(info: &PageInfo) -> Result<usize, NotScanned> {
    info.get("pages")
        .and_then(|v| v.parse().ok())
        .ok_or(NotScanned::PageCount)
}

fn images_present(images: Option<&[ImageRow]>) -> Result<&[ImageRow], NotScanned> {
    match images {
        Some(rows) if !rows.is_empty() => Ok(rows),
        _ => Err(NotScanned::NoImages),
    }
}

fn every_page_has_image(pages: usize, images: &[ImageRow]) -> Result<(), NotScanned> {
    let distinct: HashSet<&str> = images
        .iter()
        .filter_map(|row| row.get("page").map(String::as_str))
        .collect();

    if distinct.len() == pages {
        Ok(())
    } else {
        Err(NotScanned::PageWithoutImage {
            pages,
            pages_with_images: distinct.len(),
        })
    }
}

/// `"612 x 792 pts (letter)"` → 8.5 × 11 in.
fn page_size(info: &PageInfo) -> Result<Extent, NotScanned> {
    let raw = info.get("page size").ok_or(NotScanned::PageSize)?;
    let mut parts = raw.split_whitespace();
    let width = parts.next().and_then(|v| v.parse::<f64>().ok());
    let _ = parts.next();
    let height = parts.next().and_then(|v| v.parse::<f64>().ok());

    match (width, height) {
        (Some(w), Some(h)) => Ok(Extent::new(w / POINTS_PER_INCH, h / POINTS_PER_INCH)),
        _ => Err(NotScanned::PageSize),
    }
}

fn image_sizes(images: &[ImageRow]) -> Result<Vec<Extent>, NotScanned> {
    let sizes = images
        .iter()
        .filter(|row| row.get("type").map(String::as_str) == Some("image"))
        .map(|row| {
            let x = inches(row, "width", "x-ppi")?;
            let y = inches(row, "height", "y-ppi")?;
            Ok(Extent::new(x, y))
        })
        .collect::<Result<Vec<_>, NotScanned>>()?;

    if sizes.is_empty() {
        return Err(NotScanned::NoImageRows);
    }
    Ok(sizes)
}

fn inches(row: &ImageRow, pixels: &str, ppi: &str) -> Result<f64, NotScanned> {
    let pixels: u32 = row
        .get(pixels)
        .and_then(|v| v.parse().ok())
        .ok_or(NotScanned::ImageSize)?;
    let ppi: u32 = row
        .get(ppi)
        .and_then(|v| v.parse().ok())
        .filter(|v| *v > 0)
        .ok_or(NotScanned::ImageSize)?;
    Ok(f64::from(pixels) / f64::from(ppi))
}

fn within_tolerance(page: Extent, images: &[Extent]) -> Result<(), NotScanned> {
    let deviation = images
        .iter()
        .map(|img| (page.short - img.short).abs().max((page.long - img.long).abs()))
        .fold(0.0_f64, f64::max);

    if deviation > TOLERANCE_INCHES {
        Err(NotScanned::OutOfTolerance { deviation })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(pages: &str, size: &str) -> PageInfo {
        [("pages", pages), ("page size", size)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn image(page: u32, kind: &str, w: u32, h: u32, ppi: u32) -> ImageRow {
        [
            ("page", page.to_string()),
            ("type", kind.to_string()),
            ("width", w.to_string()),
            ("height", h.to_string()),
            ("x-ppi", ppi.to_string()),
            ("y-ppi", ppi.to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    const LETTER: &str = "612 x 792 pts (letter)";

    #[test]
    fn full_page_scan_is_scanned() {
        let images = vec![image(1, "image", 2550, 3300, 300)];
        assert_eq!(assess(Some(&info("1", LETTER)), Some(&images)), Verdict::Scanned);
    }

    #[test]
    fn landscape_scan_matches_portrait_page() {
        let images = vec![image(1, "image", 3300, 2550, 300)];
        assert!(assess(Some(&info("1", LETTER)), Some(&images)).is_scanned());
    }

    #[test]
    fn small_image_is_not_scanned() {
        let images = vec![image(1, "image", 1000, 1000, 300)];
        let verdict = assess(Some(&info("1", LETTER)), Some(&images));
        assert!(matches!(
            verdict,
            Verdict::NotScanned(NotScanned::OutOfTolerance { .. })
        ));
    }

    #[test]
    fn oversized_image_is_not_scanned() {
        // Deviation is measured in both directions.
        let images = vec![image(1, "image", 3000, 3900, 300)];
        assert!(!assess(Some(&info("1", LETTER)), Some(&images)).is_scanned());
    }

    #[test]
    fn page_without_image_is_not_scanned() {
        let images = vec![image(1, "image", 2550, 3300, 300)];
        assert_eq!(
            assess(Some(&info("2", LETTER)), Some(&images)),
            Verdict::NotScanned(NotScanned::PageWithoutImage {
                pages: 2,
                pages_with_images: 1
            })
        );
    }

    #[test]
    fn missing_tool_output_is_not_scanned() {
        assert_eq!(
            assess(None, None),
            Verdict::NotScanned(NotScanned::NoPageInfo)
        );
        assert_eq!(
            assess(Some(&info("1", LETTER)), None),
            Verdict::NotScanned(NotScanned::NoImages)
        );
    }

    #[test]
    fn bad_page_count_is_not_scanned() {
        let images = vec![image(1, "image", 2550, 3300, 300)];
        assert_eq!(
            assess(Some(&info("many", LETTER)), Some(&images)),
            Verdict::NotScanned(NotScanned::PageCount)
        );
    }

    #[test]
    fn malformed_page_size_is_not_scanned() {
        let images = vec![image(1, "image", 2550, 3300, 300)];
        assert_eq!(
            assess(Some(&info("1", "letter")), Some(&images)),
            Verdict::NotScanned(NotScanned::PageSize)
        );
    }

    #[test]
    fn only_masks_is_not_scanned() {
        let images = vec![image(1, "smask", 2550, 3300, 300)];
        assert_eq!(
            assess(Some(&info("1", LETTER)), Some(&images)),
            Verdict::NotScanned(NotScanned::NoImageRows)
        );
    }

    #[test]
    fn zero_ppi_is_not_scanned() {
        let images = vec![image(1, "image", 2550, 3300, 0)];
        assert_eq!(
            assess(Some(&info("1", LETTER)), Some(&images)),
            Verdict::NotScanned(NotScanned::ImageSize)
        );
    }

    #[test]
    fn masks_are_ignored_for_size_but_count_for_pages() {
        let images = vec![
            image(1, "image", 2550, 3300, 300),
            image(1, "smask", 10, 10, 72),
            image(2, "image", 2520, 3280, 300),
        ];
        assert!(assess(Some(&info("2", LETTER)), Some(&images)).is_scanned());
    }

    #[test]
    fn page_size_accepts_fractional_points() {
        let parsed = page_size(&info("1", "595.276 x 841.89 pts (A4)")).unwrap();
        assert!((parsed.short - 8.2677).abs() < 0.001);
        assert!((parsed.long - 11.6929).abs() < 0.001);
    }
}
