//! Adapter over the rendering engine: one raster and one run set per `(page, scale)`.

use doc_model::{TextRun, Viewport};
use pdf_engine::{DocumentHandle, PdfEngine, RenderRequest, RgbaImage};
use tracing::{debug, warn};

use crate::SessionError;

/// Raster surface and glyph runs for one page at one scale.
#[derive(Debug)]
pub struct ExtractedPage {
    /// 1-based page number.
    pub page: u32,
    pub viewport: Viewport,
    pub surface: Option<RgbaImage>,
    /// Runs in extraction order, or the reason the page is unusable.
    pub runs: Result<Vec<TextRun>, String>,
}

impl ExtractedPage {
    pub fn is_usable(&self) -> bool {
        self.runs.is_ok()
    }
}

/// Renders and extracts `page` (1-based).
///
/// Errors only for an invalid handle or page number. A page that fails to render or
/// decode comes back with `runs: Err(..)` and no surface, never with partial runs.
pub fn extract_page<E>(
    engine: &E,
    handle: DocumentHandle,
    page: u32,
    scale: f32,
) -> Result<ExtractedPage, SessionError>
where
    E: PdfEngine + ?Sized,
{
    let page_index = page.checked_sub(1).ok_or(SessionError::PageOutOfRange {
        page,
        page_count: engine.page_count(handle)?,
    })?;
    let size = engine.page_size(handle, page_index)?;
    let viewport = Viewport::new(size.width_pt, size.height_pt, scale);

    let rendered = engine.render_page(handle, RenderRequest { page_index, scale });
    let extracted = engine.extract_glyph_runs(handle, page_index);

    match (rendered, extracted) {
        (Ok(surface), Ok(runs)) => {
            debug!(page, scale, runs = runs.len(), "extracted page");
            Ok(ExtractedPage { page, viewport, surface: Some(surface), runs: Ok(runs) })
        }
        (Err(err), _) | (_, Err(err)) => {
            warn!(page, error = %err, "page unusable");
            Ok(ExtractedPage { page, viewport, surface: None, runs: Err(err.to_string()) })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdf_engine::{build_text_pdf, LopdfEngine, OpenSource};

    #[test]
    fn extraction_carries_viewport_and_surface() {
        let bytes = build_text_pdf(&[vec![("Hello", 72.0, 700.0)]]).expect("fixture should build");
        let mut engine = LopdfEngine::new();
        let handle = engine.open(OpenSource::Bytes(bytes)).expect("open should succeed");

        let page = extract_page(&engine, handle, 1, 2.0).expect("page 1 exists");

        assert_eq!(page.viewport, Viewport::new(612.0, 792.0, 2.0));
        let surface = page.surface.as_ref().expect("surface rendered");
        assert_eq!((surface.width(), surface.height()), (1224, 1584));
        assert_eq!(page.runs.as_ref().map(Vec::len), Ok(1));
    }

    #[test]
    fn page_zero_is_out_of_range() {
        let bytes = build_text_pdf(&[vec![]]).expect("fixture should build");
        let mut engine = LopdfEngine::new();
        let handle = engine.open(OpenSource::Bytes(bytes)).expect("open should succeed");

        let err = extract_page(&engine, handle, 0, 1.0).expect_err("pages are 1-based");
        assert!(matches!(err, SessionError::PageOutOfRange { page: 0, page_count: 1 }));
    }
}
