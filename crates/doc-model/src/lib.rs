//! Text model for reflowable page overlays.
//!
//! Value types and pure transitions: document/viewport geometry, glyph runs, reading
//! order, the global edit state, per-page overlay presentation, the document text
//! aggregate and output reflow. Nothing here performs I/O.

pub mod document_text;
pub mod edit;
pub mod geometry;
pub mod page;
pub mod reading_order;
pub mod reflow;
pub mod run;

pub use document_text::DocumentText;
pub use edit::{Click, ClickOutcome, Commit, EditState, EditTarget};
pub use geometry::{
    approximate_glyph_height, to_viewport_point, top_left_anchor, Matrix, ScreenRect, Viewport,
};
pub use page::{overlay_elements, OverlayElement, OverlayMode, Page, PageContent};
pub use reading_order::{join_runs, reading_order, reconstruct, sort_runs, ReadingOrderConfig};
pub use reflow::{layout, layout_pages, page_count, wrap_paragraph, LayoutLine, ReflowConfig};
pub use run::{Directionality, RunKey, TextRun};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("run {run} out of range on page {page} (run_count={run_count})")]
    RunOutOfRange { page: u32, run: usize, run_count: usize },
    #[error("edit for page {found} applied to page {expected}")]
    PageMismatch { expected: u32, found: u32 },
    #[error("page {page} failed to load and cannot be edited")]
    PageUnusable { page: u32 },
}
