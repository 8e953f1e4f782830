//! Interactive editing over rendered pages.
//!
//! [`EditorSession`] owns the loaded pages, the single global edit state and the
//! document text aggregate. Page loads are ticketed so that a result for a superseded
//! `(page, scale)` request is dropped instead of overwriting fresher state.

mod cancel;
mod extractor;
mod session;

pub use cancel::{scale_key, CancellationToken, PageLoadTicket};
pub use extractor::{extract_page, ExtractedPage};
pub use session::{EditorSession, ExportMode, ExportOutcome, LoadOutcome};

use doc_model::ModelError;
use pdf_engine::PdfEngineError;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("page {page} has not been loaded")]
    PageNotLoaded { page: u32 },
    #[error("no text run is being edited")]
    NoActiveEdit,
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Engine(#[from] PdfEngineError),
}
