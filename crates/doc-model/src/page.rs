use crate::edit::{Commit, EditState, EditTarget};
use crate::geometry::{approximate_glyph_height, top_left_anchor, ScreenRect, Viewport};
use crate::reading_order::{join_runs, reconstruct, ReadingOrderConfig};
use crate::run::TextRun;
use crate::ModelError;
use serde::{Deserialize, Serialize};

/// Average glyph advance as a fraction of the font size, used for overlay widths.
pub const OVERLAY_CHAR_WIDTH_RATIO: f32 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PageContent {
    /// Runs in reading order.
    Ready { runs: Vec<TextRun> },
    /// Extraction failed; the page has no runs and shows an error placeholder.
    Failed { message: String },
}

/// One source page as held by the overlay synchronizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// 1-based page number.
    pub number: u32,
    pub viewport: Viewport,
    pub content: PageContent,
}

impl Page {
    /// Builds a ready page from runs in extraction order.
    pub fn from_extraction(
        number: u32,
        viewport: Viewport,
        runs: Vec<TextRun>,
        config: &ReadingOrderConfig,
    ) -> (Self, String) {
        let (runs, text) = reconstruct(runs, config);
        (Self { number, viewport, content: PageContent::Ready { runs } }, text)
    }

    pub fn failed(number: u32, viewport: Viewport, message: impl Into<String>) -> Self {
        Self { number, viewport, content: PageContent::Failed { message: message.into() } }
    }

    pub fn runs(&self) -> &[TextRun] {
        match &self.content {
            PageContent::Ready { runs } => runs,
            PageContent::Failed { .. } => &[],
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.content {
            PageContent::Ready { .. } => None,
            PageContent::Failed { message } => Some(message),
        }
    }

    /// Current linear text of the page.
    pub fn text(&self, config: &ReadingOrderConfig) -> String {
        join_runs(self.runs(), config)
    }

    pub fn run(&self, index: usize) -> Result<&TextRun, ModelError> {
        self.runs().get(index).ok_or(ModelError::RunOutOfRange {
            page: self.number,
            run: index,
            run_count: self.runs().len(),
        })
    }

    /// Writes a committed edit into the run's content and returns the new page text.
    pub fn apply_commit(
        &mut self,
        commit: &Commit,
        config: &ReadingOrderConfig,
    ) -> Result<String, ModelError> {
        if commit.target.page != self.number {
            return Err(ModelError::PageMismatch { expected: self.number, found: commit.target.page });
        }

        let page = self.number;
        let run = match &mut self.content {
            PageContent::Ready { runs } => {
                let run_count = runs.len();
                runs.get_mut(commit.target.run).ok_or(ModelError::RunOutOfRange {
                    page,
                    run: commit.target.run,
                    run_count,
                })?
            }
            PageContent::Failed { .. } => return Err(ModelError::PageUnusable { page }),
        };

        run.content = commit.content.clone();
        Ok(self.text(config))
    }

    pub fn run_rect(&self, run: &TextRun) -> ScreenRect {
        let (x, y) = top_left_anchor(&self.viewport, run.transform());
        let height = approximate_glyph_height(run.transform(), self.viewport.scale);
        let width = run.content.chars().count() as f32
            * run.transform().scale_x().abs()
            * self.viewport.scale
            * OVERLAY_CHAR_WIDTH_RATIO;

        ScreenRect { x, y, width, height }
    }

    /// Index of the last-drawn run containing the viewport point.
    pub fn run_at(&self, view_x: f32, view_y: f32) -> Option<usize> {
        self.runs().iter().rposition(|run| self.run_rect(run).contains(view_x, view_y))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OverlayMode {
    Static { content: String },
    Editing { draft: String, cursor: usize },
}

/// A positioned overlay element for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayElement {
    pub run_index: usize,
    pub rect: ScreenRect,
    pub font_size_px: f32,
    pub font_name: String,
    pub rtl: bool,
    pub mode: OverlayMode,
}

/// Presentation of a page: one element per run, the active one editable.
pub fn overlay_elements(page: &Page, edit: &EditState) -> Vec<OverlayElement> {
    page.runs()
        .iter()
        .enumerate()
        .map(|(run_index, run)| {
            let target = EditTarget::new(page.number, run_index);
            let mode = match (edit.is_editing(target), edit.draft()) {
                (true, Some(draft)) => {
                    OverlayMode::Editing { draft: draft.to_owned(), cursor: draft.chars().count() }
                }
                _ => OverlayMode::Static { content: run.content.clone() },
            };

            OverlayElement {
                run_index,
                rect: page.run_rect(run),
                font_size_px: approximate_glyph_height(run.transform(), page.viewport.scale),
                font_name: run.font_name.clone(),
                rtl: run.directionality == crate::run::Directionality::Rtl,
                mode,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_page() -> (Page, String) {
        let runs = vec![
            TextRun::at("Next", 0.0, 50.0, 10.0),
            TextRun::at("World", 50.0, 100.0, 10.0),
            TextRun::at("Hello", 0.0, 100.0, 10.0),
        ];

        Page::from_extraction(1, Viewport::new(200.0, 200.0, 2.0), runs, &ReadingOrderConfig::default())
    }

    #[test]
    fn extraction_text_matches_rejoined_text() {
        let (page, text) = sample_page();

        assert_eq!(text, "Hello World\nNext");
        assert_eq!(page.text(&ReadingOrderConfig::default()), text);
    }

    #[test]
    fn commit_changes_content_and_republishes_text() {
        let (mut page, _) = sample_page();
        let transform = *page.runs()[1].transform();

        let commit = Commit { target: EditTarget::new(1, 1), content: "There".to_owned() };
        let text = page.apply_commit(&commit, &ReadingOrderConfig::default()).expect("commit applies");

        assert_eq!(text, "Hello There\nNext");
        assert_eq!(*page.runs()[1].transform(), transform);
    }

    #[test]
    fn commit_to_missing_run_is_rejected() {
        let (mut page, _) = sample_page();
        let commit = Commit { target: EditTarget::new(1, 9), content: "x".to_owned() };

        let err = page.apply_commit(&commit, &ReadingOrderConfig::default()).expect_err("out of range");
        assert!(matches!(err, ModelError::RunOutOfRange { run: 9, run_count: 3, .. }));
    }

    #[test]
    fn failed_page_has_no_runs_and_reports_error() {
        let page = Page::failed(3, Viewport::new(100.0, 100.0, 1.0), "decoder error");

        assert!(page.runs().is_empty());
        assert_eq!(page.error(), Some("decoder error"));
        assert_eq!(page.text(&ReadingOrderConfig::default()), "");
    }

    #[test]
    fn overlay_places_runs_from_baseline_minus_height() {
        let (page, _) = sample_page();
        let elements = overlay_elements(&page, &EditState::Idle);

        assert_eq!(elements.len(), 3);
        let hello = &elements[0];
        assert_eq!(hello.rect.x, 0.0);
        assert_eq!(hello.rect.y, 200.0 - 20.0);
        assert_eq!(hello.rect.height, 20.0);
        assert_eq!(hello.rect.width, 50.0);
        assert_eq!(hello.mode, OverlayMode::Static { content: "Hello".to_owned() });
    }

    #[test]
    fn overlay_marks_only_the_active_run_editable() {
        let (page, _) = sample_page();
        let mut edit = EditState::default();
        edit.activate(EditTarget::new(1, 2), "Next");

        let elements = overlay_elements(&page, &edit);
        let editing: Vec<_> = elements
            .iter()
            .filter(|element| matches!(element.mode, OverlayMode::Editing { .. }))
            .collect();

        assert_eq!(editing.len(), 1);
        assert_eq!(editing[0].run_index, 2);
        assert_eq!(editing[0].mode, OverlayMode::Editing { draft: "Next".to_owned(), cursor: 4 });
    }

    #[test]
    fn hit_test_finds_run_under_point() {
        let (page, _) = sample_page();

        assert_eq!(page.run_at(10.0, 190.0), Some(0));
        assert_eq!(page.run_at(110.0, 190.0), Some(1));
        assert_eq!(page.run_at(390.0, 10.0), None);
    }
}
