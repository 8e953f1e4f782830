use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use assist::{rewrite_text, AssistOutcome, Assistant, ChatSession, RewriteInstruction};
use doc_model::{
    layout, layout_pages, overlay_elements, page_count, Click, ClickOutcome, Commit, DocumentText,
    EditState, EditTarget, LayoutLine, ModelError, OverlayElement, Page, ReadingOrderConfig,
    ReflowConfig, RunKey,
};
use pdf_engine::{write_document, DocumentHandle, PdfEngine};
use tracing::{debug, info, warn};

use crate::cancel::{scale_key, PageLoadTicket};
use crate::extractor::{extract_page, ExtractedPage};
use crate::SessionError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The page was rebuilt. An uncommitted draft on it was dropped and is returned.
    Applied { discarded_draft: Option<String> },
    /// A newer load for the page was started; the result was ignored.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportMode {
    /// The whole document text reflowed as one body.
    #[default]
    Continuous,
    /// One body per source page, each starting on a fresh output page.
    PerSourcePage,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    Written { path: PathBuf, pages: u32, lines: usize },
    /// The document text is blank; nothing was written.
    NothingToExport,
}

#[derive(Debug)]
struct LoadedPage {
    page: Page,
    /// Identity of each run as extracted, parallel to `page.runs()`.
    keys: Vec<RunKey>,
}

#[derive(Debug)]
pub struct EditorSession {
    page_count: u32,
    reading_order: ReadingOrderConfig,
    reflow: ReflowConfig,
    pages: BTreeMap<u32, LoadedPage>,
    committed: HashMap<u32, HashMap<RunKey, String>>,
    edit: EditState,
    text: DocumentText,
    loads: HashMap<u32, PageLoadTicket>,
    generation: u64,
}

impl EditorSession {
    pub fn new(page_count: u32, reading_order: ReadingOrderConfig, reflow: ReflowConfig) -> Self {
        Self {
            page_count,
            reading_order,
            reflow,
            pages: BTreeMap::new(),
            committed: HashMap::new(),
            edit: EditState::default(),
            text: DocumentText::new(page_count),
            loads: HashMap::new(),
            generation: 0,
        }
    }

    pub fn for_document<E>(
        engine: &E,
        handle: DocumentHandle,
        reading_order: ReadingOrderConfig,
        reflow: ReflowConfig,
    ) -> Result<Self, SessionError>
    where
        E: PdfEngine + ?Sized,
    {
        Ok(Self::new(engine.page_count(handle)?, reading_order, reflow))
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn reading_order(&self) -> &ReadingOrderConfig {
        &self.reading_order
    }

    pub fn reflow(&self) -> &ReflowConfig {
        &self.reflow
    }

    pub fn page(&self, number: u32) -> Option<&Page> {
        self.pages.get(&number).map(|loaded| &loaded.page)
    }

    pub fn edit_state(&self) -> &EditState {
        &self.edit
    }

    pub fn document_text(&self) -> &DocumentText {
        &self.text
    }

    pub fn pending_load(&self, page: u32) -> Option<&PageLoadTicket> {
        self.loads.get(&page)
    }

    fn check_page(&self, page: u32) -> Result<(), SessionError> {
        if page == 0 || page > self.page_count {
            return Err(SessionError::PageOutOfRange { page, page_count: self.page_count });
        }
        Ok(())
    }

    fn loaded(&self, page: u32) -> Result<&LoadedPage, SessionError> {
        self.pages.get(&page).ok_or(SessionError::PageNotLoaded { page })
    }

    /// Starts a load for `page` at `scale`, cancelling any load still in flight for it.
    pub fn begin_page_load(&mut self, page: u32, scale: f32) -> Result<PageLoadTicket, SessionError> {
        self.check_page(page)?;

        self.generation += 1;
        let ticket = PageLoadTicket::new(page, scale, self.generation);
        if let Some(previous) = self.loads.insert(page, ticket.clone()) {
            previous.cancel();
            debug!(page, superseded = previous.generation, "cancelled page load");
        }

        Ok(ticket)
    }

    /// Installs an extraction result if `ticket` is still the current load for its page.
    pub fn complete_page_load(
        &mut self,
        ticket: &PageLoadTicket,
        extracted: ExtractedPage,
    ) -> Result<LoadOutcome, SessionError> {
        let current = self
            .loads
            .get(&ticket.page)
            .is_some_and(|pending| pending.generation == ticket.generation);
        let matches =
            extracted.page == ticket.page && scale_key(extracted.viewport.scale) == ticket.scale_key;

        if ticket.is_cancelled() || !current || !matches {
            debug!(page = ticket.page, generation = ticket.generation, "discarding stale page load");
            return Ok(LoadOutcome::Stale);
        }
        self.loads.remove(&ticket.page);

        let discarded_draft = self.edit.discard_page(ticket.page);
        if let Some(draft) = &discarded_draft {
            warn!(page = ticket.page, chars = draft.chars().count(), "re-render dropped an uncommitted edit");
        }

        let text = self.install(extracted)?;
        self.text.update(ticket.page, text)?;

        Ok(LoadOutcome::Applied { discarded_draft })
    }

    /// Builds the page from its runs and re-applies edits committed on earlier renders.
    fn install(&mut self, extracted: ExtractedPage) -> Result<String, SessionError> {
        let ExtractedPage { page: number, viewport, runs, .. } = extracted;

        let runs = match runs {
            Ok(runs) => runs,
            Err(message) => {
                self.pages.insert(
                    number,
                    LoadedPage { page: Page::failed(number, viewport, message), keys: Vec::new() },
                );
                return Ok(String::new());
            }
        };

        let (mut page, mut text) = Page::from_extraction(number, viewport, runs, &self.reading_order);
        let keys = RunKey::for_runs(page.runs());

        if let Some(edits) = self.committed.get(&number) {
            for (run, key) in keys.iter().enumerate() {
                if let Some(content) = edits.get(key) {
                    let commit =
                        Commit { target: EditTarget::new(number, run), content: content.clone() };
                    text = page.apply_commit(&commit, &self.reading_order)?;
                }
            }
        }

        self.pages.insert(number, LoadedPage { page, keys });
        Ok(text)
    }

    /// Renders, extracts and installs one page synchronously.
    pub fn load_page<E>(
        &mut self,
        engine: &E,
        handle: DocumentHandle,
        page: u32,
        scale: f32,
    ) -> Result<LoadOutcome, SessionError>
    where
        E: PdfEngine + ?Sized,
    {
        let ticket = self.begin_page_load(page, scale)?;
        let extracted = extract_page(engine, handle, page, scale)?;
        self.complete_page_load(&ticket, extracted)
    }

    pub fn load_all<E>(
        &mut self,
        engine: &E,
        handle: DocumentHandle,
        scale: f32,
    ) -> Result<(), SessionError>
    where
        E: PdfEngine + ?Sized,
    {
        for page in 1..=self.page_count {
            self.load_page(engine, handle, page, scale)?;
        }
        info!(pages = self.page_count, "loaded document");
        Ok(())
    }

    /// Pointer action on a run. Switching runs commits the previous edit first.
    pub fn click(&mut self, target: EditTarget, click: Click) -> Result<ClickOutcome, SessionError> {
        let page = &self.loaded(target.page)?.page;
        if page.error().is_some() {
            return Err(ModelError::PageUnusable { page: target.page }.into());
        }
        let content = page.run(target.run)?.content.clone();

        let previous = self.edit.clone();
        let outcome = self.edit.click(target, &content, click);
        if let ClickOutcome::Activated { committed: Some(commit) } = &outcome {
            if let Err(err) = self.apply_commit(commit) {
                self.edit = previous;
                return Err(err);
            }
        }

        Ok(outcome)
    }

    /// Clicks whichever run is under a viewport point, if any.
    pub fn click_at(
        &mut self,
        page: u32,
        view_x: f32,
        view_y: f32,
        click: Click,
    ) -> Result<Option<ClickOutcome>, SessionError> {
        let Some(run) = self.loaded(page)?.page.run_at(view_x, view_y) else {
            return Ok(None);
        };
        self.click(EditTarget::new(page, run), click).map(Some)
    }

    pub fn update_draft(&mut self, text: impl Into<String>) -> bool {
        self.edit.update_draft(text)
    }

    /// Focus left the active surface: commit its draft.
    pub fn blur(&mut self) -> Result<Option<Commit>, SessionError> {
        let previous = self.edit.clone();
        let Some(commit) = self.edit.commit() else {
            return Ok(None);
        };

        if let Err(err) = self.apply_commit(&commit) {
            self.edit = previous;
            return Err(err);
        }
        Ok(Some(commit))
    }

    fn apply_commit(&mut self, commit: &Commit) -> Result<(), SessionError> {
        let number = commit.target.page;
        let loaded =
            self.pages.get_mut(&number).ok_or(SessionError::PageNotLoaded { page: number })?;

        let text = loaded.page.apply_commit(commit, &self.reading_order)?;
        if let Some(key) = loaded.keys.get(commit.target.run) {
            self.committed.entry(number).or_default().insert(*key, commit.content.clone());
        }
        self.text.update(number, text)?;

        info!(page = number, run = commit.target.run, "committed edit");
        Ok(())
    }

    pub fn overlay(&self, page: u32) -> Result<Vec<OverlayElement>, SessionError> {
        Ok(overlay_elements(&self.loaded(page)?.page, &self.edit))
    }

    pub fn layout(&self, mode: ExportMode) -> Vec<LayoutLine> {
        match mode {
            ExportMode::Continuous => layout(&self.text.full_text(), &self.reflow),
            ExportMode::PerSourcePage => layout_pages(&self.text.bodies(), &self.reflow),
        }
    }

    /// Reflows the committed document text into a new PDF at `path`.
    pub fn export(&self, path: &Path, mode: ExportMode) -> Result<ExportOutcome, SessionError> {
        if self.text.is_blank() {
            info!("document text is blank, nothing to export");
            return Ok(ExportOutcome::NothingToExport);
        }

        let lines = self.layout(mode);
        write_document(&lines, &self.reflow, path)?;

        let pages = page_count(&lines).max(1);
        info!(path = %path.display(), pages, lines = lines.len(), "exported document");
        Ok(ExportOutcome::Written { path: path.to_path_buf(), pages, lines: lines.len() })
    }

    /// Rewrites the active draft. On failure the draft is left as it was.
    pub fn rewrite_active(
        &mut self,
        assistant: &dyn Assistant,
        instruction: RewriteInstruction,
    ) -> Result<AssistOutcome, SessionError> {
        let draft = self.edit.draft().ok_or(SessionError::NoActiveEdit)?.to_owned();

        let outcome = rewrite_text(assistant, &draft, instruction);
        if let AssistOutcome::Completed { text } = &outcome {
            self.edit.update_draft(text.clone());
        }

        Ok(outcome)
    }

    /// Asks a question with the current document text as context.
    pub fn ask(
        &self,
        chat: &mut ChatSession,
        assistant: &dyn Assistant,
        message: &str,
    ) -> AssistOutcome {
        chat.send(assistant, message, &self.text.full_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assist::{AssistError, ChatTurn};
    use doc_model::{OverlayMode, TextRun, Viewport};
    use pdf_engine::{LopdfEngine, OpenSource};

    fn extracted(page: u32, scale: f32, runs: Vec<TextRun>) -> ExtractedPage {
        ExtractedPage {
            page,
            viewport: Viewport::new(612.0, 792.0, scale),
            surface: None,
            runs: Ok(runs),
        }
    }

    fn scenario_runs() -> Vec<TextRun> {
        vec![
            TextRun::at("Next", 0.0, 50.0, 12.0),
            TextRun::at("World", 50.0, 100.0, 12.0),
            TextRun::at("Hello", 0.0, 100.0, 12.0),
        ]
    }

    fn loaded_session(pages: u32) -> EditorSession {
        let mut session =
            EditorSession::new(pages, ReadingOrderConfig::default(), ReflowConfig::default());
        for page in 1..=pages {
            let ticket = session.begin_page_load(page, 1.0).expect("page in range");
            session
                .complete_page_load(&ticket, extracted(page, 1.0, scenario_runs()))
                .expect("load should apply");
        }
        session
    }

    struct FixedAssistant(Result<String, AssistError>);

    impl Assistant for FixedAssistant {
        fn rewrite(&self, _: &str, _: RewriteInstruction) -> Result<String, AssistError> {
            self.0.clone()
        }

        fn chat(&self, _: &str, context: &str, _: &[ChatTurn]) -> Result<String, AssistError> {
            self.0.clone().map(|reply| format!("{reply} [{}]", context.len()))
        }
    }

    #[test]
    fn loaded_page_publishes_reading_order_text() {
        let session = loaded_session(1);

        assert_eq!(session.document_text().page(1), Some("Hello World\nNext"));
        let contents: Vec<&str> = session
            .page(1)
            .expect("page loaded")
            .runs()
            .iter()
            .map(|run| run.content.as_str())
            .collect();
        assert_eq!(contents, vec!["Hello", "World", "Next"]);
    }

    #[test]
    fn failed_commit_keeps_the_previous_draft_active() {
        let mut session = loaded_session(1);
        let stranded = EditTarget::new(1, 9);
        session.edit = EditState::Editing { target: stranded, draft: "kept".to_owned() };

        let result = session.click(EditTarget::new(1, 0), Click::default());
        assert!(matches!(result, Err(SessionError::Model(_))));
        assert_eq!(
            session.edit_state(),
            &EditState::Editing { target: stranded, draft: "kept".to_owned() }
        );

        assert!(session.blur().is_err());
        assert_eq!(session.edit_state().active_target(), Some(stranded));
        assert_eq!(session.document_text().page(1), Some("Hello World\nNext"));
    }

    #[test]
    fn blur_commits_draft_into_page_and_document_text() {
        let mut session = loaded_session(2);

        session.click(EditTarget::new(2, 1), Click::default()).expect("run exists");
        assert!(session.update_draft("Planet"));
        let commit = session.blur().expect("commit should apply").expect("an edit was active");

        assert_eq!(commit.content, "Planet");
        assert_eq!(session.edit_state(), &EditState::Idle);
        assert_eq!(session.document_text().page(2), Some("Hello Planet\nNext"));
        assert_eq!(session.document_text().page(1), Some("Hello World\nNext"));
    }

    #[test]
    fn unchanged_commit_keeps_text_identical() {
        let mut session = loaded_session(1);
        let before = session.document_text().clone();

        session.click(EditTarget::new(1, 0), Click::default()).expect("run exists");
        session.blur().expect("commit should apply");

        assert_eq!(session.document_text(), &before);
    }

    #[test]
    fn clicking_another_run_commits_the_active_one_first() {
        let mut session = loaded_session(2);

        session.click(EditTarget::new(1, 0), Click::default()).expect("run exists");
        session.update_draft("Goodbye");
        let outcome = session.click(EditTarget::new(2, 2), Click::default()).expect("run exists");

        let ClickOutcome::Activated { committed: Some(commit) } = outcome else {
            panic!("expected the first edit to be committed");
        };
        assert_eq!(commit.target, EditTarget::new(1, 0));
        assert_eq!(session.document_text().page(1), Some("Goodbye World\nNext"));
        assert_eq!(session.edit_state().active_target(), Some(EditTarget::new(2, 2)));
    }

    #[test]
    fn selection_click_does_not_enter_edit_mode() {
        let mut session = loaded_session(1);

        let outcome = session
            .click(EditTarget::new(1, 0), Click { selection_len: 4 })
            .expect("run exists");

        assert_eq!(outcome, ClickOutcome::Selection);
        assert_eq!(session.edit_state(), &EditState::Idle);
    }

    #[test]
    fn overlay_marks_only_the_active_run_editable() {
        let mut session = loaded_session(1);
        session.click(EditTarget::new(1, 1), Click::default()).expect("run exists");

        let elements = session.overlay(1).expect("page loaded");
        let editing: Vec<usize> = elements
            .iter()
            .filter(|element| matches!(element.mode, OverlayMode::Editing { .. }))
            .map(|element| element.run_index)
            .collect();

        assert_eq!(editing, vec![1]);
        assert_eq!(elements[1].mode, OverlayMode::Editing { draft: "World".to_owned(), cursor: 5 });
    }

    #[test]
    fn superseded_load_is_discarded() {
        let mut session =
            EditorSession::new(1, ReadingOrderConfig::default(), ReflowConfig::default());

        let first = session.begin_page_load(1, 1.0).expect("page in range");
        let second = session.begin_page_load(1, 2.0).expect("page in range");
        assert!(first.token().is_cancelled());

        let stale = session
            .complete_page_load(&first, extracted(1, 1.0, vec![TextRun::at("Old", 0.0, 10.0, 12.0)]))
            .expect("stale results are not errors");
        assert_eq!(stale, LoadOutcome::Stale);
        assert!(session.page(1).is_none());

        let applied = session
            .complete_page_load(&second, extracted(1, 2.0, scenario_runs()))
            .expect("current load applies");
        assert_eq!(applied, LoadOutcome::Applied { discarded_draft: None });
        assert_eq!(session.page(1).map(|page| page.viewport.scale), Some(2.0));
        assert!(session.pending_load(1).is_none());
    }

    #[test]
    fn result_for_another_scale_is_stale() {
        let mut session =
            EditorSession::new(1, ReadingOrderConfig::default(), ReflowConfig::default());
        let ticket = session.begin_page_load(1, 1.0).expect("page in range");

        let outcome = session
            .complete_page_load(&ticket, extracted(1, 1.5, scenario_runs()))
            .expect("stale results are not errors");
        assert_eq!(outcome, LoadOutcome::Stale);
    }

    #[test]
    fn rerender_keeps_committed_edits_and_reports_dropped_draft() {
        let mut session = loaded_session(1);

        session.click(EditTarget::new(1, 0), Click::default()).expect("run exists");
        session.update_draft("Hi");
        session.blur().expect("commit should apply");

        session.click(EditTarget::new(1, 2), Click::default()).expect("run exists");
        session.update_draft("Unsaved");

        let ticket = session.begin_page_load(1, 2.0).expect("page in range");
        let outcome = session
            .complete_page_load(&ticket, extracted(1, 2.0, scenario_runs()))
            .expect("load should apply");

        assert_eq!(outcome, LoadOutcome::Applied { discarded_draft: Some("Unsaved".to_owned()) });
        assert_eq!(session.edit_state(), &EditState::Idle);
        assert_eq!(session.document_text().page(1), Some("Hi World\nNext"));
        assert_eq!(session.page(1).expect("page loaded").runs()[0].content, "Hi");
    }

    #[test]
    fn failed_extraction_marks_only_that_page_unusable() {
        let mut session = loaded_session(2);

        let ticket = session.begin_page_load(2, 1.0).expect("page in range");
        let failed = ExtractedPage {
            page: 2,
            viewport: Viewport::new(612.0, 792.0, 1.0),
            surface: None,
            runs: Err("corrupt content stream".to_owned()),
        };
        session.complete_page_load(&ticket, failed).expect("failure is a page state");

        let page = session.page(2).expect("page installed");
        assert_eq!(page.error(), Some("corrupt content stream"));
        assert!(page.runs().is_empty());
        assert_eq!(session.document_text().page(2), Some(""));
        assert_eq!(session.document_text().page(1), Some("Hello World\nNext"));

        let err = session.click(EditTarget::new(2, 0), Click::default()).expect_err("page unusable");
        assert!(matches!(err, SessionError::Model(ModelError::PageUnusable { page: 2 })));
    }

    #[test]
    fn page_numbers_outside_the_document_are_rejected() {
        let mut session =
            EditorSession::new(2, ReadingOrderConfig::default(), ReflowConfig::default());

        assert!(matches!(
            session.begin_page_load(3, 1.0),
            Err(SessionError::PageOutOfRange { page: 3, page_count: 2 })
        ));
        assert!(matches!(
            session.click(EditTarget::new(1, 0), Click::default()),
            Err(SessionError::PageNotLoaded { page: 1 })
        ));
    }

    #[test]
    fn blank_document_exports_nothing() {
        let mut session =
            EditorSession::new(1, ReadingOrderConfig::default(), ReflowConfig::default());
        let ticket = session.begin_page_load(1, 1.0).expect("page in range");
        session.complete_page_load(&ticket, extracted(1, 1.0, Vec::new())).expect("load applies");

        let temp = tempfile::tempdir().expect("temp dir should be created");
        let path = temp.path().join("out.pdf");
        let outcome = session.export(&path, ExportMode::Continuous).expect("export should succeed");

        assert_eq!(outcome, ExportOutcome::NothingToExport);
        assert!(!path.exists());
    }

    #[test]
    fn export_writes_a_readable_pdf() {
        let session = loaded_session(2);
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let path = temp.path().join("out.pdf");

        let outcome =
            session.export(&path, ExportMode::PerSourcePage).expect("export should succeed");
        assert_eq!(outcome, ExportOutcome::Written { path: path.clone(), pages: 2, lines: 4 });

        let mut engine = LopdfEngine::new();
        let handle = engine.open(OpenSource::Path(path)).expect("output should open");
        assert_eq!(engine.page_count(handle).expect("count should succeed"), 2);
        let runs = engine.extract_glyph_runs(handle, 1).expect("extraction should succeed");
        assert_eq!(runs[0].content, "Hello World");
    }

    #[test]
    fn continuous_layout_is_deterministic() {
        let session = loaded_session(3);
        assert_eq!(session.layout(ExportMode::Continuous), session.layout(ExportMode::Continuous));
    }

    #[test]
    fn failed_rewrite_leaves_draft_untouched() {
        let mut session = loaded_session(1);
        session.click(EditTarget::new(1, 1), Click::default()).expect("run exists");
        session.update_draft("Wrold");

        let failing = FixedAssistant(Err(AssistError::Network("connection refused".to_owned())));
        let outcome =
            session.rewrite_active(&failing, RewriteInstruction::FixGrammar).expect("edit active");

        assert_eq!(
            outcome,
            AssistOutcome::Failed { message: "network error: connection refused".to_owned() }
        );
        assert_eq!(session.edit_state().draft(), Some("Wrold"));
        assert_eq!(session.document_text().page(1), Some("Hello World\nNext"));
    }

    #[test]
    fn successful_rewrite_replaces_the_draft_until_blur() {
        let mut session = loaded_session(1);
        session.click(EditTarget::new(1, 1), Click::default()).expect("run exists");

        let assistant = FixedAssistant(Ok("Earth".to_owned()));
        session.rewrite_active(&assistant, RewriteInstruction::Improve).expect("edit active");

        assert_eq!(session.edit_state().draft(), Some("Earth"));
        assert_eq!(session.document_text().page(1), Some("Hello World\nNext"));

        session.blur().expect("commit should apply");
        assert_eq!(session.document_text().page(1), Some("Hello Earth\nNext"));
    }

    #[test]
    fn rewrite_without_active_edit_is_an_error() {
        let mut session = loaded_session(1);
        let assistant = FixedAssistant(Ok("x".to_owned()));

        let err = session
            .rewrite_active(&assistant, RewriteInstruction::Improve)
            .expect_err("nothing is being edited");
        assert!(matches!(err, SessionError::NoActiveEdit));
    }

    #[test]
    fn ask_sends_full_document_text_as_context() {
        let session = loaded_session(2);
        let mut chat = ChatSession::new(1_000);
        let assistant = FixedAssistant(Ok("Greetings".to_owned()));

        let outcome = session.ask(&mut chat, &assistant, "What does it say?");

        let expected_len = session.document_text().full_text().len();
        assert_eq!(outcome.text(), Some(format!("Greetings [{expected_len}]").as_str()));
        assert_eq!(chat.history().len(), 2);
    }
}
