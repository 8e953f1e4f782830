//! Global single-surface edit state.
//!
//! At most one `(page, run)` pair is editable at a time. Every transition that leaves
//! the `Editing` state hands back a [`Commit`], so activating a new target always
//! commits the previous one first.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EditTarget {
    /// 1-based source page number.
    pub page: u32,
    pub run: usize,
}

impl EditTarget {
    pub fn new(page: u32, run: usize) -> Self {
        Self { page, run }
    }
}

/// Content read back from an editable surface when it loses focus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub target: EditTarget,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EditState {
    #[default]
    Idle,
    Editing { target: EditTarget, draft: String },
}

/// Pointer action on a static run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Click {
    /// Length of the text selection the pointer action produced.
    pub selection_len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// The click finished a selection gesture; edit state is unchanged.
    Selection,
    /// The target is now editing. `committed` is the edit that was active before.
    Activated { committed: Option<Commit> },
}

impl EditState {
    pub fn active_target(&self) -> Option<EditTarget> {
        match self {
            Self::Idle => None,
            Self::Editing { target, .. } => Some(*target),
        }
    }

    pub fn draft(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::Editing { draft, .. } => Some(draft),
        }
    }

    pub fn is_editing(&self, target: EditTarget) -> bool {
        self.active_target() == Some(target)
    }

    /// Commits whatever is active, then starts editing `target` with `content`.
    pub fn activate(&mut self, target: EditTarget, content: impl Into<String>) -> Option<Commit> {
        let committed = self.commit();
        *self = Self::Editing { target, draft: content.into() };
        committed
    }

    /// Handles a click on `target`, ignoring clicks that made a selection.
    pub fn click(&mut self, target: EditTarget, content: &str, click: Click) -> ClickOutcome {
        if click.selection_len > 0 {
            return ClickOutcome::Selection;
        }

        if self.is_editing(target) {
            return ClickOutcome::Activated { committed: None };
        }

        ClickOutcome::Activated { committed: self.activate(target, content) }
    }

    /// Replaces the draft of the active surface. Returns `false` when idle.
    pub fn update_draft(&mut self, text: impl Into<String>) -> bool {
        match self {
            Self::Idle => false,
            Self::Editing { draft, .. } => {
                *draft = text.into();
                true
            }
        }
    }

    /// Blur: returns the active draft as a commit and goes idle.
    pub fn commit(&mut self) -> Option<Commit> {
        match std::mem::take(self) {
            Self::Idle => None,
            Self::Editing { target, draft } => Some(Commit { target, content: draft }),
        }
    }

    /// Drops an uncommitted draft that belongs to `page`, returning its text.
    pub fn discard_page(&mut self, page: u32) -> Option<String> {
        if self.active_target().map(|target| target.page) != Some(page) {
            return None;
        }

        match std::mem::take(self) {
            Self::Editing { draft, .. } => Some(draft),
            Self::Idle => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_to_editing_to_idle() {
        let mut state = EditState::default();
        let target = EditTarget::new(1, 0);

        assert_eq!(state.activate(target, "Hello"), None);
        assert!(state.is_editing(target));
        assert!(state.update_draft("Hello there"));

        let commit = state.commit().expect("active edit should commit");
        assert_eq!(commit, Commit { target, content: "Hello there".to_owned() });
        assert_eq!(state, EditState::Idle);
        assert_eq!(state.commit(), None);
    }

    #[test]
    fn activating_another_run_commits_the_first() {
        let mut state = EditState::default();
        state.activate(EditTarget::new(1, 0), "first");
        state.update_draft("first edited");

        let committed = state.activate(EditTarget::new(2, 3), "second");

        assert_eq!(
            committed,
            Some(Commit { target: EditTarget::new(1, 0), content: "first edited".to_owned() })
        );
        assert_eq!(state.active_target(), Some(EditTarget::new(2, 3)));
        assert_eq!(state.draft(), Some("second"));
    }

    #[test]
    fn selection_click_does_not_enter_edit_mode() {
        let mut state = EditState::default();
        let outcome = state.click(EditTarget::new(1, 0), "text", Click { selection_len: 4 });

        assert_eq!(outcome, ClickOutcome::Selection);
        assert_eq!(state, EditState::Idle);
    }

    #[test]
    fn clicking_the_active_run_keeps_the_draft() {
        let mut state = EditState::default();
        let target = EditTarget::new(1, 2);
        state.click(target, "original", Click::default());
        state.update_draft("changed");

        let outcome = state.click(target, "original", Click::default());

        assert_eq!(outcome, ClickOutcome::Activated { committed: None });
        assert_eq!(state.draft(), Some("changed"));
    }

    #[test]
    fn update_draft_when_idle_is_rejected() {
        let mut state = EditState::default();
        assert!(!state.update_draft("x"));
    }

    #[test]
    fn discard_page_only_touches_matching_page() {
        let mut state = EditState::default();
        state.activate(EditTarget::new(2, 0), "draft");

        assert_eq!(state.discard_page(1), None);
        assert!(state.active_target().is_some());

        assert_eq!(state.discard_page(2), Some("draft".to_owned()));
        assert_eq!(state, EditState::Idle);
    }
}
