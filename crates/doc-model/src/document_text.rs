use crate::reading_order::PARAGRAPH_BREAK;
use crate::ModelError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Page number to current page text, for pages `1..=page_count`.
///
/// Derived from the runs each page holds; only [`DocumentText::update`] writes to it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DocumentText {
    pages: BTreeMap<u32, String>,
}

impl DocumentText {
    /// Every page starts out with empty text so page indices stay aligned.
    pub fn new(page_count: u32) -> Self {
        Self { pages: (1..=page_count).map(|page| (page, String::new())).collect() }
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Replaces one page's entry. Repeated or out-of-order updates are fine.
    pub fn update(&mut self, page: u32, text: impl Into<String>) -> Result<(), ModelError> {
        let page_count = self.page_count();
        let entry = self.pages.get_mut(&page).ok_or(ModelError::PageOutOfRange { page, page_count })?;
        *entry = text.into();
        Ok(())
    }

    pub fn page(&self, page: u32) -> Option<&str> {
        self.pages.get(&page).map(String::as_str)
    }

    /// Page bodies in ascending page order.
    pub fn bodies(&self) -> Vec<&str> {
        self.pages.values().map(String::as_str).collect()
    }

    /// All pages joined by paragraph breaks, empty pages included.
    pub fn full_text(&self) -> String {
        self.bodies().join(PARAGRAPH_BREAK)
    }

    pub fn is_blank(&self) -> bool {
        self.pages.values().all(|text| text.trim().is_empty())
    }
}
