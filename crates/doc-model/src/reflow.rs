//! Reflow of linear text into fixed-size output pages.
//!
//! Output is regenerated from text alone: no original page structure, graphics or
//! font metrics survive. Widths are estimated from an average glyph advance.

use serde::{Deserialize, Serialize};

/// Output page geometry in points, Y measured downwards from the page top.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflowConfig {
    pub page_width: f32,
    pub page_height: f32,
    pub margin: f32,
    pub line_height: f32,
    pub font_size: f32,
    /// Average glyph advance relative to the font size.
    pub char_width_ratio: f32,
}

impl Default for ReflowConfig {
    fn default() -> Self {
        Self {
            page_width: 595.28,
            page_height: 841.89,
            margin: 56.0,
            line_height: 16.0,
            font_size: 11.0,
            char_width_ratio: 0.5,
        }
    }
}

impl ReflowConfig {
    pub fn text_width(&self, text: &str) -> f32 {
        text.chars().count() as f32 * self.font_size * self.char_width_ratio
    }

    pub fn max_line_width(&self) -> f32 {
        self.page_width - 2.0 * self.margin
    }

    pub fn bottom_limit(&self) -> f32 {
        self.page_height - self.margin
    }

    /// Whole lines that fit between the top and bottom margins.
    pub fn lines_per_page(&self) -> usize {
        if self.line_height <= 0.0 {
            return 0;
        }
        ((self.page_height - 2.0 * self.margin) / self.line_height).floor().max(0.0) as usize
    }
}

/// One placed output line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutLine {
    pub content: String,
    /// 0-based output page, unrelated to source page numbers.
    pub page_index: u32,
    /// Baseline distance from the top of the output page.
    pub baseline_y: f32,
}

struct Cursor<'a> {
    config: &'a ReflowConfig,
    page_index: u32,
    y: f32,
    lines_on_page: usize,
    lines: Vec<LayoutLine>,
}

impl<'a> Cursor<'a> {
    fn new(config: &'a ReflowConfig) -> Self {
        Self { config, page_index: 0, y: config.margin, lines_on_page: 0, lines: Vec::new() }
    }

    /// A line that does not fit starts a new page. On a page that has no lines yet
    /// the cursor returns to the top instead, so an oversize line is still placed.
    fn place(&mut self, content: String) {
        if self.y + self.config.line_height > self.config.bottom_limit() {
            if self.lines_on_page > 0 {
                self.break_page();
            } else {
                self.y = self.config.margin;
            }
        }

        self.y += self.config.line_height;
        self.lines.push(LayoutLine { content, page_index: self.page_index, baseline_y: self.y });
        self.lines_on_page += 1;
    }

    /// Gaps stop at the bottom limit; the next line then breaks the page.
    fn paragraph_gap(&mut self) {
        let limit = self.config.bottom_limit().max(self.config.margin);
        self.y = (self.y + 0.5 * self.config.line_height).min(limit);
    }

    fn break_page(&mut self) {
        self.page_index += 1;
        self.y = self.config.margin;
        self.lines_on_page = 0;
    }

    fn layout_body(&mut self, body: &str) {
        let max_width = self.config.max_line_width();

        for paragraph in body.split('\n') {
            let paragraph = paragraph.trim_end_matches('\r');
            for line in wrap_paragraph(paragraph, max_width, self.config) {
                self.place(line);
            }
            self.paragraph_gap();
        }
    }
}

/// Lays one text body out into output pages.
pub fn layout(body: &str, config: &ReflowConfig) -> Vec<LayoutLine> {
    let mut cursor = Cursor::new(config);
    cursor.layout_body(body);
    cursor.lines
}

/// Lays out one body per source page with a forced page break between bodies.
pub fn layout_pages<S: AsRef<str>>(bodies: &[S], config: &ReflowConfig) -> Vec<LayoutLine> {
    let mut cursor = Cursor::new(config);

    for (index, body) in bodies.iter().enumerate() {
        if index > 0 {
            cursor.break_page();
        }
        cursor.layout_body(body.as_ref());
    }

    cursor.lines
}

/// Number of output pages referenced by `lines`.
pub fn page_count(lines: &[LayoutLine]) -> u32 {
    lines.iter().map(|line| line.page_index + 1).max().unwrap_or(0)
}

/// Greedy word wrap; words wider than a line are split across lines.
pub fn wrap_paragraph(paragraph: &str, max_width: f32, config: &ReflowConfig) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in paragraph.split_whitespace() {
        let candidate_width = if current.is_empty() {
            config.text_width(word)
        } else {
            config.text_width(&current) + config.text_width(" ") + config.text_width(word)
        };

        if candidate_width <= max_width {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }

        if config.text_width(word) <= max_width {
            current.push_str(word);
            continue;
        }

        let mut chunk = String::new();
        for ch in word.chars() {
            chunk.push(ch);
            if config.text_width(&chunk) > max_width && chunk.chars().count() > 1 {
                chunk.pop();
                lines.push(std::mem::take(&mut chunk));
                chunk.push(ch);
            }
        }
        current = chunk;
    }

    if !current.is_empty() {
        lines.push(current);
    }

    lines
}
