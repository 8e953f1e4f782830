//! Positioned glyph runs from a page content stream.
//!
//! Tracks the graphics and text state needed to place each shown string:
//! `q`/`Q`/`cm` for the CTM and the `BT`..`ET` text operators for the text matrix.
//! Glyph widths are not read from font programs; the pen advances by an average
//! advance so consecutive strings without explicit positioning stay apart.

use doc_model::{Matrix, TextRun};
use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};
use tracing::debug;

use crate::encoding::decode_win_ansi;
use crate::PdfEngineError;

/// Average glyph advance relative to the font size.
const AVERAGE_ADVANCE: f32 = 0.5;

struct TextState {
    ctm: Matrix,
    ctm_stack: Vec<Matrix>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    font_name: String,
    font_size: f32,
    leading: f32,
    horizontal_scale: f32,
    rise: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            ctm_stack: Vec::new(),
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            font_name: String::new(),
            font_size: 12.0,
            leading: 0.0,
            horizontal_scale: 1.0,
            rise: 0.0,
        }
    }
}

impl TextState {
    fn rendering_matrix(&self) -> Matrix {
        let font = Matrix::new(
            self.font_size * self.horizontal_scale,
            0.0,
            0.0,
            self.font_size,
            0.0,
            self.rise,
        );
        font.multiply(&self.text_matrix).multiply(&self.ctm)
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = Matrix::translate(tx, ty).multiply(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.leading);
    }

    fn advance(&mut self, tx: f32) {
        self.text_matrix = Matrix::translate(tx, 0.0).multiply(&self.text_matrix);
    }

    fn glyph_advance(&self, text: &str) -> f32 {
        text.chars().count() as f32 * self.font_size * AVERAGE_ADVANCE * self.horizontal_scale
    }

    fn show(&mut self, text: String, runs: &mut Vec<TextRun>) {
        let advance = self.glyph_advance(&text);
        if !text.trim().is_empty() {
            self.push_run(text, self.rendering_matrix(), runs);
        }
        self.advance(advance);
    }

    /// Runs placed by an overflowing matrix have no usable position and are dropped.
    fn push_run(&self, text: String, transform: Matrix, runs: &mut Vec<TextRun>) {
        if transform.is_finite() {
            runs.push(TextRun::new(text, transform, self.font_name.clone()));
        } else {
            debug!(text = %text, "dropping run with non-finite position");
        }
    }
}

/// Glyph runs of one page, in content-stream order.
pub fn extract_page_runs(doc: &Document, page_id: ObjectId) -> Result<Vec<TextRun>, PdfEngineError> {
    let data = doc.get_page_content(page_id)?;
    let content = Content::decode(&data)?;
    Ok(runs_from_content(&content))
}

pub(crate) fn runs_from_content(content: &Content) -> Vec<TextRun> {
    let mut state = TextState::default();
    let mut runs = Vec::new();

    for op in &content.operations {
        let operands = &op.operands;
        match op.operator.as_str() {
            "q" => state.ctm_stack.push(state.ctm),
            "Q" => {
                if let Some(ctm) = state.ctm_stack.pop() {
                    state.ctm = ctm;
                }
            }
            "cm" => {
                if let Some(matrix) = matrix_operand(operands) {
                    state.ctm = matrix.multiply(&state.ctm);
                }
            }
            "BT" => {
                state.text_matrix = Matrix::IDENTITY;
                state.line_matrix = Matrix::IDENTITY;
            }
            "Tf" => {
                if let Some(Object::Name(name)) = operands.first() {
                    state.font_name = String::from_utf8_lossy(name).into_owned();
                }
                if let Some(size) = operands.get(1).and_then(number) {
                    state.font_size = size;
                }
            }
            "TL" => {
                if let Some(leading) = operands.first().and_then(number) {
                    state.leading = leading;
                }
            }
            "Tz" => {
                if let Some(scale) = operands.first().and_then(number) {
                    state.horizontal_scale = scale / 100.0;
                }
            }
            "Ts" => {
                if let Some(rise) = operands.first().and_then(number) {
                    state.rise = rise;
                }
            }
            "Td" | "TD" => {
                let tx = operands.first().and_then(number).unwrap_or(0.0);
                let ty = operands.get(1).and_then(number).unwrap_or(0.0);
                if op.operator == "TD" {
                    state.leading = -ty;
                }
                state.move_line(tx, ty);
            }
            "Tm" => {
                if let Some(matrix) = matrix_operand(operands) {
                    state.text_matrix = matrix;
                    state.line_matrix = matrix;
                }
            }
            "T*" => state.next_line(),
            "Tj" => {
                if let Some(text) = operands.first().and_then(decode_string) {
                    state.show(text, &mut runs);
                }
            }
            "'" => {
                state.next_line();
                if let Some(text) = operands.first().and_then(decode_string) {
                    state.show(text, &mut runs);
                }
            }
            "\"" => {
                state.next_line();
                if let Some(text) = operands.get(2).and_then(decode_string) {
                    state.show(text, &mut runs);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    show_array(&mut state, items, &mut runs);
                }
            }
            _ => {}
        }
    }

    runs
}

/// `TJ` becomes one run positioned at its first glyph.
fn show_array(state: &mut TextState, items: &[Object], runs: &mut Vec<TextRun>) {
    let start = state.rendering_matrix();
    let mut combined = String::new();
    let mut advance = 0.0;

    for item in items {
        if let Some(text) = decode_string(item) {
            advance += state.glyph_advance(&text);
            combined.push_str(&text);
        } else if let Some(adjust) = number(item) {
            advance -= adjust / 1000.0 * state.font_size * state.horizontal_scale;
            if adjust < -200.0 && !combined.ends_with(' ') {
                combined.push(' ');
            }
        }
    }

    let combined = combined.trim().to_owned();
    if !combined.is_empty() {
        state.push_run(combined, start, runs);
    }
    state.advance(advance);
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

fn matrix_operand(operands: &[Object]) -> Option<Matrix> {
    if operands.len() < 6 {
        return None;
    }

    let mut values = [0.0f32; 6];
    for (slot, operand) in values.iter_mut().zip(operands) {
        *slot = number(operand)?;
    }
    Some(Matrix(values))
}

fn decode_string(object: &Object) -> Option<String> {
    let Object::String(bytes, _) = object else {
        return None;
    };

    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return Some(String::from_utf16_lossy(&units));
    }

    Some(decode_win_ansi(bytes))
}
