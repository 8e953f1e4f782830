use crate::geometry::Matrix;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Directionality {
    #[default]
    Ltr,
    Rtl,
}

impl Directionality {
    /// Direction of the first strong character, `Ltr` when there is none.
    pub fn detect(text: &str) -> Self {
        for ch in text.chars() {
            if is_rtl_char(ch) {
                return Self::Rtl;
            }
            if ch.is_alphabetic() {
                return Self::Ltr;
            }
        }

        Self::Ltr
    }
}

fn is_rtl_char(ch: char) -> bool {
    matches!(
        ch as u32,
        0x0590..=0x05FF | 0x0600..=0x06FF | 0x0700..=0x074F | 0x0750..=0x077F | 0x08A0..=0x08FF
            | 0xFB1D..=0xFDFF | 0xFE70..=0xFEFF
    )
}

/// One run of glyphs sharing a single transform.
///
/// `transform` never changes after extraction; edits only touch `content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub content: String,
    transform: Matrix,
    pub font_name: String,
    pub directionality: Directionality,
}

impl TextRun {
    pub fn new(content: impl Into<String>, transform: Matrix, font_name: impl Into<String>) -> Self {
        let content = content.into();
        let directionality = Directionality::detect(&content);

        Self { content, transform, font_name: font_name.into(), directionality }
    }

    /// Run at `(x, y)` with an unskewed transform of the given font size.
    pub fn at(content: impl Into<String>, x: f32, y: f32, font_size: f32) -> Self {
        Self::new(content, Matrix::new(font_size, 0.0, 0.0, font_size, x, y), "Helvetica")
    }

    pub fn transform(&self) -> &Matrix {
        &self.transform
    }

    pub fn x(&self) -> f32 {
        self.transform.translate_x()
    }

    pub fn y(&self) -> f32 {
        self.transform.translate_y()
    }
}

/// Identity of a run that survives re-extraction at another scale.
///
/// Built from the extracted content and transform, plus an occurrence counter so
/// duplicate glyph runs stay distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunKey {
    fingerprint: u64,
    occurrence: u32,
}

impl RunKey {
    /// Keys for a freshly extracted sequence, in the same order.
    pub fn for_runs(runs: &[TextRun]) -> Vec<RunKey> {
        let mut seen: Vec<(u64, u32)> = Vec::new();

        runs.iter()
            .map(|run| {
                let fingerprint = fingerprint(run);
                let occurrence = match seen.iter_mut().find(|(hash, _)| *hash == fingerprint) {
                    Some((_, count)) => {
                        *count += 1;
                        *count
                    }
                    None => {
                        seen.push((fingerprint, 0));
                        0
                    }
                };

                RunKey { fingerprint, occurrence }
            })
            .collect()
    }
}

fn fingerprint(run: &TextRun) -> u64 {
    let mut hasher = DefaultHasher::new();
    run.content.hash(&mut hasher);
    for value in run.transform.0 {
        value.to_bits().hash(&mut hasher);
    }
    run.font_name.hash(&mut hasher);
    hasher.finish()
}
