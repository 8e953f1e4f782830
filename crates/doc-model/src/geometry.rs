use serde::{Deserialize, Serialize};

/// Affine matrix `[a, b, c, d, e, f]` in PDF order.
///
/// Maps `(x, y)` to `(a*x + c*y + e, b*x + d*y + f)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix(pub [f32; 6]);

impl Matrix {
    pub const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    pub fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self([a, b, c, d, e, f])
    }

    pub fn translate(tx: f32, ty: f32) -> Self {
        Self([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    pub fn scale_x(&self) -> f32 {
        self.0[0]
    }

    pub fn scale_y(&self) -> f32 {
        self.0[3]
    }

    pub fn translate_x(&self) -> f32 {
        self.0[4]
    }

    pub fn translate_y(&self) -> f32 {
        self.0[5]
    }

    /// `self` applied first, then `other` (PDF concatenation order).
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;

        Matrix([
            a1 * a2 + b1 * c2,
            a1 * b2 + b1 * d2,
            c1 * a2 + d1 * c2,
            c1 * b2 + d1 * d2,
            e1 * a2 + f1 * c2 + e2,
            e1 * b2 + f1 * d2 + f2,
        ])
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + c * y + e, b * x + d * y + f)
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|value| value.is_finite())
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Pixel geometry of one rendered page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Page width in document units (points).
    pub page_width: f32,
    /// Page height in document units (points).
    pub page_height: f32,
    pub scale: f32,
}

impl Viewport {
    pub fn new(page_width: f32, page_height: f32, scale: f32) -> Self {
        Self { page_width, page_height, scale }
    }

    pub fn width_px(&self) -> f32 {
        self.page_width * self.scale
    }

    pub fn height_px(&self) -> f32 {
        self.page_height * self.scale
    }

    /// Unscaled document-to-viewport transform: flips Y so the origin is top-left.
    pub fn page_transform(&self) -> Matrix {
        Matrix([1.0, 0.0, 0.0, -1.0, 0.0, self.page_height])
    }

    pub fn to_viewport_point(&self, doc_x: f32, doc_y: f32) -> (f32, f32) {
        to_viewport_point(&self.page_transform(), self.scale, doc_x, doc_y)
    }
}

/// Converts a document-space point into viewport pixels.
///
/// Non-finite inputs propagate as `NaN`; callers check `is_finite` on the result.
pub fn to_viewport_point(transform: &Matrix, scale: f32, doc_x: f32, doc_y: f32) -> (f32, f32) {
    let (x, y) = transform.apply(doc_x, doc_y);
    (x * scale, y * scale)
}

/// Approximate glyph height in pixels, taken from the run's vertical scale.
pub fn approximate_glyph_height(run_transform: &Matrix, scale: f32) -> f32 {
    run_transform.scale_y().abs() * scale
}

/// Screen position of a run's top-left corner.
///
/// The run transform anchors the baseline; the top edge is the baseline minus the
/// approximate glyph height since real ascent data is not available.
pub fn top_left_anchor(viewport: &Viewport, run_transform: &Matrix) -> (f32, f32) {
    let (x, baseline_y) =
        viewport.to_viewport_point(run_transform.translate_x(), run_transform.translate_y());
    (x, baseline_y - approximate_glyph_height(run_transform, viewport.scale))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ScreenRect {
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }
}
