//! 2-D affine transforms (3×3, column-major) and a save/restore stack.
//!
//! Every draw call carries an [`Affine`] that maps the vertices it
//! submits (page or document units) to clip space:
//!
//! ```text
//!  page ──translate(page origin)──► document
//!  document ──translate(-visible.origin)──► visible-local
//!  visible-local ──scale(2/w, -2/h)──► [0,2]×[0,-2]
//!  ──translate(-1, 1)──► clip ([-1,1]², +y up)
//! ```

use std::ops::Mul;

use log::warn;

use crate::geometry::{Point, Rect};

/// Column-major 3×3 affine matrix.
///
/// `columns[2]` holds the translation; the last row is always `(0, 0, 1)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine {
    columns: [[f32; 3]; 3],
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Affine {
    pub const IDENTITY: Affine = Affine {
        columns: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    };

    pub fn translate(dx: f32, dy: f32) -> Self {
        Self {
            columns: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [dx, dy, 1.0]],
        }
    }

    pub fn scale(sx: f32, sy: f32) -> Self {
        Self {
            columns: [[sx, 0.0, 0.0], [0.0, sy, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    /// Map `rect` onto clip space: its top-left lands on (-1, 1) and its
    /// bottom-right on (1, -1).
    pub fn rect_to_clip(rect: &Rect) -> Self {
        if rect.is_empty() {
            warn!("rect_to_clip called with empty rect {rect}");
            return Self::IDENTITY;
        }
        Affine::translate(-1.0, 1.0)
            * Affine::scale(2.0 / rect.size.width, -2.0 / rect.size.height)
            * Affine::translate(-rect.origin.x, -rect.origin.y)
    }

    pub fn columns(&self) -> [[f32; 3]; 3] {
        self.columns
    }

    pub fn transform_point(&self, p: Point) -> Point {
        let c = &self.columns;
        Point::new(
            c[0][0] * p.x + c[1][0] * p.y + c[2][0],
            c[0][1] * p.x + c[1][1] * p.y + c[2][1],
        )
    }

    /// `self` followed by a translation, i.e. `self * translate(dx, dy)`.
    pub fn pre_translate(&self, dx: f32, dy: f32) -> Self {
        *self * Affine::translate(dx, dy)
    }
}

/// `a * b` applies `b` first, then `a`.
impl Mul for Affine {
    type Output = Affine;

    fn mul(self, rhs: Affine) -> Affine {
        let a = &self.columns;
        let b = &rhs.columns;
        let mut out = [[0.0f32; 3]; 3];
        for (col, out_col) in out.iter_mut().enumerate() {
            for (row, cell) in out_col.iter_mut().enumerate() {
                *cell = a[0][row] * b[col][0] + a[1][row] * b[col][1] + a[2][row] * b[col][2];
            }
        }
        Affine { columns: out }
    }
}

// ───────────────────────────────────────────────────────────────────
// TransformStack
// ───────────────────────────────────────────────────────────────────

/// Save/restore stack of transforms. Never empty.
#[derive(Clone, Debug)]
pub struct TransformStack {
    stack: Vec<Affine>,
}

impl Default for TransformStack {
    fn default() -> Self {
        Self::new(Affine::IDENTITY)
    }
}

impl TransformStack {
    pub fn new(base: Affine) -> Self {
        Self { stack: vec![base] }
    }

    pub fn current(&self) -> Affine {
        self.stack.last().copied().unwrap_or_default()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn save(&mut self) {
        let top = self.current();
        self.stack.push(top);
    }

    /// Pop the last `save`. An unbalanced restore is logged and ignored.
    pub fn restore(&mut self) {
        if self.stack.len() < 2 {
            warn!("TransformStack::restore without matching save");
            return;
        }
        self.stack.pop();
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.apply(Affine::translate(dx, dy));
    }

    pub fn scale(&mut self, sx: f32, sy: f32) {
        self.apply(Affine::scale(sx, sy));
    }

    fn apply(&mut self, m: Affine) {
        if let Some(top) = self.stack.last_mut() {
            *top = *top * m;
        }
    }
}

// ===================================================================
// Tests
// ===================================================================
