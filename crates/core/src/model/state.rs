//! Graphics and text state for the content interpreter.

use crate::font::pdffont::Font;
use crate::utils::{Matrix, Point, Rect, MATRIX_IDENTITY};
use std::sync::Arc;

/// Text state - positioning and rendering parameters for text operators.
#[derive(Debug, Clone)]
pub struct TextState {
    /// Current font (None until the first Tf)
    pub font: Option<Arc<Font>>,
    /// Font size in text space units
    pub fontsize: f64,
    /// Character spacing (Tc)
    pub charspace: f64,
    /// Word spacing (Tw), applied to single-byte code 32
    pub wordspace: f64,
    /// Horizontal scaling percentage (Tz, 100 = normal)
    pub scaling: f64,
    /// Text leading (TL)
    pub leading: f64,
    /// Text rendering mode (Tr, 0-7)
    pub render: i32,
    /// Text rise (Ts)
    pub rise: f64,
    /// Text matrix (Tm)
    pub matrix: Matrix,
    /// Text line matrix - start of the current line
    pub linematrix: Matrix,
}

impl TextState {
    pub fn new() -> Self {
        Self {
            font: None,
            fontsize: 0.0,
            charspace: 0.0,
            wordspace: 0.0,
            scaling: 100.0,
            leading: 0.0,
            render: 0,
            rise: 0.0,
            matrix: MATRIX_IDENTITY,
            linematrix: MATRIX_IDENTITY,
        }
    }

    /// Reset text and line matrices to identity.
    ///
    /// Called at BT.
    pub fn reset(&mut self) {
        self.matrix = MATRIX_IDENTITY;
        self.linematrix = MATRIX_IDENTITY;
    }
}

impl Default for TextState {
    fn default() -> Self {
        Self::new()
    }
}

/// Graphics state - the subset of the full PDF graphics state that text
/// extraction consumes. Saved and restored by q/Q as a value type.
#[derive(Debug, Clone)]
pub struct GraphicsState {
    /// Current transformation matrix
    pub ctm: Matrix,
    /// Text state travels with the graphics state through q/Q
    pub textstate: TextState,
}

impl GraphicsState {
    pub fn new(ctm: Matrix) -> Self {
        Self {
            ctm,
            textstate: TextState::new(),
        }
    }
}

/// A run of decoded text sharing one font and one uninterrupted placement.
///
/// Coordinates are device space; (x0, y0) is the baseline left.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    /// Decoded Unicode text
    pub text: String,
    /// Font size in device units
    pub font_size: f64,
    /// Font base name, when the font dictionary exposed one
    pub font_name: Option<String>,
    /// Device-space bounding box (x0, y0, x1, y1), origin at baseline left
    pub bbox: Rect,
    /// Marked-content identifier active when the span was emitted
    pub mcid: Option<u32>,
}

impl TextSpan {
    pub fn x0(&self) -> f64 {
        self.bbox.0
    }

    pub fn y0(&self) -> f64 {
        self.bbox.1
    }

    pub fn x1(&self) -> f64 {
        self.bbox.2
    }

    pub fn y1(&self) -> f64 {
        self.bbox.3
    }

    pub fn width(&self) -> f64 {
        self.bbox.2 - self.bbox.0
    }

    pub fn height(&self) -> f64 {
        self.bbox.3 - self.bbox.1
    }

    /// Baseline origin in device space.
    pub fn origin(&self) -> Point {
        (self.bbox.0, self.bbox.1)
    }
}
