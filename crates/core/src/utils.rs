//! Shared geometry helpers.
//!
//! Matrices are 3x2 affine maps stored as (a, b, c, d, e, f); the implicit
//! third row is (0, 0, 1).

/// A point in user or device space.
pub type Point = (f64, f64);

/// A rectangle as (x0, y0, x1, y1).
pub type Rect = (f64, f64, f64, f64);

/// A 3x2 affine transformation matrix (a, b, c, d, e, f).
pub type Matrix = (f64, f64, f64, f64, f64, f64);

/// The identity matrix.
pub const MATRIX_IDENTITY: Matrix = (1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

/// Multiply two matrices: returns m1 * m0 (m1 applied first).
pub fn mult_matrix(m1: Matrix, m0: Matrix) -> Matrix {
    let (a1, b1, c1, d1, e1, f1) = m1;
    let (a0, b0, c0, d0, e0, f0) = m0;
    (
        a0 * a1 + c0 * b1,
        b0 * a1 + d0 * b1,
        a0 * c1 + c0 * d1,
        b0 * c1 + d0 * d1,
        a0 * e1 + c0 * f1 + e0,
        b0 * e1 + d0 * f1 + f0,
    )
}

/// Translate a matrix by a vector.
pub fn translate_matrix(m: Matrix, v: Point) -> Matrix {
    let (a, b, c, d, e, f) = m;
    let (x, y) = v;
    (a, b, c, d, x * a + y * c + e, x * b + y * d + f)
}

/// Apply a matrix to a point.
pub fn apply_matrix_pt(m: Matrix, v: Point) -> Point {
    let (a, b, c, d, e, f) = m;
    let (x, y) = v;
    (a * x + c * y + e, b * x + d * y + f)
}

/// Apply only the linear part of a matrix to a vector.
///
/// Equivalent to apply_matrix_pt(m, v) - apply_matrix_pt(m, (0, 0)).
pub fn apply_matrix_norm(m: Matrix, v: Point) -> Point {
    let (a, b, c, d, _, _) = m;
    let (x, y) = v;
    (a * x + c * y, b * x + d * y)
}

/// Normalize a rectangle so that x0 <= x1 and y0 <= y1.
pub fn normalize_rect(r: Rect) -> Rect {
    let (x0, y0, x1, y1) = r;
    (x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_neutral() {
        let m = (2.0, 0.0, 0.0, 3.0, 5.0, 7.0);
        assert_eq!(mult_matrix(m, MATRIX_IDENTITY), m);
        assert_eq!(mult_matrix(MATRIX_IDENTITY, m), m);
    }

    #[test]
    fn apply_translation() {
        let m = translate_matrix(MATRIX_IDENTITY, (10.0, 20.0));
        assert_eq!(apply_matrix_pt(m, (1.0, 2.0)), (11.0, 22.0));
    }

    #[test]
    fn norm_ignores_translation() {
        let m = (2.0, 0.0, 0.0, 2.0, 100.0, 100.0);
        assert_eq!(apply_matrix_norm(m, (3.0, 4.0)), (6.0, 8.0));
    }
}
