//! Utilities to approximate equality of floating point values.
//!
//! Accelerated results only have to match the CPU reference within
//! [`F32_TOLERANCE`]; [`all_close`] applies that bound to whole buffers.

/// Absolute tolerance between accelerated and reference `f32` results.
pub const F32_TOLERANCE: f32 = 1e-4;

/// The max epsilon accepted on `f32`s.
pub const F32_MAX_ERROR: f32 = 1e-3;

/// The best expected epsilon accepted on `f32`s.
pub const F32_MIN_ERROR: f32 = 1e-6;

/// The max epsilon accepted on `f64`s.
pub const F64_MAX_ERROR: f64 = 1e-3;

/// The best expected epsilon accepted on `f64`s.
pub const F64_MIN_ERROR: f64 = 1e-13;

/// Largest absolute element-wise difference, or `None` if the lengths differ.
///
/// ```
/// use accel_engine::approx::max_abs_diff;
/// assert_eq!(max_abs_diff(&[1.0, 2.0], &[1.0, 2.5]), Some(0.5));
/// assert_eq!(max_abs_diff(&[1.0], &[]), None);
/// ```
#[must_use]
pub fn max_abs_diff(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }
    Some(a.iter().zip(b).map(|(x, y)| (x - y).abs()).fold(0.0, f32::max))
}

/// Whether `a` and `b` have equal lengths and agree within `tolerance`.
#[must_use]
pub fn all_close(a: &[f32], b: &[f32], tolerance: f32) -> bool {
    max_abs_diff(a, b).is_some_and(|d| d <= tolerance)
}

/// How closely two values agree.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ApproxEquality {
    /// Within the best expected epsilon.
    Precise = 0,
    /// Within the accepted epsilon.
    Relative = 1,
    /// No meaningful agreement.
    Scarce = 2,
}

/// Grades the distance between two values.
pub trait RelativeEq<Rhs: ?Sized> {
    /// Grades `self` against `rhs`.
    fn approx_eq(&self, rhs: &Rhs) -> ApproxEquality;
}

impl RelativeEq<Self> for f32 {
    fn approx_eq(&self, rhs: &Self) -> ApproxEquality {
        match (self - rhs).abs() {
            d if d < F32_MIN_ERROR => ApproxEquality::Precise,
            d if d < F32_MAX_ERROR => ApproxEquality::Relative,
            _ => ApproxEquality::Scarce,
        }
    }
}

impl RelativeEq<Self> for f64 {
    fn approx_eq(&self, rhs: &Self) -> ApproxEquality {
        match (self - rhs).abs() {
            d if d < F64_MIN_ERROR => ApproxEquality::Precise,
            d if d < F64_MAX_ERROR => ApproxEquality::Relative,
            _ => ApproxEquality::Scarce,
        }
    }
}

/// Slices are graded by their worst element; different lengths are `Scarce`.
impl<T: RelativeEq<U>, U> RelativeEq<[U]> for [T] {
    fn approx_eq(&self, rhs: &[U]) -> ApproxEquality {
        if self.len() != rhs.len() {
            return ApproxEquality::Scarce;
        }
        self.iter()
            .zip(rhs)
            .map(|(t, u)| t.approx_eq(u))
            .max()
            .unwrap_or(ApproxEquality::Precise)
    }
}

/// Whether `a` and `b` agree within the accepted epsilon.
pub fn approx_eq<A: RelativeEq<B> + ?Sized, B: ?Sized>(a: &A, b: &B) -> bool {
    a.approx_eq(b) != ApproxEquality::Scarce
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grades_by_worst_element() {
        let a = [1.0f32, 2.0, 3.0];
        assert_eq!(a[..].approx_eq(&[1.0f32, 2.0, 3.0][..]), ApproxEquality::Precise);
        assert_eq!(a[..].approx_eq(&[1.0f32, 2.0001, 3.0][..]), ApproxEquality::Relative);
        assert_eq!(a[..].approx_eq(&[1.0f32, 2.5, 3.0][..]), ApproxEquality::Scarce);
        assert_eq!(a[..].approx_eq(&[1.0f32][..]), ApproxEquality::Scarce);
    }

    #[test]
    fn tolerance_check() {
        assert!(all_close(&[1.0, 2.0], &[1.00005, 2.0], F32_TOLERANCE));
        assert!(!all_close(&[1.0, 2.0], &[1.001, 2.0], F32_TOLERANCE));
        assert!(approx_eq(&0.1f64, &(0.3 - 0.2)));
    }
}
