//! Image selection thresholds and the pure predicate applied during the scan.
//!
//! The dimension rule is deliberately permissive: an image is only dropped
//! when it is small in *both* directions, so a wide figure strip of
//! 1200×300 survives a 400×400 floor. The byte floor weeds out icons and
//! logos that PDFs tend to repeat on every page, and the aspect-ratio cap
//! drops rules, bars and other letterbox-shaped decorations.

use crate::error::DigestError;
use serde::{Deserialize, Serialize};

/// Thresholds governing which embedded images are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionCriteria {
    /// Width floor in pixels (see module docs for the either/or rule).
    pub min_width: u32,
    /// Height floor in pixels.
    pub min_height: u32,
    /// Encoded images of this many bytes or fewer are rejected.
    pub min_bytes: usize,
    /// Largest accepted `long side / short side`. Must be > 1.
    pub max_aspect_ratio: f64,
    /// The scan stops once this many images were accepted.
    pub max_count: usize,
}

impl Default for SelectionCriteria {
    fn default() -> Self {
        Self {
            min_width: 400,
            min_height: 400,
            min_bytes: 2048,
            max_aspect_ratio: 8.0,
            max_count: 5,
        }
    }
}

/// Why an image was not selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Below both the width and the height floor (or zero-sized).
    TooSmall,
    /// Encoded bytes at or below `min_bytes`.
    TooFewBytes,
    /// Wider or taller than `max_aspect_ratio` allows.
    ExtremeAspect,
}

impl SelectionCriteria {
    pub(crate) fn validate(&self) -> Result<(), DigestError> {
        if !(self.max_aspect_ratio > 1.0) {
            return Err(DigestError::InvalidConfig(format!(
                "max_aspect_ratio must be > 1, got {}",
                self.max_aspect_ratio
            )));
        }
        Ok(())
    }

    /// Dimension rule, checked before any bytes are extracted.
    pub fn check_dimensions(&self, width: u32, height: u32) -> Result<(), Rejection> {
        if width == 0 || height == 0 {
            return Err(Rejection::TooSmall);
        }
        if width < self.min_width && height < self.min_height {
            return Err(Rejection::TooSmall);
        }
        Ok(())
    }

    /// Byte-length and aspect-ratio rules, checked on the extracted image.
    pub fn check_extracted(&self, width: u32, height: u32, byte_len: usize) -> Result<(), Rejection> {
        if byte_len <= self.min_bytes {
            return Err(Rejection::TooFewBytes);
        }
        let (w, h) = (f64::from(width), f64::from(height));
        if w / h > self.max_aspect_ratio || h / w > self.max_aspect_ratio {
            return Err(Rejection::ExtremeAspect);
        }
        Ok(())
    }

    /// The full predicate.
    pub fn check(&self, width: u32, height: u32, byte_len: usize) -> Result<(), Rejection> {
        self.check_dimensions(width, height)?;
        self.check_extracted(width, height, byte_len)
    }

    pub fn accepts(&self, width: u32, height: u32, byte_len: usize) -> bool {
        self.check(width, height, byte_len).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KB: usize = 1024;

    fn scenario_criteria() -> SelectionCriteria {
        SelectionCriteria {
            min_width: 400,
            min_height: 400,
            min_bytes: 20 * KB,
            max_aspect_ratio: 8.0,
            max_count: 5,
        }
    }

    #[test]
    fn scenario_three_page_one_images() {
        let c = scenario_criteria();
        assert_eq!(c.check(500, 500, 600 * KB), Ok(()));
        assert_eq!(c.check(100, 100, 10 * KB), Err(Rejection::TooSmall));
        assert_eq!(c.check(4000, 100, 50 * KB), Err(Rejection::ExtremeAspect));
    }

    #[test]
    fn one_dimension_is_enough() {
        let c = SelectionCriteria::default();
        assert!(c.check_dimensions(1200, 300).is_ok());
        assert!(c.check_dimensions(300, 1200).is_ok());
        assert!(c.check_dimensions(399, 399).is_err());
    }

    #[test]
    fn byte_floor_is_exclusive() {
        let c = SelectionCriteria::default();
        assert_eq!(c.check(500, 500, 2048), Err(Rejection::TooFewBytes));
        assert!(c.accepts(500, 500, 2049));
    }

    #[test]
    fn aspect_limit_is_inclusive() {
        let c = SelectionCriteria::default();
        assert!(c.accepts(3200, 400, 10 * KB));
        assert_eq!(c.check(3201, 400, 10 * KB), Err(Rejection::ExtremeAspect));
        assert_eq!(c.check(400, 3201, 10 * KB), Err(Rejection::ExtremeAspect));
    }

    #[test]
    fn zero_sized_never_passes() {
        let c = SelectionCriteria {
            min_width: 0,
            min_height: 0,
            ..SelectionCriteria::default()
        };
        assert_eq!(c.check_dimensions(0, 500), Err(Rejection::TooSmall));
    }

    #[test]
    fn tightening_never_admits_more() {
        let samples = [
            (500, 500, 600 * KB),
            (800, 90, 40 * KB),
            (1000, 100, 30 * KB),
            (450, 450, 3 * KB),
            (2000, 300, 100 * KB),
        ];
        let loose = SelectionCriteria::default();
        let count = |c: &SelectionCriteria| samples.iter().filter(|(w, h, b)| c.accepts(*w, *h, *b)).count();

        let mut prev = count(&loose);
        for min_bytes in [4 * KB, 35 * KB, 200 * KB] {
            let c = SelectionCriteria { min_bytes, ..loose.clone() };
            let n = count(&c);
            assert!(n <= prev);
            prev = n;
        }

        let mut prev = count(&loose);
        for ratio in [7.0, 5.0, 2.0, 1.01] {
            let c = SelectionCriteria { max_aspect_ratio: ratio, ..loose.clone() };
            let n = count(&c);
            assert!(n <= prev);
            prev = n;
        }
    }
}
