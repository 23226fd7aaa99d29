//! Window-level mapping of raw intensities onto the 8-bit display range.

use crate::error::ConfigurationError;

/// A validated window with its bounds precomputed.
///
/// The bounds carry the legacy half-unit offset:
/// `low = center - width / 2 + 0.5` and `high = center + width / 2 + 0.5`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowSpec {
    center: f64,
    width: f64,
    low: f64,
    high: f64,
}

impl WindowSpec {
    pub fn new(center: f64, width: f64) -> Result<Self, ConfigurationError> {
        if !center.is_finite() {
            return Err(ConfigurationError::InvalidWindowCenter(center));
        }
        if !width.is_finite() || width <= 0.0 {
            return Err(ConfigurationError::InvalidWindowWidth(width));
        }
        let low = center - width / 2.0 + 0.5;
        let high = center + width / 2.0 + 0.5;
        // A width below the resolution of `center` collapses the bounds.
        if high <= low {
            return Err(ConfigurationError::InvalidWindowWidth(width));
        }
        Ok(Self {
            center,
            width,
            low,
            high,
        })
    }

    pub fn center(&self) -> f64 {
        self.center
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    #[inline]
    pub fn apply(&self, value: i32) -> u8 {
        window_level(f64::from(value), self.low, self.high)
    }
}

/// Maps `value` linearly from `[low, high]` onto `[0, 255]`.
///
/// Out-of-window values clamp to the nearest end. The clamped value is
/// rounded half away from zero. Callers guarantee `high > low`.
#[inline]
pub fn window_level(value: f64, low: f64, high: f64) -> u8 {
    let scaled = (value - low) * 255.0 / (high - low);
    scaled.clamp(0.0, 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn bounds_carry_half_unit_offset() {
        let window = WindowSpec::new(50.0, 100.0).unwrap();
        assert_relative_eq!(window.low(), 0.5);
        assert_relative_eq!(window.high(), 100.5);
    }

    #[test]
    fn non_positive_width_is_rejected() {
        assert!(matches!(
            WindowSpec::new(0.0, 0.0),
            Err(ConfigurationError::InvalidWindowWidth(_))
        ));
        assert!(matches!(
            WindowSpec::new(0.0, -10.0),
            Err(ConfigurationError::InvalidWindowWidth(_))
        ));
        assert!(WindowSpec::new(0.0, f64::NAN).is_err());
        assert!(WindowSpec::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn non_finite_center_is_rejected() {
        assert!(matches!(
            WindowSpec::new(f64::NAN, 10.0),
            Err(ConfigurationError::InvalidWindowCenter(_))
        ));
    }

    #[test]
    fn clamp_boundaries() {
        let window = WindowSpec::new(50.0, 100.0).unwrap();
        let (low, high) = (window.low(), window.high());
        assert_eq!(window_level(low, low, high), 0);
        assert_eq!(window_level(high, low, high), 255);
        assert_eq!(window_level(low - 1000.0, low, high), 0);
        assert_eq!(window_level(high + 1000.0, low, high), 255);
    }

    #[test]
    fn rounds_to_nearest_gray_level() {
        let window = WindowSpec::new(50.0, 100.0).unwrap();
        // (20 - 0.5) * 2.55 = 49.725
        assert_eq!(window.apply(20), 50);
        // (80 - 0.5) * 2.55 = 202.725
        assert_eq!(window.apply(80), 203);
    }

    #[test]
    fn monotone_in_value() {
        let window = WindowSpec::new(-200.0, 731.0).unwrap();
        let mut previous = 0u8;
        for value in -1000..1000 {
            let gray = window.apply(value);
            assert!(gray >= previous, "gray dropped at {value}");
            previous = gray;
        }
        assert_eq!(previous, 255);
    }

    #[test]
    fn full_i16_range_stays_in_bounds() {
        let window = WindowSpec::new(1500.0, 3000.0).unwrap();
        assert_eq!(window.apply(i32::from(i16::MIN)), 0);
        assert_eq!(window.apply(i32::from(i16::MAX)), 255);
    }
}
