//! Pixel geometry for generation requests.
//!
//! Converts a `"W/H"` aspect ratio and a base size into pixel dimensions that
//! an inference backend accepts. Backends differ in the multiple they require,
//! so the flooring granularity is always passed explicitly.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Parsed `"W/H"` aspect ratio with positive, finite sides.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AspectRatio {
    width: f64,
    height: f64,
}

impl AspectRatio {
    pub const SQUARE: AspectRatio = AspectRatio {
        width: 1.0,
        height: 1.0,
    };
    pub const LANDSCAPE: AspectRatio = AspectRatio {
        width: 16.0,
        height: 9.0,
    };
    pub const PORTRAIT: AspectRatio = AspectRatio {
        width: 9.0,
        height: 16.0,
    };

    pub fn new(width: f64, height: f64) -> Result<Self> {
        if width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0 {
            Ok(Self { width, height })
        } else {
            Err(Error::InvalidAspectRatio(format!("{}/{}", width, height)))
        }
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self::SQUARE
    }
}

impl FromStr for AspectRatio {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidAspectRatio(s.to_string());

        let (w, h) = s.trim().split_once('/').ok_or_else(invalid)?;
        let width: f64 = w.trim().parse().map_err(|_| invalid())?;
        let height: f64 = h.trim().parse().map_err(|_| invalid())?;

        Self::new(width, height).map_err(|_| invalid())
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.width, self.height)
    }
}

/// Multiple that generated dimensions are floored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Granularity(u32);

impl Granularity {
    /// Used when sizing batch requests from an aspect ratio.
    pub const CLIENT: Granularity = Granularity(16);
    /// Used by the generation proxy on caller-provided sizes.
    pub const PROXY: Granularity = Granularity(64);

    pub fn new(step: u32) -> Result<Self> {
        if step == 0 {
            return Err(Error::Configuration(
                "Dimension granularity must be positive".to_string(),
            ));
        }
        Ok(Self(step))
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    /// Largest multiple of the granularity not exceeding `value`.
    pub fn floor(&self, value: u32) -> u32 {
        (value / self.0) * self.0
    }
}

impl FromStr for Granularity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let step = s
            .trim()
            .parse::<u32>()
            .map_err(|_| Error::Configuration(format!("Invalid granularity '{}'", s)))?;
        Self::new(step)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Rejects dimensions where flooring collapsed a side to zero.
    pub fn ensure_positive(self) -> Result<Self> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        Ok(self)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Scale `ratio` so its area matches `base_size`², then floor both sides to
/// `granularity`.
///
/// The result may contain a zero side for extreme ratios; callers run
/// [`Dimensions::ensure_positive`] before issuing a request.
pub fn compute_dimensions(
    ratio: &AspectRatio,
    base_size: u32,
    granularity: Granularity,
) -> Dimensions {
    let scale = f64::from(base_size) / (ratio.width * ratio.height).sqrt();
    // `as` saturates, so absurd inputs clamp instead of wrapping.
    let width = (ratio.width * scale).round() as u32;
    let height = (ratio.height * scale).round() as u32;

    Dimensions {
        width: granularity.floor(width),
        height: granularity.floor(height),
    }
}

/// Floor already-chosen dimensions to `granularity`.
pub fn snap_dimensions(dimensions: Dimensions, granularity: Granularity) -> Dimensions {
    Dimensions {
        width: granularity.floor(dimensions.width),
        height: granularity.floor(dimensions.height),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_square_at_512_is_exact() {
        let dims = compute_dimensions(&AspectRatio::SQUARE, 512, Granularity::CLIENT);
        assert_eq!(dims, Dimensions::new(512, 512));
    }

    #[test]
    fn test_landscape_is_wider_and_aligned() {
        let ratio: AspectRatio = "16/9".parse().unwrap();
        let dims = compute_dimensions(&ratio, 512, Granularity::CLIENT);

        assert!(dims.width > dims.height);
        assert_eq!(dims.width % 16, 0);
        assert_eq!(dims.height % 16, 0);
        assert_eq!(dims, Dimensions::new(672, 384));
    }

    #[test]
    fn test_portrait_mirrors_landscape() {
        let dims = compute_dimensions(&AspectRatio::PORTRAIT, 512, Granularity::CLIENT);
        assert_eq!(dims, Dimensions::new(384, 672));
    }

    #[test]
    fn test_proxy_granularity_floors_to_64() {
        let dims = compute_dimensions(&AspectRatio::LANDSCAPE, 512, Granularity::PROXY);
        assert_eq!(dims, Dimensions::new(640, 384));
    }

    #[test]
    fn test_results_are_multiples_of_granularity() {
        let ratios = ["1/1", "16/9", "9/16", "4/3", "3/2", "21/9", "1/7", "5/4"];
        let sizes = [64, 256, 512, 768, 1000, 1024];

        for granularity in [Granularity::CLIENT, Granularity::PROXY] {
            for ratio in ratios {
                let ratio: AspectRatio = ratio.parse().unwrap();
                for size in sizes {
                    let dims = compute_dimensions(&ratio, size, granularity);
                    assert_eq!(dims.width % granularity.get(), 0, "{} @ {}", ratio, size);
                    assert_eq!(dims.height % granularity.get(), 0, "{} @ {}", ratio, size);
                }
            }
        }
    }

    #[test]
    fn test_extreme_ratio_collapses_and_is_rejected() {
        let ratio: AspectRatio = "100/1".parse().unwrap();
        let dims = compute_dimensions(&ratio, 64, Granularity::CLIENT);

        assert_eq!(dims.height, 0);
        assert!(matches!(
            dims.ensure_positive(),
            Err(Error::InvalidDimensions { height: 0, .. })
        ));
    }

    #[test]
    fn test_parse_rejects_malformed_ratios() {
        for input in ["", "16", "16:9", "0/1", "1/0", "-1/1", "a/b", "1/inf"] {
            assert!(
                input.parse::<AspectRatio>().is_err(),
                "expected '{}' to be rejected",
                input
            );
        }
    }

    #[test]
    fn test_parse_accepts_fractional_sides() {
        let ratio: AspectRatio = "2.39/1".parse().unwrap();
        assert_eq!(ratio.width(), 2.39);
        assert_eq!(ratio.to_string(), "2.39/1");
    }

    #[test]
    fn test_zero_granularity_is_rejected() {
        assert!(Granularity::new(0).is_err());
        assert!("0".parse::<Granularity>().is_err());
        assert_eq!("32".parse::<Granularity>().unwrap().get(), 32);
    }

    #[test]
    fn test_snap_dimensions() {
        let snapped = snap_dimensions(Dimensions::new(768, 700), Granularity::PROXY);
        assert_eq!(snapped, Dimensions::new(768, 640));
    }
}
