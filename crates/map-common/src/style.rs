//! Severity-driven feature styling.
//!
//! Alert polygons are colored by severity through a fixed lookup table.
//! Fill is drawn at 20% opacity, stroke at full opacity, and the severity's
//! rank doubles as the feature z-order so that the most severe polygon is
//! drawn (and hit-tested) on top.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opacity of severity fills.
pub const FILL_OPACITY: f64 = 0.2;

/// Stroke width of an unhighlighted alert polygon.
pub const BASE_STROKE_WIDTH: f64 = 2.0;

/// Stroke width of the highlighted feature.
pub const HIGHLIGHT_STROKE_WIDTH: f64 = 5.0;

/// Width of the black outline pass drawn beneath a highlighted feature.
pub const OUTLINE_STROKE_WIDTH: f64 = 7.0;

/// Z-order of the highlight pass; above every severity.
pub const HIGHLIGHT_Z_INDEX: i32 = 10;

/// Z-order of the outline pass beneath the highlight.
pub const OUTLINE_Z_INDEX: i32 = 1;

/// Alert severity classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Unknown,
    Minor,
    Moderate,
    Severe,
    Extreme,
}

impl Severity {
    /// Parse a severity label case-insensitively. Anything unrecognized,
    /// including an absent label, is `Unknown`.
    pub fn from_label(label: Option<&str>) -> Self {
        label
            .and_then(|l| l.parse().ok())
            .unwrap_or(Severity::Unknown)
    }

    pub fn rgb(&self) -> Rgb {
        match self {
            Severity::Extreme => Rgb::new(255, 69, 0),
            Severity::Severe => Rgb::new(255, 165, 0),
            Severity::Moderate => Rgb::new(255, 255, 0),
            Severity::Minor => Rgb::new(0, 255, 0),
            Severity::Unknown => Rgb::new(0, 100, 255),
        }
    }

    pub fn z_order(&self) -> i32 {
        match self {
            Severity::Extreme => 4,
            Severity::Severe => 3,
            Severity::Moderate => 2,
            Severity::Minor => 1,
            Severity::Unknown => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Extreme => "Extreme",
            Severity::Severe => "Severe",
            Severity::Moderate => "Moderate",
            Severity::Minor => "Minor",
            Severity::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "EXTREME" => Ok(Severity::Extreme),
            "SEVERE" => Ok(Severity::Severe),
            "MODERATE" => Ok(Severity::Moderate),
            "MINOR" => Ok(Severity::Minor),
            "UNKNOWN" => Ok(Severity::Unknown),
            _ => Err(()),
        }
    }
}

/// An opaque RGB triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn with_alpha(self, a: f64) -> Rgba {
        Rgba {
            r: self.r,
            g: self.g,
            b: self.b,
            a: a.clamp(0.0, 1.0),
        }
    }
}

/// RGB plus a 0..=1 alpha, formatted like a CSS `rgba()` value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Rgba {
    pub fn rgb(&self) -> Rgb {
        Rgb::new(self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub color: Rgba,
    pub width: f64,
}

/// One drawing pass of a feature. A feature may be drawn with several passes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<Rgba>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<Stroke>,
    pub z_index: i32,
}

/// Pure mapping from severity to feature styles.
#[derive(Debug, Clone, Copy, Default)]
pub struct StyleResolver;

impl StyleResolver {
    /// Base style of an alert polygon with the given severity label.
    pub fn resolve(label: Option<&str>) -> FeatureStyle {
        Self::resolve_severity(Severity::from_label(label))
    }

    pub fn resolve_severity(severity: Severity) -> FeatureStyle {
        let rgb = severity.rgb();
        FeatureStyle {
            fill: Some(rgb.with_alpha(FILL_OPACITY)),
            stroke: Some(Stroke {
                color: rgb.with_alpha(1.0),
                width: BASE_STROKE_WIDTH,
            }),
            z_index: severity.z_order(),
        }
    }

    /// Highlight passes for a feature whose base style is `base`: a black
    /// outline beneath, then the base colors with a wider stroke on top.
    pub fn resolve_highlight(base: &FeatureStyle) -> Vec<FeatureStyle> {
        let outline = FeatureStyle {
            fill: None,
            stroke: Some(Stroke {
                color: Rgb::BLACK.with_alpha(1.0),
                width: OUTLINE_STROKE_WIDTH,
            }),
            z_index: OUTLINE_Z_INDEX,
        };
        let highlight = FeatureStyle {
            fill: base.fill,
            stroke: base.stroke.map(|s| Stroke {
                color: s.color,
                width: HIGHLIGHT_STROKE_WIDTH,
            }),
            z_index: HIGHLIGHT_Z_INDEX,
        };
        vec![outline, highlight]
    }

    /// Style of a forecast grid-cell polygon (the map library's default look).
    pub fn forecast_style() -> FeatureStyle {
        FeatureStyle {
            fill: Some(Rgb::new(255, 255, 255).with_alpha(0.4)),
            stroke: Some(Stroke {
                color: Rgb::new(51, 153, 204).with_alpha(1.0),
                width: 1.25,
            }),
            z_index: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_parse_is_case_insensitive() {
        assert_eq!(Severity::from_label(Some("severe")), Severity::Severe);
        assert_eq!(Severity::from_label(Some("EXTREME")), Severity::Extreme);
        assert_eq!(Severity::from_label(Some("Bogus")), Severity::Unknown);
        assert_eq!(Severity::from_label(None), Severity::Unknown);
    }

    #[test]
    fn test_rgba_display() {
        let c = Rgb::new(255, 165, 0).with_alpha(0.2);
        assert_eq!(c.to_string(), "rgba(255, 165, 0, 0.2)");
    }

    #[test]
    fn test_highlight_preserves_colors() {
        let base = StyleResolver::resolve(Some("Moderate"));
        let passes = StyleResolver::resolve_highlight(&base);
        assert_eq!(passes.len(), 2);
        assert_eq!(passes[1].fill, base.fill);
        assert_eq!(passes[1].stroke.unwrap().color, base.stroke.unwrap().color);
    }
}
