//! Mapping policies: how a normalized value becomes a color.

use heatmap_common::Rgba;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pale yellow end of the heat ramp.
pub const HEAT_LOW: Rgba = Rgba::opaque(0xFF, 0xFF, 0x00);
/// Orange midpoint of the heat ramp.
pub const HEAT_MID: Rgba = Rgba::opaque(0xFF, 0x8C, 0x00);
/// Deep red, the extreme-high color of the heat ramp.
pub const HEAT_HIGH: Rgba = Rgba::opaque(0xB3, 0x00, 0x00);

/// Invalid policy parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    #[error("hide_below must be a finite fraction in [0, 1], got {0}")]
    HideBelowOutOfRange(f64),

    #[error("discrete policy needs at least one class")]
    NoClasses,

    #[error("class bounds must be finite and strictly ascending (class {index} has lower bound {lower})")]
    UnorderedClasses { index: usize, lower: f64 },
}

/// One class of a discrete policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorClass {
    /// Inclusive lower bound in data units.
    pub lower: f64,
    pub color: Rgba,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl ColorClass {
    pub fn new(lower: f64, color: Rgba) -> Self {
        Self {
            lower,
            color,
            label: None,
        }
    }

    pub fn labeled(lower: f64, color: Rgba, label: impl Into<String>) -> Self {
        Self {
            lower,
            color,
            label: Some(label.into()),
        }
    }
}

/// The four color behaviors, each carrying its own parameters.
///
/// `hide_below` is a fraction of the data range: values under
/// `min + (max - min) * hide_below` are not drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MappingPolicy {
    /// Two-segment ramp `low -> mid -> high` over the visible tail.
    ThresholdGradient {
        hide_below: f64,
        #[serde(default = "default_low")]
        low: Rgba,
        #[serde(default = "default_mid")]
        mid: Rgba,
        #[serde(default = "default_high")]
        high: Rgba,
    },
    /// Fixed class bounds in data units; the data range is ignored.
    DiscreteClasses { classes: Vec<ColorClass> },
    /// Four equal bands of the normalized value, one color each.
    BucketedGradient { hide_below: f64, buckets: [Rgba; 4] },
    /// Per-channel blend between two endpoint colors.
    TwoColorGradient {
        hide_below: f64,
        start: Rgba,
        end: Rgba,
    },
}

fn default_low() -> Rgba {
    HEAT_LOW
}

fn default_mid() -> Rgba {
    HEAT_MID
}

fn default_high() -> Rgba {
    HEAT_HIGH
}

impl MappingPolicy {
    /// Heat ramp with the default yellow/orange/red stops.
    pub fn threshold_gradient(hide_below: f64) -> Self {
        MappingPolicy::ThresholdGradient {
            hide_below,
            low: HEAT_LOW,
            mid: HEAT_MID,
            high: HEAT_HIGH,
        }
    }

    pub fn discrete(classes: Vec<ColorClass>) -> Self {
        MappingPolicy::DiscreteClasses { classes }
    }

    pub fn bucketed(hide_below: f64, buckets: [Rgba; 4]) -> Self {
        MappingPolicy::BucketedGradient {
            hide_below,
            buckets,
        }
    }

    pub fn two_color(hide_below: f64, start: Rgba, end: Rgba) -> Self {
        MappingPolicy::TwoColorGradient {
            hide_below,
            start,
            end,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MappingPolicy::ThresholdGradient { .. } => "threshold_gradient",
            MappingPolicy::DiscreteClasses { .. } => "discrete_classes",
            MappingPolicy::BucketedGradient { .. } => "bucketed_gradient",
            MappingPolicy::TwoColorGradient { .. } => "two_color_gradient",
        }
    }

    /// Visibility fraction, `None` for discrete classes.
    pub fn hide_below(&self) -> Option<f64> {
        match self {
            MappingPolicy::ThresholdGradient { hide_below, .. }
            | MappingPolicy::BucketedGradient { hide_below, .. }
            | MappingPolicy::TwoColorGradient { hide_below, .. } => Some(*hide_below),
            MappingPolicy::DiscreteClasses { .. } => None,
        }
    }

    /// True when the policy ignores the data range.
    pub fn is_range_independent(&self) -> bool {
        matches!(self, MappingPolicy::DiscreteClasses { .. })
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        if let Some(fraction) = self.hide_below() {
            if !fraction.is_finite() || !(0.0..=1.0).contains(&fraction) {
                return Err(PolicyError::HideBelowOutOfRange(fraction));
            }
        }

        if let MappingPolicy::DiscreteClasses { classes } = self {
            if classes.is_empty() {
                return Err(PolicyError::NoClasses);
            }
            let mut previous = f64::NEG_INFINITY;
            for (index, class) in classes.iter().enumerate() {
                if !class.lower.is_finite() || class.lower <= previous {
                    return Err(PolicyError::UnorderedClasses {
                        index,
                        lower: class.lower,
                    });
                }
                previous = class.lower;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_gradient_yaml_uses_default_stops() {
        let policy: MappingPolicy =
            serde_yaml::from_str("type: threshold_gradient\nhide_below: 0.7\n").unwrap();
        assert_eq!(policy, MappingPolicy::threshold_gradient(0.7));
    }

    #[test]
    fn test_discrete_json() {
        let json = r##"{
            "type": "discrete_classes",
            "classes": [
                {"lower": 1.33, "color": "#FDAE61", "label": "Moderate"},
                {"lower": 2.66, "color": "#D7191C"}
            ]
        }"##;
        let policy: MappingPolicy = serde_json::from_str(json).unwrap();
        match &policy {
            MappingPolicy::DiscreteClasses { classes } => {
                assert_eq!(classes.len(), 2);
                assert_eq!(classes[0].label.as_deref(), Some("Moderate"));
                assert_eq!(classes[1].color, Rgba::opaque(0xD7, 0x19, 0x1C));
            }
            other => panic!("unexpected policy {:?}", other),
        }
        assert!(policy.is_range_independent());
        assert_eq!(policy.hide_below(), None);
    }

    #[test]
    fn test_validate_hide_below() {
        assert!(MappingPolicy::threshold_gradient(0.0).validate().is_ok());
        assert!(MappingPolicy::threshold_gradient(1.0).validate().is_ok());
        assert_eq!(
            MappingPolicy::threshold_gradient(1.5).validate(),
            Err(PolicyError::HideBelowOutOfRange(1.5))
        );
        assert!(MappingPolicy::two_color(f64::NAN, HEAT_LOW, HEAT_HIGH)
            .validate()
            .is_err());
    }

    #[test]
    fn test_validate_classes() {
        assert_eq!(
            MappingPolicy::discrete(vec![]).validate(),
            Err(PolicyError::NoClasses)
        );
        let unordered = MappingPolicy::discrete(vec![
            ColorClass::new(2.0, HEAT_MID),
            ColorClass::new(2.0, HEAT_HIGH),
        ]);
        assert!(matches!(
            unordered.validate(),
            Err(PolicyError::UnorderedClasses { index: 1, .. })
        ));
    }
}
