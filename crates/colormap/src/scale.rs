//! Built color scales.

use heatmap_common::{PixelColor, Rgba};

use crate::policy::MappingPolicy;

/// A pure `value -> color | transparent` function over a fixed domain.
///
/// Every scale owns its parameters outright: there is no interior mutability
/// and nothing is shared with other scales, so a scale built for one layer can
/// never change the colors of another.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorScale {
    policy: MappingPolicy,
    domain: Option<(f64, f64)>,
    eval: Evaluator,
}

/// Precomputed form of a policy for the per-pixel path.
#[derive(Debug, Clone, PartialEq)]
enum Evaluator {
    Transparent,
    Ramp {
        norm: Normalizer,
        low: Rgba,
        mid: Rgba,
        high: Rgba,
    },
    Classes(Vec<(f64, Rgba)>),
    Buckets {
        norm: Normalizer,
        colors: [Rgba; 4],
    },
    Blend {
        norm: Normalizer,
        start: Rgba,
        end: Rgba,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Normalizer {
    min: f64,
    span: f64,
    threshold: f64,
}

impl Normalizer {
    fn new(min: f64, max: f64, hide_below: f64) -> Self {
        let span = max - min;
        Self {
            min,
            span,
            threshold: min + span * hide_below,
        }
    }

    /// `None` below the visibility threshold, otherwise `t` in `[0, 1]`.
    /// A zero-width domain puts every visible value at the top.
    #[inline]
    fn visible_t(&self, value: f64) -> Option<f64> {
        if value < self.threshold {
            return None;
        }
        if self.span <= 0.0 {
            return Some(1.0);
        }
        Some(((value - self.min) / self.span).clamp(0.0, 1.0))
    }
}

impl ColorScale {
    pub(crate) fn new(policy: MappingPolicy, min: f64, max: f64) -> Self {
        let eval = match &policy {
            MappingPolicy::ThresholdGradient {
                hide_below,
                low,
                mid,
                high,
            } => Evaluator::Ramp {
                norm: Normalizer::new(min, max, *hide_below),
                low: *low,
                mid: *mid,
                high: *high,
            },
            MappingPolicy::DiscreteClasses { classes } => {
                Evaluator::Classes(classes.iter().map(|c| (c.lower, c.color)).collect())
            }
            MappingPolicy::BucketedGradient {
                hide_below,
                buckets,
            } => Evaluator::Buckets {
                norm: Normalizer::new(min, max, *hide_below),
                colors: *buckets,
            },
            MappingPolicy::TwoColorGradient {
                hide_below,
                start,
                end,
            } => Evaluator::Blend {
                norm: Normalizer::new(min, max, *hide_below),
                start: *start,
                end: *end,
            },
        };

        Self {
            policy,
            domain: Some((min, max)),
            eval,
        }
    }

    /// A scale that never draws anything.
    pub(crate) fn transparent(policy: MappingPolicy) -> Self {
        Self {
            policy,
            domain: None,
            eval: Evaluator::Transparent,
        }
    }

    pub fn policy(&self) -> &MappingPolicy {
        &self.policy
    }

    /// `(min, max)` the scale was calibrated to; `None` for an always
    /// transparent scale.
    pub fn domain(&self) -> Option<(f64, f64)> {
        self.domain
    }

    pub fn is_always_transparent(&self) -> bool {
        matches!(self.eval, Evaluator::Transparent)
    }

    /// Lowest value that is drawn, for the thresholded policies.
    pub fn threshold(&self) -> Option<f64> {
        match &self.eval {
            Evaluator::Ramp { norm, .. }
            | Evaluator::Buckets { norm, .. }
            | Evaluator::Blend { norm, .. } => Some(norm.threshold),
            Evaluator::Classes(classes) => classes.first().map(|(lower, _)| *lower),
            Evaluator::Transparent => None,
        }
    }

    /// Map one sample. NaN is always transparent.
    #[inline]
    pub fn evaluate(&self, value: f64) -> PixelColor {
        if value.is_nan() {
            return PixelColor::Transparent;
        }

        match &self.eval {
            Evaluator::Transparent => PixelColor::Transparent,
            Evaluator::Ramp {
                norm,
                low,
                mid,
                high,
            } => match norm.visible_t(value) {
                None => PixelColor::Transparent,
                Some(t) if t >= 1.0 => PixelColor::Color(*high),
                Some(t) if t <= 0.5 => PixelColor::Color(low.lerp(*mid, t * 2.0)),
                Some(t) => PixelColor::Color(mid.lerp(*high, (t - 0.5) * 2.0)),
            },
            Evaluator::Classes(classes) => classes
                .iter()
                .rev()
                .find(|(lower, _)| value >= *lower)
                .map_or(PixelColor::Transparent, |(_, color)| PixelColor::Color(*color)),
            Evaluator::Buckets { norm, colors } => match norm.visible_t(value) {
                None => PixelColor::Transparent,
                Some(t) => {
                    let idx = ((t * 4.0).floor() as usize).min(3);
                    PixelColor::Color(colors[idx])
                }
            },
            Evaluator::Blend { norm, start, end } => match norm.visible_t(value) {
                None => PixelColor::Transparent,
                Some(t) => PixelColor::Color(start.lerp(*end, t)),
            },
        }
    }
}
