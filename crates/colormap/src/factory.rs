//! Building color scales calibrated to observed data.

use tracing::{debug, warn};

use crate::policy::MappingPolicy;
use crate::scale::ColorScale;

/// Build a fresh scale for `policy` over `[min, max]`.
///
/// The policy is cloned into the scale, so later changes to the caller's
/// policy value cannot reach it. Bounds given in the wrong order are swapped.
/// Non-finite bounds give an always-transparent scale, as does a
/// thresholded policy over an empty dataset (see [`build_empty`]).
pub fn build(policy: &MappingPolicy, min: f64, max: f64) -> ColorScale {
    if !min.is_finite() || !max.is_finite() {
        warn!(min, max, policy = policy.name(), "Non-finite color domain, layer will be transparent");
        return ColorScale::transparent(policy.clone());
    }

    let (min, max) = if min > max { (max, min) } else { (min, max) };
    let scale = ColorScale::new(policy.clone(), min, max);
    debug!(
        policy = policy.name(),
        min,
        max,
        threshold = ?scale.threshold(),
        "Built color scale"
    );
    scale
}

/// Scale for a dataset with no valid samples.
///
/// Always transparent, whatever the policy: with nothing observed there is
/// no domain to calibrate against.
pub fn build_empty(policy: &MappingPolicy) -> ColorScale {
    ColorScale::transparent(policy.clone())
}

/// Build from an optional observed range; `None` means no valid samples.
pub fn build_for_range(policy: &MappingPolicy, range: Option<(f64, f64)>) -> ColorScale {
    match range {
        Some((min, max)) => build(policy, min, max),
        None => build_empty(policy),
    }
}
