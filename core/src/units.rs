//! Conversion between the canonical mg/dL value and display units.

use crate::models::GlucoseUnit;

/// mg/dL per mmol/L.
pub const MGDL_PER_MMOLL: f64 = 18.0;

/// Convert a stored mg/dL value for display in `unit`.
#[must_use]
pub fn to_display(canonical: f64, unit: GlucoseUnit) -> f64 {
    match unit {
        GlucoseUnit::MgDl => canonical.round(),
        GlucoseUnit::MmolL => round1(canonical / MGDL_PER_MMOLL),
    }
}

/// Convert a value entered in `unit` to whole mg/dL for storage.
///
/// Lossy: `to_canonical(to_display(v, MmolL), MmolL)` may differ from `v`
/// by up to one mg/dL.
#[must_use]
pub fn to_canonical(value: f64, unit: GlucoseUnit) -> f64 {
    match unit {
        GlucoseUnit::MgDl => value.round(),
        GlucoseUnit::MmolL => (value * MGDL_PER_MMOLL).round(),
    }
}

/// Round to one decimal place.
#[must_use]
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Render a display value with the precision of its unit.
#[must_use]
pub fn format_value(display: f64, unit: GlucoseUnit) -> String {
    match unit {
        GlucoseUnit::MgDl => format!("{display:.0}"),
        GlucoseUnit::MmolL => format!("{display:.1}"),
    }
}
