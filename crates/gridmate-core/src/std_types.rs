//! Built-in standard-type catalogue for lines and transformers.
//!
//! Values are the usual European cable, overhead-line and distribution
//! transformer types (per-km data for lines, nameplate data for transformers).

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::{GridError, GridResult};

/// Conductor construction: cable or overhead line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineConstruction {
    Cs,
    Ol,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineStdType {
    pub r_ohm_per_km: f64,
    pub x_ohm_per_km: f64,
    pub c_nf_per_km: f64,
    pub max_i_ka: f64,
    #[serde(rename = "type")]
    pub construction: LineConstruction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrafoStdType {
    pub sn_mva: f64,
    pub vn_hv_kv: f64,
    pub vn_lv_kv: f64,
    pub vk_percent: f64,
    pub vkr_percent: f64,
    pub shift_degree: f64,
    pub tap_neutral: f64,
    pub tap_min: f64,
    pub tap_max: f64,
    pub tap_step_percent: f64,
}

fn cable(r: f64, x: f64, c: f64, i: f64) -> LineStdType {
    LineStdType {
        r_ohm_per_km: r,
        x_ohm_per_km: x,
        c_nf_per_km: c,
        max_i_ka: i,
        construction: LineConstruction::Cs,
    }
}

fn overhead(r: f64, x: f64, c: f64, i: f64) -> LineStdType {
    LineStdType {
        r_ohm_per_km: r,
        x_ohm_per_km: x,
        c_nf_per_km: c,
        max_i_ka: i,
        construction: LineConstruction::Ol,
    }
}

#[allow(clippy::too_many_arguments)]
fn trafo(
    sn_mva: f64,
    vn_hv_kv: f64,
    vn_lv_kv: f64,
    vk_percent: f64,
    vkr_percent: f64,
    shift_degree: f64,
    tap_range: f64,
    tap_step_percent: f64,
) -> TrafoStdType {
    TrafoStdType {
        sn_mva,
        vn_hv_kv,
        vn_lv_kv,
        vk_percent,
        vkr_percent,
        shift_degree,
        tap_neutral: 0.0,
        tap_min: -tap_range,
        tap_max: tap_range,
        tap_step_percent,
    }
}

static LINE_TYPES: Lazy<BTreeMap<&'static str, LineStdType>> = Lazy::new(|| {
    BTreeMap::from([
        ("NAYY 4x50 SE", cable(0.642, 0.083, 210.0, 0.142)),
        ("NAYY 4x120 SE", cable(0.225, 0.080, 264.0, 0.242)),
        ("NAYY 4x150 SE", cable(0.208, 0.080, 261.0, 0.270)),
        ("NA2XS2Y 1x95 RM/25 12/20 kV", cable(0.313, 0.132, 216.0, 0.252)),
        ("NA2XS2Y 1x150 RM/25 12/20 kV", cable(0.206, 0.116, 250.0, 0.319)),
        ("NA2XS2Y 1x185 RM/25 12/20 kV", cable(0.161, 0.117, 273.0, 0.362)),
        ("NA2XS2Y 1x240 RM/25 12/20 kV", cable(0.122, 0.112, 304.0, 0.421)),
        ("48-AL1/8-ST1A 10.0", overhead(0.5939, 0.35, 10.1, 0.210)),
        ("94-AL1/15-ST1A 10.0", overhead(0.306, 0.33, 10.75, 0.350)),
        ("149-AL1/24-ST1A 10.0", overhead(0.194, 0.315, 11.25, 0.470)),
        ("149-AL1/24-ST1A 110.0", overhead(0.194, 0.41, 8.75, 0.470)),
        ("243-AL1/39-ST1A 110.0", overhead(0.1188, 0.39, 9.0, 0.645)),
        ("490-AL1/64-ST1A 220.0", overhead(0.059, 0.285, 10.0, 0.960)),
        ("490-AL1/64-ST1A 380.0", overhead(0.059, 0.253, 11.0, 0.960)),
    ])
});

static TRAFO_TYPES: Lazy<BTreeMap<&'static str, TrafoStdType>> = Lazy::new(|| {
    BTreeMap::from([
        ("0.25 MVA 10/0.4 kV", trafo(0.25, 10.0, 0.4, 4.0, 1.2, 150.0, 2.0, 2.5)),
        ("0.4 MVA 10/0.4 kV", trafo(0.4, 10.0, 0.4, 4.0, 1.325, 150.0, 2.0, 2.5)),
        ("0.63 MVA 10/0.4 kV", trafo(0.63, 10.0, 0.4, 4.0, 1.0794, 150.0, 2.0, 2.5)),
        ("0.25 MVA 20/0.4 kV", trafo(0.25, 20.0, 0.4, 6.0, 1.44, 150.0, 2.0, 2.5)),
        ("0.4 MVA 20/0.4 kV", trafo(0.4, 20.0, 0.4, 6.0, 1.425, 150.0, 2.0, 2.5)),
        ("0.63 MVA 20/0.4 kV", trafo(0.63, 20.0, 0.4, 6.0, 1.206, 150.0, 2.0, 2.5)),
        ("25 MVA 110/10 kV", trafo(25.0, 110.0, 10.0, 12.0, 0.41, 150.0, 9.0, 1.5)),
        ("25 MVA 110/20 kV", trafo(25.0, 110.0, 20.0, 12.0, 0.41, 150.0, 9.0, 1.5)),
        ("40 MVA 110/20 kV", trafo(40.0, 110.0, 20.0, 16.2, 0.34, 150.0, 9.0, 1.5)),
        ("63 MVA 110/20 kV", trafo(63.0, 110.0, 20.0, 18.0, 0.32, 150.0, 9.0, 1.5)),
        ("100 MVA 220/110 kV", trafo(100.0, 220.0, 110.0, 12.0, 0.26, 0.0, 9.0, 1.5)),
    ])
});

pub fn line_std_type(name: &str) -> GridResult<&'static LineStdType> {
    LINE_TYPES.get(name).ok_or_else(|| GridError::UnknownStdType {
        kind: "line",
        name: name.to_string(),
    })
}

pub fn trafo_std_type(name: &str) -> GridResult<&'static TrafoStdType> {
    TRAFO_TYPES.get(name).ok_or_else(|| GridError::UnknownStdType {
        kind: "trafo",
        name: name.to_string(),
    })
}

pub fn line_std_types() -> impl Iterator<Item = (&'static str, &'static LineStdType)> {
    LINE_TYPES.iter().map(|(name, ty)| (*name, ty))
}

pub fn trafo_std_types() -> impl Iterator<Item = (&'static str, &'static TrafoStdType)> {
    TRAFO_TYPES.iter().map(|(name, ty)| (*name, ty))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_line_type() {
        let ty = line_std_type("NAYY 4x50 SE").unwrap();
        assert_eq!(ty.r_ohm_per_km, 0.642);
        assert_eq!(ty.construction, LineConstruction::Cs);
    }

    #[test]
    fn test_unknown_type_is_error() {
        let err = line_std_type("copper wire").unwrap_err();
        assert!(matches!(err, GridError::UnknownStdType { kind: "line", .. }));
        assert!(trafo_std_type("NAYY 4x50 SE").is_err());
    }

    #[test]
    fn test_trafo_ratings_consistent() {
        for (name, ty) in trafo_std_types() {
            assert!(ty.vn_hv_kv > ty.vn_lv_kv, "{name}");
            assert!(ty.vk_percent > ty.vkr_percent, "{name}");
            assert!(ty.tap_min < ty.tap_max, "{name}");
        }
    }
}
