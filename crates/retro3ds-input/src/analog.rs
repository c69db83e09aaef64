// SPDX-License-Identifier: GPL-2.0-or-later
use glam::DVec2;
use retro3ds_core::{CurveModel, Settings};

/// Cursor speed multipliers for the nine discrete speed levels.
pub const SPEED_LEVELS: [f64; 9] = [0.4, 0.6, 0.8, 1.0, 1.2, 1.4, 1.6, 1.8, 2.0];

/// Multiplier for a speed level; levels outside 1..=9 use the configured
/// fallback rather than a guessed constant.
pub fn speed_multiplier(level: u32, fallback: f64) -> f64 {
    if (1..=9).contains(&level) {
        SPEED_LEVELS[(level - 1) as usize]
    } else {
        fallback
    }
}

/// Shapes a post-deadzone deflection (per-axis magnitudes in [0, 1])
/// through the configured response curve.
pub fn shape_deflection(deflection: DVec2, settings: &Settings) -> DVec2 {
    let exponent = settings.response_curve;
    let power = |d: DVec2| {
        DVec2::new(d.x.min(1.0).powf(exponent), d.y.min(1.0).powf(exponent))
    };

    match settings.curve_model {
        CurveModel::Power => power(deflection),
        CurveModel::EdgeBoost => {
            let edge = settings.edge_boost_deadzone;
            if edge <= 0.0 {
                // Boost disabled; this segment collapses to the power curve.
                return power(deflection);
            }
            let preboost = settings.preboost_ratio;
            let radial = deflection.length().min(1.0);
            // Deflection is re-ranged so the pre-boost segment spans the
            // full curve input, then scaled by either the flat pre-boost
            // ratio or the linear boost toward full speed at the rim.
            let rescale = 1.0 / edge;
            let boost = if radial >= edge {
                preboost + (1.0 - preboost) * ((radial - edge) / (1.0 - edge))
            } else {
                preboost
            };
            power(deflection * rescale) * boost
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings::default()
    }

    #[test]
    fn speed_levels_span_the_documented_range() {
        assert_eq!(speed_multiplier(1, 1.0), 0.4);
        assert_eq!(speed_multiplier(4, 1.0), 1.0);
        assert_eq!(speed_multiplier(9, 1.0), 2.0);
    }

    #[test]
    fn out_of_range_levels_use_the_configured_fallback()  {
        assert_eq!(speed_multiplier(0, 1.0), 1.0);
        assert_eq!(speed_multiplier(10, 0.8), 0.8);
    }

    #[test]
    fn linear_curve_is_identity() {
        let s = settings();
        assert_eq!(s.response_curve, 1.0);
        for v in [0.0, 0.25, 0.5, 1.0] {
            let shaped = shape_deflection(DVec2::new(v, 0.0), &s);
            assert!((shaped.x - v).abs() < 1e-12);
            assert_eq!(shaped.y, 0.0);
        }
    }

    #[test]
    fn power_curve_is_monotonic() {
        let mut s = settings();
        s.response_curve = 2.0;
        let mut last = -1.0;
        for i in 0..=20 {
            let v = i as f64 / 20.0;
            let shaped = shape_deflection(DVec2::new(v, 0.0), &s).x;
            assert!(shaped > last);
            last = shaped;
        }
    }

    #[test]
    fn edge_boost_caps_below_the_threshold() {
        let mut s = settings();
        s.curve_model = CurveModel::EdgeBoost;
        s.edge_boost_deadzone = 0.9;
        s.preboost_ratio = 0.5;
        // Below the threshold the re-ranged deflection is scaled by the
        // flat pre-boost ratio: (0.45 / 0.9) * 0.5.
        let below = shape_deflection(DVec2::new(0.45, 0.0), &s).x;
        assert!((below - 0.25).abs() < 1e-9);
        // At the rim the boost reaches full speed.
        let rim = shape_deflection(DVec2::new(1.0, 0.0), &s).x;
        assert!((rim - 1.0).abs() < 1e-9);
    }

    #[test]
    fn edge_boost_with_zero_threshold_matches_power() {
        let mut s = settings();
        s.curve_model = CurveModel::EdgeBoost;
        s.edge_boost_deadzone = 0.0;
        for v in [0.1, 0.5, 0.9] {
            let boosted = shape_deflection(DVec2::new(v, v), &s);
            s.curve_model = CurveModel::Power;
            let plain = shape_deflection(DVec2::new(v, v), &s);
            s.curve_model = CurveModel::EdgeBoost;
            assert_eq!(boosted, plain);
        }
    }
}
