// SPDX-License-Identifier: GPL-2.0-or-later
use serde::Deserialize;
use std::fs;
use tracing::warn;

/// Graphics API driving the emulated output; also selects the cursor backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GraphicsApi {
    OpenGl,
    #[default]
    Vulkan,
    Software,
}

/// What the right analog stick controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CStickFunction {
    Both,
    #[default]
    CStick,
    Touchscreen,
    Toggle,
}

/// Current side of the toggle when `CStickFunction::Toggle` is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnalogToggle {
    #[default]
    Main,
    Alternate,
}

/// Analog-stick response curve model. The two shapes come from successive
/// tuning passes on real hardware; both parameter sets stay exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CurveModel {
    #[default]
    Power,
    EdgeBoost,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Treat mouse clicks + absolute pointer as touchscreen presses.
    #[serde(default = "default_true")]
    pub mouse_touchscreen: bool,
    /// Treat real touch/pointer devices as touchscreen presses.
    #[serde(default = "default_true")]
    pub touch_touchscreen: bool,
    #[serde(default)]
    pub analog_function: CStickFunction,
    #[serde(default)]
    pub analog_toggle: AnalogToggle,
    /// Draw the cursor cross over the bottom screen.
    #[serde(default = "default_true")]
    pub render_touchscreen: bool,

    /// Radial analog deadzone in [0, 1).
    #[serde(default = "default_deadzone")]
    pub deadzone: f64,
    #[serde(default)]
    pub curve_model: CurveModel,
    /// Exponent of the response curve; 1.0 is linear.
    #[serde(default = "default_response_curve")]
    pub response_curve: f64,
    /// Radial length where the edge-boost segment starts; 0 disables boost.
    #[serde(default)]
    pub edge_boost_deadzone: f64,
    /// Speed fraction below the edge-boost threshold.
    #[serde(default = "default_preboost_ratio")]
    pub preboost_ratio: f64,

    /// Discrete cursor speed level, 1..=9.
    #[serde(default = "default_speed_level")]
    pub speed_level: u32,
    /// Multiplier used when `speed_level` is out of range.
    #[serde(default = "default_speed_multiplier")]
    pub fallback_speed_multiplier: f64,
    #[serde(default)]
    pub speedup_enabled: bool,
    #[serde(default = "default_speedup_ratio")]
    pub speedup_ratio: f64,

    #[serde(default)]
    pub swap_screen: bool,
    #[serde(default)]
    pub use_gles: bool,
    #[serde(default)]
    pub graphics_api: GraphicsApi,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            mouse_touchscreen: true,
            touch_touchscreen: true,
            analog_function: CStickFunction::default(),
            analog_toggle: AnalogToggle::default(),
            render_touchscreen: true,
            deadzone: default_deadzone(),
            curve_model: CurveModel::default(),
            response_curve: default_response_curve(),
            edge_boost_deadzone: 0.0,
            preboost_ratio: default_preboost_ratio(),
            speed_level: default_speed_level(),
            fallback_speed_multiplier: default_speed_multiplier(),
            speedup_enabled: false,
            speedup_ratio: default_speedup_ratio(),
            swap_screen: false,
            use_gles: false,
            graphics_api: GraphicsApi::default(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_deadzone() -> f64 {
    0.1
}
fn default_response_curve() -> f64 {
    1.0
}
fn default_preboost_ratio() -> f64 {
    0.5
}
fn default_speed_level() -> u32 {
    4
}
fn default_speed_multiplier() -> f64 {
    1.0
}
fn default_speedup_ratio() -> f64 {
    2.0
}

impl Settings {
    /// Whether the right stick currently moves the touch cursor.
    pub fn analog_touch_enabled(&self) -> bool {
        match self.analog_function {
            CStickFunction::Both | CStickFunction::Touchscreen => true,
            CStickFunction::CStick => false,
            CStickFunction::Toggle => self.analog_toggle == AnalogToggle::Alternate,
        }
    }

    /// Load from a TOML file; any failure falls back to defaults.
    pub fn load(path: &str) -> Settings {
        match fs::read_to_string(path) {
            Ok(s) => toml::from_str::<Settings>(&s).unwrap_or_else(|e| {
                warn!("failed to parse {path}: {e}; using defaults");
                Settings::default()
            }),
            Err(_) => Settings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_empty_toml() {
        let parsed: Settings = toml::from_str("").unwrap();
        let defaults = Settings::default();
        assert_eq!(parsed.mouse_touchscreen, defaults.mouse_touchscreen);
        assert_eq!(parsed.speed_level, defaults.speed_level);
        assert_eq!(parsed.fallback_speed_multiplier, defaults.fallback_speed_multiplier);
        assert_eq!(parsed.graphics_api, defaults.graphics_api);
        assert_eq!(parsed.curve_model, defaults.curve_model);
    }

    #[test]
    fn analog_touch_gating_follows_stick_function() {
        let mut s = Settings::default();
        s.analog_function = CStickFunction::CStick;
        assert!(!s.analog_touch_enabled());
        s.analog_function = CStickFunction::Touchscreen;
        assert!(s.analog_touch_enabled());
        s.analog_function = CStickFunction::Toggle;
        s.analog_toggle = AnalogToggle::Main;
        assert!(!s.analog_touch_enabled());
        s.analog_toggle = AnalogToggle::Alternate;
        assert!(s.analog_touch_enabled());
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let s: Settings = toml::from_str(
            "graphics_api = \"open_gl\"\nspeed_level = 9\ncurve_model = \"edge_boost\"",
        )
        .unwrap();
        assert_eq!(s.graphics_api, GraphicsApi::OpenGl);
        assert_eq!(s.speed_level, 9);
        assert_eq!(s.curve_model, CurveModel::EdgeBoost);
        assert!(s.touch_touchscreen);
    }
}
