use serde::{Deserialize, Serialize};

/// The default character ramp, ordered sparse to dense.
pub static DEFAULT_GLYPH_SET: &str = " .-:;=+*#%@VMWA&$";

/// Viewports narrower than this get larger characters.
const MOBILE_BREAKPOINT: u32 = 768;

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub glyph_set: String,

    /// Character cell size in logical pixels. `None` picks a default based on
    /// the viewport width at construction.
    pub char_size: Option<f32>,

    pub theme: Theme,
    pub quality: Quality,
    pub reduced_motion: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            glyph_set: DEFAULT_GLYPH_SET.to_string(),
            char_size: None,
            theme: Theme::Light,
            quality: Quality::Medium,
            reduced_motion: false,
        }
    }
}

impl Settings {
    /// Resolves the character size, falling back to the viewport-dependent
    /// default when the host didn’t pick one.
    pub fn char_size_for_width(&self, logical_width: u32) -> f32 {
        self.char_size.unwrap_or(if logical_width < MOBILE_BREAKPOINT {
            12.0
        } else {
            9.0
        })
    }
}

/// Themes travel as integers on the wire: 0 = dark, 1 = light.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "u32", into = "u32")]
pub enum Theme {
    Dark,
    Light,
}

impl From<u32> for Theme {
    fn from(index: u32) -> Self {
        Theme::from_index(index)
    }
}

impl From<Theme> for u32 {
    fn from(theme: Theme) -> Self {
        match theme {
            Theme::Dark => 0,
            Theme::Light => 1,
        }
    }
}

impl Theme {
    /// Out-of-range indices fall back to light.
    pub fn from_index(index: u32) -> Self {
        match index {
            0 => Theme::Dark,
            _ => Theme::Light,
        }
    }

    /// The flat page background the overlay is composited over.
    pub fn background_color(&self) -> [f32; 3] {
        match self {
            Theme::Dark => [0.04, 0.05, 0.06],
            Theme::Light => [0.976, 0.976, 0.976],
        }
    }

    /// The theme blend factor passed to the shaders.
    pub fn blend_factor(&self) -> f32 {
        match self {
            Theme::Dark => 0.0,
            Theme::Light => 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    Medium,
    High,
}

impl Quality {
    /// The side length of the square simulation grid. Fixed for the
    /// engine’s lifetime, independent of the surface size.
    pub fn resolution(&self) -> u32 {
        match self {
            Quality::Low => 64,
            Quality::Medium => 128,
            Quality::High => 256,
        }
    }

    /// Weak hosts get the small grid no matter what was asked for.
    pub fn clamp_for_cpus(self, logical_processors: u32) -> Self {
        if logical_processors <= 2 {
            Quality::Low
        } else {
            self
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn quality_maps_to_simulation_grid() {
        assert_eq!(Quality::Low.resolution(), 64);
        assert_eq!(Quality::Medium.resolution(), 128);
        assert_eq!(Quality::High.resolution(), 256);
    }

    #[test]
    fn quality_downgrades_on_weak_hosts() {
        assert_eq!(Quality::High.clamp_for_cpus(2), Quality::Low);
        assert_eq!(Quality::Medium.clamp_for_cpus(1), Quality::Low);
        assert_eq!(Quality::High.clamp_for_cpus(4), Quality::High);
        assert_eq!(Quality::Low.clamp_for_cpus(8), Quality::Low);
    }

    #[test]
    fn char_size_defaults_by_breakpoint() {
        let settings = Settings::default();
        assert_eq!(settings.char_size_for_width(414), 12.0);
        assert_eq!(settings.char_size_for_width(1280), 9.0);

        let settings = Settings {
            char_size: Some(14.0),
            ..Default::default()
        };
        assert_eq!(settings.char_size_for_width(414), 14.0);
    }

    #[test]
    fn theme_index_round_trips() {
        assert_eq!(Theme::from_index(0), Theme::Dark);
        assert_eq!(Theme::from_index(1), Theme::Light);
        assert_eq!(Theme::from_index(7), Theme::Light);
        assert_eq!(Theme::Dark.background_color(), [0.04, 0.05, 0.06]);
        assert_eq!(Theme::Light.background_color(), [0.976, 0.976, 0.976]);
    }

    #[test]
    fn deserializes_camel_case_config() {
        let settings: Settings = serde_json::from_str(
            r#"{ "quality": "high", "reducedMotion": true, "charSize": 10.0 }"#,
        )
        .unwrap();
        assert_eq!(settings.quality, Quality::High);
        assert!(settings.reduced_motion);
        assert_eq!(settings.char_size, Some(10.0));
        assert_eq!(settings.glyph_set, DEFAULT_GLYPH_SET);
    }

    // Hosts send lowercase quality tiers and integer themes.
    #[test]
    fn accepts_the_host_wire_format() {
        let settings: Settings =
            serde_json::from_str(r#"{ "quality": "medium", "theme": 0 }"#).unwrap();
        assert_eq!(settings.quality, Quality::Medium);
        assert_eq!(settings.theme, Theme::Dark);

        let settings: Settings = serde_json::from_str(r#"{ "theme": 1 }"#).unwrap();
        assert_eq!(settings.theme, Theme::Light);

        // Out-of-range indices are tolerated, like the integer setter.
        let settings: Settings = serde_json::from_str(r#"{ "theme": 7 }"#).unwrap();
        assert_eq!(settings.theme, Theme::Light);

        let json = serde_json::to_string(&Settings::default()).unwrap();
        assert!(json.contains(r#""theme":1"#));
        assert!(json.contains(r#""quality":"medium""#));
    }
}
