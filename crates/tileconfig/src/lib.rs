use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

pub mod layout;

pub use layout::{Disposition, LayoutError};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// The full phototile configuration as loaded from the TOML file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub version: u32,
    #[serde(default)]
    pub layout: LayoutSettings,
    #[serde(default)]
    pub transitions: TransitionSettings,
    #[serde(default)]
    pub media: MediaSettings,
    #[serde(default)]
    pub render: RenderSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LayoutSettings {
    #[serde(default = "default_rows")]
    pub rows: u32,
    #[serde(default = "default_cols")]
    pub cols: u32,
    /// Fixed disposition template used in portrait orientation.
    #[serde(default = "default_portrait_template")]
    pub portrait: String,
    /// Fixed disposition template used in landscape orientation.
    #[serde(default = "default_landscape_template")]
    pub landscape: String,
    /// When true a random builtin template is picked instead of the fixed ones.
    #[serde(default)]
    pub random_dispositions: bool,
    /// How often a new random disposition is generated; zero disables.
    #[serde(
        default = "default_disposition_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub random_dispositions_interval: Duration,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransitionSettings {
    /// The pool of transition types the scheduler draws from.
    #[serde(default = "default_transition_types")]
    pub types: Vec<TransitionType>,
    /// Time between scheduled transitions; zero shows static frames only.
    #[serde(
        default = "default_transition_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub interval: Duration,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaSettings {
    /// Directories scanned for photographs.
    #[serde(default)]
    pub sources: Vec<PathBuf>,
    /// How often the sources are rescanned; zero disables periodic rescans.
    #[serde(default, deserialize_with = "deserialize_duration")]
    pub refresh_interval: Duration,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RenderSettings {
    /// Center-crop pictures to the exact frame aspect ratio after decode.
    #[serde(default = "default_true")]
    pub fix_aspect_ratio: bool,
    /// Wallpaper dim amount, 0-100.
    #[serde(default)]
    pub wallpaper_dim: u32,
    /// Background color behind the photo frames, `#rrggbb` or `#rrggbbaa`.
    #[serde(default = "default_background")]
    pub background: String,
    /// Effect tags applied to freshly decoded pictures.
    #[serde(default)]
    pub effects: Vec<EffectType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionType {
    Swap,
    Translate,
    Flip,
    Window,
    Cube,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectType {
    Grayscale,
    Sepia,
    Posterize,
    Invert,
}

/// An RGBA color in linear 0-1 components.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };

    pub fn with_alpha(self, a: f32) -> Color {
        Color { a, ..self }
    }

    /// Parses `#rrggbb` or `#rrggbbaa`.
    pub fn parse(raw: &str) -> Result<Color, ConfigError> {
        let hex = raw.strip_prefix('#').ok_or_else(|| {
            ConfigError::Invalid(format!("color '{raw}' must start with '#'"))
        })?;
        if hex.len() != 6 && hex.len() != 8 {
            return Err(ConfigError::Invalid(format!(
                "color '{raw}' must be #rrggbb or #rrggbbaa"
            )));
        }
        let channel = |range: std::ops::Range<usize>| -> Result<f32, ConfigError> {
            u8::from_str_radix(&hex[range], 16)
                .map(|v| v as f32 / 255.0)
                .map_err(|_| ConfigError::Invalid(format!("color '{raw}' has invalid hex digits")))
        };
        Ok(Color {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
            a: if hex.len() == 8 { channel(6..8)? } else { 1.0 },
        })
    }
}

fn default_rows() -> u32 {
    4
}

fn default_cols() -> u32 {
    2
}

fn default_portrait_template() -> String {
    layout::PORTRAIT_TEMPLATES[0].to_string()
}

fn default_landscape_template() -> String {
    layout::LANDSCAPE_TEMPLATES[0].to_string()
}

fn default_disposition_interval() -> Duration {
    Duration::ZERO
}

fn default_transition_types() -> Vec<TransitionType> {
    vec![
        TransitionType::Translate,
        TransitionType::Flip,
        TransitionType::Window,
        TransitionType::Cube,
    ]
}

fn default_transition_interval() -> Duration {
    Duration::from_secs(4)
}

fn default_true() -> bool {
    true
}

fn default_background() -> String {
    "#000000".to_string()
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            rows: default_rows(),
            cols: default_cols(),
            portrait: default_portrait_template(),
            landscape: default_landscape_template(),
            random_dispositions: false,
            random_dispositions_interval: default_disposition_interval(),
        }
    }
}

impl Default for TransitionSettings {
    fn default() -> Self {
        Self {
            types: default_transition_types(),
            interval: default_transition_interval(),
        }
    }
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            refresh_interval: Duration::ZERO,
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            fix_aspect_ratio: true,
            wallpaper_dim: 0,
            background: default_background(),
            effects: Vec::new(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: 1,
            layout: LayoutSettings::default(),
            transitions: TransitionSettings::default(),
            media: MediaSettings::default(),
            render: RenderSettings::default(),
        }
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs_f64(v))
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl Settings {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: Settings = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn background_color(&self) -> Result<Color, ConfigError> {
        Color::parse(&self.render.background)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if self.layout.rows == 0 || self.layout.cols == 0 {
            return Err(ConfigError::Invalid(
                "layout.rows and layout.cols must be greater than zero".into(),
            ));
        }

        for (name, template, cols, rows) in [
            (
                "layout.portrait",
                &self.layout.portrait,
                self.layout.cols,
                self.layout.rows,
            ),
            (
                "layout.landscape",
                &self.layout.landscape,
                self.layout.rows,
                self.layout.cols,
            ),
        ] {
            let dispositions = layout::parse_template(template)
                .map_err(|err| ConfigError::Invalid(format!("{name}: {err}")))?;
            for disposition in &dispositions {
                if !disposition.fits(cols, rows) {
                    return Err(ConfigError::Invalid(format!(
                        "{name}: disposition {disposition} exceeds the {cols}x{rows} grid"
                    )));
                }
            }
        }

        if self.transitions.types.is_empty() {
            return Err(ConfigError::Invalid(
                "transitions.types must contain at least one type".into(),
            ));
        }

        if self.render.wallpaper_dim > 100 {
            return Err(ConfigError::Invalid(format!(
                "render.wallpaper_dim must be 0-100, got {}",
                self.render.wallpaper_dim
            )));
        }

        Color::parse(&self.render.background)?;

        Ok(())
    }
}
