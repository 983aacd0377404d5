use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Gpu,
    Software,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextLayoutKind {
    #[default]
    Fit,
    Canvas,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressSourceKind {
    #[default]
    Fixed,
    Timer,
    Orbit,
    Stdin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AntialiasSetting {
    Auto,
    Off,
    Samples2,
    Samples4,
    Samples8,
    Samples16,
}

impl AntialiasSetting {
    pub fn from_samples(samples: u32) -> Option<Self> {
        match samples {
            0 | 1 => Some(Self::Off),
            2 => Some(Self::Samples2),
            4 => Some(Self::Samples4),
            8 => Some(Self::Samples8),
            16 => Some(Self::Samples16),
            _ => None,
        }
    }

    pub fn samples(self) -> Option<u32> {
        match self {
            Self::Auto => None,
            Self::Off => Some(1),
            Self::Samples2 => Some(2),
            Self::Samples4 => Some(4),
            Self::Samples8 => Some(8),
            Self::Samples16 => Some(16),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScreenConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub window: WindowSection,
    #[serde(default)]
    pub text: TextSection,
    #[serde(default)]
    pub motion: MotionSection,
    #[serde(default)]
    pub progress: ProgressSection,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WindowSection {
    pub backend: BackendKind,
    pub fullscreen: bool,
    pub width: u32,
    pub height: u32,
    pub kiosk: bool,
    pub fps: Option<f32>,
    #[serde(deserialize_with = "deserialize_antialias_opt")]
    pub antialias: Option<AntialiasSetting>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TextSection {
    pub title: Option<String>,
    pub font: Option<PathBuf>,
    pub point_size: f32,
    pub dpi: f32,
    pub line_spacing: f32,
    pub layout: TextLayoutKind,
    pub canvas_width: u32,
    pub canvas_height: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MotionSection {
    pub dots: usize,
    pub distance: f64,
    pub fast_speed: f64,
    pub slow_speed: f64,
    pub threshold: f64,
    pub tick_rate: f32,
    pub radius_divisor: f64,
    pub offset_divisor: f64,
    pub dot_divisor: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProgressSection {
    pub source: ProgressSourceKind,
    pub value: u8,
    #[serde(
        deserialize_with = "deserialize_duration_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration: Option<Duration>,
}

const MIN_TICK_RATE: f32 = 1.0;
const MAX_TICK_RATE: f32 = 1000.0;

fn default_version() -> u32 {
    1
}

fn default_timer_duration() -> Duration {
    Duration::from_secs(20 * 60)
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            window: WindowSection::default(),
            text: TextSection::default(),
            motion: MotionSection::default(),
            progress: ProgressSection::default(),
        }
    }
}

impl Default for WindowSection {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            fullscreen: true,
            width: 800,
            height: 600,
            kiosk: false,
            fps: None,
            antialias: None,
        }
    }
}

impl Default for TextSection {
    fn default() -> Self {
        Self {
            title: None,
            font: None,
            point_size: 18.0,
            dpi: 96.0,
            line_spacing: 1.5,
            layout: TextLayoutKind::default(),
            canvas_width: 1920,
            canvas_height: 160,
        }
    }
}

impl Default for MotionSection {
    fn default() -> Self {
        Self {
            dots: 5,
            distance: 0.55,
            fast_speed: 0.06,
            slow_speed: 0.025,
            threshold: -0.6,
            tick_rate: 60.0,
            radius_divisor: 27.0,
            offset_divisor: 15.0,
            dot_divisor: 200.0,
        }
    }
}

impl Default for ProgressSection {
    fn default() -> Self {
        Self {
            source: ProgressSourceKind::default(),
            value: 0,
            duration: None,
        }
    }
}

impl ProgressSection {
    /// Duration of the timer feed, defaulting to twenty minutes.
    pub fn timer_duration(&self) -> Duration {
        self.duration.unwrap_or_else(default_timer_duration)
    }
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs_f64(v)))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn deserialize_antialias_opt<'de, D>(deserializer: D) -> Result<Option<AntialiasSetting>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Helper {
        Str(String),
        Num(i64),
    }

    let helper: Option<Helper> = Option::deserialize(deserializer)?;
    let result = match helper {
        None => None,
        Some(Helper::Str(raw)) => Some(parse_antialias(&raw).map_err(de::Error::custom)?),
        Some(Helper::Num(value)) => {
            if value < 0 {
                return Err(de::Error::custom("antialias value must be non-negative"));
            }
            let raw = value.to_string();
            Some(parse_antialias(&raw).map_err(de::Error::custom)?)
        }
    };
    Ok(result)
}

pub fn parse_antialias(raw: &str) -> Result<AntialiasSetting, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "auto" | "max" | "default" => Ok(AntialiasSetting::Auto),
        "off" | "none" | "disable" | "disabled" | "0" | "1" => Ok(AntialiasSetting::Off),
        "2" => Ok(AntialiasSetting::Samples2),
        "4" => Ok(AntialiasSetting::Samples4),
        "8" => Ok(AntialiasSetting::Samples8),
        "16" => Ok(AntialiasSetting::Samples16),
        other => Err(format!("invalid antialias setting '{other}'")),
    }
}

impl ScreenConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: ScreenConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        let window = &self.window;
        if window.width == 0 || window.height == 0 {
            return Err(ConfigError::Invalid(
                "window.width and window.height must be greater than zero".into(),
            ));
        }
        if let Some(fps) = window.fps {
            if !fps.is_finite() || fps < 0.0 || (fps != 0.0 && fps < 1.0) {
                return Err(ConfigError::Invalid(format!(
                    "window.fps must be 0 or at least 1, got {fps}"
                )));
            }
        }

        let text = &self.text;
        if !(text.point_size > 0.0) || !(text.dpi > 0.0) {
            return Err(ConfigError::Invalid(
                "text.point_size and text.dpi must be positive".into(),
            ));
        }
        if !(text.line_spacing > 0.0) {
            return Err(ConfigError::Invalid(
                "text.line_spacing must be positive".into(),
            ));
        }
        if text.layout == TextLayoutKind::Canvas
            && (text.canvas_width == 0 || text.canvas_height == 0)
        {
            return Err(ConfigError::Invalid(
                "canvas layout requires non-zero text.canvas_width and text.canvas_height".into(),
            ));
        }
        if let Some(title) = &text.title {
            if title.trim().is_empty() {
                return Err(ConfigError::Invalid("text.title may not be empty".into()));
            }
        }

        let motion = &self.motion;
        if motion.dots == 0 || motion.dots > 32 {
            return Err(ConfigError::Invalid(format!(
                "motion.dots must be between 1 and 32, got {}",
                motion.dots
            )));
        }
        if !(motion.fast_speed > 0.0) || !(motion.slow_speed > 0.0) {
            return Err(ConfigError::Invalid(
                "motion speeds must be positive".into(),
            ));
        }
        if !(-1.0..=1.0).contains(&motion.threshold) {
            return Err(ConfigError::Invalid(
                "motion.threshold must lie within [-1, 1]".into(),
            ));
        }
        if !motion.distance.is_finite() {
            return Err(ConfigError::Invalid("motion.distance must be finite".into()));
        }
        if !(MIN_TICK_RATE..=MAX_TICK_RATE).contains(&motion.tick_rate) {
            return Err(ConfigError::Invalid(format!(
                "motion.tick_rate must lie within [{MIN_TICK_RATE}, {MAX_TICK_RATE}], got {}",
                motion.tick_rate
            )));
        }
        for (name, divisor) in [
            ("radius_divisor", motion.radius_divisor),
            ("offset_divisor", motion.offset_divisor),
            ("dot_divisor", motion.dot_divisor),
        ] {
            if !divisor.is_finite() || divisor <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "motion.{name} must be positive and finite, got {divisor}"
                )));
            }
        }

        let progress = &self.progress;
        if progress.value > 100 {
            return Err(ConfigError::Invalid(format!(
                "progress.value must be at most 100, got {}",
                progress.value
            )));
        }
        if progress.source == ProgressSourceKind::Timer && progress.timer_duration().is_zero() {
            return Err(ConfigError::Invalid(
                "progress.duration must be greater than zero for the timer source".into(),
            ));
        }

        Ok(())
    }
}
