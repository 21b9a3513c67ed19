//! Parameter payloads of the built-in commands.
//!
//! Script lines deliver every value as a string (`Gain=-3`), while JSON
//! callers send native numbers and booleans. The [`lenient`] deserializers
//! accept both so one struct serves every surface.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::project::TrackKind;

/// Serde helpers that accept a native JSON scalar or its string spelling.
pub mod lenient {
    use serde::{de::Error as _, Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Bool(bool),
        Number(f64),
        Text(String),
    }

    fn to_number(value: Scalar) -> Result<f64, String> {
        match value {
            Scalar::Number(n) => Ok(n),
            Scalar::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("expected a number, got \"{s}\"")),
            Scalar::Bool(b) => Err(format!("expected a number, got {b}")),
        }
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn to_index(value: Scalar) -> Result<usize, String> {
        let n = to_number(value)?;
        if n.is_finite() && n >= 0.0 && n.fract() == 0.0 && n <= usize::MAX as f64 {
            Ok(n as usize)
        } else {
            Err(format!("expected a non-negative whole number, got {n}"))
        }
    }

    fn to_flag(value: Scalar) -> Result<bool, String> {
        match value {
            Scalar::Bool(b) => Ok(b),
            Scalar::Number(n) if n == 0.0 => Ok(false),
            Scalar::Number(n) if n == 1.0 => Ok(true),
            Scalar::Number(n) => Err(format!("expected a boolean, got {n}")),
            Scalar::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => Err(format!("expected a boolean, got \"{s}\"")),
            },
        }
    }

    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        to_number(Scalar::deserialize(d)?).map_err(D::Error::custom)
    }

    pub fn opt_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Option::<Scalar>::deserialize(d)?
            .map(to_number)
            .transpose()
            .map_err(D::Error::custom)
    }

    pub fn index<'de, D: Deserializer<'de>>(d: D) -> Result<usize, D::Error> {
        to_index(Scalar::deserialize(d)?).map_err(D::Error::custom)
    }

    pub fn opt_index<'de, D: Deserializer<'de>>(d: D) -> Result<Option<usize>, D::Error> {
        Option::<Scalar>::deserialize(d)?
            .map(to_index)
            .transpose()
            .map_err(D::Error::custom)
    }

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        to_flag(Scalar::deserialize(d)?).map_err(D::Error::custom)
    }

    pub fn opt_flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        Option::<Scalar>::deserialize(d)?
            .map(to_flag)
            .transpose()
            .map_err(D::Error::custom)
    }
}

fn default_true() -> bool {
    true
}

fn default_peak_level() -> f64 {
    -1.0
}

fn default_track_kind() -> TrackKind {
    TrackKind::Wave
}

// ── Query params ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct NoParams {}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct HelpParams {
    /// Command to describe. Omit for the list of categories.
    #[serde(default)]
    pub command: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct MessageParams {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub enum InfoType {
    #[default]
    Commands,
    Tracks,
    Selection,
    Project,
    App,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct GetInfoParams {
    #[serde(default)]
    pub r#type: InfoType,
}

// ── Selection params ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub enum SelectMode {
    /// Selected tracks become exactly the given range.
    #[default]
    Set,
    /// Given tracks are added to the current selection.
    Add,
    /// Given tracks are removed from the current selection.
    Remove,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct SelectParams {
    /// Selection start in seconds. Unchanged when omitted.
    #[serde(default, deserialize_with = "lenient::opt_number")]
    pub start: Option<f64>,
    /// Selection end in seconds. Unchanged when omitted.
    #[serde(default, deserialize_with = "lenient::opt_number")]
    pub end: Option<f64>,
    /// First track of the range. Track selection is unchanged when omitted.
    #[serde(default, deserialize_with = "lenient::opt_index")]
    pub track: Option<usize>,
    /// Number of tracks in the range, default 1.
    #[serde(default, deserialize_with = "lenient::opt_index")]
    pub track_count: Option<usize>,
    #[serde(default)]
    pub mode: SelectMode,
}

// ── Track params ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct SetTrackParams {
    #[serde(deserialize_with = "lenient::index")]
    pub track: usize,
    #[serde(default)]
    pub name: Option<String>,
    /// Gain in dB.
    #[serde(default, deserialize_with = "lenient::opt_number")]
    pub gain: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_number")]
    pub pan: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_flag")]
    pub mute: Option<bool>,
    #[serde(default, deserialize_with = "lenient::opt_flag")]
    pub solo: Option<bool>,
    #[serde(default, deserialize_with = "lenient::opt_flag")]
    pub selected: Option<bool>,
    #[serde(default, deserialize_with = "lenient::opt_flag")]
    pub minimized: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct NewTrackParams {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_track_kind")]
    pub kind: TrackKind,
}

// ── Effect params ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct NormalizeParams {
    /// Target peak in dBFS, at most 0.
    #[serde(default = "default_peak_level", deserialize_with = "lenient::number")]
    pub peak_level: f64,
    /// Process only selected tracks; otherwise every playable track.
    #[serde(default = "default_true", deserialize_with = "lenient::flag")]
    pub apply_to_selected: bool,
}
