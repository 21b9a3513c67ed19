//! Shared validation helpers for command handlers.
//!
//! Centralizes common checks (times, gain, pan, track indices) so all
//! handlers produce consistent error messages.

use crate::error::CommandError;
use crate::project::Project;

/// Largest gain adjustment a track accepts, in dB.
pub const MAX_GAIN_DB: f64 = 36.0;

/// Validate a selection time: finite and non-negative.
pub fn validate_time(value: f64, name: &str) -> Result<(), CommandError> {
    if !value.is_finite() {
        return Err(CommandError::invalid(format!("{name} must be finite")));
    }
    if value < 0.0 {
        return Err(CommandError::invalid(format!(
            "{name} ({value:.3}) must not be negative"
        )));
    }
    Ok(())
}

/// Validate a track gain in dB.
pub fn validate_gain(gain_db: f64) -> Result<(), CommandError> {
    if !gain_db.is_finite() || gain_db.abs() > MAX_GAIN_DB {
        return Err(CommandError::invalid(format!(
            "Gain ({gain_db}) must be between -{MAX_GAIN_DB} and {MAX_GAIN_DB} dB"
        )));
    }
    Ok(())
}

/// Validate that pan is a finite number in [-1.0, 1.0].
pub fn validate_pan(pan: f64) -> Result<(), CommandError> {
    if !pan.is_finite() || !(-1.0..=1.0).contains(&pan) {
        return Err(CommandError::invalid(format!(
            "Pan ({pan}) must be between -1.0 and 1.0"
        )));
    }
    Ok(())
}

/// Validate a normalize target level in dBFS.
pub fn validate_peak_level(level_db: f64) -> Result<(), CommandError> {
    if !level_db.is_finite() || level_db > 0.0 {
        return Err(CommandError::invalid(format!(
            "PeakLevel ({level_db}) must be a finite level at or below 0 dB"
        )));
    }
    Ok(())
}

/// Validate that `index` names an existing track.
pub fn validate_track_index(project: &Project, index: usize) -> Result<(), CommandError> {
    if index >= project.tracks.len() {
        return Err(CommandError::NotFound {
            what: format!(
                "Track {index} (project has {} tracks)",
                project.tracks.len()
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::project::{Track, TrackKind};

    #[test]
    fn gain_and_pan_bounds() {
        assert!(validate_gain(-3.0).is_ok());
        assert!(validate_gain(MAX_GAIN_DB).is_ok());
        assert!(validate_gain(40.0).is_err());
        assert!(validate_gain(f64::NAN).is_err());
        assert!(validate_pan(-1.0).is_ok());
        assert!(validate_pan(1.01).is_err());
    }

    #[test]
    fn times_must_be_finite_and_non_negative() {
        assert!(validate_time(0.0, "Start").is_ok());
        let err = validate_time(-0.5, "Start").unwrap_err();
        assert!(err.to_string().contains("Start"));
        assert!(validate_time(f64::INFINITY, "End").is_err());
    }

    #[test]
    fn peak_level_must_not_exceed_full_scale() {
        assert!(validate_peak_level(-1.0).is_ok());
        assert!(validate_peak_level(0.0).is_ok());
        assert!(validate_peak_level(0.5).is_err());
    }

    #[test]
    fn track_index_must_exist() {
        let mut project = Project::new("p");
        project.tracks.push(Track::new("a", TrackKind::Wave));
        assert!(validate_track_index(&project, 0).is_ok());
        assert!(matches!(
            validate_track_index(&project, 1),
            Err(CommandError::NotFound { .. })
        ));
    }
}
