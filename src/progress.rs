use serde::Serialize;

/// Answer of a progress update: whether the command may keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProgressOutcome {
    Continue,
    Cancelled,
}

impl ProgressOutcome {
    pub fn is_cancelled(self) -> bool {
        matches!(self, ProgressOutcome::Cancelled)
    }
}

/// Clamp a fraction into `[0.0, 1.0]` for display. NaN maps to 0.
pub fn display_fraction(fraction: f64) -> f64 {
    if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    }
}

/// Fraction of `done` out of `total` steps, 1.0 when there is nothing to do.
#[allow(clippy::cast_precision_loss)]
pub fn step_fraction(done: usize, total: usize) -> f64 {
    if total == 0 {
        1.0
    } else {
        done as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_fraction_clamps() {
        assert_eq!(display_fraction(-0.5), 0.0);
        assert_eq!(display_fraction(0.25), 0.25);
        assert_eq!(display_fraction(3.0), 1.0);
        assert_eq!(display_fraction(f64::NAN), 0.0);
    }

    #[test]
    fn step_fraction_handles_empty_work() {
        assert_eq!(step_fraction(0, 0), 1.0);
        assert_eq!(step_fraction(1, 4), 0.25);
    }
}
