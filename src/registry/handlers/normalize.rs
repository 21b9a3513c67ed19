#![allow(clippy::needless_pass_by_value)]

use crate::context::CommandContext;
use crate::error::CommandError;
use crate::progress::step_fraction;
use crate::registry::params::NormalizeParams;
use crate::registry::validation::validate_peak_level;

fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

fn linear_to_db(linear: f64) -> f64 {
    20.0 * linear.log10()
}

/// Bring each target track's peak to `PeakLevel`, reporting progress per
/// track. Silent tracks are reported and skipped; the command fails only if
/// no track was normalized or the user cancelled.
pub fn normalize(ctx: &mut CommandContext<'_>, p: NormalizeParams) -> Result<(), CommandError> {
    validate_peak_level(p.peak_level)?;
    let target = db_to_linear(p.peak_level);

    let project = ctx.require_project()?;
    let mut project = project.lock();
    let targets: Vec<usize> = project
        .tracks
        .iter()
        .enumerate()
        .filter(|(_, t)| t.kind.is_playable() && (t.selected || !p.apply_to_selected))
        .map(|(i, _)| i)
        .collect();
    if targets.is_empty() {
        return Err(CommandError::failed(if p.apply_to_selected {
            "Normalize needs at least one selected audio track"
        } else {
            "Project has no audio tracks to normalize"
        }));
    }

    let total = targets.len();
    let mut normalized = 0usize;
    ctx.start_array();
    for (done, &index) in targets.iter().enumerate() {
        if ctx.progress(step_fraction(done, total)) {
            ctx.end_array();
            tracing::info!(normalized, total, "normalize cancelled");
            return Err(CommandError::Cancelled);
        }
        let Some(track) = project.track_mut(index) else {
            continue;
        };
        if track.peak <= 0.0 || !track.peak.is_finite() {
            ctx.error(&format!("Track \"{}\" is silent; skipped", track.name));
            continue;
        }
        let applied_db = linear_to_db(target / track.peak);
        track.peak = target;
        normalized += 1;

        ctx.start_struct();
        ctx.add_item(index, "Track");
        ctx.add_item(&track.name, "Name");
        ctx.add_item(applied_db, "GainApplied");
        ctx.end_struct();
    }
    ctx.end_array();
    ctx.progress(1.0);

    if normalized == 0 {
        return Err(CommandError::failed("No track could be normalized"));
    }
    ctx.status(&format!("Normalized {normalized} of {total} tracks"));
    Ok(())
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::super::testing::run_line;
    use super::*;
    use crate::output::interactive::testing::{RecordingUi, UiCall};
    use crate::output::wire::{Event, Node};
    use crate::output::{FrameState, OutputSink};
    use crate::project::{Project, ProjectHandle, Track, TrackKind};
    use crate::registry::CommandBuilder;
    use crate::state::AppState;

    fn app_with_peaks(peaks: &[f64]) -> (std::sync::Arc<AppState>, ProjectHandle) {
        let app = AppState::headless();
        let mut project = Project::new("Norm");
        for (i, peak) in peaks.iter().enumerate() {
            let mut track = Track::new(format!("T{i}"), TrackKind::Wave);
            track.peak = *peak;
            track.selected = true;
            project.tracks.push(track);
        }
        let handle = app.open_project(project);
        (app, handle)
    }

    #[test]
    fn normalizes_selected_tracks_with_progress_per_track() {
        let (app, handle) = app_with_peaks(&[0.5, 0.25]);
        let (result, response) = run_line(&app, "Normalize: PeakLevel=0");
        result.unwrap();
        assert!(response.success);

        let progress: Vec<f64> = response
            .events
            .iter()
            .filter_map(|e| match e {
                Event::Progress(p) => Some(*p),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![0.0, 0.5, 1.0]);

        let rows = response.data()[0].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        let Some(Node::Number(gain)) = rows[1].get("GainApplied") else {
            panic!("GainApplied missing");
        };
        assert!((gain - 12.041).abs() < 1e-3);
        assert!(handle.lock().tracks.iter().all(|t| (t.peak - 1.0).abs() < 1e-12));
        assert_eq!(response.statuses(), vec!["Normalized 2 of 2 tracks"]);
    }

    #[test]
    fn silent_tracks_are_reported_and_skipped() {
        let (app, _) = app_with_peaks(&[0.0, 0.5]);
        let (result, response) = run_line(&app, "Normalize");
        result.unwrap();
        assert_eq!(response.errors(), vec!["Track \"T0\" is silent; skipped"]);
        assert_eq!(response.data()[0].as_array().unwrap().len(), 1);
    }

    #[test]
    fn fails_when_nothing_was_normalized() {
        let (app, _) = app_with_peaks(&[0.0]);
        let (result, response) = run_line(&app, "Normalize");
        assert_eq!(
            result,
            Err(CommandError::failed("No track could be normalized"))
        );
        assert!(!response.success);
        // The per-track report and the failure are separate error events
        assert_eq!(response.errors().len(), 2);
    }

    #[test]
    fn apply_to_selected_false_covers_all_playable_tracks() {
        let (app, handle) = app_with_peaks(&[0.5, 0.5]);
        handle.lock().tracks[1].selected = false;
        handle
            .lock()
            .tracks
            .push(Track::new("Labels", TrackKind::Label));
        let (_, response) = run_line(&app, "Normalize: ApplyToSelected=false");
        assert_eq!(response.data()[0].as_array().unwrap().len(), 2);
    }

    #[test]
    fn positive_peak_level_is_invalid() {
        let (app, _) = app_with_peaks(&[0.5]);
        let (result, _) = run_line(&app, "Normalize: PeakLevel=3");
        assert!(matches!(result, Err(CommandError::InvalidParameter { .. })));
    }

    #[test]
    fn user_cancel_stops_between_tracks_with_frames_closed() {
        let (app, handle) = app_with_peaks(&[0.5, 0.5, 0.5]);
        let ui = RecordingUi::default();
        ui.cancel_after(2);

        let invocation = CommandBuilder::new(&app.commands)
            .build_line("Normalize: PeakLevel=-1")
            .unwrap();
        let sink = OutputSink::interactive(ui.clone());
        let result = invocation.run(&app, Some(sink));
        assert_eq!(result, Err(CommandError::Cancelled));

        // First track was processed; the rest are untouched
        let project = handle.lock();
        assert!((project.tracks[0].peak - db_to_linear(-1.0)).abs() < 1e-12);
        assert_eq!(project.tracks[1].peak, 0.5);
        assert_eq!(project.tracks[2].peak, 0.5);

        let calls = ui.calls();
        assert!(calls.contains(&UiCall::Alert("Cancelled by user".into())));
        assert_eq!(calls.last(), Some(&UiCall::CloseProgress));
    }

    #[test]
    fn cancel_leaves_sink_idle() {
        let (app, _) = app_with_peaks(&[0.5, 0.5]);
        let ui = RecordingUi::default();
        ui.cancel();
        let mut ctx = CommandContext::new(&app, OutputSink::interactive(ui));
        let params: NormalizeParams = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(normalize(&mut ctx, params), Err(CommandError::Cancelled));
        assert_eq!(ctx.sink().unwrap().state(), FrameState::Idle);
        assert!(ctx.sink().unwrap().violations().is_empty());
    }
}
