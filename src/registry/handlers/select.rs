#![allow(clippy::needless_pass_by_value)]

use crate::context::CommandContext;
use crate::error::CommandError;
use crate::registry::params::{NoParams, SelectMode, SelectParams};
use crate::registry::validation::{validate_time, validate_track_index};

pub fn select(ctx: &mut CommandContext<'_>, p: SelectParams) -> Result<(), CommandError> {
    if let Some(start) = p.start {
        validate_time(start, "Start")?;
    }
    if let Some(end) = p.end {
        validate_time(end, "End")?;
    }

    if p.track.is_none() && p.track_count.is_some() {
        return Err(CommandError::invalid("TrackCount requires Track"));
    }

    let project = ctx.require_project()?;
    let mut project = project.lock();

    let track_range = match p.track {
        Some(first) => {
            let count = p.track_count.unwrap_or(1);
            if count == 0 {
                return Err(CommandError::invalid("TrackCount must be at least 1"));
            }
            let last = first.saturating_add(count - 1);
            validate_track_index(&project, last)?;
            Some(first..=last)
        }
        None => None,
    };

    if p.start.is_some() || p.end.is_some() {
        let start = p.start.unwrap_or(project.selection.start());
        let end = p.end.unwrap_or(project.selection.end());
        project.modify_selection(start, end);
    }

    if let Some(range) = track_range {
        for (index, track) in project.tracks.iter_mut().enumerate() {
            let in_range = range.contains(&index);
            track.selected = match p.mode {
                SelectMode::Set => in_range,
                SelectMode::Add => track.selected || in_range,
                SelectMode::Remove => track.selected && !in_range,
            };
        }
    }

    let selected = project.selected_tracks().count();
    tracing::debug!(
        start = project.selection.start(),
        end = project.selection.end(),
        selected,
        "selection changed"
    );
    Ok(())
}

pub fn select_all(ctx: &mut CommandContext<'_>, _p: NoParams) -> Result<(), CommandError> {
    let project = ctx.require_project()?;
    let mut project = project.lock();
    let end = project.tracks.iter().map(|t| t.end_time()).fold(0.0, f64::max);
    project.modify_selection(0.0, end);
    for track in &mut project.tracks {
        track.selected = true;
    }
    Ok(())
}
