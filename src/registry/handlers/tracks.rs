#![allow(clippy::needless_pass_by_value)]

use crate::context::CommandContext;
use crate::error::CommandError;
use crate::project::Track;
use crate::registry::params::{NewTrackParams, SetTrackParams};
use crate::registry::validation::{validate_gain, validate_pan, validate_track_index};

pub fn set_track(ctx: &mut CommandContext<'_>, p: SetTrackParams) -> Result<(), CommandError> {
    if let Some(gain) = p.gain {
        validate_gain(gain)?;
    }
    if let Some(pan) = p.pan {
        validate_pan(pan)?;
    }
    if let Some(name) = &p.name {
        if name.trim().is_empty() {
            return Err(CommandError::invalid("Name must not be empty"));
        }
    }

    let project = ctx.require_project()?;
    let mut project = project.lock();
    validate_track_index(&project, p.track)?;
    let Some(track) = project.track_mut(p.track) else {
        return Err(CommandError::NotFound {
            what: format!("Track {}", p.track),
        });
    };

    let mixer_change =
        p.gain.is_some() || p.pan.is_some() || p.mute.is_some() || p.solo.is_some();
    if mixer_change && !track.kind.is_playable() {
        // Reported, not fatal: the view flags below still apply
        ctx.error(&format!(
            "Track {} is a {} track; gain, pan, mute and solo were ignored",
            p.track,
            track.kind.label()
        ));
    } else {
        if let Some(gain) = p.gain {
            track.gain_db = gain;
        }
        if let Some(pan) = p.pan {
            track.pan = pan;
        }
        if let Some(mute) = p.mute {
            track.mute = mute;
        }
        if let Some(solo) = p.solo {
            track.solo = solo;
        }
    }

    if let Some(name) = p.name {
        track.name = name;
    }
    if let Some(selected) = p.selected {
        track.selected = selected;
    }
    if let Some(minimized) = p.minimized {
        track.minimized = minimized;
    }
    Ok(())
}

pub fn new_track(ctx: &mut CommandContext<'_>, p: NewTrackParams) -> Result<(), CommandError> {
    let project = ctx.require_project()?;
    let mut project = project.lock();
    let index = project.tracks.len();
    let name = p
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| format!("{} {}", kind_title(p.kind.label()), index + 1));
    project.tracks.push(Track::new(name.clone(), p.kind));

    ctx.start_struct();
    ctx.add_item(index, "Track");
    ctx.add_item(name, "Name");
    ctx.end_struct();
    Ok(())
}

fn kind_title(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
