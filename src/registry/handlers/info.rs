#![allow(clippy::needless_pass_by_value)]

use crate::context::CommandContext;
use crate::error::CommandError;
use crate::project::Project;
use crate::registry::catalog::{self, param_summaries};
use crate::registry::params::{GetInfoParams, HelpParams, InfoType, MessageParams};
use crate::registry::{Command, CommandCategory};

pub fn help(ctx: &mut CommandContext<'_>, p: HelpParams) -> Result<(), CommandError> {
    let commands = &ctx.host().commands;
    let Some(name) = p.command else {
        ctx.start_array();
        for category in CommandCategory::all() {
            let count = commands
                .entries()
                .filter(|c| c.info().category == *category)
                .count();
            ctx.start_struct();
            ctx.add_item(category.slug(), "Name");
            ctx.add_item(category.description(), "Description");
            ctx.add_item(count, "Commands");
            ctx.end_struct();
        }
        ctx.end_array();
        return Ok(());
    };

    let command = commands.lookup(&name).ok_or_else(|| CommandError::NotFound {
        what: format!("Command \"{name}\""),
    })?;
    ctx.start_struct();
    describe_command(ctx, command.as_ref());
    ctx.end_struct();
    Ok(())
}

pub fn message(ctx: &mut CommandContext<'_>, p: MessageParams) -> Result<(), CommandError> {
    ctx.status(&p.text);
    Ok(())
}

pub fn get_info(ctx: &mut CommandContext<'_>, p: GetInfoParams) -> Result<(), CommandError> {
    match p.r#type {
        InfoType::Commands => {
            let commands = &ctx.host().commands;
            ctx.start_array();
            for command in commands.entries() {
                ctx.start_struct();
                describe_command(ctx, command.as_ref());
                ctx.end_struct();
            }
            ctx.end_array();
        }
        InfoType::Tracks => {
            let project = ctx.require_project()?;
            let project = project.lock();
            send_tracks(ctx, &project);
        }
        InfoType::Selection => {
            let project = ctx.require_project()?;
            let project = project.lock();
            ctx.start_struct();
            ctx.add_item(project.selection.start(), "Start");
            ctx.add_item(project.selection.end(), "End");
            ctx.add_item(project.selection.duration(), "Duration");
            ctx.start_field_array("Tracks");
            for (index, _) in project.selected_tracks() {
                ctx.add_item(index, "");
            }
            ctx.end_array();
            ctx.end_struct();
        }
        InfoType::Project => {
            let project = ctx.require_project()?;
            let project = project.lock();
            ctx.start_struct();
            ctx.add_item(&project.name, "Name");
            ctx.add_item(project.rate, "Rate");
            ctx.add_item(format!("{:?}", project.snap_to), "SnapTo");
            ctx.add_item(&project.selection_format, "SelectionFormat");
            ctx.add_item(project.tracks.len(), "TrackCount");
            ctx.end_struct();
        }
        InfoType::App => {
            let app = ctx.host();
            ctx.start_struct();
            ctx.add_item(app.name, "Name");
            ctx.add_item(app.version, "Version");
            ctx.add_item(app.project_count(), "Projects");
            ctx.add_item(app.commands.len(), "Commands");
            ctx.end_struct();
        }
    }
    Ok(())
}

/// Fields of one command; the caller opens and closes the struct.
fn describe_command(ctx: &mut CommandContext<'_>, command: &dyn Command) {
    let entry = catalog::entry(command);
    ctx.add_item(entry.name, "Id");
    ctx.add_item(entry.category.slug(), "Category");
    ctx.add_item(entry.description, "Description");
    ctx.start_field_array("Params");
    for param in param_summaries(&entry.param_schema) {
        ctx.start_struct();
        ctx.add_item(param.key, "Key");
        ctx.add_item(param.kind, "Type");
        ctx.add_bool(param.required, "Required");
        ctx.end_struct();
    }
    ctx.end_array();
}

fn send_tracks(ctx: &mut CommandContext<'_>, project: &Project) {
    ctx.start_array();
    for track in &project.tracks {
        ctx.start_struct();
        ctx.add_item(&track.name, "Name");
        ctx.add_item(track.kind.label(), "Kind");
        ctx.add_bool(track.selected, "Selected");
        ctx.add_bool(track.minimized, "Minimized");
        // Label tracks have no mixer settings
        if track.kind.is_playable() {
            ctx.add_bool(track.mute, "Mute");
            ctx.add_bool(track.solo, "Solo");
            ctx.add_item(track.gain_db, "Gain");
            ctx.add_item(track.pan, "Pan");
        }
        ctx.end_struct();
    }
    ctx.end_array();
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::super::testing::run_line;
    use crate::output::wire::Node;
    use crate::project::{Project, Track, TrackKind};
    use crate::state::AppState;

    fn app_with_tracks() -> std::sync::Arc<AppState> {
        let app = AppState::headless();
        let mut project = Project::new("Demo");
        project.tracks.push(Track::new("Vocals", TrackKind::Wave));
        project.tracks.push(Track::new("Markers", TrackKind::Label));
        project.tracks[0].selected = true;
        project.tracks[0].gain_db = -3.0;
        project.modify_selection(1.0, 2.5);
        app.open_project(project);
        app
    }

    #[test]
    fn message_echoes_as_status() {
        let app = AppState::headless();
        let (result, response) = run_line(&app, r#"Message: Text="hello there""#);
        assert!(result.is_ok());
        assert!(response.success);
        assert_eq!(response.statuses(), vec!["hello there"]);
    }

    #[test]
    fn help_describes_one_command() {
        let app = AppState::headless();
        let (_, response) = run_line(&app, "Help: Command=Select");
        let root = response.data()[0];
        assert_eq!(root.get("Id").unwrap().as_text(), Some("Select"));
        assert_eq!(root.get("Category").unwrap().as_text(), Some("selection"));
        let params = root.get("Params").unwrap().as_array().unwrap();
        let mode = params
            .iter()
            .find(|p| p.get("Key").unwrap().as_text() == Some("Mode"))
            .unwrap();
        assert_eq!(mode.get("Type").unwrap().as_text(), Some("Set|Add|Remove"));
        assert_eq!(mode.get("Required"), Some(&Node::Bool(false)));
    }

    #[test]
    fn help_for_unknown_command_fails() {
        let app = AppState::headless();
        let (result, response) = run_line(&app, "Help: Command=Nope");
        assert!(result.is_err());
        assert!(!response.success);
        assert_eq!(response.errors(), vec!["Command \"Nope\" not found"]);
        assert!(response.data().is_empty());
    }

    #[test]
    fn help_without_command_lists_categories() {
        let app = AppState::headless();
        let (_, response) = run_line(&app, "Help");
        let categories = response.data()[0].as_array().unwrap();
        assert_eq!(categories.len(), 4);
        assert_eq!(categories[0].get("Name").unwrap().as_text(), Some("query"));
    }

    #[test]
    fn get_info_commands_lists_every_command() {
        let app = AppState::headless();
        let (_, response) = run_line(&app, "GetInfo: Type=Commands");
        let commands = response.data()[0].as_array().unwrap();
        assert_eq!(commands.len(), app.commands.len());
    }

    #[test]
    fn get_info_tracks_skips_mixer_fields_on_label_tracks() {
        let app = app_with_tracks();
        let (_, response) = run_line(&app, "GetInfo: Type=Tracks");
        let tracks = response.data()[0].as_array().unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].get("Gain"), Some(&Node::Number(-3.0)));
        assert_eq!(tracks[0].get("Selected"), Some(&Node::Bool(true)));
        assert_eq!(tracks[1].get("Kind").unwrap().as_text(), Some("label"));
        assert!(tracks[1].get("Gain").is_none());
    }

    #[test]
    fn get_info_selection_and_project() {
        let app = app_with_tracks();
        let (_, response) = run_line(&app, "GetInfo: Type=Selection");
        let selection = response.data()[0];
        assert_eq!(selection.get("Start"), Some(&Node::Number(1.0)));
        assert_eq!(selection.get("End"), Some(&Node::Number(2.5)));
        assert_eq!(selection.get("Duration"), Some(&Node::Number(1.5)));
        assert_eq!(
            selection.get("Tracks").unwrap().as_array().unwrap(),
            &[Node::Number(0.0)]
        );

        let (_, response) = run_line(&app, "GetInfo: Type=Project");
        let project = response.data()[0];
        assert_eq!(project.get("Name").unwrap().as_text(), Some("Demo"));
        assert_eq!(project.get("TrackCount"), Some(&Node::Number(2.0)));
    }

    #[test]
    fn get_info_tracks_needs_a_project() {
        let app = AppState::headless();
        let (result, response) = run_line(&app, "GetInfo: Type=Tracks");
        assert!(result.is_err());
        assert_eq!(response.errors(), vec!["No project loaded"]);
    }

    #[test]
    fn get_info_app_reports_version() {
        let app = AppState::headless();
        let (_, response) = run_line(&app, "GetInfo: Type=App");
        let info = response.data()[0];
        assert_eq!(info.get("Name").unwrap().as_text(), Some("cmdctx"));
        assert_eq!(
            info.get("Version").unwrap().as_text(),
            Some(env!("CARGO_PKG_VERSION"))
        );
    }
}
