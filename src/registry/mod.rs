pub mod builder;
pub mod catalog;
pub mod handlers;
pub mod params;
pub mod validation;

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::CommandContext;
use crate::error::CommandError;

use handlers::{info, normalize, select, tracks};
use params::{
    GetInfoParams, HelpParams, MessageParams, NewTrackParams, NoParams, NormalizeParams,
    SelectParams, SetTrackParams,
};

pub use builder::{CommandBuilder, Invocation};

// ── Command metadata ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandCategory {
    Query,
    Selection,
    Tracks,
    Effect,
}

impl CommandCategory {
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Selection => "selection",
            Self::Tracks => "tracks",
            Self::Effect => "effect",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Query => "Help, messages and project/app inspection",
            Self::Selection => "Time and track selection",
            Self::Tracks => "Create tracks and change their settings",
            Self::Effect => "Long-running processing over tracks",
        }
    }

    pub fn all() -> &'static [CommandCategory] {
        &[Self::Query, Self::Selection, Self::Tracks, Self::Effect]
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CommandInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub category: CommandCategory,
}

// ── Command trait ───────────────────────────────────────────────

/// A named operation. The body talks to the outside only through the context.
pub trait Command: Send + Sync {
    fn info(&self) -> CommandInfo;

    /// JSON schema of the parameter payload.
    fn param_schema(&self) -> Value;

    /// Check a payload against the parameter type without running.
    fn validate(&self, parameter: &Value) -> Result<(), CommandError>;

    fn apply(&self, ctx: &mut CommandContext<'_>) -> Result<(), CommandError>;

    fn name(&self) -> &'static str {
        self.info().name
    }
}

// ── define_commands! macro ──────────────────────────────────────

/// Single source of truth for the built-in commands. For each entry it
/// generates a unit struct implementing [`Command`] that deserializes its
/// params and forwards to the handler, plus `builtin_commands()` listing them
/// in declaration order.
macro_rules! define_commands {
    (
        $(
            [ $cat:expr ]
            $ty:ident ( $params:ty )
            => $handler:path, $name:literal : $desc:literal ;
        )*
    ) => {
        $(
            pub struct $ty;

            impl Command for $ty {
                fn info(&self) -> CommandInfo {
                    CommandInfo {
                        name: $name,
                        description: $desc,
                        category: $cat,
                    }
                }

                fn param_schema(&self) -> Value {
                    catalog::schema_value::<$params>()
                }

                fn validate(&self, parameter: &Value) -> Result<(), CommandError> {
                    catalog::de::<$params>(parameter).map(|_| ())
                }

                fn apply(&self, ctx: &mut CommandContext<'_>) -> Result<(), CommandError> {
                    let params: $params = ctx.params()?;
                    $handler(ctx, params)
                }
            }
        )*

        fn builtin_commands() -> Vec<Arc<dyn Command>> {
            vec![ $( Arc::new($ty), )* ]
        }
    };
}

define_commands! {
    // ── Query ───────────────────────────────────────────────────
    [CommandCategory::Query]
    HelpCommand(HelpParams)
    => info::help, "Help": "Describe a command: its category, description and parameters.";

    [CommandCategory::Query]
    MessageCommand(MessageParams)
    => info::message, "Message": "Echo text back as a status message.";

    [CommandCategory::Query]
    GetInfoCommand(GetInfoParams)
    => info::get_info, "GetInfo": "List commands, tracks, the selection, project settings or app details.";

    // ── Selection ───────────────────────────────────────────────
    [CommandCategory::Selection]
    SelectCommand(SelectParams)
    => select::select, "Select": "Set the time selection and which tracks are selected.";

    [CommandCategory::Selection]
    SelectAllCommand(NoParams)
    => select::select_all, "SelectAll": "Select every track over the whole project.";

    // ── Tracks ──────────────────────────────────────────────────
    [CommandCategory::Tracks]
    SetTrackCommand(SetTrackParams)
    => tracks::set_track, "SetTrack": "Change a track's name, gain, pan, mute, solo and view flags.";

    [CommandCategory::Tracks]
    NewTrackCommand(NewTrackParams)
    => tracks::new_track, "NewTrack": "Append a new track to the project.";

    // ── Effect ──────────────────────────────────────────────────
    [CommandCategory::Effect]
    NormalizeCommand(NormalizeParams)
    => normalize::normalize, "Normalize": "Scale selected tracks so their peak reaches the given level.";
}

// ── Directory ───────────────────────────────────────────────────

/// Name-indexed set of commands, iterated in registration order.
#[derive(Clone, Default)]
pub struct CommandDirectory {
    commands: IndexMap<&'static str, Arc<dyn Command>>,
}

impl CommandDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut directory = Self::new();
        for command in builtin_commands() {
            directory.register(command);
        }
        directory
    }

    /// Add a command, replacing any previous one of the same name.
    pub fn register(&mut self, command: Arc<dyn Command>) {
        let name = command.name();
        if self.commands.insert(name, command).is_some() {
            tracing::warn!(name, "command registered twice; keeping the later one");
        }
    }

    /// Case-sensitive lookup by script name.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.get(name).cloned()
    }

    pub fn entries(&self) -> impl Iterator<Item = &Arc<dyn Command>> {
        self.commands.values()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
