//! Turn a script line or a (name, JSON) pair into a runnable [`Invocation`].
//!
//! Script syntax is `Name: Key=Value Key="quoted value"`. The colon may be
//! omitted when there are no parameters. Values stay strings; the parameter
//! types accept string spellings of numbers and booleans.

use std::sync::Arc;

use serde_json::{Map, Value};

use super::{Command, CommandDirectory};
use crate::context::{CommandContext, UiEvent};
use crate::error::{AppError, CommandError};
use crate::output::OutputSink;
use crate::project::ProjectHandle;
use crate::state::AppState;

/// A parsed but unresolved script line.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptLine {
    pub name: String,
    pub params: Map<String, Value>,
}

pub fn parse_script_line(line: &str) -> Result<ScriptLine, AppError> {
    let line = line.trim();
    let (name, rest) = match line.split_once(':') {
        Some((name, rest)) => (name.trim(), rest),
        None => (line, ""),
    };
    if name.is_empty() {
        return Err(parse_error("missing command name"));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(parse_error(format!(
            "invalid command name \"{name}\"; expected 'Name: Key=Value ...'"
        )));
    }

    let tokens = shell_words::split(rest).map_err(|e| parse_error(e.to_string()))?;
    let mut params = Map::new();
    for token in tokens {
        let Some((key, value)) = token.split_once('=') else {
            return Err(parse_error(format!(
                "expected Key=Value, got \"{token}\""
            )));
        };
        if key.is_empty() {
            return Err(parse_error(format!("missing key in \"{token}\"")));
        }
        if params
            .insert(key.to_string(), Value::String(value.to_string()))
            .is_some()
        {
            return Err(parse_error(format!("parameter \"{key}\" given twice")));
        }
    }

    Ok(ScriptLine {
        name: name.to_string(),
        params,
    })
}

fn parse_error(message: impl Into<String>) -> AppError {
    AppError::ParseError {
        message: message.into(),
    }
}

// ── Builder ─────────────────────────────────────────────────────

/// Resolves names against a directory and validates parameters.
#[derive(Clone, Copy)]
pub struct CommandBuilder<'d> {
    directory: &'d CommandDirectory,
}

impl<'d> CommandBuilder<'d> {
    pub fn new(directory: &'d CommandDirectory) -> Self {
        Self { directory }
    }

    pub fn build_line(&self, line: &str) -> Result<Invocation, AppError> {
        let parsed = parse_script_line(line)?;
        self.build(&parsed.name, Value::Object(parsed.params))
    }

    pub fn build(&self, name: &str, parameter: Value) -> Result<Invocation, AppError> {
        let command = self
            .directory
            .lookup(name)
            .ok_or_else(|| AppError::UnknownCommand {
                name: name.to_string(),
            })?;
        command.validate(&parameter).map_err(|e| match e {
            CommandError::InvalidParameter { message } => AppError::ValidationError {
                message: format!("{name}: {message}"),
            },
            other => other.into(),
        })?;
        Ok(Invocation {
            command,
            parameter,
            index: 0,
            project: None,
            event: None,
        })
    }
}

// ── Invocation ──────────────────────────────────────────────────

/// A resolved command with validated parameters, ready to run once or more.
#[derive(Clone)]
pub struct Invocation {
    command: Arc<dyn Command>,
    parameter: Value,
    index: usize,
    project: Option<ProjectHandle>,
    event: Option<UiEvent>,
}

impl std::fmt::Debug for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invocation")
            .field("command", &self.command.name())
            .field("parameter", &self.parameter)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl Invocation {
    pub fn name(&self) -> &'static str {
        self.command.name()
    }

    pub fn parameter(&self) -> &Value {
        &self.parameter
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    pub fn with_project(mut self, project: ProjectHandle) -> Self {
        self.project = Some(project);
        self
    }

    pub fn with_event(mut self, event: UiEvent) -> Self {
        self.event = Some(event);
        self
    }

    /// Bind a context to `sink`, apply the command and finish the sink with
    /// the outcome. A failure is also reported through the sink's error channel.
    pub fn run(&self, app: &AppState, sink: Option<OutputSink>) -> Result<(), CommandError> {
        let mut ctx = match sink {
            Some(sink) => CommandContext::new(app, sink),
            None => CommandContext::detached(app),
        }
        .with_parameter(self.parameter.clone())
        .with_index(self.index);
        if let Some(project) = &self.project {
            ctx = ctx.with_project(Arc::clone(project));
        }
        if let Some(event) = &self.event {
            ctx = ctx.with_event(event);
        }

        let name = self.name();
        tracing::debug!(command = name, index = self.index, "applying command");
        let result = self.command.apply(&mut ctx);
        match &result {
            Ok(()) => tracing::debug!(command = name, "command succeeded"),
            Err(e) => {
                tracing::warn!(command = name, error = %e, "command failed");
                ctx.error(&e.to_string());
            }
        }
        ctx.finish(&result);
        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::output::stream::SharedWriter;
    use crate::output::wire::Response;
    use crate::output::{StreamSink, WireFormat};
    use crate::project::Project;

    #[test]
    fn parses_name_and_quoted_values() {
        let line = parse_script_line(r#"SetTrack: Track=0 Name="Lead Vocal" Mute=true"#).unwrap();
        assert_eq!(line.name, "SetTrack");
        assert_eq!(
            Value::Object(line.params),
            json!({ "Track": "0", "Name": "Lead Vocal", "Mute": "true" })
        );
    }

    #[test]
    fn name_alone_has_no_params() {
        for text in ["SelectAll", "SelectAll:", "  SelectAll:   "] {
            let line = parse_script_line(text).unwrap();
            assert_eq!(line.name, "SelectAll");
            assert!(line.params.is_empty());
        }
    }

    #[test]
    fn malformed_lines_are_parse_errors() {
        for text in [
            "",
            ": Track=1",
            "Set Track: Track=1",
            "SetTrack: Track",
            "SetTrack: =1",
            "SetTrack: Track=1 Track=2",
            r#"Message: Text="unterminated"#,
        ] {
            assert!(
                matches!(parse_script_line(text), Err(AppError::ParseError { .. })),
                "{text:?} should not parse"
            );
        }
    }

    #[test]
    fn value_may_contain_equals_and_colons() {
        let line = parse_script_line(r#"Message: Text="a=b: c""#).unwrap();
        assert_eq!(line.params["Text"], "a=b: c");
    }

    #[test]
    fn build_rejects_unknown_commands_and_bad_params() {
        let directory = CommandDirectory::with_builtins();
        let builder = CommandBuilder::new(&directory);
        assert!(matches!(
            builder.build_line("Bogus:"),
            Err(AppError::UnknownCommand { .. })
        ));
        let err = builder.build_line("SetTrack: Track=x").unwrap_err();
        assert!(matches!(err, AppError::ValidationError { .. }));
        assert!(err.to_string().starts_with("SetTrack: "));
        assert!(builder.build("Message", json!({ "Text": "hi" })).is_ok());
        assert!(builder.build("Message", Value::Null).is_ok());
    }

    #[test]
    fn run_reports_failure_then_finishes_failed() {
        let directory = CommandDirectory::with_builtins();
        let app = AppState::headless();
        let buffer = SharedWriter::new(Vec::new());
        let sink = OutputSink::stream(StreamSink::new(buffer.clone(), WireFormat::Lines));

        // No project is open, so SetTrack fails
        let invocation = CommandBuilder::new(&directory)
            .build_line("SetTrack: Track=0 Mute=1")
            .unwrap();
        let result = invocation.run(&app, Some(sink));
        assert_eq!(result, Err(CommandError::NoProject));

        let response = Response::parse(&buffer.text()).unwrap();
        assert!(!response.success);
        assert_eq!(response.errors(), vec!["No project loaded"]);
    }

    #[test]
    fn run_uses_bound_project_over_active() {
        let directory = CommandDirectory::with_builtins();
        let app = AppState::headless();
        app.open_project(Project::new("Active"));
        let bound = std::sync::Arc::new(parking_lot::Mutex::new(Project::new("Bound")));

        CommandBuilder::new(&directory)
            .build_line("NewTrack: Name=Extra")
            .unwrap()
            .with_project(Arc::clone(&bound))
            .run(&app, None)
            .unwrap();

        assert_eq!(bound.lock().tracks.len(), 1);
        assert!(app.active_project().unwrap().lock().tracks.is_empty());
    }
}
