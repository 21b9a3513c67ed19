//! Per-invocation context handed to `Command::apply`.
//!
//! A `CommandContext` binds the project a command works on, the one sink its
//! output goes to, the validated parameters and some invocation metadata. It
//! is the only channel a command has to the outside: the same command body
//! serves an interactive user and a script client because the sink, not the
//! command, decides how each event is presented.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::CommandError;
use crate::output::{Completion, ItemValue, OutputSink};
use crate::project::ProjectHandle;
use crate::state::AppState;

/// Keyboard modifiers held when a UI action fired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub control: bool,
    pub alt: bool,
}

/// The UI trigger behind an interactive invocation (menu item, shortcut).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiEvent {
    pub origin: String,
    pub modifiers: Modifiers,
}

pub struct CommandContext<'a> {
    app: &'a AppState,
    project: Option<ProjectHandle>,
    sink: Option<OutputSink>,
    source_event: Option<&'a UiEvent>,
    index: usize,
    parameter: Value,
}

impl<'a> CommandContext<'a> {
    pub fn new(app: &'a AppState, sink: OutputSink) -> Self {
        Self {
            app,
            project: None,
            sink: Some(sink),
            source_event: None,
            index: 0,
            parameter: Value::Null,
        }
    }

    /// A context with nowhere to send output; events only reach the log.
    pub fn detached(app: &'a AppState) -> Self {
        Self {
            app,
            project: None,
            sink: None,
            source_event: None,
            index: 0,
            parameter: Value::Null,
        }
    }

    /// Bind a specific project instead of the app's active one.
    pub fn with_project(mut self, project: ProjectHandle) -> Self {
        self.project = Some(project);
        self
    }

    pub fn with_event(mut self, event: &'a UiEvent) -> Self {
        self.source_event = Some(event);
        self
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    pub fn with_parameter(mut self, parameter: Value) -> Self {
        self.parameter = parameter;
        self
    }

    // ── Accessors ──

    /// The process-wide application object.
    pub fn host(&self) -> &'a AppState {
        self.app
    }

    /// The project to act on: the bound one, else the app's active project.
    pub fn project(&self) -> Option<ProjectHandle> {
        self.project.clone().or_else(|| self.app.active_project())
    }

    pub fn require_project(&self) -> Result<ProjectHandle, CommandError> {
        self.project().ok_or(CommandError::NoProject)
    }

    /// The UI event that triggered this invocation; `None` for scripts.
    pub fn source_event(&self) -> Option<&'a UiEvent> {
        self.source_event
    }

    /// Position of this invocation within its batch.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn parameter(&self) -> &Value {
        &self.parameter
    }

    /// Deserialize the parameter payload. A missing payload reads as `{}`.
    pub fn params<T: DeserializeOwned>(&self) -> Result<T, CommandError> {
        crate::registry::catalog::de(&self.parameter)
    }

    pub fn sink(&self) -> Option<&OutputSink> {
        self.sink.as_ref()
    }

    // ── Output ──

    pub fn status(&mut self, text: &str) {
        match self.sink.as_mut() {
            Some(sink) => sink.status(text),
            None => tracing::debug!("Status: {text}"),
        }
    }

    /// Report a problem. Does not fail the command; return an `Err` for that.
    pub fn error(&mut self, text: &str) {
        match self.sink.as_mut() {
            Some(sink) => sink.error(text),
            None => tracing::debug!("Error: {text}"),
        }
    }

    /// Report progress in `[0, 1]`. Returns `true` when the command should
    /// stop because the user cancelled.
    pub fn progress(&mut self, fraction: f64) -> bool {
        match self.sink.as_mut() {
            Some(sink) => sink.progress(fraction).is_cancelled(),
            None => {
                tracing::trace!(fraction, "Progress");
                false
            }
        }
    }

    /// Cooperative cancellation poll.
    pub fn is_cancelled(&self) -> bool {
        self.sink.as_ref().is_some_and(OutputSink::is_cancelled)
    }

    pub fn start_array(&mut self) {
        self.start_field_array("");
    }

    /// Open an array as a named field of the enclosing struct.
    pub fn start_field_array(&mut self, name: &str) {
        match self.sink.as_mut() {
            Some(sink) => sink.start_array(name),
            None => tracing::trace!(name, "StartArray"),
        }
    }

    pub fn end_array(&mut self) {
        match self.sink.as_mut() {
            Some(sink) => sink.end_array(),
            None => tracing::trace!("EndArray"),
        }
    }

    pub fn start_struct(&mut self) {
        self.start_field_struct("");
    }

    /// Open a struct as a named field of the enclosing struct.
    pub fn start_field_struct(&mut self, name: &str) {
        match self.sink.as_mut() {
            Some(sink) => sink.start_struct(name),
            None => tracing::trace!(name, "StartStruct"),
        }
    }

    pub fn end_struct(&mut self) {
        match self.sink.as_mut() {
            Some(sink) => sink.end_struct(),
            None => tracing::trace!("EndStruct"),
        }
    }

    /// Add a typed field. `name` may be empty inside an array.
    pub fn add_item(&mut self, value: impl Into<ItemValue>, name: &str) {
        let value = value.into();
        match self.sink.as_mut() {
            Some(sink) => sink.add_item(&value, name),
            None => tracing::trace!(name, %value, "AddItem"),
        }
    }

    pub fn add_bool(&mut self, value: bool, name: &str) {
        self.add_item(ItemValue::Bool(value), name);
    }

    /// End the invocation: close the sink with the command's result.
    pub fn finish(mut self, result: &Result<(), CommandError>) {
        if let Some(sink) = self.sink.as_mut() {
            let completion = match result {
                Ok(()) => Completion::Success,
                Err(e) => Completion::Failure(e.to_string()),
            };
            sink.finish(&completion);
        }
    }
}
