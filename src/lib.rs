//! Command execution context and structured output.
//!
//! A command reports status, errors, progress and typed structured data
//! through its [`context::CommandContext`]; the bound
//! [`output::OutputSink`] decides whether that becomes dialogs for a person
//! or a line protocol for a script client.

pub mod context;
pub mod error;
pub mod logging;
pub mod output;
pub mod paths;
pub mod progress;
pub mod project;
pub mod registry;
pub mod session;
pub mod settings;
pub mod state;
