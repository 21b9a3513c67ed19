//! Sink of last resort: everything goes to the diagnostic log.

use super::{Completion, FrameKind, ItemValue, Position, Render};
use crate::progress::ProgressOutcome;

/// Fallback when nobody is listening: nothing is rendered, but every event
/// still reaches the diagnostic log at a matching severity.
#[derive(Debug, Default)]
pub struct NullSink;

impl NullSink {
    pub fn new() -> Self {
        Self
    }
}

impl Render for NullSink {
    fn status(&mut self, text: &str) {
        tracing::info!(target: "cmdctx::output", "Status: {text}");
    }

    fn error(&mut self, text: &str) {
        tracing::warn!(target: "cmdctx::output", "Error: {text}");
    }

    fn progress(&mut self, fraction: f64) -> ProgressOutcome {
        tracing::debug!(target: "cmdctx::output", fraction, "Progress");
        ProgressOutcome::Continue
    }

    fn is_cancelled(&self) -> bool {
        false
    }

    fn open(&mut self, kind: FrameKind, position: &Position, depth: usize) {
        tracing::debug!(target: "cmdctx::output", %kind, name = ?position.name, depth, "start");
    }

    fn close(&mut self, kind: FrameKind, depth: usize) {
        tracing::debug!(target: "cmdctx::output", %kind, depth, "end");
    }

    fn item(&mut self, value: &ItemValue, position: &Position, depth: usize) {
        tracing::debug!(
            target: "cmdctx::output",
            name = ?position.name,
            kind = value.kind(),
            %value,
            depth,
            "item"
        );
    }

    fn complete(&mut self, completion: &Completion) {
        match completion {
            Completion::Success => tracing::debug!(target: "cmdctx::output", "finished: OK"),
            Completion::Failure(message) => {
                tracing::warn!(target: "cmdctx::output", %message, "finished: Failed");
            }
        }
    }

    fn flush(&mut self) {}
}
