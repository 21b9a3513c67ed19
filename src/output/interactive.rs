//! Interactive sink for a person at a UI: alerts, a cancellable progress
//! indicator and plain-text rendering of structured output.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::wire::indent;
use super::{Completion, FrameKind, ItemValue, Position, Render};
use crate::progress::{display_fraction, ProgressOutcome};

/// The user-facing surface an interactive invocation reports to.
pub trait UiHost {
    /// Transient status area.
    fn show_status(&mut self, text: &str);
    /// Blocking modal alert.
    fn show_alert(&mut self, text: &str);
    /// Drive the cancellable progress indicator. Returns `Cancelled` once the
    /// user has asked to stop.
    fn update_progress(&mut self, fraction: f64) -> ProgressOutcome;
    /// Dismiss the progress indicator.
    fn close_progress(&mut self) {}
    /// Present a block of human-readable result text.
    fn show_text(&mut self, text: &str);
}

/// Renders events for a person: alerts for errors, a progress indicator that
/// can be cancelled, and structured output as indented plain text.
pub struct InteractiveSink {
    ui: Box<dyn UiHost>,
    text: String,
    /// One entry per open frame: whether it printed a `name:` header.
    headers: Vec<bool>,
    cancelled: bool,
    progress_shown: bool,
}

impl InteractiveSink {
    pub fn new(ui: Box<dyn UiHost>) -> Self {
        Self {
            ui,
            text: String::new(),
            headers: Vec::new(),
            cancelled: false,
            progress_shown: false,
        }
    }

    /// Only named frames indent their contents.
    fn push_line(&mut self, line: &str) {
        let level = self.headers.iter().filter(|named| **named).count();
        self.text.push_str(&indent(level));
        self.text.push_str(line);
        self.text.push('\n');
    }

    fn show_pending_text(&mut self) {
        if !self.text.is_empty() {
            let text = std::mem::take(&mut self.text);
            self.ui.show_text(text.trim_end());
        }
    }
}

impl Render for InteractiveSink {
    fn status(&mut self, text: &str) {
        self.ui.show_status(text);
    }

    fn error(&mut self, text: &str) {
        self.ui.show_alert(text);
    }

    fn progress(&mut self, fraction: f64) -> ProgressOutcome {
        if self.cancelled {
            return ProgressOutcome::Cancelled;
        }
        self.progress_shown = true;
        let outcome = self.ui.update_progress(display_fraction(fraction));
        if outcome.is_cancelled() {
            tracing::info!("progress cancelled by user");
            self.cancelled = true;
        }
        outcome
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    fn open(&mut self, kind: FrameKind, position: &Position, _depth: usize) {
        if kind == FrameKind::Struct && position.parent == Some(FrameKind::Array) && !position.first {
            self.text.push('\n');
        }
        if let Some(name) = &position.name {
            self.push_line(&format!("{name}:"));
        }
        self.headers.push(position.name.is_some());
    }

    fn close(&mut self, _kind: FrameKind, depth: usize) {
        self.headers.pop();
        if depth == 0 {
            self.show_pending_text();
        }
    }

    fn item(&mut self, value: &ItemValue, position: &Position, _depth: usize) {
        let line = match &position.name {
            Some(name) => format!("{name}: {value}"),
            None => value.to_string(),
        };
        self.push_line(&line);
    }

    fn complete(&mut self, _completion: &Completion) {
        if self.progress_shown {
            self.ui.close_progress();
            self.progress_shown = false;
        }
        self.show_pending_text();
    }

    fn flush(&mut self) {
        self.show_pending_text();
    }
}

// ── Terminal host ────────────────────────────────────────────────

/// `UiHost` for a terminal: status and alerts on stderr, results on stdout,
/// and a text progress bar that a Ctrl-C handler can cancel via `cancel`.
pub struct TerminalUi {
    cancel: Arc<AtomicBool>,
}

impl TerminalUi {
    pub fn new(cancel: Arc<AtomicBool>) -> Self {
        Self { cancel }
    }
}

impl UiHost for TerminalUi {
    fn show_status(&mut self, text: &str) {
        eprintln!("{text}");
    }

    fn show_alert(&mut self, text: &str) {
        eprintln!("Error: {text}");
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn update_progress(&mut self, fraction: f64) -> ProgressOutcome {
        const WIDTH: usize = 30;
        let filled = (fraction * WIDTH as f64).round() as usize;
        let bar = format!("{}{}", "#".repeat(filled), ".".repeat(WIDTH.saturating_sub(filled)));
        let mut stderr = std::io::stderr();
        let _ = write!(stderr, "\r[{bar}] {:>3.0}%", fraction * 100.0);
        let _ = stderr.flush();
        if self.cancel.load(Ordering::SeqCst) {
            ProgressOutcome::Cancelled
        } else {
            ProgressOutcome::Continue
        }
    }

    fn close_progress(&mut self) {
        eprintln!();
    }

    fn show_text(&mut self, text: &str) {
        println!("{text}");
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::UiHost;
    use crate::progress::ProgressOutcome;

    #[derive(Debug, Clone, PartialEq)]
    pub enum UiCall {
        Status(String),
        Alert(String),
        Progress(f64),
        CloseProgress,
        Text(String),
    }

    /// Records every call; `cancel()` plays the user pressing Cancel.
    #[derive(Clone, Default)]
    pub struct RecordingUi {
        pub calls: Rc<RefCell<Vec<UiCall>>>,
        cancel_requested: Rc<Cell<bool>>,
        cancel_after: Rc<Cell<Option<usize>>>,
        progress_calls: Rc<Cell<usize>>,
    }

    impl RecordingUi {
        pub fn cancel(&self) {
            self.cancel_requested.set(true);
        }

        /// Press Cancel during the `n`th progress update.
        pub fn cancel_after(&self, n: usize) {
            self.cancel_after.set(Some(n));
        }

        pub fn calls(&self) -> Vec<UiCall> {
            self.calls.borrow().clone()
        }

        pub fn texts(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    UiCall::Text(t) => Some(t),
                    _ => None,
                })
                .collect()
        }
    }

    impl UiHost for RecordingUi {
        fn show_status(&mut self, text: &str) {
            self.calls.borrow_mut().push(UiCall::Status(text.to_string()));
        }

        fn show_alert(&mut self, text: &str) {
            self.calls.borrow_mut().push(UiCall::Alert(text.to_string()));
        }

        fn update_progress(&mut self, fraction: f64) -> ProgressOutcome {
            self.calls.borrow_mut().push(UiCall::Progress(fraction));
            let count = self.progress_calls.get() + 1;
            self.progress_calls.set(count);
            if self.cancel_after.get().is_some_and(|n| count >= n) {
                self.cancel_requested.set(true);
            }
            if self.cancel_requested.get() {
                ProgressOutcome::Cancelled
            } else {
                ProgressOutcome::Continue
            }
        }

        fn close_progress(&mut self) {
            self.calls.borrow_mut().push(UiCall::CloseProgress);
        }

        fn show_text(&mut self, text: &str) {
            self.calls.borrow_mut().push(UiCall::Text(text.to_string()));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::testing::{RecordingUi, UiCall};
    use super::*;
    use crate::output::OutputSink;

    #[test]
    fn messages_go_to_status_and_alert() {
        let ui = RecordingUi::default();
        let mut out = OutputSink::interactive(ui.clone());
        out.status("Loaded");
        out.error("Track 3 is empty");
        out.finish(&Completion::Success);

        assert_eq!(
            ui.calls(),
            vec![
                UiCall::Status("Loaded".into()),
                UiCall::Alert("Track 3 is empty".into())
            ]
        );
    }

    #[test]
    fn structured_output_renders_as_indented_text() {
        let ui = RecordingUi::default();
        let mut out = OutputSink::interactive(ui.clone());
        out.start_array("");
        out.start_struct("");
        out.add_item(&ItemValue::from("Vocals"), "Name");
        out.add_item(&ItemValue::from(-3.0), "Gain");
        out.end_struct();
        out.start_struct("");
        out.add_item(&ItemValue::from("Drums"), "Name");
        out.start_array("Clips");
        out.add_item(&ItemValue::from(1.5), "");
        out.end_array();
        out.end_struct();
        out.end_array();
        out.finish(&Completion::Success);

        assert_eq!(
            ui.texts(),
            vec!["Name: Vocals\nGain: -3\n\nName: Drums\nClips:\n  1.5".to_string()]
        );
    }

    #[test]
    fn cancellation_latches_after_user_cancels() {
        let ui = RecordingUi::default();
        let mut out = OutputSink::interactive(ui.clone());
        assert_eq!(out.progress(0.25), ProgressOutcome::Continue);
        assert!(!out.is_cancelled());

        ui.cancel();
        assert_eq!(out.progress(0.5), ProgressOutcome::Cancelled);
        assert!(out.is_cancelled());
        // Further updates keep reporting cancellation without asking the UI
        assert_eq!(out.progress(0.75), ProgressOutcome::Cancelled);

        out.finish(&Completion::Failure("Cancelled".into()));
        assert_eq!(
            ui.calls(),
            vec![
                UiCall::Progress(0.25),
                UiCall::Progress(0.5),
                UiCall::CloseProgress
            ]
        );
    }

    #[test]
    fn progress_is_clamped_for_display() {
        let ui = RecordingUi::default();
        let mut out = OutputSink::interactive(ui.clone());
        out.progress(1.5);
        out.progress(-1.0);
        out.finish(&Completion::Success);
        assert_eq!(ui.calls()[0], UiCall::Progress(1.0));
        assert_eq!(ui.calls()[1], UiCall::Progress(0.0));
    }
}
