//! Destinations for command output.
//!
//! `OutputSink` is a closed set of variants behind one interface. Commands only
//! talk to it through `CommandContext`; they never learn which variant they got.
//! The nesting discipline for arrays and structs lives in [`frames`] and is
//! enforced here, once, for every variant.

pub mod frames;
pub mod interactive;
pub mod null;
pub mod stream;
pub mod wire;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::progress::ProgressOutcome;

pub use frames::{FrameKind, FrameStack, FrameState, Position, ProtocolViolation};
pub use interactive::{InteractiveSink, TerminalUi, UiHost};
pub use null::NullSink;
pub use stream::{SharedWriter, StreamSink};

// ── Item values ─────────────────────────────────────────────────

/// One typed field of structured output. Kinds never collapse into each
/// other: `Bool(true)` and `Number(1.0)` serialize differently.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemValue {
    Text(String),
    Bool(bool),
    Number(f64),
}

impl ItemValue {
    pub fn kind(&self) -> &'static str {
        match self {
            ItemValue::Text(_) => "text",
            ItemValue::Bool(_) => "bool",
            ItemValue::Number(_) => "number",
        }
    }
}

impl fmt::Display for ItemValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemValue::Text(s) => write!(f, "{s}"),
            ItemValue::Bool(b) => write!(f, "{b}"),
            ItemValue::Number(n) => write!(f, "{}", wire::format_number(*n)),
        }
    }
}

impl From<&str> for ItemValue {
    fn from(s: &str) -> Self {
        ItemValue::Text(s.to_string())
    }
}

impl From<String> for ItemValue {
    fn from(s: String) -> Self {
        ItemValue::Text(s)
    }
}

impl From<&String> for ItemValue {
    fn from(s: &String) -> Self {
        ItemValue::Text(s.clone())
    }
}

impl From<bool> for ItemValue {
    fn from(b: bool) -> Self {
        ItemValue::Bool(b)
    }
}

impl From<f64> for ItemValue {
    fn from(n: f64) -> Self {
        ItemValue::Number(n)
    }
}

impl From<f32> for ItemValue {
    fn from(n: f32) -> Self {
        ItemValue::Number(f64::from(n))
    }
}

impl From<i32> for ItemValue {
    fn from(n: i32) -> Self {
        ItemValue::Number(f64::from(n))
    }
}

impl From<u32> for ItemValue {
    fn from(n: u32) -> Self {
        ItemValue::Number(f64::from(n))
    }
}

impl From<usize> for ItemValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(n: usize) -> Self {
        ItemValue::Number(n as f64)
    }
}

// ── Wire format selection ───────────────────────────────────────

/// Serialization used by the structured stream sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// One event per line, nesting shown by indentation.
    #[default]
    Lines,
    /// One compact JSON document per top-level value (JSONL).
    ///
    /// A structured value is buffered until its top-level frame closes, so a
    /// status or error sent while it is open is written before it. NaN and
    /// infinities are written as `{"number":"nan"}`, `"inf"` or `"-inf"`.
    Json,
}

// ── Invocation outcome as seen by a sink ────────────────────────

/// How the invocation ended; sinks use it to write their completion marker.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Success,
    Failure(String),
}

impl Completion {
    pub fn is_success(&self) -> bool {
        matches!(self, Completion::Success)
    }
}

// ── Variant rendering ───────────────────────────────────────────

/// What each variant does with an event that already passed the frame checks.
pub(crate) trait Render {
    fn status(&mut self, text: &str);
    fn error(&mut self, text: &str);
    fn progress(&mut self, fraction: f64) -> ProgressOutcome;
    fn is_cancelled(&self) -> bool;
    /// `depth` is the number of frames open before this one.
    fn open(&mut self, kind: FrameKind, position: &Position, depth: usize);
    /// `depth` is the number of frames still open after this one closed.
    fn close(&mut self, kind: FrameKind, depth: usize);
    /// `depth` is the number of open frames around the item.
    fn item(&mut self, value: &ItemValue, position: &Position, depth: usize);
    fn complete(&mut self, completion: &Completion);
    fn flush(&mut self);
}

enum Variant {
    Interactive(InteractiveSink),
    Stream(StreamSink),
    Null(NullSink),
}

impl Variant {
    fn render(&mut self) -> &mut dyn Render {
        match self {
            Variant::Interactive(s) => s,
            Variant::Stream(s) => s,
            Variant::Null(s) => s,
        }
    }

    fn render_ref(&self) -> &dyn Render {
        match self {
            Variant::Interactive(s) => s,
            Variant::Stream(s) => s,
            Variant::Null(s) => s,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Variant::Interactive(_) => "interactive",
            Variant::Stream(_) => "stream",
            Variant::Null(_) => "null",
        }
    }
}

// ── OutputSink ──────────────────────────────────────────────────

/// The single output destination of one command invocation.
///
/// Protocol violations are logged and recorded. In strict mode they also trip
/// a debug assertion; otherwise the sink recovers by dropping the offending
/// call or force-closing frames so the serialized output stays well formed.
pub struct OutputSink {
    variant: Variant,
    frames: FrameStack,
    strict: bool,
    violations: Vec<ProtocolViolation>,
    finished: bool,
}

impl OutputSink {
    fn from_variant(variant: Variant) -> Self {
        Self {
            variant,
            frames: FrameStack::new(),
            strict: cfg!(debug_assertions),
            violations: Vec::new(),
            finished: false,
        }
    }

    pub fn interactive(ui: impl UiHost + 'static) -> Self {
        Self::from_variant(Variant::Interactive(InteractiveSink::new(Box::new(ui))))
    }

    pub fn stream(sink: StreamSink) -> Self {
        Self::from_variant(Variant::Stream(sink))
    }

    pub fn null() -> Self {
        Self::from_variant(Variant::Null(NullSink::new()))
    }

    /// Override whether protocol violations are fatal (debug assertion).
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn state(&self) -> FrameState {
        self.frames.state()
    }

    pub fn violations(&self) -> &[ProtocolViolation] {
        &self.violations
    }

    // ── Messages ──

    pub fn status(&mut self, text: &str) {
        self.variant.render().status(text);
    }

    pub fn error(&mut self, text: &str) {
        self.variant.render().error(text);
    }

    pub fn progress(&mut self, fraction: f64) -> ProgressOutcome {
        self.variant.render().progress(fraction)
    }

    pub fn is_cancelled(&self) -> bool {
        self.variant.render_ref().is_cancelled()
    }

    // ── Structure ──

    pub fn start_array(&mut self, name: &str) {
        self.open(FrameKind::Array, name);
    }

    pub fn end_array(&mut self) {
        self.close(FrameKind::Array);
    }

    pub fn start_struct(&mut self, name: &str) {
        self.open(FrameKind::Struct, name);
    }

    pub fn end_struct(&mut self) {
        self.close(FrameKind::Struct);
    }

    pub fn add_item(&mut self, value: &ItemValue, name: &str) {
        match self.frames.add_item(name) {
            Ok(position) => {
                let depth = self.frames.depth();
                self.variant.render().item(value, &position, depth);
            }
            Err(violation @ ProtocolViolation::InvalidFieldName { .. }) => {
                self.violation(violation);
                let position = self.frames.claim_positional();
                let depth = self.frames.depth();
                self.variant.render().item(value, &position, depth);
            }
            Err(violation) => self.violation(violation),
        }
    }

    /// Close any open frames, write the completion marker and flush.
    pub fn finish(&mut self, completion: &Completion) {
        if self.finished {
            return;
        }
        self.close_all();
        self.variant.render().complete(completion);
        self.variant.render().flush();
        self.finished = true;
    }

    fn open(&mut self, kind: FrameKind, name: &str) {
        let depth = self.frames.depth();
        let (position, violation) = self.frames.push(kind, name);
        if let Some(violation) = violation {
            self.violation(violation);
        }
        self.variant.render().open(kind, &position, depth);
    }

    fn close(&mut self, kind: FrameKind) {
        match self.frames.pop(kind) {
            Ok(()) => {
                let depth = self.frames.depth();
                self.variant.render().close(kind, depth);
            }
            Err(violation) => {
                self.violation(violation);
                let mut depth = self.frames.depth();
                for closed in self.frames.unwind_to(kind) {
                    depth -= 1;
                    self.variant.render().close(closed, depth);
                }
            }
        }
    }

    fn close_all(&mut self) {
        let open = self.frames.depth();
        if open == 0 {
            return;
        }
        self.violation(ProtocolViolation::UnterminatedFrames { open });
        self.drain_frames();
    }

    fn drain_frames(&mut self) {
        let mut depth = self.frames.depth();
        for kind in self.frames.drain() {
            depth -= 1;
            self.variant.render().close(kind, depth);
        }
    }

    fn violation(&mut self, violation: ProtocolViolation) {
        tracing::error!(
            sink = self.variant.name(),
            violation = %violation,
            "structured output protocol violation"
        );
        self.violations.push(violation);
        debug_assert!(
            !self.strict,
            "structured output protocol violation: {}",
            self.violations.last().map(ToString::to_string).unwrap_or_default()
        );
    }
}

impl Drop for OutputSink {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let open = self.frames.depth();
        if open > 0 {
            tracing::error!(
                sink = self.variant.name(),
                open,
                "output sink dropped with open frames; closing them"
            );
            self.drain_frames();
        }
        self.variant.render().flush();
    }
}
