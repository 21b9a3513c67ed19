//! Structured stream sink: serializes output for a script client on the
//! other end of a pipe, in the `lines` protocol or as JSONL.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};

use super::wire::{self, completion_line, encode_value, indent};
use super::{Completion, FrameKind, ItemValue, Position, Render, WireFormat};
use crate::progress::ProgressOutcome;

/// Serializes every event to a writer as soon as it happens, for a script
/// client reading the other end of a pipe.
///
/// Write failures never reach the command: the first one is logged and the
/// sink stops writing.
pub struct StreamSink {
    writer: Box<dyn Write + Send>,
    format: WireFormat,
    quiet: bool,
    broken: bool,
    /// Partially built top-level document in `Json` format.
    json_stack: Vec<(Option<String>, Value)>,
}

impl StreamSink {
    pub fn new(writer: impl Write + Send + 'static, format: WireFormat) -> Self {
        Self {
            writer: Box::new(writer),
            format,
            quiet: false,
            broken: false,
            json_stack: Vec::new(),
        }
    }

    /// Drop progress updates instead of writing them.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    fn write_line(&mut self, line: &str) {
        if self.broken {
            return;
        }
        let result = writeln!(self.writer, "{line}").and_then(|()| self.writer.flush());
        if let Err(e) = result {
            tracing::warn!(error = %e, "structured output stream closed; dropping further output");
            self.broken = true;
        }
    }

    fn json_line(&mut self, key: &str, value: Value) {
        let mut map = Map::new();
        map.insert(key.to_string(), value);
        self.write_line(&Value::Object(map).to_string());
    }

    fn json_attach(&mut self, name: Option<String>, value: Value) {
        match self.json_stack.last_mut() {
            Some((_, Value::Array(items))) => items.push(value),
            Some((_, Value::Object(fields))) => {
                fields.insert(name.unwrap_or_default(), value);
            }
            Some(_) => {}
            None => {
                let line = value.to_string();
                self.write_line(&line);
            }
        }
    }
}

fn json_value(value: &ItemValue) -> Value {
    match value {
        ItemValue::Text(s) => Value::String(s.clone()),
        ItemValue::Bool(b) => Value::Bool(*b),
        ItemValue::Number(n) => serde_json::Number::from_f64(*n)
            .map_or_else(|| non_finite(*n), Value::Number),
    }
}

/// JSON has no NaN or infinity; they travel as `{"number":"nan"}` with the
/// `lines` spelling so they never read back as `null` or as text.
fn non_finite(n: f64) -> Value {
    serde_json::json!({ "number": wire::format_number(n) })
}

impl Render for StreamSink {
    fn status(&mut self, text: &str) {
        match self.format {
            WireFormat::Lines => {
                let line = format!("{}{}", wire::STATUS_PREFIX, wire::quote(text));
                self.write_line(&line);
            }
            WireFormat::Json => self.json_line("status", Value::String(text.to_string())),
        }
    }

    fn error(&mut self, text: &str) {
        match self.format {
            WireFormat::Lines => {
                let line = format!("{}{}", wire::ERROR_PREFIX, wire::quote(text));
                self.write_line(&line);
            }
            WireFormat::Json => self.json_line("error", Value::String(text.to_string())),
        }
    }

    fn progress(&mut self, fraction: f64) -> ProgressOutcome {
        if !self.quiet {
            match self.format {
                WireFormat::Lines => {
                    let line = format!("{}{}", wire::PROGRESS_PREFIX, wire::format_number(fraction));
                    self.write_line(&line);
                }
                WireFormat::Json => {
                    self.json_line("progress", json_value(&ItemValue::Number(fraction)));
                }
            }
        }
        ProgressOutcome::Continue
    }

    fn is_cancelled(&self) -> bool {
        false
    }

    fn open(&mut self, kind: FrameKind, position: &Position, depth: usize) {
        match self.format {
            WireFormat::Lines => {
                let bracket = match kind {
                    FrameKind::Array => "[",
                    FrameKind::Struct => "{",
                };
                let line = match &position.name {
                    Some(name) => format!("{}{name}={bracket}", indent(depth)),
                    None => format!("{}{bracket}", indent(depth)),
                };
                self.write_line(&line);
            }
            WireFormat::Json => {
                let empty = match kind {
                    FrameKind::Array => Value::Array(Vec::new()),
                    FrameKind::Struct => Value::Object(Map::new()),
                };
                self.json_stack.push((position.name.clone(), empty));
            }
        }
    }

    fn close(&mut self, kind: FrameKind, depth: usize) {
        match self.format {
            WireFormat::Lines => {
                let bracket = match kind {
                    FrameKind::Array => "]",
                    FrameKind::Struct => "}",
                };
                let line = format!("{}{bracket}", indent(depth));
                self.write_line(&line);
            }
            WireFormat::Json => {
                if let Some((name, value)) = self.json_stack.pop() {
                    self.json_attach(name, value);
                }
            }
        }
    }

    fn item(&mut self, value: &ItemValue, position: &Position, depth: usize) {
        match self.format {
            WireFormat::Lines => {
                let line = match &position.name {
                    Some(name) => format!("{}{name}={}", indent(depth), encode_value(value)),
                    None => format!("{}{}", indent(depth), encode_value(value)),
                };
                self.write_line(&line);
            }
            WireFormat::Json => self.json_attach(position.name.clone(), json_value(value)),
        }
    }

    fn complete(&mut self, completion: &Completion) {
        self.write_line(completion_line(completion));
        self.write_line("");
    }

    fn flush(&mut self) {
        if !self.broken {
            let _ = self.writer.flush();
        }
    }
}

// ── Shared writer ────────────────────────────────────────────────

/// A writer that several sinks can append to in turn, e.g. one per command
/// of a script session writing to the same pipe.
pub struct SharedWriter<W> {
    inner: Arc<Mutex<W>>,
}

impl<W> Clone for SharedWriter<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W: Write> SharedWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }
}

impl SharedWriter<Vec<u8>> {
    /// Everything written so far, lossily decoded.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.inner.lock()).into_owned()
    }
}

impl<W: Write> Write for SharedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.lock().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.lock().flush()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::output::wire::{Node, Response};
    use crate::output::{OutputSink, ProtocolViolation};

    fn sink(format: WireFormat) -> (OutputSink, SharedWriter<Vec<u8>>) {
        let buffer = SharedWriter::new(Vec::new());
        let sink = OutputSink::stream(StreamSink::new(buffer.clone(), format)).strict(false);
        (sink, buffer)
    }

    #[test]
    fn struct_scenario_writes_typed_fields_and_sentinel() {
        let (mut out, buffer) = sink(WireFormat::Lines);
        out.start_struct("");
        out.add_item(&ItemValue::from("4.2.0"), "Version");
        out.add_item(&ItemValue::from(true), "Batch");
        out.end_struct();
        out.finish(&Completion::Success);

        assert_eq!(
            buffer.text(),
            "{\n  Version=\"4.2.0\"\n  Batch=true\n}\nBatchCommand finished: OK\n\n"
        );

        let response = Response::parse(&buffer.text()).unwrap();
        let root = response.data()[0];
        assert_eq!(root.get("Version"), Some(&Node::Text("4.2.0".into())));
        assert_eq!(root.get("Batch"), Some(&Node::Bool(true)));
    }

    #[test]
    fn bool_and_number_stay_distinct() {
        let (mut out, buffer) = sink(WireFormat::Lines);
        out.start_struct("");
        out.add_item(&ItemValue::from(true), "Flag");
        out.add_item(&ItemValue::from(1.0), "Count");
        out.add_item(&ItemValue::from("1"), "Label");
        out.end_struct();
        out.finish(&Completion::Success);

        let response = Response::parse(&buffer.text()).unwrap();
        let root = response.data()[0];
        assert_eq!(root.get("Flag"), Some(&Node::Bool(true)));
        assert_eq!(root.get("Count"), Some(&Node::Number(1.0)));
        assert_eq!(root.get("Label"), Some(&Node::Text("1".into())));
        assert_ne!(root.get("Flag"), root.get("Count"));
    }

    #[test]
    fn array_scenario_preserves_order() {
        let (mut out, buffer) = sink(WireFormat::Lines);
        out.start_array("");
        for n in [1.0, 2.0, 3.0] {
            out.add_item(&ItemValue::from(n), "");
        }
        out.end_array();
        out.finish(&Completion::Success);

        let response = Response::parse(&buffer.text()).unwrap();
        assert_eq!(
            response.data(),
            vec![&Node::Array(vec![
                Node::Number(1.0),
                Node::Number(2.0),
                Node::Number(3.0)
            ])]
        );
    }

    #[test]
    fn quiet_mode_suppresses_progress() {
        let buffer = SharedWriter::new(Vec::new());
        let mut out =
            OutputSink::stream(StreamSink::new(buffer.clone(), WireFormat::Lines).quiet(true));
        assert_eq!(out.progress(0.5), ProgressOutcome::Continue);
        out.status("done");
        out.finish(&Completion::Success);
        assert_eq!(buffer.text(), "status: \"done\"\nBatchCommand finished: OK\n\n");
    }

    #[test]
    fn progress_lines_never_cancel() {
        let (mut out, buffer) = sink(WireFormat::Lines);
        assert_eq!(out.progress(0.25), ProgressOutcome::Continue);
        assert!(!out.is_cancelled());
        out.finish(&Completion::Failure("boom".into()));
        assert_eq!(buffer.text(), "progress: 0.25\nBatchCommand finished: Failed!\n\n");
    }

    #[test]
    fn mismatched_end_is_recovered_into_balanced_output() {
        let (mut out, buffer) = sink(WireFormat::Lines);
        out.start_array("");
        out.start_struct("");
        out.add_item(&ItemValue::from(1.0), "A");
        // Wrong kind: closes the struct and the array
        out.end_array();
        // Nothing open any more
        out.end_struct();
        out.finish(&Completion::Success);

        assert_eq!(
            out.violations(),
            &[
                ProtocolViolation::MismatchedEnd {
                    open: FrameKind::Struct,
                    found: FrameKind::Array
                },
                ProtocolViolation::EndWithoutStart {
                    kind: FrameKind::Struct
                },
            ]
        );
        let response = Response::parse(&buffer.text()).unwrap();
        assert_eq!(response.data().len(), 1);
    }

    #[test]
    fn unterminated_frames_are_closed_on_finish() {
        let (mut out, buffer) = sink(WireFormat::Lines);
        out.start_array("");
        out.add_item(&ItemValue::from("x"), "");
        out.finish(&Completion::Success);

        assert_eq!(out.violations(), &[ProtocolViolation::UnterminatedFrames { open: 1 }]);
        assert!(Response::parse(&buffer.text()).is_ok());
    }

    #[test]
    fn dropping_with_open_frames_still_balances_output() {
        let buffer = SharedWriter::new(Vec::new());
        {
            let mut out =
                OutputSink::stream(StreamSink::new(buffer.clone(), WireFormat::Lines)).strict(false);
            out.start_struct("");
            out.start_array("Items");
        }
        assert_eq!(buffer.text(), "{\n  Items=[\n  ]\n}\n");
    }

    #[test]
    fn json_format_writes_one_document_per_value() {
        let (mut out, buffer) = sink(WireFormat::Json);
        out.status("Listing");
        out.start_array("");
        out.start_struct("");
        out.add_item(&ItemValue::from("Vocals"), "Name");
        out.add_item(&ItemValue::from(false), "Mute");
        out.add_item(&ItemValue::from(-3.5), "Gain");
        out.end_struct();
        out.end_array();
        out.finish(&Completion::Success);

        let text = buffer.text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], r#"{"status":"Listing"}"#);
        assert_eq!(lines[1], r#"[{"Name":"Vocals","Mute":false,"Gain":-3.5}]"#);
        assert_eq!(lines[2], "BatchCommand finished: OK");
        assert_eq!(lines[3], "");
    }

    #[test]
    fn json_format_keeps_non_finite_numbers_typed() {
        let (mut out, buffer) = sink(WireFormat::Json);
        out.progress(f64::NAN);
        out.start_struct("");
        out.add_item(&ItemValue::from(f64::NAN), "Level");
        out.add_item(&ItemValue::from(f64::INFINITY), "Peak");
        out.add_item(&ItemValue::from(f64::NEG_INFINITY), "Floor");
        out.end_struct();
        out.finish(&Completion::Success);

        let text = buffer.text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], r#"{"progress":{"number":"nan"}}"#);
        assert_eq!(
            lines[1],
            r#"{"Level":{"number":"nan"},"Peak":{"number":"inf"},"Floor":{"number":"-inf"}}"#
        );
        assert!(!text.contains("null"));
    }

    #[test]
    fn unwritable_field_names_fall_back_to_positional_names() {
        let (mut out, buffer) = sink(WireFormat::Lines);
        out.start_struct("");
        out.add_item(&ItemValue::from("x"), "a=b");
        out.add_item(&ItemValue::from(1.0), " Padded");
        out.add_item(&ItemValue::from(true), "Room Mic");
        out.end_struct();
        out.finish(&Completion::Success);

        assert_eq!(
            out.violations(),
            &[
                ProtocolViolation::InvalidFieldName { name: "a=b".into() },
                ProtocolViolation::InvalidFieldName {
                    name: " Padded".into()
                },
            ]
        );
        let response = Response::parse(&buffer.text()).unwrap();
        let root = response.data()[0];
        assert_eq!(root.get("_0"), Some(&Node::Text("x".into())));
        assert_eq!(root.get("_1"), Some(&Node::Number(1.0)));
        assert_eq!(root.get("Room Mic"), Some(&Node::Bool(true)));
    }

    #[test]
    fn broken_pipe_is_not_fatal() {
        struct Closed;
        impl Write for Closed {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        let mut out = OutputSink::stream(StreamSink::new(Closed, WireFormat::Lines));
        out.status("nobody listening");
        out.error("still nobody");
        out.finish(&Completion::Success);
    }
}
