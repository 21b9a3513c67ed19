//! Line protocol shared by the structured stream sink and script clients.
//!
//! ```text
//! status: "Loading"
//! {
//!   Version="4.2.0"
//!   Batch=true
//!   Tracks=[
//!     "Vocals"
//!   ]
//! }
//! BatchCommand finished: OK
//!
//! ```
//!
//! Every event is one line. Structured lines are indented two spaces per open
//! frame, struct entries carry a `Name=` prefix. Text values are JSON string
//! literals, so a text `"true"` never reads back as the boolean `true`.
//! A response ends with a completion line followed by one empty line.

use std::io::BufRead;

use thiserror::Error;

use super::{Completion, ItemValue};

pub const STATUS_PREFIX: &str = "status: ";
pub const ERROR_PREFIX: &str = "error: ";
pub const PROGRESS_PREFIX: &str = "progress: ";
pub const FINISHED_OK: &str = "BatchCommand finished: OK";
pub const FINISHED_FAILED: &str = "BatchCommand finished: Failed!";
const INDENT: &str = "  ";

// ── Encoding ────────────────────────────────────────────────────

/// Shortest decimal that parses back to the same `f64`.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "nan".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "inf" } else { "-inf" }.to_string()
    } else {
        format!("{n}")
    }
}

pub fn quote(text: &str) -> String {
    serde_json::Value::String(text.to_string()).to_string()
}

pub fn encode_value(value: &ItemValue) -> String {
    match value {
        ItemValue::Text(s) => quote(s),
        ItemValue::Bool(b) => b.to_string(),
        ItemValue::Number(n) => format_number(*n),
    }
}

/// Whether `name` survives a `Name=value` line unchanged: no `=`, no control
/// characters, no leading whitespace.
pub fn is_field_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with(char::is_whitespace)
        && !name.contains('=')
        && !name.chars().any(char::is_control)
}

pub fn indent(depth: usize) -> String {
    INDENT.repeat(depth)
}

pub fn completion_line(completion: &Completion) -> &'static str {
    if completion.is_success() {
        FINISHED_OK
    } else {
        FINISHED_FAILED
    }
}

// ── Decoding ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("line {line}: unexpected {text:?}")]
    UnexpectedLine { line: usize, text: String },
    #[error("line {line}: bad value {text:?}")]
    BadValue { line: usize, text: String },
    #[error("line {line}: closing bracket does not match the open frame")]
    Unbalanced { line: usize },
    #[error("response ended without a completion line")]
    Truncated,
    #[error("read failed: {0}")]
    Io(String),
}

/// Decoded structured value.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Bool(bool),
    Number(f64),
    Array(Vec<Node>),
    Struct(Vec<(String, Node)>),
}

impl Node {
    /// Field lookup on a struct node.
    pub fn get(&self, name: &str) -> Option<&Node> {
        match self {
            Node::Struct(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Node::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Node]> {
        match self {
            Node::Array(items) => Some(items),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Status(String),
    Error(String),
    Progress(f64),
    Data(Node),
}

/// One command's decoded response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub events: Vec<Event>,
    pub success: bool,
}

impl Response {
    /// Parse exactly one response from text.
    pub fn parse(text: &str) -> Result<Self, WireError> {
        let mut parser = Parser::default();
        for (i, line) in text.lines().enumerate() {
            if let Some(response) = parser.feed(i + 1, line)? {
                return Ok(response);
            }
        }
        Err(WireError::Truncated)
    }

    /// Read the next response from a stream, blocking until its sentinel.
    /// Returns `None` on a clean end of stream between responses.
    pub fn read_from<R: BufRead>(reader: &mut R) -> Result<Option<Self>, WireError> {
        let mut parser = Parser::default();
        let mut line_no = 0;
        let mut buf = String::new();
        loop {
            buf.clear();
            let read = reader
                .read_line(&mut buf)
                .map_err(|e| WireError::Io(e.to_string()))?;
            if read == 0 {
                return if parser.is_empty() {
                    Ok(None)
                } else {
                    Err(WireError::Truncated)
                };
            }
            line_no += 1;
            let line = buf.trim_end_matches(['\n', '\r']);
            if let Some(response) = parser.feed(line_no, line)? {
                return Ok(Some(response));
            }
        }
    }

    pub fn statuses(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Status(s) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Error(s) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn data(&self) -> Vec<&Node> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Data(n) => Some(n),
                _ => None,
            })
            .collect()
    }
}

enum Open {
    Array(Option<String>, Vec<Node>),
    Struct(Option<String>, Vec<(String, Node)>),
}

#[derive(Default)]
struct Parser {
    events: Vec<Event>,
    stack: Vec<Open>,
    finished: Option<bool>,
}

impl Parser {
    fn is_empty(&self) -> bool {
        self.events.is_empty() && self.stack.is_empty() && self.finished.is_none()
    }

    fn feed(&mut self, line_no: usize, line: &str) -> Result<Option<Response>, WireError> {
        if let Some(success) = self.finished {
            if line.is_empty() {
                return Ok(Some(Response {
                    events: std::mem::take(&mut self.events),
                    success,
                }));
            }
            return Err(unexpected(line_no, line));
        }

        if self.stack.is_empty() {
            if let Some(rest) = line.strip_prefix(STATUS_PREFIX) {
                self.events.push(Event::Status(unquote(line_no, rest)?));
                return Ok(None);
            }
            if let Some(rest) = line.strip_prefix(ERROR_PREFIX) {
                self.events.push(Event::Error(unquote(line_no, rest)?));
                return Ok(None);
            }
            if let Some(rest) = line.strip_prefix(PROGRESS_PREFIX) {
                let value = parse_number(rest).ok_or_else(|| bad_value(line_no, rest))?;
                self.events.push(Event::Progress(value));
                return Ok(None);
            }
            match line {
                FINISHED_OK => {
                    self.finished = Some(true);
                    return Ok(None);
                }
                FINISHED_FAILED => {
                    self.finished = Some(false);
                    return Ok(None);
                }
                "[" => {
                    self.stack.push(Open::Array(None, Vec::new()));
                    return Ok(None);
                }
                "{" => {
                    self.stack.push(Open::Struct(None, Vec::new()));
                    return Ok(None);
                }
                _ => return Err(unexpected(line_no, line)),
            }
        }

        // Inside a frame: status/error/progress lines may still interleave.
        if let Some(rest) = line.strip_prefix(STATUS_PREFIX) {
            self.events.push(Event::Status(unquote(line_no, rest)?));
            return Ok(None);
        }
        if let Some(rest) = line.strip_prefix(ERROR_PREFIX) {
            self.events.push(Event::Error(unquote(line_no, rest)?));
            return Ok(None);
        }
        if let Some(rest) = line.strip_prefix(PROGRESS_PREFIX) {
            let value = parse_number(rest).ok_or_else(|| bad_value(line_no, rest))?;
            self.events.push(Event::Progress(value));
            return Ok(None);
        }

        let body = line.trim_start();
        if body == "]" || body == "}" {
            return self.close(line_no, body == "]");
        }

        let in_struct = matches!(self.stack.last(), Some(Open::Struct(..)));
        let (name, rest) = if in_struct {
            let (name, rest) = body
                .split_once('=')
                .ok_or_else(|| unexpected(line_no, line))?;
            (Some(name.to_string()), rest)
        } else {
            (None, body)
        };

        match rest {
            "[" => self.stack.push(Open::Array(name, Vec::new())),
            "{" => self.stack.push(Open::Struct(name, Vec::new())),
            value => {
                let node = parse_value(value).ok_or_else(|| bad_value(line_no, value))?;
                self.attach(line_no, name, node)?;
            }
        }
        Ok(None)
    }

    fn close(&mut self, line_no: usize, array: bool) -> Result<Option<Response>, WireError> {
        let (name, node) = match (self.stack.pop(), array) {
            (Some(Open::Array(name, items)), true) => (name, Node::Array(items)),
            (Some(Open::Struct(name, fields)), false) => (name, Node::Struct(fields)),
            _ => return Err(WireError::Unbalanced { line: line_no }),
        };
        if self.stack.is_empty() {
            self.events.push(Event::Data(node));
        } else {
            self.attach(line_no, name, node)?;
        }
        Ok(None)
    }

    fn attach(&mut self, line_no: usize, name: Option<String>, node: Node) -> Result<(), WireError> {
        match self.stack.last_mut() {
            Some(Open::Array(_, items)) => items.push(node),
            Some(Open::Struct(_, fields)) => {
                let name = name.ok_or(WireError::Unbalanced { line: line_no })?;
                fields.push((name, node));
            }
            None => return Err(WireError::Unbalanced { line: line_no }),
        }
        Ok(())
    }
}

fn unexpected(line: usize, text: &str) -> WireError {
    WireError::UnexpectedLine {
        line,
        text: text.to_string(),
    }
}

fn bad_value(line: usize, text: &str) -> WireError {
    WireError::BadValue {
        line,
        text: text.to_string(),
    }
}

fn unquote(line: usize, text: &str) -> Result<String, WireError> {
    serde_json::from_str::<String>(text).map_err(|_| bad_value(line, text))
}

fn parse_number(text: &str) -> Option<f64> {
    match text {
        "nan" => Some(f64::NAN),
        "inf" => Some(f64::INFINITY),
        "-inf" => Some(f64::NEG_INFINITY),
        _ => text.parse::<f64>().ok(),
    }
}

fn parse_value(text: &str) -> Option<Node> {
    if text.starts_with('"') {
        return serde_json::from_str::<String>(text).ok().map(Node::Text);
    }
    match text {
        "true" => Some(Node::Bool(true)),
        "false" => Some(Node::Bool(false)),
        _ => parse_number(text).map(Node::Number),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn numbers_use_shortest_round_trip_form() {
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(0.1), "0.1");
        assert_eq!(format_number(-2.5), "-2.5");
        assert_eq!(format_number(f64::INFINITY), "inf");
        let tricky = 0.1 + 0.2;
        assert_eq!(format_number(tricky).parse::<f64>().unwrap(), tricky);
    }

    #[test]
    fn text_values_are_quoted_and_escaped() {
        assert_eq!(encode_value(&ItemValue::from("true")), "\"true\"");
        assert_eq!(encode_value(&ItemValue::from("a \"b\"\nc")), r#""a \"b\"\nc""#);
        assert_eq!(encode_value(&ItemValue::Bool(true)), "true");
        assert_eq!(encode_value(&ItemValue::Number(1.0)), "1");
    }

    #[test]
    fn parses_nested_response() {
        let text = "status: \"Loading\"\n\
                    {\n\
                    \x20 Version=\"4.2.0\"\n\
                    \x20 Tracks=[\n\
                    \x20   \"Vocals\"\n\
                    \x20   2\n\
                    \x20 ]\n\
                    }\n\
                    BatchCommand finished: OK\n\
                    \n";
        let response = Response::parse(text).unwrap();
        assert!(response.success);
        assert_eq!(response.statuses(), vec!["Loading"]);

        let data = response.data();
        assert_eq!(data.len(), 1);
        let root = data[0];
        assert_eq!(root.get("Version"), Some(&Node::Text("4.2.0".into())));
        assert_eq!(
            root.get("Tracks"),
            Some(&Node::Array(vec![Node::Text("Vocals".into()), Node::Number(2.0)]))
        );
    }

    #[test]
    fn failed_completion_is_reported() {
        let response =
            Response::parse("error: \"no such track\"\nBatchCommand finished: Failed!\n\n").unwrap();
        assert!(!response.success);
        assert_eq!(response.errors(), vec!["no such track"]);
    }

    #[test]
    fn missing_sentinel_is_truncated() {
        assert_eq!(
            Response::parse("status: \"x\"\nBatchCommand finished: OK\n"),
            Err(WireError::Truncated)
        );
    }

    #[test]
    fn mismatched_close_is_rejected() {
        let err = Response::parse("[\n  1\n}\n").unwrap_err();
        assert_eq!(err, WireError::Unbalanced { line: 3 });
    }

    #[test]
    fn read_from_splits_consecutive_responses() {
        let text = "status: \"one\"\nBatchCommand finished: OK\n\n\
                    status: \"two\"\nBatchCommand finished: OK\n\n";
        let mut reader = std::io::Cursor::new(text.as_bytes());
        let first = Response::read_from(&mut reader).unwrap().unwrap();
        let second = Response::read_from(&mut reader).unwrap().unwrap();
        assert_eq!(first.statuses(), vec!["one"]);
        assert_eq!(second.statuses(), vec!["two"]);
        assert!(Response::read_from(&mut reader).unwrap().is_none());
    }
}
