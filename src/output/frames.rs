//! Nesting state machine shared by every sink variant.
//!
//! States are `Idle`, `InArray(depth)` and `InStruct(depth)`. Opening a frame
//! pushes, closing pops and must match the kind that was pushed. Items are only
//! legal inside a frame; inside a struct every entry needs a unique name.

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

use super::wire::is_field_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Array,
    Struct,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameKind::Array => write!(f, "array"),
            FrameKind::Struct => write!(f, "struct"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    InArray(usize),
    InStruct(usize),
}

/// A programming defect in the command's use of structured output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    #[error("end_{kind} called with no open frame")]
    EndWithoutStart { kind: FrameKind },
    #[error("end_{found} called while the innermost open frame is a {open}")]
    MismatchedEnd { open: FrameKind, found: FrameKind },
    #[error("item added outside any array or struct")]
    ItemOutsideFrame,
    #[error("struct entry added without a name")]
    MissingFieldName,
    #[error("struct field name {name:?} cannot be written as a field")]
    InvalidFieldName { name: String },
    #[error("duplicate struct field name {name:?}")]
    DuplicateFieldName { name: String },
    #[error("{open} frame(s) left open")]
    UnterminatedFrames { open: usize },
}

/// Where a new item or frame lands inside its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    /// Kind of the enclosing frame, `None` at top level.
    pub parent: Option<FrameKind>,
    /// Field name when the parent is a struct.
    pub name: Option<String>,
    /// True for the first entry of the parent frame.
    pub first: bool,
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    entries: usize,
    names: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct FrameStack {
    frames: Vec<Frame>,
}

impl FrameStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_idle(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn state(&self) -> FrameState {
        match self.frames.last().map(|f| f.kind) {
            None => FrameState::Idle,
            Some(FrameKind::Array) => FrameState::InArray(self.depth()),
            Some(FrameKind::Struct) => FrameState::InStruct(self.depth()),
        }
    }

    /// Claim a slot in the innermost frame for an item.
    pub fn add_item(&mut self, name: &str) -> Result<Position, ProtocolViolation> {
        if self.frames.is_empty() {
            return Err(ProtocolViolation::ItemOutsideFrame);
        }
        self.claim(name)
    }

    /// Open a frame, claiming a slot in the parent when there is one.
    ///
    /// An unnamed frame inside a struct is reported but still opened under a
    /// positional name so that its closing call stays balanced.
    pub fn push(&mut self, kind: FrameKind, name: &str) -> (Position, Option<ProtocolViolation>) {
        let (position, violation) = if self.frames.is_empty() {
            (
                Position {
                    parent: None,
                    name: None,
                    first: true,
                },
                None,
            )
        } else {
            match self.claim(name) {
                Ok(position) => (position, None),
                Err(violation) => (self.claim_positional(), Some(violation)),
            }
        };
        self.frames.push(Frame {
            kind,
            entries: 0,
            names: HashSet::new(),
        });
        (position, violation)
    }

    /// Close the innermost frame. The stack is unchanged on error.
    pub fn pop(&mut self, kind: FrameKind) -> Result<(), ProtocolViolation> {
        match self.frames.last() {
            None => Err(ProtocolViolation::EndWithoutStart { kind }),
            Some(top) if top.kind != kind => Err(ProtocolViolation::MismatchedEnd {
                open: top.kind,
                found: kind,
            }),
            Some(_) => {
                self.frames.pop();
                Ok(())
            }
        }
    }

    /// Recovery for a mismatched end: pop every frame down to and including
    /// the nearest one of `kind`, innermost first. Returns nothing (and pops
    /// nothing) when no frame of that kind is open.
    pub fn unwind_to(&mut self, kind: FrameKind) -> Vec<FrameKind> {
        let Some(index) = self.frames.iter().rposition(|f| f.kind == kind) else {
            return Vec::new();
        };
        self.frames
            .drain(index..)
            .rev()
            .map(|f| f.kind)
            .collect()
    }

    /// Pop everything, innermost first.
    pub fn drain(&mut self) -> Vec<FrameKind> {
        self.frames.drain(..).rev().map(|f| f.kind).collect()
    }

    /// Claim a slot under the first free positional name `_n`, for entries
    /// whose own name was rejected. Inside an array this is a plain slot.
    pub fn claim_positional(&mut self) -> Position {
        let Some(frame) = self.frames.last_mut() else {
            return Position {
                parent: None,
                name: None,
                first: true,
            };
        };
        let name = match frame.kind {
            FrameKind::Array => None,
            FrameKind::Struct => {
                let mut n = frame.entries;
                loop {
                    let candidate = format!("_{n}");
                    if frame.names.insert(candidate.clone()) {
                        break Some(candidate);
                    }
                    n += 1;
                }
            }
        };
        let first = frame.entries == 0;
        frame.entries += 1;
        Position {
            parent: Some(frame.kind),
            name,
            first,
        }
    }

    fn claim(&mut self, name: &str) -> Result<Position, ProtocolViolation> {
        let Some(frame) = self.frames.last_mut() else {
            return Err(ProtocolViolation::ItemOutsideFrame);
        };
        let name = match frame.kind {
            FrameKind::Array => None,
            FrameKind::Struct => {
                if name.is_empty() {
                    return Err(ProtocolViolation::MissingFieldName);
                }
                if !is_field_name(name) {
                    return Err(ProtocolViolation::InvalidFieldName {
                        name: name.to_string(),
                    });
                }
                if !frame.names.insert(name.to_string()) {
                    return Err(ProtocolViolation::DuplicateFieldName {
                        name: name.to_string(),
                    });
                }
                Some(name.to_string())
            }
        };
        let first = frame.entries == 0;
        frame.entries += 1;
        Ok(Position {
            parent: Some(frame.kind),
            name,
            first,
        })
    }
}
