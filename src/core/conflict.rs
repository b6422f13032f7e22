//! core::conflict
//!
//! Two-way conflict marker text, split into its sides and joined back.
//!
//! # Format
//!
//! ```text
//! <<<<<<< HEAD
//! ours content
//! =======
//! theirs content
//! >>>>>>> branch-x
//! ```
//!
//! The opening and closing marker lines carry a label after the seven
//! marker characters. The separator line is exactly `=======`. Parsing
//! stops at the closing marker.
//!
//! # Decoding
//!
//! Decoding is a small state machine over lines:
//!
//! ```text
//! Before --<<<<<<<--> InOurs --=======--> InTheirs -->>>>>>>--> Done
//! ```
//!
//! Only `Done` is accepting, which is what guarantees the four parts
//! (ours label, ours content, theirs content, theirs label). Any other
//! shape is [`ConflictError::Malformed`]; nothing is guessed.
//!
//! # Example
//!
//! ```
//! use gitwork::core::conflict::{decode, encode, ConflictSides};
//!
//! let text = "<<<<<<< HEAD\nfoo\n=======\nbar\n>>>>>>> branch-x\n";
//! let sides = decode(text).unwrap();
//! assert_eq!(sides.ours().content, "foo");
//! assert_eq!(sides.theirs().label, "branch-x");
//! assert_eq!(encode(&sides).unwrap(), text);
//! ```

use std::collections::BTreeMap;

use thiserror::Error;

/// Opening marker, followed by the "ours" label.
pub const OURS_MARKER: &str = "<<<<<<<";
/// Separator line between the sides.
pub const SEPARATOR: &str = "=======";
/// Closing marker, followed by the "theirs" label.
pub const THEIRS_MARKER: &str = ">>>>>>>";

/// Label [`encode`] requires on the ours side.
pub const HEAD_LABEL: &str = "HEAD";
/// Prefix [`encode`] requires on the theirs label.
pub const BRANCH_LABEL_PREFIX: &str = "branch";

/// Errors from the conflict codec.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConflictError {
    /// The text is not exactly one well-formed conflict block.
    #[error("malformed conflict text at line {line}: {reason}")]
    Malformed {
        /// 1-based line where parsing gave up (0 for end of input).
        line: usize,
        reason: String,
    },

    /// [`encode`] was handed sides it cannot represent.
    #[error("conflict sides violate encode precondition: {0}")]
    PreconditionViolation(String),
}

/// One side of a conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Side {
    pub label: String,
    pub content: String,
}

/// Ordered pair of conflict sides: ours (HEAD) first, theirs second.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictSides {
    ours: Side,
    theirs: Side,
}

impl ConflictSides {
    pub fn new(ours: Side, theirs: Side) -> Self {
        Self { ours, theirs }
    }

    /// Build the canonical HEAD/branch pair from a label -> content map.
    ///
    /// # Errors
    ///
    /// [`ConflictError::PreconditionViolation`] unless the map holds exactly
    /// one `"HEAD"` entry and one entry whose key starts with `"branch"`.
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, ConflictError> {
        if map.len() != 2 {
            return Err(ConflictError::PreconditionViolation(format!(
                "expected exactly 2 sides, got {}",
                map.len()
            )));
        }
        let head = map.get(HEAD_LABEL).ok_or_else(|| {
            ConflictError::PreconditionViolation(format!("missing '{HEAD_LABEL}' side"))
        })?;
        let (label, content) = map
            .iter()
            .find(|(k, _)| k.as_str() != HEAD_LABEL && k.starts_with(BRANCH_LABEL_PREFIX))
            .ok_or_else(|| {
                ConflictError::PreconditionViolation(format!(
                    "missing side labelled '{BRANCH_LABEL_PREFIX}*'"
                ))
            })?;

        Ok(Self {
            ours: Side {
                label: HEAD_LABEL.to_string(),
                content: head.clone(),
            },
            theirs: Side {
                label: label.clone(),
                content: content.clone(),
            },
        })
    }

    /// Label -> content view of both sides.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (self.ours.label.clone(), self.ours.content.clone()),
            (self.theirs.label.clone(), self.theirs.content.clone()),
        ])
    }

    pub fn ours(&self) -> &Side {
        &self.ours
    }

    pub fn theirs(&self) -> &Side {
        &self.theirs
    }
}

enum State {
    Before,
    InOurs { label: String, lines: Vec<String> },
    InTheirs { ours: Side, lines: Vec<String> },
    Done(ConflictSides),
}

/// Split conflict marker text into its two sides.
///
/// Lines after the closing marker are ignored. Line endings may be `\n`
/// or `\r\n`; side content is rejoined with `\n`.
///
/// # Errors
///
/// [`ConflictError::Malformed`] when text precedes the opening marker, a
/// marker appears out of order, the block is unterminated, or both sides
/// carry the same label.
pub fn decode(text: &str) -> Result<ConflictSides, ConflictError> {
    let malformed = |line: usize, reason: &str| ConflictError::Malformed {
        line,
        reason: reason.to_string(),
    };

    let mut state = State::Before;
    for (idx, line) in text.lines().enumerate() {
        let lineno = idx + 1;
        state = match state {
            State::Before => match line.strip_prefix(OURS_MARKER) {
                Some(label) => State::InOurs {
                    label: label.trim().to_string(),
                    lines: Vec::new(),
                },
                None => return Err(malformed(lineno, "text before opening marker")),
            },
            State::InOurs { label, mut lines } => {
                if line == SEPARATOR {
                    State::InTheirs {
                        ours: Side {
                            label,
                            content: lines.join("\n"),
                        },
                        lines: Vec::new(),
                    }
                } else if line.starts_with(OURS_MARKER) || line.starts_with(THEIRS_MARKER) {
                    return Err(malformed(lineno, "marker before separator"));
                } else {
                    lines.push(line.to_string());
                    State::InOurs { label, lines }
                }
            }
            State::InTheirs { ours, mut lines } => {
                if let Some(label) = line.strip_prefix(THEIRS_MARKER) {
                    let label = label.trim().to_string();
                    if label == ours.label {
                        return Err(malformed(lineno, "both sides share one label"));
                    }
                    State::Done(ConflictSides::new(
                        ours,
                        Side {
                            label,
                            content: lines.join("\n"),
                        },
                    ))
                } else if line == SEPARATOR || line.starts_with(OURS_MARKER) {
                    return Err(malformed(lineno, "unexpected marker in theirs side"));
                } else {
                    lines.push(line.to_string());
                    State::InTheirs { ours, lines }
                }
            }
            done @ State::Done(_) => done,
        };
    }

    match state {
        State::Done(sides) => Ok(sides),
        State::Before => Err(malformed(0, "no opening marker")),
        State::InOurs { .. } => Err(malformed(0, "missing separator")),
        State::InTheirs { .. } => Err(malformed(0, "missing closing marker")),
    }
}

/// Render the canonical conflict block for a HEAD/branch pair.
///
/// # Errors
///
/// [`ConflictError::PreconditionViolation`] unless ours is labelled
/// `"HEAD"` and theirs has a label starting with `"branch"`. Labels must be
/// trimmed single-line text. Content may not contain `\r` or a line that
/// [`decode`] would read as a marker.
pub fn encode(sides: &ConflictSides) -> Result<String, ConflictError> {
    if sides.ours.label != HEAD_LABEL {
        return Err(ConflictError::PreconditionViolation(format!(
            "ours side must be labelled '{HEAD_LABEL}', got '{}'",
            sides.ours.label
        )));
    }
    if !sides.theirs.label.starts_with(BRANCH_LABEL_PREFIX) {
        return Err(ConflictError::PreconditionViolation(format!(
            "theirs label must start with '{BRANCH_LABEL_PREFIX}', got '{}'",
            sides.theirs.label
        )));
    }
    let label = &sides.theirs.label;
    if label.trim() != label || label.contains(['\n', '\r']) {
        return Err(ConflictError::PreconditionViolation(format!(
            "theirs label must be trimmed single-line text, got {label:?}"
        )));
    }
    check_content(&sides.ours)?;
    check_content(&sides.theirs)?;

    Ok(format!(
        "{OURS_MARKER} {HEAD_LABEL}\n{}\n{SEPARATOR}\n{}\n{THEIRS_MARKER} {}\n",
        sides.ours.content, sides.theirs.content, sides.theirs.label
    ))
}

fn check_content(side: &Side) -> Result<(), ConflictError> {
    if side.content.contains('\r') {
        return Err(ConflictError::PreconditionViolation(format!(
            "'{}' content contains a carriage return",
            side.label
        )));
    }
    let marker_line = side.content.split('\n').find(|line| {
        *line == SEPARATOR || line.starts_with(OURS_MARKER) || line.starts_with(THEIRS_MARKER)
    });
    match marker_line {
        Some(line) => Err(ConflictError::PreconditionViolation(format!(
            "'{}' content has a marker line: {line:?}",
            side.label
        ))),
        None => Ok(()),
    }
}

/// [`encode`] for a label -> content map.
pub fn encode_map(map: &BTreeMap<String, String>) -> Result<String, ConflictError> {
    encode(&ConflictSides::from_map(map)?)
}
