//! Operations describing atomic edits to a shared text document.
//!
//! An operation is one of four kinds:
//!
//! - `Insert`: splice content in at a position.
//! - `Delete`: remove a run of characters starting at a position.
//! - `Retain`: a no-op placeholder carrying cursor position. Never mutates.
//! - `Format`: styling metadata for a position. Never mutates text content;
//!   content mutation is the business of Insert and Delete only.
//!
//! Every position and length counts Unicode scalar values, never bytes.
//! Positions are relative to the *base* version the operation was computed
//! against, so they are only validated against text bounds at apply time,
//! after transformation.
//!
//! The wire encoding is a tagged record: the edit kind as a lowercase
//! `"type"` field, positional fields inline, and the optional metadata
//! (`author_id`, `timestamp`, `operation_id`) alongside. Absent metadata is
//! omitted from output.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Styling metadata carried by a Format operation. Values are arbitrary
/// JSON; the engine never interprets them.
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// The edit itself: a closed set of kinds, so the transform and apply
/// functions can (and must) match exhaustively.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Edit {
    /// Insert `content` at `position`.
    Insert { position: usize, content: String },
    /// Remove `length` characters starting at `position`.
    Delete { position: usize, length: usize },
    /// Carry a cursor position. Never mutates text.
    Retain { position: usize },
    /// Carry styling metadata for a position. Never mutates text.
    Format { position: usize, attributes: Attributes },
}

/// An atomic, positional edit plus optional authorship metadata.
///
/// `operation_id` is an opaque correlation token. It is never used for
/// ordering, except as a fallback tie-break for same-position inserts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(flatten)]
    pub edit: Edit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
}

impl Operation {
    /// Create an insert operation. Fails when the position plus the content
    /// length cannot be represented.
    pub fn insert(position: usize, content: impl Into<String>) -> Result<Operation> {
        let op = Operation::bare(Edit::Insert {
            position,
            content: content.into(),
        });
        op.validate()?;
        return Ok(op);
    }

    /// Create a delete operation. Fails when the range end cannot be
    /// represented.
    pub fn delete(position: usize, length: usize) -> Result<Operation> {
        let op = Operation::bare(Edit::Delete { position, length });
        op.validate()?;
        return Ok(op);
    }

    /// Create a retain operation carrying a cursor position.
    pub fn retain(position: usize) -> Operation {
        return Operation::bare(Edit::Retain { position });
    }

    /// Create a format operation carrying styling metadata.
    pub fn format(position: usize, attributes: Attributes) -> Operation {
        return Operation::bare(Edit::Format {
            position,
            attributes,
        });
    }

    fn bare(edit: Edit) -> Operation {
        return Operation {
            edit,
            author_id: None,
            timestamp: None,
            operation_id: None,
        };
    }

    /// Attach an author id.
    pub fn with_author(mut self, author_id: impl Into<String>) -> Operation {
        self.author_id = Some(author_id.into());
        return self;
    }

    /// Attach a timestamp. Opaque to the engine.
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Operation {
        self.timestamp = Some(timestamp.into());
        return self;
    }

    /// Attach a correlation token.
    pub fn with_operation_id(mut self, operation_id: impl Into<String>) -> Operation {
        self.operation_id = Some(operation_id.into());
        return self;
    }

    /// Check the field invariants. Operations built through the constructors
    /// already hold them; operations deserialized from the wire have not
    /// been checked yet, so transform and submit re-validate.
    pub fn validate(&self) -> Result<()> {
        match &self.edit {
            Edit::Insert { position, content } => {
                position.checked_add(count_chars(content)).ok_or_else(|| {
                    Error::InvalidOperation(format!(
                        "insert at {position} overflows with {} characters",
                        count_chars(content)
                    ))
                })?;
            }
            Edit::Delete { position, length } => {
                position.checked_add(*length).ok_or_else(|| {
                    Error::InvalidOperation(format!(
                        "delete range [{position}, {position} + {length}) overflows"
                    ))
                })?;
            }
            Edit::Retain { .. } | Edit::Format { .. } => {}
        }
        return Ok(());
    }

    /// The position this operation acts at.
    pub fn position(&self) -> usize {
        return match &self.edit {
            Edit::Insert { position, .. }
            | Edit::Delete { position, .. }
            | Edit::Retain { position }
            | Edit::Format { position, .. } => *position,
        };
    }

    /// Number of characters this operation inserts. Zero for everything but
    /// Insert.
    pub fn char_len(&self) -> usize {
        return match &self.edit {
            Edit::Insert { content, .. } => count_chars(content),
            _ => 0,
        };
    }

    /// Rebuild this operation around a different edit, keeping the metadata.
    pub(crate) fn with_edit(&self, edit: Edit) -> Operation {
        return Operation {
            edit,
            author_id: self.author_id.clone(),
            timestamp: self.timestamp.clone(),
            operation_id: self.operation_id.clone(),
        };
    }
}

/// Scalar-value count, the unit every position is measured in.
pub(crate) fn count_chars(text: &str) -> usize {
    return text.chars().count();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_constructor() {
        let op = Operation::insert(3, "hey").unwrap().with_author("alice");

        match &op.edit {
            Edit::Insert { position, content } => {
                assert_eq!(*position, 3);
                assert_eq!(content, "hey");
            }
            _ => panic!("expected Insert"),
        }
        assert_eq!(op.author_id.as_deref(), Some("alice"));
        assert_eq!(op.char_len(), 3);
    }

    #[test]
    fn insert_position_overflow_rejected() {
        assert!(matches!(
            Operation::insert(usize::MAX, "x"),
            Err(Error::InvalidOperation(_))
        ));
    }

    #[test]
    fn delete_range_overflow_rejected() {
        assert!(matches!(
            Operation::delete(usize::MAX, 1),
            Err(Error::InvalidOperation(_))
        ));
        assert!(Operation::delete(usize::MAX, 0).is_ok());
    }

    #[test]
    fn char_len_counts_scalars_not_bytes() {
        let op = Operation::insert(0, "héllo 🦀").unwrap();
        assert_eq!(op.char_len(), 7);
    }

    #[test]
    fn wire_format_insert() {
        let op = Operation::insert(5, "hi")
            .unwrap()
            .with_author("alice")
            .with_operation_id("op-1");
        let json = serde_json::to_value(&op).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "type": "insert",
                "position": 5,
                "content": "hi",
                "author_id": "alice",
                "operation_id": "op-1",
            })
        );
    }

    #[test]
    fn wire_format_retain_omits_absent_metadata() {
        let json = serde_json::to_value(Operation::retain(3)).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "retain", "position": 3 }));
    }

    #[test]
    fn wire_format_round_trip() {
        let mut attributes = Attributes::new();
        attributes.insert("bold".to_string(), serde_json::json!(true));
        let op = Operation::format(2, attributes).with_timestamp("2026-01-31T00:00:00Z");

        let json = serde_json::to_string(&op).unwrap();
        let back: Operation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, op);
    }

    #[test]
    fn deserialized_operation_can_be_invalid() {
        // The wire bypasses the constructors, so validate() is the gate.
        let json = format!(r#"{{"type":"delete","position":{},"length":2}}"#, usize::MAX);
        let op: Operation = serde_json::from_str(&json).unwrap();
        assert!(op.validate().is_err());
    }
}
