//! Applying a single operation to a text buffer.
//!
//! Positions count Unicode scalar values, never bytes. Out-of-range
//! positions clamp to the end of the text: permissive editor semantics for
//! stale positions, not an error path. Callers are expected to have
//! transformed the operation against the buffer's current version first.

use crate::ot::op::{Edit, Operation};

/// Apply one operation to `text`, producing the new text. Retain and Format
/// return the text unchanged.
pub fn apply(text: &str, op: &Operation) -> String {
    match &op.edit {
        Edit::Insert { position, content } => {
            let at = byte_at_char(text, *position);
            let mut out = String::with_capacity(text.len() + content.len());
            out.push_str(&text[..at]);
            out.push_str(content);
            out.push_str(&text[at..]);
            return out;
        }
        Edit::Delete { position, length } => {
            let start = byte_at_char(text, *position);
            let end = byte_at_char(text, position.saturating_add(*length));
            let mut out = String::with_capacity(text.len() - (end - start));
            out.push_str(&text[..start]);
            out.push_str(&text[end..]);
            return out;
        }
        Edit::Retain { .. } | Edit::Format { .. } => return text.to_string(),
    }
}

/// Fold a sequence of operations over `text`, in order.
pub fn apply_all(text: &str, ops: &[Operation]) -> String {
    let mut out = text.to_string();
    for op in ops {
        out = apply(&out, op);
    }
    return out;
}

/// Byte offset of the `pos`-th scalar value, clamped to the end of `text`.
fn byte_at_char(text: &str, pos: usize) -> usize {
    return match text.char_indices().nth(pos) {
        Some((byte, _)) => byte,
        None => text.len(),
    };
}
