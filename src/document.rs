//! Per-document state: current text, version counter, and operation history.
//!
//! A document is the unit of collaboration. Its version starts at 0 and
//! advances by one for every applied operation; `history[i]` is the
//! operation that moved the document from version `i` to `i + 1`, so
//! replaying the whole history from the seed text reproduces the content
//! exactly. `submit` is the only mutation path: it transforms an incoming
//! operation against everything applied since the caller's base version,
//! then applies it. Callers never apply operations directly.

use smallvec::{SmallVec, smallvec};
use tracing::debug;

use crate::error::{Error, Result};
use crate::ot::apply::apply;
use crate::ot::op::{Operation, count_chars};
use crate::ot::transform::transform_chain;

/// One collaboratively edited text document.
#[derive(Clone, Debug)]
pub struct Document {
    id: String,
    content: String,
    version: u64,
    history: Vec<Operation>,
}

/// The result of a successful submit: what was actually applied (the
/// operation after transformation, in two pieces if a delete split around a
/// concurrent insert) and the version the document now sits at.
#[derive(Clone, Debug, PartialEq)]
pub struct Submitted {
    pub applied: SmallVec<[Operation; 2]>,
    pub version: u64,
}

impl Document {
    /// Documents are created through the registry, nowhere else.
    pub(crate) fn new(id: impl Into<String>, seed: &str) -> Document {
        return Document {
            id: id.into(),
            content: seed.to_string(),
            version: 0,
            history: Vec::new(),
        };
    }

    pub fn id(&self) -> &str {
        return &self.id;
    }

    /// The current text.
    pub fn content(&self) -> &str {
        return &self.content;
    }

    /// The current version. Always equal to the history length.
    pub fn version(&self) -> u64 {
        return self.version;
    }

    /// Current text length in Unicode scalar values.
    pub fn char_len(&self) -> usize {
        return count_chars(&self.content);
    }

    /// Every operation applied so far, oldest first.
    pub fn history(&self) -> &[Operation] {
        return &self.history;
    }

    /// Transform `op` against everything applied since `base_version`, then
    /// apply it. Fails with `StaleReference` when the caller names a version
    /// that does not exist yet; fails with `InvalidOperation` on malformed
    /// input. Either way the document is untouched on failure.
    pub fn submit(&mut self, op: Operation, base_version: u64) -> Result<Submitted> {
        op.validate()?;
        if base_version > self.version {
            return Err(Error::StaleReference {
                base: base_version,
                current: self.version,
            });
        }

        let chain: SmallVec<[Operation; 2]> = if base_version == self.version {
            // Nothing landed since the caller's version: apply directly.
            smallvec![op]
        } else {
            let concurrent = &self.history[base_version as usize..];
            transform_chain(&op, concurrent)?
        };

        // Transformation is pure and nothing below can fail, so the caller
        // sees either the full mutation or none of it.
        for applied in &chain {
            self.content = apply(&self.content, applied);
            self.history.push(applied.clone());
        }
        self.version += chain.len() as u64;
        debug_assert_eq!(self.history.len() as u64, self.version);

        debug!(
            document = %self.id,
            version = self.version,
            applied = chain.len(),
            "applied operation"
        );
        return Ok(Submitted {
            applied: chain,
            version: self.version,
        });
    }

    /// The operations applied after `version`, oldest first. Replicas that
    /// are behind replay these to catch up.
    pub fn operations_since(&self, version: u64) -> Result<&[Operation]> {
        if version > self.version {
            return Err(Error::StaleReference {
                base: version,
                current: self.version,
            });
        }
        return Ok(&self.history[version as usize..]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ot::apply::apply_all;

    fn insert(position: usize, content: &str) -> Operation {
        return Operation::insert(position, content).unwrap();
    }

    fn delete(position: usize, length: usize) -> Operation {
        return Operation::delete(position, length).unwrap();
    }

    #[test]
    fn current_base_applies_directly() {
        let mut doc = Document::new("d", "hello");
        let out = doc.submit(insert(5, " world"), 0).unwrap();

        assert_eq!(doc.content(), "hello world");
        assert_eq!(out.version, 1);
        assert_eq!(&out.applied[..], &[insert(5, " world")]);
    }

    #[test]
    fn version_counts_every_applied_operation() {
        let mut doc = Document::new("d", "");
        for (i, op) in [insert(0, "a"), insert(1, "b"), insert(2, "c")].into_iter().enumerate() {
            let out = doc.submit(op, i as u64).unwrap();
            assert_eq!(out.version, i as u64 + 1);
        }
        assert_eq!(doc.version(), 3);
        assert_eq!(doc.history().len(), 3);
        assert_eq!(doc.content(), "abc");
    }

    #[test]
    fn stale_base_transforms_against_missed_history() {
        let mut doc = Document::new("d", "abcdef");
        doc.submit(insert(0, "__"), 0).unwrap();

        // Computed against version 0, arriving at version 1.
        let out = doc.submit(delete(1, 2), 0).unwrap();
        assert_eq!(doc.content(), "__adef");
        assert_eq!(&out.applied[..], &[delete(3, 2)]);
        assert_eq!(out.version, 2);
    }

    #[test]
    fn split_advances_version_per_piece() {
        let mut doc = Document::new("d", "abcdef");
        doc.submit(insert(2, "Z"), 0).unwrap();

        // A stale delete spanning the interior insert applies as two pieces.
        let out = doc.submit(delete(1, 3), 0).unwrap();
        assert_eq!(out.applied.len(), 2);
        assert_eq!(out.version, 3);
        assert_eq!(doc.content(), "aZef");
        assert_eq!(doc.history().len(), 3);
    }

    #[test]
    fn future_base_fails_without_mutation() {
        let mut doc = Document::new("d", "hello");
        doc.submit(insert(0, "x"), 0).unwrap();

        let err = doc.submit(insert(0, "y"), 5).unwrap_err();
        assert_eq!(err, Error::StaleReference { base: 5, current: 1 });
        assert_eq!(doc.content(), "xhello");
        assert_eq!(doc.version(), 1);
    }

    #[test]
    fn invalid_operation_fails_without_mutation() {
        let mut doc = Document::new("d", "hello");
        let bad: Operation = serde_json::from_str(&format!(
            r#"{{"type":"delete","position":{},"length":3}}"#,
            usize::MAX
        ))
        .unwrap();

        assert!(matches!(doc.submit(bad, 0), Err(Error::InvalidOperation(_))));
        assert_eq!(doc.version(), 0);
        assert_eq!(doc.content(), "hello");
    }

    #[test]
    fn replaying_history_reproduces_content() {
        let mut doc = Document::new("d", "base ");
        doc.submit(insert(5, "text"), 0).unwrap();
        doc.submit(delete(0, 2), 0).unwrap();
        doc.submit(insert(3, "!"), 1).unwrap();
        doc.submit(Operation::retain(0), 3).unwrap();

        assert_eq!(apply_all("base ", doc.history()), doc.content());
    }

    #[test]
    fn operations_since_returns_suffix() {
        let mut doc = Document::new("d", "");
        doc.submit(insert(0, "a"), 0).unwrap();
        doc.submit(insert(1, "b"), 1).unwrap();

        assert_eq!(doc.operations_since(0).unwrap().len(), 2);
        assert_eq!(doc.operations_since(1).unwrap(), &[insert(1, "b")]);
        assert_eq!(doc.operations_since(2).unwrap(), &[] as &[Operation]);
        assert!(matches!(
            doc.operations_since(3),
            Err(Error::StaleReference { base: 3, current: 2 })
        ));
    }
}
