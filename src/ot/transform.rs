//! Pairwise transformation of concurrent operations.
//!
//! `transform(a, b)` takes two operations computed against the *same* base
//! version, neither having seen the other, and produces the pair adjusted so
//! that applying `a` then `b'` equals applying `b` then `a'` (the TP1
//! convergence property). Key decisions:
//!
//! 1. **Deterministic insert tie-break**: two inserts at the same position
//!    are ordered by `(author_id, operation_id, content)`. The comparison
//!    looks only at the operations themselves, so every replica picks the
//!    same winner no matter which argument order it calls with. Absent
//!    fields order before present ones.
//!
//! 2. **Interior inserts survive deletion**: an insert landing strictly
//!    inside a concurrently deleted range anchors at the range's start. One
//!    positional delete cannot remove both sides of a surviving insertion,
//!    so the delete side of that pair *splits* into two sequential deletes.
//!    Every other pair rule yields a single operation.
//!
//! 3. **Overlapping deletes remove the union once**: each side gives up the
//!    overlap, and the later-starting side re-anchors at the earlier start.
//!    A delete fully contained in the other degenerates to a zero-length
//!    no-op rather than an error.
//!
//! Retain never shifts and is never shifted. Format shifts nothing (it
//! changes no text length), but its own position transforms against
//! concurrent inserts and deletes so styling stays anchored to the same
//! characters.

use smallvec::{SmallVec, smallvec};

use crate::error::{Error, Result};
use crate::ot::op::{Edit, Operation, count_chars};

/// The outcome of transforming one operation: a single operation for every
/// rule except the delete-around-interior-insert split, which yields two
/// sequential deletes.
#[derive(Clone, Debug, PartialEq)]
pub struct Transformed {
    ops: SmallVec<[Operation; 2]>,
}

impl Transformed {
    fn one(op: Operation) -> Transformed {
        return Transformed { ops: smallvec![op] };
    }

    fn split(head: Operation, tail: Operation) -> Transformed {
        return Transformed {
            ops: smallvec![head, tail],
        };
    }

    /// The transformed operations, in application order.
    pub fn ops(&self) -> &[Operation] {
        return &self.ops;
    }

    /// Whether the operation split in two.
    pub fn is_split(&self) -> bool {
        return self.ops.len() > 1;
    }

    pub fn into_ops(self) -> SmallVec<[Operation; 2]> {
        return self.ops;
    }

    /// The single transformed operation, or None if it split.
    pub fn into_single(self) -> Option<Operation> {
        if self.ops.len() == 1 {
            return self.ops.into_iter().next();
        }
        return None;
    }
}

impl IntoIterator for Transformed {
    type Item = Operation;
    type IntoIter = smallvec::IntoIter<[Operation; 2]>;

    fn into_iter(self) -> Self::IntoIter {
        return self.ops.into_iter();
    }
}

/// Transform two operations derived from the same base version against each
/// other. The first result is `a` adjusted to apply after `b`, the second is
/// `b` adjusted to apply after `a`. Pure: failure mutates nothing.
pub fn transform(a: &Operation, b: &Operation) -> Result<(Transformed, Transformed)> {
    a.validate()?;
    b.validate()?;
    let a_out = transform_one(a, b)?;
    let b_out = transform_one(b, a)?;
    return Ok((a_out, b_out));
}

/// Transform `op` to apply after the concurrent `other`.
fn transform_one(op: &Operation, other: &Operation) -> Result<Transformed> {
    let edit = match (&op.edit, &other.edit) {
        // Retain carries cursor metadata only: it neither shifts nor is
        // shifted.
        (Edit::Retain { .. }, _) | (_, Edit::Retain { .. }) => {
            return Ok(Transformed::one(op.clone()));
        }

        // Format changes no text length, so nothing shifts around it.
        (_, Edit::Format { .. }) => return Ok(Transformed::one(op.clone())),

        (
            Edit::Insert { position, content },
            Edit::Insert {
                position: other_pos,
                content: other_content,
            },
        ) => {
            let other_first =
                *other_pos < *position || (*other_pos == *position && tie_key(other) < tie_key(op));
            if !other_first {
                return Ok(Transformed::one(op.clone()));
            }
            Edit::Insert {
                position: shift_right(*position, count_chars(other_content))?,
                content: content.clone(),
            }
        }

        (
            Edit::Insert { position, content },
            Edit::Delete {
                position: del_pos,
                length,
            },
        ) => {
            let del_end = del_pos + length;
            if *position <= *del_pos {
                return Ok(Transformed::one(op.clone()));
            } else if *position >= del_end {
                Edit::Insert {
                    position: position - length,
                    content: content.clone(),
                }
            } else {
                // Strictly inside the deleted range: anchor at the range's
                // start. The inserted text survives, the surrounding deleted
                // text does not.
                Edit::Insert {
                    position: *del_pos,
                    content: content.clone(),
                }
            }
        }

        (
            Edit::Delete { position, length },
            Edit::Insert {
                position: ins_pos,
                content,
            },
        ) => {
            let end = position + length;
            let ins_len = count_chars(content);
            if *ins_pos <= *position {
                Edit::Delete {
                    position: shift_right(*position, ins_len)?,
                    length: *length,
                }
            } else if *ins_pos >= end {
                return Ok(Transformed::one(op.clone()));
            } else {
                // The insert landed strictly inside our range and must
                // survive, so split around it: the segment before the
                // insertion, then (once that is gone) the segment after it.
                let head = op.with_edit(Edit::Delete {
                    position: *position,
                    length: ins_pos - position,
                });
                let tail = op.with_edit(Edit::Delete {
                    position: shift_right(*position, ins_len)?,
                    length: end - ins_pos,
                });
                return Ok(Transformed::split(head, tail));
            }
        }

        (
            Edit::Delete { position, length },
            Edit::Delete {
                position: other_pos,
                length: other_len,
            },
        ) => {
            let end = position + length;
            let other_end = other_pos + other_len;
            if end <= *other_pos {
                return Ok(Transformed::one(op.clone()));
            } else if other_end <= *position {
                Edit::Delete {
                    position: position - other_len,
                    length: *length,
                }
            } else {
                // Overlap: the shared span is removed exactly once in total.
                // Removing the other range collapses the gap, so what is
                // left of our range is always contiguous.
                let overlap = end.min(other_end) - (*position).max(*other_pos);
                Edit::Delete {
                    position: (*position).min(*other_pos),
                    length: length - overlap,
                }
            }
        }

        (
            Edit::Format {
                position,
                attributes,
            },
            Edit::Insert {
                position: ins_pos,
                content,
            },
        ) => {
            if *ins_pos <= *position {
                Edit::Format {
                    position: shift_right(*position, count_chars(content))?,
                    attributes: attributes.clone(),
                }
            } else {
                return Ok(Transformed::one(op.clone()));
            }
        }

        (
            Edit::Format {
                position,
                attributes,
            },
            Edit::Delete {
                position: del_pos,
                length,
            },
        ) => {
            let del_end = del_pos + length;
            if *position <= *del_pos {
                return Ok(Transformed::one(op.clone()));
            } else if *position >= del_end {
                Edit::Format {
                    position: position - length,
                    attributes: attributes.clone(),
                }
            } else {
                // Anchored inside a deleted range: follow the range's start,
                // like an interior insert would.
                Edit::Format {
                    position: *del_pos,
                    attributes: attributes.clone(),
                }
            }
        }
    };
    return Ok(Transformed::one(op.with_edit(edit)));
}

/// Transform `op` against a sequence of operations applied after its base
/// version, oldest first. Only the rebased `op` comes back: the history it
/// crossed is immutable once applied. The result is one operation except
/// when a delete split around interior inserts along the way.
pub fn transform_chain(op: &Operation, concurrent: &[Operation]) -> Result<SmallVec<[Operation; 2]>> {
    let mut chain: SmallVec<[Operation; 2]> = smallvec![op.clone()];
    for their in concurrent {
        let (next, _) = cross_one(&chain, their)?;
        chain = next;
    }
    return Ok(chain);
}

/// Rebase the sequential chain `ours` over a single concurrent operation,
/// and that operation over the chain.
///
/// A chain longer than one element only ever holds delete pieces (splitting
/// produces nothing else), and no operation splits when transformed against
/// a delete. So whichever side is plural, the other side stays singular all
/// the way through the walk.
fn cross_one(
    ours: &[Operation],
    their: &Operation,
) -> Result<(SmallVec<[Operation; 2]>, SmallVec<[Operation; 2]>)> {
    let mut their_chain: SmallVec<[Operation; 2]> = smallvec![their.clone()];
    let mut ours_out: SmallVec<[Operation; 2]> = SmallVec::new();
    for op in ours {
        let mut op_chain: SmallVec<[Operation; 2]> = smallvec![op.clone()];
        let mut their_next: SmallVec<[Operation; 2]> = SmallVec::new();
        for their_piece in &their_chain {
            debug_assert!(op_chain.len() == 1 || their_chain.len() == 1);
            if op_chain.len() == 1 {
                let (o, t) = transform(&op_chain[0], their_piece)?;
                op_chain = o.into_ops();
                their_next.extend(t.into_ops());
            } else {
                // Our operation split earlier in the walk: thread the piece
                // through our deletes one transform at a time.
                let mut piece = their_piece.clone();
                let mut flat: SmallVec<[Operation; 2]> = SmallVec::new();
                for o in op_chain.iter() {
                    let (o2, t2) = transform(o, &piece)?;
                    flat.extend(o2.into_ops());
                    piece = match t2.into_single() {
                        Some(single) => single,
                        None => unreachable!("transforming against a delete cannot split"),
                    };
                }
                op_chain = flat;
                their_next.push(piece);
            }
        }
        ours_out.extend(op_chain);
        their_chain = their_next;
    }
    return Ok((ours_out, their_chain));
}

/// Merge two *sequential* operations from the same author into one when
/// they are adjacent in effect: an insert continuing exactly where the
/// previous insert ended, a forward delete repeated at the same start, or a
/// backspace ending where the previous delete began. An optimization only;
/// never applied to concurrent operations, and the engine never calls it
/// implicitly. The composite keeps the shared author, takes the second
/// timestamp, and carries no correlation token of its own.
pub fn compose(a: &Operation, b: &Operation) -> Option<Operation> {
    if a.author_id.is_none() || a.author_id != b.author_id {
        return None;
    }
    let edit = match (&a.edit, &b.edit) {
        (
            Edit::Insert {
                position: first_pos,
                content: first,
            },
            Edit::Insert {
                position: second_pos,
                content: second,
            },
        ) if *second_pos == first_pos + count_chars(first) => {
            let mut content = first.clone();
            content.push_str(second);
            Edit::Insert {
                position: *first_pos,
                content,
            }
        }
        (
            Edit::Delete {
                position: first_pos,
                length: first_len,
            },
            Edit::Delete {
                position: second_pos,
                length: second_len,
            },
        ) => {
            if second_pos == first_pos {
                // Forward deletion: the next character keeps arriving at the
                // same start.
                Edit::Delete {
                    position: *first_pos,
                    length: first_len + second_len,
                }
            } else if second_pos + second_len == *first_pos {
                // Backspacing into the previous delete.
                Edit::Delete {
                    position: *second_pos,
                    length: first_len + second_len,
                }
            } else {
                return None;
            }
        }
        _ => return None,
    };
    return Some(Operation {
        edit,
        author_id: a.author_id.clone(),
        timestamp: b.timestamp.clone(),
        operation_id: None,
    });
}

/// Deterministic total order for same-position inserts.
fn tie_key(op: &Operation) -> (Option<&str>, Option<&str>, &str) {
    let content = match &op.edit {
        Edit::Insert { content, .. } => content.as_str(),
        _ => "",
    };
    return (op.author_id.as_deref(), op.operation_id.as_deref(), content);
}

fn shift_right(position: usize, by: usize) -> Result<usize> {
    return position
        .checked_add(by)
        .ok_or_else(|| Error::InvalidOperation(format!("position {position} + {by} overflows")));
}
