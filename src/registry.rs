//! The collaboration registry: a keyed collection of documents.
//!
//! The registry exclusively owns document creation and lookup; no other
//! component constructs a `Document`. Each document sits behind its own
//! mutex, so submits against one document serialize while different
//! documents proceed in parallel with no shared state between them. The
//! registry map itself is only locked for lookup and insertion.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::info;

use crate::document::{Document, Submitted};
use crate::error::{Error, Result};
use crate::ot::op::Operation;

/// Routes operations from callers to the right document.
#[derive(Default)]
pub struct Registry {
    docs: RwLock<FxHashMap<String, Arc<Mutex<Document>>>>,
}

/// A cloneable handle on one document. Holding a handle skips the registry
/// lookup on every call; the per-document lock still serializes access.
#[derive(Clone)]
pub struct DocumentHandle {
    inner: Arc<Mutex<Document>>,
}

/// A point-in-time view of a document's text and version.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub content: String,
    pub version: u64,
}

/// Read-only observability row, one per document. A side channel for
/// monitoring, not a correctness-bearing interface.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DocumentStats {
    pub document_id: String,
    pub version: u64,
    pub chars: usize,
}

impl Registry {
    pub fn new() -> Registry {
        return Registry {
            docs: RwLock::new(FxHashMap::default()),
        };
    }

    /// Look up a document, creating it with the seed text (empty when None)
    /// on first reference.
    pub fn open(&self, document_id: &str, seed: Option<&str>) -> DocumentHandle {
        if let Some(doc) = self.docs.read().get(document_id) {
            return DocumentHandle {
                inner: Arc::clone(doc),
            };
        }
        let mut docs = self.docs.write();
        let doc = docs.entry(document_id.to_string()).or_insert_with(|| {
            info!(document = document_id, "created document");
            return Arc::new(Mutex::new(Document::new(document_id, seed.unwrap_or(""))));
        });
        return DocumentHandle {
            inner: Arc::clone(doc),
        };
    }

    /// Look up an existing document.
    pub fn get(&self, document_id: &str) -> Result<DocumentHandle> {
        return match self.docs.read().get(document_id) {
            Some(doc) => Ok(DocumentHandle {
                inner: Arc::clone(doc),
            }),
            None => Err(Error::DocumentNotFound(document_id.to_string())),
        };
    }

    /// Submit an operation to the named document. Fails with
    /// `DocumentNotFound` when the document was never opened.
    pub fn submit(
        &self,
        document_id: &str,
        op: Operation,
        base_version: u64,
    ) -> Result<Submitted> {
        return self.get(document_id)?.submit(op, base_version);
    }

    /// The operations the named document applied after `version`.
    pub fn operations_since(&self, document_id: &str, version: u64) -> Result<Vec<Operation>> {
        return self.get(document_id)?.operations_since(version);
    }

    /// Number of open documents.
    pub fn document_count(&self) -> usize {
        return self.docs.read().len();
    }

    /// Per-document version and size, sorted by document id.
    pub fn stats(&self) -> Vec<DocumentStats> {
        let docs = self.docs.read();
        let mut rows: Vec<DocumentStats> = docs
            .iter()
            .map(|(id, doc)| {
                let doc = doc.lock();
                return DocumentStats {
                    document_id: id.clone(),
                    version: doc.version(),
                    chars: doc.char_len(),
                };
            })
            .collect();
        rows.sort_by(|a, b| a.document_id.cmp(&b.document_id));
        return rows;
    }
}

impl DocumentHandle {
    /// See [`Document::submit`].
    pub fn submit(&self, op: Operation, base_version: u64) -> Result<Submitted> {
        return self.inner.lock().submit(op, base_version);
    }

    /// See [`Document::operations_since`].
    pub fn operations_since(&self, version: u64) -> Result<Vec<Operation>> {
        return Ok(self.inner.lock().operations_since(version)?.to_vec());
    }

    /// The current text and version, read atomically.
    pub fn snapshot(&self) -> Snapshot {
        let doc = self.inner.lock();
        return Snapshot {
            content: doc.content().to_string(),
            version: doc.version(),
        };
    }
}
