//! Tandem - an operational-transform engine for collaborative text editing.
//!
//! # Quick Start
//!
//! ```
//! use tandem::ot::op::Operation;
//! use tandem::registry::Registry;
//!
//! // One registry per process; it owns every open document.
//! let registry = Registry::new();
//! let doc = registry.open("notes", Some("hello"));
//!
//! // Edit the document. The base version says what the edit was computed
//! // against; anything applied since then is transformed away.
//! let op = Operation::insert(5, ", world").unwrap();
//! let accepted = doc.submit(op, 0).unwrap();
//!
//! assert_eq!(doc.snapshot().content, "hello, world");
//! assert_eq!(accepted.version, 1);
//! ```

pub mod document;
pub mod error;
pub mod ot;
pub mod registry;
