//! Error taxonomy for the flow engine.
//!
//! Every error here is recoverable at some boundary: a bad font container
//! only kills that one registration, a failed image gets a placeholder box,
//! a degenerate table is skipped. Nothing aborts a whole conversion.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed font container (wrong signature, truncated directory,
    /// corrupt table data). Fatal to that one font registration only.
    #[error("font container format error: {0}")]
    FontFormat(String),

    /// An image could not be decoded or embedded. The flow draws a
    /// placeholder box at the already-computed geometry and continues.
    #[error("asset {src:?} failed to load: {reason}")]
    AssetLoad { src: String, reason: String },

    /// A table resolved to zero or negative column/table width. The
    /// offending table is skipped; surrounding flow is unaffected.
    #[error("degenerate layout: {0}")]
    DegenerateLayout(String),

    /// Failure surfaced from the document-writer backend.
    #[error("writer error: {0}")]
    Writer(String),
}

pub type Result<T> = std::result::Result<T, Error>;
