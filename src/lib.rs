//! # pdf-flow – flow & pagination engine for styled content trees
//!
//! This crate turns a tree of styled content nodes (paragraphs, inline
//! spans, lists, tables, images, rules, headers/footers) into a paginated
//! sequence of absolute-position drawing commands. The stages are:
//!
//! 1. **Assets** – settle every image referenced by the tree ([`assets`])
//! 2. **Fonts** – resolve families, embed webfonts ([`fonts`], [`woff`])
//! 3. **Walk** – traverse nodes in document order ([`walker`])
//! 4. **Flow** – break lines, collapse spacing, paginate ([`flow`],
//!    [`linebreak`], [`floats`], [`lists`], [`table`])
//! 5. **Write** – emit primitives through a backend ([`writer`]): a
//!    serializable recording ([`ops`]) or a PDF file ([`pdf`])
//!
//! Styles arrive fully resolved from an external resolver; the engine never
//! computes cascade or specificity.

pub mod assets;
pub mod content;
pub mod error;
pub mod floats;
pub mod flow;
pub mod fonts;
pub mod linebreak;
pub mod lists;
pub mod ops;
pub mod pdf;
pub mod table;
pub mod walker;
pub mod woff;
pub mod writer;

// Re-exports for convenience
pub use error::{Error, Result};
pub use flow::{Cursor, Flow, FlowOptions};
pub use walker::render_flow;
pub use writer::{DocumentWriter, PageFrame, PAGE_NUMBER_TOKEN, TOTAL_PAGES_TOKEN};
