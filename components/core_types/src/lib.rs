//! Core Types Component
//!
//! Shared leaf types for the Mica language front end: the UTF-8 codec,
//! source positions and spans, and the aggregate run status.
//!
//! # Overview
//!
//! - [`codec`] - Decodes and encodes UTF-8 codepoints one at a time
//! - [`SourcePosition`] - A line/column position in source code
//! - [`SourceSpan`] - The extent of a construct, for diagnostics
//! - [`RunStatus`] - Aggregate outcome of a run (clean / recovered / unrecoverable)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod source;
pub mod status;

pub use source::{SourcePosition, SourceSpan};
pub use status::RunStatus;
