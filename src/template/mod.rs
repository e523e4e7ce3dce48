//! Template structure and the merge algorithm.

pub mod doc;
pub mod merge;

pub use doc::{Body, Cell, Descend, Node, Paragraph, Row, Run, Table};
pub use merge::{MergeError, MergeResult, TemplateMerger};
