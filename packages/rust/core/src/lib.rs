//! Pipeline orchestration and domain logic for contribmerge.
//!
//! This crate ties together contribution retrieval, description generation,
//! categorization, and the document merge into end-to-end runs
//! ([`pipeline::sync`], [`pipeline::merge_file`]).

pub mod categorize;
pub mod describe;
pub mod entries;
pub mod persist;
pub mod pipeline;
