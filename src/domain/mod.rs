//! Core domain types for rowflow.
//!
//! This module contains pure domain types with no transport dependencies:
//! - Records and field values
//! - Batches, per-row reports and submission outcomes
//! - Submission typestate machine

pub mod batch;
pub mod record;
pub mod submission;
