//! Submission aggregate - domain model and state transitions.

pub mod state;
pub mod transitions;
