//! # System Module
//!
//! Stage definitions, task addressing and stage blueprints.
//!
//! The blueprints are static: stages are never reordered and their task
//! cardinality is known when a request is opened.

mod stage;

pub use stage::*;
