//! # Formats Module
//!
//! Serialization of request documents. File I/O lives in the app layer.

mod persistence;

pub use persistence::*;
