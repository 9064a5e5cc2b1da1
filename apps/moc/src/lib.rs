//! # moc
//!
//! Application layer of the MOC tracker: configuration, CLI, HTTP API and
//! the tracing progress sink. Exposed as a library so the integration tests
//! can build routers and drive commands directly.

pub mod api;
pub mod cli;
pub mod config;
pub mod progress;
