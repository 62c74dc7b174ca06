//! # triage
//!
//! The application layer around `triage-core`: configuration, the HTTP API,
//! the CLI, and the tokio scheduler that applies deferred automatic steps.

pub mod api;
pub mod cli;
pub mod config;
pub mod scheduler;
pub mod service;
