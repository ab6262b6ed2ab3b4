//! CLI command implementations.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration file management (path, init, show)
//! - [`run`] - Start the ingest service and run until Ctrl+C

pub mod config;
pub mod run;
