//! Coach Service Library Crate
//!
//! Configuration, command-line parsing, and application wiring for the `coach`
//! binary. The binary itself is a thin wrapper around this library.

pub mod app;
pub mod cli;
pub mod config;
