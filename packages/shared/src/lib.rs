//! Shared utilities for the costream coordinator.
//!
//! Small helpers used by the server binary and its tests: time handling
//! and logging setup.

pub mod logger;
pub mod time;
