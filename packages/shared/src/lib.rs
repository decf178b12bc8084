//! Shared utilities for the Terakoya live classroom coordinator.
//!
//! This crate holds the small pieces both the server and its tests need:
//! time handling and logging setup.

pub mod logger;
pub mod time;
