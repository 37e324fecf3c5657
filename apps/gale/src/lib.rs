//! # Gale Library
//!
//! This library exposes the `gale` modules for testing and integration.
//!
//! The main binary uses these modules through the `main.rs` entry point.

pub mod args;
pub mod cli;
pub mod error;
pub mod logging;
pub mod runner;

// Re-export gale_core for convenience
pub use gale_core;
