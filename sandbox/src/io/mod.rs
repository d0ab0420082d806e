//! I/O helpers for the execution engine.

pub mod config;
pub mod launcher;
pub mod preflight;
pub mod process;
pub mod workspace;
