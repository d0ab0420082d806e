//! Judge submissions against a catalog of problems.
//!
//! Wraps the [`sandbox`] engine with problem lookup, verdict reporting, and the
//! `judge` command-line interface.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod exit_codes;
pub mod judge;
pub mod record;
pub mod report;
pub mod token_cache;
