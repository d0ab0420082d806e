//! Stable exit codes for judge CLI commands.

/// Submission accepted, or the command succeeded.
pub const OK: i32 = 0;
/// Usage, config, catalog, or I/O error before a verdict was reached.
pub const INVALID: i32 = 1;
/// The submission ran and its output did not match.
pub const WRONG_ANSWER: i32 = 2;
/// The engine could not evaluate the submission (timeout, runtime fault, crash).
pub const INFRASTRUCTURE: i32 = 3;
/// The problem id is not in the catalog.
pub const INVALID_PROBLEM: i32 = 4;
