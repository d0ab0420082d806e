//! Sandboxed execution engine for judging untrusted code.
//!
//! Each submission runs in a throwaway container: the engine stages the code and
//! its input in a private workspace, checks that the container runtime can
//! actually serve the request, runs the command under a hard deadline, and
//! classifies what happened. The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (argv construction, outcome
//!   types, verdict comparison, bounded text). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (temp filesystem, child processes,
//!   the container runtime CLI).
//!
//! [`engine`] sequences the two into one execution attempt per request.

pub mod core;
pub mod engine;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
