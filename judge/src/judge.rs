//! Judge a submission against a catalog problem.
//!
//! Resolves the problem, runs the code through a [`Sandbox`], and compares the
//! output. Unknown problems never reach the sandbox.

use sandbox::core::outcome::ExecutionRequest;
use sandbox::core::verdict::{LineEndings, Verdict, compare};
use sandbox::engine::Sandbox;
use tracing::{info, instrument, warn};

use crate::catalog::ProblemCatalog;
use crate::report::Report;

/// Comparison and reporting settings.
#[derive(Debug, Clone, Copy)]
pub struct JudgeSettings {
    pub line_endings: LineEndings,
    pub report_limit_chars: usize,
}

impl Default for JudgeSettings {
    fn default() -> Self {
        Self {
            line_endings: LineEndings::Exact,
            report_limit_chars: 4_000,
        }
    }
}

/// Execution API over a catalog and a sandbox.
///
/// Holds no per-request state; share it by reference across threads.
pub struct Judge<C, S> {
    catalog: C,
    sandbox: S,
    settings: JudgeSettings,
}

impl<C: ProblemCatalog, S: Sandbox> Judge<C, S> {
    pub fn new(catalog: C, sandbox: S, settings: JudgeSettings) -> Self {
        Self {
            catalog,
            sandbox,
            settings,
        }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn sandbox(&self) -> &S {
        &self.sandbox
    }

    /// Run `code` for `problem_id` and produce exactly one report.
    #[instrument(skip_all, fields(problem_id = %problem_id, code_bytes = code.len()))]
    pub fn execute(&self, problem_id: &str, code: &[u8]) -> Report {
        let Some(problem) = self.catalog.lookup(problem_id) else {
            warn!("unknown problem id");
            return Report::invalid_problem(problem_id, format!("unknown problem id {problem_id}"));
        };

        let request = match ExecutionRequest::new(
            problem.image.as_str(),
            problem.command.as_str(),
            code,
            problem.stdin.as_bytes(),
        ) {
            Ok(request) => request,
            Err(err) => {
                warn!(err = %err, "problem definition cannot be executed");
                return Report::invalid_problem(problem_id, format!("problem {problem_id}: {err}"));
            }
        };

        let outcome = self.sandbox.run(&request);
        let verdict = compare(&outcome, &problem.expected_output, self.settings.line_endings);
        info!(verdict = ?verdict, outcome = ?outcome.kind(), "submission judged");
        Report::from_outcome(
            problem_id,
            &outcome,
            verdict,
            &problem.expected_output,
            self.settings.report_limit_chars,
        )
    }
}
