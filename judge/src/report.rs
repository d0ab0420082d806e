//! Caller-facing result of judging one submission.

use std::fmt;

use sandbox::core::outcome::{ExecutionOutcome, OutcomeKind};
use sandbox::core::text::bounded;
use sandbox::core::verdict::Verdict;
use serde::{Deserialize, Serialize};

use crate::exit_codes;

/// Verdict plus the evidence behind it.
///
/// `raw_output` is what the process printed, untrimmed, bounded to the
/// configured report limit. Both output fields flag when that bound cut them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Report {
    pub problem_id: String,
    pub verdict: Verdict,
    pub raw_output: String,
    pub raw_output_truncated: bool,
    pub expected_output: String,
    pub expected_output_truncated: bool,
    /// Failure classification; absent for accepted and wrong answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
    /// Engine outcome; absent when the sandbox was never called.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<OutcomeKind>,
}

impl Report {
    /// Report for a problem id the catalog does not know.
    pub fn invalid_problem(problem_id: &str, diagnostic: impl Into<String>) -> Self {
        Self {
            problem_id: problem_id.to_string(),
            verdict: Verdict::InvalidProblem,
            raw_output: String::new(),
            raw_output_truncated: false,
            expected_output: String::new(),
            expected_output_truncated: false,
            diagnostic: Some(diagnostic.into()),
            outcome: None,
        }
    }

    pub fn from_outcome(
        problem_id: &str,
        outcome: &ExecutionOutcome,
        verdict: Verdict,
        expected_output: &str,
        limit_chars: usize,
    ) -> Self {
        let (raw_output, raw_output_truncated) =
            bounded(outcome.captured().unwrap_or_default(), limit_chars);
        let (expected_output, expected_output_truncated) = bounded(expected_output, limit_chars);
        Self {
            problem_id: problem_id.to_string(),
            verdict,
            raw_output,
            raw_output_truncated,
            expected_output,
            expected_output_truncated,
            diagnostic: outcome.diagnostic(),
            outcome: Some(outcome.kind()),
        }
    }

    /// CLI exit code for this verdict.
    pub fn exit_code(&self) -> i32 {
        match self.verdict {
            Verdict::Accepted => exit_codes::OK,
            Verdict::WrongAnswer => exit_codes::WRONG_ANSWER,
            Verdict::InfrastructureError => exit_codes::INFRASTRUCTURE,
            Verdict::InvalidProblem => exit_codes::INVALID_PROBLEM,
        }
    }

    /// Plain-text rendering for terminals.
    pub fn render_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "report: problem={} verdict={}",
            self.problem_id,
            label(self.verdict)
        )?;
        if let Some(outcome) = self.outcome {
            writeln!(f, "report: outcome={}", label(outcome))?;
            writeln!(f, "--- output ---")?;
            f.write_str(&self.raw_output)?;
            if !self.raw_output.ends_with('\n') {
                writeln!(f)?;
            }
            if self.raw_output_truncated {
                writeln!(f, "(output truncated)")?;
            }
            writeln!(f, "--- expected ---")?;
            writeln!(f, "{}", self.expected_output.trim_end())?;
            if self.expected_output_truncated {
                writeln!(f, "(expected output truncated)")?;
            }
        }
        if let Some(diagnostic) = &self.diagnostic {
            writeln!(f, "--- diagnostic ---")?;
            writeln!(f, "{}", diagnostic.trim_end())?;
        }
        Ok(())
    }
}

/// Serialized (snake_case) name of a unit enum variant.
fn label<T: Serialize>(value: T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_default()
}
