//! Verdict comparison between captured and expected output.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::core::outcome::ExecutionOutcome;

/// Caller-facing correctness classification of a judged submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Accepted,
    WrongAnswer,
    /// The engine could not evaluate correctness (timeout, runtime fault, crash, oversized output).
    InfrastructureError,
    /// The problem identifier is unknown.
    InvalidProblem,
}

/// Line-ending handling applied before the outer-whitespace trim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineEndings {
    /// Bytes compared as captured.
    #[default]
    Exact,
    /// `\r\n` treated as `\n` on both sides.
    Normalize,
}

/// Canonical form used for comparison: optional CRLF folding, then outer trim.
pub fn normalize(text: &str, line_endings: LineEndings) -> Cow<'_, str> {
    match line_endings {
        LineEndings::Exact => Cow::Borrowed(text.trim()),
        LineEndings::Normalize if text.contains("\r\n") => {
            Cow::Owned(text.replace("\r\n", "\n").trim().to_string())
        }
        LineEndings::Normalize => Cow::Borrowed(text.trim()),
    }
}

/// True when both sides are equal after [`normalize`].
///
/// Internal whitespace and newlines stay significant.
pub fn outputs_match(actual: &str, expected: &str, line_endings: LineEndings) -> bool {
    normalize(actual, line_endings) == normalize(expected, line_endings)
}

/// Map an outcome to a verdict.
///
/// Only `Completed` is a comparison candidate; every other outcome means
/// correctness could not be evaluated.
pub fn compare(outcome: &ExecutionOutcome, expected: &str, line_endings: LineEndings) -> Verdict {
    match outcome {
        ExecutionOutcome::Completed { output } => {
            if outputs_match(output, expected, line_endings) {
                Verdict::Accepted
            } else {
                Verdict::WrongAnswer
            }
        }
        ExecutionOutcome::TimedOut { .. }
        | ExecutionOutcome::InfrastructureFailure { .. }
        | ExecutionOutcome::RunFailure { .. }
        | ExecutionOutcome::OutputLimitExceeded { .. } => Verdict::InfrastructureError,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::core::outcome::{Diagnostics, ExitDetails, FailureReason};

    fn completed(output: &str) -> ExecutionOutcome {
        ExecutionOutcome::Completed {
            output: output.to_string(),
        }
    }

    #[test]
    fn trims_outer_whitespace_only() {
        assert_eq!(
            compare(&completed("5050\n"), "5050", LineEndings::Exact),
            Verdict::Accepted
        );
        assert_eq!(
            compare(&completed("  Hello, alice!\n\n"), "\tHello, alice!", LineEndings::Exact),
            Verdict::Accepted
        );
        assert_eq!(
            compare(&completed("1\n\n2\n"), "1\n2", LineEndings::Exact),
            Verdict::WrongAnswer
        );
        assert_eq!(
            compare(&completed("a  b"), "a b", LineEndings::Exact),
            Verdict::WrongAnswer
        );
    }

    #[test]
    fn mismatch_is_wrong_answer() {
        assert_eq!(
            compare(&completed("5051\n"), "5050", LineEndings::Exact),
            Verdict::WrongAnswer
        );
    }

    #[test]
    fn crlf_only_matches_when_normalizing() {
        let outcome = completed("1\r\n2\r\n");
        assert_eq!(
            compare(&outcome, "1\n2", LineEndings::Exact),
            Verdict::WrongAnswer
        );
        assert_eq!(
            compare(&outcome, "1\n2", LineEndings::Normalize),
            Verdict::Accepted
        );
    }

    #[test]
    fn non_completed_outcomes_are_infrastructure_errors() {
        let outcomes = [
            ExecutionOutcome::TimedOut {
                after: Duration::from_secs(1),
                captured: "5050".to_string(),
                container_removed: true,
                diagnostics: Diagnostics::default(),
            },
            ExecutionOutcome::RunFailure {
                exit: ExitDetails {
                    code: Some(1),
                    signal: None,
                },
                captured: "5050".to_string(),
                diagnostics: Diagnostics::default(),
            },
            ExecutionOutcome::OutputLimitExceeded {
                limit_bytes: 4,
                dropped_bytes: 3,
                captured: "5050".to_string(),
                diagnostics: Diagnostics::default(),
            },
            ExecutionOutcome::InfrastructureFailure {
                reason: FailureReason::ToolMissing,
                message: "docker not found".to_string(),
                diagnostics: Diagnostics::default(),
            },
        ];
        for outcome in &outcomes {
            assert_eq!(
                compare(outcome, "5050", LineEndings::Exact),
                Verdict::InfrastructureError
            );
        }
    }
}
