/// Scorer - Public + Hidden → One Verdict
///
/// **Core Responsibility:**
/// Fold two independently produced execution results into a weighted score
/// and a boolean pass/fail.
///
/// **Critical Properties:**
/// - Knows nothing about processes or language runtimes
/// - Pure functions over `ExecutionResult` values
///
/// **Scoring Rules:**
/// - section score = stored `score`, else `100 * passed / total` (0 when empty)
/// - finalScore = publicScore * publicWeight + hiddenScore * hiddenWeight (unrounded)
/// - passed = finalScore >= passingThreshold AND both runs succeeded
///
/// **Information Hiding:**
/// A failing hidden test never exposes its message, expected or actual value.
/// Passing hidden tests keep their detail. Hidden stderr is replaced with
/// `HIDDEN_ERRORS_WITHHELD` whenever the hidden run failed.
///
/// The combined `score` follows its own test list (`100 * passed / total`);
/// the weighted value lives in `final_score`.

use crate::parser::score_of;
use kata_common::types::{
    CombinedExecutionResult, ExecutionResult, ScoringConfig, ScoringSummary, TestResult,
};
use tracing::debug;

pub const DEFAULT_PASSING_THRESHOLD: f64 = 70.0;
pub const HIDDEN_FAILURE_MESSAGE: &str = "Hidden test failed";
pub const HIDDEN_ERRORS_WITHHELD: &str = "Hidden tests failed. Error details are withheld.";

const PUBLIC_PREFIX: &str = "[Public] ";
const HIDDEN_PREFIX: &str = "[Hidden] ";

/// Clear everything a learner could use to reverse-engineer a hidden test.
fn redact(test: &TestResult) -> TestResult {
    if test.passed {
        return test.clone();
    }
    TestResult {
        name: test.name.clone(),
        passed: false,
        message: Some(HIDDEN_FAILURE_MESSAGE.to_string()),
        expected: None,
        actual: None,
    }
}

fn prefixed(prefix: &str, test: TestResult) -> TestResult {
    TestResult {
        name: format!("{}{}", prefix, test.name),
        ..test
    }
}

/// Join non-empty `(header, body)` pairs with a blank line between sections.
fn join_sections(sections: &[(&str, &str)]) -> String {
    sections
        .iter()
        .filter(|(_, body)| !body.is_empty())
        .map(|(header, body)| format!("=== {} ===\n{}", header, body))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Combine public and hidden runs into one weighted verdict.
pub fn combine(
    public: &ExecutionResult,
    hidden: &ExecutionResult,
    config: Option<&ScoringConfig>,
) -> CombinedExecutionResult {
    let config = config.copied().unwrap_or_default();

    let public_score = public.derived_score();
    let hidden_score = hidden.derived_score();
    let final_score = public_score * config.public_weight + hidden_score * config.hidden_weight;
    let success = public.success && hidden.success;
    let passed = success && final_score >= config.passing_threshold;

    let redacted_hidden: Vec<TestResult> = hidden.test_results.iter().map(redact).collect();

    let test_results = public
        .test_results
        .iter()
        .cloned()
        .map(|t| prefixed(PUBLIC_PREFIX, t))
        .chain(
            redacted_hidden
                .iter()
                .cloned()
                .map(|t| prefixed(HIDDEN_PREFIX, t)),
        )
        .collect::<Vec<_>>();

    let hidden_failed = !hidden.success || hidden.test_results.iter().any(|t| !t.passed);
    let hidden_errors = if hidden_failed && !hidden.errors.is_empty() {
        HIDDEN_ERRORS_WITHHELD.to_string()
    } else {
        hidden.errors.clone()
    };

    let output = join_sections(&[
        ("Public Tests", public.output.as_str()),
        ("Hidden Tests", hidden.output.as_str()),
    ]);
    let errors = join_sections(&[
        ("Public Test Errors", public.errors.as_str()),
        ("Hidden Test Errors", hidden_errors.as_str()),
    ]);

    debug!(
        public_score = public_score,
        hidden_score = hidden_score,
        final_score = final_score,
        passed = passed,
        "Combined public and hidden results"
    );

    CombinedExecutionResult {
        result: ExecutionResult {
            success,
            output,
            errors,
            score: score_of(&test_results),
            test_results,
            duration: public.duration + hidden.duration,
        },
        public_results: public.clone(),
        hidden_results: ExecutionResult {
            errors: hidden_errors,
            test_results: redacted_hidden,
            ..hidden.clone()
        },
        final_score,
        passed,
    }
}

/// Backfill `score` when the producer did not store one.
pub fn process_result(mut result: ExecutionResult) -> ExecutionResult {
    if result.score.is_none() {
        result.score = Some(result.derived_score());
    }
    result
}

/// A single run passes when it succeeded and meets the threshold.
pub fn determine_pass_status(result: &ExecutionResult, threshold: f64) -> bool {
    result.success && result.derived_score() >= threshold
}

/// Give every result a display name and message.
pub fn format_test_results(results: &[TestResult]) -> Vec<TestResult> {
    results
        .iter()
        .enumerate()
        .map(|(i, test)| {
            let mut test = test.clone();
            if test.name.trim().is_empty() {
                test.name = format!("Test {}", i + 1);
            }
            if test.message.is_none() {
                let message = if test.passed { "Test passed" } else { "Test failed" };
                test.message = Some(message.to_string());
            }
            test
        })
        .collect()
}

pub fn scoring_summary(
    combined: &CombinedExecutionResult,
    config: Option<&ScoringConfig>,
) -> ScoringSummary {
    let config = config.copied().unwrap_or_default();
    let public = &combined.public_results;
    let hidden = &combined.hidden_results;

    ScoringSummary {
        public_score: public.derived_score(),
        hidden_score: hidden.derived_score(),
        final_score: combined.final_score,
        passed: combined.passed,
        public_passed: public.passed_count(),
        public_total: public.total_count(),
        hidden_passed: hidden.passed_count(),
        hidden_total: hidden.total_count(),
        passing_threshold: config.passing_threshold,
    }
}
