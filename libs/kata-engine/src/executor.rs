/// Executor - Caller-Facing Entry Points
///
/// **Responsibility:**
/// Resolve a language code, hand the submission to the engine and, for
/// grading, fold the public and hidden runs through the evaluator.
///
/// This module is the glue layer - it knows nothing about:
/// - How code executes (engine's job)
/// - How scoring works (evaluator's job)
///
/// Nothing here panics or returns `Err`; every outcome is an `ExecutionResult`.

use crate::engine::Engine;
use crate::evaluator;
use kata_common::types::{CombinedExecutionResult, ExecutionResult, Language, ScoringConfig};
use std::path::Path;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Run `user_code` against a kata with real processes and built-in toolchains.
pub async fn execute_code(
    language: &str,
    user_code: &str,
    test_file_name: &str,
    kata_dir: &Path,
    hidden: bool,
    timeout_ms: u64,
) -> ExecutionResult {
    Engine::with_defaults()
        .execute_code(language, user_code, test_file_name, kata_dir, hidden, timeout_ms)
        .await
}

/// Public and hidden runs combined into one verdict, with built-in toolchains.
pub async fn grade(
    language: &str,
    user_code: &str,
    kata_dir: &Path,
    timeout_ms: u64,
    scoring: Option<&ScoringConfig>,
) -> CombinedExecutionResult {
    Engine::with_defaults()
        .grade(language, user_code, kata_dir, timeout_ms, scoring)
        .await
}

fn parse_language(language: &str) -> Result<Language, ExecutionResult> {
    language.parse::<Language>().map_err(|message| {
        warn!(language = %language, "Unsupported language requested");
        ExecutionResult::failure(message, 0)
    })
}

impl Engine {
    /// String-keyed entry point: unknown languages become a failed result.
    pub async fn execute_code(
        &self,
        language: &str,
        user_code: &str,
        test_file_name: &str,
        kata_dir: &Path,
        hidden: bool,
        timeout_ms: u64,
    ) -> ExecutionResult {
        let language = match parse_language(language) {
            Ok(language) => language,
            Err(result) => return result,
        };

        let execution_id = Uuid::new_v4();
        let span = info_span!("execution", %execution_id, hidden = hidden);
        self.execute(language, user_code, test_file_name, kata_dir, hidden, timeout_ms)
            .instrument(span)
            .await
    }

    /// Run the public and hidden suites concurrently and combine them.
    pub async fn grade(
        &self,
        language: &str,
        user_code: &str,
        kata_dir: &Path,
        timeout_ms: u64,
        scoring: Option<&ScoringConfig>,
    ) -> CombinedExecutionResult {
        let grade_id = Uuid::new_v4();
        let span = info_span!("grade", %grade_id, language = %language);

        async {
            let (public, hidden) = tokio::join!(
                self.execute_code(language, user_code, "", kata_dir, false, timeout_ms),
                self.execute_code(language, user_code, "", kata_dir, true, timeout_ms),
            );

            let combined = evaluator::combine(&public, &hidden, scoring);
            info!(
                final_score = combined.final_score,
                passed = combined.passed,
                public_tests = public.total_count(),
                hidden_tests = hidden.total_count(),
                "Grading completed"
            );
            combined
        }
        .instrument(span)
        .await
    }
}
