// CLI commands for running and grading kata submissions
use anyhow::{Context, Result};
use kata_common::config::EngineSettings;
use kata_common::types::{
    CombinedExecutionResult, ExecutionResult, Language, ScoringConfig, SyntaxCheckResult,
};
use kata_engine::evaluator::{format_test_results, scoring_summary};
use kata_engine::{Engine, LanguageConfigManager, ProcessRunner, SyntaxValidator};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Settings and engine shared by every command
pub struct CliContext {
    pub settings: EngineSettings,
    pub engine: Engine,
    pub validator: SyntaxValidator,
}

impl CliContext {
    /// An explicit `--config` must exist; the default path falls back to built-in toolchains.
    pub fn load(config_override: Option<&Path>) -> Result<Self> {
        let mut settings = EngineSettings::from_env();
        let config = match config_override {
            Some(path) => {
                settings.languages_config = path.to_path_buf();
                LanguageConfigManager::load(path)?
            }
            None => LanguageConfigManager::load_or_builtin(&settings.languages_config)?,
        };

        let engine = Engine::new(Arc::new(ProcessRunner::new()), config)
            .with_compile_timeout(settings.compile_timeout_ms);
        let validator = SyntaxValidator::for_engine(&engine).with_timeout(settings.compile_timeout_ms);
        debug!(
            config = %settings.languages_config.display(),
            languages = ?engine.config().list_languages(),
            "CLI context ready"
        );

        Ok(Self {
            settings,
            engine,
            validator,
        })
    }
}

fn read_code(code_file: &Path) -> Result<String> {
    fs::read_to_string(code_file)
        .with_context(|| format!("Failed to read code file {}", code_file.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize result")?;
    println!("{}", json);
    Ok(())
}

/// Run a submission against one test file
#[allow(clippy::too_many_arguments)]
pub async fn run(
    context: &CliContext,
    lang: &str,
    kata_dir: &Path,
    code_file: &Path,
    test_file: &str,
    hidden: bool,
    timeout_ms: Option<u64>,
    json: bool,
) -> Result<bool> {
    let code = read_code(code_file)?;
    let timeout_ms = timeout_ms.unwrap_or(context.settings.default_timeout_ms);

    if !json {
        let suite = if hidden { "hidden" } else { "public" };
        println!("🚀 Running {} tests for {} ({})", suite, kata_dir.display(), lang);
    }

    let result = context
        .engine
        .execute_code(lang, &code, test_file, kata_dir, hidden, timeout_ms)
        .await;

    if json {
        print_json(&result)?;
    } else {
        print!("{}", render_execution(&result));
    }
    Ok(result.success)
}

/// Run public and hidden suites and print the weighted verdict
pub async fn grade(
    context: &CliContext,
    lang: &str,
    kata_dir: &Path,
    code_file: &Path,
    timeout_ms: Option<u64>,
    scoring: &ScoringConfig,
    json: bool,
) -> Result<bool> {
    let code = read_code(code_file)?;
    let timeout_ms = timeout_ms.unwrap_or(context.settings.default_timeout_ms);

    if !json {
        println!("🚀 Grading {} ({})", kata_dir.display(), lang);
    }

    let combined = context
        .engine
        .grade(lang, &code, kata_dir, timeout_ms, Some(scoring))
        .await;

    if json {
        print_json(&combined)?;
    } else {
        print!("{}", render_grade(&combined, scoring));
    }
    Ok(combined.passed)
}

/// Syntax-check a submission
pub async fn check(context: &CliContext, lang: &str, code_file: &Path, json: bool) -> Result<bool> {
    let language: Language = lang.parse().map_err(anyhow::Error::msg)?;
    let code = read_code(code_file)?;

    let result = context.validator.check_syntax(&code, language).await;

    if json {
        print_json(&result)?;
    } else {
        print!("{}", render_syntax(&result));
    }
    Ok(result.is_valid)
}

#[derive(Serialize)]
struct LanguageRow {
    name: String,
    implemented: bool,
    enabled: bool,
    command: Option<String>,
    compiler: Option<String>,
}

/// List every known language and how it is configured
pub fn languages(context: &CliContext, json: bool) -> Result<bool> {
    let config = context.engine.config();
    let rows: Vec<LanguageRow> = Language::ALL
        .into_iter()
        .map(|language| {
            let entry = config.get_config(&language).ok();
            LanguageRow {
                name: language.to_string(),
                implemented: language.is_implemented(),
                enabled: config.is_enabled(&language),
                command: entry.map(|c| c.command.clone()).filter(|c| !c.is_empty()),
                compiler: entry.and_then(|c| c.compiler.clone()),
            }
        })
        .collect();

    if json {
        print_json(&rows)?;
        return Ok(true);
    }

    println!("📋 Languages ({})", context.settings.languages_config.display());
    for row in rows {
        let marker = if row.enabled { "✅" } else { "⛔" };
        let toolchain = [row.compiler.as_deref(), row.command.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" + ");
        let note = if row.implemented { "" } else { " (not implemented)" };
        println!("  {} {:<11} {}{}", marker, row.name, toolchain, note);
    }
    Ok(true)
}

pub fn render_execution(result: &ExecutionResult) -> String {
    let mut out = String::new();

    for test in format_test_results(&result.test_results) {
        let marker = if test.passed { "✅" } else { "❌" };
        out.push_str(&format!("  {} {}", marker, test.name));
        if !test.passed {
            if let Some(message) = &test.message {
                out.push_str(&format!(" - {}", message));
            }
        }
        out.push('\n');
        if let (Some(expected), Some(actual)) = (&test.expected, &test.actual) {
            out.push_str(&format!("      expected: {}\n      actual:   {}\n", expected, actual));
        }
    }

    if !result.output.trim().is_empty() {
        out.push_str(&format!("\n📤 Output:\n{}\n", result.output.trim_end()));
    }
    if !result.errors.trim().is_empty() {
        out.push_str(&format!("\n⚠️  Errors:\n{}\n", result.errors.trim_end()));
    }

    let verdict = if result.success { "✅ Passed" } else { "❌ Failed" };
    out.push_str(&format!(
        "\n{} - {}/{} tests, score {:.1}, {}ms\n",
        verdict,
        result.passed_count(),
        result.total_count(),
        result.derived_score(),
        result.duration
    ));
    out
}

pub fn render_grade(combined: &CombinedExecutionResult, scoring: &ScoringConfig) -> String {
    let summary = scoring_summary(combined, Some(scoring));
    let mut out = render_execution(&combined.result);

    out.push_str(&format!(
        "\n📊 Public: {}/{} ({:.1}) x {}\n📊 Hidden: {}/{} ({:.1}) x {}\n",
        summary.public_passed,
        summary.public_total,
        summary.public_score,
        scoring.public_weight,
        summary.hidden_passed,
        summary.hidden_total,
        summary.hidden_score,
        scoring.hidden_weight,
    ));

    let verdict = if summary.passed { "✅ PASSED" } else { "❌ NOT PASSED" };
    out.push_str(&format!(
        "{} - final score {:.1} (threshold {})\n",
        verdict, summary.final_score, summary.passing_threshold
    ));
    out
}

pub fn render_syntax(result: &SyntaxCheckResult) -> String {
    let mut out = String::new();

    if result.is_valid {
        out.push_str("✅ Syntax OK\n");
    } else {
        out.push_str("❌ Syntax check failed\n");
    }

    for error in &result.errors {
        let location = match (&error.file, error.line) {
            (Some(file), Some(line)) => format!("{}:{}: ", file, line),
            (None, Some(line)) => format!("line {}: ", line),
            _ => String::new(),
        };
        out.push_str(&format!("  ❌ [{:?}] {}{}\n", error.kind, location, error.message));
    }
    for warning in &result.warnings {
        let location = warning.line.map(|l| format!("line {}: ", l)).unwrap_or_default();
        out.push_str(&format!("  ⚠️  [{:?}] {}{}\n", warning.kind, location, warning.message));
    }
    if !result.suggestions.is_empty() {
        out.push_str("\n💡 Suggestions:\n");
        for suggestion in &result.suggestions {
            out.push_str(&format!("  - {}\n", suggestion));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use kata_common::types::{TestResult, ValidationError, ValidationErrorKind};

    fn make_result(tests: Vec<TestResult>, success: bool) -> ExecutionResult {
        ExecutionResult {
            success,
            output: String::new(),
            errors: String::new(),
            test_results: tests,
            score: None,
            duration: 12,
        }
    }

    #[test]
    fn test_render_execution_shows_failure_detail() {
        let result = make_result(
            vec![
                TestResult::passed("test_small"),
                TestResult::failed("test_large", "AssertionError: Expected 100, got 52").with_values(100, 52),
            ],
            false,
        );

        let text = render_execution(&result);

        assert!(text.contains("✅ test_small"));
        assert!(text.contains("❌ test_large - AssertionError: Expected 100, got 52"));
        assert!(text.contains("expected: 100"));
        assert!(text.contains("❌ Failed - 1/2 tests, score 50.0, 12ms"));
    }

    #[test]
    fn test_render_grade_verdict() {
        let public = make_result(vec![TestResult::passed("a")], true);
        let hidden = make_result(vec![TestResult::passed("b")], true);
        let scoring = ScoringConfig::default();
        let combined = kata_engine::evaluator::combine(&public, &hidden, Some(&scoring));

        let text = render_grade(&combined, &scoring);

        assert!(text.contains("[Public] a"));
        assert!(text.contains("✅ PASSED - final score 100.0"));
    }

    #[test]
    fn test_render_syntax_errors() {
        let result = SyntaxCheckResult {
            is_valid: false,
            errors: vec![ValidationError {
                kind: ValidationErrorKind::Syntax,
                message: "SyntaxError: invalid syntax".to_string(),
                file: Some("scratch.py".to_string()),
                line: Some(3),
            }],
            warnings: Vec::new(),
            suggestions: Vec::new(),
        };

        let text = render_syntax(&result);
        assert!(text.contains("scratch.py:3: SyntaxError: invalid syntax"));
    }

    #[test]
    fn test_explicit_missing_config_is_an_error() {
        let missing = Path::new("/nonexistent/languages.json");
        assert!(CliContext::load(Some(missing)).is_err());
    }
}
