/// Syntax Validator - Check Without Running
///
/// **Core Responsibility:**
/// Ask the language's own toolchain whether a submission parses (and, for
/// TypeScript and C++, type-checks), and translate its diagnostics into
/// `ValidationError`s.
///
/// **Guarantees:**
/// - Submitted code is never executed
/// - Heuristic warnings never make code invalid
/// - `is_valid == errors.is_empty()`
///
/// Toolchain commands:
/// - Python: `python3 -m py_compile`
/// - JavaScript: `node --check`
/// - TypeScript: `tsc --noEmit`
/// - C++: `g++ -fsyntax-only`

use crate::config::LanguageConfigManager;
use crate::engine::Engine;
use crate::runner::{CommandRunner, CommandSpec, ProcessRunner, RunOutput, RunStatus};
use crate::workspace::Workspace;
use anyhow::Result;
use kata_common::config::DEFAULT_COMPILE_TIMEOUT_MS;
use kata_common::types::{
    Language, SyntaxCheckResult, ValidationError, ValidationErrorKind, ValidationWarning,
    ValidationWarningKind,
};
use regex::Regex;
use std::path::Path;
use std::sync::{Arc, LazyLock};
use tracing::{debug, instrument, warn};

const SCRATCH_STEM: &str = "scratch";
const MAX_LINE_LENGTH: usize = 120;

static PY_LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*File "(.+)", line (\d+)"#).unwrap());

static PY_ERROR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:Sorry:\s*)?(\w*(?:Error|Exception)):\s*(.*)$").unwrap());

static NODE_LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+\.[cm]?js):(\d+)$").unwrap());

static NODE_ERROR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(SyntaxError|ReferenceError|TypeError):\s*(.*)$").unwrap());

static TSC_DIAGNOSTIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)\((\d+),(\d+)\):\s*error\s+TS(\d+):\s*(.*)$").unwrap()
});

static GCC_DIAGNOSTIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?):(\d+):(?:\d+:)?\s*(?:fatal\s+)?error:\s*(.*)$").unwrap()
});

static JS_VAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*var\s+\w").unwrap());

static JS_EXPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bexport\b|\bmodule\.exports\b|\bexports\.\w").unwrap());

static TS_FUNCTION_PARAMS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bfunction\s*\w*\s*(?:<[^>]*>)?\s*\(([^)]*)\)").unwrap());

static CPP_USING_STD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\busing\s+namespace\s+std\s*;").unwrap());

fn error(kind: ValidationErrorKind, message: impl Into<String>) -> ValidationError {
    ValidationError {
        kind,
        message: message.into(),
        file: None,
        line: None,
    }
}

fn located(
    kind: ValidationErrorKind,
    message: impl Into<String>,
    file: &str,
    line: Option<u32>,
) -> ValidationError {
    // Report the file name only; the scratch directory is meaningless to callers
    let file = Path::new(file)
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.to_string());
    ValidationError {
        kind,
        message: message.into(),
        file: Some(file),
        line,
    }
}

/// Syntax checks over an injected command runner
#[derive(Clone)]
pub struct SyntaxValidator {
    runner: Arc<dyn CommandRunner>,
    config: LanguageConfigManager,
    timeout_ms: u64,
}

impl SyntaxValidator {
    pub fn new(runner: Arc<dyn CommandRunner>, config: LanguageConfigManager) -> Self {
        Self {
            runner,
            config,
            timeout_ms: DEFAULT_COMPILE_TIMEOUT_MS,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(Arc::new(ProcessRunner::new()), LanguageConfigManager::builtin())
    }

    /// Share an engine's runner and toolchains
    pub fn for_engine(engine: &Engine) -> Self {
        Self::new(engine.runner(), engine.config().clone())
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    #[instrument(skip(self, code), fields(language = %language, code_bytes = code.len()))]
    pub async fn check_syntax(&self, code: &str, language: Language) -> SyntaxCheckResult {
        if !self.config.is_enabled(&language) {
            return SyntaxCheckResult {
                is_valid: false,
                errors: vec![error(
                    ValidationErrorKind::Internal,
                    format!("Syntax checking not supported for {}", language.display_name()),
                )],
                warnings: Vec::new(),
                suggestions: Vec::new(),
            };
        }

        let hints = heuristic_warnings(code, language);
        // One suggestion per warning kind
        let mut suggestions = Vec::new();
        let mut seen_kinds = Vec::new();
        for (warning, suggestion) in &hints {
            if !seen_kinds.contains(&warning.kind) {
                seen_kinds.push(warning.kind);
                suggestions.push(suggestion.to_string());
            }
        }
        let warnings: Vec<ValidationWarning> = hints.into_iter().map(|(w, _)| w).collect();

        let errors = match self.run_toolchain(code, language).await {
            Ok((tool, run)) => {
                if run.status.is_spawn_failure() {
                    suggestions.push(format!("Install {} and make sure it is on PATH", tool));
                }
                diagnose(language, &tool, &run)
            }
            Err(e) => {
                warn!(error = %format!("{:#}", e), "Syntax check could not run");
                vec![error(
                    ValidationErrorKind::Internal,
                    format!("Syntax check failed: {:#}", e),
                )]
            }
        };

        debug!(
            errors = errors.len(),
            warnings = warnings.len(),
            "Syntax check completed"
        );

        SyntaxCheckResult {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            suggestions,
        }
    }

    async fn run_toolchain(&self, code: &str, language: Language) -> Result<(String, RunOutput)> {
        let file_name = format!("{}.{}", SCRATCH_STEM, language.extension());
        let scratch = Workspace::scratch(&file_name, code).await?;

        let (tool, spec) = match language {
            Language::Python => {
                let python = self.config.command_for(&language)?;
                let spec = CommandSpec::new(&python)
                    .args(["-m", "py_compile"])
                    .arg(&file_name)
                    .env("PYTHONDONTWRITEBYTECODE", "1");
                (python, spec)
            }
            Language::JavaScript => {
                let node = self.config.command_for(&language)?;
                let spec = CommandSpec::new(&node).arg("--check").arg(&file_name);
                (node, spec)
            }
            Language::TypeScript => {
                let tsc = self.config.compiler_for(&language)?;
                let spec = CommandSpec::new(&tsc)
                    .args([
                        "--noEmit",
                        "--skipLibCheck",
                        "--module",
                        "commonjs",
                        "--target",
                        "es2019",
                    ])
                    .arg(&file_name);
                (tsc, spec)
            }
            _ => {
                let compiler = self.config.compiler_for(&language)?;
                let spec = CommandSpec::new(&compiler)
                    .args(["-std=c++17", "-fsyntax-only"])
                    .arg(&file_name);
                (compiler, spec)
            }
        };

        let spec = spec.cwd(scratch.path()).timeout_ms(self.timeout_ms);
        let run = self.runner.run(&spec).await;
        Ok((tool, run))
    }
}

/// Translate a toolchain run into validation errors.
fn diagnose(language: Language, tool: &str, run: &RunOutput) -> Vec<ValidationError> {
    match run.status {
        RunStatus::SpawnFailed(_) => {
            return vec![error(
                ValidationErrorKind::ToolchainMissing,
                format!("{} toolchain not found: {}", language.display_name(), tool),
            )]
        }
        RunStatus::TimedOut => {
            return vec![error(ValidationErrorKind::Internal, "Syntax check timed out")]
        }
        RunStatus::Exited(_) if run.success => return Vec::new(),
        RunStatus::Exited(_) => {}
    }

    // tsc writes diagnostics to stdout, the others to stderr
    let output = format!("{}\n{}", run.stderr, run.stdout);
    let parsed = match language {
        Language::Python => parse_python(&output),
        Language::JavaScript => parse_node(&output),
        Language::TypeScript => parse_tsc(&output),
        _ => parse_gcc(&output),
    };
    if !parsed.is_empty() {
        return parsed;
    }

    let fallback_kind = match language {
        Language::Cpp => ValidationErrorKind::Compilation,
        _ => ValidationErrorKind::Syntax,
    };
    let message = output
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| match run.exit_code() {
            Some(code) => format!("Syntax check failed (exit code {})", code),
            None => "Syntax check failed".to_string(),
        });
    vec![error(fallback_kind, message)]
}

fn parse_python(output: &str) -> Vec<ValidationError> {
    let mut location: Option<(String, u32)> = None;
    let mut errors = Vec::new();

    for line in output.lines() {
        if let Some(caps) = PY_LOCATION.captures(line) {
            location = Some((caps[1].to_string(), caps[2].parse().unwrap_or(0)));
        } else if let Some(caps) = PY_ERROR.captures(line.trim()) {
            let message = format!("{}: {}", &caps[1], &caps[2]);
            errors.push(match &location {
                Some((file, line)) => {
                    located(ValidationErrorKind::Syntax, message, file, Some(*line))
                }
                None => error(ValidationErrorKind::Syntax, message),
            });
        }
    }
    errors
}

fn parse_node(output: &str) -> Vec<ValidationError> {
    let mut location: Option<(String, u32)> = None;
    let mut errors = Vec::new();

    for line in output.lines() {
        if let Some(caps) = NODE_LOCATION.captures(line.trim()) {
            location = Some((caps[1].to_string(), caps[2].parse().unwrap_or(0)));
        } else if let Some(caps) = NODE_ERROR.captures(line.trim()) {
            let message = format!("{}: {}", &caps[1], &caps[2]);
            errors.push(match &location {
                Some((file, line)) => {
                    located(ValidationErrorKind::Syntax, message, file, Some(*line))
                }
                None => error(ValidationErrorKind::Syntax, message),
            });
        }
    }
    errors
}

fn parse_tsc(output: &str) -> Vec<ValidationError> {
    output
        .lines()
        .filter_map(|line| TSC_DIAGNOSTIC.captures(line.trim()))
        .map(|caps| {
            // TS1xxx codes are parser errors; everything else comes from the checker
            let kind = if caps[4].starts_with('1') && caps[4].len() == 4 {
                ValidationErrorKind::Syntax
            } else {
                ValidationErrorKind::Type
            };
            located(
                kind,
                format!("TS{}: {}", &caps[4], &caps[5]),
                &caps[1],
                caps[2].parse().ok(),
            )
        })
        .collect()
}

fn parse_gcc(output: &str) -> Vec<ValidationError> {
    output
        .lines()
        .filter_map(|line| GCC_DIAGNOSTIC.captures(line.trim()))
        .map(|caps| {
            located(
                ValidationErrorKind::Compilation,
                caps[3].to_string(),
                &caps[1],
                caps[2].parse().ok(),
            )
        })
        .collect()
}

fn warning(kind: ValidationWarningKind, message: impl Into<String>, line: Option<u32>) -> ValidationWarning {
    ValidationWarning {
        kind,
        message: message.into(),
        file: None,
        line,
    }
}

fn line_of(code: &str, offset: usize) -> u32 {
    code[..offset].matches('\n').count() as u32 + 1
}

/// Style and best-practice hints, each paired with the suggestion it implies.
fn heuristic_warnings(code: &str, language: Language) -> Vec<(ValidationWarning, &'static str)> {
    let mut hints = Vec::new();

    if let Some(idx) = code.lines().position(|l| l.starts_with('\t')) {
        hints.push((
            warning(
                ValidationWarningKind::Style,
                "Tabs used for indentation",
                Some(idx as u32 + 1),
            ),
            "Indent with spaces consistently",
        ));
    }

    for (idx, line) in code.lines().enumerate() {
        if line.chars().count() > MAX_LINE_LENGTH {
            hints.push((
                warning(
                    ValidationWarningKind::Style,
                    format!("Line exceeds {} characters", MAX_LINE_LENGTH),
                    Some(idx as u32 + 1),
                ),
                "Keep lines under 120 characters",
            ));
        }
    }

    if matches!(language, Language::JavaScript | Language::TypeScript) {
        for m in JS_VAR.find_iter(code) {
            hints.push((
                warning(
                    ValidationWarningKind::Deprecated,
                    "'var' declaration; prefer 'let' or 'const'",
                    Some(line_of(code, m.start())),
                ),
                "Replace 'var' with 'let' or 'const'",
            ));
        }

        if !JS_EXPORT.is_match(code) {
            hints.push((
                warning(
                    ValidationWarningKind::BestPractice,
                    "No exports found; tests import the solution from the entry module",
                    None,
                ),
                "Export your solution so the tests can import it",
            ));
        }
    }

    if language == Language::TypeScript {
        for caps in TS_FUNCTION_PARAMS.captures_iter(code) {
            let Some(params) = caps.get(1) else { continue };
            let untyped: Vec<&str> = params
                .as_str()
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty() && !p.contains(':'))
                .collect();
            for param in untyped {
                hints.push((
                    warning(
                        ValidationWarningKind::BestPractice,
                        format!("Parameter '{}' has no type annotation", param),
                        Some(line_of(code, params.start())),
                    ),
                    "Annotate function parameters with explicit types",
                ));
            }
        }
    }

    if language == Language::Cpp {
        if let Some(m) = CPP_USING_STD.find(code) {
            hints.push((
                warning(
                    ValidationWarningKind::BestPractice,
                    "'using namespace std' pollutes the global namespace",
                    Some(line_of(code, m.start())),
                ),
                "Qualify standard library names with std::",
            ));
        }
    }

    hints
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{exited, spawn_failed, timed_out, FakeRunner};

    fn make_validator(runner: Arc<FakeRunner>) -> SyntaxValidator {
        SyntaxValidator::new(runner, LanguageConfigManager::builtin())
    }

    #[tokio::test]
    async fn test_valid_python() {
        let runner = FakeRunner::new(|_| exited(0, "", ""));
        let validator = make_validator(runner.clone());

        let result = validator
            .check_syntax("def f(x):\n    return x\n", Language::Python)
            .await;

        assert!(result.is_valid);
        assert!(result.errors.is_empty());
        let calls = runner.calls();
        assert_eq!(calls[0].program, "python3");
        assert_eq!(calls[0].args, vec!["-m", "py_compile", "scratch.py"]);
    }

    #[tokio::test]
    async fn test_python_syntax_error() {
        let stderr = "  File \"/tmp/kata-run-abc/scratch.py\", line 1\n    def f(:\n          ^\nSyntaxError: invalid syntax\n";
        let validator = make_validator(FakeRunner::new(move |_| exited(1, "", stderr)));

        let result = validator.check_syntax("def f(:\n", Language::Python).await;

        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 1);
        let err = &result.errors[0];
        assert_eq!(err.kind, ValidationErrorKind::Syntax);
        assert_eq!(err.message, "SyntaxError: invalid syntax");
        assert_eq!(err.file.as_deref(), Some("scratch.py"));
        assert_eq!(err.line, Some(1));
    }

    #[tokio::test]
    async fn test_node_syntax_error() {
        let stderr = "/tmp/kata-run-abc/scratch.js:3\n}}\n ^\n\nSyntaxError: Unexpected token '}'\n    at internalCompileFunction (node:internal/vm:76:18)\n";
        let runner = FakeRunner::new(move |_| exited(1, "", stderr));
        let validator = make_validator(runner.clone());

        let result = validator
            .check_syntax("module.exports = {};\n}}\n", Language::JavaScript)
            .await;

        assert!(!result.is_valid);
        assert_eq!(result.errors[0].message, "SyntaxError: Unexpected token '}'");
        assert_eq!(result.errors[0].line, Some(3));
        assert_eq!(runner.calls()[0].args, vec!["--check", "scratch.js"]);
    }

    #[tokio::test]
    async fn test_tsc_type_and_syntax_classification() {
        let stdout = "scratch.ts(1,7): error TS2322: Type 'string' is not assignable to type 'number'.\nscratch.ts(2,1): error TS1005: ';' expected.\n";
        let validator = make_validator(FakeRunner::new(move |_| exited(2, stdout, "")));

        let result = validator
            .check_syntax("export const x: number = 'a'\n)", Language::TypeScript)
            .await;

        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.errors[0].kind, ValidationErrorKind::Type);
        assert!(result.errors[0].message.starts_with("TS2322"));
        assert_eq!(result.errors[1].kind, ValidationErrorKind::Syntax);
        assert_eq!(result.errors[1].line, Some(2));
    }

    #[tokio::test]
    async fn test_gcc_compilation_error() {
        let stderr = "scratch.cpp: In function 'int main()':\nscratch.cpp:3:5: error: 'y' was not declared in this scope\n";
        let runner = FakeRunner::new(move |_| exited(1, "", stderr));
        let validator = make_validator(runner.clone());

        let result = validator
            .check_syntax("int main() {\n  int x;\n  y = 1;\n}\n", Language::Cpp)
            .await;

        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, ValidationErrorKind::Compilation);
        assert_eq!(result.errors[0].message, "'y' was not declared in this scope");
        assert_eq!(result.errors[0].line, Some(3));
        assert_eq!(runner.calls()[0].args, vec!["-std=c++17", "-fsyntax-only", "scratch.cpp"]);
    }

    #[tokio::test]
    async fn test_unparseable_failure_uses_first_line() {
        let validator = make_validator(FakeRunner::new(|_| exited(1, "", "\nsomething odd happened\nmore\n")));
        let result = validator.check_syntax("x", Language::Python).await;

        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].message, "something odd happened");
    }

    #[tokio::test]
    async fn test_toolchain_missing() {
        let validator = make_validator(FakeRunner::new(|spec| spawn_failed(&spec.program)));
        let result = validator.check_syntax("int main() {}", Language::Cpp).await;

        assert!(!result.is_valid);
        assert_eq!(result.errors[0].kind, ValidationErrorKind::ToolchainMissing);
        assert!(result.errors[0].message.contains("g++"));
        assert!(result.suggestions.iter().any(|s| s.contains("Install g++")));
    }

    #[tokio::test]
    async fn test_timeout_is_internal_error() {
        let validator = make_validator(FakeRunner::new(|_| timed_out("", 100)));
        let result = validator
            .check_syntax("export {}", Language::TypeScript)
            .await;
        assert_eq!(result.errors[0].kind, ValidationErrorKind::Internal);
    }

    #[tokio::test]
    async fn test_unsupported_language_never_runs() {
        let runner = FakeRunner::new(|_| exited(0, "", ""));
        let validator = make_validator(runner.clone());

        let result = validator.check_syntax("fn main() {}", Language::Rust).await;

        assert!(!result.is_valid);
        assert_eq!(result.errors[0].kind, ValidationErrorKind::Internal);
        assert_eq!(result.errors[0].message, "Syntax checking not supported for Rust");
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_warnings_do_not_invalidate() {
        let validator = make_validator(FakeRunner::new(|_| exited(0, "", "")));
        let code = "var total = 0;\n\tfunction add(a, b) { return a + b; }\n";

        let result = validator.check_syntax(code, Language::JavaScript).await;

        assert!(result.is_valid);
        let kinds: Vec<ValidationWarningKind> = result.warnings.iter().map(|w| w.kind).collect();
        assert!(kinds.contains(&ValidationWarningKind::Style));
        assert!(kinds.contains(&ValidationWarningKind::Deprecated));
        assert!(kinds.contains(&ValidationWarningKind::BestPractice));
        assert_eq!(result.suggestions.len(), 3);
    }

    #[test]
    fn test_heuristics_per_language() {
        let long_line = format!("x = {}\n", "1".repeat(130));
        let hints = heuristic_warnings(&long_line, Language::Python);
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].0.line, Some(1));

        let ts = "export function add(a: number, b) {\n  return a + b;\n}\n";
        let hints = heuristic_warnings(ts, Language::TypeScript);
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].0.message, "Parameter 'b' has no type annotation");

        let cpp = "#include <iostream>\nusing namespace std;\nint main() {}\n";
        let hints = heuristic_warnings(cpp, Language::Cpp);
        assert_eq!(hints[0].0.kind, ValidationWarningKind::BestPractice);
        assert_eq!(hints[0].0.line, Some(2));

        let clean = "module.exports = { add: (a, b) => a + b };\n";
        assert!(heuristic_warnings(clean, Language::JavaScript).is_empty());
    }
}
