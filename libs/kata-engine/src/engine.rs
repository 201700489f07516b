/// Execution Engine - Language Pipelines
///
/// **Core Responsibility:**
/// Stage a submission next to a kata's test file, run it with the language's
/// toolchain and turn what comes back into an `ExecutionResult`.
///
/// **Pipelines:**
/// - Python / JavaScript: one interpreter run of the test file
/// - TypeScript: `tsc` into `dist/`, then the JavaScript path on the output
/// - C++: `g++` once, then one run of the binary per stdin/stdout case
///
/// **Critical Architectural Boundary:**
/// - Engine knows HOW to execute (which binary, which flags, which cwd)
/// - Engine does NOT spawn processes itself; it goes through `CommandRunner`
/// - Engine does NOT combine public and hidden runs (evaluator's job)
///
/// Compile always finishes before run starts. Every execution stages into its
/// own `Workspace`, so the kata directory is never modified.

use crate::cases::{outputs_match, parse_cases, CaseSpec};
use crate::config::LanguageConfigManager;
use crate::parser::{parse_output, score_of, OutputFamily};
use crate::runner::{CommandRunner, CommandSpec, ProcessRunner, RunOutput, RunStatus};
use crate::workspace::Workspace;
use anyhow::{Context, Result};
use kata_common::config::{EngineSettings, DEFAULT_COMPILE_TIMEOUT_MS};
use kata_common::types::{ExecutionResult, Language, TestResult};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Name of the compiled C++ binary inside the workspace
const CPP_BINARY: &str = "solution";
/// Optional harness a C++ kata can ship to be linked with the submission
const CPP_HARNESS: &str = "harness.cpp";
/// Output directory for compiled TypeScript
const TS_OUT_DIR: &str = "dist";

const TS_COMPILE_FLAGS: &[&str] = &[
    "--module",
    "commonjs",
    "--target",
    "es2019",
    "--esModuleInterop",
    "--skipLibCheck",
    "--outDir",
    TS_OUT_DIR,
];

const CPP_COMPILE_FLAGS: &[&str] = &["-std=c++17", "-O2"];

/// Pick the test file for a run.
///
/// The public/hidden convention wins; a caller-supplied name is only honoured
/// when it points at a custom file rather than one of the conventional two.
pub fn resolve_test_file(language: Language, test_file_name: &str, hidden: bool) -> String {
    let conventional = language.test_file(hidden);
    let requested = test_file_name.trim();
    if requested.is_empty()
        || requested == language.test_file(false)
        || requested == language.test_file(true)
    {
        conventional
    } else {
        requested.to_string()
    }
}

pub fn not_implemented(language: Language, duration: u64) -> ExecutionResult {
    ExecutionResult::failure(
        format!("{} execution not implemented yet", language.display_name()),
        duration,
    )
}

/// Language pipelines over an injected command runner
#[derive(Clone)]
pub struct Engine {
    runner: Arc<dyn CommandRunner>,
    config: LanguageConfigManager,
    compile_timeout_ms: u64,
}

impl Engine {
    pub fn new(runner: Arc<dyn CommandRunner>, config: LanguageConfigManager) -> Self {
        Self {
            runner,
            config,
            compile_timeout_ms: DEFAULT_COMPILE_TIMEOUT_MS,
        }
    }

    /// Real processes with built-in toolchains
    pub fn with_defaults() -> Self {
        Self::new(Arc::new(ProcessRunner::new()), LanguageConfigManager::builtin())
    }

    /// Real processes, toolchains from the configured languages.json (if present)
    pub fn from_settings(settings: &EngineSettings) -> Result<Self> {
        let config = LanguageConfigManager::load_or_builtin(&settings.languages_config)?;
        Ok(Self::new(Arc::new(ProcessRunner::new()), config)
            .with_compile_timeout(settings.compile_timeout_ms))
    }

    pub fn with_compile_timeout(mut self, compile_timeout_ms: u64) -> Self {
        self.compile_timeout_ms = compile_timeout_ms;
        self
    }

    pub fn config(&self) -> &LanguageConfigManager {
        &self.config
    }

    pub fn runner(&self) -> Arc<dyn CommandRunner> {
        self.runner.clone()
    }

    /// Run `user_code` against a kata's public or hidden test file.
    ///
    /// Never fails: internal faults come back as `Execution error: ...`.
    #[instrument(
        skip(self, user_code, kata_dir),
        fields(language = %language, kata_dir = %kata_dir.display())
    )]
    pub async fn execute(
        &self,
        language: Language,
        user_code: &str,
        test_file_name: &str,
        kata_dir: &Path,
        hidden: bool,
        timeout_ms: u64,
    ) -> ExecutionResult {
        let start = Instant::now();

        let mut result = match self
            .try_execute(language, user_code, test_file_name, kata_dir, hidden, timeout_ms)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                error!(error = %format!("{:#}", e), "Execution failed internally");
                ExecutionResult::failure(format!("Execution error: {:#}", e), 0)
            }
        };
        result.duration = start.elapsed().as_millis() as u64;

        info!(
            success = result.success,
            score = result.score,
            tests = result.test_results.len(),
            duration_ms = result.duration,
            "Execution completed"
        );
        result
    }

    async fn try_execute(
        &self,
        language: Language,
        user_code: &str,
        test_file_name: &str,
        kata_dir: &Path,
        hidden: bool,
        timeout_ms: u64,
    ) -> Result<ExecutionResult> {
        if !self.config.is_enabled(&language) {
            return Ok(not_implemented(language, 0));
        }

        let test_file = resolve_test_file(language, test_file_name, hidden);
        if !tokio::fs::try_exists(kata_dir.join(&test_file))
            .await
            .unwrap_or(false)
        {
            warn!(test_file = %test_file, "Test file not found");
            return Ok(ExecutionResult::failure(
                format!("Test file not found: {}", test_file),
                0,
            ));
        }

        let workspace = Workspace::stage(kata_dir, &language.entry_file(), user_code).await?;
        debug!(
            test_file = %test_file,
            hidden = hidden,
            timeout_ms = timeout_ms,
            workspace = %workspace.path().display(),
            "Running pipeline"
        );

        match language {
            Language::Python | Language::JavaScript => {
                self.run_interpreted(language, &workspace, &test_file, &test_file, timeout_ms)
                    .await
            }
            Language::TypeScript => self.run_typescript(&workspace, &test_file, timeout_ms).await,
            Language::Cpp => self.run_cpp(&workspace, &test_file, timeout_ms).await,
            other => Ok(not_implemented(other, 0)),
        }
    }

    /// Interpreter run of `script`; `test_source_file` feeds test counting.
    async fn run_interpreted(
        &self,
        language: Language,
        workspace: &Workspace,
        script: &str,
        test_source_file: &str,
        timeout_ms: u64,
    ) -> Result<ExecutionResult> {
        let family = OutputFamily::for_language(language)
            .with_context(|| format!("No interpreter pipeline for {}", language))?;
        let (search_path_var, module_root) = match (family, language) {
            (OutputFamily::Python, _) => ("PYTHONPATH", workspace.path_string()),
            (OutputFamily::Node, Language::TypeScript) => (
                "NODE_PATH",
                workspace.file(TS_OUT_DIR).to_string_lossy().into_owned(),
            ),
            (OutputFamily::Node, _) => ("NODE_PATH", workspace.path_string()),
        };
        let program = self.config.command_for(&language)?;

        let mut spec = CommandSpec::new(&program)
            .arg(script)
            .cwd(workspace.path())
            .env(search_path_var, module_root)
            .timeout_ms(timeout_ms);
        if family == OutputFamily::Python {
            // unbuffered so partial output survives a timeout kill
            spec = spec
                .env("PYTHONDONTWRITEBYTECODE", "1")
                .env("PYTHONUNBUFFERED", "1");
        }
        let run = self.runner.run(&spec).await;

        if run.status.is_spawn_failure() {
            return Ok(ExecutionResult::failure(
                format!("{} runtime ({}) not found. {}", language.display_name(), program, run.stderr),
                0,
            ));
        }

        let test_source = tokio::fs::read_to_string(workspace.file(test_source_file))
            .await
            .unwrap_or_default();
        Ok(build_result(family, run, &test_source))
    }

    async fn run_typescript(
        &self,
        workspace: &Workspace,
        test_file: &str,
        timeout_ms: u64,
    ) -> Result<ExecutionResult> {
        let compiler = self.config.compiler_for(&Language::TypeScript)?;
        let compile = CommandSpec::new(&compiler)
            .args(TS_COMPILE_FLAGS.iter().copied())
            .arg(Language::TypeScript.entry_file())
            .arg(test_file)
            .cwd(workspace.path())
            .timeout_ms(self.compile_timeout_ms);

        let compiled = self.runner.run(&compile).await;
        if !compiled.success {
            return Ok(compilation_failure(Language::TypeScript, &compiler, compiled));
        }
        debug!(duration_ms = compiled.duration_ms, "TypeScript compiled");

        let stem = Path::new(test_file)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .context("Test file has no name")?;
        let script = format!("{}/{}.js", TS_OUT_DIR, stem);

        self.run_interpreted(Language::TypeScript, workspace, &script, test_file, timeout_ms)
            .await
    }

    async fn run_cpp(
        &self,
        workspace: &Workspace,
        test_file: &str,
        timeout_ms: u64,
    ) -> Result<ExecutionResult> {
        let source = tokio::fs::read_to_string(workspace.file(test_file))
            .await
            .with_context(|| format!("Failed to read {}", test_file))?;
        let cases = parse_cases(&source);
        if cases.is_empty() {
            return Ok(ExecutionResult::failure("No test cases found", 0));
        }

        let compiler = self.config.compiler_for(&Language::Cpp)?;
        let mut compile = CommandSpec::new(&compiler)
            .args(CPP_COMPILE_FLAGS.iter().copied())
            .args(["-o", CPP_BINARY])
            .arg(Language::Cpp.entry_file())
            .cwd(workspace.path())
            .timeout_ms(self.compile_timeout_ms);
        if workspace.file(CPP_HARNESS).exists() {
            compile = compile.arg(CPP_HARNESS);
        }

        let compiled = self.runner.run(&compile).await;
        if !compiled.success {
            return Ok(compilation_failure(Language::Cpp, &compiler, compiled));
        }
        debug!(
            duration_ms = compiled.duration_ms,
            cases = cases.len(),
            "C++ compiled"
        );

        let binary = workspace.file(CPP_BINARY).to_string_lossy().into_owned();
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let mut test_results = Vec::with_capacity(cases.len());
        let mut output = String::new();
        let mut errors = String::new();

        for case in &cases {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                test_results.push(
                    TestResult::failed(case.name(), "Time limit exceeded before the case could run")
                        .with_values(case.expected_output.clone(), ""),
                );
                continue;
            }

            let spec = CommandSpec::new(&binary)
                .cwd(workspace.path())
                .stdin(case.input.clone())
                .timeout_ms(remaining.as_millis() as u64);
            let run = self.runner.run(&spec).await;

            if !run.stdout.is_empty() {
                output.push_str(&format!("[{}]\n{}\n", case.name(), run.stdout.trim_end()));
            }
            if !run.stderr.trim().is_empty() {
                errors.push_str(&format!("[{}]\n{}\n", case.name(), run.stderr.trim()));
            }
            test_results.push(judge_case(case, &run));
        }

        let success = test_results.iter().all(|t| t.passed);
        let score = score_of(&test_results);
        Ok(ExecutionResult {
            success,
            output,
            errors,
            test_results,
            score,
            duration: 0,
        })
    }
}

fn build_result(family: OutputFamily, run: RunOutput, test_source: &str) -> ExecutionResult {
    let test_results = parse_output(family, run.success, &run.stdout, &run.stderr, test_source);
    let score = score_of(&test_results);

    ExecutionResult {
        success: run.success,
        output: run.stdout,
        errors: run.stderr,
        test_results,
        score,
        duration: 0,
    }
}

/// Two-way classification of a failed compile step: missing toolchain vs diagnostics.
fn compilation_failure(language: Language, compiler: &str, run: RunOutput) -> ExecutionResult {
    let name = language.display_name();
    let (errors, message) = match run.status {
        RunStatus::SpawnFailed(_) => (
            format!(
                "{} compiler ({}) not found. Install it and make sure it is on PATH. {}",
                name, compiler, run.stderr
            ),
            format!("{} compiler not found", name),
        ),
        RunStatus::TimedOut => (
            format!("Compilation timed out.\n{}{}", run.stdout, run.stderr),
            "Compilation timed out".to_string(),
        ),
        RunStatus::Exited(_) => (
            // tsc reports diagnostics on stdout, g++ on stderr
            format!("Compilation failed:\n{}{}", run.stdout, run.stderr),
            "Compilation failed".to_string(),
        ),
    };

    warn!(
        language = %language,
        status = ?run.status,
        error_preview = errors.lines().nth(1).unwrap_or(""),
        "Compilation failed"
    );

    let test_results = vec![TestResult::failed("compilation", message)];
    let score = score_of(&test_results);
    ExecutionResult {
        success: false,
        output: String::new(),
        errors,
        test_results,
        score,
        duration: 0,
    }
}

fn judge_case(case: &CaseSpec, run: &RunOutput) -> TestResult {
    let expected = case.expected_output.clone();
    let actual = run.stdout.trim().to_string();

    let result = match run.status {
        RunStatus::TimedOut => TestResult::failed(case.name(), "Time limit exceeded"),
        RunStatus::SpawnFailed(_) => TestResult::failed(case.name(), run.stderr.trim()),
        RunStatus::Exited(Some(0)) if outputs_match(&run.stdout, &expected) => TestResult::passed(case.name()),
        RunStatus::Exited(Some(0)) => TestResult::failed(case.name(), "Output mismatch"),
        RunStatus::Exited(Some(code)) => {
            TestResult::failed(case.name(), format!("Runtime error (exit code {})", code))
        }
        RunStatus::Exited(None) => TestResult::failed(case.name(), "Runtime error (terminated by signal)"),
    };
    result.with_values(expected, actual)
}
