use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Languages the grader knows about.
///
/// Only the first four have execution pipelines; the rest are recognised so
/// callers get a "not implemented yet" answer instead of "unsupported".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[serde(alias = "py")]
    Python,
    #[serde(alias = "js")]
    JavaScript,
    #[serde(alias = "ts")]
    TypeScript,
    #[serde(alias = "c++")]
    Cpp,
    Java,
    Go,
    #[serde(alias = "rs")]
    Rust,
}

impl Language {
    pub const ALL: [Language; 7] = [
        Language::Python,
        Language::JavaScript,
        Language::TypeScript,
        Language::Cpp,
        Language::Java,
        Language::Go,
        Language::Rust,
    ];

    /// Source file extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Language::Python => "py",
            Language::JavaScript => "js",
            Language::TypeScript => "ts",
            Language::Cpp => "cpp",
            Language::Java => "java",
            Language::Go => "go",
            Language::Rust => "rs",
        }
    }

    /// Human readable name used in messages ("C++ execution not implemented yet").
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::Python => "Python",
            Language::JavaScript => "JavaScript",
            Language::TypeScript => "TypeScript",
            Language::Cpp => "C++",
            Language::Java => "Java",
            Language::Go => "Go",
            Language::Rust => "Rust",
        }
    }

    /// Whether the engine ships an execution pipeline for this language.
    pub fn is_implemented(&self) -> bool {
        matches!(
            self,
            Language::Python | Language::JavaScript | Language::TypeScript | Language::Cpp
        )
    }

    /// Entry file the learner's submission is staged into.
    pub fn entry_file(&self) -> String {
        format!("entry.{}", self.extension())
    }

    /// Conventional test file name inside a kata directory.
    pub fn test_file(&self, hidden: bool) -> String {
        if hidden {
            format!("hidden_tests.{}", self.extension())
        } else {
            format!("tests.{}", self.extension())
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Cpp => "cpp",
            Language::Java => "java",
            Language::Go => "go",
            Language::Rust => "rust",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "py" | "python" | "python3" => Ok(Language::Python),
            "js" | "javascript" | "node" => Ok(Language::JavaScript),
            "ts" | "typescript" => Ok(Language::TypeScript),
            "cpp" | "c++" | "cxx" => Ok(Language::Cpp),
            "java" => Ok(Language::Java),
            "go" | "golang" => Ok(Language::Go),
            "rs" | "rust" => Ok(Language::Rust),
            _ => Err(format!("Unsupported language: {}", s)),
        }
    }
}

/// Outcome of a single assertion-level test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<Value>,
}

impl TestResult {
    pub fn passed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            message: Some("Test passed".to_string()),
            expected: None,
            actual: None,
        }
    }

    pub fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            message: Some(message.into()),
            expected: None,
            actual: None,
        }
    }

    pub fn with_values(mut self, expected: impl Into<Value>, actual: impl Into<Value>) -> Self {
        self.expected = Some(expected.into());
        self.actual = Some(actual.into());
        self
    }
}

/// Result of one pipeline invocation (one language, one test file, one budget).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub errors: String,
    #[serde(default)]
    pub test_results: Vec<TestResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Wall-clock duration in milliseconds
    #[serde(default)]
    pub duration: u64,
}

impl ExecutionResult {
    /// Infrastructure or setup failure with no test results.
    pub fn failure(errors: impl Into<String>, duration: u64) -> Self {
        Self {
            success: false,
            output: String::new(),
            errors: errors.into(),
            test_results: Vec::new(),
            score: None,
            duration,
        }
    }

    pub fn passed_count(&self) -> usize {
        self.test_results.iter().filter(|t| t.passed).count()
    }

    pub fn total_count(&self) -> usize {
        self.test_results.len()
    }

    /// Stored score, or `100 * passed / total` when none was stored.
    /// An empty result set scores 0.
    pub fn derived_score(&self) -> f64 {
        self.score.unwrap_or_else(|| {
            let total = self.total_count();
            if total == 0 {
                0.0
            } else {
                100.0 * self.passed_count() as f64 / total as f64
            }
        })
    }
}

/// Weights and threshold for combining public and hidden runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoringConfig {
    pub public_weight: f64,
    pub hidden_weight: f64,
    pub passing_threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            public_weight: 0.3,
            hidden_weight: 0.7,
            passing_threshold: 70.0,
        }
    }
}

/// Public and hidden runs folded into one verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedExecutionResult {
    #[serde(flatten)]
    pub result: ExecutionResult,
    pub public_results: ExecutionResult,
    pub hidden_results: ExecutionResult,
    pub final_score: f64,
    pub passed: bool,
}

/// Condensed view of a combined result for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringSummary {
    pub public_score: f64,
    pub hidden_score: f64,
    pub final_score: f64,
    pub passed: bool,
    pub public_passed: usize,
    pub public_total: usize,
    pub hidden_passed: usize,
    pub hidden_total: usize,
    pub passing_threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    Syntax,
    Type,
    Compilation,
    ToolchainMissing,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationWarningKind {
    Style,
    Deprecated,
    BestPractice,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    #[serde(rename = "type")]
    pub kind: ValidationErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationWarning {
    #[serde(rename = "type")]
    pub kind: ValidationWarningKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntaxCheckResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    pub suggestions: Vec<String>,
}
