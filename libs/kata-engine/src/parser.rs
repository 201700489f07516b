/// Output Parser - Raw Tool Output → Test Results
///
/// **Core Responsibility:**
/// Turn the stdout/stderr of a test file run into named pass/fail results.
///
/// **Recognition Strategies:**
/// - Success path: clean exit plus an `All ... tests passed!` marker on stdout.
///   The marker carries no count, so tests are counted from `test_*`
///   definitions in the test source, then from `test_*(` calls in the output,
///   then a default count.
/// - Failure path: test files abort on the first uncaught error, so exactly one
///   failing test is reported and every other slot is marked as not executed.
///
/// The marker and naming conventions are a compatibility contract with existing
/// kata test files. Scraping human-readable text is fragile; a line-delimited
/// machine-readable report from the harness would be sturdier, but the marker
/// must stay as long as test files print it.

use crate::runner::is_timeout_marker;
use kata_common::types::{Language, TestResult};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Tests assumed when neither the source nor the output reveal a count
pub const DEFAULT_TEST_COUNT: usize = 1;
pub const UNKNOWN_TEST: &str = "unknown_test";
pub const DEFAULT_FAILURE_MESSAGE: &str = "Test failed";
pub const NOT_EXECUTED_MESSAGE: &str = "Test not executed due to earlier failure";

static SUCCESS_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"All (?:[\w-]+ )*tests passed!").unwrap());

static PY_TEST_DEF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(?:async\s+)?def\s+(test_\w+)\s*\(").unwrap());

static JS_TEST_FUNCTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)\bfunction\s+(test_\w+)\s*[(<]").unwrap());

static JS_TEST_BINDING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)\b(?:const|let|var)\s+(test_\w+)\s*(?::[^=]+)?=").unwrap());

static TEST_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(test_\w+)\s*\(").unwrap());

/// Python `in test_x` frames and Node `at test_x` / `at Object.test_x` frames
static TEST_FRAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:in|at)\s+(?:Object\.)?(test_\w+)\b").unwrap());

static PY_DIAGNOSTIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.]*(?:Error|Exception|Exit|Interrupt)\b(?::.*)?$").unwrap());

static NODE_DIAGNOSTIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:Uncaught\s+)?\w*(?:Error|Exception)(?:\s*\[\w+\])?:\s*.*$").unwrap()
});

static EXPECTED_GOT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)expected:?\s*(.+?),?\s+(?:but\s+)?(?:got|actual:?|received:?)\s*(.+)$").unwrap()
});

static NODE_ACTUAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*actual:\s*(.+?),?\s*$").unwrap());

static NODE_EXPECTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*expected:\s*(.+?),?\s*$").unwrap());

/// Which toolchain produced the output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFamily {
    Python,
    /// Node running JavaScript or compiled TypeScript
    Node,
}

impl OutputFamily {
    pub fn for_language(language: Language) -> Option<Self> {
        match language {
            Language::Python => Some(OutputFamily::Python),
            Language::JavaScript | Language::TypeScript => Some(OutputFamily::Node),
            _ => None,
        }
    }
}

pub fn has_success_marker(stdout: &str) -> bool {
    SUCCESS_MARKER.is_match(stdout)
}

/// Build test results from one run of a test file.
pub fn parse_output(
    family: OutputFamily,
    exit_ok: bool,
    stdout: &str,
    stderr: &str,
    test_source: &str,
) -> Vec<TestResult> {
    let output = format!("{}\n{}", stdout, stderr);
    let names = estimate_tests(family, test_source, &output);

    if exit_ok && has_success_marker(stdout) {
        return names.into_iter().map(TestResult::passed).collect();
    }

    let failing = failing_test_name(stderr, stdout).unwrap_or_else(|| UNKNOWN_TEST.to_string());
    let message = if is_timeout_marker(stderr) {
        "Execution timed out".to_string()
    } else {
        failure_message(family, stderr, stdout)
            .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string())
    };

    let mut failed = TestResult::failed(failing.clone(), message.clone());
    if let Some((expected, actual)) = extract_values(&message, &output) {
        failed = failed.with_values(expected, actual);
    }

    let mut results = vec![failed];
    let remaining = names.len().saturating_sub(1);
    let mut others: Vec<String> = names
        .into_iter()
        .filter(|name| *name != failing)
        .take(remaining)
        .collect();
    while others.len() < remaining {
        others.push(format!("test_{}", others.len() + 2));
    }
    results.extend(
        others
            .into_iter()
            .map(|name| TestResult::failed(name, NOT_EXECUTED_MESSAGE)),
    );

    results
}

/// `100 * passed / total`, or `None` for an empty result set
pub fn score_of(results: &[TestResult]) -> Option<f64> {
    if results.is_empty() {
        return None;
    }
    let passed = results.iter().filter(|r| r.passed).count();
    Some(100.0 * passed as f64 / results.len() as f64)
}

/// Test names defined in the test source, in order of appearance
pub fn discover_test_names(family: OutputFamily, source: &str) -> Vec<String> {
    let mut found: Vec<(usize, String)> = match family {
        OutputFamily::Python => captures_with_offsets(&PY_TEST_DEF, source),
        OutputFamily::Node => {
            let mut all = captures_with_offsets(&JS_TEST_FUNCTION, source);
            all.extend(captures_with_offsets(&JS_TEST_BINDING, source));
            all
        }
    };
    found.sort_by_key(|(offset, _)| *offset);
    dedup_in_order(found.into_iter().map(|(_, name)| name))
}

fn captures_with_offsets(re: &Regex, text: &str) -> Vec<(usize, String)> {
    re.captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| (m.start(), m.as_str().to_string()))
        .collect()
}

fn dedup_in_order(names: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = Vec::new();
    for name in names {
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

fn estimate_tests(family: OutputFamily, source: &str, output: &str) -> Vec<String> {
    let defined = discover_test_names(family, source);
    if !defined.is_empty() {
        return defined;
    }

    let called = dedup_in_order(
        TEST_CALL
            .captures_iter(output)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().to_string()),
    );
    if !called.is_empty() {
        return called;
    }

    (1..=DEFAULT_TEST_COUNT).map(|i| format!("test_{}", i)).collect()
}

/// Name of the test that was running when the file aborted.
/// Stack frames win over bare calls; stderr is searched before stdout.
fn failing_test_name(stderr: &str, stdout: &str) -> Option<String> {
    for re in [&*TEST_FRAME, &*TEST_CALL] {
        for text in [stderr, stdout] {
            if let Some(name) = re.captures(text).and_then(|c| c.get(1)) {
                return Some(name.as_str().to_string());
            }
        }
    }
    None
}

fn failure_message(family: OutputFamily, stderr: &str, stdout: &str) -> Option<String> {
    let lines = || {
        stderr
            .lines()
            .chain(stdout.lines())
            .map(str::trim)
            .filter(|l| !l.is_empty())
    };

    match family {
        // Python prints the exception last, after the traceback
        OutputFamily::Python => lines()
            .filter(|l| PY_DIAGNOSTIC.is_match(l))
            .last()
            .map(str::to_string),
        // Node prints the error first, followed by the stack
        OutputFamily::Node => lines()
            .find(|l| NODE_DIAGNOSTIC.is_match(l))
            .map(str::to_string),
    }
}

fn extract_values(message: &str, output: &str) -> Option<(Value, Value)> {
    if let Some(caps) = EXPECTED_GOT.captures(message) {
        return Some((to_value(&caps[1]), to_value(&caps[2])));
    }

    let actual = NODE_ACTUAL.captures(output)?;
    let expected = NODE_EXPECTED.captures(output)?;
    Some((to_value(&expected[1]), to_value(&actual[1])))
}

fn to_value(raw: &str) -> Value {
    let raw = raw.trim();
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        return value;
    }
    let unquoted = raw
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(raw);
    Value::String(unquoted.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PY_SOURCE: &str = r#"
from entry import your_function

def test_basic_case():
    assert your_function("a") == "b"

def test_edge_case():
    result = your_function("edge_input")
    expected = "edge_output"
    assert result == expected, f"Expected {expected}, got {result}"

def test_another_case():
    pass

if __name__ == "__main__":
    test_basic_case()
    test_edge_case()
    test_another_case()
    print("All public tests passed!")
"#;

    const JS_SOURCE: &str = r#"
const { add } = require('./entry');
const assert = require('assert');

function test_adds_numbers() {
    assert.strictEqual(add(1, 2), 3);
}

const test_handles_zero = () => {
    assert.strictEqual(add(0, 0), 0);
};

test_adds_numbers();
test_handles_zero();
console.log("All tests passed!");
"#;

    #[test]
    fn test_success_marker_variants() {
        assert!(has_success_marker("All tests passed!"));
        assert!(has_success_marker("All public tests passed!\n"));
        assert!(has_success_marker("All hidden tests passed!"));
        assert!(has_success_marker("All 5 tests passed!"));
        assert!(!has_success_marker("Some tests passed"));
        assert!(!has_success_marker("all tests passed"));
    }

    #[test]
    fn test_discovers_python_definitions() {
        let names = discover_test_names(OutputFamily::Python, PY_SOURCE);
        assert_eq!(names, vec!["test_basic_case", "test_edge_case", "test_another_case"]);
    }

    #[test]
    fn test_discovers_js_functions_and_bindings() {
        let names = discover_test_names(OutputFamily::Node, JS_SOURCE);
        assert_eq!(names, vec!["test_adds_numbers", "test_handles_zero"]);
    }

    #[test]
    fn test_python_all_pass() {
        let results = parse_output(
            OutputFamily::Python,
            true,
            "All public tests passed!\n",
            "",
            PY_SOURCE,
        );

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.passed));
        assert_eq!(results[0].name, "test_basic_case");
        assert_eq!(results[0].message.as_deref(), Some("Test passed"));
        assert_eq!(score_of(&results), Some(100.0));
    }

    #[test]
    fn test_success_count_falls_back_to_output_calls() {
        let stdout = "test_one() ok\ntest_two() ok\nAll tests passed!\n";
        let results = parse_output(OutputFamily::Node, true, stdout, "", "// no definitions");

        assert_eq!(results.len(), 2);
        assert_eq!(results[1].name, "test_two");
    }

    #[test]
    fn test_success_count_defaults() {
        let results = parse_output(OutputFamily::Node, true, "All tests passed!", "", "");
        assert_eq!(results.len(), DEFAULT_TEST_COUNT);
        assert!(results[0].passed);
    }

    #[test]
    fn test_marker_without_clean_exit_is_failure() {
        let results = parse_output(OutputFamily::Python, false, "All tests passed!", "", PY_SOURCE);
        assert!(!results[0].passed);
    }

    #[test]
    fn test_python_assertion_failure() {
        let stderr = r#"Traceback (most recent call last):
  File "/tmp/kata-run-x/tests.py", line 17, in <module>
    test_edge_case()
  File "/tmp/kata-run-x/tests.py", line 10, in test_edge_case
    assert result == expected, f"Expected {expected}, got {result}"
AssertionError: Expected edge_output, got wrong
"#;
        let results = parse_output(OutputFamily::Python, false, "", stderr, PY_SOURCE);

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].name, "test_edge_case");
        assert!(!results[0].passed);
        assert_eq!(
            results[0].message.as_deref(),
            Some("AssertionError: Expected edge_output, got wrong")
        );
        assert_eq!(results[0].expected, Some(json!("edge_output")));
        assert_eq!(results[0].actual, Some(json!("wrong")));

        assert_eq!(results[1].name, "test_basic_case");
        assert_eq!(results[1].message.as_deref(), Some(NOT_EXECUTED_MESSAGE));
        assert_eq!(results[2].name, "test_another_case");
        assert_eq!(score_of(&results), Some(0.0));
    }

    #[test]
    fn test_python_import_error_has_unknown_test() {
        let stderr = r#"Traceback (most recent call last):
  File "/tmp/kata-run-x/tests.py", line 2, in <module>
    from entry import your_function
ImportError: cannot import name 'your_function' from 'entry'
"#;
        let results = parse_output(OutputFamily::Python, false, "", stderr, PY_SOURCE);

        assert_eq!(results[0].name, UNKNOWN_TEST);
        assert!(results[0].message.as_deref().unwrap().starts_with("ImportError"));
        // unknown_test plus two of the three discovered names
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn test_python_dotted_exception_name() {
        let stderr = r#"Traceback (most recent call last):
  File "/tmp/kata-run-x/tests.py", line 9, in test_edge_case
    result = your_function("edge_input")
  File "/usr/lib/python3.12/json/decoder.py", line 355, in raw_decode
    raise JSONDecodeError("Expecting value", s, err.value) from None
json.decoder.JSONDecodeError: Expecting value: line 1 column 1 (char 0)
"#;
        let results = parse_output(OutputFamily::Python, false, "", stderr, PY_SOURCE);

        let failed = results.iter().find(|r| !r.passed).unwrap();
        assert_eq!(
            failed.message.as_deref(),
            Some("json.decoder.JSONDecodeError: Expecting value: line 1 column 1 (char 0)")
        );
    }

    #[test]
    fn test_output_family_for_language() {
        assert_eq!(OutputFamily::for_language(Language::Python), Some(OutputFamily::Python));
        assert_eq!(OutputFamily::for_language(Language::TypeScript), Some(OutputFamily::Node));
        assert_eq!(OutputFamily::for_language(Language::Cpp), None);
    }

    #[test]
    fn test_node_assertion_dump() {
        let stderr = r#"node:assert:124
  throw new AssertionError(obj);
  ^

AssertionError [ERR_ASSERTION]: Expected values to be strictly equal:

4 !== 3

    at test_adds_numbers (/tmp/kata-run-x/tests.js:6:12)
    at Object.<anonymous> (/tmp/kata-run-x/tests.js:13:1) {
  generatedMessage: true,
  code: 'ERR_ASSERTION',
  actual: 4,
  expected: 3,
  operator: 'strictEqual'
}
"#;
        let results = parse_output(OutputFamily::Node, false, "", stderr, JS_SOURCE);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name, "test_adds_numbers");
        assert_eq!(
            results[0].message.as_deref(),
            Some("AssertionError [ERR_ASSERTION]: Expected values to be strictly equal:")
        );
        assert_eq!(results[0].expected, Some(json!(3)));
        assert_eq!(results[0].actual, Some(json!(4)));
        assert_eq!(results[1].name, "test_handles_zero");
    }

    #[test]
    fn test_node_reference_error() {
        let stderr = "ReferenceError: add is not defined\n    at test_handles_zero (/tmp/tests.js:10:5)\n";
        let results = parse_output(OutputFamily::Node, false, "", stderr, JS_SOURCE);

        assert_eq!(results[0].name, "test_handles_zero");
        assert_eq!(results[0].message.as_deref(), Some("ReferenceError: add is not defined"));
        assert!(results[0].expected.is_none());
    }

    #[test]
    fn test_timeout_message() {
        let stderr = "\n[Execution timed out after 1000ms]";
        let results = parse_output(OutputFamily::Python, false, "", stderr, "");

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, UNKNOWN_TEST);
        assert_eq!(results[0].message.as_deref(), Some("Execution timed out"));
    }

    #[test]
    fn test_silent_failure_uses_default_message() {
        let results = parse_output(OutputFamily::Node, false, "", "", "");
        assert_eq!(results[0].message.as_deref(), Some(DEFAULT_FAILURE_MESSAGE));
    }

    #[test]
    fn test_score_of() {
        assert_eq!(score_of(&[]), None);
        let results = vec![TestResult::passed("a"), TestResult::failed("b", "x")];
        assert_eq!(score_of(&results), Some(50.0));
    }

    #[test]
    fn test_value_conversion() {
        assert_eq!(to_value("3"), json!(3));
        assert_eq!(to_value("'abc'"), json!("abc"));
        assert_eq!(to_value("[1, 2]"), json!([1, 2]));
        assert_eq!(to_value("plain text"), json!("plain text"));
    }
}
