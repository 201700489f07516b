//! Plain-text stdin/stdout case files used by compiled-language katas.
//!
//! ```text
//! 5
//! 3
//! ===
//! 8
//! ---
//! 10 20
//! ===
//! 30
//! ```
//!
//! `---` separates cases, `===` separates a case's input from its expected
//! output. Blocks without `===` are ignored.

pub const CASE_DELIMITER: &str = "---";
pub const IO_DELIMITER: &str = "===";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseSpec {
    /// 1-based position in the file
    pub index: usize,
    pub input: String,
    pub expected_output: String,
}

impl CaseSpec {
    pub fn name(&self) -> String {
        format!("test_case_{}", self.index)
    }
}

pub fn parse_cases(source: &str) -> Vec<CaseSpec> {
    let normalized = source.replace("\r\n", "\n");
    let mut blocks: Vec<Vec<&str>> = vec![Vec::new()];
    for line in normalized.lines() {
        if line.trim() == CASE_DELIMITER {
            blocks.push(Vec::new());
        } else if let Some(block) = blocks.last_mut() {
            block.push(line);
        }
    }

    let mut cases = Vec::new();
    for block in blocks {
        let Some(split) = block.iter().position(|l| l.trim() == IO_DELIMITER) else {
            continue;
        };
        cases.push(CaseSpec {
            index: cases.len() + 1,
            input: join_block(&block[..split], true),
            expected_output: join_block(&block[split + 1..], false),
        });
    }
    cases
}

/// Drop surrounding blank lines. Input keeps a trailing newline so programs
/// reading whole lines see a terminated last line.
fn join_block(lines: &[&str], trailing_newline: bool) -> String {
    let start = lines.iter().position(|l| !l.trim().is_empty());
    let end = lines.iter().rposition(|l| !l.trim().is_empty());
    match (start, end) {
        (Some(start), Some(end)) => {
            let mut text = lines[start..=end].join("\n");
            if trailing_newline {
                text.push('\n');
            }
            text
        }
        _ => String::new(),
    }
}

/// Compare program output with the expected block.
/// Both sides are trimmed and CRLF-normalised; internal whitespace and case matter.
pub fn outputs_match(actual: &str, expected: &str) -> bool {
    normalize_output(actual) == normalize_output(expected)
}

pub fn normalize_output(output: &str) -> String {
    output.replace("\r\n", "\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_two_cases() {
        let source = "5\n3\n===\n8\n---\n10 20\n===\n30\n";
        let cases = parse_cases(source);

        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].input, "5\n3\n");
        assert_eq!(cases[0].expected_output, "8");
        assert_eq!(cases[1].name(), "test_case_2");
        assert_eq!(cases[1].input, "10 20\n");
        assert_eq!(cases[1].expected_output, "30");
    }

    #[test]
    fn test_multiline_expected_and_blank_padding() {
        let source = "\n3\n===\n1\n2\n3\n\n---\n";
        let cases = parse_cases(source);

        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].input, "3\n");
        assert_eq!(cases[0].expected_output, "1\n2\n3");
    }

    #[test]
    fn test_crlf_and_indented_delimiters() {
        let source = "1\r\n  ===  \r\n2\r\n --- \r\n4\r\n===\r\n5\r\n";
        let cases = parse_cases(source);
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].expected_output, "2");
    }

    #[test]
    fn test_blocks_without_io_delimiter_are_skipped() {
        let source = "just text\n---\n1\n===\n1\n";
        let cases = parse_cases(source);
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].index, 1);
    }

    #[test]
    fn test_no_delimiters_yields_no_cases() {
        assert!(parse_cases("int main() { return 0; }\n").is_empty());
        assert!(parse_cases("").is_empty());
    }

    #[test]
    fn test_empty_input_case() {
        let cases = parse_cases("===\nhello\n");
        assert_eq!(cases[0].input, "");
        assert_eq!(cases[0].expected_output, "hello");
    }

    #[test]
    fn test_outputs_match_normalization() {
        assert!(outputs_match("  8  \n", "8"));
        assert!(outputs_match("1\r\n2\r\n", "1\n2"));
        assert!(!outputs_match("Hello", "hello"));
        assert!(!outputs_match("1 2", "1  2"));
    }
}
