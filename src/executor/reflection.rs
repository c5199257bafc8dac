//! Reflection engine: static checks run over a losing or slow attempt,
//! producing a critique prompt for a single low-temperature retry.
//!
//! Grounded on the teacher's feedback-parsing style in the evaluator
//! boundary (fixed failure tokens the core matches on), generalised here
//! to a small rule-based critic over code text and evaluator feedback.

use std::time::Duration;

use crate::external::EvalResult;

const REFLECTION_ELAPSED_THRESHOLD: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Issue {
    MissingInputParsing,
    EdgeCaseRisk,
    OutputFormat,
    OffByOne,
    FeedbackError(FeedbackClass),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackClass {
    Syntax,
    Timeout,
    Runtime,
    Index,
    Name,
    Value,
}

impl Issue {
    fn describe(self) -> &'static str {
        match self {
            Issue::MissingInputParsing => "the function never reads from stdin; it must parse its own input",
            Issue::EdgeCaseRisk => "watch empty input, single-element, and boundary-value cases",
            Issue::OutputFormat => "match the exact output format (whitespace, trailing newline, case)",
            Issue::OffByOne => "double-check loop bounds and index arithmetic for off-by-one errors",
            Issue::FeedbackError(FeedbackClass::Syntax) => "the previous attempt had a syntax error; re-check indentation and parentheses",
            Issue::FeedbackError(FeedbackClass::Timeout) => "the previous attempt timed out; use an asymptotically faster approach",
            Issue::FeedbackError(FeedbackClass::Runtime) => "the previous attempt raised an exception at runtime",
            Issue::FeedbackError(FeedbackClass::Index) => "the previous attempt hit an index error; re-check bounds",
            Issue::FeedbackError(FeedbackClass::Name) => "the previous attempt referenced an undefined name",
            Issue::FeedbackError(FeedbackClass::Value) => "the previous attempt raised a value error on its input",
        }
    }
}

/// Whether this attempt's elapsed time, score, or attempt index qualifies
/// it for a reflection pass, per §4.4 step 9g.
#[must_use]
pub fn should_reflect(elapsed: Duration, score: f32, attempt_index: usize, failed: bool) -> bool {
    elapsed > REFLECTION_ELAPSED_THRESHOLD || (score > 0.0 && score < 1.0) || (attempt_index >= 2 && failed)
}

fn feedback_class(feedback: &str) -> Option<FeedbackClass> {
    let lower = feedback.to_lowercase();
    if lower.contains("syntax") {
        Some(FeedbackClass::Syntax)
    } else if lower.contains("timeout") {
        Some(FeedbackClass::Timeout)
    } else if lower.contains("index") {
        Some(FeedbackClass::Index)
    } else if lower.contains("name") {
        Some(FeedbackClass::Name)
    } else if lower.contains("value") {
        Some(FeedbackClass::Value)
    } else if lower.contains("runtime") {
        Some(FeedbackClass::Runtime)
    } else {
        None
    }
}

/// Run the static checks described in §4.4 step 9g over `code` and the
/// evaluator's `result`.
#[must_use]
pub fn diagnose(code: &str, result: &EvalResult) -> Vec<Issue> {
    let mut issues = Vec::new();

    let reads_stdin = code.contains("input(") || code.contains("sys.stdin") || code.contains("stdin.read");
    if !reads_stdin {
        issues.push(Issue::MissingInputParsing);
    }

    if !code.contains("if") && !code.contains("len(") {
        issues.push(Issue::EdgeCaseRisk);
    }

    if result.score < 1.0 && (code.contains("print(") && code.matches("print(").count() > 3) {
        issues.push(Issue::OutputFormat);
    }

    if code.contains("range(len(") && (code.contains("+ 1") || code.contains("- 1")) {
        issues.push(Issue::OffByOne);
    }

    if let Some(class) = feedback_class(&result.feedback) {
        issues.push(Issue::FeedbackError(class));
    }

    issues
}

/// Build a critique prompt embedding the mental-trace instructions
/// referenced in §4.4: walk through the failing case step by step before
/// emitting new code.
#[must_use]
pub fn critique_prompt(task_title: &str, previous_code: &str, feedback: &str, issues: &[Issue]) -> String {
    let mut prompt = format!(
        "Your previous solution for \"{task_title}\" did not pass all tests.\n\n\
         Previous code:\n```python\n{previous_code}\n```\n\n\
         Evaluator feedback: {feedback}\n\n\
         Before writing new code, trace through the smallest failing case \
         step by step, one line at a time, and state what each line's \
         variables hold.\n\n"
    );
    if !issues.is_empty() {
        prompt.push_str("Known issues to address:\n");
        for issue in issues {
            prompt.push_str(&format!("- {}\n", issue.describe()));
        }
    }
    prompt.push_str("\nThen provide corrected code in a fenced python block.");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(score: f32, feedback: &str) -> EvalResult {
        EvalResult {
            passed: 0,
            total: 3,
            score,
            feedback: feedback.to_string(),
            execution_time_ms: 1.0,
        }
    }

    #[test]
    fn slow_attempt_should_reflect() {
        assert!(should_reflect(Duration::from_secs(11), 1.0, 0, false));
    }

    #[test]
    fn fast_perfect_first_attempt_should_not_reflect() {
        assert!(!should_reflect(Duration::from_millis(200), 1.0, 0, false));
    }

    #[test]
    fn partial_score_should_reflect() {
        assert!(should_reflect(Duration::from_millis(200), 0.5, 0, false));
    }

    #[test]
    fn missing_stdin_read_is_flagged() {
        let code = "def f(a, b): return a + b";
        let issues = diagnose(code, &result(0.0, "runtime error"));
        assert!(issues.contains(&Issue::MissingInputParsing));
    }

    #[test]
    fn feedback_token_maps_to_issue() {
        let code = "a = int(input())\nprint(a)";
        let issues = diagnose(code, &result(0.5, "index out of range on case 2"));
        assert!(issues.contains(&Issue::FeedbackError(FeedbackClass::Index)));
    }

    #[test]
    fn critique_prompt_embeds_trace_instruction_and_issues() {
        let prompt = critique_prompt("sum two numbers", "print(1)", "index error", &[Issue::MissingInputParsing]);
        assert!(prompt.contains("trace through"));
        assert!(prompt.contains("stdin"));
    }
}
