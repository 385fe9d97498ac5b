//! Failure Digest Extraction
//!
//! Turns raw test-runner output into a compact [`FailureDigest`]. Pure and
//! total: malformed output degrades to placeholder fields, it never errors,
//! so a broken parse can't take down the watch loop.
//!
//! Recognised shapes:
//!
//! ```text
//! unittest   FAIL: test_x (tests.test_mission.TestMission.test_x)
//!            File "/kata/tests/test_mission.py", line 12, in test_x
//! pytest     FAILED tests/test_mission.py::test_x - AssertionError
//!            tests/test_mission.py:12: AssertionError
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::util::constants::{SNIPPET_MAX_CHARS, SNIPPET_MAX_LINES};
use crate::util::summarize_failure_output;

/// Placeholder name when no failure marker is found
pub const UNKNOWN_TEST: &str = "unknown";

/// `FAIL: name (dotted.id)` / `ERROR: name (dotted.id)` / `FAILED node::id - msg`
static FAILURE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:FAIL:|ERROR:|FAILED)\s+(?P<name>[^\s(]\S*)(?:\s+\((?P<id>[^)]+)\))?").unwrap()
});

/// `path/to/file.py:12:` (pytest short traceback)
static PATH_LINE_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<path>[^\s:]+\.\w+):(?P<line>\d+):").unwrap());

/// Compact summary of one failing run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureDigest {
    pub test_name: String,
    /// First "file, line" reference, or the first output line
    pub location: String,
    /// First few non-empty lines of output, bounded
    pub snippet: String,
    /// Fully qualified id when the runner prints one (rerun target)
    pub test_id: Option<String>,
}

impl FailureDigest {
    /// Digest for a single-test rerun whose output yielded nothing useful
    pub fn for_test(name: &str) -> Self {
        Self {
            test_name: name.to_string(),
            location: String::new(),
            snippet: String::new(),
            test_id: Some(name.to_string()),
        }
    }

    /// De-duplication key: name + location.
    ///
    /// Two different assertion failures at the same call site share a key.
    pub fn signature(&self) -> String {
        format!("{}{}", self.test_name, self.location)
    }

    /// Best target for rerunning just this test
    pub fn rerun_target(&self) -> Option<&str> {
        self.test_id
            .as_deref()
            .or((self.test_name != UNKNOWN_TEST).then_some(self.test_name.as_str()))
    }

    pub fn is_placeholder(&self) -> bool {
        self.test_name == UNKNOWN_TEST
    }
}

/// Extract a digest from combined test output.
pub fn extract_failure_digest(output: &str) -> FailureDigest {
    let lines: Vec<&str> = output.lines().collect();

    let (test_name, test_id) = lines
        .iter()
        .find_map(|line| parse_failure_marker(line))
        .unwrap_or_else(|| (UNKNOWN_TEST.to_string(), None));

    let location = lines
        .iter()
        .find_map(|line| parse_location(line))
        .or_else(|| lines.first().map(|l| l.trim().to_string()))
        .unwrap_or_default();

    FailureDigest {
        test_name,
        location,
        snippet: summarize_failure_output(output, SNIPPET_MAX_LINES, SNIPPET_MAX_CHARS),
        test_id,
    }
}

fn parse_failure_marker(line: &str) -> Option<(String, Option<String>)> {
    let caps = FAILURE_MARKER.captures(line)?;
    let raw = caps.name("name")?.as_str();

    // pytest node ids: tests/test_a.py::TestA::test_x
    if let Some((_, leaf)) = raw.rsplit_once("::") {
        return Some((leaf.to_string(), Some(raw.to_string())));
    }

    let id = caps.name("id").map(|m| m.as_str().to_string());
    Some((raw.to_string(), id))
}

fn parse_location(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.starts_with("File ") && trimmed.contains(", line ") {
        return Some(trimmed.to_string());
    }
    PATH_LINE_REF
        .captures(trimmed)
        .map(|caps| format!("{}:{}", &caps["path"], &caps["line"]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const UNITTEST_FAILURE: &str = "\
F.
======================================================================
FAIL: test_adds_numbers (tests.test_mission.TestMission.test_adds_numbers)
----------------------------------------------------------------------
Traceback (most recent call last):
  File \"/home/dev/dojo/sum/tests/test_mission.py\", line 9, in test_adds_numbers
    self.assertEqual(add(2, 2), 4)
AssertionError: 5 != 4

----------------------------------------------------------------------
Ran 2 tests in 0.001s

FAILED (failures=1)
";

    const PYTEST_FAILURE: &str = "\
============================= test session starts ==============================
collected 3 items

tests/test_main.py ..F                                                   [100%]

tests/test_main.py:14: AssertionError
=========================== short test summary info ============================
FAILED tests/test_main.py::test_empty_list - AssertionError: assert None == 0
";

    #[test]
    fn test_unittest_output() {
        let digest = extract_failure_digest(UNITTEST_FAILURE);
        assert_eq!(digest.test_name, "test_adds_numbers");
        assert_eq!(
            digest.test_id.as_deref(),
            Some("tests.test_mission.TestMission.test_adds_numbers")
        );
        assert_eq!(
            digest.location,
            "File \"/home/dev/dojo/sum/tests/test_mission.py\", line 9, in test_adds_numbers"
        );
        assert!(digest.snippet.starts_with("F."));
        assert!(digest.snippet.contains("more lines truncated"));
    }

    #[test]
    fn test_snippet_stays_within_bounds() {
        let digest = extract_failure_digest(UNITTEST_FAILURE);
        assert_eq!(digest.snippet.lines().count(), SNIPPET_MAX_LINES);
        assert!(digest.snippet.lines().all(|l| !l.trim().is_empty()));

        let wide = format!("FAIL: test_x ... {}\n", "e".repeat(2000));
        let snippet = extract_failure_digest(&wide).snippet;
        assert!(snippet.chars().count() <= SNIPPET_MAX_CHARS);
        assert!(snippet.ends_with("... (truncated)"));
    }

    #[test]
    fn test_pytest_output() {
        let digest = extract_failure_digest(PYTEST_FAILURE);
        assert_eq!(digest.test_name, "test_empty_list");
        assert_eq!(
            digest.test_id.as_deref(),
            Some("tests/test_main.py::test_empty_list")
        );
        assert_eq!(digest.location, "tests/test_main.py:14");
    }

    #[test]
    fn test_inline_marker_takes_first_token() {
        let digest = extract_failure_digest("FAIL: test_x ... AssertionError\n");
        assert_eq!(digest.test_name, "test_x");
        assert_eq!(digest.test_id, None);
        assert_eq!(digest.location, "FAIL: test_x ... AssertionError");
    }

    #[test]
    fn test_error_marker() {
        let digest = extract_failure_digest("ERROR: test_import (tests.test_smoke.T.test_import)\n");
        assert_eq!(digest.test_name, "test_import");
        assert_eq!(digest.rerun_target(), Some("tests.test_smoke.T.test_import"));
    }

    #[test]
    fn test_summary_line_is_not_a_test_name() {
        let digest = extract_failure_digest("Ran 1 test in 0.001s\n\nFAILED (errors=1)\n");
        assert!(digest.is_placeholder());
    }

    #[test]
    fn test_garbage_degrades_to_placeholders() {
        let digest = extract_failure_digest("Segmentation fault (core dumped)\nmore noise");
        assert!(digest.is_placeholder());
        assert_eq!(digest.location, "Segmentation fault (core dumped)");
        assert_eq!(digest.rerun_target(), None);
    }

    #[test]
    fn test_empty_output() {
        let digest = extract_failure_digest("");
        assert_eq!(digest.test_name, UNKNOWN_TEST);
        assert_eq!(digest.location, "");
        assert_eq!(digest.snippet, "");
    }

    #[test]
    fn test_signature_is_name_plus_location() {
        let a = extract_failure_digest(UNITTEST_FAILURE);
        let b = extract_failure_digest(&UNITTEST_FAILURE.replace("5 != 4", "6 != 4"));
        // Different assertion message, same call site
        assert_eq!(a.signature(), b.signature());
        assert!(a.signature().starts_with("test_adds_numbers"));
    }

    #[test]
    fn test_for_test_uses_run_identifier() {
        let digest = FailureDigest::for_test("tests.test_mission.T.test_x");
        assert_eq!(digest.signature(), "tests.test_mission.T.test_x");
        assert_eq!(digest.rerun_target(), Some("tests.test_mission.T.test_x"));
    }
}
