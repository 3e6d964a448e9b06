// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Convert `<testcase>` elements into [`TestCase`] records.

use crate::{
    document::Element,
    model::{NonSuccessKind, StatusDetail, TestCase, TestCaseStatus},
};
use camino::Utf8PathBuf;
use std::time::Duration;

/// The tag name of a single test case.
pub static TESTCASE_TAG: &str = "testcase";
static FAILURE_TAG: &str = "failure";
static ERROR_TAG: &str = "error";
static SKIPPED_TAG: &str = "skipped";

impl TestCase {
    /// Builds a test case from a `<testcase>` element.
    ///
    /// The status is taken from a `<failure>`, `<error>` or `<skipped>` child if one is present,
    /// otherwise from a `status` attribute, otherwise the test is considered to have passed.
    /// A missing or unreadable `time` attribute is recorded as zero.
    pub fn from_element(
        suite: impl Into<String>,
        element: &Element,
        source: impl Into<Utf8PathBuf>,
    ) -> Self {
        let name = element.attribute("name").unwrap_or_default();
        let mut testcase = TestCase::new(suite, name, status_from_element(element), source);
        if let Some(classname) = element.attribute("classname") {
            testcase.set_classname(classname);
        }
        if let Some(time) = element.attribute("time").and_then(parse_time) {
            testcase.set_time(time);
        }
        testcase
    }
}

fn status_from_element(element: &Element) -> TestCaseStatus {
    // Failures and errors take precedence over a skipped marker on the same test case.
    for (tag, kind) in [
        (FAILURE_TAG, NonSuccessKind::Failure),
        (ERROR_TAG, NonSuccessKind::Error),
    ] {
        if let Some(child) = element.child(tag) {
            return TestCaseStatus::NonSuccess {
                kind,
                detail: detail_from_element(child),
            };
        }
    }
    if let Some(child) = element.child(SKIPPED_TAG) {
        return TestCaseStatus::Skipped {
            detail: detail_from_element(child),
        };
    }

    match element
        .attribute("status")
        .map(|status| status.trim().to_ascii_lowercase())
        .as_deref()
    {
        Some("skipped" | "disabled" | "notrun" | "ignored") => TestCaseStatus::skipped(),
        Some("fail" | "failed" | "failure") => TestCaseStatus::non_success(NonSuccessKind::Failure),
        Some("error") => TestCaseStatus::non_success(NonSuccessKind::Error),
        _ => TestCaseStatus::success(),
    }
}

fn detail_from_element(element: &Element) -> StatusDetail {
    let text = element.text().trim();
    StatusDetail {
        message: element.attribute("message").map(str::to_owned),
        ty: element.attribute("type").map(str::to_owned),
        description: (!text.is_empty()).then(|| text.to_owned()),
    }
}

/// Parses a `time` attribute, in seconds.
///
/// Some emitters write thousands separators (`1,234.5`); these are tolerated. Negative and
/// non-finite values are rejected.
pub fn parse_time(time: &str) -> Option<Duration> {
    let cleaned: String = time.trim().chars().filter(|&c| c != ',').collect();
    let secs: f64 = cleaned.parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{document::Document, model::StatusKind};
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn testcases(xml: &str) -> Vec<TestCase> {
        let doc = Document::parse(xml).expect("document parses");
        doc.root()
            .descendants(TESTCASE_TAG)
            .map(|element| TestCase::from_element("suite", element, "results/a.xml"))
            .collect()
    }

    #[test]
    fn statuses_from_children() {
        let cases = testcases(indoc! {r#"
            <testsuite name="suite">
                <testcase name="passes" classname="pkg.Mod" time="0.25"/>
                <testcase name="fails">
                    <failure message="expected 1" type="AssertionError">at line 3</failure>
                </testcase>
                <testcase name="errors"><error message="NPE"/></testcase>
                <testcase name="skips"><skipped/></testcase>
                <testcase name="both"><skipped/><failure/></testcase>
            </testsuite>
        "#});

        let kinds: Vec<_> = cases.iter().map(|tc| tc.status.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                StatusKind::Passed,
                StatusKind::Failed,
                StatusKind::Failed,
                StatusKind::Skipped,
                StatusKind::Failed,
            ]
        );

        assert_eq!(cases[0].classname.as_deref(), Some("pkg.Mod"));
        assert_eq!(cases[0].time, Duration::from_millis(250));
        assert_eq!(cases[0].source.as_str(), "results/a.xml");
        assert_eq!(cases[0].suite, "suite");

        assert_eq!(
            cases[1].status,
            TestCaseStatus::NonSuccess {
                kind: NonSuccessKind::Failure,
                detail: StatusDetail {
                    message: Some("expected 1".to_owned()),
                    ty: Some("AssertionError".to_owned()),
                    description: Some("at line 3".to_owned()),
                },
            }
        );
        assert!(matches!(
            cases[2].status,
            TestCaseStatus::NonSuccess {
                kind: NonSuccessKind::Error,
                ..
            }
        ));
        assert_eq!(cases[2].status.message(), Some("NPE"));
        assert_eq!(cases[3].time, Duration::ZERO);
    }

    #[test_case("skipped", StatusKind::Skipped ; "skipped")]
    #[test_case("NotRun", StatusKind::Skipped ; "not run, mixed case")]
    #[test_case("failed", StatusKind::Failed ; "failed")]
    #[test_case("error", StatusKind::Failed ; "error")]
    #[test_case("run", StatusKind::Passed ; "run")]
    fn statuses_from_attribute(status: &str, expected: StatusKind) {
        let cases = testcases(&format!(r#"<testcase name="t" status="{status}"/>"#));
        assert_eq!(cases[0].status.kind(), expected);
    }

    #[test_case("1.5", Some(Duration::from_millis(1500)) ; "plain")]
    #[test_case(" 2 ", Some(Duration::from_secs(2)) ; "whitespace")]
    #[test_case("1,234.5", Some(Duration::from_millis(1_234_500)) ; "thousands separator")]
    #[test_case("-1", None ; "negative")]
    #[test_case("NaN", None ; "nan")]
    #[test_case("abc", None ; "garbage")]
    #[test_case("", None ; "empty")]
    fn time_parsing(input: &str, expected: Option<Duration>) {
        assert_eq!(parse_time(input), expected);
    }

    #[test]
    fn missing_name_is_empty() {
        let cases = testcases("<testcase/>");
        assert_eq!(cases[0].name, "");
        assert_eq!(cases[0].qualified_name(), "");
    }
}
