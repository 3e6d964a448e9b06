// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use std::{collections::BTreeSet, fmt, time::Duration};

/// A named collection of test results, originating from at most one result file.
#[derive(Clone, Debug)]
pub struct TestSuite {
    name: String,
    testcases: Vec<TestCase>,
    files: BTreeSet<Utf8PathBuf>,
    archive: Option<Utf8PathBuf>,
}

impl TestSuite {
    /// Creates a new, empty `TestSuite`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            testcases: Vec::new(),
            files: BTreeSet::new(),
            archive: None,
        }
    }

    /// The name of this suite, as declared by its result document.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Records the file this suite's data was read from, for diagnostics.
    pub fn set_archive(&mut self, archive: impl Into<Utf8PathBuf>) -> &mut Self {
        self.archive = Some(archive.into());
        self
    }

    /// The file this suite's data was read from, if any.
    pub fn archive(&self) -> Option<&Utf8Path> {
        self.archive.as_deref()
    }

    /// Records a file as having contributed test cases to this suite.
    pub fn add_file(&mut self, file: impl Into<Utf8PathBuf>) -> &mut Self {
        self.files.insert(file.into());
        self
    }

    /// The files that contributed test cases to this suite.
    pub fn files(&self) -> impl ExactSizeIterator<Item = &Utf8Path> {
        self.files.iter().map(|f| f.as_path())
    }

    /// The number of files that contributed test cases to this suite.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Appends a test case. Insertion order is preserved.
    pub fn add_testcase(&mut self, testcase: TestCase) -> &mut Self {
        self.testcases.push(testcase);
        self
    }

    /// Appends several test cases.
    pub fn add_testcases(&mut self, testcases: impl IntoIterator<Item = TestCase>) -> &mut Self {
        self.testcases.extend(testcases);
        self
    }

    /// All test cases, in the order they were added.
    pub fn testcases(&self) -> &[TestCase] {
        &self.testcases
    }

    /// Test cases of the given kind, in the order they were added.
    pub fn tests(&self, kind: StatusKind) -> impl Iterator<Item = &TestCase> {
        self.testcases
            .iter()
            .filter(move |testcase| testcase.status.kind() == kind)
    }

    /// The number of test cases of the given kind.
    pub fn count(&self, kind: StatusKind) -> usize {
        self.tests(kind).count()
    }

    /// The number of passing test cases.
    pub fn passed(&self) -> usize {
        self.count(StatusKind::Passed)
    }

    /// The number of failing test cases. Errors are counted as failures.
    pub fn failed(&self) -> usize {
        self.count(StatusKind::Failed)
    }

    /// The number of skipped test cases.
    pub fn skipped(&self) -> usize {
        self.count(StatusKind::Skipped)
    }

    /// Returns true if no test cases have been recorded.
    pub fn is_empty(&self) -> bool {
        self.testcases.is_empty()
    }

    /// The total number of test cases.
    pub fn len(&self) -> usize {
        self.testcases.len()
    }
}

/// A single test's result.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct TestCase {
    /// The name of the suite this test case was read into.
    pub suite: String,

    /// The name of the test case.
    pub name: String,

    /// The "classname" of the test case.
    ///
    /// Typically the fully qualified path to the test. `classname` + `name` together should
    /// uniquely identify a test.
    pub classname: Option<String>,

    /// The result of this test.
    pub status: TestCaseStatus,

    /// The time taken. Missing durations are recorded as zero.
    pub time: Duration,

    /// The result file this test case was read from.
    pub source: Utf8PathBuf,
}

impl TestCase {
    /// Creates a new test case.
    pub fn new(
        suite: impl Into<String>,
        name: impl Into<String>,
        status: TestCaseStatus,
        source: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self {
            suite: suite.into(),
            name: name.into(),
            classname: None,
            status,
            time: Duration::ZERO,
            source: source.into(),
        }
    }

    /// Sets the classname of the test.
    pub fn set_classname(&mut self, classname: impl Into<String>) -> &mut Self {
        self.classname = Some(classname.into());
        self
    }

    /// Sets the time taken by the test.
    pub fn set_time(&mut self, time: Duration) -> &mut Self {
        self.time = time;
        self
    }

    /// Returns `classname.name`, or just the name if there's no classname.
    pub fn qualified_name(&self) -> String {
        match &self.classname {
            Some(classname) if !classname.is_empty() => format!("{classname}.{}", self.name),
            _ => self.name.clone(),
        }
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] ({:.3}s)",
            self.qualified_name(),
            self.status,
            self.time.as_secs_f64()
        )?;
        if let Some(message) = self.status.message() {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

/// Represents the outcome of a test case.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TestCaseStatus {
    /// This test case passed.
    Success,

    /// This test case did not pass.
    NonSuccess {
        /// Whether this test case failed in an expected way (failure) or an unexpected way
        /// (error).
        kind: NonSuccessKind,

        /// Message, type and text of the failure element.
        detail: StatusDetail,
    },

    /// This test case was not run.
    Skipped {
        /// Message, type and text of the skipped element.
        detail: StatusDetail,
    },
}

impl TestCaseStatus {
    /// Creates a new `TestCaseStatus` that represents a successful test.
    pub fn success() -> Self {
        TestCaseStatus::Success
    }

    /// Creates a new `TestCaseStatus` that represents an unsuccessful test.
    pub fn non_success(kind: NonSuccessKind) -> Self {
        TestCaseStatus::NonSuccess {
            kind,
            detail: StatusDetail::default(),
        }
    }

    /// Creates a new `TestCaseStatus` that represents a skipped test.
    pub fn skipped() -> Self {
        TestCaseStatus::Skipped {
            detail: StatusDetail::default(),
        }
    }

    /// The counting category of this status. Errors fold into [`StatusKind::Failed`].
    pub fn kind(&self) -> StatusKind {
        match self {
            TestCaseStatus::Success => StatusKind::Passed,
            TestCaseStatus::NonSuccess { .. } => StatusKind::Failed,
            TestCaseStatus::Skipped { .. } => StatusKind::Skipped,
        }
    }

    /// Returns the detail for non-success and skipped statuses.
    pub fn detail(&self) -> Option<&StatusDetail> {
        match self {
            TestCaseStatus::Success => None,
            TestCaseStatus::NonSuccess { detail, .. } | TestCaseStatus::Skipped { detail } => {
                Some(detail)
            }
        }
    }

    /// Returns the detail mutably. `None` if this is a success.
    pub fn detail_mut(&mut self) -> Option<&mut StatusDetail> {
        match self {
            TestCaseStatus::Success => None,
            TestCaseStatus::NonSuccess { detail, .. } | TestCaseStatus::Skipped { detail } => {
                Some(detail)
            }
        }
    }

    /// The failure or skip message, if any.
    pub fn message(&self) -> Option<&str> {
        self.detail().and_then(|detail| detail.message.as_deref())
    }
}

impl fmt::Display for TestCaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestCaseStatus::Success => write!(f, "PASSED"),
            TestCaseStatus::NonSuccess {
                kind: NonSuccessKind::Failure,
                ..
            } => write!(f, "FAILURE"),
            TestCaseStatus::NonSuccess {
                kind: NonSuccessKind::Error,
                ..
            } => write!(f, "ERROR"),
            TestCaseStatus::Skipped { .. } => write!(f, "SKIPPED"),
        }
    }
}

/// Details attached to a failure, error or skip element.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatusDetail {
    /// The `message` attribute.
    pub message: Option<String>,

    /// The `type` attribute.
    pub ty: Option<String>,

    /// The element's text: usually a stack trace or captured output.
    pub description: Option<String>,
}

/// The kind of non-successful test case.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NonSuccessKind {
    /// This is a test failure.
    Failure,

    /// This is a test error.
    Error,
}

/// The category a test case is counted under.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum StatusKind {
    /// The test passed.
    Passed,

    /// The test failed or errored.
    Failed,

    /// The test was skipped.
    Skipped,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn case(name: &str, status: TestCaseStatus) -> TestCase {
        TestCase::new("unit", name, status, "a.xml")
    }

    #[test]
    fn counts_fold_errors_into_failures() {
        let mut suite = TestSuite::new("unit");
        suite
            .add_testcase(case("pass", TestCaseStatus::success()))
            .add_testcase(case("fail", TestCaseStatus::non_success(NonSuccessKind::Failure)))
            .add_testcase(case("error", TestCaseStatus::non_success(NonSuccessKind::Error)))
            .add_testcase(case("skip", TestCaseStatus::skipped()));

        assert_eq!(suite.passed(), 1);
        assert_eq!(suite.failed(), 2);
        assert_eq!(suite.skipped(), 1);
        assert_eq!(suite.passed() + suite.failed() + suite.skipped(), suite.len());

        let failing: Vec<_> = suite
            .tests(StatusKind::Failed)
            .map(|tc| tc.name.as_str())
            .collect();
        assert_eq!(failing, vec!["fail", "error"]);
    }

    #[test]
    fn empty_suite() {
        let mut suite = TestSuite::new("integration");
        assert!(suite.is_empty());
        assert_eq!(suite.file_count(), 0);
        assert_eq!(suite.archive(), None);

        suite.set_archive("jobs/integration.xml");
        suite.add_file("jobs/integration.xml");
        suite.add_file("jobs/integration.xml");
        assert!(suite.is_empty());
        assert_eq!(suite.file_count(), 1);
        assert_eq!(suite.archive().map(|a| a.as_str()), Some("jobs/integration.xml"));
    }

    #[test]
    fn display() {
        let mut status = TestCaseStatus::non_success(NonSuccessKind::Error);
        status
            .detail_mut()
            .expect("non-success has a detail")
            .message = Some("connection refused".to_owned());
        let mut testcase = case("connects", status);
        testcase
            .set_classname("net.Client")
            .set_time(Duration::from_millis(1500));

        assert_eq!(
            testcase.to_string(),
            "net.Client.connects [ERROR] (1.500s): connection refused"
        );
        assert_eq!(case("bare", TestCaseStatus::success()).to_string(), "bare [PASSED] (0.000s)");
    }
}
