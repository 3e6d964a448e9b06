// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Appending failure details to an HTML report.
//!
//! The existing report is treated as opaque bytes: new markup is spliced in before `</body>`
//! and nothing else in the document is touched. Test output embedded in earlier sections can
//! contain arbitrary characters, so the document is never re-parsed or re-serialized.

use crate::{
    errors::ReportError,
    helpers::plural,
    registry::FrozenRegistry,
};
use aho_corasick::AhoCorasick;
use atomicwrites::{AtomicFile, OverwriteBehavior};
use camino::{Utf8Path, Utf8PathBuf};
use ci_summary_junit::{StatusKind, TestSuite};
use quick_xml::escape::escape;
use std::io::Write;
use swrite::{SWrite, swrite};
use tracing::{debug, error, info};

/// The document written when the report does not exist yet.
pub static REPORT_SHELL: &str = "<html><head><title>CI Summary</title></head>\
    <body><h1>CI Summary – Test Failures</h1></body></html>";

static STYLE: &str = "<style>\n\
    table.ci-failures { border-collapse: collapse; margin: 12px 0; width: 100%; }\n\
    table.ci-failures caption { font-weight: bold; text-align: left; padding: 4px 0; }\n\
    table.ci-failures th, table.ci-failures td { border: 1px solid #888; padding: 4px; \
    vertical-align: top; text-align: left; }\n\
    table.ci-failures pre { margin: 0; white-space: pre-wrap; }\n\
    </style>\n";

static COLUMNS: &[&str] = &["Test", "Class", "Status", "Time (s)", "Message", "Details"];

/// Writes failing test cases into an HTML report.
#[derive(Clone, Debug)]
pub struct ReportEmitter {
    path: Utf8PathBuf,
    failure_cap: usize,
}

/// What [`ReportEmitter::emit`] wrote.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReportSummary {
    /// The number of suite tables appended.
    pub tables: usize,

    /// The number of failing test cases written.
    pub failures_reported: usize,

    /// True if emission stopped because the failure cap was exceeded.
    pub truncated: bool,
}

impl ReportEmitter {
    /// Creates a new emitter for the report at `path`.
    pub fn new(path: impl Into<Utf8PathBuf>, failure_cap: usize) -> Self {
        Self {
            path: path.into(),
            failure_cap,
        }
    }

    /// The path the previous report is copied to before it is overwritten.
    pub fn backup_path(&self) -> Utf8PathBuf {
        backup_path(&self.path)
    }

    /// Appends a failure table for each suite with failures, in suite name order.
    ///
    /// The previous report is copied to [`backup_path`](Self::backup_path) immediately before
    /// the new one is written.
    pub fn emit(&self, registry: &FrozenRegistry) -> Result<ReportSummary, ReportError> {
        if !self.path.exists() {
            debug!("creating report shell at {}", self.path);
            fs_err::write(&self.path, REPORT_SHELL).map_err(|err| ReportError::CreateShell {
                path: self.path.clone(),
                err,
            })?;
        }

        let existing = fs_err::read(&self.path).map_err(|err| ReportError::Read {
            path: self.path.clone(),
            err,
        })?;

        let (fragment, summary) = render_failures(registry, self.failure_cap);
        if summary.truncated {
            error!(
                "saw {} failures, more than the threshold of {}. \
                 Not appending further failure details to {}",
                summary.failures_reported, self.failure_cap, self.path
            );
        }
        let updated = splice_into_body(&existing, &fragment);

        let backup = self.backup_path();
        fs_err::copy(&self.path, &backup).map_err(|err| ReportError::Backup { backup, err })?;

        AtomicFile::new(&self.path, OverwriteBehavior::AllowOverwrite)
            .write(|file| file.write_all(&updated))
            .map_err(|err| ReportError::Write {
                path: self.path.clone(),
                err,
            })?;

        info!(
            "test failure details ({} {} in {} {}) appended to {}",
            summary.failures_reported,
            plural::failures_str(summary.failures_reported),
            summary.tables,
            plural::suites_str(summary.tables),
            self.path
        );
        Ok(summary)
    }
}

/// Returns `<path>.bak`.
pub fn backup_path(path: &Utf8Path) -> Utf8PathBuf {
    let mut backup = path.as_str().to_owned();
    backup.push_str(".bak");
    backup.into()
}

/// Renders the failure section for `registry`.
///
/// Suites are visited in name order. After each suite's table is rendered, the running failure
/// total is compared with `failure_cap`; once it is exceeded no further tables are rendered.
pub fn render_failures(registry: &FrozenRegistry, failure_cap: usize) -> (String, ReportSummary) {
    let mut out = String::new();
    out.push_str(
        "<div style=\"font-size: 22px; color: white; font-weight: bold;\">\
         [Test Failure Details]</div>\n",
    );
    out.push_str(STYLE);

    let mut summary = ReportSummary::default();
    for suite in registry.iter() {
        let failed = suite.failed();
        if failed == 0 {
            debug!("no failed tests in suite {}", suite.name());
            continue;
        }

        render_suite_table(&mut out, suite, failed);
        summary.tables += 1;
        summary.failures_reported += failed;

        if summary.failures_reported > failure_cap {
            summary.truncated = true;
            break;
        }
    }

    (out, summary)
}

fn render_suite_table(out: &mut String, suite: &TestSuite, failed: usize) {
    swrite!(
        out,
        "<table class=\"ci-failures\">\n<caption>{}: {failed} {}</caption>\n<thead><tr>",
        escape(suite.name()),
        plural::failures_str(failed),
    );
    for column in COLUMNS {
        swrite!(out, "<th>{}</th>", escape(*column));
    }
    out.push_str("</tr></thead>\n<tbody>\n");

    for testcase in suite.tests(StatusKind::Failed) {
        let detail = testcase.status.detail();
        let message = detail
            .and_then(|detail| detail.message.as_deref())
            .unwrap_or_default();
        let description = detail
            .and_then(|detail| detail.description.as_deref())
            .unwrap_or_default();

        swrite!(
            out,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{:.3}</td><td>{}</td><td><pre>{}</pre></td></tr>\n",
            escape(testcase.name.as_str()),
            escape(testcase.classname.as_deref().unwrap_or_default()),
            testcase.status,
            testcase.time.as_secs_f64(),
            escape(message),
            escape(description),
        );
    }
    out.push_str("</tbody>\n</table>\n");
}

/// Inserts `fragment` before the last `</body>` in `existing`, matched ASCII
/// case-insensitively.
///
/// Without a `</body>`, the fragment is wrapped in a body and inserted before the last
/// `</html>`. Without either, it is appended. All existing bytes are preserved.
pub fn splice_into_body(existing: &[u8], fragment: &str) -> Vec<u8> {
    let mut updated = Vec::with_capacity(existing.len() + fragment.len() + 16);

    if let Some(pos) = find_last_tag(existing, "</body>") {
        updated.extend_from_slice(&existing[..pos]);
        updated.extend_from_slice(fragment.as_bytes());
        updated.extend_from_slice(&existing[pos..]);
    } else if let Some(pos) = find_last_tag(existing, "</html>") {
        updated.extend_from_slice(&existing[..pos]);
        updated.extend_from_slice(b"<body>");
        updated.extend_from_slice(fragment.as_bytes());
        updated.extend_from_slice(b"</body>");
        updated.extend_from_slice(&existing[pos..]);
    } else {
        updated.extend_from_slice(existing);
        updated.extend_from_slice(fragment.as_bytes());
    }

    updated
}

fn find_last_tag(haystack: &[u8], tag: &str) -> Option<usize> {
    let matcher = AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build([tag])
        .ok()?;
    matcher.find_iter(haystack).last().map(|found| found.start())
}
