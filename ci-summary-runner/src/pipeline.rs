// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The summary pipeline: discovery, parallel extraction, tallying and report emission.

use crate::{
    config::{CiSummaryConfig, DiscoveryConfig, ExtractConfig, get_num_cpus},
    discovery::{DiscoveryFilter, discover_result_files},
    errors::{DiscoveryError, ExtractionError, PipelineBuildError, PipelineError},
    extract::{ExtractOptions, ExtractionWorker, FileOutcome, SkipReason},
    helpers::plural,
    registry::{FrozenRegistry, SuiteRegistry},
    report::{ReportEmitter, ReportSummary},
};
use camino::{Utf8Path, Utf8PathBuf};
use ci_summary_junit::StatusKind;
use ci_summary_metadata::{RunSummary, SkippedFilesSummary, SuiteSummary, TotalsSummary};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::atomic::{AtomicBool, Ordering},
};
use tracing::{debug, error, info, warn};

/// Everything a [`SummaryPipeline`] needs to run.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    input_dir: Utf8PathBuf,
    output: Utf8PathBuf,
    debug: bool,
    failure_cap: usize,
    discovery: DiscoveryConfig,
    extract: ExtractConfig,
}

impl PipelineConfig {
    /// Creates a pipeline config reading from `input_dir` and writing to `output`, with the
    /// remaining settings taken from `config`.
    pub fn new(
        input_dir: impl Into<Utf8PathBuf>,
        output: impl Into<Utf8PathBuf>,
        config: &CiSummaryConfig,
    ) -> Self {
        Self {
            input_dir: input_dir.into(),
            output: output.into(),
            debug: false,
            failure_cap: config.report.failure_cap,
            discovery: config.discovery.clone(),
            extract: config.extract.clone(),
        }
    }

    /// Sets the debug flag. Result files without test cases are then logged in full.
    pub fn set_debug(&mut self, debug: bool) -> &mut Self {
        self.debug = debug;
        self
    }

    /// The input directory.
    pub fn input_dir(&self) -> &Utf8Path {
        &self.input_dir
    }

    /// The report path.
    pub fn output(&self) -> &Utf8Path {
        &self.output
    }

    /// Whether debug output is enabled.
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// The failure cap for the report.
    pub fn failure_cap(&self) -> usize {
        self.failure_cap
    }
}

/// Counts of result files that contributed nothing, by reason.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SkipCounts {
    /// Files that failed to parse.
    pub parse_failed: usize,

    /// Files whose root element had no suite name.
    pub missing_suite_name: usize,

    /// Files whose suite name was already claimed.
    pub collisions: usize,

    /// Files matching an extraction skip pattern.
    pub excluded: usize,

    /// Files with no test cases.
    pub no_test_cases: usize,
}

impl SkipCounts {
    fn record(&mut self, reason: &SkipReason) {
        match reason {
            SkipReason::ParseFailed(_) => self.parse_failed += 1,
            SkipReason::MissingSuiteName => self.missing_suite_name += 1,
            SkipReason::Collision(_) => self.collisions += 1,
            SkipReason::ExcludedFile { .. } => self.excluded += 1,
            SkipReason::NoTestCases { .. } => self.no_test_cases += 1,
        }
    }

    /// The total number of skipped files.
    pub fn total(&self) -> usize {
        self.parse_failed
            + self.missing_suite_name
            + self.collisions
            + self.excluded
            + self.no_test_cases
    }
}

/// Aggregate totals for a run.
///
/// Every field is a sum, so the totals do not depend on the order in which files complete.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunTotals {
    /// The number of candidate result files examined.
    pub archives: usize,

    /// The number of result files that contributed test cases.
    pub files: usize,

    /// The number of suites in the registry.
    pub suites: usize,

    /// The number of test cases extracted.
    pub tests: usize,

    /// Passing test cases across all suites.
    pub passed: usize,

    /// Failing test cases (including errors) across all suites.
    pub failed: usize,

    /// Skipped test cases across all suites.
    pub skipped: usize,

    /// Result files that contributed nothing.
    pub skips: SkipCounts,
}

impl RunTotals {
    fn record(&mut self, outcome: &FileOutcome) {
        let (files, tests) = outcome.counts();
        self.files += files;
        self.tests += tests;
        if let FileOutcome::Skipped(reason) = outcome {
            self.skips.record(reason);
        }
    }

    fn tally(&mut self, registry: &FrozenRegistry) {
        self.suites = registry.len();
        for suite in registry.iter() {
            self.passed += suite.passed();
            self.failed += suite.failed();
            self.skipped += suite.skipped();
        }
    }
}

/// The registry and totals produced by [`SummaryPipeline::extract`].
#[derive(Clone, Debug)]
pub struct Extraction {
    /// The populated registry.
    pub registry: FrozenRegistry,

    /// Totals across all suites.
    pub totals: RunTotals,
}

/// The result of a completed [`SummaryPipeline::run`].
#[derive(Clone, Debug)]
pub struct RunOutcome {
    /// Totals across all suites.
    pub totals: RunTotals,

    /// The populated registry.
    pub registry: FrozenRegistry,

    /// What was written to the report.
    pub report: ReportSummary,
}

impl RunOutcome {
    /// Converts this outcome into its machine-readable form.
    pub fn to_summary(&self) -> RunSummary {
        let totals = &self.totals;
        let skips = &totals.skips;
        RunSummary {
            totals: TotalsSummary {
                archives: totals.archives,
                files: totals.files,
                suites: totals.suites,
                tests: totals.tests,
                passed: totals.passed,
                failed: totals.failed,
                skipped: totals.skipped,
            },
            skipped_files: SkippedFilesSummary {
                parse_failed: skips.parse_failed,
                missing_suite_name: skips.missing_suite_name,
                collisions: skips.collisions,
                excluded: skips.excluded,
                no_test_cases: skips.no_test_cases,
            },
            suites: self
                .registry
                .iter()
                .map(|suite| {
                    (
                        suite.name().to_owned(),
                        SuiteSummary {
                            passed: suite.passed(),
                            failed: suite.failed(),
                            skipped: suite.skipped(),
                            files: suite.file_count(),
                            archive: suite.archive().map(|archive| archive.to_string()),
                        },
                    )
                })
                .collect(),
        }
    }
}

/// Drives a summary run.
#[derive(Debug)]
pub struct SummaryPipeline {
    config: PipelineConfig,
    filter: DiscoveryFilter,
    options: ExtractOptions,
    extract_pool: ThreadPool,
}

impl SummaryPipeline {
    /// Creates a new pipeline. The worker pool is sized to the number of available CPUs.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineBuildError> {
        Self::with_threads(config, get_num_cpus())
    }

    pub(crate) fn with_threads(
        config: PipelineConfig,
        threads: usize,
    ) -> Result<Self, PipelineBuildError> {
        let filter = DiscoveryFilter::new(&config.discovery)?;
        let mut options = ExtractOptions::new(&config.extract)?;
        options.set_debug(config.debug);

        let extract_pool = ThreadPoolBuilder::new()
            // The scope closure that collects results needs its own thread.
            .num_threads(threads.max(1) + 1)
            .thread_name(|idx| format!("ci-summary-extract-{idx}"))
            .build()
            .map_err(PipelineBuildError::Pool)?;

        Ok(Self {
            config,
            filter,
            options,
            extract_pool,
        })
    }

    /// The configuration this pipeline was built with.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Finds the result files to process.
    pub fn discover(&self) -> Result<Vec<Utf8PathBuf>, DiscoveryError> {
        discover_result_files(&self.config.input_dir, &self.filter)
    }

    /// Extracts every file in `files` into a fresh registry, in parallel.
    ///
    /// Files with problems of their own are skipped. The first fatal error stops workers that
    /// have not started yet; results from workers already running are drained before that error
    /// is returned.
    pub fn extract(&self, files: &[Utf8PathBuf]) -> Result<Extraction, ExtractionError> {
        let registry = SuiteRegistry::new();
        let worker = ExtractionWorker::new(&self.options, &registry);

        let mut totals = RunTotals {
            archives: files.len(),
            ..RunTotals::default()
        };
        let mut first_error = None;

        let (sender, receiver) = crossbeam_channel::unbounded();
        let canceled = AtomicBool::new(false);

        let worker = &worker;
        let canceled = &canceled;
        let totals_mut = &mut totals;
        let first_error_mut = &mut first_error;

        self.extract_pool.scope(move |scope| {
            for path in files {
                let sender = sender.clone();
                scope.spawn(move |_| {
                    if canceled.load(Ordering::Acquire) {
                        return;
                    }

                    let result = panic::catch_unwind(AssertUnwindSafe(|| worker.extract(path)))
                        .unwrap_or_else(|payload| {
                            Err(ExtractionError::WorkerPanicked {
                                path: path.clone(),
                                message: panic_message(payload.as_ref()),
                            })
                        });
                    // Failure to send means the receiver was dropped.
                    let _ = sender.send(result);
                });
            }

            // Drop the original sender so the receiver completes once all workers are done.
            drop(sender);

            for result in receiver {
                match result {
                    Ok(outcome) => totals_mut.record(&outcome),
                    Err(err) => {
                        canceled.store(true, Ordering::Release);
                        if first_error_mut.is_none() {
                            error!("unexpected error during extraction, aborting: {err}");
                            *first_error_mut = Some(err);
                        } else {
                            debug!("further error while aborting: {err}");
                        }
                    }
                }
            }
        });

        if let Some(err) = first_error {
            return Err(err);
        }

        let registry = registry
            .freeze()
            .map_err(|_| ExtractionError::RegistryPoisoned {
                path: self.config.input_dir.clone(),
            })?;
        totals.tally(&registry);

        Ok(Extraction { registry, totals })
    }

    /// Runs the whole pipeline, writing the report.
    pub fn run(&self) -> Result<RunOutcome, PipelineError> {
        let files = self.discover()?;
        let Extraction { registry, totals } = self.extract(&files)?;

        log_suites(&registry);
        log_totals(&totals);
        log_failures(&registry);

        let report =
            ReportEmitter::new(&self.config.output, self.config.failure_cap).emit(&registry)?;

        Ok(RunOutcome {
            totals,
            registry,
            report,
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "(non-string panic payload)".to_owned()
    }
}

fn log_suites(registry: &FrozenRegistry) {
    for suite in registry.iter() {
        info!("suite: {}", suite.name());
        info!("-- passed: {}", suite.passed());
        info!("-- failed: {}", suite.failed());
        info!("-- skipped: {}", suite.skipped());

        let archive = suite
            .archive()
            .map_or_else(|| "(unknown)".to_owned(), |archive| archive.to_string());
        if suite.is_empty() && suite.file_count() == 0 {
            warn!(
                "suite {} is empty and had no result files associated with it. \
                 Did the job run and produce result files? Check {archive} for details",
                suite.name()
            );
        } else if suite.is_empty() {
            warn!(
                "suite {} is unexpectedly empty although {} {} contributed to it. \
                 Rerun with --debug for details",
                suite.name(),
                suite.file_count(),
                plural::files_str(suite.file_count()),
            );
        }
    }
}

fn log_totals(totals: &RunTotals) {
    info!("total archive count: {}", totals.archives);
    info!("total result file count: {}", totals.files);
    info!("total suite count: {}", totals.suites);
    info!("total test count: {}", totals.tests);
    info!("-- passed: {}", totals.passed);
    info!("-- failed: {}", totals.failed);
    info!("-- skipped: {}", totals.skipped);

    let skipped_files = totals.skips.total();
    if skipped_files > 0 {
        info!(
            "{skipped_files} result {} contributed no tests \
             ({} parse failures, {} missing suite names, {} collisions, {} excluded, {} empty)",
            plural::files_str(skipped_files),
            totals.skips.parse_failed,
            totals.skips.missing_suite_name,
            totals.skips.collisions,
            totals.skips.excluded,
            totals.skips.no_test_cases,
        );
    }
}

fn log_failures(registry: &FrozenRegistry) {
    for suite in registry.iter().filter(|suite| suite.failed() > 0) {
        warn!(
            "[printing {} failed {} from suite {}]",
            suite.failed(),
            plural::tests_str(suite.failed()),
            suite.name()
        );
        for testcase in suite.tests(StatusKind::Failed) {
            warn!("{testcase}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::{Utf8TempDir, tempdir};
    use pretty_assertions::assert_eq;
    use proptest::{collection::vec, prelude::*};
    use swrite::{SWrite, swriteln};
    use test_strategy::proptest;

    fn suite_xml(name: &str, passed: usize, failed: usize, skipped: usize) -> String {
        let mut xml = format!("<testsuite name=\"{name}\">\n");
        for idx in 0..passed {
            swriteln!(xml, "  <testcase name=\"pass_{idx}\" classname=\"{name}\"/>");
        }
        for idx in 0..failed {
            swriteln!(
                xml,
                "  <testcase name=\"fail_{idx}\" classname=\"{name}\">\
                 <failure message=\"boom\">trace</failure></testcase>"
            );
        }
        for idx in 0..skipped {
            swriteln!(
                xml,
                "  <testcase name=\"skip_{idx}\" classname=\"{name}\"><skipped/></testcase>"
            );
        }
        xml.push_str("</testsuite>\n");
        xml
    }

    fn write_files(dir: &Utf8TempDir, files: &[(&str, String)]) -> Vec<Utf8PathBuf> {
        files
            .iter()
            .map(|(name, contents)| {
                let path = dir.path().join(name);
                std::fs::create_dir_all(path.parent().expect("path has a parent"))
                    .expect("created parent dir");
                std::fs::write(&path, contents).expect("wrote result file");
                path
            })
            .collect()
    }

    fn pipeline(dir: &Utf8TempDir, threads: usize) -> SummaryPipeline {
        let config = PipelineConfig::new(
            dir.path().join("input"),
            dir.path().join("ci_summary.html"),
            &CiSummaryConfig::default_config(),
        );
        SummaryPipeline::with_threads(config, threads).expect("pipeline builds")
    }

    #[test]
    fn two_suites() {
        let dir = tempdir().expect("created temp dir");
        write_files(
            &dir,
            &[
                ("input/a.xml", suite_xml("unit", 3, 1, 0)),
                ("input/b.xml", suite_xml("integration", 2, 0, 0)),
            ],
        );

        let outcome = pipeline(&dir, 4).run().expect("run succeeds");
        assert_eq!(
            outcome.totals,
            RunTotals {
                archives: 2,
                files: 2,
                suites: 2,
                tests: 6,
                passed: 5,
                failed: 1,
                skipped: 0,
                skips: SkipCounts::default(),
            }
        );
        assert_eq!(outcome.report.tables, 1);
        assert_eq!(outcome.report.failures_reported, 1);

        let summary = outcome.to_summary();
        assert_eq!(summary.suites["unit"].failed, 1);
        assert_eq!(summary.suites["integration"].passed, 2);
        assert_eq!(summary.totals.passed, 5);
    }

    #[test]
    fn malformed_file_is_isolated() {
        let dir = tempdir().expect("created temp dir");
        write_files(
            &dir,
            &[
                ("input/a.xml", suite_xml("one", 2, 0, 1)),
                ("input/b.xml", suite_xml("two", 1, 1, 0)),
                ("input/c.xml", "<testsuite name=\"three\"><testcase".to_owned()),
            ],
        );

        let outcome = pipeline(&dir, 2).run().expect("run succeeds");
        assert_eq!(outcome.registry.names().collect::<Vec<_>>(), vec!["one", "two"]);
        assert_eq!(outcome.totals.archives, 3);
        assert_eq!(outcome.totals.files, 2);
        assert_eq!(outcome.totals.skips.parse_failed, 1);
        assert_eq!(
            (outcome.totals.passed, outcome.totals.failed, outcome.totals.skipped),
            (3, 1, 1)
        );
    }

    #[test]
    fn duplicate_suite_names() {
        let dir = tempdir().expect("created temp dir");
        write_files(
            &dir,
            &[
                ("input/dup1.xml", suite_xml("flaky", 2, 0, 0)),
                ("input/dup2.xml", suite_xml("flaky", 0, 3, 0)),
            ],
        );

        let outcome = pipeline(&dir, 2).run().expect("run succeeds");
        assert_eq!(outcome.registry.len(), 1);
        let suite = outcome.registry.get("flaky").expect("suite exists");
        assert_eq!(suite.file_count(), 1);
        assert_eq!(outcome.totals.skips.collisions, 1);
        assert_eq!(outcome.totals.files, 1);

        // Either file may win, but only one of them.
        let counts = (suite.passed(), suite.failed());
        assert!(counts == (2, 0) || counts == (0, 3), "got {counts:?}");
        assert_eq!(outcome.totals.tests, suite.len());
    }

    #[test]
    fn no_files_fails_before_extraction() {
        let dir = tempdir().expect("created temp dir");
        write_files(&dir, &[("input/readme.txt", "not xml".to_owned())]);

        let err = pipeline(&dir, 2).run().expect_err("no files found");
        assert!(
            matches!(err, PipelineError::Discovery(DiscoveryError::NoResultFiles { .. })),
            "got {err:?}"
        );
        assert!(!dir.path().join("ci_summary.html").exists());
    }

    #[test]
    fn fatal_error_aborts_without_report() {
        let dir = tempdir().expect("created temp dir");
        let mut files = write_files(&dir, &[("input/a.xml", suite_xml("unit", 1, 0, 0))]);
        files.push(dir.path().join("input/missing.xml"));

        let pipeline = pipeline(&dir, 2);
        let err = pipeline.extract(&files).expect_err("missing file is fatal");
        assert!(matches!(err, ExtractionError::Read { .. }), "got {err:?}");
        assert!(!dir.path().join("ci_summary.html").exists());
    }

    #[test]
    fn empty_suite_sanity_counts() {
        let dir = tempdir().expect("created temp dir");
        write_files(
            &dir,
            &[
                ("input/a.xml", "<testsuite name=\"empty\"/>".to_owned()),
                ("input/checkstyle-report.xml", suite_xml("lint", 1, 0, 0)),
            ],
        );

        let outcome = pipeline(&dir, 2).run().expect("run succeeds");
        assert_eq!(outcome.totals.suites, 2);
        assert_eq!(outcome.totals.files, 0);
        assert_eq!(outcome.totals.skips.no_test_cases, 1);
        assert_eq!(outcome.totals.skips.excluded, 1);
        for name in ["empty", "lint"] {
            let suite = outcome.registry.get(name).expect("suite exists");
            assert!(suite.is_empty());
            assert_eq!(suite.file_count(), 0);
        }
    }

    #[test]
    fn panic_messages() {
        assert_eq!(panic_message(&"static str"), "static str");
        assert_eq!(panic_message(&"owned".to_owned()), "owned");
        assert_eq!(panic_message(&42_u32), "(non-string panic payload)");
    }

    fn arb_suites_with_shuffle() -> impl Strategy<Value = (Vec<(u8, u8, u8)>, Vec<usize>)> {
        vec((0..5_u8, 0..5_u8, 0..3_u8), 1..12).prop_flat_map(|suites| {
            let order: Vec<usize> = (0..suites.len()).collect();
            (Just(suites), Just(order).prop_shuffle())
        })
    }

    #[proptest(cases = 16)]
    fn totals_independent_of_order(
        #[strategy(arb_suites_with_shuffle())] suites_and_order: (Vec<(u8, u8, u8)>, Vec<usize>),
    ) {
        let (suites, order) = suites_and_order;
        let dir = tempdir().expect("created temp dir");
        let contents: Vec<(String, String)> = suites
            .iter()
            .enumerate()
            .map(|(idx, &(passed, failed, skipped))| {
                (
                    format!("input/job-{idx}/result.xml"),
                    suite_xml(
                        &format!("suite-{idx}"),
                        passed.into(),
                        failed.into(),
                        skipped.into(),
                    ),
                )
            })
            .collect();
        let borrowed: Vec<(&str, String)> = contents
            .iter()
            .map(|(name, xml)| (name.as_str(), xml.clone()))
            .collect();
        let files = write_files(&dir, &borrowed);
        let shuffled: Vec<Utf8PathBuf> = order.iter().map(|&idx| files[idx].clone()).collect();

        let pipeline = pipeline(&dir, 4);
        let forward = pipeline.extract(&files).expect("extraction succeeds");
        let reordered = pipeline.extract(&shuffled).expect("extraction succeeds");

        prop_assert_eq!(forward.totals, reordered.totals);
        prop_assert_eq!(
            forward.registry.names().collect::<Vec<_>>(),
            reordered.registry.names().collect::<Vec<_>>()
        );
        for suite in forward.registry.iter() {
            let other = reordered.registry.get(suite.name()).expect("suite in both runs");
            prop_assert_eq!(
                (suite.passed(), suite.failed(), suite.skipped()),
                (other.passed(), other.failed(), other.skipped())
            );
        }
    }
}
