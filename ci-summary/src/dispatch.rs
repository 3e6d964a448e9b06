// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError,
    output::{OutputContext, OutputOpts},
};
use camino::Utf8PathBuf;
use ci_summary_metadata::CiSummaryExitCode;
use ci_summary_runner::{
    config::{CiSummaryConfig, DefaultConfigWarnings},
    pipeline::{PipelineConfig, SummaryPipeline},
    summary::write_summary,
};
use clap::{Args, Parser};
use tracing::{debug, info};

/// Summarize JUnit XML results from a CI run.
///
/// Searches the input directory recursively for result files, groups them into suites, logs
/// per-suite and total counts, and appends a table of failing tests for each suite to an HTML
/// report. The previous report is kept as `<output>.bak`.
#[derive(Debug, Parser)]
#[command(version, styles = crate::output::clap_styles::style())]
pub struct CiSummaryApp {
    /// Directory to search recursively for result files
    #[arg(long, value_name = "DIR")]
    input: Utf8PathBuf,

    /// HTML report to append failure details to (created if missing)
    #[arg(long, value_name = "PATH")]
    output: Utf8PathBuf,

    /// Also write a machine-readable JSON summary to this path
    #[arg(long, value_name = "PATH")]
    summary_json: Option<Utf8PathBuf>,

    #[command(flatten)]
    config_opts: ConfigOpts,

    #[command(flatten)]
    filter_opts: FilterOpts,

    #[command(flatten)]
    output_opts: OutputOpts,
}

impl CiSummaryApp {
    /// Initializes logging and returns the output context.
    pub fn init_output(&self) -> Result<OutputContext, ExpectedError> {
        self.output_opts.init()
    }

    fn make_pipeline_config(&self, verbose: bool) -> Result<PipelineConfig, ExpectedError> {
        let mut config = self.config_opts.make_config()?;
        self.filter_opts.apply(&mut config);

        let mut pipeline_config = PipelineConfig::new(&self.input, &self.output, &config);
        pipeline_config.set_debug(verbose);
        Ok(pipeline_config)
    }

    /// Executes the app, returning the process exit code.
    pub fn exec(self, output: OutputContext) -> Result<i32, ExpectedError> {
        let pipeline_config = self.make_pipeline_config(output.verbose)?;
        let pipeline = SummaryPipeline::new(pipeline_config)?;
        log_pipeline_config(pipeline.config());
        let outcome = pipeline.run()?;

        if let Some(path) = &self.summary_json {
            write_summary(path, &outcome.to_summary())?;
            info!("run summary written to {path}");
        }

        Ok(CiSummaryExitCode::OK)
    }
}

fn log_pipeline_config(config: &PipelineConfig) {
    debug!(
        "reading results from {}, writing report to {} (failure cap: {}, debug: {})",
        config.input_dir(),
        config.output(),
        config.failure_cap(),
        config.debug(),
    );
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Config options")]
struct ConfigOpts {
    /// Config file, layered on top of the built-in defaults
    #[arg(long, value_name = "PATH", env = "CI_SUMMARY_CONFIG")]
    config_file: Option<Utf8PathBuf>,
}

impl ConfigOpts {
    fn make_config(&self) -> Result<CiSummaryConfig, ExpectedError> {
        let config =
            CiSummaryConfig::from_sources(self.config_file.as_deref(), &mut DefaultConfigWarnings)?;
        Ok(config)
    }
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Filter options")]
struct FilterOpts {
    /// Only process result files whose path contains one of these substrings
    ///
    /// Overrides `discovery.include`. When set, exclusions are ignored.
    #[arg(long, value_name = "SUBSTR", value_delimiter = ',')]
    include: Vec<String>,

    /// Skip result files whose path contains one of these substrings
    ///
    /// Overrides `discovery.exclude`.
    #[arg(long, value_name = "SUBSTR", value_delimiter = ',')]
    exclude: Vec<String>,

    /// Only process result files whose path contains this substring (for debugging)
    #[arg(long, value_name = "SUBSTR")]
    only_file: Option<String>,

    /// Stop adding failure tables to the report after this many failures
    #[arg(long, value_name = "N")]
    failure_cap: Option<usize>,
}

impl FilterOpts {
    fn apply(&self, config: &mut CiSummaryConfig) {
        if !self.include.is_empty() {
            config.discovery.include = self.include.clone();
        }
        if !self.exclude.is_empty() {
            config.discovery.exclude = self.exclude.clone();
        }
        if let Some(only_file) = &self.only_file {
            config.discovery.only_file = only_file.clone();
        }
        if let Some(failure_cap) = self.failure_cap {
            config.report.failure_cap = failure_cap;
        }
    }
}
