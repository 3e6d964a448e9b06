// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use ci_summary::CiSummaryApp;
use ci_summary_runner::errors::DisplayErrorChain;
use clap::Parser;
use color_eyre::Result;

fn main() -> Result<()> {
    color_eyre::install()?;
    let _ = enable_ansi_support::enable_ansi_support();

    let opts = CiSummaryApp::parse();
    let output = match opts.init_output() {
        Ok(output) => output,
        Err(error) => {
            // Logging isn't set up yet, so print directly.
            eprintln!("error: {}", DisplayErrorChain::new(&error));
            std::process::exit(error.process_exit_code())
        }
    };

    match opts.exec(output) {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            error.display_to_stderr(&output.stderr_styles());
            std::process::exit(error.process_exit_code())
        }
    }
}
