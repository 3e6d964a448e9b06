// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Writing the machine-readable run summary.

use crate::errors::SummaryWriteError;
use atomicwrites::{AtomicFile, OverwriteBehavior};
use camino::Utf8Path;
use ci_summary_metadata::RunSummary;
use std::io::Write;
use tracing::debug;

/// Writes `summary` to `path` as pretty-printed JSON, atomically replacing any existing file.
pub fn write_summary(path: &Utf8Path, summary: &RunSummary) -> Result<(), SummaryWriteError> {
    let json = summary
        .to_json_pretty()
        .map_err(SummaryWriteError::Serialize)?;

    AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
        .write(|file| {
            file.write_all(json.as_bytes())?;
            file.write_all(b"\n")
        })
        .map_err(|err| SummaryWriteError::Write {
            path: path.to_owned(),
            err,
        })?;

    debug!("wrote run summary to {path}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::tempdir;
    use pretty_assertions::assert_eq;

    #[test]
    fn write_and_read_back() {
        let dir = tempdir().expect("created temp dir");
        let path = dir.path().join("summary.json");
        std::fs::write(&path, "stale").expect("wrote stale summary");

        let mut summary = RunSummary::default();
        summary.totals.archives = 2;
        summary.totals.failed = 1;
        write_summary(&path, &summary).expect("summary written");

        let contents = std::fs::read_to_string(&path).expect("summary exists");
        assert!(contents.ends_with("}\n"));
        assert_eq!(
            RunSummary::parse_json(&contents).expect("summary parses"),
            summary
        );
    }

    #[test]
    fn missing_parent_dir() {
        let dir = tempdir().expect("created temp dir");
        let err = write_summary(&dir.path().join("no/such/dir/summary.json"), &RunSummary::default())
            .expect_err("missing parent dir fails");
        assert!(matches!(err, SummaryWriteError::Write { .. }), "got {err:?}");
    }
}
