// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::ConfigParseError;
use camino::Utf8Path;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::{collections::BTreeSet, sync::LazyLock};
use tracing::warn;

/// Trait for handling configuration warnings.
///
/// This allows for different warning handling strategies, such as logging warnings (the
/// default behavior) or collecting them for testing purposes.
pub trait ConfigWarnings {
    /// Handle unknown configuration keys found in a config file.
    fn unknown_config_keys(&mut self, config_file: &Utf8Path, unknown: &BTreeSet<String>);
}

/// Default implementation of [`ConfigWarnings`] that logs warnings using the tracing crate.
pub struct DefaultConfigWarnings;

impl ConfigWarnings for DefaultConfigWarnings {
    fn unknown_config_keys(&mut self, config_file: &Utf8Path, unknown: &BTreeSet<String>) {
        let mut unknown_str = String::new();
        if unknown.len() == 1 {
            // Print this on the same line.
            unknown_str.push_str("key: ");
            unknown_str.extend(unknown.iter().map(String::as_str));
        } else {
            unknown_str.push_str("keys:\n");
            for ignored_key in unknown {
                unknown_str.push('\n');
                unknown_str.push_str("  - ");
                unknown_str.push_str(ignored_key);
            }
        }

        warn!("in config file {config_file}, ignoring unknown configuration {unknown_str}");
    }
}

/// Gets the number of available CPUs and caches the value.
#[inline]
pub fn get_num_cpus() -> usize {
    static NUM_CPUS: LazyLock<usize> =
        LazyLock::new(|| match std::thread::available_parallelism() {
            Ok(count) => count.into(),
            Err(err) => {
                warn!("unable to determine num-cpus ({err}), assuming 1 logical CPU");
                1
            }
        });

    *NUM_CPUS
}

/// Overall configuration for ci-summary.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct CiSummaryConfig {
    /// How result files are found.
    pub discovery: DiscoveryConfig,

    /// How result files are read.
    pub extract: ExtractConfig,

    /// How the report is written.
    pub report: ReportConfig,
}

impl CiSummaryConfig {
    /// The default configuration, embedded in the binary.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../../default-config.toml");

    /// Returns the default configuration.
    pub fn default_config() -> Self {
        static DEFAULT: LazyLock<CiSummaryConfig> = LazyLock::new(|| {
            let config = CiSummaryConfig::make_default_config()
                .build()
                .expect("default config is always valid");

            let mut unknown = BTreeSet::new();
            let deserialized: CiSummaryConfig =
                serde_ignored::deserialize(config, |path: serde_ignored::Path| {
                    unknown.insert(path.to_string());
                })
                .expect("default config is always valid");

            // Make sure there aren't any unknown keys in the default config, since it is
            // embedded/shipped with this binary.
            if !unknown.is_empty() {
                panic!(
                    "found unknown keys in default config: {}",
                    unknown.into_iter().collect::<Vec<_>>().join(", ")
                );
            }
            deserialized
        });

        DEFAULT.clone()
    }

    /// Reads the default config, with `config_file` layered on top if provided.
    ///
    /// Unknown keys in `config_file` are reported through `warnings`.
    pub fn from_sources(
        config_file: Option<&Utf8Path>,
        warnings: &mut impl ConfigWarnings,
    ) -> Result<Self, ConfigParseError> {
        let Some(config_file) = config_file else {
            return Ok(Self::default_config());
        };

        let builder = Self::make_default_config()
            .add_source(File::new(config_file.as_str(), FileFormat::Toml));
        let (config, unknown) = Self::build_and_deserialize_config(&builder)
            .map_err(|err| ConfigParseError::new(config_file, err))?;

        if !unknown.is_empty() {
            warnings.unknown_config_keys(config_file, &unknown);
        }

        Ok(config)
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(Self, BTreeSet<String>), ConfigError> {
        let config = builder.build_cloned()?;

        let mut ignored = BTreeSet::new();
        let config: CiSummaryConfig =
            serde_ignored::deserialize(config, |path: serde_ignored::Path| {
                ignored.insert(path.to_string());
            })?;

        Ok((config, ignored))
    }
}

/// Settings for finding result files. Stored in `[discovery]`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct DiscoveryConfig {
    /// The extension of result files, without a leading dot.
    pub extension: String,

    /// Inclusion substrings. If non-empty, these win over `exclude`.
    pub include: Vec<String>,

    /// Exclusion substrings.
    pub exclude: Vec<String>,

    /// If non-empty, only paths containing this substring are kept.
    pub only_file: String,
}

impl DiscoveryConfig {
    /// Returns the single-file debugging filter, if set.
    pub fn only_file(&self) -> Option<&str> {
        (!self.only_file.is_empty()).then_some(self.only_file.as_str())
    }
}

/// Settings for reading result files. Stored in `[extract]`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ExtractConfig {
    /// File name substrings marking files that aren't test results.
    pub skip_files: Vec<String>,
}

/// Settings for writing the report. Stored in `[report]`.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ReportConfig {
    /// Stop adding failure tables once more than this many failures have been written.
    pub failure_cap: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::tempdir;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct CollectWarnings {
        unknown: Vec<BTreeSet<String>>,
    }

    impl ConfigWarnings for CollectWarnings {
        fn unknown_config_keys(&mut self, _config_file: &Utf8Path, unknown: &BTreeSet<String>) {
            self.unknown.push(unknown.clone());
        }
    }

    #[test]
    fn default_config_values() {
        let config = CiSummaryConfig::default_config();
        assert_eq!(config.discovery.extension, "xml");
        assert!(config.discovery.include.is_empty());
        assert_eq!(config.discovery.exclude, vec!["split", "result_details"]);
        assert_eq!(config.discovery.only_file(), None);
        assert_eq!(config.extract.skip_files, vec!["logback", "checkstyle"]);
        assert_eq!(config.report.failure_cap, 200);
    }

    #[test]
    fn no_config_file_is_default() {
        let mut warnings = CollectWarnings::default();
        let config = CiSummaryConfig::from_sources(None, &mut warnings).expect("default parses");
        assert_eq!(config, CiSummaryConfig::default_config());
        assert!(warnings.unknown.is_empty());
    }

    #[test]
    fn config_file_overrides_defaults() {
        let dir = tempdir().expect("created temp dir");
        let config_path = dir.path().join("ci-summary.toml");
        std::fs::write(
            &config_path,
            indoc! {r#"
                [discovery]
                include = ["python"]
                only-file = "jvm17-utests"

                [report]
                failure-cap = 50

                [unknown-section]
                foo = 1
            "#},
        )
        .expect("wrote config file");

        let mut warnings = CollectWarnings::default();
        let config = CiSummaryConfig::from_sources(Some(&config_path), &mut warnings)
            .expect("config parses");

        assert_eq!(config.discovery.include, vec!["python"]);
        assert_eq!(config.discovery.only_file(), Some("jvm17-utests"));
        // Keys not mentioned in the file keep their defaults.
        assert_eq!(config.discovery.exclude, vec!["split", "result_details"]);
        assert_eq!(config.extract.skip_files, vec!["logback", "checkstyle"]);
        assert_eq!(config.report.failure_cap, 50);

        assert_eq!(warnings.unknown.len(), 1);
        assert!(
            warnings.unknown[0].iter().any(|key| key.starts_with("unknown-section")),
            "unknown keys: {:?}",
            warnings.unknown[0]
        );
    }

    #[test]
    fn invalid_config_file() {
        let dir = tempdir().expect("created temp dir");
        let config_path = dir.path().join("ci-summary.toml");
        std::fs::write(&config_path, "[report]\nfailure-cap = \"lots\"\n")
            .expect("wrote config file");

        let err = CiSummaryConfig::from_sources(Some(&config_path), &mut CollectWarnings::default())
            .expect_err("invalid type fails");
        assert_eq!(err.config_file(), &config_path);
    }

    #[test]
    fn missing_config_file() {
        let dir = tempdir().expect("created temp dir");
        let config_path = dir.path().join("does-not-exist.toml");
        CiSummaryConfig::from_sources(Some(&config_path), &mut CollectWarnings::default())
            .expect_err("missing config file fails");
    }
}
