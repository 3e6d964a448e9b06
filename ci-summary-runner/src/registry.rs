// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The suite registry shared by extraction workers.
//!
//! Each suite name is claimed by exactly one result file. The first file to claim a name owns
//! the suite for the rest of the run; later files declaring the same name are rejected rather
//! than merged. Claiming is the only way to add an entry, and the presence check and the insert
//! happen under a single lock acquisition.

use camino::{Utf8Path, Utf8PathBuf};
use ci_summary_junit::{TestCase, TestSuite};
use std::{
    collections::{BTreeMap, btree_map::Entry},
    fmt,
    sync::Mutex,
};
use thiserror::Error;

/// A registry of suites, populated concurrently during extraction.
#[derive(Debug, Default)]
pub struct SuiteRegistry {
    suites: Mutex<BTreeMap<String, TestSuite>>,
}

impl SuiteRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `name` for the result file at `archive`.
    ///
    /// On success an empty suite with its archive set is inserted immediately, so any later
    /// claim for the same name fails even if this claim is never committed.
    pub fn claim(&self, name: &str, archive: &Utf8Path) -> Result<SuiteClaim<'_>, ClaimError> {
        let mut suites = self
            .suites
            .lock()
            .map_err(|_| ClaimError::Poisoned(RegistryPoisoned))?;
        match suites.entry(name.to_owned()) {
            Entry::Occupied(entry) => Err(ClaimError::Collision(SuiteCollision {
                suite: name.to_owned(),
                existing_archive: entry.get().archive().map(Utf8Path::to_owned),
            })),
            Entry::Vacant(entry) => {
                let mut suite = TestSuite::new(name);
                suite.set_archive(archive);
                entry.insert(suite.clone());
                Ok(SuiteClaim {
                    registry: self,
                    suite,
                })
            }
        }
    }

    /// Consumes the registry, returning a read-only, name-sorted view of it.
    pub fn freeze(self) -> Result<FrozenRegistry, RegistryPoisoned> {
        let suites = self.suites.into_inner().map_err(|_| RegistryPoisoned)?;
        Ok(FrozenRegistry { suites })
    }
}

/// A successfully claimed suite.
///
/// The claim holds the worker's own copy of the suite. Changes become visible in the registry
/// when [`commit`](Self::commit) is called.
#[derive(Debug)]
#[must_use = "a claim must be committed for its test cases to be recorded"]
pub struct SuiteClaim<'a> {
    registry: &'a SuiteRegistry,
    suite: TestSuite,
}

impl SuiteClaim<'_> {
    /// The name of the claimed suite.
    pub fn name(&self) -> &str {
        self.suite.name()
    }

    /// Records a file as having contributed to this suite.
    pub fn add_file(&mut self, file: impl Into<Utf8PathBuf>) -> &mut Self {
        self.suite.add_file(file);
        self
    }

    /// Appends a test case to this suite.
    pub fn add_testcase(&mut self, testcase: TestCase) -> &mut Self {
        self.suite.add_testcase(testcase);
        self
    }

    /// Publishes this suite to the registry, replacing the empty placeholder.
    pub fn commit(self) -> Result<(), RegistryPoisoned> {
        let mut suites = self.registry.suites.lock().map_err(|_| RegistryPoisoned)?;
        suites.insert(self.suite.name().to_owned(), self.suite);
        Ok(())
    }
}

/// An error returned by [`SuiteRegistry::claim`].
#[derive(Debug, Error)]
pub enum ClaimError {
    /// The name was already claimed by another file.
    #[error(transparent)]
    Collision(SuiteCollision),

    /// The registry lock was poisoned.
    #[error(transparent)]
    Poisoned(#[from] RegistryPoisoned),
}

/// A suite name claimed by more than one result file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SuiteCollision {
    /// The suite name.
    pub suite: String,

    /// The file that claimed the name first.
    pub existing_archive: Option<Utf8PathBuf>,
}

impl fmt::Display for SuiteCollision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "suite `{}` was already claimed", self.suite)?;
        if let Some(archive) = &self.existing_archive {
            write!(f, " by `{archive}`")?;
        }
        Ok(())
    }
}

impl std::error::Error for SuiteCollision {}

/// The registry lock was poisoned by a panicking worker.
#[derive(Clone, Copy, Debug, Error)]
#[error("suite registry lock poisoned")]
pub struct RegistryPoisoned;

/// A read-only view of the registry after extraction, sorted by suite name.
#[derive(Clone, Debug, Default)]
pub struct FrozenRegistry {
    suites: BTreeMap<String, TestSuite>,
}

impl FrozenRegistry {
    /// Builds a frozen registry directly from suites. Later suites replace earlier ones with the
    /// same name.
    pub fn from_suites(suites: impl IntoIterator<Item = TestSuite>) -> Self {
        Self {
            suites: suites
                .into_iter()
                .map(|suite| (suite.name().to_owned(), suite))
                .collect(),
        }
    }

    /// Looks up a suite by name.
    pub fn get(&self, name: &str) -> Option<&TestSuite> {
        self.suites.get(name)
    }

    /// Iterates over suites in name order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &TestSuite> {
        self.suites.values()
    }

    /// Suite names, in order.
    pub fn names(&self) -> impl ExactSizeIterator<Item = &str> {
        self.suites.keys().map(String::as_str)
    }

    /// The number of suites.
    pub fn len(&self) -> usize {
        self.suites.len()
    }

    /// Returns true if no suites were registered.
    pub fn is_empty(&self) -> bool {
        self.suites.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ci_summary_junit::TestCaseStatus;
    use pretty_assertions::assert_eq;
    use std::sync::Barrier;

    #[test]
    fn claim_then_collide() {
        let registry = SuiteRegistry::new();
        let mut claim = registry
            .claim("unit", Utf8Path::new("a.xml"))
            .expect("first claim succeeds");
        assert_eq!(claim.name(), "unit");

        let err = registry
            .claim("unit", Utf8Path::new("b.xml"))
            .expect_err("second claim collides");
        match err {
            ClaimError::Collision(collision) => {
                assert_eq!(collision.suite, "unit");
                assert_eq!(
                    collision.existing_archive.as_deref(),
                    Some(Utf8Path::new("a.xml"))
                );
                assert_eq!(
                    collision.to_string(),
                    "suite `unit` was already claimed by `a.xml`"
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }

        claim
            .add_file("a.xml")
            .add_testcase(TestCase::new("unit", "t1", TestCaseStatus::success(), "a.xml"));
        claim.commit().expect("commit succeeds");

        let frozen = registry.freeze().expect("registry not poisoned");
        let suite = frozen.get("unit").expect("suite exists");
        assert_eq!(suite.len(), 1);
        assert_eq!(suite.file_count(), 1);
        assert_eq!(suite.archive(), Some(Utf8Path::new("a.xml")));
    }

    #[test]
    fn uncommitted_claim_leaves_placeholder() {
        let registry = SuiteRegistry::new();
        let claim = registry
            .claim("lint", Utf8Path::new("checkstyle.xml"))
            .expect("claim succeeds");
        drop(claim);

        let frozen = registry.freeze().expect("registry not poisoned");
        let suite = frozen.get("lint").expect("placeholder exists");
        assert!(suite.is_empty());
        assert_eq!(suite.file_count(), 0);
        assert_eq!(suite.archive(), Some(Utf8Path::new("checkstyle.xml")));
    }

    #[test]
    fn concurrent_claims_have_one_winner() {
        const THREADS: usize = 16;
        let registry = SuiteRegistry::new();
        let barrier = Barrier::new(THREADS);

        let winners: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..THREADS)
                .map(|idx| {
                    let registry = &registry;
                    let barrier = &barrier;
                    scope.spawn(move || {
                        let archive = Utf8PathBuf::from(format!("dup{idx}.xml"));
                        barrier.wait();
                        match registry.claim("flaky", &archive) {
                            Ok(mut claim) => {
                                claim.add_file(archive);
                                claim.commit().expect("commit succeeds");
                                1
                            }
                            Err(ClaimError::Collision(_)) => 0,
                            Err(other) => panic!("unexpected error: {other:?}"),
                        }
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("thread did not panic"))
                .sum()
        });

        assert_eq!(winners, 1);
        let frozen = registry.freeze().expect("registry not poisoned");
        assert_eq!(frozen.len(), 1);
        assert_eq!(frozen.get("flaky").expect("suite exists").file_count(), 1);
    }

    #[test]
    fn frozen_is_sorted() {
        let frozen = FrozenRegistry::from_suites(
            ["zeta", "alpha", "mid"].into_iter().map(TestSuite::new),
        );
        assert_eq!(frozen.names().collect::<Vec<_>>(), vec!["alpha", "mid", "zeta"]);
        assert_eq!(frozen.len(), 3);
        assert!(!frozen.is_empty());
        assert!(FrozenRegistry::default().is_empty());
    }
}
