//! Rule snapshots and their hot-swappable holder
//!
//! A [`RuleSnapshot`] pairs one [`RuleDocument`] with the matchers compiled
//! from it. The [`SnapshotManager`] publishes snapshots through `ArcSwap`:
//!
//! ```text
//! route()   -> SnapshotManager::current() -> ArcSwap::load_full() -> Arc<RuleSnapshot>
//!                                                (lock-free read)
//!
//! replace() -> lock install -> build snapshot off to the side -> ArcSwap::store()
//!                                                                 (atomic swap)
//! ```
//!
//! Readers that already hold an `Arc<RuleSnapshot>` keep using it after a
//! swap; the old snapshot is dropped when the last of them finishes.

use crate::condition::{CompileError, ConditionCompiler, ConditionMatcher};
use crate::rule::RuleDocument;
use arc_swap::{ArcSwap, Guard};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

/// Immutable document + matchers pair; the unit of replacement.
#[derive(Debug)]
pub struct RuleSnapshot {
    document: RuleDocument,
    matchers: Vec<Box<dyn ConditionMatcher>>,
    version: u64,
    installed_at: DateTime<Utc>,
}

impl RuleSnapshot {
    /// Compile every clause of a valid document. Invalid documents get no
    /// matchers. Any clause failure aborts the whole build.
    fn build(
        document: RuleDocument,
        compiler: &dyn ConditionCompiler,
        version: u64,
    ) -> Result<Self, CompileError> {
        let matchers = if document.is_valid() {
            document
                .conditions()
                .iter()
                .map(|clause| compiler.compile(clause, document.force()))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            Vec::new()
        };

        Ok(Self {
            document,
            matchers,
            version,
            installed_at: Utc::now(),
        })
    }

    pub fn document(&self) -> &RuleDocument {
        &self.document
    }

    /// Compiled matchers, in clause order.
    pub fn matchers(&self) -> &[Box<dyn ConditionMatcher>] {
        &self.matchers
    }

    /// Install sequence number, starting at 1 for the initial rule.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn installed_at(&self) -> DateTime<Utc> {
        self.installed_at
    }

    /// Whether an empty result must fail the call.
    pub fn is_force(&self) -> bool {
        self.document.force()
    }

    /// Whether filtering must be redone for every call.
    pub fn is_runtime(&self) -> bool {
        self.document.is_valid() && self.document.runtime()
    }

    /// True when every matcher was compiled from the document clause at the
    /// same position (or the document is invalid and there are no matchers).
    pub fn is_consistent(&self) -> bool {
        if !self.document.is_valid() {
            return self.matchers.is_empty();
        }
        self.matchers.len() == self.document.conditions().len()
            && self
                .matchers
                .iter()
                .zip(self.document.conditions())
                .all(|(matcher, clause)| matcher.source() == clause.trim())
    }
}

/// Holds the active snapshot.
pub struct SnapshotManager {
    current: ArcSwap<RuleSnapshot>,
    compiler: Arc<dyn ConditionCompiler>,
    /// Serializes installs; holds the last installed version.
    install: Mutex<u64>,
}

impl SnapshotManager {
    /// Build the initial snapshot. Fails if any clause does not compile.
    pub fn new(
        document: RuleDocument,
        compiler: Arc<dyn ConditionCompiler>,
    ) -> Result<Self, CompileError> {
        let snapshot = RuleSnapshot::build(document, compiler.as_ref(), 1)?;
        Ok(Self {
            current: ArcSwap::from_pointee(snapshot),
            compiler,
            install: Mutex::new(1),
        })
    }

    /// The active snapshot (lock-free).
    pub fn current(&self) -> Arc<RuleSnapshot> {
        self.current.load_full()
    }

    /// Borrow the active snapshot without bumping its reference count.
    pub fn load(&self) -> Guard<Arc<RuleSnapshot>> {
        self.current.load()
    }

    /// Compile `document` and swap it in.
    ///
    /// On a compile error nothing is published and the previous snapshot
    /// stays active.
    pub fn replace(&self, document: RuleDocument) -> Result<Arc<RuleSnapshot>, CompileError> {
        let mut last_version = match self.install.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Install lock poisoned, recovering");
                poisoned.into_inner()
            }
        };

        let snapshot = Arc::new(RuleSnapshot::build(
            document,
            self.compiler.as_ref(),
            *last_version + 1,
        )?);
        self.current.store(Arc::clone(&snapshot));
        *last_version = snapshot.version();

        tracing::info!(
            version = snapshot.version(),
            valid = snapshot.document().is_valid(),
            clauses = snapshot.matchers().len(),
            force = snapshot.document().force(),
            runtime = snapshot.document().runtime(),
            "Routing rule installed"
        );

        Ok(snapshot)
    }
}
