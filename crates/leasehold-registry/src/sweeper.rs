//! Sweeper
//!
//! Finds records whose lease has lapsed and hands each one to the
//! decommission pipeline without waiting for it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use crate::decommission::{spawn_teardown, Decommissioner};
use crate::record::ClusterStatus;
use crate::registry::Registry;

/// Result of one sweep
#[derive(Debug, Default)]
pub struct SweepPass {
    /// Names of records that were Live and are now expired, sorted
    pub newly_expired: Vec<String>,
    /// Teardowns launched by the pass
    pub launched: Vec<JoinHandle<()>>,
}

/// Launches teardowns for expired leases
pub struct Sweeper {
    registry: Arc<Registry>,
    decommissioner: Arc<Decommissioner>,
}

impl Sweeper {
    /// Create a sweeper over `registry`
    pub fn new(registry: Arc<Registry>, decommissioner: Arc<Decommissioner>) -> Self {
        Self {
            registry,
            decommissioner,
        }
    }

    /// Launch teardowns for every expired record
    ///
    /// Returns the names of records that were Live before this pass, for
    /// announcement. Records already Terminating are retried but not
    /// reported again.
    pub fn sweep(&self, now: DateTime<Utc>) -> Vec<String> {
        self.sweep_pass(now).newly_expired
    }

    /// Like `sweep`, but also returns the handles of the launched teardowns
    #[instrument(skip(self))]
    pub fn sweep_pass(&self, now: DateTime<Utc>) -> SweepPass {
        let mut pass = SweepPass::default();

        for record in self.registry.records() {
            if !record.is_expired(now) {
                continue;
            }
            // flip to Terminating here so a second pass before the task runs
            // does not announce the record again
            match record.status() {
                ClusterStatus::Live => {
                    record.begin_termination();
                    pass.newly_expired.push(record.name().to_string());
                }
                status => debug!(cluster = %record.name(), %status, "retrying teardown"),
            }
            pass.launched
                .push(spawn_teardown(Arc::clone(&self.decommissioner), record));
        }

        pass.newly_expired.sort();
        if !pass.launched.is_empty() {
            info!(
                expired = pass.newly_expired.len(),
                launched = pass.launched.len(),
                "swept expired clusters"
            );
        }
        pass
    }
}
