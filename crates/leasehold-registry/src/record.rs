//! Cluster records
//!
//! A `ClusterRecord` is the local view of one remote cluster. Identity, name,
//! region and creation time never change; sizing, lease expiry and status are
//! mutated in place behind a lock so concurrent sweeps, user commands and
//! teardowns all observe each other's writes.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use leasehold_common::lease::{self, check_lease_duration};
use leasehold_common::Result;
use leasehold_provider::ClusterId;

/// Lifecycle status of a cluster
///
/// Moves forward only: Live -> Terminating -> Gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ClusterStatus {
    /// Running and leased
    Live,
    /// Decommission has started
    Terminating,
    /// Cleanup succeeded and deletion was requested
    Gone,
}

impl fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterStatus::Live => write!(f, "live"),
            ClusterStatus::Terminating => write!(f, "terminating"),
            ClusterStatus::Gone => write!(f, "gone"),
        }
    }
}

#[derive(Debug)]
struct RecordState {
    instance_type: Option<String>,
    node_count: u32,
    expires_at: DateTime<Utc>,
    status: ClusterStatus,
}

/// Local record of one remote cluster
#[derive(Debug)]
pub struct ClusterRecord {
    id: ClusterId,
    name: String,
    region: String,
    created_at: DateTime<Utc>,
    state: Mutex<RecordState>,
}

impl ClusterRecord {
    /// Create a Live record whose lease runs `lifetime` from `lease_base`
    pub fn new(
        id: ClusterId,
        name: impl Into<String>,
        region: impl Into<String>,
        created_at: DateTime<Utc>,
        lease_base: DateTime<Utc>,
        lifetime: Duration,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            region: region.into(),
            created_at,
            state: Mutex::new(RecordState {
                instance_type: None,
                node_count: 0,
                expires_at: lease::compute_expiry(lease_base, lifetime),
                status: ClusterStatus::Live,
            }),
        }
    }

    /// Set the instance type and node count known at creation
    pub fn with_sizing(self, instance_type: impl Into<String>, node_count: u32) -> Self {
        {
            let mut state = self.state.lock();
            state.instance_type = Some(instance_type.into());
            state.node_count = node_count;
        }
        self
    }

    /// Provider-assigned identity
    pub fn id(&self) -> ClusterId {
        self.id
    }

    /// Cluster name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Region
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Creation time
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Lease expiry
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.state.lock().expires_at
    }

    /// Lifecycle status
    pub fn status(&self) -> ClusterStatus {
        self.state.lock().status
    }

    /// Instance type, if known yet
    pub fn instance_type(&self) -> Option<String> {
        self.state.lock().instance_type.clone()
    }

    /// Total nodes across pools (0 if unknown)
    pub fn node_count(&self) -> u32 {
        self.state.lock().node_count
    }

    /// Whether the lease has lapsed at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        lease::is_expired(self.expires_at(), now)
    }

    /// Time left on the lease; negative once lapsed
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        lease::remaining(self.expires_at(), now)
    }

    /// Extend the lease by `additional`
    ///
    /// Rejects non-positive extensions and extensions longer than the
    /// maximum lease. Returns the new expiry.
    pub fn renew(&self, additional: Duration) -> Result<DateTime<Utc>> {
        check_lease_duration(&self.name, "renewal", additional)?;
        let mut state = self.state.lock();
        state.expires_at = lease::compute_expiry(state.expires_at, additional);
        Ok(state.expires_at)
    }

    /// Drop the lease so the next sweep picks the cluster up
    ///
    /// Never moves an already-lapsed expiry later. Returns the new expiry.
    pub fn expire(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let mut state = self.state.lock();
        state.expires_at = state.expires_at.min(now);
        state.expires_at
    }

    /// Record the latest pool sizing
    ///
    /// The instance type is only filled in if it was unknown.
    pub(crate) fn update_sizing(&self, node_count: u32, instance_type: Option<String>) {
        let mut state = self.state.lock();
        state.node_count = node_count;
        if state.instance_type.is_none() {
            state.instance_type = instance_type;
        }
    }

    /// Move Live -> Terminating. Returns the status after the call.
    pub(crate) fn begin_termination(&self) -> ClusterStatus {
        self.advance(ClusterStatus::Terminating)
    }

    /// Move to Gone. Returns the status after the call.
    pub(crate) fn mark_gone(&self) -> ClusterStatus {
        self.advance(ClusterStatus::Gone)
    }

    fn advance(&self, next: ClusterStatus) -> ClusterStatus {
        let mut state = self.state.lock();
        if next > state.status {
            state.status = next;
        }
        state.status
    }
}
