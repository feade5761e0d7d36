//! Cluster registry
//!
//! Owns the mapping from provider identity to `ClusterRecord` and keeps it in
//! step with the provider's listing. `reconcile` is the only path that evicts
//! records; `deploy` (see `provision`) is the only other path that inserts.
//!
//! # Reconciliation
//!
//! ```text
//! list_clusters ──> skip denied ──> size pools ──> create unknown ──> evict unseen
//! ```
//!
//! Passes are serialized. Records inserted by a deploy while a pass is in
//! flight were not known when the pass started, so the pass leaves them alone.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use leasehold_common::lease::DISCOVERY_LEASE;
use leasehold_common::{LeaseLimits, Result};
use leasehold_provider::{ClusterId, ProviderClient, RemoteCluster};

use crate::deny_list::DenyList;
use crate::record::ClusterRecord;

/// Registry of known clusters
pub struct Registry {
    pub(crate) provider: Arc<dyn ProviderClient>,
    clusters: DashMap<ClusterId, Arc<ClusterRecord>>,
    deny_list: DenyList,
    pub(crate) limits: LeaseLimits,
    pass: Mutex<()>,
}

impl Registry {
    /// Create an empty registry
    pub fn new(provider: Arc<dyn ProviderClient>, deny_list: DenyList, limits: LeaseLimits) -> Self {
        Self {
            provider,
            clusters: DashMap::new(),
            deny_list,
            limits,
            pass: Mutex::new(()),
        }
    }

    /// Refresh local records from the provider listing
    ///
    /// Creates records for newly reported clusters with the discovery lease,
    /// refreshes pool sizing, and evicts records the provider no longer
    /// reports. Returns the reported records in listing order.
    ///
    /// Fails only if the listing itself fails; a failed pool lookup leaves
    /// that cluster with a node count of 0.
    #[instrument(skip(self))]
    pub async fn reconcile(&self, now: DateTime<Utc>) -> Result<Vec<Arc<ClusterRecord>>> {
        let _pass = self.pass.lock().await;

        let known: HashSet<ClusterId> = self.clusters.iter().map(|e| *e.key()).collect();
        let remote = self.provider.list_clusters().await?;

        let mut seen = HashSet::with_capacity(remote.len());
        let mut listed = Vec::with_capacity(remote.len());
        for cluster in remote {
            if self.is_blacklisted(&cluster.label) {
                debug!(cluster = %cluster.label, "skipping denied cluster");
                continue;
            }

            let (node_count, instance_type) = self.pool_sizing(&cluster).await;

            let record = Arc::clone(
                self.clusters
                    .entry(cluster.id)
                    .or_insert_with(|| Arc::new(discovered(&cluster, now)))
                    .value(),
            );
            record.update_sizing(node_count, instance_type);

            seen.insert(cluster.id);
            listed.push(record);
        }

        let mut evicted = 0usize;
        self.clusters.retain(|id, record| {
            let keep = seen.contains(id) || !known.contains(id);
            if !keep {
                info!(cluster = %record.name(), cluster_id = %id, "evicting cluster no longer reported");
                evicted += 1;
            }
            keep
        });

        info!(
            listed = listed.len(),
            discovered = seen.difference(&known).count(),
            evicted,
            "reconciled clusters"
        );
        Ok(listed)
    }

    /// Find a record by name
    ///
    /// Returns the first match, or `None` if nothing by that name is tracked.
    pub fn find(&self, name: &str) -> Option<Arc<ClusterRecord>> {
        self.clusters
            .iter()
            .find(|entry| entry.value().name() == name)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Look a record up by identity
    pub fn get(&self, id: ClusterId) -> Option<Arc<ClusterRecord>> {
        self.clusters.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Number of tracked records
    pub fn count(&self) -> usize {
        self.clusters.len()
    }

    /// Whether `name` is on the deny-list
    pub fn is_blacklisted(&self, name: &str) -> bool {
        self.deny_list.contains(name)
    }

    /// The deny-list this registry was built with
    pub fn deny_list(&self) -> &DenyList {
        &self.deny_list
    }

    /// Limits applied to deploy requests
    pub fn limits(&self) -> LeaseLimits {
        self.limits
    }

    /// Handles to every tracked record
    ///
    /// The handles are live: status and lease changes made through them are
    /// visible to every other holder.
    pub fn records(&self) -> Vec<Arc<ClusterRecord>> {
        self.clusters
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Register a freshly provisioned cluster
    pub(crate) fn insert(&self, record: Arc<ClusterRecord>) {
        self.clusters.insert(record.id(), record);
    }

    /// Total node count and first known instance type for a cluster
    async fn pool_sizing(&self, cluster: &RemoteCluster) -> (u32, Option<String>) {
        match self.provider.list_pools(cluster.id).await {
            Ok(pools) => (
                pools.iter().map(|pool| pool.count).sum(),
                pools.iter().find_map(|pool| pool.instance_type.clone()),
            ),
            Err(e) => {
                warn!(
                    cluster = %cluster.label,
                    cluster_id = %cluster.id,
                    error = %e,
                    "failed to size node pools, reporting 0 nodes"
                );
                (0, None)
            }
        }
    }
}

/// Record for a cluster first seen in a provider listing
fn discovered(cluster: &RemoteCluster, now: DateTime<Utc>) -> ClusterRecord {
    info!(cluster = %cluster.label, cluster_id = %cluster.id, "discovered cluster");
    ClusterRecord::new(
        cluster.id,
        &cluster.label,
        &cluster.region,
        cluster.created.unwrap_or(now),
        cluster.lease_base(now),
        DISCOVERY_LEASE,
    )
}
