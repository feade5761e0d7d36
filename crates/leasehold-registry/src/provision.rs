//! Provisioning
//!
//! Turns a deploy request into one provider create call and registers the
//! resulting cluster with the lease the caller asked for.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument};

use leasehold_common::{Error, Result};
use leasehold_provider::{CreateClusterRequest, NodePoolRequest};

use crate::record::ClusterRecord;
use crate::registry::Registry;

/// What a caller wants deployed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployRequest {
    /// Cluster name
    pub name: String,
    /// Region to deploy into
    pub region: String,
    /// Instance type for the single node pool
    pub instance_type: String,
    /// Nodes in the single node pool
    pub node_count: u32,
    /// Kubernetes version
    pub k8s_version: String,
    /// Lease length, measured from the time of the deploy
    pub lifetime: Duration,
}

impl DeployRequest {
    fn to_create_request(&self) -> CreateClusterRequest {
        CreateClusterRequest {
            label: self.name.clone(),
            region: self.region.clone(),
            k8s_version: self.k8s_version.clone(),
            node_pools: vec![NodePoolRequest {
                instance_type: self.instance_type.clone(),
                count: self.node_count,
            }],
        }
    }
}

impl Registry {
    /// Create a cluster and register it
    ///
    /// The new record's lease is `now + request.lifetime`. Requests for a
    /// denied name, or with a lifetime or node count outside the configured
    /// limits, are rejected before the provider is called.
    #[instrument(skip(self, request), fields(cluster = %request.name))]
    pub async fn deploy(
        &self,
        request: &DeployRequest,
        now: DateTime<Utc>,
    ) -> Result<Arc<ClusterRecord>> {
        if self.is_blacklisted(&request.name) {
            return Err(Error::validation_for_field(
                &request.name,
                "name",
                "cluster name is on the deny-list",
            ));
        }
        self.limits.check_lifetime(&request.name, request.lifetime)?;
        self.limits
            .check_node_count(&request.name, request.node_count)?;

        let created = self
            .provider
            .create_cluster(&request.to_create_request())
            .await?
            .ok_or_else(|| Error::NoClusterReturned {
                name: request.name.clone(),
            })?;

        let record = Arc::new(
            ClusterRecord::new(
                created.id,
                &created.label,
                &created.region,
                created.created.unwrap_or(now),
                now,
                request.lifetime,
            )
            .with_sizing(&request.instance_type, request.node_count),
        );
        self.insert(Arc::clone(&record));

        info!(
            cluster_id = %record.id(),
            expires_at = %record.expires_at(),
            nodes = request.node_count,
            "deployed cluster"
        );
        Ok(record)
    }
}
