//! Test doubles shared by the registry's unit tests

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use mockall::mock;
use parking_lot::Mutex;

use leasehold_common::{Error, Result};
use leasehold_provider::{
    ClusterId, CreateClusterRequest, EncodedCredentials, ProviderClient, RemoteCluster, RemotePool,
};

use crate::decommission::{CleanupOutput, CleanupRunner};

// Local mocks since the mockall-generated ones are only available within the
// defining crate's test configuration
mock! {
    pub Provider {}

    #[async_trait]
    impl ProviderClient for Provider {
        async fn list_clusters(&self) -> Result<Vec<RemoteCluster>>;
        async fn list_pools(&self, id: ClusterId) -> Result<Vec<RemotePool>>;
        async fn create_cluster(&self, request: &CreateClusterRequest) -> Result<Option<RemoteCluster>>;
        async fn delete_cluster(&self, id: ClusterId) -> Result<()>;
        async fn get_credentials(&self, id: ClusterId) -> Result<EncodedCredentials>;
    }
}

mock! {
    pub Runner {}

    #[async_trait]
    impl CleanupRunner for Runner {
        async fn run(&self, cluster: &str, credentials: &str) -> Result<CleanupOutput>;
    }
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

pub fn remote(id: u64, label: &str) -> RemoteCluster {
    RemoteCluster {
        id: ClusterId(id),
        label: label.to_string(),
        region: "us-east".to_string(),
        k8s_version: Some("1.18".to_string()),
        created: Some(t0()),
        updated: None,
    }
}

pub fn encoded(kubeconfig: &str) -> EncodedCredentials {
    EncodedCredentials {
        kubeconfig: STANDARD.encode(kubeconfig),
    }
}

pub fn exited(code: i32) -> CleanupOutput {
    CleanupOutput {
        exit_code: Some(code),
        output: format!("exit {}\n", code),
    }
}

/// In-memory provider whose listing can be changed between passes
#[derive(Default)]
pub struct FakeProvider {
    clusters: Mutex<Vec<RemoteCluster>>,
    pools: Mutex<BTreeMap<ClusterId, Vec<RemotePool>>>,
    failing_pools: Mutex<HashSet<ClusterId>>,
    fail_listing: Mutex<bool>,
    pool_calls: AtomicU64,
}

impl FakeProvider {
    pub fn with_clusters(clusters: Vec<RemoteCluster>) -> Self {
        let fake = Self::default();
        fake.set_clusters(clusters);
        fake
    }

    pub fn set_clusters(&self, clusters: Vec<RemoteCluster>) {
        *self.clusters.lock() = clusters;
    }

    pub fn set_pools(&self, id: u64, pools: Vec<(u32, &str)>) {
        let pools = pools
            .into_iter()
            .enumerate()
            .map(|(i, (count, instance_type))| RemotePool {
                id: i as u64,
                count,
                instance_type: Some(instance_type.to_string()),
            })
            .collect();
        self.pools.lock().insert(ClusterId(id), pools);
    }

    pub fn fail_pools_for(&self, id: u64) {
        self.failing_pools.lock().insert(ClusterId(id));
    }

    pub fn fail_listing(&self, fail: bool) {
        *self.fail_listing.lock() = fail;
    }

    pub fn pool_calls(&self) -> u64 {
        self.pool_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderClient for FakeProvider {
    async fn list_clusters(&self) -> Result<Vec<RemoteCluster>> {
        if *self.fail_listing.lock() {
            return Err(Error::provider_status(
                "list_clusters",
                "unknown",
                503,
                "service unavailable",
            ));
        }
        Ok(self.clusters.lock().clone())
    }

    async fn list_pools(&self, id: ClusterId) -> Result<Vec<RemotePool>> {
        self.pool_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_pools.lock().contains(&id) {
            return Err(Error::provider_for("list_pools", id.to_string(), "timeout"));
        }
        Ok(self.pools.lock().get(&id).cloned().unwrap_or_default())
    }

    async fn create_cluster(
        &self,
        _request: &CreateClusterRequest,
    ) -> Result<Option<RemoteCluster>> {
        Err(Error::provider("create_cluster", "not supported by fake"))
    }

    async fn delete_cluster(&self, _id: ClusterId) -> Result<()> {
        Err(Error::provider("delete_cluster", "not supported by fake"))
    }

    async fn get_credentials(&self, _id: ClusterId) -> Result<EncodedCredentials> {
        Err(Error::provider("get_credentials", "not supported by fake"))
    }
}
