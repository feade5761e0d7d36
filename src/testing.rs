//! Test doubles for the host crate

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use mockall::mock;

use leasehold_common::Result;
use leasehold_provider::{
    ClusterId, CreateClusterRequest, EncodedCredentials, ProviderClient, RemoteCluster, RemotePool,
};
use leasehold_registry::{CleanupOutput, CleanupRunner};

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
        output: String::new(),
    }
}
