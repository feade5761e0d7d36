//! End-to-end lease lifecycle against an in-memory provider
//!
//! deploy -> reconcile -> expire -> sweep -> teardown -> reconcile evicts

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;

use leasehold_common::{Error, LeaseLimits, Result};
use leasehold_provider::{
    ClusterId, CreateClusterRequest, EncodedCredentials, ProviderClient, RemoteCluster, RemotePool,
};
use leasehold_registry::{
    CleanupOutput, CleanupRunner, ClusterStatus, Decommissioner, DenyList, DeployRequest,
    Registry, Sweeper, TeardownOutcome,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

/// Provider that keeps clusters in memory and honours create/delete
#[derive(Default)]
struct InMemoryProvider {
    next_id: AtomicU64,
    clusters: Mutex<BTreeMap<ClusterId, (RemoteCluster, Vec<RemotePool>)>>,
    deletes: AtomicU64,
}

impl InMemoryProvider {
    fn seed(&self, label: &str, nodes: u32) -> ClusterId {
        let id = ClusterId(self.next_id.fetch_add(1, Ordering::SeqCst) + 100);
        let cluster = RemoteCluster {
            id,
            label: label.to_string(),
            region: "us-east".to_string(),
            k8s_version: Some("1.18".to_string()),
            created: Some(t0()),
            updated: None,
        };
        let pools = vec![RemotePool {
            id: 1,
            count: nodes,
            instance_type: Some("g6-standard-2".to_string()),
        }];
        self.clusters.lock().insert(id, (cluster, pools));
        id
    }
}

#[async_trait]
impl ProviderClient for InMemoryProvider {
    async fn list_clusters(&self) -> Result<Vec<RemoteCluster>> {
        Ok(self
            .clusters
            .lock()
            .values()
            .map(|(cluster, _)| cluster.clone())
            .collect())
    }

    async fn list_pools(&self, id: ClusterId) -> Result<Vec<RemotePool>> {
        Ok(self
            .clusters
            .lock()
            .get(&id)
            .map(|(_, pools)| pools.clone())
            .unwrap_or_default())
    }

    async fn create_cluster(&self, request: &CreateClusterRequest) -> Result<Option<RemoteCluster>> {
        let nodes = request.node_pools.iter().map(|p| p.count).sum();
        let id = self.seed(&request.label, nodes);
        Ok(self.clusters.lock().get(&id).map(|(c, _)| c.clone()))
    }

    async fn delete_cluster(&self, id: ClusterId) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.clusters.lock().remove(&id);
        Ok(())
    }

    async fn get_credentials(&self, id: ClusterId) -> Result<EncodedCredentials> {
        if !self.clusters.lock().contains_key(&id) {
            return Err(Error::provider_status(
                "get_credentials",
                id.to_string(),
                404,
                "Not found",
            ));
        }
        Ok(EncodedCredentials {
            kubeconfig: STANDARD.encode(format!("cluster-{}", id)),
        })
    }
}

/// Cleanup step with a settable exit code that records what it was given
struct ScriptedRunner {
    exit_code: AtomicI32,
    seen: Mutex<Vec<(String, String)>>,
}

impl ScriptedRunner {
    fn exiting(code: i32) -> Self {
        Self {
            exit_code: AtomicI32::new(code),
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CleanupRunner for ScriptedRunner {
    async fn run(&self, cluster: &str, credentials: &str) -> Result<CleanupOutput> {
        self.seen
            .lock()
            .push((cluster.to_string(), credentials.to_string()));
        Ok(CleanupOutput {
            exit_code: Some(self.exit_code.load(Ordering::SeqCst)),
            output: "cleaned\n".to_string(),
        })
    }
}

struct Harness {
    provider: Arc<InMemoryProvider>,
    runner: Arc<ScriptedRunner>,
    registry: Arc<Registry>,
    decommissioner: Arc<Decommissioner>,
    sweeper: Sweeper,
}

fn harness(deny: &[&str], exit_code: i32) -> Harness {
    let provider = Arc::new(InMemoryProvider::default());
    let runner = Arc::new(ScriptedRunner::exiting(exit_code));
    let registry = Arc::new(Registry::new(
        provider.clone(),
        deny.iter().copied().collect::<DenyList>(),
        LeaseLimits::default(),
    ));
    let decommissioner = Arc::new(Decommissioner::new(provider.clone(), runner.clone()));
    let sweeper = Sweeper::new(Arc::clone(&registry), Arc::clone(&decommissioner));
    Harness {
        provider,
        runner,
        registry,
        decommissioner,
        sweeper,
    }
}

fn request(name: &str, hours: i64) -> DeployRequest {
    DeployRequest {
        name: name.to_string(),
        region: "us-east".to_string(),
        instance_type: "g6-standard-2".to_string(),
        node_count: 2,
        k8s_version: "1.18".to_string(),
        lifetime: Duration::hours(hours),
    }
}

#[tokio::test]
async fn deployed_cluster_lives_out_its_lease_and_is_evicted() {
    let h = harness(&[], 0);

    let record = h.registry.deploy(&request("lab", 2), t0()).await.unwrap();
    assert_eq!(h.registry.count(), 1);

    // reconciling keeps the deploy lease rather than resetting it
    h.registry.reconcile(t0() + Duration::hours(1)).await.unwrap();
    let same = h.registry.find("lab").unwrap();
    assert!(Arc::ptr_eq(&same, &record));
    assert_eq!(same.expires_at(), t0() + Duration::hours(2));
    assert_eq!(same.node_count(), 2);

    let pass = h.sweeper.sweep_pass(t0() + Duration::hours(2));
    assert_eq!(pass.newly_expired, vec!["lab"]);
    for handle in pass.launched {
        handle.await.unwrap();
    }

    assert_eq!(record.status(), ClusterStatus::Gone);
    assert_eq!(h.provider.deletes.load(Ordering::SeqCst), 1);
    assert_eq!(
        h.runner.seen.lock().as_slice(),
        &[("lab".to_string(), format!("cluster-{}", record.id()))]
    );
    // Gone but still tracked until the provider stops listing it
    assert_eq!(h.registry.count(), 1);

    h.registry.reconcile(t0() + Duration::hours(3)).await.unwrap();
    assert_eq!(h.registry.count(), 0);
    assert!(h.registry.find("lab").is_none());
}

#[tokio::test]
async fn discovered_clusters_get_the_discovery_lease_and_deny_list_is_honoured() {
    let h = harness(&["shared"], 0);
    h.provider.seed("found", 3);
    h.provider.seed("shared", 1);

    let listed = h.registry.reconcile(t0()).await.unwrap();

    assert_eq!(listed.len(), 1);
    assert_eq!(h.registry.count(), 1);
    assert!(h.registry.find("shared").is_none());
    let found = h.registry.find("found").unwrap();
    assert_eq!(found.expires_at(), t0() + Duration::hours(8));
    assert_eq!(found.node_count(), 3);
}

#[tokio::test]
async fn manual_expire_then_declined_cleanup_keeps_cluster_until_retry_succeeds() {
    let h = harness(&[], 1);
    let record = h.registry.deploy(&request("lab", 8), t0()).await.unwrap();
    let now = t0() + Duration::minutes(30);

    record.expire(now);
    assert_eq!(
        h.decommissioner.teardown(&record).await.unwrap(),
        TeardownOutcome::Declined
    );
    assert_eq!(record.status(), ClusterStatus::Terminating);

    h.registry.reconcile(now).await.unwrap();
    assert_eq!(h.registry.count(), 1);

    h.runner.exit_code.store(0, Ordering::SeqCst);
    let pass = h.sweeper.sweep_pass(now + Duration::minutes(1));
    assert!(pass.newly_expired.is_empty());
    for handle in pass.launched {
        handle.await.unwrap();
    }

    assert_eq!(record.status(), ClusterStatus::Gone);
    h.registry.reconcile(now + Duration::minutes(2)).await.unwrap();
    assert_eq!(h.registry.count(), 0);
}

#[tokio::test]
async fn renewal_defers_the_sweep() {
    let h = harness(&[], 0);
    let record = h.registry.deploy(&request("lab", 1), t0()).await.unwrap();

    record.renew(Duration::hours(1)).unwrap();

    assert!(h.sweeper.sweep(t0() + Duration::hours(1)).is_empty());
    assert_eq!(h.sweeper.sweep(t0() + Duration::hours(2)), vec!["lab"]);
}
