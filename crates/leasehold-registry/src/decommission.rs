//! Decommission pipeline
//!
//! Tears a cluster down in three steps: fetch its credentials, run the
//! external cleanup script against them, and, if the script succeeded, ask
//! the provider to delete the cluster.
//!
//! ```text
//! Live ──teardown──> Terminating ──exit 0──> Gone ──> delete_cluster
//!                         │
//!                         ├──exit 1──> Terminating (declined, retry later)
//!                         └──other───> Terminating (error)
//! ```
//!
//! The local record is never removed here; the next reconciliation evicts it
//! once the provider stops reporting the cluster.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use dashmap::DashSet;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use leasehold_common::{Error, Result, CREDENTIALS_ENV_VAR};
use leasehold_provider::{ClusterId, EncodedCredentials, ProviderClient};

use crate::record::ClusterRecord;

/// Variables passed through from the host environment to the cleanup script
const PASSTHROUGH_ENV: &[&str] = &["PATH", "HOME"];

/// What the cleanup script did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupOutput {
    /// Exit code, or `None` if the script was killed by a signal
    pub exit_code: Option<i32>,
    /// Combined stdout and stderr
    pub output: String,
}

/// Runs the external cleanup step for one cluster
///
/// Returns `Err` only if the step could not be launched; any exit status is
/// reported through `CleanupOutput`.
#[async_trait]
pub trait CleanupRunner: Send + Sync {
    /// Run cleanup for `cluster` with its decoded credentials
    async fn run(&self, cluster: &str, credentials: &str) -> Result<CleanupOutput>;
}

/// Cleanup runner that spawns a script
///
/// The script sees a cleared environment holding only the credentials
/// variable plus `PATH` and `HOME`.
#[derive(Debug, Clone)]
pub struct ProcessCleanupRunner {
    program: PathBuf,
    credentials_env: String,
}

impl ProcessCleanupRunner {
    /// Run `program`, passing credentials in `KUBECONFIG`
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            credentials_env: CREDENTIALS_ENV_VAR.to_string(),
        }
    }

    /// Pass credentials in a different variable
    pub fn with_credentials_env(mut self, name: impl Into<String>) -> Self {
        self.credentials_env = name.into();
        self
    }
}

#[async_trait]
impl CleanupRunner for ProcessCleanupRunner {
    async fn run(&self, cluster: &str, credentials: &str) -> Result<CleanupOutput> {
        let mut command = Command::new(&self.program);
        command
            .env_clear()
            .env(&self.credentials_env, credentials)
            .stdin(Stdio::null());
        for name in PASSTHROUGH_ENV {
            if let Some(value) = std::env::var_os(name) {
                command.env(name, value);
            }
        }

        let output = command.output().await.map_err(|e| {
            Error::cleanup(
                cluster,
                format!("failed to run {}: {}", self.program.display(), e),
            )
        })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(CleanupOutput {
            exit_code: output.status.code(),
            output: combined,
        })
    }
}

/// How a teardown ended, when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownOutcome {
    /// Cleanup succeeded and the provider accepted the delete
    Decommissioned,
    /// Cleanup declined (exit 1); the record stays Terminating
    Declined,
    /// Another teardown of the same cluster is still running
    AlreadyInFlight,
}

/// Marks a cluster as being torn down until dropped
struct InFlight<'a> {
    set: &'a DashSet<ClusterId>,
    id: ClusterId,
}

impl<'a> InFlight<'a> {
    fn acquire(set: &'a DashSet<ClusterId>, id: ClusterId) -> Option<Self> {
        if set.insert(id) {
            Some(Self { set, id })
        } else {
            None
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.id);
    }
}

/// Drives clusters through teardown
pub struct Decommissioner {
    provider: Arc<dyn ProviderClient>,
    runner: Arc<dyn CleanupRunner>,
    in_flight: DashSet<ClusterId>,
}

impl Decommissioner {
    /// Create a pipeline using `runner` for the cleanup step
    pub fn new(provider: Arc<dyn ProviderClient>, runner: Arc<dyn CleanupRunner>) -> Self {
        Self {
            provider,
            runner,
            in_flight: DashSet::new(),
        }
    }

    /// Whether a teardown of `id` is currently running
    pub fn is_in_flight(&self, id: ClusterId) -> bool {
        self.in_flight.contains(&id)
    }

    /// Decommission a cluster
    ///
    /// Marks the record Terminating before any external call. On cleanup
    /// success the record becomes Gone and a delete is issued; a failed
    /// delete is returned as an error but the record stays Gone. A declined
    /// cleanup leaves the record Terminating. Launch failures, credential
    /// failures and unexpected exit codes are errors.
    ///
    /// Safe to call repeatedly for the same record. A call made while
    /// another is still running for the same cluster returns
    /// `AlreadyInFlight` without touching the provider.
    #[instrument(skip(self, record), fields(cluster = %record.name(), cluster_id = %record.id()))]
    pub async fn teardown(&self, record: &ClusterRecord) -> Result<TeardownOutcome> {
        let status = record.begin_termination();
        debug!(%status, "teardown requested");

        let Some(_in_flight) = InFlight::acquire(&self.in_flight, record.id()) else {
            debug!("teardown already in progress");
            return Ok(TeardownOutcome::AlreadyInFlight);
        };

        let credentials = self.get_credentials(record).await?;
        let result = self.runner.run(record.name(), &credentials).await?;
        info!(
            exit_code = ?result.exit_code,
            output = %result.output,
            "cleanup script finished"
        );

        match result.exit_code {
            Some(0) => {
                record.mark_gone();
                self.provider.delete_cluster(record.id()).await?;
                info!("cluster decommissioned");
                Ok(TeardownOutcome::Decommissioned)
            }
            Some(1) => {
                info!("cleanup declined, leaving cluster terminating");
                Ok(TeardownOutcome::Declined)
            }
            Some(code) => Err(Error::cleanup_exit(record.name(), code)),
            None => Err(Error::cleanup(
                record.name(),
                "cleanup script was terminated by a signal",
            )),
        }
    }

    /// Fetch and decode the credentials for a cluster
    pub async fn get_credentials(&self, record: &ClusterRecord) -> Result<String> {
        let encoded = self.provider.get_credentials(record.id()).await?;
        decode_credentials(record.name(), &encoded)
    }
}

/// Decode a provider credential bundle into the plaintext the script expects
pub fn decode_credentials(cluster: &str, encoded: &EncodedCredentials) -> Result<String> {
    let bytes = STANDARD
        .decode(encoded.kubeconfig.trim())
        .map_err(|e| Error::credentials(cluster, format!("invalid base64: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| Error::credentials(cluster, format!("credentials are not UTF-8: {}", e)))
}

/// Run a teardown in the background
///
/// The caller does not have to wait; the outcome is logged.
pub fn spawn_teardown(
    decommissioner: Arc<Decommissioner>,
    record: Arc<ClusterRecord>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match decommissioner.teardown(&record).await {
            Ok(outcome) => debug!(cluster = %record.name(), ?outcome, "teardown finished"),
            Err(e) => warn!(
                cluster = %record.name(),
                error = %e,
                retryable = e.is_retryable(),
                "teardown failed"
            ),
        }
    })
}
