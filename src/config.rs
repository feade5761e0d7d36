//! Host configuration
//!
//! Every setting is a flag with an environment override so the service can
//! be configured entirely from its container environment.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use leasehold_common::lease::DEFAULT_DEPLOY_LEASE;
use leasehold_common::{
    Error, LeaseLimits, Result, DEFAULT_CLEANUP_SCRIPT, DEFAULT_LINODE_API_URL,
};
use leasehold_registry::DenyList;

/// Settings shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Linode API token
    #[arg(long = "linode", env = "LEASEHOLD_LINODE_TOKEN", hide_env_values = true)]
    pub linode_token: String,

    /// Linode API endpoint
    #[arg(long, env = "LEASEHOLD_API_URL", default_value = DEFAULT_LINODE_API_URL)]
    pub api_url: String,

    /// Minutes between sweeps for expired clusters (0 disables sweeping)
    #[arg(long = "sweep", env = "LEASEHOLD_SWEEP_INTERVAL", default_value_t = 1)]
    pub sweep_interval: u64,

    /// Maximum number of clusters that may exist at once
    #[arg(long, env = "LEASEHOLD_MAX_CLUSTERS", default_value_t = 5)]
    pub max_clusters: usize,

    /// Maximum nodes in a deployed cluster
    #[arg(long, env = "LEASEHOLD_MAX_NODES", default_value_t = 5)]
    pub max_nodes: u32,

    /// Region used when a deploy does not name one
    #[arg(long, env = "LEASEHOLD_DEFAULT_REGION", default_value = "us-east")]
    pub default_region: String,

    /// Instance type used when a deploy does not name one
    #[arg(long, env = "LEASEHOLD_DEFAULT_INSTANCE", default_value = "g6-standard-2")]
    pub default_instance: String,

    /// Node count used when a deploy does not name one
    #[arg(long, env = "LEASEHOLD_DEFAULT_SIZE", default_value_t = 1)]
    pub default_size: u32,

    /// Kubernetes version used when a deploy does not name one
    #[arg(long, env = "LEASEHOLD_DEFAULT_K8S_VERSION", default_value = "1.18")]
    pub default_k8s_version: String,

    /// Cluster names to never touch
    ///
    /// Repeat the flag, or give a comma or space separated list.
    #[arg(long = "blacklist", env = "LEASEHOLD_BLACKLIST_CLUSTERS", value_delimiter = ',')]
    pub blacklist: Vec<String>,

    /// Script run against a cluster before it is deleted
    #[arg(long, env = "LEASEHOLD_CLEANUP_SCRIPT", default_value = DEFAULT_CLEANUP_SCRIPT)]
    pub cleanup_script: PathBuf,

    /// Emit JSON logs
    #[arg(long, env = "LEASEHOLD_LOG_JSON")]
    pub log_json: bool,
}

/// Values filled into a deploy when the operator leaves them out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployDefaults {
    /// Region
    pub region: String,
    /// Instance type
    pub instance_type: String,
    /// Node count
    pub node_count: u32,
    /// Kubernetes version
    pub k8s_version: String,
    /// Lease length in hours
    pub lease_hours: i64,
}

impl Settings {
    /// Check the settings for problems
    ///
    /// Reports every problem found in a single error.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.linode_token.trim().is_empty() {
            problems.push("missing Linode API token (--linode)".to_string());
        }
        if self.default_region.trim().is_empty() {
            problems.push("missing default region (--default-region)".to_string());
        }
        if self.default_instance.trim().is_empty() {
            problems.push("missing default instance type (--default-instance)".to_string());
        }
        if self.default_size < 1 {
            problems.push("invalid --default-size value: must be at least 1".to_string());
        } else if self.default_size > self.max_nodes {
            problems.push(format!(
                "invalid --default-size value: {} exceeds --max-nodes {}",
                self.default_size, self.max_nodes
            ));
        }

        if self.sweep_interval.checked_mul(60).is_none() {
            problems.push(format!(
                "invalid --sweep value: {} minutes is too long",
                self.sweep_interval
            ));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::config(problems.join("; ")))
        }
    }

    /// Names the registry must ignore
    pub fn deny_list(&self) -> DenyList {
        self.blacklist
            .iter()
            .flat_map(|entry| entry.split(|c: char| c == ',' || c.is_whitespace()))
            .filter(|name| !name.is_empty())
            .collect()
    }

    /// Limits applied to deploys
    pub fn limits(&self) -> LeaseLimits {
        LeaseLimits {
            max_nodes: self.max_nodes,
        }
    }

    /// Time between sweeps, or `None` if sweeping is disabled
    ///
    /// An interval too long to represent in seconds also disables sweeping;
    /// `validate` rejects it.
    pub fn sweep_period(&self) -> Option<Duration> {
        if self.sweep_interval == 0 {
            return None;
        }
        self.sweep_interval.checked_mul(60).map(Duration::from_secs)
    }

    /// Defaults for console deploys
    pub fn deploy_defaults(&self) -> DeployDefaults {
        DeployDefaults {
            region: self.default_region.clone(),
            instance_type: self.default_instance.clone(),
            node_count: self.default_size,
            k8s_version: self.default_k8s_version.clone(),
            lease_hours: DEFAULT_DEPLOY_LEASE.num_hours(),
        }
    }
}
