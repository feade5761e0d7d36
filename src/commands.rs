//! Operator console
//!
//! Turns one line of operator input into one reply. Input is lowercased and
//! split on whitespace, then parsed with clap:
//!
//! ```text
//! help | info | list
//! renew NAME [--for HOURS]
//! expire NAME
//! deploy NAME [-v VERSION] [-r REGION] [-i TYPE] [-n NODES] [--for HOURS]
//! teardown NAME
//! access NAME
//! ```

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use leasehold_common::lease::{DEFAULT_RENEWAL, MAX_LEASE};
use leasehold_registry::{
    spawn_teardown, ClusterRecord, Decommissioner, DeployRequest, Registry,
};

use crate::config::DeployDefaults;

/// Reply for input that does not parse
pub const UNKNOWN_COMMAND: &str = "i have no clue what you are talking about...\n";

#[derive(Parser, Debug)]
#[command(
    name = "leasehold",
    no_binary_name = true,
    disable_help_flag = true,
    disable_help_subcommand = true,
    disable_version_flag = true
)]
struct Input {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    Help,
    Info,
    List,
    Renew {
        name: Option<String>,
        #[arg(long = "for", default_value_t = DEFAULT_RENEWAL.num_hours())]
        hours: i64,
    },
    Expire {
        name: Option<String>,
    },
    Deploy {
        name: Option<String>,
        #[arg(short = 'v', long = "version")]
        version: Option<String>,
        #[arg(short = 'r', long)]
        region: Option<String>,
        #[arg(short = 'i', long = "using")]
        instance: Option<String>,
        #[arg(short = 'n', long = "nodes")]
        nodes: Option<u32>,
        #[arg(long = "for")]
        hours: Option<i64>,
    },
    Teardown {
        name: Option<String>,
    },
    Access {
        name: Option<String>,
    },
}

fn parse(line: &str) -> Option<Command> {
    let lowered = line.to_lowercase();
    Input::try_parse_from(lowered.split_whitespace())
        .ok()
        .map(|input| input.command)
}

/// Console settings that do not live in the registry
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Maximum number of clusters that may exist at once
    pub max_clusters: usize,
    /// Minutes between sweeps, 0 if disabled
    pub sweep_minutes: u64,
    /// Values filled into deploys
    pub defaults: DeployDefaults,
}

/// Answers operator commands
pub struct Console {
    registry: Arc<Registry>,
    decommissioner: Arc<Decommissioner>,
    config: ConsoleConfig,
}

impl Console {
    /// Create a console over the given registry and pipeline
    pub fn new(
        registry: Arc<Registry>,
        decommissioner: Arc<Decommissioner>,
        config: ConsoleConfig,
    ) -> Self {
        Self {
            registry,
            decommissioner,
            config,
        }
    }

    /// Handle one line of input and produce the reply
    pub async fn handle(&self, line: &str, now: DateTime<Utc>) -> String {
        let Some(command) = parse(line) else {
            debug!(input = %line, "unrecognized console input");
            return UNKNOWN_COMMAND.to_string();
        };

        match command {
            Command::Help => help(),
            Command::Info => self.info(),
            Command::List => self.list(now).await,
            Command::Renew { name, hours } => match name {
                Some(name) => self.renew(&name, hours),
                None => usage("renew"),
            },
            Command::Expire { name } => match name {
                Some(name) => self.expire(&name, now),
                None => usage("expire"),
            },
            Command::Deploy { name: None, .. } => usage("deploy"),
            Command::Deploy {
                name: Some(name),
                version,
                region,
                instance,
                nodes,
                hours,
            } => {
                let defaults = &self.config.defaults;
                let request = DeployRequest {
                    name,
                    region: region.unwrap_or_else(|| defaults.region.clone()),
                    instance_type: instance.unwrap_or_else(|| defaults.instance_type.clone()),
                    node_count: nodes.unwrap_or(defaults.node_count),
                    k8s_version: version.unwrap_or_else(|| defaults.k8s_version.clone()),
                    lifetime: Duration::hours(hours.unwrap_or(defaults.lease_hours)),
                };
                self.deploy(request, now).await
            }
            Command::Teardown { name } => match name {
                Some(name) => self.teardown(&name),
                None => usage("teardown"),
            },
            Command::Access { name } => match name {
                Some(name) => self.access(&name).await,
                None => usage("access"),
            },
        }
    }

    fn info(&self) -> String {
        let mut reply = format!(
            "i'm allowed to deploy up to *{} clusters*,\n",
            self.config.max_clusters
        );
        let _ = writeln!(
            reply,
            "each of which can be (at most) *{} nodes* in size.",
            self.registry.limits().max_nodes
        );
        let deny_list = self.registry.deny_list();
        if !deny_list.is_empty() {
            let _ = writeln!(
                reply,
                "i'm forbidden from interacting with [{}]",
                deny_list.names().collect::<Vec<_>>().join(", ")
            );
        }
        if self.config.sweep_minutes > 0 {
            let _ = writeln!(
                reply,
                "i check for (and teardown!) expired clusters every *{} minutes*.",
                self.config.sweep_minutes
            );
        }
        reply
    }

    async fn list(&self, now: DateTime<Utc>) -> String {
        match self.registry.reconcile(now).await {
            Ok(records) => {
                let mut reply = format!("found {} cluster(s):\n", records.len());
                for record in &records {
                    let _ = writeln!(reply, "{}", format_record(record, now));
                }
                reply
            }
            Err(e) => oops(e),
        }
    }

    fn renew(&self, name: &str, hours: i64) -> String {
        if !lease_hours_allowed(hours) {
            return format!(
                "uh-oh; i'm afraid i can't let you renew a cluster for {} hours...\n",
                hours
            );
        }
        let Some(record) = self.registry.find(name) else {
            return not_found(name);
        };
        match record.renew(Duration::hours(hours)) {
            Ok(expires_at) => {
                info!(cluster = %name, %expires_at, "lease renewed from console");
                format!("ok.  i renewed *{}* for {} more hour(s)\n", record.name(), hours)
            }
            Err(e) => oops(e),
        }
    }

    fn expire(&self, name: &str, now: DateTime<Utc>) -> String {
        let Some(record) = self.registry.find(name) else {
            return not_found(name);
        };
        record.expire(now);
        info!(cluster = %name, "lease expired from console");
        format!("ok.  i expired *{}*\n", record.name())
    }

    async fn deploy(&self, request: DeployRequest, now: DateTime<Utc>) -> String {
        if self.registry.count() >= self.config.max_clusters {
            return "oof! unfortunately we're fresh out of space for new clusters...\n"
                .to_string();
        }
        let hours = request.lifetime.num_hours();
        if !lease_hours_allowed(hours) {
            return format!(
                "uh-oh; i'm afraid i can't let you deploy a cluster for {} hours...\n",
                hours
            );
        }
        let max_nodes = self.registry.limits().max_nodes;
        if request.node_count < 1 || request.node_count > max_nodes {
            return format!(
                "uh-oh; i'm afraid i can't let you deploy a {}-node cluster...\n",
                request.node_count
            );
        }

        match self.registry.deploy(&request, now).await {
            Ok(record) => format!("alright.  cluster *{}* is deploying.\n", record.name()),
            Err(e) => oops(e),
        }
    }

    fn teardown(&self, name: &str) -> String {
        let Some(record) = self.registry.find(name) else {
            return not_found(name);
        };
        let reply = format!("ok.  tearing down *{}*\n", record.name());
        spawn_teardown(Arc::clone(&self.decommissioner), record);
        reply
    }

    async fn access(&self, name: &str) -> String {
        let Some(record) = self.registry.find(name) else {
            return not_found(name);
        };
        match self.decommissioner.get_credentials(&record).await {
            Ok(kubeconfig) => format!("*{}*:\n```{}```\n", record.name(), kubeconfig),
            Err(e) => oops(e),
        }
    }
}

/// One listing line for a record
///
/// Hours left are rounded to the nearest hour.
pub fn format_record(record: &ClusterRecord, now: DateTime<Utc>) -> String {
    if record.is_expired(now) {
        return format!("*{}* [{}-node] _EXPIRED_", record.name(), record.node_count());
    }
    let hours = (record.remaining(now) + Duration::minutes(30)).num_hours();
    let left = if hours == 0 {
        "less than 30m".to_string()
    } else {
        format!("{}h", hours)
    };
    format!("*{}* [{}-node] _{} left_", record.name(), record.node_count(), left)
}

/// Console line announcing a swept cluster
pub fn expiry_announcement(name: &str) -> String {
    format!("*{}* expired, so i tore it down.\n", name)
}

fn help() -> String {
    [
        "hi there! i can help deploy Linode LKE instances.",
        "",
        "say `info` to get my current limits / parameters.",
        "say `list` to see currently deployed lab clusters.",
        "say `deploy NAME` to deploy a new lab cluster.",
        "say `renew NAME` to renew the lease on a cluster.",
        "say `expire NAME` to drop the lease on a cluster.",
        "say `teardown NAME` to decommission a lab cluster.",
        "say `access NAME` to get a cluster's kubeconfig",
        "",
    ]
    .join("\n")
}

fn lease_hours_allowed(hours: i64) -> bool {
    hours >= 1 && hours <= MAX_LEASE.num_hours()
}

fn usage(command: &str) -> String {
    format!("hrmm.  try `{} NAME-OF-CLUSTER` instead...\n", command)
}

fn not_found(name: &str) -> String {
    format!("i was not able to find the cluster *{}*\n", name)
}

fn oops(e: impl std::fmt::Display) -> String {
    format!("oops: {}\n", e)
}
