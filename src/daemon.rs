//! Long-running host process
//!
//! Wires the Linode client, registry and teardown pipeline together, then
//! runs two loops until ctrl-c or end of input:
//! - a timer that reconciles and sweeps expired leases
//! - the operator console on stdin/stdout

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use leasehold_common::Result;
use leasehold_provider::{LinodeClient, ProviderClient};
use leasehold_registry::{
    CleanupRunner, Decommissioner, ProcessCleanupRunner, Registry, Sweeper,
};

use crate::commands::{expiry_announcement, format_record, Console, ConsoleConfig};
use crate::config::Settings;

/// The assembled registry, pipeline and sweeper
pub struct Services {
    /// Cluster registry
    pub registry: Arc<Registry>,
    /// Teardown pipeline
    pub decommissioner: Arc<Decommissioner>,
    /// Expired-lease sweeper
    pub sweeper: Arc<Sweeper>,
}

impl Services {
    /// Assemble services over an arbitrary provider and cleanup step
    pub fn new(
        provider: Arc<dyn ProviderClient>,
        runner: Arc<dyn CleanupRunner>,
        settings: &Settings,
    ) -> Self {
        let registry = Arc::new(Registry::new(
            Arc::clone(&provider),
            settings.deny_list(),
            settings.limits(),
        ));
        let decommissioner = Arc::new(Decommissioner::new(provider, runner));
        let sweeper = Arc::new(Sweeper::new(
            Arc::clone(&registry),
            Arc::clone(&decommissioner),
        ));
        Self {
            registry,
            decommissioner,
            sweeper,
        }
    }

    /// Assemble services against Linode and the configured cleanup script
    pub fn connect(settings: &Settings) -> Result<Self> {
        let provider = LinodeClient::with_base_url(&settings.linode_token, &settings.api_url)?;
        let runner = ProcessCleanupRunner::new(&settings.cleanup_script);
        Ok(Self::new(Arc::new(provider), Arc::new(runner), settings))
    }

    /// Console bound to these services
    pub fn console(&self, settings: &Settings) -> Console {
        Console::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.decommissioner),
            ConsoleConfig {
                max_clusters: settings.max_clusters,
                sweep_minutes: settings.sweep_interval,
                defaults: settings.deploy_defaults(),
            },
        )
    }

    /// Reconcile, then sweep
    ///
    /// Returns the names of clusters whose leases newly lapsed.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        self.registry.reconcile(now).await?;
        Ok(self.sweeper.sweep(now))
    }
}

/// Start the periodic reconcile and sweep task
///
/// Each newly expired cluster is passed to `announce`.
pub fn start_sweeping<F>(services: Arc<Services>, period: Duration, announce: F) -> JoinHandle<()>
where
    F: Fn(&str) + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // First tick fires immediately; startup already reconciled
        interval.tick().await;

        loop {
            interval.tick().await;
            debug!("sweeping expired clusters");
            match services.sweep_once(Utc::now()).await {
                Ok(names) => {
                    for name in names {
                        info!(cluster = %name, "swept expired cluster");
                        announce(&name);
                    }
                }
                Err(e) => warn!(error = %e, "reconcile before sweep failed, skipping sweep"),
            }
        }
    })
}

/// Run the service until ctrl-c or end of stdin
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let services = Arc::new(Services::connect(&settings)?);
    let console = services.console(&settings);

    let listed = services
        .registry
        .reconcile(Utc::now())
        .await
        .context("initial reconcile failed")?;
    info!(clusters = listed.len(), "leasehold ready");
    println!("leasehold ready, ^C exits");

    let sweeper = match settings.sweep_period() {
        Some(period) => {
            println!(
                "sweeping expired clusters every {} minutes.",
                settings.sweep_interval
            );
            Some(start_sweeping(Arc::clone(&services), period, |name| {
                print!("{}", expiry_announcement(name));
            }))
        }
        None => {
            info!("sweeping disabled");
            None
        }
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => print!("{}", console.handle(&line, Utc::now()).await),
                Ok(None) => {
                    info!("console input closed");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "failed to read console input");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    if let Some(handle) = sweeper {
        handle.abort();
    }
    info!("leasehold shutting down");
    Ok(())
}

/// Reconcile once and print the listing
pub async fn list(settings: Settings) -> anyhow::Result<()> {
    let services = Services::connect(&settings)?;
    let now = Utc::now();
    let records = services
        .registry
        .reconcile(now)
        .await
        .context("failed to list clusters")?;

    println!("found {} cluster(s):", records.len());
    for record in &records {
        println!("{}", format_record(record, now));
    }
    Ok(())
}
