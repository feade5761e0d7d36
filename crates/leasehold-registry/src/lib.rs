//! Cluster registry and lease lifecycle for leasehold
//!
//! This crate provides:
//! - `ClusterRecord`, the leased view of one provider cluster
//! - `Registry`, which reconciles records against the provider and deploys new clusters
//! - `Decommissioner`, the credentials -> cleanup -> delete teardown pipeline
//! - `Sweeper`, which launches teardowns for lapsed leases

#![deny(missing_docs)]

pub mod decommission;
pub mod deny_list;
pub mod provision;
pub mod record;
pub mod registry;
pub mod sweeper;

#[cfg(test)]
mod testing;

pub use decommission::{
    spawn_teardown, CleanupOutput, CleanupRunner, Decommissioner, ProcessCleanupRunner,
    TeardownOutcome,
};
pub use deny_list::DenyList;
pub use provision::DeployRequest;
pub use record::{ClusterRecord, ClusterStatus};
pub use registry::Registry;
pub use sweeper::{SweepPass, Sweeper};
