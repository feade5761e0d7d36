//! Provider boundary for leasehold
//!
//! This crate provides:
//! - `ProviderClient`, the trait the registry uses to talk to the cloud
//! - Wire types for clusters, node pools, create requests and credentials
//! - `LinodeClient`, the Linode Kubernetes Engine implementation

#![deny(missing_docs)]

pub mod client;
pub mod linode;
pub mod types;

pub use client::ProviderClient;

pub use linode::LinodeClient;
pub use types::{
    ClusterId, CreateClusterRequest, EncodedCredentials, NodePoolRequest, RemoteCluster,
    RemotePool,
};
