//! Provider client abstraction
//!
//! A trait-based boundary so the registry can be exercised against mocks in
//! tests while production code talks to the real provider API.

use async_trait::async_trait;

use leasehold_common::Error;

use crate::types::{ClusterId, CreateClusterRequest, EncodedCredentials, RemoteCluster, RemotePool};

/// Operations the registry needs from the cloud provider
///
/// Implementations surface provider failures verbatim; retrying is left to
/// the next periodic reconcile or sweep.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// List every cluster the account currently owns
    async fn list_clusters(&self) -> Result<Vec<RemoteCluster>, Error>;

    /// List the node pools of one cluster
    async fn list_pools(&self, id: ClusterId) -> Result<Vec<RemotePool>, Error>;

    /// Create a cluster
    ///
    /// Returns `Ok(None)` if the provider accepted the request but did not
    /// return the created cluster.
    async fn create_cluster(
        &self,
        request: &CreateClusterRequest,
    ) -> Result<Option<RemoteCluster>, Error>;

    /// Delete a cluster
    ///
    /// Deleting an identity the provider no longer knows is not an error.
    async fn delete_cluster(&self, id: ClusterId) -> Result<(), Error>;

    /// Fetch the transport-encoded credential bundle for a cluster
    async fn get_credentials(&self, id: ClusterId) -> Result<EncodedCredentials, Error>;
}
