//! Error types for leasehold
//!
//! Errors are structured with fields to aid debugging in production.
//! Variants carry the cluster name and the provider operation where one is
//! known, so a log line is enough to tell which call failed for which cluster.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for leasehold operations
#[derive(Debug, Error)]
pub enum Error {
    /// Provider API or transport error
    #[error("provider error during {operation} for {cluster}: {message}")]
    Provider {
        /// Provider call that failed (e.g. "list_clusters")
        operation: String,
        /// Name or identity of the cluster involved
        cluster: String,
        /// Description of what failed
        message: String,
        /// HTTP status returned by the provider, if any
        status: Option<u16>,
    },

    /// The create call succeeded but the provider returned no cluster
    #[error("provider returned no cluster after creating {name}")]
    NoClusterReturned {
        /// Requested cluster name
        name: String,
    },

    /// Precondition violation (lifetime, node count, renewal bounds)
    #[error("validation error for {cluster}: {message}")]
    Validation {
        /// Name of the cluster the request was about
        cluster: String,
        /// Description of what's invalid
        message: String,
        /// The invalid field (e.g. "lifetime", "node_count")
        field: Option<String>,
    },

    /// Credential bundle could not be fetched or decoded
    #[error("credentials error for {cluster}: {message}")]
    Credentials {
        /// Name of the cluster
        cluster: String,
        /// Description of what failed
        message: String,
    },

    /// Cleanup script could not be launched or failed hard
    #[error("cleanup error for {cluster}: {message}")]
    Cleanup {
        /// Name of the cluster being decommissioned
        cluster: String,
        /// Description of what failed
        message: String,
        /// Exit code of the script, if it ran to completion
        exit_code: Option<i32>,
    },

    /// Host configuration error
    #[error("configuration error: {message}")]
    Config {
        /// Description of what's wrong
        message: String,
    },
}

impl Error {
    /// Create a provider error for an operation without cluster context
    pub fn provider(operation: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Provider {
            operation: operation.into(),
            cluster: UNKNOWN_CONTEXT.to_string(),
            message: msg.into(),
            status: None,
        }
    }

    /// Create a provider error for an operation on a specific cluster
    pub fn provider_for(
        operation: impl Into<String>,
        cluster: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Provider {
            operation: operation.into(),
            cluster: cluster.into(),
            message: msg.into(),
            status: None,
        }
    }

    /// Create a provider error carrying the HTTP status code
    pub fn provider_status(
        operation: impl Into<String>,
        cluster: impl Into<String>,
        status: u16,
        msg: impl Into<String>,
    ) -> Self {
        Self::Provider {
            operation: operation.into(),
            cluster: cluster.into(),
            message: msg.into(),
            status: Some(status),
        }
    }

    /// Create a validation error for a cluster
    pub fn validation_for(cluster: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            cluster: cluster.into(),
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error for a cluster and field
    pub fn validation_for_field(
        cluster: impl Into<String>,
        field: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Validation {
            cluster: cluster.into(),
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create a credentials error
    pub fn credentials(cluster: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Credentials {
            cluster: cluster.into(),
            message: msg.into(),
        }
    }

    /// Create a cleanup error for a script that never ran to completion
    pub fn cleanup(cluster: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Cleanup {
            cluster: cluster.into(),
            message: msg.into(),
            exit_code: None,
        }
    }

    /// Create a cleanup error for a script that exited with an unexpected code
    pub fn cleanup_exit(cluster: impl Into<String>, exit_code: i32) -> Self {
        Self::Cleanup {
            cluster: cluster.into(),
            message: format!("cleanup script exited {}", exit_code),
            exit_code: Some(exit_code),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Check if this error is worth retrying on the next periodic pass
    ///
    /// Validation and configuration errors need a different request.
    /// Provider 4xx responses (other than 429) will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Provider { status, .. } => match status {
                Some(429) => true,
                Some(code) => !(400..500).contains(code),
                None => true,
            },
            Error::NoClusterReturned { .. } => false,
            Error::Validation { .. } => false,
            Error::Credentials { .. } => true,
            Error::Cleanup { .. } => true,
            Error::Config { .. } => false,
        }
    }
}
