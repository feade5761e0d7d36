//! Common types for leasehold: errors, lease arithmetic, and telemetry

#![deny(missing_docs)]

pub mod error;
pub mod lease;
pub mod telemetry;

pub use error::Error;
pub use lease::LeaseLimits;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Environment variable the cleanup script reads its credentials from
pub const CREDENTIALS_ENV_VAR: &str = "KUBECONFIG";

/// Default location of the external cleanup script
pub const DEFAULT_CLEANUP_SCRIPT: &str = "/usr/bin/cleanup";

/// Default Linode API endpoint
pub const DEFAULT_LINODE_API_URL: &str = "https://api.linode.com/v4";
