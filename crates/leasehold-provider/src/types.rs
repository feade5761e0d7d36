//! Provider wire types
//!
//! Field names follow the Linode API v4 LKE resources.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provider-assigned cluster identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(pub u64);

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ClusterId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A cluster as reported by the provider listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCluster {
    /// Provider-assigned identity
    pub id: ClusterId,
    /// User-facing cluster name
    pub label: String,
    /// Region the cluster runs in (e.g. "us-east")
    pub region: String,
    /// Kubernetes version (e.g. "1.18")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k8s_version: Option<String>,
    /// When the provider created the cluster
    #[serde(default, with = "provider_time", skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    /// When the provider last updated the cluster
    #[serde(default, with = "provider_time", skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
}

impl RemoteCluster {
    /// Timestamp a discovered cluster's lease is measured from
    ///
    /// Prefers the last update, then creation, then `fallback`.
    pub fn lease_base(&self, fallback: DateTime<Utc>) -> DateTime<Utc> {
        self.updated.or(self.created).unwrap_or(fallback)
    }
}

/// A node pool belonging to a cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePool {
    /// Provider-assigned pool identity
    #[serde(default)]
    pub id: u64,
    /// Number of nodes in the pool
    pub count: u32,
    /// Instance type of the pool's nodes (e.g. "g6-standard-2")
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
}

/// One node pool in a create request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePoolRequest {
    /// Instance type of the pool's nodes
    #[serde(rename = "type")]
    pub instance_type: String,
    /// Number of nodes
    pub count: u32,
}

/// Body of a cluster create call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateClusterRequest {
    /// Cluster name
    pub label: String,
    /// Region to create the cluster in
    pub region: String,
    /// Kubernetes version
    pub k8s_version: String,
    /// Node pools to create with the cluster
    pub node_pools: Vec<NodePoolRequest>,
}

/// Base64-encoded credential bundle as returned by the provider
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedCredentials {
    /// Base64 of the kubeconfig YAML
    pub kubeconfig: String,
}

// Keep credentials out of debug logs
impl fmt::Debug for EncodedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedCredentials")
            .field("kubeconfig", &format_args!("<{} bytes>", self.kubeconfig.len()))
            .finish()
    }
}

/// Provider timestamps carry no zone (`2020-07-01T12:00:00`) and are UTC.
/// RFC 3339 is accepted too.
mod provider_time {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => serializer.serialize_str(&ts.format(FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(raw) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        if let Ok(naive) = NaiveDateTime::parse_from_str(&raw, FORMAT) {
            return Ok(Some(naive.and_utc()));
        }
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| Some(ts.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom)
    }
}
