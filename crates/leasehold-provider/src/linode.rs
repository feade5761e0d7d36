//! Linode Kubernetes Engine client
//!
//! Talks to the LKE endpoints of the Linode API v4 with a personal access
//! token. Listing follows the API's `page`/`pages` pagination.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use leasehold_common::{Error, DEFAULT_LINODE_API_URL};

use crate::client::ProviderClient;
use crate::types::{ClusterId, CreateClusterRequest, EncodedCredentials, RemoteCluster, RemotePool};

const PAGE_SIZE: u32 = 500;

/// One page of a Linode collection response
#[derive(Debug, Deserialize)]
struct Page<T> {
    data: Vec<T>,
    #[serde(default = "first_page")]
    page: u32,
    #[serde(default = "first_page")]
    pages: u32,
}

fn first_page() -> u32 {
    1
}

/// Linode error envelope: `{"errors": [{"reason": "...", "field": "..."}]}`
#[derive(Debug, Deserialize)]
struct ApiErrors {
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    reason: String,
    #[serde(default)]
    field: Option<String>,
}

/// Render a Linode error body as one message, falling back to the raw text
fn error_message(status: StatusCode, body: &str) -> String {
    let reasons: Vec<String> = serde_json::from_str::<ApiErrors>(body)
        .map(|e| {
            e.errors
                .into_iter()
                .map(|err| match err.field {
                    Some(field) => format!("{}: {}", field, err.reason),
                    None => err.reason,
                })
                .collect()
        })
        .unwrap_or_default();

    if !reasons.is_empty() {
        return reasons.join("; ");
    }
    let body = body.trim();
    if body.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, body)
    }
}

/// LKE client backed by reqwest
#[derive(Clone)]
pub struct LinodeClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl LinodeClient {
    /// Create a client against the public Linode API
    pub fn new(token: impl Into<String>) -> Result<Self, Error> {
        Self::with_base_url(token, DEFAULT_LINODE_API_URL)
    }

    /// Create a client against a specific API endpoint
    pub fn with_base_url(
        token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("leasehold/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::provider("connect", format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.url(path))
            .bearer_auth(&self.token)
    }

    async fn send(
        &self,
        request: RequestBuilder,
        operation: &str,
        cluster: &str,
    ) -> Result<Response, Error> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::provider_for(operation, cluster, e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(Error::provider_status(
            operation,
            cluster,
            status.as_u16(),
            error_message(status, &body),
        ))
    }

    async fn json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        operation: &str,
        cluster: &str,
    ) -> Result<T, Error> {
        self.send(request, operation, cluster)
            .await?
            .json::<T>()
            .await
            .map_err(|e| Error::provider_for(operation, cluster, format!("invalid response: {}", e)))
    }

    async fn list_all<T: DeserializeOwned>(
        &self,
        path: &str,
        operation: &str,
        cluster: &str,
    ) -> Result<Vec<T>, Error> {
        let mut items = Vec::new();
        let mut page = 1u32;
        loop {
            let request = self
                .request(Method::GET, path)
                .query(&[("page", page), ("page_size", PAGE_SIZE)]);
            let body: Page<T> = self.json(request, operation, cluster).await?;
            items.extend(body.data);
            if body.page >= body.pages {
                return Ok(items);
            }
            page = body.page + 1;
        }
    }
}

#[async_trait]
impl ProviderClient for LinodeClient {
    async fn list_clusters(&self) -> Result<Vec<RemoteCluster>, Error> {
        let clusters: Vec<RemoteCluster> = self
            .list_all("/lke/clusters", "list_clusters", leasehold_common::error::UNKNOWN_CONTEXT)
            .await?;
        debug!(count = clusters.len(), "listed LKE clusters");
        Ok(clusters)
    }

    async fn list_pools(&self, id: ClusterId) -> Result<Vec<RemotePool>, Error> {
        self.list_all(
            &format!("/lke/clusters/{}/pools", id),
            "list_pools",
            &id.to_string(),
        )
        .await
    }

    async fn create_cluster(
        &self,
        request: &CreateClusterRequest,
    ) -> Result<Option<RemoteCluster>, Error> {
        let response = self
            .send(
                self.request(Method::POST, "/lke/clusters").json(request),
                "create_cluster",
                &request.label,
            )
            .await?;

        let body = response.text().await.map_err(|e| {
            Error::provider_for("create_cluster", &request.label, e.to_string())
        })?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        let cluster = serde_json::from_str::<Option<RemoteCluster>>(&body).map_err(|e| {
            Error::provider_for(
                "create_cluster",
                &request.label,
                format!("invalid response: {}", e),
            )
        })?;
        Ok(cluster)
    }

    async fn delete_cluster(&self, id: ClusterId) -> Result<(), Error> {
        let cluster = id.to_string();
        match self
            .send(
                self.request(Method::DELETE, &format!("/lke/clusters/{}", id)),
                "delete_cluster",
                &cluster,
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(Error::Provider {
                status: Some(404), ..
            }) => {
                debug!(cluster_id = %id, "cluster already gone, treating delete as done");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn get_credentials(&self, id: ClusterId) -> Result<EncodedCredentials, Error> {
        self.json(
            self.request(Method::GET, &format!("/lke/clusters/{}/kubeconfig", id)),
            "get_credentials",
            &id.to_string(),
        )
        .await
    }
}
