//! Access to custom resources on a cluster.
//!
//! The migration only needs two calls, listing every object of a resource in a namespace and
//! creating one. [`ClusterClient`] captures those so the driver can run against an in-memory
//! double in tests; [`KubeClient`] is the real implementation on top of the [`kube`] crate.

use core::fmt;
use std::path::Path;

use async_trait::async_trait;
use kube::{
    Api, Client, Config,
    api::{ApiResource, DynamicObject, GroupVersionKind, ListParams, PostParams},
    config::{InferConfigError, KubeConfigOptions, Kubeconfig, KubeconfigError},
};

use crate::{Record, Str};

/// One side of a migration: a namespaced custom resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    pub group: Str,
    pub version: Str,
    pub kind: Str,
    pub plural: Str,
    pub namespace: Str,
}

impl ResourceRef {
    pub fn api_version(&self) -> Str {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            compact_str::format_compact!("{}/{}", self.group, self.version)
        }
    }

    fn api_resource(&self) -> ApiResource {
        let gvk = GroupVersionKind::gvk(&self.group, &self.version, &self.kind);
        ApiResource::from_gvk_with_plural(&gvk, &self.plural)
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}.{} in {}", self.plural, self.version, self.namespace)
        } else {
            write!(
                f,
                "{}.{}.{} in {}",
                self.plural, self.version, self.group, self.namespace
            )
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("kubernetes api request failed: {0}")]
    Kube(#[from] kube::Error),
    #[error("loading kubeconfig: {0}")]
    Kubeconfig(#[from] KubeconfigError),
    #[error("inferring cluster configuration: {0}")]
    InferConfig(#[from] InferConfigError),
    #[error("converting custom object: {0}")]
    Serde(#[from] serde_json::Error),
}

#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Lists every object of `resource` in its namespace.
    async fn list(&self, resource: &ResourceRef) -> Result<Vec<Record>, ClusterError>;

    /// Creates `body` as a new object of `resource` and returns what the server stored.
    async fn create(&self, resource: &ResourceRef, body: &Record) -> Result<Record, ClusterError>;
}

pub struct KubeClient {
    client: Client,
    cluster_url: String,
}

impl KubeClient {
    /// Connects using the ambient configuration (in-cluster, `$KUBECONFIG` or `~/.kube/config`).
    pub async fn infer() -> Result<Self, ClusterError> {
        let config = Config::infer().await?;
        Self::from_config(config)
    }

    pub async fn from_kubeconfig(path: &Path) -> Result<Self, ClusterError> {
        let kubeconfig = Kubeconfig::read_from(path)?;
        let config =
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?;
        Self::from_config(config)
    }

    fn from_config(config: Config) -> Result<Self, ClusterError> {
        let cluster_url = config.cluster_url.to_string();
        let client = Client::try_from(config)?;
        Ok(KubeClient {
            client,
            cluster_url,
        })
    }

    pub fn cluster_url(&self) -> &str {
        &self.cluster_url
    }

    fn api(&self, resource: &ResourceRef) -> Api<DynamicObject> {
        Api::namespaced_with(
            self.client.clone(),
            &resource.namespace,
            &resource.api_resource(),
        )
    }
}

#[async_trait]
impl ClusterClient for KubeClient {
    #[tracing::instrument(skip_all, level = "debug", fields(resource = %resource))]
    async fn list(&self, resource: &ResourceRef) -> Result<Vec<Record>, ClusterError> {
        let list = self.api(resource).list(&ListParams::default()).await?;
        tracing::debug!(count = list.items.len(), "listed custom objects");
        list.items
            .into_iter()
            .map(|obj| serde_json::to_value(obj).map_err(Into::into))
            .collect()
    }

    #[tracing::instrument(skip_all, level = "debug", fields(resource = %resource))]
    async fn create(&self, resource: &ResourceRef, body: &Record) -> Result<Record, ClusterError> {
        let obj = serde_json::from_value::<DynamicObject>(body.clone())?;
        let created = self.api(resource).create(&PostParams::default(), &obj).await?;
        Ok(serde_json::to_value(created)?)
    }
}
