//! Persistence of Ingress objects
//!
//! [`apply_ingress`] is the read-modify-write step: fetch the current Ingress,
//! [`converge`] it towards the desired one, and write only when something
//! changed. The API server sits behind [`IngressStore`] so the step can be
//! exercised without a cluster.

use std::fmt;

use async_trait::async_trait;
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{Api, PostParams};
use kube::{Client, ResourceExt};
use tracing::{debug, info, instrument};

#[cfg(test)]
use mockall::automock;

use super::ingress::converge;
use crate::error::{Error, Result};

/// Field manager recorded on writes
pub const FIELD_MANAGER: &str = "seldon-ingress-operator";

/// Access to Ingress objects in the cluster
#[cfg_attr(test, automock)]
#[async_trait]
pub trait IngressStore: Send + Sync {
    /// Get an Ingress, `None` when it does not exist
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Ingress>>;

    async fn create(&self, ingress: &Ingress) -> Result<Ingress>;

    /// Replace an existing Ingress; `resourceVersion` guards against lost updates
    async fn replace(&self, ingress: &Ingress) -> Result<Ingress>;
}

/// [`IngressStore`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeIngressStore {
    client: Client,
}

impl KubeIngressStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api_for(&self, ingress: &Ingress) -> Result<Api<Ingress>> {
        let namespace = ingress.namespace().ok_or_else(|| {
            Error::ConfigError(format!("Ingress {} has no namespace", ingress.name_any()))
        })?;
        Ok(Api::namespaced(self.client.clone(), &namespace))
    }
}

fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..Default::default()
    }
}

#[async_trait]
impl IngressStore for KubeIngressStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Ingress>> {
        let api: Api<Ingress> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create(&self, ingress: &Ingress) -> Result<Ingress> {
        let api = self.api_for(ingress)?;
        Ok(api.create(&post_params(), ingress).await?)
    }

    async fn replace(&self, ingress: &Ingress) -> Result<Ingress> {
        let api = self.api_for(ingress)?;
        Ok(api
            .replace(&ingress.name_any(), &post_params(), ingress)
            .await?)
    }
}

/// What [`apply_ingress`] did to the cluster
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    Created,
    Updated,
    Unchanged,
}

impl ApplyOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            ApplyOutcome::Created => "created",
            ApplyOutcome::Updated => "updated",
            ApplyOutcome::Unchanged => "unchanged",
        }
    }
}

impl fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Converge the cluster's Ingress to `desired`, writing only when needed.
///
/// Errors from the store are returned as-is; retrying is the caller's job.
#[instrument(skip(store, desired), fields(name = %desired.name_any(), namespace = desired.namespace()))]
pub async fn apply_ingress<S>(store: &S, desired: &Ingress) -> Result<ApplyOutcome>
where
    S: IngressStore + ?Sized,
{
    let name = desired.name_any();
    let namespace = desired
        .namespace()
        .ok_or_else(|| Error::ConfigError(format!("Ingress {name} has no namespace")))?;

    let observed = store.get(&namespace, &name).await?;
    let converged = converge(observed.as_ref(), desired);

    match observed {
        None => {
            info!("Creating Ingress {}/{}", namespace, name);
            store.create(&converged).await?;
            Ok(ApplyOutcome::Created)
        }
        Some(current) if current == converged => {
            debug!("Ingress {}/{} already up to date", namespace, name);
            Ok(ApplyOutcome::Unchanged)
        }
        Some(_) => {
            info!("Updating Ingress {}/{}", namespace, name);
            store.replace(&converged).await?;
            Ok(ApplyOutcome::Updated)
        }
    }
}
