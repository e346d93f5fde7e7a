//! Ingress reconciler for SeldonDeployment resources
//!
//! [`IngressReconciler`] derives the Ingresses a deployment should have and
//! converges the cluster towards them. [`run_controller`] drives it from a
//! kube-rs controller and records the outcome on the deployment's status.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use k8s_openapi::api::networking::v1::Ingress;
use kube::{
    api::{Api, Patch, PatchParams},
    client::Client,
    runtime::{
        controller::{Action, Controller},
        watcher::Config,
    },
    ResourceExt,
};
use tracing::{debug, error, info, instrument, warn};

use super::conditions::{
    ingress_not_ready_condition, ingress_ready_condition, set_condition,
    REASON_INGRESS_DISABLED, REASON_INGRESS_FAILED, REASON_INGRESS_RECONCILED,
    REASON_NO_PREDICTORS,
};
use super::defaults::IngressDefaults;
use super::ingress::{build_ingress, IngressSettings, Protocol, ServiceNameFn};
#[cfg(feature = "metrics")]
use super::metrics;
use super::store::{apply_ingress, ApplyOutcome, IngressStore, KubeIngressStore, FIELD_MANAGER};
use crate::crd::{predictor_service_name, Condition, SeldonDeployment};
use crate::error::{Error, Result};

/// Requeue interval after a successful pass; drift on owned Ingresses
/// re-triggers reconciliation sooner through the watch.
const RESYNC_INTERVAL: Duration = Duration::from_secs(300);

/// One Ingress touched by a reconciliation pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppliedIngress {
    pub name: String,
    pub protocol: Protocol,
    pub outcome: ApplyOutcome,
}

/// Exposes a deployment's predictors through Ingress objects
#[derive(Clone, Debug)]
pub struct IngressReconciler {
    defaults: IngressDefaults,
    service_name: ServiceNameFn,
}

impl IngressReconciler {
    pub fn new(defaults: IngressDefaults) -> Self {
        Self {
            defaults,
            service_name: predictor_service_name,
        }
    }

    /// Replace the function deriving predictor Service names
    pub fn with_service_name(mut self, service_name: ServiceNameFn) -> Self {
        self.service_name = service_name;
        self
    }

    pub fn defaults(&self) -> &IngressDefaults {
        &self.defaults
    }

    pub fn settings(&self, sdep: &SeldonDeployment) -> IngressSettings {
        IngressSettings::resolve(sdep, &self.defaults)
    }

    /// Every Ingress the deployment should have, primary protocol first.
    ///
    /// Empty when ingress is disabled or the deployment has no predictors.
    pub fn desired_ingresses(&self, sdep: &SeldonDeployment) -> Result<Vec<(Protocol, Ingress)>> {
        let settings = self.settings(sdep);
        let mut desired = Vec::new();
        for protocol in settings.protocols() {
            if let Some(ingress) = build_ingress(sdep, &settings, protocol, self.service_name)? {
                desired.push((protocol, ingress));
            }
        }
        Ok(desired)
    }

    /// Converge the deployment's Ingresses.
    ///
    /// `Ok` means routing is ready; this includes the vacuous cases of ingress
    /// being disabled and of a deployment without predictors. The first failing
    /// protocol aborts the pass and its error is returned without retrying.
    #[instrument(skip(self, store, sdep), fields(name = %sdep.name_any(), namespace = sdep.namespace()))]
    pub async fn reconcile<S>(&self, store: &S, sdep: &SeldonDeployment) -> Result<Vec<AppliedIngress>>
    where
        S: IngressStore + ?Sized,
    {
        if !self.defaults.enabled {
            debug!("Kubernetes ingress disabled, nothing to do");
            return Ok(Vec::new());
        }

        let desired = self.desired_ingresses(sdep)?;
        if desired.is_empty() {
            debug!("No predictors to expose");
        }

        let mut applied = Vec::with_capacity(desired.len());
        for (protocol, ingress) in desired {
            let name = ingress.name_any();
            let outcome = apply_ingress(store, &ingress).await.map_err(|e| {
                error!("Unable to apply {} Ingress {}: {}", protocol, name, e);
                e
            })?;

            #[cfg(feature = "metrics")]
            metrics::inc_ingress_apply(protocol.port_name(), outcome.as_str());

            info!("Ingress {} {} ({})", name, outcome, protocol);
            applied.push(AppliedIngress {
                name,
                protocol,
                outcome,
            });
        }

        Ok(applied)
    }
}

/// IngressReady condition describing the result of a pass
pub fn ingress_condition(
    sdep: &SeldonDeployment,
    settings: &IngressSettings,
    result: &Result<Vec<AppliedIngress>>,
) -> Condition {
    let condition = match result {
        Err(e) => ingress_not_ready_condition(REASON_INGRESS_FAILED, &e.to_string()),
        Ok(_) if !settings.enabled => {
            ingress_ready_condition(REASON_INGRESS_DISABLED, "Kubernetes ingress is disabled")
        }
        Ok(applied) if applied.is_empty() => {
            ingress_ready_condition(REASON_NO_PREDICTORS, "No predictors to expose")
        }
        Ok(applied) => {
            let names: Vec<&str> = applied.iter().map(|a| a.name.as_str()).collect();
            ingress_ready_condition(
                REASON_INGRESS_RECONCILED,
                &format!("Ingress {} converged", names.join(", ")),
            )
        }
    };
    condition.with_observed_generation(sdep.metadata.generation)
}

/// Shared state for the controller
pub struct ControllerState {
    pub client: Client,
    pub ingress: IngressReconciler,
    pub store: KubeIngressStore,
    /// Namespace to watch, `None` for all namespaces
    pub namespace: Option<String>,
}

impl ControllerState {
    pub fn new(client: Client, defaults: IngressDefaults, namespace: Option<String>) -> Self {
        Self {
            store: KubeIngressStore::new(client.clone()),
            ingress: IngressReconciler::new(defaults),
            client,
            namespace,
        }
    }
}

/// Main entry point to start the controller
///
/// Returns immediately when ingress is disabled: nothing is watched and no
/// deployment status is written.
pub async fn run_controller(state: Arc<ControllerState>) -> Result<()> {
    if !state.ingress.defaults().enabled {
        info!("Kubernetes ingress disabled, SeldonDeployment ingress controller not started");
        return Ok(());
    }

    let client = state.client.clone();
    let (deployments, ingresses): (Api<SeldonDeployment>, Api<Ingress>) = match &state.namespace
    {
        Some(ns) => (
            Api::namespaced(client.clone(), ns),
            Api::namespaced(client.clone(), ns),
        ),
        None => (Api::all(client.clone()), Api::all(client.clone())),
    };

    info!(
        "Starting SeldonDeployment ingress controller (namespace: {})",
        state.namespace.as_deref().unwrap_or("<all>")
    );

    // Verify CRD exists
    match deployments.list(&Default::default()).await {
        Ok(_) => info!("SeldonDeployment CRD is available"),
        Err(e) => {
            error!(
                "SeldonDeployment CRD not found. Please install the CRD first: {:?}",
                e
            );
            return Err(Error::ConfigError(
                "SeldonDeployment CRD not installed".to_string(),
            ));
        }
    }

    Controller::new(deployments, Config::default())
        .owns::<Ingress>(ingresses, Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, state)
        .for_each(|res| async move {
            match res {
                Ok(obj) => debug!("Reconciled: {:?}", obj),
                Err(e) => warn!("Reconcile error: {:?}", e),
            }
        })
        .await;

    Ok(())
}

/// The main reconciliation function
///
/// Called whenever a SeldonDeployment or one of its Ingresses changes, and
/// when the requeue timer expires.
#[instrument(skip(sdep, ctx), fields(name = %sdep.name_any(), namespace = sdep.namespace()))]
async fn reconcile(sdep: Arc<SeldonDeployment>, ctx: Arc<ControllerState>) -> Result<Action> {
    if sdep.metadata.deletion_timestamp.is_some() {
        // Owned Ingresses are garbage collected through their owner reference
        return Ok(Action::await_change());
    }

    let started = Instant::now();
    let settings = ctx.ingress.settings(&sdep);
    let result = ctx.ingress.reconcile(&ctx.store, &sdep).await;

    let condition = ingress_condition(&sdep, &settings, &result);
    let status_result = update_ingress_condition(&ctx.client, &sdep, condition).await;

    #[cfg(feature = "metrics")]
    metrics::observe_reconcile_duration(started.elapsed().as_secs_f64());
    #[cfg(not(feature = "metrics"))]
    let _ = started;

    result?;
    status_result?;
    Ok(Action::requeue(RESYNC_INTERVAL))
}

/// Record the IngressReady condition, skipping the write when nothing changed
async fn update_ingress_condition(
    client: &Client,
    sdep: &SeldonDeployment,
    condition: Condition,
) -> Result<()> {
    let Some(patch) = ingress_condition_patch(sdep, condition)? else {
        return Ok(());
    };

    let namespace = sdep.namespace().unwrap_or_else(|| "default".to_string());
    let api: Api<SeldonDeployment> = Api::namespaced(client.clone(), &namespace);
    api.patch_status(
        &sdep.name_any(),
        &PatchParams::apply(FIELD_MANAGER),
        &Patch::Merge(&patch),
    )
    .await?;

    Ok(())
}

/// Status merge patch setting `condition`, `None` when it is already recorded.
///
/// A merge patch replaces the whole `status.conditions` array, so the patch
/// carries the observed `resourceVersion`: if another controller changed the
/// status since `sdep` was read, the write fails with a conflict and is
/// retried against a fresh copy instead of dropping its conditions.
pub(crate) fn ingress_condition_patch(
    sdep: &SeldonDeployment,
    condition: Condition,
) -> Result<Option<serde_json::Value>> {
    let mut conditions = sdep
        .status
        .as_ref()
        .map(|s| s.conditions.clone())
        .unwrap_or_default();
    if !set_condition(&mut conditions, condition) {
        return Ok(None);
    }

    let conditions = serde_json::to_value(&conditions)?;
    Ok(Some(serde_json::json!({
        "metadata": { "resourceVersion": sdep.metadata.resource_version },
        "status": { "conditions": conditions }
    })))
}

/// Error policy determines how to handle reconciliation errors
fn error_policy(sdep: Arc<SeldonDeployment>, error: &Error, _ctx: Arc<ControllerState>) -> Action {
    error!("Reconciliation error for {}: {:?}", sdep.name_any(), error);

    #[cfg(feature = "metrics")]
    metrics::inc_reconcile_error(error.kind());

    Action::requeue(retry_interval(error))
}

/// Shorter retry for errors that usually clear on their own
pub(crate) fn retry_interval(error: &Error) -> Duration {
    if error.is_retriable() {
        Duration::from_secs(15)
    } else {
        Duration::from_secs(60)
    }
}
