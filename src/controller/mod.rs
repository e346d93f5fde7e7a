//! Controller module for SeldonDeployment ingress reconciliation
//!
//! This module contains the controller loop, the desired Ingress builder and
//! the convergence step that persists Ingresses.

pub mod annotations;
pub mod conditions;
pub mod defaults;
pub mod ingress;
#[cfg(feature = "metrics")]
pub mod metrics;
mod reconciler;
pub mod store;

pub use defaults::{IngressDefaults, PathPolicy};
pub use ingress::{build_ingress, converge, IngressSettings, PathType, Protocol, ServiceNameFn};
pub use reconciler::{
    ingress_condition, run_controller, AppliedIngress, ControllerState, IngressReconciler,
};
pub use store::{apply_ingress, ApplyOutcome, IngressStore, KubeIngressStore};
