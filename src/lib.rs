//! Seldon ingress operator
//!
//! Exposes the predictors of `SeldonDeployment` resources through Kubernetes
//! `Ingress` objects, one for HTTP and optionally one for gRPC, configured by
//! process-wide defaults and `seldon.io/ingress-*` annotations.

pub mod controller;
pub mod crd;
pub mod error;

#[cfg(feature = "rest-api")]
pub mod rest_api;

pub use crate::error::{Error, Result};
