//! Custom Resource Definitions read by the operator
//!
//! Only the SeldonDeployment CRD is modelled; Ingress objects come from k8s-openapi.

mod seldon_deployment;
pub mod types;


pub use seldon_deployment::{
    predictor_service_name, SeldonDeployment, SeldonDeploymentSpec, SeldonDeploymentStatus,
};
pub use types::*;
