//! SeldonDeployment Custom Resource Definition
//!
//! A SeldonDeployment describes one or more model-serving predictors. This
//! operator only reads the parts it needs to expose those predictors through
//! Ingress objects; unknown fields are ignored on deserialization.

use std::collections::BTreeMap;

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{Condition, PredictorSpec};

/// Longest name accepted for a Kubernetes Service (DNS-1035 label)
const MAX_SERVICE_NAME_LEN: usize = 63;

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "machinelearning.seldon.io",
    version = "v1",
    kind = "SeldonDeployment",
    namespaced,
    status = "SeldonDeploymentStatus",
    shortname = "sdep",
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"Ingress","type":"string","jsonPath":".status.conditions[?(@.type=='IngressReady')].status"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SeldonDeploymentSpec {
    /// Optional display name of the deployment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Ordered list of predictors; the first one is the primary backend
    #[serde(default)]
    pub predictors: Vec<PredictorSpec>,

    /// Free-form annotations. Takes precedence over `metadata.annotations`
    /// when resolving `seldon.io/*` settings. Only these are copied onto owned
    /// Ingresses; `metadata.annotations` never are.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    /// Wire protocol served by the predictors (e.g. "seldon", "v2")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

/// Status subresource of a SeldonDeployment
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeldonDeploymentStatus {
    /// Overall state reported by the workload controller ("Available", "Creating", ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl SeldonDeployment {
    /// Look up an annotation, preferring the spec's annotations over object metadata.
    ///
    /// Empty values count as absent.
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.spec
            .annotations
            .get(key)
            .filter(|v| !v.is_empty())
            .or_else(|| self.annotations().get(key).filter(|v| !v.is_empty()))
            .map(String::as_str)
    }
}

/// Derive the Service name fronting a predictor of a deployment.
///
/// The name is `<deployment>-<predictor>` reduced to a valid DNS-1035 label:
/// lower-cased, invalid characters replaced by `-`, at most 63 characters and
/// never ending in `-`.
pub fn predictor_service_name(sdep: &SeldonDeployment, predictor: &PredictorSpec) -> String {
    let raw = format!("{}-{}", sdep.name_any(), predictor.name);
    let mut name: String = raw
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .take(MAX_SERVICE_NAME_LEN)
        .collect();
    while name.ends_with('-') {
        name.pop();
    }
    name
}
