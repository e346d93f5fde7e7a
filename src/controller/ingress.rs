//! Desired Ingress state for a SeldonDeployment
//!
//! [`IngressSettings::resolve`] layers the deployment's `seldon.io/ingress-*`
//! annotations over the process-wide [`IngressDefaults`]. [`build_ingress`]
//! turns a deployment plus settings into the Ingress that should exist for one
//! protocol, and [`converge`] rewrites an observed Ingress into that shape.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::{Resource, ResourceExt};
use tracing::warn;

use super::annotations::{
    get_annotation, ANNOTATION_BACKEND_PROTOCOL, ANNOTATION_INGRESS_CLASS_NAME,
    ANNOTATION_INGRESS_HOST, ANNOTATION_INGRESS_PATH, ANNOTATION_INGRESS_PATH_TYPE,
    ANNOTATION_REWRITE_TARGET,
};
use super::defaults::{IngressDefaults, PathPolicy};
use crate::crd::{PredictorSpec, SeldonDeployment};
use crate::error::{Error, Result};

/// Derives the Service name of a predictor
pub type ServiceNameFn = fn(&SeldonDeployment, &PredictorSpec) -> String;

/// Transport a predictor is exposed over. Each gets its own Ingress.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Protocol {
    Http,
    Grpc,
}

impl Protocol {
    /// Name of the predictor Service port for this protocol
    pub fn port_name(self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Grpc => "grpc",
        }
    }

    pub fn is_primary(self) -> bool {
        self == Protocol::Http
    }

    /// Ingress name for a deployment: the deployment name for HTTP,
    /// suffixed with the protocol otherwise.
    pub fn ingress_name(self, deployment_name: &str) -> String {
        if self.is_primary() {
            deployment_name.to_string()
        } else {
            format!("{}-{}", deployment_name, self.port_name())
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.port_name())
    }
}

/// Matching semantics of an Ingress path
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathType {
    Exact,
    Prefix,
    ImplementationSpecific,
}

impl PathType {
    pub fn as_str(self) -> &'static str {
        match self {
            PathType::Exact => "Exact",
            PathType::Prefix => "Prefix",
            PathType::ImplementationSpecific => "ImplementationSpecific",
        }
    }
}

impl fmt::Display for PathType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PathType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Exact" => Ok(PathType::Exact),
            "Prefix" => Ok(PathType::Prefix),
            "ImplementationSpecific" => Ok(PathType::ImplementationSpecific),
            other => Err(Error::ConfigError(format!(
                "unknown ingress path type {other:?}"
            ))),
        }
    }
}

/// Effective ingress configuration of one deployment for one reconciliation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngressSettings {
    pub enabled: bool,
    /// Empty means no ingressClassName
    pub class_name: String,
    /// Empty means the rule matches any host
    pub host: String,
    /// `seldon.io/ingress-path` if set, else `/<namespace>/<name>/`
    pub base_path: String,
    /// Whether `base_path` came from the annotation
    pub base_path_overridden: bool,
    /// `None` leaves the path type unspecified
    pub path_type: Option<PathType>,
    pub path_policy: PathPolicy,
    pub grpc_enabled: bool,
}

impl IngressSettings {
    /// Resolve each setting independently: annotation first, then the process default.
    pub fn resolve(sdep: &SeldonDeployment, defaults: &IngressDefaults) -> Self {
        let explicit_path = sdep.annotation(ANNOTATION_INGRESS_PATH);
        let base_path = explicit_path
            .map(str::to_string)
            .unwrap_or_else(|| default_base_path(sdep));

        let raw_path_type = get_annotation(sdep, ANNOTATION_INGRESS_PATH_TYPE, &defaults.path_type);
        let path_type = if raw_path_type.is_empty() {
            None
        } else {
            match raw_path_type.parse::<PathType>() {
                Ok(path_type) => Some(path_type),
                Err(e) => {
                    warn!(
                        "Ignoring path type for {}/{}: {}",
                        sdep.namespace().unwrap_or_default(),
                        sdep.name_any(),
                        e
                    );
                    None
                }
            }
        };

        Self {
            enabled: defaults.enabled,
            class_name: get_annotation(sdep, ANNOTATION_INGRESS_CLASS_NAME, &defaults.class_name),
            host: get_annotation(sdep, ANNOTATION_INGRESS_HOST, &defaults.host),
            base_path,
            base_path_overridden: explicit_path.is_some(),
            path_type,
            path_policy: defaults.path_policy,
            grpc_enabled: defaults.grpc_enabled,
        }
    }

    /// Protocols to expose, primary first
    pub fn protocols(&self) -> Vec<Protocol> {
        if !self.enabled {
            return Vec::new();
        }
        let mut protocols = vec![Protocol::Http];
        if self.grpc_enabled {
            protocols.push(Protocol::Grpc);
        }
        protocols
    }
}

/// `/<namespace>/<name>/`
pub fn default_base_path(sdep: &SeldonDeployment) -> String {
    format!(
        "/{}/{}/",
        sdep.namespace().unwrap_or_else(|| "default".to_string()),
        sdep.name_any()
    )
}

/// Standard labels for Ingresses owned by a deployment
pub fn standard_labels(sdep: &SeldonDeployment) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(
        "app.kubernetes.io/name".to_string(),
        "seldon-deployment".to_string(),
    );
    labels.insert("app.kubernetes.io/instance".to_string(), sdep.name_any());
    labels.insert(
        "app.kubernetes.io/component".to_string(),
        "ingress".to_string(),
    );
    labels.insert(
        "app.kubernetes.io/managed-by".to_string(),
        "seldon-ingress-operator".to_string(),
    );
    labels
}

/// Controller owner reference pointing back at the deployment.
///
/// Fails when the deployment has no name or uid, e.g. it was never persisted.
pub fn owner_reference(sdep: &SeldonDeployment, ingress_name: &str) -> Result<OwnerReference> {
    let mut owner = sdep.controller_owner_ref(&()).ok_or_else(|| {
        Error::OwnerReference(format!(
            "Ingress {}/{}",
            sdep.namespace().unwrap_or_default(),
            ingress_name
        ))
    })?;
    owner.block_owner_deletion = Some(true);
    Ok(owner)
}

/// Annotations of the Ingress for `protocol`: a copy of `spec.annotations`
/// with the backend protocol set and HTTP-only keys removed for other
/// protocols. Object metadata annotations (e.g. kubectl's last-applied
/// configuration) are not copied.
pub fn ingress_annotations(sdep: &SeldonDeployment, protocol: Protocol) -> BTreeMap<String, String> {
    let mut annotations = sdep.spec.annotations.clone();
    annotations.insert(
        ANNOTATION_BACKEND_PROTOCOL.to_string(),
        protocol.port_name().to_uppercase(),
    );
    if !protocol.is_primary() {
        annotations.remove(ANNOTATION_REWRITE_TARGET);
    }
    annotations
}

fn ingress_path(
    path: String,
    path_type: Option<PathType>,
    service: String,
    protocol: Protocol,
) -> HTTPIngressPath {
    HTTPIngressPath {
        path: Some(path),
        path_type: path_type.map(|t| t.to_string()).unwrap_or_default(),
        backend: IngressBackend {
            service: Some(IngressServiceBackend {
                name: service,
                port: Some(ServiceBackendPort {
                    name: Some(protocol.port_name().to_string()),
                    number: None,
                }),
            }),
            ..Default::default()
        },
    }
}

fn build_paths(
    sdep: &SeldonDeployment,
    settings: &IngressSettings,
    protocol: Protocol,
    service_name: ServiceNameFn,
) -> Vec<HTTPIngressPath> {
    let predictors = &sdep.spec.predictors;
    match settings.path_policy {
        PathPolicy::PerPredictor => predictors
            .iter()
            .enumerate()
            .map(|(i, predictor)| {
                let path = if i == 0 && protocol.is_primary() && settings.base_path_overridden {
                    settings.base_path.clone()
                } else {
                    "/".to_string()
                };
                ingress_path(
                    path,
                    settings.path_type,
                    service_name(sdep, predictor),
                    protocol,
                )
            })
            .collect(),
        PathPolicy::SinglePath => predictors
            .first()
            .map(|predictor| {
                let path = if protocol.is_primary() {
                    settings.base_path.clone()
                } else {
                    "/".to_string()
                };
                ingress_path(
                    path,
                    settings.path_type,
                    service_name(sdep, predictor),
                    protocol,
                )
            })
            .into_iter()
            .collect(),
    }
}

/// Build the Ingress that should exist for `protocol`.
///
/// Returns `Ok(None)` when ingress is disabled or the deployment has no predictors.
pub fn build_ingress(
    sdep: &SeldonDeployment,
    settings: &IngressSettings,
    protocol: Protocol,
    service_name: ServiceNameFn,
) -> Result<Option<Ingress>> {
    if !settings.enabled || sdep.spec.predictors.is_empty() {
        return Ok(None);
    }

    let name = protocol.ingress_name(&sdep.name_any());
    let owner = owner_reference(sdep, &name)?;

    let rule = IngressRule {
        host: (!settings.host.is_empty()).then(|| settings.host.clone()),
        http: Some(HTTPIngressRuleValue {
            paths: build_paths(sdep, settings, protocol, service_name),
        }),
    };

    Ok(Some(Ingress {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: sdep.namespace(),
            labels: Some(standard_labels(sdep)),
            annotations: Some(ingress_annotations(sdep, protocol)),
            owner_references: Some(vec![owner]),
            ..Default::default()
        },
        spec: Some(IngressSpec {
            ingress_class_name: (!settings.class_name.is_empty())
                .then(|| settings.class_name.clone()),
            rules: Some(vec![rule]),
            ..Default::default()
        }),
        status: None,
    }))
}

/// Rewrite `observed` (or an empty shell when absent) into the desired shape.
///
/// Annotations, rules and ingressClassName are replaced outright. Desired
/// labels are overlaid on existing ones and the desired owner references
/// replace any existing reference with the same uid. Everything else
/// (TLS, default backend, status, server-managed metadata) is kept as observed.
pub fn converge(observed: Option<&Ingress>, desired: &Ingress) -> Ingress {
    let mut ingress = observed.cloned().unwrap_or_else(|| Ingress {
        metadata: ObjectMeta {
            name: desired.metadata.name.clone(),
            namespace: desired.metadata.namespace.clone(),
            ..Default::default()
        },
        ..Default::default()
    });

    ingress.metadata.annotations = desired.metadata.annotations.clone();

    if let Some(desired_labels) = &desired.metadata.labels {
        let labels = ingress.metadata.labels.get_or_insert_with(BTreeMap::new);
        labels.extend(desired_labels.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    if let Some(desired_owners) = &desired.metadata.owner_references {
        let owners = ingress
            .metadata
            .owner_references
            .get_or_insert_with(Vec::new);
        for owner in desired_owners {
            match owners.iter_mut().find(|o| o.uid == owner.uid) {
                Some(existing) => *existing = owner.clone(),
                None => owners.push(owner.clone()),
            }
        }
    }

    let desired_spec = desired.spec.clone().unwrap_or_default();
    let spec = ingress.spec.get_or_insert_with(IngressSpec::default);
    spec.ingress_class_name = desired_spec.ingress_class_name;
    spec.rules = desired_spec.rules;

    ingress
}
