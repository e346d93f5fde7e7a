//! Process-wide ingress defaults
//!
//! Read once at start-up from flags or environment variables and handed to the
//! reconciler as an immutable value. Per-deployment annotations override them.

use clap::{ArgAction, Args, ValueEnum};

/// How Ingress paths are laid out across a deployment's predictors
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum PathPolicy {
    /// One path per predictor, each pointing at that predictor's Service.
    /// Only the first HTTP path takes an explicit `seldon.io/ingress-path`.
    #[default]
    PerPredictor,
    /// A single path for the first predictor, mounted on the base path
    /// (`seldon.io/ingress-path`, else `/<namespace>/<name>/`) for HTTP.
    SinglePath,
}

#[derive(Args, Clone, Debug)]
pub struct IngressDefaults {
    /// Create Ingress objects for SeldonDeployments
    #[arg(long = "ingress-enabled", env = "KUBERNETES_INGRESS_ENABLED")]
    pub enabled: bool,

    /// Default ingressClassName; empty leaves it unset
    #[arg(
        long = "ingress-class-name",
        env = "KUBERNETES_INGRESS_CLASS_NAME",
        default_value = ""
    )]
    pub class_name: String,

    /// Default host matched by the Ingress rule; empty matches any host
    #[arg(long = "ingress-host", env = "KUBERNETES_INGRESS_HOST", default_value = "")]
    pub host: String,

    /// Default path type (Exact, Prefix or ImplementationSpecific); empty leaves it unspecified
    #[arg(
        long = "ingress-path-type",
        env = "KUBERNETES_INGRESS_PATH_TYPE",
        default_value = "ImplementationSpecific"
    )]
    pub path_type: String,

    /// Also expose predictors over gRPC through a second `<name>-grpc` Ingress
    #[arg(
        long = "ingress-grpc-enabled",
        env = "KUBERNETES_INGRESS_GRPC_ENABLED",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub grpc_enabled: bool,

    #[arg(
        long = "ingress-path-policy",
        env = "KUBERNETES_INGRESS_PATH_POLICY",
        value_enum,
        default_value_t = PathPolicy::PerPredictor
    )]
    pub path_policy: PathPolicy,
}

impl Default for IngressDefaults {
    fn default() -> Self {
        Self {
            enabled: false,
            class_name: String::new(),
            host: String::new(),
            path_type: "ImplementationSpecific".to_string(),
            grpc_enabled: true,
            path_policy: PathPolicy::PerPredictor,
        }
    }
}
