//! Error types for the Seldon ingress operator

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error (read, create or update of an object)
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    /// The routing object cannot be linked back to its owning deployment
    #[error("Cannot set owner reference on {0}: owner has no name or uid")]
    OwnerReference(String),

    /// Invalid or incomplete operator/object configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl Error {
    /// Whether a failed reconciliation should be retried on the short interval.
    ///
    /// Conflicts, throttling, server errors and transport failures are
    /// transient. Rejections such as 400, 403 or 422 and every non-API error
    /// need the object or the operator config to change first.
    pub fn is_retriable(&self) -> bool {
        match self {
            Error::KubeError(kube::Error::Api(response)) => {
                matches!(response.code, 409 | 429 | 500..=599)
            }
            Error::KubeError(
                kube::Error::HyperError(_) | kube::Error::Service(_) | kube::Error::ReadEvents(_),
            ) => true,
            _ => false,
        }
    }

    /// Short error category, used as a metric label
    pub fn kind(&self) -> &'static str {
        match self {
            Error::KubeError(_) => "kube",
            Error::OwnerReference(_) => "owner_reference",
            Error::ConfigError(_) => "config",
            Error::SerializationError(_) => "serialization",
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
