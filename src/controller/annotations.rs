//! Annotation keys read from SeldonDeployments and written onto Ingresses

use crate::crd::SeldonDeployment;

/// Overrides the IngressClass used for the deployment's Ingresses
pub const ANNOTATION_INGRESS_CLASS_NAME: &str = "seldon.io/ingress-class-name";
/// Overrides the host matched by the Ingress rule
pub const ANNOTATION_INGRESS_HOST: &str = "seldon.io/ingress-host";
/// Overrides the base path of the HTTP Ingress
pub const ANNOTATION_INGRESS_PATH: &str = "seldon.io/ingress-path";
/// Overrides the path type of every Ingress path
pub const ANNOTATION_INGRESS_PATH_TYPE: &str = "seldon.io/ingress-path-type";

/// Backend transport understood by ingress-nginx
pub const ANNOTATION_BACKEND_PROTOCOL: &str = "nginx.ingress.kubernetes.io/backend-protocol";
/// Only meaningful for HTTP; breaks gRPC routing through ingress-nginx
pub const ANNOTATION_REWRITE_TARGET: &str = "nginx.ingress.kubernetes.io/rewrite-target";

/// Resolve a setting: a non-empty annotation on the deployment wins, otherwise `default`.
pub fn get_annotation(sdep: &SeldonDeployment, key: &str, default: &str) -> String {
    sdep.annotation(key).unwrap_or(default).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::SeldonDeploymentSpec;

    #[test]
    fn test_default_used_when_annotation_missing() {
        let sdep = SeldonDeployment::new("dep1", SeldonDeploymentSpec::default());
        assert_eq!(
            get_annotation(&sdep, ANNOTATION_INGRESS_HOST, "fallback.example.com"),
            "fallback.example.com"
        );
    }

    #[test]
    fn test_annotation_overrides_default() {
        let mut spec = SeldonDeploymentSpec::default();
        spec.annotations.insert(
            ANNOTATION_INGRESS_CLASS_NAME.to_string(),
            "nginx".to_string(),
        );
        let sdep = SeldonDeployment::new("dep1", spec);
        assert_eq!(
            get_annotation(&sdep, ANNOTATION_INGRESS_CLASS_NAME, "traefik"),
            "nginx"
        );
    }
}
