//! Kubeconfig generation for shoot clusters
//!
//! The generated kubeconfig carries no credentials. Authentication is
//! delegated to the `kubectl gardenlogin get-client-certificate` exec plugin.

use super::types::{Shoot, ShootAdvertisedAddress};
use crate::error::{GctlError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use kube::config::Kubeconfig;
use serde_json::{json, Value};
use url::Url;

pub const EXEC_EXTENSION_NAME: &str = "client.authentication.k8s.io/exec";
const EXEC_API_VERSION: &str = "client.authentication.k8s.io/v1beta1";

/// Shoots below this Kubernetes minor version get the plugin arguments inline
const LEGACY_MINOR: u64 = 20;

/// Advertised address names that never become the current context
const SKIPPED_ADDRESSES: &[&str] = &["internal", "service-account-issuer"];

/// Inputs for a shoot kubeconfig
#[derive(Debug, Clone)]
pub struct ShootKubeconfigRequest<'a> {
    pub shoot: &'a Shoot,
    pub ca_cert: &'a [u8],
    pub garden_cluster_identity: &'a str,
}

/// Whether the shoot runs a Kubernetes version below 1.20
pub fn is_legacy_version(version: &str) -> Result<bool> {
    let trimmed = version.trim_start_matches('v');
    let mut parts = trimmed.split('.');
    let parse = |p: Option<&str>| -> Result<u64> {
        p.and_then(|s| s.parse().ok()).ok_or_else(|| {
            GctlError::Kubeconfig(format!("could not parse kubernetes version {version} of shoot cluster"))
        })
    };
    let major = parse(parts.next())?;
    let minor = parse(parts.next())?;
    Ok(major < 1 || (major == 1 && minor < LEGACY_MINOR))
}

/// Index of the address the current context points at: `external` if
/// present, else the first one that is neither `internal` nor the issuer
pub fn preferred_address(addresses: &[ShootAdvertisedAddress]) -> Option<usize> {
    addresses
        .iter()
        .position(|a| a.name == "external")
        .or_else(|| {
            addresses
                .iter()
                .position(|a| !SKIPPED_ADDRESSES.contains(&a.name.as_str()))
        })
        .or(if addresses.is_empty() { None } else { Some(0) })
}

impl ShootKubeconfigRequest<'_> {
    pub fn generate(&self) -> Result<Kubeconfig> {
        let namespace = self.shoot.metadata.namespace.as_deref().unwrap_or_default();
        let name = self.shoot.metadata.name.as_deref().unwrap_or_default();
        if namespace.is_empty() {
            return Err(GctlError::Kubeconfig("no namespace defined for kubeconfig request".to_string()));
        }
        if name.is_empty() {
            return Err(GctlError::Kubeconfig("no shoot name defined for kubeconfig request".to_string()));
        }
        if self.garden_cluster_identity.is_empty() {
            return Err(GctlError::Kubeconfig(
                "no garden cluster identity defined for kubeconfig request".to_string(),
            ));
        }

        let addresses = self
            .shoot
            .status
            .as_ref()
            .map(|s| s.advertised_addresses.as_slice())
            .unwrap_or_default();
        let current = preferred_address(addresses).ok_or_else(|| {
            GctlError::Kubeconfig("no advertised addresses listed in the Shoot status for the Shoot Kube API server".to_string())
        })?;

        let legacy = is_legacy_version(&self.shoot.spec.kubernetes.version)?;
        let mut args = vec!["gardenlogin".to_string(), "get-client-certificate".to_string()];
        if legacy {
            args.push(format!("--name={name}"));
            args.push(format!("--namespace={namespace}"));
            args.push(format!("--garden-cluster-identity={}", self.garden_cluster_identity));
        }

        let project_part = namespace.strip_prefix("garden-").unwrap_or(namespace);
        let auth_name = format!("{project_part}--{name}");
        let ca_data = STANDARD.encode(self.ca_cert);

        let mut clusters = Vec::new();
        let mut contexts = Vec::new();
        let mut current_context = String::new();
        for (i, address) in addresses.iter().enumerate() {
            let url = Url::parse(&address.url)
                .map_err(|e| GctlError::Kubeconfig(format!("could not parse shoot server url: {e}")))?;
            let host = url.host_str().unwrap_or_default();
            if address.name.is_empty() || host.is_empty() {
                return Err(GctlError::Kubeconfig(format!(
                    "validation failed for kubeconfig request: invalid advertised address [{i}]"
                )));
            }
            let server = match url.port() {
                Some(port) => format!("https://{host}:{port}"),
                None => format!("https://{host}"),
            };

            let context_name = format!("{auth_name}-{}", address.name);
            if i == current {
                current_context = context_name.clone();
            }

            let mut cluster = json!({
                "server": server,
                "certificate-authority-data": ca_data,
            });
            if !legacy {
                cluster["extensions"] = json!([{
                    "name": EXEC_EXTENSION_NAME,
                    "extension": {
                        "shootRef": {"namespace": namespace, "name": name},
                        "gardenClusterIdentity": self.garden_cluster_identity,
                    }
                }]);
            }
            clusters.push(json!({"name": context_name, "cluster": cluster}));
            contexts.push(json!({
                "name": context_name,
                "context": {"cluster": context_name, "user": auth_name, "namespace": "default"}
            }));
        }

        let config: Value = json!({
            "apiVersion": "v1",
            "kind": "Config",
            "current-context": current_context,
            "clusters": clusters,
            "contexts": contexts,
            "users": [{
                "name": auth_name,
                "user": {
                    "exec": {
                        "apiVersion": EXEC_API_VERSION,
                        "command": "kubectl",
                        "args": args,
                        "provideClusterInfo": true,
                    }
                }
            }],
        });
        Ok(serde_json::from_value(config)?)
    }
}
