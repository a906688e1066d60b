//! Access to the Gardener API of a garden cluster

mod client;
pub mod kubeconfig;
pub mod types;
pub mod user;

pub use client::{validate_metadata, KubeClientProvider, KubeGardenClient};

use crate::config::Garden;
use crate::error::Result;
use crate::target::ShootFilter;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret};
use kube::config::Kubeconfig;
use std::sync::Arc;
use types::{
    CloudProfileReference, CloudProfileUnion, CredentialsBinding, Project, SecretBinding, Seed, Shoot,
    WorkloadIdentity,
};

#[cfg(test)]
use mockall::automock;

/// Namespace holding managed seeds and seed login secrets
pub const GARDEN_NAMESPACE: &str = "garden";

/// Typed accessors over a garden cluster. Every returned object has passed
/// [`validate_metadata`].
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GardenClient: Send + Sync {
    async fn get_project(&self, name: &str) -> Result<Project>;

    /// Project owning the namespace, looked up with a `spec.namespace` field selector
    async fn get_project_by_namespace(&self, namespace: &str) -> Result<Project>;

    async fn get_seed(&self, name: &str) -> Result<Seed>;

    async fn get_shoot(&self, namespace: &str, name: &str) -> Result<Shoot>;

    /// The single shoot matching the filter; zero or several matches are errors
    async fn find_shoot(&self, filter: &ShootFilter) -> Result<Shoot>;

    async fn list_shoots(&self, filter: &ShootFilter) -> Result<Vec<Shoot>>;

    async fn get_secret_binding(&self, namespace: &str, name: &str) -> Result<SecretBinding>;

    async fn get_credentials_binding(&self, namespace: &str, name: &str) -> Result<CredentialsBinding>;

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret>;

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap>;

    async fn get_namespace(&self, name: &str) -> Result<Namespace>;

    /// `namespace` is the shoot's namespace, used for namespaced cloud profiles
    async fn get_cloud_profile(&self, reference: &CloudProfileReference, namespace: &str) -> Result<CloudProfileUnion>;

    /// Name of the shoot backing a managed seed in the `garden` namespace
    async fn get_shoot_of_managed_seed(&self, seed: &str) -> Result<String>;

    async fn get_workload_identity(&self, namespace: &str, name: &str) -> Result<WorkloadIdentity>;

    /// Request a token for the workload identity, valid for `ttl_seconds`
    async fn create_workload_identity_token(&self, namespace: &str, name: &str, ttl_seconds: i64) -> Result<String>;

    /// The authenticated user as seen by the garden
    async fn current_user(&self) -> Result<String>;

    /// The garden kubeconfig itself, minified to the configured context
    fn garden_client_config(&self) -> Result<Kubeconfig>;

    async fn get_seed_client_config(&self, name: &str) -> Result<Kubeconfig>;

    async fn get_shoot_client_config(&self, namespace: &str, name: &str) -> Result<Kubeconfig>;
}

/// Creates garden clients from configuration entries
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClientProvider: Send + Sync {
    async fn garden_client(&self, garden: &Garden) -> Result<Arc<dyn GardenClient>>;
}
