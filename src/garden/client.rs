//! kube-rs backed garden client

use super::kubeconfig::ShootKubeconfigRequest;
use super::types::{
    CloudProfile, CloudProfileReference, CloudProfileUnion, CredentialsBinding, ManagedSeed, NamespacedCloudProfile,
    Project, SecretBinding, Seed, Shoot, TokenRequest, WorkloadIdentity, CLOUD_PROFILE_KIND,
    NAMESPACED_CLOUD_PROFILE_KIND,
};
use super::user::{self, validate_token};
use super::{ClientProvider, GardenClient, GARDEN_NAMESPACE};
use crate::config::Garden;
use crate::error::{GctlError, Result};
use crate::target::ShootFilter;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, ListParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::core::{ClusterResourceScope, NamespaceResourceScope};
use kube::{Client, Config, Resource};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const CA_CLUSTER_SUFFIX: &str = "ca-cluster";
const DATA_KEY_CA: &str = "ca.crt";
const CLUSTER_IDENTITY_NAMESPACE: &str = "kube-system";
const CLUSTER_IDENTITY_CONFIG_MAP: &str = "cluster-identity";
const CLUSTER_IDENTITY_KEY: &str = "cluster-identity";
const UID_LEN: usize = 36;

/// Reject objects whose UID is not a canonical UUID. UIDs end up in file
/// names, so anything else is refused before it gets there.
pub fn validate_metadata(meta: &ObjectMeta) -> Result<()> {
    let name = meta.name.as_deref().unwrap_or_default();
    if name.is_empty() {
        return Err(GctlError::InvalidMetadata("object has no name".to_string()));
    }
    let uid = meta.uid.as_deref().unwrap_or_default();
    if uid.len() != UID_LEN || uuid::Uuid::parse_str(uid).is_err() {
        return Err(GctlError::InvalidMetadata(format!("object {name:?} has invalid UID {uid:?}")));
    }
    Ok(())
}

fn map_kube_error(err: kube::Error, kind: &str, name: &str) -> GctlError {
    match &err {
        kube::Error::Api(resp) if resp.code == 404 => GctlError::not_found(kind.to_lowercase(), name),
        _ => GctlError::Kube(err),
    }
}

fn checked<K: Resource>(obj: K) -> Result<K> {
    validate_metadata(obj.meta())?;
    Ok(obj)
}

/// Reduce a kubeconfig to one context and the cluster and user it references
pub fn minify_kubeconfig(kubeconfig: &Kubeconfig, context: Option<&str>) -> Result<Kubeconfig> {
    let mut raw = serde_json::to_value(kubeconfig)?;
    let context_name = context
        .map(str::to_string)
        .or_else(|| kubeconfig.current_context.clone())
        .ok_or_else(|| GctlError::Kubeconfig("current context is not set".to_string()))?;

    let named = |list: &Value, name: &str| -> Option<Value> {
        list.as_array()?
            .iter()
            .find(|e| e.get("name").and_then(Value::as_str) == Some(name))
            .cloned()
    };

    let ctx = named(&raw["contexts"], &context_name)
        .ok_or_else(|| GctlError::Kubeconfig(format!("context {context_name:?} not found")))?;
    let cluster_name = ctx["context"]["cluster"].as_str().unwrap_or_default().to_string();
    let user_name = ctx["context"]["user"].as_str().unwrap_or_default().to_string();

    let cluster = named(&raw["clusters"], &cluster_name)
        .ok_or_else(|| GctlError::Kubeconfig(format!("cluster {cluster_name:?} not found")))?;
    let users: Vec<Value> = named(&raw["users"], &user_name).into_iter().collect();

    raw["current-context"] = Value::String(context_name);
    raw["contexts"] = Value::Array(vec![ctx]);
    raw["clusters"] = Value::Array(vec![cluster]);
    raw["users"] = Value::Array(users);
    Ok(serde_json::from_value(raw)?)
}

/// Garden client talking to the API server of one configured garden
pub struct KubeGardenClient {
    client: Client,
    name: String,
    kubeconfig: Kubeconfig,
    context: Option<String>,
    base_dir: Option<PathBuf>,
}

impl KubeGardenClient {
    /// Connect with the garden's kubeconfig and context override
    pub async fn from_garden(garden: &Garden) -> Result<Self> {
        let path = Path::new(&garden.kubeconfig);
        let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
            GctlError::Kubeconfig(format!("failed to load kubeconfig of garden {:?}: {e}", garden.name))
        })?;

        let options = KubeConfigOptions {
            context: garden.context.clone(),
            ..Default::default()
        };
        let config = Config::from_custom_kubeconfig(kubeconfig.clone(), &options)
            .await
            .map_err(|e| GctlError::Kubeconfig(format!("failed to load client configuration: {e}")))?;
        let client = Client::try_from(config)?;
        debug!("Created client for garden {}", garden.name);

        Ok(KubeGardenClient {
            client,
            name: garden.name.clone(),
            kubeconfig,
            context: garden.context.clone(),
            base_dir: path.parent().map(Path::to_path_buf),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn get_cluster<K>(&self, name: &str) -> Result<K>
    where
        K: Resource<DynamicType = (), Scope = ClusterResourceScope> + Clone + DeserializeOwned + Debug,
    {
        let api: Api<K> = Api::all(self.client.clone());
        let obj = api
            .get(name)
            .await
            .map_err(|e| map_kube_error(e, &K::kind(&()), name))?;
        checked(obj)
    }

    async fn get_namespaced<K>(&self, namespace: &str, name: &str) -> Result<K>
    where
        K: Resource<DynamicType = (), Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let obj = api
            .get(name)
            .await
            .map_err(|e| map_kube_error(e, &K::kind(&()), &format!("{namespace}/{name}")))?;
        checked(obj)
    }

    fn shoot_api(&self, filter: &ShootFilter) -> Api<Shoot> {
        match &filter.namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }

    fn list_params(filter: &ShootFilter) -> ListParams {
        match filter.field_selector() {
            Some(selector) => ListParams::default().fields(&selector),
            None => ListParams::default(),
        }
    }

    async fn cluster_ca(&self, namespace: &str, shoot: &str) -> Result<Vec<u8>> {
        let name = format!("{shoot}.{CA_CLUSTER_SUFFIX}");
        match self.get_config_map(namespace, &name).await {
            Ok(cm) => {
                if let Some(ca) = cm.data.as_ref().and_then(|d| d.get(DATA_KEY_CA)).filter(|c| !c.is_empty()) {
                    return Ok(ca.clone().into_bytes());
                }
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        // clusters created before the config map existed only have the secret
        debug!("Falling back to secret {}/{} for the cluster CA", namespace, name);
        let secret = self.get_secret(namespace, &name).await?;
        secret
            .data
            .and_then(|d| d.get(DATA_KEY_CA).cloned())
            .map(|b| b.0)
            .filter(|b| !b.is_empty())
            .ok_or_else(|| GctlError::Kubeconfig(format!("{DATA_KEY_CA} of secret {name} is empty")))
    }
}

#[async_trait]
impl GardenClient for KubeGardenClient {
    async fn get_project(&self, name: &str) -> Result<Project> {
        self.get_cluster(name).await
    }

    async fn get_project_by_namespace(&self, namespace: &str) -> Result<Project> {
        let api: Api<Project> = Api::all(self.client.clone());
        let params = ListParams::default()
            .fields(&format!("spec.namespace={namespace}"))
            .limit(1);
        let list = api.list(&params).await?;
        let project = list
            .items
            .into_iter()
            .next()
            .ok_or_else(|| GctlError::not_found("project with namespace", namespace))?;
        checked(project)
    }

    async fn get_seed(&self, name: &str) -> Result<Seed> {
        self.get_cluster(name).await
    }

    async fn get_shoot(&self, namespace: &str, name: &str) -> Result<Shoot> {
        self.get_namespaced(namespace, name).await
    }

    async fn find_shoot(&self, filter: &ShootFilter) -> Result<Shoot> {
        let params = Self::list_params(filter).limit(2);
        let list = self.shoot_api(filter).list(&params).await?;

        let remaining = list.metadata.remaining_item_count.unwrap_or(0);
        if list.items.len() > 1 || remaining > 0 {
            return Err(GctlError::Ambiguous(format!(
                "multiple shoots found matching the given list options {filter}, please target a project or seed to make your choice unambiguous"
            )));
        }

        let shoot = list.items.into_iter().next().ok_or_else(|| {
            GctlError::not_found("shoot", filter.name.clone().unwrap_or_default())
        })?;
        checked(shoot)
    }

    async fn list_shoots(&self, filter: &ShootFilter) -> Result<Vec<Shoot>> {
        let list = self.shoot_api(filter).list(&Self::list_params(filter)).await?;
        list.items.into_iter().map(checked).collect()
    }

    async fn get_secret_binding(&self, namespace: &str, name: &str) -> Result<SecretBinding> {
        self.get_namespaced(namespace, name).await
    }

    async fn get_credentials_binding(&self, namespace: &str, name: &str) -> Result<CredentialsBinding> {
        self.get_namespaced(namespace, name).await
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret> {
        self.get_namespaced(namespace, name).await
    }

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap> {
        self.get_namespaced(namespace, name).await
    }

    async fn get_namespace(&self, name: &str) -> Result<Namespace> {
        self.get_cluster(name).await
    }

    async fn get_cloud_profile(&self, reference: &CloudProfileReference, namespace: &str) -> Result<CloudProfileUnion> {
        match reference.kind.as_str() {
            CLOUD_PROFILE_KIND => Ok(CloudProfileUnion::Global(
                self.get_cluster::<CloudProfile>(&reference.name).await?,
            )),
            NAMESPACED_CLOUD_PROFILE_KIND => {
                if namespace.is_empty() {
                    return Err(GctlError::InvalidArgument(format!(
                        "namespace is required for NamespacedCloudProfile {:?}",
                        reference.name
                    )));
                }
                Ok(CloudProfileUnion::Namespaced(
                    self.get_namespaced::<NamespacedCloudProfile>(namespace, &reference.name)
                        .await?,
                ))
            }
            other => Err(GctlError::InvalidArgument(format!("unknown CloudProfile kind: {other}"))),
        }
    }

    async fn get_shoot_of_managed_seed(&self, seed: &str) -> Result<String> {
        let managed_seed: ManagedSeed = self.get_namespaced(GARDEN_NAMESPACE, seed).await?;
        managed_seed
            .spec
            .shoot
            .map(|s| s.name)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| GctlError::NotManagedSeed(seed.to_string()))
    }

    async fn get_workload_identity(&self, namespace: &str, name: &str) -> Result<WorkloadIdentity> {
        self.get_namespaced(namespace, name).await
    }

    async fn create_workload_identity_token(&self, namespace: &str, name: &str, ttl_seconds: i64) -> Result<String> {
        let api: Api<WorkloadIdentity> = Api::namespaced(self.client.clone(), namespace);
        let body = serde_json::to_vec(&TokenRequest::new(ttl_seconds))?;
        let response: TokenRequest = api
            .create_subresource("token", name, &PostParams::default(), body)
            .await
            .map_err(|e| map_kube_error(e, "workloadidentity", &format!("{namespace}/{name}")))?;

        let token = response.status.map(|s| s.token).unwrap_or_default();
        validate_token(&token)?;
        Ok(token)
    }

    async fn current_user(&self) -> Result<String> {
        user::current_user(
            &self.client,
            &self.kubeconfig,
            self.context.as_deref(),
            self.base_dir.as_deref(),
        )
        .await
    }

    fn garden_client_config(&self) -> Result<Kubeconfig> {
        minify_kubeconfig(&self.kubeconfig, self.context.as_deref())
    }

    async fn get_seed_client_config(&self, name: &str) -> Result<Kubeconfig> {
        match self.get_shoot_of_managed_seed(name).await {
            Ok(shoot) => {
                debug!("Using referred shoot {}/{} of managed seed {}", GARDEN_NAMESPACE, shoot, name);
                return self.get_shoot_client_config(GARDEN_NAMESPACE, &shoot).await;
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        let secret = match self.get_secret(GARDEN_NAMESPACE, &format!("{name}.login")).await {
            Ok(secret) => secret,
            Err(e) if e.is_not_found() => match self.get_secret(GARDEN_NAMESPACE, &format!("{name}.oidc")).await {
                Ok(secret) => {
                    info!("Using deprecated secret {}/{}.oidc to obtain seed kubeconfig", GARDEN_NAMESPACE, name);
                    secret
                }
                Err(_) => return Err(e),
            },
            Err(e) => return Err(e),
        };

        let data = secret
            .data
            .and_then(|d| d.get("kubeconfig").cloned())
            .ok_or_else(|| GctlError::Kubeconfig(format!("invalid kubeconfig secret for seed {name:?}")))?;
        let text = String::from_utf8(data.0)
            .map_err(|e| GctlError::Kubeconfig(format!("kubeconfig of seed {name:?} is not UTF-8: {e}")))?;
        Kubeconfig::from_yaml(&text)
            .map_err(|e| GctlError::Kubeconfig(format!("failed to deserialize kubeconfig for seed {name:?}: {e}")))
    }

    async fn get_shoot_client_config(&self, namespace: &str, name: &str) -> Result<Kubeconfig> {
        let shoot = self.get_shoot(namespace, name).await?;
        let ca_cert = self.cluster_ca(namespace, name).await?;

        let identity = self
            .get_config_map(CLUSTER_IDENTITY_NAMESPACE, CLUSTER_IDENTITY_CONFIG_MAP)
            .await?
            .data
            .and_then(|d| d.get(CLUSTER_IDENTITY_KEY).cloned())
            .filter(|i| !i.is_empty())
            .ok_or_else(|| GctlError::Kubeconfig("garden cluster identity is not set".to_string()))?;

        ShootKubeconfigRequest {
            shoot: &shoot,
            ca_cert: &ca_cert,
            garden_cluster_identity: &identity,
        }
        .generate()
    }
}

/// Builds [`KubeGardenClient`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct KubeClientProvider;

#[async_trait]
impl ClientProvider for KubeClientProvider {
    async fn garden_client(&self, garden: &Garden) -> Result<Arc<dyn GardenClient>> {
        Ok(Arc::new(KubeGardenClient::from_garden(garden).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(name: &str, uid: Option<&str>) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            uid: uid.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_metadata() {
        assert!(validate_metadata(&meta("s", Some("0f8fad5b-d9cb-469f-a165-70867728950e"))).is_ok());
        assert!(validate_metadata(&meta("s", None)).is_err());
        assert!(validate_metadata(&meta("s", Some("../../etc"))).is_err());
        // valid UUID, but not the canonical hyphenated form
        assert!(validate_metadata(&meta("s", Some("0f8fad5bd9cb469fa16570867728950e"))).is_err());
    }

    #[test]
    fn test_minify_kubeconfig() {
        let kc: Kubeconfig = serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "Config",
            "current-context": "a",
            "clusters": [
                {"name": "ca", "cluster": {"server": "https://a.example.com"}},
                {"name": "cb", "cluster": {"server": "https://b.example.com"}}
            ],
            "contexts": [
                {"name": "a", "context": {"cluster": "ca", "user": "ua"}},
                {"name": "b", "context": {"cluster": "cb", "user": "ub"}}
            ],
            "users": [{"name": "ua", "user": {}}, {"name": "ub", "user": {}}]
        }))
        .unwrap();

        let min = minify_kubeconfig(&kc, Some("b")).unwrap();
        assert_eq!(min.current_context.as_deref(), Some("b"));
        assert_eq!(min.clusters.len(), 1);
        assert_eq!(min.clusters[0].name, "cb");
        assert_eq!(min.auth_infos.len(), 1);

        assert!(minify_kubeconfig(&kc, Some("missing")).is_err());
    }
}
