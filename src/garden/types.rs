//! Typed Gardener resources
//!
//! Only the fields the CLI reads are modelled; everything else is ignored on
//! deserialization. Each type implements [`kube::Resource`] so it can be used
//! with a typed [`kube::Api`].

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Debug;

/// Common view over all Gardener resource types
pub trait GardenerResource:
    Clone + Debug + DeserializeOwned + Serialize + Send + Sync + kube::Resource<DynamicType = ()> + 'static
{
    /// The API kind (e.g. "Shoot")
    const KIND: &'static str;

    /// The API group (e.g. "core.gardener.cloud")
    const GROUP: &'static str;

    /// The API version (e.g. "v1beta1")
    const VERSION: &'static str;

    /// Plural name for the API path
    const PLURAL: &'static str;

    /// Whether this resource is namespaced
    const NAMESPACED: bool;

    fn metadata(&self) -> &ObjectMeta;

    fn name(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or_default()
    }

    fn namespace(&self) -> Option<&str> {
        self.metadata().namespace.as_deref()
    }
}

macro_rules! gardener_resource {
    ($ty:ty, $scope:ty, namespaced: $namespaced:expr, $kind:literal, $group:literal, $version:literal, $plural:literal) => {
        impl kube::Resource for $ty {
            type DynamicType = ();
            type Scope = $scope;

            fn kind(_: &()) -> std::borrow::Cow<'_, str> {
                $kind.into()
            }

            fn group(_: &()) -> std::borrow::Cow<'_, str> {
                $group.into()
            }

            fn version(_: &()) -> std::borrow::Cow<'_, str> {
                $version.into()
            }

            fn plural(_: &()) -> std::borrow::Cow<'_, str> {
                $plural.into()
            }

            fn meta(&self) -> &ObjectMeta {
                &self.metadata
            }

            fn meta_mut(&mut self) -> &mut ObjectMeta {
                &mut self.metadata
            }
        }

        impl GardenerResource for $ty {
            const KIND: &'static str = $kind;
            const GROUP: &'static str = $group;
            const VERSION: &'static str = $version;
            const PLURAL: &'static str = $plural;
            const NAMESPACED: bool = $namespaced;

            fn metadata(&self) -> &ObjectMeta {
                &self.metadata
            }
        }
    };
}

use kube::core::{ClusterResourceScope, NamespaceResourceScope};

// ============================================================================
// core.gardener.cloud
// ============================================================================

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Project {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ProjectSpec,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProjectSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

gardener_resource!(Project, ClusterResourceScope, namespaced: false, "Project", "core.gardener.cloud", "v1beta1", "projects");

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Seed {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: SeedSpec,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SeedSpec {
    #[serde(default)]
    pub provider: SeedProvider,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SeedProvider {
    #[serde(rename = "type", default)]
    pub type_: String,
    #[serde(default)]
    pub region: String,
}

gardener_resource!(Seed, ClusterResourceScope, namespaced: false, "Seed", "core.gardener.cloud", "v1beta1", "seeds");

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Shoot {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ShootSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ShootStatus>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShootSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_profile_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_profile: Option<CloudProfileReference>,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub provider: ShootProvider,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_binding_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_binding_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_name: Option<String>,
    #[serde(default)]
    pub kubernetes: ShootKubernetes,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub access_restrictions: Vec<AccessRestrictionWithOptions>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ShootProvider {
    #[serde(rename = "type", default)]
    pub type_: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ShootKubernetes {
    #[serde(default)]
    pub version: String,
}

/// An access restriction set on the shoot itself
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AccessRestrictionWithOptions {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShootStatus {
    #[serde(default, rename = "technicalID", skip_serializing_if = "Option::is_none")]
    pub technical_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub advertised_addresses: Vec<ShootAdvertisedAddress>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShootAdvertisedAddress {
    pub name: String,
    pub url: String,
}

impl Shoot {
    /// Name of the credentials binding; CredentialsBinding wins over SecretBinding
    pub fn binding(&self) -> Option<BindingRef<'_>> {
        fn non_empty(s: &Option<String>) -> Option<&str> {
            s.as_deref().filter(|n| !n.is_empty())
        }
        if let Some(name) = non_empty(&self.spec.credentials_binding_name) {
            return Some(BindingRef::Credentials(name));
        }
        non_empty(&self.spec.secret_binding_name).map(BindingRef::Secret)
    }

    /// Reference to the (possibly namespaced) cloud profile
    pub fn cloud_profile_ref(&self) -> Option<CloudProfileReference> {
        if let Some(r) = &self.spec.cloud_profile {
            if !r.name.is_empty() {
                return Some(r.clone());
            }
        }
        self.spec
            .cloud_profile_name
            .as_ref()
            .filter(|n| !n.is_empty())
            .map(|name| CloudProfileReference {
                kind: CLOUD_PROFILE_KIND.to_string(),
                name: name.clone(),
            })
    }

    pub fn seed_name(&self) -> Option<&str> {
        self.spec.seed_name.as_deref().filter(|s| !s.is_empty())
    }
}

/// The binding a shoot references
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingRef<'a> {
    Secret(&'a str),
    Credentials(&'a str),
}

gardener_resource!(Shoot, NamespaceResourceScope, namespaced: true, "Shoot", "core.gardener.cloud", "v1beta1", "shoots");

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretBinding {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub secret_ref: SecretReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<BindingProvider>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SecretReference {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BindingProvider {
    #[serde(rename = "type", default)]
    pub type_: String,
}

gardener_resource!(SecretBinding, NamespaceResourceScope, namespaced: true, "SecretBinding", "core.gardener.cloud", "v1beta1", "secretbindings");

pub const CLOUD_PROFILE_KIND: &str = "CloudProfile";
pub const NAMESPACED_CLOUD_PROFILE_KIND: &str = "NamespacedCloudProfile";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudProfileReference {
    #[serde(default)]
    pub kind: String,
    pub name: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CloudProfile {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: CloudProfileSpec,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudProfileSpec {
    #[serde(rename = "type", default)]
    pub type_: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_config: Option<Value>,
}

gardener_resource!(CloudProfile, ClusterResourceScope, namespaced: false, "CloudProfile", "core.gardener.cloud", "v1beta1", "cloudprofiles");

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NamespacedCloudProfile {
    pub metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<NamespacedCloudProfileStatus>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespacedCloudProfileStatus {
    #[serde(default)]
    pub cloud_profile_spec: CloudProfileSpec,
}

gardener_resource!(NamespacedCloudProfile, NamespaceResourceScope, namespaced: true, "NamespacedCloudProfile", "core.gardener.cloud", "v1beta1", "namespacedcloudprofiles");

/// A global or namespaced cloud profile behind one accessor
#[derive(Clone, Debug)]
pub enum CloudProfileUnion {
    Global(CloudProfile),
    Namespaced(NamespacedCloudProfile),
}

impl CloudProfileUnion {
    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            CloudProfileUnion::Global(cp) => &cp.metadata,
            CloudProfileUnion::Namespaced(ncp) => &ncp.metadata,
        }
    }

    pub fn name(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or_default()
    }

    /// The effective spec; a namespaced profile exposes its rendered status
    pub fn spec(&self) -> Option<&CloudProfileSpec> {
        match self {
            CloudProfileUnion::Global(cp) => Some(&cp.spec),
            CloudProfileUnion::Namespaced(ncp) => ncp.status.as_ref().map(|s| &s.cloud_profile_spec),
        }
    }

    pub fn provider_config(&self) -> Option<&Value> {
        self.spec().and_then(|s| s.provider_config.as_ref())
    }
}

// ============================================================================
// security.gardener.cloud
// ============================================================================

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsBinding {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub credentials_ref: CredentialsReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<BindingProvider>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsReference {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

gardener_resource!(CredentialsBinding, NamespaceResourceScope, namespaced: true, "CredentialsBinding", "security.gardener.cloud", "v1alpha1", "credentialsbindings");

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WorkloadIdentity {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: WorkloadIdentitySpec,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadIdentitySpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audiences: Vec<String>,
    #[serde(default)]
    pub target_system: TargetSystem,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSystem {
    #[serde(rename = "type", default)]
    pub type_: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_config: Option<Value>,
}

gardener_resource!(WorkloadIdentity, NamespaceResourceScope, namespaced: true, "WorkloadIdentity", "security.gardener.cloud", "v1alpha1", "workloadidentities");

/// Body of the `token` subresource of a WorkloadIdentity
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: TokenRequestSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TokenRequestStatus>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequestSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_seconds: Option<i64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequestStatus {
    #[serde(default)]
    pub token: String,
}

impl TokenRequest {
    pub fn new(expiration_seconds: i64) -> Self {
        TokenRequest {
            api_version: "security.gardener.cloud/v1alpha1".to_string(),
            kind: "TokenRequest".to_string(),
            metadata: ObjectMeta::default(),
            spec: TokenRequestSpec {
                expiration_seconds: Some(expiration_seconds),
            },
            status: None,
        }
    }
}

// ============================================================================
// seedmanagement.gardener.cloud
// ============================================================================

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ManagedSeed {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ManagedSeedSpec,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ManagedSeedSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shoot: Option<ShootReference>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ShootReference {
    pub name: String,
}

gardener_resource!(ManagedSeed, NamespaceResourceScope, namespaced: true, "ManagedSeed", "seedmanagement.gardener.cloud", "v1alpha1", "managedseeds");
