//! Per-provider template data
//!
//! Each provider turns validated credentials into the values its template
//! needs. Secret-bearing values go to `files` and end up in data files;
//! `values` are handed to the template as they are.

use crate::allowpattern::Pattern;
use crate::credvalidate::{validator_for, CredentialValidator, Fields, OpenStackValidator};
use crate::error::{GctlError, Result};
use crate::garden::types::{CloudProfileUnion, Shoot};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// Where the credentials of a shoot come from
#[derive(Clone, Debug)]
pub enum Credentials {
    Secret(BTreeMap<String, Vec<u8>>),
    WorkloadIdentity { provider_config: Option<Value> },
}

impl Credentials {
    pub fn kind(&self) -> CredentialKind {
        match self {
            Credentials::Secret(_) => CredentialKind::Secret,
            Credentials::WorkloadIdentity { .. } => CredentialKind::WorkloadIdentity,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CredentialKind {
    Secret,
    WorkloadIdentity,
}

impl CredentialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialKind::Secret => "secret",
            CredentialKind::WorkloadIdentity => "workloadIdentity",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProviderData {
    pub files: BTreeMap<String, String>,
    pub values: BTreeMap<String, String>,
}

impl ProviderData {
    fn file(mut self, field: &str, value: impl Into<String>) -> Self {
        self.files.insert(field.to_string(), value.into());
        self
    }

    fn value(mut self, key: &str, value: impl Into<String>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    /// Copy the listed fields that are present and non-empty
    fn files_from(mut self, fields: &Fields, names: &[&str]) -> Self {
        for name in names {
            if let Some(v) = fields.get(*name).map(value_string).filter(|v| !v.is_empty()) {
                self.files.insert(name.to_string(), v);
            }
        }
        self
    }
}

/// Everything a provider may draw from
pub struct ProviderInput<'a> {
    pub shoot: &'a Shoot,
    pub cloud_profile: Option<&'a CloudProfileUnion>,
    pub credentials: &'a Credentials,
    /// Location of the workload identity token, for providers that read it from disk
    pub token_file: Option<&'a Path>,
}

/// Name of the provider's command line tool
pub fn cli_name(provider_type: &str) -> &str {
    match provider_type {
        "alicloud" => "aliyun",
        "gcp" => "gcloud",
        "azure" => "az",
        other => other,
    }
}

/// Providers whose workload identity flow needs the token written to disk
pub fn uses_token_file(provider_type: &str) -> bool {
    matches!(provider_type, "aws" | "gcp")
}

/// Whether the provider's data depends on the shoot's cloud profile
pub fn needs_cloud_profile(provider_type: &str) -> bool {
    matches!(provider_type, "openstack" | "stackit")
}

/// Provider types name a DNS label; `kubernetes` is reserved for kubectl-env
pub fn validate_provider_type(provider_type: &str) -> Result<()> {
    let valid_label = !provider_type.is_empty()
        && provider_type.len() <= 63
        && provider_type
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !provider_type.starts_with('-')
        && !provider_type.ends_with('-');
    if !valid_label || provider_type == "kubernetes" {
        return Err(GctlError::InvalidArgument(format!(
            "invalid provider type {provider_type:?}"
        )));
    }
    Ok(())
}

/// Validate the credentials and build the template data for `provider_type`
pub fn provider_data(provider_type: &str, allowed_patterns: Vec<Pattern>, input: &ProviderInput<'_>) -> Result<ProviderData> {
    let validator = validator_for(provider_type, allowed_patterns.clone()).ok_or_else(|| {
        GctlError::InvalidArgument(format!("provider type {provider_type:?} is not supported"))
    })?;

    let data = match (provider_type, input.credentials) {
        ("aws", Credentials::Secret(secret)) => {
            let fields = validator.validate_secret(secret)?;
            ProviderData::default().files_from(&fields, &["accessKeyID", "secretAccessKey"])
        }
        ("aws", Credentials::WorkloadIdentity { provider_config }) => {
            let fields = validator.validate_workload_identity_config(provider_config.as_ref())?;
            ProviderData::default()
                .files_from(&fields, &["roleARN"])
                .value("webIdentityTokenFile", token_file(input)?)
        }
        ("azure", credentials) => {
            let fields = validate(validator.as_ref(), credentials)?;
            ProviderData::default().files_from(&fields, &["clientID", "clientSecret", "tenantID", "subscriptionID"])
        }
        ("gcp", Credentials::Secret(secret)) => gcp_from_secret(&validator.validate_secret(secret)?)?,
        ("gcp", Credentials::WorkloadIdentity { provider_config }) => {
            let fields = validator.validate_workload_identity_config(provider_config.as_ref())?;
            gcp_from_workload_identity(&fields, &token_file(input)?)?
        }
        ("alicloud", credentials) => {
            let fields = validate(validator.as_ref(), credentials)?;
            ProviderData::default().files_from(&fields, &["accessKeyID", "accessKeySecret"])
        }
        ("hcloud", credentials) => {
            let fields = validate(validator.as_ref(), credentials)?;
            ProviderData::default().files_from(&fields, &["hcloudToken"])
        }
        ("openstack", credentials) => {
            let fields = validate(validator.as_ref(), credentials)?;
            let auth_url = keystone_url(cloud_profile(input)?, &input.shoot.spec.region)?;
            OpenStackValidator::new(allowed_patterns)
                .validate_auth_url(&auth_url)
                .map_err(|e| GctlError::InvalidCredentials(format!("invalid authURL from cloud profile: {e}")))?;
            openstack_data(&fields, auth_url)
        }
        ("stackit", credentials) => {
            let fields = validate(validator.as_ref(), credentials)?;
            let auth_url = stackit_keystone_url(cloud_profile(input)?)?;
            stackit_data(&fields, auth_url, &input.shoot.spec.region)
        }
        (other, _) => {
            return Err(GctlError::InvalidArgument(format!("provider type {other:?} is not supported")));
        }
    };

    Ok(data)
}

fn validate(validator: &dyn CredentialValidator, credentials: &Credentials) -> Result<Fields> {
    Ok(match credentials {
        Credentials::Secret(secret) => validator.validate_secret(secret)?,
        Credentials::WorkloadIdentity { provider_config } => {
            validator.validate_workload_identity_config(provider_config.as_ref())?
        }
    })
}

fn token_file(input: &ProviderInput<'_>) -> Result<String> {
    input
        .token_file
        .map(|p| p.to_string_lossy().into_owned())
        .ok_or_else(|| GctlError::InvalidArgument("workload identity token file is not set".to_string()))
}

fn cloud_profile<'a>(input: &ProviderInput<'a>) -> Result<&'a CloudProfileUnion> {
    input
        .cloud_profile
        .ok_or_else(|| GctlError::InvalidArgument("cloud profile of the shoot is required".to_string()))
}

fn value_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn gcp_from_secret(fields: &Fields) -> Result<ProviderData> {
    let raw = fields.get("serviceaccount.json").map(value_string).unwrap_or_default();
    let account: Fields = serde_json::from_str(&raw)?;
    let get = |key: &str| account.get(key).map(value_string).unwrap_or_default();

    Ok(ProviderData::default()
        .file("credentials", raw.clone())
        .file("project_id", get("project_id"))
        .file("client_email", get("client_email")))
}

fn gcp_from_workload_identity(fields: &Fields, token_file: &str) -> Result<ProviderData> {
    let project_id = fields.get("projectID").map(value_string).unwrap_or_default();
    let mut config = fields
        .get("credentialsConfig")
        .and_then(Value::as_object)
        .cloned()
        .ok_or_else(|| GctlError::InvalidCredentials("credentialsConfig is missing".to_string()))?;
    config.insert(
        "credential_source".to_string(),
        json!({"file": token_file, "format": {"type": "text"}}),
    );

    Ok(ProviderData::default()
        .file("credentials", serde_json::to_string(&config)?)
        .file("project_id", project_id))
}

/// `keystoneURLs[region]`, falling back to `keystoneURL`
fn keystone_url(cloud_profile: &CloudProfileUnion, region: &str) -> Result<String> {
    let config = cloud_profile.provider_config();
    let regional = config
        .and_then(|c| c.get("keystoneURLs"))
        .and_then(Value::as_array)
        .and_then(|urls| {
            urls.iter()
                .find(|u| u.get("region").and_then(Value::as_str) == Some(region))
                .and_then(|u| u.get("url"))
                .and_then(Value::as_str)
        });
    let global = config.and_then(|c| c.get("keystoneURL")).and_then(Value::as_str);

    regional
        .or(global)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            GctlError::InvalidArgument(format!(
                "cannot find keystone URL for region {region:?} in cloudprofile {:?}",
                cloud_profile.name()
            ))
        })
}

fn stackit_keystone_url(cloud_profile: &CloudProfileUnion) -> Result<String> {
    let name = cloud_profile.name();
    let config = cloud_profile
        .provider_config()
        .ok_or_else(|| GctlError::InvalidArgument(format!("providerConfig of {name} is empty")))?;
    config
        .get("keystoneURL")
        .and_then(Value::as_str)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .ok_or_else(|| GctlError::InvalidArgument(format!("keystoneURL of {name} is invalid")))
}

fn openstack_data(fields: &Fields, auth_url: String) -> ProviderData {
    let data = ProviderData::default().file("authURL", auth_url).files_from(
        fields,
        &[
            "domainName",
            "tenantName",
            "username",
            "password",
            "applicationCredentialID",
            "applicationCredentialName",
            "applicationCredentialSecret",
        ],
    );

    if data.files.contains_key("applicationCredentialSecret") {
        data.value("authType", "v3applicationcredential").value("authStrategy", "")
    } else {
        data.value("authType", "").value("authStrategy", "keystone")
    }
}

fn stackit_data(fields: &Fields, auth_url: String, region: &str) -> ProviderData {
    let get = |key: &str| fields.get(key).map(value_string).unwrap_or_default();
    // STACKIT shoots in eu01 still report the OpenStack region name
    let region = if region == "RegionOne" { "eu01" } else { region };

    ProviderData::default()
        .file("authURL", auth_url)
        .files_from(fields, &["domainName", "tenantName", "username", "password"])
        .file("projectId", get("project-id"))
        .file("serviceaccount", get("serviceaccount.json"))
        .value("authStrategy", "keystone")
        .value("stackitRegion", region)
}
