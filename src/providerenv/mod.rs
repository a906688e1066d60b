//! `provider-env`: project the credentials of the targeted shoot into a
//! shell script for the cloud provider's command line tool.
//!
//! The flow is resolve, gate, fetch, validate, write, render. Nothing is
//! written to disk before the credentials have been validated, and secret
//! values only ever reach the script as paths to 0600 data files.

mod providers;
mod tempdata;

pub use providers::{
    cli_name, needs_cloud_profile, provider_data, uses_token_file, validate_provider_type, CredentialKind,
    Credentials, ProviderData, ProviderInput,
};
pub use tempdata::{file_prefix, workload_identity_prefix, CanonicalTarget, DataWriter, DATA_DIR};

use crate::access::{check_access_restrictions, AccessRestrictionMessages};
use crate::allowpattern::{parse_allowed_patterns, Pattern, ValidationContext};
use crate::config::Config;
use crate::credvalidate::{
    default_gcp_allowed_patterns, default_stackit_allowed_patterns, gcp_validation_context,
    openstack_validation_context, stackit_validation_context,
};
use crate::env::{Shell, Template};
use crate::error::{GctlError, Result};
use crate::fsutil;
use crate::garden::types::{BindingRef, Shoot};
use crate::garden::GardenClient;
use crate::manager::Manager;
use crate::resolver::ResolveOptions;
use crate::CLI_NAME;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Lifetime requested for workload identity tokens
pub const TOKEN_TTL_SECONDS: i64 = 3600;

const WEB_IDENTITY_TOKEN_SUFFIX: &str = "web-identity-token";

#[derive(Clone, Debug)]
pub struct Options {
    pub shell: Shell,
    /// Emit a structured projection instead of a script
    pub structured: bool,
    pub unset: bool,
    pub confirm_access_restriction: bool,
    pub gcp_allowed_patterns: Vec<String>,
    pub gcp_allowed_uri_patterns: Vec<String>,
    pub openstack_allowed_patterns: Vec<String>,
    pub openstack_allowed_uri_patterns: Vec<String>,
}

impl Options {
    pub fn new(shell: Shell) -> Self {
        Options {
            shell,
            structured: false,
            unset: false,
            confirm_access_restriction: false,
            gcp_allowed_patterns: Vec::new(),
            gcp_allowed_uri_patterns: Vec::new(),
            openstack_allowed_patterns: Vec::new(),
            openstack_allowed_uri_patterns: Vec::new(),
        }
    }
}

/// Allow-lists per provider, merged from the built-in defaults, the
/// configuration and the command line
#[derive(Clone, Debug, Default)]
pub struct AllowedPatterns {
    pub gcp: Vec<Pattern>,
    pub openstack: Vec<Pattern>,
    pub stackit: Vec<Pattern>,
}

impl AllowedPatterns {
    /// Validate and merge every source. Flag patterns are checked even when
    /// the targeted shoot belongs to another provider.
    pub fn merge(config: &Config, options: &Options) -> Result<Self> {
        let gcp_ctx = gcp_validation_context();
        let openstack_ctx = openstack_validation_context();
        let stackit_ctx = stackit_validation_context();

        let gcp_flags = parse_allowed_patterns(&gcp_ctx, &options.gcp_allowed_patterns, &options.gcp_allowed_uri_patterns)?;
        let openstack_flags = parse_allowed_patterns(
            &openstack_ctx,
            &options.openstack_allowed_patterns,
            &options.openstack_allowed_uri_patterns,
        )?;

        Ok(AllowedPatterns {
            gcp: merge_patterns(
                "gcp",
                &gcp_ctx,
                default_gcp_allowed_patterns(),
                config.gcp_allowed_patterns(),
                gcp_flags,
            )?,
            openstack: merge_patterns("openstack", &openstack_ctx, Vec::new(), config.openstack_allowed_patterns(), openstack_flags)?,
            stackit: merge_patterns(
                "stackit",
                &stackit_ctx,
                default_stackit_allowed_patterns(),
                config.stackit_allowed_patterns(),
                Vec::new(),
            )?,
        })
    }

    pub fn for_provider(&self, provider_type: &str) -> Vec<Pattern> {
        match provider_type {
            "gcp" => self.gcp.clone(),
            "openstack" => self.openstack.clone(),
            "stackit" => self.stackit.clone(),
            _ => Vec::new(),
        }
    }
}

fn merge_patterns(
    provider: &str,
    ctx: &ValidationContext,
    defaults: Vec<Pattern>,
    configured: Vec<Pattern>,
    flags: Vec<Pattern>,
) -> Result<Vec<Pattern>> {
    let mut merged = defaults;
    if !configured.is_empty() {
        info!("Using custom {} allowed patterns from configuration", provider);
        for pattern in configured {
            pattern.validate_with_context(ctx)?;
            merged.push(pattern);
        }
    }
    if !flags.is_empty() {
        info!("Using custom {} allowed patterns from flags", provider);
        merged.extend(flags);
    }

    Ok(merged
        .iter()
        .map(Pattern::to_normalized)
        .collect::<std::result::Result<Vec<_>, _>>()?)
}

/// What `provider-env` produces
#[derive(Clone, Debug, PartialEq)]
pub enum Output {
    /// A script for the shell's `eval`
    Script(String),
    /// Structured description of the generated environment, free of secrets
    Projection(Projection),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    pub provider_type: String,
    pub cli: String,
    pub credential_kind: CredentialKind,
    pub region: String,
    pub config_dir: String,
    pub data_files: BTreeMap<String, String>,
    pub values: BTreeMap<String, String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Metadata {
    unset: bool,
    command_path: String,
    cli: String,
    target_flags: String,
    credential_kind: &'static str,
    shell: Shell,
    prompt: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TemplateData<'a> {
    meta: Metadata,
    data_files: &'a BTreeMap<String, String>,
    config_dir: String,
    region: &'a str,
    #[serde(flatten)]
    values: &'a BTreeMap<String, String>,
}

#[derive(Serialize)]
struct AbortData {
    lines: Vec<String>,
}

fn command_path() -> String {
    format!("{CLI_NAME} provider-env")
}

/// Where the shoot's credentials live
enum CredentialsSource {
    Secret { namespace: String, name: String },
    WorkloadIdentity { namespace: String, name: String },
}

impl CredentialsSource {
    fn kind(&self) -> CredentialKind {
        match self {
            CredentialsSource::Secret { .. } => CredentialKind::Secret,
            CredentialsSource::WorkloadIdentity { .. } => CredentialKind::WorkloadIdentity,
        }
    }
}

async fn credentials_source(client: &dyn GardenClient, shoot: &Shoot) -> Result<CredentialsSource> {
    let shoot_namespace = shoot.metadata.namespace.clone().unwrap_or_default();
    let shoot_name = shoot.metadata.name.as_deref().unwrap_or_default();

    match shoot.binding() {
        Some(BindingRef::Secret(name)) => {
            let binding = client.get_secret_binding(&shoot_namespace, name).await?;
            let namespace = binding
                .secret_ref
                .namespace
                .filter(|ns| !ns.is_empty())
                .unwrap_or_else(|| shoot_namespace.clone());
            Ok(CredentialsSource::Secret {
                namespace,
                name: binding.secret_ref.name,
            })
        }
        Some(BindingRef::Credentials(name)) => {
            let binding = client.get_credentials_binding(&shoot_namespace, name).await?;
            let reference = binding.credentials_ref;
            let namespace = if reference.namespace.is_empty() {
                shoot_namespace.clone()
            } else {
                reference.namespace
            };
            match reference.kind.as_str() {
                "Secret" => Ok(CredentialsSource::Secret {
                    namespace,
                    name: reference.name,
                }),
                "WorkloadIdentity" => Ok(CredentialsSource::WorkloadIdentity {
                    namespace,
                    name: reference.name,
                }),
                other => Err(GctlError::InvalidArgument(format!(
                    "credentials binding {name:?} references unsupported kind {other:?}"
                ))),
            }
        }
        None => Err(GctlError::InvalidArgument(format!(
            "shoot {shoot_name:?} references neither a secret binding nor a credentials binding"
        ))),
    }
}

/// Token file of a workload identity, kept across runs until `--unset`
fn web_identity_token_file(config_dir: &Path, session_id: &str, namespace: &str, name: &str) -> PathBuf {
    let prefix = workload_identity_prefix(session_id, namespace, name);
    config_dir.join(format!(".{prefix}-{WEB_IDENTITY_TOKEN_SUFFIX}"))
}

fn abort_lines(messages: &AccessRestrictionMessages, shell: Shell) -> Vec<String> {
    let mut lines: Vec<String> = messages.render().lines().map(str::to_string).collect();
    lines.push(
        "The cloud provider CLI configuration script can only be generated if you confirm the access despite the existing restrictions."
            .to_string(),
    );
    lines.push("Use the --confirm-access-restriction flag to confirm the access.".to_string());
    lines.push(format!(
        "{}{}",
        shell.prompt(),
        shell.eval_command(&format!("{} --confirm-access-restriction {shell}", command_path()))
    ));
    lines
}

/// Generate the environment for the currently targeted shoot.
///
/// `templates_dir` may hold user templates that replace the embedded ones.
pub async fn run(manager: &Manager, options: &Options, templates_dir: Option<&Path>) -> Result<Output> {
    let patterns = AllowedPatterns::merge(manager.config(), options)?;

    let resolution = manager.resolve_current(ResolveOptions::projection()).await?;
    let shoot = resolution.require_shoot()?;
    let provider_type = shoot.spec.provider.type_.as_str();
    validate_provider_type(provider_type)?;

    let client = resolution.client.as_ref();
    let session = manager.session();
    let cli = cli_name(provider_type).to_string();
    let config_dir = session.dir().join(".config").join(&cli);

    let canonical = CanonicalTarget {
        garden: resolution.garden.name.clone(),
        namespace: shoot.metadata.namespace.clone().unwrap_or_default(),
        shoot: shoot.metadata.name.clone().unwrap_or_default(),
    };
    let mut writer = DataWriter::new(session.dir(), file_prefix(session.id(), &canonical));
    let source = credentials_source(client, shoot).await?;

    let meta = Metadata {
        unset: options.unset,
        command_path: command_path(),
        cli: cli.clone(),
        target_flags: resolution.target.to_flags(),
        credential_kind: source.kind().as_str(),
        shell: options.shell,
        prompt: options.shell.prompt(),
    };

    if options.unset {
        let removed = writer.cleanup()?;
        if let CredentialsSource::WorkloadIdentity { namespace, name } = &source {
            fsutil::remove_if_exists(&web_identity_token_file(&config_dir, session.id(), namespace, name))?;
        }
        debug!(removed, "Cleaned up provider data of {}", resolution.target);

        if options.structured {
            return Ok(Output::Projection(Projection {
                provider_type: provider_type.to_string(),
                cli,
                credential_kind: source.kind(),
                region: shoot.spec.region.clone(),
                config_dir: config_dir.to_string_lossy().into_owned(),
                data_files: BTreeMap::new(),
                values: BTreeMap::new(),
            }));
        }
        let template = Template::for_name(options.shell, provider_type, templates_dir)?;
        let empty = BTreeMap::new();
        let script = template.render(
            provider_type,
            &TemplateData {
                meta,
                data_files: &empty,
                config_dir: config_dir.to_string_lossy().into_owned(),
                region: &shoot.spec.region,
                values: &empty,
            },
        )?;
        return Ok(Output::Script(script));
    }

    let messages = check_access_restrictions(&resolution.garden.access_restrictions, shoot);
    if !messages.is_empty() {
        if !options.confirm_access_restriction {
            if options.structured {
                return Err(GctlError::ConfirmationRequired);
            }
            let template = Template::for_name(options.shell, "abort", templates_dir)?;
            let script = template.render(
                "abort",
                &AbortData {
                    lines: abort_lines(&messages, options.shell),
                },
            )?;
            return Ok(Output::Script(script));
        }
        let mut stderr = std::io::stderr();
        stderr.write_all(messages.render().as_bytes())?;
    }

    let mut token_file = None;
    let mut token = None;
    let credentials = match &source {
        CredentialsSource::Secret { namespace, name } => {
            let secret = client.get_secret(namespace, name).await?;
            let data = secret
                .data
                .unwrap_or_default()
                .into_iter()
                .map(|(k, v)| (k, v.0))
                .collect();
            Credentials::Secret(data)
        }
        CredentialsSource::WorkloadIdentity { namespace, name } => {
            let identity = client.get_workload_identity(namespace, name).await?;
            let target_type = identity.spec.target_system.type_.as_str();
            if target_type != provider_type {
                return Err(GctlError::InvalidArgument(format!(
                    "workload identity {name:?} targets provider {target_type:?}, shoot uses {provider_type:?}"
                )));
            }
            if uses_token_file(provider_type) {
                // the token passes the token guard before anything is written
                token = Some(
                    client
                        .create_workload_identity_token(namespace, name, TOKEN_TTL_SECONDS)
                        .await?,
                );
                token_file = Some(web_identity_token_file(&config_dir, session.id(), namespace, name));
            }
            Credentials::WorkloadIdentity {
                provider_config: identity.spec.target_system.provider_config,
            }
        }
    };

    let cloud_profile = if needs_cloud_profile(provider_type) {
        let reference = shoot.cloud_profile_ref().ok_or_else(|| {
            GctlError::InvalidArgument(format!("shoot {:?} does not reference a cloud profile", canonical.shoot))
        })?;
        Some(client.get_cloud_profile(&reference, &canonical.namespace).await?)
    } else {
        None
    };

    let data = provider_data(
        provider_type,
        patterns.for_provider(provider_type),
        &ProviderInput {
            shoot,
            cloud_profile: cloud_profile.as_ref(),
            credentials: &credentials,
            token_file: token_file.as_deref(),
        },
    )?;

    // credentials are valid from here on
    writer.cleanup()?;
    for (field, value) in &data.files {
        writer.write_field(field, value)?;
    }
    writer.write_field("region", &shoot.spec.region)?;
    fsutil::create_private_dir(&config_dir)?;

    if let (Some(path), Some(token)) = (&token_file, &token) {
        fsutil::write_private_file(path, token.as_bytes())?;
    }
    debug!(files = writer.files().len(), "Wrote provider data of {}", resolution.target);

    if options.structured {
        return Ok(Output::Projection(Projection {
            provider_type: provider_type.to_string(),
            cli,
            credential_kind: credentials.kind(),
            region: shoot.spec.region.clone(),
            config_dir: config_dir.to_string_lossy().into_owned(),
            data_files: writer.files().clone(),
            values: data.values,
        }));
    }

    let template = Template::for_name(options.shell, provider_type, templates_dir)?;
    let script = template.render(
        provider_type,
        &TemplateData {
            meta,
            data_files: writer.files(),
            config_dir: config_dir.to_string_lossy().into_owned(),
            region: &shoot.spec.region,
            values: &data.values,
        },
    )?;
    Ok(Output::Script(script))
}
