//! `provider-env` command

use crate::cli::ProviderEnvArgs;
use crate::commands::print_structured;
use crate::error::Result;
use crate::manager::Manager;
use crate::providerenv::{self, Options, Output};
use std::path::Path;
use tracing::warn;

impl From<&ProviderEnvArgs> for Options {
    fn from(args: &ProviderEnvArgs) -> Self {
        Options {
            shell: args.shell,
            structured: args.output.is_some(),
            unset: args.unset,
            confirm_access_restriction: args.confirm_access_restriction || args.force,
            gcp_allowed_patterns: args.gcp_allowed_patterns.clone(),
            gcp_allowed_uri_patterns: args.gcp_allowed_uri_patterns.clone(),
            openstack_allowed_patterns: args.openstack_allowed_patterns.clone(),
            openstack_allowed_uri_patterns: args.openstack_allowed_uri_patterns.clone(),
        }
    }
}

/// Execute the provider-env command
pub async fn run_provider_env(manager: &Manager, args: &ProviderEnvArgs, templates_dir: Option<&Path>) -> Result<()> {
    if args.force {
        warn!("--force is deprecated, use --confirm-access-restriction instead");
    }

    match providerenv::run(manager, &Options::from(args), templates_dir).await? {
        Output::Script(script) => print!("{script}"),
        Output::Projection(projection) => print_structured(&projection, args.output.unwrap_or_default())?,
    }
    Ok(())
}
