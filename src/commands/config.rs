//! `config` command family

use crate::allowpattern::{parse_allowed_patterns, parse_and_validate_endpoint_url, Pattern};
use crate::cli::{ConfigCommand, SetGardenArgs};
use crate::commands::print_structured;
use crate::config::{self, Config};
use crate::credvalidate::openstack_validation_context;
use crate::error::Result;
use std::path::Path;
use tracing::info;

/// User-provided `authURL` patterns for keystone endpoints
pub fn openstack_auth_url_patterns(uris: &[String]) -> Result<Vec<Pattern>> {
    let mut shorthands = Vec::with_capacity(uris.len());
    for uri in uris {
        parse_and_validate_endpoint_url(uri, true)?;
        shorthands.push(format!("authURL={uri}"));
    }
    Ok(parse_allowed_patterns(&openstack_validation_context(), &[], &shorthands)?)
}

fn set_garden(config: &mut Config, args: &SetGardenArgs) -> Result<()> {
    config.set_garden(
        &args.name,
        args.kubeconfig.as_deref(),
        args.context.as_deref(),
        args.patterns.as_deref(),
        args.alias.as_deref(),
    )
}

/// Apply a modifying config command; `View` leaves the configuration untouched
pub fn apply_config_command(config: &mut Config, command: &ConfigCommand) -> Result<Option<String>> {
    let message = match command {
        ConfigCommand::View { .. } => return Ok(None),
        ConfigCommand::SetGarden(args) => {
            set_garden(config, args)?;
            format!("Successfully configured garden {:?}", args.name)
        }
        ConfigCommand::DeleteGarden { name } => {
            config.delete_garden(name)?;
            format!("Successfully deleted garden {name:?}")
        }
        ConfigCommand::SetOpenstackAuthurl(args) => {
            let patterns = if args.clear {
                Vec::new()
            } else {
                openstack_auth_url_patterns(&args.uri_patterns)?
            };
            info!("Setting {} openstack authURL patterns", patterns.len());
            config.set_openstack_auth_urls(patterns);
            "Successfully configured openstack authURL patterns".to_string()
        }
    };
    Ok(Some(message))
}

/// Execute a config command against the file at `path`
pub fn run_config(path: &Path, command: &ConfigCommand) -> Result<()> {
    let mut config = config::load_or_default(path)?;
    if let ConfigCommand::View { output } = command {
        return print_structured(&config, *output);
    }

    if let Some(message) = apply_config_command(&mut config, command)? {
        config.save()?;
        println!("{message}");
    }
    Ok(())
}
