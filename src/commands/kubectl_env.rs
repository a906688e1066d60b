//! `kubectl-env` command

use crate::cli::KubectlEnvArgs;
use crate::env::{Shell, Template};
use crate::error::Result;
use crate::manager::Manager;
use crate::resolver::ResolveOptions;
use crate::CLI_NAME;
use serde::Serialize;
use std::path::Path;

const TEMPLATE: &str = "kubernetes";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Metadata {
    unset: bool,
    command_path: String,
    cli: &'static str,
    shell: Shell,
    prompt: &'static str,
}

#[derive(Serialize)]
struct Data {
    meta: Metadata,
    filename: String,
}

/// Script exporting `KUBECONFIG` for the current target, or unsetting it
pub async fn kubectl_env_script(
    manager: &Manager,
    shell: Shell,
    unset: bool,
    templates_dir: Option<&Path>,
) -> Result<String> {
    let filename = if unset {
        String::new()
    } else {
        let resolution = manager.resolve_current(ResolveOptions::default()).await?;
        let kubeconfig = manager.client_config(&resolution).await?;
        manager
            .write_client_config(&kubeconfig)?
            .to_string_lossy()
            .into_owned()
    };

    let template = Template::for_name(shell, TEMPLATE, templates_dir)?;
    template.render(
        TEMPLATE,
        &Data {
            meta: Metadata {
                unset,
                command_path: format!("{CLI_NAME} kubectl-env"),
                cli: "kubectl",
                shell,
                prompt: shell.prompt(),
            },
            filename,
        },
    )
}

/// Execute the kubectl-env command
pub async fn run_kubectl_env(manager: &Manager, args: &KubectlEnvArgs, templates_dir: Option<&Path>) -> Result<()> {
    print!("{}", kubectl_env_script(manager, args.shell, args.unset, templates_dir).await?);
    Ok(())
}
