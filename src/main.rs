//! gardenctl - target Gardener landscapes and configure your shell for them

use anyhow::{Context, Result};
use clap::Parser;
use gardenctl::cli::{Cli, Command};
use gardenctl::error::GctlError;
use gardenctl::garden::KubeClientProvider;
use gardenctl::manager::Manager;
use gardenctl::session::{self, Session};
use gardenctl::{commands, config, CLI_NAME};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_tracing(cli.verbose);

    if cli.no_color {
        owo_colors::set_override(false);
    }

    let result = tokio::select! {
        result = run(cli) => result,
        _ = tokio::signal::ctrl_c() => Err(GctlError::Cancelled.into()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let (kind, code) = match e.downcast_ref::<GctlError>() {
                Some(err) => (err.kind(), err.exit_code()),
                None => ("Error", 1),
            };
            eprintln!("Error ({kind}): {e:#}");
            ExitCode::from(code as u8)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    // commands that need neither configuration nor session
    match &cli.command {
        Command::Completions(args) => {
            generate_completions(args.shell);
            return Ok(());
        }
        Command::Version(args) => return Ok(commands::run_version(args)?),
        _ => {}
    }

    let config_path = config::config_path(cli.config.as_deref())?;
    if let Command::Config(args) = &cli.command {
        return Ok(commands::run_config(&config_path, &args.command)?);
    }

    let config = config::load_or_default(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;
    let session_id = match cli.session_id.as_deref().filter(|id| !id.is_empty()) {
        Some(id) => {
            session::validate_session_id(id)?;
            id.to_string()
        }
        None => session::session_id_from_env()?,
    };
    let session = Session::open(&session::default_session_root(), &session_id)?;
    // best effort, never awaited
    let _gc = session.spawn_gc();

    let templates_dir = config::home_dir()?.join("templates");
    let manager = Manager::new(config, session, Arc::new(KubeClientProvider), cli.target.clone());

    match &cli.command {
        Command::Target(args) => commands::run_target(&manager, args).await?,
        Command::Resolve(args) => commands::run_resolve(&manager, args).await?,
        Command::ProviderEnv(args) => commands::run_provider_env(&manager, args, Some(&templates_dir)).await?,
        Command::KubectlEnv(args) => commands::run_kubectl_env(&manager, args, Some(&templates_dir)).await?,
        Command::Config(_) | Command::Version(_) | Command::Completions(_) => {}
    }
    Ok(())
}

fn setup_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn generate_completions(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    use clap_complete::generate;

    let mut cmd = Cli::command();
    generate(shell, &mut cmd, CLI_NAME, &mut std::io::stdout());
}
