//! CLI command definitions using clap

use crate::env::Shell;
use crate::target::{TargetFlags, TargetKind};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "gardenctl",
    version,
    about = "Target gardens, projects, seeds and shoots and configure your shell for them",
    long_about = None,
)]
pub struct Cli {
    /// Configuration file to use instead of $GCTL_HOME/$GCTL_CONFIG_NAME.yaml
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Session to use instead of the one of the invoking terminal
    #[arg(long, global = true, env = "GCTL_SESSION_ID", value_name = "ID")]
    pub session_id: Option<String>,

    /// Enable verbose logging (repeat for more)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(flatten)]
    pub target: TargetFlags,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Set the scope for the next operations
    Target(TargetArgs),

    /// Print the fully resolved target
    Resolve(ResolveArgs),

    /// Generate a script that configures the cloud provider CLI for the targeted shoot
    #[command(visible_alias = "p-env", alias = "cloud-env")]
    ProviderEnv(ProviderEnvArgs),

    /// Generate a script that points KUBECONFIG to the targeted cluster
    #[command(visible_alias = "k-env")]
    KubectlEnv(KubectlEnvArgs),

    /// View and modify the gardenctl configuration
    Config(ConfigArgs),

    /// Print the client version
    Version(VersionArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
#[command(args_conflicts_with_subcommands = true)]
pub struct TargetArgs {
    #[command(subcommand)]
    pub command: Option<TargetCommand>,

    /// Value matched against the garden patterns, e.g. a dashboard URL
    pub value: Option<String>,

    /// Confirm the access to a shoot with access restrictions
    #[arg(short = 'y', long, global = true)]
    pub confirm_access_restriction: bool,
}

#[derive(Args, Clone, Debug, Default)]
pub struct NameArg {
    /// Name of the object; defaults to the one given by flags or the current target
    pub name: Option<String>,
}

#[derive(Subcommand)]
pub enum TargetCommand {
    /// Target a garden
    Garden(NameArg),

    /// Target a project
    Project(NameArg),

    /// Target a seed
    Seed(NameArg),

    /// Target a shoot
    Shoot(NameArg),

    /// Target the control plane of the shoot
    ControlPlane,

    /// Target whatever a value matches in the garden patterns
    Value {
        value: String,
    },

    /// Drop one level of the current target
    Unset {
        #[arg(value_enum)]
        kind: UnsetKind,
    },

    /// Print the current target
    View {
        #[arg(short = 'o', long, value_enum, default_value = "yaml")]
        output: OutputFormat,
    },

    /// Print previously targeted targets
    History,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum UnsetKind {
    Garden,
    Project,
    Seed,
    Shoot,
    ControlPlane,
}

impl From<UnsetKind> for TargetKind {
    fn from(kind: UnsetKind) -> Self {
        match kind {
            UnsetKind::Garden => TargetKind::Garden,
            UnsetKind::Project => TargetKind::Project,
            UnsetKind::Seed => TargetKind::Seed,
            UnsetKind::Shoot => TargetKind::Shoot,
            UnsetKind::ControlPlane => TargetKind::ControlPlane,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ResolveKind {
    Garden,
    Project,
    Seed,
    Shoot,
}

#[derive(Args)]
pub struct ResolveArgs {
    /// Level of the target to resolve
    #[arg(value_enum)]
    pub kind: ResolveKind,

    #[arg(short = 'o', long, value_enum, default_value = "yaml")]
    pub output: OutputFormat,
}

#[derive(Args)]
pub struct ProviderEnvArgs {
    /// Shell to generate the script for
    #[arg(value_enum)]
    pub shell: Shell,

    /// Generate the script to reset the configuration
    #[arg(short = 'u', long)]
    pub unset: bool,

    /// Confirm the access to a shoot with access restrictions
    #[arg(short = 'y', long)]
    pub confirm_access_restriction: bool,

    /// Deprecated, use --confirm-access-restriction
    #[arg(long, hide = true)]
    pub force: bool,

    /// Print a structured description instead of a script
    #[arg(short = 'o', long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Additional allowed GCP patterns as JSON objects
    #[arg(long = "gcp-allowed-patterns", value_name = "JSON")]
    pub gcp_allowed_patterns: Vec<String>,

    /// Additional allowed GCP URIs as field=uri
    #[arg(long = "gcp-allowed-uri-patterns", value_name = "FIELD=URI")]
    pub gcp_allowed_uri_patterns: Vec<String>,

    /// Additional allowed OpenStack patterns as JSON objects
    #[arg(long = "openstack-allowed-patterns", value_name = "JSON")]
    pub openstack_allowed_patterns: Vec<String>,

    /// Additional allowed OpenStack URIs as field=uri
    #[arg(long = "openstack-allowed-uri-patterns", value_name = "FIELD=URI")]
    pub openstack_allowed_uri_patterns: Vec<String>,
}

#[derive(Args)]
pub struct KubectlEnvArgs {
    /// Shell to generate the script for
    #[arg(value_enum)]
    pub shell: Shell,

    /// Generate the script to unset KUBECONFIG
    #[arg(short = 'u', long)]
    pub unset: bool,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the configuration
    View {
        #[arg(short = 'o', long, value_enum, default_value = "yaml")]
        output: OutputFormat,
    },

    /// Create or update a garden
    SetGarden(SetGardenArgs),

    /// Remove a garden
    DeleteGarden {
        name: String,
    },

    /// Set the allowed OpenStack authURL patterns
    SetOpenstackAuthurl(SetOpenstackAuthurlArgs),
}

#[derive(Args)]
pub struct SetGardenArgs {
    /// Name of the garden
    pub name: String,

    /// Kubeconfig of the garden cluster
    #[arg(long)]
    pub kubeconfig: Option<String>,

    /// Context of the kubeconfig to use
    #[arg(long)]
    pub context: Option<String>,

    /// Regular expression with named captures project, namespace and shoot; "" clears all
    #[arg(long = "pattern", value_name = "REGEX")]
    pub patterns: Option<Vec<String>>,

    /// Unique alternative name of the garden
    #[arg(long)]
    pub alias: Option<String>,
}

#[derive(Args)]
pub struct SetOpenstackAuthurlArgs {
    /// Allowed keystone URL
    #[arg(long = "uri-pattern", value_name = "URI", required_unless_present = "clear", conflicts_with = "clear")]
    pub uri_patterns: Vec<String>,

    /// Remove all allowed authURL patterns
    #[arg(long)]
    pub clear: bool,
}

#[derive(Args)]
pub struct VersionArgs {
    #[arg(short = 'o', long, value_enum)]
    pub output: Option<OutputFormat>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
