//! CLI parsing tests for the gardenctl command line interface

use clap::Parser;
use gardenctl::cli::{
    Cli, Command, ConfigCommand, OutputFormat, ResolveKind, TargetCommand, UnsetKind,
};
use gardenctl::env::Shell;

// ============================================================================
// Target command parsing tests
// ============================================================================

#[test]
fn test_parse_target_shoot_with_flags() {
    let args = Cli::parse_from([
        "gardenctl", "target", "shoot", "my-shoot", "--garden", "g1", "--project", "prod",
    ]);
    assert_eq!(args.target.garden.as_deref(), Some("g1"));
    assert_eq!(args.target.project.as_deref(), Some("prod"));
    match args.command {
        Command::Target(t) => match t.command {
            Some(TargetCommand::Shoot(n)) => assert_eq!(n.name.as_deref(), Some("my-shoot")),
            _ => panic!("expected target shoot"),
        },
        _ => panic!("expected target command"),
    }
}

#[test]
fn test_parse_target_without_name() {
    let args = Cli::parse_from(["gardenctl", "target", "project"]);
    match args.command {
        Command::Target(t) => match t.command {
            Some(TargetCommand::Project(n)) => assert!(n.name.is_none()),
            _ => panic!("expected target project"),
        },
        _ => panic!("expected target command"),
    }
}

#[test]
fn test_parse_target_value() {
    let args = Cli::parse_from(["gardenctl", "target", "shoot--prod--my-shoot"]);
    match args.command {
        Command::Target(t) => {
            assert!(t.command.is_none());
            assert_eq!(t.value.as_deref(), Some("shoot--prod--my-shoot"));
        }
        _ => panic!("expected target command"),
    }
}

#[test]
fn test_parse_target_confirm_access_restriction() {
    let args = Cli::parse_from(["gardenctl", "target", "shoot", "s", "-y"]);
    match args.command {
        Command::Target(t) => assert!(t.confirm_access_restriction),
        _ => panic!("expected target command"),
    }
}

#[test]
fn test_parse_target_control_plane() {
    let args = Cli::parse_from(["gardenctl", "target", "control-plane"]);
    match args.command {
        Command::Target(t) => assert!(matches!(t.command, Some(TargetCommand::ControlPlane))),
        _ => panic!("expected target command"),
    }
}

#[test]
fn test_parse_target_unset() {
    let args = Cli::parse_from(["gardenctl", "target", "unset", "control-plane"]);
    match args.command {
        Command::Target(t) => match t.command {
            Some(TargetCommand::Unset { kind }) => assert_eq!(kind, UnsetKind::ControlPlane),
            _ => panic!("expected target unset"),
        },
        _ => panic!("expected target command"),
    }
}

#[test]
fn test_parse_target_view_json() {
    let args = Cli::parse_from(["gardenctl", "target", "view", "-o", "json"]);
    match args.command {
        Command::Target(t) => match t.command {
            Some(TargetCommand::View { output }) => assert_eq!(output, OutputFormat::Json),
            _ => panic!("expected target view"),
        },
        _ => panic!("expected target command"),
    }
}

#[test]
fn test_parse_target_history() {
    let args = Cli::parse_from(["gardenctl", "target", "history"]);
    match args.command {
        Command::Target(t) => assert!(matches!(t.command, Some(TargetCommand::History))),
        _ => panic!("expected target command"),
    }
}

#[test]
fn test_target_project_and_seed_flags_parse() {
    // the conflict is reported when the flags are applied, not by clap
    let args = Cli::parse_from(["gardenctl", "--project", "p", "--seed", "s", "target", "view"]);
    assert!(args.target.override_target(&Default::default()).is_err());
}

// ============================================================================
// Resolve command parsing tests
// ============================================================================

#[test]
fn test_parse_resolve_defaults_to_yaml() {
    let args = Cli::parse_from(["gardenctl", "resolve", "shoot"]);
    match args.command {
        Command::Resolve(r) => {
            assert_eq!(r.kind, ResolveKind::Shoot);
            assert_eq!(r.output, OutputFormat::Yaml);
        }
        _ => panic!("expected resolve command"),
    }
}

// ============================================================================
// provider-env and kubectl-env parsing tests
// ============================================================================

#[test]
fn test_parse_provider_env() {
    let args = Cli::parse_from(["gardenctl", "provider-env", "bash"]);
    match args.command {
        Command::ProviderEnv(p) => {
            assert_eq!(p.shell, Shell::Bash);
            assert!(!p.unset);
            assert!(p.output.is_none());
        }
        _ => panic!("expected provider-env command"),
    }
}

#[test]
fn test_parse_provider_env_alias_and_flags() {
    let args = Cli::parse_from([
        "gardenctl",
        "p-env",
        "-u",
        "-y",
        "-o",
        "json",
        "--gcp-allowed-uri-patterns",
        "token_uri=https://sts.example.com/token",
        "--openstack-allowed-uri-patterns",
        "authURL=https://keystone.example.com/v3",
        "fish",
    ]);
    match args.command {
        Command::ProviderEnv(p) => {
            assert_eq!(p.shell, Shell::Fish);
            assert!(p.unset);
            assert!(p.confirm_access_restriction);
            assert_eq!(p.output, Some(OutputFormat::Json));
            assert_eq!(p.gcp_allowed_uri_patterns, ["token_uri=https://sts.example.com/token"]);
            assert_eq!(p.openstack_allowed_uri_patterns, ["authURL=https://keystone.example.com/v3"]);
        }
        _ => panic!("expected provider-env command"),
    }
}

#[test]
fn test_parse_provider_env_hidden_force() {
    let args = Cli::parse_from(["gardenctl", "provider-env", "--force", "zsh"]);
    match args.command {
        Command::ProviderEnv(p) => assert!(p.force && !p.confirm_access_restriction),
        _ => panic!("expected provider-env command"),
    }
}

#[test]
fn test_provider_env_rejects_unknown_shell() {
    assert!(Cli::try_parse_from(["gardenctl", "provider-env", "cmd"]).is_err());
}

#[test]
fn test_parse_kubectl_env() {
    let args = Cli::parse_from(["gardenctl", "k-env", "--unset", "powershell"]);
    match args.command {
        Command::KubectlEnv(k) => {
            assert_eq!(k.shell, Shell::Powershell);
            assert!(k.unset);
        }
        _ => panic!("expected kubectl-env command"),
    }
}

// ============================================================================
// Config command parsing tests
// ============================================================================

#[test]
fn test_parse_config_set_garden() {
    let args = Cli::parse_from([
        "gardenctl",
        "config",
        "set-garden",
        "dev",
        "--kubeconfig",
        "~/dev.yaml",
        "--pattern",
        "^shoot--(?P<project>.+)--(?P<shoot>.+)$",
        "--pattern",
        "^(?P<shoot>.+)$",
    ]);
    match args.command {
        Command::Config(c) => match c.command {
            ConfigCommand::SetGarden(g) => {
                assert_eq!(g.name, "dev");
                assert_eq!(g.kubeconfig.as_deref(), Some("~/dev.yaml"));
                assert_eq!(g.patterns.unwrap().len(), 2);
                assert!(g.context.is_none());
            }
            _ => panic!("expected set-garden"),
        },
        _ => panic!("expected config command"),
    }
}

#[test]
fn test_parse_config_set_openstack_authurl() {
    let args = Cli::parse_from([
        "gardenctl",
        "config",
        "set-openstack-authurl",
        "--uri-pattern",
        "https://keystone.example.com:5000/v3",
    ]);
    match args.command {
        Command::Config(c) => match c.command {
            ConfigCommand::SetOpenstackAuthurl(a) => {
                assert_eq!(a.uri_patterns, ["https://keystone.example.com:5000/v3"]);
                assert!(!a.clear);
            }
            _ => panic!("expected set-openstack-authurl"),
        },
        _ => panic!("expected config command"),
    }
}

#[test]
fn test_set_openstack_authurl_requires_uri_or_clear() {
    assert!(Cli::try_parse_from(["gardenctl", "config", "set-openstack-authurl"]).is_err());
    assert!(Cli::try_parse_from([
        "gardenctl",
        "config",
        "set-openstack-authurl",
        "--clear",
        "--uri-pattern",
        "https://keystone.example.com/v3",
    ])
    .is_err());
    assert!(Cli::try_parse_from(["gardenctl", "config", "set-openstack-authurl", "--clear"]).is_ok());
}

// ============================================================================
// Global flag tests
// ============================================================================

#[test]
fn test_parse_verbose_count() {
    let args = Cli::parse_from(["gardenctl", "-vv", "version"]);
    assert_eq!(args.verbose, 2);
}

#[test]
fn test_parse_config_path() {
    let args = Cli::parse_from(["gardenctl", "--config", "/tmp/gardenctl.yaml", "target", "view"]);
    assert_eq!(args.config.unwrap().to_str(), Some("/tmp/gardenctl.yaml"));
}

#[test]
fn test_parse_session_id() {
    let args = Cli::parse_from(["gardenctl", "--session-id", "term-1", "target", "history"]);
    assert_eq!(args.session_id.as_deref(), Some("term-1"));
}

#[test]
fn test_parse_completions() {
    let args = Cli::parse_from(["gardenctl", "completions", "zsh"]);
    assert!(matches!(args.command, Command::Completions(_)));
}

#[test]
fn test_cli_definition_is_consistent() {
    use clap::CommandFactory;
    Cli::command().debug_assert();
}
