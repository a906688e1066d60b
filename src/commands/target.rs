//! `target` command family

use crate::cli::{TargetArgs, TargetCommand};
use crate::commands::print_structured;
use crate::error::{GctlError, Result};
use crate::manager::{Confirmation, Manager};
use crate::target::{Target, TargetKind};
use std::io::IsTerminal;

/// Execute the target command
pub async fn run_target(manager: &Manager, args: &TargetArgs) -> Result<()> {
    let (kind, name) = match (&args.command, &args.value) {
        (Some(TargetCommand::Garden(n)), _) => (TargetKind::Garden, n.name.as_deref()),
        (Some(TargetCommand::Project(n)), _) => (TargetKind::Project, n.name.as_deref()),
        (Some(TargetCommand::Seed(n)), _) => (TargetKind::Seed, n.name.as_deref()),
        (Some(TargetCommand::Shoot(n)), _) => (TargetKind::Shoot, n.name.as_deref()),
        (Some(TargetCommand::ControlPlane), _) => (TargetKind::ControlPlane, None),
        (Some(TargetCommand::Value { value }), _) => (TargetKind::Pattern, Some(value.as_str())),
        (Some(TargetCommand::Unset { kind }), _) => {
            let kind = TargetKind::from(*kind);
            let dropped = manager.unset(kind).await?;
            println!("Successfully unset targeted {kind} {dropped:?}");
            return Ok(());
        }
        (Some(TargetCommand::View { output }), _) => {
            return print_structured(&manager.current_target()?, *output);
        }
        (Some(TargetCommand::History), _) => {
            for record in manager.history()? {
                println!("{record}");
            }
            return Ok(());
        }
        (None, Some(value)) => (TargetKind::Pattern, Some(value.as_str())),
        (None, None) => {
            return Err(GctlError::InvalidArgument(
                "a target kind or a value to match is required".to_string(),
            ));
        }
    };

    let confirmation = Confirmation {
        confirmed: args.confirm_access_restriction,
        interactive: std::io::stdin().is_terminal() && std::io::stderr().is_terminal(),
    };
    let resolution = manager.target(kind, name, confirmation).await?;

    let (level, name) = targeted_level(&resolution.target);
    println!("Successfully targeted {level} {name:?}");
    Ok(())
}

/// The most specific level of a target and the name at that level
pub fn targeted_level(target: &Target) -> (TargetKind, &str) {
    if target.control_plane {
        (TargetKind::ControlPlane, &target.shoot)
    } else if !target.shoot.is_empty() {
        (TargetKind::Shoot, &target.shoot)
    } else if !target.seed.is_empty() {
        (TargetKind::Seed, &target.seed)
    } else if !target.project.is_empty() {
        (TargetKind::Project, &target.project)
    } else {
        (TargetKind::Garden, &target.garden)
    }
}
