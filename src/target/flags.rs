//! Command-line target overrides

use super::Target;
use crate::error::{GctlError, Result};
use clap::Args;

/// `--garden/--project/--seed/--shoot/--control-plane`, folded into the
/// current target before resolution
#[derive(Args, Clone, Debug, Default, PartialEq, Eq)]
pub struct TargetFlags {
    /// Target the given garden cluster
    #[arg(long, global = true)]
    pub garden: Option<String>,

    /// Target the given project
    #[arg(long, global = true)]
    pub project: Option<String>,

    /// Target the given seed cluster
    #[arg(long, global = true)]
    pub seed: Option<String>,

    /// Target the given shoot cluster
    #[arg(long, global = true)]
    pub shoot: Option<String>,

    /// Target the control plane of the shoot
    #[arg(long, global = true)]
    pub control_plane: bool,
}

fn set(v: &Option<String>) -> Option<&str> {
    v.as_deref().filter(|s| !s.is_empty())
}

impl TargetFlags {
    pub fn new(garden: &str, project: &str, seed: &str, shoot: &str, control_plane: bool) -> Self {
        let opt = |s: &str| (!s.is_empty()).then(|| s.to_string());
        TargetFlags {
            garden: opt(garden),
            project: opt(project),
            seed: opt(seed),
            shoot: opt(shoot),
            control_plane,
        }
    }

    pub fn is_empty(&self) -> bool {
        set(&self.garden).is_none()
            && set(&self.project).is_none()
            && set(&self.seed).is_none()
            && set(&self.shoot).is_none()
            && !self.control_plane
    }

    pub fn to_target(&self) -> Target {
        Target::new(
            set(&self.garden).unwrap_or_default(),
            set(&self.project).unwrap_or_default(),
            set(&self.seed).unwrap_or_default(),
            set(&self.shoot).unwrap_or_default(),
        )
        .with_control_plane(self.control_plane)
    }

    /// Apply the flags on top of `current`; a higher level resets everything below it
    pub fn override_target(&self, current: &Target) -> Result<Target> {
        if self.is_empty() {
            return Ok(current.clone());
        }
        if set(&self.project).is_some() && set(&self.seed).is_some() {
            return Err(GctlError::InvalidArgument(
                "cannot specify --project and --seed at the same time".to_string(),
            ));
        }

        let mut target = current.clone();
        if let Some(garden) = set(&self.garden) {
            target = Target::new(garden, "", "", "");
        }
        if let Some(project) = set(&self.project) {
            target = target.with_project(project).with_seed("").with_shoot("").with_control_plane(false);
        }
        if let Some(seed) = set(&self.seed) {
            target = target.with_seed(seed).with_project("").with_shoot("").with_control_plane(false);
        }
        if let Some(shoot) = set(&self.shoot) {
            target = target.with_shoot(shoot).with_control_plane(false);
        }
        if self.control_plane {
            target = target.with_control_plane(true);
        }
        Ok(target)
    }
}
