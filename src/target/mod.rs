//! The target: which garden, project, seed and shoot a session points at
//!
//! Targets are either garden -> project -> shoot or garden -> seed -> shoot.
//! A fully resolved shoot target carries both its project and its seed.

mod flags;

pub use flags::TargetFlags;

use crate::error::{GctlError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Immutable target value; `with_*` return modified copies
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub garden: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub project: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub seed: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub shoot: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub control_plane: bool,
}

/// Level of the target hierarchy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetKind {
    Garden,
    Project,
    Seed,
    Shoot,
    ControlPlane,
    /// A bare value, resolved through the configured patterns
    Pattern,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Garden => "garden",
            TargetKind::Project => "project",
            TargetKind::Seed => "seed",
            TargetKind::Shoot => "shoot",
            TargetKind::ControlPlane => "control plane",
            TargetKind::Pattern => "pattern",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Target {
    pub fn new(garden: &str, project: &str, seed: &str, shoot: &str) -> Self {
        Target {
            garden: garden.to_string(),
            project: project.to_string(),
            seed: seed.to_string(),
            shoot: shoot.to_string(),
            control_plane: false,
        }
    }

    pub fn with_garden(&self, name: &str) -> Self {
        Target {
            garden: name.to_string(),
            ..self.clone()
        }
    }

    pub fn with_project(&self, name: &str) -> Self {
        Target {
            project: name.to_string(),
            ..self.clone()
        }
    }

    pub fn with_seed(&self, name: &str) -> Self {
        Target {
            seed: name.to_string(),
            ..self.clone()
        }
    }

    pub fn with_shoot(&self, name: &str) -> Self {
        Target {
            shoot: name.to_string(),
            ..self.clone()
        }
    }

    pub fn with_control_plane(&self, control_plane: bool) -> Self {
        Target {
            control_plane,
            ..self.clone()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.garden.is_empty() && self.project.is_empty() && self.seed.is_empty() && self.shoot.is_empty()
    }

    /// Check the structural invariants of a target
    pub fn validate(&self) -> Result<()> {
        if self.garden.is_empty() && !self.is_empty() {
            return Err(GctlError::NoGardenTargeted);
        }
        if self.control_plane && self.shoot.is_empty() {
            return Err(GctlError::NoShootTargeted);
        }
        if !self.project.is_empty() && !self.seed.is_empty() && self.shoot.is_empty() {
            return Err(GctlError::InvalidArgument(
                "seed and project must not be configured at the same time".to_string(),
            ));
        }
        Ok(())
    }

    /// Server-side filter for shoot lookups. The project must already be
    /// resolved to its namespace; without one the seed restricts the query.
    pub fn as_list_option(&self, project_namespace: Option<&str>) -> ShootFilter {
        let mut filter = ShootFilter::default();
        if !self.shoot.is_empty() {
            filter.name = Some(self.shoot.clone());
        }
        match project_namespace.filter(|ns| !ns.is_empty()) {
            Some(ns) => filter.namespace = Some(ns.to_string()),
            None if !self.seed.is_empty() => filter.seed_name = Some(self.seed.clone()),
            None => {}
        }
        filter
    }

    /// Flag form of the target, as recorded in the history
    pub fn to_flags(&self) -> String {
        let mut parts = Vec::new();
        if !self.garden.is_empty() {
            parts.push(format!("--garden {}", self.garden));
        }
        if !self.project.is_empty() {
            parts.push(format!("--project {}", self.project));
        } else if !self.seed.is_empty() {
            parts.push(format!("--seed {}", self.seed));
        }
        if !self.shoot.is_empty() {
            parts.push(format!("--shoot {}", self.shoot));
        }
        if self.control_plane {
            parts.push("--control-plane".to_string());
        }
        parts.join(" ")
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut steps = Vec::new();
        if !self.garden.is_empty() {
            steps.push(format!("garden:{:?}", self.garden));
        }
        if !self.project.is_empty() {
            steps.push(format!("project:{:?}", self.project));
        }
        if !self.seed.is_empty() {
            steps.push(format!("seed:{:?}", self.seed));
        }
        if !self.shoot.is_empty() {
            steps.push(format!("shoot:{:?}", self.shoot));
        }
        if self.control_plane {
            steps.push("control plane targeted".to_string());
        }
        if steps.is_empty() {
            write!(f, "<empty>")
        } else {
            write!(f, "{}", steps.join(", "))
        }
    }
}

/// Shoot list restriction, rendered as a field selector
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShootFilter {
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub seed_name: Option<String>,
}

impl ShootFilter {
    pub fn field_selector(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(name) = &self.name {
            parts.push(format!("metadata.name={name}"));
        }
        if let Some(seed) = &self.seed_name {
            parts.push(format!("spec.seedName={seed}"));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(","))
        }
    }
}

impl fmt::Display for ShootFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ns) = &self.namespace {
            parts.push(format!("namespace={ns}"));
        }
        if let Some(sel) = self.field_selector() {
            parts.push(sel);
        }
        write!(f, "{}", parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_clears_only_named_fields() {
        let t = Target::new("g", "p", "", "s").with_control_plane(true);
        let cleared = t.with_shoot("").with_project("");
        assert_eq!(cleared.garden, "g");
        assert!(cleared.shoot.is_empty());
        assert!(cleared.project.is_empty());
        assert!(cleared.control_plane);
        // the original is untouched
        assert_eq!(t.shoot, "s");
    }

    #[test]
    fn test_validate() {
        assert!(Target::default().validate().is_ok());
        assert!(Target::new("", "p", "", "").validate().is_err());
        assert!(Target::new("g", "p", "seed", "").validate().is_err());
        assert!(Target::new("g", "p", "seed", "s").validate().is_ok());
        assert!(Target::new("g", "p", "", "").with_control_plane(true).validate().is_err());
    }

    #[test]
    fn test_list_option() {
        let t = Target::new("g", "p", "seed", "s");
        let f = t.as_list_option(Some("garden-p"));
        assert_eq!(f.namespace.as_deref(), Some("garden-p"));
        assert_eq!(f.seed_name, None);
        assert_eq!(f.field_selector().as_deref(), Some("metadata.name=s"));

        let t = Target::new("g", "", "seed", "s");
        let f = t.as_list_option(None);
        assert_eq!(f.field_selector().as_deref(), Some("metadata.name=s,spec.seedName=seed"));
    }

    #[test]
    fn test_yaml_skips_empty_fields() {
        let t = Target::new("g", "p", "", "s");
        let yaml = serde_yaml::to_string(&t).unwrap();
        assert_eq!(yaml, "garden: g\nproject: p\nshoot: s\n");
        let back: Target = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_to_flags() {
        assert_eq!(
            Target::new("g", "p", "seed", "s").to_flags(),
            "--garden g --project p --shoot s"
        );
        assert_eq!(Target::new("g", "", "seed", "").to_flags(), "--garden g --seed seed");
    }

    #[test]
    fn test_display() {
        assert_eq!(Target::default().to_string(), "<empty>");
        assert_eq!(Target::new("g", "", "", "").to_string(), "garden:\"g\"");
    }
}
