//! `resolve` command: print the target with everything the garden knows about it

use crate::access::check_access_restrictions;
use crate::cli::{ResolveArgs, ResolveKind};
use crate::commands::print_structured;
use crate::error::{GctlError, Result};
use crate::manager::Manager;
use crate::resolver::{Resolution, ResolveOptions};
use serde::Serialize;

#[derive(Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTarget {
    pub garden: ResolvedGarden,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<ResolvedProject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<ResolvedSeed>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shoot: Option<ResolvedShoot>,
}

#[derive(Debug, Default, PartialEq, Serialize)]
pub struct ResolvedGarden {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

#[derive(Debug, Default, PartialEq, Serialize)]
pub struct ResolvedProject {
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Default, PartialEq, Serialize)]
pub struct ResolvedSeed {
    pub name: String,
}

#[derive(Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedShoot {
    pub name: String,
    pub namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_restriction: Option<String>,
}

/// Reduce a resolution to the levels up to `kind`; the requested level must be set
pub fn resolved_target(resolution: &Resolution, kind: ResolveKind) -> Result<ResolvedTarget> {
    let target = &resolution.target;
    let mut out = ResolvedTarget {
        garden: ResolvedGarden {
            name: resolution.garden.name.clone(),
            alias: resolution.garden.alias.clone(),
        },
        ..Default::default()
    };
    let project = || ResolvedProject {
        name: target.project.clone(),
        namespace: resolution.namespace.clone().unwrap_or_default(),
    };

    match kind {
        ResolveKind::Garden => {}
        ResolveKind::Project => {
            if target.project.is_empty() {
                return Err(GctlError::NoProjectTargeted);
            }
            out.project = Some(project());
        }
        ResolveKind::Seed => {
            if target.seed.is_empty() {
                return Err(GctlError::NoSeedTargeted);
            }
            out.seed = Some(ResolvedSeed {
                name: target.seed.clone(),
            });
        }
        ResolveKind::Shoot => {
            let shoot = resolution.require_shoot()?;
            let messages = check_access_restrictions(&resolution.garden.access_restrictions, shoot);
            if !target.project.is_empty() {
                out.project = Some(project());
            }
            if !target.seed.is_empty() {
                out.seed = Some(ResolvedSeed {
                    name: target.seed.clone(),
                });
            }
            out.shoot = Some(ResolvedShoot {
                name: target.shoot.clone(),
                namespace: shoot.metadata.namespace.clone().unwrap_or_default(),
                access_restriction: (!messages.is_empty()).then(|| messages.to_plain_text()),
            });
        }
    }
    Ok(out)
}

/// Execute the resolve command
pub async fn run_resolve(manager: &Manager, args: &ResolveArgs) -> Result<()> {
    let resolution = manager.resolve_current(ResolveOptions::default()).await?;
    print_structured(&resolved_target(&resolution, args.kind)?, args.output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessRestriction;
    use crate::garden::GardenClient;
    use crate::garden::MockGardenClient;
    use crate::resolver::tests::{config, shoot};
    use crate::target::Target;
    use std::sync::Arc;

    fn resolution(target: Target) -> Resolution {
        let mut garden = config().gardens[0].clone();
        garden.access_restrictions = vec![AccessRestriction {
            key: "eu-access".into(),
            notify_if: Some(true),
            msg: "do not leave the EU".into(),
            ..Default::default()
        }];
        let mut s = shoot("garden-prod", &target.shoot, &target.seed);
        s.metadata.annotations = Some([("eu-access".to_string(), "true".to_string())].into());
        let client: Arc<dyn GardenClient> = Arc::new(MockGardenClient::new());
        Resolution {
            shoot: (!target.shoot.is_empty()).then_some(s),
            target,
            garden,
            namespace: Some("garden-prod".into()),
            hosting_shoot: None,
            client,
        }
    }

    #[test]
    fn test_resolve_shoot() {
        let r = resolution(Target::new("g1", "prod", "seed-a", "my-shoot"));
        let out = resolved_target(&r, ResolveKind::Shoot).unwrap();
        assert_eq!(out.garden.name, "g1");
        assert_eq!(out.project.unwrap().namespace, "garden-prod");
        assert_eq!(out.seed.unwrap().name, "seed-a");
        let shoot = out.shoot.unwrap();
        assert_eq!(shoot.namespace, "garden-prod");
        assert_eq!(shoot.access_restriction.as_deref(), Some("do not leave the EU"));
    }

    #[test]
    fn test_resolve_garden_only() {
        let r = resolution(Target::new("g1", "prod", "seed-a", "my-shoot"));
        let out = resolved_target(&r, ResolveKind::Garden).unwrap();
        assert!(out.project.is_none() && out.shoot.is_none());
    }

    #[test]
    fn test_missing_level() {
        let r = resolution(Target::new("g1", "", "", ""));
        assert!(matches!(
            resolved_target(&r, ResolveKind::Project),
            Err(GctlError::NoProjectTargeted)
        ));
        assert!(matches!(
            resolved_target(&r, ResolveKind::Shoot),
            Err(GctlError::NoShootTargeted)
        ));
    }
}
