//! Turn a partial target into a fully qualified one
//!
//! Resolution runs a fixed sequence of steps against the garden API:
//!
//! 1. inherit the garden from the current target
//! 2. expand pattern input (`target <value>` or a shoot value that is not a plain name)
//! 3. project -> namespace
//! 4. seed -> shoot of the managed seed (projection and control plane only)
//! 5. shoot lookup, filling in project, namespace and seed
//! 6. control plane -> hosting seed -> shoot of that managed seed
//!
//! No step writes anything; all I/O goes through [`GardenClient`].

use crate::config::{Config, Garden, PatternMatch};
use crate::error::{GctlError, Result};
use crate::garden::types::Shoot;
use crate::garden::{ClientProvider, GardenClient, GARDEN_NAMESPACE};
use crate::target::Target;
use std::sync::Arc;
use tracing::debug;

/// Name of the project owning the `garden` namespace
const GARDEN_PROJECT: &str = "garden";

const DNS1123_LABEL_MAX_LEN: usize = 63;

/// Whether the value is a plain object name (a DNS-1123 label) rather than pattern input
pub fn is_plain_name(value: &str) -> bool {
    let alnum = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    !value.is_empty()
        && value.len() <= DNS1123_LABEL_MAX_LEN
        && value.starts_with(alnum)
        && value.ends_with(alnum)
        && value.chars().all(|c| alnum(c) || c == '-')
}

/// How far resolution follows references
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Replace a seed-only target by the shoot backing its managed seed
    pub follow_managed_seed: bool,
}

impl ResolveOptions {
    pub fn projection() -> Self {
        ResolveOptions {
            follow_managed_seed: true,
        }
    }
}

/// The outcome of a resolution
pub struct Resolution {
    /// The fully qualified target
    pub target: Target,
    /// The configuration entry of the targeted garden
    pub garden: Garden,
    /// Namespace of the targeted project
    pub namespace: Option<String>,
    /// The targeted shoot, when one was resolved
    pub shoot: Option<Shoot>,
    /// For control plane targets: the shoot backing the hosting managed seed
    pub hosting_shoot: Option<String>,
    /// Client of the targeted garden
    pub client: Arc<dyn GardenClient>,
}

impl Resolution {
    /// The targeted shoot or [`GctlError::NoShootTargeted`]
    pub fn require_shoot(&self) -> Result<&Shoot> {
        self.shoot.as_ref().ok_or(GctlError::NoShootTargeted)
    }
}

/// Stateless resolver over the configuration and a client provider
pub struct Resolver<'a> {
    config: &'a Config,
    provider: &'a dyn ClientProvider,
}

/// Intermediate state threaded through the resolution steps
struct Pending {
    target: Target,
    namespace: Option<String>,
}

impl<'a> Resolver<'a> {
    pub fn new(config: &'a Config, provider: &'a dyn ClientProvider) -> Self {
        Resolver { config, provider }
    }

    /// Resolve `desired`, inheriting the garden from `current`
    pub async fn resolve(&self, desired: &Target, current: &Target, options: ResolveOptions) -> Result<Resolution> {
        let mut pending = Pending {
            target: desired.clone(),
            namespace: None,
        };

        if pending.target.garden.is_empty() {
            pending.target.garden = current.garden.clone();
        }
        if pending.target.garden.is_empty() {
            return Err(GctlError::NoGardenTargeted);
        }

        if !pending.target.shoot.is_empty() && !is_plain_name(&pending.target.shoot) {
            let value = pending.target.shoot.clone();
            let matched = self.config.match_pattern(Some(&pending.target.garden), &value)?;
            debug!("Value {:?} matched pattern of garden {}", value, matched.garden);
            apply_match(&mut pending, matched)?;
        }

        self.finish(pending, options).await
    }

    /// Resolve a bare value through the garden patterns. The current garden is
    /// preferred when its patterns match.
    pub async fn resolve_value(
        &self,
        value: &str,
        current: &Target,
        control_plane: bool,
        options: ResolveOptions,
    ) -> Result<Resolution> {
        let matched = self.config.match_pattern(Some(&current.garden), value)?;
        debug!("Value {:?} matched pattern of garden {}", value, matched.garden);

        let mut pending = Pending {
            target: Target::default().with_control_plane(control_plane),
            namespace: None,
        };
        apply_match(&mut pending, matched)?;
        self.finish(pending, options).await
    }

    async fn finish(&self, mut pending: Pending, options: ResolveOptions) -> Result<Resolution> {
        let garden = self.config.garden(&pending.target.garden)?.clone();
        pending.target.garden = garden.name.clone();
        let client = self.provider.garden_client(&garden).await?;

        // a namespace captured by a pattern names the project
        if let Some(namespace) = pending.namespace.clone() {
            if pending.target.project.is_empty() {
                let project = client.get_project_by_namespace(&namespace).await?;
                pending.target.project = project.metadata.name.unwrap_or_default();
            }
        }

        if !pending.target.project.is_empty() {
            pending.namespace = Some(project_namespace(client.as_ref(), &pending.target.project).await?);
        }

        if options.follow_managed_seed && !pending.target.seed.is_empty() && pending.target.shoot.is_empty() {
            match client.get_shoot_of_managed_seed(&pending.target.seed).await {
                Ok(shoot) => {
                    debug!("Seed {} is a managed seed backed by shoot {}", pending.target.seed, shoot);
                    pending.target.project = GARDEN_PROJECT.to_string();
                    pending.target.seed.clear();
                    pending.target.shoot = shoot;
                    pending.namespace = Some(GARDEN_NAMESPACE.to_string());
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        } else if !pending.target.seed.is_empty() && pending.target.shoot.is_empty() {
            let seed = client.get_seed(&pending.target.seed).await?;
            pending.target.seed = seed.metadata.name.unwrap_or_default();
        }

        let mut shoot = None;
        if !pending.target.shoot.is_empty() {
            let filter = pending.target.as_list_option(pending.namespace.as_deref());
            let found = client.find_shoot(&filter).await?;
            let namespace = found.metadata.namespace.clone().unwrap_or_default();

            if pending.target.project.is_empty() {
                let project = client.get_project_by_namespace(&namespace).await?;
                pending.target.project = project.metadata.name.unwrap_or_default();
            }
            pending.target.shoot = found.metadata.name.clone().unwrap_or_default();
            pending.target.seed = found.seed_name().unwrap_or_default().to_string();
            pending.namespace = Some(namespace);
            shoot = Some(found);
        }

        let mut hosting_shoot = None;
        if pending.target.control_plane {
            let Some(found) = shoot.as_ref() else {
                return Err(GctlError::NoShootTargeted);
            };
            let seed = found.seed_name().ok_or_else(|| {
                GctlError::InvalidArgument(format!(
                    "shoot {:?} has not yet been assigned to a seed",
                    pending.target.shoot
                ))
            })?;
            match client.get_shoot_of_managed_seed(seed).await {
                Ok(name) => hosting_shoot = Some(name),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }

        pending.target.validate()?;
        debug!("Resolved target {}", pending.target);

        Ok(Resolution {
            target: pending.target,
            garden,
            namespace: pending.namespace,
            shoot,
            hosting_shoot,
            client,
        })
    }
}

fn apply_match(pending: &mut Pending, matched: PatternMatch) -> Result<()> {
    if let (Some(project), Some(namespace)) = (&matched.project, &matched.namespace) {
        return Err(GctlError::InvalidArgument(format!(
            "project {project:?} and namespace {namespace:?} set in target match value. It is forbidden to have both values set"
        )));
    }

    let target = &mut pending.target;
    target.garden = matched.garden;
    target.project = matched.project.unwrap_or_default();
    target.seed.clear();
    target.shoot = matched.shoot.unwrap_or_default();
    pending.namespace = matched.namespace;
    Ok(())
}

/// Namespace of a project; a project without one is still being created
pub async fn project_namespace(client: &dyn GardenClient, name: &str) -> Result<String> {
    let project = client.get_project(name).await?;
    project
        .spec
        .namespace
        .filter(|ns| !ns.is_empty())
        .ok_or_else(|| {
            GctlError::InvalidArgument(format!("project {name:?} has not yet been assigned to a namespace"))
        })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::garden::types::{Project, Seed};
    use crate::garden::{MockClientProvider, MockGardenClient};
    use serde_json::json;

    pub(crate) fn project(name: &str, namespace: &str) -> Project {
        serde_json::from_value(json!({
            "metadata": {"name": name, "uid": "0f8fad5b-d9cb-469f-a165-70867728950e"},
            "spec": {"namespace": namespace}
        }))
        .unwrap()
    }

    pub(crate) fn shoot(namespace: &str, name: &str, seed: &str) -> Shoot {
        serde_json::from_value(json!({
            "metadata": {"name": name, "namespace": namespace, "uid": "7c9e6679-7425-40de-944b-e07fc1f90ae7"},
            "spec": {"seedName": seed, "region": "eu-west-1", "provider": {"type": "aws"}}
        }))
        .unwrap()
    }

    pub(crate) fn config() -> Config {
        Config {
            gardens: vec![
                Garden {
                    name: "g1".into(),
                    kubeconfig: "/tmp/g1.yaml".into(),
                    patterns: vec!["^shoot--(?P<project>.+)--(?P<shoot>.+)$".into()],
                    ..Default::default()
                },
                Garden {
                    name: "g2".into(),
                    alias: Some("second".into()),
                    kubeconfig: "/tmp/g2.yaml".into(),
                    patterns: vec!["^https://dashboard\\.g2/namespace/(?P<namespace>[^/]+)/shoots/(?P<shoot>[^/]+)$".into()],
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    pub(crate) fn provider(client: MockGardenClient) -> MockClientProvider {
        let client: Arc<dyn GardenClient> = Arc::new(client);
        let mut provider = MockClientProvider::new();
        provider
            .expect_garden_client()
            .returning(move |_| Ok(client.clone()));
        provider
    }

    #[tokio::test]
    async fn test_no_garden() {
        let cfg = config();
        let provider = provider(MockGardenClient::new());
        let resolver = Resolver::new(&cfg, &provider);
        let err = resolver
            .resolve(&Target::default().with_shoot("s"), &Target::default(), ResolveOptions::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, GctlError::NoGardenTargeted));
    }

    #[tokio::test]
    async fn test_shoot_in_project() {
        let mut client = MockGardenClient::new();
        client
            .expect_get_project()
            .returning(|name| Ok(project(name, "garden-prod")));
        client
            .expect_find_shoot()
            .withf(|f| f.namespace.as_deref() == Some("garden-prod") && f.name.as_deref() == Some("my-shoot"))
            .returning(|_| Ok(shoot("garden-prod", "my-shoot", "seed-a")));

        let cfg = config();
        let provider = provider(client);
        let resolver = Resolver::new(&cfg, &provider);
        let desired = Target::new("g1", "prod", "", "my-shoot");
        let res = resolver
            .resolve(&desired, &Target::default(), ResolveOptions::default())
            .await
            .unwrap();

        assert_eq!(res.target, Target::new("g1", "prod", "seed-a", "my-shoot"));
        assert_eq!(res.namespace.as_deref(), Some("garden-prod"));
        assert!(res.shoot.is_some());
    }

    #[tokio::test]
    async fn test_shoot_without_project_looks_up_project() {
        let mut client = MockGardenClient::new();
        client
            .expect_find_shoot()
            .withf(|f| f.namespace.is_none() && f.seed_name.as_deref() == Some("seed-a"))
            .returning(|_| Ok(shoot("garden-prod", "my-shoot", "seed-a")));
        client
            .expect_get_project_by_namespace()
            .returning(|ns| Ok(project("prod", ns)));

        let cfg = config();
        let provider = provider(client);
        let resolver = Resolver::new(&cfg, &provider);
        let res = resolver
            .resolve(
                &Target::new("", "", "seed-a", "my-shoot"),
                &Target::new("g1", "", "", ""),
                ResolveOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(res.target, Target::new("g1", "prod", "seed-a", "my-shoot"));
    }

    #[tokio::test]
    async fn test_ambiguous_shoot_is_surfaced() {
        let mut client = MockGardenClient::new();
        client
            .expect_find_shoot()
            .returning(|_| Err(GctlError::Ambiguous("multiple shoots found".into())));

        let cfg = config();
        let provider = provider(client);
        let resolver = Resolver::new(&cfg, &provider);
        let err = resolver
            .resolve(&Target::new("g1", "", "", "s"), &Target::default(), ResolveOptions::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, GctlError::Ambiguous(_)));
    }

    #[tokio::test]
    async fn test_project_without_namespace() {
        let mut client = MockGardenClient::new();
        client.expect_get_project().returning(|name| {
            let mut p = project(name, "");
            p.spec.namespace = None;
            Ok(p)
        });

        let cfg = config();
        let provider = provider(client);
        let resolver = Resolver::new(&cfg, &provider);
        let result = resolver
            .resolve(&Target::new("g1", "new", "", ""), &Target::default(), ResolveOptions::default())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_value_with_namespace_capture() {
        let mut client = MockGardenClient::new();
        client
            .expect_get_project_by_namespace()
            .returning(|ns| Ok(project("dev", ns)));
        client
            .expect_get_project()
            .returning(|name| Ok(project(name, "garden-dev")));
        client
            .expect_find_shoot()
            .returning(|_| Ok(shoot("garden-dev", "web", "seed-b")));

        let cfg = config();
        let provider = provider(client);
        let resolver = Resolver::new(&cfg, &provider);
        let res = resolver
            .resolve_value(
                "https://dashboard.g2/namespace/garden-dev/shoots/web",
                &Target::default(),
                false,
                ResolveOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(res.target, Target::new("g2", "dev", "seed-b", "web"));
    }

    #[tokio::test]
    async fn test_seed_validated_without_following() {
        let mut client = MockGardenClient::new();
        client.expect_get_seed().returning(|name| {
            let mut seed = Seed::default();
            seed.metadata.name = Some(name.to_string());
            Ok(seed)
        });
        client.expect_get_shoot_of_managed_seed().never();

        let cfg = config();
        let provider = provider(client);
        let resolver = Resolver::new(&cfg, &provider);
        let res = resolver
            .resolve(&Target::new("g1", "", "aws-1", ""), &Target::default(), ResolveOptions::default())
            .await
            .unwrap();
        assert_eq!(res.target, Target::new("g1", "", "aws-1", ""));
        assert!(res.shoot.is_none());
    }

    #[tokio::test]
    async fn test_managed_seed_is_followed_for_projection() {
        let mut client = MockGardenClient::new();
        client
            .expect_get_shoot_of_managed_seed()
            .returning(|_| Ok("soil".to_string()));
        client
            .expect_find_shoot()
            .withf(|f| f.namespace.as_deref() == Some("garden"))
            .returning(|_| Ok(shoot("garden", "soil", "root")));

        let cfg = config();
        let provider = provider(client);
        let resolver = Resolver::new(&cfg, &provider);
        let res = resolver
            .resolve(&Target::new("g1", "", "aws-1", ""), &Target::default(), ResolveOptions::projection())
            .await
            .unwrap();
        assert_eq!(res.target, Target::new("g1", "garden", "root", "soil"));
    }

    #[tokio::test]
    async fn test_unmanaged_seed_stays_seed_target() {
        let mut client = MockGardenClient::new();
        client
            .expect_get_shoot_of_managed_seed()
            .returning(|name| Err(GctlError::not_found("managedseed", name)));

        let cfg = config();
        let provider = provider(client);
        let resolver = Resolver::new(&cfg, &provider);
        let res = resolver
            .resolve(&Target::new("g1", "", "aws-1", ""), &Target::default(), ResolveOptions::projection())
            .await
            .unwrap();
        assert_eq!(res.target, Target::new("g1", "", "aws-1", ""));
    }

    #[tokio::test]
    async fn test_control_plane_hosting_shoot() {
        let mut client = MockGardenClient::new();
        client
            .expect_get_project()
            .returning(|name| Ok(project(name, "garden-prod")));
        client
            .expect_find_shoot()
            .returning(|_| Ok(shoot("garden-prod", "my-shoot", "seed-a")));
        client
            .expect_get_shoot_of_managed_seed()
            .withf(|seed| seed == "seed-a")
            .returning(|_| Ok("seed-a-shoot".to_string()));

        let cfg = config();
        let provider = provider(client);
        let resolver = Resolver::new(&cfg, &provider);
        let desired = Target::new("g1", "prod", "", "my-shoot").with_control_plane(true);
        let res = resolver
            .resolve(&desired, &Target::default(), ResolveOptions::default())
            .await
            .unwrap();
        assert!(res.target.control_plane);
        assert_eq!(res.hosting_shoot.as_deref(), Some("seed-a-shoot"));
    }

    #[tokio::test]
    async fn test_alias_resolves_to_garden_name() {
        let cfg = config();
        let provider = provider(MockGardenClient::new());
        let resolver = Resolver::new(&cfg, &provider);
        let res = resolver
            .resolve(&Target::default().with_garden("second"), &Target::default(), ResolveOptions::default())
            .await
            .unwrap();
        assert_eq!(res.target.garden, "g2");
    }

    #[test]
    fn test_is_plain_name() {
        assert!(is_plain_name("my-shoot"));
        assert!(is_plain_name("shoot--p--s"));
        assert!(!is_plain_name("g2/shoot--p--s"));
        assert!(!is_plain_name("https://dashboard.example.com/namespace/garden-p/shoots/s"));
        assert!(!is_plain_name(&"a".repeat(64)));
    }
}
