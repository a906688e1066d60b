//! Target manager: reads, changes and persists the session target

pub mod kubeconfig;

use crate::access::check_access_restrictions;
use crate::config::{Config, Garden};
use crate::error::{GctlError, Result};
use crate::garden::types::Shoot;
use crate::garden::{ClientProvider, GARDEN_NAMESPACE};
use crate::resolver::{Resolution, ResolveOptions, Resolver};
use crate::session::Session;
use crate::target::{Target, TargetFlags, TargetKind};
use crate::CLI_NAME;
use kube::config::Kubeconfig;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// How access restrictions may be confirmed for this invocation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Confirmation {
    /// `--confirm-access-restriction` was given
    pub confirmed: bool,
    /// stdin and stderr are a terminal, so the user can be asked
    pub interactive: bool,
}

pub struct Manager {
    config: Config,
    session: Session,
    provider: Arc<dyn ClientProvider>,
    flags: TargetFlags,
}

impl Manager {
    pub fn new(config: Config, session: Session, provider: Arc<dyn ClientProvider>, flags: TargetFlags) -> Self {
        Manager {
            config,
            session,
            provider,
            flags,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Overrides from the command line, folded into every resolution
    pub fn target_flags(&self) -> &TargetFlags {
        &self.flags
    }

    /// The persisted target of the session. An empty target starts at the
    /// garden whose kubeconfig `KUBECONFIG` points at, if any.
    pub fn current_target(&self) -> Result<Target> {
        let _lock = self.session.lock()?;
        self.read_current()
    }

    fn read_current(&self) -> Result<Target> {
        let target = self.session.read_target()?;
        if !target.is_empty() {
            return Ok(target);
        }
        match std::env::var_os("KUBECONFIG").and_then(|v| garden_hint(&self.config, &v)) {
            Some(garden) => {
                debug!("Using garden {:?} from KUBECONFIG", garden);
                Ok(target.with_garden(&garden))
            }
            None => Ok(target),
        }
    }

    /// The persisted target with the command line overrides applied
    pub fn effective_target(&self) -> Result<Target> {
        self.flags.override_target(&self.current_target()?)
    }

    fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.config, self.provider.as_ref())
    }

    /// Fully resolve the effective target
    pub async fn resolve_current(&self, options: ResolveOptions) -> Result<Resolution> {
        let current = self.current_target()?;
        let effective = self.flags.override_target(&current)?;
        if effective.garden.is_empty() {
            return Err(GctlError::NoGardenTargeted);
        }
        self.resolver().resolve(&effective, &current, options).await
    }

    /// Target `kind`, optionally naming the object. Without a name the
    /// object comes from the command line flags or the current target.
    pub async fn target(&self, kind: TargetKind, name: Option<&str>, confirmation: Confirmation) -> Result<Resolution> {
        let _lock = self.session.lock()?;
        let current = self.read_current()?;
        let base = self.flags.override_target(&current)?;

        let resolution = match kind {
            TargetKind::Pattern => {
                let value = name.filter(|v| !v.is_empty()).ok_or_else(|| {
                    GctlError::InvalidArgument("a value is required to match against the garden patterns".to_string())
                })?;
                self.resolver()
                    .resolve_value(value, &base, self.flags.control_plane, ResolveOptions::default())
                    .await?
            }
            _ => {
                let desired = desired_target(kind, name, &base, self.flags.control_plane)?;
                let options = ResolveOptions {
                    follow_managed_seed: desired.control_plane,
                };
                self.resolver().resolve(&desired, &base, options).await?
            }
        };

        if let Some(shoot) = &resolution.shoot {
            let newly_targeted =
                resolution.target.shoot != current.shoot || resolution.target.garden != current.garden;
            if newly_targeted {
                confirm_access(&resolution.garden, shoot, confirmation)?;
            }
        }

        self.session.write_target(&resolution.target)?;
        self.session
            .append_history(&format!("{CLI_NAME} target {}", resolution.target.to_flags()))?;
        info!("Targeted {}", resolution.target);

        if self.config.link_kubeconfig() {
            let kubeconfig = self.client_config(&resolution).await?;
            self.write_client_config(&kubeconfig)?;
        }
        Ok(resolution)
    }

    /// Drop one level of the current target, returning the name that was dropped
    pub async fn unset(&self, kind: TargetKind) -> Result<String> {
        let _lock = self.session.lock()?;
        let current = self.session.read_target()?;

        let (dropped, next) = match kind {
            TargetKind::Garden if !current.garden.is_empty() => (current.garden.clone(), Target::default()),
            TargetKind::Garden => return Err(GctlError::NoGardenTargeted),
            // a seed next to a project was only recorded for the shoot
            TargetKind::Project if !current.project.is_empty() => {
                (current.project.clone(), Target::default().with_garden(&current.garden))
            }
            TargetKind::Project => return Err(GctlError::NoProjectTargeted),
            TargetKind::Seed if !current.seed.is_empty() => (
                current.seed.clone(),
                current.with_seed("").with_shoot("").with_control_plane(false),
            ),
            TargetKind::Seed => return Err(GctlError::NoSeedTargeted),
            TargetKind::Shoot if !current.shoot.is_empty() => (
                current.shoot.clone(),
                current.with_shoot("").with_control_plane(false),
            ),
            TargetKind::Shoot => return Err(GctlError::NoShootTargeted),
            TargetKind::ControlPlane if current.control_plane => {
                (current.shoot.clone(), current.with_control_plane(false))
            }
            TargetKind::ControlPlane => return Err(GctlError::NoControlPlaneTargeted),
            TargetKind::Pattern => {
                return Err(GctlError::InvalidArgument("a pattern cannot be unset".to_string()));
            }
        };

        // project and seed only coexist on shoot targets
        let next = if next.shoot.is_empty() && !next.project.is_empty() {
            next.with_seed("")
        } else {
            next
        };

        self.session.write_target(&next)?;
        debug!("Unset {} {:?}", kind, dropped);

        if self.config.link_kubeconfig() {
            kubeconfig::remove_symlink(&self.session.kubeconfig_link())?;
            if !next.garden.is_empty() {
                let resolution = self.resolver().resolve(&next, &next, ResolveOptions::default()).await?;
                let config = self.client_config(&resolution).await?;
                self.write_client_config(&config)?;
            }
        }
        Ok(dropped)
    }

    /// Previously targeted targets, oldest first
    pub fn history(&self) -> Result<Vec<String>> {
        self.session.read_history()
    }

    /// Kubeconfig for the resolved target
    pub async fn client_config(&self, resolution: &Resolution) -> Result<Kubeconfig> {
        let target = &resolution.target;
        let client = resolution.client.as_ref();

        if target.control_plane {
            let shoot = resolution.require_shoot()?;
            let seed = shoot.seed_name().ok_or_else(|| {
                GctlError::InvalidArgument(format!("shoot {:?} has not yet been assigned to a seed", target.shoot))
            })?;
            let technical_id = shoot
                .status
                .as_ref()
                .and_then(|s| s.technical_id.as_deref())
                .filter(|id| !id.is_empty())
                .ok_or_else(|| {
                    GctlError::InvalidArgument(format!(
                        "no technicalID has been assigned to the shoot {:?} yet",
                        target.shoot
                    ))
                })?;
            let seed_config = match &resolution.hosting_shoot {
                Some(hosting) => client.get_shoot_client_config(GARDEN_NAMESPACE, hosting).await?,
                None => client.get_seed_client_config(seed).await?,
            };
            return kubeconfig::with_namespace(&seed_config, technical_id);
        }

        if let Some(shoot) = &resolution.shoot {
            let namespace = shoot.metadata.namespace.as_deref().unwrap_or_default();
            return client.get_shoot_client_config(namespace, &target.shoot).await;
        }

        if !target.seed.is_empty() {
            return client.get_seed_client_config(&target.seed).await;
        }

        let garden_config = client.garden_client_config()?;
        match resolution.namespace.as_deref() {
            Some(namespace) if !target.project.is_empty() => kubeconfig::with_namespace(&garden_config, namespace),
            _ => Ok(garden_config),
        }
    }

    /// Write the kubeconfig into the session directory and refresh the
    /// stable symlink when linking is enabled
    pub fn write_client_config(&self, config: &Kubeconfig) -> Result<PathBuf> {
        let path = kubeconfig::write(self.session.dir(), config)?;
        if self.config.link_kubeconfig() {
            kubeconfig::update_symlink(&self.session.kubeconfig_link(), &path)?;
        }
        Ok(path)
    }
}

/// Garden configured with the first kubeconfig of a `KUBECONFIG` list
fn garden_hint(config: &Config, kubeconfig_env: &std::ffi::OsStr) -> Option<String> {
    let first = std::env::split_paths(kubeconfig_env).next()?;
    config.garden_for_kubeconfig(&first).map(|g| g.name.clone())
}

fn required(name: Option<&str>, fallback: &str, missing: GctlError) -> Result<String> {
    let value = name.filter(|n| !n.is_empty()).unwrap_or(fallback);
    if value.is_empty() {
        return Err(missing);
    }
    Ok(value.to_string())
}

/// The target asked for by `target <kind> [name]`, relative to `base`
fn desired_target(kind: TargetKind, name: Option<&str>, base: &Target, control_plane: bool) -> Result<Target> {
    let garden = base.garden.as_str();
    let target = match kind {
        TargetKind::Garden => Target::default().with_garden(&required(name, garden, GctlError::NoGardenTargeted)?),
        TargetKind::Project => {
            let project = required(name, &base.project, GctlError::NoProjectTargeted)?;
            Target::new(garden, &project, "", "")
        }
        TargetKind::Seed => {
            let seed = required(name, &base.seed, GctlError::NoSeedTargeted)?;
            Target::new(garden, "", &seed, "")
        }
        TargetKind::Shoot | TargetKind::ControlPlane => {
            let shoot = required(name, &base.shoot, GctlError::NoShootTargeted)?;
            // the project namespace constrains the lookup; the old seed would only get in the way
            let seed = if base.project.is_empty() { base.seed.as_str() } else { "" };
            Target::new(garden, &base.project, seed, &shoot)
                .with_control_plane(kind == TargetKind::ControlPlane || control_plane)
        }
        TargetKind::Pattern => {
            return Err(GctlError::InvalidArgument("pattern targets are resolved from a value".to_string()));
        }
    };
    Ok(target)
}

fn confirm_access(garden: &Garden, shoot: &Shoot, confirmation: Confirmation) -> Result<()> {
    let messages = check_access_restrictions(&garden.access_restrictions, shoot);
    if messages.is_empty() {
        return Ok(());
    }

    let mut stderr = std::io::stderr();
    if confirmation.confirmed {
        write!(stderr, "{}", messages.render())?;
        return Ok(());
    }
    if confirmation.interactive {
        let stdin = std::io::stdin();
        if messages.handle(&mut stdin.lock(), &mut stderr, true)? {
            return Ok(());
        }
    }
    Err(GctlError::ConfirmationRequired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessRestriction;
    use crate::garden::MockGardenClient;
    use crate::resolver::tests::{config, project, provider, shoot};
    use serde_json::json;
    use tempfile::TempDir;

    fn manager(client: MockGardenClient, config: Config, flags: TargetFlags) -> (Manager, TempDir) {
        let root = TempDir::new().unwrap();
        let session = Session::open(root.path(), "test").unwrap();
        let provider: Arc<dyn ClientProvider> = Arc::new(provider(client));
        (Manager::new(config, session, provider, flags), root)
    }

    fn shoot_client() -> MockGardenClient {
        let mut client = MockGardenClient::new();
        client
            .expect_get_project()
            .returning(|name| Ok(project(name, "garden-prod")));
        client
            .expect_find_shoot()
            .returning(|_| Ok(shoot("garden-prod", "my-shoot", "seed-a")));
        client
    }

    #[test]
    fn test_garden_hint_from_kubeconfig_env() {
        let cfg = config();
        assert_eq!(
            garden_hint(&cfg, std::ffi::OsStr::new("/tmp/g1.yaml:/tmp/other.yaml")).as_deref(),
            Some("g1")
        );
        assert!(garden_hint(&cfg, std::ffi::OsStr::new("/tmp/other.yaml:/tmp/g1.yaml")).is_none());
        assert!(garden_hint(&cfg, std::ffi::OsStr::new("")).is_none());
    }

    #[tokio::test]
    async fn test_target_shoot_with_flags() {
        let flags = TargetFlags::new("g1", "prod", "", "", false);
        let (m, _root) = manager(shoot_client(), config(), flags);

        let res = m
            .target(TargetKind::Shoot, Some("my-shoot"), Confirmation::default())
            .await
            .unwrap();
        let expected = Target::new("g1", "prod", "seed-a", "my-shoot");
        assert_eq!(res.target, expected);
        assert_eq!(m.session().read_target().unwrap(), expected);
        assert_eq!(
            m.history().unwrap(),
            vec!["gardenctl target --garden g1 --project prod --shoot my-shoot"]
        );
    }

    #[tokio::test]
    async fn test_history_grows_by_one_per_target() {
        let (m, _root) = manager(shoot_client(), config(), TargetFlags::default());
        m.session().write_target(&Target::new("g1", "prod", "", "")).unwrap();

        m.target(TargetKind::Shoot, Some("my-shoot"), Confirmation::default())
            .await
            .unwrap();
        m.target(TargetKind::Project, Some("prod"), Confirmation::default())
            .await
            .unwrap();
        let history = m.history().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1], "gardenctl target --garden g1 --project prod");
    }

    #[tokio::test]
    async fn test_unconfirmed_access_restriction() {
        let mut cfg = config();
        cfg.gardens[0].access_restrictions = vec![serde_json::from_value::<AccessRestriction>(json!({
            "key": "eu-access",
            "value": "true",
            "msg": "restricted"
        }))
        .unwrap()];

        let mut client = MockGardenClient::new();
        client
            .expect_get_project()
            .returning(|name| Ok(project(name, "garden-prod")));
        client.expect_find_shoot().returning(|_| {
            let mut s = shoot("garden-prod", "my-shoot", "seed-a");
            s.metadata.annotations = Some([("eu-access".to_string(), "true".to_string())].into());
            Ok(s)
        });

        let (m, _root) = manager(client, cfg, TargetFlags::new("g1", "prod", "", "", false));
        let err = m
            .target(TargetKind::Shoot, Some("my-shoot"), Confirmation::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, GctlError::ConfirmationRequired));
        assert_eq!(err.exit_code(), 2);
        // nothing persisted
        assert!(m.session().read_target().unwrap().is_empty());
        assert!(m.history().unwrap().is_empty());

        let confirmed = Confirmation {
            confirmed: true,
            interactive: false,
        };
        assert!(m.target(TargetKind::Shoot, Some("my-shoot"), confirmed).await.is_ok());
    }

    #[tokio::test]
    async fn test_unset_levels() {
        let (m, _root) = manager(MockGardenClient::new(), config(), TargetFlags::default());
        m.session()
            .write_target(&Target::new("g1", "prod", "seed-a", "my-shoot").with_control_plane(true))
            .unwrap();

        assert_eq!(m.unset(TargetKind::ControlPlane).await.unwrap(), "my-shoot");
        assert_eq!(m.unset(TargetKind::Shoot).await.unwrap(), "my-shoot");
        assert_eq!(m.current_target().unwrap(), Target::new("g1", "prod", "", ""));
        assert!(matches!(
            m.unset(TargetKind::Seed).await.err().unwrap(),
            GctlError::NoSeedTargeted
        ));
        assert_eq!(m.unset(TargetKind::Garden).await.unwrap(), "g1");
        assert!(m.current_target().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_control_plane_requires_shoot() {
        let (m, _root) = manager(MockGardenClient::new(), config(), TargetFlags::new("g1", "", "", "", false));
        let err = m
            .target(TargetKind::ControlPlane, None, Confirmation::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, GctlError::NoShootTargeted));
    }

    #[tokio::test]
    async fn test_project_client_config_uses_namespace() {
        let mut client = MockGardenClient::new();
        client
            .expect_get_project()
            .returning(|name| Ok(project(name, "garden-prod")));
        client.expect_garden_client_config().returning(|| {
            Ok(serde_json::from_value(json!({
                "apiVersion": "v1",
                "kind": "Config",
                "current-context": "garden",
                "clusters": [{"name": "garden", "cluster": {"server": "https://api.example.com"}}],
                "contexts": [{"name": "garden", "context": {"cluster": "garden", "user": "me"}}],
                "users": [{"name": "me", "user": {}}]
            }))
            .unwrap())
        });

        let (m, _root) = manager(client, config(), TargetFlags::new("g1", "prod", "", "", false));
        let res = m.resolve_current(ResolveOptions::default()).await.unwrap();
        let kc = m.client_config(&res).await.unwrap();
        let ctx = kc.contexts[0].context.as_ref().unwrap();
        assert_eq!(ctx.namespace.as_deref(), Some("garden-prod"));

        let path = m.write_client_config(&kc).unwrap();
        assert!(path.starts_with(m.session().dir()));
        // linking is off by default
        assert!(std::fs::symlink_metadata(m.session().kubeconfig_link()).is_err());
    }

    #[test]
    fn test_desired_target_drops_seed_when_project_set() {
        let base = Target::new("g1", "prod", "seed-a", "old");
        let t = desired_target(TargetKind::Shoot, Some("new"), &base, false).unwrap();
        assert_eq!(t, Target::new("g1", "prod", "", "new"));

        let base = Target::new("g1", "", "seed-a", "");
        let t = desired_target(TargetKind::ControlPlane, Some("s"), &base, false).unwrap();
        assert_eq!(t, Target::new("g1", "", "seed-a", "s").with_control_plane(true));
    }
}
