//! gardenctl configuration stored in ~/.garden/gardenctl-v2.yaml

use crate::access::AccessRestriction;
use crate::allowpattern::{Pattern, ValidationContext};
use crate::credvalidate::{gcp_validation_context, openstack_validation_context, stackit_validation_context};
use crate::error::{GctlError, Result};
use crate::fsutil;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Overrides the configuration directory
pub const ENV_HOME: &str = "GCTL_HOME";
/// Overrides the configuration file stem
pub const ENV_CONFIG_NAME: &str = "GCTL_CONFIG_NAME";
/// Overrides `linkKubeconfig`
pub const ENV_LINK_KUBECONFIG: &str = "GCTL_LINK_KUBECONFIG";

const DEFAULT_HOME_DIR: &str = ".garden";
const DEFAULT_CONFIG_NAME: &str = "gardenctl-v2";
const CONFIG_EXTENSION: &str = "yaml";

/// Capture group names a garden pattern may use
const PATTERN_KEYS: &[&str] = &["project", "namespace", "shoot"];

/// Root of the configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Where the config was loaded from and is saved to
    #[serde(skip)]
    pub filename: PathBuf,

    /// Keep a stable `kubeconfig.yaml` symlink in the session directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_kubeconfig: Option<bool>,

    #[serde(default)]
    pub gardens: Vec<Garden>,

    #[serde(default, skip_serializing_if = "ProviderConfig::is_empty")]
    pub provider: ProviderConfig,
}

/// A garden cluster entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Garden {
    #[serde(alias = "identity")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    pub kubeconfig: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// Regular expressions with named captures used by `target <value>`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub access_restrictions: Vec<AccessRestriction>,
}

/// Provider specific allow-lists
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcp: Option<AllowedPatterns>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openstack: Option<AllowedPatterns>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stackit: Option<AllowedPatterns>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowedPatterns {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_patterns: Vec<Pattern>,
}

impl ProviderConfig {
    pub fn is_empty(&self) -> bool {
        self.gcp.is_none() && self.openstack.is_none() && self.stackit.is_none()
    }
}

/// Result of matching a value against the garden patterns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternMatch {
    pub garden: String,
    pub project: Option<String>,
    pub namespace: Option<String>,
    pub shoot: Option<String>,
}

/// Get the gardenctl home directory (`$GCTL_HOME` or `~/.garden`)
pub fn home_dir() -> Result<PathBuf> {
    if let Some(home) = std::env::var_os(ENV_HOME).filter(|h| !h.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    dirs::home_dir()
        .map(|h| h.join(DEFAULT_HOME_DIR))
        .ok_or_else(|| GctlError::Config("could not determine home directory".to_string()))
}

/// Path of the configuration file, honouring an explicit `--config`
pub fn config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let name = std::env::var(ENV_CONFIG_NAME)
        .ok()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| DEFAULT_CONFIG_NAME.to_string());
    Ok(home_dir()?.join(format!("{name}.{CONFIG_EXTENSION}")))
}

/// Load a configuration file; a missing file is `NotFound`
pub fn load(path: &Path) -> Result<Config> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(GctlError::not_found("configuration file", path.display().to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    let mut config: Config = if content.trim().is_empty() {
        Config::default()
    } else {
        serde_yaml::from_str(&content)
            .map_err(|e| GctlError::Config(format!("failed to decode as YAML: {e}")))?
    };
    config.filename = path.to_path_buf();

    for garden in &mut config.gardens {
        garden.kubeconfig = shellexpand::tilde(&garden.kubeconfig).into_owned();
    }

    apply_env_overrides(&mut config)?;
    config.validate()?;
    debug!("Loaded configuration with {} gardens from {}", config.gardens.len(), path.display());
    Ok(config)
}

/// Load a configuration file, falling back to an empty one if it does not exist yet
pub fn load_or_default(path: &Path) -> Result<Config> {
    match load(path) {
        Ok(config) => Ok(config),
        Err(e) if e.is_not_found() => {
            debug!("No configuration at {}, using defaults", path.display());
            let mut config = Config {
                filename: path.to_path_buf(),
                ..Default::default()
            };
            apply_env_overrides(&mut config)?;
            Ok(config)
        }
        Err(e) => Err(e),
    }
}

fn apply_env_overrides(config: &mut Config) -> Result<()> {
    if let Ok(raw) = std::env::var(ENV_LINK_KUBECONFIG) {
        let value = parse_bool(&raw).ok_or_else(|| {
            GctlError::Config(format!(
                "failed to parse environment variable {ENV_LINK_KUBECONFIG}: invalid syntax {raw:?}"
            ))
        })?;
        config.link_kubeconfig = Some(value);
    }
    Ok(())
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Garden names and aliases: alphanumerics, `_` and `-`, alphanumeric at both ends
pub fn validate_garden_name(name: &str) -> Result<()> {
    let allowed_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if name.is_empty() || !allowed_chars {
        return Err(GctlError::Config(
            "garden name must contain only alphanumeric characters, underscore or hyphen".to_string(),
        ));
    }
    let alnum = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
    if !alnum(name.chars().next()) || !alnum(name.chars().last()) {
        return Err(GctlError::Config(
            "garden name must start and end with an alphanumeric character".to_string(),
        ));
    }
    Ok(())
}

/// Compile a garden pattern and check its capture names
pub fn validate_pattern(pattern: &str) -> Result<Regex> {
    if pattern.is_empty() {
        return Err(GctlError::PatternValidation("pattern must not be empty".to_string()));
    }
    let re = Regex::new(pattern).map_err(|e| {
        GctlError::PatternValidation(format!("failed to compile configured regular expression {pattern:?}: {e}"))
    })?;
    for name in re.capture_names().flatten() {
        if !PATTERN_KEYS.contains(&name) {
            return Err(GctlError::PatternValidation(format!(
                "pattern {pattern:?} uses unsupported capture group {name:?}, allowed are: {}",
                PATTERN_KEYS.join(", ")
            )));
        }
    }
    Ok(re)
}

fn validate_provider_patterns(name: &str, patterns: &Option<AllowedPatterns>, ctx: &ValidationContext) -> Result<()> {
    let Some(patterns) = patterns else {
        return Ok(());
    };
    for (i, pattern) in patterns.allowed_patterns.iter().enumerate() {
        pattern.validate_with_context(ctx).map_err(|e| {
            GctlError::Config(format!(
                "invalid {name} provider configuration: invalid allowed pattern at index {i}: {e}"
            ))
        })?;
    }
    Ok(())
}

impl Config {
    /// Check garden names, patterns and provider allow-lists
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        let mut warned = HashSet::new();

        for (i, garden) in self.gardens.iter().enumerate() {
            if garden.name.is_empty() {
                return Err(GctlError::Config(format!("garden at index {i} has an empty name")));
            }
            validate_garden_name(&garden.name)
                .map_err(|e| GctlError::Config(format!("invalid garden name {:?}: {}", garden.name, inner(e))))?;

            let alias = garden.alias.as_deref().filter(|a| !a.is_empty());
            if let Some(alias) = alias {
                validate_garden_name(alias).map_err(|e| {
                    GctlError::Config(format!(
                        "invalid garden alias {alias:?} for garden {:?}: {}",
                        garden.name,
                        inner(e)
                    ))
                })?;
            }

            for key in std::iter::once(garden.name.as_str()).chain(alias.filter(|a| *a != garden.name)) {
                if !seen.insert(key) && warned.insert(key) {
                    warn!(
                        "name and alias should be unique but {:?} was found multiple times in gardenctl configuration",
                        key
                    );
                }
            }

            for pattern in &garden.patterns {
                validate_pattern(pattern)
                    .map_err(|e| GctlError::Config(format!("invalid pattern of garden {:?}: {}", garden.name, inner(e))))?;
            }
        }

        validate_provider_patterns("GCP", &self.provider.gcp, &gcp_validation_context())?;
        validate_provider_patterns("OpenStack", &self.provider.openstack, &openstack_validation_context())?;
        validate_provider_patterns("STACKIT", &self.provider.stackit, &stackit_validation_context())?;
        Ok(())
    }

    /// Whether the session should keep a stable kubeconfig symlink
    pub fn link_kubeconfig(&self) -> bool {
        self.link_kubeconfig.unwrap_or(false)
    }

    /// Write the configuration atomically (file 0600, directory 0700)
    pub fn save(&self) -> Result<()> {
        if self.filename.as_os_str().is_empty() {
            return Err(GctlError::Config("configuration has no file name".to_string()));
        }
        if let Some(dir) = self.filename.parent().filter(|d| !d.as_os_str().is_empty()) {
            fsutil::create_private_dir(dir)?;
        }

        let mut lock_name = self.filename.as_os_str().to_owned();
        lock_name.push(".lock");
        let _lock = fsutil::lock_exclusive(Path::new(&lock_name))?;

        let content = serde_yaml::to_string(self)?;
        fsutil::write_atomic(&self.filename, content.as_bytes(), 0o600)?;
        debug!("Saved configuration to {}", self.filename.display());
        Ok(())
    }

    pub fn garden_names(&self) -> Vec<&str> {
        self.gardens.iter().map(|g| g.name.as_str()).collect()
    }

    pub fn index_of_garden(&self, name: &str) -> Option<usize> {
        self.gardens.iter().position(|g| g.name == name)
    }

    /// Look up a garden by name, then by alias
    pub fn garden(&self, name: &str) -> Result<&Garden> {
        if name.is_empty() {
            return Err(GctlError::InvalidArgument("garden name or alias cannot be empty".to_string()));
        }
        self.gardens
            .iter()
            .find(|g| g.name == name)
            .or_else(|| self.gardens.iter().find(|g| g.alias.as_deref() == Some(name)))
            .ok_or_else(|| GctlError::GardenNotDefined(name.to_string()))
    }

    /// The garden whose kubeconfig is the given file, if any
    pub fn garden_for_kubeconfig(&self, kubeconfig: &Path) -> Option<&Garden> {
        self.gardens
            .iter()
            .find(|g| Path::new(&g.kubeconfig) == kubeconfig)
    }

    /// Create or update a garden. `patterns == Some([""])` clears all patterns.
    pub fn set_garden(
        &mut self,
        name: &str,
        kubeconfig: Option<&str>,
        context: Option<&str>,
        patterns: Option<&[String]>,
        alias: Option<&str>,
    ) -> Result<()> {
        validate_garden_name(name)?;

        let patterns = match patterns {
            None => None,
            Some([only]) if only.is_empty() => Some(Vec::new()),
            Some(list) => {
                for p in list {
                    validate_pattern(p)?;
                }
                Some(list.to_vec())
            }
        };

        if let Some(alias) = alias.filter(|a| !a.is_empty()) {
            validate_garden_name(alias)?;
            let collides = self.gardens.iter().any(|g| {
                g.name != name && (g.name == alias || g.alias.as_deref() == Some(alias))
            });
            if collides {
                return Err(GctlError::Config(format!(
                    "alias {alias:?} is already used by another garden"
                )));
            }
        }

        let garden = match self.index_of_garden(name) {
            Some(i) => &mut self.gardens[i],
            None => {
                self.gardens.push(Garden {
                    name: name.to_string(),
                    ..Default::default()
                });
                let last = self.gardens.len() - 1;
                &mut self.gardens[last]
            }
        };

        if let Some(kubeconfig) = kubeconfig {
            garden.kubeconfig = shellexpand::tilde(kubeconfig).into_owned();
        }
        if let Some(context) = context {
            garden.context = (!context.is_empty()).then(|| context.to_string());
        }
        if let Some(patterns) = patterns {
            garden.patterns = patterns;
        }
        if let Some(alias) = alias {
            garden.alias = (!alias.is_empty()).then(|| alias.to_string());
        }
        Ok(())
    }

    pub fn delete_garden(&mut self, name: &str) -> Result<()> {
        let i = self
            .index_of_garden(name)
            .ok_or_else(|| GctlError::GardenNotDefined(name.to_string()))?;
        self.gardens.remove(i);
        Ok(())
    }

    /// Replace the user-provided OpenStack `authURL` patterns
    pub fn set_openstack_auth_urls(&mut self, patterns: Vec<Pattern>) {
        if patterns.is_empty() {
            self.provider.openstack = None;
        } else {
            self.provider.openstack = Some(AllowedPatterns {
                allowed_patterns: patterns,
            });
        }
    }

    pub fn gcp_allowed_patterns(&self) -> Vec<Pattern> {
        provider_patterns(&self.provider.gcp)
    }

    pub fn openstack_allowed_patterns(&self) -> Vec<Pattern> {
        provider_patterns(&self.provider.openstack)
    }

    pub fn stackit_allowed_patterns(&self) -> Vec<Pattern> {
        provider_patterns(&self.provider.stackit)
    }

    /// Match `value` against the garden patterns, preferring `preferred_garden`
    pub fn match_pattern(&self, preferred_garden: Option<&str>, value: &str) -> Result<PatternMatch> {
        if let Some(name) = preferred_garden.filter(|n| !n.is_empty()) {
            let garden = self.garden(name)?;
            if let Some(mut m) = match_patterns(&garden.patterns, value)? {
                m.garden = garden.name.clone();
                return Ok(m);
            }
        }

        let mut found: Option<PatternMatch> = None;
        for garden in &self.gardens {
            if let Some(mut m) = match_patterns(&garden.patterns, value)? {
                if found.is_some() {
                    return Err(GctlError::Ambiguous(
                        "the provided value resulted in an ambiguous match".to_string(),
                    ));
                }
                m.garden = garden.name.clone();
                found = Some(m);
            }
        }

        found.ok_or_else(|| GctlError::NoMatch("the provided value does not match any pattern".to_string()))
    }
}

fn provider_patterns(cfg: &Option<AllowedPatterns>) -> Vec<Pattern> {
    cfg.as_ref().map(|p| p.allowed_patterns.clone()).unwrap_or_default()
}

fn match_patterns(patterns: &[String], value: &str) -> Result<Option<PatternMatch>> {
    for p in patterns {
        let re = Regex::new(p).map_err(|e| {
            GctlError::PatternValidation(format!("failed to compile configured regular expression {p:?}: {e}"))
        })?;
        let Some(caps) = re.captures(value) else {
            continue;
        };
        let get = |key: &str| caps.name(key).map(|m| m.as_str().to_string());
        return Ok(Some(PatternMatch {
            garden: String::new(),
            project: get("project"),
            namespace: get("namespace"),
            shoot: get("shoot"),
        }));
    }
    Ok(None)
}

/// Message of a config error without its "Configuration error" prefix
fn inner(e: GctlError) -> String {
    match e {
        GctlError::Config(msg) | GctlError::PatternValidation(msg) => msg,
        other => other.to_string(),
    }
}
