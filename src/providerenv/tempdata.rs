//! Credential data files in the session directory
//!
//! Secret values never appear inline in a generated script. Each value is
//! written to `<session>/provider-env/<prefix>-<field>.txt` and the script
//! reads it from there. The prefix is derived from the session and the
//! canonical target, so repeated runs for the same target overwrite the same
//! files while other targets never collide with them.

use crate::error::{GctlError, Result};
use crate::fsutil;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DATA_DIR: &str = "provider-env";

/// The target reduced to what identifies a shoot
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CanonicalTarget {
    pub garden: String,
    pub namespace: String,
    pub shoot: String,
}

/// 16 hex characters of `sha256(session | garden | namespace | shoot)`
pub fn file_prefix(session_id: &str, target: &CanonicalTarget) -> String {
    let key = format!("{session_id}|{}|{}|{}", target.garden, target.namespace, target.shoot);
    hex::encode(&Sha256::digest(key.as_bytes())[..8])
}

/// Prefix of the workload identity token file, keyed by the identity itself
pub fn workload_identity_prefix(session_id: &str, namespace: &str, name: &str) -> String {
    let key = format!("{session_id}|{namespace}|{name}");
    hex::encode(&Sha256::digest(key.as_bytes())[..8])
}

pub struct DataWriter {
    dir: PathBuf,
    prefix: String,
    files: BTreeMap<String, String>,
    dir_created: bool,
}

impl DataWriter {
    pub fn new(session_dir: &Path, prefix: String) -> Self {
        DataWriter {
            dir: session_dir.join(DATA_DIR),
            prefix,
            files: BTreeMap::new(),
            dir_created: false,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, field: &str) -> PathBuf {
        self.dir.join(format!("{}-{field}.txt", self.prefix))
    }

    /// Write `value` for `field`, creating the data directory on first use
    pub fn write_field(&mut self, field: &str, value: &str) -> Result<PathBuf> {
        if field.is_empty() || field.contains(['/', '\\']) || field.starts_with('.') {
            return Err(GctlError::InvalidArgument(format!("invalid data field name {field:?}")));
        }
        if !self.dir_created {
            fsutil::create_private_dir(&self.dir)?;
            self.dir_created = true;
        }

        let path = self.path_for(field);
        fsutil::write_private_file(&path, value.as_bytes())?;
        self.files
            .insert(field.to_string(), path.to_string_lossy().into_owned());
        Ok(path)
    }

    /// Field name to file path of everything written so far
    pub fn files(&self) -> &BTreeMap<String, String> {
        &self.files
    }

    /// Remove the files a previous run left for this prefix
    pub fn cleanup(&self) -> Result<usize> {
        if !self.dir.is_dir() {
            return Ok(0);
        }

        let pattern = self
            .dir
            .join(format!("{}-*.txt", glob::Pattern::escape(&self.prefix)));
        let pattern = pattern.to_string_lossy();
        let entries = glob::glob(&pattern)
            .map_err(|e| GctlError::InvalidArgument(format!("invalid cleanup pattern: {e}")))?;

        let mut removed = 0;
        for entry in entries.flatten() {
            fsutil::remove_if_exists(&entry)?;
            removed += 1;
        }
        debug!(removed, dir = %self.dir.display(), "Removed provider data files");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn target(shoot: &str) -> CanonicalTarget {
        CanonicalTarget {
            garden: "g1".into(),
            namespace: "garden-prod".into(),
            shoot: shoot.into(),
        }
    }

    #[test]
    fn test_prefix_is_deterministic() {
        let a = file_prefix("sid", &target("s1"));
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a, file_prefix("sid", &target("s1")));
        assert_ne!(a, file_prefix("sid", &target("s2")));
        assert_ne!(a, file_prefix("other", &target("s1")));
    }

    #[test]
    fn test_write_field_modes() {
        let session = TempDir::new().unwrap();
        let mut writer = DataWriter::new(session.path(), "abcd".into());
        assert!(!writer.dir().exists());

        let path = writer.write_field("region", "eu-west-1").unwrap();
        assert_eq!(path, session.path().join("provider-env/abcd-region.txt"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "eu-west-1");
        assert_eq!(fs::metadata(&path).unwrap().permissions().mode() & 0o777, 0o600);
        assert_eq!(fs::metadata(writer.dir()).unwrap().permissions().mode() & 0o777, 0o700);

        // rewriting keeps a single file
        writer.write_field("region", "eu-central-1").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "eu-central-1");
        assert_eq!(writer.files().len(), 1);
    }

    #[test]
    fn test_rejects_path_like_fields() {
        let session = TempDir::new().unwrap();
        let mut writer = DataWriter::new(session.path(), "abcd".into());
        assert!(writer.write_field("../x", "v").is_err());
        assert!(writer.write_field("", "v").is_err());
    }

    #[test]
    fn test_cleanup_only_touches_own_prefix() {
        let session = TempDir::new().unwrap();
        let mut mine = DataWriter::new(session.path(), "aaaa".into());
        mine.write_field("a", "1").unwrap();
        mine.write_field("b", "2").unwrap();
        let mut other = DataWriter::new(session.path(), "bbbb".into());
        let kept = other.write_field("a", "1").unwrap();

        let cleaner = DataWriter::new(session.path(), "aaaa".into());
        assert_eq!(cleaner.cleanup().unwrap(), 2);
        assert!(kept.exists());

        // nothing left, and a missing directory is fine
        assert_eq!(cleaner.cleanup().unwrap(), 0);
        let empty = TempDir::new().unwrap();
        assert_eq!(DataWriter::new(empty.path(), "aaaa".into()).cleanup().unwrap(), 0);
    }
}
