//! Per-shell session directory
//!
//! ```text
//! <tmp>/garden-<uid>/<session-id>/
//!   target.yaml
//!   history
//!   kubeconfig.yaml
//!   provider-env/<prefix>-<field>.txt
//! ```
//!
//! Mutations are serialized through an advisory lock on `<dir>/.lock`.

use crate::error::{GctlError, Result};
use crate::fsutil::{self, FileLock};
use crate::target::Target;
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::{getsid, getuid, Pid};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const ENV_SESSION_ID: &str = "GCTL_SESSION_ID";
const ENV_TERM_SESSION_ID: &str = "TERM_SESSION_ID";

const SESSION_ROOT_DIR: &str = "garden";
const SID_PREFIX: &str = "sid-";
const TARGET_FILE: &str = "target.yaml";
const HISTORY_FILE: &str = "history";
const LOCK_FILE: &str = ".lock";
const PROVIDER_ENV_DIR: &str = "provider-env";
const KUBECONFIG_LINK: &str = "kubeconfig.yaml";

/// Maximum number of history records kept
pub const HISTORY_LIMIT: usize = 100;

/// Check a session id: `[A-Za-z0-9._:-]`, 1 to 128 characters, not `.` or `..`
pub fn validate_session_id(id: &str) -> Result<()> {
    let valid_chars = id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ':' | '-'));
    if id.is_empty() || id.len() > 128 || !valid_chars || id == "." || id == ".." {
        return Err(GctlError::InvalidArgument(format!(
            "invalid session id {id:?}: must be 1 to 128 characters out of [A-Za-z0-9._:-]"
        )));
    }
    Ok(())
}

/// Session id of the invoking terminal
pub fn session_id_from_env() -> Result<String> {
    for var in [ENV_SESSION_ID, ENV_TERM_SESSION_ID] {
        if let Ok(id) = std::env::var(var) {
            if !id.is_empty() {
                validate_session_id(&id)?;
                return Ok(id);
            }
        }
    }
    let sid = getsid(None).map_err(|e| GctlError::Io(e.into()))?;
    Ok(format!("{SID_PREFIX}{}", sid.as_raw()))
}

/// Default directory holding all sessions
pub fn default_session_root() -> PathBuf {
    std::env::temp_dir().join(format!("{SESSION_ROOT_DIR}-{}", getuid()))
}

#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    root: PathBuf,
    dir: PathBuf,
}

impl Session {
    /// Open (and create if needed) the session directory
    pub fn open(root: &Path, id: &str) -> Result<Self> {
        validate_session_id(id)?;
        // the root may be shared, only the session directory is ours to chmod
        fsutil::create_dir(root)?;
        let dir = root.join(id);
        fsutil::create_private_dir(&dir)?;
        Ok(Session {
            id: id.to_string(),
            root: root.to_path_buf(),
            dir,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn target_file(&self) -> PathBuf {
        self.dir.join(TARGET_FILE)
    }

    pub fn history_file(&self) -> PathBuf {
        self.dir.join(HISTORY_FILE)
    }

    pub fn provider_env_dir(&self) -> PathBuf {
        self.dir.join(PROVIDER_ENV_DIR)
    }

    pub fn kubeconfig_link(&self) -> PathBuf {
        self.dir.join(KUBECONFIG_LINK)
    }

    /// Hold the session lock until the guard is dropped
    pub fn lock(&self) -> Result<FileLock> {
        fsutil::lock_exclusive(&self.dir.join(LOCK_FILE))
    }

    /// Current target; an absent file is the empty target
    pub fn read_target(&self) -> Result<Target> {
        match fs::read_to_string(self.target_file()) {
            Ok(content) if content.trim().is_empty() => Ok(Target::default()),
            Ok(content) => Ok(serde_yaml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Target::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist the target via `target.yaml.tmp` and rename
    pub fn write_target(&self, target: &Target) -> Result<()> {
        let content = serde_yaml::to_string(target)?;
        fsutil::write_atomic(&self.target_file(), content.as_bytes(), 0o600)
    }

    /// Append one record and fsync; the file is compacted to the newest
    /// [`HISTORY_LIMIT`] records when it grows beyond that
    pub fn append_history(&self, record: &str) -> Result<()> {
        let path = self.history_file();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .mode(0o600)
            .open(&path)?;
        writeln!(file, "{record}")?;
        file.sync_all()?;
        drop(file);

        let records = self.read_history()?;
        if records.len() > HISTORY_LIMIT {
            let keep = &records[records.len() - HISTORY_LIMIT..];
            let mut content = keep.join("\n");
            content.push('\n');
            fsutil::write_atomic(&path, content.as_bytes(), 0o600)?;
            debug!("Compacted history to {} records", keep.len());
        }
        Ok(())
    }

    /// History records, oldest first. A final record without its newline was
    /// cut short by a crash and is skipped.
    pub fn read_history(&self) -> Result<Vec<String>> {
        let content = match fs::read_to_string(self.history_file()) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let complete = match content.rfind('\n') {
            Some(i) => &content[..i],
            None => return Ok(Vec::new()),
        };
        Ok(complete
            .split('\n')
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Reap stale sessions in the background
    pub fn spawn_gc(&self) -> tokio::task::JoinHandle<()> {
        let root = self.root.clone();
        let current = self.id.clone();
        tokio::task::spawn_blocking(move || {
            let reaped = gc_stale_sessions(&root, &current);
            if reaped > 0 {
                debug!("Removed {} stale sessions", reaped);
            }
        })
    }
}

fn process_exists(pid: i32) -> bool {
    // signal 0 only checks existence; EPERM still means the process is alive
    !matches!(kill(Pid::from_raw(pid), None), Err(Errno::ESRCH))
}

/// Remove `sid-<n>` session directories whose process `n` is gone
pub fn gc_stale_sessions(root: &Path, current: &str) -> usize {
    let Ok(entries) = fs::read_dir(root) else {
        return 0;
    };

    let mut reaped = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name == current {
            continue;
        }
        let Some(pid) = name.strip_prefix(SID_PREFIX).and_then(|n| n.parse::<i32>().ok()) else {
            continue;
        };
        if pid <= 0 || process_exists(pid) {
            continue;
        }
        match fs::remove_dir_all(entry.path()) {
            Ok(()) => reaped += 1,
            Err(e) => warn!("Failed to remove stale session {}: {}", name, e),
        }
    }
    reaped
}
