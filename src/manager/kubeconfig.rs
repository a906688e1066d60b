//! Session kubeconfig files

use crate::error::{GctlError, Result};
use crate::fsutil;
use kube::config::Kubeconfig;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// `kubeconfig.<hash>.yaml`, where the hash is taken over the serialized content
pub fn file_name(content: &[u8]) -> String {
    let digest = hex::encode(Sha256::digest(content));
    format!("kubeconfig.{}.yaml", &digest[..32])
}

/// Copy of the kubeconfig with every context switched to `namespace`
pub fn with_namespace(kubeconfig: &Kubeconfig, namespace: &str) -> Result<Kubeconfig> {
    let mut raw = serde_json::to_value(kubeconfig)?;
    if let Some(contexts) = raw.get_mut("contexts").and_then(Value::as_array_mut) {
        for named in contexts {
            if let Some(context) = named.get_mut("context").and_then(Value::as_object_mut) {
                context.insert("namespace".to_string(), Value::String(namespace.to_string()));
            }
        }
    }
    Ok(serde_json::from_value(raw)?)
}

/// Serialize and write the kubeconfig into `dir`, returning its path
pub fn write(dir: &Path, kubeconfig: &Kubeconfig) -> Result<PathBuf> {
    let content = serde_yaml::to_string(kubeconfig)?;
    let path = dir.join(file_name(content.as_bytes()));
    fsutil::write_atomic(&path, content.as_bytes(), 0o600)
        .map_err(|e| GctlError::Kubeconfig(format!("failed to write kubeconfig to {}: {e}", path.display())))?;
    Ok(path)
}

/// Point `link` at `target`, replacing whatever was there
pub fn update_symlink(link: &Path, target: &Path) -> Result<()> {
    let mut tmp_name = link.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    fsutil::remove_if_exists(&tmp)?;
    std::os::unix::fs::symlink(target, &tmp)?;
    fs::rename(&tmp, link)?;
    Ok(())
}

/// Drop the stable symlink, if any
pub fn remove_symlink(link: &Path) -> Result<()> {
    match fs::symlink_metadata(link) {
        Ok(meta) if meta.file_type().is_symlink() => Ok(fs::remove_file(link)?),
        Ok(_) => Err(GctlError::Kubeconfig(format!(
            "{} exists and is not a symlink",
            link.display()
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn kubeconfig() -> Kubeconfig {
        serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "Config",
            "current-context": "garden",
            "clusters": [{"name": "garden", "cluster": {"server": "https://api.example.com"}}],
            "contexts": [{"name": "garden", "context": {"cluster": "garden", "user": "me"}}],
            "users": [{"name": "me", "user": {}}]
        }))
        .unwrap()
    }

    #[test]
    fn test_file_name_is_stable() {
        let a = file_name(b"content");
        assert_eq!(a, file_name(b"content"));
        assert_ne!(a, file_name(b"other"));
        assert_eq!(a.len(), "kubeconfig..yaml".len() + 32);
    }

    #[test]
    fn test_with_namespace() {
        let kc = with_namespace(&kubeconfig(), "garden-prod").unwrap();
        let ctx = kc.contexts[0].context.as_ref().unwrap();
        assert_eq!(ctx.namespace.as_deref(), Some("garden-prod"));
    }

    #[test]
    fn test_write_and_link() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), &kubeconfig()).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);

        let link = dir.path().join("kubeconfig.yaml");
        update_symlink(&link, &path).unwrap();
        assert_eq!(fs::read_link(&link).unwrap(), path);

        // relinking replaces the old link
        let other = write(dir.path(), &with_namespace(&kubeconfig(), "x").unwrap()).unwrap();
        update_symlink(&link, &other).unwrap();
        assert_eq!(fs::read_link(&link).unwrap(), other);

        remove_symlink(&link).unwrap();
        assert!(fs::symlink_metadata(&link).is_err());
        remove_symlink(&link).unwrap();
    }
}
