//! Writing the submitted settings to Dokku's configuration files.
//!
//! Steps run in order and stop at the first failure. Nothing is rolled
//! back: a retry simply overwrites what the previous attempt left behind.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use super::acl::{self, AclError};
use super::SetupRequest;
use crate::config::Settings;

#[derive(Debug, Error)]
pub enum ConfigWriteError {
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to remove {}: {source}", path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Acl(#[from] AclError),
}

/// Record the hostname, set or clear vhost naming, and grant the key access.
///
/// Clearing vhost naming deletes `VHOST`; if the file was never created
/// that deletion fails and so does the whole commit.
pub fn commit_setup(settings: &Settings, request: &SetupRequest) -> Result<(), ConfigWriteError> {
    let paths = &settings.paths;

    let hostname_file = paths.hostname_file();
    write_file(&hostname_file, request.hostname())?;
    info!(path = %hostname_file.display(), hostname = %request.hostname(), "hostname recorded");

    let vhost_file = paths.vhost_file();
    if request.use_vhost() {
        write_file(&vhost_file, request.hostname())?;
        info!(path = %vhost_file.display(), "virtualhost naming enabled");
    } else {
        std::fs::remove_file(&vhost_file).map_err(|source| ConfigWriteError::Remove {
            path: vhost_file.clone(),
            source,
        })?;
        info!(path = %vhost_file.display(), "virtualhost naming disabled");
    }

    acl::grant_access(&settings.commands.acl_add, request.ssh_key())?;
    Ok(())
}

fn write_file(path: &Path, contents: &str) -> Result<(), ConfigWriteError> {
    std::fs::write(path, contents).map_err(|source| ConfigWriteError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::ExternalCommand;
    use crate::config::{test_acl_log, test_settings};

    fn request(hostname: &str, vhost: bool) -> SetupRequest {
        SetupRequest::new(hostname, vhost, "ssh-rsa AAAAB3Nza admin@laptop").unwrap()
    }

    #[test]
    fn test_vhost_enabled_mirrors_hostname() {
        let dir = tempfile::tempdir().unwrap();
        let settings = test_settings(dir.path());

        commit_setup(&settings, &request(" example.com ", true)).unwrap();

        let hostname = std::fs::read_to_string(settings.paths.hostname_file()).unwrap();
        let vhost = std::fs::read_to_string(settings.paths.vhost_file()).unwrap();
        assert_eq!(hostname, "example.com");
        assert_eq!(vhost, hostname);
        assert_eq!(
            std::fs::read_to_string(test_acl_log(dir.path())).unwrap(),
            "ssh-rsa AAAAB3Nza admin@laptop"
        );
    }

    #[test]
    fn test_vhost_disabled_removes_marker() {
        let dir = tempfile::tempdir().unwrap();
        let settings = test_settings(dir.path());
        std::fs::write(settings.paths.vhost_file(), "old.example.com").unwrap();
        std::fs::write(settings.paths.hostname_file(), "old.example.com").unwrap();

        commit_setup(&settings, &request("\tnew.example.com\n", false)).unwrap();

        assert!(!settings.paths.vhost_file().exists());
        assert_eq!(
            std::fs::read_to_string(settings.paths.hostname_file()).unwrap(),
            "new.example.com"
        );
    }

    #[test]
    fn test_vhost_disabled_without_marker_fails() {
        let dir = tempfile::tempdir().unwrap();
        let settings = test_settings(dir.path());

        let result = commit_setup(&settings, &request("example.com", false));

        assert!(matches!(result, Err(ConfigWriteError::Remove { .. })));
        // The hostname write already happened and stays.
        assert_eq!(
            std::fs::read_to_string(settings.paths.hostname_file()).unwrap(),
            "example.com"
        );
        // The ACL tool never ran.
        assert!(!test_acl_log(dir.path()).exists());
    }

    #[test]
    fn test_unwritable_root_aborts_before_acl() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = test_settings(dir.path());
        settings.paths.dokku_root = dir.path().join("missing");

        let result = commit_setup(&settings, &request("example.com", true));

        assert!(matches!(result, Err(ConfigWriteError::Write { .. })));
        assert!(!test_acl_log(dir.path()).exists());
    }

    #[test]
    fn test_acl_failure_keeps_written_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = test_settings(dir.path());
        settings.commands.acl_add = ExternalCommand::new("sh", &["-c", "cat > /dev/null; exit 2"]);

        let result = commit_setup(&settings, &request("example.com", true));

        assert!(matches!(result, Err(ConfigWriteError::Acl(_))));
        assert!(settings.paths.hostname_file().exists());
        assert!(settings.paths.vhost_file().exists());
    }
}
