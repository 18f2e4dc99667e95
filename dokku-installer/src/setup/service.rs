//! Upstart job and nginx site that keep the installer reachable across a
//! reboot until setup is finished.
//!
//! The job points at the running binary's absolute path; nothing is copied.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::config::Settings;
use crate::lifecycle::TeardownStep;

#[derive(Debug, Error)]
pub enum BootRegistrationError {
    #[error("cannot resolve installer binary path: {0}")]
    ExePath(#[source] std::io::Error),

    #[error("binary path contains invalid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to list {}: {source}", path.display())]
    ListSites {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Install the boot job and proxy site, and disable every other nginx site.
pub fn register_for_boot(settings: &Settings) -> Result<(), BootRegistrationError> {
    let exe_path = std::env::current_exe()
        .and_then(|p| p.canonicalize())
        .map_err(BootRegistrationError::ExePath)?;
    register_with_exe(settings, &exe_path)
}

fn register_with_exe(settings: &Settings, exe_path: &Path) -> Result<(), BootRegistrationError> {
    let exe_str = exe_path
        .to_str()
        .ok_or_else(|| BootRegistrationError::NonUtf8Path(exe_path.to_path_buf()))?;
    let paths = &settings.paths;

    if !is_root() {
        warn!("not running as root, writing boot artifacts will likely fail");
    }

    write_file(&paths.service_file, &service_definition(exe_str))?;
    info!(path = %paths.service_file.display(), binary = %exe_str, "boot job written");

    write_file(&paths.nginx_conf, &proxy_rule(settings.listen_port))?;
    info!(path = %paths.nginx_conf.display(), port = settings.listen_port, "nginx site written");

    disable_enabled_sites(&paths.nginx_sites_enabled)?;

    info!("installed Upstart service and default nginx site for installer to run on boot");
    Ok(())
}

/// Upstart job that relaunches `exe` in self-destruct mode.
pub fn service_definition(exe: &str) -> String {
    format!("start on runlevel [2345]\nexec {} selfdestruct", exe)
}

/// nginx site sending port 80 to the installer.
pub fn proxy_rule(port: u16) -> String {
    format!(
        "upstream dokku-installer {{ server 127.0.0.1:{port}; }}\n\
         server {{\n\
         \x20 listen 80;\n\
         \x20 location / {{\n\
         \x20   proxy_pass http://dokku-installer;\n\
         \x20 }}\n\
         }}\n"
    )
}

/// Remove every entry of `sites_dir`. Entries that cannot be removed are
/// logged and skipped.
fn disable_enabled_sites(sites_dir: &Path) -> Result<(), BootRegistrationError> {
    let entries = std::fs::read_dir(sites_dir).map_err(|source| BootRegistrationError::ListSites {
        path: sites_dir.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(dir = %sites_dir.display(), error = %e, "failed to read site entry");
                continue;
            }
        };
        let site = entry.path();
        match std::fs::remove_file(&site) {
            Ok(()) => info!(site = %site.display(), "disabled nginx site"),
            Err(e) => warn!(site = %site.display(), error = %e, "failed to disable nginx site"),
        }
    }
    Ok(())
}

/// Inverse of [`register_for_boot`], in execution order. Pre-existing sites
/// disabled at registration are not restored.
pub fn teardown_steps(settings: &Settings) -> Vec<TeardownStep> {
    vec![
        TeardownStep::RemoveFile(settings.paths.nginx_conf.clone()),
        TeardownStep::Run(settings.commands.proxy_restart.clone()),
        TeardownStep::RemoveFile(settings.paths.service_file.clone()),
        TeardownStep::Run(settings.commands.installer_stop.clone()),
    ]
}

fn write_file(path: &Path, contents: &str) -> Result<(), BootRegistrationError> {
    std::fs::write(path, contents).map_err(|source| BootRegistrationError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Whether the effective user is root; boot artifacts live in root-owned dirs.
fn is_root() -> bool {
    #[cfg(unix)]
    {
        // SAFETY: geteuid takes no arguments and cannot fail.
        let euid = unsafe { libc::geteuid() };
        euid == 0
    }
    #[cfg(not(unix))]
    {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_settings;

    #[test]
    fn test_service_definition() {
        assert_eq!(
            service_definition("/usr/local/bin/dokku-installer"),
            "start on runlevel [2345]\nexec /usr/local/bin/dokku-installer selfdestruct"
        );
    }

    #[test]
    fn test_proxy_rule_targets_port() {
        let rule = proxy_rule(2000);
        assert!(rule.contains("upstream dokku-installer { server 127.0.0.1:2000; }"));
        assert!(rule.contains("listen 80;"));
        assert!(rule.contains("proxy_pass http://dokku-installer;"));
    }

    #[test]
    fn test_register_writes_artifacts_and_disables_sites() {
        let dir = tempfile::tempdir().unwrap();
        let settings = test_settings(dir.path());
        let sites = &settings.paths.nginx_sites_enabled;
        std::fs::write(sites.join("default"), "server {}").unwrap();
        std::fs::write(sites.join("legacy-app"), "server {}").unwrap();

        register_with_exe(&settings, Path::new("/opt/dokku-installer")).unwrap();

        assert_eq!(
            std::fs::read_to_string(&settings.paths.service_file).unwrap(),
            service_definition("/opt/dokku-installer")
        );
        assert_eq!(
            std::fs::read_to_string(&settings.paths.nginx_conf).unwrap(),
            proxy_rule(settings.listen_port)
        );
        assert_eq!(std::fs::read_dir(sites).unwrap().count(), 0);
    }

    #[test]
    fn test_register_skips_undeletable_sites() {
        let dir = tempfile::tempdir().unwrap();
        let settings = test_settings(dir.path());
        let sites = &settings.paths.nginx_sites_enabled;
        // A non-empty directory cannot be removed with remove_file.
        std::fs::create_dir_all(sites.join("stubborn/inner")).unwrap();
        std::fs::write(sites.join("default"), "server {}").unwrap();

        register_with_exe(&settings, Path::new("/opt/dokku-installer")).unwrap();

        assert!(sites.join("stubborn").exists());
        assert!(!sites.join("default").exists());
    }

    #[test]
    fn test_register_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let settings = test_settings(dir.path());

        register_with_exe(&settings, Path::new("/opt/dokku-installer")).unwrap();
        register_with_exe(&settings, Path::new("/opt/dokku-installer")).unwrap();

        assert!(settings.paths.service_file.exists());
        assert!(settings.paths.nginx_conf.exists());
    }

    #[test]
    fn test_register_fails_when_service_dir_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = test_settings(dir.path());
        settings.paths.service_file = dir.path().join("no-such-dir/dokku-installer.conf");

        let result = register_with_exe(&settings, Path::new("/opt/dokku-installer"));

        assert!(matches!(result, Err(BootRegistrationError::Write { .. })));
        assert!(!settings.paths.nginx_conf.exists());
    }

    #[test]
    fn test_register_fails_when_sites_dir_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = test_settings(dir.path());
        settings.paths.nginx_sites_enabled = dir.path().join("no-sites");

        let result = register_with_exe(&settings, Path::new("/opt/dokku-installer"));

        assert!(matches!(result, Err(BootRegistrationError::ListSites { .. })));
    }

    #[test]
    fn test_teardown_order() {
        let dir = tempfile::tempdir().unwrap();
        let settings = test_settings(dir.path());
        let steps = teardown_steps(&settings);

        assert_eq!(steps.len(), 4);
        assert_eq!(steps[0], TeardownStep::RemoveFile(settings.paths.nginx_conf.clone()));
        assert_eq!(steps[1], TeardownStep::Run(settings.commands.proxy_restart.clone()));
        assert_eq!(steps[2], TeardownStep::RemoveFile(settings.paths.service_file.clone()));
        assert_eq!(steps[3], TeardownStep::Run(settings.commands.installer_stop.clone()));
    }

    #[cfg(unix)]
    #[test]
    fn test_is_root_matches_new_file_owner() {
        use std::os::unix::fs::MetadataExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("owned");
        std::fs::write(&path, "").unwrap();
        let owner = std::fs::metadata(&path).unwrap().uid();

        assert_eq!(is_root(), owner == 0);
    }
}
