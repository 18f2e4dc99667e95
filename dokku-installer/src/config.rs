use std::path::PathBuf;

use clap::Parser;

use crate::cmd::ExternalCommand;
use crate::lifecycle::Mode;

/// Port the wizard listens on. nginx forwards port 80 here.
pub const LISTEN_PORT: u16 = 2000;

/// Environment variable overriding the Dokku installation root.
pub const DOKKU_ROOT_ENV: &str = "DOKKU_ROOT";

const DEFAULT_DOKKU_ROOT: &str = "/home/dokku";
const ROOT_KEYS: &str = "/root/.ssh/authorized_keys";
const SERVICE_FILE: &str = "/etc/init/dokku-installer.conf";
const NGINX_CONF: &str = "/etc/nginx/conf.d/dokku-installer.conf";
const NGINX_SITES_ENABLED: &str = "/etc/nginx/sites-enabled";
const PUBLIC_IP_URL: &str = "http://icanhazip.com";

/// Dokku web installer.
///
/// Serves a one-time setup form on port 2000. Run with `onboot` to install
/// the Upstart job and nginx site that expose it after reboot, or with
/// `selfdestruct` to remove both once setup has been submitted.
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Config {
    /// Invocation mode (`onboot` or `selfdestruct`); anything else serves normally
    #[arg(value_name = "MODE")]
    pub args: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "DOKKU_INSTALLER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "DOKKU_INSTALLER_LOG_JSON", default_value_t = false)]
    pub log_json: bool,
}

impl Config {
    /// Mode selected by the first positional argument.
    pub fn mode(&self) -> Mode {
        Mode::from_arg(self.args.first().map(String::as_str))
    }
}

/// Fixed filesystem locations the installer reads and writes.
#[derive(Debug, Clone)]
pub struct Paths {
    pub authorized_keys: PathBuf,
    pub dokku_root: PathBuf,
    pub service_file: PathBuf,
    pub nginx_conf: PathBuf,
    pub nginx_sites_enabled: PathBuf,
}

impl Paths {
    pub fn hostname_file(&self) -> PathBuf {
        self.dokku_root.join("HOSTNAME")
    }

    pub fn vhost_file(&self) -> PathBuf {
        self.dokku_root.join("VHOST")
    }
}

/// External tools invoked during probing, setup and teardown.
#[derive(Debug, Clone)]
pub struct Commands {
    /// Hostname validation; the hostname is appended as the last argument.
    pub dns_lookup: ExternalCommand,
    /// Reads a public key on stdin and grants it access as the admin user.
    pub acl_add: ExternalCommand,
    pub proxy_restart: ExternalCommand,
    pub installer_stop: ExternalCommand,
}

impl Default for Commands {
    fn default() -> Self {
        Self {
            dns_lookup: ExternalCommand::new("dig", &["+short"]),
            acl_add: ExternalCommand::new("sshcommand", &["acl-add", "dokku", "admin"]),
            proxy_restart: ExternalCommand::new("restart", &["nginx"]),
            installer_stop: ExternalCommand::new("stop", &["dokku-installer"]),
        }
    }
}

/// Everything the installer needs to know about its host, built once at
/// startup and shared by every component.
#[derive(Debug, Clone)]
pub struct Settings {
    pub paths: Paths,
    pub commands: Commands,
    pub listen_port: u16,
    pub public_ip_url: String,
}

impl Settings {
    /// Defaults, with the installation root taken from `DOKKU_ROOT`.
    pub fn from_env() -> Self {
        Self::with_dokku_root(std::env::var(DOKKU_ROOT_ENV).ok().as_deref())
    }

    /// Defaults with an optional root override; an empty value counts as unset.
    pub fn with_dokku_root(root: Option<&str>) -> Self {
        let dokku_root = match root {
            Some(r) if !r.is_empty() => PathBuf::from(r),
            _ => PathBuf::from(DEFAULT_DOKKU_ROOT),
        };

        Self {
            paths: Paths {
                authorized_keys: PathBuf::from(ROOT_KEYS),
                dokku_root,
                service_file: PathBuf::from(SERVICE_FILE),
                nginx_conf: PathBuf::from(NGINX_CONF),
                nginx_sites_enabled: PathBuf::from(NGINX_SITES_ENABLED),
            },
            commands: Commands::default(),
            listen_port: LISTEN_PORT,
            public_ip_url: PUBLIC_IP_URL.to_string(),
        }
    }
}

/// Settings rooted in a scratch directory, with every external tool
/// replaced by a harmless local command.
///
/// The ACL tool appends whatever it reads on stdin to `<dir>/acl.log`.
/// The public-IP URL points at the discard port so lookups fail fast.
#[cfg(test)]
pub(crate) fn test_settings(dir: &std::path::Path) -> Settings {
    let dokku_root = dir.join("dokku");
    let init_dir = dir.join("init");
    let conf_dir = dir.join("nginx/conf.d");
    let sites_dir = dir.join("nginx/sites-enabled");
    for d in [&dokku_root, &init_dir, &conf_dir, &sites_dir] {
        std::fs::create_dir_all(d).unwrap();
    }

    let acl_log = dir.join("acl.log");
    let acl_script = format!("cat >> '{}'", acl_log.display());

    Settings {
        paths: Paths {
            authorized_keys: dir.join("authorized_keys"),
            dokku_root,
            service_file: init_dir.join("dokku-installer.conf"),
            nginx_conf: conf_dir.join("dokku-installer.conf"),
            nginx_sites_enabled: sites_dir,
        },
        commands: Commands {
            dns_lookup: ExternalCommand::new("true", &[]),
            acl_add: ExternalCommand::new("sh", &["-c", &acl_script]),
            proxy_restart: ExternalCommand::new("true", &[]),
            installer_stop: ExternalCommand::new("true", &[]),
        },
        listen_port: LISTEN_PORT,
        public_ip_url: "http://127.0.0.1:9/".to_string(),
    }
}

/// Path of the log written by the test ACL command.
#[cfg(test)]
pub(crate) fn test_acl_log(dir: &std::path::Path) -> PathBuf {
    dir.join("acl.log")
}
