//! Persisting the operator's choices and installing/removing the installer's
//! own boot artifacts.

pub mod acl;
pub mod commit;
pub mod service;

use thiserror::Error;

pub use commit::{commit_setup, ConfigWriteError};

/// Reasons a submission is rejected before anything is written.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidRequest {
    #[error("Your admin public key cannot be blank.")]
    BlankKey,

    #[error("Your hostname cannot be blank.")]
    BlankHostname,

    #[error("In order to use virtualhost naming, the hostname must not be an IP but a valid domain name.")]
    VhostNeedsDomain,
}

/// A validated `(hostname, use_vhost, ssh_key)` submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupRequest {
    hostname: String,
    use_vhost: bool,
    ssh_key: String,
}

impl SetupRequest {
    /// Trim both strings and reject blank values or vhost naming on a bare IP.
    pub fn new(hostname: &str, use_vhost: bool, ssh_key: &str) -> Result<Self, InvalidRequest> {
        let hostname = hostname.trim();
        let ssh_key = ssh_key.trim();

        if ssh_key.is_empty() {
            return Err(InvalidRequest::BlankKey);
        }
        if hostname.is_empty() {
            return Err(InvalidRequest::BlankHostname);
        }
        if use_vhost && looks_like_ipv4(hostname) {
            return Err(InvalidRequest::VhostNeedsDomain);
        }

        Ok(Self {
            hostname: hostname.to_string(),
            use_vhost,
            ssh_key: ssh_key.to_string(),
        })
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn use_vhost(&self) -> bool {
        self.use_vhost
    }

    pub fn ssh_key(&self) -> &str {
        &self.ssh_key
    }
}

/// Four dot-separated groups of one to three digits.
fn looks_like_ipv4(host: &str) -> bool {
    let parts: Vec<&str> = host.split('.').collect();
    parts.len() == 4
        && parts
            .iter()
            .all(|p| (1..=3).contains(&p.len()) && p.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trims_fields() {
        let req = SetupRequest::new("  example.com \n", true, "\tssh-rsa AAAA key\n").unwrap();
        assert_eq!(req.hostname(), "example.com");
        assert_eq!(req.ssh_key(), "ssh-rsa AAAA key");
        assert!(req.use_vhost());
    }

    #[test]
    fn test_blank_fields_rejected() {
        assert_eq!(
            SetupRequest::new("example.com", false, "   "),
            Err(InvalidRequest::BlankKey)
        );
        assert_eq!(
            SetupRequest::new(" ", false, "ssh-rsa AAAA"),
            Err(InvalidRequest::BlankHostname)
        );
    }

    #[test]
    fn test_vhost_requires_domain() {
        assert_eq!(
            SetupRequest::new("10.0.0.5", true, "ssh-rsa AAAA"),
            Err(InvalidRequest::VhostNeedsDomain)
        );
        // Plain port-based naming is fine on an IP.
        assert!(SetupRequest::new("10.0.0.5", false, "ssh-rsa AAAA").is_ok());
    }

    #[test]
    fn test_ipv4_detection() {
        assert!(looks_like_ipv4("192.168.1.10"));
        assert!(looks_like_ipv4("999.1.1.1"));
        assert!(!looks_like_ipv4("dokku.me"));
        assert!(!looks_like_ipv4("1.2.3"));
        assert!(!looks_like_ipv4("1.2.3.4.5"));
        assert!(!looks_like_ipv4("1.2.3.4a"));
        assert!(!looks_like_ipv4("1..3.4"));
    }
}
