//! Best-effort discovery of the values pre-filled into the setup form.
//!
//! Nothing here is fatal: callers log the error and fall back to an empty
//! field.

use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use crate::config::{Paths, Settings};

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("public IP lookup failed: {0}")]
    Network(String),
}

/// First line of root's `authorized_keys`.
pub fn resolve_admin_key(paths: &Paths) -> Result<String, ProbeError> {
    let keys = std::fs::read_to_string(&paths.authorized_keys).map_err(|source| ProbeError::Io {
        path: paths.authorized_keys.clone(),
        source,
    })?;
    Ok(keys.lines().next().unwrap_or_default().to_string())
}

/// Externally reachable name for this host.
///
/// Uses the OS hostname when it passes the DNS lookup tool, otherwise asks
/// the public-IP service.
pub async fn resolve_hostname(settings: &Settings) -> Result<String, ProbeError> {
    resolve_hostname_from(local_hostname(), settings).await
}

async fn resolve_hostname_from(
    local: Option<String>,
    settings: &Settings,
) -> Result<String, ProbeError> {
    if let Some(hostname) = local.filter(|h| !h.is_empty()) {
        let lookup = settings.commands.dns_lookup.clone();
        let candidate = hostname.clone();
        let resolved = tokio::task::spawn_blocking(move || lookup.run(&[&candidate])).await;

        match resolved {
            Ok(Ok(())) => return Ok(hostname),
            Ok(Err(e)) => {
                debug!(hostname = %hostname, error = %e, "hostname did not resolve, using public IP")
            }
            Err(e) => debug!(hostname = %hostname, error = %e, "hostname lookup task failed"),
        }
    }

    detect_public_ip(&settings.public_ip_url).await
}

/// Ask a "what is my IP" service; the trimmed response body is the address.
pub async fn detect_public_ip(url: &str) -> Result<String, ProbeError> {
    let resp = reqwest::get(url)
        .await
        .map_err(|e| ProbeError::Network(format!("{}: {}", url, e)))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(ProbeError::Network(format!("{} returned HTTP {}", url, status)));
    }

    let body = resp
        .text()
        .await
        .map_err(|e| ProbeError::Network(format!("{}: {}", url, e)))?;

    let ip = body.trim();
    if ip.is_empty() {
        return Err(ProbeError::Network(format!("{} returned an empty body", url)));
    }
    Ok(ip.to_string())
}

/// OS-reported hostname, if any.
fn local_hostname() -> Option<String> {
    #[cfg(unix)]
    {
        let mut buf = [0u8; 256];
        // SAFETY: buf is valid for buf.len() bytes for the duration of the call.
        let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len()) };
        if rc != 0 {
            return None;
        }
        let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        Some(String::from_utf8_lossy(&buf[..len]).into_owned())
    }
    #[cfg(not(unix))]
    {
        None
    }
}
