//! Process identity and PID file
//!
//! Identity is `{local_ip}@{hostname}`; the PID file holds
//! `{identity}-{pid}`.

use crate::infrastructure::config::PidConfig;
use std::fmt;
use std::fs;
use std::io;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::path::PathBuf;
use thiserror::Error;

/// Host identity of this gateway instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessIdentity {
    pub local_ip: IpAddr,
    pub hostname: String,
}

impl ProcessIdentity {
    /// Discover the local IP and hostname
    ///
    /// Falls back to loopback and `localhost` when discovery fails.
    pub fn discover() -> Self {
        let local_ip = local_ip().unwrap_or_else(|e| {
            tracing::warn!("can not get local IP: {}", e);
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        });
        let hostname = hostname().unwrap_or_else(|| "localhost".to_string());
        Self { local_ip, hostname }
    }
}

impl fmt::Display for ProcessIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.local_ip, self.hostname)
    }
}

#[derive(Debug, Error)]
pub enum PidFileError {
    #[error("{0} already exists")]
    AlreadyExists(PathBuf),

    #[error("can't create PID folder {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("can't write PID information on {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Write the PID file when enabled
///
/// Returns the path written, or `None` when PID files are disabled.
///
/// # Errors
/// Fails if the file exists and `override` is off, or on I/O failure.
pub fn create_pid_file(
    config: &PidConfig,
    identity: &ProcessIdentity,
) -> Result<Option<PathBuf>, PidFileError> {
    if !config.enabled {
        return Ok(None);
    }

    let path = config.path.as_path();
    if path.exists() && !config.override_existing {
        return Err(PidFileError::AlreadyExists(path.to_path_buf()));
    }

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|source| PidFileError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let contents = format!("{}-{}", identity, std::process::id());
    fs::write(path, contents).map_err(|source| PidFileError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::info!(path = %path.display(), "PID file created");
    Ok(Some(path.to_path_buf()))
}

/// Address of the interface used for outbound traffic
///
/// Connecting a UDP socket sends no packets; it only selects a route.
fn local_ip() -> io::Result<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect("8.8.8.8:80")?;
    Ok(socket.local_addr()?.ip())
}

/// System hostname; `None` when unavailable or not UTF-8
fn hostname() -> Option<String> {
    match nix::unistd::gethostname() {
        Ok(name) => name.into_string().ok().filter(|h| !h.is_empty()),
        Err(e) => {
            tracing::warn!("can not get hostname: {}", e);
            None
        }
    }
}
