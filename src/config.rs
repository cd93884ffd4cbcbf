//! Server configuration and resolved runtime state.

use crate::limits::Limits;
use std::{
    io,
    net::{SocketAddr, ToSocketAddrs},
    path::PathBuf,
};

/// User-facing configuration, normally filled in from the command line.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind.
    pub host: String,

    /// Port to listen on. `0` picks an ephemeral port.
    pub port: u16,

    /// Number of worker tasks draining the connection queue. Also the bound
    /// of the admission queue: with every worker busy and the queue full,
    /// new connections are refused with `503`.
    pub workers: usize,

    /// Content directory served to clients. Relative paths resolve against
    /// the working directory; created on startup if absent.
    pub content_root: PathBuf,

    /// Protocol and resource limits.
    pub limits: Limits,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8080,
            workers: 10,
            content_root: PathBuf::from("resources"),
            limits: Limits::default(),
        }
    }
}

impl ServerConfig {
    pub(crate) fn socket_addr(&self) -> io::Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    "bind host resolved to no addresses",
                )
            })
    }
}

/// Process-wide read-only state derived from [`ServerConfig`] at startup and
/// shared by the dispatcher, the gate, and the handlers.
#[derive(Debug)]
pub struct ServerContext {
    pub config: ServerConfig,

    /// Port actually bound; differs from `config.port` when that was `0`.
    pub port: u16,

    /// Absolute content root; GET targets resolve beneath it.
    pub root: PathBuf,

    /// Symlink-resolved content root, the anchor of the containment check
    /// applied to every file the server opens.
    pub canonical_root: PathBuf,

    /// Exact `Host` header values accepted by the security gate.
    pub allowed_hosts: Vec<String>,
}

impl ServerContext {
    pub fn new(config: ServerConfig, port: u16) -> io::Result<Self> {
        let root = match config.content_root.is_absolute() {
            true => config.content_root.clone(),
            false => std::env::current_dir()?.join(&config.content_root),
        };

        // The uploads directory is also recreated on demand by the upload
        // handler; creating it here makes the root canonicalisable.
        std::fs::create_dir_all(root.join("uploads"))?;
        let canonical_root = std::fs::canonicalize(&root)?;

        let allowed_hosts = Self::allowed_hosts(&config.host, port);

        Ok(Self {
            config,
            port,
            root,
            canonical_root,
            allowed_hosts,
        })
    }

    // The bind host, `localhost`, and the loopback address, each bare and
    // with the listening port. `localhost` is accepted regardless of the
    // bind address.
    fn allowed_hosts(host: &str, port: u16) -> Vec<String> {
        let mut hosts: Vec<String> = Vec::new();

        for name in [host, "localhost", "127.0.0.1"] {
            for candidate in [name.to_owned(), format!("{name}:{port}")] {
                if !hosts.contains(&candidate) {
                    hosts.push(candidate);
                }
            }
        }

        hosts
    }
}
