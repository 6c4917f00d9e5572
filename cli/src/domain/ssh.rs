//! SSH target and authentication method types.

use std::fmt;
use std::path::PathBuf;

use crate::domain::config::ServerConfig;

/// Where to connect: host, port and login user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub known_hosts: Option<PathBuf>,
}

impl SshTarget {
    /// `user@host`, as handed to the OpenSSH client.
    #[must_use]
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

impl From<&ServerConfig> for SshTarget {
    fn from(server: &ServerConfig) -> Self {
        Self {
            host: server.host.clone(),
            port: server.port,
            user: server.user.clone(),
            known_hosts: server.known_hosts.clone(),
        }
    }
}

/// One way of proving identity to the server.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMethod {
    Password(String),
    PrivateKey(PathBuf),
}

impl AuthMethod {
    /// Password first, key second: the order connections are attempted in.
    #[must_use]
    pub fn fallback_chain(server: &ServerConfig) -> [Self; 2] {
        [
            Self::Password(server.password.clone()),
            Self::PrivateKey(server.key_path.clone()),
        ]
    }

    /// Label without secret material, for logs and summaries.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Password(_) => "password",
            Self::PrivateKey(_) => "SSH key",
        }
    }
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password(_) => f.write_str("Password(<redacted>)"),
            Self::PrivateKey(path) => f.debug_tuple("PrivateKey").field(path).finish(),
        }
    }
}
