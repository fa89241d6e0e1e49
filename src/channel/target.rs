//! Target machine addressing

use crate::error::ExtsyncError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Name accepted on the command line for the local machine
pub const LOCAL_TARGET: &str = "local";

/// How a target machine is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// OpenSSH remote commands plus sftp file transfer
    Ssh,
    /// The machine running extsync
    Local,
}

/// An addressable deployment target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetMachine {
    pub host: String,
    pub user: Option<String>,
    pub port: Option<u16>,
    pub transport: Transport,
}

impl TargetMachine {
    /// An SSH target with default user and port
    pub fn ssh(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: None,
            port: None,
            transport: Transport::Ssh,
        }
    }

    /// The local machine
    pub fn local() -> Self {
        Self {
            host: LOCAL_TARGET.to_string(),
            user: None,
            port: None,
            transport: Transport::Local,
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// `user@host` or `host`, as passed to ssh/scp
    pub fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{}@{}", user, self.host),
            None => self.host.clone(),
        }
    }
}

impl fmt::Display for TargetMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.destination(), port),
            None => f.write_str(&self.destination()),
        }
    }
}

/// Parses `local`, `host`, `user@host`, `host:port` and `user@host:port`
impl FromStr for TargetMachine {
    type Err = ExtsyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == LOCAL_TARGET {
            return Ok(Self::local());
        }

        // Only treat the suffix as a port if it parses as a valid u16
        let (rest, port) = match s.rsplit_once(':') {
            Some((rest, port)) => match port.parse::<u16>() {
                Ok(port) => (rest, Some(port)),
                Err(_) => (s, None),
            },
            None => (s, None),
        };

        let (user, host) = match rest.split_once('@') {
            Some((user, host)) => (Some(user), host),
            None => (None, rest),
        };

        let valid_host = !host.is_empty()
            && host
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_'));
        if !valid_host || user.is_some_and(str::is_empty) {
            return Err(ExtsyncError::User(format!("Invalid target: {:?}", s)));
        }

        Ok(Self {
            host: host.to_string(),
            user: user.map(str::to_string),
            port,
            transport: Transport::Ssh,
        })
    }
}
