//! Remote channels to target machines
//!
//! Provides transport-agnostic access to a target machine:
//! - SSH targets: OpenSSH master connection + sftp
//! - The `local` target: the local filesystem and `sh`

mod factory;
mod local;
mod runtime;
mod ssh;
pub mod target;
mod timeout;

pub use factory::DefaultConnector;
pub use local::LocalChannel;
pub use runtime::{CommandStatus, Connector, RemoteChannel};
pub use ssh::SshChannel;
pub use target::{TargetMachine, Transport};
pub use timeout::{TimeoutChannel, Timeouts};

/// Single-quote a string for a POSIX shell command line.
pub fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '-' | '_' | '+' | ',' | ':' | '='));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}
