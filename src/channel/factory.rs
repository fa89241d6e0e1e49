//! Connector that picks the channel implementation for a target

use crate::channel::local::LocalChannel;
use crate::channel::runtime::{Connector, RemoteChannel};
use crate::channel::ssh::SshChannel;
use crate::channel::target::{TargetMachine, Transport};
use crate::channel::timeout::{with_deadline, TimeoutChannel, Timeouts};
use crate::config::schema::SshConfig;
use crate::config::Config;
use crate::error::ExtsyncResult;
use async_trait::async_trait;

/// Opens SSH or local channels, wrapped in deadlines when configured
#[derive(Debug, Clone, Default)]
pub struct DefaultConnector {
    ssh: SshConfig,
    timeouts: Timeouts,
}

impl DefaultConnector {
    pub fn new(ssh: SshConfig, timeouts: Timeouts) -> Self {
        Self { ssh, timeouts }
    }

    /// Build a connector from the application configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.ssh.clone(), Timeouts::from(&config.timeouts))
    }
}

#[async_trait]
impl Connector for DefaultConnector {
    async fn connect(&self, target: &TargetMachine) -> ExtsyncResult<Box<dyn RemoteChannel>> {
        let channel: Box<dyn RemoteChannel> = match target.transport {
            Transport::Local => Box::new(LocalChannel::new()),
            Transport::Ssh => {
                let connect = SshChannel::connect(target.clone(), self.ssh.clone());
                Box::new(with_deadline(&target.host, "connect", self.timeouts.connect, connect).await?)
            }
        };

        if self.timeouts.is_unbounded() {
            Ok(channel)
        } else {
            Ok(Box::new(TimeoutChannel::new(channel, self.timeouts)))
        }
    }
}
