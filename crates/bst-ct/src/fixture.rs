//! Per-run test fixture: topology, agent process and endpoint discovery.

use std::path::Path;
use std::process::Child;
use std::time::Duration;

use thiserror::Error;

use bst_sim::process;
use bst_sim::{Network, SingleSwitchTopo, TopologyError};

use crate::config::{ConfigError, Platform, ServerDetails};
use crate::ifconfig;

/// Port the agent listens on inside the virtual switch.
pub const VIRTUAL_AGENT_PORT: u16 = 8080;

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error("no network: setup_net() was not called")]
    NoNetwork,
    #[error("no IPv4 address on {iface}: {output:?}")]
    NoAddress { iface: String, output: String },
}

pub struct BstTest {
    config: ServerDetails,
    platform: Platform,
    net: Option<Network>,
    agent: Option<Child>,
    agent_pid: Option<u32>,
    ip_address: Option<String>,
    port: Option<u16>,
}

impl BstTest {
    pub fn new(config: ServerDetails) -> Result<Self, FixtureError> {
        let platform = config.platform()?;
        Ok(Self {
            config,
            platform,
            net: None,
            agent: None,
            agent_pid: None,
            ip_address: None,
            port: None,
        })
    }

    pub fn from_file(path: &Path, section: &str) -> Result<Self, FixtureError> {
        Self::new(ServerDetails::load(path, section)?)
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn config(&self) -> &ServerDetails {
        &self.config
    }

    pub fn agent_pid(&self) -> Option<u32> {
        self.agent_pid
    }

    /// Build the single-switch topology. No-op on a physical platform.
    pub fn setup_net(&mut self) -> Result<(), FixtureError> {
        if self.platform == Platform::Virtual {
            self.net = Some(SingleSwitchTopo::new(1).build()?);
        }
        Ok(())
    }

    /// Resolve where the agent answers.
    pub fn get_switch_ip(&mut self) -> Result<(String, u16), FixtureError> {
        let (ip, port) = match self.platform {
            Platform::Virtual => {
                let net = self.net.as_ref().ok_or(FixtureError::NoNetwork)?;
                let iface = self.config.switch_interface();
                let output = net
                    .switch()
                    .cmd(&format!("ifconfig {iface} 2>/dev/null || ip -4 addr show {iface}"))?;
                let ip = ifconfig::parse_ipv4(&output).ok_or_else(|| FixtureError::NoAddress {
                    iface: iface.to_string(),
                    output: output.clone(),
                })?;
                (ip.to_string(), VIRTUAL_AGENT_PORT)
            }
            Platform::Physical => (
                self.config.agent_server_ip().to_string(),
                self.config.agent_server_port()?,
            ),
        };
        tracing::info!(platform = ?self.platform, ip_address = %ip, port, "agent endpoint");
        self.ip_address = Some(ip.clone());
        self.port = Some(port);
        Ok((ip, port))
    }

    /// Launch the agent in the switch and record its pid. No-op on a
    /// physical platform, where the agent is already running.
    pub async fn start_agent(&mut self) -> Result<(), FixtureError> {
        if self.platform != Platform::Virtual {
            return Ok(());
        }
        let net = self.net.as_ref().ok_or(FixtureError::NoNetwork)?;
        let binary = self.config.agent_binary();
        let wait = self.config.agent_ready_wait()?;

        tracing::info!(binary, "starting agent");
        self.agent = Some(net.switch().popen(binary, &[])?);
        tokio::time::sleep(wait).await;

        let name = Path::new(binary)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(binary);
        self.agent_pid = net.switch().pgrep(name)?;
        match self.agent_pid {
            Some(pid) => tracing::info!(pid, "agent running"),
            None => tracing::warn!(name, "agent pid not found (no or several matches)"),
        }
        Ok(())
    }

    /// Terminate the agent started by [`BstTest::start_agent`].
    pub fn stop_agent(&mut self) {
        if let Some(pid) = self.agent_pid.take() {
            match process::terminate(pid) {
                Ok(()) => tracing::info!(pid, "agent stopped"),
                Err(e) => tracing::warn!(pid, error = %e, "cannot stop agent"),
            }
        }
        if let Some(mut child) = self.agent.take() {
            if let Err(e) = process::reap(&mut child, Duration::from_secs(5)) {
                tracing::warn!(error = %e, "cannot reap agent launcher");
            }
        }
    }

    /// Stop the agent, then the network. Safe to call more than once.
    pub fn teardown(&mut self) {
        self.stop_agent();
        if let Some(mut net) = self.net.take() {
            net.stop();
        }
    }
}

impl Drop for BstTest {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SECTION;

    fn fixture(ini: &str) -> BstTest {
        BstTest::new(ServerDetails::parse(ini, DEFAULT_SECTION).unwrap()).unwrap()
    }

    #[test]
    fn physical_platform_uses_configured_endpoint() {
        let mut test = fixture("[server_details]\nswitch_type=as5712\nagent_server_ip=10.1.1.1\n");
        test.setup_net().unwrap();
        assert_eq!(test.get_switch_ip().unwrap(), ("10.1.1.1".to_string(), 8080));
        test.teardown();
        assert_eq!(test.agent_pid(), None);
    }

    #[tokio::test]
    async fn physical_platform_does_not_launch_agent() {
        let mut test = fixture("[server_details]\nswitch_type=as5712\n");
        test.start_agent().await.unwrap();
        assert_eq!(test.agent_pid(), None);
    }

    #[test]
    fn virtual_platform_needs_network() {
        let mut test = fixture("[server_details]\nswitch_type=\n");
        assert_eq!(test.platform(), Platform::Virtual);
        assert!(matches!(test.get_switch_ip(), Err(FixtureError::NoNetwork)));
    }

    /// Writes a stand-in agent: a shell script that sleeps until SIGTERM.
    /// Kept under 15 characters so pgrep matches its name.
    fn stand_in_agent() -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = std::env::temp_dir().join(format!("bstag{:x}", std::process::id() % 0xFFFF));
        std::fs::write(&path, "#!/bin/sh\ntrap 'kill $!; exit 0' TERM\nsleep 30 &\nwait\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn virtual_platform_agent_lifecycle() {
        if !bst_sim::check_privileges() {
            eprintln!("Skipping test, insufficient privileges or missing tools");
            return;
        }
        let agent = stand_in_agent();
        let mut test = fixture(&format!(
            "[server_details]\nswitch_type=\nagent_binary={}\nagent_ready_wait_secs=1\n",
            agent.display()
        ));
        test.setup_net().unwrap();
        let (ip, port) = test.get_switch_ip().unwrap();
        assert_eq!(ip, "10.250.0.2");
        assert_eq!(port, VIRTUAL_AGENT_PORT);

        test.start_agent().await.unwrap();
        let pid = test.agent_pid().expect("stand-in agent not found by pgrep");
        assert!(Path::new(&format!("/proc/{pid}")).exists());

        test.teardown();
        assert_eq!(test.agent_pid(), None);
        let proc_dir = format!("/proc/{pid}");
        let mut gone = false;
        for _ in 0..20 {
            if !Path::new(&proc_dir).exists() {
                gone = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(100));
        }
        assert!(gone, "agent {pid} still running after teardown");
        let _ = std::fs::remove_file(agent);
    }

    #[test]
    fn unknown_platform_is_rejected() {
        let details = ServerDetails::parse("[server_details]\nswitch_type=as9999\n", DEFAULT_SECTION)
            .unwrap();
        assert!(matches!(
            BstTest::new(details),
            Err(FixtureError::Config(ConfigError::UnknownPlatform(_)))
        ));
    }
}
