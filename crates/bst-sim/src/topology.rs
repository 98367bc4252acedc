//! Linux network namespaces and the single-switch topology.
//!
//! Every node is a namespace managed via `ip netns`. The switch node gets a
//! management interface `eth0` linked to the root namespace, so processes
//! on the host can reach the agent running inside the switch.

use std::net::Ipv4Addr;
use std::process::{Child, Command, Output, Stdio};

use thiserror::Error;

use crate::process;

#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("{what} failed: {stderr}")]
    Command { what: String, stderr: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Whether `ip netns` is usable, i.e. namespaces can be created.
pub fn check_privileges() -> bool {
    match Command::new("ip").arg("netns").output() {
        Ok(o) => o.status.success(),
        Err(_) => false,
    }
}

fn sudo(what: &str, args: &[&str]) -> Result<Output, TopologyError> {
    checked(what, Command::new("sudo").args(args).output()?)
}

fn checked(what: &str, output: Output) -> Result<Output, TopologyError> {
    if output.status.success() {
        Ok(output)
    } else {
        Err(TopologyError::Command {
            what: what.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

// ── Namespace ───────────────────────────────────────────────────────

/// A Linux network namespace managed via `ip netns`.
///
/// Created with loopback up, deleted on drop.
pub struct Namespace {
    pub name: String,
}

impl Namespace {
    pub fn new(name: &str) -> Result<Self, TopologyError> {
        // cleanup any existing namespace with the same name
        let _ = Command::new("sudo")
            .args(["ip", "netns", "del", name])
            .output();

        sudo("create netns", &["ip", "netns", "add", name])?;
        let ns = Self {
            name: name.to_string(),
        };
        ns.ip("loopback up", &["link", "set", "lo", "up"])?;
        Ok(ns)
    }

    pub fn exec(&self, cmd: &str, args: &[&str]) -> Result<Output, std::io::Error> {
        Command::new("sudo")
            .args(["ip", "netns", "exec", &self.name, cmd])
            .args(args)
            .output()
    }

    fn ip(&self, what: &str, args: &[&str]) -> Result<(), TopologyError> {
        checked(what, self.exec("ip", args)?).map(|_| ())
    }

    /// Move `link` from the root namespace into this one under `name`.
    fn adopt(&self, link: &str, name: &str) -> Result<(), TopologyError> {
        sudo("move veth", &["ip", "link", "set", link, "netns", &self.name])?;
        if link != name {
            self.ip("rename veth", &["link", "set", link, "name", name])?;
        }
        Ok(())
    }

    fn up(&self, link: &str, addr: Option<&str>) -> Result<(), TopologyError> {
        if let Some(addr) = addr {
            self.ip("set address", &["addr", "add", addr, "dev", link])?;
        }
        self.ip("set link up", &["link", "set", link, "up"])
    }
}

impl Drop for Namespace {
    fn drop(&mut self) {
        let _ = Command::new("sudo")
            .args(["ip", "netns", "del", &self.name])
            .status();
    }
}

/// Create a veth pair in the root namespace.
fn veth_pair(a: &str, b: &str) -> Result<(), TopologyError> {
    // Clean up potential leftovers in host
    let _ = Command::new("sudo").args(["ip", "link", "del", a]).output();
    sudo(
        "create veth pair",
        &["ip", "link", "add", a, "type", "veth", "peer", "name", b],
    )
    .map(|_| ())
}

// ── Nodes ───────────────────────────────────────────────────────────

/// A host or switch of the simulated network.
pub struct Node {
    pub name: String,
    ns: Namespace,
}

impl Node {
    fn new(name: &str, ns_name: &str) -> Result<Self, TopologyError> {
        Ok(Self {
            name: name.to_string(),
            ns: Namespace::new(ns_name)?,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.ns.name
    }

    /// Run a shell command line in the node and return its stdout.
    pub fn cmd(&self, line: &str) -> Result<String, TopologyError> {
        tracing::debug!(node = %self.name, cmd = line, "exec");
        let output = checked(line, self.ns.exec("sh", &["-c", line])?)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Start `program` in the node without waiting for it.
    pub fn popen(&self, program: &str, args: &[&str]) -> Result<Child, TopologyError> {
        tracing::info!(node = %self.name, program, "starting process");
        let child = Command::new("sudo")
            .args(["ip", "netns", "exec", &self.ns.name, program])
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        Ok(child)
    }

    /// Pid of the single process named `name` in the node, if exactly one runs.
    pub fn pgrep(&self, name: &str) -> Result<Option<u32>, TopologyError> {
        // pgrep exits 1 when nothing matches
        let output = self.ns.exec("pgrep", &[name])?;
        Ok(process::parse_pgrep(&String::from_utf8_lossy(&output.stdout)))
    }
}

// ── Single switch topology ──────────────────────────────────────────

/// One switch with `k` hosts attached, plus a management link from the root
/// namespace to the switch's `eth0`.
#[derive(Debug, Clone)]
pub struct SingleSwitchTopo {
    pub k: u32,
    /// Prefix for namespace and root-side link names; at most 9 characters.
    pub prefix: String,
    /// Management subnet `/24`; the root side takes `.1`, the switch `.2`.
    pub mgmt_subnet: Ipv4Addr,
}

impl Default for SingleSwitchTopo {
    fn default() -> Self {
        Self {
            k: 1,
            prefix: "bst".into(),
            mgmt_subnet: Ipv4Addr::new(10, 250, 0, 0),
        }
    }
}

impl SingleSwitchTopo {
    pub fn new(k: u32) -> Self {
        Self {
            k,
            ..Self::default()
        }
    }

    fn mgmt_addr(&self, host: u8) -> String {
        let [a, b, c, _] = self.mgmt_subnet.octets();
        format!("{a}.{b}.{c}.{host}/24")
    }

    pub fn build(&self) -> Result<Network, TopologyError> {
        let p = &self.prefix;
        let switch = Node::new("s1", &format!("{p}-s1"))?;

        // Management link: root side keeps its name, switch side becomes eth0.
        let mgmt_iface = format!("{p}-m0");
        let mgmt_peer = format!("{p}-m1");
        veth_pair(&mgmt_iface, &mgmt_peer)?;
        let mut network = Network {
            switch,
            hosts: Vec::new(),
            mgmt_iface: mgmt_iface.clone(),
            stopped: false,
        };
        sudo(
            "set management address",
            &["ip", "addr", "add", &self.mgmt_addr(1), "dev", &mgmt_iface],
        )?;
        sudo("set management up", &["ip", "link", "set", &mgmt_iface, "up"])?;
        network.switch.ns.adopt(&mgmt_peer, "eth0")?;
        network.switch.ns.up("eth0", Some(&self.mgmt_addr(2)))?;

        // Data plane: hosts bridged inside the switch.
        network.switch.ns.ip("create bridge", &["link", "add", "br0", "type", "bridge"])?;
        network.switch.ns.up("br0", None)?;
        for i in 1..=self.k {
            let host = Node::new(&format!("h{i}"), &format!("{p}-h{i}"))?;
            let host_side = format!("{p}h{i}");
            let switch_side = format!("{p}s{i}");
            veth_pair(&host_side, &switch_side)?;
            host.ns.adopt(&host_side, &format!("h{i}-eth0"))?;
            host.ns
                .up(&format!("h{i}-eth0"), Some(&format!("10.0.0.{i}/8")))?;
            let port = format!("s1-eth{i}");
            network.switch.ns.adopt(&switch_side, &port)?;
            network
                .switch
                .ns
                .ip("attach port", &["link", "set", &port, "master", "br0"])?;
            network.switch.ns.up(&port, None)?;
            network.hosts.push(host);
        }

        tracing::info!(
            switch = network.switch.namespace(),
            hosts = network.hosts.len(),
            mgmt = %self.mgmt_addr(2),
            "topology built"
        );
        Ok(network)
    }
}

/// A built topology. Namespaces and the management link are removed by
/// [`Network::stop`] or on drop.
pub struct Network {
    switch: Node,
    hosts: Vec<Node>,
    mgmt_iface: String,
    stopped: bool,
}

impl Network {
    pub fn switch(&self) -> &Node {
        &self.switch
    }

    pub fn hosts(&self) -> &[Node] {
        &self.hosts
    }

    /// Tear down the management link. Namespaces go when the network drops.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        let _ = Command::new("sudo")
            .args(["ip", "link", "del", &self.mgmt_iface])
            .status();
        tracing::info!(switch = self.switch.namespace(), "topology stopped");
    }
}

impl Drop for Network {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::unique_prefix;

    #[test]
    fn test_create_namespace() {
        if !check_privileges() {
            eprintln!("Skipping test, insufficient privileges or missing tools");
            return;
        }

        let name = unique_prefix("bns");
        let ns = Namespace::new(&name).expect("Failed to create ns");
        let out = ns.exec("ip", &["link"]).expect("Failed to exec ip link");
        assert!(String::from_utf8_lossy(&out.stdout).contains("lo"));
    }

    #[test]
    fn test_single_switch_topology() {
        if !check_privileges() {
            eprintln!("Skipping test, insufficient privileges or missing tools");
            return;
        }

        let topo = SingleSwitchTopo {
            k: 2,
            prefix: unique_prefix("bt"),
            mgmt_subnet: Ipv4Addr::new(10, 251, 7, 0),
        };
        let net = topo.build().expect("Failed to build topology");
        assert_eq!(net.hosts().len(), 2);

        let eth0 = net.switch().cmd("ip -4 addr show eth0").unwrap();
        assert!(eth0.contains("10.251.7.2"));

        let out = Command::new("ping")
            .args(["-c", "1", "-W", "1", "10.251.7.2"])
            .output()
            .expect("Failed to exec ping");
        assert!(out.status.success(), "switch not reachable over management link");

        let h1 = &net.hosts()[0];
        let ping = h1.cmd("ping -c 1 -W 1 10.0.0.2");
        assert!(ping.is_ok(), "hosts not bridged: {:?}", ping.err());
    }

    #[test]
    fn test_pgrep_in_node() {
        if !check_privileges() {
            eprintln!("Skipping test, insufficient privileges or missing tools");
            return;
        }

        let topo = SingleSwitchTopo {
            k: 0,
            prefix: unique_prefix("bp"),
            mgmt_subnet: Ipv4Addr::new(10, 251, 8, 0),
        };
        let net = topo.build().expect("Failed to build topology");
        assert_eq!(net.switch().pgrep("no-such-binary").unwrap(), None);
    }
}
