//! IPv4 address extraction from `ifconfig <iface>` output.

use std::net::Ipv4Addr;

/// First IPv4 address in `ifconfig` output.
///
/// Accepts both the net-tools 1.x form (`inet addr:10.0.0.2  Bcast:...`)
/// and the 2.x form (`inet 10.0.0.2  netmask ...`). `inet6` lines are
/// skipped. `ip addr` output (`inet 10.0.0.2/24 ...`) parses too.
pub fn parse_ipv4(output: &str) -> Option<Ipv4Addr> {
    output.lines().find_map(|line| {
        let mut tokens = line.split_whitespace();
        while let Some(token) = tokens.next() {
            if token != "inet" {
                continue;
            }
            let addr = tokens.next()?;
            let addr = addr.strip_prefix("addr:").unwrap_or(addr);
            return addr.split('/').next()?.parse().ok();
        }
        None
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const NET_TOOLS_1: &str = "\
eth0      Link encap:Ethernet  HWaddr 02:42:ac:11:00:02
          inet addr:172.17.0.2  Bcast:0.0.0.0  Mask:255.255.0.0
          inet6 addr: fe80::42:acff:fe11:2/64 Scope:Link
          UP BROADCAST RUNNING MULTICAST  MTU:1500  Metric:1
";

    const NET_TOOLS_2: &str = "\
eth0: flags=4163<UP,BROADCAST,RUNNING,MULTICAST>  mtu 1500
        inet6 fe80::4c1e:2ff:fe3a:1/64  prefixlen 64  scopeid 0x20<link>
        inet 10.250.0.2  netmask 255.255.255.0  broadcast 0.0.0.0
        ether 4e:1e:02:3a:00:01  txqueuelen 1000  (Ethernet)
";

    #[test]
    fn both_ifconfig_formats() {
        assert_eq!(parse_ipv4(NET_TOOLS_1), Some(Ipv4Addr::new(172, 17, 0, 2)));
        assert_eq!(parse_ipv4(NET_TOOLS_2), Some(Ipv4Addr::new(10, 250, 0, 2)));
    }

    #[test]
    fn ip_addr_output() {
        let out = "3: eth0@if4: <BROADCAST,UP> mtu 1500\n    inet 10.250.0.2/24 scope global eth0\n";
        assert_eq!(parse_ipv4(out), Some(Ipv4Addr::new(10, 250, 0, 2)));
    }

    #[test]
    fn no_ipv4_address() {
        assert_eq!(parse_ipv4("eth0: flags=4098<BROADCAST,MULTICAST>  mtu 1500\n"), None);
        assert_eq!(parse_ipv4(""), None);
    }
}
