//! Interface selection and default-gateway discovery.

use std::net::{IpAddr, Ipv4Addr};

use pcap::Device;
use tracing::{debug, info};

use crate::error::StartupError;

/// The parts of a pcap device that matter for picking a default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub up: bool,
    pub running: bool,
    pub loopback: bool,
}

impl From<&Device> for Candidate {
    fn from(dev: &Device) -> Self {
        Self {
            name: dev.name.clone(),
            up: dev.flags.is_up(),
            running: dev.flags.is_running(),
            loopback: dev.flags.is_loopback(),
        }
    }
}

/// Resolve the capture interface: the requested one, else libpcap's default
/// device, else the first working non-loopback device, else the first device.
pub fn resolve_interface(requested: Option<&str>) -> Result<String, StartupError> {
    if let Some(name) = requested {
        return Ok(name.to_string());
    }

    match Device::lookup() {
        Ok(Some(dev)) => {
            info!("using default capture device {}", dev.name);
            return Ok(dev.name);
        }
        Ok(None) => debug!("libpcap reported no default device"),
        Err(e) => debug!("default device lookup failed: {}", e),
    }

    let devices = Device::list().map_err(StartupError::Discovery)?;
    let candidates: Vec<Candidate> = devices.iter().map(Candidate::from).collect();
    let names: Vec<&str> = candidates.iter().map(|c| c.name.as_str()).collect();
    debug!("available interfaces: {}", names.join(", "));

    choose_default(&candidates)
        .map(|c| c.name.clone())
        .ok_or(StartupError::NoInterface)
}

pub fn choose_default(candidates: &[Candidate]) -> Option<&Candidate> {
    candidates
        .iter()
        .find(|c| c.up && c.running && !c.loopback)
        .or_else(|| candidates.first())
}

/// The IPv4 default gateway, if the platform exposes it.
pub fn default_gateway() -> Option<IpAddr> {
    #[cfg(target_os = "linux")]
    {
        let table = std::fs::read_to_string("/proc/net/route").ok()?;
        parse_proc_route(&table).map(IpAddr::V4)
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

const RTF_GATEWAY: u32 = 0x2;

/// Parse `/proc/net/route`: the first default route (destination 0) with the
/// gateway flag. Addresses are little-endian hex.
pub fn parse_proc_route(table: &str) -> Option<Ipv4Addr> {
    table.lines().skip(1).find_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            return None;
        }
        let dest = u32::from_str_radix(fields[1], 16).ok()?;
        let gateway = u32::from_str_radix(fields[2], 16).ok()?;
        let flags = u32::from_str_radix(fields[3], 16).ok()?;
        (dest == 0 && flags & RTF_GATEWAY != 0).then(|| Ipv4Addr::from(gateway.to_le_bytes()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(name: &str, up: bool, running: bool, loopback: bool) -> Candidate {
        Candidate {
            name: name.into(),
            up,
            running,
            loopback,
        }
    }

    #[test]
    fn test_requested_interface_wins() {
        assert_eq!(resolve_interface(Some("wlan0")).unwrap(), "wlan0");
    }

    #[test]
    fn test_choose_default_prefers_working_interface() {
        let list = vec![
            cand("lo", true, true, true),
            cand("eth0", true, false, false),
            cand("wlan0", true, true, false),
        ];
        assert_eq!(choose_default(&list).unwrap().name, "wlan0");
    }

    #[test]
    fn test_choose_default_falls_back_to_first() {
        let list = vec![cand("lo", true, true, true), cand("eth0", false, false, false)];
        assert_eq!(choose_default(&list).unwrap().name, "lo");
        assert!(choose_default(&[]).is_none());
    }

    #[test]
    fn test_parse_proc_route() {
        let table = "Iface\tDestination\tGateway \tFlags\tRefCnt\tUse\tMetric\tMask\t\tMTU\tWindow\tIRTT\n\
                     eth0\t0000A8C0\t00000000\t0001\t0\t0\t0\t00FFFFFF\t0\t0\t0\n\
                     eth0\t00000000\t0100A8C0\t0003\t0\t0\t100\t00000000\t0\t0\t0\n";
        assert_eq!(parse_proc_route(table), Some(Ipv4Addr::new(192, 168, 0, 1)));
    }

    #[test]
    fn test_parse_proc_route_without_default() {
        let table = "Iface\tDestination\tGateway \tFlags\n\
                     eth0\t0000A8C0\t00000000\t0001\n";
        assert_eq!(parse_proc_route(table), None);
        assert_eq!(parse_proc_route(""), None);
    }
}
