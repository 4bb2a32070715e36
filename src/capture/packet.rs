//! Packet classification: link-layer frame → (destination, protocol, port).
//!
//! Only the IP and transport headers are looked at. Anything that is not
//! TCP or UDP over an enabled IP version yields `None`.

use std::net::IpAddr;

use pnet_packet::ethernet::{EtherType, EtherTypes, EthernetPacket};
use pnet_packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use pnet_packet::ipv4::Ipv4Packet;
use pnet_packet::ipv6::Ipv6Packet;
use pnet_packet::tcp::TcpPacket;
use pnet_packet::udp::UdpPacket;

use crate::aggregate::{IpVersion, Protocol};

const ETHERNET_HEADER_LEN: usize = 14;
const VLAN_TAG_LEN: usize = 4;
const SLL_HEADER_LEN: usize = 16;
const SLL2_HEADER_LEN: usize = 20;
/// BSD loopback: 4-byte address family
const NULL_HEADER_LEN: usize = 4;
/// IPv6 fixed header
const IPV6_HEADER_LEN: usize = 40;
const MAX_IPV6_EXTENSIONS: usize = 8;

/// Link-layer framing of captured data, from the pcap DLT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkLayer {
    Ethernet,
    LinuxSll,
    LinuxSll2,
    /// DLT_NULL / DLT_LOOP
    Loopback,
    /// Bare IP, version taken from the first nibble
    RawIp,
    Ipv4,
    Ipv6,
    Unsupported(i32),
}

impl LinkLayer {
    pub fn from_dlt(dlt: i32) -> Self {
        match dlt {
            1 => LinkLayer::Ethernet,
            0 | 108 => LinkLayer::Loopback,
            12 | 14 | 101 => LinkLayer::RawIp,
            113 => LinkLayer::LinuxSll,
            228 => LinkLayer::Ipv4,
            229 => LinkLayer::Ipv6,
            276 => LinkLayer::LinuxSll2,
            other => LinkLayer::Unsupported(other),
        }
    }
}

/// What a single packet contributes to the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub version: IpVersion,
    pub src: IpAddr,
    pub dst: IpAddr,
    pub protocol: Protocol,
    pub port: u16,
}

/// Classify one captured frame. IPv4 is considered only when `ipv4` is set,
/// IPv6 only when `ipv6` is set.
pub fn classify(link: LinkLayer, data: &[u8], ipv4: bool, ipv6: bool) -> Option<Observation> {
    let ip_data = network_layer(link, data)?;
    let (src, dst, next, payload) = match ip_data.first()? >> 4 {
        4 if ipv4 => parse_ip4_header(ip_data)?,
        6 if ipv6 => parse_ip6_header(ip_data)?,
        _ => return None,
    };

    let (protocol, port) = match next {
        IpNextHeaderProtocols::Tcp => (Protocol::Tcp, TcpPacket::new(payload)?.get_destination()),
        IpNextHeaderProtocols::Udp => (Protocol::Udp, UdpPacket::new(payload)?.get_destination()),
        _ => return None,
    };

    Some(Observation {
        version: IpVersion::of(&dst),
        src,
        dst,
        protocol,
        port,
    })
}

/// Strip the link-layer header, returning the IP packet.
fn network_layer(link: LinkLayer, data: &[u8]) -> Option<&[u8]> {
    match link {
        LinkLayer::Ethernet => {
            let eth = EthernetPacket::new(data)?;
            let mut offset = ETHERNET_HEADER_LEN;
            let mut ethertype = eth.get_ethertype();
            if ethertype == EtherTypes::Vlan {
                let tag = data.get(offset..offset + VLAN_TAG_LEN)?;
                ethertype = EtherType(u16::from_be_bytes([tag[2], tag[3]]));
                offset += VLAN_TAG_LEN;
            }
            ip_ethertype(ethertype)?;
            data.get(offset..)
        }
        LinkLayer::LinuxSll => {
            let proto = data.get(14..16)?;
            ip_ethertype(EtherType(u16::from_be_bytes([proto[0], proto[1]])))?;
            data.get(SLL_HEADER_LEN..)
        }
        LinkLayer::LinuxSll2 => {
            let proto = data.get(0..2)?;
            ip_ethertype(EtherType(u16::from_be_bytes([proto[0], proto[1]])))?;
            data.get(SLL2_HEADER_LEN..)
        }
        LinkLayer::Loopback => data.get(NULL_HEADER_LEN..),
        LinkLayer::RawIp | LinkLayer::Ipv4 | LinkLayer::Ipv6 => Some(data),
        LinkLayer::Unsupported(_) => None,
    }
}

fn ip_ethertype(ethertype: EtherType) -> Option<()> {
    (ethertype == EtherTypes::Ipv4 || ethertype == EtherTypes::Ipv6).then_some(())
}

/// Extract addresses and the transport payload from an IPv4 packet.
/// Non-first fragments carry no transport header and are skipped.
fn parse_ip4_header(data: &[u8]) -> Option<(IpAddr, IpAddr, IpNextHeaderProtocol, &[u8])> {
    let ipv4 = Ipv4Packet::new(data)?;
    if ipv4.get_fragment_offset() != 0 {
        return None;
    }
    let header_len = ipv4.get_header_length() as usize * 4;
    Some((
        IpAddr::V4(ipv4.get_source()),
        IpAddr::V4(ipv4.get_destination()),
        ipv4.get_next_level_protocol(),
        data.get(header_len..)?,
    ))
}

/// Extract addresses and the transport payload from an IPv6 packet, stepping
/// over any extension headers in front of the transport header.
fn parse_ip6_header(data: &[u8]) -> Option<(IpAddr, IpAddr, IpNextHeaderProtocol, &[u8])> {
    let ipv6 = Ipv6Packet::new(data)?;
    let (next, payload) = skip_ip6_extensions(ipv6.get_next_header(), data.get(IPV6_HEADER_LEN..)?)?;
    Some((
        IpAddr::V6(ipv6.get_source()),
        IpAddr::V6(ipv6.get_destination()),
        next,
        payload,
    ))
}

fn skip_ip6_extensions(
    mut next: IpNextHeaderProtocol,
    mut data: &[u8],
) -> Option<(IpNextHeaderProtocol, &[u8])> {
    for _ in 0..MAX_IPV6_EXTENSIONS {
        let len = match next {
            IpNextHeaderProtocols::Hopopt
            | IpNextHeaderProtocols::Ipv6Route
            | IpNextHeaderProtocols::Ipv6Opts => (usize::from(*data.get(1)?) + 1) * 8,
            IpNextHeaderProtocols::Ipv6Frag => {
                // Non-first fragments carry no transport header.
                let offset = u16::from_be_bytes([*data.get(2)?, *data.get(3)?]) >> 3;
                if offset != 0 {
                    return None;
                }
                8
            }
            IpNextHeaderProtocols::Ah => (usize::from(*data.get(1)?) + 2) * 4,
            _ => return Some((next, data)),
        };
        next = IpNextHeaderProtocol::new(*data.first()?);
        data = data.get(len..)?;
    }
    None
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    const TCP: u8 = 6;
    const UDP: u8 = 17;
    const ICMP: u8 = 1;

    fn transport(proto: u8, dst_port: u16) -> Vec<u8> {
        let mut t = vec![0u8; if proto == TCP { 20 } else { 8 }];
        t[0..2].copy_from_slice(&40000u16.to_be_bytes());
        t[2..4].copy_from_slice(&dst_port.to_be_bytes());
        if proto == TCP {
            t[12] = 5 << 4;
        } else {
            t[4..6].copy_from_slice(&8u16.to_be_bytes());
        }
        t
    }

    pub(crate) fn ipv4_packet(src: Ipv4Addr, dst: Ipv4Addr, proto: u8, dst_port: u16) -> Vec<u8> {
        let payload = transport(proto, dst_port);
        let mut p = vec![0u8; 20];
        p[0] = 0x45;
        p[2..4].copy_from_slice(&((20 + payload.len()) as u16).to_be_bytes());
        p[8] = 64;
        p[9] = proto;
        p[12..16].copy_from_slice(&src.octets());
        p[16..20].copy_from_slice(&dst.octets());
        p.extend(payload);
        p
    }

    pub(crate) fn ipv6_packet(src: Ipv6Addr, dst: Ipv6Addr, proto: u8, dst_port: u16) -> Vec<u8> {
        let payload = transport(proto, dst_port);
        let mut p = vec![0u8; 40];
        p[0] = 0x60;
        p[4..6].copy_from_slice(&(payload.len() as u16).to_be_bytes());
        p[6] = proto;
        p[7] = 64;
        p[8..24].copy_from_slice(&src.octets());
        p[24..40].copy_from_slice(&dst.octets());
        p.extend(payload);
        p
    }

    pub(crate) fn ethernet(ethertype: u16, ip: Vec<u8>) -> Vec<u8> {
        let mut f = vec![0xaa; 12];
        f.extend(ethertype.to_be_bytes());
        f.extend(ip);
        f
    }

    pub(crate) fn tcp4_frame(dst: &str, port: u16) -> Vec<u8> {
        ethernet(0x0800, ipv4_packet(Ipv4Addr::new(192, 168, 1, 2), dst.parse().unwrap(), TCP, port))
    }

    pub(crate) fn udp4_frame(dst: &str, port: u16) -> Vec<u8> {
        ethernet(0x0800, ipv4_packet(Ipv4Addr::new(192, 168, 1, 2), dst.parse().unwrap(), UDP, port))
    }

    pub(crate) fn udp6_frame(dst: &str, port: u16) -> Vec<u8> {
        ethernet(0x86dd, ipv6_packet(Ipv6Addr::LOCALHOST, dst.parse().unwrap(), UDP, port))
    }

    pub(crate) fn icmp4_frame(dst: &str) -> Vec<u8> {
        let mut ip = ipv4_packet(Ipv4Addr::new(192, 168, 1, 2), dst.parse().unwrap(), ICMP, 0);
        ip.truncate(28);
        ethernet(0x0800, ip)
    }

    #[test]
    fn test_classify_tcp4_over_ethernet() {
        let obs = classify(LinkLayer::Ethernet, &tcp4_frame("10.0.0.5", 443), true, true).unwrap();
        assert_eq!(obs.version, IpVersion::V4);
        assert_eq!(obs.dst, "10.0.0.5".parse::<IpAddr>().unwrap());
        assert_eq!(obs.src, "192.168.1.2".parse::<IpAddr>().unwrap());
        assert_eq!(obs.protocol, Protocol::Tcp);
        assert_eq!(obs.port, 443);
    }

    #[test]
    fn test_classify_udp6_over_ethernet() {
        let obs = classify(LinkLayer::Ethernet, &udp6_frame("ff02::fb", 5353), true, true).unwrap();
        assert_eq!(obs.version, IpVersion::V6);
        assert_eq!(obs.protocol, Protocol::Udp);
        assert_eq!(obs.port, 5353);
    }

    #[test]
    fn test_version_flags_gate_classification() {
        assert!(classify(LinkLayer::Ethernet, &tcp4_frame("10.0.0.5", 80), false, true).is_none());
        assert!(classify(LinkLayer::Ethernet, &udp6_frame("::2", 53), true, false).is_none());
    }

    #[test]
    fn test_non_transport_packet_is_skipped() {
        assert!(classify(LinkLayer::Ethernet, &icmp4_frame("10.0.0.5"), true, true).is_none());
    }

    #[test]
    fn test_non_ip_ethertype_is_skipped() {
        let arp = ethernet(0x0806, vec![0; 28]);
        assert!(classify(LinkLayer::Ethernet, &arp, true, true).is_none());
    }

    #[test]
    fn test_vlan_tagged_frame() {
        let ip = ipv4_packet(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 9), UDP, 161);
        let mut frame = vec![0xaa; 12];
        frame.extend(0x8100u16.to_be_bytes());
        frame.extend([0x00, 0x0a, 0x08, 0x00]);
        frame.extend(ip);
        let obs = classify(LinkLayer::Ethernet, &frame, true, true).unwrap();
        assert_eq!(obs.port, 161);
    }

    #[test]
    fn test_raw_ip_and_sll() {
        let ip = ipv4_packet(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(8, 8, 8, 8), UDP, 53);
        let obs = classify(LinkLayer::RawIp, &ip, true, true).unwrap();
        assert_eq!(obs.dst, "8.8.8.8".parse::<IpAddr>().unwrap());

        let mut sll = vec![0u8; 14];
        sll.extend(0x0800u16.to_be_bytes());
        sll.extend(ip);
        assert_eq!(classify(LinkLayer::LinuxSll, &sll, true, true).unwrap().port, 53);
    }

    #[test]
    fn test_truncated_frames_do_not_panic() {
        let frame = tcp4_frame("10.0.0.5", 443);
        for len in 0..frame.len() {
            let _ = classify(LinkLayer::Ethernet, &frame[..len], true, true);
        }
        assert!(classify(LinkLayer::Unsupported(147), &frame, true, true).is_none());
    }

    /// Splice `ext` between the IPv6 fixed header and the transport header.
    fn with_ip6_extension(mut ip: Vec<u8>, first: u8, ext: &[u8]) -> Vec<u8> {
        ip[6] = first;
        ip.splice(40..40, ext.iter().copied());
        ip
    }

    #[test]
    fn test_ipv6_extension_headers_are_skipped() {
        let dst: Ipv6Addr = "2001:db8::5".parse().unwrap();
        let tcp = ipv6_packet(Ipv6Addr::LOCALHOST, dst, TCP, 443);

        // Hop-by-Hop, then a 16-byte Destination Options header, then TCP.
        let mut ext = vec![60, 0, 0, 0, 0, 0, 0, 0];
        ext.extend([TCP, 1]);
        ext.extend([0u8; 14]);
        let ip = with_ip6_extension(tcp.clone(), 0, &ext);
        let obs = classify(LinkLayer::RawIp, &ip, true, true).unwrap();
        assert_eq!(obs.dst, IpAddr::V6(dst));
        assert_eq!((obs.protocol, obs.port), (Protocol::Tcp, 443));

        let routing = [TCP, 0, 0, 0, 0, 0, 0, 0];
        let ip = with_ip6_extension(tcp, 43, &routing);
        assert_eq!(classify(LinkLayer::RawIp, &ip, true, true).unwrap().port, 443);
    }

    #[test]
    fn test_ipv6_fragments() {
        let udp = ipv6_packet(Ipv6Addr::LOCALHOST, "2001:db8::9".parse().unwrap(), UDP, 53);

        let first = [UDP, 0, 0x00, 0x01, 0, 0, 0, 1];
        let ip = with_ip6_extension(udp.clone(), 44, &first);
        assert_eq!(classify(LinkLayer::RawIp, &ip, true, true).unwrap().port, 53);

        let later = [UDP, 0, 0x00, 0x08, 0, 0, 0, 1];
        let ip = with_ip6_extension(udp, 44, &later);
        assert!(classify(LinkLayer::RawIp, &ip, true, true).is_none());
    }

    #[test]
    fn test_truncated_ipv6_extension_does_not_panic() {
        let udp = ipv6_packet(Ipv6Addr::LOCALHOST, "::2".parse().unwrap(), UDP, 53);
        let mut ip = with_ip6_extension(udp, 0, &[UDP, 4, 0, 0, 0, 0, 0, 0]);
        ip.truncate(50);
        assert!(classify(LinkLayer::RawIp, &ip, true, true).is_none());
    }

    #[test]
    fn test_from_dlt() {
        assert_eq!(LinkLayer::from_dlt(1), LinkLayer::Ethernet);
        assert_eq!(LinkLayer::from_dlt(113), LinkLayer::LinuxSll);
        assert_eq!(LinkLayer::from_dlt(0), LinkLayer::Loopback);
        assert_eq!(LinkLayer::from_dlt(9999), LinkLayer::Unsupported(9999));
    }
}
