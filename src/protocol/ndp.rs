//! Router Advertisement value object - RFC 4861 section 4.2
//!
//! Options consumed read-only: SLLA, Prefix Information, MTU, RDNSS/DNSSL
//! (RFC 8106), PREF64 (RFC 8781) and PvD (RFC 8801).

use super::icmpv6::{
    link_layer_option, split_options, Icmpv6Type, NdpOptionType, RawNdpOption, RA_MSG_SIZE,
};
use super::{Ipv6Prefix, MacAddr};
use crate::{Error, Result};
use std::net::Ipv6Addr;
use std::time::{Duration, Instant};
use tracing::debug;

/// Lifetime value meaning "infinity" for prefix and DNS options
pub const INFINITE_LIFETIME: u32 = 0xFFFF_FFFF;

/// Router lifetime reported as "maximum" in telemetry
pub const MAX_ROUTER_LIFETIME: u16 = 0xFFFF;

/// Default router preference (RFC 4191 section 2.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RouterPreference {
    #[default]
    Medium,
    High,
    Low,
    Reserved,
}

impl RouterPreference {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0b00 => RouterPreference::Medium,
            0b01 => RouterPreference::High,
            0b11 => RouterPreference::Low,
            _ => RouterPreference::Reserved,
        }
    }

    fn to_bits(self) -> u8 {
        match self {
            RouterPreference::Medium => 0b00,
            RouterPreference::High => 0b01,
            RouterPreference::Low => 0b11,
            RouterPreference::Reserved => 0b10,
        }
    }
}

/// RA header flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RaFlags {
    /// M: addresses available via DHCPv6
    pub managed: bool,
    /// O: other configuration available via DHCPv6
    pub other: bool,
    pub home_agent: bool,
    pub proxy: bool,
    pub preference: RouterPreference,
}

impl RaFlags {
    fn from_byte(b: u8) -> Self {
        Self {
            managed: b & 0x80 != 0,
            other: b & 0x40 != 0,
            home_agent: b & 0x20 != 0,
            preference: RouterPreference::from_bits(b >> 3),
            proxy: b & 0x04 != 0,
        }
    }

    fn to_byte(self) -> u8 {
        let mut b = self.preference.to_bits() << 3;
        if self.managed {
            b |= 0x80;
        }
        if self.other {
            b |= 0x40;
        }
        if self.home_agent {
            b |= 0x20;
        }
        if self.proxy {
            b |= 0x04;
        }
        b
    }
}

/// Prefix Information option
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixInformation {
    pub prefix: Ipv6Prefix,
    pub on_link: bool,
    pub autonomous: bool,
    pub valid_lifetime: u32,
    pub preferred_lifetime: u32,
}

/// Merged RDNSS options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rdnss {
    pub servers: Vec<Ipv6Addr>,
    pub lifetime: u32,
}

/// Merged DNSSL options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dnssl {
    pub domains: Vec<String>,
    pub lifetime: u32,
}

/// PREF64 option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pref64 {
    pub prefix: Ipv6Prefix,
    /// Seconds (scaled lifetime x 8)
    pub lifetime: u32,
}

/// PvD option header fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PvdOption {
    pub id: String,
    pub sequence: u16,
    /// H: additional information available over HTTPS
    pub http: bool,
    pub legacy: bool,
    /// R: an RA header is embedded in the option
    pub embedded_ra: bool,
    /// Delay nibble used to spread additional-information fetches
    pub delay: u8,
}

/// One decoded RA option
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RaOption {
    SourceLinkAddr(MacAddr),
    Prefix(PrefixInformation),
    Mtu(u32),
    Rdnss(Rdnss),
    Dnssl(Dnssl),
    Pref64(Pref64),
    Pvd(PvdOption),
    Unknown(u8),
}

fn be_u16(b: &[u8]) -> u16 {
    u16::from_be_bytes([b[0], b[1]])
}

fn be_u32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

fn ipv6_at(b: &[u8]) -> Ipv6Addr {
    let mut octets = [0u8; 16];
    octets.copy_from_slice(&b[..16]);
    Ipv6Addr::from(octets)
}

/// Decode one domain name in DNS label format; returns the name and bytes consumed
fn parse_domain_name(buf: &[u8]) -> Result<(String, usize)> {
    let mut labels = Vec::new();
    let mut offset = 0;
    loop {
        let len = *buf
            .get(offset)
            .ok_or_else(|| Error::InvalidPacket("unterminated domain name".into()))?
            as usize;
        offset += 1;
        if len == 0 {
            break;
        }
        if len > 63 || offset + len > buf.len() {
            return Err(Error::InvalidPacket("bad domain label".into()));
        }
        labels.push(String::from_utf8_lossy(&buf[offset..offset + len]).into_owned());
        offset += len;
    }
    Ok((labels.join("."), offset))
}

fn encode_domain_name(name: &str, out: &mut Vec<u8>) {
    for label in name.split('.').filter(|l| !l.is_empty()) {
        out.push(label.len() as u8);
        out.extend_from_slice(label.as_bytes());
    }
    out.push(0);
}

fn pref64_len_from_plc(plc: u8) -> Option<u8> {
    match plc {
        0 => Some(96),
        1 => Some(64),
        2 => Some(56),
        3 => Some(48),
        4 => Some(40),
        5 => Some(32),
        _ => None,
    }
}

fn pref64_plc_from_len(len: u8) -> u8 {
    match len {
        64 => 1,
        56 => 2,
        48 => 3,
        40 => 4,
        32 => 5,
        _ => 0,
    }
}

impl RaOption {
    /// Decode a raw option; `data` excludes the type/length octets
    pub fn parse(raw: &RawNdpOption<'_>) -> Result<Self> {
        let data = raw.data;
        let too_short = |what: &str| Error::InvalidPacket(format!("{} option too short", what));

        let Some(kind) = NdpOptionType::from_u8(raw.kind) else {
            return Ok(RaOption::Unknown(raw.kind));
        };

        match kind {
            NdpOptionType::SourceLinkLayerAddress => {
                if data.len() < 6 {
                    return Err(too_short("source link-layer address"));
                }
                let mut mac = [0u8; 6];
                mac.copy_from_slice(&data[..6]);
                Ok(RaOption::SourceLinkAddr(MacAddr(mac)))
            }
            NdpOptionType::PrefixInformation => {
                if data.len() < 30 {
                    return Err(too_short("prefix information"));
                }
                Ok(RaOption::Prefix(PrefixInformation {
                    prefix: Ipv6Prefix::new(ipv6_at(&data[14..30]), data[0]),
                    on_link: data[1] & 0x80 != 0,
                    autonomous: data[1] & 0x40 != 0,
                    valid_lifetime: be_u32(&data[2..6]),
                    preferred_lifetime: be_u32(&data[6..10]),
                }))
            }
            NdpOptionType::Mtu => {
                if data.len() < 6 {
                    return Err(too_short("MTU"));
                }
                Ok(RaOption::Mtu(be_u32(&data[2..6])))
            }
            NdpOptionType::Rdnss => {
                // Length must be 3 + 2n in units of 8 bytes
                if data.len() < 22 || (data.len() - 6) % 16 != 0 {
                    return Err(too_short("RDNSS"));
                }
                let servers = data[6..].chunks_exact(16).map(ipv6_at).collect();
                Ok(RaOption::Rdnss(Rdnss {
                    servers,
                    lifetime: be_u32(&data[2..6]),
                }))
            }
            NdpOptionType::Dnssl => {
                if data.len() < 14 {
                    return Err(too_short("DNSSL"));
                }
                let mut domains = Vec::new();
                let mut rest = &data[6..];
                while !rest.is_empty() {
                    if rest[0] == 0 {
                        // Trailing padding
                        rest = &rest[1..];
                        continue;
                    }
                    let (name, used) = parse_domain_name(rest)?;
                    domains.push(name);
                    rest = &rest[used..];
                }
                Ok(RaOption::Dnssl(Dnssl {
                    domains,
                    lifetime: be_u32(&data[2..6]),
                }))
            }
            NdpOptionType::Pref64 => {
                if data.len() < 14 {
                    return Err(too_short("PREF64"));
                }
                let field = be_u16(&data[0..2]);
                let len = pref64_len_from_plc((field & 0x07) as u8).ok_or_else(|| {
                    Error::InvalidPacket(format!("PREF64 bad prefix length code {}", field & 0x07))
                })?;
                let mut octets = [0u8; 16];
                octets[..12].copy_from_slice(&data[2..14]);
                Ok(RaOption::Pref64(Pref64 {
                    prefix: Ipv6Prefix::new(Ipv6Addr::from(octets), len),
                    lifetime: u32::from(field >> 3) * 8,
                }))
            }
            NdpOptionType::Pvd => {
                if data.len() < 5 {
                    return Err(too_short("PvD"));
                }
                let flags = be_u16(&data[0..2]);
                let (id, _) = parse_domain_name(&data[4..])?;
                Ok(RaOption::Pvd(PvdOption {
                    id,
                    sequence: be_u16(&data[2..4]),
                    http: flags & 0x8000 != 0,
                    legacy: flags & 0x4000 != 0,
                    embedded_ra: flags & 0x2000 != 0,
                    delay: (flags & 0x000F) as u8,
                }))
            }
            NdpOptionType::TargetLinkLayerAddress => Ok(RaOption::Unknown(raw.kind)),
        }
    }
}

/// Immutable snapshot of one received Router Advertisement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterAdvertisement {
    source: Ipv6Addr,
    received_at: Instant,
    cur_hop_limit: u8,
    flags: RaFlags,
    router_lifetime: u16,
    reachable_time: u32,
    retrans_timer: u32,
    prefixes: Vec<PrefixInformation>,
    rdnss: Option<Rdnss>,
    dnssl: Option<Dnssl>,
    pref64: Option<Pref64>,
    pvd: Option<PvdOption>,
    mtu: Option<u32>,
    source_link_addr: Option<MacAddr>,
}

impl RouterAdvertisement {
    /// Parse a full ICMPv6 Router Advertisement received from `source`
    pub fn parse(source: Ipv6Addr, received_at: Instant, buffer: &[u8]) -> Result<Self> {
        if buffer.len() < RA_MSG_SIZE {
            return Err(Error::Parse("Router Advertisement too short".into()));
        }
        if buffer[0] != Icmpv6Type::RouterAdvertisement as u8 {
            return Err(Error::InvalidPacket(format!(
                "expected Router Advertisement, got type {}",
                buffer[0]
            )));
        }

        let mut ra = Self {
            source,
            received_at,
            cur_hop_limit: buffer[4],
            flags: RaFlags::from_byte(buffer[5]),
            router_lifetime: be_u16(&buffer[6..8]),
            reachable_time: be_u32(&buffer[8..12]),
            retrans_timer: be_u32(&buffer[12..16]),
            prefixes: Vec::new(),
            rdnss: None,
            dnssl: None,
            pref64: None,
            pvd: None,
            mtu: None,
            source_link_addr: None,
        };

        for raw in split_options(&buffer[RA_MSG_SIZE..])? {
            let option = match RaOption::parse(&raw) {
                Ok(option) => option,
                Err(e) => {
                    debug!(%source, kind = raw.kind, error = %e, "ignoring malformed RA option");
                    continue;
                }
            };
            match option {
                RaOption::SourceLinkAddr(mac) => ra.source_link_addr = Some(mac),
                RaOption::Prefix(p) => ra.prefixes.push(p),
                RaOption::Mtu(mtu) => ra.mtu = Some(mtu),
                RaOption::Rdnss(r) => match &mut ra.rdnss {
                    Some(existing) => {
                        for s in r.servers {
                            if !existing.servers.contains(&s) {
                                existing.servers.push(s);
                            }
                        }
                        existing.lifetime = existing.lifetime.min(r.lifetime);
                    }
                    None => ra.rdnss = Some(r),
                },
                RaOption::Dnssl(d) => match &mut ra.dnssl {
                    Some(existing) => {
                        for name in d.domains {
                            if !existing.domains.contains(&name) {
                                existing.domains.push(name);
                            }
                        }
                        existing.lifetime = existing.lifetime.min(d.lifetime);
                    }
                    None => ra.dnssl = Some(d),
                },
                RaOption::Pref64(p) => {
                    if ra.pref64.is_none() {
                        ra.pref64 = Some(p);
                    }
                }
                RaOption::Pvd(p) => {
                    if ra.pvd.is_none() {
                        ra.pvd = Some(p);
                    }
                }
                RaOption::Unknown(_) => {}
            }
        }

        Ok(ra)
    }

    pub fn source(&self) -> Ipv6Addr {
        self.source
    }

    pub fn received_at(&self) -> Instant {
        self.received_at
    }

    pub fn cur_hop_limit(&self) -> u8 {
        self.cur_hop_limit
    }

    pub fn flags(&self) -> RaFlags {
        self.flags
    }

    pub fn router_lifetime(&self) -> u16 {
        self.router_lifetime
    }

    pub fn reachable_time(&self) -> u32 {
        self.reachable_time
    }

    pub fn retrans_timer(&self) -> u32 {
        self.retrans_timer
    }

    pub fn prefixes(&self) -> &[PrefixInformation] {
        &self.prefixes
    }

    pub fn rdnss(&self) -> Option<&Rdnss> {
        self.rdnss.as_ref()
    }

    pub fn dnssl(&self) -> Option<&Dnssl> {
        self.dnssl.as_ref()
    }

    pub fn pref64(&self) -> Option<&Pref64> {
        self.pref64.as_ref()
    }

    pub fn pvd(&self) -> Option<&PvdOption> {
        self.pvd.as_ref()
    }

    pub fn mtu(&self) -> Option<u32> {
        self.mtu
    }

    pub fn source_link_addr(&self) -> Option<MacAddr> {
        self.source_link_addr
    }

    fn lifetime_deadline(&self, lifetime: u32) -> Option<Instant> {
        match lifetime {
            0 => Some(self.received_at),
            INFINITE_LIFETIME => None,
            secs => Some(self.received_at + Duration::from_secs(u64::from(secs))),
        }
    }

    fn lifetime_live(&self, lifetime: u32, now: Instant) -> bool {
        self.lifetime_deadline(lifetime)
            .is_none_or(|deadline| now < deadline)
    }

    /// RDNSS servers still within their lifetime
    pub fn dns_servers(&self, now: Instant) -> &[Ipv6Addr] {
        match &self.rdnss {
            Some(r) if self.lifetime_live(r.lifetime, now) => &r.servers,
            _ => &[],
        }
    }

    /// DNSSL domains still within their lifetime
    pub fn dns_domains(&self, now: Instant) -> &[String] {
        match &self.dnssl {
            Some(d) if self.lifetime_live(d.lifetime, now) => &d.domains,
            _ => &[],
        }
    }

    /// Earliest future expiry of the advertised DNS records
    pub fn dns_expiration(&self) -> Option<Instant> {
        let rdnss = self
            .rdnss
            .as_ref()
            .filter(|r| r.lifetime != 0)
            .and_then(|r| self.lifetime_deadline(r.lifetime));
        let dnssl = self
            .dnssl
            .as_ref()
            .filter(|d| d.lifetime != 0)
            .and_then(|d| self.lifetime_deadline(d.lifetime));
        match (rdnss, dnssl) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn dns_expired(&self, now: Instant) -> bool {
        self.dns_expiration().is_some_and(|e| now >= e)
    }

    /// PREF64 if advertised with a lifetime that has not run out
    pub fn active_pref64(&self, now: Instant) -> Option<&Pref64> {
        self.pref64
            .as_ref()
            .filter(|p| p.lifetime != 0 && self.lifetime_live(p.lifetime, now))
    }
}

/// Builds Router Advertisement wire bytes
#[derive(Debug, Clone, Default)]
pub struct RouterAdvertisementBuilder {
    cur_hop_limit: u8,
    flags: RaFlags,
    router_lifetime: u16,
    options: Vec<u8>,
}

impl RouterAdvertisementBuilder {
    pub fn new(router_lifetime: u16) -> Self {
        Self {
            cur_hop_limit: 64,
            router_lifetime,
            ..Default::default()
        }
    }

    pub fn managed(mut self, on: bool) -> Self {
        self.flags.managed = on;
        self
    }

    pub fn other(mut self, on: bool) -> Self {
        self.flags.other = on;
        self
    }

    pub fn source_link_addr(mut self, mac: MacAddr) -> Self {
        self.options.extend_from_slice(&link_layer_option(
            NdpOptionType::SourceLinkLayerAddress,
            &mac,
        ));
        self
    }

    pub fn prefix(mut self, prefix: Ipv6Prefix, valid: u32, preferred: u32) -> Self {
        let o = &mut self.options;
        o.extend_from_slice(&[NdpOptionType::PrefixInformation as u8, 4, prefix.len(), 0xC0]);
        o.extend_from_slice(&valid.to_be_bytes());
        o.extend_from_slice(&preferred.to_be_bytes());
        o.extend_from_slice(&[0; 4]);
        o.extend_from_slice(&prefix.addr().octets());
        self
    }

    pub fn mtu(mut self, mtu: u32) -> Self {
        self.options
            .extend_from_slice(&[NdpOptionType::Mtu as u8, 1, 0, 0]);
        self.options.extend_from_slice(&mtu.to_be_bytes());
        self
    }

    pub fn rdnss(mut self, servers: &[Ipv6Addr], lifetime: u32) -> Self {
        let o = &mut self.options;
        o.extend_from_slice(&[NdpOptionType::Rdnss as u8, (1 + 2 * servers.len()) as u8, 0, 0]);
        o.extend_from_slice(&lifetime.to_be_bytes());
        for s in servers {
            o.extend_from_slice(&s.octets());
        }
        self
    }

    pub fn dnssl(mut self, domains: &[&str], lifetime: u32) -> Self {
        let mut names = Vec::new();
        for d in domains {
            encode_domain_name(d, &mut names);
        }
        let total = (8 + names.len()).div_ceil(8) * 8;
        names.resize(total - 8, 0);

        let o = &mut self.options;
        o.extend_from_slice(&[NdpOptionType::Dnssl as u8, (total / 8) as u8, 0, 0]);
        o.extend_from_slice(&lifetime.to_be_bytes());
        o.extend_from_slice(&names);
        self
    }

    pub fn pref64(mut self, prefix: Ipv6Prefix, lifetime: u32) -> Self {
        let scaled = (lifetime / 8).min(0x1FFF) as u16;
        let field = (scaled << 3) | u16::from(pref64_plc_from_len(prefix.len()));
        let o = &mut self.options;
        o.extend_from_slice(&[NdpOptionType::Pref64 as u8, 2]);
        o.extend_from_slice(&field.to_be_bytes());
        o.extend_from_slice(&prefix.addr().octets()[..12]);
        self
    }

    pub fn pvd(mut self, id: &str, sequence: u16, http: bool, delay: u8) -> Self {
        let mut body = Vec::new();
        let mut flags = u16::from(delay & 0x0F);
        if http {
            flags |= 0x8000;
        }
        body.extend_from_slice(&flags.to_be_bytes());
        body.extend_from_slice(&sequence.to_be_bytes());
        encode_domain_name(id, &mut body);
        let total = (2 + body.len()).div_ceil(8) * 8;
        body.resize(total - 2, 0);

        self.options
            .extend_from_slice(&[NdpOptionType::Pvd as u8, (total / 8) as u8]);
        self.options.extend_from_slice(&body);
        self
    }

    /// ICMPv6 message bytes, checksum left zero
    pub fn build(&self) -> Vec<u8> {
        let mut buf = vec![0u8; RA_MSG_SIZE];
        buf[0] = Icmpv6Type::RouterAdvertisement as u8;
        buf[4] = self.cur_hop_limit;
        buf[5] = self.flags.to_byte();
        buf[6..8].copy_from_slice(&self.router_lifetime.to_be_bytes());
        buf.extend_from_slice(&self.options);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> Ipv6Addr {
        "fe80::1".parse().unwrap()
    }

    #[test]
    fn test_parse_basic_ra() {
        let now = Instant::now();
        let bytes = RouterAdvertisementBuilder::new(1800)
            .other(true)
            .source_link_addr(MacAddr([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]))
            .prefix(
                Ipv6Prefix::new("2001:db8::".parse().unwrap(), 64),
                2592000,
                604800,
            )
            .mtu(1500)
            .build();

        let ra = RouterAdvertisement::parse(router(), now, &bytes).unwrap();
        assert_eq!(ra.source(), router());
        assert_eq!(ra.router_lifetime(), 1800);
        assert!(!ra.flags().managed);
        assert!(ra.flags().other);
        assert_eq!(ra.mtu(), Some(1500));
        assert_eq!(
            ra.source_link_addr(),
            Some(MacAddr([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]))
        );
        assert_eq!(ra.prefixes().len(), 1);
        let p = &ra.prefixes()[0];
        assert_eq!(p.prefix.to_string(), "2001:db8::/64");
        assert!(p.on_link && p.autonomous);
        assert_eq!(p.valid_lifetime, 2592000);
        assert_eq!(p.preferred_lifetime, 604800);
    }

    #[test]
    fn test_flags_byte() {
        let flags = RaFlags::from_byte(0x80 | 0x08 | 0x04);
        assert!(flags.managed);
        assert!(!flags.other);
        assert!(flags.proxy);
        assert_eq!(flags.preference, RouterPreference::High);
        assert_eq!(flags.to_byte(), 0x8C);
    }

    #[test]
    fn test_rdnss_dnssl_and_expiration() {
        let now = Instant::now();
        let dns: Ipv6Addr = "2001:4860:4860::8888".parse().unwrap();
        let bytes = RouterAdvertisementBuilder::new(1800)
            .rdnss(&[dns], 300)
            .dnssl(&["example.com", "corp.example.net"], 600)
            .build();

        let ra = RouterAdvertisement::parse(router(), now, &bytes).unwrap();
        assert_eq!(ra.dns_servers(now), &[dns]);
        assert_eq!(
            ra.dns_domains(now),
            &["example.com".to_string(), "corp.example.net".to_string()]
        );
        assert_eq!(ra.dns_expiration(), Some(now + Duration::from_secs(300)));
        assert!(!ra.dns_expired(now + Duration::from_secs(299)));
        assert!(ra.dns_expired(now + Duration::from_secs(300)));
        assert!(ra.dns_servers(now + Duration::from_secs(301)).is_empty());
        // DNSSL outlives RDNSS
        assert_eq!(ra.dns_domains(now + Duration::from_secs(301)).len(), 2);
    }

    #[test]
    fn test_multiple_rdnss_merge() {
        let now = Instant::now();
        let a: Ipv6Addr = "2001:db8::53".parse().unwrap();
        let b: Ipv6Addr = "2001:db8::54".parse().unwrap();
        let bytes = RouterAdvertisementBuilder::new(600)
            .rdnss(&[a], 1200)
            .rdnss(&[a, b], 900)
            .build();

        let ra = RouterAdvertisement::parse(router(), now, &bytes).unwrap();
        let rdnss = ra.rdnss().unwrap();
        assert_eq!(rdnss.servers, vec![a, b]);
        assert_eq!(rdnss.lifetime, 900);
    }

    #[test]
    fn test_infinite_dns_lifetime_never_expires() {
        let now = Instant::now();
        let bytes = RouterAdvertisementBuilder::new(600)
            .rdnss(&["2001:db8::53".parse().unwrap()], INFINITE_LIFETIME)
            .build();
        let ra = RouterAdvertisement::parse(router(), now, &bytes).unwrap();
        assert_eq!(ra.dns_expiration(), None);
        assert!(!ra.dns_expired(now + Duration::from_secs(86400 * 365)));
    }

    #[test]
    fn test_pref64() {
        let now = Instant::now();
        let nat64 = Ipv6Prefix::new("64:ff9b::".parse().unwrap(), 96);
        let bytes = RouterAdvertisementBuilder::new(1800)
            .pref64(nat64, 1800)
            .build();

        let ra = RouterAdvertisement::parse(router(), now, &bytes).unwrap();
        let pref64 = ra.pref64().unwrap();
        assert_eq!(pref64.prefix, nat64);
        assert_eq!(pref64.lifetime, 1800);
        assert!(ra.active_pref64(now).is_some());
        assert!(ra.active_pref64(now + Duration::from_secs(1800)).is_none());
    }

    #[test]
    fn test_pref64_short_prefix_code() {
        let now = Instant::now();
        let prefix = Ipv6Prefix::new("2001:db8:6400::".parse().unwrap(), 48);
        let bytes = RouterAdvertisementBuilder::new(1800)
            .pref64(prefix, 600)
            .build();
        let ra = RouterAdvertisement::parse(router(), now, &bytes).unwrap();
        assert_eq!(ra.pref64().unwrap().prefix.len(), 48);
    }

    #[test]
    fn test_pvd_option() {
        let now = Instant::now();
        let bytes = RouterAdvertisementBuilder::new(1800)
            .pvd("pvd.example.com", 7, true, 3)
            .build();

        let ra = RouterAdvertisement::parse(router(), now, &bytes).unwrap();
        let pvd = ra.pvd().unwrap();
        assert_eq!(pvd.id, "pvd.example.com");
        assert_eq!(pvd.sequence, 7);
        assert!(pvd.http);
        assert!(!pvd.embedded_ra);
        assert_eq!(pvd.delay, 3);
    }

    #[test]
    fn test_parse_rejects_wrong_type() {
        let mut bytes = RouterAdvertisementBuilder::new(1800).build();
        bytes[0] = 133;
        assert!(RouterAdvertisement::parse(router(), Instant::now(), &bytes).is_err());
    }

    #[test]
    fn test_parse_rejects_truncated_option() {
        let mut bytes = RouterAdvertisementBuilder::new(1800).build();
        bytes.extend_from_slice(&[25, 3, 0, 0]);
        assert!(RouterAdvertisement::parse(router(), Instant::now(), &bytes).is_err());
    }

    #[test]
    fn test_malformed_pref64_ignored_not_ra() {
        let mut bytes = RouterAdvertisementBuilder::new(1800)
            .prefix(Ipv6Prefix::new("2001:db8:1::".parse().unwrap(), 64), 86400, 14400)
            .build();
        // PREF64 with reserved prefix length code 7
        bytes.extend_from_slice(&[NdpOptionType::Pref64 as u8, 2, 0x07, 0x0F]);
        bytes.extend_from_slice(&[0x00, 0x64, 0xff, 0x9b, 0, 0, 0, 0, 0, 0, 0, 0]);

        let ra = RouterAdvertisement::parse(router(), Instant::now(), &bytes).unwrap();
        assert_eq!(ra.router_lifetime(), 1800);
        assert_eq!(ra.prefixes().len(), 1);
        assert!(ra.pref64().is_none());
    }

    #[test]
    fn test_unknown_option_skipped() {
        let mut bytes = RouterAdvertisementBuilder::new(1800).build();
        bytes.extend_from_slice(&[200, 1, 0, 0, 0, 0, 0, 0]);
        let ra = RouterAdvertisement::parse(router(), Instant::now(), &bytes).unwrap();
        assert!(ra.prefixes().is_empty());
    }
}
