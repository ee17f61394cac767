//! ICMPv6 framing for Router Discovery - RFC 4861 section 4.1/4.2

use super::MacAddr;
use crate::{Error, Result};

/// Minimum ICMPv6 header size (type, code, checksum)
pub const MIN_HEADER_SIZE: usize = 4;

/// Router Solicitation message size without options
pub const RS_MSG_SIZE: usize = 8;

/// Router Advertisement message size without options
pub const RA_MSG_SIZE: usize = 16;

/// ICMPv6 message types used by router discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Icmpv6Type {
    RouterSolicitation = 133,
    RouterAdvertisement = 134,
    NeighborSolicitation = 135,
    NeighborAdvertisement = 136,
    Redirect = 137,
}

impl Icmpv6Type {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            133 => Some(Icmpv6Type::RouterSolicitation),
            134 => Some(Icmpv6Type::RouterAdvertisement),
            135 => Some(Icmpv6Type::NeighborSolicitation),
            136 => Some(Icmpv6Type::NeighborAdvertisement),
            137 => Some(Icmpv6Type::Redirect),
            _ => None,
        }
    }
}

/// NDP option types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NdpOptionType {
    SourceLinkLayerAddress = 1,
    TargetLinkLayerAddress = 2,
    PrefixInformation = 3,
    Mtu = 5,
    /// Provisioning Domain (RFC 8801)
    Pvd = 21,
    /// Recursive DNS Server (RFC 8106)
    Rdnss = 25,
    /// DNS Search List (RFC 8106)
    Dnssl = 31,
    /// NAT64 prefix (RFC 8781)
    Pref64 = 38,
}

impl NdpOptionType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(NdpOptionType::SourceLinkLayerAddress),
            2 => Some(NdpOptionType::TargetLinkLayerAddress),
            3 => Some(NdpOptionType::PrefixInformation),
            5 => Some(NdpOptionType::Mtu),
            21 => Some(NdpOptionType::Pvd),
            25 => Some(NdpOptionType::Rdnss),
            31 => Some(NdpOptionType::Dnssl),
            38 => Some(NdpOptionType::Pref64),
            _ => None,
        }
    }
}

/// Parsed ICMPv6 header (zero-copy reference)
#[derive(Debug)]
pub struct Icmpv6Packet<'a> {
    buffer: &'a [u8],
}

impl<'a> Icmpv6Packet<'a> {
    pub fn parse(buffer: &'a [u8]) -> Result<Self> {
        if buffer.len() < MIN_HEADER_SIZE {
            return Err(Error::Parse("ICMPv6 packet too short".into()));
        }

        Ok(Self { buffer })
    }

    /// Message type
    pub fn msg_type(&self) -> u8 {
        self.buffer[0]
    }

    /// Message code
    pub fn code(&self) -> u8 {
        self.buffer[1]
    }

    /// Message body (after header)
    pub fn body(&self) -> &[u8] {
        &self.buffer[MIN_HEADER_SIZE..]
    }
}

/// One raw option from an NDP option area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawNdpOption<'a> {
    pub kind: u8,
    /// Option bytes after the type/length octets
    pub data: &'a [u8],
}

/// Split an NDP option area into raw options.
///
/// A zero length or an option running past the buffer rejects the whole
/// message (RFC 4861 section 4.6).
pub fn split_options(mut options: &[u8]) -> Result<Vec<RawNdpOption<'_>>> {
    let mut out = Vec::new();
    while !options.is_empty() {
        if options.len() < 2 {
            return Err(Error::InvalidPacket("truncated NDP option header".into()));
        }
        let opt_len = options[1] as usize * 8;
        if opt_len == 0 {
            return Err(Error::InvalidPacket("NDP option with zero length".into()));
        }
        if opt_len > options.len() {
            return Err(Error::InvalidPacket(format!(
                "NDP option type {} truncated ({} > {})",
                options[0],
                opt_len,
                options.len()
            )));
        }
        out.push(RawNdpOption {
            kind: options[0],
            data: &options[2..opt_len],
        });
        options = &options[opt_len..];
    }
    Ok(out)
}

/// Build a link-layer address option, padded to an 8-byte boundary
pub fn link_layer_option(kind: NdpOptionType, mac: &MacAddr) -> Vec<u8> {
    let unpadded = 2 + mac.0.len();
    let padded = unpadded.div_ceil(8) * 8;
    let mut opt = vec![0u8; padded];
    opt[0] = kind as u8;
    opt[1] = (padded / 8) as u8;
    opt[2..unpadded].copy_from_slice(&mac.0);
    opt
}

/// Router Solicitation message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterSolicitation {
    pub source_link_addr: Option<MacAddr>,
}

impl RouterSolicitation {
    pub fn new(source_link_addr: Option<MacAddr>) -> Self {
        Self { source_link_addr }
    }

    /// Parse from a full ICMPv6 message
    pub fn parse(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < RS_MSG_SIZE {
            return Err(Error::Parse("Router Solicitation too short".into()));
        }
        if buffer[0] != Icmpv6Type::RouterSolicitation as u8 {
            return Err(Error::InvalidPacket(format!(
                "expected Router Solicitation, got type {}",
                buffer[0]
            )));
        }

        let mut source_link_addr = None;
        for opt in split_options(&buffer[RS_MSG_SIZE..])? {
            if opt.kind == NdpOptionType::SourceLinkLayerAddress as u8 && opt.data.len() >= 6 {
                let mut mac = [0u8; 6];
                mac.copy_from_slice(&opt.data[..6]);
                source_link_addr = Some(MacAddr(mac));
            }
        }
        Ok(Self { source_link_addr })
    }

    /// Build RS message bytes (ICMPv6 payload, checksum left for the kernel)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; RS_MSG_SIZE];

        // Type
        buf[0] = Icmpv6Type::RouterSolicitation as u8;
        // Code, checksum and reserved stay zero

        if let Some(mac) = &self.source_link_addr {
            buf.extend_from_slice(&link_layer_option(
                NdpOptionType::SourceLinkLayerAddress,
                mac,
            ));
        }

        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icmpv6_type_from_u8() {
        assert_eq!(
            Icmpv6Type::from_u8(133),
            Some(Icmpv6Type::RouterSolicitation)
        );
        assert_eq!(
            Icmpv6Type::from_u8(134),
            Some(Icmpv6Type::RouterAdvertisement)
        );
        assert_eq!(Icmpv6Type::from_u8(128), None);
    }

    #[test]
    fn test_ndp_option_type_from_u8() {
        assert_eq!(NdpOptionType::from_u8(25), Some(NdpOptionType::Rdnss));
        assert_eq!(NdpOptionType::from_u8(38), Some(NdpOptionType::Pref64));
        assert_eq!(NdpOptionType::from_u8(21), Some(NdpOptionType::Pvd));
        assert_eq!(NdpOptionType::from_u8(99), None);
    }

    #[test]
    fn test_icmpv6_parse_too_short() {
        assert!(Icmpv6Packet::parse(&[134, 0, 0]).is_err());
    }

    #[test]
    fn test_rs_without_option() {
        let bytes = RouterSolicitation::new(None).to_bytes();
        assert_eq!(bytes, vec![133, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_rs_with_source_link_addr() {
        let mac = MacAddr([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        let bytes = RouterSolicitation::new(Some(mac)).to_bytes();

        assert_eq!(bytes.len(), 16);
        assert_eq!(bytes[0], 133);
        assert_eq!(bytes[1], 0);
        assert_eq!(&bytes[4..8], &[0, 0, 0, 0]);
        assert_eq!(bytes[8], 1); // Option type
        assert_eq!(bytes[9], 1); // Length in units of 8 bytes
        assert_eq!(&bytes[10..16], &mac.0);

        let parsed = RouterSolicitation::parse(&bytes).unwrap();
        assert_eq!(parsed.source_link_addr, Some(mac));
    }

    #[test]
    fn test_split_options_zero_length() {
        let options = [0x01, 0x00, 0, 0, 0, 0, 0, 0];
        assert!(split_options(&options).is_err());
    }

    #[test]
    fn test_split_options_truncated() {
        let options = [0x01, 0x02, 0x00, 0x11, 0x22, 0x33];
        assert!(split_options(&options).is_err());
    }

    #[test]
    fn test_split_multiple_options() {
        let options = [
            // MTU = 1500
            0x05, 0x01, 0x00, 0x00, 0x00, 0x00, 0x05, 0xDC, //
            // Source Link-Layer Address
            0x01, 0x01, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66,
        ];
        let opts = split_options(&options).unwrap();
        assert_eq!(opts.len(), 2);
        assert_eq!(opts[0].kind, 5);
        assert_eq!(opts[1].kind, 1);
        assert_eq!(opts[1].data, &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
    }
}
