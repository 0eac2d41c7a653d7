// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Port numbering, port feature/config/state bitmasks, and the physical
//! port codec.
//!
//! Internally every port lives in the 16-bit 1.0 number space.  OpenFlow
//! 1.1 widened ports to 32 bits, keeping 0..0xff00 and moving the named
//! ports to the top of the 32-bit range at a fixed offset; the
//! conversions here apply that remapping and reject the hole in the
//! middle.

use crate::cursor::{LengthError, Reader};
use crate::error::OfpErr;
use crate::header::{OFP10_VERSION, OFP11_VERSION, OFP12_VERSION};
use crate::msg::MsgBuf;
use crate::ratelimit::warn_rl;
use arrayvec::ArrayString;
use flow::Mac;

/// Maximum number of physical ports (named ports live above this).
pub const OFPP_MAX: u16 = 0xff00;
/// Send the packet out its ingress port.
pub const OFPP_IN_PORT: u16 = 0xfff8;
/// Submit to the flow table (packet-out only).
pub const OFPP_TABLE: u16 = 0xfff9;
/// Process with normal L2/L3 switching.
pub const OFPP_NORMAL: u16 = 0xfffa;
/// Flood along the spanning tree.
pub const OFPP_FLOOD: u16 = 0xfffb;
/// All ports except ingress.
pub const OFPP_ALL: u16 = 0xfffc;
/// Send to the controller.
pub const OFPP_CONTROLLER: u16 = 0xfffd;
/// The local networking stack port.
pub const OFPP_LOCAL: u16 = 0xfffe;
/// Wildcard / "no port" value.
pub const OFPP_NONE: u16 = 0xffff;

/// First named port in the 1.1 32-bit space.
pub const OFPP11_MAX: u32 = 0xffff_ff00;
/// Offset between the 1.0 and 1.1 named-port values.
pub const OFPP11_OFFSET: u32 = 0xffff_0000;

/// Size of a 1.0 physical-port description on the wire.
pub const OFP10_PHY_PORT_LEN: usize = 48;
/// Size of a 1.1/1.2 port description on the wire.
pub const OFP11_PORT_LEN: usize = 64;

const PORT_NAME_LEN: usize = 16;

/// Converts a 1.1+ 32-bit port number into the internal 16-bit space.
///
/// # Errors
///
/// Returns [`OfpErr::BadOutPort`] for numbers in the unrepresentable gap
/// between the physical range and the named-port block.
pub fn port_from_ofp11(ofp11_port: u32) -> Result<u16, OfpErr> {
    if ofp11_port < u32::from(OFPP_MAX) {
        #[allow(clippy::cast_possible_truncation)] // bounded above
        Ok(ofp11_port as u16)
    } else if ofp11_port >= OFPP11_MAX {
        #[allow(clippy::cast_possible_truncation)] // offset maps into u16
        Ok((ofp11_port - OFPP11_OFFSET) as u16)
    } else {
        warn_rl!(
            "port {ofp11_port} is outside the supported range 0 through {} or {OFPP11_MAX:#x} \
             through {:#x}",
            OFPP_MAX - 1,
            u32::MAX
        );
        Err(OfpErr::BadOutPort)
    }
}

/// Converts an internal port number to the 1.1+ 32-bit space.
#[must_use]
pub fn port_to_ofp11(port: u16) -> u32 {
    if port < OFPP_MAX {
        u32::from(port)
    } else {
        u32::from(port) + OFPP11_OFFSET
    }
}

/// Checks that `port` is a valid output port for an output action on a
/// switch with at most `max_ports` ports.
///
/// # Errors
///
/// Returns [`OfpErr::BadOutPort`] otherwise.
pub fn check_output_port(port: u16, max_ports: u16) -> Result<(), OfpErr> {
    match port {
        OFPP_IN_PORT | OFPP_TABLE | OFPP_NORMAL | OFPP_FLOOD | OFPP_ALL | OFPP_CONTROLLER
        | OFPP_NONE | OFPP_LOCAL => Ok(()),
        _ if port < max_ports => Ok(()),
        _ => Err(OfpErr::BadOutPort),
    }
}

const NAMED_PORTS: [(&str, u16); 8] = [
    ("IN_PORT", OFPP_IN_PORT),
    ("TABLE", OFPP_TABLE),
    ("NORMAL", OFPP_NORMAL),
    ("FLOOD", OFPP_FLOOD),
    ("ALL", OFPP_ALL),
    ("CONTROLLER", OFPP_CONTROLLER),
    ("LOCAL", OFPP_LOCAL),
    ("NONE", OFPP_NONE),
];

/// Parses a port number from its decimal or symbolic (e.g. `"LOCAL"`)
/// string form.
#[must_use]
pub fn port_from_string(name: &str) -> Option<u16> {
    if let Ok(n) = name.parse::<u32>() {
        return u16::try_from(n).ok().filter(|n| *n < u16::MAX);
    }
    NAMED_PORTS
        .iter()
        .find(|(n, _)| name.eq_ignore_ascii_case(n))
        .map(|(_, v)| *v)
}

/// Renders a port number, using the symbolic name for special ports.
#[must_use]
pub fn port_to_string(port: u16) -> String {
    NAMED_PORTS
        .iter()
        .find(|(_, v)| *v == port)
        .map_or_else(|| port.to_string(), |(n, _)| (*n).to_string())
}

bitflags::bitflags! {
    /// Administrative port configuration bits (internal layout; identical
    /// to the wire in both generations, masked per version).
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct PortConfig: u32 {
        /// Port is administratively down.
        const PORT_DOWN = 1 << 0;
        /// Disable 802.1D STP (1.0 only).
        const NO_STP = 1 << 1;
        /// Drop received packets.
        const NO_RECV = 1 << 2;
        /// Drop received STP packets (1.0 only).
        const NO_RECV_STP = 1 << 3;
        /// Exclude from flooding (1.0 only).
        const NO_FLOOD = 1 << 4;
        /// Drop packets forwarded to the port.
        const NO_FWD = 1 << 5;
        /// No packet-in for this port.
        const NO_PACKET_IN = 1 << 6;
    }
}

impl PortConfig {
    /// Bits OpenFlow 1.0 defines.
    pub const OFP10_ALL: PortConfig = PortConfig::all();
    /// Bits OpenFlow 1.1+ defines.
    pub const OFP11_ALL: PortConfig = PortConfig::PORT_DOWN
        .union(PortConfig::NO_RECV)
        .union(PortConfig::NO_FWD)
        .union(PortConfig::NO_PACKET_IN);

    /// The defined bits for `version`.
    #[must_use]
    pub fn version_mask(version: u8) -> PortConfig {
        if version == OFP10_VERSION { PortConfig::OFP10_ALL } else { PortConfig::OFP11_ALL }
    }
}

bitflags::bitflags! {
    /// Port state bits.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct PortState: u32 {
        /// No physical link present.
        const LINK_DOWN = 1 << 0;
        /// Blocked by 802.1D (1.1+).
        const BLOCKED = 1 << 1;
        /// Live for fast failover (1.1+).
        const LIVE = 1 << 2;
        /// 1.0 STP state field, bits 8-9.
        const STP_MASK = 3 << 8;
    }
}

impl PortState {
    /// Bits OpenFlow 1.0 defines.
    pub const OFP10_ALL: PortState = PortState::LINK_DOWN.union(PortState::STP_MASK);
    /// Bits OpenFlow 1.1+ defines.
    pub const OFP11_ALL: PortState = PortState::LINK_DOWN
        .union(PortState::BLOCKED)
        .union(PortState::LIVE);

    /// The defined bits for `version`.
    #[must_use]
    pub fn version_mask(version: u8) -> PortState {
        if version == OFP10_VERSION { PortState::OFP10_ALL } else { PortState::OFP11_ALL }
    }
}

bitflags::bitflags! {
    /// Port features in the internal layout, which matches the 1.1 wire
    /// layout.  OpenFlow 1.0 packs the medium/negotiation bits four
    /// positions lower (its bits 7-11), overlapping where 1.1 put the
    /// higher speed grades; the converters shuffle accordingly.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct PortFeatures: u32 {
        /// 10 Mb half duplex.
        const F_10MB_HD = 1 << 0;
        /// 10 Mb full duplex.
        const F_10MB_FD = 1 << 1;
        /// 100 Mb half duplex.
        const F_100MB_HD = 1 << 2;
        /// 100 Mb full duplex.
        const F_100MB_FD = 1 << 3;
        /// 1 Gb half duplex.
        const F_1GB_HD = 1 << 4;
        /// 1 Gb full duplex.
        const F_1GB_FD = 1 << 5;
        /// 10 Gb full duplex.
        const F_10GB_FD = 1 << 6;
        /// 40 Gb full duplex (1.1+).
        const F_40GB_FD = 1 << 7;
        /// 100 Gb full duplex (1.1+).
        const F_100GB_FD = 1 << 8;
        /// 1 Tb full duplex (1.1+).
        const F_1TB_FD = 1 << 9;
        /// Some other rate (1.1+).
        const F_OTHER = 1 << 10;
        /// Copper medium.
        const COPPER = 1 << 11;
        /// Fiber medium.
        const FIBER = 1 << 12;
        /// Auto-negotiation.
        const AUTONEG = 1 << 13;
        /// Pause.
        const PAUSE = 1 << 14;
        /// Asymmetric pause.
        const PAUSE_ASYM = 1 << 15;
    }
}

impl PortFeatures {
    /// Decode a 1.0 feature word: speed bits 0-6 in place, the
    /// copper/fiber/autoneg/pause block shifted up from bits 7-11.
    #[must_use]
    pub fn from_ofp10(raw: u32) -> PortFeatures {
        PortFeatures::from_bits_truncate((raw & 0x7f) | ((raw & 0xf80) << 4))
    }

    /// Encode into the 1.0 feature word, inverse of
    /// [`PortFeatures::from_ofp10`].  The 1.1-only speed grades have no
    /// 1.0 encoding and are dropped.
    #[must_use]
    pub fn to_ofp10(self) -> u32 {
        let bits = self.bits();
        (bits & 0x7f) | ((bits & 0xf800) >> 4)
    }

    /// Decode a 1.1 feature word (same layout, masked to defined bits).
    #[must_use]
    pub fn from_ofp11(raw: u32) -> PortFeatures {
        PortFeatures::from_bits_truncate(raw & 0xffff)
    }

    /// Encode into the 1.1 feature word.
    #[must_use]
    pub fn to_ofp11(self) -> u32 {
        self.bits() & 0xffff
    }

    /// The link speed in bits per second suggested by the highest speed
    /// grade present, 100 Mb/s when no grade is advertised.
    #[must_use]
    pub fn to_bps(self) -> u64 {
        if self.contains(PortFeatures::F_1TB_FD) {
            1_000_000_000_000
        } else if self.contains(PortFeatures::F_100GB_FD) {
            100_000_000_000
        } else if self.contains(PortFeatures::F_40GB_FD) {
            40_000_000_000
        } else if self.contains(PortFeatures::F_10GB_FD) {
            10_000_000_000
        } else if self.intersects(PortFeatures::F_1GB_HD | PortFeatures::F_1GB_FD) {
            1_000_000_000
        } else if self.intersects(PortFeatures::F_100MB_HD | PortFeatures::F_100MB_FD) {
            100_000_000
        } else if self.intersects(PortFeatures::F_10MB_HD | PortFeatures::F_10MB_FD) {
            10_000_000
        } else {
            100_000_000
        }
    }
}

/// A physical port description, version independent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhyPort {
    /// Port number (16-bit space).
    pub port_no: u16,
    /// Hardware address.
    pub hw_addr: Mac,
    /// Interface name.
    pub name: ArrayString<PORT_NAME_LEN>,
    /// Administrative configuration.
    pub config: PortConfig,
    /// Link state.
    pub state: PortState,
    /// Current features.
    pub curr: PortFeatures,
    /// Features being advertised.
    pub advertised: PortFeatures,
    /// Features supported.
    pub supported: PortFeatures,
    /// Features advertised by the peer.
    pub peer: PortFeatures,
    /// Current speed in kb/s.
    pub curr_speed: u32,
    /// Maximum speed in kb/s.
    pub max_speed: u32,
}

fn parse_port_name(raw: &[u8]) -> ArrayString<PORT_NAME_LEN> {
    let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
    let mut name = ArrayString::new();
    for ch in String::from_utf8_lossy(&raw[..end]).chars() {
        if name.try_push(ch).is_err() {
            break;
        }
    }
    name
}

fn put_port_name(b: &mut MsgBuf, name: &ArrayString<PORT_NAME_LEN>) {
    let bytes = name.as_bytes();
    b.put(bytes);
    b.put_zeros(PORT_NAME_LEN - bytes.len());
}

/// Parse a 1.0 physical port record.
///
/// # Errors
///
/// Returns a [`LengthError`] if fewer than 48 bytes remain.
pub fn parse_ofp10_phy_port(r: &mut Reader<'_>) -> Result<PhyPort, LengthError> {
    let port_no = r.u16()?;
    let hw_addr = r.mac()?;
    let name = parse_port_name(r.take(PORT_NAME_LEN)?);
    let config = PortConfig::from_bits_truncate(r.u32()?) & PortConfig::OFP10_ALL;
    let state = PortState::from_bits_truncate(r.u32()?) & PortState::OFP10_ALL;
    let curr = PortFeatures::from_ofp10(r.u32()?);
    let advertised = PortFeatures::from_ofp10(r.u32()?);
    let supported = PortFeatures::from_ofp10(r.u32()?);
    let peer = PortFeatures::from_ofp10(r.u32()?);
    #[allow(clippy::cast_possible_truncation)] // kb/s of a u64 bps fits
    Ok(PhyPort {
        port_no,
        hw_addr,
        name,
        config,
        state,
        curr,
        advertised,
        supported,
        peer,
        curr_speed: (curr.to_bps() / 1000) as u32,
        max_speed: (supported.to_bps() / 1000) as u32,
    })
}

/// Parse a 1.1/1.2 port record.
///
/// # Errors
///
/// Returns [`OfpErr::BadOutPort`] for an unrepresentable port number and
/// [`OfpErr::BadLen`] if fewer than 64 bytes remain.
pub fn parse_ofp11_port(r: &mut Reader<'_>) -> Result<PhyPort, OfpErr> {
    let len = |_: LengthError| OfpErr::BadLen;
    let port_no = port_from_ofp11(r.u32().map_err(len)?)?;
    r.skip(4).map_err(len)?;
    let hw_addr = r.mac().map_err(len)?;
    r.skip(2).map_err(len)?;
    let name = parse_port_name(r.take(PORT_NAME_LEN).map_err(len)?);
    let config = PortConfig::from_bits_truncate(r.u32().map_err(len)?) & PortConfig::OFP11_ALL;
    let state = PortState::from_bits_truncate(r.u32().map_err(len)?) & PortState::OFP11_ALL;
    Ok(PhyPort {
        port_no,
        hw_addr,
        name,
        config,
        state,
        curr: PortFeatures::from_ofp11(r.u32().map_err(len)?),
        advertised: PortFeatures::from_ofp11(r.u32().map_err(len)?),
        supported: PortFeatures::from_ofp11(r.u32().map_err(len)?),
        peer: PortFeatures::from_ofp11(r.u32().map_err(len)?),
        curr_speed: r.u32().map_err(len)?,
        max_speed: r.u32().map_err(len)?,
    })
}

/// Append a 1.0 physical port record.
pub fn put_ofp10_phy_port(pp: &PhyPort, b: &mut MsgBuf) {
    b.put_u16(pp.port_no);
    b.put_mac(pp.hw_addr);
    put_port_name(b, &pp.name);
    b.put_u32((pp.config & PortConfig::OFP10_ALL).bits());
    b.put_u32((pp.state & PortState::OFP10_ALL).bits());
    b.put_u32(pp.curr.to_ofp10());
    b.put_u32(pp.advertised.to_ofp10());
    b.put_u32(pp.supported.to_ofp10());
    b.put_u32(pp.peer.to_ofp10());
}

/// Append a 1.1/1.2 port record.
pub fn put_ofp11_port(pp: &PhyPort, b: &mut MsgBuf) {
    b.put_u32(port_to_ofp11(pp.port_no));
    b.put_zeros(4);
    b.put_mac(pp.hw_addr);
    b.put_zeros(2);
    put_port_name(b, &pp.name);
    b.put_u32((pp.config & PortConfig::OFP11_ALL).bits());
    b.put_u32((pp.state & PortState::OFP11_ALL).bits());
    b.put_u32(pp.curr.to_ofp11());
    b.put_u32(pp.advertised.to_ofp11());
    b.put_u32(pp.supported.to_ofp11());
    b.put_u32(pp.peer.to_ofp11());
    b.put_u32(pp.curr_speed);
    b.put_u32(pp.max_speed);
}

/// The per-version size of one port record.
#[must_use]
pub fn phy_port_len(version: u8) -> usize {
    if version == OFP10_VERSION { OFP10_PHY_PORT_LEN } else { OFP11_PORT_LEN }
}

/// Append a port record in the layout of `version`.
pub fn put_phy_port(version: u8, pp: &PhyPort, b: &mut MsgBuf) {
    if version == OFP10_VERSION {
        put_ofp10_phy_port(pp, b);
    } else {
        put_ofp11_port(pp, b);
    }
}

/// Pull the next port record off `r`, or `None` when the buffer is
/// exhausted.
///
/// # Errors
///
/// Returns an error for a malformed record; exhaustion is not an error.
pub fn pull_phy_port(version: u8, r: &mut Reader<'_>) -> Option<Result<PhyPort, OfpErr>> {
    if r.remaining() == 0 {
        return None;
    }
    Some(match version {
        OFP10_VERSION => parse_ofp10_phy_port(r).map_err(|_| OfpErr::BadLen),
        OFP11_VERSION | OFP12_VERSION => parse_ofp11_port(r),
        _ => Err(OfpErr::BadVersion),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ofp11_port_mapping() {
        assert_eq!(port_from_ofp11(5).unwrap(), 5);
        assert_eq!(port_from_ofp11(0xffff_fffe).unwrap(), OFPP_LOCAL);
        assert_eq!(port_from_ofp11(0xffff_fff8).unwrap(), OFPP_IN_PORT);
        assert_eq!(port_from_ofp11(0x0001_0000), Err(OfpErr::BadOutPort));
        assert_eq!(port_to_ofp11(7), 7);
        assert_eq!(port_to_ofp11(OFPP_CONTROLLER), 0xffff_fffd);
        for p in [0u16, 42, OFPP_MAX - 1, OFPP_IN_PORT, OFPP_NONE] {
            assert_eq!(port_from_ofp11(port_to_ofp11(p)).unwrap(), p);
        }
    }

    #[test]
    fn ofp11_port_mapping_total_on_u16() {
        bolero::check!().with_type().cloned().for_each(|port: u16| {
            assert_eq!(port_from_ofp11(port_to_ofp11(port)), Ok(port));
        });
    }

    #[test]
    fn output_port_check() {
        assert!(check_output_port(OFPP_FLOOD, 16).is_ok());
        assert!(check_output_port(3, 16).is_ok());
        assert_eq!(check_output_port(16, 16), Err(OfpErr::BadOutPort));
    }

    #[test]
    fn port_strings() {
        assert_eq!(port_from_string("LOCAL"), Some(OFPP_LOCAL));
        assert_eq!(port_from_string("local"), Some(OFPP_LOCAL));
        assert_eq!(port_from_string("19"), Some(19));
        assert_eq!(port_from_string("bogus"), None);
        assert_eq!(port_to_string(OFPP_CONTROLLER), "CONTROLLER");
        assert_eq!(port_to_string(19), "19");
    }

    #[test]
    fn feature_bit_shuffle() {
        // 1.0 puts COPPER at bit 7; internally it is bit 11.
        let f = PortFeatures::from_ofp10((1 << 7) | (1 << 6));
        assert!(f.contains(PortFeatures::COPPER));
        assert!(f.contains(PortFeatures::F_10GB_FD));
        assert_eq!(f.to_ofp10(), (1 << 7) | (1 << 6));
        // The same internal value encodes 1:1 for 1.1.
        assert_eq!(f.to_ofp11(), f.bits());
        // A 1.1-only speed grade survives the 1.1 round trip but not 1.0.
        let g = PortFeatures::F_100GB_FD | PortFeatures::FIBER;
        assert_eq!(PortFeatures::from_ofp11(g.to_ofp11()), g);
        assert_eq!(PortFeatures::from_ofp10(g.to_ofp10()), PortFeatures::FIBER);
    }

    #[test]
    fn speed_derivation() {
        assert_eq!(PortFeatures::F_10GB_FD.to_bps(), 10_000_000_000);
        assert_eq!(PortFeatures::F_1GB_FD.to_bps(), 1_000_000_000);
        assert_eq!(PortFeatures::empty().to_bps(), 100_000_000);
    }

    fn sample_port() -> PhyPort {
        let mut name = ArrayString::new();
        name.push_str("eth3");
        PhyPort {
            port_no: 3,
            hw_addr: Mac([2, 0, 0, 0, 0, 3]),
            name,
            config: PortConfig::NO_PACKET_IN,
            state: PortState::LINK_DOWN,
            curr: PortFeatures::F_1GB_FD | PortFeatures::COPPER | PortFeatures::AUTONEG,
            advertised: PortFeatures::F_1GB_FD | PortFeatures::COPPER,
            supported: PortFeatures::F_1GB_FD | PortFeatures::F_100MB_FD | PortFeatures::COPPER,
            peer: PortFeatures::empty(),
            curr_speed: 1_000_000,
            max_speed: 1_000_000,
        }
    }

    #[test]
    fn ofp10_phy_port_round_trip() {
        let pp = sample_port();
        let mut b = MsgBuf::default();
        put_ofp10_phy_port(&pp, &mut b);
        assert_eq!(b.len(), OFP10_PHY_PORT_LEN);
        let got = parse_ofp10_phy_port(&mut Reader::new(b.as_slice())).unwrap();
        assert_eq!(got, pp);
    }

    #[test]
    fn ofp11_port_round_trip() {
        let mut pp = sample_port();
        pp.curr_speed = 123_456;
        let mut b = MsgBuf::default();
        put_ofp11_port(&pp, &mut b);
        assert_eq!(b.len(), OFP11_PORT_LEN);
        let got = parse_ofp11_port(&mut Reader::new(b.as_slice())).unwrap();
        assert_eq!(got, pp);
    }

    #[test]
    fn pull_iterates_and_exhausts() {
        let pp = sample_port();
        let mut b = MsgBuf::default();
        put_ofp10_phy_port(&pp, &mut b);
        put_ofp10_phy_port(&pp, &mut b);
        let mut r = Reader::new(b.as_slice());
        assert!(pull_phy_port(OFP10_VERSION, &mut r).unwrap().is_ok());
        assert!(pull_phy_port(OFP10_VERSION, &mut r).unwrap().is_ok());
        assert!(pull_phy_port(OFP10_VERSION, &mut r).is_none());
    }
}
