// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The switch-features (capability negotiation) codec.
//!
//! Capability words are masked per version — each generation defines
//! only a subset of bits, and bit 3 is overloaded: spanning-tree support
//! in 1.0, group statistics in 1.1+.  The action bitmap is renumbered
//! per version and translated through explicit tables.

use crate::cursor::Reader;
use crate::error::OfpErr;
use crate::header::{OFP_HEADER_LEN, OFP10_VERSION, OFP11_VERSION, OFP12_VERSION, OfpHeader, ofpt10};
use crate::msg::{MsgBuf, make_openflow};
use crate::port::{PhyPort, phy_port_len, pull_phy_port, put_phy_port};
use crate::proto::Protocol;
use crate::registry::decode_msg_type;

/// Size of the switch-features message without ports.
pub const OFP_SWITCH_FEATURES_LEN: usize = 32;
/// Size of the description stats body.
pub const OFP_DESC_STATS_LEN: usize = 1056;

bitflags::bitflags! {
    /// Switch capabilities in the internal layout.  The wire encodings
    /// overlap on bit 3; internally STP and group statistics get their
    /// own bits and the codec translates.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct Capabilities: u32 {
        /// Flow statistics supported.
        const FLOW_STATS = 1 << 0;
        /// Table statistics supported.
        const TABLE_STATS = 1 << 1;
        /// Port statistics supported.
        const PORT_STATS = 1 << 2;
        /// 802.1D spanning tree (1.0 only on the wire).
        const STP = 1 << 3;
        /// Group statistics (1.1+ only on the wire).
        const GROUP_STATS = 1 << 4;
        /// Can reassemble IP fragments.
        const IP_REASM = 1 << 5;
        /// Queue statistics supported.
        const QUEUE_STATS = 1 << 6;
        /// Can match IP addresses in ARP packets.
        const ARP_MATCH_IP = 1 << 7;
        /// Can block looping ports (1.2 only on the wire).
        const PORT_BLOCKED = 1 << 8;
    }
}

/// The wire bit overloaded between STP and group statistics.
const WIRE_BIT3: u32 = 1 << 3;

const CAP_COMMON: Capabilities = Capabilities::FLOW_STATS
    .union(Capabilities::TABLE_STATS)
    .union(Capabilities::PORT_STATS)
    .union(Capabilities::IP_REASM)
    .union(Capabilities::QUEUE_STATS);

/// The capability bits `version` defines, besides the overloaded bit 3.
fn capabilities_mask(version: u8) -> Capabilities {
    match version {
        OFP10_VERSION | OFP11_VERSION => CAP_COMMON.union(Capabilities::ARP_MATCH_IP),
        OFP12_VERSION => CAP_COMMON.union(Capabilities::PORT_BLOCKED),
        _ => Capabilities::empty(),
    }
}

bitflags::bitflags! {
    /// Actions a switch advertises, version independent.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    #[allow(missing_docs)]
    pub struct ActionBitmap: u32 {
        const OUTPUT = 1 << 0;
        const SET_VLAN_VID = 1 << 1;
        const SET_VLAN_PCP = 1 << 2;
        const STRIP_VLAN = 1 << 3;
        const SET_DL_SRC = 1 << 4;
        const SET_DL_DST = 1 << 5;
        const SET_NW_SRC = 1 << 6;
        const SET_NW_DST = 1 << 7;
        const SET_NW_TOS = 1 << 8;
        const SET_NW_ECN = 1 << 9;
        const SET_TP_SRC = 1 << 10;
        const SET_TP_DST = 1 << 11;
        const ENQUEUE = 1 << 12;
        const COPY_TTL_OUT = 1 << 13;
        const COPY_TTL_IN = 1 << 14;
        const SET_MPLS_LABEL = 1 << 15;
        const SET_MPLS_TC = 1 << 16;
        const SET_MPLS_TTL = 1 << 17;
        const DEC_MPLS_TTL = 1 << 18;
        const PUSH_VLAN = 1 << 19;
        const POP_VLAN = 1 << 20;
        const PUSH_MPLS = 1 << 21;
        const POP_MPLS = 1 << 22;
        const SET_QUEUE = 1 << 23;
        const GROUP = 1 << 24;
        const SET_NW_TTL = 1 << 25;
        const DEC_NW_TTL = 1 << 26;
        const SET_FIELD = 1 << 27;
    }
}

/// (internal bit, wire bit number) per version.
type ActionBitTranslation = &'static [(ActionBitmap, u32)];

static OF10_ACTION_BITS: ActionBitTranslation = &[
    (ActionBitmap::OUTPUT, 0),
    (ActionBitmap::SET_VLAN_VID, 1),
    (ActionBitmap::SET_VLAN_PCP, 2),
    (ActionBitmap::STRIP_VLAN, 3),
    (ActionBitmap::SET_DL_SRC, 4),
    (ActionBitmap::SET_DL_DST, 5),
    (ActionBitmap::SET_NW_SRC, 6),
    (ActionBitmap::SET_NW_DST, 7),
    (ActionBitmap::SET_NW_TOS, 8),
    (ActionBitmap::SET_TP_SRC, 9),
    (ActionBitmap::SET_TP_DST, 10),
    (ActionBitmap::ENQUEUE, 11),
];

static OF11_ACTION_BITS: ActionBitTranslation = &[
    (ActionBitmap::OUTPUT, 0),
    (ActionBitmap::SET_VLAN_VID, 1),
    (ActionBitmap::SET_VLAN_PCP, 2),
    (ActionBitmap::SET_DL_SRC, 3),
    (ActionBitmap::SET_DL_DST, 4),
    (ActionBitmap::SET_NW_SRC, 5),
    (ActionBitmap::SET_NW_DST, 6),
    (ActionBitmap::SET_NW_TOS, 7),
    (ActionBitmap::SET_NW_ECN, 8),
    (ActionBitmap::SET_TP_SRC, 9),
    (ActionBitmap::SET_TP_DST, 10),
    (ActionBitmap::COPY_TTL_OUT, 11),
    (ActionBitmap::COPY_TTL_IN, 12),
    (ActionBitmap::SET_MPLS_LABEL, 13),
    (ActionBitmap::SET_MPLS_TC, 14),
    (ActionBitmap::SET_MPLS_TTL, 15),
    (ActionBitmap::DEC_MPLS_TTL, 16),
    (ActionBitmap::PUSH_VLAN, 17),
    (ActionBitmap::POP_VLAN, 18),
    (ActionBitmap::PUSH_MPLS, 19),
    (ActionBitmap::POP_MPLS, 20),
    (ActionBitmap::SET_QUEUE, 21),
    (ActionBitmap::GROUP, 22),
    (ActionBitmap::SET_NW_TTL, 23),
    (ActionBitmap::DEC_NW_TTL, 24),
];

static OF12_ACTION_BITS: ActionBitTranslation = &[
    (ActionBitmap::OUTPUT, 0),
    (ActionBitmap::COPY_TTL_OUT, 11),
    (ActionBitmap::COPY_TTL_IN, 12),
    (ActionBitmap::SET_MPLS_TTL, 15),
    (ActionBitmap::DEC_MPLS_TTL, 16),
    (ActionBitmap::PUSH_VLAN, 17),
    (ActionBitmap::POP_VLAN, 18),
    (ActionBitmap::PUSH_MPLS, 19),
    (ActionBitmap::POP_MPLS, 20),
    (ActionBitmap::SET_QUEUE, 21),
    (ActionBitmap::GROUP, 22),
    (ActionBitmap::SET_NW_TTL, 23),
    (ActionBitmap::DEC_NW_TTL, 24),
    (ActionBitmap::SET_FIELD, 25),
];

fn action_bits_for(version: u8) -> ActionBitTranslation {
    match version {
        OFP10_VERSION => OF10_ACTION_BITS,
        OFP11_VERSION => OF11_ACTION_BITS,
        _ => OF12_ACTION_BITS,
    }
}

fn decode_action_bits(wire: u32, table: ActionBitTranslation) -> ActionBitmap {
    let mut out = ActionBitmap::empty();
    for (internal, bit) in table {
        if wire & (1 << bit) != 0 {
            out |= *internal;
        }
    }
    out
}

fn encode_action_bits(actions: ActionBitmap, table: ActionBitTranslation) -> u32 {
    let mut wire = 0;
    for (internal, bit) in table {
        if actions.contains(*internal) {
            wire |= 1 << bit;
        }
    }
    wire
}

/// A switch's advertised identity and capabilities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwitchFeatures {
    /// Datapath identifier.
    pub datapath_id: u64,
    /// Packets the switch can buffer for the controller.
    pub n_buffers: u32,
    /// Number of flow tables.
    pub n_tables: u8,
    /// Capability bits, internal layout.
    pub capabilities: Capabilities,
    /// Advertised actions.
    pub actions: ActionBitmap,
}

/// An iterator over the port records trailing a features reply (or a
/// port-desc stats reply body).
#[derive(Debug)]
pub struct PortIter<'a> {
    version: u8,
    r: Reader<'a>,
}

impl PortIter<'_> {
    /// Iterate ports of `version` from `body`.
    #[must_use]
    pub fn new(version: u8, body: &[u8]) -> PortIter<'_> {
        PortIter { version, r: Reader::new(body) }
    }
}

impl Iterator for PortIter<'_> {
    type Item = Result<PhyPort, OfpErr>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = pull_phy_port(self.version, &mut self.r)?;
        if item.is_err() {
            self.r.skip(self.r.remaining()).ok();
        }
        Some(item)
    }
}

/// Decodes an OFPT_FEATURES_REPLY into the abstract features plus an
/// iterator over the trailing port records.
///
/// # Errors
///
/// Classification and length errors per [`OfpErr`];
/// [`OfpErr::BadVersion`] for versions the codec does not speak.
pub fn decode_switch_features(msg: &[u8]) -> Result<(SwitchFeatures, PortIter<'_>), OfpErr> {
    decode_msg_type(msg)?;
    let oh = OfpHeader::parse(msg).map_err(|_| OfpErr::BadLen)?;
    let declared = (oh.length as usize).min(msg.len());
    let mut r = Reader::new(&msg[..declared]);
    let len = |_| OfpErr::BadLen;
    r.skip(OFP_HEADER_LEN).map_err(len)?;

    let datapath_id = r.u64().map_err(len)?;
    let n_buffers = r.u32().map_err(len)?;
    let n_tables = r.u8().map_err(len)?;
    r.skip(3).map_err(len)?;
    let raw_capabilities = r.u32().map_err(len)?;
    let raw_actions = r.u32().map_err(len)?;

    if r.remaining() % phy_port_len(oh.version) != 0 {
        return Err(OfpErr::BadLen);
    }

    let mut capabilities =
        Capabilities::from_bits_truncate(raw_capabilities) & capabilities_mask(oh.version);
    let actions = match oh.version {
        OFP10_VERSION => {
            if raw_capabilities & WIRE_BIT3 != 0 {
                capabilities |= Capabilities::STP;
            }
            decode_action_bits(raw_actions, OF10_ACTION_BITS)
        }
        OFP11_VERSION | OFP12_VERSION => {
            // Same wire bit, different meaning.
            if raw_capabilities & WIRE_BIT3 != 0 {
                capabilities |= Capabilities::GROUP_STATS;
            }
            decode_action_bits(raw_actions, action_bits_for(oh.version))
        }
        _ => return Err(OfpErr::BadVersion),
    };

    let features =
        SwitchFeatures { datapath_id, n_buffers, n_tables, capabilities, actions };
    Ok((features, PortIter::new(oh.version, r.rest())))
}

/// Encodes `features` for `protocol` with the given `xid`; port records
/// are appended afterwards with [`put_switch_features_port`].
#[must_use]
pub fn encode_switch_features(
    features: &SwitchFeatures,
    protocol: Protocol,
    xid: u32,
) -> MsgBuf {
    let version = protocol.to_ofp_version();
    let mut b = make_openflow(OFP_HEADER_LEN, version, ofpt10::FEATURES_REPLY, xid);
    b.put_u64(features.datapath_id);
    b.put_u32(features.n_buffers);
    b.put_u8(features.n_tables);
    b.put_zeros(3);

    let mut raw_capabilities =
        (features.capabilities & capabilities_mask(version)).bits() & !WIRE_BIT3;
    if version == OFP10_VERSION {
        if features.capabilities.contains(Capabilities::STP) {
            raw_capabilities |= WIRE_BIT3;
        }
    } else if features.capabilities.contains(Capabilities::GROUP_STATS) {
        raw_capabilities |= WIRE_BIT3;
    }
    b.put_u32(raw_capabilities);
    b.put_u32(encode_action_bits(features.actions, action_bits_for(version)));
    b.update_length();
    b
}

/// Appends one port record to a features reply under construction,
/// silently stopping at the 16-bit length limit (see
/// [`switch_features_ports_trunc`]).
pub fn put_switch_features_port(pp: &PhyPort, b: &mut MsgBuf) {
    let version = b.as_slice()[0];
    if b.len() + phy_port_len(version) <= usize::from(u16::MAX) {
        put_phy_port(version, pp, b);
    }
    b.update_length();
}

/// If the features reply in `b` holds the maximum number of ports that
/// fit, strips the ports (the caller should follow up with a port-desc
/// stats request, since the switch may have more ports than the reply
/// could carry) and returns true.
pub fn switch_features_ports_trunc(b: &mut MsgBuf) -> bool {
    let version = b.as_slice()[0];
    if b.len() + phy_port_len(version) > usize::from(u16::MAX) {
        b.truncate(OFP_SWITCH_FEATURES_LEN);
        b.update_length();
        return true;
    }
    false
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::port::{OFP10_PHY_PORT_LEN, PortFeatures};
    use flow::Mac;
    use pretty_assertions::assert_eq;

    fn sample() -> SwitchFeatures {
        SwitchFeatures {
            datapath_id: 0x0000_1122_3344_5566,
            n_buffers: 256,
            n_tables: 2,
            capabilities: Capabilities::FLOW_STATS
                | Capabilities::PORT_STATS
                | Capabilities::STP
                | Capabilities::GROUP_STATS,
            actions: ActionBitmap::OUTPUT | ActionBitmap::SET_VLAN_VID | ActionBitmap::ENQUEUE,
        }
    }

    fn port(no: u16) -> PhyPort {
        PhyPort {
            port_no: no,
            hw_addr: Mac([2, 0, 0, 0, 0, 1]),
            curr: PortFeatures::F_1GB_FD,
            supported: PortFeatures::F_1GB_FD,
            ..PhyPort::default()
        }
    }

    #[test]
    fn of10_round_trip_keeps_stp_drops_group_stats() {
        let f = sample();
        let mut b = encode_switch_features(&f, Protocol::OpenFlow10, 1);
        put_switch_features_port(&port(1), &mut b);
        let (got, mut ports) = decode_switch_features(b.as_slice()).unwrap();
        assert!(got.capabilities.contains(Capabilities::STP));
        assert!(!got.capabilities.contains(Capabilities::GROUP_STATS));
        assert_eq!(got.actions, f.actions);
        assert_eq!(ports.next().unwrap().unwrap().port_no, 1);
        assert!(ports.next().is_none());
    }

    #[test]
    fn of12_round_trip_keeps_group_stats_drops_stp() {
        let f = sample();
        let b = encode_switch_features(&f, Protocol::OpenFlow12, 1);
        let (got, _) = decode_switch_features(b.as_slice()).unwrap();
        assert!(got.capabilities.contains(Capabilities::GROUP_STATS));
        assert!(!got.capabilities.contains(Capabilities::STP));
        // ENQUEUE has no 1.2 encoding.
        assert!(!got.actions.contains(ActionBitmap::ENQUEUE));
        assert!(got.actions.contains(ActionBitmap::OUTPUT));
    }

    #[test]
    fn same_wire_bit_translates_differently() {
        // Encode STP-only for 1.0 and GROUP_STATS-only for 1.2: both set
        // wire bit 3.
        let mut f = sample();
        f.capabilities = Capabilities::STP;
        let b10 = encode_switch_features(&f, Protocol::OpenFlow10, 1);
        f.capabilities = Capabilities::GROUP_STATS;
        let b12 = encode_switch_features(&f, Protocol::OpenFlow12, 1);
        let cap10 = u32::from_be_bytes(b10.as_slice()[24..28].try_into().unwrap());
        let cap12 = u32::from_be_bytes(b12.as_slice()[24..28].try_into().unwrap());
        assert_eq!(cap10 & (1 << 3), 1 << 3);
        assert_eq!(cap12 & (1 << 3), 1 << 3);
    }

    #[test]
    fn ports_trunc_strips_and_reports() {
        let f = sample();
        let mut b = encode_switch_features(&f, Protocol::OpenFlow10, 1);
        // Fill to the point where one more port cannot fit.
        let n = (usize::from(u16::MAX) - OFP_SWITCH_FEATURES_LEN) / OFP10_PHY_PORT_LEN;
        for i in 0..n {
            #[allow(clippy::cast_possible_truncation)]
            put_switch_features_port(&port(i as u16), &mut b);
        }
        assert!(switch_features_ports_trunc(&mut b));
        assert_eq!(b.len(), OFP_SWITCH_FEATURES_LEN);
        let declared = OfpHeader::parse(b.as_slice()).unwrap().length as usize;
        assert_eq!(declared, OFP_SWITCH_FEATURES_LEN);

        // A reply with room is left alone.
        let mut small = encode_switch_features(&f, Protocol::OpenFlow10, 1);
        put_switch_features_port(&port(1), &mut small);
        assert!(!switch_features_ports_trunc(&mut small));
    }
}
