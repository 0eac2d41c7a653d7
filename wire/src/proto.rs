// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The protocol capability model.
//!
//! A connection speaks exactly one [`Protocol`] at a time: a base wire
//! version plus any active extensions.  [`Protocols`] is the bitmask form
//! used to answer "which protocols could express this rule" and to parse
//! user-supplied protocol lists.

use crate::header::{NICIRA_HEADER_LEN, OFP10_VERSION, OFP12_VERSION, nxt};
use crate::msg::{MsgBuf, make_nxmsg};
use flow::wildcards::ip_is_cidr;
use flow::{FieldWc, Rule, key::eth_type};

bitflags::bitflags! {
    /// A set of protocols.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Protocols: u32 {
        /// OpenFlow 1.0, flow_mod_table_id extension off.
        const OF10 = 1 << 0;
        /// OpenFlow 1.0 with the flow_mod_table_id extension.
        const OF10_TID = 1 << 1;
        /// Nicira extensible match, flow_mod_table_id extension off.
        const NXM = 1 << 2;
        /// Nicira extensible match with the flow_mod_table_id extension.
        const NXM_TID = 1 << 3;
        /// OpenFlow 1.2.
        const OF12 = 1 << 4;
    }
}

impl Protocols {
    /// Every defined protocol.
    pub const ANY: Protocols = Protocols::all();
    /// Either OpenFlow 1.0 family member.
    pub const OF10_ANY: Protocols = Protocols::OF10.union(Protocols::OF10_TID);
    /// Either NXM family member.
    pub const NXM_ANY: Protocols = Protocols::NXM.union(Protocols::NXM_TID);
    /// The protocols that carry the table-id extension.
    pub const TID: Protocols = Protocols::OF10_TID.union(Protocols::NXM_TID);
}

/// The single protocol mode in effect on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// OpenFlow 1.0.
    OpenFlow10,
    /// OpenFlow 1.0 + flow_mod_table_id.
    OpenFlow10Tid,
    /// Nicira extensible match over OpenFlow 1.0.
    Nxm,
    /// NXM + flow_mod_table_id.
    NxmTid,
    /// OpenFlow 1.2.
    OpenFlow12,
}

/// Preferred order to try when dumping flows from a switch.
pub const FLOW_DUMP_PROTOCOLS: [Protocol; 3] =
    [Protocol::OpenFlow12, Protocol::Nxm, Protocol::OpenFlow10];

impl Protocol {
    /// The single-bit set containing just this protocol.
    #[must_use]
    pub fn bit(self) -> Protocols {
        match self {
            Protocol::OpenFlow10 => Protocols::OF10,
            Protocol::OpenFlow10Tid => Protocols::OF10_TID,
            Protocol::Nxm => Protocols::NXM,
            Protocol::NxmTid => Protocols::NXM_TID,
            Protocol::OpenFlow12 => Protocols::OF12,
        }
    }

    /// The protocol initially in effect on a connection that negotiated
    /// the given wire `version`, or `None` when the version is not one of
    /// the two directly-supported bases.
    #[must_use]
    pub fn from_ofp_version(version: u8) -> Option<Protocol> {
        match version {
            OFP10_VERSION => Some(Protocol::OpenFlow10),
            OFP12_VERSION => Some(Protocol::OpenFlow12),
            _ => None,
        }
    }

    /// The wire version this protocol runs over.  Total over valid
    /// protocol values.
    #[must_use]
    pub fn to_ofp_version(self) -> u8 {
        match self {
            Protocol::OpenFlow10 | Protocol::OpenFlow10Tid | Protocol::Nxm | Protocol::NxmTid => {
                OFP10_VERSION
            }
            Protocol::OpenFlow12 => OFP12_VERSION,
        }
    }

    /// True iff this protocol carries the flow_mod_table_id extension.
    #[must_use]
    pub fn has_tid(self) -> bool {
        matches!(self, Protocol::OpenFlow10Tid | Protocol::NxmTid)
    }

    /// This protocol with the flow_mod_table_id extension turned on or
    /// off.
    ///
    /// The extension only means something for protocols whose standard
    /// form cannot address a specific table; OpenFlow 1.2 flow mods always
    /// carry a table id, so for it this is a no-op returning the input.
    #[must_use]
    pub fn set_tid(self, enable: bool) -> Protocol {
        match self {
            Protocol::OpenFlow10 | Protocol::OpenFlow10Tid => {
                if enable { Protocol::OpenFlow10Tid } else { Protocol::OpenFlow10 }
            }
            Protocol::Nxm | Protocol::NxmTid => {
                if enable { Protocol::NxmTid } else { Protocol::Nxm }
            }
            Protocol::OpenFlow12 => Protocol::OpenFlow12,
        }
    }

    /// The base form of this protocol, extensions stripped.
    #[must_use]
    pub fn to_base(self) -> Protocol {
        self.set_tid(false)
    }

    /// `new_base` with whatever extension bits `self` already carries.
    #[must_use]
    pub fn set_base(self, new_base: Protocol) -> Protocol {
        new_base.to_base().set_tid(self.has_tid())
    }

    /// The canonical single-bit name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Protocol::Nxm => "NXM-table_id",
            Protocol::NxmTid => "NXM+table_id",
            Protocol::OpenFlow10 => "OpenFlow10-table_id",
            Protocol::OpenFlow10Tid => "OpenFlow10+table_id",
            Protocol::OpenFlow12 => "OpenFlow12",
        }
    }
}

impl core::fmt::Display for Protocol {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Convenience names that expand to multi-bit sets.
const PROTO_ABBREVS: [(&str, Protocols); 3] = [
    ("any", Protocols::ANY),
    ("OpenFlow10", Protocols::OF10_ANY),
    ("NXM", Protocols::NXM_ANY),
];

const ALL_PROTOCOLS: [Protocol; 5] = [
    Protocol::OpenFlow10,
    Protocol::OpenFlow10Tid,
    Protocol::Nxm,
    Protocol::NxmTid,
    Protocol::OpenFlow12,
];

/// A failure to parse a protocol name list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolParseError {
    /// A token matched no protocol name or abbreviation.
    #[error("{0}: unknown flow protocol")]
    Unknown(String),
    /// The list contained no protocol at all.
    #[error("{0}: no flow protocol specified")]
    Empty(String),
}

/// Render a protocol set: the simple name when one exists, otherwise a
/// comma-separated list; `"none"` for the empty set.
#[must_use]
pub fn protocols_to_string(protocols: Protocols) -> String {
    if protocols.is_empty() {
        return "none".to_string();
    }
    let mut remaining = protocols;
    let mut out = Vec::new();
    'outer: while !remaining.is_empty() {
        for (name, set) in PROTO_ABBREVS {
            if remaining.contains(set) {
                out.push(name.to_string());
                remaining.remove(set);
                continue 'outer;
            }
        }
        for p in ALL_PROTOCOLS {
            if remaining.contains(p.bit()) {
                out.push(p.name().to_string());
                remaining.remove(p.bit());
                continue 'outer;
            }
        }
        unreachable!("unnameable protocol bits {remaining:?}");
    }
    out.join(",")
}

fn protocol_from_token(token: &str) -> Option<Protocols> {
    for p in ALL_PROTOCOLS {
        if token.eq_ignore_ascii_case(p.name()) {
            return Some(p.bit());
        }
    }
    for (name, set) in PROTO_ABBREVS {
        if token.eq_ignore_ascii_case(name) {
            return Some(set);
        }
    }
    None
}

/// Parse a comma-separated list of protocol names and abbreviations into
/// the nonempty set they denote.
///
/// # Errors
///
/// Unknown tokens and lists that name nothing at all are rejected; the
/// caller (typically a CLI front end) decides how fatal that is.
pub fn protocols_from_string(s: &str) -> Result<Protocols, ProtocolParseError> {
    let mut protocols = Protocols::empty();
    for token in s.split(',').filter(|t| !t.is_empty()) {
        let p = protocol_from_token(token)
            .ok_or_else(|| ProtocolParseError::Unknown(token.to_string()))?;
        protocols |= p;
    }
    if protocols.is_empty() {
        return Err(ProtocolParseError::Empty(s.to_string()));
    }
    Ok(protocols)
}

/// Returns the protocols able to express `rule` exactly when sending it
/// to a switch.  Any field only the extensible match can carry narrows
/// the set to the NXM family; otherwise every protocol is usable.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn usable_protocols(rule: &Rule) -> Protocols {
    let wc = &rule.wc;

    // NXM and OF1.1+ support bitwise matching on ethernet addresses.
    if !wc.dl_src_mask.is_exact() && !wc.dl_src_mask.is_zero() {
        return Protocols::NXM_ANY;
    }
    if !wc.dl_dst_mask.is_exact() && !wc.dl_dst_mask.is_zero() {
        return Protocols::NXM_ANY;
    }

    // Only NXM supports matching ARP hardware addresses.
    if !wc.flags.contains(FieldWc::ARP_SHA) || !wc.flags.contains(FieldWc::ARP_THA) {
        return Protocols::NXM_ANY;
    }

    // Only NXM supports matching IPv6 traffic.
    if !wc.flags.contains(FieldWc::DL_TYPE) && rule.flow.dl_type == eth_type::IPV6 {
        return Protocols::NXM_ANY;
    }

    // Only NXM supports matching registers.
    if !wc.regs_fully_wildcarded() {
        return Protocols::NXM_ANY;
    }

    // Only NXM supports matching tun_id.
    if wc.tun_id_mask != 0 {
        return Protocols::NXM_ANY;
    }

    // Only NXM supports matching fragments.
    if wc.nw_frag_mask != 0 {
        return Protocols::NXM_ANY;
    }

    // Only NXM supports matching the IPv6 flow label.
    if !wc.flags.contains(FieldWc::IPV6_LABEL) {
        return Protocols::NXM_ANY;
    }

    // Only NXM supports matching IP ECN bits.
    if !wc.flags.contains(FieldWc::NW_ECN) {
        return Protocols::NXM_ANY;
    }

    // Only NXM supports matching the IP TTL / hop limit.
    if !wc.flags.contains(FieldWc::NW_TTL) {
        return Protocols::NXM_ANY;
    }

    // Only NXM supports non-CIDR IPv4 address masks.
    if !ip_is_cidr(wc.nw_src_mask) || !ip_is_cidr(wc.nw_dst_mask) {
        return Protocols::NXM_ANY;
    }

    // Only NXM supports bitwise matching on transport ports.
    if (wc.tp_src_mask != 0 && wc.tp_src_mask != u16::MAX)
        || (wc.tp_dst_mask != 0 && wc.tp_dst_mask != u16::MAX)
    {
        return Protocols::NXM_ANY;
    }

    // Only NXM supports the MPLS fields.
    if !wc.flags.contains(FieldWc::MPLS_LABEL)
        || !wc.flags.contains(FieldWc::MPLS_TC)
        || !wc.flags.contains(FieldWc::MPLS_STACK)
    {
        return Protocols::NXM_ANY;
    }

    // Only NXM supports the VLAN TPID and QinQ fields.
    if !wc.flags.contains(FieldWc::VLAN_TPID)
        || !wc.flags.contains(FieldWc::VLAN_QINQ_VID)
        || !wc.flags.contains(FieldWc::VLAN_QINQ_PCP)
    {
        return Protocols::NXM_ANY;
    }

    Protocols::ANY
}

/// The match encodings a switch can be told to use via
/// NXT_SET_FLOW_FORMAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
pub enum FlowFormat {
    /// The 1.0 fixed match.
    #[strum(serialize = "openflow10")]
    OpenFlow10 = 0,
    /// The Nicira extensible match.
    #[strum(serialize = "nxm")]
    Nxm = 2,
    /// The 1.2 extensible match.
    #[strum(serialize = "openflow12")]
    OpenFlow12 = 3,
}

impl FlowFormat {
    /// Decode a wire flow-format number.
    #[must_use]
    pub fn from_wire(raw: u32) -> Option<FlowFormat> {
        match raw {
            0 => Some(FlowFormat::OpenFlow10),
            2 => Some(FlowFormat::Nxm),
            3 => Some(FlowFormat::OpenFlow12),
            _ => None,
        }
    }

    /// The base protocol selected by this flow format.
    #[must_use]
    pub fn to_protocol(self) -> Protocol {
        match self {
            FlowFormat::OpenFlow10 => Protocol::OpenFlow10,
            FlowFormat::Nxm => Protocol::Nxm,
            FlowFormat::OpenFlow12 => Protocol::OpenFlow12,
        }
    }
}

/// The two packet-in layouts a switch can be told to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
pub enum PacketInFormat {
    /// The fixed 1.0 packet-in.
    #[strum(serialize = "openflow10")]
    OpenFlow10 = 0,
    /// The NXM-metadata packet-in.
    #[strum(serialize = "nxm")]
    Nxm = 1,
}

impl PacketInFormat {
    /// Decode a wire packet-in-format number.
    #[must_use]
    pub fn from_wire(raw: u32) -> Option<PacketInFormat> {
        match raw {
            0 => Some(PacketInFormat::OpenFlow10),
            1 => Some(PacketInFormat::Nxm),
            _ => None,
        }
    }
}

/// An NXT_SET_FLOW_FORMAT message selecting `format`.
#[must_use]
pub fn encode_set_flow_format(format: FlowFormat, xid: u32) -> MsgBuf {
    let mut b = make_nxmsg(NICIRA_HEADER_LEN, nxt::SET_FLOW_FORMAT, xid);
    b.put_u32(format as u32);
    b.update_length();
    b
}

/// An NXT_SET_PACKET_IN_FORMAT message selecting `format`.
#[must_use]
pub fn encode_set_packet_in_format(format: PacketInFormat, xid: u32) -> MsgBuf {
    let mut b = make_nxmsg(NICIRA_HEADER_LEN, nxt::SET_PACKET_IN_FORMAT, xid);
    b.put_u32(format as u32);
    b.update_length();
    b
}

/// An NXT_FLOW_MOD_TABLE_ID message turning the table-id extension on or
/// off.
#[must_use]
pub fn encode_flow_mod_table_id(enable: bool, xid: u32) -> MsgBuf {
    let mut b = make_nxmsg(NICIRA_HEADER_LEN, nxt::FLOW_MOD_TABLE_ID, xid);
    b.put_u8(u8::from(enable));
    b.put_zeros(7);
    b.update_length();
    b
}

/// One step of protocol negotiation.
///
/// Returns the message that moves the connection from `current` toward
/// `want` (base family first, then the table-id extension) together with
/// the protocol in effect once the switch processes it.  Returns
/// `(None, current)` when no step is needed; the caller iterates until
/// the returned protocol equals `want`.
#[must_use]
pub fn encode_set_protocol(
    current: Protocol,
    want: Protocol,
    xid: u32,
) -> (Option<MsgBuf>, Protocol) {
    let cur_base = current.to_base();
    let want_base = want.to_base();
    if cur_base != want_base {
        let next = current.set_base(want_base);
        let format = match want_base {
            Protocol::Nxm => FlowFormat::Nxm,
            Protocol::OpenFlow10 => FlowFormat::OpenFlow10,
            Protocol::OpenFlow12 => FlowFormat::OpenFlow12,
            Protocol::OpenFlow10Tid | Protocol::NxmTid => {
                unreachable!("base protocol carries the TID bit")
            }
        };
        return (Some(encode_set_flow_format(format, xid)), next);
    }

    if current.has_tid() != want.has_tid() {
        let next = current.set_tid(want.has_tid());
        return (Some(encode_flow_mod_table_id(want.has_tid(), xid)), next);
    }

    debug_assert_eq!(current, want);
    (None, current)
}

#[cfg(test)]
mod test {
    use super::*;
    use flow::Mac;
    use std::str::FromStr;

    #[test]
    fn version_mapping() {
        assert_eq!(Protocol::from_ofp_version(1), Some(Protocol::OpenFlow10));
        assert_eq!(Protocol::from_ofp_version(3), Some(Protocol::OpenFlow12));
        assert_eq!(Protocol::from_ofp_version(2), None);
        assert_eq!(Protocol::from_ofp_version(4), None);
        for p in ALL_PROTOCOLS {
            assert!(matches!(p.to_ofp_version(), 1 | 3));
        }
    }

    #[test]
    fn tid_algebra() {
        assert_eq!(Protocol::OpenFlow10.set_tid(true), Protocol::OpenFlow10Tid);
        assert_eq!(Protocol::NxmTid.set_tid(false), Protocol::Nxm);
        // No-op for protocols that always carry a table id.
        assert_eq!(Protocol::OpenFlow12.set_tid(true), Protocol::OpenFlow12);
        assert_eq!(Protocol::NxmTid.to_base(), Protocol::Nxm);
        // set_base keeps the TID bit from the current protocol.
        assert_eq!(
            Protocol::OpenFlow10Tid.set_base(Protocol::Nxm),
            Protocol::NxmTid
        );
        assert_eq!(Protocol::Nxm.set_base(Protocol::OpenFlow10), Protocol::OpenFlow10);
    }

    #[test]
    fn string_round_trip() {
        for p in ALL_PROTOCOLS {
            let parsed = protocols_from_string(p.name()).unwrap();
            assert_eq!(parsed, p.bit());
        }
        assert_eq!(protocols_from_string("any").unwrap(), Protocols::ANY);
        assert_eq!(protocols_from_string("NXM").unwrap(), Protocols::NXM_ANY);
        assert_eq!(
            protocols_from_string("OpenFlow10,NXM").unwrap(),
            Protocols::OF10_ANY | Protocols::NXM_ANY
        );
        assert_eq!(protocols_to_string(Protocols::ANY), "any");
        assert_eq!(protocols_to_string(Protocols::empty()), "none");
        assert_eq!(protocols_to_string(Protocols::OF12), "OpenFlow12");
        assert!(protocols_from_string("bogus").is_err());
        assert!(protocols_from_string(",,").is_err());
    }

    #[test]
    fn usable_protocols_narrowing() {
        // Exact (non-CIDR) source mask: NXM only.
        let mut r = Rule::catchall(0);
        r.set_dl_type(eth_type::IP);
        r.set_nw_src_masked(0x0a00_0001, 0x0000_00ff);
        assert_eq!(usable_protocols(&r), Protocols::NXM_ANY);

        // CIDR mask: anything goes.
        let mut r = Rule::catchall(0);
        r.set_dl_type(eth_type::IP);
        r.set_nw_src_masked(0x0a00_0000, 0xffff_ff00);
        assert_eq!(usable_protocols(&r), Protocols::ANY);

        // Registers, tunnels, and partial ethernet masks are NXM-only.
        let mut r = Rule::catchall(0);
        r.set_reg_masked(0, 1, u32::MAX);
        assert_eq!(usable_protocols(&r), Protocols::NXM_ANY);

        let mut r = Rule::catchall(0);
        r.set_tun_id_masked(99, u64::MAX);
        assert_eq!(usable_protocols(&r), Protocols::NXM_ANY);

        let mut r = Rule::catchall(0);
        r.set_dl_src_masked(Mac([2; 6]), Mac([0xff, 0xff, 0, 0, 0, 0]));
        assert_eq!(usable_protocols(&r), Protocols::NXM_ANY);

        // Bitwise transport-port mask.
        let mut r = Rule::catchall(0);
        r.set_dl_type(eth_type::IP);
        r.set_nw_proto(6);
        r.set_tp_dst_masked(0x0040, 0x00c0);
        assert_eq!(usable_protocols(&r), Protocols::NXM_ANY);

        // IPv6 ethertype.
        let mut r = Rule::catchall(0);
        r.set_dl_type(eth_type::IPV6);
        assert_eq!(usable_protocols(&r), Protocols::NXM_ANY);

        assert_eq!(usable_protocols(&Rule::catchall(0)), Protocols::ANY);
    }

    #[test]
    fn set_protocol_converges() {
        // Base change first, then TID toggle: two steps.
        let (msg, next) = encode_set_protocol(Protocol::OpenFlow10, Protocol::NxmTid, 1);
        assert!(msg.is_some());
        assert_eq!(next, Protocol::Nxm);
        let (msg, next) = encode_set_protocol(next, Protocol::NxmTid, 2);
        assert!(msg.is_some());
        assert_eq!(next, Protocol::NxmTid);
        let (msg, next) = encode_set_protocol(next, Protocol::NxmTid, 3);
        assert!(msg.is_none());
        assert_eq!(next, Protocol::NxmTid);
    }

    #[test]
    fn format_strings() {
        assert_eq!(FlowFormat::Nxm.to_string(), "nxm");
        assert_eq!(FlowFormat::from_str("openflow12").unwrap(), FlowFormat::OpenFlow12);
        assert_eq!(PacketInFormat::from_str("nxm").unwrap(), PacketInFormat::Nxm);
        assert_eq!(FlowFormat::from_wire(2), Some(FlowFormat::Nxm));
        assert_eq!(FlowFormat::from_wire(1), None);
        assert_eq!(PacketInFormat::from_wire(9), None);
    }

    #[test]
    fn set_flow_format_wire_layout() {
        let b = encode_set_flow_format(FlowFormat::Nxm, 5);
        let bytes = b.as_slice();
        assert_eq!(bytes.len(), 20);
        assert_eq!(&bytes[16..20], &2u32.to_be_bytes());
    }

    #[test]
    fn flow_mod_table_id_wire_layout() {
        let b = encode_flow_mod_table_id(true, 5);
        let bytes = b.as_slice();
        assert_eq!(bytes.len(), 24);
        assert_eq!(bytes[16], 1);
        assert_eq!(&bytes[17..24], &[0; 7]);
    }
}
