// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The OpenFlow 1.0 fixed-field match codec.
//!
//! A 40-byte structure with a 32-bit wildcard bitmask; IPv4 address
//! wildcarding is a 6-bit *wildcard-bit count* per direction (0 = exact,
//! >= 32 = fully wildcarded), the opposite polarity of a prefix length.
//! Fields this format cannot express (ARP hardware addresses, ECN, TTL,
//! IPv6, MPLS, QinQ, registers, tunnel ids) decode as wildcarded.

use crate::cursor::{LengthError, Reader};
use crate::msg::MsgBuf;
use flow::rule::IP_DSCP_MASK;
use flow::tci::{VLAN_CFI, VLAN_PCP_MASK, VLAN_PCP_SHIFT, VLAN_VID_MASK, tci_to_pcp, tci_to_vid};
use flow::wildcards::{netmask_to_wcbits, wcbits_to_netmask};
use flow::{FieldWc, Mac, Rule, Wildcards};

/// Size of the 1.0 match structure on the wire.
pub const OFP10_MATCH_LEN: usize = 40;

/// `dl_vlan` sentinel meaning "no 802.1Q header present".
pub const OFP10_VLAN_NONE: u16 = 0xffff;

/// OFPFW10_* wildcard bits.
pub mod ofpfw10 {
    pub const IN_PORT: u32 = 1 << 0;
    pub const DL_VLAN: u32 = 1 << 1;
    pub const DL_SRC: u32 = 1 << 2;
    pub const DL_DST: u32 = 1 << 3;
    pub const DL_TYPE: u32 = 1 << 4;
    pub const NW_PROTO: u32 = 1 << 5;
    pub const TP_SRC: u32 = 1 << 6;
    pub const TP_DST: u32 = 1 << 7;
    pub const NW_SRC_SHIFT: u32 = 8;
    pub const NW_SRC_MASK: u32 = 0x3f << NW_SRC_SHIFT;
    pub const NW_DST_SHIFT: u32 = 14;
    pub const NW_DST_MASK: u32 = 0x3f << NW_DST_SHIFT;
    pub const DL_VLAN_PCP: u32 = 1 << 20;
    pub const NW_TOS: u32 = 1 << 21;
    pub const ALL: u32 = (1 << 22) - 1;
}

/// The 1.0 match structure in abstract form, fields in host order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Match10 {
    /// OFPFW10_* bits.
    pub wildcards: u32,
    /// Ingress port.
    pub in_port: u16,
    /// Ethernet source.
    pub dl_src: Mac,
    /// Ethernet destination.
    pub dl_dst: Mac,
    /// VLAN id, or [`OFP10_VLAN_NONE`].
    pub dl_vlan: u16,
    /// VLAN priority.
    pub dl_vlan_pcp: u8,
    /// Ethernet type.
    pub dl_type: u16,
    /// IP TOS (DSCP bits).
    pub nw_tos: u8,
    /// IP protocol.
    pub nw_proto: u8,
    /// IPv4 source.
    pub nw_src: u32,
    /// IPv4 destination.
    pub nw_dst: u32,
    /// Transport source port.
    pub tp_src: u16,
    /// Transport destination port.
    pub tp_dst: u16,
}

impl Match10 {
    /// Parse the 40-byte wire form.
    ///
    /// # Errors
    ///
    /// Returns a [`LengthError`] if the reader holds fewer than 40 bytes.
    pub fn parse(r: &mut Reader<'_>) -> Result<Match10, LengthError> {
        let wildcards = r.u32()?;
        let in_port = r.u16()?;
        let dl_src = r.mac()?;
        let dl_dst = r.mac()?;
        let dl_vlan = r.u16()?;
        let dl_vlan_pcp = r.u8()?;
        r.skip(1)?;
        let dl_type = r.u16()?;
        let nw_tos = r.u8()?;
        let nw_proto = r.u8()?;
        r.skip(2)?;
        let nw_src = r.u32()?;
        let nw_dst = r.u32()?;
        let tp_src = r.u16()?;
        let tp_dst = r.u16()?;
        Ok(Match10 {
            wildcards,
            in_port,
            dl_src,
            dl_dst,
            dl_vlan,
            dl_vlan_pcp,
            dl_type,
            nw_tos,
            nw_proto,
            nw_src,
            nw_dst,
            tp_src,
            tp_dst,
        })
    }

    /// Append the 40-byte wire form to `b`.
    pub fn put(&self, b: &mut MsgBuf) {
        b.put_u32(self.wildcards);
        b.put_u16(self.in_port);
        b.put_mac(self.dl_src);
        b.put_mac(self.dl_dst);
        b.put_u16(self.dl_vlan);
        b.put_u8(self.dl_vlan_pcp);
        b.put_zeros(1);
        b.put_u16(self.dl_type);
        b.put_u8(self.nw_tos);
        b.put_u8(self.nw_proto);
        b.put_zeros(2);
        b.put_u32(self.nw_src);
        b.put_u32(self.nw_dst);
        b.put_u16(self.tp_src);
        b.put_u16(self.tp_dst);
    }
}

/// Converts the OFPFW10_* bits in `ofpfw` into internal wildcards.
///
/// The caller handles the special case where the match's `dl_vlan` is
/// [`OFP10_VLAN_NONE`].
#[must_use]
pub fn wildcards_from_ofpfw10(ofpfw: u32) -> Wildcards {
    // Start from catchall: every field the 1.0 format cannot express
    // stays wildcarded.
    let mut wc = Wildcards::catchall();
    if ofpfw & ofpfw10::IN_PORT == 0 {
        wc.flags.remove(FieldWc::IN_PORT);
    }
    if ofpfw & ofpfw10::DL_TYPE == 0 {
        wc.flags.remove(FieldWc::DL_TYPE);
    }
    if ofpfw & ofpfw10::NW_PROTO == 0 {
        wc.flags.remove(FieldWc::NW_PROTO);
    }
    // 1.0 has a single TOS wildcard flag; it maps onto the DSCP bits.
    if ofpfw & ofpfw10::NW_TOS == 0 {
        wc.flags.remove(FieldWc::NW_DSCP);
    }

    wc.nw_src_mask = wcbits_to_netmask(ofpfw >> ofpfw10::NW_SRC_SHIFT);
    wc.nw_dst_mask = wcbits_to_netmask(ofpfw >> ofpfw10::NW_DST_SHIFT);

    if ofpfw & ofpfw10::TP_SRC == 0 {
        wc.tp_src_mask = u16::MAX;
    }
    if ofpfw & ofpfw10::TP_DST == 0 {
        wc.tp_dst_mask = u16::MAX;
    }
    if ofpfw & ofpfw10::DL_SRC == 0 {
        wc.dl_src_mask = Mac::BROADCAST;
    }
    if ofpfw & ofpfw10::DL_DST == 0 {
        wc.dl_dst_mask = Mac::BROADCAST;
    }

    if ofpfw & ofpfw10::DL_VLAN_PCP == 0 {
        wc.vlan_tci_mask |= VLAN_PCP_MASK | VLAN_CFI;
    }
    if ofpfw & ofpfw10::DL_VLAN == 0 {
        wc.vlan_tci_mask |= VLAN_VID_MASK | VLAN_CFI;
    }

    wc
}

/// Converts the 1.0 `m` into a rule with the given `priority`.
#[must_use]
pub fn rule_from_match10(m: &Match10, priority: u16) -> Rule {
    let ofpfw = m.wildcards & ofpfw10::ALL;

    let mut rule = Rule {
        flow: flow::FlowKey::default(),
        wc: wildcards_from_ofpfw10(ofpfw),
        priority: if ofpfw == 0 { u16::MAX } else { priority },
    };

    rule.flow.nw_src = m.nw_src;
    rule.flow.nw_dst = m.nw_dst;
    rule.flow.in_port = m.in_port;
    rule.flow.dl_type = m.dl_type;
    rule.flow.tp_src = m.tp_src;
    rule.flow.tp_dst = m.tp_dst;
    rule.flow.dl_src = m.dl_src;
    rule.flow.dl_dst = m.dl_dst;
    rule.flow.nw_tos = m.nw_tos & IP_DSCP_MASK;
    rule.flow.nw_proto = m.nw_proto;

    // Translate VLANs.
    if ofpfw & ofpfw10::DL_VLAN == 0 && m.dl_vlan == OFP10_VLAN_NONE {
        // Match only packets without an 802.1Q header.
        //
        // When the PCP is wildcarded this is obviously correct.  When the
        // PCP is matched the flow is contradictory (there is no PCP
        // without an 802.1Q header), but control planes have long relied
        // on this combination matching untagged traffic, so it stays.
        rule.flow.vlan_tci = 0;
        rule.wc.vlan_tci_mask = u16::MAX;
    } else {
        let vid = m.dl_vlan & VLAN_VID_MASK;
        let pcp = (u16::from(m.dl_vlan_pcp) << VLAN_PCP_SHIFT) & VLAN_PCP_MASK;
        rule.flow.vlan_tci = (vid | pcp | VLAN_CFI) & rule.wc.vlan_tci_mask;
    }

    rule.zero_wildcarded_fields();
    rule
}

/// Converts `rule` into the 1.0 match structure.
#[must_use]
pub fn rule_to_match10(rule: &Rule) -> Match10 {
    let wc = &rule.wc;
    let mut ofpfw = 0u32;
    if wc.flags.contains(FieldWc::IN_PORT) {
        ofpfw |= ofpfw10::IN_PORT;
    }
    if wc.flags.contains(FieldWc::DL_TYPE) {
        ofpfw |= ofpfw10::DL_TYPE;
    }
    if wc.flags.contains(FieldWc::NW_PROTO) {
        ofpfw |= ofpfw10::NW_PROTO;
    }
    ofpfw |= netmask_to_wcbits(wc.nw_src_mask) << ofpfw10::NW_SRC_SHIFT;
    ofpfw |= netmask_to_wcbits(wc.nw_dst_mask) << ofpfw10::NW_DST_SHIFT;
    if wc.flags.contains(FieldWc::NW_DSCP) {
        ofpfw |= ofpfw10::NW_TOS;
    }
    if wc.tp_src_mask == 0 {
        ofpfw |= ofpfw10::TP_SRC;
    }
    if wc.tp_dst_mask == 0 {
        ofpfw |= ofpfw10::TP_DST;
    }
    if wc.dl_src_mask.is_zero() {
        ofpfw |= ofpfw10::DL_SRC;
    }
    if wc.dl_dst_mask.is_zero() {
        ofpfw |= ofpfw10::DL_DST;
    }

    // Translate VLANs.
    let mut dl_vlan = 0u16;
    let mut dl_vlan_pcp = 0u8;
    if wc.vlan_tci_mask == 0 {
        ofpfw |= ofpfw10::DL_VLAN | ofpfw10::DL_VLAN_PCP;
    } else if wc.vlan_tci_mask & VLAN_CFI != 0 && rule.flow.vlan_tci & VLAN_CFI == 0 {
        dl_vlan = OFP10_VLAN_NONE;
    } else {
        if wc.vlan_tci_mask & VLAN_VID_MASK == 0 {
            ofpfw |= ofpfw10::DL_VLAN;
        } else {
            dl_vlan = tci_to_vid(rule.flow.vlan_tci);
        }
        if wc.vlan_tci_mask & VLAN_PCP_MASK == 0 {
            ofpfw |= ofpfw10::DL_VLAN_PCP;
        } else {
            dl_vlan_pcp = tci_to_pcp(rule.flow.vlan_tci);
        }
    }

    Match10 {
        wildcards: ofpfw,
        in_port: rule.flow.in_port,
        dl_src: rule.flow.dl_src,
        dl_dst: rule.flow.dl_dst,
        dl_vlan,
        dl_vlan_pcp,
        dl_type: rule.flow.dl_type,
        nw_tos: rule.flow.nw_tos & IP_DSCP_MASK,
        nw_proto: rule.flow.nw_proto,
        nw_src: rule.flow.nw_src,
        nw_dst: rule.flow.nw_dst,
        tp_src: rule.flow.tp_src,
        tp_dst: rule.flow.tp_dst,
    }
}
