// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! A flow match rule: exact values, wildcards, and a priority.

use crate::key::{FLOW_N_REGS, FlowKey, NW_FRAG_MASK};
use crate::mac::Mac;
use crate::tci::{VLAN_CFI, VLAN_PCP_MASK, VLAN_PCP_SHIFT, VLAN_VID_MASK};
use crate::wildcards::{FieldWc, Wildcards};

/// Default priority assigned to rules when the caller does not care.
pub const DEFAULT_PRIORITY: u16 = 0x8000;

/// A classifier rule: an exact-value [`FlowKey`], the [`Wildcards`] that
/// say which of those values matter, and a priority (higher wins when
/// rules overlap).
///
/// Rules are kept in canonical form: every value bit outside its mask is
/// zero, so `==` on two canonicalized rules is semantic equality.  The
/// masked setters maintain this; decoders that fill fields directly call
/// [`Rule::zero_wildcarded_fields`] before handing the rule out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rule {
    /// Exact field values.
    pub flow: FlowKey,
    /// Which bits of `flow` participate in matching.
    pub wc: Wildcards,
    /// Match priority; higher wins on overlap.
    pub priority: u16,
}

impl Default for Rule {
    /// A catchall at priority zero.
    fn default() -> Self {
        Rule::catchall(0)
    }
}

impl Rule {
    /// A rule that matches every packet at the given priority.
    #[must_use]
    pub fn catchall(priority: u16) -> Rule {
        Rule {
            flow: FlowKey::default(),
            wc: Wildcards::catchall(),
            priority,
        }
    }

    /// Match an exact ingress port.
    pub fn set_in_port(&mut self, port: u16) {
        self.wc.flags.remove(FieldWc::IN_PORT);
        self.flow.in_port = port;
    }

    /// Match an exact Ethernet type.
    pub fn set_dl_type(&mut self, dl_type: u16) {
        self.wc.flags.remove(FieldWc::DL_TYPE);
        self.flow.dl_type = dl_type;
    }

    /// Match the Ethernet source under `mask`.
    pub fn set_dl_src_masked(&mut self, addr: Mac, mask: Mac) {
        self.flow.dl_src = addr.and(mask);
        self.wc.dl_src_mask = mask;
    }

    /// Match the Ethernet destination under `mask`.
    pub fn set_dl_dst_masked(&mut self, addr: Mac, mask: Mac) {
        self.flow.dl_dst = addr.and(mask);
        self.wc.dl_dst_mask = mask;
    }

    /// Match the VLAN TCI under `mask`.
    pub fn set_vlan_tci_masked(&mut self, tci: u16, mask: u16) {
        self.flow.vlan_tci = tci & mask;
        self.wc.vlan_tci_mask = mask;
    }

    /// Match packets carrying no 802.1Q header at all.
    pub fn set_no_vlan(&mut self) {
        self.set_vlan_tci_masked(0, u16::MAX);
    }

    /// Match any packet with an 802.1Q header, regardless of VID or PCP.
    pub fn set_any_vlan(&mut self) {
        self.set_vlan_tci_masked(VLAN_CFI, VLAN_CFI);
    }

    /// Match an exact VLAN VID on tagged packets (PCP left wildcarded).
    pub fn set_vlan_vid(&mut self, vid: u16) {
        self.set_vlan_tci_masked(
            (vid & VLAN_VID_MASK) | VLAN_CFI,
            VLAN_VID_MASK | VLAN_CFI,
        );
    }

    /// Additionally match an exact VLAN PCP on tagged packets.
    pub fn set_vlan_pcp(&mut self, pcp: u8) {
        self.flow.vlan_tci |= (u16::from(pcp) << VLAN_PCP_SHIFT) & VLAN_PCP_MASK;
        self.flow.vlan_tci |= VLAN_CFI;
        self.wc.vlan_tci_mask |= VLAN_PCP_MASK | VLAN_CFI;
    }

    /// Match an exact IP protocol (or ARP opcode low byte).
    pub fn set_nw_proto(&mut self, proto: u8) {
        self.wc.flags.remove(FieldWc::NW_PROTO);
        self.flow.nw_proto = proto;
    }

    /// Match the IPv4 source under `mask`.
    pub fn set_nw_src_masked(&mut self, addr: u32, mask: u32) {
        self.flow.nw_src = addr & mask;
        self.wc.nw_src_mask = mask;
    }

    /// Match the IPv4 destination under `mask`.
    pub fn set_nw_dst_masked(&mut self, addr: u32, mask: u32) {
        self.flow.nw_dst = addr & mask;
        self.wc.nw_dst_mask = mask;
    }

    /// Match an exact DSCP value (low ECN bits of the TOS octet excluded).
    pub fn set_nw_dscp(&mut self, dscp: u8) {
        self.wc.flags.remove(FieldWc::NW_DSCP);
        self.flow.nw_tos = dscp & IP_DSCP_MASK;
    }

    /// Match an exact ECN value.
    pub fn set_nw_ecn(&mut self, ecn: u8) {
        self.wc.flags.remove(FieldWc::NW_ECN);
        self.flow.nw_ecn = ecn & IP_ECN_MASK;
    }

    /// Match an exact TTL / hop limit.
    pub fn set_nw_ttl(&mut self, ttl: u8) {
        self.wc.flags.remove(FieldWc::NW_TTL);
        self.flow.nw_ttl = ttl;
    }

    /// Match IP fragment bits under `mask`.
    pub fn set_nw_frag_masked(&mut self, frag: u8, mask: u8) {
        self.flow.nw_frag = frag & mask & NW_FRAG_MASK;
        self.wc.nw_frag_mask = mask & NW_FRAG_MASK;
    }

    /// Match an exact transport source port.
    pub fn set_tp_src(&mut self, port: u16) {
        self.set_tp_src_masked(port, u16::MAX);
    }

    /// Match the transport source port under `mask`.
    pub fn set_tp_src_masked(&mut self, port: u16, mask: u16) {
        self.flow.tp_src = port & mask;
        self.wc.tp_src_mask = mask;
    }

    /// Match an exact transport destination port.
    pub fn set_tp_dst(&mut self, port: u16) {
        self.set_tp_dst_masked(port, u16::MAX);
    }

    /// Match the transport destination port under `mask`.
    pub fn set_tp_dst_masked(&mut self, port: u16, mask: u16) {
        self.flow.tp_dst = port & mask;
        self.wc.tp_dst_mask = mask;
    }

    /// Match an exact ICMP type (stored in the transport source port).
    pub fn set_icmp_type(&mut self, icmp_type: u8) {
        self.set_tp_src(u16::from(icmp_type));
    }

    /// Match an exact ICMP code (stored in the transport destination port).
    pub fn set_icmp_code(&mut self, icmp_code: u8) {
        self.set_tp_dst(u16::from(icmp_code));
    }

    /// Match the tunnel id under `mask`.
    pub fn set_tun_id_masked(&mut self, tun_id: u64, mask: u64) {
        self.flow.tun_id = tun_id & mask;
        self.wc.tun_id_mask = mask;
    }

    /// Match register `idx` under `mask`.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= FLOW_N_REGS`; register indices come from static
    /// tables, never from the wire.
    pub fn set_reg_masked(&mut self, idx: usize, value: u32, mask: u32) {
        assert!(idx < FLOW_N_REGS, "register index {idx} out of range");
        self.flow.regs[idx] = value & mask;
        self.wc.reg_masks[idx] = mask;
    }

    /// Match an exact ARP source hardware address.
    pub fn set_arp_sha(&mut self, sha: Mac) {
        self.wc.flags.remove(FieldWc::ARP_SHA);
        self.flow.arp_sha = sha;
    }

    /// Match an exact ARP target hardware address.
    pub fn set_arp_tha(&mut self, tha: Mac) {
        self.wc.flags.remove(FieldWc::ARP_THA);
        self.flow.arp_tha = tha;
    }

    /// Match the IPv6 source under `mask`.
    pub fn set_ipv6_src_masked(&mut self, addr: u128, mask: u128) {
        self.flow.ipv6_src = addr & mask;
        self.wc.ipv6_src_mask = mask;
    }

    /// Match the IPv6 destination under `mask`.
    pub fn set_ipv6_dst_masked(&mut self, addr: u128, mask: u128) {
        self.flow.ipv6_dst = addr & mask;
        self.wc.ipv6_dst_mask = mask;
    }

    /// Match an exact IPv6 flow label.
    pub fn set_ipv6_label(&mut self, label: u32) {
        self.wc.flags.remove(FieldWc::IPV6_LABEL);
        self.flow.ipv6_label = label & 0x000f_ffff;
    }

    /// Match the neighbor-discovery target under `mask`.
    pub fn set_nd_target_masked(&mut self, target: u128, mask: u128) {
        self.flow.nd_target = target & mask;
        self.wc.nd_target_mask = mask;
    }

    /// Match an exact MPLS label.
    pub fn set_mpls_label(&mut self, label: u32) {
        self.wc.flags.remove(FieldWc::MPLS_LABEL);
        self.flow.mpls_label = label & 0x000f_ffff;
    }

    /// Match an exact MPLS traffic class.
    pub fn set_mpls_tc(&mut self, tc: u8) {
        self.wc.flags.remove(FieldWc::MPLS_TC);
        self.flow.mpls_tc = tc & 0x07;
    }

    /// Match an exact MPLS bottom-of-stack bit.
    pub fn set_mpls_stack(&mut self, stack: u8) {
        self.wc.flags.remove(FieldWc::MPLS_STACK);
        self.flow.mpls_stack = stack & 0x01;
    }

    /// Match an exact outer VLAN TPID.
    pub fn set_vlan_tpid(&mut self, tpid: u16) {
        self.wc.flags.remove(FieldWc::VLAN_TPID);
        self.flow.vlan_tpid = tpid;
    }

    /// Match an exact QinQ inner VID.
    pub fn set_vlan_qinq_vid(&mut self, vid: u16) {
        self.wc.flags.remove(FieldWc::VLAN_QINQ_VID);
        self.flow.vlan_qinq_tci =
            (self.flow.vlan_qinq_tci & !VLAN_VID_MASK) | (vid & VLAN_VID_MASK) | VLAN_CFI;
    }

    /// Match an exact QinQ inner PCP.
    pub fn set_vlan_qinq_pcp(&mut self, pcp: u8) {
        self.wc.flags.remove(FieldWc::VLAN_QINQ_PCP);
        self.flow.vlan_qinq_tci = (self.flow.vlan_qinq_tci & !VLAN_PCP_MASK)
            | ((u16::from(pcp) << VLAN_PCP_SHIFT) & VLAN_PCP_MASK)
            | VLAN_CFI;
    }

    /// Zero every value bit that its wildcard/mask says is ignored,
    /// putting the rule into canonical form.
    pub fn zero_wildcarded_fields(&mut self) {
        let f = &mut self.flow;
        let wc = &self.wc;
        if wc.flags.contains(FieldWc::IN_PORT) {
            f.in_port = 0;
        }
        if wc.flags.contains(FieldWc::DL_TYPE) {
            f.dl_type = 0;
        }
        if wc.flags.contains(FieldWc::NW_PROTO) {
            f.nw_proto = 0;
        }
        if wc.flags.contains(FieldWc::NW_DSCP) {
            f.nw_tos = 0;
        }
        if wc.flags.contains(FieldWc::NW_ECN) {
            f.nw_ecn = 0;
        }
        if wc.flags.contains(FieldWc::NW_TTL) {
            f.nw_ttl = 0;
        }
        if wc.flags.contains(FieldWc::ARP_SHA) {
            f.arp_sha = Mac::ZERO;
        }
        if wc.flags.contains(FieldWc::ARP_THA) {
            f.arp_tha = Mac::ZERO;
        }
        if wc.flags.contains(FieldWc::IPV6_LABEL) {
            f.ipv6_label = 0;
        }
        if wc.flags.contains(FieldWc::MPLS_LABEL) {
            f.mpls_label = 0;
        }
        if wc.flags.contains(FieldWc::MPLS_TC) {
            f.mpls_tc = 0;
        }
        if wc.flags.contains(FieldWc::MPLS_STACK) {
            f.mpls_stack = 0;
        }
        if wc.flags.contains(FieldWc::VLAN_TPID) {
            f.vlan_tpid = 0;
        }
        if wc.flags.contains(FieldWc::VLAN_QINQ_VID) {
            f.vlan_qinq_tci &= !(VLAN_VID_MASK | VLAN_CFI);
        }
        if wc.flags.contains(FieldWc::VLAN_QINQ_PCP) {
            f.vlan_qinq_tci &= !VLAN_PCP_MASK;
        }
        f.dl_src = f.dl_src.and(wc.dl_src_mask);
        f.dl_dst = f.dl_dst.and(wc.dl_dst_mask);
        f.vlan_tci &= wc.vlan_tci_mask;
        f.nw_src &= wc.nw_src_mask;
        f.nw_dst &= wc.nw_dst_mask;
        f.tp_src &= wc.tp_src_mask;
        f.tp_dst &= wc.tp_dst_mask;
        f.tun_id &= wc.tun_id_mask;
        f.nw_frag &= wc.nw_frag_mask;
        f.ipv6_src &= wc.ipv6_src_mask;
        f.ipv6_dst &= wc.ipv6_dst_mask;
        f.nd_target &= wc.nd_target_mask;
        for (reg, mask) in f.regs.iter_mut().zip(wc.reg_masks.iter()) {
            *reg &= *mask;
        }
    }
}

/// DSCP bits of the IP TOS octet.
pub const IP_DSCP_MASK: u8 = 0xfc;
/// ECN bits of the IP TOS octet.
pub const IP_ECN_MASK: u8 = 0x03;

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn catchall_is_canonical() {
        let mut r = Rule::catchall(DEFAULT_PRIORITY);
        let before = r;
        r.zero_wildcarded_fields();
        assert_eq!(before, r);
    }

    #[test]
    fn masked_setters_store_canonical_values() {
        let mut r = Rule::catchall(0);
        r.set_nw_src_masked(0xc0a8_01ff, 0xffff_ff00);
        assert_eq!(r.flow.nw_src, 0xc0a8_0100);
        r.set_dl_src_masked(Mac([0xff; 6]), Mac([0xff, 0xff, 0xff, 0, 0, 0]));
        assert_eq!(r.flow.dl_src, Mac([0xff, 0xff, 0xff, 0, 0, 0]));
    }

    #[test]
    fn vlan_helpers() {
        let mut r = Rule::catchall(0);
        r.set_no_vlan();
        assert_eq!(r.flow.vlan_tci, 0);
        assert_eq!(r.wc.vlan_tci_mask, 0xffff);

        let mut r = Rule::catchall(0);
        r.set_any_vlan();
        assert_eq!(r.flow.vlan_tci, VLAN_CFI);
        assert_eq!(r.wc.vlan_tci_mask, VLAN_CFI);

        let mut r = Rule::catchall(0);
        r.set_vlan_vid(100);
        r.set_vlan_pcp(5);
        assert_eq!(r.flow.vlan_tci, 100 | VLAN_CFI | (5 << VLAN_PCP_SHIFT));
        assert_eq!(r.wc.vlan_tci_mask, 0xffff);
    }

    #[test]
    fn zeroing_is_idempotent() {
        let mut r = Rule::catchall(7);
        r.set_dl_type(0x0800);
        r.set_nw_proto(6);
        r.set_tp_dst(443);
        r.flow.tp_src = 1234; // stray value under a zero mask
        r.zero_wildcarded_fields();
        assert_eq!(r.flow.tp_src, 0);
        let once = r;
        r.zero_wildcarded_fields();
        assert_eq!(once, r);
    }
}
