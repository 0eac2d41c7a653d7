// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The exact-value half of a flow match rule.

use crate::mac::Mac;

/// Number of general-purpose match registers carried per flow.
pub const FLOW_N_REGS: usize = 8;

/// `dl_type` value used for frames that carry no Ethernet type at all
/// (802.2 without SNAP).  The wire formats use the same value, so it
/// passes through codecs unchanged.
pub const DL_TYPE_NONE: u16 = 0x05ff;

/// IPv4 fragment bits in [`FlowKey::nw_frag`]: any fragment.
pub const NW_FRAG_ANY: u8 = 1 << 0;
/// IPv4 fragment bits in [`FlowKey::nw_frag`]: a later (offset != 0) fragment.
pub const NW_FRAG_LATER: u8 = 1 << 1;
/// All defined fragment bits.
pub const NW_FRAG_MASK: u8 = NW_FRAG_ANY | NW_FRAG_LATER;

/// Exact field values of a flow match.
///
/// Which of these are significant is decided by the companion
/// [`Wildcards`](crate::Wildcards): a field whose wildcard bit is set (or
/// whose mask is zero) is ignored regardless of the value stored here.
/// Multi-byte integers are host order; codecs convert at the wire
/// boundary.
///
/// Transport ports double as ICMP type (`tp_src`) and code (`tp_dst`)
/// when `nw_proto` selects ICMP, exactly as on the wire.  For ARP flows
/// `nw_proto` holds the low byte of the ARP opcode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FlowKey {
    /// Tunnel identifier (vendor-extension keyed traffic).
    pub tun_id: u64,
    /// IPv4 source address (or ARP SPA).
    pub nw_src: u32,
    /// IPv4 destination address (or ARP TPA).
    pub nw_dst: u32,
    /// IPv6 source address.
    pub ipv6_src: u128,
    /// IPv6 destination address.
    pub ipv6_dst: u128,
    /// IPv6 neighbor-discovery target.
    pub nd_target: u128,
    /// IPv6 flow label (20 bits).
    pub ipv6_label: u32,
    /// MPLS label of the outermost tag (20 bits).
    pub mpls_label: u32,
    /// General-purpose registers.
    pub regs: [u32; FLOW_N_REGS],
    /// Ingress port (16-bit OpenFlow 1.0 port space).
    pub in_port: u16,
    /// VLAN tag control information; see [`crate::tci`].
    pub vlan_tci: u16,
    /// Outer VLAN TPID for QinQ traffic.
    pub vlan_tpid: u16,
    /// Inner (QinQ) tag control information.
    pub vlan_qinq_tci: u16,
    /// Ethernet type.
    pub dl_type: u16,
    /// Transport source port / ICMP type.
    pub tp_src: u16,
    /// Transport destination port / ICMP code.
    pub tp_dst: u16,
    /// Ethernet source address.
    pub dl_src: Mac,
    /// Ethernet destination address.
    pub dl_dst: Mac,
    /// ARP source hardware address.
    pub arp_sha: Mac,
    /// ARP target hardware address.
    pub arp_tha: Mac,
    /// IP protocol (or low byte of ARP opcode).
    pub nw_proto: u8,
    /// DSCP bits of the IP TOS octet (ECN bits live in `nw_ecn`).
    pub nw_tos: u8,
    /// ECN bits of the IP TOS octet.
    pub nw_ecn: u8,
    /// IP TTL / IPv6 hop limit.
    pub nw_ttl: u8,
    /// IP fragment classification bits (`NW_FRAG_*`).
    pub nw_frag: u8,
    /// MPLS traffic class (3 bits).
    pub mpls_tc: u8,
    /// MPLS bottom-of-stack bit.
    pub mpls_stack: u8,
}

/// Well-known Ethernet type values the codecs and the normalizer branch on.
pub mod eth_type {
    /// IPv4.
    pub const IP: u16 = 0x0800;
    /// ARP.
    pub const ARP: u16 = 0x0806;
    /// IPv6.
    pub const IPV6: u16 = 0x86dd;
    /// MPLS unicast.
    pub const MPLS: u16 = 0x8847;
    /// MPLS multicast.
    pub const MPLS_MCAST: u16 = 0x8848;
    /// 802.1Q VLAN tag.
    pub const VLAN: u16 = 0x8100;
    /// 802.1ad provider tag.
    pub const VLAN_8021AD: u16 = 0x88a8;
}

/// IP protocol numbers the codecs and the normalizer branch on.
pub mod ip_proto {
    /// ICMP.
    pub const ICMP: u8 = 1;
    /// TCP.
    pub const TCP: u8 = 6;
    /// UDP.
    pub const UDP: u8 = 17;
    /// ICMPv6.
    pub const ICMPV6: u8 = 58;
    /// SCTP (recognized only to be rejected by the 1.1 match codec).
    pub const SCTP: u8 = 132;
}

/// ICMPv6 neighbor-discovery message types.
pub mod nd {
    /// Neighbor solicitation.
    pub const NEIGHBOR_SOLICIT: u16 = 135;
    /// Neighbor advertisement.
    pub const NEIGHBOR_ADVERT: u16 = 136;
}
