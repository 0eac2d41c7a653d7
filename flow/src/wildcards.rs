// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Per-field wildcard state for a flow match rule.

use crate::key::FLOW_N_REGS;
use crate::mac::Mac;

bitflags::bitflags! {
    /// Wildcard bits for the fields that are matched all-or-nothing.
    ///
    /// A set bit means the field is ignored during lookup.  Fields with
    /// partial-match support (addresses, ports, tunnel id, registers)
    /// carry explicit masks in [`Wildcards`] instead.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FieldWc: u32 {
        /// Ingress port.
        const IN_PORT = 1 << 0;
        /// Ethernet type.
        const DL_TYPE = 1 << 1;
        /// IP protocol / ARP opcode.
        const NW_PROTO = 1 << 2;
        /// IP DSCP bits.
        const NW_DSCP = 1 << 3;
        /// IP ECN bits.
        const NW_ECN = 1 << 4;
        /// IP TTL / hop limit.
        const NW_TTL = 1 << 5;
        /// ARP source hardware address.
        const ARP_SHA = 1 << 6;
        /// ARP target hardware address.
        const ARP_THA = 1 << 7;
        /// IPv6 flow label.
        const IPV6_LABEL = 1 << 8;
        /// MPLS label.
        const MPLS_LABEL = 1 << 9;
        /// MPLS traffic class.
        const MPLS_TC = 1 << 10;
        /// MPLS bottom-of-stack bit.
        const MPLS_STACK = 1 << 11;
        /// Outer VLAN TPID.
        const VLAN_TPID = 1 << 12;
        /// QinQ inner VID.
        const VLAN_QINQ_VID = 1 << 13;
        /// QinQ inner PCP.
        const VLAN_QINQ_PCP = 1 << 14;
    }
}

/// Wildcards and masks for every matchable field.
///
/// The invariant throughout the codebase: an all-zero mask (or a set
/// [`FieldWc`] bit) means the field matches anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Wildcards {
    /// All-or-nothing field wildcard bits.
    pub flags: FieldWc,
    /// IPv4 source mask (1-bits must match).
    pub nw_src_mask: u32,
    /// IPv4 destination mask.
    pub nw_dst_mask: u32,
    /// IPv6 source mask.
    pub ipv6_src_mask: u128,
    /// IPv6 destination mask.
    pub ipv6_dst_mask: u128,
    /// Neighbor-discovery target mask.
    pub nd_target_mask: u128,
    /// Tunnel id mask.
    pub tun_id_mask: u64,
    /// Per-register masks.
    pub reg_masks: [u32; FLOW_N_REGS],
    /// Ethernet source mask.
    pub dl_src_mask: Mac,
    /// Ethernet destination mask.
    pub dl_dst_mask: Mac,
    /// VLAN TCI mask.
    pub vlan_tci_mask: u16,
    /// Transport source port / ICMP type mask.
    pub tp_src_mask: u16,
    /// Transport destination port / ICMP code mask.
    pub tp_dst_mask: u16,
    /// IP fragment bits mask.
    pub nw_frag_mask: u8,
}

impl Wildcards {
    /// Wildcards that match every packet.
    #[must_use]
    pub fn catchall() -> Wildcards {
        Wildcards {
            flags: FieldWc::all(),
            nw_src_mask: 0,
            nw_dst_mask: 0,
            ipv6_src_mask: 0,
            ipv6_dst_mask: 0,
            nd_target_mask: 0,
            tun_id_mask: 0,
            reg_masks: [0; FLOW_N_REGS],
            dl_src_mask: Mac::ZERO,
            dl_dst_mask: Mac::ZERO,
            vlan_tci_mask: 0,
            tp_src_mask: 0,
            tp_dst_mask: 0,
            nw_frag_mask: 0,
        }
    }

    /// True iff every register is fully wildcarded.
    #[must_use]
    pub fn regs_fully_wildcarded(&self) -> bool {
        self.reg_masks.iter().all(|m| *m == 0)
    }
}

impl Default for Wildcards {
    fn default() -> Self {
        Wildcards::catchall()
    }
}

/// True iff `netmask` is a CIDR mask: 1-bits followed only by 0-bits.
#[must_use]
pub fn ip_is_cidr(netmask: u32) -> bool {
    let x = !netmask;
    x & x.wrapping_add(1) == 0
}

/// Given a wildcard bit count in the least-significant 6 bits of
/// `wcbits`, returns an IPv4 netmask with a 1 in each bit that must match.
///
/// The count is in the 1.0 wire convention: 0 is exact match, 1 ignores
/// the LSB, and 32 or higher wildcards the entire field.  Note this is
/// the opposite of the usual /N prefix-length convention.
#[must_use]
pub fn wcbits_to_netmask(wcbits: u32) -> u32 {
    let wcbits = wcbits & 0x3f;
    if wcbits < 32 { !((1u32 << wcbits) - 1) } else { 0 }
}

/// Returns the number of IPv4 address bits that `netmask` wildcards, a
/// value between 0 and 32 inclusive.
///
/// If `netmask` is not a CIDR mask the result is still in range but not
/// otherwise meaningful.
#[must_use]
pub fn netmask_to_wcbits(netmask: u32) -> u32 {
    netmask.trailing_zeros().min(32)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn wcbits_mask_table() {
        assert_eq!(wcbits_to_netmask(0), 0xffff_ffff);
        assert_eq!(wcbits_to_netmask(1), 0xffff_fffe);
        assert_eq!(wcbits_to_netmask(8), 0xffff_ff00);
        assert_eq!(wcbits_to_netmask(31), 0x8000_0000);
        assert_eq!(wcbits_to_netmask(32), 0);
        assert_eq!(wcbits_to_netmask(63), 0);
    }

    #[test]
    fn netmask_wcbits_inverse_on_cidr() {
        for wc in 0..=32u32 {
            let mask = wcbits_to_netmask(wc);
            assert!(ip_is_cidr(mask));
            assert_eq!(netmask_to_wcbits(mask), wc);
        }
    }

    #[test]
    fn cidr_detection() {
        assert!(ip_is_cidr(0));
        assert!(ip_is_cidr(0xffff_ffff));
        assert!(ip_is_cidr(0xffff_ff00));
        assert!(!ip_is_cidr(0xffff_00ff));
        assert!(!ip_is_cidr(0x0000_0001));
    }

    #[test]
    fn catchall_matches_nothing_exactly() {
        let wc = Wildcards::catchall();
        assert!(wc.flags.is_all());
        assert!(wc.regs_fully_wildcarded());
        assert_eq!(wc.vlan_tci_mask, 0);
    }
}
