// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Flow rule normalization.
//!
//! A decoded rule may carry masks for fields that have no meaning for the
//! protocol stack the rule selects (a TCP port match on an ARP flow, for
//! instance).  Normalization computes the set of fields that are legal
//! given `dl_type`/`nw_proto` and clears the masks of everything else.

use crate::key::{eth_type, ip_proto, nd};
use crate::rule::Rule;
use crate::wildcards::FieldWc;
use tracing::info;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct MayMatch: u32 {
        const NW_ADDR   = 1 << 0; // nw_src, nw_dst
        const TP_ADDR   = 1 << 1; // tp_src, tp_dst
        const NW_PROTO  = 1 << 2;
        const IPVX      = 1 << 3; // tos, ecn, ttl, frag
        const ARP_SHA   = 1 << 4;
        const ARP_THA   = 1 << 5;
        const IPV6      = 1 << 6; // ipv6_src, ipv6_dst, ipv6_label
        const ND_TARGET = 1 << 7;
        const MPLS      = 1 << 8;
        const VLAN_QINQ = 1 << 9;
    }
}

fn may_match(rule: &Rule) -> MayMatch {
    match rule.flow.dl_type {
        eth_type::IP => {
            let mut may = MayMatch::NW_PROTO | MayMatch::IPVX | MayMatch::NW_ADDR;
            if matches!(
                rule.flow.nw_proto,
                ip_proto::TCP | ip_proto::UDP | ip_proto::ICMP
            ) {
                may |= MayMatch::TP_ADDR;
            }
            may
        }
        eth_type::IPV6 => {
            let mut may = MayMatch::NW_PROTO | MayMatch::IPVX | MayMatch::IPV6;
            match rule.flow.nw_proto {
                ip_proto::TCP | ip_proto::UDP => may |= MayMatch::TP_ADDR,
                ip_proto::ICMPV6 => {
                    may |= MayMatch::TP_ADDR;
                    if rule.flow.tp_src == nd::NEIGHBOR_SOLICIT {
                        may |= MayMatch::ND_TARGET | MayMatch::ARP_SHA;
                    } else if rule.flow.tp_src == nd::NEIGHBOR_ADVERT {
                        may |= MayMatch::ND_TARGET | MayMatch::ARP_THA;
                    }
                }
                _ => {}
            }
            may
        }
        eth_type::ARP => {
            MayMatch::NW_PROTO | MayMatch::NW_ADDR | MayMatch::ARP_SHA | MayMatch::ARP_THA
        }
        eth_type::MPLS | eth_type::MPLS_MCAST => MayMatch::MPLS,
        _ => {
            if matches!(
                rule.flow.vlan_tpid,
                eth_type::VLAN | eth_type::VLAN_8021AD
            ) && rule.flow.vlan_qinq_tci != 0
            {
                MayMatch::VLAN_QINQ
            } else {
                MayMatch::empty()
            }
        }
    }
}

/// Normalizes the wildcards in `rule` so that only fields legal for the
/// resolved protocol stack remain matched, then re-canonicalizes the
/// rule.  Idempotent.  Logs the before/after text when anything changed.
pub fn normalize(rule: &mut Rule) {
    let may = may_match(rule);

    // Clear the fields that may not be matched.
    let mut wc = rule.wc;
    if !may.contains(MayMatch::NW_ADDR) {
        wc.nw_src_mask = 0;
        wc.nw_dst_mask = 0;
    }
    if !may.contains(MayMatch::TP_ADDR) {
        wc.tp_src_mask = 0;
        wc.tp_dst_mask = 0;
    }
    if !may.contains(MayMatch::NW_PROTO) {
        wc.flags.insert(FieldWc::NW_PROTO);
    }
    if !may.contains(MayMatch::IPVX) {
        wc.flags
            .insert(FieldWc::NW_DSCP | FieldWc::NW_ECN | FieldWc::NW_TTL);
        wc.nw_frag_mask = 0;
    }
    if !may.contains(MayMatch::ARP_SHA) {
        wc.flags.insert(FieldWc::ARP_SHA);
    }
    if !may.contains(MayMatch::ARP_THA) {
        wc.flags.insert(FieldWc::ARP_THA);
    }
    if !may.contains(MayMatch::IPV6) {
        wc.ipv6_src_mask = 0;
        wc.ipv6_dst_mask = 0;
        wc.flags.insert(FieldWc::IPV6_LABEL);
    }
    if !may.contains(MayMatch::ND_TARGET) {
        wc.nd_target_mask = 0;
    }
    if !may.contains(MayMatch::MPLS) {
        wc.flags
            .insert(FieldWc::MPLS_LABEL | FieldWc::MPLS_TC | FieldWc::MPLS_STACK);
    }
    if !may.contains(MayMatch::VLAN_QINQ) {
        wc.flags.insert(
            FieldWc::VLAN_TPID | FieldWc::VLAN_QINQ_VID | FieldWc::VLAN_QINQ_PCP,
        );
    }

    if wc != rule.wc {
        let pre = rule.to_string();
        rule.wc = wc;
        rule.zero_wildcarded_fields();
        info!("normalization changed flow match, pre: {pre} post: {rule}");
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mac::Mac;
    use pretty_assertions::assert_eq;

    #[test]
    fn idempotent() {
        let mut r = Rule::catchall(5);
        r.set_dl_type(eth_type::IP);
        r.set_nw_proto(ip_proto::TCP);
        r.set_tp_dst(80);
        r.set_arp_sha(Mac([1; 6])); // illegal for IP, must be dropped
        normalize(&mut r);
        let once = r;
        normalize(&mut r);
        assert_eq!(once, r);
    }

    #[test]
    fn arp_keeps_addresses_drops_ports() {
        let mut r = Rule::catchall(5);
        r.set_dl_type(eth_type::ARP);
        r.set_nw_src_masked(0x0a00_0001, u32::MAX);
        r.set_tp_src(80);
        r.set_tp_dst(443);
        normalize(&mut r);
        assert_eq!(r.wc.nw_src_mask, u32::MAX);
        assert_eq!(r.flow.nw_src, 0x0a00_0001);
        assert_eq!(r.wc.tp_src_mask, 0);
        assert_eq!(r.wc.tp_dst_mask, 0);
        assert_eq!(r.flow.tp_src, 0);
        assert_eq!(r.flow.tp_dst, 0);
    }

    #[test]
    fn non_ip_drops_transport_and_network() {
        let mut r = Rule::catchall(5);
        r.set_dl_type(0x88cc); // LLDP
        r.set_nw_proto(6);
        r.set_tp_dst(80);
        r.set_nw_dst_masked(0x0a00_0000, 0xff00_0000);
        normalize(&mut r);
        assert!(r.wc.flags.contains(FieldWc::NW_PROTO));
        assert_eq!(r.wc.tp_dst_mask, 0);
        assert_eq!(r.wc.nw_dst_mask, 0);
    }

    #[test]
    fn icmpv6_nd_gates_target_fields() {
        let mut r = Rule::catchall(5);
        r.set_dl_type(eth_type::IPV6);
        r.set_nw_proto(ip_proto::ICMPV6);
        r.set_icmp_type(135); // neighbor solicitation
        r.set_nd_target_masked(1, u128::MAX);
        r.set_arp_sha(Mac([2; 6]));
        normalize(&mut r);
        assert_eq!(r.wc.nd_target_mask, u128::MAX);
        assert!(!r.wc.flags.contains(FieldWc::ARP_SHA));
        assert!(r.wc.flags.contains(FieldWc::ARP_THA));

        // An advertisement keeps THA instead.
        let mut r = Rule::catchall(5);
        r.set_dl_type(eth_type::IPV6);
        r.set_nw_proto(ip_proto::ICMPV6);
        r.set_icmp_type(136);
        r.set_arp_tha(Mac([2; 6]));
        normalize(&mut r);
        assert!(!r.wc.flags.contains(FieldWc::ARP_THA));
        assert!(r.wc.flags.contains(FieldWc::ARP_SHA));
    }

    #[test]
    fn mpls_keeps_only_mpls() {
        let mut r = Rule::catchall(5);
        r.set_dl_type(eth_type::MPLS);
        r.set_mpls_label(42);
        r.set_nw_dst_masked(0x0a00_0000, 0xff00_0000);
        normalize(&mut r);
        assert!(!r.wc.flags.contains(FieldWc::MPLS_LABEL));
        assert_eq!(r.flow.mpls_label, 42);
        assert_eq!(r.wc.nw_dst_mask, 0);
    }

    #[test]
    fn already_normal_rule_untouched() {
        let mut r = Rule::catchall(5);
        r.set_dl_type(eth_type::IP);
        r.set_nw_proto(ip_proto::UDP);
        r.set_tp_src_masked(53, u16::MAX);
        let before = r;
        normalize(&mut r);
        assert_eq!(before, r);
    }

    #[test]
    fn idempotent_for_arbitrary_field_combinations() {
        bolero::check!().with_type().cloned().for_each(
            |(dl_type, nw_proto, tp_src, tp_dst, nw_src, mask): (u16, u8, u16, u16, u32, u32)| {
                let mut r = Rule::catchall(1);
                r.set_dl_type(dl_type);
                r.set_nw_proto(nw_proto);
                r.set_tp_src(tp_src);
                r.set_tp_dst(tp_dst);
                r.set_nw_src_masked(nw_src, mask);
                normalize(&mut r);
                let once = r;
                normalize(&mut r);
                assert_eq!(once, r);
            },
        );
    }

    #[tracing_test::traced_test]
    #[test]
    fn change_is_logged() {
        let mut r = Rule::catchall(5);
        r.set_dl_type(0x88cc);
        r.set_tp_dst(80);
        normalize(&mut r);
        assert!(logs_contain("normalization changed flow match"));
    }
}
