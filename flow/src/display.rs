// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Textual form of a flow rule, in the classic comma-separated flow
//! syntax.  Consumed by normalization logging and by humans; nothing
//! parses it back.

use crate::key::{eth_type, ip_proto};
use crate::rule::{DEFAULT_PRIORITY, Rule};
use crate::tci::{VLAN_CFI, tci_to_pcp, tci_to_vid};
use crate::wildcards::FieldWc;
use std::fmt;
use std::fmt::Write as _;
use std::net::Ipv4Addr;

fn put_u32_masked(s: &mut String, name: &str, value: u32, mask: u32) {
    match mask {
        0 => {}
        u32::MAX => {
            let _ = write!(s, "{name}={}," , Ipv4Addr::from(value));
        }
        m => {
            let _ = write!(
                s,
                "{name}={}/{},",
                Ipv4Addr::from(value),
                Ipv4Addr::from(m)
            );
        }
    }
}

impl fmt::Display for Rule {
    #[allow(clippy::too_many_lines)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = String::new();
        if self.priority != DEFAULT_PRIORITY {
            let _ = write!(s, "priority={},", self.priority);
        }
        match self.wc.tun_id_mask {
            0 => {}
            u64::MAX => {
                let _ = write!(s, "tun_id={:#x},", self.flow.tun_id);
            }
            m => {
                let _ = write!(s, "tun_id={:#x}/{m:#x},", self.flow.tun_id);
            }
        }
        if !self.wc.flags.contains(FieldWc::IN_PORT) {
            let _ = write!(s, "in_port={},", self.flow.in_port);
        }
        match self.wc.vlan_tci_mask {
            0 => {}
            0xffff if self.flow.vlan_tci == 0 => s.push_str("vlan_tci=0x0000,"),
            VLAN_CFI if self.flow.vlan_tci == VLAN_CFI => s.push_str("dl_vlan=any,"),
            m => {
                if m & crate::tci::VLAN_VID_MASK != 0 {
                    let _ = write!(s, "dl_vlan={},", tci_to_vid(self.flow.vlan_tci));
                }
                if m & crate::tci::VLAN_PCP_MASK != 0 {
                    let _ = write!(s, "dl_vlan_pcp={},", tci_to_pcp(self.flow.vlan_tci));
                }
            }
        }
        if !self.wc.dl_src_mask.is_zero() {
            if self.wc.dl_src_mask.is_exact() {
                let _ = write!(s, "dl_src={},", self.flow.dl_src);
            } else {
                let _ = write!(s, "dl_src={}/{},", self.flow.dl_src, self.wc.dl_src_mask);
            }
        }
        if !self.wc.dl_dst_mask.is_zero() {
            if self.wc.dl_dst_mask.is_exact() {
                let _ = write!(s, "dl_dst={},", self.flow.dl_dst);
            } else {
                let _ = write!(s, "dl_dst={}/{},", self.flow.dl_dst, self.wc.dl_dst_mask);
            }
        }
        if !self.wc.flags.contains(FieldWc::DL_TYPE) {
            match self.flow.dl_type {
                eth_type::IP => s.push_str("ip,"),
                eth_type::ARP => s.push_str("arp,"),
                eth_type::IPV6 => s.push_str("ipv6,"),
                other => {
                    let _ = write!(s, "dl_type={other:#06x},");
                }
            }
        }
        put_u32_masked(&mut s, "nw_src", self.flow.nw_src, self.wc.nw_src_mask);
        put_u32_masked(&mut s, "nw_dst", self.flow.nw_dst, self.wc.nw_dst_mask);
        if !self.wc.flags.contains(FieldWc::NW_PROTO) {
            match (self.flow.dl_type, self.flow.nw_proto) {
                (eth_type::IP | eth_type::IPV6, ip_proto::TCP) => s.push_str("tcp,"),
                (eth_type::IP | eth_type::IPV6, ip_proto::UDP) => s.push_str("udp,"),
                (eth_type::IP, ip_proto::ICMP) => s.push_str("icmp,"),
                (_, p) => {
                    let _ = write!(s, "nw_proto={p},");
                }
            }
        }
        if !self.wc.flags.contains(FieldWc::NW_DSCP) {
            let _ = write!(s, "nw_tos={},", self.flow.nw_tos);
        }
        if !self.wc.flags.contains(FieldWc::NW_ECN) {
            let _ = write!(s, "nw_ecn={},", self.flow.nw_ecn);
        }
        if !self.wc.flags.contains(FieldWc::NW_TTL) {
            let _ = write!(s, "nw_ttl={},", self.flow.nw_ttl);
        }
        if self.wc.nw_frag_mask != 0 {
            let _ = write!(
                s,
                "nw_frag={:#x}/{:#x},",
                self.flow.nw_frag, self.wc.nw_frag_mask
            );
        }
        match self.wc.tp_src_mask {
            0 => {}
            u16::MAX => {
                let _ = write!(s, "tp_src={},", self.flow.tp_src);
            }
            m => {
                let _ = write!(s, "tp_src={:#x}/{m:#x},", self.flow.tp_src);
            }
        }
        match self.wc.tp_dst_mask {
            0 => {}
            u16::MAX => {
                let _ = write!(s, "tp_dst={},", self.flow.tp_dst);
            }
            m => {
                let _ = write!(s, "tp_dst={:#x}/{m:#x},", self.flow.tp_dst);
            }
        }
        if !self.wc.flags.contains(FieldWc::ARP_SHA) {
            let _ = write!(s, "arp_sha={},", self.flow.arp_sha);
        }
        if !self.wc.flags.contains(FieldWc::ARP_THA) {
            let _ = write!(s, "arp_tha={},", self.flow.arp_tha);
        }
        for (i, mask) in self.wc.reg_masks.iter().enumerate() {
            match *mask {
                0 => {}
                u32::MAX => {
                    let _ = write!(s, "reg{i}={:#x},", self.flow.regs[i]);
                }
                m => {
                    let _ = write!(s, "reg{i}={:#x}/{m:#x},", self.flow.regs[i]);
                }
            }
        }
        if self.wc.ipv6_src_mask != 0 {
            let _ = write!(s, "ipv6_src={:#x},", self.flow.ipv6_src);
        }
        if self.wc.ipv6_dst_mask != 0 {
            let _ = write!(s, "ipv6_dst={:#x},", self.flow.ipv6_dst);
        }
        if !self.wc.flags.contains(FieldWc::IPV6_LABEL) {
            let _ = write!(s, "ipv6_label={:#x},", self.flow.ipv6_label);
        }
        if !self.wc.flags.contains(FieldWc::MPLS_LABEL) {
            let _ = write!(s, "mpls_label={},", self.flow.mpls_label);
        }
        if !self.wc.flags.contains(FieldWc::MPLS_TC) {
            let _ = write!(s, "mpls_tc={},", self.flow.mpls_tc);
        }
        if !self.wc.flags.contains(FieldWc::MPLS_STACK) {
            let _ = write!(s, "mpls_stack={},", self.flow.mpls_stack);
        }
        if self.wc.nd_target_mask != 0 {
            let _ = write!(s, "nd_target={:#x},", self.flow.nd_target);
        }
        if !self.wc.flags.contains(FieldWc::VLAN_TPID) {
            let _ = write!(s, "dl_tpid={:#06x},", self.flow.vlan_tpid);
        }
        if !self.wc.flags.contains(FieldWc::VLAN_QINQ_VID) {
            let _ = write!(s, "dl_vlan_qinq={},", tci_to_vid(self.flow.vlan_qinq_tci));
        }
        if !self.wc.flags.contains(FieldWc::VLAN_QINQ_PCP) {
            let _ = write!(s, "dl_vlan_qinq_pcp={},", tci_to_pcp(self.flow.vlan_qinq_tci));
        }
        if s.is_empty() {
            s.push_str("any");
        } else {
            s.pop(); // trailing comma
        }
        f.write_str(&s)
    }
}

#[cfg(test)]
mod test {
    use crate::rule::Rule;

    #[test]
    fn catchall_renders_any() {
        assert_eq!(Rule::catchall(crate::rule::DEFAULT_PRIORITY).to_string(), "any");
    }

    #[test]
    fn tcp_flow_renders_in_order() {
        let mut r = Rule::catchall(100);
        r.set_in_port(3);
        r.set_dl_type(0x0800);
        r.set_nw_proto(6);
        r.set_nw_dst_masked(0x0a00_0000, 0xff00_0000);
        r.set_tp_dst(443);
        assert_eq!(
            r.to_string(),
            "priority=100,in_port=3,ip,nw_dst=10.0.0.0/255.0.0.0,tcp,tp_dst=443"
        );
    }
}
