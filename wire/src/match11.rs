// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The OpenFlow 1.1 fixed-field match codec and the match-header
//! dispatcher shared with the 1.2 extensible match.
//!
//! Unlike 1.0, this format carries explicit per-bit masks for the
//! Ethernet and IPv4 addresses — inverted on the wire (a 1-bit means
//! "ignore") — and real sentinels for the VLAN cases: `OFPVID_NONE`
//! means "no tag present", `OFPVID_ANY` means "some tag, any VID".

use crate::cursor::Reader;
use crate::error::OfpErr;
use crate::header::OFP12_VERSION;
use crate::msg::MsgBuf;
use crate::nx_match::{self, CookiePair};
use crate::port::{port_from_ofp11, port_to_ofp11};
use flow::key::{eth_type, ip_proto};
use flow::rule::IP_DSCP_MASK;
use flow::tci::{VLAN_CFI, VLAN_PCP_MASK, VLAN_VID_MASK, tci_to_pcp, tci_to_vid};
use flow::{FieldWc, FlowKey, Rule};

/// Match type for the 1.1 fixed-layout match.
pub const OFPMT_STANDARD: u16 = 0;
/// Match type announcing the extensible TLV match.
pub const OFPMT_OXM: u16 = 1;

/// Total wire size of the standard 1.1 match, header included.
pub const OFP11_MATCH_LEN: usize = 88;
/// Size of the match header that precedes either encoding.
pub const OFP11_MATCH_HEADER_LEN: usize = 4;

/// `dl_vlan` sentinel: match only packets without a VLAN tag.
pub const OFPVID11_NONE: u16 = 0xffff;
/// `dl_vlan` sentinel: match any packet with a VLAN tag.
pub const OFPVID11_ANY: u16 = 0xfffe;

/// OFPFW11_* wildcard bits.
pub mod ofpfw11 {
    pub const IN_PORT: u32 = 1 << 0;
    pub const DL_VLAN: u32 = 1 << 1;
    pub const DL_VLAN_PCP: u32 = 1 << 2;
    pub const DL_TYPE: u32 = 1 << 3;
    pub const NW_TOS: u32 = 1 << 4;
    pub const NW_PROTO: u32 = 1 << 5;
    pub const TP_SRC: u32 = 1 << 6;
    pub const TP_DST: u32 = 1 << 7;
    pub const MPLS_LABEL: u32 = 1 << 8;
    pub const MPLS_TC: u32 = 1 << 9;
    pub const ALL: u32 = (1 << 10) - 1;
}

/// Converts the standard 1.1 match body (everything after the 4-byte
/// match header) into a rule with the given `priority`.
///
/// # Errors
///
/// Rejects invalid VIDs/PCPs/TOS values, ICMP types and codes above 255,
/// SCTP transport matches, partial MPLS wildcarding, and any metadata
/// match, each with the protocol's own error code.
#[allow(clippy::too_many_lines)]
pub fn rule_from_match11(r: &mut Reader<'_>, priority: u16) -> Result<Rule, OfpErr> {
    let len = |_| OfpErr::BadMatchLen;
    let in_port = r.u32().map_err(len)?;
    let wc = r.u32().map_err(len)?;
    let dl_src = r.mac().map_err(len)?;
    let dl_src_mask = r.mac().map_err(len)?;
    let dl_dst = r.mac().map_err(len)?;
    let dl_dst_mask = r.mac().map_err(len)?;
    let dl_vlan = r.u16().map_err(len)?;
    let dl_vlan_pcp = r.u8().map_err(len)?;
    r.skip(1).map_err(len)?;
    let dl_type = r.u16().map_err(len)?;
    let nw_tos = r.u8().map_err(len)?;
    let nw_proto = r.u8().map_err(len)?;
    let nw_src = r.u32().map_err(len)?;
    let nw_src_mask = r.u32().map_err(len)?;
    let nw_dst = r.u32().map_err(len)?;
    let nw_dst_mask = r.u32().map_err(len)?;
    let tp_src = r.u16().map_err(len)?;
    let tp_dst = r.u16().map_err(len)?;
    let mpls_label = r.u32().map_err(len)?;
    let mpls_tc = r.u8().map_err(len)?;
    r.skip(3).map_err(len)?;
    let _metadata = r.u64().map_err(len)?;
    let metadata_mask = r.u64().map_err(len)?;

    let mut rule = Rule::catchall(priority);

    if wc & ofpfw11::IN_PORT == 0 {
        let port = port_from_ofp11(in_port).map_err(|_| OfpErr::BadMatchValue)?;
        rule.set_in_port(port);
    }

    // Address masks arrive inverted: a wire 1-bit means "ignore".
    rule.set_dl_src_masked(dl_src, dl_src_mask.not());
    rule.set_dl_dst_masked(dl_dst, dl_dst_mask.not());

    if wc & ofpfw11::DL_VLAN == 0 {
        if dl_vlan == OFPVID11_NONE {
            // Match only packets without a VLAN tag.
            rule.set_no_vlan();
        } else {
            if dl_vlan == OFPVID11_ANY {
                // Match any packet with a VLAN tag regardless of VID.
                rule.set_any_vlan();
            } else if dl_vlan < 4096 {
                rule.set_vlan_vid(dl_vlan);
            } else {
                return Err(OfpErr::BadMatchValue);
            }

            if wc & ofpfw11::DL_VLAN_PCP == 0 {
                if dl_vlan_pcp <= 7 {
                    rule.set_vlan_pcp(dl_vlan_pcp);
                } else {
                    return Err(OfpErr::BadMatchValue);
                }
            }
        }
    }

    if wc & ofpfw11::DL_TYPE == 0 {
        rule.set_dl_type(dl_type);
    }

    let ipv4 = rule.flow.dl_type == eth_type::IP;
    let arp = rule.flow.dl_type == eth_type::ARP;

    if ipv4 && wc & ofpfw11::NW_TOS == 0 {
        if nw_tos & !IP_DSCP_MASK != 0 {
            return Err(OfpErr::BadMatchValue);
        }
        rule.set_nw_dscp(nw_tos);
    }

    if ipv4 || arp {
        if wc & ofpfw11::NW_PROTO == 0 {
            rule.set_nw_proto(nw_proto);
        }
        rule.set_nw_src_masked(nw_src, !nw_src_mask);
        rule.set_nw_dst_masked(nw_dst, !nw_dst_mask);
    }

    const TP_ALL: u32 = ofpfw11::TP_SRC | ofpfw11::TP_DST;
    if ipv4 && wc & TP_ALL != TP_ALL {
        match rule.flow.nw_proto {
            // The spec says transport ports are only meaningful for TCP,
            // UDP, and SCTP, but dropping ICMP would regress from 1.0:
            // its type and code ride in the port fields.
            ip_proto::ICMP => {
                if wc & ofpfw11::TP_SRC == 0 {
                    let icmp_type = tp_src;
                    if icmp_type < 0x100 {
                        #[allow(clippy::cast_possible_truncation)] // checked above
                        rule.set_icmp_type(icmp_type as u8);
                    } else {
                        return Err(OfpErr::BadMatchField);
                    }
                }
                if wc & ofpfw11::TP_DST == 0 {
                    let icmp_code = tp_dst;
                    if icmp_code < 0x100 {
                        #[allow(clippy::cast_possible_truncation)] // checked above
                        rule.set_icmp_code(icmp_code as u8);
                    } else {
                        return Err(OfpErr::BadMatchField);
                    }
                }
            }
            ip_proto::TCP | ip_proto::UDP => {
                if wc & ofpfw11::TP_SRC == 0 {
                    rule.set_tp_src(tp_src);
                }
                if wc & ofpfw11::TP_DST == 0 {
                    rule.set_tp_dst(tp_dst);
                }
            }
            // SCTP matching is unimplemented, and 1.1 implementations are
            // supposed to tell the controller rather than ignore it.
            ip_proto::SCTP => return Err(OfpErr::BadMatchField),
            // The spec says explicitly to ignore this.
            _ => {}
        }
    }

    if matches!(rule.flow.dl_type, eth_type::MPLS | eth_type::MPLS_MCAST) {
        const MPLS_ALL: u32 = ofpfw11::MPLS_LABEL | ofpfw11::MPLS_TC;
        if wc & MPLS_ALL != MPLS_ALL {
            // MPLS matching through this encoding is unsupported;
            // anything but full wildcarding would be silently wrong.
            return Err(OfpErr::BadMatchTag);
        }
    }

    if metadata_mask != u64::MAX {
        // The metadata field has no internal counterpart yet.
        return Err(OfpErr::BadMatchField);
    }

    Ok(rule)
}

/// Appends `rule` as a standard 1.1 match, header included.
#[allow(clippy::too_many_lines)]
pub fn put_match11(rule: &Rule, b: &mut MsgBuf) {
    let mut wc = 0u32;

    b.put_u16(OFPMT_STANDARD);
    #[allow(clippy::cast_possible_truncation)] // fixed 88-byte layout
    b.put_u16(OFP11_MATCH_LEN as u16);

    if rule.wc.flags.contains(FieldWc::IN_PORT) {
        wc |= ofpfw11::IN_PORT;
        b.put_u32(0);
    } else {
        b.put_u32(port_to_ofp11(rule.flow.in_port));
    }

    // Wildcard word placement: remember where, fill in at the end.
    let wc_at = b.len();
    b.put_u32(0);

    b.put_mac(rule.flow.dl_src);
    b.put_mac(rule.wc.dl_src_mask.not());
    b.put_mac(rule.flow.dl_dst);
    b.put_mac(rule.wc.dl_dst_mask.not());

    let mut dl_vlan = 0u16;
    let mut dl_vlan_pcp = 0u8;
    if rule.wc.vlan_tci_mask == 0 {
        wc |= ofpfw11::DL_VLAN | ofpfw11::DL_VLAN_PCP;
    } else if rule.wc.vlan_tci_mask & VLAN_CFI != 0 && rule.flow.vlan_tci & VLAN_CFI == 0 {
        dl_vlan = OFPVID11_NONE;
        wc |= ofpfw11::DL_VLAN_PCP;
    } else {
        if rule.wc.vlan_tci_mask & VLAN_VID_MASK == 0 {
            dl_vlan = OFPVID11_ANY;
        } else {
            dl_vlan = tci_to_vid(rule.flow.vlan_tci);
        }
        if rule.wc.vlan_tci_mask & VLAN_PCP_MASK == 0 {
            wc |= ofpfw11::DL_VLAN_PCP;
        } else {
            dl_vlan_pcp = tci_to_pcp(rule.flow.vlan_tci);
        }
    }
    b.put_u16(dl_vlan);
    b.put_u8(dl_vlan_pcp);
    b.put_zeros(1);

    if rule.wc.flags.contains(FieldWc::DL_TYPE) {
        wc |= ofpfw11::DL_TYPE;
        b.put_u16(0);
    } else {
        b.put_u16(rule.flow.dl_type);
    }

    if rule.wc.flags.contains(FieldWc::NW_DSCP) {
        wc |= ofpfw11::NW_TOS;
        b.put_u8(0);
    } else {
        b.put_u8(rule.flow.nw_tos & IP_DSCP_MASK);
    }

    if rule.wc.flags.contains(FieldWc::NW_PROTO) {
        wc |= ofpfw11::NW_PROTO;
        b.put_u8(0);
    } else {
        b.put_u8(rule.flow.nw_proto);
    }

    b.put_u32(rule.flow.nw_src);
    b.put_u32(!rule.wc.nw_src_mask);
    b.put_u32(rule.flow.nw_dst);
    b.put_u32(!rule.wc.nw_dst_mask);

    if rule.wc.tp_src_mask == 0 {
        wc |= ofpfw11::TP_SRC;
        b.put_u16(0);
    } else {
        b.put_u16(rule.flow.tp_src);
    }
    if rule.wc.tp_dst_mask == 0 {
        wc |= ofpfw11::TP_DST;
        b.put_u16(0);
    } else {
        b.put_u16(rule.flow.tp_dst);
    }

    // MPLS matching is not expressible here.
    wc |= ofpfw11::MPLS_LABEL | ofpfw11::MPLS_TC;
    b.put_u32(0);
    b.put_u8(0);
    b.put_zeros(3);

    // Metadata: unsupported, fully wildcarded.
    b.put_u64(0);
    b.put_u64(u64::MAX);

    b.set_u32_at(wc_at, wc);
}

/// What a pulled 1.1/1.2 match produced besides the rule itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PulledMatch {
    /// The decoded rule.
    pub rule: Rule,
    /// Cookie match carried inside an extensible match, if any.
    pub cookie: CookiePair,
    /// Bytes of the match region including padding, for locating the
    /// payload that follows.
    pub padded_len: usize,
}

/// Pulls a 1.1+ match (standard or extensible, per its header) off `r`.
///
/// `max_version` gates the extensible form: a pre-1.2 message announcing
/// OXM is a [`OfpErr::BadMatchType`].
///
/// # Errors
///
/// Propagates the underlying codec errors; a truncated or lying match
/// header is [`OfpErr::BadMatchLen`].
pub fn pull_match11(
    r: &mut Reader<'_>,
    priority: u16,
    max_version: u8,
) -> Result<PulledMatch, OfpErr> {
    if r.remaining() < OFP11_MATCH_HEADER_LEN {
        return Err(OfpErr::BadMatchLen);
    }
    let mut peek = r.clone();
    let match_type = peek.u16().map_err(|_| OfpErr::BadMatchLen)?;
    let match_len = peek.u16().map_err(|_| OfpErr::BadMatchLen)? as usize;

    match match_type {
        OFPMT_STANDARD => {
            if match_len != OFP11_MATCH_LEN || r.remaining() < OFP11_MATCH_LEN {
                return Err(OfpErr::BadMatchLen);
            }
            r.skip(OFP11_MATCH_HEADER_LEN).map_err(|_| OfpErr::BadMatchLen)?;
            let rule = rule_from_match11(r, priority)?;
            Ok(PulledMatch { rule, cookie: CookiePair::default(), padded_len: OFP11_MATCH_LEN })
        }
        OFPMT_OXM => {
            if max_version < OFP12_VERSION {
                return Err(OfpErr::BadMatchType);
            }
            if match_len < OFP11_MATCH_HEADER_LEN {
                return Err(OfpErr::BadMatchLen);
            }
            r.skip(OFP11_MATCH_HEADER_LEN).map_err(|_| OfpErr::BadMatchLen)?;
            let body_len = match_len - OFP11_MATCH_HEADER_LEN;
            let (rule, cookie) = nx_match::pull_match(
                r,
                body_len,
                OFP11_MATCH_HEADER_LEN,
                priority,
                nx_match::PullMode::Strict,
            )?;
            Ok(PulledMatch {
                rule,
                cookie,
                padded_len: nx_match::padded_match_len(body_len, OFP11_MATCH_HEADER_LEN)
                    + OFP11_MATCH_HEADER_LEN,
            })
        }
        _ => Err(OfpErr::BadMatchType),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use flow::Mac;
    use pretty_assertions::assert_eq;

    fn round_trip(rule: &Rule) -> Rule {
        let mut b = MsgBuf::default();
        put_match11(rule, &mut b);
        assert_eq!(b.len(), OFP11_MATCH_LEN);
        let mut r = Reader::new(b.as_slice());
        let pulled = pull_match11(&mut r, rule.priority, OFP12_VERSION).unwrap();
        assert_eq!(pulled.padded_len, OFP11_MATCH_LEN);
        pulled.rule
    }

    #[test]
    fn masked_ethernet_round_trips() {
        let mut r = Rule::catchall(9);
        r.set_dl_src_masked(Mac([2, 0, 0, 0, 0, 7]), Mac([0xff, 0xff, 0, 0, 0, 0xff]));
        r.set_dl_dst_masked(Mac([4; 6]), Mac::BROADCAST);
        assert_eq!(round_trip(&r), r);
    }

    #[test]
    fn vlan_sentinels_round_trip() {
        let mut none = Rule::catchall(1);
        none.set_no_vlan();
        assert_eq!(round_trip(&none), none);

        let mut any = Rule::catchall(1);
        any.set_any_vlan();
        assert_eq!(round_trip(&any), any);

        let mut vid = Rule::catchall(1);
        vid.set_vlan_vid(100);
        vid.set_vlan_pcp(3);
        assert_eq!(round_trip(&vid), vid);
    }

    #[test]
    fn any_vlan_uses_the_any_sentinel_on_the_wire() {
        let mut any = Rule::catchall(1);
        any.set_any_vlan();
        let mut b = MsgBuf::default();
        put_match11(&any, &mut b);
        // dl_vlan sits right after header(4) + in_port(4) + wc(4) +
        // 4 * 6 bytes of addresses and masks.
        let off = 4 + 4 + 4 + 24;
        let dl_vlan = u16::from_be_bytes([b.as_slice()[off], b.as_slice()[off + 1]]);
        assert_eq!(dl_vlan, OFPVID11_ANY);
    }

    #[test]
    fn icmp_ports_reinterpreted() {
        let mut r = Rule::catchall(1);
        r.set_dl_type(eth_type::IP);
        r.set_nw_proto(ip_proto::ICMP);
        r.set_icmp_type(8);
        r.set_icmp_code(0);
        assert_eq!(round_trip(&r), r);
    }

    fn raw_match11(mutate: impl FnOnce(&mut [u8])) -> Result<Rule, OfpErr> {
        let mut r = Rule::catchall(1);
        r.set_dl_type(eth_type::IP);
        let mut b = MsgBuf::default();
        put_match11(&r, &mut b);
        mutate(b.as_mut_slice());
        pull_match11(&mut Reader::new(b.as_slice()), 1, OFP12_VERSION).map(|p| p.rule)
    }

    fn clear_wc_bits(bytes: &mut [u8], clear: u32) {
        // The wildcard word sits at offset 8 (after the match header and
        // in_port).
        let wc = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) & !clear;
        bytes[8..12].copy_from_slice(&wc.to_be_bytes());
    }

    #[test]
    fn sctp_rejected() {
        let got = raw_match11(|bytes| {
            bytes[43] = ip_proto::SCTP; // nw_proto
            clear_wc_bits(bytes, ofpfw11::NW_PROTO | ofpfw11::TP_SRC | ofpfw11::TP_DST);
        });
        assert_eq!(got, Err(OfpErr::BadMatchField));
    }

    #[test]
    fn metadata_match_rejected() {
        let got = raw_match11(|bytes| {
            // metadata_mask is the final 8 bytes; anything but all-ones
            // constitutes a metadata match.
            let len = bytes.len();
            bytes[len - 8..].copy_from_slice(&0u64.to_be_bytes());
        });
        assert_eq!(got, Err(OfpErr::BadMatchField));
    }

    #[test]
    fn partial_mpls_wildcard_rejected() {
        let got = raw_match11(|bytes| {
            bytes[40..42].copy_from_slice(&eth_type::MPLS.to_be_bytes()); // dl_type
            clear_wc_bits(bytes, ofpfw11::MPLS_LABEL);
        });
        assert_eq!(got, Err(OfpErr::BadMatchTag));
    }

    #[test]
    fn invalid_vid_rejected() {
        let got = raw_match11(|bytes| {
            // 5000 is neither a sentinel nor < 4096.
            bytes[36..38].copy_from_slice(&5000u16.to_be_bytes()); // dl_vlan
            clear_wc_bits(bytes, ofpfw11::DL_VLAN);
        });
        assert_eq!(got, Err(OfpErr::BadMatchValue));
    }

    #[test]
    fn oxm_rejected_below_version_12() {
        let mut b = MsgBuf::default();
        b.put_u16(OFPMT_OXM);
        b.put_u16(4);
        b.put_u32(0);
        let got = pull_match11(&mut Reader::new(b.as_slice()), 0, crate::header::OFP11_VERSION);
        assert_eq!(got.map(|p| p.rule), Err(OfpErr::BadMatchType));
    }

    #[test]
    fn unknown_match_type_rejected() {
        let mut b = MsgBuf::default();
        b.put_u16(7);
        b.put_u16(8);
        b.put_u32(0);
        let got = pull_match11(&mut Reader::new(b.as_slice()), 0, OFP12_VERSION);
        assert_eq!(got.map(|p| p.rule), Err(OfpErr::BadMatchType));
    }
}
