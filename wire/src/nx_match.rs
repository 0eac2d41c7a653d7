// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The extensible tag-length-value match codec.
//!
//! Entries are 32-bit headers — class (16), field (7), has-mask (1),
//! payload length (8) — followed by the value and, when has-mask is set,
//! a mask of the same width.  The Nicira dialect uses classes 0x0000 and
//! 0x0001; the 1.2 extensible match wraps the same entry format under an
//! `OFPMT_OXM` match header with class 0x8000 for the standardized
//! fields, falling back to the vendor class for fields 1.2 never
//! standardized (registers, tunnel id, fragments, cookie).
//!
//! This is the only encoding able to express every field of a flow rule,
//! and the only one that can carry a cookie match (out-of-band from the
//! match itself, as a vendor-class entry).

use crate::cursor::Reader;
use crate::error::OfpErr;
use crate::msg::MsgBuf;
use flow::key::{FLOW_N_REGS, eth_type, ip_proto, nd};
use flow::rule::{IP_DSCP_MASK, IP_ECN_MASK};
use flow::tci::{VLAN_CFI, VLAN_PCP_MASK, VLAN_PCP_SHIFT, VLAN_VID_MASK};
use flow::{FieldWc, Mac, Rule};

/// The Nicira standard class.
pub const NXM0: u16 = 0x0000;
/// The Nicira extended class.
pub const NXM1: u16 = 0x0001;
/// The OpenFlow 1.2 basic class.
pub const OXM_BASIC: u16 = 0x8000;

/// The 1.2 VLAN-VID tag-present bit.
pub const OFPVID_PRESENT: u16 = 0x1000;

/// How strictly to treat unknown fields and unmet prerequisites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullMode {
    /// Error out on anything unrecognized.
    Strict,
    /// Skip unknown fields and entries whose prerequisites fail; used for
    /// matches that merely annotate (packet-in metadata).
    Loose,
}

/// A cookie match carried alongside an extensible match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CookiePair {
    /// Cookie bits to compare.
    pub cookie: u64,
    /// Mask selecting which cookie bits matter; zero means no cookie
    /// match at all.
    pub mask: u64,
}

const fn nxm_header(class: u16, field: u8, hasmask: bool, payload: usize) -> u32 {
    ((class as u32) << 16)
        | ((field as u32) << 9)
        | ((hasmask as u32) << 8)
        | (payload as u32 & 0xff)
}

#[allow(clippy::cast_possible_truncation)]
const fn header_class(header: u32) -> u16 {
    (header >> 16) as u16
}

#[allow(clippy::cast_possible_truncation)]
const fn header_field(header: u32) -> u8 {
    ((header >> 9) & 0x7f) as u8
}

const fn header_hasmask(header: u32) -> bool {
    (header >> 8) & 1 == 1
}

const fn header_length(header: u32) -> usize {
    (header & 0xff) as usize
}

/// Match-region length including trailing padding, when the entries span
/// `match_len` bytes and begin `offset` bytes into an 8-aligned region.
#[must_use]
pub fn padded_match_len(match_len: usize, offset: usize) -> usize {
    (match_len + offset).div_ceil(8) * 8 - offset
}

/// What an entry means, independent of which dialect's header carried it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Apply {
    InPort16,
    InPort32,
    EthDst,
    EthSrc,
    EthType,
    VlanTci,
    OxmVlanVid,
    OxmVlanPcp,
    NxmIpTos,
    OxmIpDscp,
    IpEcn,
    IpTtl,
    IpProto,
    Ipv4Src,
    Ipv4Dst,
    TpSrc,
    TpDst,
    IcmpType,
    IcmpCode,
    ArpOp,
    ArpSpa,
    ArpTpa,
    ArpSha,
    ArpTha,
    Ipv6Src,
    Ipv6Dst,
    Ipv6Label,
    NdTarget,
    NdSll,
    NdTll,
    IpFrag,
    Reg(u8),
    TunId,
    Cookie,
    MplsLabel,
    MplsTc,
    MplsStack,
    VlanTpid,
    QinqTci,
}

/// Prerequisites an entry's earlier siblings must already have set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prereq {
    None,
    Ipv4,
    Ipv6,
    Ip,
    Arp,
    Tcp,
    Udp,
    Icmp,
    Icmpv6,
    NdSolicit,
    NdAdvert,
    Nd,
    Mpls,
    OxmVlanVid,
}

struct FieldSpec {
    class: u16,
    field: u8,
    len: usize,
    maskable: bool,
    prereq: Prereq,
    apply: Apply,
}

const fn f(class: u16, field: u8, len: usize, maskable: bool, prereq: Prereq, apply: Apply) -> FieldSpec {
    FieldSpec { class, field, len, maskable, prereq, apply }
}

#[rustfmt::skip]
static FIELDS: &[FieldSpec] = &[
    // Nicira standard class.
    f(NXM0,  0, 2, false, Prereq::None,      Apply::InPort16),
    f(NXM0,  1, 6, true,  Prereq::None,      Apply::EthDst),
    f(NXM0,  2, 6, true,  Prereq::None,      Apply::EthSrc),
    f(NXM0,  3, 2, false, Prereq::None,      Apply::EthType),
    f(NXM0,  4, 2, true,  Prereq::None,      Apply::VlanTci),
    f(NXM0,  5, 1, false, Prereq::Ip,        Apply::NxmIpTos),
    f(NXM0,  6, 1, false, Prereq::Ip,        Apply::IpProto),
    f(NXM0,  7, 4, true,  Prereq::Ipv4,      Apply::Ipv4Src),
    f(NXM0,  8, 4, true,  Prereq::Ipv4,      Apply::Ipv4Dst),
    f(NXM0,  9, 2, true,  Prereq::Tcp,       Apply::TpSrc),
    f(NXM0, 10, 2, true,  Prereq::Tcp,       Apply::TpDst),
    f(NXM0, 11, 2, true,  Prereq::Udp,       Apply::TpSrc),
    f(NXM0, 12, 2, true,  Prereq::Udp,       Apply::TpDst),
    f(NXM0, 13, 1, false, Prereq::Icmp,      Apply::IcmpType),
    f(NXM0, 14, 1, false, Prereq::Icmp,      Apply::IcmpCode),
    f(NXM0, 15, 2, false, Prereq::Arp,       Apply::ArpOp),
    f(NXM0, 16, 4, true,  Prereq::Arp,       Apply::ArpSpa),
    f(NXM0, 17, 4, true,  Prereq::Arp,       Apply::ArpTpa),
    // Nicira extended class.
    f(NXM1,  0, 4, true,  Prereq::None,      Apply::Reg(0)),
    f(NXM1,  1, 4, true,  Prereq::None,      Apply::Reg(1)),
    f(NXM1,  2, 4, true,  Prereq::None,      Apply::Reg(2)),
    f(NXM1,  3, 4, true,  Prereq::None,      Apply::Reg(3)),
    f(NXM1,  4, 4, true,  Prereq::None,      Apply::Reg(4)),
    f(NXM1,  5, 4, true,  Prereq::None,      Apply::Reg(5)),
    f(NXM1,  6, 4, true,  Prereq::None,      Apply::Reg(6)),
    f(NXM1,  7, 4, true,  Prereq::None,      Apply::Reg(7)),
    f(NXM1, 16, 8, true,  Prereq::None,      Apply::TunId),
    f(NXM1, 17, 6, false, Prereq::Arp,       Apply::ArpSha),
    f(NXM1, 18, 6, false, Prereq::Arp,       Apply::ArpTha),
    f(NXM1, 19, 16, true, Prereq::Ipv6,      Apply::Ipv6Src),
    f(NXM1, 20, 16, true, Prereq::Ipv6,      Apply::Ipv6Dst),
    f(NXM1, 21, 1, false, Prereq::Icmpv6,    Apply::IcmpType),
    f(NXM1, 22, 1, false, Prereq::Icmpv6,    Apply::IcmpCode),
    f(NXM1, 23, 16, true, Prereq::Nd,        Apply::NdTarget),
    f(NXM1, 24, 6, false, Prereq::NdSolicit, Apply::NdSll),
    f(NXM1, 25, 6, false, Prereq::NdAdvert,  Apply::NdTll),
    f(NXM1, 26, 1, true,  Prereq::Ip,        Apply::IpFrag),
    f(NXM1, 27, 4, false, Prereq::Ipv6,      Apply::Ipv6Label),
    f(NXM1, 28, 1, false, Prereq::Ip,        Apply::IpEcn),
    f(NXM1, 29, 1, false, Prereq::Ip,        Apply::IpTtl),
    f(NXM1, 30, 8, true,  Prereq::None,      Apply::Cookie),
    f(NXM1, 31, 4, false, Prereq::Mpls,      Apply::MplsLabel),
    f(NXM1, 32, 1, false, Prereq::Mpls,      Apply::MplsTc),
    f(NXM1, 33, 1, false, Prereq::Mpls,      Apply::MplsStack),
    f(NXM1, 34, 2, false, Prereq::None,      Apply::VlanTpid),
    f(NXM1, 35, 2, true,  Prereq::None,      Apply::QinqTci),
    // OpenFlow 1.2 basic class.
    f(OXM_BASIC,  0, 4, false, Prereq::None,       Apply::InPort32),
    f(OXM_BASIC,  3, 6, true,  Prereq::None,       Apply::EthDst),
    f(OXM_BASIC,  4, 6, true,  Prereq::None,       Apply::EthSrc),
    f(OXM_BASIC,  5, 2, false, Prereq::None,       Apply::EthType),
    f(OXM_BASIC,  6, 2, true,  Prereq::None,       Apply::OxmVlanVid),
    f(OXM_BASIC,  7, 1, false, Prereq::OxmVlanVid, Apply::OxmVlanPcp),
    f(OXM_BASIC,  8, 1, false, Prereq::Ip,         Apply::OxmIpDscp),
    f(OXM_BASIC,  9, 1, false, Prereq::Ip,         Apply::IpEcn),
    f(OXM_BASIC, 10, 1, false, Prereq::Ip,         Apply::IpProto),
    f(OXM_BASIC, 11, 4, true,  Prereq::Ipv4,       Apply::Ipv4Src),
    f(OXM_BASIC, 12, 4, true,  Prereq::Ipv4,       Apply::Ipv4Dst),
    f(OXM_BASIC, 13, 2, false, Prereq::Tcp,        Apply::TpSrc),
    f(OXM_BASIC, 14, 2, false, Prereq::Tcp,        Apply::TpDst),
    f(OXM_BASIC, 15, 2, false, Prereq::Udp,        Apply::TpSrc),
    f(OXM_BASIC, 16, 2, false, Prereq::Udp,        Apply::TpDst),
    f(OXM_BASIC, 19, 1, false, Prereq::Icmp,       Apply::IcmpType),
    f(OXM_BASIC, 20, 1, false, Prereq::Icmp,       Apply::IcmpCode),
    f(OXM_BASIC, 21, 2, false, Prereq::Arp,        Apply::ArpOp),
    f(OXM_BASIC, 22, 4, true,  Prereq::Arp,        Apply::ArpSpa),
    f(OXM_BASIC, 23, 4, true,  Prereq::Arp,        Apply::ArpTpa),
    f(OXM_BASIC, 24, 6, false, Prereq::Arp,        Apply::ArpSha),
    f(OXM_BASIC, 25, 6, false, Prereq::Arp,        Apply::ArpTha),
    f(OXM_BASIC, 26, 16, true, Prereq::Ipv6,       Apply::Ipv6Src),
    f(OXM_BASIC, 27, 16, true, Prereq::Ipv6,       Apply::Ipv6Dst),
    f(OXM_BASIC, 28, 4, false, Prereq::Ipv6,       Apply::Ipv6Label),
    f(OXM_BASIC, 29, 1, false, Prereq::Icmpv6,     Apply::IcmpType),
    f(OXM_BASIC, 30, 1, false, Prereq::Icmpv6,     Apply::IcmpCode),
    f(OXM_BASIC, 31, 16, true, Prereq::Nd,         Apply::NdTarget),
    f(OXM_BASIC, 32, 6, false, Prereq::NdSolicit,  Apply::NdSll),
    f(OXM_BASIC, 33, 6, false, Prereq::NdAdvert,   Apply::NdTll),
    f(OXM_BASIC, 34, 4, false, Prereq::Mpls,       Apply::MplsLabel),
    f(OXM_BASIC, 35, 1, false, Prereq::Mpls,       Apply::MplsTc),
];

fn lookup(class: u16, field: u8) -> Option<(usize, &'static FieldSpec)> {
    FIELDS
        .iter()
        .enumerate()
        .find(|(_, spec)| spec.class == class && spec.field == field)
}

fn dl_type_matched(rule: &Rule) -> Option<u16> {
    if rule.wc.flags.contains(FieldWc::DL_TYPE) { None } else { Some(rule.flow.dl_type) }
}

fn nw_proto_matched(rule: &Rule) -> Option<u8> {
    if rule.wc.flags.contains(FieldWc::NW_PROTO) { None } else { Some(rule.flow.nw_proto) }
}

fn prereq_ok(prereq: Prereq, rule: &Rule) -> bool {
    let is_ip = matches!(dl_type_matched(rule), Some(eth_type::IP | eth_type::IPV6));
    let icmpv6 = dl_type_matched(rule) == Some(eth_type::IPV6)
        && nw_proto_matched(rule) == Some(ip_proto::ICMPV6);
    let icmpv6_type = |t: u16| icmpv6 && rule.wc.tp_src_mask == u16::MAX && rule.flow.tp_src == t;
    match prereq {
        Prereq::None => true,
        Prereq::Ipv4 => dl_type_matched(rule) == Some(eth_type::IP),
        Prereq::Ipv6 => dl_type_matched(rule) == Some(eth_type::IPV6),
        Prereq::Ip => is_ip,
        Prereq::Arp => dl_type_matched(rule) == Some(eth_type::ARP),
        Prereq::Tcp => is_ip && nw_proto_matched(rule) == Some(ip_proto::TCP),
        Prereq::Udp => is_ip && nw_proto_matched(rule) == Some(ip_proto::UDP),
        Prereq::Icmp => {
            dl_type_matched(rule) == Some(eth_type::IP)
                && nw_proto_matched(rule) == Some(ip_proto::ICMP)
        }
        Prereq::Icmpv6 => icmpv6,
        Prereq::NdSolicit => icmpv6_type(nd::NEIGHBOR_SOLICIT),
        Prereq::NdAdvert => icmpv6_type(nd::NEIGHBOR_ADVERT),
        Prereq::Nd => {
            icmpv6_type(nd::NEIGHBOR_SOLICIT) || icmpv6_type(nd::NEIGHBOR_ADVERT)
        }
        Prereq::Mpls => {
            matches!(dl_type_matched(rule), Some(eth_type::MPLS | eth_type::MPLS_MCAST))
        }
        Prereq::OxmVlanVid => rule.wc.vlan_tci_mask & VLAN_CFI != 0,
    }
}

fn be_uint(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

fn be_u128(bytes: &[u8]) -> u128 {
    bytes.iter().fold(0u128, |acc, b| (acc << 8) | u128::from(*b))
}

fn mac_of(bytes: &[u8]) -> Mac {
    let mut raw = [0u8; 6];
    raw.copy_from_slice(bytes);
    Mac(raw)
}

#[allow(clippy::too_many_lines, clippy::cast_possible_truncation)]
fn apply_field(
    spec: &FieldSpec,
    value: &[u8],
    mask: Option<&[u8]>,
    rule: &mut Rule,
    cookie: &mut CookiePair,
) -> Result<(), OfpErr> {
    let exact = mask.is_none();
    let exact_mask: Vec<u8> = vec![0xff; spec.len];
    let mask = mask.unwrap_or(&exact_mask);
    match spec.apply {
        Apply::InPort16 => rule.set_in_port(be_uint(value) as u16),
        Apply::InPort32 => {
            let port = crate::port::port_from_ofp11(be_uint(value) as u32)
                .map_err(|_| OfpErr::BadMatchValue)?;
            rule.set_in_port(port);
        }
        Apply::EthDst => rule.set_dl_dst_masked(mac_of(value), mac_of(mask)),
        Apply::EthSrc => rule.set_dl_src_masked(mac_of(value), mac_of(mask)),
        Apply::EthType => rule.set_dl_type(be_uint(value) as u16),
        Apply::VlanTci => {
            rule.set_vlan_tci_masked(be_uint(value) as u16, be_uint(mask) as u16);
        }
        Apply::OxmVlanVid => {
            let v = be_uint(value) as u16;
            if v & !(VLAN_VID_MASK | OFPVID_PRESENT) != 0 {
                return Err(OfpErr::BadMatchValue);
            }
            if exact {
                if v == 0 {
                    // OFPVID_NONE: only packets without any 802.1Q header.
                    rule.set_no_vlan();
                } else if v & OFPVID_PRESENT == 0 {
                    // A VID without the presence bit is self-contradictory.
                    return Err(OfpErr::BadMatchValue);
                } else {
                    rule.set_vlan_tci_masked(
                        (v & VLAN_VID_MASK) | VLAN_CFI,
                        VLAN_VID_MASK | VLAN_CFI,
                    );
                }
            } else {
                let m = be_uint(mask) as u16;
                let tci =
                    (v & VLAN_VID_MASK) | (if v & OFPVID_PRESENT != 0 { VLAN_CFI } else { 0 });
                let tci_mask =
                    (m & VLAN_VID_MASK) | (if m & OFPVID_PRESENT != 0 { VLAN_CFI } else { 0 });
                rule.set_vlan_tci_masked(tci, tci_mask);
            }
        }
        Apply::OxmVlanPcp => {
            let v = be_uint(value) as u8;
            if v > 7 {
                return Err(OfpErr::BadMatchValue);
            }
            rule.set_vlan_pcp(v);
        }
        Apply::NxmIpTos => {
            let v = be_uint(value) as u8;
            if v & !IP_DSCP_MASK != 0 {
                return Err(OfpErr::BadMatchValue);
            }
            rule.set_nw_dscp(v);
        }
        Apply::OxmIpDscp => {
            let v = be_uint(value) as u8;
            if v & !0x3f != 0 {
                return Err(OfpErr::BadMatchValue);
            }
            rule.set_nw_dscp(v << 2);
        }
        Apply::IpEcn => {
            let v = be_uint(value) as u8;
            if v & !IP_ECN_MASK != 0 {
                return Err(OfpErr::BadMatchValue);
            }
            rule.set_nw_ecn(v);
        }
        Apply::IpTtl => rule.set_nw_ttl(be_uint(value) as u8),
        Apply::IpProto => rule.set_nw_proto(be_uint(value) as u8),
        Apply::Ipv4Src => rule.set_nw_src_masked(be_uint(value) as u32, be_uint(mask) as u32),
        Apply::Ipv4Dst => rule.set_nw_dst_masked(be_uint(value) as u32, be_uint(mask) as u32),
        Apply::TpSrc => rule.set_tp_src_masked(be_uint(value) as u16, be_uint(mask) as u16),
        Apply::TpDst => rule.set_tp_dst_masked(be_uint(value) as u16, be_uint(mask) as u16),
        Apply::IcmpType => rule.set_icmp_type(be_uint(value) as u8),
        Apply::IcmpCode => rule.set_icmp_code(be_uint(value) as u8),
        Apply::ArpOp => {
            let op = be_uint(value);
            if op > 0xff {
                return Err(OfpErr::BadMatchValue);
            }
            rule.set_nw_proto(op as u8);
        }
        Apply::ArpSpa => rule.set_nw_src_masked(be_uint(value) as u32, be_uint(mask) as u32),
        Apply::ArpTpa => rule.set_nw_dst_masked(be_uint(value) as u32, be_uint(mask) as u32),
        Apply::ArpSha | Apply::NdSll => rule.set_arp_sha(mac_of(value)),
        Apply::ArpTha | Apply::NdTll => rule.set_arp_tha(mac_of(value)),
        Apply::Ipv6Src => rule.set_ipv6_src_masked(be_u128(value), be_u128(mask)),
        Apply::Ipv6Dst => rule.set_ipv6_dst_masked(be_u128(value), be_u128(mask)),
        Apply::Ipv6Label => {
            let v = be_uint(value) as u32;
            if v & !0x000f_ffff != 0 {
                return Err(OfpErr::BadMatchValue);
            }
            rule.set_ipv6_label(v);
        }
        Apply::NdTarget => rule.set_nd_target_masked(be_u128(value), be_u128(mask)),
        Apply::IpFrag => {
            let v = be_uint(value) as u8;
            let m = be_uint(mask) as u8;
            if v & !flow::key::NW_FRAG_MASK != 0 {
                return Err(OfpErr::BadMatchValue);
            }
            rule.set_nw_frag_masked(v, m);
        }
        Apply::Reg(idx) => {
            rule.set_reg_masked(usize::from(idx), be_uint(value) as u32, be_uint(mask) as u32);
        }
        Apply::TunId => rule.set_tun_id_masked(be_uint(value), be_uint(mask)),
        Apply::Cookie => {
            cookie.cookie = be_uint(value);
            cookie.mask = be_uint(mask);
        }
        Apply::MplsLabel => {
            let v = be_uint(value) as u32;
            if v & !0x000f_ffff != 0 {
                return Err(OfpErr::BadMatchValue);
            }
            rule.set_mpls_label(v);
        }
        Apply::MplsTc => {
            let v = be_uint(value) as u8;
            if v > 7 {
                return Err(OfpErr::BadMatchValue);
            }
            rule.set_mpls_tc(v);
        }
        Apply::MplsStack => {
            let v = be_uint(value) as u8;
            if v > 1 {
                return Err(OfpErr::BadMatchValue);
            }
            rule.set_mpls_stack(v);
        }
        Apply::VlanTpid => rule.set_vlan_tpid(be_uint(value) as u16),
        Apply::QinqTci => {
            let v = be_uint(value) as u16;
            let m = be_uint(mask) as u16;
            let vid_bits = VLAN_VID_MASK | VLAN_CFI;
            if m & vid_bits == vid_bits {
                rule.set_vlan_qinq_vid(v & VLAN_VID_MASK);
            }
            if m & VLAN_PCP_MASK == VLAN_PCP_MASK {
                rule.set_vlan_qinq_pcp(((v & VLAN_PCP_MASK) >> VLAN_PCP_SHIFT) as u8);
            }
            if m & !(vid_bits | VLAN_PCP_MASK) != 0
                || (m & vid_bits != 0 && m & vid_bits != vid_bits)
                || (m & VLAN_PCP_MASK != 0 && m & VLAN_PCP_MASK != VLAN_PCP_MASK)
            {
                return Err(OfpErr::BadMatchMask);
            }
        }
    }
    Ok(())
}

/// Pulls `match_len` bytes of entries (plus trailing padding) off `r`
/// into a rule with the given `priority`.
///
/// `pad_offset` is how far into an 8-aligned region the entries begin
/// (0 standalone, 4 under an `OFPMT_OXM` header); it only influences how
/// much padding follows the last entry.
///
/// # Errors
///
/// Truncated or self-inconsistent entries are [`OfpErr::BadMatchLen`];
/// see [`OfpErr`] for the per-condition codes.  On any error the output
/// rule is discarded — no partial state escapes.
pub fn pull_match(
    r: &mut Reader<'_>,
    match_len: usize,
    pad_offset: usize,
    priority: u16,
    mode: PullMode,
) -> Result<(Rule, CookiePair), OfpErr> {
    let entries = r.take(match_len).map_err(|_| OfpErr::BadMatchLen)?;
    let padding = padded_match_len(match_len, pad_offset) - match_len;
    r.skip(padding).map_err(|_| OfpErr::BadMatchLen)?;

    let mut rule = Rule::catchall(priority);
    let mut cookie = CookiePair::default();
    let mut seen = [false; 128];

    let mut er = Reader::new(entries);
    while er.remaining() > 0 {
        let header = er.u32().map_err(|_| OfpErr::BadMatchLen)?;
        let payload_len = header_length(header);
        if payload_len == 0 {
            return Err(OfpErr::BadMatchLen);
        }
        let payload = er.take(payload_len).map_err(|_| OfpErr::BadMatchLen)?;
        let hasmask = header_hasmask(header);
        if hasmask && payload_len % 2 != 0 {
            return Err(OfpErr::BadMatchLen);
        }

        let Some((index, spec)) = lookup(header_class(header), header_field(header)) else {
            match mode {
                PullMode::Strict => return Err(OfpErr::BadMatchField),
                PullMode::Loose => continue,
            }
        };

        let value_len = if hasmask { payload_len / 2 } else { payload_len };
        if value_len != spec.len {
            return Err(OfpErr::BadMatchLen);
        }
        if hasmask && !spec.maskable {
            return Err(OfpErr::BadMatchMask);
        }
        if seen[index] {
            return Err(OfpErr::DupMatchField);
        }
        seen[index] = true;

        if !prereq_ok(spec.prereq, &rule) {
            match mode {
                PullMode::Strict => return Err(OfpErr::BadMatchPrereq),
                PullMode::Loose => continue,
            }
        }

        let (value, mask) = payload.split_at(value_len);
        if hasmask {
            // Value bits outside the mask are meaningless; a peer that
            // sets them is confused, so refuse rather than guess.
            if value.iter().zip(mask.iter()).any(|(v, m)| v & !m != 0) {
                return Err(OfpErr::BadMatchWildValue);
            }
            apply_field(spec, value, Some(mask), &mut rule, &mut cookie)?;
        } else {
            apply_field(spec, value, None, &mut rule, &mut cookie)?;
        }
    }

    rule.zero_wildcarded_fields();
    Ok((rule, cookie))
}

fn put_entry(b: &mut MsgBuf, class: u16, field: u8, value: &[u8], mask: Option<&[u8]>) {
    match mask {
        None => {
            b.put_u32(nxm_header(class, field, false, value.len()));
            b.put(value);
        }
        Some(m) => {
            b.put_u32(nxm_header(class, field, true, value.len() * 2));
            b.put(value);
            b.put(m);
        }
    }
}

/// Writes value/mask as zero, one (exact), or two (masked) payload
/// chunks depending on the mask trichotomy.
fn put_masked(b: &mut MsgBuf, class: u16, field: u8, value: &[u8], mask: &[u8]) {
    if mask.iter().all(|m| *m == 0) {
        return;
    }
    if mask.iter().all(|m| *m == 0xff) {
        put_entry(b, class, field, value, None);
    } else {
        put_entry(b, class, field, value, Some(mask));
    }
}

/// Which header dialect [`put_match`] emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Nicira headers, standalone region padded to 8 bytes.
    Nxm,
    /// An `OFPMT_OXM` match header followed by 1.2 basic headers where
    /// they exist and Nicira extended headers for the rest.
    Oxm,
}

struct Put<'a> {
    b: &'a mut MsgBuf,
    oxm: bool,
}

impl Put<'_> {
    fn basic(&self) -> u16 {
        if self.oxm { OXM_BASIC } else { NXM0 }
    }

    /// Resolve a per-dialect (class, field) header pair.
    fn hdr(&self, nxm: (u16, u8), oxm: (u16, u8)) -> (u16, u8) {
        if self.oxm { oxm } else { nxm }
    }

    fn u8_field(&mut self, nxm: (u16, u8), oxm: (u16, u8), v: u8) {
        let (class, field) = self.hdr(nxm, oxm);
        put_entry(self.b, class, field, &[v], None);
    }

    fn u16_field(&mut self, nxm: (u16, u8), oxm: (u16, u8), v: u16) {
        let (class, field) = self.hdr(nxm, oxm);
        put_entry(self.b, class, field, &v.to_be_bytes(), None);
    }
}

/// Appends `rule` (and, in the Nicira dialect, any cookie match) as an
/// extensible match.  Returns the match length: the entry bytes for
/// [`Dialect::Nxm`], or the header-plus-entries length stamped into the
/// `OFPMT_OXM` header for [`Dialect::Oxm`].  Trailing padding out to the
/// 8-byte boundary is appended either way.
#[allow(clippy::too_many_lines)]
pub fn put_match(b: &mut MsgBuf, dialect: Dialect, rule: &Rule, cookie: CookiePair) -> usize {
    let oxm = dialect == Dialect::Oxm;
    let region_start = b.len();
    if oxm {
        b.put_u16(crate::match11::OFPMT_OXM);
        b.put_u16(0); // patched below
    }
    let entries_start = b.len();
    let flow = &rule.flow;
    let wc = &rule.wc;
    let mut p = Put { b, oxm };

    if !wc.flags.contains(FieldWc::IN_PORT) {
        if oxm {
            let port = crate::port::port_to_ofp11(flow.in_port);
            put_entry(p.b, OXM_BASIC, 0, &port.to_be_bytes(), None);
        } else {
            put_entry(p.b, NXM0, 0, &flow.in_port.to_be_bytes(), None);
        }
    }

    // Ethernet.
    let (dst_field, src_field) = if oxm { (3, 4) } else { (1, 2) };
    put_masked(p.b, p.basic(), dst_field, &flow.dl_dst.0, &wc.dl_dst_mask.0);
    put_masked(p.b, p.basic(), src_field, &flow.dl_src.0, &wc.dl_src_mask.0);
    if !wc.flags.contains(FieldWc::DL_TYPE) {
        p.u16_field((NXM0, 3), (OXM_BASIC, 5), flow.dl_type);
    }

    // 802.1Q.
    if oxm {
        if wc.vlan_tci_mask != 0 {
            if wc.vlan_tci_mask == u16::MAX && flow.vlan_tci & VLAN_CFI == 0 {
                // Match only untagged frames.
                put_entry(p.b, OXM_BASIC, 6, &0u16.to_be_bytes(), None);
            } else {
                let vid = (flow.vlan_tci & VLAN_VID_MASK)
                    | (if flow.vlan_tci & VLAN_CFI != 0 { OFPVID_PRESENT } else { 0 });
                let vid_mask = (wc.vlan_tci_mask & VLAN_VID_MASK)
                    | (if wc.vlan_tci_mask & VLAN_CFI != 0 { OFPVID_PRESENT } else { 0 });
                if vid_mask == VLAN_VID_MASK | OFPVID_PRESENT {
                    put_entry(p.b, OXM_BASIC, 6, &vid.to_be_bytes(), None);
                } else {
                    put_entry(p.b, OXM_BASIC, 6, &vid.to_be_bytes(), Some(&vid_mask.to_be_bytes()));
                }
                if wc.vlan_tci_mask & VLAN_PCP_MASK != 0 {
                    p.u8_field((NXM0, 0), (OXM_BASIC, 7), flow::tci::tci_to_pcp(flow.vlan_tci));
                }
            }
        }
    } else {
        put_masked(
            p.b,
            NXM0,
            4,
            &flow.vlan_tci.to_be_bytes(),
            &wc.vlan_tci_mask.to_be_bytes(),
        );
    }

    // L3 and above, gated on the resolved Ethernet type.
    let dl_type = if wc.flags.contains(FieldWc::DL_TYPE) { None } else { Some(flow.dl_type) };
    match dl_type {
        Some(eth_type::IP | eth_type::IPV6) => {
            if !wc.flags.contains(FieldWc::NW_DSCP) {
                // The basic 1.2 field is the 6-bit DSCP; the Nicira field
                // is the whole TOS octet with the ECN bits forced clear.
                let v = if oxm { flow.nw_tos >> 2 } else { flow.nw_tos & IP_DSCP_MASK };
                p.u8_field((NXM0, 5), (OXM_BASIC, 8), v);
            }
            if !wc.flags.contains(FieldWc::NW_ECN) {
                p.u8_field((NXM1, 28), (OXM_BASIC, 9), flow.nw_ecn);
            }
            if !wc.flags.contains(FieldWc::NW_TTL) && !oxm {
                put_entry(p.b, NXM1, 29, &[flow.nw_ttl], None);
            }
            put_masked(p.b, NXM1, 26, &[flow.nw_frag], &[wc.nw_frag_mask]);
            if dl_type == Some(eth_type::IP) {
                let (src_f, dst_f) = if oxm { (11, 12) } else { (7, 8) };
                put_masked(p.b, p.basic(), src_f, &flow.nw_src.to_be_bytes(), &wc.nw_src_mask.to_be_bytes());
                put_masked(p.b, p.basic(), dst_f, &flow.nw_dst.to_be_bytes(), &wc.nw_dst_mask.to_be_bytes());
            } else {
                let (src_f, dst_f) = if oxm { (26, 27) } else { (19, 20) };
                let class = if oxm { OXM_BASIC } else { NXM1 };
                put_masked(p.b, class, src_f, &flow.ipv6_src.to_be_bytes(), &wc.ipv6_src_mask.to_be_bytes());
                put_masked(p.b, class, dst_f, &flow.ipv6_dst.to_be_bytes(), &wc.ipv6_dst_mask.to_be_bytes());
                if !wc.flags.contains(FieldWc::IPV6_LABEL) {
                    let class = if oxm { OXM_BASIC } else { NXM1 };
                    let field = if oxm { 28 } else { 27 };
                    put_entry(p.b, class, field, &flow.ipv6_label.to_be_bytes(), None);
                }
            }
            if !wc.flags.contains(FieldWc::NW_PROTO) {
                p.u8_field((NXM0, 6), (OXM_BASIC, 10), flow.nw_proto);
                match (dl_type, flow.nw_proto) {
                    (_, ip_proto::TCP) => {
                        let (s, d) = if oxm { (13, 14) } else { (9, 10) };
                        put_masked(p.b, p.basic(), s, &flow.tp_src.to_be_bytes(), &wc.tp_src_mask.to_be_bytes());
                        put_masked(p.b, p.basic(), d, &flow.tp_dst.to_be_bytes(), &wc.tp_dst_mask.to_be_bytes());
                    }
                    (_, ip_proto::UDP) => {
                        let (s, d) = if oxm { (15, 16) } else { (11, 12) };
                        put_masked(p.b, p.basic(), s, &flow.tp_src.to_be_bytes(), &wc.tp_src_mask.to_be_bytes());
                        put_masked(p.b, p.basic(), d, &flow.tp_dst.to_be_bytes(), &wc.tp_dst_mask.to_be_bytes());
                    }
                    (Some(eth_type::IP), ip_proto::ICMP) => {
                        #[allow(clippy::cast_possible_truncation)]
                        if wc.tp_src_mask != 0 {
                            p.u8_field((NXM0, 13), (OXM_BASIC, 19), flow.tp_src as u8);
                        }
                        #[allow(clippy::cast_possible_truncation)]
                        if wc.tp_dst_mask != 0 {
                            p.u8_field((NXM0, 14), (OXM_BASIC, 20), flow.tp_dst as u8);
                        }
                    }
                    (Some(eth_type::IPV6), ip_proto::ICMPV6) => {
                        #[allow(clippy::cast_possible_truncation)]
                        if wc.tp_src_mask != 0 {
                            p.u8_field((NXM1, 21), (OXM_BASIC, 29), flow.tp_src as u8);
                        }
                        #[allow(clippy::cast_possible_truncation)]
                        if wc.tp_dst_mask != 0 {
                            p.u8_field((NXM1, 22), (OXM_BASIC, 30), flow.tp_dst as u8);
                        }
                        let nd_class = if oxm { OXM_BASIC } else { NXM1 };
                        let nd_field = if oxm { 31 } else { 23 };
                        put_masked(p.b, nd_class, nd_field, &flow.nd_target.to_be_bytes(), &wc.nd_target_mask.to_be_bytes());
                        if wc.tp_src_mask == u16::MAX && flow.tp_src == nd::NEIGHBOR_SOLICIT
                            && !wc.flags.contains(FieldWc::ARP_SHA)
                        {
                            let field = if oxm { 32 } else { 24 };
                            put_entry(p.b, nd_class, field, &flow.arp_sha.0, None);
                        }
                        if wc.tp_src_mask == u16::MAX && flow.tp_src == nd::NEIGHBOR_ADVERT
                            && !wc.flags.contains(FieldWc::ARP_THA)
                        {
                            let field = if oxm { 33 } else { 25 };
                            put_entry(p.b, nd_class, field, &flow.arp_tha.0, None);
                        }
                    }
                    _ => {}
                }
            }
        }
        Some(eth_type::ARP) => {
            if !wc.flags.contains(FieldWc::NW_PROTO) {
                let op = u16::from(flow.nw_proto);
                let field = if oxm { 21 } else { 15 };
                put_entry(p.b, p.basic(), field, &op.to_be_bytes(), None);
            }
            let (spa, tpa) = if oxm { (22, 23) } else { (16, 17) };
            put_masked(p.b, p.basic(), spa, &flow.nw_src.to_be_bytes(), &wc.nw_src_mask.to_be_bytes());
            put_masked(p.b, p.basic(), tpa, &flow.nw_dst.to_be_bytes(), &wc.nw_dst_mask.to_be_bytes());
            let (sha_class, sha, tha) = if oxm { (OXM_BASIC, 24, 25) } else { (NXM1, 17, 18) };
            if !wc.flags.contains(FieldWc::ARP_SHA) {
                put_entry(p.b, sha_class, sha, &flow.arp_sha.0, None);
            }
            if !wc.flags.contains(FieldWc::ARP_THA) {
                put_entry(p.b, sha_class, tha, &flow.arp_tha.0, None);
            }
        }
        Some(eth_type::MPLS | eth_type::MPLS_MCAST) => {
            if !wc.flags.contains(FieldWc::MPLS_LABEL) {
                let class = if oxm { OXM_BASIC } else { NXM1 };
                let field = if oxm { 34 } else { 31 };
                put_entry(p.b, class, field, &flow.mpls_label.to_be_bytes(), None);
            }
            if !wc.flags.contains(FieldWc::MPLS_TC) {
                let class = if oxm { OXM_BASIC } else { NXM1 };
                let field = if oxm { 35 } else { 32 };
                put_entry(p.b, class, field, &[flow.mpls_tc], None);
            }
            if !wc.flags.contains(FieldWc::MPLS_STACK) && !oxm {
                put_entry(p.b, NXM1, 33, &[flow.mpls_stack], None);
            }
        }
        _ => {}
    }

    // QinQ outer-tag fields (vendor class in either dialect).
    if !wc.flags.contains(FieldWc::VLAN_TPID) {
        put_entry(p.b, NXM1, 34, &flow.vlan_tpid.to_be_bytes(), None);
    }
    {
        let mut qm = 0u16;
        if !wc.flags.contains(FieldWc::VLAN_QINQ_VID) {
            qm |= VLAN_VID_MASK | VLAN_CFI;
        }
        if !wc.flags.contains(FieldWc::VLAN_QINQ_PCP) {
            qm |= VLAN_PCP_MASK;
        }
        put_masked(p.b, NXM1, 35, &flow.vlan_qinq_tci.to_be_bytes(), &qm.to_be_bytes());
    }

    // Tunnel id and registers are vendor-class in either dialect.
    put_masked(p.b, NXM1, 16, &flow.tun_id.to_be_bytes(), &wc.tun_id_mask.to_be_bytes());
    for i in 0..FLOW_N_REGS {
        #[allow(clippy::cast_possible_truncation)]
        put_masked(
            p.b,
            NXM1,
            i as u8,
            &flow.regs[i].to_be_bytes(),
            &wc.reg_masks[i].to_be_bytes(),
        );
    }

    // The cookie rides with the match only in the Nicira dialect; 1.2
    // messages carry cookies in their fixed headers.
    if !oxm {
        put_masked(p.b, NXM1, 30, &cookie.cookie.to_be_bytes(), &cookie.mask.to_be_bytes());
    }

    let entries_len = b.len() - entries_start;
    let match_len = if oxm {
        let total = entries_len + crate::match11::OFP11_MATCH_HEADER_LEN;
        #[allow(clippy::cast_possible_truncation)] // match fits a message
        b.set_u16_at(region_start + 2, total as u16);
        total
    } else {
        entries_len
    };
    // Pad the region out to the 8-byte boundary.
    let region = b.len() - region_start;
    b.put_zeros(region.div_ceil(8) * 8 - region);
    match_len
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn nxm_round_trip(rule: &Rule, cookie: CookiePair) -> (Rule, CookiePair) {
        let mut b = MsgBuf::default();
        let match_len = put_match(&mut b, Dialect::Nxm, rule, cookie);
        assert_eq!(b.len() % 8, 0);
        assert!(b.len() >= match_len);
        let mut r = Reader::new(b.as_slice());
        let got = pull_match(&mut r, match_len, 0, rule.priority, PullMode::Strict).unwrap();
        assert_eq!(r.remaining(), 0, "padding fully consumed");
        got
    }

    fn oxm_round_trip(rule: &Rule) -> Rule {
        let mut b = MsgBuf::default();
        let match_len = put_match(&mut b, Dialect::Oxm, rule, CookiePair::default());
        let mut r = Reader::new(b.as_slice());
        // Skip the OFPMT_OXM header the way the dispatcher does.
        assert_eq!(r.u16().unwrap(), crate::match11::OFPMT_OXM);
        assert_eq!(usize::from(r.u16().unwrap()), match_len);
        let body = match_len - crate::match11::OFP11_MATCH_HEADER_LEN;
        let (rule, _) = pull_match(&mut r, body, 4, rule.priority, PullMode::Strict).unwrap();
        rule
    }

    #[test]
    fn empty_match_is_catchall() {
        let (rule, cookie) = nxm_round_trip(&Rule::catchall(0x8000), CookiePair::default());
        assert_eq!(rule, Rule::catchall(0x8000));
        assert_eq!(cookie, CookiePair::default());
    }

    #[test]
    fn tcp_flow_round_trips_both_dialects() {
        let mut r = Rule::catchall(77);
        r.set_in_port(9);
        r.set_dl_type(eth_type::IP);
        r.set_nw_proto(ip_proto::TCP);
        r.set_nw_src_masked(0x0a01_0200, 0xffff_ff00);
        r.set_tp_dst(443);
        assert_eq!(nxm_round_trip(&r, CookiePair::default()).0, r);
        assert_eq!(oxm_round_trip(&r), r);
    }

    #[test]
    fn nxm_only_fields_round_trip() {
        let mut r = Rule::catchall(1);
        r.set_tun_id_masked(0xdead_beef, 0xffff_ffff_ffff_0000);
        r.set_reg_masked(2, 0x55, 0xff);
        r.set_reg_masked(7, 0x1234, u32::MAX);
        let (got, _) = nxm_round_trip(&r, CookiePair::default());
        assert_eq!(got, r);
    }

    #[test]
    fn non_cidr_ipv4_mask_round_trips() {
        let mut r = Rule::catchall(1);
        r.set_dl_type(eth_type::IP);
        r.set_nw_src_masked(0x0a00_0001, 0x00ff_00ff);
        let (got, _) = nxm_round_trip(&r, CookiePair::default());
        assert_eq!(got, r);
    }

    #[test]
    fn cookie_rides_out_of_band() {
        let r = Rule::catchall(1);
        let cookie = CookiePair { cookie: 0x1122_3344, mask: u64::MAX };
        let (got_rule, got_cookie) = nxm_round_trip(&r, cookie);
        assert_eq!(got_rule, r);
        assert_eq!(got_cookie, cookie);
    }

    #[test]
    fn masked_transport_port_round_trips() {
        let mut r = Rule::catchall(1);
        r.set_dl_type(eth_type::IP);
        r.set_nw_proto(ip_proto::UDP);
        r.set_tp_src_masked(0x0040, 0x00c0);
        let (got, _) = nxm_round_trip(&r, CookiePair::default());
        assert_eq!(got, r);
    }

    #[test]
    fn vlan_present_any_vid_round_trips_as_oxm_sentinel() {
        let mut r = Rule::catchall(1);
        r.set_any_vlan();
        let mut b = MsgBuf::default();
        put_match(&mut b, Dialect::Oxm, &r, CookiePair::default());
        // Expect a masked VLAN_VID entry with value = mask = PRESENT.
        let bytes = b.as_slice();
        let header = nxm_header(OXM_BASIC, 6, true, 4);
        assert_eq!(&bytes[4..8], &header.to_be_bytes());
        assert_eq!(&bytes[8..10], &OFPVID_PRESENT.to_be_bytes());
        assert_eq!(&bytes[10..12], &OFPVID_PRESENT.to_be_bytes());
        assert_eq!(oxm_round_trip(&r), r);
    }

    #[test]
    fn untagged_round_trips_via_oxm_none() {
        let mut r = Rule::catchall(1);
        r.set_no_vlan();
        assert_eq!(oxm_round_trip(&r), r);
        let (got, _) = nxm_round_trip(&r, CookiePair::default());
        assert_eq!(got, r);
    }

    #[test]
    fn unknown_field_strict_vs_loose() {
        let mut b = MsgBuf::default();
        // Class 0x7777 is nobody's.
        put_entry(&mut b, 0x7777, 5, &[1, 2], None);
        b.pad_to(8);
        let err = pull_match(&mut Reader::new(b.as_slice()), 6, 0, 0, PullMode::Strict);
        assert_eq!(err.map(|_| ()), Err(OfpErr::BadMatchField));
        let (rule, _) =
            pull_match(&mut Reader::new(b.as_slice()), 6, 0, 0, PullMode::Loose).unwrap();
        assert_eq!(rule, Rule::catchall(0));
    }

    #[test]
    fn duplicate_field_rejected() {
        let mut b = MsgBuf::default();
        put_entry(&mut b, NXM0, 0, &1u16.to_be_bytes(), None);
        put_entry(&mut b, NXM0, 0, &2u16.to_be_bytes(), None);
        b.pad_to(8);
        let err = pull_match(&mut Reader::new(b.as_slice()), 12, 0, 0, PullMode::Strict);
        assert_eq!(err.map(|_| ()), Err(OfpErr::DupMatchField));
    }

    #[test]
    fn prereq_violation_strict_vs_loose() {
        // A TCP port match without dl_type/nw_proto context.
        let mut b = MsgBuf::default();
        put_entry(&mut b, NXM0, 9, &80u16.to_be_bytes(), None);
        b.pad_to(8);
        let err = pull_match(&mut Reader::new(b.as_slice()), 6, 0, 0, PullMode::Strict);
        assert_eq!(err.map(|_| ()), Err(OfpErr::BadMatchPrereq));
        let (rule, _) =
            pull_match(&mut Reader::new(b.as_slice()), 6, 0, 0, PullMode::Loose).unwrap();
        assert_eq!(rule.wc.tp_src_mask, 0);
    }

    #[test]
    fn mask_on_unmaskable_field_rejected() {
        let mut b = MsgBuf::default();
        put_entry(&mut b, NXM0, 3, &eth_type::IP.to_be_bytes(), Some(&[0xff, 0x00]));
        b.pad_to(8);
        let err = pull_match(&mut Reader::new(b.as_slice()), 8, 0, 0, PullMode::Strict);
        assert_eq!(err.map(|_| ()), Err(OfpErr::BadMatchMask));
    }

    #[test]
    fn value_bits_outside_mask_rejected() {
        let mut b = MsgBuf::default();
        put_entry(&mut b, NXM1, 0, &0xffu32.to_be_bytes(), Some(&0x0fu32.to_be_bytes()));
        b.pad_to(8);
        let err = pull_match(&mut Reader::new(b.as_slice()), 12, 0, 0, PullMode::Strict);
        assert_eq!(err.map(|_| ()), Err(OfpErr::BadMatchWildValue));
    }

    #[test]
    fn truncated_entry_rejected() {
        let mut b = MsgBuf::default();
        b.put_u32(nxm_header(NXM0, 0, false, 2));
        b.put_u8(0); // one byte short
        let err = pull_match(&mut Reader::new(b.as_slice()), 5, 0, 0, PullMode::Strict);
        assert_eq!(err.map(|_| ()), Err(OfpErr::BadMatchLen));
    }

    #[test]
    fn ipv6_and_nd_round_trip() {
        let mut r = Rule::catchall(1);
        r.set_dl_type(eth_type::IPV6);
        r.set_nw_proto(ip_proto::ICMPV6);
        #[allow(clippy::cast_possible_truncation)]
        r.set_icmp_type(nd::NEIGHBOR_SOLICIT as u8);
        r.set_ipv6_src_masked(0x2001_0db8_u128 << 96, 0xffff_ffff_u128 << 96);
        r.set_nd_target_masked((0x2001_0db8_u128 << 96) | 1, u128::MAX);
        r.set_arp_sha(Mac([2, 0, 0, 0, 0, 9]));
        let (got, _) = nxm_round_trip(&r, CookiePair::default());
        assert_eq!(got, r);
    }

    #[test]
    fn arp_round_trips() {
        let mut r = Rule::catchall(1);
        r.set_dl_type(eth_type::ARP);
        r.set_nw_proto(2); // reply
        r.set_nw_src_masked(0x0a00_0001, u32::MAX);
        r.set_arp_sha(Mac([2, 0, 0, 0, 0, 1]));
        r.set_arp_tha(Mac([2, 0, 0, 0, 0, 2]));
        assert_eq!(nxm_round_trip(&r, CookiePair::default()).0, r);
        assert_eq!(oxm_round_trip(&r), r);
    }

    #[test]
    fn mpls_and_qinq_round_trip() {
        let mut r = Rule::catchall(1);
        r.set_dl_type(eth_type::MPLS);
        r.set_mpls_label(42);
        r.set_mpls_tc(3);
        r.set_mpls_stack(1);
        let (got, _) = nxm_round_trip(&r, CookiePair::default());
        assert_eq!(got, r);

        let mut q = Rule::catchall(1);
        q.set_vlan_tpid(eth_type::VLAN_8021AD);
        q.set_vlan_qinq_vid(7);
        let (got, _) = nxm_round_trip(&q, CookiePair::default());
        assert_eq!(got, q);
    }
}
