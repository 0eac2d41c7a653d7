// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The flow-mod codec: three wire layouts, one abstract value.

use crate::actions::{Action, pull_actions, pull_instructions, usable_protocols_with_actions};
use crate::cursor::Reader;
use crate::error::OfpErr;
use crate::header::{NICIRA_HEADER_LEN, OFP_HEADER_LEN, OFP12_VERSION, nxt, ofpt10, ofpt11};
use crate::match10::{Match10, OFP10_MATCH_LEN, ofpfw10, rule_from_match10, rule_to_match10};
use crate::match11::pull_match11;
use crate::msg::{MsgBuf, make_nxmsg, make_openflow};
use crate::nx_match::{self, CookiePair, Dialect, PullMode};
use crate::port::{OFPP_NONE, port_from_ofp11, port_to_ofp11};
use crate::proto::{Protocol, Protocols, usable_protocols};
use crate::registry::{MsgCode, decode_msg_type};
use flow::{Rule, normalize};

/// Size of the 1.0 flow-mod up to its action list.
pub const OFP10_FLOW_MOD_LEN: usize = OFP_HEADER_LEN + OFP10_MATCH_LEN + 24;
/// Size of the 1.1/1.2 flow-mod up to its match.
pub const OFP11_FLOW_MOD_LEN: usize = 48;
/// Size of the Nicira flow-mod up to its match.
pub const NX_FLOW_MOD_LEN: usize = 48;

static_assertions::const_assert_eq!(OFP10_FLOW_MOD_LEN, 72);
static_assertions::const_assert_eq!(NX_FLOW_MOD_LEN, NICIRA_HEADER_LEN + 32);

/// Flow-mod commands.
pub mod ofpfc {
    pub const ADD: u8 = 0;
    pub const MODIFY: u8 = 1;
    pub const MODIFY_STRICT: u8 = 2;
    pub const DELETE: u8 = 3;
    pub const DELETE_STRICT: u8 = 4;
}

/// Flow-mod flags.
pub mod ofpff {
    pub const SEND_FLOW_REM: u16 = 1 << 0;
    pub const CHECK_OVERLAP: u16 = 1 << 1;
    pub const EMERG: u16 = 1 << 2;
}

/// The 1.1+ "any group" sentinel.
pub const OFPG11_ANY: u32 = 0xffff_ffff;

/// Table id meaning "the caller did not say" (no TID extension active).
pub const TABLE_ID_UNSPECIFIED: u8 = 0xff;

/// "No buffered packet" sentinel shared by flow-mod and packet-out.
pub const NO_BUFFER: u32 = u32::MAX;

/// A flow table modification request, protocol independent.
///
/// The action/instruction region is borrowed from the caller's message
/// buffer; this layer validates its framing but never interprets it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowMod<'a> {
    /// Match, with its priority.
    pub rule: Rule,
    /// Cookie bits to filter on (never on ADD).
    pub cookie: u64,
    /// Mask for `cookie`; zero means no cookie filtering.
    pub cookie_mask: u64,
    /// Cookie to assign (ADD always assigns; other commands only when
    /// this is not the all-ones "keep" sentinel).
    pub new_cookie: u64,
    /// Target table, or [`TABLE_ID_UNSPECIFIED`].
    pub table_id: u8,
    /// One of the `ofpfc` commands.
    pub command: u8,
    /// Idle timeout in seconds, zero for none.
    pub idle_timeout: u16,
    /// Hard timeout in seconds, zero for none.
    pub hard_timeout: u16,
    /// Buffered packet to apply the flow to, or [`NO_BUFFER`].
    pub buffer_id: u32,
    /// Output-port filter for DELETE, or [`OFPP_NONE`].
    pub out_port: u16,
    /// `ofpff` flags.
    pub flags: u16,
    /// Raw action (1.0/Nicira) or instruction (1.1+) region.
    pub actions: &'a [u8],
}

fn split_tid_command(command: u16, protocol: Protocol) -> (u8, u8) {
    #[allow(clippy::cast_possible_truncation)]
    if protocol.has_tid() {
        // With the extension, the high byte of the command carries the
        // target table.
        ((command & 0xff) as u8, (command >> 8) as u8)
    } else {
        (command as u8, TABLE_ID_UNSPECIFIED)
    }
}

fn join_tid_command(command: u8, table_id: u8, protocol: Protocol) -> u16 {
    if protocol.has_tid() {
        u16::from(command) | (u16::from(table_id) << 8)
    } else {
        u16::from(command)
    }
}

/// Decodes an OFPT_FLOW_MOD or NXT_FLOW_MOD message.
///
/// The rule inside a 1.0 flow-mod is normalized on the way in, since the
/// fixed match can name fields that are meaningless for its flow.
///
/// # Errors
///
/// Classification, match, action-framing, group, and cookie errors per
/// [`OfpErr`].
#[allow(clippy::too_many_lines)]
pub fn decode_flow_mod<'a>(msg: &'a [u8], protocol: Protocol) -> Result<FlowMod<'a>, OfpErr> {
    let desc = decode_msg_type(msg)?;
    // Trust the declared length (the registry just validated it), never
    // bytes beyond it.
    let declared = crate::header::OfpHeader::parse(msg)
        .map_err(|_| OfpErr::BadLen)?
        .length as usize;
    let mut r = Reader::new(&msg[..declared.min(msg.len())]);
    let len = |_| OfpErr::BadLen;

    match desc.code {
        MsgCode::FlowMod11 => {
            // Standard 1.1/1.2 flow-mod.
            let version = msg[0];
            r.skip(OFP_HEADER_LEN).map_err(len)?;
            let cookie = r.u64().map_err(len)?;
            let cookie_mask = r.u64().map_err(len)?;
            let table_id = r.u8().map_err(len)?;
            let command = r.u8().map_err(len)?;
            let idle_timeout = r.u16().map_err(len)?;
            let hard_timeout = r.u16().map_err(len)?;
            let priority = r.u16().map_err(len)?;
            let buffer_id = r.u32().map_err(len)?;
            let out_port = port_from_ofp11(r.u32().map_err(len)?)?;
            let out_group = r.u32().map_err(len)?;
            let flags = r.u16().map_err(len)?;
            r.skip(2).map_err(len)?;

            let pulled = pull_match11(&mut r, priority, version)?;
            let remaining = r.remaining();
            let actions = pull_instructions(&mut r, remaining)?;

            if out_group != OFPG11_ANY {
                return Err(OfpErr::GroupsNotSupported);
            }

            let (cookie, cookie_mask, new_cookie) = if command == ofpfc::ADD {
                (0, 0, cookie)
            } else {
                (cookie, cookie_mask, u64::MAX)
            };

            Ok(FlowMod {
                rule: pulled.rule,
                cookie,
                cookie_mask,
                new_cookie,
                table_id,
                command,
                idle_timeout,
                hard_timeout,
                buffer_id,
                out_port,
                flags,
                actions,
            })
        }
        MsgCode::FlowMod10 => {
            // Standard 1.0 flow-mod.
            r.skip(OFP_HEADER_LEN).map_err(len)?;
            let m = Match10::parse(&mut r).map_err(len)?;
            let cookie = r.u64().map_err(len)?;
            let command = r.u16().map_err(len)?;
            let idle_timeout = r.u16().map_err(len)?;
            let hard_timeout = r.u16().map_err(len)?;
            let mut priority = r.u16().map_err(len)?;
            let buffer_id = r.u32().map_err(len)?;
            let out_port = r.u16().map_err(len)?;
            let flags = r.u16().map_err(len)?;
            let remaining = r.remaining();
            let actions = pull_actions(&mut r, remaining)?;

            // Fix the priority from the original wildcards here:
            // normalization below may wildcard fields the peer matched,
            // and an exact-match flow keeps its forced priority.
            if m.wildcards & ofpfw10::ALL == 0 {
                priority = u16::MAX;
            }
            let mut rule = rule_from_match10(&m, priority);
            normalize(&mut rule);

            let (command, table_id) = split_tid_command(command, protocol);
            Ok(FlowMod {
                rule,
                cookie: 0,
                cookie_mask: 0,
                new_cookie: cookie,
                table_id,
                command,
                idle_timeout,
                hard_timeout,
                buffer_id,
                out_port,
                flags,
                actions,
            })
        }
        MsgCode::NxtFlowMod => {
            r.skip(NICIRA_HEADER_LEN).map_err(len)?;
            let cookie = r.u64().map_err(len)?;
            let command = r.u16().map_err(len)?;
            let idle_timeout = r.u16().map_err(len)?;
            let hard_timeout = r.u16().map_err(len)?;
            let priority = r.u16().map_err(len)?;
            let buffer_id = r.u32().map_err(len)?;
            let out_port = r.u16().map_err(len)?;
            let flags = r.u16().map_err(len)?;
            let match_len = r.u16().map_err(len)? as usize;
            r.skip(6).map_err(len)?;

            let (rule, pair) =
                nx_match::pull_match(&mut r, match_len, 0, priority, PullMode::Strict)?;
            let remaining = r.remaining();
            let actions = pull_actions(&mut r, remaining)?;

            if (command & 0xff) as u8 == ofpfc::ADD && pair.mask != 0 {
                // Flow additions may only set a new cookie, not match an
                // existing one.
                return Err(OfpErr::CookieMatchInvalid);
            }

            let (command, table_id) = split_tid_command(command, protocol);
            Ok(FlowMod {
                rule,
                cookie: pair.cookie,
                cookie_mask: pair.mask,
                new_cookie: cookie,
                table_id,
                command,
                idle_timeout,
                hard_timeout,
                buffer_id,
                out_port,
                flags,
                actions,
            })
        }
        _ => unreachable!("message is not a flow_mod: {}", desc.name),
    }
}

/// Encodes `fm` for `protocol`.  The caller supplies `fm.actions` already
/// in the dialect the protocol wants (1.0 actions, or 1.1+ instructions).
#[must_use]
pub fn encode_flow_mod(fm: &FlowMod<'_>, protocol: Protocol, xid: u32) -> MsgBuf {
    let version = protocol.to_ofp_version();
    match protocol {
        Protocol::OpenFlow12 => {
            let mut b = make_openflow(OFP_HEADER_LEN, version, ofpt11::FLOW_MOD, xid);
            b.put_u64(fm.new_cookie);
            b.put_u64(fm.cookie_mask);
            b.put_u8(fm.table_id);
            b.put_u8(fm.command);
            b.put_u16(fm.idle_timeout);
            b.put_u16(fm.hard_timeout);
            b.put_u16(fm.rule.priority);
            b.put_u32(fm.buffer_id);
            b.put_u32(port_to_ofp11(fm.out_port));
            b.put_u32(OFPG11_ANY);
            b.put_u16(fm.flags);
            b.put_zeros(2);
            nx_match::put_match(
                &mut b,
                Dialect::Oxm,
                &fm.rule,
                CookiePair { cookie: fm.cookie, mask: fm.cookie_mask },
            );
            b.put(fm.actions);
            b.update_length();
            b
        }
        Protocol::OpenFlow10 | Protocol::OpenFlow10Tid => {
            let mut b = make_openflow(OFP_HEADER_LEN, version, ofpt10::FLOW_MOD, xid);
            rule_to_match10(&fm.rule).put(&mut b);
            b.put_u64(fm.new_cookie);
            b.put_u16(join_tid_command(fm.command, fm.table_id, protocol));
            b.put_u16(fm.idle_timeout);
            b.put_u16(fm.hard_timeout);
            b.put_u16(fm.rule.priority);
            b.put_u32(fm.buffer_id);
            b.put_u16(fm.out_port);
            b.put_u16(fm.flags);
            b.put(fm.actions);
            b.update_length();
            b
        }
        Protocol::Nxm | Protocol::NxmTid => {
            let mut b = make_nxmsg(NICIRA_HEADER_LEN, nxt::FLOW_MOD, xid);
            b.put_u64(fm.new_cookie);
            b.put_u16(join_tid_command(fm.command, fm.table_id, protocol));
            b.put_u16(fm.idle_timeout);
            b.put_u16(fm.hard_timeout);
            b.put_u16(fm.rule.priority);
            b.put_u32(fm.buffer_id);
            b.put_u16(fm.out_port);
            b.put_u16(fm.flags);
            let match_len_at = b.len();
            b.put_u16(0);
            b.put_zeros(6);
            let match_len = nx_match::put_match(
                &mut b,
                Dialect::Nxm,
                &fm.rule,
                CookiePair { cookie: fm.cookie, mask: fm.cookie_mask },
            );
            #[allow(clippy::cast_possible_truncation)] // match fits a message
            b.set_u16_at(match_len_at, match_len as u16);
            b.put(fm.actions);
            b.update_length();
            b
        }
    }
}

/// The protocols able to carry one flow-mod described abstractly, before
/// any encoding happens.
#[must_use]
pub fn flow_mod_usable_protocols(
    rule: &Rule,
    table_id: u8,
    cookie_mask: u64,
    actions: &[Action],
) -> Protocols {
    let mut usable = usable_protocols(rule);
    if table_id != TABLE_ID_UNSPECIFIED {
        usable &= Protocols::TID;
    }
    // Matching the cookie is only supported through NXM.
    if cookie_mask != 0 {
        usable &= Protocols::NXM_ANY;
    }
    // The 1.2 flow-mod natively carries a table id and cookie mask.
    usable |= Protocols::OF12;
    usable &= usable_protocols_with_actions(actions);
    debug_assert!(!usable.is_empty());
    usable
}

#[cfg(test)]
mod test {
    use super::*;
    use flow::key::{eth_type, ip_proto};
    use pretty_assertions::assert_eq;

    fn sample_rule() -> Rule {
        let mut r = Rule::catchall(500);
        r.set_in_port(1);
        r.set_dl_type(eth_type::IP);
        r.set_nw_proto(ip_proto::TCP);
        r.set_tp_dst(443);
        r
    }

    fn sample_fm(actions: &[u8]) -> FlowMod<'_> {
        FlowMod {
            rule: sample_rule(),
            cookie: 0,
            cookie_mask: 0,
            new_cookie: 0x1234_5678,
            table_id: TABLE_ID_UNSPECIFIED,
            command: ofpfc::ADD,
            idle_timeout: 60,
            hard_timeout: 0,
            buffer_id: NO_BUFFER,
            out_port: OFPP_NONE,
            flags: ofpff::SEND_FLOW_REM,
            actions,
        }
    }

    const OUTPUT_ACTION: [u8; 8] = [0, 0, 0, 8, 0, 1, 0, 0];

    #[test]
    fn of10_round_trip() {
        let fm = sample_fm(&OUTPUT_ACTION);
        let b = encode_flow_mod(&fm, Protocol::OpenFlow10, 1);
        let got = decode_flow_mod(b.as_slice(), Protocol::OpenFlow10).unwrap();
        assert_eq!(got, fm);
    }

    #[test]
    fn nxm_round_trip() {
        let fm = sample_fm(&OUTPUT_ACTION);
        let b = encode_flow_mod(&fm, Protocol::Nxm, 2);
        let got = decode_flow_mod(b.as_slice(), Protocol::Nxm).unwrap();
        assert_eq!(got, fm);
    }

    #[test]
    fn of12_round_trip() {
        let mut fm = sample_fm(&[]);
        fm.table_id = 4;
        let b = encode_flow_mod(&fm, Protocol::OpenFlow12, 3);
        let got = decode_flow_mod(b.as_slice(), Protocol::OpenFlow12).unwrap();
        assert_eq!(got, fm);
    }

    #[test]
    fn tid_command_split() {
        let mut fm = sample_fm(&OUTPUT_ACTION);
        fm.table_id = 7;
        fm.command = ofpfc::DELETE;
        let b = encode_flow_mod(&fm, Protocol::NxmTid, 4);
        // With the extension active both halves survive.
        let got = decode_flow_mod(b.as_slice(), Protocol::NxmTid).unwrap();
        assert_eq!(got.command, ofpfc::DELETE);
        assert_eq!(got.table_id, 7);
        // Without it the high byte is not a table id.
        let got = decode_flow_mod(b.as_slice(), Protocol::Nxm).unwrap();
        assert_eq!(got.table_id, TABLE_ID_UNSPECIFIED);
    }

    #[test]
    fn add_with_cookie_match_rejected() {
        let mut fm = sample_fm(&[]);
        fm.command = ofpfc::DELETE;
        fm.cookie = 0xabcd;
        fm.cookie_mask = u64::MAX;
        let b = encode_flow_mod(&fm, Protocol::Nxm, 5);
        // Deleting by cookie is fine.
        assert!(decode_flow_mod(b.as_slice(), Protocol::Nxm).is_ok());
        // The same wire bytes with the command flipped to ADD violate
        // the cookie rule.
        let mut bytes = b.into_vec();
        bytes[25] = ofpfc::ADD; // low byte of nx_flow_mod.command
        assert_eq!(
            decode_flow_mod(&bytes, Protocol::Nxm),
            Err(OfpErr::CookieMatchInvalid)
        );
    }

    #[test]
    fn of12_group_output_rejected() {
        let fm = sample_fm(&[]);
        let b = encode_flow_mod(&fm, Protocol::OpenFlow12, 6);
        let mut bytes = b.into_vec();
        // out_group lives after header(8)+cookie(8)+mask(8)+ids(2)+
        // timeouts(4)+priority(2)+buffer(4)+out_port(4) = 40.
        bytes[40..44].copy_from_slice(&7u32.to_be_bytes());
        assert_eq!(
            decode_flow_mod(&bytes, Protocol::OpenFlow12),
            Err(OfpErr::GroupsNotSupported)
        );
    }

    #[test]
    fn of10_decode_normalizes() {
        // A 1.0 flow-mod matching TCP ports without naming an Ethernet
        // type: normalization strips the ports.
        let mut rule = Rule::catchall(5);
        rule.set_tp_dst(80);
        let mut fm = sample_fm(&[]);
        fm.rule = rule;
        let b = encode_flow_mod(&fm, Protocol::OpenFlow10, 7);
        let got = decode_flow_mod(b.as_slice(), Protocol::OpenFlow10).unwrap();
        assert_eq!(got.rule.wc.tp_dst_mask, 0);
    }

    #[test]
    fn add_command_cookie_semantics() {
        let fm = sample_fm(&[]);
        let b = encode_flow_mod(&fm, Protocol::OpenFlow12, 8);
        let got = decode_flow_mod(b.as_slice(), Protocol::OpenFlow12).unwrap();
        assert_eq!(got.new_cookie, fm.new_cookie);
        assert_eq!(got.cookie_mask, 0);
        // Flip to DELETE: the same cookie words become a filter.
        let mut bytes = encode_flow_mod(&fm, Protocol::OpenFlow12, 8).into_vec();
        bytes[25] = ofpfc::DELETE; // command byte
        let got = decode_flow_mod(&bytes, Protocol::OpenFlow12).unwrap();
        assert_eq!(got.cookie, fm.new_cookie);
        assert_eq!(got.new_cookie, u64::MAX);
    }

    #[test]
    fn usable_protocols_for_flow_mods() {
        let rule = sample_rule();
        let all = flow_mod_usable_protocols(&rule, TABLE_ID_UNSPECIFIED, 0, &[]);
        assert_eq!(all, Protocols::ANY);

        let tid = flow_mod_usable_protocols(&rule, 3, 0, &[]);
        assert_eq!(tid, Protocols::TID | Protocols::OF12);

        let cookie = flow_mod_usable_protocols(&rule, TABLE_ID_UNSPECIFIED, u64::MAX, &[]);
        assert_eq!(cookie, Protocols::NXM_ANY | Protocols::OF12);

        let goto = flow_mod_usable_protocols(
            &rule,
            TABLE_ID_UNSPECIFIED,
            0,
            &[Action::GotoTable(1)],
        );
        assert_eq!(goto, Protocols::OF12);
    }
}
