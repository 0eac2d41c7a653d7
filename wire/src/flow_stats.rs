// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Flow statistics: request codec, reply record iterator, reply
//! appending, and the aggregate reply.

use crate::actions::{pull_actions, pull_instructions};
use crate::cursor::Reader;
use crate::error::OfpErr;
use crate::header::{OFP10_VERSION, OFP12_VERSION, nxst, ofpst};
use crate::match10::{Match10, rule_from_match10, rule_to_match10};
use crate::match11::pull_match11;
use crate::msg::MsgBuf;
use crate::nx_match::{self, CookiePair, Dialect, PullMode};
use crate::port::{port_from_ofp11, port_to_ofp11};
use crate::proto::{Protocol, Protocols, usable_protocols};
use crate::ratelimit::warn_rl;
use crate::registry::{MsgCode, decode_msg_type};
use crate::stats::{StatsReplies, make_stats_request, stats_body};
use flow::Rule;

/// Body length of a 1.0 flow/aggregate stats request.
pub const OFP10_FLOW_STATS_REQUEST_LEN: usize = 44;
/// Minimum body length of a 1.2 flow/aggregate stats request (fixed part
/// plus the smallest extensible match).
pub const OFP11_FLOW_STATS_REQUEST_MIN_LEN: usize = 40;
/// Body length of a Nicira flow/aggregate stats request.
pub const NX_FLOW_STATS_REQUEST_LEN: usize = 8;
/// Body length of any aggregate stats reply.
pub const OFP10_AGGREGATE_STATS_REPLY_LEN: usize = 24;
/// Body length of any aggregate stats reply (1.1+ layout; identical).
pub const OFP11_AGGREGATE_STATS_REPLY_LEN: usize = 24;
/// Body length of the Nicira aggregate stats reply.
pub const NX_AGGREGATE_STATS_REPLY_LEN: usize = 24;

/// Fixed prefix of a 1.0 flow stats record.
pub const OFP10_FLOW_STATS_LEN: usize = 88;
/// Fixed prefix of a 1.1/1.2 flow stats record.
pub const OFP11_FLOW_STATS_LEN: usize = 48;
/// Fixed prefix of a Nicira flow stats record.
pub const NX_FLOW_STATS_LEN: usize = 48;

/// Age not reported.
pub const AGE_UNKNOWN: i32 = -1;

/// A flow (or aggregate) statistics request, protocol independent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowStatsRequest {
    /// Flows to report on.
    pub rule: Rule,
    /// Aggregate totals rather than per-flow records.
    pub aggregate: bool,
    /// Restrict to flows forwarding to this port, or `OFPP_NONE`.
    pub out_port: u16,
    /// Restrict to one table, or the all-tables sentinel 0xff.
    pub table_id: u8,
    /// Cookie filter bits.
    pub cookie: u64,
    /// Cookie filter mask; zero for no filtering.
    pub cookie_mask: u64,
}

/// Decodes a flow or aggregate statistics request of any family.
///
/// # Errors
///
/// Classification, match, and group errors per [`OfpErr`].
pub fn decode_flow_stats_request(msg: &[u8]) -> Result<FlowStatsRequest, OfpErr> {
    let desc = decode_msg_type(msg)?;
    let mut r = stats_body(msg)?;
    let len = |_| OfpErr::BadLen;

    match desc.code {
        MsgCode::FlowStatsRequest10 | MsgCode::AggregateStatsRequest10 => {
            let m = Match10::parse(&mut r).map_err(len)?;
            let table_id = r.u8().map_err(len)?;
            r.skip(1).map_err(len)?;
            let out_port = r.u16().map_err(len)?;
            Ok(FlowStatsRequest {
                rule: rule_from_match10(&m, 0),
                aggregate: desc.code == MsgCode::AggregateStatsRequest10,
                out_port,
                table_id,
                cookie: 0,
                cookie_mask: 0,
            })
        }
        MsgCode::FlowStatsRequest11 | MsgCode::AggregateStatsRequest11 => {
            let table_id = r.u8().map_err(len)?;
            r.skip(3).map_err(len)?;
            let out_port = port_from_ofp11(r.u32().map_err(len)?)?;
            let out_group = r.u32().map_err(len)?;
            if out_group != crate::flow_mod::OFPG11_ANY {
                return Err(OfpErr::GroupsNotSupported);
            }
            r.skip(4).map_err(len)?;
            let cookie = r.u64().map_err(len)?;
            let cookie_mask = r.u64().map_err(len)?;
            let pulled = pull_match11(&mut r, 0, OFP12_VERSION)?;
            Ok(FlowStatsRequest {
                rule: pulled.rule,
                aggregate: desc.code == MsgCode::AggregateStatsRequest11,
                out_port,
                table_id,
                cookie,
                cookie_mask,
            })
        }
        MsgCode::NxstFlowRequest | MsgCode::NxstAggregateRequest => {
            let out_port = r.u16().map_err(len)?;
            let match_len = r.u16().map_err(len)? as usize;
            let table_id = r.u8().map_err(len)?;
            r.skip(3).map_err(len)?;
            let (rule, pair) = nx_match::pull_match(&mut r, match_len, 0, 0, PullMode::Strict)?;
            if r.remaining() != 0 {
                return Err(OfpErr::BadLen);
            }
            Ok(FlowStatsRequest {
                rule,
                aggregate: desc.code == MsgCode::NxstAggregateRequest,
                out_port,
                table_id,
                cookie: pair.cookie,
                cookie_mask: pair.mask,
            })
        }
        _ => unreachable!("message is not a flow stats request: {}", desc.name),
    }
}

/// Encodes `fsr` for `protocol`.
#[must_use]
pub fn encode_flow_stats_request(fsr: &FlowStatsRequest, protocol: Protocol, xid: u32) -> MsgBuf {
    let version = protocol.to_ofp_version();
    match protocol {
        Protocol::OpenFlow12 => {
            let stat = if fsr.aggregate { ofpst::AGGREGATE } else { ofpst::FLOW };
            let mut b = make_stats_request(version, stat, 0, 0, xid);
            b.put_u8(fsr.table_id);
            b.put_zeros(3);
            b.put_u32(port_to_ofp11(fsr.out_port));
            b.put_u32(crate::flow_mod::OFPG11_ANY);
            b.put_zeros(4);
            b.put_u64(fsr.cookie);
            b.put_u64(fsr.cookie_mask);
            nx_match::put_match(
                &mut b,
                Dialect::Oxm,
                &fsr.rule,
                CookiePair { cookie: fsr.cookie, mask: fsr.cookie_mask },
            );
            b.update_length();
            b
        }
        Protocol::OpenFlow10 | Protocol::OpenFlow10Tid => {
            let stat = if fsr.aggregate { ofpst::AGGREGATE } else { ofpst::FLOW };
            let mut b = make_stats_request(version, stat, 0, 0, xid);
            rule_to_match10(&fsr.rule).put(&mut b);
            b.put_u8(fsr.table_id);
            b.put_zeros(1);
            b.put_u16(fsr.out_port);
            b.update_length();
            b
        }
        Protocol::Nxm | Protocol::NxmTid => {
            let subtype = if fsr.aggregate { nxst::AGGREGATE } else { nxst::FLOW };
            let mut b =
                make_stats_request(version, ofpst::VENDOR, subtype, NX_FLOW_STATS_REQUEST_LEN, xid);
            let body_at = b.len() - NX_FLOW_STATS_REQUEST_LEN;
            let match_len = nx_match::put_match(
                &mut b,
                Dialect::Nxm,
                &fsr.rule,
                CookiePair { cookie: fsr.cookie, mask: fsr.cookie_mask },
            );
            b.set_u16_at(body_at, fsr.out_port);
            #[allow(clippy::cast_possible_truncation)] // match fits a message
            b.set_u16_at(body_at + 2, match_len as u16);
            b.as_mut_slice()[body_at + 4] = fsr.table_id;
            b.update_length();
            b
        }
    }
}

/// The protocols able to express `fsr` exactly.
#[must_use]
pub fn flow_stats_request_usable_protocols(fsr: &FlowStatsRequest) -> Protocols {
    let mut usable = usable_protocols(&fsr.rule);
    if fsr.cookie_mask != 0 {
        usable &= Protocols::NXM_ANY;
    }
    usable
}

/// One flow's statistics from a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowStats<'a> {
    /// The flow's match and priority.
    pub rule: Rule,
    /// The flow's cookie.
    pub cookie: u64,
    /// Table holding the flow.
    pub table_id: u8,
    /// Seconds the flow has been installed.
    pub duration_sec: u32,
    /// Sub-second part of the duration.
    pub duration_nsec: u32,
    /// Idle timeout, zero for none.
    pub idle_timeout: u16,
    /// Hard timeout, zero for none.
    pub hard_timeout: u16,
    /// Seconds since the last matching packet, or [`AGE_UNKNOWN`].
    pub idle_age: i32,
    /// Seconds since the flow was (re)installed, or [`AGE_UNKNOWN`].
    pub hard_age: i32,
    /// Packets matched, `u64::MAX` when unknown.
    pub packet_count: u64,
    /// Bytes matched, `u64::MAX` when unknown.
    pub byte_count: u64,
    /// Raw action/instruction region within the reply message.
    pub actions: &'a [u8],
}

/// An iterator peeling flow stats records off one reply message.
///
/// Each record's self-declared length is validated against the bytes
/// actually present before anything derived from it is trusted.
#[derive(Debug)]
pub struct FlowStatsIter<'a> {
    code: MsgCode,
    flow_age_extension: bool,
    r: Reader<'a>,
}

/// Begins iterating the flow stats records in `msg`.
///
/// Pass `flow_age_extension` only when the peer is known to implement
/// the flow-age extension; otherwise ages report unknown.
///
/// # Errors
///
/// Fails on classification or envelope errors; per-record errors come
/// from the iterator.
pub fn decode_flow_stats_reply(
    msg: &[u8],
    flow_age_extension: bool,
) -> Result<FlowStatsIter<'_>, OfpErr> {
    let desc = decode_msg_type(msg)?;
    match desc.code {
        MsgCode::FlowStatsReply10 | MsgCode::FlowStatsReply11 | MsgCode::NxstFlowReply => {
            Ok(FlowStatsIter {
                code: desc.code,
                flow_age_extension,
                r: stats_body(msg)?,
            })
        }
        _ => unreachable!("message is not a flow stats reply: {}", desc.name),
    }
}

impl<'a> FlowStatsIter<'a> {
    #[allow(clippy::too_many_lines)]
    fn next_record(&mut self) -> Result<FlowStats<'a>, OfpErr> {
        let len = |_| OfpErr::BadLen;
        let r = &mut self.r;
        match self.code {
            MsgCode::FlowStatsReply11 => {
                let avail = r.remaining();
                let length = r.u16().map_err(len)? as usize;
                if length < OFP11_FLOW_STATS_LEN || length > avail {
                    warn_rl!("OFPST_FLOW reply claims invalid length {length}");
                    return Err(OfpErr::BadLen);
                }
                let table_id = r.u8().map_err(len)?;
                r.skip(1).map_err(len)?;
                let duration_sec = r.u32().map_err(len)?;
                let duration_nsec = r.u32().map_err(len)?;
                let priority = r.u16().map_err(len)?;
                let idle_timeout = r.u16().map_err(len)?;
                let hard_timeout = r.u16().map_err(len)?;
                r.skip(6).map_err(len)?;
                let cookie = r.u64().map_err(len)?;
                let packet_count = r.u64().map_err(len)?;
                let byte_count = r.u64().map_err(len)?;
                let pulled = pull_match11(r, priority, OFP12_VERSION)?;
                let inst_len = length
                    .checked_sub(OFP11_FLOW_STATS_LEN + pulled.padded_len)
                    .ok_or(OfpErr::BadLen)?;
                let actions = pull_instructions(r, inst_len)?;
                Ok(FlowStats {
                    rule: pulled.rule,
                    cookie,
                    table_id,
                    duration_sec,
                    duration_nsec,
                    idle_timeout,
                    hard_timeout,
                    idle_age: AGE_UNKNOWN,
                    hard_age: AGE_UNKNOWN,
                    packet_count,
                    byte_count,
                    actions,
                })
            }
            MsgCode::FlowStatsReply10 => {
                let avail = r.remaining();
                let length = r.u16().map_err(len)? as usize;
                if length < OFP10_FLOW_STATS_LEN || length > avail {
                    warn_rl!("OFPST_FLOW reply claims invalid length {length}");
                    return Err(OfpErr::BadLen);
                }
                let table_id = r.u8().map_err(len)?;
                r.skip(1).map_err(len)?;
                let m = Match10::parse(r).map_err(len)?;
                let duration_sec = r.u32().map_err(len)?;
                let duration_nsec = r.u32().map_err(len)?;
                let priority = r.u16().map_err(len)?;
                let idle_timeout = r.u16().map_err(len)?;
                let hard_timeout = r.u16().map_err(len)?;
                r.skip(6).map_err(len)?;
                let cookie = r.u64().map_err(len)?;
                let packet_count = r.u64().map_err(len)?;
                let byte_count = r.u64().map_err(len)?;
                let actions = pull_actions(r, length - OFP10_FLOW_STATS_LEN)?;
                Ok(FlowStats {
                    rule: rule_from_match10(&m, priority),
                    cookie,
                    table_id,
                    duration_sec,
                    duration_nsec,
                    idle_timeout,
                    hard_timeout,
                    idle_age: AGE_UNKNOWN,
                    hard_age: AGE_UNKNOWN,
                    packet_count,
                    byte_count,
                    actions,
                })
            }
            MsgCode::NxstFlowReply => {
                let avail = r.remaining();
                let length = r.u16().map_err(len)? as usize;
                let table_id = r.u8().map_err(len)?;
                r.skip(1).map_err(len)?;
                let duration_sec = r.u32().map_err(len)?;
                let duration_nsec = r.u32().map_err(len)?;
                let priority = r.u16().map_err(len)?;
                let idle_timeout = r.u16().map_err(len)?;
                let hard_timeout = r.u16().map_err(len)?;
                let match_len = r.u16().map_err(len)? as usize;
                let idle_age_raw = r.u16().map_err(len)?;
                let hard_age_raw = r.u16().map_err(len)?;
                let cookie = r.u64().map_err(len)?;
                let packet_count = r.u64().map_err(len)?;
                let byte_count = r.u64().map_err(len)?;
                let padded_match = match_len.div_ceil(8) * 8;
                if length < NX_FLOW_STATS_LEN + padded_match || length > avail {
                    warn_rl!(
                        "NXST_FLOW reply with match_len={match_len} claims invalid length {length}"
                    );
                    return Err(OfpErr::BadLen);
                }
                let (rule, _) = nx_match::pull_match(r, match_len, 0, priority, PullMode::Strict)?;
                let actions = pull_actions(r, length - NX_FLOW_STATS_LEN - padded_match)?;
                // Zero means "no age reported"; real values ride offset
                // by one so that zero stays free for the sentinel.
                let age = |raw: u16| {
                    if self.flow_age_extension && raw != 0 { i32::from(raw) - 1 } else { AGE_UNKNOWN }
                };
                Ok(FlowStats {
                    rule,
                    cookie,
                    table_id,
                    duration_sec,
                    duration_nsec,
                    idle_timeout,
                    hard_timeout,
                    idle_age: age(idle_age_raw),
                    hard_age: age(hard_age_raw),
                    packet_count,
                    byte_count,
                    actions,
                })
            }
            _ => unreachable!("checked at iterator construction"),
        }
    }
}

impl<'a> Iterator for FlowStatsIter<'a> {
    type Item = Result<FlowStats<'a>, OfpErr>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.r.remaining() == 0 {
            return None;
        }
        let record = self.next_record();
        if record.is_err() {
            // Do not resynchronize after a malformed record.
            self.r.skip(self.r.remaining()).ok();
        }
        Some(record)
    }
}

/// Returns `count` unchanged except that the internal "unknown" sentinel
/// becomes 0, which is the closest thing the wire formats can say.
#[must_use]
pub fn unknown_to_zero(count: u64) -> u64 {
    if count == u64::MAX { 0 } else { count }
}

/// Appends one flow's statistics to a reply series started from a flow
/// stats request; the record layout follows the series' own envelope.
pub fn append_flow_stats_reply(fs: &FlowStats<'_>, version: u8, replies: &mut StatsReplies) {
    let vendor = {
        let last = replies.last_mut();
        crate::stats::stats_msg_type(last.as_slice()) == ofpst::VENDOR
    };
    let b = replies.last_mut();
    let start_ofs = b.len();

    if vendor {
        let len_at = b.len();
        b.put_u16(0); // record length, patched below
        b.put_u8(fs.table_id);
        b.put_zeros(1);
        b.put_u32(fs.duration_sec);
        b.put_u32(fs.duration_nsec);
        b.put_u16(fs.rule.priority);
        b.put_u16(fs.idle_timeout);
        b.put_u16(fs.hard_timeout);
        let match_len_at = b.len();
        b.put_u16(0);
        let clamp_age = |age: i32| -> u16 {
            if age < 0 {
                0
            } else if age < i32::from(u16::MAX) {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                {
                    (age + 1) as u16
                }
            } else {
                u16::MAX
            }
        };
        b.put_u16(clamp_age(fs.idle_age));
        b.put_u16(clamp_age(fs.hard_age));
        b.put_u64(fs.cookie);
        b.put_u64(fs.packet_count);
        b.put_u64(fs.byte_count);
        let match_len =
            nx_match::put_match(b, Dialect::Nxm, &fs.rule, CookiePair::default());
        #[allow(clippy::cast_possible_truncation)]
        b.set_u16_at(match_len_at, match_len as u16);
        b.put(fs.actions);
        #[allow(clippy::cast_possible_truncation)]
        let record_len = (b.len() - start_ofs) as u16;
        b.set_u16_at(len_at, record_len);
    } else if version == OFP10_VERSION {
        let len_at = b.len();
        b.put_u16(0);
        b.put_u8(fs.table_id);
        b.put_zeros(1);
        rule_to_match10(&fs.rule).put(b);
        b.put_u32(fs.duration_sec);
        b.put_u32(fs.duration_nsec);
        b.put_u16(fs.rule.priority);
        b.put_u16(fs.idle_timeout);
        b.put_u16(fs.hard_timeout);
        b.put_zeros(6);
        b.put_u64(fs.cookie);
        b.put_u64(unknown_to_zero(fs.packet_count));
        b.put_u64(unknown_to_zero(fs.byte_count));
        b.put(fs.actions);
        #[allow(clippy::cast_possible_truncation)]
        let record_len = (b.len() - start_ofs) as u16;
        b.set_u16_at(len_at, record_len);
    } else {
        let len_at = b.len();
        b.put_u16(0);
        b.put_u8(fs.table_id);
        b.put_zeros(1);
        b.put_u32(fs.duration_sec);
        b.put_u32(fs.duration_nsec);
        b.put_u16(fs.rule.priority);
        b.put_u16(fs.idle_timeout);
        b.put_u16(fs.hard_timeout);
        b.put_zeros(6);
        b.put_u64(fs.cookie);
        b.put_u64(unknown_to_zero(fs.packet_count));
        b.put_u64(unknown_to_zero(fs.byte_count));
        nx_match::put_match(b, Dialect::Oxm, &fs.rule, CookiePair::default());
        b.put(fs.actions);
        #[allow(clippy::cast_possible_truncation)]
        let record_len = (b.len() - start_ofs) as u16;
        b.set_u16_at(len_at, record_len);
    }

    replies.postappend(start_ofs);
}

/// Aggregated statistics over a set of flows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateStats {
    /// Total packets, `u64::MAX` when unknown.
    pub packet_count: u64,
    /// Total bytes, `u64::MAX` when unknown.
    pub byte_count: u64,
    /// Number of flows aggregated.
    pub flow_count: u32,
}

/// Encodes an aggregate stats reply answering `request`.
///
/// # Errors
///
/// Fails when `request` is not an aggregate stats request.
pub fn encode_aggregate_stats_reply(
    stats: &AggregateStats,
    request: &[u8],
) -> Result<MsgBuf, OfpErr> {
    let desc = decode_msg_type(request)?;
    match desc.code {
        MsgCode::AggregateStatsRequest10
        | MsgCode::AggregateStatsRequest11
        | MsgCode::NxstAggregateRequest => {
            let mut b = crate::stats::make_stats_reply(request, 0)?;
            b.put_u64(unknown_to_zero(stats.packet_count));
            b.put_u64(unknown_to_zero(stats.byte_count));
            b.put_u32(stats.flow_count);
            b.put_zeros(4);
            b.update_length();
            Ok(b)
        }
        _ => unreachable!("message is not an aggregate stats request: {}", desc.name),
    }
}

/// Decodes an aggregate stats reply of any family.
///
/// # Errors
///
/// Classification and length errors per [`OfpErr`].
pub fn decode_aggregate_stats_reply(msg: &[u8]) -> Result<AggregateStats, OfpErr> {
    let desc = decode_msg_type(msg)?;
    match desc.code {
        MsgCode::AggregateStatsReply10
        | MsgCode::AggregateStatsReply11
        | MsgCode::NxstAggregateReply => {
            let mut r = stats_body(msg)?;
            let len = |_| OfpErr::BadLen;
            Ok(AggregateStats {
                packet_count: r.u64().map_err(len)?,
                byte_count: r.u64().map_err(len)?,
                flow_count: r.u32().map_err(len)?,
            })
        }
        _ => unreachable!("message is not an aggregate stats reply: {}", desc.name),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::port::OFPP_NONE;
    use crate::stats::{OFPSF_REPLY_MORE, stats_msg_flags};
    use flow::key::{eth_type, ip_proto};
    use pretty_assertions::assert_eq;

    fn sample_request() -> FlowStatsRequest {
        let mut rule = Rule::catchall(0);
        rule.set_dl_type(eth_type::IP);
        rule.set_nw_proto(ip_proto::UDP);
        FlowStatsRequest {
            rule,
            aggregate: false,
            out_port: OFPP_NONE,
            table_id: 0xff,
            cookie: 0,
            cookie_mask: 0,
        }
    }

    #[test]
    fn request_round_trips_all_families() {
        for protocol in [Protocol::OpenFlow10, Protocol::Nxm, Protocol::OpenFlow12] {
            let fsr = sample_request();
            let b = encode_flow_stats_request(&fsr, protocol, 1);
            let got = decode_flow_stats_request(b.as_slice()).unwrap();
            assert_eq!(got, fsr, "family {protocol:?}");
        }
    }

    #[test]
    fn aggregate_round_trips() {
        let mut fsr = sample_request();
        fsr.aggregate = true;
        fsr.cookie = 0x77;
        fsr.cookie_mask = u64::MAX;
        let b = encode_flow_stats_request(&fsr, Protocol::Nxm, 1);
        let got = decode_flow_stats_request(b.as_slice()).unwrap();
        assert_eq!(got, fsr);
    }

    #[test]
    fn request_usable_protocols() {
        let mut fsr = sample_request();
        assert_eq!(flow_stats_request_usable_protocols(&fsr), Protocols::ANY);
        fsr.cookie_mask = 1;
        assert_eq!(flow_stats_request_usable_protocols(&fsr), Protocols::NXM_ANY);
    }

    fn sample_stats<'a>(actions: &'a [u8]) -> FlowStats<'a> {
        let mut rule = Rule::catchall(300);
        rule.set_in_port(2);
        FlowStats {
            rule,
            cookie: 0xfeed,
            table_id: 1,
            duration_sec: 100,
            duration_nsec: 5000,
            idle_timeout: 10,
            hard_timeout: 0,
            idle_age: 3,
            hard_age: AGE_UNKNOWN,
            packet_count: 42,
            byte_count: 4200,
            actions,
        }
    }

    #[test]
    fn reply_iterates_nx_records() {
        let fsr = sample_request();
        let rq = encode_flow_stats_request(&fsr, Protocol::Nxm, 1);
        let mut replies = StatsReplies::start(rq.as_slice()).unwrap();
        let fs = sample_stats(&[]);
        append_flow_stats_reply(&fs, OFP10_VERSION, &mut replies);
        append_flow_stats_reply(&fs, OFP10_VERSION, &mut replies);
        let msgs = replies.finish();
        assert_eq!(msgs.len(), 1);

        let got: Vec<_> = decode_flow_stats_reply(msgs[0].as_slice(), true)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0], fs);
        // Exhausted after the last record.
        assert_eq!(got.len(), 2);
    }

    #[test]
    fn reply_age_sentinels() {
        let fsr = sample_request();
        let rq = encode_flow_stats_request(&fsr, Protocol::Nxm, 1);
        let mut replies = StatsReplies::start(rq.as_slice()).unwrap();
        let fs = sample_stats(&[]);
        append_flow_stats_reply(&fs, OFP10_VERSION, &mut replies);
        let msgs = replies.finish();

        // Without the extension, ages always read unknown.
        let got = decode_flow_stats_reply(msgs[0].as_slice(), false)
            .unwrap()
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(got.idle_age, AGE_UNKNOWN);
        assert_eq!(got.hard_age, AGE_UNKNOWN);

        // With it, the +1 offset comes back off and zero means unknown.
        let got = decode_flow_stats_reply(msgs[0].as_slice(), true)
            .unwrap()
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(got.idle_age, 3);
        assert_eq!(got.hard_age, AGE_UNKNOWN);
    }

    #[test]
    fn of10_reply_records_round_trip() {
        let mut fsr = sample_request();
        fsr.rule = Rule::catchall(0);
        let rq = encode_flow_stats_request(&fsr, Protocol::OpenFlow10, 1);
        let mut replies = StatsReplies::start(rq.as_slice()).unwrap();
        let mut fs = sample_stats(&[0, 0, 0, 8, 0, 1, 0, 0]);
        fs.idle_age = AGE_UNKNOWN; // 1.0 records cannot carry ages
        append_flow_stats_reply(&fs, OFP10_VERSION, &mut replies);
        let msgs = replies.finish();
        let got = decode_flow_stats_reply(msgs[0].as_slice(), false)
            .unwrap()
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(got.rule, fs.rule);
        assert_eq!(got.cookie, fs.cookie);
        assert_eq!(got.actions, fs.actions);
    }

    #[test]
    fn truncated_record_is_an_error_not_a_panic() {
        let fsr = sample_request();
        let rq = encode_flow_stats_request(&fsr, Protocol::Nxm, 1);
        let mut replies = StatsReplies::start(rq.as_slice()).unwrap();
        append_flow_stats_reply(&sample_stats(&[]), OFP10_VERSION, &mut replies);
        let mut msgs = replies.finish();
        // Lie about the record length.
        let env = crate::stats::stats_msg_len(msgs[0].as_slice()).unwrap();
        msgs[0].set_u16_at(env, 0xffff);
        let mut iter = decode_flow_stats_reply(msgs[0].as_slice(), false).unwrap();
        assert_eq!(iter.next().unwrap(), Err(OfpErr::BadLen));
        assert!(iter.next().is_none());
    }

    #[test]
    fn oversized_series_paginates_with_more_flag() {
        let fsr = sample_request();
        let rq = encode_flow_stats_request(&fsr, Protocol::Nxm, 1);
        let mut replies = StatsReplies::start(rq.as_slice()).unwrap();
        // Records with a fat action region force a split.
        let actions = vec![0u8; 1024];
        let fs = sample_stats(&actions);
        for _ in 0..70 {
            append_flow_stats_reply(&fs, OFP10_VERSION, &mut replies);
        }
        let msgs = replies.finish();
        assert!(msgs.len() >= 2);
        for (i, m) in msgs.iter().enumerate() {
            assert!(m.len() <= usize::from(u16::MAX));
            let more = stats_msg_flags(m.as_slice()) & OFPSF_REPLY_MORE != 0;
            assert_eq!(more, i + 1 < msgs.len());
        }
    }

    #[test]
    fn aggregate_reply_round_trips() {
        let fsr = FlowStatsRequest { aggregate: true, ..sample_request() };
        let rq = encode_flow_stats_request(&fsr, Protocol::OpenFlow10, 9);
        let stats = AggregateStats { packet_count: 10, byte_count: 1000, flow_count: 3 };
        let b = encode_aggregate_stats_reply(&stats, rq.as_slice()).unwrap();
        assert_eq!(decode_aggregate_stats_reply(b.as_slice()).unwrap(), stats);
        // The unknown sentinel encodes as zero.
        let unknown = AggregateStats { packet_count: u64::MAX, byte_count: 5, flow_count: 1 };
        let b = encode_aggregate_stats_reply(&unknown, rq.as_slice()).unwrap();
        assert_eq!(decode_aggregate_stats_reply(b.as_slice()).unwrap().packet_count, 0);
    }
}
