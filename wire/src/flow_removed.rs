// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The flow-removed notification codec.

use crate::cursor::Reader;
use crate::error::OfpErr;
use crate::header::{NICIRA_HEADER_LEN, OFP_HEADER_LEN, OFP10_VERSION, OFP12_VERSION, OfpHeader, nxt, ofpt10};
use crate::match10::{Match10, rule_from_match10, rule_to_match10};
use crate::match11::pull_match11;
use crate::msg::{MsgBuf, make_nxmsg, make_openflow};
use crate::nx_match::{self, CookiePair, Dialect, PullMode};
use crate::proto::Protocol;
use crate::registry::{MsgCode, decode_msg_type};
use flow::Rule;

/// Total size of the 1.0 flow-removed message.
pub const OFP10_FLOW_REMOVED_LEN: usize = 88;
/// Minimum size of the 1.2 flow-removed (fixed part plus the smallest
/// extensible match).
pub const OFP12_FLOW_REMOVED_MIN_LEN: usize = 56;
/// Minimum size of the Nicira flow-removed.
pub const NX_FLOW_REMOVED_LEN: usize = 56;

/// Why a flow was removed.
pub mod ofprr {
    pub const IDLE_TIMEOUT: u8 = 0;
    pub const HARD_TIMEOUT: u8 = 1;
    pub const DELETE: u8 = 2;
}

/// A flow-removed notification, protocol independent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowRemoved {
    /// The removed flow's match and priority.
    pub rule: Rule,
    /// The flow's cookie.
    pub cookie: u64,
    /// One of the `ofprr` reasons.
    pub reason: u8,
    /// Seconds the flow was installed.
    pub duration_sec: u32,
    /// Sub-second part of the duration.
    pub duration_nsec: u32,
    /// The flow's idle timeout.
    pub idle_timeout: u16,
    /// Packets matched, `u64::MAX` when unknown.
    pub packet_count: u64,
    /// Bytes matched, `u64::MAX` when unknown.
    pub byte_count: u64,
}

/// Decodes an OFPT_FLOW_REMOVED or NXT_FLOW_REMOVED message.
///
/// # Errors
///
/// Classification and match errors per [`OfpErr`].
pub fn decode_flow_removed(msg: &[u8]) -> Result<FlowRemoved, OfpErr> {
    let desc = decode_msg_type(msg)?;
    let declared = OfpHeader::parse(msg).map_err(|_| OfpErr::BadLen)?.length as usize;
    let mut r = Reader::new(&msg[..declared.min(msg.len())]);
    let len = |_| OfpErr::BadLen;

    match (desc.code, msg[0]) {
        (MsgCode::FlowRemoved, OFP12_VERSION) => {
            r.skip(OFP_HEADER_LEN).map_err(len)?;
            let cookie = r.u64().map_err(len)?;
            let priority = r.u16().map_err(len)?;
            let reason = r.u8().map_err(len)?;
            let _table_id = r.u8().map_err(len)?;
            let duration_sec = r.u32().map_err(len)?;
            let duration_nsec = r.u32().map_err(len)?;
            let idle_timeout = r.u16().map_err(len)?;
            let _hard_timeout = r.u16().map_err(len)?;
            let packet_count = r.u64().map_err(len)?;
            let byte_count = r.u64().map_err(len)?;
            let pulled = pull_match11(&mut r, priority, OFP12_VERSION)?;
            Ok(FlowRemoved {
                rule: pulled.rule,
                cookie,
                reason,
                duration_sec,
                duration_nsec,
                idle_timeout,
                packet_count,
                byte_count,
            })
        }
        (MsgCode::FlowRemoved, OFP10_VERSION) => {
            r.skip(OFP_HEADER_LEN).map_err(len)?;
            let m = Match10::parse(&mut r).map_err(len)?;
            let cookie = r.u64().map_err(len)?;
            let priority = r.u16().map_err(len)?;
            let reason = r.u8().map_err(len)?;
            r.skip(1).map_err(len)?;
            let duration_sec = r.u32().map_err(len)?;
            let duration_nsec = r.u32().map_err(len)?;
            let idle_timeout = r.u16().map_err(len)?;
            r.skip(2).map_err(len)?;
            let packet_count = r.u64().map_err(len)?;
            let byte_count = r.u64().map_err(len)?;
            Ok(FlowRemoved {
                rule: rule_from_match10(&m, priority),
                cookie,
                reason,
                duration_sec,
                duration_nsec,
                idle_timeout,
                packet_count,
                byte_count,
            })
        }
        (MsgCode::NxtFlowRemoved, _) => {
            r.skip(NICIRA_HEADER_LEN).map_err(len)?;
            let cookie = r.u64().map_err(len)?;
            let priority = r.u16().map_err(len)?;
            let reason = r.u8().map_err(len)?;
            r.skip(1).map_err(len)?;
            let duration_sec = r.u32().map_err(len)?;
            let duration_nsec = r.u32().map_err(len)?;
            let idle_timeout = r.u16().map_err(len)?;
            let match_len = r.u16().map_err(len)? as usize;
            let packet_count = r.u64().map_err(len)?;
            let byte_count = r.u64().map_err(len)?;
            let (rule, _) =
                nx_match::pull_match(&mut r, match_len, 0, priority, PullMode::Strict)?;
            if r.remaining() != 0 {
                return Err(OfpErr::BadLen);
            }
            Ok(FlowRemoved {
                rule,
                cookie,
                reason,
                duration_sec,
                duration_nsec,
                idle_timeout,
                packet_count,
                byte_count,
            })
        }
        _ => unreachable!("message is not a flow_removed: {}", desc.name),
    }
}

/// Returns `count` unchanged except that the "unknown" sentinel becomes
/// zero, for formats with no way to say unknown.
fn unknown_to_zero(count: u64) -> u64 {
    if count == u64::MAX { 0 } else { count }
}

/// Encodes `fr` for `protocol`.  Flow-removed is asynchronous, so `xid`
/// is conventionally zero.
#[must_use]
pub fn encode_flow_removed(fr: &FlowRemoved, protocol: Protocol, xid: u32) -> MsgBuf {
    let version = protocol.to_ofp_version();
    match protocol {
        Protocol::OpenFlow12 => {
            let mut b = make_openflow(OFP_HEADER_LEN, version, ofpt10::FLOW_REMOVED, xid);
            b.put_u64(fr.cookie);
            b.put_u16(fr.rule.priority);
            b.put_u8(fr.reason);
            b.put_u8(0); // table_id
            b.put_u32(fr.duration_sec);
            b.put_u32(fr.duration_nsec);
            b.put_u16(fr.idle_timeout);
            b.put_u16(0); // hard_timeout
            b.put_u64(fr.packet_count);
            b.put_u64(fr.byte_count);
            nx_match::put_match(&mut b, Dialect::Oxm, &fr.rule, CookiePair::default());
            b.update_length();
            b
        }
        Protocol::OpenFlow10 | Protocol::OpenFlow10Tid => {
            let mut b = make_openflow(OFP_HEADER_LEN, version, ofpt10::FLOW_REMOVED, xid);
            rule_to_match10(&fr.rule).put(&mut b);
            b.put_u64(fr.cookie);
            b.put_u16(fr.rule.priority);
            b.put_u8(fr.reason);
            b.put_zeros(1);
            b.put_u32(fr.duration_sec);
            b.put_u32(fr.duration_nsec);
            b.put_u16(fr.idle_timeout);
            b.put_zeros(2);
            b.put_u64(unknown_to_zero(fr.packet_count));
            b.put_u64(unknown_to_zero(fr.byte_count));
            b.update_length();
            b
        }
        Protocol::Nxm | Protocol::NxmTid => {
            let mut b = make_nxmsg(NICIRA_HEADER_LEN, nxt::FLOW_REMOVED, xid);
            b.put_u64(fr.cookie);
            b.put_u16(fr.rule.priority);
            b.put_u8(fr.reason);
            b.put_zeros(1);
            b.put_u32(fr.duration_sec);
            b.put_u32(fr.duration_nsec);
            b.put_u16(fr.idle_timeout);
            let match_len_at = b.len();
            b.put_u16(0);
            b.put_u64(fr.packet_count);
            b.put_u64(fr.byte_count);
            let match_len =
                nx_match::put_match(&mut b, Dialect::Nxm, &fr.rule, CookiePair::default());
            #[allow(clippy::cast_possible_truncation)] // match fits a message
            b.set_u16_at(match_len_at, match_len as u16);
            b.update_length();
            b
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use flow::key::eth_type;
    use pretty_assertions::assert_eq;

    fn sample() -> FlowRemoved {
        let mut rule = Rule::catchall(1000);
        rule.set_dl_type(eth_type::IP);
        rule.set_nw_dst_masked(0x0a00_0000, 0xff00_0000);
        FlowRemoved {
            rule,
            cookie: 0xdead_beef,
            reason: ofprr::IDLE_TIMEOUT,
            duration_sec: 30,
            duration_nsec: 12,
            idle_timeout: 10,
            packet_count: 99,
            byte_count: 9900,
        }
    }

    #[test]
    fn round_trips_all_families() {
        for protocol in [Protocol::OpenFlow10, Protocol::Nxm, Protocol::OpenFlow12] {
            let fr = sample();
            let b = encode_flow_removed(&fr, protocol, 0);
            let got = decode_flow_removed(b.as_slice()).unwrap();
            assert_eq!(got, fr, "family {protocol:?}");
        }
    }

    #[test]
    fn of10_unknown_counts_encode_as_zero() {
        let mut fr = sample();
        fr.packet_count = u64::MAX;
        let b = encode_flow_removed(&fr, Protocol::OpenFlow10, 0);
        let got = decode_flow_removed(b.as_slice()).unwrap();
        assert_eq!(got.packet_count, 0);
    }

    #[test]
    fn nx_trailing_bytes_rejected() {
        let fr = sample();
        let mut b = encode_flow_removed(&fr, Protocol::Nxm, 0);
        b.put_zeros(8);
        b.update_length();
        assert_eq!(decode_flow_removed(b.as_slice()), Err(OfpErr::BadLen));
    }
}
