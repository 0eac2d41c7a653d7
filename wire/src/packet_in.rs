// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The packet-in codec.
//!
//! Three layouts, one abstract value: the extensible-match generations
//! carry ingress metadata (port, tunnel, registers) as match fields,
//! the 1.0 layout carries only an ingress port — all of them populate
//! the same [`FlowMetadata`] so downstream code never cares which
//! generation delivered the packet.

use crate::cursor::Reader;
use crate::error::OfpErr;
use crate::header::{
    NICIRA_HEADER_LEN, OFP_HEADER_LEN, OFP10_VERSION, OFP12_VERSION, OfpHeader, nxt, ofpt10,
};
use crate::match11::pull_match11;
use crate::msg::{MsgBuf, make_nxmsg, make_openflow};
use crate::nx_match::{self, CookiePair, Dialect, PullMode};
use crate::proto::{PacketInFormat, Protocol};
use crate::registry::{MsgCode, decode_msg_type};
use flow::key::FLOW_N_REGS;
use flow::Rule;

/// Bytes of a 1.0 packet-in before the packet data.
pub const OFP10_PACKET_IN_MIN_LEN: usize = 18;
/// Bytes of a 1.1/1.2 packet-in before the match.
pub const OFP11_PACKET_IN_LEN: usize = 16;
/// Bytes of a Nicira packet-in before the match.
pub const NX_PACKET_IN_LEN: usize = 40;

/// Why the packet came to the controller.
pub mod ofpr {
    pub const NO_MATCH: u8 = 0;
    pub const ACTION: u8 = 1;
    pub const INVALID_TTL: u8 = 2;
    pub const N_REASONS: u8 = 3;
}

/// Renders a packet-in reason; unknown values render as their number.
#[must_use]
pub fn packet_in_reason_to_string(reason: u8) -> String {
    match reason {
        ofpr::NO_MATCH => "no_match".to_string(),
        ofpr::ACTION => "action".to_string(),
        ofpr::INVALID_TTL => "invalid_ttl".to_string(),
        other => other.to_string(),
    }
}

/// Parses a packet-in reason name.
#[must_use]
pub fn packet_in_reason_from_string(s: &str) -> Option<u8> {
    (0..ofpr::N_REASONS).find(|r| s.eq_ignore_ascii_case(&packet_in_reason_to_string(*r)))
}

/// Ingress metadata delivered with a packet-in, protocol independent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowMetadata {
    /// Ingress port.
    pub in_port: u16,
    /// Tunnel id the packet arrived over.
    pub tun_id: u64,
    /// Mask of the meaningful tunnel id bits.
    pub tun_id_mask: u64,
    /// Register values attached by earlier pipeline stages.
    pub regs: [u32; FLOW_N_REGS],
    /// Masks of the meaningful register bits.
    pub reg_masks: [u32; FLOW_N_REGS],
}

impl FlowMetadata {
    fn from_rule(rule: &Rule) -> FlowMetadata {
        FlowMetadata {
            in_port: rule.flow.in_port,
            tun_id: rule.flow.tun_id,
            tun_id_mask: rule.wc.tun_id_mask,
            regs: rule.flow.regs,
            reg_masks: rule.wc.reg_masks,
        }
    }

    fn to_rule(self) -> Rule {
        let mut rule = Rule::catchall(0);
        rule.set_tun_id_masked(self.tun_id, self.tun_id_mask);
        for i in 0..FLOW_N_REGS {
            rule.set_reg_masked(i, self.regs[i], self.reg_masks[i]);
        }
        rule.set_in_port(self.in_port);
        rule
    }
}

/// A packet forwarded to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketIn<'a> {
    /// The packet bytes included in the message.
    pub packet: &'a [u8],
    /// The packet's full length on the wire (may exceed `packet.len()`
    /// when the switch buffered the rest).
    pub total_len: u16,
    /// One of the `ofpr` reasons.
    pub reason: u8,
    /// Table that forwarded the packet (extensible layouts only).
    pub table_id: u8,
    /// Cookie of the rule that forwarded the packet (Nicira layout only).
    pub cookie: u64,
    /// Switch buffer holding the full packet, or `NO_BUFFER`.
    pub buffer_id: u32,
    /// How many packet bytes to include when re-encoding.
    pub send_len: usize,
    /// Ingress metadata.
    pub fmd: FlowMetadata,
}

/// Decodes an OFPT_PACKET_IN or NXT_PACKET_IN message.
///
/// # Errors
///
/// Classification and match errors per [`OfpErr`].
pub fn decode_packet_in(msg: &[u8]) -> Result<PacketIn<'_>, OfpErr> {
    let desc = decode_msg_type(msg)?;
    let declared = OfpHeader::parse(msg).map_err(|_| OfpErr::BadLen)?.length as usize;
    let mut r = Reader::new(&msg[..declared.min(msg.len())]);
    let len = |_| OfpErr::BadLen;

    match (desc.code, msg[0]) {
        (MsgCode::PacketIn, OFP12_VERSION) => {
            r.skip(OFP_HEADER_LEN).map_err(len)?;
            let buffer_id = r.u32().map_err(len)?;
            let total_len = r.u16().map_err(len)?;
            let reason = r.u8().map_err(len)?;
            let table_id = r.u8().map_err(len)?;
            let pulled = pull_match11(&mut r, 0, OFP12_VERSION)?;
            r.skip(2).map_err(len)?;
            let packet = r.rest();
            Ok(PacketIn {
                packet,
                total_len,
                reason,
                table_id,
                cookie: 0,
                buffer_id,
                send_len: packet.len(),
                fmd: FlowMetadata::from_rule(&pulled.rule),
            })
        }
        (MsgCode::PacketIn, OFP10_VERSION) => {
            r.skip(OFP_HEADER_LEN).map_err(len)?;
            let buffer_id = r.u32().map_err(len)?;
            let total_len = r.u16().map_err(len)?;
            let in_port = r.u16().map_err(len)?;
            let reason = r.u8().map_err(len)?;
            r.skip(1).map_err(len)?;
            let packet = r.rest();
            Ok(PacketIn {
                packet,
                total_len,
                reason,
                table_id: 0,
                cookie: 0,
                buffer_id,
                send_len: packet.len(),
                fmd: FlowMetadata { in_port, ..FlowMetadata::default() },
            })
        }
        (MsgCode::NxtPacketIn, _) => {
            r.skip(NICIRA_HEADER_LEN).map_err(len)?;
            let buffer_id = r.u32().map_err(len)?;
            let total_len = r.u16().map_err(len)?;
            let reason = r.u8().map_err(len)?;
            let table_id = r.u8().map_err(len)?;
            let cookie = r.u64().map_err(len)?;
            let match_len = r.u16().map_err(len)? as usize;
            r.skip(6).map_err(len)?;
            // Loose pull: the match is descriptive metadata, so unknown
            // fields from a newer sender are ignored, not fatal.
            let (rule, _) = nx_match::pull_match(&mut r, match_len, 0, 0, PullMode::Loose)?;
            r.skip(2).map_err(len)?;
            let packet = r.rest();
            Ok(PacketIn {
                packet,
                total_len,
                reason,
                table_id,
                cookie,
                buffer_id,
                send_len: packet.len(),
                fmd: FlowMetadata::from_rule(&rule),
            })
        }
        _ => unreachable!("message is not a packet_in: {}", desc.name),
    }
}

/// Encodes `pin` for `protocol`; on a 1.0-based connection the
/// `packet_in_format` chooses between the fixed and Nicira layouts.
#[must_use]
pub fn encode_packet_in(
    pin: &PacketIn<'_>,
    protocol: Protocol,
    packet_in_format: PacketInFormat,
    xid: u32,
) -> MsgBuf {
    let send_len = pin.send_len.min(pin.packet.len());
    if protocol == Protocol::OpenFlow12 {
        let mut b = make_openflow(OFP_HEADER_LEN, OFP12_VERSION, ofpt10::PACKET_IN, xid);
        b.put_u32(pin.buffer_id);
        b.put_u16(pin.total_len);
        b.put_u8(pin.reason);
        b.put_u8(pin.table_id);
        nx_match::put_match(&mut b, Dialect::Oxm, &pin.fmd.to_rule(), CookiePair::default());
        b.put_zeros(2);
        b.put(&pin.packet[..send_len]);
        b.update_length();
        b
    } else if packet_in_format == PacketInFormat::OpenFlow10 {
        let mut b = make_openflow(OFP_HEADER_LEN, OFP10_VERSION, ofpt10::PACKET_IN, xid);
        b.put_u32(pin.buffer_id);
        b.put_u16(pin.total_len);
        b.put_u16(pin.fmd.in_port);
        b.put_u8(pin.reason);
        b.put_zeros(1);
        b.put(&pin.packet[..send_len]);
        b.update_length();
        b
    } else {
        let mut b = make_nxmsg(NICIRA_HEADER_LEN, nxt::PACKET_IN, xid);
        b.put_u32(pin.buffer_id);
        b.put_u16(pin.total_len);
        b.put_u8(pin.reason);
        b.put_u8(pin.table_id);
        b.put_u64(pin.cookie);
        let match_len_at = b.len();
        b.put_u16(0);
        b.put_zeros(6);
        let match_len =
            nx_match::put_match(&mut b, Dialect::Nxm, &pin.fmd.to_rule(), CookiePair::default());
        #[allow(clippy::cast_possible_truncation)] // match fits a message
        b.set_u16_at(match_len_at, match_len as u16);
        b.put_zeros(2);
        b.put(&pin.packet[..send_len]);
        b.update_length();
        b
    }
}
