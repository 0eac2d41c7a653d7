// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The packet-out codec.

use crate::actions::{pull_actions, pull_instructions};
use crate::cursor::Reader;
use crate::error::OfpErr;
use crate::flow_mod::NO_BUFFER;
use crate::header::{OFP_HEADER_LEN, OFP10_VERSION, OFP11_VERSION, OFP12_VERSION, OfpHeader, ofpt10, ofpt11};
use crate::msg::{MsgBuf, make_openflow};
use crate::port::{OFPP_CONTROLLER, OFPP_LOCAL, OFPP_MAX, OFPP_NONE, port_from_ofp11, port_to_ofp11};
use crate::proto::Protocol;
use crate::ratelimit::warn_rl;
use crate::registry::decode_msg_type;

/// Bytes of a 1.0 packet-out before its action list.
pub const OFP10_PACKET_OUT_LEN: usize = 16;
/// Bytes of a 1.1/1.2 packet-out before its action list.
pub const OFP11_PACKET_OUT_LEN: usize = 24;

/// A packet-out request, protocol independent.
///
/// The embedded packet is present only when `buffer_id` is the
/// no-buffer sentinel; otherwise the switch sends the buffered packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketOut<'a> {
    /// Packet bytes to send, empty when a buffer is referenced.
    pub packet: &'a [u8],
    /// Buffered packet to release, or [`NO_BUFFER`].
    pub buffer_id: u32,
    /// Port the packet nominally arrived on, or `OFPP_NONE`.
    pub in_port: u16,
    /// Raw action region to apply.
    pub actions: &'a [u8],
}

/// Decodes an OFPT_PACKET_OUT message.
///
/// # Errors
///
/// Classification, action-framing, and port errors per [`OfpErr`].
pub fn decode_packet_out(msg: &[u8]) -> Result<PacketOut<'_>, OfpErr> {
    decode_msg_type(msg)?;
    let oh = OfpHeader::parse(msg).map_err(|_| OfpErr::BadLen)?;
    let declared = oh.length as usize;
    let mut r = Reader::new(&msg[..declared.min(msg.len())]);
    let len = |_| OfpErr::BadLen;
    r.skip(OFP_HEADER_LEN).map_err(len)?;

    let (buffer_id, in_port, actions) = match oh.version {
        OFP11_VERSION | OFP12_VERSION => {
            let buffer_id = r.u32().map_err(len)?;
            let in_port = port_from_ofp11(r.u32().map_err(len)?).map_err(|_| OfpErr::BadInPort)?;
            let actions_len = r.u16().map_err(len)? as usize;
            r.skip(6).map_err(len)?;
            let actions = pull_instructions(&mut r, actions_len)?;
            (buffer_id, in_port, actions)
        }
        OFP10_VERSION => {
            let buffer_id = r.u32().map_err(len)?;
            let in_port = r.u16().map_err(len)?;
            let actions_len = r.u16().map_err(len)? as usize;
            let actions = pull_actions(&mut r, actions_len)?;
            (buffer_id, in_port, actions)
        }
        _ => unreachable!("registry admitted an unknown version"),
    };

    if in_port >= OFPP_MAX
        && in_port != OFPP_LOCAL
        && in_port != OFPP_NONE
        && in_port != OFPP_CONTROLLER
    {
        warn_rl!("packet-out has bad input port {in_port:#x}");
        return Err(OfpErr::BadInPort);
    }

    let packet = if buffer_id == NO_BUFFER { r.rest() } else { &[] };
    Ok(PacketOut { packet, buffer_id, in_port, actions })
}

/// Encodes `po` for `protocol`.  The packet payload is appended only
/// when no buffered packet is referenced.
#[must_use]
pub fn encode_packet_out(po: &PacketOut<'_>, protocol: Protocol, xid: u32) -> MsgBuf {
    let version = protocol.to_ofp_version();
    let mut b = match version {
        OFP11_VERSION | OFP12_VERSION => {
            let mut b = make_openflow(OFP_HEADER_LEN, version, ofpt11::PACKET_OUT, xid);
            b.put_u32(po.buffer_id);
            b.put_u32(port_to_ofp11(po.in_port));
            #[allow(clippy::cast_possible_truncation)] // actions fit a message
            b.put_u16(po.actions.len() as u16);
            b.put_zeros(6);
            b.put(po.actions);
            b
        }
        _ => {
            let mut b = make_openflow(OFP_HEADER_LEN, version, ofpt10::PACKET_OUT, xid);
            b.put_u32(po.buffer_id);
            b.put_u16(po.in_port);
            #[allow(clippy::cast_possible_truncation)] // actions fit a message
            b.put_u16(po.actions.len() as u16);
            b.put(po.actions);
            b
        }
    };

    if po.buffer_id == NO_BUFFER {
        b.put(po.packet);
    }
    b.update_length();
    b
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    const OUTPUT_ACTION: [u8; 8] = [0, 0, 0, 8, 0xff, 0xfb, 0, 0]; // flood

    #[test]
    fn unbuffered_round_trip_carries_packet() {
        let po = PacketOut {
            packet: &[1, 2, 3, 4],
            buffer_id: NO_BUFFER,
            in_port: OFPP_NONE,
            actions: &OUTPUT_ACTION,
        };
        for protocol in [Protocol::OpenFlow10, Protocol::OpenFlow12] {
            let b = encode_packet_out(&po, protocol, 1);
            let got = decode_packet_out(b.as_slice()).unwrap();
            assert_eq!(got, po, "family {protocol:?}");
        }
    }

    #[test]
    fn buffered_packet_out_has_no_payload() {
        let po = PacketOut {
            packet: &[1, 2, 3, 4],
            buffer_id: 77,
            in_port: 5,
            actions: &OUTPUT_ACTION,
        };
        let b = encode_packet_out(&po, Protocol::OpenFlow10, 1);
        // The payload was not appended on the wire.
        assert_eq!(b.len(), OFP10_PACKET_OUT_LEN + OUTPUT_ACTION.len());
        let got = decode_packet_out(b.as_slice()).unwrap();
        assert_eq!(got.packet, &[] as &[u8]);
        assert_eq!(got.buffer_id, 77);
    }

    #[test]
    fn bad_in_port_rejected() {
        let po = PacketOut {
            packet: &[],
            buffer_id: 0,
            in_port: OFPP_MAX + 1, // in the reserved gap, not a named port
            actions: &[],
        };
        let b = encode_packet_out(&po, Protocol::OpenFlow10, 1);
        assert_eq!(decode_packet_out(b.as_slice()), Err(OfpErr::BadInPort));
    }
}
