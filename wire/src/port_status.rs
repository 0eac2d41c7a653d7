// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The port-status notification codec.

use crate::cursor::Reader;
use crate::error::OfpErr;
use crate::header::{OFP_HEADER_LEN, OfpHeader, ofpt10};
use crate::msg::{MsgBuf, make_openflow};
use crate::port::{PhyPort, pull_phy_port, put_phy_port};
use crate::proto::Protocol;
use crate::registry::decode_msg_type;

/// Why the port's description is being sent.
pub mod ofppr {
    pub const ADD: u8 = 0;
    pub const DELETE: u8 = 1;
    pub const MODIFY: u8 = 2;
}

/// A port-status notification, protocol independent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortStatus {
    /// One of the `ofppr` reasons.
    pub reason: u8,
    /// The port the notification describes.
    pub desc: PhyPort,
}

/// Decodes an OFPT_PORT_STATUS message.
///
/// # Errors
///
/// [`OfpErr::BadReason`] for a reason outside the defined set, plus the
/// usual classification and port errors.
pub fn decode_port_status(msg: &[u8]) -> Result<PortStatus, OfpErr> {
    decode_msg_type(msg)?;
    let oh = OfpHeader::parse(msg).map_err(|_| OfpErr::BadLen)?;
    let declared = (oh.length as usize).min(msg.len());
    let mut r = Reader::new(&msg[..declared]);
    let len = |_| OfpErr::BadLen;
    r.skip(OFP_HEADER_LEN).map_err(len)?;
    let reason = r.u8().map_err(len)?;
    if !matches!(reason, ofppr::ADD | ofppr::DELETE | ofppr::MODIFY) {
        return Err(OfpErr::BadReason);
    }
    r.skip(7).map_err(len)?;
    let desc = pull_phy_port(oh.version, &mut r).ok_or(OfpErr::BadLen)??;
    Ok(PortStatus { reason, desc })
}

/// Encodes `ps` for `protocol`.  Port status is asynchronous, so `xid`
/// is conventionally zero.
#[must_use]
pub fn encode_port_status(ps: &PortStatus, protocol: Protocol, xid: u32) -> MsgBuf {
    let version = protocol.to_ofp_version();
    let mut b = make_openflow(OFP_HEADER_LEN, version, ofpt10::PORT_STATUS, xid);
    b.put_u8(ps.reason);
    b.put_zeros(7);
    put_phy_port(version, &ps.desc, &mut b);
    b.update_length();
    b
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::port::{PortConfig, PortFeatures};
    use flow::Mac;
    use pretty_assertions::assert_eq;

    fn sample() -> PortStatus {
        PortStatus {
            reason: ofppr::MODIFY,
            desc: PhyPort {
                port_no: 4,
                hw_addr: Mac([2, 0, 0, 0, 0, 4]),
                config: PortConfig::PORT_DOWN,
                curr: PortFeatures::F_10GB_FD | PortFeatures::FIBER,
                supported: PortFeatures::F_10GB_FD | PortFeatures::FIBER,
                curr_speed: 10_000_000,
                max_speed: 10_000_000,
                ..PhyPort::default()
            },
        }
    }

    #[test]
    fn round_trips_both_generations() {
        for protocol in [Protocol::OpenFlow10, Protocol::OpenFlow12] {
            let ps = sample();
            let b = encode_port_status(&ps, protocol, 0);
            let got = decode_port_status(b.as_slice()).unwrap();
            assert_eq!(got, ps, "family {protocol:?}");
        }
    }

    #[test]
    fn bad_reason_rejected() {
        let ps = sample();
        let mut b = encode_port_status(&ps, Protocol::OpenFlow10, 0);
        b.as_mut_slice()[8] = 9;
        assert_eq!(decode_port_status(b.as_slice()), Err(OfpErr::BadReason));
    }
}
