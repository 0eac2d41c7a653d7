// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The port-mod (administrative port change) codec.

use crate::cursor::Reader;
use crate::error::OfpErr;
use crate::header::{OFP_HEADER_LEN, OFP10_VERSION, OFP11_VERSION, OFP12_VERSION, OfpHeader, ofpt10, ofpt11};
use crate::msg::{MsgBuf, make_openflow};
use crate::port::{PortConfig, PortFeatures, port_from_ofp11, port_to_ofp11};
use crate::proto::Protocol;
use crate::registry::decode_msg_type;
use flow::Mac;

/// Total size of the 1.0 port-mod.
pub const OFP10_PORT_MOD_LEN: usize = 32;
/// Total size of the 1.1/1.2 port-mod.
pub const OFP11_PORT_MOD_LEN: usize = 40;

/// A port-mod request, protocol independent.
///
/// Invariant after decode: `config` only carries bits selected by
/// `mask`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMod {
    /// Port to change.
    pub port_no: u16,
    /// Hardware address, as a safeguard against stale port numbers.
    pub hw_addr: Mac,
    /// New values for the bits in `mask`.
    pub config: PortConfig,
    /// Which config bits to change.
    pub mask: PortConfig,
    /// Features to advertise, zero to leave alone.
    pub advertise: PortFeatures,
}

/// Decodes an OFPT_PORT_MOD message.
///
/// # Errors
///
/// Classification, length, and port errors per [`OfpErr`].
pub fn decode_port_mod(msg: &[u8]) -> Result<PortMod, OfpErr> {
    decode_msg_type(msg)?;
    let oh = OfpHeader::parse(msg).map_err(|_| OfpErr::BadLen)?;
    let declared = (oh.length as usize).min(msg.len());
    let mut r = Reader::new(&msg[..declared]);
    let len = |_| OfpErr::BadLen;
    r.skip(OFP_HEADER_LEN).map_err(len)?;

    let mut pm = match oh.version {
        OFP10_VERSION => {
            let port_no = r.u16().map_err(len)?;
            let hw_addr = r.mac().map_err(len)?;
            let config =
                PortConfig::from_bits_truncate(r.u32().map_err(len)?) & PortConfig::OFP10_ALL;
            let mask =
                PortConfig::from_bits_truncate(r.u32().map_err(len)?) & PortConfig::OFP10_ALL;
            let advertise = PortFeatures::from_ofp10(r.u32().map_err(len)?);
            PortMod { port_no, hw_addr, config, mask, advertise }
        }
        OFP11_VERSION | OFP12_VERSION => {
            let port_no = port_from_ofp11(r.u32().map_err(len)?)?;
            r.skip(4).map_err(len)?;
            let hw_addr = r.mac().map_err(len)?;
            r.skip(2).map_err(len)?;
            let config =
                PortConfig::from_bits_truncate(r.u32().map_err(len)?) & PortConfig::OFP11_ALL;
            let mask =
                PortConfig::from_bits_truncate(r.u32().map_err(len)?) & PortConfig::OFP11_ALL;
            let advertise = PortFeatures::from_ofp11(r.u32().map_err(len)?);
            PortMod { port_no, hw_addr, config, mask, advertise }
        }
        _ => return Err(OfpErr::BadVersion),
    };

    pm.config &= pm.mask;
    Ok(pm)
}

/// Encodes `pm` for `protocol`.
#[must_use]
pub fn encode_port_mod(pm: &PortMod, protocol: Protocol, xid: u32) -> MsgBuf {
    let version = protocol.to_ofp_version();
    match version {
        OFP10_VERSION => {
            let mut b = make_openflow(OFP_HEADER_LEN, version, ofpt10::PORT_MOD, xid);
            b.put_u16(pm.port_no);
            b.put_mac(pm.hw_addr);
            b.put_u32((pm.config & PortConfig::OFP10_ALL).bits());
            b.put_u32((pm.mask & PortConfig::OFP10_ALL).bits());
            b.put_u32(pm.advertise.to_ofp10());
            b.put_zeros(4);
            b.update_length();
            b
        }
        OFP11_VERSION | OFP12_VERSION => {
            let mut b = make_openflow(OFP_HEADER_LEN, version, ofpt11::PORT_MOD, xid);
            b.put_u32(port_to_ofp11(pm.port_no));
            b.put_zeros(4);
            b.put_mac(pm.hw_addr);
            b.put_zeros(2);
            b.put_u32((pm.config & PortConfig::OFP11_ALL).bits());
            b.put_u32((pm.mask & PortConfig::OFP11_ALL).bits());
            b.put_u32(pm.advertise.to_ofp11());
            b.put_zeros(4);
            b.update_length();
            b
        }
        _ => unreachable!("invalid negotiated version {version}"),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> PortMod {
        PortMod {
            port_no: 6,
            hw_addr: Mac([2, 0, 0, 0, 0, 6]),
            config: PortConfig::NO_FWD,
            mask: PortConfig::NO_FWD | PortConfig::PORT_DOWN,
            advertise: PortFeatures::F_100MB_FD | PortFeatures::COPPER,
        }
    }

    #[test]
    fn round_trips_both_generations() {
        for protocol in [Protocol::OpenFlow10, Protocol::OpenFlow12] {
            let pm = sample();
            let b = encode_port_mod(&pm, protocol, 1);
            assert_eq!(
                b.len(),
                if protocol == Protocol::OpenFlow10 { OFP10_PORT_MOD_LEN } else { OFP11_PORT_MOD_LEN }
            );
            let got = decode_port_mod(b.as_slice()).unwrap();
            assert_eq!(got, pm, "family {protocol:?}");
        }
    }

    #[test]
    fn config_clamped_to_mask() {
        let mut pm = sample();
        pm.config = PortConfig::NO_FWD | PortConfig::NO_PACKET_IN;
        pm.mask = PortConfig::NO_FWD;
        let b = encode_port_mod(&pm, Protocol::OpenFlow10, 1);
        let got = decode_port_mod(b.as_slice()).unwrap();
        assert_eq!(got.config, PortConfig::NO_FWD);
    }

    #[test]
    fn of10_only_bits_dropped_by_modern_encoding() {
        let mut pm = sample();
        pm.config = PortConfig::NO_FLOOD;
        pm.mask = PortConfig::NO_FLOOD;
        let b = encode_port_mod(&pm, Protocol::OpenFlow12, 1);
        let got = decode_port_mod(b.as_slice()).unwrap();
        assert_eq!(got.config, PortConfig::empty());
    }
}
