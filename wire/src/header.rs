// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The fixed OpenFlow header, wire version bytes, and the raw type
//! constants shared across the codecs.

use crate::cursor::{LengthError, Reader};

/// OpenFlow 1.0 wire version byte.
pub const OFP10_VERSION: u8 = 0x01;
/// OpenFlow 1.1 wire version byte.
pub const OFP11_VERSION: u8 = 0x02;
/// OpenFlow 1.2 wire version byte.
pub const OFP12_VERSION: u8 = 0x03;

/// Length of the fixed header every message starts with.
pub const OFP_HEADER_LEN: usize = 8;
/// Length of the generic vendor envelope (header + vendor id).
pub const OFP_VENDOR_HEADER_LEN: usize = 12;
/// Length of the Nicira envelope (vendor header + subtype).
pub const NICIRA_HEADER_LEN: usize = 16;
/// Length of a 1.0 stats message header (header + type + flags).
pub const OFP10_STATS_MSG_LEN: usize = 12;
/// Length of a 1.1/1.2 stats message header (type + flags + pad).
pub const OFP11_STATS_MSG_LEN: usize = 16;
/// Length of a 1.0 vendor stats header.
pub const OFP10_VENDOR_STATS_MSG_LEN: usize = 16;
/// Length of a 1.1/1.2 vendor stats header.
pub const OFP11_VENDOR_STATS_MSG_LEN: usize = 20;
/// Length of a 1.0 Nicira stats header (vendor stats + subtype + pad).
pub const NICIRA10_STATS_MSG_LEN: usize = 24;
/// Length of a 1.1/1.2 Nicira stats header (vendor stats + subtype).
pub const NICIRA11_STATS_MSG_LEN: usize = 24;

/// The Nicira vendor / experimenter id.
pub const NX_VENDOR_ID: u32 = 0x0000_2320;

/// Base message type codes, OpenFlow 1.0 numbering.
pub mod ofpt10 {
    pub const HELLO: u8 = 0;
    pub const ERROR: u8 = 1;
    pub const ECHO_REQUEST: u8 = 2;
    pub const ECHO_REPLY: u8 = 3;
    pub const VENDOR: u8 = 4;
    pub const FEATURES_REQUEST: u8 = 5;
    pub const FEATURES_REPLY: u8 = 6;
    pub const GET_CONFIG_REQUEST: u8 = 7;
    pub const GET_CONFIG_REPLY: u8 = 8;
    pub const SET_CONFIG: u8 = 9;
    pub const PACKET_IN: u8 = 10;
    pub const FLOW_REMOVED: u8 = 11;
    pub const PORT_STATUS: u8 = 12;
    pub const PACKET_OUT: u8 = 13;
    pub const FLOW_MOD: u8 = 14;
    pub const PORT_MOD: u8 = 15;
    pub const STATS_REQUEST: u8 = 16;
    pub const STATS_REPLY: u8 = 17;
    pub const BARRIER_REQUEST: u8 = 18;
    pub const BARRIER_REPLY: u8 = 19;
}

/// Base message type codes renumbered by OpenFlow 1.1 (shared by 1.2).
pub mod ofpt11 {
    pub const PACKET_OUT: u8 = 13;
    pub const FLOW_MOD: u8 = 14;
    pub const GROUP_MOD: u8 = 15;
    pub const PORT_MOD: u8 = 16;
    pub const TABLE_MOD: u8 = 17;
    pub const STATS_REQUEST: u8 = 18;
    pub const STATS_REPLY: u8 = 19;
    pub const BARRIER_REQUEST: u8 = 20;
    pub const BARRIER_REPLY: u8 = 21;
}

/// Statistics subtypes (shared numbering across versions).
pub mod ofpst {
    pub const DESC: u16 = 0;
    pub const FLOW: u16 = 1;
    pub const AGGREGATE: u16 = 2;
    pub const TABLE: u16 = 3;
    pub const PORT: u16 = 4;
    pub const QUEUE: u16 = 5;
    pub const PORT_DESC: u16 = 13;
    pub const VENDOR: u16 = 0xffff;
}

/// Nicira extension message subtypes.
pub mod nxt {
    pub const ROLE_REQUEST: u32 = 10;
    pub const ROLE_REPLY: u32 = 11;
    pub const SET_FLOW_FORMAT: u32 = 12;
    pub const FLOW_MOD: u32 = 13;
    pub const FLOW_REMOVED: u32 = 14;
    pub const FLOW_MOD_TABLE_ID: u32 = 15;
    pub const SET_PACKET_IN_FORMAT: u32 = 16;
    pub const PACKET_IN: u32 = 17;
    pub const FLOW_AGE: u32 = 18;
    pub const SET_ASYNC_CONFIG: u32 = 19;
    pub const SET_CONTROLLER_ID: u32 = 20;
}

/// Nicira extension statistics subtypes.
pub mod nxst {
    pub const FLOW: u32 = 0;
    pub const AGGREGATE: u32 = 1;
}

/// The fixed header every OpenFlow message begins with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfpHeader {
    /// Wire protocol version byte.
    pub version: u8,
    /// Base message type.
    pub msg_type: u8,
    /// Total message length the peer declared, header included.
    pub length: u16,
    /// Transaction id correlating requests and replies.
    pub xid: u32,
}

impl OfpHeader {
    /// Parse the fixed header off the front of `buf`.
    ///
    /// # Errors
    ///
    /// Returns a [`LengthError`] if `buf` is shorter than the header.
    pub fn parse(buf: &[u8]) -> Result<OfpHeader, LengthError> {
        let mut r = Reader::new(buf);
        Ok(OfpHeader {
            version: r.u8()?,
            msg_type: r.u8()?,
            length: r.u16()?,
            xid: r.u32()?,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_header() {
        let buf = [0x01, 0x0e, 0x00, 0x48, 0x00, 0x00, 0x00, 0x2a, 0xff];
        let h = OfpHeader::parse(&buf).unwrap();
        assert_eq!(h.version, OFP10_VERSION);
        assert_eq!(h.msg_type, ofpt10::FLOW_MOD);
        assert_eq!(h.length, 0x48);
        assert_eq!(h.xid, 42);
    }

    #[test]
    fn short_header_is_length_error() {
        assert!(OfpHeader::parse(&[1, 2, 3]).is_err());
    }
}
