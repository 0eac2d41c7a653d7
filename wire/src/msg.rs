// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Outgoing message construction.
//!
//! [`MsgBuf`] owns the bytes of one message being built: append-only
//! big-endian writers plus a final [`MsgBuf::update_length`] that stamps
//! the 16-bit header length.  Transaction ids come from an explicit
//! [`XidGen`] owned by the connection context and threaded through the
//! encode entry points; there is no hidden global counter.

use crate::header::{
    NICIRA_HEADER_LEN, NX_VENDOR_ID, OFP_HEADER_LEN, OFP10_VERSION, OFP11_VERSION, OFP12_VERSION,
    ofpt10, ofpt11,
};
use std::sync::atomic::{AtomicU32, Ordering};

/// Allocator for outgoing transaction ids.
///
/// One per connection; an atomic so concurrent senders sharing a
/// connection stay race-free.
#[derive(Debug)]
pub struct XidGen {
    next: AtomicU32,
}

impl XidGen {
    /// Start allocating from 1, matching long-standing controller behavior.
    #[must_use]
    pub fn new() -> XidGen {
        XidGen { next: AtomicU32::new(1) }
    }

    /// Return a fresh transaction id.
    pub fn next_xid(&self) -> u32 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for XidGen {
    fn default() -> Self {
        XidGen::new()
    }
}

/// An outgoing OpenFlow message under construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MsgBuf {
    data: Vec<u8>,
}

impl MsgBuf {
    /// An empty buffer with `cap` bytes reserved.
    #[must_use]
    pub fn with_capacity(cap: usize) -> MsgBuf {
        MsgBuf { data: Vec::with_capacity(cap) }
    }

    /// Current length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True iff nothing has been appended yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The bytes appended so far.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Consume the builder, yielding the finished bytes.
    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Truncate to `len` bytes (used when stripping a message back to its
    /// header, e.g. the features-reply port truncation).
    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
    }

    /// Append raw bytes.
    pub fn put(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Append `n` zero bytes.
    pub fn put_zeros(&mut self, n: usize) {
        self.data.resize(self.data.len() + n, 0);
    }

    /// Append one byte.
    pub fn put_u8(&mut self, v: u8) {
        self.data.push(v);
    }

    /// Append a big-endian `u16`.
    pub fn put_u16(&mut self, v: u16) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    /// Append a big-endian `u32`.
    pub fn put_u32(&mut self, v: u32) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    /// Append a big-endian `u64`.
    pub fn put_u64(&mut self, v: u64) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    /// Append a big-endian `u128`.
    pub fn put_u128(&mut self, v: u128) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    /// Append a MAC address.
    pub fn put_mac(&mut self, mac: flow::Mac) {
        self.data.extend_from_slice(&mac.0);
    }

    /// Overwrite a big-endian `u16` at byte offset `at`.
    ///
    /// # Panics
    ///
    /// Panics if `at + 2` exceeds the buffer; offsets are always derived
    /// from lengths this builder produced.
    pub fn set_u16_at(&mut self, at: usize, v: u16) {
        self.data[at..at + 2].copy_from_slice(&v.to_be_bytes());
    }

    /// Overwrite a big-endian `u32` at byte offset `at`.
    ///
    /// # Panics
    ///
    /// Panics if `at + 4` exceeds the buffer.
    pub fn set_u32_at(&mut self, at: usize, v: u32) {
        self.data[at..at + 4].copy_from_slice(&v.to_be_bytes());
    }

    /// Mutable view of the bytes appended so far (test fixtures and
    /// in-place header rewrites).
    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Pad with zeros until the length is a multiple of `align`.
    pub fn pad_to(&mut self, align: usize) {
        let rem = self.data.len() % align;
        if rem != 0 {
            self.put_zeros(align - rem);
        }
    }

    /// Stamp the header's 16-bit length field with the current length.
    ///
    /// # Panics
    ///
    /// Panics if the message outgrew the 16-bit length space; writers that
    /// can legitimately reach the cap (stats replies) must paginate first.
    pub fn update_length(&mut self) {
        let len = u16::try_from(self.data.len())
            .unwrap_or_else(|_| unreachable!("message exceeds 16-bit length field"));
        self.set_u16_at(2, len);
    }
}

/// Start a message: fixed header with `version`/`msg_type`/`xid`, body
/// zero-filled out to `len` bytes.  The length field is stamped with
/// `len` and restamped by [`MsgBuf::update_length`] if the message grows.
#[must_use]
pub fn make_openflow(len: usize, version: u8, msg_type: u8, xid: u32) -> MsgBuf {
    debug_assert!(len >= OFP_HEADER_LEN);
    let mut b = MsgBuf::with_capacity(len);
    b.put_u8(version);
    b.put_u8(msg_type);
    #[allow(clippy::cast_possible_truncation)] // messages start below the cap
    b.put_u16(len as u16);
    b.put_u32(xid);
    b.put_zeros(len - OFP_HEADER_LEN);
    b
}

/// Start a Nicira extension message with the given `subtype`.
#[must_use]
pub fn make_nxmsg(len: usize, subtype: u32, xid: u32) -> MsgBuf {
    debug_assert!(len >= NICIRA_HEADER_LEN);
    let mut b = make_openflow(OFP_HEADER_LEN, OFP10_VERSION, ofpt10::VENDOR, xid);
    b.put_u32(NX_VENDOR_ID);
    b.put_u32(subtype);
    b.put_zeros(len - NICIRA_HEADER_LEN);
    b.update_length();
    b
}

/// An echo request with an empty payload.
#[must_use]
pub fn make_echo_request(version: u8, xid: u32) -> MsgBuf {
    make_openflow(OFP_HEADER_LEN, version, ofpt10::ECHO_REQUEST, xid)
}

/// An echo reply mirroring the request `rq`, payload included.
#[must_use]
pub fn make_echo_reply(rq: &[u8]) -> MsgBuf {
    let mut b = MsgBuf::with_capacity(rq.len());
    b.put(rq);
    if b.len() > 1 {
        b.data[1] = ofpt10::ECHO_REPLY;
    }
    b
}

/// A barrier request for `version`.
///
/// The caller must pass a valid negotiated version; anything else is a
/// caller bug.
#[must_use]
pub fn make_barrier_request(version: u8, xid: u32) -> MsgBuf {
    let msg_type = match version {
        OFP10_VERSION => ofpt10::BARRIER_REQUEST,
        OFP11_VERSION | OFP12_VERSION => ofpt11::BARRIER_REQUEST,
        _ => unreachable!("invalid negotiated version {version}"),
    };
    make_openflow(OFP_HEADER_LEN, version, msg_type, xid)
}

/// A barrier reply for `version` echoing `xid`.
#[must_use]
pub fn make_barrier_reply(version: u8, xid: u32) -> MsgBuf {
    let msg_type = match version {
        OFP10_VERSION => ofpt10::BARRIER_REPLY,
        OFP11_VERSION | OFP12_VERSION => ofpt11::BARRIER_REPLY,
        _ => unreachable!("invalid negotiated version {version}"),
    };
    make_openflow(OFP_HEADER_LEN, version, msg_type, xid)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::header::OfpHeader;

    #[test]
    fn xids_are_unique_and_increasing() {
        let xids = XidGen::new();
        let a = xids.next_xid();
        let b = xids.next_xid();
        assert_eq!(b, a + 1);
    }

    #[test]
    fn make_openflow_stamps_header() {
        let b = make_openflow(16, OFP10_VERSION, ofpt10::FLOW_MOD, 7);
        assert_eq!(b.len(), 16);
        let h = OfpHeader::parse(b.as_slice()).unwrap();
        assert_eq!(h.version, OFP10_VERSION);
        assert_eq!(h.msg_type, ofpt10::FLOW_MOD);
        assert_eq!(h.length, 16);
        assert_eq!(h.xid, 7);
    }

    #[test]
    fn update_length_tracks_growth() {
        let mut b = make_openflow(8, OFP10_VERSION, ofpt10::HELLO, 0);
        b.put_zeros(12);
        b.update_length();
        assert_eq!(OfpHeader::parse(b.as_slice()).unwrap().length, 20);
    }

    #[test]
    fn nxmsg_carries_vendor_and_subtype() {
        let b = make_nxmsg(NICIRA_HEADER_LEN, 13, 1);
        let bytes = b.as_slice();
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[8..12], &NX_VENDOR_ID.to_be_bytes());
        assert_eq!(&bytes[12..16], &13u32.to_be_bytes());
    }

    #[test]
    fn barrier_type_tracks_version() {
        let b10 = make_barrier_request(OFP10_VERSION, 1);
        assert_eq!(b10.as_slice()[1], ofpt10::BARRIER_REQUEST);
        let b12 = make_barrier_request(OFP12_VERSION, 1);
        assert_eq!(b12.as_slice()[1], ofpt11::BARRIER_REQUEST);
        let r12 = make_barrier_reply(OFP12_VERSION, 1);
        assert_eq!(r12.as_slice()[1], ofpt11::BARRIER_REPLY);
    }

    #[test]
    fn echo_reply_mirrors_payload() {
        let mut rq = make_openflow(8, OFP10_VERSION, ofpt10::ECHO_REQUEST, 9);
        rq.put(b"ping");
        rq.update_length();
        let reply = make_echo_reply(rq.as_slice());
        assert_eq!(reply.as_slice()[1], ofpt10::ECHO_REPLY);
        assert_eq!(&reply.as_slice()[8..], b"ping");
        assert_eq!(reply.len(), rq.len());
    }
}
