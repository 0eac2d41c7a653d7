// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Statistics message envelopes and reply pagination.
//!
//! A statistics reply logically unbounded in size must be split across
//! wire messages, each within the 16-bit length field.  [`StatsReplies`]
//! accumulates records and starts a continuation message (setting
//! `OFPSF_REPLY_MORE` on the previous one) whenever a record would not
//! fit.

use crate::cursor::Reader;
use crate::error::OfpErr;
use crate::header::{
    NICIRA10_STATS_MSG_LEN, NX_VENDOR_ID, OFP_HEADER_LEN, OFP10_STATS_MSG_LEN, OFP10_VERSION,
    OFP11_STATS_MSG_LEN, OFP11_VERSION, OFP12_VERSION, OfpHeader, ofpst, ofpt10, ofpt11,
};
use crate::msg::{MsgBuf, make_openflow};

/// "More replies follow" flag in a stats reply.
pub const OFPSF_REPLY_MORE: u16 = 1 << 0;

/// Offset of the stats type word in every stats envelope.
const STAT_TYPE_OFS: usize = OFP_HEADER_LEN;
/// Offset of the flags word in every stats envelope.
const STAT_FLAGS_OFS: usize = OFP_HEADER_LEN + 2;

/// True iff (version, type) is a statistics request or reply.
#[must_use]
pub fn is_stats_msg(version: u8, msg_type: u8) -> bool {
    if version == OFP10_VERSION {
        msg_type == ofpt10::STATS_REQUEST || msg_type == ofpt10::STATS_REPLY
    } else {
        msg_type == ofpt11::STATS_REQUEST || msg_type == ofpt11::STATS_REPLY
    }
}

/// The length of a stats message's envelope (header through the last
/// type-identifying field), so a caller can skip to the body.
///
/// # Errors
///
/// Returns [`OfpErr::BadLen`] when the buffer cannot hold the envelope
/// its own type words promise.
pub fn stats_msg_len(msg: &[u8]) -> Result<usize, OfpErr> {
    let oh = OfpHeader::parse(msg).map_err(|_| OfpErr::BadLen)?;
    let base = if oh.version == OFP10_VERSION {
        OFP10_STATS_MSG_LEN
    } else {
        OFP11_STATS_MSG_LEN
    };
    if msg.len() < base {
        return Err(OfpErr::BadLen);
    }
    let stat = u16::from_be_bytes([msg[STAT_TYPE_OFS], msg[STAT_TYPE_OFS + 1]]);
    let total = if stat == ofpst::VENDOR {
        // Vendor envelope adds the vendor id and subtype.
        if oh.version == OFP10_VERSION { NICIRA10_STATS_MSG_LEN } else { base + 8 }
    } else {
        base
    };
    if msg.len() < total {
        return Err(OfpErr::BadLen);
    }
    Ok(total)
}

/// The stats subtype word of a stats message.
///
/// The caller must already have classified `msg` as a stats message.
#[must_use]
pub fn stats_msg_type(msg: &[u8]) -> u16 {
    u16::from_be_bytes([msg[STAT_TYPE_OFS], msg[STAT_TYPE_OFS + 1]])
}

/// The flags word of a stats message.
#[must_use]
pub fn stats_msg_flags(msg: &[u8]) -> u16 {
    u16::from_be_bytes([msg[STAT_FLAGS_OFS], msg[STAT_FLAGS_OFS + 1]])
}

fn stats_reply_type(version: u8) -> u8 {
    if version == OFP10_VERSION { ofpt10::STATS_REPLY } else { ofpt11::STATS_REPLY }
}

fn stats_request_type(version: u8) -> u8 {
    if version == OFP10_VERSION { ofpt10::STATS_REQUEST } else { ofpt11::STATS_REQUEST }
}

/// Starts a statistics request message: the envelope for `version` and
/// `stat_type` (with the Nicira vendor envelope when `stat_type` is the
/// vendor sentinel, using `subtype`), followed by `body_len` zero bytes.
///
/// The caller must pass a valid negotiated version.
#[must_use]
pub fn make_stats_request(
    version: u8,
    stat_type: u16,
    subtype: u32,
    body_len: usize,
    xid: u32,
) -> MsgBuf {
    let mut b = if stat_type == ofpst::VENDOR {
        let mut b = make_openflow(OFP_HEADER_LEN, OFP10_VERSION, ofpt10::STATS_REQUEST, xid);
        b.put_u16(stat_type);
        b.put_u16(0); // flags
        b.put_u32(NX_VENDOR_ID);
        b.put_u32(subtype);
        b.put_zeros(NICIRA10_STATS_MSG_LEN - b.len());
        b
    } else {
        let mut b = make_openflow(OFP_HEADER_LEN, version, stats_request_type(version), xid);
        b.put_u16(stat_type);
        b.put_u16(0); // flags
        match version {
            OFP10_VERSION => {}
            OFP11_VERSION | OFP12_VERSION => b.put_zeros(4),
            _ => unreachable!("invalid negotiated version {version}"),
        }
        b
    };
    b.put_zeros(body_len);
    b.update_length();
    b
}

/// Starts a statistics reply mirroring `request`'s version, stats type,
/// vendor subtype, and transaction id, followed by `body_len` zero bytes.
///
/// # Errors
///
/// Returns [`OfpErr::BadLen`] when `request` is too short to mirror.
pub fn make_stats_reply(request: &[u8], body_len: usize) -> Result<MsgBuf, OfpErr> {
    let oh = OfpHeader::parse(request).map_err(|_| OfpErr::BadLen)?;
    let env_len = stats_msg_len(request)?;
    let mut b = make_openflow(OFP_HEADER_LEN, oh.version, stats_reply_type(oh.version), oh.xid);
    // Copy the envelope beyond the fixed header verbatim (stat type,
    // vendor id, subtype), but zero the flags word.
    b.put(&request[OFP_HEADER_LEN..env_len]);
    b.set_u16_at(STAT_FLAGS_OFS, 0);
    b.put_zeros(body_len);
    b.update_length();
    Ok(b)
}

/// An in-progress series of statistics replies.
///
/// Invariant: every message except the last carries `OFPSF_REPLY_MORE`,
/// and none exceeds the 16-bit length limit once finished.
#[derive(Debug)]
pub struct StatsReplies {
    envelope: Vec<u8>,
    replies: Vec<MsgBuf>,
}

impl StatsReplies {
    /// Begins a reply series for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`OfpErr::BadLen`] when `request` is not a well-formed
    /// stats request.
    pub fn start(request: &[u8]) -> Result<StatsReplies, OfpErr> {
        let env_len = stats_msg_len(request)?;
        let first = make_stats_reply(request, 0)?;
        Ok(StatsReplies {
            envelope: request[..env_len].to_vec(),
            replies: vec![first],
        })
    }

    fn set_more_on_last(&mut self) {
        let Some(last) = self.replies.last_mut() else { return };
        let flags = stats_msg_flags(last.as_slice()) | OFPSF_REPLY_MORE;
        last.set_u16_at(STAT_FLAGS_OFS, flags);
    }

    /// The reply message that can accept `len` more bytes, starting a
    /// continuation if the current one cannot.
    pub fn reserve(&mut self, len: usize) -> &mut MsgBuf {
        let fits = self
            .replies
            .last()
            .is_some_and(|last| last.len() + len <= usize::from(u16::MAX));
        if !fits {
            self.set_more_on_last();
            let next = make_stats_reply(&self.envelope, 0)
                .unwrap_or_else(|_| unreachable!("validated on start"));
            self.replies.push(next);
        }
        self.replies
            .last_mut()
            .unwrap_or_else(|| unreachable!("at least one reply since start"))
    }

    /// Appends `bytes` as one indivisible record.
    pub fn append(&mut self, bytes: &[u8]) {
        self.reserve(bytes.len()).put(bytes);
    }

    /// Repairs the invariant after a caller wrote directly into the last
    /// reply past the length limit: everything from `start_ofs` on moves
    /// into a fresh continuation message.
    pub fn postappend(&mut self, start_ofs: usize) {
        debug_assert!(start_ofs <= usize::from(u16::MAX));
        let needs_split = self
            .replies
            .last()
            .is_some_and(|last| last.len() > usize::from(u16::MAX));
        if needs_split {
            let Some(last) = self.replies.last_mut() else { return };
            let spill = last.as_slice()[start_ofs..].to_vec();
            last.truncate(start_ofs);
            self.set_more_on_last();
            let mut next = make_stats_reply(&self.envelope, 0)
                .unwrap_or_else(|_| unreachable!("validated on start"));
            next.put(&spill);
            self.replies.push(next);
        }
    }

    /// Direct access to the current last reply (for record writers that
    /// need to patch a length field after the fact).
    ///
    /// # Panics
    ///
    /// Never: there is at least one reply from construction on.
    #[must_use]
    pub fn last_mut(&mut self) -> &mut MsgBuf {
        self.replies
            .last_mut()
            .unwrap_or_else(|| unreachable!("at least one reply since start"))
    }

    /// Finishes the series: stamps every length field and returns the
    /// messages in order.
    #[must_use]
    pub fn finish(mut self) -> Vec<MsgBuf> {
        for b in &mut self.replies {
            b.update_length();
        }
        self.replies
    }
}

/// A wrapper for iterating the body of a stats message: skips the
/// envelope and yields a reader over the records.
///
/// # Errors
///
/// Returns [`OfpErr::BadLen`] when the envelope overruns the buffer.
pub fn stats_body(msg: &[u8]) -> Result<Reader<'_>, OfpErr> {
    let env_len = stats_msg_len(msg)?;
    let declared = OfpHeader::parse(msg).map_err(|_| OfpErr::BadLen)?.length as usize;
    let end = declared.min(msg.len());
    if end < env_len {
        return Err(OfpErr::BadLen);
    }
    Ok(Reader::new(&msg[env_len..end]))
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn request_layouts() {
        let v1 = make_stats_request(OFP10_VERSION, ofpst::FLOW, 0, 44, 1);
        assert_eq!(v1.len(), OFP10_STATS_MSG_LEN + 44);
        assert_eq!(stats_msg_type(v1.as_slice()), ofpst::FLOW);

        let v3 = make_stats_request(OFP12_VERSION, ofpst::TABLE, 0, 0, 1);
        assert_eq!(v3.len(), OFP11_STATS_MSG_LEN);

        let nx = make_stats_request(OFP10_VERSION, ofpst::VENDOR, 0, 8, 1);
        assert_eq!(nx.len(), NICIRA10_STATS_MSG_LEN + 8);
        assert_eq!(stats_msg_len(nx.as_slice()).unwrap(), NICIRA10_STATS_MSG_LEN);
    }

    #[test]
    fn reply_mirrors_request() {
        let rq = make_stats_request(OFP10_VERSION, ofpst::VENDOR, 7, 0, 42);
        let reply = make_stats_reply(rq.as_slice(), 0).unwrap();
        let bytes = reply.as_slice();
        assert_eq!(bytes[1], ofpt10::STATS_REPLY);
        assert_eq!(stats_msg_type(bytes), ofpst::VENDOR);
        assert_eq!(&bytes[12..16], &NX_VENDOR_ID.to_be_bytes());
        assert_eq!(&bytes[16..20], &7u32.to_be_bytes());
        assert_eq!(OfpHeader::parse(bytes).unwrap().xid, 42);
    }

    #[test]
    fn pagination_sets_more_and_splits() {
        let rq = make_stats_request(OFP10_VERSION, ofpst::FLOW, 0, 0, 1);
        let mut replies = StatsReplies::start(rq.as_slice()).unwrap();
        // Each record is 10 KiB; seven of them cross the 64 KiB line.
        let record = vec![0xabu8; 10 * 1024];
        for _ in 0..7 {
            replies.append(&record);
        }
        let msgs = replies.finish();
        assert_eq!(msgs.len(), 2);
        assert!(msgs[0].len() <= usize::from(u16::MAX));
        assert_eq!(
            stats_msg_flags(msgs[0].as_slice()) & OFPSF_REPLY_MORE,
            OFPSF_REPLY_MORE
        );
        assert_eq!(stats_msg_flags(msgs[1].as_slice()) & OFPSF_REPLY_MORE, 0);
        // Lengths are stamped.
        let declared = OfpHeader::parse(msgs[0].as_slice()).unwrap().length as usize;
        assert_eq!(declared, msgs[0].len());
    }

    #[test]
    fn postappend_moves_oversized_record() {
        let rq = make_stats_request(OFP10_VERSION, ofpst::FLOW, 0, 0, 1);
        let mut replies = StatsReplies::start(rq.as_slice()).unwrap();
        // Fill close to the cap, then write one record straight into the
        // buffer, crossing it.
        replies.append(&vec![0u8; 65_000]);
        let start = replies.last_mut().len();
        replies.last_mut().put(&vec![1u8; 2_000]);
        replies.postappend(start);
        let msgs = replies.finish();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].len(), 65_000 + OFP10_STATS_MSG_LEN);
        assert_eq!(&msgs[1].as_slice()[OFP10_STATS_MSG_LEN..], &[1u8; 2_000][..]);
    }

    #[test]
    fn stats_body_skips_envelope() {
        let mut rq = make_stats_request(OFP10_VERSION, ofpst::FLOW, 0, 4, 1);
        rq.as_mut_slice()[12..16].copy_from_slice(&[1, 2, 3, 4]);
        let mut body = stats_body(rq.as_slice()).unwrap();
        assert_eq!(body.take(4).unwrap(), &[1, 2, 3, 4]);
        assert_eq!(body.remaining(), 0);
    }
}
