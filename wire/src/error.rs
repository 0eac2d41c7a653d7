// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The decode error taxonomy.
//!
//! One variant per condition the protocol's own error space can report.
//! Malformed peers are never fatal: every decode entry point returns one
//! of these and leaves caller-visible state untouched.  Contract
//! violations by the *caller* (dispatching the wrong message type into a
//! codec, handing an invalid protocol bit to a total function) are bugs,
//! not errors, and abort via `unreachable!` instead.

/// An OpenFlow-level decode/validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[must_use]
pub enum OfpErr {
    /// Message length violates its type's length rule.
    #[error("bad message length")]
    BadLen,
    /// Unsupported or unknown wire protocol version.
    #[error("bad or unsupported protocol version")]
    BadVersion,
    /// Unknown base message type.
    #[error("unknown message type")]
    BadType,
    /// Recognized stats envelope, unknown stats subtype.
    #[error("unknown statistics subtype")]
    BadStat,
    /// Unknown vendor id in a vendor envelope.
    #[error("unknown vendor id")]
    BadVendor,
    /// Recognized vendor, unknown vendor subtype.
    #[error("unknown vendor subtype")]
    BadSubtype,
    /// Match header announces an unknown match encoding.
    #[error("bad match type")]
    BadMatchType,
    /// Match length is malformed or disagrees with the buffer.
    #[error("bad match length")]
    BadMatchLen,
    /// A match field carries an invalid value (VID, PCP, TOS, ...).
    #[error("bad value in match field")]
    BadMatchValue,
    /// A match field is unsupported in this encoding (SCTP, metadata, ...).
    #[error("unsupported match field")]
    BadMatchField,
    /// Partial wildcarding of an all-or-nothing tag field (MPLS).
    #[error("bad match tag")]
    BadMatchTag,
    /// A mask is present on a field that does not allow one, or is
    /// non-contiguous where contiguity is required.
    #[error("bad match mask")]
    BadMatchMask,
    /// A match field's prerequisites are not satisfied.
    #[error("match field prerequisites not met")]
    BadMatchPrereq,
    /// The same match field appeared twice.
    #[error("duplicate match field")]
    DupMatchField,
    /// Value has bits set outside its mask.
    #[error("match value has bits outside its mask")]
    BadMatchWildValue,
    /// Flow addition tried to match (not set) a cookie.
    #[error("cookie match is invalid on flow add")]
    CookieMatchInvalid,
    /// The modern flow-mod named a multicast group; groups are unsupported.
    #[error("groups are not supported")]
    GroupsNotSupported,
    /// Output port number out of range for the action or message.
    #[error("bad output port")]
    BadOutPort,
    /// Packet-out named an invalid ingress port.
    #[error("bad input port")]
    BadInPort,
    /// A reason code outside the defined set.
    #[error("bad reason code")]
    BadReason,
    /// Action/instruction region is malformed (alignment or length).
    #[error("bad action list length")]
    BadActionLen,
}
