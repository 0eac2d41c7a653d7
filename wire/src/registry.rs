// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The message-type registry.
//!
//! A static table maps (version, base type, stats subtype, vendor id,
//! vendor subtype) tuples to a symbolic message code, a display name, and
//! a length rule.  Classification never reads past the bytes proven
//! available: the fixed header is validated before any stats or vendor
//! envelope field, and each envelope before its own sub-fields.

use crate::cursor::Reader;
use crate::error::OfpErr;
use crate::header::{
    NICIRA_HEADER_LEN, NICIRA10_STATS_MSG_LEN, NICIRA11_STATS_MSG_LEN, NX_VENDOR_ID,
    OFP_HEADER_LEN, OFP_VENDOR_HEADER_LEN, OFP10_STATS_MSG_LEN, OFP10_VENDOR_STATS_MSG_LEN,
    OFP10_VERSION, OFP11_STATS_MSG_LEN, OFP11_VENDOR_STATS_MSG_LEN, OFP11_VERSION, OFP12_VERSION,
    OfpHeader, nxst, nxt, ofpst, ofpt10, ofpt11,
};
use crate::ratelimit::warn_rl;

/// Symbolic code for every message kind this layer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)] // names mirror the wire protocol's own vocabulary
pub enum MsgCode {
    Error,
    Hello,
    EchoRequest,
    EchoReply,
    FeaturesRequest,
    FeaturesReply,
    GetConfigRequest,
    GetConfigReply,
    SetConfig,
    PacketIn,
    FlowRemoved,
    PortStatus,
    PacketOut,
    FlowMod10,
    FlowMod11,
    PortMod,
    BarrierRequest,
    BarrierReply,
    DescStatsRequest,
    DescStatsReply,
    FlowStatsRequest10,
    FlowStatsRequest11,
    FlowStatsReply10,
    FlowStatsReply11,
    AggregateStatsRequest10,
    AggregateStatsRequest11,
    AggregateStatsReply10,
    AggregateStatsReply11,
    TableStatsRequest,
    TableStatsReply,
    PortStatsRequest,
    PortStatsReply,
    QueueStatsRequest,
    QueueStatsReply,
    PortDescStatsRequest,
    PortDescStatsReply,
    NxtRoleRequest,
    NxtRoleReply,
    NxtSetFlowFormat,
    NxtSetPacketInFormat,
    NxtPacketIn,
    NxtFlowMod,
    NxtFlowRemoved,
    NxtFlowModTableId,
    NxtFlowAge,
    NxtSetAsyncConfig,
    NxtSetControllerId,
    NxstFlowRequest,
    NxstAggregateRequest,
    NxstFlowReply,
    NxstAggregateReply,
}

/// The raw tuple extracted from a message's header and envelopes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawMsgType {
    /// Wire version byte; 0 in a table entry means "any version".
    pub version: u8,
    /// Base message type.
    pub msg_type: u8,
    /// Stats subtype, when the base type is a stats envelope.
    pub stat: u16,
    /// Vendor id, when a vendor envelope is involved.
    pub vendor: u32,
    /// Vendor subtype.
    pub subtype: u32,
}

/// How a descriptor's minimum length extends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extra {
    /// The message must be exactly `min_len` bytes.
    Exact,
    /// The message may exceed `min_len` by any amount.
    Any,
    /// The message may exceed `min_len` by a multiple of the record size.
    Multiple(usize),
}

/// A registry entry.
#[derive(Debug, PartialEq)]
pub struct MsgDesc {
    /// Symbolic code for dispatch.
    pub code: MsgCode,
    /// The tuple this entry matches.
    pub raw: RawMsgType,
    /// Display name, e.g. `"OFPT_FLOW_REMOVED"`.
    pub name: &'static str,
    /// Minimum total message length in bytes.
    pub min_len: usize,
    /// How the length may exceed `min_len`.
    pub extra: Extra,
}

// Body sizes the table needs; each is owned by its codec module.
use crate::features::{OFP_DESC_STATS_LEN, OFP_SWITCH_FEATURES_LEN};
use crate::flow_mod::{NX_FLOW_MOD_LEN, OFP10_FLOW_MOD_LEN, OFP11_FLOW_MOD_LEN};
use crate::flow_removed::{NX_FLOW_REMOVED_LEN, OFP10_FLOW_REMOVED_LEN, OFP12_FLOW_REMOVED_MIN_LEN};
use crate::flow_stats::{
    NX_AGGREGATE_STATS_REPLY_LEN, NX_FLOW_STATS_REQUEST_LEN, OFP10_AGGREGATE_STATS_REPLY_LEN,
    OFP10_FLOW_STATS_REQUEST_LEN, OFP11_AGGREGATE_STATS_REPLY_LEN, OFP11_FLOW_STATS_REQUEST_MIN_LEN,
};
use crate::packet_in::{NX_PACKET_IN_LEN, OFP10_PACKET_IN_MIN_LEN, OFP11_PACKET_IN_LEN};
use crate::packet_out::{OFP10_PACKET_OUT_LEN, OFP11_PACKET_OUT_LEN};
use crate::port::{OFP10_PHY_PORT_LEN, OFP11_PORT_LEN};
use crate::port_mod::{OFP10_PORT_MOD_LEN, OFP11_PORT_MOD_LEN};

const OFP_ERROR_MSG_LEN: usize = 12;
const OFP_SWITCH_CONFIG_LEN: usize = 12;
const OFP_PORT_STATUS_PREFIX_LEN: usize = 16;

static_assertions::const_assert_eq!(OFP_PORT_STATUS_PREFIX_LEN + OFP10_PHY_PORT_LEN, 64);
static_assertions::const_assert_eq!(OFP_PORT_STATUS_PREFIX_LEN + OFP11_PORT_LEN, 80);
const OFP10_TABLE_STATS_LEN: usize = 64;
const OFP11_TABLE_STATS_LEN: usize = 88;
const OFP12_TABLE_STATS_LEN: usize = 128;
const OFP10_PORT_STATS_LEN: usize = 104;
const OFP11_PORT_STATS_LEN: usize = 104;
const OFP10_QUEUE_STATS_LEN: usize = 32;
const OFP11_QUEUE_STATS_LEN: usize = 32;
const OFP10_PORT_STATS_REQUEST_LEN: usize = 8;
const OFP11_PORT_STATS_REQUEST_LEN: usize = 8;
const OFP10_QUEUE_STATS_REQUEST_LEN: usize = 8;
const OFP11_QUEUE_STATS_REQUEST_LEN: usize = 8;

const fn ofpt(
    code: MsgCode,
    version: u8,
    msg_type: u8,
    name: &'static str,
    min_len: usize,
    extra: Extra,
) -> MsgDesc {
    MsgDesc {
        code,
        raw: RawMsgType { version, msg_type, stat: 0, vendor: 0, subtype: 0 },
        name,
        min_len,
        extra,
    }
}

const fn ofpst10(
    code: MsgCode,
    reply: bool,
    stat: u16,
    name: &'static str,
    body: usize,
    extra: Extra,
) -> MsgDesc {
    MsgDesc {
        code,
        raw: RawMsgType {
            version: OFP10_VERSION,
            msg_type: if reply { ofpt10::STATS_REPLY } else { ofpt10::STATS_REQUEST },
            stat,
            vendor: 0,
            subtype: 0,
        },
        name,
        min_len: OFP10_STATS_MSG_LEN + body,
        extra,
    }
}

const fn ofpst1x(
    code: MsgCode,
    version: u8,
    reply: bool,
    stat: u16,
    name: &'static str,
    body: usize,
    extra: Extra,
) -> MsgDesc {
    MsgDesc {
        code,
        raw: RawMsgType {
            version,
            msg_type: if reply { ofpt11::STATS_REPLY } else { ofpt11::STATS_REQUEST },
            stat,
            vendor: 0,
            subtype: 0,
        },
        name,
        min_len: OFP11_STATS_MSG_LEN + body,
        extra,
    }
}

const fn nxt_msg(
    code: MsgCode,
    subtype: u32,
    name: &'static str,
    min_len: usize,
    extra: Extra,
) -> MsgDesc {
    MsgDesc {
        code,
        raw: RawMsgType {
            version: OFP10_VERSION,
            msg_type: ofpt10::VENDOR,
            stat: 0,
            vendor: NX_VENDOR_ID,
            subtype,
        },
        name,
        min_len,
        extra,
    }
}

const fn nxst_msg(
    code: MsgCode,
    reply: bool,
    subtype: u32,
    name: &'static str,
    body: usize,
    extra: Extra,
) -> MsgDesc {
    MsgDesc {
        code,
        raw: RawMsgType {
            version: OFP10_VERSION,
            msg_type: if reply { ofpt10::STATS_REPLY } else { ofpt10::STATS_REQUEST },
            stat: ofpst::VENDOR,
            vendor: NX_VENDOR_ID,
            subtype,
        },
        name,
        min_len: NICIRA10_STATS_MSG_LEN + body,
        extra,
    }
}

/// The registry.  Version 0 in an entry matches any version.
#[allow(clippy::too_many_lines)]
pub static MSG_TYPES: &[MsgDesc] = &[
    ofpt(MsgCode::Error, 0, ofpt10::ERROR, "OFPT_ERROR", OFP_ERROR_MSG_LEN, Extra::Any),
    // OpenFlow 1.0.
    ofpt(MsgCode::Hello, OFP10_VERSION, ofpt10::HELLO, "OFPT_HELLO", OFP_HEADER_LEN, Extra::Any),
    ofpt(MsgCode::EchoRequest, OFP10_VERSION, ofpt10::ECHO_REQUEST, "OFPT_ECHO_REQUEST",
         OFP_HEADER_LEN, Extra::Any),
    ofpt(MsgCode::EchoReply, OFP10_VERSION, ofpt10::ECHO_REPLY, "OFPT_ECHO_REPLY",
         OFP_HEADER_LEN, Extra::Any),
    ofpt(MsgCode::FeaturesRequest, OFP10_VERSION, ofpt10::FEATURES_REQUEST,
         "OFPT_FEATURES_REQUEST", OFP_HEADER_LEN, Extra::Exact),
    ofpt(MsgCode::FeaturesReply, OFP10_VERSION, ofpt10::FEATURES_REPLY, "OFPT_FEATURES_REPLY",
         OFP_SWITCH_FEATURES_LEN, Extra::Multiple(OFP10_PHY_PORT_LEN)),
    ofpt(MsgCode::GetConfigRequest, OFP10_VERSION, ofpt10::GET_CONFIG_REQUEST,
         "OFPT_GET_CONFIG_REQUEST", OFP_HEADER_LEN, Extra::Exact),
    ofpt(MsgCode::GetConfigReply, OFP10_VERSION, ofpt10::GET_CONFIG_REPLY,
         "OFPT_GET_CONFIG_REPLY", OFP_SWITCH_CONFIG_LEN, Extra::Exact),
    ofpt(MsgCode::SetConfig, OFP10_VERSION, ofpt10::SET_CONFIG, "OFPT_SET_CONFIG",
         OFP_SWITCH_CONFIG_LEN, Extra::Exact),
    ofpt(MsgCode::PacketIn, OFP10_VERSION, ofpt10::PACKET_IN, "OFPT_PACKET_IN",
         OFP10_PACKET_IN_MIN_LEN, Extra::Any),
    ofpt(MsgCode::FlowRemoved, OFP10_VERSION, ofpt10::FLOW_REMOVED, "OFPT_FLOW_REMOVED",
         OFP10_FLOW_REMOVED_LEN, Extra::Exact),
    ofpt(MsgCode::PortStatus, OFP10_VERSION, ofpt10::PORT_STATUS, "OFPT_PORT_STATUS",
         OFP_PORT_STATUS_PREFIX_LEN + OFP10_PHY_PORT_LEN, Extra::Exact),
    ofpt(MsgCode::PacketOut, OFP10_VERSION, ofpt10::PACKET_OUT, "OFPT_PACKET_OUT",
         OFP10_PACKET_OUT_LEN, Extra::Any),
    ofpt(MsgCode::FlowMod10, OFP10_VERSION, ofpt10::FLOW_MOD, "OFPT_FLOW_MOD",
         OFP10_FLOW_MOD_LEN, Extra::Any),
    ofpt(MsgCode::PortMod, OFP10_VERSION, ofpt10::PORT_MOD, "OFPT_PORT_MOD",
         OFP10_PORT_MOD_LEN, Extra::Exact),
    ofpt(MsgCode::BarrierRequest, OFP10_VERSION, ofpt10::BARRIER_REQUEST,
         "OFPT_BARRIER_REQUEST", OFP_HEADER_LEN, Extra::Exact),
    ofpt(MsgCode::BarrierReply, OFP10_VERSION, ofpt10::BARRIER_REPLY, "OFPT_BARRIER_REPLY",
         OFP_HEADER_LEN, Extra::Exact),
    // OpenFlow 1.1 messages whose layout differs from 1.0.
    ofpt(MsgCode::FeaturesReply, OFP11_VERSION, ofpt10::FEATURES_REPLY, "OFPT_FEATURES_REPLY",
         OFP_SWITCH_FEATURES_LEN, Extra::Multiple(OFP11_PORT_LEN)),
    ofpt(MsgCode::PortStatus, OFP11_VERSION, ofpt10::PORT_STATUS, "OFPT_PORT_STATUS",
         OFP_PORT_STATUS_PREFIX_LEN + OFP11_PORT_LEN, Extra::Exact),
    ofpt(MsgCode::PacketOut, OFP11_VERSION, ofpt11::PACKET_OUT, "OFPT_PACKET_OUT",
         OFP11_PACKET_OUT_LEN, Extra::Any),
    ofpt(MsgCode::FlowMod11, OFP11_VERSION, ofpt11::FLOW_MOD, "OFPT_FLOW_MOD",
         OFP11_FLOW_MOD_LEN, Extra::Any),
    ofpt(MsgCode::PortMod, OFP11_VERSION, ofpt11::PORT_MOD, "OFPT_PORT_MOD",
         OFP11_PORT_MOD_LEN, Extra::Exact),
    // OpenFlow 1.2.
    ofpt(MsgCode::Hello, OFP12_VERSION, ofpt10::HELLO, "OFPT_HELLO", OFP_HEADER_LEN, Extra::Any),
    ofpt(MsgCode::EchoRequest, OFP12_VERSION, ofpt10::ECHO_REQUEST, "OFPT_ECHO_REQUEST",
         OFP_HEADER_LEN, Extra::Any),
    ofpt(MsgCode::EchoReply, OFP12_VERSION, ofpt10::ECHO_REPLY, "OFPT_ECHO_REPLY",
         OFP_HEADER_LEN, Extra::Any),
    ofpt(MsgCode::FeaturesRequest, OFP12_VERSION, ofpt10::FEATURES_REQUEST,
         "OFPT_FEATURES_REQUEST", OFP_HEADER_LEN, Extra::Exact),
    ofpt(MsgCode::FeaturesReply, OFP12_VERSION, ofpt10::FEATURES_REPLY, "OFPT_FEATURES_REPLY",
         OFP_SWITCH_FEATURES_LEN, Extra::Multiple(OFP11_PORT_LEN)),
    ofpt(MsgCode::GetConfigRequest, OFP12_VERSION, ofpt10::GET_CONFIG_REQUEST,
         "OFPT_GET_CONFIG_REQUEST", OFP_HEADER_LEN, Extra::Exact),
    ofpt(MsgCode::GetConfigReply, OFP12_VERSION, ofpt10::GET_CONFIG_REPLY,
         "OFPT_GET_CONFIG_REPLY", OFP_SWITCH_CONFIG_LEN, Extra::Exact),
    ofpt(MsgCode::SetConfig, OFP12_VERSION, ofpt10::SET_CONFIG, "OFPT_SET_CONFIG",
         OFP_SWITCH_CONFIG_LEN, Extra::Exact),
    ofpt(MsgCode::FlowRemoved, OFP12_VERSION, ofpt10::FLOW_REMOVED, "OFPT_FLOW_REMOVED",
         OFP12_FLOW_REMOVED_MIN_LEN, Extra::Multiple(8)),
    ofpt(MsgCode::PacketIn, OFP12_VERSION, ofpt10::PACKET_IN, "OFPT_PACKET_IN",
         OFP11_PACKET_IN_LEN, Extra::Any),
    ofpt(MsgCode::PortStatus, OFP12_VERSION, ofpt10::PORT_STATUS, "OFPT_PORT_STATUS",
         OFP_PORT_STATUS_PREFIX_LEN + OFP11_PORT_LEN, Extra::Exact),
    ofpt(MsgCode::PacketOut, OFP12_VERSION, ofpt11::PACKET_OUT, "OFPT_PACKET_OUT",
         OFP11_PACKET_OUT_LEN, Extra::Any),
    ofpt(MsgCode::FlowMod11, OFP12_VERSION, ofpt11::FLOW_MOD, "OFPT_FLOW_MOD",
         OFP11_FLOW_MOD_LEN, Extra::Any),
    ofpt(MsgCode::PortMod, OFP12_VERSION, ofpt11::PORT_MOD, "OFPT_PORT_MOD",
         OFP11_PORT_MOD_LEN, Extra::Exact),
    ofpt(MsgCode::BarrierRequest, OFP12_VERSION, ofpt11::BARRIER_REQUEST,
         "OFPT_BARRIER_REQUEST", OFP_HEADER_LEN, Extra::Exact),
    ofpt(MsgCode::BarrierReply, OFP12_VERSION, ofpt11::BARRIER_REPLY, "OFPT_BARRIER_REPLY",
         OFP_HEADER_LEN, Extra::Exact),
    // OpenFlow 1.0 statistics.
    ofpst10(MsgCode::DescStatsRequest, false, ofpst::DESC, "OFPST_DESC request", 0, Extra::Exact),
    ofpst10(MsgCode::FlowStatsRequest10, false, ofpst::FLOW, "OFPST_FLOW request",
            OFP10_FLOW_STATS_REQUEST_LEN, Extra::Exact),
    ofpst10(MsgCode::AggregateStatsRequest10, false, ofpst::AGGREGATE,
            "OFPST_AGGREGATE request", OFP10_FLOW_STATS_REQUEST_LEN, Extra::Exact),
    ofpst10(MsgCode::TableStatsRequest, false, ofpst::TABLE, "OFPST_TABLE request",
            0, Extra::Exact),
    ofpst10(MsgCode::PortStatsRequest, false, ofpst::PORT, "OFPST_PORT request",
            OFP10_PORT_STATS_REQUEST_LEN, Extra::Exact),
    ofpst10(MsgCode::QueueStatsRequest, false, ofpst::QUEUE, "OFPST_QUEUE request",
            OFP10_QUEUE_STATS_REQUEST_LEN, Extra::Exact),
    ofpst10(MsgCode::PortDescStatsRequest, false, ofpst::PORT_DESC, "OFPST_PORT_DESC request",
            0, Extra::Exact),
    ofpst10(MsgCode::DescStatsReply, true, ofpst::DESC, "OFPST_DESC reply",
            OFP_DESC_STATS_LEN, Extra::Exact),
    ofpst10(MsgCode::FlowStatsReply10, true, ofpst::FLOW, "OFPST_FLOW reply", 0, Extra::Any),
    ofpst10(MsgCode::AggregateStatsReply10, true, ofpst::AGGREGATE, "OFPST_AGGREGATE reply",
            OFP10_AGGREGATE_STATS_REPLY_LEN, Extra::Exact),
    ofpst10(MsgCode::TableStatsReply, true, ofpst::TABLE, "OFPST_TABLE reply",
            0, Extra::Multiple(OFP10_TABLE_STATS_LEN)),
    ofpst10(MsgCode::PortStatsReply, true, ofpst::PORT, "OFPST_PORT reply",
            0, Extra::Multiple(OFP10_PORT_STATS_LEN)),
    ofpst10(MsgCode::QueueStatsReply, true, ofpst::QUEUE, "OFPST_QUEUE reply",
            0, Extra::Multiple(OFP10_QUEUE_STATS_LEN)),
    ofpst10(MsgCode::PortDescStatsReply, true, ofpst::PORT_DESC, "OFPST_PORT_DESC reply",
            0, Extra::Multiple(OFP10_PHY_PORT_LEN)),
    // OpenFlow 1.1 statistics.
    ofpst1x(MsgCode::DescStatsRequest, OFP11_VERSION, false, ofpst::DESC,
            "OFPST_DESC request", 0, Extra::Exact),
    ofpst1x(MsgCode::TableStatsRequest, OFP11_VERSION, false, ofpst::TABLE,
            "OFPST_TABLE request", 0, Extra::Exact),
    ofpst1x(MsgCode::PortStatsRequest, OFP11_VERSION, false, ofpst::PORT,
            "OFPST_PORT request", OFP11_PORT_STATS_REQUEST_LEN, Extra::Exact),
    ofpst1x(MsgCode::QueueStatsRequest, OFP11_VERSION, false, ofpst::QUEUE,
            "OFPST_QUEUE request", OFP11_QUEUE_STATS_REQUEST_LEN, Extra::Exact),
    ofpst1x(MsgCode::PortDescStatsRequest, OFP11_VERSION, false, ofpst::PORT_DESC,
            "OFPST_PORT_DESC request", 0, Extra::Exact),
    ofpst1x(MsgCode::DescStatsReply, OFP11_VERSION, true, ofpst::DESC,
            "OFPST_DESC reply", OFP_DESC_STATS_LEN, Extra::Exact),
    ofpst1x(MsgCode::AggregateStatsReply11, OFP11_VERSION, true, ofpst::AGGREGATE,
            "OFPST_AGGREGATE reply", OFP11_AGGREGATE_STATS_REPLY_LEN, Extra::Exact),
    ofpst1x(MsgCode::TableStatsReply, OFP11_VERSION, true, ofpst::TABLE,
            "OFPST_TABLE reply", 0, Extra::Multiple(OFP11_TABLE_STATS_LEN)),
    ofpst1x(MsgCode::PortStatsReply, OFP11_VERSION, true, ofpst::PORT,
            "OFPST_PORT reply", 0, Extra::Multiple(OFP11_PORT_STATS_LEN)),
    ofpst1x(MsgCode::QueueStatsReply, OFP11_VERSION, true, ofpst::QUEUE,
            "OFPST_QUEUE reply", 0, Extra::Multiple(OFP11_QUEUE_STATS_LEN)),
    ofpst1x(MsgCode::PortDescStatsReply, OFP11_VERSION, true, ofpst::PORT_DESC,
            "OFPST_PORT_DESC reply", 0, Extra::Multiple(OFP11_PORT_LEN)),
    // OpenFlow 1.2 statistics.
    ofpst1x(MsgCode::DescStatsRequest, OFP12_VERSION, false, ofpst::DESC,
            "OFPST_DESC request", 0, Extra::Exact),
    ofpst1x(MsgCode::FlowStatsRequest11, OFP12_VERSION, false, ofpst::FLOW,
            "OFPST_FLOW request", OFP11_FLOW_STATS_REQUEST_MIN_LEN, Extra::Any),
    ofpst1x(MsgCode::AggregateStatsRequest11, OFP12_VERSION, false, ofpst::AGGREGATE,
            "OFPST_AGGREGATE request", OFP11_FLOW_STATS_REQUEST_MIN_LEN, Extra::Any),
    ofpst1x(MsgCode::TableStatsRequest, OFP12_VERSION, false, ofpst::TABLE,
            "OFPST_TABLE request", 0, Extra::Exact),
    ofpst1x(MsgCode::PortStatsRequest, OFP12_VERSION, false, ofpst::PORT,
            "OFPST_PORT request", OFP11_PORT_STATS_REQUEST_LEN, Extra::Exact),
    ofpst1x(MsgCode::QueueStatsRequest, OFP12_VERSION, false, ofpst::QUEUE,
            "OFPST_QUEUE request", OFP11_QUEUE_STATS_REQUEST_LEN, Extra::Exact),
    ofpst1x(MsgCode::PortDescStatsRequest, OFP12_VERSION, false, ofpst::PORT_DESC,
            "OFPST_PORT_DESC request", 0, Extra::Exact),
    ofpst1x(MsgCode::DescStatsReply, OFP12_VERSION, true, ofpst::DESC,
            "OFPST_DESC reply", OFP_DESC_STATS_LEN, Extra::Exact),
    ofpst1x(MsgCode::FlowStatsReply11, OFP12_VERSION, true, ofpst::FLOW,
            "OFPST_FLOW reply", 0, Extra::Any),
    ofpst1x(MsgCode::AggregateStatsReply11, OFP12_VERSION, true, ofpst::AGGREGATE,
            "OFPST_AGGREGATE reply", OFP11_AGGREGATE_STATS_REPLY_LEN, Extra::Exact),
    ofpst1x(MsgCode::TableStatsReply, OFP12_VERSION, true, ofpst::TABLE,
            "OFPST_TABLE reply", 0, Extra::Multiple(OFP12_TABLE_STATS_LEN)),
    ofpst1x(MsgCode::PortStatsReply, OFP12_VERSION, true, ofpst::PORT,
            "OFPST_PORT reply", 0, Extra::Multiple(OFP11_PORT_STATS_LEN)),
    ofpst1x(MsgCode::QueueStatsReply, OFP12_VERSION, true, ofpst::QUEUE,
            "OFPST_QUEUE reply", 0, Extra::Multiple(OFP11_QUEUE_STATS_LEN)),
    ofpst1x(MsgCode::PortDescStatsReply, OFP12_VERSION, true, ofpst::PORT_DESC,
            "OFPST_PORT_DESC reply", 0, Extra::Multiple(OFP11_PORT_LEN)),
    // Nicira extension messages.
    nxt_msg(MsgCode::NxtRoleRequest, nxt::ROLE_REQUEST, "NXT_ROLE_REQUEST", 20, Extra::Exact),
    nxt_msg(MsgCode::NxtRoleReply, nxt::ROLE_REPLY, "NXT_ROLE_REPLY", 20, Extra::Exact),
    nxt_msg(MsgCode::NxtSetFlowFormat, nxt::SET_FLOW_FORMAT, "NXT_SET_FLOW_FORMAT",
            20, Extra::Exact),
    nxt_msg(MsgCode::NxtSetPacketInFormat, nxt::SET_PACKET_IN_FORMAT,
            "NXT_SET_PACKET_IN_FORMAT", 20, Extra::Exact),
    nxt_msg(MsgCode::NxtPacketIn, nxt::PACKET_IN, "NXT_PACKET_IN",
            NX_PACKET_IN_LEN, Extra::Any),
    nxt_msg(MsgCode::NxtFlowMod, nxt::FLOW_MOD, "NXT_FLOW_MOD",
            NX_FLOW_MOD_LEN, Extra::Multiple(8)),
    nxt_msg(MsgCode::NxtFlowRemoved, nxt::FLOW_REMOVED, "NXT_FLOW_REMOVED",
            NX_FLOW_REMOVED_LEN, Extra::Multiple(8)),
    nxt_msg(MsgCode::NxtFlowModTableId, nxt::FLOW_MOD_TABLE_ID, "NXT_FLOW_MOD_TABLE_ID",
            24, Extra::Exact),
    nxt_msg(MsgCode::NxtFlowAge, nxt::FLOW_AGE, "NXT_FLOW_AGE",
            NICIRA_HEADER_LEN, Extra::Exact),
    nxt_msg(MsgCode::NxtSetAsyncConfig, nxt::SET_ASYNC_CONFIG, "NXT_SET_ASYNC_CONFIG",
            40, Extra::Exact),
    nxt_msg(MsgCode::NxtSetControllerId, nxt::SET_CONTROLLER_ID, "NXT_SET_CONTROLLER_ID",
            24, Extra::Exact),
    // Nicira extension statistics.
    nxst_msg(MsgCode::NxstFlowRequest, false, nxst::FLOW, "NXST_FLOW request",
             NX_FLOW_STATS_REQUEST_LEN, Extra::Multiple(8)),
    nxst_msg(MsgCode::NxstAggregateRequest, false, nxst::AGGREGATE, "NXST_AGGREGATE request",
             NX_FLOW_STATS_REQUEST_LEN, Extra::Multiple(8)),
    nxst_msg(MsgCode::NxstFlowReply, true, nxst::FLOW, "NXST_FLOW reply", 0, Extra::Multiple(8)),
    nxst_msg(MsgCode::NxstAggregateReply, true, nxst::AGGREGATE, "NXST_AGGREGATE reply",
             NX_AGGREGATE_STATS_REPLY_LEN, Extra::Exact),
];

/// Extract the raw type tuple from the first `length` bytes of `msg`.
///
/// Escalates its prefix checks: fixed header, then the stats or vendor
/// envelope, then the vendor subtype header.  Never reads a field the
/// prefix check has not covered.
fn decode_raw_msg_type(msg: &[u8], length: usize) -> Result<RawMsgType, OfpErr> {
    if length < OFP_HEADER_LEN || msg.len() < OFP_HEADER_LEN {
        return Err(OfpErr::BadLen);
    }
    let Ok(oh) = OfpHeader::parse(msg) else {
        return Err(OfpErr::BadLen);
    };
    let mut raw = RawMsgType {
        version: oh.version,
        msg_type: oh.msg_type,
        ..RawMsgType::default()
    };

    let avail = length.min(msg.len());
    let mut r = Reader::new(&msg[..avail]);
    r.skip(OFP_HEADER_LEN).map_err(|_| OfpErr::BadLen)?;

    if raw.msg_type == ofpt10::VENDOR {
        if avail < OFP_VENDOR_HEADER_LEN {
            return Err(OfpErr::BadLen);
        }
        raw.vendor = r.u32().map_err(|_| OfpErr::BadLen)?;
        if raw.vendor != NX_VENDOR_ID {
            return Err(OfpErr::BadVendor);
        }
        if avail < NICIRA_HEADER_LEN {
            return Err(OfpErr::BadLen);
        }
        raw.subtype = r.u32().map_err(|_| OfpErr::BadLen)?;
    } else if raw.version == OFP10_VERSION
        && (raw.msg_type == ofpt10::STATS_REQUEST || raw.msg_type == ofpt10::STATS_REPLY)
    {
        if avail < OFP10_STATS_MSG_LEN {
            return Err(OfpErr::BadLen);
        }
        raw.stat = r.u16().map_err(|_| OfpErr::BadLen)?;
        if raw.stat == ofpst::VENDOR {
            if avail < OFP10_VENDOR_STATS_MSG_LEN {
                return Err(OfpErr::BadLen);
            }
            r.skip(2).map_err(|_| OfpErr::BadLen)?; // flags
            raw.vendor = r.u32().map_err(|_| OfpErr::BadLen)?;
            if raw.vendor != NX_VENDOR_ID {
                return Err(OfpErr::BadVendor);
            }
            if avail < NICIRA10_STATS_MSG_LEN {
                return Err(OfpErr::BadLen);
            }
            raw.subtype = r.u32().map_err(|_| OfpErr::BadLen)?;
        }
    } else if (raw.version == OFP11_VERSION || raw.version == OFP12_VERSION)
        && (raw.msg_type == ofpt11::STATS_REQUEST || raw.msg_type == ofpt11::STATS_REPLY)
    {
        if avail < OFP11_STATS_MSG_LEN {
            return Err(OfpErr::BadLen);
        }
        raw.stat = r.u16().map_err(|_| OfpErr::BadLen)?;
        if raw.stat == ofpst::VENDOR {
            if avail < OFP11_VENDOR_STATS_MSG_LEN {
                return Err(OfpErr::BadLen);
            }
            r.skip(6).map_err(|_| OfpErr::BadLen)?; // flags + pad
            raw.vendor = r.u32().map_err(|_| OfpErr::BadLen)?;
            if raw.vendor != NX_VENDOR_ID {
                return Err(OfpErr::BadVendor);
            }
            if avail < NICIRA11_STATS_MSG_LEN {
                return Err(OfpErr::BadLen);
            }
            raw.subtype = r.u32().map_err(|_| OfpErr::BadLen)?;
        }
    }

    Ok(raw)
}

fn raw_msg_match(want: &RawMsgType, have: &RawMsgType) -> bool {
    (want.version == 0 || want.version == have.version)
        && want.msg_type == have.msg_type
        && want.stat == have.stat
        && want.vendor == have.vendor
        && want.subtype == have.subtype
}

fn lookup(raw: &RawMsgType) -> Result<&'static MsgDesc, OfpErr> {
    for desc in MSG_TYPES {
        if raw_msg_match(&desc.raw, raw) {
            return Ok(desc);
        }
    }
    Err(if raw.vendor != 0 {
        OfpErr::BadSubtype
    } else if raw.stat != 0 {
        OfpErr::BadStat
    } else {
        OfpErr::BadType
    })
}

/// Validate `length` against the descriptor's length rule.
///
/// # Errors
///
/// Returns [`OfpErr::BadLen`] (and logs through the rate limiter) on a
/// violation.
pub fn check_length(desc: &MsgDesc, length: usize) -> Result<(), OfpErr> {
    match desc.extra {
        Extra::Exact => {
            if length != desc.min_len {
                warn_rl!(
                    "received {} with incorrect length {length} (expected length {})",
                    desc.name,
                    desc.min_len
                );
                return Err(OfpErr::BadLen);
            }
        }
        Extra::Any => {
            if length < desc.min_len {
                warn_rl!(
                    "received {} with incorrect length {length} (expected length at least {})",
                    desc.name,
                    desc.min_len
                );
                return Err(OfpErr::BadLen);
            }
        }
        Extra::Multiple(record) => {
            if length < desc.min_len || (length - desc.min_len) % record != 0 {
                warn_rl!(
                    "received {} with incorrect length {length} (must be exactly {} bytes or \
                     longer by an integer multiple of {record} bytes)",
                    desc.name,
                    desc.min_len
                );
                return Err(OfpErr::BadLen);
            }
        }
    }
    Ok(())
}

/// Decode the message type of the complete message `msg`.
///
/// `msg` must be a whole length-framed message: the header's declared
/// length is trusted to describe it, and the descriptor's length rule is
/// enforced before returning.
///
/// # Errors
///
/// Classification errors (`BadLen`/`BadType`/`BadStat`/`BadVendor`/
/// `BadSubtype`) exactly distinguish which level of the type tuple failed.
pub fn decode_msg_type(msg: &[u8]) -> Result<&'static MsgDesc, OfpErr> {
    let oh = OfpHeader::parse(msg).map_err(|_| OfpErr::BadLen)?;
    let length = oh.length as usize;
    let desc = decode_raw_msg_type(msg, length).and_then(|raw| lookup(&raw))?;
    check_length(desc, length)?;
    Ok(desc)
}

/// Decode the message type of a message of which only `length` bytes are
/// available — enough to classify, not necessarily a complete body.  The
/// descriptor's body-length rule is *not* applied.
///
/// # Errors
///
/// Same classification errors as [`decode_msg_type`].
pub fn decode_msg_type_partial(msg: &[u8], length: usize) -> Result<&'static MsgDesc, OfpErr> {
    if length < OFP_HEADER_LEN {
        return Err(OfpErr::BadLen);
    }
    decode_raw_msg_type(msg, length).and_then(|raw| lookup(&raw))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::msg::{make_nxmsg, make_openflow};

    #[test]
    fn no_two_entries_share_a_tuple() {
        for (i, a) in MSG_TYPES.iter().enumerate() {
            for b in &MSG_TYPES[i + 1..] {
                assert_ne!(
                    a.raw, b.raw,
                    "registry collision between {} and {}",
                    a.name, b.name
                );
            }
        }
    }

    #[test]
    fn hello_classifies() {
        let b = make_openflow(8, OFP10_VERSION, ofpt10::HELLO, 1);
        let desc = decode_msg_type(b.as_slice()).unwrap();
        assert_eq!(desc.code, MsgCode::Hello);
        assert_eq!(desc.name, "OFPT_HELLO");
    }

    #[test]
    fn unknown_base_type_is_bad_type() {
        let b = make_openflow(8, OFP10_VERSION, 0x77, 1);
        assert_eq!(decode_msg_type(b.as_slice()), Err(OfpErr::BadType));
    }

    #[test]
    fn unknown_stat_subtype_is_bad_stat() {
        let mut b = make_openflow(12, OFP10_VERSION, ofpt10::STATS_REQUEST, 1);
        b.set_u16_at(8, 0x0777);
        assert_eq!(decode_msg_type(b.as_slice()), Err(OfpErr::BadStat));
    }

    #[test]
    fn unknown_vendor_is_bad_vendor_and_subtype_is_bad_subtype() {
        // Vendor envelope with an unrecognized vendor id.
        let b = make_openflow(16, OFP10_VERSION, ofpt10::VENDOR, 1);
        let mut bytes = b.into_vec();
        bytes[8..12].copy_from_slice(&0xdead_beefu32.to_be_bytes());
        assert_eq!(decode_msg_type(&bytes), Err(OfpErr::BadVendor));

        // Nicira vendor with an unrecognized subtype.
        let nx = make_nxmsg(16, 0x7777, 1);
        assert_eq!(decode_msg_type(nx.as_slice()), Err(OfpErr::BadSubtype));
    }

    #[test]
    fn exact_length_rule_enforced() {
        // Barrier request must be exactly 8 bytes.
        let b = make_openflow(12, OFP10_VERSION, ofpt10::BARRIER_REQUEST, 1);
        assert_eq!(decode_msg_type(b.as_slice()), Err(OfpErr::BadLen));
    }

    #[test]
    fn multiple_length_rule_enforced() {
        // 1.0 features reply may exceed 32 bytes by multiples of 48 only.
        let ok = make_openflow(32 + 48, OFP10_VERSION, ofpt10::FEATURES_REPLY, 1);
        assert!(decode_msg_type(ok.as_slice()).is_ok());
        let bad = make_openflow(32 + 47, OFP10_VERSION, ofpt10::FEATURES_REPLY, 1);
        assert_eq!(decode_msg_type(bad.as_slice()), Err(OfpErr::BadLen));
    }

    #[test]
    fn partial_decode_skips_body_rule() {
        // A flow_mod header prefix shorter than the full body still
        // classifies via the partial entry point.
        let b = make_openflow(OFP10_FLOW_MOD_LEN, OFP10_VERSION, ofpt10::FLOW_MOD, 1);
        let prefix = &b.as_slice()[..8];
        let desc = decode_msg_type_partial(prefix, 8).unwrap();
        assert_eq!(desc.code, MsgCode::FlowMod10);
        // But the full decode of a truncated claim fails.
        assert!(decode_msg_type_partial(prefix, 7).is_err());
    }

    #[test]
    fn vendor_prefix_validation_escalates() {
        // A vendor message cut off before the vendor id is a length error,
        // not a vendor error.
        let b = make_openflow(8, OFP10_VERSION, ofpt10::VENDOR, 1);
        assert_eq!(decode_msg_type_partial(b.as_slice(), 8), Err(OfpErr::BadLen));
    }

    #[test]
    fn nxt_flow_mod_length_multiple() {
        let ok = make_nxmsg(NX_FLOW_MOD_LEN + 16, nxt::FLOW_MOD, 1);
        assert_eq!(decode_msg_type(ok.as_slice()).unwrap().code, MsgCode::NxtFlowMod);
        let bad = make_nxmsg(NX_FLOW_MOD_LEN + 4, nxt::FLOW_MOD, 1);
        assert_eq!(decode_msg_type(bad.as_slice()), Err(OfpErr::BadLen));
    }
}
