// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Actions and instructions, as far as this layer cares about them.
//!
//! Message codecs treat action/instruction payloads as opaque: a decoder
//! validates the region's framing (every embedded header length sane and
//! in bounds, the whole region 8-byte aligned) and hands the raw bytes to
//! the caller.  The structured [`Action`] type exists for the opposite
//! direction — callers that build flows describe their actions with it so
//! [`usable_protocols_with_actions`] can narrow the protocol choice by
//! action kind before anything is encoded.

use crate::cursor::Reader;
use crate::error::OfpErr;
use crate::proto::Protocols;
use flow::Mac;

/// One action or instruction, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)] // kinds mirror the wire protocol's action names
pub enum Action {
    // The OpenFlow 1.0 set.
    Output { port: u16, max_len: u16 },
    Enqueue { port: u16, queue: u32 },
    SetVlanVid(u16),
    SetVlanPcp(u8),
    StripVlan,
    SetEthSrc(Mac),
    SetEthDst(Mac),
    SetIpv4Src(u32),
    SetIpv4Dst(u32),
    SetIpv4Dscp(u8),
    SetL4SrcPort(u16),
    SetL4DstPort(u16),
    // Added by 1.1/1.2.
    CopyTtlOut,
    CopyTtlIn,
    PushVlan(u16),
    PopVlan,
    PushMpls(u16),
    PopMpls(u16),
    SetMplsLabel(u32),
    SetMplsTc(u8),
    SetMplsTtl(u8),
    DecMplsTtl,
    SetQueue(u32),
    SetNwTtl(u8),
    DecNwTtl,
    /// A 1.2 set-field, or the Nicira register load it generalizes.
    RegLoad { set_field: bool },
    // Nicira extension actions.
    Controller,
    Resubmit,
    OutputReg,
    Bundle,
    RegMove,
    SetTunnel(u64),
    PopQueue,
    FinTimeout,
    Learn,
    Multipath,
    Autopath,
    Note,
    Exit,
    // Instructions.
    ApplyActions(Vec<Action>),
    WriteActions(Vec<Action>),
    ClearActions,
    GotoTable(u8),
}

impl Action {
    /// True for the kinds that are instructions rather than actions.
    #[must_use]
    pub fn is_instruction(&self) -> bool {
        matches!(
            self,
            Action::ApplyActions(_)
                | Action::WriteActions(_)
                | Action::ClearActions
                | Action::GotoTable(_)
        )
    }

    /// The action's name in the classic flow syntax.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Action::Output { .. } => "output",
            Action::Enqueue { .. } => "enqueue",
            Action::SetVlanVid(_) => "mod_vlan_vid",
            Action::SetVlanPcp(_) => "mod_vlan_pcp",
            Action::StripVlan => "strip_vlan",
            Action::SetEthSrc(_) => "mod_dl_src",
            Action::SetEthDst(_) => "mod_dl_dst",
            Action::SetIpv4Src(_) => "mod_nw_src",
            Action::SetIpv4Dst(_) => "mod_nw_dst",
            Action::SetIpv4Dscp(_) => "mod_nw_tos",
            Action::SetL4SrcPort(_) => "mod_tp_src",
            Action::SetL4DstPort(_) => "mod_tp_dst",
            Action::CopyTtlOut => "copy_ttl_out",
            Action::CopyTtlIn => "copy_ttl_in",
            Action::PushVlan(_) => "push_vlan",
            Action::PopVlan => "pop_vlan",
            Action::PushMpls(_) => "push_mpls",
            Action::PopMpls(_) => "pop_mpls",
            Action::SetMplsLabel(_) => "set_mpls_label",
            Action::SetMplsTc(_) => "set_mpls_tc",
            Action::SetMplsTtl(_) => "set_mpls_ttl",
            Action::DecMplsTtl => "dec_mpls_ttl",
            Action::SetQueue(_) => "set_queue",
            Action::SetNwTtl(_) => "set_nw_ttl",
            Action::DecNwTtl => "dec_ttl",
            Action::RegLoad { set_field: true } => "set_field",
            Action::RegLoad { set_field: false } => "load",
            Action::Controller => "controller",
            Action::Resubmit => "resubmit",
            Action::OutputReg => "output_reg",
            Action::Bundle => "bundle",
            Action::RegMove => "move",
            Action::SetTunnel(_) => "set_tunnel",
            Action::PopQueue => "pop_queue",
            Action::FinTimeout => "fin_timeout",
            Action::Learn => "learn",
            Action::Multipath => "multipath",
            Action::Autopath => "autopath",
            Action::Note => "note",
            Action::Exit => "exit",
            Action::ApplyActions(_) => "apply_actions",
            Action::WriteActions(_) => "write_actions",
            Action::ClearActions => "clear_actions",
            Action::GotoTable(_) => "goto_table",
        }
    }
}

fn usable_with_action(action: &Action) -> Protocols {
    let mut protocols = Protocols::ANY;
    if action.is_instruction() {
        protocols &= Protocols::NXM_ANY | Protocols::OF12;
    }
    match action {
        Action::ApplyActions(inner) | Action::WriteActions(inner) => {
            protocols &= usable_protocols_with_actions(inner);
        }
        Action::ClearActions => {}
        Action::GotoTable(_) => {
            protocols &= Protocols::OF12;
        }

        Action::RegLoad { set_field: true } => protocols &= Protocols::OF12,
        Action::RegLoad { set_field: false } => {
            protocols &= Protocols::NXM_ANY | Protocols::OF12;
        }

        Action::Output { .. }
        | Action::Enqueue { .. }
        | Action::SetVlanVid(_)
        | Action::SetVlanPcp(_)
        | Action::StripVlan
        | Action::SetEthSrc(_)
        | Action::SetEthDst(_)
        | Action::SetIpv4Src(_)
        | Action::SetIpv4Dst(_)
        | Action::SetIpv4Dscp(_) => {}

        Action::CopyTtlOut | Action::CopyTtlIn | Action::PopVlan => {
            protocols &= Protocols::OF12;
        }

        Action::PushMpls(_)
        | Action::PopMpls(_)
        | Action::PushVlan(_)
        | Action::SetMplsLabel(_)
        | Action::SetMplsTc(_)
        | Action::SetMplsTtl(_)
        | Action::DecMplsTtl => {
            protocols &= Protocols::OF12 | Protocols::NXM_ANY;
        }

        // 1.2 dropped the dedicated transport-port set actions.
        Action::SetL4SrcPort(_) | Action::SetL4DstPort(_) => {
            protocols &= Protocols::OF10_ANY | Protocols::NXM_ANY;
        }

        Action::Controller
        | Action::Resubmit
        | Action::OutputReg
        | Action::Bundle
        | Action::RegMove
        | Action::SetTunnel(_)
        | Action::SetQueue(_)
        | Action::SetNwTtl(_)
        | Action::DecNwTtl
        | Action::PopQueue
        | Action::FinTimeout
        | Action::Learn
        | Action::Multipath
        | Action::Autopath
        | Action::Note
        | Action::Exit => {
            protocols &= Protocols::NXM_ANY | Protocols::OF12;
        }
    }
    debug_assert!(!protocols.is_empty());
    protocols
}

/// The protocols able to carry every action in `actions`.
///
/// Always nonempty: every action is expressible somewhere.
#[must_use]
pub fn usable_protocols_with_actions(actions: &[Action]) -> Protocols {
    let mut protocols = Protocols::ANY;
    for action in actions {
        protocols &= usable_with_action(action);
    }
    debug_assert!(!protocols.is_empty());
    protocols
}

/// Minimum size of any action or instruction record.
const ACTION_HEADER_LEN: usize = 8;

fn pull_region<'a>(r: &mut Reader<'a>, len: usize) -> Result<&'a [u8], OfpErr> {
    if len % ACTION_HEADER_LEN != 0 {
        return Err(OfpErr::BadActionLen);
    }
    let region = r.take(len).map_err(|_| OfpErr::BadActionLen)?;
    // Walk the embedded headers: each must be 8-aligned, nonzero, and
    // land inside the region.
    let mut w = Reader::new(region);
    while w.remaining() > 0 {
        let _type = w.u16().map_err(|_| OfpErr::BadActionLen)?;
        let rec_len = w.u16().map_err(|_| OfpErr::BadActionLen)? as usize;
        if rec_len < ACTION_HEADER_LEN || rec_len % ACTION_HEADER_LEN != 0 {
            return Err(OfpErr::BadActionLen);
        }
        w.skip(rec_len - 4).map_err(|_| OfpErr::BadActionLen)?;
    }
    Ok(region)
}

/// Pulls `len` bytes of OpenFlow 1.0 (or Nicira) actions off `r` as a
/// validated raw region owned by the caller's buffer.
///
/// # Errors
///
/// Returns [`OfpErr::BadActionLen`] on any framing violation.
pub fn pull_actions<'a>(r: &mut Reader<'a>, len: usize) -> Result<&'a [u8], OfpErr> {
    pull_region(r, len)
}

/// Pulls `len` bytes of 1.1/1.2 instructions off `r`; the instruction
/// framing is byte-compatible at the level this layer validates.
///
/// # Errors
///
/// Returns [`OfpErr::BadActionLen`] on any framing violation.
pub fn pull_instructions<'a>(r: &mut Reader<'a>, len: usize) -> Result<&'a [u8], OfpErr> {
    pull_region(r, len)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::msg::MsgBuf;

    #[test]
    fn plain_actions_do_not_narrow() {
        let acts = [
            Action::Output { port: 1, max_len: 0 },
            Action::SetVlanVid(5),
            Action::SetEthSrc(Mac([2, 0, 0, 0, 0, 1])),
        ];
        assert_eq!(usable_protocols_with_actions(&acts), Protocols::ANY);
    }

    #[test]
    fn goto_table_requires_of12() {
        let acts = [Action::GotoTable(3)];
        assert_eq!(usable_protocols_with_actions(&acts), Protocols::OF12);
    }

    #[test]
    fn instructions_exclude_plain_of10() {
        let acts = [Action::ApplyActions(vec![Action::Output { port: 1, max_len: 0 }])];
        assert_eq!(
            usable_protocols_with_actions(&acts),
            Protocols::NXM_ANY | Protocols::OF12
        );
    }

    #[test]
    fn mpls_push_excludes_of10() {
        let acts = [Action::PushMpls(0x8847)];
        assert_eq!(
            usable_protocols_with_actions(&acts),
            Protocols::OF12 | Protocols::NXM_ANY
        );
    }

    #[test]
    fn l4_port_set_excludes_of12() {
        let acts = [Action::SetL4DstPort(8080)];
        assert_eq!(
            usable_protocols_with_actions(&acts),
            Protocols::OF10_ANY | Protocols::NXM_ANY
        );
    }

    #[test]
    fn nested_narrowing_combines() {
        let acts = [Action::WriteActions(vec![Action::SetL4SrcPort(53), Action::Exit])];
        // Instruction context (NXM|OF12) ∩ l4 set (OF10|NXM) ∩ NX action
        // (NXM|OF12) = NXM only.
        assert_eq!(usable_protocols_with_actions(&acts), Protocols::NXM_ANY);
    }

    #[test]
    fn action_names() {
        assert_eq!(Action::Output { port: 1, max_len: 0 }.name(), "output");
        assert_eq!(Action::SetVlanVid(5).name(), "mod_vlan_vid");
        assert_eq!(Action::GotoTable(3).name(), "goto_table");
        assert_eq!(Action::RegLoad { set_field: true }.name(), "set_field");
        assert_eq!(Action::RegLoad { set_field: false }.name(), "load");
    }

    fn region_with(recs: &[(u16, u16, usize)]) -> MsgBuf {
        let mut b = MsgBuf::default();
        for (ty, len, pad) in recs {
            b.put_u16(*ty);
            b.put_u16(*len);
            b.put_zeros(*pad);
        }
        b
    }

    #[test]
    fn well_framed_region_passes() {
        let b = region_with(&[(0, 8, 4), (0xffff, 16, 12)]);
        let mut r = Reader::new(b.as_slice());
        let region = pull_actions(&mut r, 24).unwrap();
        assert_eq!(region.len(), 24);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn bad_framing_rejected() {
        // Region length not a multiple of 8.
        let b = region_with(&[(0, 8, 4)]);
        assert_eq!(
            pull_actions(&mut Reader::new(b.as_slice()), 6),
            Err(OfpErr::BadActionLen)
        );
        // Embedded length lies past the region.
        let b = region_with(&[(0, 24, 4)]);
        assert_eq!(
            pull_actions(&mut Reader::new(b.as_slice()), 8),
            Err(OfpErr::BadActionLen)
        );
        // Embedded length below the minimum.
        let b = region_with(&[(0, 4, 4)]);
        assert_eq!(
            pull_actions(&mut Reader::new(b.as_slice()), 8),
            Err(OfpErr::BadActionLen)
        );
    }
}
