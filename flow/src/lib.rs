// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Protocol-independent flow match rules.
//!
//! A [`Rule`] pairs an exact-value [`FlowKey`] with per-field
//! [`Wildcards`] and a match priority.  Wire codecs translate rules to and
//! from the on-the-wire match formats; the classifier consumes rules and
//! never sees wire bytes.

#![forbid(unsafe_code)]
#![deny(missing_docs, clippy::all, clippy::pedantic)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod display;
pub mod key;
pub mod mac;
pub mod normalize;
pub mod rule;
pub mod tci;
pub mod wildcards;

pub use key::{FLOW_N_REGS, FlowKey};
pub use mac::Mac;
pub use normalize::normalize;
pub use rule::Rule;
pub use tci::{InvalidPcp, InvalidVid, Pcp, Vid};
pub use wildcards::{FieldWc, Wildcards};
