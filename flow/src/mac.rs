// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Mac address type and logic.

use arrayvec::ArrayVec;
use std::fmt::Display;

/// A [MAC Address] type.
///
/// `Mac` is a transparent wrapper around `[u8; 6]`.  It is used both for
/// address values and for the bit-level address masks that flow rules
/// carry, so unlike a forwarding-plane MAC there is no "valid
/// source/destination" notion here: any bit pattern is meaningful.
///
/// [MAC Address]: https://en.wikipedia.org/wiki/MAC_address
#[repr(transparent)]
#[cfg_attr(any(test, feature = "arbitrary"), derive(bolero::TypeGenerator))]
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct Mac(pub [u8; 6]);

impl From<[u8; 6]> for Mac {
    fn from(value: [u8; 6]) -> Self {
        Mac(value)
    }
}

impl From<Mac> for [u8; 6] {
    fn from(value: Mac) -> Self {
        value.0
    }
}

impl AsRef<[u8; 6]> for Mac {
    fn as_ref(&self) -> &[u8; 6] {
        &self.0
    }
}

/// Errors which can occur while converting a string to a [`Mac`]
#[derive(Debug, thiserror::Error)]
pub enum MacFromStringError {
    /// Invalid string representation of mac address
    #[error("invalid string representation of mac address: {0}")]
    Invalid(String),
}

impl TryFrom<&str> for Mac {
    type Error = MacFromStringError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        const MAX_OCTETS: usize = 6;
        let mut octets_strs = value.split(':');
        let octets_parsed =
            octets_strs.try_fold(ArrayVec::<_, MAX_OCTETS>::new(), |mut acc, octet_str| {
                if octet_str.len() != 2 || octet_str.chars().any(|c| !c.is_ascii_hexdigit()) {
                    return Err(MacFromStringError::Invalid(value.to_string()));
                }
                let parsed = u8::from_str_radix(octet_str, 16)
                    .map_err(|_| MacFromStringError::Invalid(value.to_string()))?;
                acc.try_push(parsed)
                    .map_err(|_| MacFromStringError::Invalid(value.to_string()))?;
                Ok(acc)
            })?;

        let octets = match octets_parsed.as_slice() {
            [o0, o1, o2, o3, o4, o5] => [*o0, *o1, *o2, *o3, *o4, *o5],
            _ => return Err(MacFromStringError::Invalid(value.to_string())),
        };

        Ok(Mac(octets))
    }
}

impl Mac {
    /// The broadcast `Mac` (also the fully-exact address mask).
    pub const BROADCAST: Mac = Mac([u8::MAX; 6]);
    /// The zero `Mac` (also the fully-wildcarded address mask).
    pub const ZERO: Mac = Mac([0; 6]);

    /// Returns true iff the binary representation of the [`Mac`] is exclusively ones.
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        self == &Mac::BROADCAST
    }

    /// Returns true iff the least significant bit of the first octet of the [`Mac`] is one.
    #[must_use]
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 == 0x01
    }

    /// Returns true iff the binary representation of the [`Mac`] is exclusively zeros.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self == &Mac::ZERO
    }

    /// As an address mask: true iff every address bit must match exactly.
    #[must_use]
    pub fn is_exact(&self) -> bool {
        self.is_broadcast()
    }

    /// Bitwise-and of two addresses (value & mask).
    #[must_use]
    pub fn and(&self, other: Mac) -> Mac {
        let mut out = [0u8; 6];
        for (o, (a, b)) in out.iter_mut().zip(self.0.iter().zip(other.0.iter())) {
            *o = a & b;
        }
        Mac(out)
    }

    /// Bitwise complement, used when a wire format stores masks inverted
    /// (1-bit = ignore).
    #[must_use]
    pub fn not(&self) -> Mac {
        let mut out = self.0;
        for b in &mut out {
            *b = !*b;
        }
        Mac(out)
    }
}

impl Display for Mac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_back() {
        let mac = Mac([0xde, 0xad, 0xbe, 0xef, 0x00, 0x42]);
        let parsed = Mac::try_from(mac.to_string().as_str()).unwrap();
        assert_eq!(mac, parsed);
    }

    #[test]
    fn reject_malformed() {
        assert!(Mac::try_from("de:ad:be:ef:00").is_err());
        assert!(Mac::try_from("de:ad:be:ef:00:42:17").is_err());
        assert!(Mac::try_from("de:ad:be:ef:zz:42").is_err());
        assert!(Mac::try_from("dead:beef:0042").is_err());
    }

    #[test]
    fn mask_predicates() {
        assert!(Mac::BROADCAST.is_exact());
        assert!(Mac::ZERO.is_zero());
        assert!(!Mac([0xff, 0xff, 0xff, 0xff, 0xff, 0]).is_exact());
        assert_eq!(Mac::BROADCAST.not(), Mac::ZERO);
        let v = Mac([0xaa; 6]);
        assert_eq!(v.and(Mac::BROADCAST), v);
        assert_eq!(v.and(Mac::ZERO), Mac::ZERO);
    }
}
