// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Token-bucket limiting for malformed-message log lines.
//!
//! Parse errors always indicate a bug (or hostility) in the peer, so
//! there is no point emitting a lot of them; the shared limiter bounds
//! the logging cost a misbehaving peer can impose.

use std::sync::Mutex;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// A token bucket: `rate` tokens per second, capped at `burst`.
#[derive(Debug)]
pub struct RateLimiter {
    rate: u32,
    burst: u32,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: u32,
    last_fill: Option<Instant>,
}

impl RateLimiter {
    /// A limiter allowing `rate` events per second with a burst of `burst`.
    #[must_use]
    pub const fn new(rate: u32, burst: u32) -> RateLimiter {
        RateLimiter {
            rate,
            burst,
            state: Mutex::new(BucketState { tokens: 0, last_fill: None }),
        }
    }

    /// Take a token if one is available.  Returns true when the caller
    /// may log.
    pub fn admit(&self) -> bool {
        let Ok(mut st) = self.state.lock() else {
            // A poisoned lock only means another logger panicked; do not
            // let that suppress diagnostics.
            return true;
        };
        let now = Instant::now();
        match st.last_fill {
            None => {
                st.tokens = self.burst;
                st.last_fill = Some(now);
            }
            Some(last) => {
                let elapsed = now.duration_since(last);
                if elapsed >= Duration::from_secs(1) {
                    #[allow(clippy::cast_possible_truncation)] // saturates at burst
                    let refill = (elapsed.as_secs().min(u64::from(self.burst)) as u32)
                        .saturating_mul(self.rate);
                    st.tokens = st.tokens.saturating_add(refill).min(self.burst);
                    st.last_fill = Some(now);
                }
            }
        }
        if st.tokens > 0 {
            st.tokens -= 1;
            true
        } else {
            false
        }
    }
}

static BAD_OFMSG: OnceLock<RateLimiter> = OnceLock::new();

/// The shared limiter for OpenFlow message parse errors: one line per
/// second, burst of five.
pub fn bad_ofmsg() -> &'static RateLimiter {
    BAD_OFMSG.get_or_init(|| RateLimiter::new(1, 5))
}

/// `warn!` through the shared malformed-message limiter.
macro_rules! warn_rl {
    ($($arg:tt)*) => {
        if $crate::ratelimit::bad_ofmsg().admit() {
            tracing::warn!($($arg)*);
        }
    };
}
pub(crate) use warn_rl;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn burst_then_deny() {
        let rl = RateLimiter::new(1, 3);
        assert!(rl.admit());
        assert!(rl.admit());
        assert!(rl.admit());
        // Burst exhausted; within the same second nothing refills.
        assert!(!rl.admit());
        assert!(!rl.admit());
    }
}
