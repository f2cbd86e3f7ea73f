//! Conversion between kernel timer ticks and host durations.
//!
//! Every bridge timer crosses the kernel boundary as a tick count. Nothing
//! outside this module does tick arithmetic.

use crate::error::{BridgeError, Result};
use serde::Serializer;
use std::time::Duration;

/// Ticks per second the bridge ioctls report timers in (the kernel's USER_HZ).
pub const USER_HZ: u32 = 100;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Pluggable tick <-> duration converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickRate(u32);

impl TickRate {
    pub fn new(ticks_per_sec: u32) -> Result<Self> {
        if ticks_per_sec == 0 {
            return Err(BridgeError::Config {
                field: "tick_rate",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(Self(ticks_per_sec))
    }

    pub fn ticks_per_sec(self) -> u32 {
        self.0
    }

    pub fn to_duration(self, ticks: u32) -> Duration {
        let hz = u64::from(self.0);
        let ticks = u64::from(ticks);
        let secs = ticks / hz;
        let nanos = (ticks % hz) * 1_000_000_000 / hz;
        Duration::new(secs, nanos as u32)
    }

    /// Nearest tick count for `duration`, saturating at `u32::MAX`.
    pub fn to_ticks(self, duration: Duration) -> u32 {
        let hz = u128::from(self.0);
        let scaled = duration.as_nanos() * hz;
        let ticks = (scaled + NANOS_PER_SEC / 2) / NANOS_PER_SEC;
        u32::try_from(ticks).unwrap_or(u32::MAX)
    }
}

impl Default for TickRate {
    fn default() -> Self {
        Self(USER_HZ)
    }
}

/// Serialize a duration as fractional seconds.
pub fn serialize_secs<S: Serializer>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Parse an operator-supplied decimal-seconds value such as `15` or `2.5`.
pub fn parse_seconds(what: &'static str, value: &str) -> Result<Duration> {
    let invalid = || BridgeError::InvalidDuration {
        what,
        value: value.to_string(),
    };

    let secs: f64 = value.trim().parse().map_err(|_| invalid())?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(invalid());
    }
    Duration::try_from_secs_f64(secs).map_err(|_| invalid())
}
