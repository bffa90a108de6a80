//! Shim settings.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::focus::{DEFAULT_FALLBACK_WAIT, DEFAULT_FOCUS_TIMEOUT};

/// Tunables for a [`Shim`](crate::Shim).
///
/// Durations travel as whole milliseconds, so a config can be handed over
/// from script as `{ "focusFallbackWaitMs": 250 }`. Missing fields take
/// their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShimConfig {
    /// How long a fallback waits when the top-level window cannot be
    /// inspected for focus.
    #[serde(rename = "focusFallbackWaitMs", with = "millis")]
    pub focus_fallback_wait: Duration,

    /// The longest a fallback waits for the top-level window to gain focus.
    #[serde(rename = "focusTimeoutMs", with = "millis")]
    pub focus_timeout: Duration,
}

impl Default for ShimConfig {
    fn default() -> Self {
        Self {
            focus_fallback_wait: DEFAULT_FALLBACK_WAIT,
            focus_timeout: DEFAULT_FOCUS_TIMEOUT,
        }
    }
}

mod millis {
    use super::*;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
