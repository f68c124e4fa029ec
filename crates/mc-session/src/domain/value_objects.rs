//! # Domain Value Objects
//!
//! Immutable value types: generation keys, message ids, payload types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Size of a message id in bytes.
pub const MESSAGE_ID_SIZE: usize = 8;

/// Process-wide sequence for generation keys.
static GENERATION_SEQ: AtomicU64 = AtomicU64::new(0);

/// Key of one client generation under an address.
///
/// Ordered by creation second, then by a process-wide sequence, so two
/// generations created within the same second never share a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Generation {
    /// Unix seconds at creation.
    pub secs: u64,
    /// Monotonic tiebreaker.
    pub seq: u64,
}

impl Generation {
    /// Generation key for a client created now.
    #[must_use]
    pub fn now() -> Self {
        Self {
            secs: unix_now(),
            seq: GENERATION_SEQ.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Build a key from explicit parts.
    #[must_use]
    pub fn from_parts(secs: u64, seq: u64) -> Self {
        Self { secs, seq }
    }

    /// Seconds elapsed between creation and `now_secs`.
    #[must_use]
    pub fn age_secs(&self, now_secs: u64) -> u64 {
        now_secs.saturating_sub(self.secs)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.secs, self.seq)
    }
}

/// Current unix time in seconds.
#[must_use]
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// 8-byte message identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId([u8; MESSAGE_ID_SIZE]);

impl MessageId {
    /// Fresh random id.
    #[must_use]
    pub fn random() -> Self {
        Self(rand::random())
    }

    /// Id from raw bytes; `None` unless exactly eight bytes.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; MESSAGE_ID_SIZE]>::try_from(bytes).ok().map(Self)
    }

    /// Raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; MESSAGE_ID_SIZE] {
        &self.0
    }

    /// Raw bytes as a vector (wire form of events).
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl From<[u8; MESSAGE_ID_SIZE]> for MessageId {
    fn from(bytes: [u8; MESSAGE_ID_SIZE]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Payload type code.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    /// Raw bytes.
    #[default]
    Binary = 0,
    /// UTF-8 text.
    Text = 1,
    /// Acknowledgement.
    Ack = 2,
    /// Session traffic.
    Session = 3,
}

impl MessageType {
    /// Numeric wire code.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parse a wire code.
    #[must_use]
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Binary),
            1 => Some(Self::Text),
            2 => Some(Self::Ack),
            3 => Some(Self::Session),
            _ => None,
        }
    }
}
