//! # Domain Value Objects
//!
//! Immutable identifier types and pipeline constants.

use super::errors::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Codec version prefixed to every encoded structure.
pub const CODEC_VERSION: u16 = 0;

/// Warp precompile address on the destination chain.
///
/// Source-chain announcements are emitted from this address and relay
/// transactions target it.
pub const WARP_PRECOMPILE_ADDRESS: Address = [
    0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x05,
];

macro_rules! hex_id {
    ($name:ident, $len:expr, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// Raw bytes.
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), hex::encode(&self.0[..4]))
            }
        }
    };
}

hex_id!(
    MessageId,
    32,
    "Content-derived identifier of an unsigned warp message (SHA-256 of its bytes)."
);
hex_id!(NodeId, 20, "Validator node identity.");
hex_id!(BlockchainId, 32, "32-byte blockchain identifier.");

/// How a pipeline task ended when it did not fail.
///
/// Cancellation is a lifecycle exit, not an application error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskExit {
    /// Aggregator emitted every expected certified message.
    Completed,
    /// The upstream channel or event stream ended.
    InputClosed,
    /// The downstream consumer went away.
    OutputClosed,
    /// The shared shutdown signal fired.
    Cancelled,
}

impl TaskExit {
    /// Whether the task stopped because of the shutdown signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl fmt::Display for TaskExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Completed => "completed",
            Self::InputClosed => "input closed",
            Self::OutputClosed => "output closed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}
