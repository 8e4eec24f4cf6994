//! Typed identifiers for sessions, jobs, chains, wallets and pool tokens
//!
//! Sessions and jobs are plain counters wrapped in distinct types so that an
//! identity check (`session.id == captured_id`) cannot silently compare a
//! job counter against a session counter.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Define a zero-cost `u64` identifier with ordering and display
macro_rules! define_typed_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            Default,
            Serialize,
            Deserialize
        )]
        #[repr(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Create a new typed ID
            #[inline(always)]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Extract the inner value
            #[inline(always)]
            pub const fn inner(&self) -> u64 {
                self.0
            }

            /// The identifier that follows this one
            #[inline(always)]
            pub const fn next(&self) -> Self {
                Self(self.0 + 1)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }
    };
}

define_typed_id! {
    /// Identity of one wallet session; a new value for every (re)connection
    SessionId
}

define_typed_id! {
    /// Identity of one mutation job within a sequencer
    JobId
}

/// EVM chain identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub u64);

impl ChainId {
    /// Sepolia testnet, where the exchange is deployed
    pub const SEPOLIA: ChainId = ChainId(11_155_111);

    /// Hex form used by `wallet_switchEthereumChain` (`0xaa36a7` for Sepolia)
    pub fn to_hex(&self) -> String {
        format!("0x{:x}", self.0)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ChainId::SEPOLIA => write!(f, "Sepolia ({})", self.0),
            other => write!(f, "chain {}", other.0),
        }
    }
}

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Wallet providers a user can connect with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletKind {
    MetaMask,
    Coinbase,
    /// Signer backed by a locally held private key
    LocalKey,
}

impl WalletKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            WalletKind::MetaMask => "MetaMask",
            WalletKind::Coinbase => "Coinbase Wallet",
            WalletKind::LocalKey => "Local Key",
        }
    }
}

impl fmt::Display for WalletKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// One of the two tokens held by the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TokenId {
    A,
    B,
}

impl TokenId {
    pub fn symbol(&self) -> &'static str {
        match self {
            TokenId::A => "TKNA",
            TokenId::B => "TKNB",
        }
    }

    pub fn other(&self) -> TokenId {
        match self {
            TokenId::A => TokenId::B,
            TokenId::B => TokenId::A,
        }
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Direction of a single-sided swap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SwapDirection {
    #[default]
    AToB,
    BToA,
}

impl SwapDirection {
    pub fn token_in(&self) -> TokenId {
        match self {
            SwapDirection::AToB => TokenId::A,
            SwapDirection::BToA => TokenId::B,
        }
    }

    pub fn token_out(&self) -> TokenId {
        self.token_in().other()
    }

    pub fn reversed(&self) -> SwapDirection {
        match self {
            SwapDirection::AToB => SwapDirection::BToA,
            SwapDirection::BToA => SwapDirection::AToB,
        }
    }
}

impl fmt::Display for SwapDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.token_in(), self.token_out())
    }
}
