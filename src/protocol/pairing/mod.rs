//! `HomeKit` Accessory Protocol pairing: Pair-Setup (C4), Pair-Verify (C5),
//! the TLV8 codec they speak (C2), and the persistent identity/pairing
//! store (C3) they both read and write.

pub mod setup;
pub mod storage;
pub mod tlv;
pub mod verify;


pub use setup::{PairSetup, PairSetupStep, SetupCode, SetupCodeError};
pub use storage::{AccessoryIdentity, IdentityStore, Pairing, Permissions};
pub use tlv::{TlvDecoder, TlvEncoder, TlvError, TlvType};
pub use verify::{ControlKeys, PairVerify, PairVerifyStep};

/// Pairing-protocol errors not already carried by a leaf error type.
#[derive(Debug, thiserror::Error)]
pub enum PairingError {
    #[error("invalid TLV: {0}")]
    InvalidTlv(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] crate::protocol::crypto::CryptoError),

    #[error("storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("TLV error: {0}")]
    Tlv(#[from] tlv::TlvError),
}
