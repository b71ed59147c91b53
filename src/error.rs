//! Crate-level error aggregation.
//!
//! Every subsystem (crypto, TLV, storage, transport, HTTP parsing,
//! configuration) defines its own `thiserror` leaf error; [`HapError`]
//! collects them behind `#[from]` so callers outside this crate that just
//! want "did it work" don't have to match on each module's type.

use crate::accessory::ValueError;
use crate::config::ConfigError;
use crate::protocol::crypto::CryptoError;
use crate::protocol::http::ParseError;
use crate::protocol::pairing::storage::StorageError;
use crate::protocol::pairing::tlv::TlvError;
use crate::protocol::transport::TransportError;
#[cfg(feature = "tokio-runtime")]
use crate::server::ServerError;

#[derive(Debug, thiserror::Error)]
pub enum HapError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[cfg(feature = "tokio-runtime")]
    #[error("server error: {0}")]
    Server(#[from] ServerError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("TLV error: {0}")]
    Tlv(#[from] TlvError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("HTTP parse error: {0}")]
    Http(#[from] ParseError),

    #[error("characteristic value error: {0}")]
    Value(#[from] ValueError),

    #[cfg(feature = "discovery")]
    #[error("discovery error: {0}")]
    Discovery(#[from] crate::discovery::DiscoveryError),
}
