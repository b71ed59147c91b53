//! # hap-server
//!
//! A pure Rust implementation of the `HomeKit` Accessory Protocol (HAP)
//! server: SRP-6a Pair-Setup, Curve25519/Ed25519 Pair-Verify, the
//! ChaCha20-Poly1305 framed transport, the accessory/service/characteristic
//! data model, and the `/accessories` `/characteristics` `/pairings`
//! request dispatcher.
//!
//! ## Features
//!
//! - SRP-6a Pair-Setup and Curve25519 Pair-Verify, byte-exact with HAP R2
//! - Encrypted, framed transport over ChaCha20-Poly1305
//! - An in-memory accessory tree with typed, permissioned characteristics
//! - Event coalescing and fan-out to subscribed sessions
//! - Optional `_hap._tcp` mDNS advertisement (`discovery` feature)
//!
//! ## Example
//!
//! ```rust,no_run
//! use hap_server::accessory::{AccessoryBuilder, accessory_information};
//! use hap_server::config::ServerConfig;
//! use hap_server::protocol::pairing::storage::MemoryStore;
//!
//! # fn build() -> Result<(), hap_server::HapError> {
//! let config = ServerConfig::builder("Lamp", "123-45-678").build()?;
//! let accessory = AccessoryBuilder::new(1, config.category)
//!     .service(accessory_information("Lamp", "Acme", "Lamp1,1", "0001", "1.0"))
//!     .build();
//! let _ = (accessory, MemoryStore::new());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// The accessory/service/characteristic object model.
pub mod accessory;
/// Server configuration and its builder.
pub mod config;
/// Optional `_hap._tcp` mDNS advertisement.
#[cfg(feature = "discovery")]
pub mod discovery;
/// Error types.
pub mod error;
/// Wire protocol: cryptography, TLV pairing, framed transport and HTTP.
pub mod protocol;
/// The request dispatcher and connection-handling server loop.
#[cfg(feature = "tokio-runtime")]
pub mod server;

pub use error::HapError;
