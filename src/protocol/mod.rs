//! Wire protocol: cryptography, TLV pairing, framed transport and HTTP.

pub mod crypto;
pub mod http;
pub mod pairing;
pub mod transport;
