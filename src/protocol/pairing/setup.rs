//! Server-side Pair-Setup (M1-M6): the SRP exchange establishing a shared
//! secret, followed by mutual Ed25519 attestation that yields a new admin
//! pairing record.
//!
//! A [`PairSetup`] instance IS the process-wide pairing context. The caller
//! (the request dispatcher) is responsible for holding at most one at a
//! time — refusing a fresh `M1` with `Busy` while one is in flight, and with
//! `Unavailable` once an admin pairing already exists (§3, §4.2).

use super::storage::{AccessoryIdentity, IdentityStore, Pairing, Permissions};
use super::tlv::{self, TlvDecoder, TlvEncoder, TlvType, errors, methods};
use crate::protocol::crypto::{ChaCha20Poly1305Cipher, Ed25519KeyPair, HkdfSha512, Nonce, SrpParams, SrpServer};

/// A fixed 10-character `DDD-DD-DDD` setup code.
#[derive(Debug, Clone)]
pub struct SetupCode(String);

impl SetupCode {
    /// # Errors
    /// Returns an error if `code` is not exactly `DDD-DD-DDD`.
    pub fn parse(code: &str) -> Result<Self, SetupCodeError> {
        let bytes = code.as_bytes();
        let valid = bytes.len() == 10
            && bytes[3] == b'-'
            && bytes[6] == b'-'
            && bytes.iter().enumerate().all(|(i, b)| {
                if i == 3 || i == 6 { true } else { b.is_ascii_digit() }
            });
        if !valid {
            return Err(SetupCodeError::InvalidFormat);
        }
        Ok(Self(code.to_string()))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SetupCodeError {
    #[error("setup code must match DDD-DD-DDD")]
    InvalidFormat,
}

fn ps_nonce(tag: &[u8; 8]) -> Nonce {
    let mut bytes = [0u8; 12];
    bytes[4..].copy_from_slice(tag);
    Nonce::from_bytes(&bytes).expect("fixed 12-byte nonce")
}

/// Outcome of feeding one TLV message into [`PairSetup::step`].
pub enum PairSetupStep {
    /// Handshake continues; send these bytes and await the next message.
    Continue(Vec<u8>),
    /// Handshake failed; send these bytes (an error TLV) and drop this context.
    Failed(Vec<u8>),
    /// Handshake succeeded; send these bytes (M6), then drop this context.
    /// The new pairing has already been persisted.
    Complete(Vec<u8>, Pairing),
}

enum State {
    AwaitingM1,
    AwaitingM3 { srp: SrpServer, salt: Vec<u8> },
    AwaitingM5 { session_key: Vec<u8> },
    Done,
}

pub struct PairSetup {
    state: State,
}

impl PairSetup {
    #[must_use]
    pub fn new() -> Self {
        Self { state: State::AwaitingM1 }
    }

    /// Pre-initialize the SRP server ahead of the first `M1`, so the round
    /// trip doesn't pay for SRP verifier derivation + `modpow` on the
    /// client's critical path (§4.2 performance note).
    #[must_use]
    pub fn pre_initialized(setup_code: &SetupCode, salt: [u8; 16]) -> Self {
        let params = SrpParams::RFC5054_3072;
        let verifier = SrpServer::compute_verifier(b"Pair-Setup", setup_code.as_bytes(), &salt, &params);
        let srp = SrpServer::new(&verifier, &params);
        Self {
            state: State::AwaitingM3 { srp, salt: salt.to_vec() },
        }
    }

    /// Feed one inbound TLV message and advance the state machine.
    pub fn step(
        &mut self,
        data: &[u8],
        setup_code: &SetupCode,
        identity: &AccessoryIdentity,
        store: &mut dyn IdentityStore,
    ) -> PairSetupStep {
        let tlv = match TlvDecoder::decode(data) {
            Ok(t) => t,
            Err(_) => return PairSetupStep::Failed(error_tlv(1, errors::UNKNOWN)),
        };

        if let Some(code) = tlv.get_error() {
            return PairSetupStep::Failed(error_tlv(tlv.get_state().unwrap_or(1), code));
        }

        let state = match tlv.get_state() {
            Ok(s) => s,
            Err(_) => return PairSetupStep::Failed(error_tlv(1, errors::UNKNOWN)),
        };

        match (state, std::mem::replace(&mut self.state, State::Done)) {
            (1, State::AwaitingM1) => self.handle_m1(setup_code),
            (3, State::AwaitingM3 { srp, salt }) => self.handle_m3(&tlv, srp, salt),
            (5, State::AwaitingM5 { session_key }) => self.handle_m5(&tlv, &session_key, identity, store),
            (_, _) => PairSetupStep::Failed(error_tlv(state, errors::UNKNOWN)),
        }
    }

    fn handle_m1(&mut self, setup_code: &SetupCode) -> PairSetupStep {
        let params = SrpParams::RFC5054_3072;
        let salt: [u8; 16] = rand::random();
        let verifier = SrpServer::compute_verifier(b"Pair-Setup", setup_code.as_bytes(), &salt, &params);
        let srp = SrpServer::new(&verifier, &params);

        let reply = TlvEncoder::new()
            .add_state(2)
            .add(TlvType::Salt, &salt)
            .add(TlvType::PublicKey, srp.public_key())
            .build();

        self.state = State::AwaitingM3 { srp, salt: salt.to_vec() };
        PairSetupStep::Continue(reply)
    }

    fn handle_m3(&mut self, tlv: &TlvDecoder, srp: SrpServer, salt: Vec<u8>) -> PairSetupStep {
        let Ok(client_public) = tlv.get_required(TlvType::PublicKey) else {
            return PairSetupStep::Failed(error_tlv(4, errors::UNKNOWN));
        };
        let Ok(client_proof) = tlv.get_required(TlvType::Proof) else {
            return PairSetupStep::Failed(error_tlv(4, errors::UNKNOWN));
        };

        match srp.verify_client(b"Pair-Setup", &salt, client_public, client_proof) {
            Ok((session_key, server_proof)) => {
                let reply = TlvEncoder::new().add_state(4).add(TlvType::Proof, &server_proof).build();
                self.state = State::AwaitingM5 { session_key: session_key.as_bytes().to_vec() };
                PairSetupStep::Continue(reply)
            }
            Err(_) => PairSetupStep::Failed(error_tlv(4, errors::AUTHENTICATION)),
        }
    }

    fn handle_m5(
        &mut self,
        tlv: &TlvDecoder,
        session_key: &[u8],
        identity: &AccessoryIdentity,
        store: &mut dyn IdentityStore,
    ) -> PairSetupStep {
        let Ok(encrypted) = tlv.get_required(TlvType::EncryptedData) else {
            return PairSetupStep::Failed(error_tlv(6, errors::UNKNOWN));
        };

        let encrypt_key = HkdfSha512::new(Some(b"Pair-Setup-Encrypt-Salt"), session_key)
            .expand_fixed::<32>(b"Pair-Setup-Encrypt-Info")
            .expect("32-byte expand never fails");
        let Ok(cipher) = ChaCha20Poly1305Cipher::new(&encrypt_key) else {
            return PairSetupStep::Failed(error_tlv(6, errors::UNKNOWN));
        };

        let Ok(inner_bytes) = cipher.decrypt(&ps_nonce(b"PS-Msg05"), encrypted) else {
            return PairSetupStep::Failed(error_tlv(6, errors::AUTHENTICATION));
        };
        let Ok(inner) = TlvDecoder::decode(&inner_bytes) else {
            return PairSetupStep::Failed(error_tlv(6, errors::UNKNOWN));
        };

        let (Ok(device_id), Ok(device_ltpk), Ok(device_sig)) = (
            inner.get_required(TlvType::Identifier),
            inner.get_required(TlvType::PublicKey),
            inner.get_required(TlvType::Signature),
        ) else {
            return PairSetupStep::Failed(error_tlv(6, errors::UNKNOWN));
        };

        let device_x = HkdfSha512::new(Some(b"Pair-Setup-Controller-Sign-Salt"), session_key)
            .expand(b"Pair-Setup-Controller-Sign-Info", 32)
            .expect("32-byte expand never fails");

        let mut device_info = Vec::with_capacity(device_x.len() + device_id.len() + device_ltpk.len());
        device_info.extend_from_slice(&device_x);
        device_info.extend_from_slice(device_id);
        device_info.extend_from_slice(device_ltpk);

        let verify_result = crate::protocol::crypto::Ed25519PublicKey::from_bytes(device_ltpk).and_then(|pk| {
            crate::protocol::crypto::Ed25519Signature::from_bytes(device_sig)
                .and_then(|sig| pk.verify(&device_info, &sig))
        });
        if verify_result.is_err() {
            return PairSetupStep::Failed(error_tlv(6, errors::AUTHENTICATION));
        }

        let device_id_str = match String::from_utf8(device_id.to_vec()) {
            Ok(s) => s,
            Err(_) => return PairSetupStep::Failed(error_tlv(6, errors::UNKNOWN)),
        };
        let mut device_public_key = [0u8; 32];
        device_public_key.copy_from_slice(device_ltpk);

        if store.find_pairing(&device_id_str).is_some() {
            return PairSetupStep::Failed(error_tlv(6, errors::UNKNOWN));
        }

        let pairing = Pairing {
            device_id: device_id_str,
            device_public_key,
            permissions: Permissions::ADMIN,
        };

        if store.add_pairing(pairing.clone()).is_err() {
            return PairSetupStep::Failed(error_tlv(6, errors::MAX_PEERS));
        }

        let accessory_x = HkdfSha512::new(Some(b"Pair-Setup-Accessory-Sign-Salt"), session_key)
            .expand(b"Pair-Setup-Accessory-Sign-Info", 32)
            .expect("32-byte expand never fails");

        let mut accessory_info = Vec::with_capacity(accessory_x.len() + identity.accessory_id.len() + 32);
        accessory_info.extend_from_slice(&accessory_x);
        accessory_info.extend_from_slice(identity.accessory_id.as_bytes());
        accessory_info.extend_from_slice(&identity.public_key);

        let signing = Ed25519KeyPair::from_bytes(&identity.secret_key).expect("stored identity key is valid");
        let signature = signing.sign(&accessory_info);

        let reply_inner = TlvEncoder::new()
            .add(TlvType::Identifier, identity.accessory_id.as_bytes())
            .add(TlvType::PublicKey, &identity.public_key)
            .add(TlvType::Signature, &signature.to_bytes())
            .build();

        let reply_encrypted = match cipher.encrypt(&ps_nonce(b"PS-Msg06"), &reply_inner) {
            Ok(bytes) => bytes,
            Err(_) => return PairSetupStep::Failed(error_tlv(6, errors::UNKNOWN)),
        };

        let reply = TlvEncoder::new().add_state(6).add(TlvType::EncryptedData, &reply_encrypted).build();

        PairSetupStep::Complete(reply, pairing)
    }
}

impl Default for PairSetup {
    fn default() -> Self {
        Self::new()
    }
}

fn error_tlv(state: u8, code: u8) -> Vec<u8> {
    TlvEncoder::new().add_state(state).add_byte(TlvType::Error, code).build()
}

/// Builds the `Unavailable`/`Busy` refusal a dispatcher sends for an `M1`
/// it never hands to a [`PairSetup`] instance at all (§4.2).
#[must_use]
pub fn refusal(code: u8) -> Vec<u8> {
    error_tlv(2, code)
}

pub use methods::PAIR_SETUP;
pub use tlv::errors as error_codes;
