//! Server-side Pair-Verify (M1-M4): ephemeral Curve25519 DH plus Ed25519
//! proof against a stored pairing, yielding the per-session read/write
//! AEAD keys (§4.3). Run once per session before any encrypted traffic,
//! and again (a "re-verify") to rekey an already-`Established` session.

use super::storage::{AccessoryIdentity, IdentityStore, Pairing};
use super::tlv::{errors, TlvDecoder, TlvEncoder, TlvType};
use crate::protocol::crypto::{
    ChaCha20Poly1305Cipher, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature, HkdfSha512, Nonce,
    X25519KeyPair, X25519PublicKey,
};

fn pv_nonce(tag: &[u8; 8]) -> Nonce {
    let mut bytes = [0u8; 12];
    bytes[4..].copy_from_slice(tag);
    Nonce::from_bytes(&bytes).expect("fixed 12-byte nonce")
}

/// The two session keys Pair-Verify produces on success (§4.3, §3 Session).
#[derive(Clone)]
pub struct ControlKeys {
    /// Used by the accessory to decrypt bytes coming from this controller.
    pub read_key: [u8; 32],
    /// Used by the accessory to encrypt bytes sent to this controller.
    pub write_key: [u8; 32],
}

/// Outcome of feeding one TLV message into [`PairVerify::step`].
pub enum PairVerifyStep {
    /// Handshake continues; send these bytes and await the next message.
    Continue(Vec<u8>),
    /// Handshake failed; send this TLV (`State=4, Error=...`). The session
    /// MUST NOT transition to `Established` (§8 S4).
    Failed(Vec<u8>),
    /// Handshake succeeded; send M4, then flip the session to `Established`
    /// with these control keys.
    Complete(Vec<u8>, Pairing, ControlKeys),
}

enum State {
    AwaitingM1,
    AwaitingM3 {
        shared_secret: [u8; 32],
        session_key: [u8; 32],
        accessory_pub: [u8; 32],
        device_curve_pub: [u8; 32],
    },
    Done,
}

/// Per-session Pair-Verify state machine. A new instance replaces any prior
/// one on the same session (re-verify restarts cleanly, §4.3).
pub struct PairVerify {
    state: State,
}

impl PairVerify {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: State::AwaitingM1,
        }
    }

    /// Feed one inbound TLV message and advance the state machine.
    pub fn step(
        &mut self,
        data: &[u8],
        identity: &AccessoryIdentity,
        store: &dyn IdentityStore,
    ) -> PairVerifyStep {
        let tlv = match TlvDecoder::decode(data) {
            Ok(t) => t,
            Err(_) => return PairVerifyStep::Failed(error_tlv(1, errors::UNKNOWN)),
        };

        if let Some(code) = tlv.get_error() {
            return PairVerifyStep::Failed(error_tlv(tlv.get_state().unwrap_or(1), code));
        }

        let state = match tlv.get_state() {
            Ok(s) => s,
            Err(_) => return PairVerifyStep::Failed(error_tlv(1, errors::UNKNOWN)),
        };

        match (state, std::mem::replace(&mut self.state, State::Done)) {
            (1, State::AwaitingM1) => self.handle_m1(&tlv, identity),
            (3, State::AwaitingM3 { shared_secret, session_key, accessory_pub, device_curve_pub }) => {
                self.handle_m3(&tlv, &shared_secret, &session_key, &accessory_pub, &device_curve_pub, store)
            }
            (_, _) => PairVerifyStep::Failed(error_tlv(state, errors::UNKNOWN)),
        }
    }

    fn handle_m1(&mut self, tlv: &TlvDecoder, identity: &AccessoryIdentity) -> PairVerifyStep {
        let Ok(device_curve_pub_bytes) = tlv.get_required(TlvType::PublicKey) else {
            return PairVerifyStep::Failed(error_tlv(2, errors::UNKNOWN));
        };
        let Ok(device_curve_pub) = X25519PublicKey::from_bytes(device_curve_pub_bytes) else {
            return PairVerifyStep::Failed(error_tlv(2, errors::UNKNOWN));
        };

        let ephemeral = X25519KeyPair::generate();
        let accessory_pub = *ephemeral.public_key().as_bytes();
        let shared = ephemeral.diffie_hellman(&device_curve_pub);
        let shared_secret = *shared.as_bytes();

        let session_key = HkdfSha512::new(Some(b"Pair-Verify-Encrypt-Salt"), &shared_secret)
            .expand_fixed::<32>(b"Pair-Verify-Encrypt-Info")
            .expect("32-byte expand never fails");

        let mut accessory_info =
            Vec::with_capacity(accessory_pub.len() + identity.accessory_id.len() + device_curve_pub_bytes.len());
        accessory_info.extend_from_slice(&accessory_pub);
        accessory_info.extend_from_slice(identity.accessory_id.as_bytes());
        accessory_info.extend_from_slice(device_curve_pub_bytes);

        let signing = Ed25519KeyPair::from_bytes(&identity.secret_key).expect("stored identity key is valid");
        let signature = signing.sign(&accessory_info);

        let inner = TlvEncoder::new()
            .add(TlvType::Identifier, identity.accessory_id.as_bytes())
            .add(TlvType::Signature, &signature.to_bytes())
            .build();

        let Ok(cipher) = ChaCha20Poly1305Cipher::new(&session_key) else {
            return PairVerifyStep::Failed(error_tlv(2, errors::UNKNOWN));
        };
        let Ok(encrypted) = cipher.encrypt(&pv_nonce(b"PV-Msg02"), &inner) else {
            return PairVerifyStep::Failed(error_tlv(2, errors::UNKNOWN));
        };

        let reply = TlvEncoder::new()
            .add_state(2)
            .add(TlvType::PublicKey, &accessory_pub)
            .add(TlvType::EncryptedData, &encrypted)
            .build();

        let mut device_curve_pub_arr = [0u8; 32];
        device_curve_pub_arr.copy_from_slice(device_curve_pub_bytes);

        self.state = State::AwaitingM3 {
            shared_secret,
            session_key,
            accessory_pub,
            device_curve_pub: device_curve_pub_arr,
        };
        PairVerifyStep::Continue(reply)
    }

    fn handle_m3(
        &mut self,
        tlv: &TlvDecoder,
        shared_secret: &[u8; 32],
        session_key: &[u8; 32],
        accessory_pub: &[u8; 32],
        device_curve_pub: &[u8; 32],
        store: &dyn IdentityStore,
    ) -> PairVerifyStep {
        let Ok(encrypted) = tlv.get_required(TlvType::EncryptedData) else {
            return PairVerifyStep::Failed(error_tlv(4, errors::UNKNOWN));
        };
        let Ok(cipher) = ChaCha20Poly1305Cipher::new(session_key) else {
            return PairVerifyStep::Failed(error_tlv(4, errors::UNKNOWN));
        };
        let Ok(inner_bytes) = cipher.decrypt(&pv_nonce(b"PV-Msg03"), encrypted) else {
            return PairVerifyStep::Failed(error_tlv(4, errors::AUTHENTICATION));
        };
        let Ok(inner) = TlvDecoder::decode(&inner_bytes) else {
            return PairVerifyStep::Failed(error_tlv(4, errors::UNKNOWN));
        };

        let (Ok(device_id), Ok(device_sig)) =
            (inner.get_required(TlvType::Identifier), inner.get_required(TlvType::Signature))
        else {
            return PairVerifyStep::Failed(error_tlv(4, errors::UNKNOWN));
        };

        let Ok(device_id_str) = std::str::from_utf8(device_id) else {
            return PairVerifyStep::Failed(error_tlv(4, errors::UNKNOWN));
        };
        let Some(pairing) = store.find_pairing(device_id_str) else {
            return PairVerifyStep::Failed(error_tlv(4, errors::AUTHENTICATION));
        };

        let mut signed = Vec::with_capacity(device_curve_pub.len() + device_id.len() + accessory_pub.len());
        signed.extend_from_slice(device_curve_pub);
        signed.extend_from_slice(device_id);
        signed.extend_from_slice(accessory_pub);

        let verify_result = Ed25519PublicKey::from_bytes(&pairing.device_public_key)
            .and_then(|pk| Ed25519Signature::from_bytes(device_sig).and_then(|sig| pk.verify(&signed, &sig)));
        if verify_result.is_err() {
            return PairVerifyStep::Failed(error_tlv(4, errors::AUTHENTICATION));
        }

        let read_key = HkdfSha512::new(Some(b"Control-Salt"), shared_secret)
            .expand_fixed::<32>(b"Control-Write-Encryption-Key")
            .expect("32-byte expand never fails");
        let write_key = HkdfSha512::new(Some(b"Control-Salt"), shared_secret)
            .expand_fixed::<32>(b"Control-Read-Encryption-Key")
            .expect("32-byte expand never fails");

        let reply = TlvEncoder::new().add_state(4).build();

        PairVerifyStep::Complete(reply, pairing, ControlKeys { read_key, write_key })
    }
}

impl Default for PairVerify {
    fn default() -> Self {
        Self::new()
    }
}

fn error_tlv(state: u8, code: u8) -> Vec<u8> {
    TlvEncoder::new().add_state(state).add_byte(TlvType::Error, code).build()
}
