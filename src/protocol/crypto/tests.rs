use super::*;
use rand::RngCore;

// --- chacha.rs tests ---

#[test]
fn test_chacha_encrypt_decrypt() {
    let key = [0x42u8; 32];
    let cipher = ChaCha20Poly1305Cipher::new(&key).unwrap();

    let nonce = Nonce::from_counter(1);
    let plaintext = b"Hello, HAP!";

    let ciphertext = cipher.encrypt(&nonce, plaintext).unwrap();
    let decrypted = cipher.decrypt(&nonce, &ciphertext).unwrap();

    assert_eq!(decrypted, plaintext);
}

#[test]
fn test_chacha_ciphertext_is_larger() {
    let key = [0x42u8; 32];
    let cipher = ChaCha20Poly1305Cipher::new(&key).unwrap();

    let nonce = Nonce::from_counter(0);
    let plaintext = b"test";

    let ciphertext = cipher.encrypt(&nonce, plaintext).unwrap();

    // Ciphertext should be plaintext + 16 byte tag
    assert_eq!(ciphertext.len(), plaintext.len() + 16);
}

#[test]
fn test_chacha_decrypt_wrong_nonce_fails() {
    let key = [0x42u8; 32];
    let cipher = ChaCha20Poly1305Cipher::new(&key).unwrap();

    let nonce1 = Nonce::from_counter(1);
    let nonce2 = Nonce::from_counter(2);

    let ciphertext = cipher.encrypt(&nonce1, b"secret").unwrap();
    let result = cipher.decrypt(&nonce2, &ciphertext);

    assert!(matches!(result, Err(CryptoError::DecryptionFailed(_))));
}

#[test]
fn test_chacha_encrypt_with_aad() {
    let key = [0x42u8; 32];
    let cipher = ChaCha20Poly1305Cipher::new(&key).unwrap();

    let nonce = Nonce::from_counter(1);
    let aad = b"header";
    let plaintext = b"body";

    let ciphertext = cipher.encrypt_with_aad(&nonce, aad, plaintext).unwrap();
    let decrypted = cipher.decrypt_with_aad(&nonce, aad, &ciphertext).unwrap();

    assert_eq!(decrypted, plaintext);
}

#[test]
fn test_chacha_decrypt_wrong_aad_fails() {
    let key = [0x42u8; 32];
    let cipher = ChaCha20Poly1305Cipher::new(&key).unwrap();

    let nonce = Nonce::from_counter(1);
    let ciphertext = cipher.encrypt_with_aad(&nonce, b"aad1", b"data").unwrap();

    let result = cipher.decrypt_with_aad(&nonce, b"aad2", &ciphertext);

    assert!(matches!(result, Err(CryptoError::DecryptionFailed(_))));
}

// --- ed25519.rs tests ---

#[test]
fn test_ed25519_keypair_generation() {
    let kp = Ed25519KeyPair::generate();
    let pk = kp.public_key();

    assert_eq!(pk.as_bytes().len(), 32);
}

#[test]
fn test_ed25519_keypair_from_bytes() {
    let kp1 = Ed25519KeyPair::generate();
    let secret = kp1.secret_bytes();

    let kp2 = Ed25519KeyPair::from_bytes(&secret).unwrap();

    assert_eq!(kp1.public_key().as_bytes(), kp2.public_key().as_bytes());
}

#[test]
fn test_ed25519_sign_verify() {
    let kp = Ed25519KeyPair::generate();
    let message = b"test message";

    let signature = kp.sign(message);
    kp.public_key().verify(message, &signature).unwrap();
}

#[test]
fn test_ed25519_verify_wrong_message() {
    let kp = Ed25519KeyPair::generate();

    let signature = kp.sign(b"original message");
    let result = kp.public_key().verify(b"different message", &signature);

    assert!(matches!(result, Err(CryptoError::InvalidSignature)));
}

#[test]
fn test_ed25519_signature_roundtrip() {
    let kp = Ed25519KeyPair::generate();
    let signature = kp.sign(b"message");

    let bytes = signature.to_bytes();
    let recovered = Ed25519Signature::from_bytes(&bytes).unwrap();

    kp.public_key().verify(b"message", &recovered).unwrap();
}

// --- hkdf.rs tests ---

#[test]
fn test_hkdf_derive() {
    let ikm = b"input key material";
    let salt = b"salt";
    let info = b"info";

    let key = derive_key(Some(salt), ikm, info, 32).unwrap();

    assert_eq!(key.len(), 32);
}

#[test]
fn test_hkdf_deterministic() {
    let ikm = b"test";

    let key1 = derive_key(None, ikm, b"info", 32).unwrap();
    let key2 = derive_key(None, ikm, b"info", 32).unwrap();

    assert_eq!(key1, key2);
}

#[test]
fn test_hkdf_different_info() {
    let ikm = b"test";

    let key1 = derive_key(None, ikm, b"info1", 32).unwrap();
    let key2 = derive_key(None, ikm, b"info2", 32).unwrap();

    assert_ne!(key1, key2);
}

// --- srp.rs tests ---
//
// The real `srp` crate is used as an independent oracle: it registers a
// verifier and runs the server side while our hand-rolled SrpClient runs the
// controller side (and vice versa), so a bug in either the group constants or
// the M1/M2 hashing shows up as a cross-implementation mismatch rather than
// a self-consistent pair of bugs.

#[test]
fn test_srp_client_creation() {
    let client = SrpClient::new(&SrpParams::RFC5054_3072).unwrap();
    assert!(!client.public_key().is_empty());
}

#[test]
fn test_srp_handshake_against_reference_server() {
    let client = SrpClient::new(&SrpParams::RFC5054_3072).unwrap();
    let username = b"Pair-Setup";
    let password = b"1234";
    let client_a = client.public_key();

    let salt = b"randomsalt";

    let helper_client = ::srp::client::SrpClient::<sha2::Sha512>::new(&::srp::groups::G_3072);
    let verifier = helper_client.compute_verifier(username, password, salt);

    let server = ::srp::server::SrpServer::<sha2::Sha512>::new(&::srp::groups::G_3072);

    let mut b_bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut b_bytes);
    let server_b_pub = server.compute_public_ephemeral(&b_bytes, &verifier);

    let client_verifier = client
        .process_challenge(username, password, salt, &server_b_pub)
        .expect("client failed to process challenge");

    let client_m1 = client_verifier.client_proof();

    let server_verifier = server
        .process_reply(&b_bytes, &verifier, client_a)
        .expect("reference server failed to process reply");

    server_verifier
        .verify_client(client_m1)
        .expect("reference server failed to verify client");
    let server_key = server_verifier.key();
    let server_m2 = server_verifier.proof();

    let client_key = client_verifier
        .verify_server(server_m2)
        .expect("client failed to verify reference server");

    assert_eq!(client_key.as_bytes(), server_key);
}

#[test]
fn test_srp_handshake_against_reference_client() {
    let username = b"Pair-Setup";
    let password = b"1234";
    let salt = b"randomsalt";

    let verifier = SrpServer::compute_verifier(username, password, salt, &SrpParams::RFC5054_3072);
    let server = SrpServer::new(&verifier, &SrpParams::RFC5054_3072);

    let helper_client = ::srp::client::SrpClient::<sha2::Sha512>::new(&::srp::groups::G_3072);
    let mut a_bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut a_bytes);
    let client_a_pub = helper_client.compute_public_ephemeral(&a_bytes);

    let verifier_reply = helper_client
        .process_reply(&a_bytes, username, password, salt, server.public_key())
        .expect("reference client failed to process reply");
    let client_m1 = verifier_reply.proof();

    let (server_key, server_m2) = server
        .verify_client(username, salt, &client_a_pub, client_m1)
        .expect("server failed to verify reference client");

    verifier_reply
        .verify_server(&server_m2)
        .expect("reference client failed to verify server");

    assert_eq!(server_key.as_bytes(), verifier_reply.key());
}

#[test]
fn test_srp_invalid_password_fails() {
    let client = SrpClient::new(&SrpParams::RFC5054_3072).unwrap();
    let username = b"Pair-Setup";
    let password = b"correct";
    let salt = b"salt";

    let helper_client = ::srp::client::SrpClient::<sha2::Sha512>::new(&::srp::groups::G_3072);
    // Registered with the wrong password.
    let verifier = helper_client.compute_verifier(username, b"wrong", salt);

    let server = ::srp::server::SrpServer::<sha2::Sha512>::new(&::srp::groups::G_3072);
    let mut b_bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut b_bytes);
    let server_b_pub = server.compute_public_ephemeral(&b_bytes, &verifier);

    let client_verifier = client
        .process_challenge(username, password, salt, &server_b_pub)
        .unwrap();

    let client_m1 = client_verifier.client_proof();

    let server_verifier = server
        .process_reply(&b_bytes, &verifier, client.public_key())
        .unwrap();

    assert!(server_verifier.verify_client(client_m1).is_err());
}

#[test]
fn test_srp_server_rejects_wrong_client_proof() {
    let username = b"Pair-Setup";
    let salt = b"salt";

    let verifier = SrpServer::compute_verifier(username, b"correct", salt, &SrpParams::RFC5054_3072);
    let server = SrpServer::new(&verifier, &SrpParams::RFC5054_3072);

    let client = SrpClient::new(&SrpParams::RFC5054_3072).unwrap();
    let client_verifier = client
        .process_challenge(username, b"wrong", salt, server.public_key())
        .unwrap();

    let result = server.verify_client(username, salt, client.public_key(), client_verifier.client_proof());
    assert!(result.is_err());
}

// --- x25519.rs tests ---

#[test]
fn test_x25519_key_exchange() {
    let alice = X25519KeyPair::generate();
    let bob = X25519KeyPair::generate();

    let alice_shared = alice.diffie_hellman(&bob.public_key());
    let bob_shared = bob.diffie_hellman(&alice.public_key());

    assert_eq!(alice_shared.as_bytes(), bob_shared.as_bytes());
}

#[test]
fn test_x25519_keypair_roundtrip() {
    let kp1 = X25519KeyPair::generate();
    let secret = kp1.secret_bytes();

    let kp2 = X25519KeyPair::from_bytes(&secret).unwrap();

    assert_eq!(kp1.public_key().as_bytes(), kp2.public_key().as_bytes());
}

#[test]
fn test_x25519_public_key_from_bytes() {
    let kp = X25519KeyPair::generate();
    let pk_bytes = kp.public_key().as_bytes().to_vec();

    let pk = X25519PublicKey::from_bytes(&pk_bytes).unwrap();

    assert_eq!(pk.as_bytes(), kp.public_key().as_bytes());
}
