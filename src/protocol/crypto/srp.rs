//! SRP-6a implementation matching the HomeKit Pair-Setup requirements:
//! RFC 5054 3072-bit group, SHA-512 hash, public keys zero-padded to the
//! group's byte length (384 bytes) on the wire.

use super::CryptoError;
use num_bigint::{BigUint, RandomBits};
use rand::Rng;
use sha2::{Digest, Sha512};
use zeroize::Zeroize;

const N_HEX: &[u8] = b"FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E08\
              8A67CC74020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B\
              302B0A6DF25F14374FE1356D6D51C245E485B576625E7EC6F44C42E9\
              A637ED6B0BFF5CB6F406B7EDEE386BFB5A899FA5AE9F24117C4B1FE6\
              49286651ECE45B3DC2007CB8A163BF0598DA48361C55D39A69163FA8\
              FD24CF5F83655D23DCA3AD961C62F356208552BB9ED529077096966D\
              670C354E4ABC9804F1746C08CA18217C32905E462E36CE3BE39E772C\
              180E86039B2783A2EC07A28FB5C55DF06F4C52C9DE2BCBF695581718\
              3995497CEA956AE515D2261898FA051015728E5A8AAAC42DAD33170D\
              04507A33A85521ABDF1CBA64ECFB850458DBEF0A8AEA71575D060C7D\
              B3970F85A6E1E4C7ABF5AE8CDB0933D71E8C94E04A25619DCEE3D226\
              1AD2EE6BF12FFA06D98A0864D87602733EC86A64521F2B18177B200C\
              BBE117577A615D6C770988C0BAD946E208E24FA074E5AB3143DB5BFC\
              E0FD108E4B82D120A93AD2CAFFFFFFFFFFFFFFFF";

/// The SRP-6a group parameters (prime modulus and generator).
#[derive(Debug, Clone)]
pub struct SrpGroup {
    /// The group modulus `N`.
    pub n: BigUint,
    /// The group generator `g`.
    pub g: BigUint,
}

/// Named SRP parameter sets. HAP uses the RFC 5054 3072-bit group exclusively.
#[derive(Debug, Clone, Copy)]
pub enum SrpParams {
    RFC5054_3072,
}

impl SrpParams {
    fn group(self) -> SrpGroup {
        match self {
            SrpParams::RFC5054_3072 => SrpGroup {
                n: BigUint::parse_bytes(N_HEX, 16).expect("static RFC5054 modulus is valid hex"),
                g: BigUint::from(5u32),
            },
        }
    }

    fn byte_len(self) -> usize {
        384
    }
}

fn pad(bytes: &[u8], len: usize) -> Vec<u8> {
    if bytes.len() >= len {
        return bytes.to_vec();
    }
    let mut out = vec![0u8; len];
    out[len - bytes.len()..].copy_from_slice(bytes);
    out
}

fn compute_k(group: &SrpGroup, byte_len: usize) -> BigUint {
    let mut hasher = Sha512::new();
    hasher.update(group.n.to_bytes_be());
    hasher.update(pad(&group.g.to_bytes_be(), byte_len));
    BigUint::from_bytes_be(&hasher.finalize())
}

fn compute_u(a_pub: &[u8], b_pub: &[u8], byte_len: usize) -> BigUint {
    let mut hasher = Sha512::new();
    hasher.update(pad(a_pub, byte_len));
    hasher.update(pad(b_pub, byte_len));
    BigUint::from_bytes_be(&hasher.finalize())
}

fn compute_x(username: &[u8], password: &[u8], salt: &[u8]) -> BigUint {
    let mut inner = Sha512::new();
    inner.update(username);
    inner.update(b":");
    inner.update(password);
    let h_up = inner.finalize();

    let mut outer = Sha512::new();
    outer.update(salt);
    outer.update(h_up);
    BigUint::from_bytes_be(&outer.finalize())
}

/// `M1 = H(H(N) xor H(g), H(I), s, A, B, K)`, the format HAP's Pair-Setup uses.
fn compute_m1(group: &SrpGroup, username: &[u8], salt: &[u8], a_pub: &[u8], b_pub: &[u8], k: &[u8]) -> Vec<u8> {
    let hn = Sha512::digest(group.n.to_bytes_be());
    let hg = Sha512::digest(group.g.to_bytes_be());
    let mut hn_xor_hg = [0u8; 64];
    for i in 0..64 {
        hn_xor_hg[i] = hn[i] ^ hg[i];
    }
    let h_user = Sha512::digest(username);

    let mut hasher = Sha512::new();
    hasher.update(hn_xor_hg);
    hasher.update(h_user);
    hasher.update(salt);
    hasher.update(a_pub);
    hasher.update(b_pub);
    hasher.update(k);
    hasher.finalize().to_vec()
}

fn compute_m2(a_pub: &[u8], m1: &[u8], k: &[u8]) -> Vec<u8> {
    let mut hasher = Sha512::new();
    hasher.update(a_pub);
    hasher.update(m1);
    hasher.update(k);
    hasher.finalize().to_vec()
}

/// Controller-side (`A`) half of an SRP exchange.
pub struct SrpClient {
    group: SrpGroup,
    byte_len: usize,
    k: BigUint,
    a: BigUint,
    public_key: Vec<u8>,
}

impl SrpClient {
    /// Generate a fresh ephemeral private/public keypair under `params`.
    pub fn new(params: &SrpParams) -> Result<Self, CryptoError> {
        let group = params.group();
        let byte_len = params.byte_len();
        let k = compute_k(&group, byte_len);

        let mut rng = rand::thread_rng();
        let a: BigUint = rng.sample(RandomBits::new(256));
        let a = a % &group.n;

        let a_pub = group.g.modpow(&a, &group.n);
        let public_key = pad(&a_pub.to_bytes_be(), byte_len);

        Ok(Self {
            group,
            byte_len,
            k,
            a,
            public_key,
        })
    }

    /// The ephemeral public key `A`, zero-padded to the group's byte length.
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Consume the server's salt and public key `B`, producing a verifier
    /// that carries the client proof `M1`.
    pub fn process_challenge(
        &self,
        username: &[u8],
        password: &[u8],
        salt: &[u8],
        server_public: &[u8],
    ) -> Result<SrpVerifier, CryptoError> {
        let b_pub_num = BigUint::from_bytes_be(server_public);
        if &b_pub_num % &self.group.n == BigUint::from(0u32) {
            return Err(CryptoError::SrpError("invalid server public key".into()));
        }

        let u = compute_u(&self.public_key, server_public, self.byte_len);
        let x = compute_x(username, password, salt);

        let g_x = self.group.g.modpow(&x, &self.group.n);
        let k_g_x = (&self.k * g_x) % &self.group.n;
        let base = if b_pub_num >= k_g_x {
            (&b_pub_num - &k_g_x) % &self.group.n
        } else {
            (&self.group.n - (&k_g_x - &b_pub_num) % &self.group.n) % &self.group.n
        };

        let exp = &self.a + (&u * x);
        let s_shared = base.modpow(&exp, &self.group.n);
        let k_session = Sha512::digest(s_shared.to_bytes_be()).to_vec();

        let m1 = compute_m1(
            &self.group,
            username,
            salt,
            &self.public_key,
            server_public,
            &k_session,
        );

        Ok(SrpVerifier {
            a_pub: self.public_key.clone(),
            m1,
            k_session,
        })
    }
}

/// Produced by [`SrpClient::process_challenge`]; carries the client proof `M1`
/// and, once the server's `M2` is checked, the shared session key.
pub struct SrpVerifier {
    a_pub: Vec<u8>,
    m1: Vec<u8>,
    k_session: Vec<u8>,
}

impl SrpVerifier {
    /// The client proof `M1` to send in M3.
    pub fn client_proof(&self) -> &[u8] {
        &self.m1
    }

    /// Check the server's `M2` proof, returning the shared session key on success.
    pub fn verify_server(&self, server_proof: &[u8]) -> Result<SessionKey, CryptoError> {
        let expected = compute_m2(&self.a_pub, &self.m1, &self.k_session);
        if expected != server_proof {
            return Err(CryptoError::SrpError("server proof verification failed".into()));
        }
        Ok(SessionKey {
            key: self.k_session.clone(),
        })
    }
}

/// Accessory-side (`B`) half of an SRP exchange, constructed from a stored
/// password verifier.
pub struct SrpServer {
    group: SrpGroup,
    byte_len: usize,
    verifier: BigUint,
    b: BigUint,
    public_key: Vec<u8>,
}

impl SrpServer {
    /// `v = g^x mod N`, computed once at setup-code configuration time and
    /// persisted alongside the salt; never recomputed per connection.
    pub fn compute_verifier(username: &[u8], password: &[u8], salt: &[u8], params: &SrpParams) -> Vec<u8> {
        let group = params.group();
        let x = compute_x(username, password, salt);
        let v = group.g.modpow(&x, &group.n);
        pad(&v.to_bytes_be(), params.byte_len())
    }

    /// Start a fresh session against a stored verifier, generating an
    /// ephemeral private/public keypair `(b, B)`.
    pub fn new(verifier: &[u8], params: &SrpParams) -> Self {
        let group = params.group();
        let byte_len = params.byte_len();
        let verifier_num = BigUint::from_bytes_be(verifier);
        let k = compute_k(&group, byte_len);

        let mut rng = rand::thread_rng();
        let b: BigUint = rng.sample(RandomBits::new(256));
        let b = b % &group.n;

        // B = k*v + g^b (mod N)
        let b_pub = (&k * &verifier_num + group.g.modpow(&b, &group.n)) % &group.n;
        let public_key = pad(&b_pub.to_bytes_be(), byte_len);

        Self {
            group,
            byte_len,
            verifier: verifier_num,
            b,
            public_key,
        }
    }

    /// The ephemeral public key `B`, zero-padded to the group's byte length.
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Verify the controller's `M1` proof against `client_public`, returning
    /// the shared session key and the accessory's own proof `M2` on success.
    pub fn verify_client(
        &self,
        username: &[u8],
        salt: &[u8],
        client_public: &[u8],
        client_proof: &[u8],
    ) -> Result<(SessionKey, Vec<u8>), CryptoError> {
        let a_pub_num = BigUint::from_bytes_be(client_public);
        if &a_pub_num % &self.group.n == BigUint::from(0u32) {
            return Err(CryptoError::SrpError("invalid client public key".into()));
        }

        let u = compute_u(client_public, &self.public_key, self.byte_len);

        // S = (A * v^u) ^ b mod N
        let v_u = self.verifier.modpow(&u, &self.group.n);
        let base = (&a_pub_num * v_u) % &self.group.n;
        let s_shared = base.modpow(&self.b, &self.group.n);
        let k_session = Sha512::digest(s_shared.to_bytes_be()).to_vec();

        let expected_m1 = compute_m1(
            &self.group,
            username,
            salt,
            client_public,
            &self.public_key,
            &k_session,
        );

        if expected_m1 != client_proof {
            return Err(CryptoError::SrpError("client proof verification failed".into()));
        }

        let m2 = compute_m2(client_public, client_proof, &k_session);
        Ok((SessionKey { key: k_session }, m2))
    }
}

/// SRP shared secret, zeroized on drop.
pub struct SessionKey {
    key: Vec<u8>,
}

impl SessionKey {
    /// The raw shared session key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }
}

impl Drop for SessionKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}
