//! Framed, encrypted transport carried over the same socket after
//! Pair-Verify completes (§4.4). Sans-IO, in the spirit of the crate's
//! other wire codecs: callers `feed()` raw bytes read off the socket and
//! pull decrypted plaintext chunks back out, or hand plaintext to
//! [`FrameWriter::encode`] to get wire bytes ready to write.
//!
//! A message larger than [`MAX_FRAME_PLAINTEXT`] plaintext bytes is split
//! into consecutive frames transparently; HTTP framing above this layer is
//! unaffected (§4.4, §8 property 1, S5).

use bytes::{Buf, BytesMut};

use super::crypto::{ChaCha20Poly1305Cipher, CryptoError, Nonce};

/// Maximum plaintext payload carried by a single frame.
pub const MAX_FRAME_PLAINTEXT: usize = 1024;

/// ChaCha20-Poly1305 tag length, appended to every frame's ciphertext.
const TAG_LEN: usize = 16;

/// Transport-layer errors. Per §4.4 and §7, an AEAD tag failure closes the
/// session immediately with no reply — callers should treat
/// [`TransportError::TagMismatch`] as a hard disconnect, not a retryable
/// error.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("frame length {0} is zero or exceeds {MAX_FRAME_PLAINTEXT}")]
    InvalidLength(usize),

    #[error("AEAD tag verification failed")]
    TagMismatch,

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

/// Decrypts inbound frames using a session's read key, tracking the
/// monotonic read counter (§3 Session, §8 property 1).
pub struct FrameReader {
    cipher: ChaCha20Poly1305Cipher,
    counter: u64,
    buf: BytesMut,
}

impl FrameReader {
    /// # Errors
    /// Returns an error if `key` is not 32 bytes.
    pub fn new(key: &[u8; 32]) -> Result<Self, CryptoError> {
        Ok(Self {
            cipher: ChaCha20Poly1305Cipher::new(key)?,
            counter: 0,
            buf: BytesMut::new(),
        })
    }

    /// Append newly-read socket bytes to the internal buffer.
    pub fn feed(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Number of bytes currently buffered (a partial frame, or several
    /// complete ones not yet drained).
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// The next frame's monotonic read counter value (for tests/metrics).
    #[must_use]
    pub fn read_counter(&self) -> u64 {
        self.counter
    }

    /// Attempt to decrypt one complete frame from the buffer.
    ///
    /// Returns `Ok(None)` if the buffer doesn't yet hold a full frame
    /// (partial frames at buffer end are retained for the next call, per
    /// §4.4). Returns `Err(TransportError::TagMismatch)` on authentication
    /// failure — the caller MUST close the session without replying.
    ///
    /// # Errors
    /// See [`TransportError`].
    pub fn decode_next(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        if self.buf.len() < 2 {
            return Ok(None);
        }
        let len = u16::from_le_bytes([self.buf[0], self.buf[1]]) as usize;
        if len == 0 || len > MAX_FRAME_PLAINTEXT {
            return Err(TransportError::InvalidLength(len));
        }
        let total = 2 + len + TAG_LEN;
        if self.buf.len() < total {
            return Ok(None);
        }

        let aad = self.buf[0..2].to_vec();
        let ciphertext = self.buf[2..total].to_vec();
        let nonce = Nonce::from_counter(self.counter);
        let plaintext = self
            .cipher
            .decrypt_with_aad(&nonce, &aad, &ciphertext)
            .map_err(|_| TransportError::TagMismatch)?;

        self.counter += 1;
        self.buf.advance(total);
        Ok(Some(plaintext))
    }

    /// Drain and decrypt every complete frame currently buffered.
    ///
    /// # Errors
    /// See [`TransportError`]; on error, frames decoded so far are returned
    /// and the caller should still treat the session as failed.
    pub fn decode_all(&mut self) -> Result<Vec<Vec<u8>>, TransportError> {
        let mut out = Vec::new();
        while let Some(chunk) = self.decode_next()? {
            out.push(chunk);
        }
        Ok(out)
    }
}

/// Encrypts outbound frames using a session's write key, tracking the
/// monotonic write counter.
pub struct FrameWriter {
    cipher: ChaCha20Poly1305Cipher,
    counter: u64,
}

impl FrameWriter {
    /// # Errors
    /// Returns an error if `key` is not 32 bytes.
    pub fn new(key: &[u8; 32]) -> Result<Self, CryptoError> {
        Ok(Self {
            cipher: ChaCha20Poly1305Cipher::new(key)?,
            counter: 0,
        })
    }

    /// The next frame's monotonic write counter value (for tests/metrics).
    #[must_use]
    pub fn write_counter(&self) -> u64 {
        self.counter
    }

    /// Encrypt `plaintext`, splitting it into as many ≤1024-byte frames as
    /// needed, and return the concatenated wire bytes ready to write to the
    /// socket.
    ///
    /// Empty input produces zero frames: §4.4 defines a frame length as
    /// `0 < L ≤ 1024`, so there is no valid on-wire encoding of an empty
    /// chunk, and `decode_next` rejects `len == 0` accordingly.
    ///
    /// # Errors
    /// Returns an error if the underlying AEAD encryption fails (key
    /// already validated at construction, so this is effectively
    /// infallible in practice).
    pub fn encode(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, TransportError> {
        let chunks = plaintext.chunks(MAX_FRAME_PLAINTEXT).collect::<Vec<_>>();

        let mut out = Vec::with_capacity(plaintext.len() + chunks.len() * (2 + TAG_LEN));
        for chunk in chunks {
            #[allow(clippy::cast_possible_truncation)]
            let len_bytes = (chunk.len() as u16).to_le_bytes();
            let nonce = Nonce::from_counter(self.counter);
            let ciphertext = self.cipher.encrypt_with_aad(&nonce, &len_bytes, chunk)?;
            self.counter += 1;

            out.extend_from_slice(&len_bytes);
            out.extend_from_slice(&ciphertext);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_single_short_frame() {
        let key = [0x11u8; 32];
        let mut writer = FrameWriter::new(&key).unwrap();
        let mut reader = FrameReader::new(&key).unwrap();

        let wire = writer.encode(b"hello HAP").unwrap();
        reader.feed(&wire);

        let out = reader.decode_next().unwrap().unwrap();
        assert_eq!(out, b"hello HAP");
        assert_eq!(reader.read_counter(), 1);
    }

    #[test]
    fn splits_2050_byte_body_into_three_frames_of_1024_1024_2() {
        let key = [0x22u8; 32];
        let mut writer = FrameWriter::new(&key).unwrap();
        let mut reader = FrameReader::new(&key).unwrap();

        let body = vec![0xAB; 2050];
        let wire = writer.encode(&body).unwrap();
        reader.feed(&wire);

        let chunks = reader.decode_all().unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 1024);
        assert_eq!(chunks[1].len(), 1024);
        assert_eq!(chunks[2].len(), 2);
        assert_eq!(reader.read_counter(), 3);

        let mut reassembled = Vec::new();
        for c in chunks {
            reassembled.extend_from_slice(&c);
        }
        assert_eq!(reassembled, body);
    }

    #[test]
    fn retains_partial_frame_across_feeds() {
        let key = [0x33u8; 32];
        let mut writer = FrameWriter::new(&key).unwrap();
        let mut reader = FrameReader::new(&key).unwrap();

        let wire = writer.encode(b"partial-delivery-test").unwrap();
        let (first, second) = wire.split_at(5);

        reader.feed(first);
        assert!(reader.decode_next().unwrap().is_none());

        reader.feed(second);
        let out = reader.decode_next().unwrap().unwrap();
        assert_eq!(out, b"partial-delivery-test");
    }

    #[test]
    fn flipping_a_ciphertext_bit_fails_the_tag() {
        let key = [0x44u8; 32];
        let mut writer = FrameWriter::new(&key).unwrap();
        let mut reader = FrameReader::new(&key).unwrap();

        let mut wire = writer.encode(b"tamper me").unwrap();
        let last = wire.len() - 1;
        wire[last] ^= 0x01;
        reader.feed(&wire);

        assert!(matches!(reader.decode_next(), Err(TransportError::TagMismatch)));
    }

    #[test]
    fn replaying_an_earlier_frame_fails_once_counter_has_advanced() {
        let key = [0x55u8; 32];
        let mut writer = FrameWriter::new(&key).unwrap();
        let mut reader = FrameReader::new(&key).unwrap();

        let first_wire = writer.encode(b"first").unwrap();
        let _second_wire = writer.encode(b"second").unwrap();

        reader.feed(&first_wire);
        assert!(reader.decode_next().unwrap().is_some());

        // Replay the already-consumed first frame; the reader's counter has
        // moved on to 1, so the nonce no longer matches.
        reader.feed(&first_wire);
        assert!(matches!(reader.decode_next(), Err(TransportError::TagMismatch)));
    }

    #[test]
    fn encoding_empty_plaintext_produces_no_frames() {
        let key = [0x77u8; 32];
        let mut writer = FrameWriter::new(&key).unwrap();
        let mut reader = FrameReader::new(&key).unwrap();

        let wire = writer.encode(b"").unwrap();
        assert!(wire.is_empty());
        assert_eq!(writer.write_counter(), 0);

        reader.feed(&wire);
        assert!(reader.decode_next().unwrap().is_none());
        assert_eq!(reader.read_counter(), 0);
    }

    #[test]
    fn read_and_write_counters_are_independent_and_monotonic() {
        let key = [0x66u8; 32];
        let mut writer = FrameWriter::new(&key).unwrap();
        for _ in 0..5 {
            writer.encode(b"x").unwrap();
        }
        assert_eq!(writer.write_counter(), 5);
    }
}
