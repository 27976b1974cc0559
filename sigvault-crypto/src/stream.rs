//! AES-256-CTR decryption with per-record HMAC-SHA-256 verification.

use aes::Aes256;
use aes::cipher::{KeyIvInit, StreamCipher};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::keys::BackupKeys;

type Aes256Ctr = ctr::Ctr128BE<Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Length of the truncated HMAC tag trailing every encrypted record.
pub const MAC_LEN: usize = 10;

// ─── Error ───────────────────────────────────────────────────────────────────

/// Errors from frame or payload decryption.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamError {
    /// The computed HMAC tag does not match the stored one.
    MacMismatch,
    /// The record is shorter than its trailing MAC tag.
    TooShort,
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MacMismatch => write!(f, "HMAC tag mismatch"),
            Self::TooShort => write!(f, "record shorter than its MAC tag"),
        }
    }
}
impl std::error::Error for StreamError {}

// ─── FrameDecryptor ──────────────────────────────────────────────────────────

/// Sequential decryptor for the encrypted records of one backup file.
///
/// Owns the derived keys and the 32-bit record counter. The counter starts
/// as the big-endian value of the header IV's first four bytes and
/// advances by one for every frame and every file payload, in file order.
pub struct FrameDecryptor {
    keys: BackupKeys,
    iv: [u8; 16],
    initial_counter: u32,
    counter: u32,
}

impl FrameDecryptor {
    /// Build a decryptor from derived keys and the 16-byte header IV.
    pub fn new(keys: BackupKeys, iv: [u8; 16]) -> Self {
        let mut prefix = [0u8; 4];
        prefix.copy_from_slice(&iv[..4]);
        let counter = u32::from_be_bytes(prefix);
        Self { keys, iv, initial_counter: counter, counter }
    }

    /// The counter value captured at construction.
    pub fn initial_counter(&self) -> u32 {
        self.initial_counter
    }

    /// The counter the next record will be decrypted with.
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Reset the counter, e.g. after rewinding the file.
    pub fn set_counter(&mut self, counter: u32) {
        self.counter = counter;
    }

    /// Consume one counter value without decrypting, e.g. when a file
    /// payload is skipped rather than read.
    pub fn advance_counter(&mut self) {
        self.counter = self.counter.wrapping_add(1);
    }

    /// The 16-byte IV for a given counter: the header IV with its first
    /// four bytes replaced by the counter in big-endian order.
    fn iv_for(&self, counter: u32) -> [u8; 16] {
        let mut iv = self.iv;
        iv[..4].copy_from_slice(&counter.to_be_bytes());
        iv
    }

    /// Verify and decrypt one frame record (`ciphertext ‖ 10-byte tag`).
    ///
    /// The MAC covers the ciphertext alone. On success the counter
    /// advances by one and the plaintext is returned.
    pub fn decrypt_frame(&mut self, record: &[u8]) -> Result<Vec<u8>, StreamError> {
        if record.len() < MAC_LEN {
            return Err(StreamError::TooShort);
        }
        let (ciphertext, tag) = record.split_at(record.len() - MAC_LEN);

        let mut mac = HmacSha256::new_from_slice(self.keys.mac_key())
            .expect("HMAC accepts any key length");
        mac.update(ciphertext);
        mac.verify_truncated_left(tag)
            .map_err(|_| StreamError::MacMismatch)?;

        let iv = self.iv_for(self.counter);
        let mut cipher = Aes256Ctr::new(self.keys.cipher_key().into(), &iv.into());
        let mut plaintext = ciphertext.to_vec();
        cipher.apply_keystream(&mut plaintext);

        self.counter = self.counter.wrapping_add(1);
        Ok(plaintext)
    }

    /// Start decrypting a file payload recorded at `counter`.
    ///
    /// Payload MACs differ from frame MACs in one way: the IV is absorbed
    /// before the ciphertext. Does not touch the sequential counter, so
    /// random-access extraction can run at any time.
    pub fn begin_payload(&self, counter: u32) -> PayloadDecryptor {
        let iv = self.iv_for(counter);
        let mut mac = HmacSha256::new_from_slice(self.keys.mac_key())
            .expect("HMAC accepts any key length");
        mac.update(&iv);
        let cipher = Aes256Ctr::new(self.keys.cipher_key().into(), &iv.into());
        PayloadDecryptor { cipher, mac }
    }
}

// ─── PayloadDecryptor ────────────────────────────────────────────────────────

/// Streaming decryptor for one attachment/avatar/sticker payload.
///
/// Feed ciphertext chunks with [`update`](Self::update), then check the
/// trailing tag with [`finish`](Self::finish).
pub struct PayloadDecryptor {
    cipher: Aes256Ctr,
    mac: HmacSha256,
}

impl PayloadDecryptor {
    /// Absorb one ciphertext chunk into the MAC and decrypt it in place.
    pub fn update(&mut self, chunk: &mut [u8]) {
        self.mac.update(chunk);
        self.cipher.apply_keystream(chunk);
    }

    /// Verify the trailing 10-byte tag read from the file.
    pub fn finish(self, tag: &[u8]) -> Result<(), StreamError> {
        self.mac
            .verify_truncated_left(tag)
            .map_err(|_| StreamError::MacMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_keys() -> BackupKeys {
        BackupKeys::derive(b"303030303030303030303030303030", Some(&[9u8; 32]))
    }

    fn encrypt_record(keys: &BackupKeys, iv: &[u8; 16], counter: u32, plaintext: &[u8]) -> Vec<u8> {
        let mut civ = *iv;
        civ[..4].copy_from_slice(&counter.to_be_bytes());
        let mut ct = plaintext.to_vec();
        let mut cipher = Aes256Ctr::new(keys.cipher_key().into(), (&civ).into());
        cipher.apply_keystream(&mut ct);
        let mut mac = HmacSha256::new_from_slice(keys.mac_key()).unwrap();
        mac.update(&ct);
        let tag = mac.finalize().into_bytes();
        ct.extend_from_slice(&tag[..MAC_LEN]);
        ct
    }

    #[test]
    fn counter_comes_from_iv_prefix() {
        let iv = [
            0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d,
            0x0e, 0x0f,
        ];
        let dec = FrameDecryptor::new(test_keys(), iv);
        assert_eq!(dec.initial_counter(), 0x0001_0203);
        assert_eq!(dec.counter(), 0x0001_0203);
    }

    #[test]
    fn frame_roundtrip_advances_counter() {
        let iv = [0x11u8; 16];
        let keys = test_keys();
        let record = encrypt_record(&keys, &iv, 0x1111_1111, b"hello frame");
        let mut dec = FrameDecryptor::new(test_keys(), iv);
        let plain = dec.decrypt_frame(&record).unwrap();
        assert_eq!(plain, b"hello frame");
        assert_eq!(dec.counter(), 0x1111_1112);
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let iv = [0x22u8; 16];
        let keys = test_keys();
        let mut record = encrypt_record(&keys, &iv, 0x2222_2222, b"payload");
        record[0] ^= 0x80;
        let mut dec = FrameDecryptor::new(test_keys(), iv);
        assert_eq!(dec.decrypt_frame(&record), Err(StreamError::MacMismatch));
    }

    #[test]
    fn tampered_tag_is_rejected() {
        let iv = [0x33u8; 16];
        let keys = test_keys();
        let mut record = encrypt_record(&keys, &iv, 0x3333_3333, b"payload");
        let last = record.len() - 1;
        record[last] ^= 0x01;
        let mut dec = FrameDecryptor::new(test_keys(), iv);
        assert_eq!(dec.decrypt_frame(&record), Err(StreamError::MacMismatch));
    }

    #[test]
    fn short_record_is_rejected() {
        let mut dec = FrameDecryptor::new(test_keys(), [0u8; 16]);
        assert_eq!(dec.decrypt_frame(&[0u8; 9]), Err(StreamError::TooShort));
    }

    #[test]
    fn payload_mac_covers_iv_then_ciphertext() {
        let iv = [0x44u8; 16];
        let keys = test_keys();
        let counter = 0x4444_4450u32;

        let mut civ = iv;
        civ[..4].copy_from_slice(&counter.to_be_bytes());
        let mut ct = b"attachment bytes".to_vec();
        let mut cipher = Aes256Ctr::new(keys.cipher_key().into(), (&civ).into());
        cipher.apply_keystream(&mut ct);
        let mut mac = HmacSha256::new_from_slice(keys.mac_key()).unwrap();
        mac.update(&civ);
        mac.update(&ct);
        let tag = mac.finalize().into_bytes();

        let dec = FrameDecryptor::new(test_keys(), iv);
        let mut payload = dec.begin_payload(counter);
        payload.update(&mut ct);
        assert_eq!(ct, b"attachment bytes");
        payload.finish(&tag[..MAC_LEN]).unwrap();
    }

    #[test]
    fn payload_split_across_chunks_matches_whole() {
        let iv = [0x55u8; 16];
        let keys = test_keys();
        let counter = 0x5555_5555u32;
        let data = vec![0xabu8; 1000];

        let mut civ = iv;
        civ[..4].copy_from_slice(&counter.to_be_bytes());
        let mut ct = data.clone();
        let mut cipher = Aes256Ctr::new(keys.cipher_key().into(), (&civ).into());
        cipher.apply_keystream(&mut ct);
        let mut mac = HmacSha256::new_from_slice(keys.mac_key()).unwrap();
        mac.update(&civ);
        mac.update(&ct);
        let tag = mac.finalize().into_bytes();

        let dec = FrameDecryptor::new(test_keys(), iv);
        let mut payload = dec.begin_payload(counter);
        let (mut a, mut b) = (ct[..300].to_vec(), ct[300..].to_vec());
        payload.update(&mut a);
        payload.update(&mut b);
        a.extend_from_slice(&b);
        assert_eq!(a, data);
        payload.finish(&tag[..MAC_LEN]).unwrap();
    }
}
