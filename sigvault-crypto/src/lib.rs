//! Cryptographic stream for Signal Android backup files.
//!
//! Provides:
//! - [`BackupKeys`]: cipher/MAC key pair derived from a backup passphrase
//! - [`FrameDecryptor`]: sequential AES-256-CTR frame decryption with
//!   truncated HMAC-SHA-256 authentication
//! - [`PayloadDecryptor`]: streaming decryption of attachment payloads
//!
//! A backup file is a sequence of encrypted records, each followed by a
//! 10-byte HMAC tag. Frames are MACed over their ciphertext alone; file
//! payloads additionally absorb their counter IV into the MAC before the
//! ciphertext. Both share one monotonically increasing 32-bit counter that
//! forms the first four bytes of the AES-CTR IV.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod keys;
mod stream;

pub use keys::BackupKeys;
pub use stream::{FrameDecryptor, PayloadDecryptor, StreamError, MAC_LEN};
