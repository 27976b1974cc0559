//! Decoder for the protobuf frames embedded in Signal Android backups.
//!
//! The backup container records one `BackupFrame` protobuf per encrypted
//! record. The schema is small and fixed, so instead of a generated decoder
//! this crate ships a strict hand-written one: only wire types 0 (varint),
//! 1 (fixed64), 2 (length-delimited) and 5 (fixed32) are accepted, varints
//! are capped at 10 bytes, a repeated occurrence of a non-repeated field is
//! an error, and unknown field numbers are errors rather than being
//! skipped. A malformed frame never half-decodes.
//!
//! # Quick start
//!
//! ```rust
//! use sigvault_proto::{decode_frame, Frame};
//!
//! // field 5 (version), submessage `version = 170`
//! let bytes = [0x2a, 0x03, 0x08, 0xaa, 0x01];
//! match decode_frame(&bytes).unwrap() {
//!     Frame::Version(v) => assert_eq!(v.version, 170),
//!     _ => unreachable!(),
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cursor;
mod error;
mod frame;
mod reactions;

pub use error::DecodeError;
pub use frame::{
    Attachment, Avatar, DatabaseVersion, Frame, Header, SharedPreference, SqlParameter,
    SqlStatement, Sticker, decode_frame,
};
pub use reactions::{Reaction, decode_reaction_list};

/// Specialized `Result` for frame decoding.
pub type Result<T> = std::result::Result<T, DecodeError>;
