//! # sigvault: read encrypted Signal Android backups
//!
//! A backup file is a framed, keyed, encrypted container: an unencrypted
//! protobuf header, then length-prefixed AES-256-CTR records each closed by
//! a truncated HMAC-SHA-256 tag. The records replay the app's SQLite
//! database statement by statement and interleave attachment, avatar and
//! sticker payloads. This workspace splits the concerns across three
//! crates wired together here:
//!
//! | Crate             | Role                                               |
//! |-------------------|----------------------------------------------------|
//! | `sigvault-crypto` | Key derivation, CTR + HMAC frame/payload streams   |
//! | `sigvault-proto`  | Strict decoder for the backup's protobuf frames    |
//! | `sigvault`        | Backup context, replay engine, semantic queries    |
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use sigvault::Backup;
//!
//! let mut backup = Backup::open("signal.backup", "01234 56789 01234 56789 01234 56789")?;
//! for thread in backup.threads()? {
//!     for message in backup.messages_for_thread(thread.id)? {
//!         println!("{}", message.text);
//!     }
//! }
//! # Ok::<(), sigvault::Error>(())
//! ```
//!
//! Frame-level access skips the database entirely:
//!
//! ```rust,no_run
//! use sigvault::Backup;
//!
//! let mut backup = Backup::open("signal.backup", "012345678901234567890123456789")?;
//! for event in backup.frames() {
//!     let event = event?;
//!     println!("{:?} (payload: {})", event.frame, event.payload.is_some());
//! }
//! # Ok::<(), sigvault::Error>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod attachments;
mod backup;
mod error;
mod frames;
mod messages;
mod mime;
mod msgtype;
mod recipients;
mod replay;
mod threads;

pub use attachments::Attachment;
pub use backup::Backup;
pub use error::{Error, Result};
pub use frames::{FileRef, FrameEvent, Frames};
pub use messages::{Mention, Message, Reaction};
pub use mime::extension_for_mime;
pub use recipients::{Contact, Group, Recipient, RecipientId, RecipientRef};
pub use replay::{AvatarEntry, StickerEntry};
pub use threads::Thread;

/// Re-export of the frame types yielded by [`Backup::frames`].
pub use sigvault_proto::{
    Frame, Header, SharedPreference, SqlParameter, SqlStatement,
};
