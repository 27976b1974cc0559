//! The backup context: open, rewind, frame reading, payload extraction.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;

use rusqlite::Connection;
use sigvault_crypto::{BackupKeys, FrameDecryptor, MAC_LEN, StreamError};
use sigvault_proto::{Frame, SharedPreference, decode_frame};

use crate::error::{Error, Result};
use crate::frames::{FileRef, FrameEvent, Frames};
use crate::recipients::RecipientCache;
use crate::replay::{AvatarEntry, StickerEntry};

/// Chunk size for streaming payload decryption.
const PAYLOAD_CHUNK: usize = 8192;

/// An opened Signal Android backup file.
///
/// The context owns the file handle and the crypto state, and after
/// [`materialize_database`](Self::materialize_database) has run, the
/// in-memory database, the attachment index and the recipient cache. All
/// operations take `&mut self`: a context serves one reader at a time and
/// never suspends.
pub struct Backup {
    pub(crate) file: BufReader<File>,
    pub(crate) decryptor: FrameDecryptor,
    first_frame_offset: u64,
    pub(crate) frame_index: u64,
    pub(crate) db: Option<Connection>,
    pub(crate) db_version: u32,
    pub(crate) attachment_index: BTreeMap<(i64, i64), FileRef>,
    pub(crate) prefs: Vec<SharedPreference>,
    pub(crate) avatar_entries: Vec<AvatarEntry>,
    pub(crate) sticker_entries: Vec<StickerEntry>,
    pub(crate) recipients: Option<RecipientCache>,
    last_error: Option<String>,
}

impl Backup {
    /// Open a backup file and derive its keys from `passphrase`.
    ///
    /// Reads and validates the unencrypted header frame; ASCII spaces in
    /// the passphrase are ignored, so the six five-digit groups can be
    /// passed as displayed by the app. Nothing is decrypted yet; a wrong
    /// passphrase surfaces as an [`Error::Auth`] on the first encrypted
    /// frame.
    pub fn open(path: impl AsRef<Path>, passphrase: &str) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut file = BufReader::new(file);

        let mut len_buf = [0u8; 4];
        file.read_exact(&mut len_buf)?;
        let header_len = u32::from_be_bytes(len_buf) as usize;
        let mut header_buf = vec![0u8; header_len];
        file.read_exact(&mut header_buf)?;

        let header = match decode_frame(&header_buf) {
            Ok(Frame::Header(h)) => h,
            Ok(_) => return Err(Error::format("first frame is not a header")),
            Err(e) => return Err(Error::format(format!("header frame: {e}"))),
        };
        let iv: [u8; 16] = header.iv.as_slice().try_into().map_err(|_| {
            Error::format(format!("header IV is {} bytes, expected 16", header.iv.len()))
        })?;

        let passphrase: String = passphrase.chars().filter(|c| *c != ' ').collect();
        let keys = BackupKeys::derive(passphrase.as_bytes(), header.salt.as_deref());
        let decryptor = FrameDecryptor::new(keys, iv);
        log::debug!(
            "[sigvault] backup opened (salt: {}, counter {:#010x})",
            if header.salt.is_some() { "yes" } else { "no" },
            decryptor.initial_counter()
        );

        Ok(Self {
            file,
            decryptor,
            first_frame_offset: 4 + header_len as u64,
            frame_index: 0,
            db: None,
            db_version: 0,
            attachment_index: BTreeMap::new(),
            prefs: Vec::new(),
            avatar_entries: Vec::new(),
            sticker_entries: Vec::new(),
            recipients: None,
            last_error: None,
        })
    }

    /// Close the backup.
    ///
    /// Equivalent to dropping it: the key material is zeroed and the file
    /// and in-memory database are released.
    pub fn close(self) {}

    /// Seek back to the first encrypted frame and reset the counter.
    ///
    /// Frame iteration is single-pass and payload extraction moves the
    /// file position, so every fresh pass starts with a rewind.
    pub fn rewind(&mut self) -> Result<()> {
        self.file.seek(SeekFrom::Start(self.first_frame_offset))?;
        let initial = self.decryptor.initial_counter();
        self.decryptor.set_counter(initial);
        self.frame_index = 0;
        Ok(())
    }

    /// Iterate the frames from the current file position.
    pub fn frames(&mut self) -> Frames<'_> {
        Frames::new(self)
    }

    /// The schema version recorded in the backup.
    ///
    /// Materializes the database on first use.
    pub fn database_version(&mut self) -> Result<u32> {
        self.materialize_database()?;
        Ok(self.db_version)
    }

    /// Shared-preference entries, in file order.
    pub fn preferences(&mut self) -> Result<&[SharedPreference]> {
        self.materialize_database()?;
        Ok(&self.prefs)
    }

    /// Avatar payloads, in file order.
    pub fn avatars(&mut self) -> Result<&[AvatarEntry]> {
        self.materialize_database()?;
        Ok(&self.avatar_entries)
    }

    /// Sticker payloads, in file order.
    pub fn stickers(&mut self) -> Result<&[StickerEntry]> {
        self.materialize_database()?;
        Ok(&self.sticker_entries)
    }

    /// The message of the most recent error returned by this context.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Decrypt the payload at `file_ref` and stream it into `sink`.
    ///
    /// Seeks the backup file; the position is not restored, so a frame
    /// pass after extraction needs [`rewind`](Self::rewind). The trailing
    /// tag is verified after the last chunk, so on an authentication
    /// error the sink has already received unauthenticated plaintext and
    /// its contents must be discarded.
    pub fn write_attachment(&mut self, file_ref: &FileRef, sink: &mut dyn Write) -> Result<()> {
        let r = self.write_payload(file_ref, sink);
        self.record(r)
    }

    /// Decrypt the payload at `file_ref` into memory.
    pub fn read_attachment(&mut self, file_ref: &FileRef) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(file_ref.length as usize);
        self.write_attachment(file_ref, &mut out)?;
        Ok(out)
    }

    /// Decrypt a short text payload (e.g. a long-message attachment) as a
    /// string, replacing invalid UTF-8 rather than failing.
    pub fn read_attachment_text(&mut self, file_ref: &FileRef) -> Result<String> {
        let bytes = self.read_attachment(file_ref)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn write_payload(&mut self, file_ref: &FileRef, sink: &mut dyn Write) -> Result<()> {
        self.file.seek(SeekFrom::Start(file_ref.offset))?;
        let mut payload = self.decryptor.begin_payload(file_ref.counter);

        let mut buf = [0u8; PAYLOAD_CHUNK];
        let mut remaining = file_ref.length as usize;
        while remaining > 0 {
            let n = remaining.min(buf.len());
            self.file.read_exact(&mut buf[..n])?;
            payload.update(&mut buf[..n]);
            sink.write_all(&buf[..n])?;
            remaining -= n;
        }

        let mut tag = [0u8; MAC_LEN];
        self.file.read_exact(&mut tag)?;
        payload.finish(&tag).map_err(|_| {
            Error::auth(format!(
                "payload at offset {} (counter {:#010x}): HMAC tag mismatch",
                file_ref.offset, file_ref.counter
            ))
        })
    }

    /// Read, authenticate and decode the next frame.
    ///
    /// Returns `Ok(None)` on a clean end of file. File payloads are
    /// skipped and reported as a [`FileRef`].
    pub(crate) fn read_frame_event(&mut self) -> Result<Option<FrameEvent>> {
        let mut len_buf = [0u8; 4];
        if self.file.read(&mut len_buf[..1])? == 0 {
            return Ok(None);
        }
        self.file.read_exact(&mut len_buf[1..])?;
        let record_len = u32::from_be_bytes(len_buf) as usize;
        if record_len <= MAC_LEN {
            return Err(Error::format(format!(
                "frame {}: record length {record_len} not above the tag length",
                self.frame_index
            )));
        }

        let mut record = vec![0u8; record_len];
        self.file.read_exact(&mut record)?;

        let counter = self.decryptor.counter();
        let plaintext = self.decryptor.decrypt_frame(&record).map_err(|e| match e {
            StreamError::MacMismatch => Error::auth(format!(
                "frame {} (counter {counter:#010x}): HMAC tag mismatch",
                self.frame_index
            )),
            StreamError::TooShort => {
                Error::format(format!("frame {}: record too short", self.frame_index))
            }
        })?;

        let frame = decode_frame(&plaintext)
            .map_err(|e| Error::format(format!("frame {}: {e}", self.frame_index)))?;

        let payload = match &frame {
            Frame::Attachment(a) => Some(self.skip_payload(a.length, "attachment")?),
            Frame::Avatar(a) => Some(self.skip_payload(a.length, "avatar")?),
            Frame::Sticker(s) => Some(self.skip_payload(s.length, "sticker")?),
            _ => None,
        };

        self.frame_index += 1;
        Ok(Some(FrameEvent { frame, payload }))
    }

    /// Record where a file payload lives and seek past it.
    fn skip_payload(&mut self, length: Option<u32>, kind: &str) -> Result<FileRef> {
        let length = length.ok_or_else(|| {
            Error::format(format!(
                "frame {}: {kind} frame without a payload length",
                self.frame_index
            ))
        })?;
        let offset = self.file.stream_position()?;
        let counter = self.decryptor.counter();
        self.file
            .seek_relative(i64::from(length) + MAC_LEN as i64)?;
        self.decryptor.advance_counter();
        Ok(FileRef { offset, length, counter })
    }

    /// Temporarily take the database handle so queries can borrow it while
    /// the rest of the context stays mutable.
    pub(crate) fn take_db(&mut self) -> Result<Connection> {
        self.materialize_database()?;
        self.db
            .take()
            .ok_or_else(|| Error::format("database handle unavailable"))
    }

    pub(crate) fn put_db(&mut self, conn: Connection) {
        self.db = Some(conn);
    }

    /// Remember the message of a failed operation for [`last_error`](Self::last_error).
    pub(crate) fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.last_error = Some(e.to_string());
        }
        result
    }
}

impl std::fmt::Debug for Backup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backup")
            .field("frame_index", &self.frame_index)
            .field("db_version", &self.db_version)
            .field("materialized", &self.db.is_some())
            .field("attachments", &self.attachment_index.len())
            .finish()
    }
}
