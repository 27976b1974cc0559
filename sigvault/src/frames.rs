//! Frame-level access to the backup file.

use sigvault_proto::Frame;

use crate::backup::Backup;
use crate::error::Result;

/// Location of one encrypted file payload inside the backup.
///
/// Recorded while frames are read and immutable afterwards: `counter` is
/// the value the payload was encrypted with, so extraction can re-key the
/// cipher stream at any later time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileRef {
    /// Byte offset of the ciphertext, right after the owning frame's tag.
    pub offset: u64,
    /// Ciphertext length in bytes (a 10-byte tag follows it).
    pub length: u32,
    /// Counter value the payload consumes.
    pub counter: u32,
}

/// One decoded frame plus the location of its file payload, if it has one.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameEvent {
    /// The decoded frame.
    pub frame: Frame,
    /// Present for attachment, avatar and sticker frames.
    pub payload: Option<FileRef>,
}

/// Lazy single-pass iterator over the backup's frames.
///
/// Starts at the current file position and ends after the end frame (or at
/// end of file). File payloads are skipped, not decrypted; their [`FileRef`]
/// is reported alongside the owning frame. Restarting requires an explicit
/// [`Backup::rewind`].
pub struct Frames<'a> {
    backup: &'a mut Backup,
    done: bool,
}

impl<'a> Frames<'a> {
    pub(crate) fn new(backup: &'a mut Backup) -> Self {
        Self { backup, done: false }
    }
}

impl Iterator for Frames<'_> {
    type Item = Result<FrameEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.backup.read_frame_event() {
            Ok(Some(event)) => {
                if matches!(event.frame, Frame::End) {
                    self.done = true;
                }
                Some(Ok(event))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
