//! Attachment rows from the `part` table.

use rusqlite::Connection;

use crate::backup::Backup;
use crate::error::{Error, Result};
use crate::frames::FileRef;

/// `pending_push` value of a fully transferred attachment.
pub(crate) const TRANSFER_DONE: i64 = 0;

/// MIME type of the hidden attachment carrying a message's overflow body.
pub(crate) const LONG_TEXT_TYPE: &str = "application/x-signal-long-text";

/// One attachment row, joined against the backup's payload index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    /// `part._id`.
    pub row_id: i64,
    /// `part.unique_id`.
    pub attachment_id: i64,
    /// Declared MIME type.
    pub content_type: Option<String>,
    /// Original filename, when the sender provided one.
    pub file_name: Option<String>,
    /// Declared size in bytes.
    pub size: i64,
    /// Raw transfer status (`pending_push`); 0 means done.
    pub status: i64,
    /// Payload location; present when the backup carries the file.
    pub file_ref: Option<FileRef>,
}

impl Attachment {
    /// Whether the attachment finished transferring, i.e. its payload must
    /// be in the backup.
    pub fn is_done(&self) -> bool {
        self.status == TRANSFER_DONE
    }

    pub(crate) fn is_long_text(&self) -> bool {
        self.is_done() && self.content_type.as_deref() == Some(LONG_TEXT_TYPE)
    }
}

struct PartRow {
    row_id: i64,
    attachment_id: i64,
    content_type: Option<String>,
    file_name: Option<String>,
    size: i64,
    status: i64,
}

const PART_COLUMNS: &str = "p._id, p.unique_id, p.ct, p.file_name, p.data_size, p.pending_push";

impl Backup {
    /// Every attachment in the backup, ordered by `(unique_id, _id)`.
    pub fn attachments_all(&mut self) -> Result<Vec<Attachment>> {
        let db = self.take_db()?;
        let r = self.collect_attachments(&db, None);
        self.put_db(db);
        self.record(r)
    }

    /// The attachments of one thread, ordered by `(unique_id, _id)`.
    pub fn attachments_for_thread(&mut self, thread_id: i64) -> Result<Vec<Attachment>> {
        let db = self.take_db()?;
        let r = self.collect_attachments(&db, Some(thread_id));
        self.put_db(db);
        self.record(r)
    }

    fn collect_attachments(
        &mut self,
        db: &Connection,
        thread: Option<i64>,
    ) -> Result<Vec<Attachment>> {
        let sql = match thread {
            Some(_) => format!(
                "SELECT {PART_COLUMNS} FROM part AS p \
                 JOIN mms AS m ON p.mid = m._id \
                 WHERE m.thread_id = ?1 ORDER BY p.unique_id, p._id"
            ),
            None => format!("SELECT {PART_COLUMNS} FROM part AS p ORDER BY p.unique_id, p._id"),
        };
        let mut stmt = db.prepare(&sql)?;
        let mut rows = match thread {
            Some(id) => stmt.query([id])?,
            None => stmt.query([])?,
        };
        let mut attachments = Vec::new();
        while let Some(row) = rows.next()? {
            attachments.push(self.resolve_part(read_part_row(row)?)?);
        }
        Ok(attachments)
    }

    /// The attachments of one MMS row, ordered by `(unique_id, _id)`.
    pub(crate) fn parts_for_message(&self, db: &Connection, mms_id: i64) -> Result<Vec<Attachment>> {
        let sql = format!(
            "SELECT {PART_COLUMNS} FROM part AS p \
             WHERE p.mid = ?1 ORDER BY p.unique_id, p._id"
        );
        let mut stmt = db.prepare(&sql)?;
        let mut rows = stmt.query([mms_id])?;
        let mut attachments = Vec::new();
        while let Some(row) = rows.next()? {
            attachments.push(self.resolve_part(read_part_row(row)?)?);
        }
        Ok(attachments)
    }

    /// Join a part row against the payload index and check the transfer
    /// invariants: a done part must have a payload of exactly its size.
    fn resolve_part(&self, part: PartRow) -> Result<Attachment> {
        let file_ref = self
            .attachment_index
            .get(&(part.row_id, part.attachment_id))
            .copied();
        if part.status == TRANSFER_DONE {
            let file_ref = file_ref.ok_or_else(|| {
                Error::lookup(format!(
                    "attachment {}/{} is marked done but its payload is not in the backup",
                    part.row_id, part.attachment_id
                ))
            })?;
            if i64::from(file_ref.length) != part.size {
                return Err(Error::corruption(format!(
                    "attachment {}/{}: payload is {} bytes but the part row declares {}",
                    part.row_id, part.attachment_id, file_ref.length, part.size
                )));
            }
        }
        Ok(Attachment {
            row_id: part.row_id,
            attachment_id: part.attachment_id,
            content_type: part.content_type,
            file_name: part.file_name,
            size: part.size,
            status: part.status,
            file_ref,
        })
    }
}

fn read_part_row(row: &rusqlite::Row<'_>) -> Result<PartRow> {
    Ok(PartRow {
        row_id: row.get(0)?,
        attachment_id: row.get::<_, Option<i64>>(1)?.unwrap_or(0),
        content_type: row.get(2)?,
        file_name: row.get(3)?,
        size: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
        status: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
    })
}
