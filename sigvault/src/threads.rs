//! Conversation threads.

use rusqlite::Connection;

use crate::backup::Backup;
use crate::error::Result;
use crate::recipients::RecipientRef;

/// One row of the `thread` table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Thread {
    /// The conversation counterparty.
    pub recipient: RecipientRef,
    /// Thread row id, used to filter messages and attachments.
    pub id: i64,
    /// Date of the most recent activity, milliseconds since epoch.
    pub date: i64,
    /// Number of messages in the thread.
    pub message_count: i64,
}

impl Backup {
    /// All conversation threads, ordered by thread id.
    pub fn threads(&mut self) -> Result<Vec<Thread>> {
        let db = self.take_db()?;
        let r = self.collect_threads(&db);
        self.put_db(db);
        self.record(r)
    }

    fn collect_threads(&mut self, db: &Connection) -> Result<Vec<Thread>> {
        self.load_recipients(db)?;
        let mut stmt =
            db.prepare("SELECT recipient_ids, _id, date, message_count FROM thread ORDER BY _id")?;
        let mut rows = stmt.query([])?;
        let mut threads = Vec::new();
        while let Some(row) = rows.next()? {
            let recipient_id = self.recipient_id_from(row.get_ref(0)?)?;
            let recipient = self.lookup_recipient(&recipient_id)?;
            threads.push(Thread {
                recipient,
                id: row.get(1)?,
                date: row.get::<_, Option<i64>>(2)?.unwrap_or(0),
                message_count: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
            });
        }
        Ok(threads)
    }
}
