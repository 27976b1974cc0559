//! Messages: the SMS/MMS union query and its follow-ups.

use rusqlite::Connection;
use rusqlite::types::ValueRef;

use crate::attachments::Attachment;
use crate::backup::Backup;
use crate::error::{Error, Result};
use crate::msgtype;
use crate::recipients::{RecipientId, RecipientRef};

/// The placeholder code point a mention occupies in a message body.
const MENTION_PLACEHOLDER: char = '\u{FFFC}';

/// One message, SMS or MMS.
#[derive(Clone, Debug)]
pub struct Message {
    /// The conversation counterparty.
    pub recipient: RecipientRef,
    /// Display text: the stored body, a synthetic text for special types,
    /// or the inlined long-message attachment, with mentions substituted.
    pub text: String,
    /// Milliseconds since epoch the message was sent.
    pub time_sent: i64,
    /// Milliseconds since epoch the message was received.
    pub time_recv: i64,
    /// Raw `type` / `msg_box` bit field.
    pub type_bits: i64,
    /// Owning thread row id.
    pub thread_id: i64,
    /// Attachments, ordered by `(unique_id, _id)`.
    pub attachments: Vec<Attachment>,
    /// Mentions, in `range_start` order.
    pub mentions: Vec<Mention>,
    /// Reactions, in stored order.
    pub reactions: Vec<Reaction>,
}

impl Message {
    /// Whether the backup's owner sent this message.
    pub fn is_outgoing(&self) -> bool {
        msgtype::is_outgoing(self.type_bits)
    }
}

/// A reference to a recipient mentioned in a message body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Mention {
    /// The mentioned recipient.
    pub recipient: RecipientRef,
}

/// One reaction to a message (schema ≥ 37).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reaction {
    /// Who reacted.
    pub recipient: RecipientRef,
    /// The reaction emoji.
    pub emoji: String,
    /// Milliseconds since epoch the reaction was sent.
    pub time_sent: i64,
    /// Milliseconds since epoch the reaction was received.
    pub time_recv: i64,
}

/// Flat row out of the SMS/MMS union, before follow-up queries.
struct MessageRow {
    address: RecipientId,
    body: Option<Vec<u8>>,
    time_sent: i64,
    time_recv: i64,
    type_bits: i64,
    thread_id: i64,
    part_count: i64,
    mms_id: i64,
    reactions: Option<Vec<u8>>,
}

impl Backup {
    /// Every message in the backup, ordered by date received.
    pub fn messages_all(&mut self) -> Result<Vec<Message>> {
        let db = self.take_db()?;
        let r = self.collect_messages(&db, None);
        self.put_db(db);
        self.record(r)
    }

    /// The messages of one thread, ordered by date received.
    pub fn messages_for_thread(&mut self, thread_id: i64) -> Result<Vec<Message>> {
        let db = self.take_db()?;
        let r = self.collect_messages(&db, Some(thread_id));
        self.put_db(db);
        self.record(r)
    }

    fn collect_messages(&mut self, db: &Connection, thread: Option<i64>) -> Result<Vec<Message>> {
        self.load_recipients(db)?;
        let with_reactions = self.db_version >= 37;
        let sql = message_query(with_reactions, thread.is_some());
        let mut stmt = db.prepare(&sql)?;
        let mut rows = match thread {
            Some(id) => stmt.query([id])?,
            None => stmt.query([])?,
        };

        let mut raw = Vec::new();
        while let Some(row) = rows.next()? {
            let address = self.recipient_id_from(row.get_ref(0)?)?;
            raw.push(MessageRow {
                address,
                body: column_bytes(row.get_ref(1)?)?,
                time_sent: row.get::<_, Option<i64>>(2)?.unwrap_or(0),
                time_recv: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
                type_bits: row.get(4)?,
                thread_id: row.get(5)?,
                part_count: row.get::<_, Option<i64>>(6)?.unwrap_or(0),
                mms_id: row.get(7)?,
                reactions: if with_reactions {
                    column_bytes(row.get_ref(8)?)?
                } else {
                    None
                },
            });
        }
        drop(rows);
        drop(stmt);

        let mut messages = Vec::with_capacity(raw.len());
        for row in raw {
            messages.push(self.build_message(db, row)?);
        }
        Ok(messages)
    }

    fn build_message(&mut self, db: &Connection, row: MessageRow) -> Result<Message> {
        let recipient = self.lookup_recipient(&row.address)?;

        // Body bytes are copied with their declared length, so text with
        // embedded NULs survives up to the String boundary.
        let mut text = match &row.body {
            Some(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            None => String::new(),
        };
        if let Some(synthetic) =
            msgtype::synthetic_body(row.type_bits, self.display_name_of(recipient))
        {
            text = synthetic;
        }

        let mut attachments = if row.part_count > 0 && row.mms_id >= 0 {
            self.parts_for_message(db, row.mms_id)?
        } else {
            Vec::new()
        };

        // A long-message attachment carries the full body; inline it and
        // hide the attachment.
        if let Some(pos) = attachments.iter().position(Attachment::is_long_text) {
            let long = attachments.remove(pos);
            let file_ref = long.file_ref.ok_or_else(|| {
                Error::lookup(format!(
                    "long-message attachment {}/{} has no payload",
                    long.row_id, long.attachment_id
                ))
            })?;
            text = self.read_attachment_text(&file_ref)?;
        }

        let mut mentions = Vec::new();
        if self.db_version >= 68 && row.mms_id >= 0 {
            mentions = self.mentions_for_message(db, row.mms_id)?;
            text = self.apply_mentions(&text, &mentions)?;
        }

        let mut reactions = Vec::new();
        if let Some(blob) = &row.reactions {
            reactions = self.decode_reactions(blob)?;
        }

        Ok(Message {
            recipient,
            text,
            time_sent: row.time_sent,
            time_recv: row.time_recv,
            type_bits: row.type_bits,
            thread_id: row.thread_id,
            attachments,
            mentions,
            reactions,
        })
    }

    fn mentions_for_message(&self, db: &Connection, mms_id: i64) -> Result<Vec<Mention>> {
        let mut stmt = db.prepare(
            "SELECT recipient_id FROM mention WHERE message_id = ?1 ORDER BY range_start",
        )?;
        let mut rows = stmt.query([mms_id])?;
        let mut mentions = Vec::new();
        while let Some(row) = rows.next()? {
            let id = RecipientId::Modern(row.get(0)?);
            mentions.push(Mention { recipient: self.lookup_recipient(&id)? });
        }
        Ok(mentions)
    }

    /// Replace each successive U+FFFC with `@<display name>`.
    ///
    /// The placeholder count must match the mention count exactly; a
    /// leftover on either side means the row and the mention table
    /// disagree.
    fn apply_mentions(&self, text: &str, mentions: &[Mention]) -> Result<String> {
        let mut out = String::with_capacity(text.len());
        let mut pending = mentions.iter();
        for ch in text.chars() {
            if ch == MENTION_PLACEHOLDER {
                let mention = pending.next().ok_or_else(|| {
                    Error::corruption("message text has more mention placeholders than mentions")
                })?;
                out.push('@');
                out.push_str(self.display_name_of(mention.recipient));
            } else {
                out.push(ch);
            }
        }
        if pending.next().is_some() {
            return Err(Error::corruption(
                "message has more mentions than placeholders in its text",
            ));
        }
        Ok(out)
    }

    fn decode_reactions(&self, blob: &[u8]) -> Result<Vec<Reaction>> {
        let list = sigvault_proto::decode_reaction_list(blob)
            .map_err(|e| Error::format(format!("reactions column: {e}")))?;
        let mut reactions = Vec::with_capacity(list.len());
        for r in list {
            let id = RecipientId::Modern(r.author);
            reactions.push(Reaction {
                recipient: self.lookup_recipient(&id)?,
                emoji: r.emoji,
                time_sent: r.sent_time,
                time_recv: r.received_time,
            });
        }
        Ok(reactions)
    }
}

/// The SMS/MMS union. The two arms differ only in column origin: SMS
/// stores `date_sent`/`date` and `type`, MMS stores `date`/`date_received`
/// and `msg_box`, and only MMS rows have parts and a usable row id.
fn message_query(with_reactions: bool, filtered: bool) -> String {
    let reactions = if with_reactions { ", reactions" } else { "" };
    let filter = if filtered { " WHERE thread_id = ?1" } else { "" };
    format!(
        "SELECT address, body, date_sent, date AS date_received, type, thread_id, \
         0 AS part_count, -1 AS mms_id{reactions} FROM sms{filter} \
         UNION ALL \
         SELECT address, body, date, date_received, msg_box, thread_id, \
         part_count, _id{reactions} FROM mms{filter} \
         ORDER BY date_received"
    )
}

/// Read a nullable text or blob column as raw bytes.
fn column_bytes(value: ValueRef<'_>) -> Result<Option<Vec<u8>>> {
    match value {
        ValueRef::Null => Ok(None),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => Ok(Some(bytes.to_vec())),
        other => Err(Error::format(format!(
            "expected text or blob column, found {}",
            other.data_type()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_query_shape() {
        let q = message_query(true, true);
        assert!(q.contains("FROM sms WHERE thread_id = ?1"));
        assert!(q.contains("FROM mms WHERE thread_id = ?1"));
        assert!(q.contains(", reactions FROM sms"));
        assert!(q.ends_with("ORDER BY date_received"));

        let q = message_query(false, false);
        assert!(!q.contains("reactions"));
        assert!(!q.contains("WHERE"));
    }
}
