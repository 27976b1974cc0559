//! Database reconstruction by statement replay.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};
use sigvault_proto::{Frame, SqlParameter, SqlStatement};

use crate::backup::Backup;
use crate::error::{Error, Result};
use crate::frames::{FileRef, FrameEvent};

/// One avatar payload recorded during replay.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AvatarEntry {
    /// Legacy recipient identifier, present in old backups.
    pub name: Option<String>,
    /// Modern recipient row id, present in newer backups.
    pub recipient_id: Option<String>,
    /// Payload location.
    pub file_ref: FileRef,
}

/// One sticker payload recorded during replay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StickerEntry {
    /// `sticker` table row id.
    pub row_id: u64,
    /// Payload location.
    pub file_ref: FileRef,
}

impl Backup {
    /// Build the in-memory database and the attachment index.
    ///
    /// Rewinds and replays every recorded statement inside one
    /// transaction; attachment, avatar and sticker frames only record
    /// where their payloads live. Idempotent: a second call returns
    /// immediately. On failure no partial database is kept.
    pub fn materialize_database(&mut self) -> Result<()> {
        if self.db.is_some() {
            return Ok(());
        }
        let r = self.materialize();
        self.record(r)
    }

    fn materialize(&mut self) -> Result<()> {
        let conn = Connection::open_in_memory()?;
        self.rewind()?;
        conn.execute_batch("BEGIN")?;

        let mut index: BTreeMap<(i64, i64), FileRef> = BTreeMap::new();
        let mut prefs = Vec::new();
        let mut avatars = Vec::new();
        let mut stickers = Vec::new();
        let mut version = 0u32;
        let mut statements = 0u64;
        let mut saw_end = false;

        while let Some(FrameEvent { frame, payload }) = self.read_frame_event()? {
            match frame {
                Frame::Header(_) => {
                    return Err(Error::format(format!(
                        "frame {}: unexpected second header",
                        self.frame_index - 1
                    )));
                }
                Frame::Version(v) => {
                    conn.execute_batch(&format!("PRAGMA user_version = {}", v.version))?;
                    version = v.version;
                }
                Frame::Statement(s) => {
                    replay_statement(&conn, &s)?;
                    statements += 1;
                }
                Frame::Attachment(a) => {
                    let file_ref = require_payload(payload, self.frame_index)?;
                    index.insert((a.row_id as i64, a.attachment_id as i64), file_ref);
                }
                Frame::Avatar(a) => {
                    let file_ref = require_payload(payload, self.frame_index)?;
                    avatars.push(AvatarEntry {
                        name: a.name,
                        recipient_id: a.recipient_id,
                        file_ref,
                    });
                }
                Frame::Sticker(s) => {
                    let file_ref = require_payload(payload, self.frame_index)?;
                    stickers.push(StickerEntry { row_id: s.row_id, file_ref });
                }
                Frame::Preference(p) => prefs.push(p),
                Frame::End => {
                    saw_end = true;
                    break;
                }
            }
        }
        if !saw_end {
            return Err(Error::corruption(
                "backup ends without an end frame (truncated file?)",
            ));
        }
        conn.execute_batch("COMMIT")?;

        log::info!(
            "[sigvault] database replayed: version {version}, {statements} statements, {} attachments",
            index.len()
        );
        self.db = Some(conn);
        self.db_version = version;
        self.attachment_index = index;
        self.prefs = prefs;
        self.avatar_entries = avatars;
        self.sticker_entries = stickers;
        Ok(())
    }

    /// Write the materialized database to `path` as a SQLite file.
    pub fn export_sqlite(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let src = self.take_db()?;
        let r = export(&src, path.as_ref());
        self.put_db(src);
        self.record(r)
    }
}

fn export(src: &Connection, path: &Path) -> Result<()> {
    let mut dst = Connection::open(path)?;
    let backup = rusqlite::backup::Backup::new(src, &mut dst)?;
    backup.run_to_completion(128, Duration::ZERO, None)?;
    Ok(())
}

fn require_payload(payload: Option<FileRef>, frame_index: u64) -> Result<FileRef> {
    payload.ok_or_else(|| {
        Error::format(format!("frame {}: file frame without payload", frame_index - 1))
    })
}

fn replay_statement(conn: &Connection, stmt: &SqlStatement) -> Result<()> {
    // Tables under the sqlite_ prefix are reserved and recreated by SQLite
    // itself; replaying their CREATE would fail.
    if has_reserved_prefix(&stmt.statement) {
        log::debug!("[sigvault] skipping reserved statement: {}", stmt.statement);
        return Ok(());
    }
    let mut prepared = conn.prepare(&stmt.statement)?;
    let values = stmt.parameters.iter().map(param_value);
    prepared.execute(params_from_iter(values))?;
    Ok(())
}

fn param_value(param: &SqlParameter) -> Value {
    match param {
        SqlParameter::String(s) => Value::Text(s.clone()),
        SqlParameter::Integer(i) => Value::Integer(*i),
        SqlParameter::Double(d) => Value::Real(*d),
        SqlParameter::Blob(b) => Value::Blob(b.clone()),
        SqlParameter::Null => Value::Null,
    }
}

fn has_reserved_prefix(sql: &str) -> bool {
    const PREFIX: &[u8] = b"create table sqlite_";
    let bytes = sql.as_bytes();
    bytes.len() >= PREFIX.len() && bytes[..PREFIX.len()].eq_ignore_ascii_case(PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_prefix_is_case_insensitive() {
        assert!(has_reserved_prefix("CREATE TABLE sqlite_sequence(name,seq)"));
        assert!(has_reserved_prefix("create table SQLITE_stat1(tbl,idx,stat)"));
        assert!(!has_reserved_prefix("CREATE TABLE sms (_id INTEGER PRIMARY KEY)"));
        assert!(!has_reserved_prefix("CREATE TABLE sqlite"));
    }

    #[test]
    fn parameters_map_to_sql_values() {
        assert_eq!(param_value(&SqlParameter::Integer(42)), Value::Integer(42));
        assert_eq!(param_value(&SqlParameter::Null), Value::Null);
        assert_eq!(
            param_value(&SqlParameter::String("hi".into())),
            Value::Text("hi".into())
        );
    }
}
