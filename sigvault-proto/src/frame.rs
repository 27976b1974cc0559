//! The `BackupFrame` message and its submessages.

use crate::DecodeError;
use crate::cursor::{Cursor, WIRE_FIXED64, WIRE_LEN, WIRE_VARINT, expect_wire};

// ─── Types ───────────────────────────────────────────────────────────────────

/// One decoded top-level record of a backup file.
///
/// Exactly one variant is present per frame; a frame setting none or
/// several of the schema's fields is rejected at decode time.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    /// The unencrypted first record: IV and key-derivation salt.
    Header(Header),
    /// A recorded SQL statement with bound parameters.
    Statement(SqlStatement),
    /// One shared-preference entry.
    Preference(SharedPreference),
    /// An attachment descriptor; its payload follows the frame.
    Attachment(Attachment),
    /// The schema version of the recorded database.
    Version(DatabaseVersion),
    /// Marks the end of the backup.
    End,
    /// A recipient avatar descriptor; its payload follows the frame.
    Avatar(Avatar),
    /// A sticker descriptor; its payload follows the frame.
    Sticker(Sticker),
}

/// `Header`: `1 iv (bytes)`, `2 salt (bytes)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    /// 16-byte AES-CTR initialization vector.
    pub iv: Vec<u8>,
    /// Key-derivation salt, absent in very old backups.
    pub salt: Option<Vec<u8>>,
}

/// `SqlStatement`: `1 statement (string)`, `2 parameters (repeated)`.
#[derive(Clone, Debug, PartialEq)]
pub struct SqlStatement {
    /// The SQL text, with `?` placeholders for the parameters.
    pub statement: String,
    /// Positional parameters, in binding order.
    pub parameters: Vec<SqlParameter>,
}

/// One bound SQL parameter.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlParameter {
    /// `1 stringParameter`.
    String(String),
    /// `2 integerParameter`, bound as a 64-bit integer.
    Integer(i64),
    /// `3 doubleParameter`.
    Double(f64),
    /// `4 blobParameter`.
    Blob(Vec<u8>),
    /// `5 nullParameter`.
    Null,
}

/// `SharedPreference`: `1 file`, `2 key`, `3 value`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SharedPreference {
    /// Name of the preference file the entry belongs to.
    pub file: String,
    /// Preference key.
    pub key: String,
    /// Preference value; may be absent.
    pub value: Option<String>,
}

/// `Attachment`: `1 rowId`, `2 attachmentId`, `3 length`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Attachment {
    /// `part` table row id.
    pub row_id: u64,
    /// The part's `unique_id`.
    pub attachment_id: u64,
    /// Payload length in bytes; a payload-bearing frame must declare it.
    pub length: Option<u32>,
}

/// `DatabaseVersion`: `1 version`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DatabaseVersion {
    /// The `user_version` of the recorded database.
    pub version: u32,
}

/// `Avatar`: `1 name`, `2 length`, `3 recipientId`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Avatar {
    /// Legacy recipient identifier (phone/email/group id).
    pub name: Option<String>,
    /// Payload length in bytes.
    pub length: Option<u32>,
    /// Modern recipient row id, as a string.
    pub recipient_id: Option<String>,
}

/// `Sticker`: `1 rowId`, `2 length`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sticker {
    /// `sticker` table row id.
    pub row_id: u64,
    /// Payload length in bytes.
    pub length: Option<u32>,
}

// ─── Field helpers ───────────────────────────────────────────────────────────

fn set_bytes(
    cur: &mut Cursor<'_>,
    field: u32,
    wire: u8,
    slot: &mut Option<Vec<u8>>,
) -> Result<(), DecodeError> {
    expect_wire(field, wire, WIRE_LEN)?;
    if slot.is_some() {
        return Err(DecodeError::DuplicateField { field });
    }
    *slot = Some(cur.read_len_prefixed()?.to_vec());
    Ok(())
}

fn set_string(
    cur: &mut Cursor<'_>,
    field: u32,
    wire: u8,
    slot: &mut Option<String>,
) -> Result<(), DecodeError> {
    expect_wire(field, wire, WIRE_LEN)?;
    if slot.is_some() {
        return Err(DecodeError::DuplicateField { field });
    }
    let bytes = cur.read_len_prefixed()?.to_vec();
    let s = String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8 { field })?;
    *slot = Some(s);
    Ok(())
}

fn set_u64(
    cur: &mut Cursor<'_>,
    field: u32,
    wire: u8,
    slot: &mut Option<u64>,
) -> Result<(), DecodeError> {
    expect_wire(field, wire, WIRE_VARINT)?;
    if slot.is_some() {
        return Err(DecodeError::DuplicateField { field });
    }
    *slot = Some(cur.read_varint()?);
    Ok(())
}

fn set_u32(
    cur: &mut Cursor<'_>,
    field: u32,
    wire: u8,
    slot: &mut Option<u32>,
) -> Result<(), DecodeError> {
    expect_wire(field, wire, WIRE_VARINT)?;
    if slot.is_some() {
        return Err(DecodeError::DuplicateField { field });
    }
    let v = cur.read_varint()?;
    let v = u32::try_from(v).map_err(|_| DecodeError::IntegerOverflow { field })?;
    *slot = Some(v);
    Ok(())
}

// ─── Submessage decoders ─────────────────────────────────────────────────────

fn decode_header(buf: &[u8]) -> Result<Header, DecodeError> {
    let mut cur = Cursor::from_slice(buf);
    let mut iv = None;
    let mut salt = None;
    while !cur.is_empty() {
        let (field, wire) = cur.read_tag()?;
        match field {
            1 => set_bytes(&mut cur, field, wire, &mut iv)?,
            2 => set_bytes(&mut cur, field, wire, &mut salt)?,
            _ => return Err(DecodeError::UnknownField { field }),
        }
    }
    let iv = iv.ok_or(DecodeError::MissingField { name: "header.iv" })?;
    Ok(Header { iv, salt })
}

fn decode_parameter(buf: &[u8]) -> Result<SqlParameter, DecodeError> {
    let mut cur = Cursor::from_slice(buf);
    let mut value: Option<SqlParameter> = None;
    while !cur.is_empty() {
        let (field, wire) = cur.read_tag()?;
        let param = match field {
            1 => {
                let mut s = None;
                set_string(&mut cur, field, wire, &mut s)?;
                SqlParameter::String(s.unwrap_or_default())
            }
            2 => {
                expect_wire(field, wire, WIRE_VARINT)?;
                SqlParameter::Integer(cur.read_varint()? as i64)
            }
            3 => {
                expect_wire(field, wire, WIRE_FIXED64)?;
                SqlParameter::Double(f64::from_bits(cur.read_fixed64()?))
            }
            4 => {
                let mut b = None;
                set_bytes(&mut cur, field, wire, &mut b)?;
                SqlParameter::Blob(b.unwrap_or_default())
            }
            5 => {
                expect_wire(field, wire, WIRE_VARINT)?;
                let _ = cur.read_varint()?;
                SqlParameter::Null
            }
            _ => return Err(DecodeError::UnknownField { field }),
        };
        if value.is_some() {
            return Err(DecodeError::ConflictingVariants);
        }
        value = Some(param);
    }
    value.ok_or(DecodeError::MissingVariant)
}

fn decode_statement(buf: &[u8]) -> Result<SqlStatement, DecodeError> {
    let mut cur = Cursor::from_slice(buf);
    let mut statement = None;
    let mut parameters = Vec::new();
    while !cur.is_empty() {
        let (field, wire) = cur.read_tag()?;
        match field {
            1 => set_string(&mut cur, field, wire, &mut statement)?,
            2 => {
                expect_wire(field, wire, WIRE_LEN)?;
                let bytes = cur.read_len_prefixed()?;
                parameters.push(decode_parameter(bytes)?);
            }
            _ => return Err(DecodeError::UnknownField { field }),
        }
    }
    let statement = statement.ok_or(DecodeError::MissingField {
        name: "statement.statement",
    })?;
    Ok(SqlStatement { statement, parameters })
}

fn decode_preference(buf: &[u8]) -> Result<SharedPreference, DecodeError> {
    let mut cur = Cursor::from_slice(buf);
    let mut file = None;
    let mut key = None;
    let mut value = None;
    while !cur.is_empty() {
        let (field, wire) = cur.read_tag()?;
        match field {
            1 => set_string(&mut cur, field, wire, &mut file)?,
            2 => set_string(&mut cur, field, wire, &mut key)?,
            3 => set_string(&mut cur, field, wire, &mut value)?,
            _ => return Err(DecodeError::UnknownField { field }),
        }
    }
    let file = file.ok_or(DecodeError::MissingField { name: "preference.file" })?;
    let key = key.ok_or(DecodeError::MissingField { name: "preference.key" })?;
    Ok(SharedPreference { file, key, value })
}

fn decode_attachment(buf: &[u8]) -> Result<Attachment, DecodeError> {
    let mut cur = Cursor::from_slice(buf);
    let mut row_id = None;
    let mut attachment_id = None;
    let mut length = None;
    while !cur.is_empty() {
        let (field, wire) = cur.read_tag()?;
        match field {
            1 => set_u64(&mut cur, field, wire, &mut row_id)?,
            2 => set_u64(&mut cur, field, wire, &mut attachment_id)?,
            3 => set_u32(&mut cur, field, wire, &mut length)?,
            _ => return Err(DecodeError::UnknownField { field }),
        }
    }
    let row_id = row_id.ok_or(DecodeError::MissingField { name: "attachment.rowId" })?;
    let attachment_id = attachment_id.ok_or(DecodeError::MissingField {
        name: "attachment.attachmentId",
    })?;
    Ok(Attachment { row_id, attachment_id, length })
}

fn decode_version(buf: &[u8]) -> Result<DatabaseVersion, DecodeError> {
    let mut cur = Cursor::from_slice(buf);
    let mut version = None;
    while !cur.is_empty() {
        let (field, wire) = cur.read_tag()?;
        match field {
            1 => set_u32(&mut cur, field, wire, &mut version)?,
            _ => return Err(DecodeError::UnknownField { field }),
        }
    }
    let version = version.ok_or(DecodeError::MissingField { name: "version.version" })?;
    Ok(DatabaseVersion { version })
}

fn decode_avatar(buf: &[u8]) -> Result<Avatar, DecodeError> {
    let mut cur = Cursor::from_slice(buf);
    let mut name = None;
    let mut length = None;
    let mut recipient_id = None;
    while !cur.is_empty() {
        let (field, wire) = cur.read_tag()?;
        match field {
            1 => set_string(&mut cur, field, wire, &mut name)?,
            2 => set_u32(&mut cur, field, wire, &mut length)?,
            3 => set_string(&mut cur, field, wire, &mut recipient_id)?,
            _ => return Err(DecodeError::UnknownField { field }),
        }
    }
    Ok(Avatar { name, length, recipient_id })
}

fn decode_sticker(buf: &[u8]) -> Result<Sticker, DecodeError> {
    let mut cur = Cursor::from_slice(buf);
    let mut row_id = None;
    let mut length = None;
    while !cur.is_empty() {
        let (field, wire) = cur.read_tag()?;
        match field {
            1 => set_u64(&mut cur, field, wire, &mut row_id)?,
            2 => set_u32(&mut cur, field, wire, &mut length)?,
            _ => return Err(DecodeError::UnknownField { field }),
        }
    }
    let row_id = row_id.ok_or(DecodeError::MissingField { name: "sticker.rowId" })?;
    Ok(Sticker { row_id, length })
}

// ─── BackupFrame ─────────────────────────────────────────────────────────────

/// Decode one `BackupFrame` message.
///
/// Field numbers: `1 header, 2 statement, 3 preference, 4 attachment,
/// 5 version, 6 end, 7 avatar, 8 sticker`. Exactly one must be present.
pub fn decode_frame(buf: &[u8]) -> Result<Frame, DecodeError> {
    let mut cur = Cursor::from_slice(buf);
    let mut variant: Option<Frame> = None;
    let mut seen = [false; 9];

    while !cur.is_empty() {
        let (field, wire) = cur.read_tag()?;
        if let Some(flag) = seen.get_mut(field as usize) {
            if *flag {
                return Err(DecodeError::DuplicateField { field });
            }
            *flag = true;
        }
        let frame = match field {
            6 => {
                expect_wire(field, wire, WIRE_VARINT)?;
                let _ = cur.read_varint()?;
                Frame::End
            }
            1..=8 => {
                expect_wire(field, wire, WIRE_LEN)?;
                let bytes = cur.read_len_prefixed()?;
                match field {
                    1 => Frame::Header(decode_header(bytes)?),
                    2 => Frame::Statement(decode_statement(bytes)?),
                    3 => Frame::Preference(decode_preference(bytes)?),
                    4 => Frame::Attachment(decode_attachment(bytes)?),
                    5 => Frame::Version(decode_version(bytes)?),
                    7 => Frame::Avatar(decode_avatar(bytes)?),
                    _ => Frame::Sticker(decode_sticker(bytes)?),
                }
            }
            _ => return Err(DecodeError::UnknownField { field }),
        };
        if variant.is_some() {
            return Err(DecodeError::ConflictingVariants);
        }
        variant = Some(frame);
    }

    variant.ok_or(DecodeError::MissingVariant)
}
