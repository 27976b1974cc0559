//! The `ReactionList` blob stored in the `reactions` column (schema ≥ 37).

use crate::DecodeError;
use crate::cursor::{Cursor, WIRE_LEN, WIRE_VARINT, expect_wire};

/// One reaction to a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reaction {
    /// Recipient row id of the reacting account.
    pub author: i64,
    /// The reaction emoji.
    pub emoji: String,
    /// Milliseconds since epoch the reaction was sent.
    pub sent_time: i64,
    /// Milliseconds since epoch the reaction was received.
    pub received_time: i64,
}

fn decode_reaction(buf: &[u8]) -> Result<Reaction, DecodeError> {
    let mut cur = Cursor::from_slice(buf);
    let mut author = None;
    let mut emoji = None;
    let mut sent_time = None;
    let mut received_time = None;

    fn set_i64(
        cur: &mut Cursor<'_>,
        field: u32,
        wire: u8,
        slot: &mut Option<i64>,
    ) -> Result<(), DecodeError> {
        expect_wire(field, wire, WIRE_VARINT)?;
        if slot.is_some() {
            return Err(DecodeError::DuplicateField { field });
        }
        *slot = Some(cur.read_varint()? as i64);
        Ok(())
    }

    while !cur.is_empty() {
        let (field, wire) = cur.read_tag()?;
        match field {
            1 => set_i64(&mut cur, field, wire, &mut author)?,
            2 => {
                expect_wire(field, wire, WIRE_LEN)?;
                if emoji.is_some() {
                    return Err(DecodeError::DuplicateField { field });
                }
                let bytes = cur.read_len_prefixed()?.to_vec();
                let s = String::from_utf8(bytes)
                    .map_err(|_| DecodeError::InvalidUtf8 { field })?;
                emoji = Some(s);
            }
            3 => set_i64(&mut cur, field, wire, &mut sent_time)?,
            4 => set_i64(&mut cur, field, wire, &mut received_time)?,
            _ => return Err(DecodeError::UnknownField { field }),
        }
    }

    // Zero-valued fields are omitted on the wire; default them.
    Ok(Reaction {
        author: author.unwrap_or(0),
        emoji: emoji.unwrap_or_default(),
        sent_time: sent_time.unwrap_or(0),
        received_time: received_time.unwrap_or(0),
    })
}

/// Decode a `ReactionList` (`1 reactions (repeated Reaction)`).
pub fn decode_reaction_list(buf: &[u8]) -> Result<Vec<Reaction>, DecodeError> {
    let mut cur = Cursor::from_slice(buf);
    let mut reactions = Vec::new();
    while !cur.is_empty() {
        let (field, wire) = cur.read_tag()?;
        match field {
            1 => {
                expect_wire(field, wire, WIRE_LEN)?;
                let bytes = cur.read_len_prefixed()?;
                reactions.push(decode_reaction(bytes)?);
            }
            _ => return Err(DecodeError::UnknownField { field }),
        }
    }
    Ok(reactions)
}
