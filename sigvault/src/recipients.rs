//! Recipients: contacts, groups, and the version-aware cache.

use std::collections::BTreeMap;
use std::fmt;

use rusqlite::Connection;
use rusqlite::types::ValueRef;

use crate::backup::Backup;
use crate::error::{Error, Result};

/// Key of a recipient row.
///
/// Backups with schema version < 24 identify recipients by phone number,
/// e-mail address or group id string; later versions use the row id of the
/// `recipient` table.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum RecipientId {
    /// Phone, e-mail or group id string (schema < 24).
    Legacy(String),
    /// `recipient._id` (schema ≥ 24).
    Modern(i64),
}

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy(s) => write!(f, "{s}"),
            Self::Modern(id) => write!(f, "{id}"),
        }
    }
}

/// Stable index into the recipient arena of one [`Backup`].
///
/// Messages, mentions and reactions carry these instead of owned
/// recipients, so one cache entry backs every reference to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecipientRef(pub(crate) usize);

/// A single contact.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Contact {
    /// Phone number in E.164 form.
    pub phone: Option<String>,
    /// E-mail address.
    pub email: Option<String>,
    /// Name from the device's address book.
    pub system_display_name: Option<String>,
    /// Label of the address-book phone entry.
    pub system_phone_label: Option<String>,
    /// Profile given name.
    pub profile_name: Option<String>,
    /// Profile family name (schema ≥ 43).
    pub profile_family_name: Option<String>,
    /// Joined profile name (schema ≥ 43).
    pub profile_joined_name: Option<String>,
}

/// A group chat.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Group {
    /// Group title.
    pub name: Option<String>,
}

/// A message counterparty: either a contact or a group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Recipient {
    /// An individual contact.
    Contact(Contact),
    /// A group.
    Group(Group),
}

impl Recipient {
    /// Best available display name.
    ///
    /// Contacts fall back through address-book name, joined profile name,
    /// profile name, phone and e-mail; groups use their title. `"Unknown"`
    /// when nothing is set.
    pub fn display_name(&self) -> &str {
        match self {
            Self::Contact(c) => c
                .system_display_name
                .as_deref()
                .or(c.profile_joined_name.as_deref())
                .or(c.profile_name.as_deref())
                .or(c.phone.as_deref())
                .or(c.email.as_deref())
                .unwrap_or("Unknown"),
            Self::Group(g) => g.name.as_deref().unwrap_or("Unknown"),
        }
    }
}

/// Arena of recipients plus an ordered id → index map.
#[derive(Debug, Default)]
pub(crate) struct RecipientCache {
    arena: Vec<Recipient>,
    index: BTreeMap<RecipientId, usize>,
}

impl RecipientCache {
    fn insert(&mut self, id: RecipientId, recipient: Recipient) {
        let slot = self.arena.len();
        self.arena.push(recipient);
        self.index.insert(id, slot);
    }

    pub(crate) fn get(&self, r: RecipientRef) -> Option<&Recipient> {
        self.arena.get(r.0)
    }

    fn len(&self) -> usize {
        self.arena.len()
    }
}

impl Backup {
    /// The recipient a [`RecipientRef`] points at.
    ///
    /// `None` if the cache has not been built yet; refs are only handed
    /// out by queries, which build it.
    pub fn recipient(&self, r: RecipientRef) -> Option<&Recipient> {
        self.recipients.as_ref().and_then(|c| c.get(r))
    }

    /// Build the recipient cache if it does not exist yet.
    pub(crate) fn load_recipients(&mut self, db: &Connection) -> Result<()> {
        if self.recipients.is_some() {
            return Ok(());
        }
        let mut cache = RecipientCache::default();
        if self.db_version < 24 {
            load_legacy(db, &mut cache)?;
        } else {
            load_modern(db, self.db_version, &mut cache)?;
        }
        log::debug!("[sigvault] recipient cache built: {} entries", cache.len());
        self.recipients = Some(cache);
        Ok(())
    }

    /// Resolve a recipient id, failing on unknown ids.
    pub(crate) fn lookup_recipient(&self, id: &RecipientId) -> Result<RecipientRef> {
        self.recipients
            .as_ref()
            .and_then(|c| c.index.get(id).copied())
            .map(RecipientRef)
            .ok_or_else(|| Error::lookup(format!("unknown recipient {id}")))
    }

    /// Display name behind a ref; `"Unknown"` if the ref is dangling.
    pub(crate) fn display_name_of(&self, r: RecipientRef) -> &str {
        self.recipient(r).map_or("Unknown", Recipient::display_name)
    }

    /// Read a recipient-id column, which is a string in legacy schemas and
    /// a row id in modern ones.
    pub(crate) fn recipient_id_from(&self, value: ValueRef<'_>) -> Result<RecipientId> {
        if self.db_version < 24 {
            match value {
                ValueRef::Text(bytes) => Ok(RecipientId::Legacy(
                    String::from_utf8_lossy(bytes).into_owned(),
                )),
                other => Err(Error::format(format!(
                    "legacy recipient id column holds {} instead of text",
                    other.data_type()
                ))),
            }
        } else {
            match value {
                ValueRef::Integer(id) => Ok(RecipientId::Modern(id)),
                ValueRef::Text(bytes) => String::from_utf8_lossy(bytes)
                    .parse::<i64>()
                    .map(RecipientId::Modern)
                    .map_err(|_| Error::format("recipient id column is not an integer")),
                other => Err(Error::format(format!(
                    "recipient id column holds {} instead of an integer",
                    other.data_type()
                ))),
            }
        }
    }
}

fn load_legacy(db: &Connection, cache: &mut RecipientCache) -> Result<()> {
    let mut stmt = db.prepare(
        "SELECT r.recipient_ids, g.group_id, r.system_display_name, \
                r.system_phone_label, r.signal_profile_name, g.title \
         FROM recipient_preferences AS r \
         LEFT JOIN groups AS g ON r.recipient_ids = g.group_id \
         ORDER BY r._id",
    )?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let id: String = row.get(0)?;
        let group_id: Option<String> = row.get(1)?;
        let recipient = if group_id.is_some() {
            Recipient::Group(Group { name: row.get(5)? })
        } else {
            let (phone, email) = if id.contains('@') {
                (None, Some(id.clone()))
            } else {
                (Some(id.clone()), None)
            };
            Recipient::Contact(Contact {
                phone,
                email,
                system_display_name: row.get(2)?,
                system_phone_label: row.get(3)?,
                profile_name: row.get(4)?,
                ..Contact::default()
            })
        };
        cache.insert(RecipientId::Legacy(id), recipient);
    }
    Ok(())
}

fn load_modern(db: &Connection, version: u32, cache: &mut RecipientCache) -> Result<()> {
    // Signal split signal_profile_name into given/family parts in 43.
    let profile_cols = if version >= 43 {
        "r.profile_family_name, r.profile_joined_name"
    } else {
        "NULL, NULL"
    };
    let sql = format!(
        "SELECT r._id, r.group_id, r.phone, r.email, r.system_display_name, \
                r.system_phone_label, r.signal_profile_name, {profile_cols}, g.title \
         FROM recipient AS r \
         LEFT JOIN groups AS g ON r.group_id = g.group_id \
         ORDER BY r._id"
    );
    let mut stmt = db.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let id: i64 = row.get(0)?;
        let group_id: Option<String> = row.get(1)?;
        let recipient = if group_id.is_some() {
            Recipient::Group(Group { name: row.get(9)? })
        } else {
            Recipient::Contact(Contact {
                phone: row.get(2)?,
                email: row.get(3)?,
                system_display_name: row.get(4)?,
                system_phone_label: row.get(5)?,
                profile_name: row.get(6)?,
                profile_family_name: row.get(7)?,
                profile_joined_name: row.get(8)?,
            })
        };
        cache.insert(RecipientId::Modern(id), recipient);
    }
    Ok(())
}
