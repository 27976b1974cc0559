//! Decoding of the `type` / `msg_box` bit field.
//!
//! The column mixes a base type in the low five bits with flag bits above
//! it, mirroring the Android client's encoding. [`synthetic_body`] turns
//! the special combinations into the display text the app would show in
//! place of a body.

pub(crate) const BASE_TYPE_MASK: i64 = 0x1f;

// Base types.
pub(crate) const INCOMING_AUDIO_CALL: i64 = 1;
pub(crate) const OUTGOING_AUDIO_CALL: i64 = 2;
pub(crate) const MISSED_AUDIO_CALL: i64 = 3;
pub(crate) const JOINED: i64 = 4;
pub(crate) const UNSUPPORTED_MESSAGE: i64 = 5;
pub(crate) const INVALID_MESSAGE: i64 = 6;
pub(crate) const PROFILE_CHANGE: i64 = 7;
pub(crate) const MISSED_VIDEO_CALL: i64 = 8;
pub(crate) const GV1_MIGRATION: i64 = 9;
pub(crate) const INCOMING_VIDEO_CALL: i64 = 10;
pub(crate) const OUTGOING_VIDEO_CALL: i64 = 11;
pub(crate) const BASE_OUTBOX: i64 = 21;
pub(crate) const BASE_SENDING: i64 = 22;
pub(crate) const BASE_SENT: i64 = 23;
pub(crate) const BASE_SENT_FAILED: i64 = 24;
pub(crate) const BASE_PENDING_SECURE_SMS_FALLBACK: i64 = 25;
pub(crate) const BASE_PENDING_INSECURE_SMS_FALLBACK: i64 = 26;

// Key exchange flags.
pub(crate) const KEY_EXCHANGE: i64 = 0x8000;
pub(crate) const KEY_EXCHANGE_IDENTITY_VERIFIED: i64 = 0x4000;
pub(crate) const KEY_EXCHANGE_IDENTITY_DEFAULT: i64 = 0x2000;
pub(crate) const KEY_EXCHANGE_CORRUPTED: i64 = 0x1000;
pub(crate) const KEY_EXCHANGE_INVALID_VERSION: i64 = 0x800;
pub(crate) const KEY_EXCHANGE_BUNDLE: i64 = 0x400;
pub(crate) const KEY_EXCHANGE_IDENTITY_UPDATE: i64 = 0x200;

// Secure-message flags.
pub(crate) const END_SESSION: i64 = 0x40_0000;

// Group flags.
pub(crate) const GROUP_UPDATE: i64 = 0x1_0000;
pub(crate) const GROUP_QUIT: i64 = 0x2_0000;

// Remote-encryption flags.
pub(crate) const ENCRYPTION_REMOTE: i64 = 0x2000_0000;
pub(crate) const ENCRYPTION_REMOTE_FAILED: i64 = 0x1000_0000;
pub(crate) const ENCRYPTION_REMOTE_NO_SESSION: i64 = 0x0800_0000;
pub(crate) const ENCRYPTION_REMOTE_DUPLICATE: i64 = 0x0400_0000;
pub(crate) const ENCRYPTION_REMOTE_LEGACY: i64 = 0x0200_0000;

/// The base type in the low five bits.
pub(crate) fn base_type(type_bits: i64) -> i64 {
    type_bits & BASE_TYPE_MASK
}

/// Whether the message was sent by the backup's owner.
pub(crate) fn is_outgoing(type_bits: i64) -> bool {
    matches!(
        base_type(type_bits),
        BASE_OUTBOX
            | BASE_SENDING
            | BASE_SENT
            | BASE_SENT_FAILED
            | BASE_PENDING_SECURE_SMS_FALLBACK
            | BASE_PENDING_INSECURE_SMS_FALLBACK
            | OUTGOING_AUDIO_CALL
            | OUTGOING_VIDEO_CALL
    )
}

/// Display text for messages whose `type` marks them as something other
/// than plain text, or `None` when the stored body is the content.
///
/// Flag checks run in a fixed priority order and the first match wins;
/// `name` is the display name of the message's counterparty.
pub(crate) fn synthetic_body(type_bits: i64, name: &str) -> Option<String> {
    let outgoing = is_outgoing(type_bits);

    if type_bits & ENCRYPTION_REMOTE_FAILED != 0 {
        return Some("Bad encrypted message".into());
    }
    if type_bits & ENCRYPTION_REMOTE_NO_SESSION != 0 {
        return Some("Message encrypted for non-existing session".into());
    }
    if type_bits & ENCRYPTION_REMOTE_DUPLICATE != 0 {
        return Some("Duplicate message".into());
    }
    if type_bits & (ENCRYPTION_REMOTE_LEGACY | ENCRYPTION_REMOTE) != 0 {
        return Some(
            "Encrypted message sent from an older version of Signal that is no longer supported"
                .into(),
        );
    }
    if type_bits & GROUP_UPDATE != 0 {
        return Some(if outgoing {
            "You updated the group".into()
        } else {
            format!("{name} updated the group")
        });
    }
    if type_bits & GROUP_QUIT != 0 {
        return Some(if outgoing {
            "You have left the group".into()
        } else {
            format!("{name} has left the group")
        });
    }
    if type_bits & END_SESSION != 0 {
        return Some(if outgoing {
            "You reset the secure session".into()
        } else {
            format!("{name} reset the secure session")
        });
    }
    if type_bits & KEY_EXCHANGE_IDENTITY_VERIFIED != 0 {
        return Some(if outgoing {
            format!("You marked your safety number with {name} verified")
        } else {
            format!("You marked your safety number with {name} verified from another device")
        });
    }
    if type_bits & KEY_EXCHANGE_IDENTITY_DEFAULT != 0 {
        return Some(if outgoing {
            format!("You marked your safety number with {name} unverified")
        } else {
            format!("You marked your safety number with {name} unverified from another device")
        });
    }
    if type_bits & KEY_EXCHANGE_CORRUPTED != 0 {
        return Some("Corrupt key exchange message".into());
    }
    if type_bits & KEY_EXCHANGE_INVALID_VERSION != 0 {
        return Some("Key exchange message for invalid protocol version".into());
    }
    if type_bits & KEY_EXCHANGE_BUNDLE != 0 {
        return Some("Message with new safety number".into());
    }
    if type_bits & KEY_EXCHANGE_IDENTITY_UPDATE != 0 {
        return Some(format!("Your safety number with {name} has changed"));
    }
    if type_bits & KEY_EXCHANGE != 0 {
        return Some("Key exchange message".into());
    }

    match base_type(type_bits) {
        INCOMING_AUDIO_CALL | INCOMING_VIDEO_CALL => Some(format!("{name} called you")),
        OUTGOING_AUDIO_CALL | OUTGOING_VIDEO_CALL => Some(format!("Called {name}")),
        MISSED_AUDIO_CALL => Some(format!("Missed audio call from {name}")),
        MISSED_VIDEO_CALL => Some(format!("Missed video call from {name}")),
        JOINED => Some(format!("{name} is on Signal")),
        UNSUPPORTED_MESSAGE => Some("Unsupported message".into()),
        INVALID_MESSAGE => Some("Invalid message".into()),
        PROFILE_CHANGE => Some(format!("{name} changed their profile")),
        GV1_MIGRATION => Some("This group was updated to a new group".into()),
        _ => None,
    }
}
