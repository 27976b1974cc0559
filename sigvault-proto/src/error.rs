use std::fmt;

/// Errors produced while decoding a backup frame or an embedded blob.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// Ran out of bytes before the message was fully read.
    UnexpectedEof,
    /// A varint ran past 10 bytes or past 64 bits.
    VarintOverflow,
    /// A field carried a wire type other than the one its schema assigns.
    InvalidWireType {
        /// Field number the tag named.
        field: u32,
        /// Wire type found in the tag.
        wire: u8,
    },
    /// A field number the schema does not define (never skipped).
    UnknownField {
        /// The offending field number.
        field: u32,
    },
    /// A non-repeated field occurred more than once in one message.
    DuplicateField {
        /// The offending field number.
        field: u32,
    },
    /// A string field held invalid UTF-8.
    InvalidUtf8 {
        /// The offending field number.
        field: u32,
    },
    /// A varint value does not fit the field's integer width.
    IntegerOverflow {
        /// The offending field number.
        field: u32,
    },
    /// A field the schema requires was absent.
    MissingField {
        /// Dotted path of the absent field.
        name: &'static str,
    },
    /// A tagged-union message (frame, SQL parameter) had no variant set.
    MissingVariant,
    /// A tagged-union message had more than one variant set.
    ConflictingVariants,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof => write!(f, "unexpected end of message"),
            Self::VarintOverflow => write!(f, "varint longer than 10 bytes / 64 bits"),
            Self::InvalidWireType { field, wire } => {
                write!(f, "field {field}: invalid wire type {wire}")
            }
            Self::UnknownField { field } => write!(f, "unknown field number {field}"),
            Self::DuplicateField { field } => {
                write!(f, "field {field} occurs more than once")
            }
            Self::InvalidUtf8 { field } => write!(f, "field {field}: invalid UTF-8"),
            Self::IntegerOverflow { field } => {
                write!(f, "field {field}: value out of range")
            }
            Self::MissingField { name } => write!(f, "required field {name} is absent"),
            Self::MissingVariant => write!(f, "no variant field set"),
            Self::ConflictingVariants => write!(f, "more than one variant field set"),
        }
    }
}

impl std::error::Error for DecodeError {}
