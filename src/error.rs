//! Decode-time error surface.

use serde::Serialize;

/// Errors raised while decoding blocks, records, items, or fields.
///
/// Decode results carry these as values: a field failure is recorded on the
/// field and its item, a framing failure on the record or block. Only the
/// schema loader returns `Result` at the API boundary.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize)]
pub enum DecodeError {
    /// A read past the end of the buffer.
    #[error("need {need} bytes, have {have}")]
    Underrun { need: usize, have: usize },

    /// No schema registered for the block's category number.
    #[error("unsupported category {0}")]
    UnsupportedCategory(u8),

    /// FSPEC chain truncated or longer than the permitted maximum.
    #[error("malformed FSPEC: {0}")]
    MalformedFspec(String),

    /// FSPEC selected an item id with no definition in the category.
    #[error("unknown data item {0}")]
    UnknownItem(String),

    /// A field could not be converted to its declared type.
    #[error("invalid value for field {field}: {reason}")]
    InvalidFieldValue { field: String, reason: String },

    /// Sum of record lengths plus the 3-byte header disagrees with the
    /// declared block length.
    #[error("record lengths sum to {actual}, block declares {declared}")]
    RecordLengthMismatch { declared: usize, actual: usize },

    /// More records in one block than the decoder is willing to produce.
    #[error("record limit of {0} per block exceeded")]
    RecordLimitExceeded(usize),
}

pub type Result<T> = std::result::Result<T, DecodeError>;
