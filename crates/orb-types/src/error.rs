use thiserror::Error;

/// Errors from decoding an oid out of untrusted text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OidParseError {
    #[error("wrong length: an oid is exactly 19 characters, got {0}")]
    WrongLength(usize),

    #[error("missing the leading '_' separator")]
    MissingSeparator,

    #[error("invalid base-62 digit {ch:?} at position {index}")]
    BadDigit { index: usize, ch: char },

    #[error("decoded value lies outside the valid oid band")]
    OutOfBand,

    #[error("decoded oid has a zero hash")]
    ZeroHash,
}

/// Errors from rebuilding a [`Value`](crate::Value) out of JSON.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValueFromJsonError {
    #[error("JSON null has no value form")]
    Null,

    #[error("unsupported JSON shape: {0}")]
    Unsupported(String),

    #[error("invalid oid reference")]
    BadOid(#[from] OidParseError),
}
