use thiserror::Error;

use orb_heap::PayloadDecodeError;
use orb_types::{OidParseError, ValueFromJsonError};

/// Errors from writing a snapshot.
#[derive(Debug, Error)]
pub enum DumpError {
    /// I/O failure while creating directories or writing space files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON emission failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Errors from reading a snapshot back.
///
/// These cover malformed external input and resource failures — both
/// recoverable at the load boundary. Snapshot states that can only mean
/// corruption (a payload record for an object that already has one, an
/// agenda payload record) are fatal instead and panic.
#[derive(Debug, Error)]
pub enum LoadError {
    /// I/O failure while reading the snapshot directory or a space file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A space file does not contain well-formed JSON.
    #[error("malformed JSON in {file}")]
    Json {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    /// A space file's top level is not an object keyed by oid.
    #[error("{file}: top level is not an object keyed by oid")]
    NotAnObject { file: String },

    /// A file in the snapshot directory resembles a space file but its
    /// name does not embed a valid space oid.
    #[error("{file}: not a valid space file name")]
    BadSpaceFile { file: String },

    /// An identifier failed to decode.
    #[error("invalid oid {text:?}")]
    BadOid {
        text: String,
        #[source]
        source: OidParseError,
    },

    /// A record key disagrees with the record's own `"oid"` field.
    #[error("record key {key:?} disagrees with \"oid\" field {field:?}")]
    OidMismatch { key: String, field: String },

    /// A record is structurally malformed.
    #[error("record {oid}: {reason}")]
    Malformed { oid: String, reason: String },

    /// A record names a payload kind with no registered decoder.
    #[error("record {oid}: unknown payload kind {kind:?}")]
    UnknownPayloadKind { oid: String, kind: String },

    /// A payload body failed to decode.
    #[error("record {oid}: payload decode failed")]
    Payload {
        oid: String,
        #[source]
        source: PayloadDecodeError,
    },

    /// An attribute or component value failed to decode.
    #[error("record {oid}: value decode failed")]
    BadValue {
        oid: String,
        #[source]
        source: ValueFromJsonError,
    },
}

/// Result alias for dump operations.
pub type DumpResult<T> = Result<T, DumpError>;

/// Result alias for load operations.
pub type LoadResult<T> = Result<T, LoadError>;
