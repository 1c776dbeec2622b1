//! The payload extension protocol.
//!
//! A payload is polymorphic data attached to exactly one object record.
//! The set of payload kinds is closed: [`Payload`] is a tagged enum, and
//! the kind discriminator doubles as the `"payload"` field of persisted
//! records. Every kind answers the same four-operation contract
//! ([`PayloadOps`]) so the collector and the persistence layer can treat
//! heterogeneous extensions uniformly.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value as Json};
use thiserror::Error;

use orb_agenda::Agenda;
use orb_types::{Oid, Value, ValueFromJsonError};

use crate::dict::StringDict;
use crate::gc::Marker;
use crate::strbuf::StrBuf;
use crate::symbol::Symbol;

/// JSON object map used for payload content emission and decoding.
pub type JsonMap = Map<String, Json>;

/// Discriminator over the known payload kinds.
///
/// [`PayloadKind::kind_name`] is the stable wire name written into the
/// `"payload"` field of snapshot records; [`PayloadKind::type_name`] is
/// the human-readable name used in diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    StringDict,
    StrBuf,
    Symbol,
    Agenda,
}

impl PayloadKind {
    /// Stable wire name (the JSON `"payload"` discriminator).
    pub fn kind_name(self) -> &'static str {
        match self {
            PayloadKind::StringDict => "string_dictionnary",
            PayloadKind::StrBuf => "strbuf",
            PayloadKind::Symbol => "symbol",
            PayloadKind::Agenda => "agenda",
        }
    }

    /// Human-readable type name.
    pub fn type_name(self) -> &'static str {
        match self {
            PayloadKind::StringDict => "string dictionary",
            PayloadKind::StrBuf => "string buffer",
            PayloadKind::Symbol => "symbol",
            PayloadKind::Agenda => "agenda",
        }
    }

    /// Reverse lookup from a wire name.
    pub fn from_kind_name(name: &str) -> Option<Self> {
        match name {
            "string_dictionnary" => Some(PayloadKind::StringDict),
            "strbuf" => Some(PayloadKind::StrBuf),
            "symbol" => Some(PayloadKind::Symbol),
            "agenda" => Some(PayloadKind::Agenda),
            _ => None,
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind_name())
    }
}

/// The four-operation contract every payload kind satisfies toward its
/// two collaborators, the garbage collector and the persistence layer.
pub trait PayloadOps {
    /// This payload's kind discriminator.
    fn kind(&self) -> PayloadKind;

    /// Mark every object the payload references. Pure traversal: the
    /// only side effect is on the marker's reachability state.
    fn mark(&self, marker: &mut Marker);

    /// Register every referenced object as needing a snapshot record.
    /// A no-op for transient payloads and for process-local kinds.
    fn dump_scan(&self, scan: &mut DumpScan);

    /// Emit the persisted state into `out`. Transient payloads leave it
    /// empty; object references the scan never planned are skipped.
    fn dump_json_content(&self, scan: &DumpScan, out: &mut JsonMap);

    /// Whether the collector may reclaim the owning object once it is
    /// otherwise unreferenced.
    fn is_erasable(&self) -> bool;
}

/// Scan state of the persistence pre-pass: the set of objects planned
/// for a record in the current dump, plus the worklist of objects whose
/// contents still await scanning.
#[derive(Debug, Default)]
pub struct DumpScan {
    planned: HashSet<Oid>,
    pending: VecDeque<Oid>,
}

impl DumpScan {
    /// Start an empty scan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Plan a record for `oid`. Null and invalid oids are ignored.
    pub fn register_oid(&mut self, oid: Oid) {
        if oid.is_valid() && self.planned.insert(oid) {
            self.pending.push_back(oid);
        }
    }

    /// Plan a record for the object a value references, if any.
    pub fn register_value(&mut self, value: &Value) {
        if let Value::Object(oid) = value {
            self.register_oid(*oid);
        }
    }

    /// Whether `oid` is planned for a record in this dump.
    pub fn is_planned(&self, oid: Oid) -> bool {
        self.planned.contains(&oid)
    }

    /// Number of planned records.
    pub fn planned_count(&self) -> usize {
        self.planned.len()
    }

    /// Next object whose contents still await scanning.
    pub fn pop_pending(&mut self) -> Option<Oid> {
        self.pending.pop_front()
    }
}

/// Errors from rebuilding a payload out of its snapshot JSON.
#[derive(Debug, Error)]
pub enum PayloadDecodeError {
    #[error("missing required field {field:?}")]
    MissingField { field: &'static str },

    #[error("malformed field {field:?}: {reason}")]
    BadShape { field: &'static str, reason: String },

    #[error("invalid value")]
    BadValue(#[from] ValueFromJsonError),
}

/// A payload: the closed tagged union over the known extension kinds.
///
/// A payload is owned exclusively by one object record; ownership is
/// never shared or transferred, and dropping the owner drops the payload
/// with it. The agenda variant holds the process-wide queue through an
/// `Arc` so the runtime keeps a working handle, but the payload slot of
/// the agenda object remains the queue's single owner in the object
/// graph.
pub enum Payload {
    StringDict(StringDict),
    StrBuf(StrBuf),
    Symbol(Symbol),
    Agenda(Arc<Agenda>),
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::StringDict(d) => d.kind(),
            Payload::StrBuf(b) => b.kind(),
            Payload::Symbol(s) => s.kind(),
            Payload::Agenda(_) => PayloadKind::Agenda,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.kind().type_name()
    }

    /// See [`PayloadOps::mark`]. The agenda marks every queued oid,
    /// which is what makes it a GC root: queued objects stay reachable
    /// while queued.
    pub fn mark(&self, marker: &mut Marker) {
        match self {
            Payload::StringDict(d) => d.mark(marker),
            Payload::StrBuf(b) => b.mark(marker),
            Payload::Symbol(s) => s.mark(marker),
            Payload::Agenda(queue) => {
                for oid in queue.queued_oids() {
                    marker.mark_oid(oid);
                }
            }
        }
    }

    /// See [`PayloadOps::dump_scan`]. The agenda is process-local and
    /// registers nothing: its entries must stay alive, not become
    /// persistent.
    pub fn dump_scan(&self, scan: &mut DumpScan) {
        match self {
            Payload::StringDict(d) => d.dump_scan(scan),
            Payload::StrBuf(b) => b.dump_scan(scan),
            Payload::Symbol(s) => s.dump_scan(scan),
            Payload::Agenda(_) => {}
        }
    }

    /// See [`PayloadOps::dump_json_content`].
    ///
    /// # Panics
    ///
    /// Panics for the agenda kind: the agenda is never persisted, and a
    /// dump plan that reaches this point indicates corrupted state.
    pub fn dump_json_content(&self, scan: &DumpScan, out: &mut JsonMap) {
        match self {
            Payload::StringDict(d) => d.dump_json_content(scan, out),
            Payload::StrBuf(b) => b.dump_json_content(scan, out),
            Payload::Symbol(s) => s.dump_json_content(scan, out),
            Payload::Agenda(_) => panic!("the agenda payload is never persisted"),
        }
    }

    pub fn is_erasable(&self) -> bool {
        match self {
            Payload::StringDict(d) => d.is_erasable(),
            Payload::StrBuf(b) => b.is_erasable(),
            Payload::Symbol(s) => s.is_erasable(),
            Payload::Agenda(_) => false,
        }
    }

    /// Whether a snapshot record carries a `"payload"` discriminator for
    /// this payload. False for transient instances and for the
    /// process-local agenda.
    pub fn is_persisted(&self) -> bool {
        match self {
            Payload::StringDict(d) => !d.is_transient(),
            Payload::StrBuf(b) => !b.is_transient(),
            Payload::Symbol(_) => true,
            Payload::Agenda(_) => false,
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Payload::{}", self.type_name())
    }
}
