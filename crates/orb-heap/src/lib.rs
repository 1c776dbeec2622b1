//! Object heap for the Orb object runtime.
//!
//! This crate holds the heart of the system: oid-addressed object
//! records, the uniform payload protocol, the mark/sweep garbage
//! collector, and the runtime context that ties them together.
//!
//! # Key Types
//!
//! - [`Object`] / [`ObjectHeap`] — object records and the sharded,
//!   oid-keyed table they live in
//! - [`Payload`] / [`PayloadOps`] — the closed payload union and the
//!   four-operation contract (mark, dump-scan, dump-content, erasable)
//!   every kind satisfies toward the collector and the persistence layer
//! - [`StringDict`], [`StrBuf`], [`Symbol`] — the built-in payload kinds
//! - [`Marker`], [`GcRoot`], [`RootRegistry`], [`collect`] — mark/sweep
//!   collection over an explicit worklist
//! - [`Runtime`] — the explicit context struct replacing process-wide
//!   singletons (one heap, one agenda, one symbol table)

pub mod dict;
pub mod gc;
pub mod heap;
pub mod object;
pub mod payload;
pub mod runtime;
pub mod strbuf;
pub mod symbol;

pub use dict::StringDict;
pub use gc::{collect, GcRoot, GcStats, Marker, RootRegistry};
pub use heap::ObjectHeap;
pub use object::Object;
pub use payload::{DumpScan, JsonMap, Payload, PayloadDecodeError, PayloadKind, PayloadOps};
pub use runtime::Runtime;
pub use strbuf::StrBuf;
pub use symbol::{Symbol, SymbolTable};
