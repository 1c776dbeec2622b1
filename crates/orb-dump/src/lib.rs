//! JSON snapshot persistence for the Orb object runtime.
//!
//! A dump walks the heap from its persistent root-object list, groups
//! the discovered objects by space, and writes one JSON file per space
//! (`space<oid>.json`, keyed by canonical oid). A load reads those files
//! back, validates every identifier, rebuilds bare records through the
//! heap, and dispatches payload reconstruction through a decoder
//! registry.
//!
//! Dumping a set of live, non-transient payload states and reloading
//! them into a fresh runtime reproduces equivalent observable state:
//! same attributes, same components, same dictionary contents. The
//! agenda is deliberately outside that guarantee — it is never written,
//! and a snapshot claiming to contain it is rejected as corrupt.

pub mod dumper;
pub mod error;
pub mod loader;

pub use dumper::{dump, dump_with, space_file_name, DumpConfig, DumpStats};
pub use error::{DumpError, DumpResult, LoadError, LoadResult};
pub use loader::{Loader, LoadStats, PayloadDecoder};
