//! Mark/sweep garbage collection.
//!
//! Marking is driven by an explicit worklist held in the [`Marker`]
//! (reachability set + pending queue), never by recursive calls, so no
//! lock in the system needs to be re-entrant: every `mark` hook only
//! records oids into the marker, and the collector fetches and traverses
//! them one at a time.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, RwLock};

use tracing::debug;

use orb_types::{Oid, Value};

use crate::heap::ObjectHeap;

/// Reachability state of one mark pass: the set of oids found reachable
/// so far, plus the worklist of oids whose contents still await
/// traversal.
#[derive(Debug, Default)]
pub struct Marker {
    marked: HashSet<Oid>,
    pending: VecDeque<Oid>,
}

impl Marker {
    /// Start an empty mark pass.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an oid reachable. Null and invalid oids are ignored; an oid
    /// already marked is not queued again, which is what terminates
    /// traversal of cyclic object graphs.
    pub fn mark_oid(&mut self, oid: Oid) {
        if oid.is_valid() && self.marked.insert(oid) {
            self.pending.push_back(oid);
        }
    }

    /// Mark the object a value references, if any.
    pub fn mark_value(&mut self, value: &Value) {
        if let Value::Object(oid) = value {
            self.mark_oid(*oid);
        }
    }

    /// Whether an oid has been found reachable.
    pub fn is_marked(&self, oid: Oid) -> bool {
        self.marked.contains(&oid)
    }

    /// Number of oids found reachable so far.
    pub fn marked_count(&self) -> usize {
        self.marked.len()
    }

    pub(crate) fn pop_pending(&mut self) -> Option<Oid> {
        self.pending.pop_front()
    }

    pub(crate) fn into_marked(self) -> HashSet<Oid> {
        self.marked
    }
}

/// A subsystem holding object references that must survive collection.
///
/// Roots register once and are asked to mark on every pass. The agenda,
/// the symbol table, and pinned runtime objects all participate this
/// way.
pub trait GcRoot: Send + Sync {
    fn mark_roots(&self, marker: &mut Marker);
}

/// Registry of every [`GcRoot`] callback.
#[derive(Default)]
pub struct RootRegistry {
    roots: RwLock<Vec<Arc<dyn GcRoot>>>,
}

impl RootRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a root. Roots are never unregistered; they live as long
    /// as the runtime context that owns the registry.
    pub fn register(&self, root: Arc<dyn GcRoot>) {
        let mut roots = self.roots.write().expect("root registry poisoned");
        roots.push(root);
    }

    /// Number of registered roots.
    pub fn len(&self) -> usize {
        self.roots.read().expect("root registry poisoned").len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ask every registered root to mark.
    pub fn mark_all(&self, marker: &mut Marker) {
        let roots = self.roots.read().expect("root registry poisoned");
        for root in roots.iter() {
            root.mark_roots(marker);
        }
    }
}

impl std::fmt::Debug for RootRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootRegistry")
            .field("root_count", &self.len())
            .finish()
    }
}

/// Outcome of one collection pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GcStats {
    /// Objects found reachable.
    pub marked: usize,
    /// Unreachable, erasable objects dropped from the table.
    pub reclaimed: usize,
    /// Unreachable objects kept because their payload refuses erasure.
    pub retained: usize,
}

/// Run one mark/sweep pass.
///
/// Marking computes the transitive closure from the heap's persistent
/// root list and every registered [`GcRoot`]; the sweep then drops
/// unmarked, erasable objects shard by shard.
///
/// Callers must ensure no thread mutates the shape of the object graph
/// (attribute/component writes, payload attachment, object creation)
/// while a pass runs — the classic stop-the-world convention: drive
/// every worker to a safe point first, resume after the pass. A worker
/// that never reaches its safe point stalls collection indefinitely;
/// there is no detection or timeout for that, which is an accepted
/// limitation of this design. Read-only access may proceed concurrently
/// with marking.
pub fn collect(heap: &ObjectHeap, registry: &RootRegistry) -> GcStats {
    let mut marker = Marker::new();
    for oid in heap.root_oids() {
        marker.mark_oid(oid);
    }
    registry.mark_all(&mut marker);

    while let Some(oid) = marker.pop_pending() {
        if let Some(object) = heap.get(oid) {
            object.mark_contents(&mut marker);
        }
    }

    let marked = marker.marked_count();
    let reachable = marker.into_marked();
    let (reclaimed, retained) = heap.sweep(&reachable);
    debug!(marked, reclaimed, retained, "collection pass complete");
    GcStats {
        marked,
        reclaimed,
        retained,
    }
}
