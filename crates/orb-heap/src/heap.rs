use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock};

use tracing::trace;

use orb_types::{oid, Oid, SpaceId};

use crate::object::Object;

/// Number of table shards: one per oid bucket.
const SHARD_COUNT: usize = oid::BUCKET_COUNT as usize + 1;

/// The object table: every live object record, keyed by oid.
///
/// The table is sharded by [`Oid::bucket`] so that object creation and
/// lookup on unrelated oids never contend, and also keeps the heap's
/// persistent root-object list — the set of oids that both anchor
/// garbage-collection reachability and seed snapshot dumps.
///
/// The heap hands out `Arc<Object>` handles; records stay alive while a
/// handle exists, but a record is only *resident* (findable, dumpable,
/// GC-traversable) while the table holds it.
pub struct ObjectHeap {
    shards: Box<[RwLock<HashMap<Oid, Arc<Object>>>]>,
    roots: RwLock<BTreeSet<Oid>>,
}

impl ObjectHeap {
    /// Create an empty heap.
    pub fn new() -> Self {
        let shards: Vec<RwLock<HashMap<Oid, Arc<Object>>>> =
            (0..SHARD_COUNT).map(|_| RwLock::new(HashMap::new())).collect();
        Self {
            shards: shards.into_boxed_slice(),
            roots: RwLock::new(BTreeSet::new()),
        }
    }

    fn shard(&self, oid: Oid) -> &RwLock<HashMap<Oid, Arc<Object>>> {
        // Valid oids bucket below SHARD_COUNT; clamp so lookups with a
        // garbage oid miss instead of indexing out of bounds.
        &self.shards[(oid.bucket() as usize).min(SHARD_COUNT - 1)]
    }

    /// Create a fresh object with a random oid in the given space.
    pub fn create(&self, space: SpaceId) -> Arc<Object> {
        loop {
            let oid = Oid::random();
            let mut shard = self.shard(oid).write().expect("heap shard poisoned");
            if shard.contains_key(&oid) {
                continue;
            }
            let object = Arc::new(Object::new(oid, space));
            shard.insert(oid, Arc::clone(&object));
            trace!(oid = %oid, space = %space, "created object");
            return object;
        }
    }

    /// Find an object by oid, or create a bare record for it.
    ///
    /// This is the loader boundary: reconstructed records supply their
    /// oid explicitly, and a record that already exists is reused rather
    /// than duplicated.
    ///
    /// # Panics
    ///
    /// Panics on an invalid oid — untrusted identifiers must be
    /// validated with [`Oid::try_parse`] before they reach the heap.
    pub fn find_or_create(&self, oid: Oid, space: SpaceId) -> Arc<Object> {
        assert!(oid.is_valid(), "cannot store object under invalid oid");
        let mut shard = self.shard(oid).write().expect("heap shard poisoned");
        let object = shard
            .entry(oid)
            .or_insert_with(|| Arc::new(Object::new(oid, space)));
        Arc::clone(object)
    }

    /// Look up an object by oid.
    pub fn get(&self, oid: Oid) -> Option<Arc<Object>> {
        let shard = self.shard(oid).read().expect("heap shard poisoned");
        shard.get(&oid).cloned()
    }

    /// Whether the table holds an object under `oid`.
    pub fn contains(&self, oid: Oid) -> bool {
        let shard = self.shard(oid).read().expect("heap shard poisoned");
        shard.contains_key(&oid)
    }

    /// Number of resident objects.
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.read().expect("heap shard poisoned").len())
            .sum()
    }

    /// Returns `true` if no objects are resident.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted list of every resident oid.
    pub fn all_oids(&self) -> Vec<Oid> {
        let mut oids: Vec<Oid> = self
            .shards
            .iter()
            .flat_map(|s| s.read().expect("heap shard poisoned").keys().copied().collect::<Vec<_>>())
            .collect();
        oids.sort();
        oids
    }

    // -------------------------------------------------------------------
    // Persistent roots
    // -------------------------------------------------------------------

    /// Add an object to the persistent root list. Rooted objects anchor
    /// GC reachability and seed snapshot dumps.
    pub fn add_root(&self, oid: Oid) {
        assert!(oid.is_valid(), "root must be a valid oid");
        let mut roots = self.roots.write().expect("heap roots poisoned");
        roots.insert(oid);
    }

    /// Remove an object from the root list. Returns whether it was
    /// rooted.
    pub fn remove_root(&self, oid: Oid) -> bool {
        let mut roots = self.roots.write().expect("heap roots poisoned");
        roots.remove(&oid)
    }

    /// Whether an oid is on the root list.
    pub fn is_root(&self, oid: Oid) -> bool {
        let roots = self.roots.read().expect("heap roots poisoned");
        roots.contains(&oid)
    }

    /// Snapshot of the root list, in oid order.
    pub fn root_oids(&self) -> Vec<Oid> {
        let roots = self.roots.read().expect("heap roots poisoned");
        roots.iter().copied().collect()
    }

    // -------------------------------------------------------------------
    // Sweep
    // -------------------------------------------------------------------

    /// Drop every resident object that is neither marked nor pinned by
    /// an unerasable payload. Returns `(reclaimed, retained_unerasable)`.
    pub(crate) fn sweep(&self, marked: &HashSet<Oid>) -> (usize, usize) {
        let mut reclaimed = 0usize;
        let mut retained = 0usize;
        for shard in self.shards.iter() {
            let mut map = shard.write().expect("heap shard poisoned");
            map.retain(|oid, object| {
                if marked.contains(oid) {
                    true
                } else if !object.is_erasable() {
                    retained += 1;
                    true
                } else {
                    trace!(oid = %oid, "reclaimed object");
                    reclaimed += 1;
                    false
                }
            });
        }
        (reclaimed, retained)
    }
}

impl Default for ObjectHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ObjectHeap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectHeap")
            .field("object_count", &self.len())
            .field("root_count", &self.root_oids().len())
            .finish()
    }
}
