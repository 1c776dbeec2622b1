use std::sync::Arc;

use tracing::debug;

use orb_agenda::Agenda;
use orb_types::{Oid, SpaceId};

use crate::gc::{self, GcRoot, GcStats, Marker, RootRegistry};
use crate::heap::ObjectHeap;
use crate::object::Object;
use crate::payload::Payload;
use crate::symbol::SymbolTable;

/// Pins a single object — the agenda object — as a GC root.
struct PinnedObject(Oid);

impl GcRoot for PinnedObject {
    fn mark_roots(&self, marker: &mut Marker) {
        marker.mark_oid(self.0);
    }
}

/// The runtime context: one heap, one agenda, one symbol table, one
/// root registry.
///
/// There are no process-wide statics; a `Runtime` is created explicitly
/// at process start and dropped at exit, and tests instantiate isolated
/// runtimes freely. Construction wires the singletons together: the
/// agenda lives as the payload of a dedicated object, pinned through the
/// root registry so queued work stays reachable, and the symbol table
/// registers itself as a root alongside it.
pub struct Runtime {
    heap: ObjectHeap,
    registry: RootRegistry,
    symbols: Arc<SymbolTable>,
    agenda: Arc<Agenda>,
    agenda_oid: Oid,
}

impl Runtime {
    /// Create a fresh runtime context. The agenda always starts idle.
    pub fn new() -> Self {
        let heap = ObjectHeap::new();
        let registry = RootRegistry::new();

        let agenda = Arc::new(Agenda::new());
        let agenda_object = heap.create(SpaceId::ROOT);
        agenda_object.attach_payload(Payload::Agenda(Arc::clone(&agenda)));
        registry.register(Arc::new(PinnedObject(agenda_object.oid())));

        let symbols = Arc::new(SymbolTable::new());
        registry.register(Arc::clone(&symbols) as Arc<dyn GcRoot>);

        debug!(agenda_oid = %agenda_object.oid(), "runtime context created");
        Self {
            heap,
            registry,
            symbols,
            agenda,
            agenda_oid: agenda_object.oid(),
        }
    }

    /// The object heap.
    pub fn heap(&self) -> &ObjectHeap {
        &self.heap
    }

    /// The GC-root registry.
    pub fn registry(&self) -> &RootRegistry {
        &self.registry
    }

    /// The process-wide agenda queue.
    pub fn agenda(&self) -> &Arc<Agenda> {
        &self.agenda
    }

    /// Oid of the object carrying the agenda payload.
    pub fn agenda_oid(&self) -> Oid {
        self.agenda_oid
    }

    /// The symbol table.
    pub fn symbols(&self) -> &Arc<SymbolTable> {
        &self.symbols
    }

    /// Intern a symbol in the root space.
    pub fn intern(&self, name: &str) -> Arc<Object> {
        self.symbols.intern(&self.heap, SpaceId::ROOT, name)
    }

    /// Run one collection pass over this runtime's heap and roots.
    ///
    /// Subject to the stop-the-world convention documented on
    /// [`gc::collect`].
    pub fn collect(&self) -> GcStats {
        gc::collect(&self.heap, &self.registry)
    }

    /// Re-register every symbol object resident in the heap under its
    /// name, as after a snapshot load. Returns how many names were
    /// newly adopted.
    pub fn adopt_loaded_symbols(&self) -> usize {
        let mut adopted = 0usize;
        for oid in self.heap.all_oids() {
            let Some(object) = self.heap.get(oid) else {
                continue;
            };
            let name = object.with_payload(|payload| match payload {
                Payload::Symbol(symbol) => Some(symbol.name().to_owned()),
                _ => None,
            });
            if let Some(Some(name)) = name {
                if self.symbols.adopt(&name, oid) {
                    adopted += 1;
                }
            }
        }
        if adopted > 0 {
            debug!(adopted, "re-registered loaded symbols");
        }
        adopted
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("objects", &self.heap.len())
            .field("queued", &self.agenda.len())
            .field("symbols", &self.symbols.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orb_agenda::Priority;
    use orb_types::Value;

    use crate::dict::StringDict;

    #[test]
    fn fresh_runtime_has_an_idle_agenda_object() {
        let runtime = Runtime::new();
        assert!(runtime.agenda().is_empty());
        let agenda_object = runtime.heap().get(runtime.agenda_oid()).unwrap();
        assert!(!agenda_object.is_erasable());
    }

    #[test]
    fn collection_preserves_the_agenda_object() {
        let runtime = Runtime::new();
        let stats = runtime.collect();
        assert_eq!(stats.reclaimed, 0);
        assert!(runtime.heap().contains(runtime.agenda_oid()));
    }

    #[test]
    fn queued_work_survives_collection() {
        let runtime = Runtime::new();
        let job = runtime.heap().create(SpaceId::ROOT);
        job.attach_payload(Payload::StringDict(StringDict::new()));
        runtime.agenda().push(Priority::High, job.oid());

        runtime.collect();
        assert!(runtime.heap().contains(job.oid()));

        assert_eq!(runtime.agenda().pop_highest(), Some(job.oid()));
        let stats = runtime.collect();
        assert_eq!(stats.reclaimed, 1);
        assert!(!runtime.heap().contains(job.oid()));
    }

    #[test]
    fn interned_symbols_survive_collection() {
        let runtime = Runtime::new();
        let symbol = runtime.intern("keeper");
        runtime.collect();
        assert!(runtime.heap().contains(symbol.oid()));
        assert_eq!(runtime.symbols().lookup("keeper"), Some(symbol.oid()));
    }

    #[test]
    fn adopt_loaded_symbols_indexes_resident_symbols() {
        let runtime = Runtime::new();
        // Simulate a loaded symbol object that bypassed intern().
        let oid = Oid::random();
        let object = runtime.heap().find_or_create(oid, SpaceId::ROOT);
        object.attach_payload(Payload::Symbol(crate::symbol::Symbol::new("loaded")));
        object.put_attr(Oid::random(), Value::Int(1));

        assert_eq!(runtime.adopt_loaded_symbols(), 1);
        assert_eq!(runtime.symbols().lookup("loaded"), Some(oid));
        // Idempotent.
        assert_eq!(runtime.adopt_loaded_symbols(), 0);
    }
}
