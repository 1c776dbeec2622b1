use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::{json, Value as Json};
use tracing::debug;

use orb_types::{Oid, SpaceId, Value};

use crate::gc::{GcRoot, Marker};
use crate::heap::ObjectHeap;
use crate::object::Object;
use crate::payload::{DumpScan, JsonMap, Payload, PayloadDecodeError, PayloadKind, PayloadOps};

/// Named-symbol payload.
///
/// A symbol gives an object a stable name and optionally binds a value.
/// Symbols persist under the `symbol` discriminator with a `symb_name`
/// field and an optional `symb_val`; they refuse erasure so interned
/// names survive any collection pass.
#[derive(Clone, Debug, PartialEq)]
pub struct Symbol {
    name: String,
    value: Option<Value>,
}

impl Symbol {
    /// Create a symbol. The name must be non-empty.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        assert!(!name.is_empty(), "symbol name must not be empty");
        Self { name, value: None }
    }

    /// The symbol's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The bound value, if any.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Bind or clear the value.
    pub fn set_value(&mut self, value: Option<Value>) {
        self.value = value;
    }

    /// Rebuild a symbol from its snapshot JSON.
    pub fn from_json(content: &JsonMap) -> Result<Self, PayloadDecodeError> {
        let name = content
            .get("symb_name")
            .and_then(Json::as_str)
            .ok_or(PayloadDecodeError::MissingField { field: "symb_name" })?;
        if name.is_empty() {
            return Err(PayloadDecodeError::BadShape {
                field: "symb_name",
                reason: "empty symbol name".into(),
            });
        }
        let mut symbol = Self::new(name);
        if let Some(value) = content.get("symb_val") {
            symbol.value = Some(Value::from_json(value)?);
        }
        Ok(symbol)
    }
}

impl PayloadOps for Symbol {
    fn kind(&self) -> PayloadKind {
        PayloadKind::Symbol
    }

    fn mark(&self, marker: &mut Marker) {
        if let Some(value) = &self.value {
            marker.mark_value(value);
        }
    }

    fn dump_scan(&self, scan: &mut DumpScan) {
        if let Some(value) = &self.value {
            scan.register_value(value);
        }
    }

    fn dump_json_content(&self, scan: &DumpScan, out: &mut JsonMap) {
        out.insert("symb_name".into(), json!(self.name));
        match &self.value {
            Some(Value::Object(oid)) if !scan.is_planned(*oid) => {}
            Some(value) => {
                out.insert("symb_val".into(), value.to_json());
            }
            None => {}
        }
    }

    fn is_erasable(&self) -> bool {
        false
    }
}

/// Process-wide table of interned symbols, name to oid.
///
/// The table is a GC root: every interned symbol object stays reachable
/// for the life of the runtime context owning the table.
#[derive(Debug, Default)]
pub struct SymbolTable {
    entries: RwLock<HashMap<String, Oid>>,
}

impl SymbolTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the symbol object named `name`, or create one in `space`.
    ///
    /// Interning is idempotent: the same name always resolves to the
    /// same object.
    pub fn intern(&self, heap: &ObjectHeap, space: SpaceId, name: &str) -> Arc<Object> {
        let mut entries = self.entries.write().expect("symbol table poisoned");
        if let Some(&oid) = entries.get(name) {
            if let Some(object) = heap.get(oid) {
                return object;
            }
        }
        let object = heap.create(space);
        object.attach_payload(Payload::Symbol(Symbol::new(name)));
        entries.insert(name.to_owned(), object.oid());
        debug!(name, oid = %object.oid(), "interned symbol");
        object
    }

    /// Resolve a name without creating anything.
    pub fn lookup(&self, name: &str) -> Option<Oid> {
        let entries = self.entries.read().expect("symbol table poisoned");
        entries.get(name).copied()
    }

    /// Record an already-built symbol object under its name, as when a
    /// snapshot is reloaded. Returns `false` if the name was taken.
    pub fn adopt(&self, name: &str, oid: Oid) -> bool {
        let mut entries = self.entries.write().expect("symbol table poisoned");
        if entries.contains_key(name) {
            return false;
        }
        entries.insert(name.to_owned(), oid);
        true
    }

    /// Number of interned names.
    pub fn len(&self) -> usize {
        self.entries.read().expect("symbol table poisoned").len()
    }

    /// Returns `true` if nothing is interned.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All interned names, sorted.
    pub fn names(&self) -> Vec<String> {
        let entries = self.entries.read().expect("symbol table poisoned");
        let mut names: Vec<String> = entries.keys().cloned().collect();
        names.sort();
        names
    }
}

impl GcRoot for SymbolTable {
    fn mark_roots(&self, marker: &mut Marker) {
        let entries = self.entries.read().expect("symbol table poisoned");
        for &oid in entries.values() {
            marker.mark_oid(oid);
        }
    }
}
