use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use orb_types::{Oid, SpaceId, Value};

use crate::gc::Marker;
use crate::payload::{DumpScan, Payload, PayloadKind};

/// A heap-resident object record.
///
/// Identity is the oid, immutable after creation. Everything else —
/// the attribute map (keyed by attribute objects), the ordered component
/// sequence, and the optional payload — lives behind a per-object lock,
/// so mutation of unrelated objects never contends.
///
/// An object belongs to exactly one space; the space partitions
/// snapshots and is never part of identity.
pub struct Object {
    oid: Oid,
    space: SpaceId,
    state: RwLock<ObjectState>,
}

#[derive(Default)]
struct ObjectState {
    attrs: HashMap<Oid, Value>,
    comps: Vec<Value>,
    payload: Option<Payload>,
}

impl Object {
    pub(crate) fn new(oid: Oid, space: SpaceId) -> Self {
        debug_assert!(oid.is_valid());
        Self {
            oid,
            space,
            state: RwLock::new(ObjectState::default()),
        }
    }

    /// This object's oid.
    pub fn oid(&self) -> Oid {
        self.oid
    }

    /// The space this object persists into.
    pub fn space(&self) -> SpaceId {
        self.space
    }

    // -------------------------------------------------------------------
    // Attributes
    // -------------------------------------------------------------------

    /// Set an attribute. The key must be a valid oid (attribute keys are
    /// objects); an invalid key is a programming-contract violation.
    pub fn put_attr(&self, key: Oid, value: Value) -> Option<Value> {
        assert!(key.is_valid(), "attribute key must be a valid oid");
        let mut state = self.state.write().expect("object lock poisoned");
        state.attrs.insert(key, value)
    }

    /// Read an attribute.
    pub fn get_attr(&self, key: Oid) -> Option<Value> {
        let state = self.state.read().expect("object lock poisoned");
        state.attrs.get(&key).cloned()
    }

    /// Remove an attribute, returning its previous value.
    pub fn remove_attr(&self, key: Oid) -> Option<Value> {
        let mut state = self.state.write().expect("object lock poisoned");
        state.attrs.remove(&key)
    }

    /// Number of attributes.
    pub fn attr_count(&self) -> usize {
        let state = self.state.read().expect("object lock poisoned");
        state.attrs.len()
    }

    /// Snapshot of the attributes, sorted by key for deterministic
    /// traversal and emission.
    pub fn attrs_snapshot(&self) -> Vec<(Oid, Value)> {
        let state = self.state.read().expect("object lock poisoned");
        let mut attrs: Vec<(Oid, Value)> =
            state.attrs.iter().map(|(k, v)| (*k, v.clone())).collect();
        attrs.sort_by_key(|(k, _)| *k);
        attrs
    }

    // -------------------------------------------------------------------
    // Components
    // -------------------------------------------------------------------

    /// Append a positional component.
    pub fn append_comp(&self, value: Value) {
        let mut state = self.state.write().expect("object lock poisoned");
        state.comps.push(value);
    }

    /// Read a component by position.
    pub fn get_comp(&self, index: usize) -> Option<Value> {
        let state = self.state.read().expect("object lock poisoned");
        state.comps.get(index).cloned()
    }

    /// Number of components.
    pub fn comp_count(&self) -> usize {
        let state = self.state.read().expect("object lock poisoned");
        state.comps.len()
    }

    /// Snapshot of the component sequence, in order.
    pub fn comps_snapshot(&self) -> Vec<Value> {
        let state = self.state.read().expect("object lock poisoned");
        state.comps.clone()
    }

    // -------------------------------------------------------------------
    // Payload
    // -------------------------------------------------------------------

    /// Attach a payload to this object.
    ///
    /// # Panics
    ///
    /// Panics if the object already carries a payload. Payload ownership
    /// is exclusive and non-transferable; hitting this from the snapshot
    /// loader indicates a corrupted snapshot.
    pub fn attach_payload(&self, payload: Payload) {
        let mut state = self.state.write().expect("object lock poisoned");
        if let Some(existing) = &state.payload {
            panic!(
                "object {} already has a payload ({})",
                self.oid,
                existing.type_name()
            );
        }
        state.payload = Some(payload);
    }

    /// Whether this object carries a payload.
    pub fn has_payload(&self) -> bool {
        let state = self.state.read().expect("object lock poisoned");
        state.payload.is_some()
    }

    /// The payload's kind, if any.
    pub fn payload_kind(&self) -> Option<PayloadKind> {
        let state = self.state.read().expect("object lock poisoned");
        state.payload.as_ref().map(Payload::kind)
    }

    /// Run `f` against the payload under the object lock.
    pub fn with_payload<R>(&self, f: impl FnOnce(&Payload) -> R) -> Option<R> {
        let state = self.state.read().expect("object lock poisoned");
        state.payload.as_ref().map(f)
    }

    /// Run `f` against the payload, mutably, under the object lock.
    pub fn with_payload_mut<R>(&self, f: impl FnOnce(&mut Payload) -> R) -> Option<R> {
        let mut state = self.state.write().expect("object lock poisoned");
        state.payload.as_mut().map(f)
    }

    /// Whether the collector may reclaim this object once unreferenced.
    /// Objects without a payload are always erasable.
    pub fn is_erasable(&self) -> bool {
        let state = self.state.read().expect("object lock poisoned");
        state.payload.as_ref().map_or(true, Payload::is_erasable)
    }

    // -------------------------------------------------------------------
    // Collaborator traversals
    // -------------------------------------------------------------------

    /// Mark everything this object references: attribute keys (keys are
    /// objects), attribute values, components, and the payload's edges.
    pub(crate) fn mark_contents(&self, marker: &mut Marker) {
        let state = self.state.read().expect("object lock poisoned");
        for (key, value) in &state.attrs {
            marker.mark_oid(*key);
            marker.mark_value(value);
        }
        for value in &state.comps {
            marker.mark_value(value);
        }
        if let Some(payload) = &state.payload {
            payload.mark(marker);
        }
    }

    /// Register everything this object references as needing a snapshot
    /// record.
    pub fn dump_scan_contents(&self, scan: &mut DumpScan) {
        let state = self.state.read().expect("object lock poisoned");
        for (key, value) in &state.attrs {
            scan.register_oid(*key);
            scan.register_value(value);
        }
        for value in &state.comps {
            scan.register_value(value);
        }
        if let Some(payload) = &state.payload {
            payload.dump_scan(scan);
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("oid", &self.oid)
            .field("space", &self.space)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict::StringDict;

    fn object() -> Object {
        Object::new(Oid::random(), SpaceId::ROOT)
    }

    #[test]
    fn attributes_are_keyed_and_unique() {
        let obj = object();
        let key = Oid::random();
        assert_eq!(obj.put_attr(key, Value::Int(1)), None);
        assert_eq!(obj.put_attr(key, Value::Int(2)), Some(Value::Int(1)));
        assert_eq!(obj.get_attr(key), Some(Value::Int(2)));
        assert_eq!(obj.attr_count(), 1);
        assert_eq!(obj.remove_attr(key), Some(Value::Int(2)));
        assert_eq!(obj.get_attr(key), None);
    }

    #[test]
    #[should_panic(expected = "attribute key must be a valid oid")]
    fn null_attribute_key_is_rejected() {
        object().put_attr(Oid::null(), Value::Int(1));
    }

    #[test]
    fn components_keep_order() {
        let obj = object();
        obj.append_comp(Value::Int(10));
        obj.append_comp(Value::Str("two".into()));
        assert_eq!(obj.comp_count(), 2);
        assert_eq!(obj.get_comp(0), Some(Value::Int(10)));
        assert_eq!(obj.get_comp(1), Some(Value::Str("two".into())));
        assert_eq!(obj.get_comp(2), None);
        assert_eq!(
            obj.comps_snapshot(),
            vec![Value::Int(10), Value::Str("two".into())]
        );
    }

    #[test]
    fn attrs_snapshot_is_sorted() {
        let obj = object();
        let mut keys: Vec<Oid> = (0..8).map(|_| Oid::random()).collect();
        for (i, key) in keys.iter().enumerate() {
            obj.put_attr(*key, Value::Int(i as i64));
        }
        keys.sort();
        let snapshot_keys: Vec<Oid> = obj.attrs_snapshot().into_iter().map(|(k, _)| k).collect();
        assert_eq!(snapshot_keys, keys);
    }

    #[test]
    fn payload_attach_and_inspect() {
        let obj = object();
        assert!(!obj.has_payload());
        assert!(obj.is_erasable());
        obj.attach_payload(Payload::StringDict(StringDict::new()));
        assert!(obj.has_payload());
        assert_eq!(obj.payload_kind(), Some(PayloadKind::StringDict));
        let len = obj.with_payload(|p| match p {
            Payload::StringDict(d) => d.len(),
            _ => unreachable!(),
        });
        assert_eq!(len, Some(0));
    }

    #[test]
    #[should_panic(expected = "already has a payload")]
    fn double_attach_is_fatal() {
        let obj = object();
        obj.attach_payload(Payload::StringDict(StringDict::new()));
        obj.attach_payload(Payload::StringDict(StringDict::new()));
    }

    #[test]
    fn mark_contents_covers_attrs_comps_and_payload() {
        let obj = object();
        let key = Oid::random();
        let attr_target = Oid::random();
        let comp_target = Oid::random();
        let dict_target = Oid::random();
        obj.put_attr(key, Value::Object(attr_target));
        obj.append_comp(Value::Object(comp_target));
        let mut dict = StringDict::new();
        dict.put("ref", Value::Object(dict_target));
        obj.attach_payload(Payload::StringDict(dict));

        let mut marker = Marker::new();
        obj.mark_contents(&mut marker);
        for oid in [key, attr_target, comp_target, dict_target] {
            assert!(marker.is_marked(oid));
        }
    }
}
