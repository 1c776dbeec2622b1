use std::collections::BTreeMap;

use serde_json::{json, Value as Json};

use orb_types::Value;

use crate::gc::Marker;
use crate::payload::{DumpScan, JsonMap, PayloadDecodeError, PayloadKind, PayloadOps};

/// String-keyed dictionary payload.
///
/// Entries map strings to runtime values and persist as
/// `{"dictionnary": [{"str": <key>, "val": <json>}, ...]}` under the
/// `string_dictionnary` discriminator. Keys are kept in a `BTreeMap` so
/// emission order is deterministic.
///
/// A dictionary created with [`StringDict::transient`] never persists:
/// its scan and content hooks are no-ops and its owner's record carries
/// no `"payload"` field.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StringDict {
    entries: BTreeMap<String, Value>,
    transient: bool,
}

impl StringDict {
    /// Create an empty, persistent dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty dictionary that is never persisted.
    pub fn transient() -> Self {
        Self {
            entries: BTreeMap::new(),
            transient: true,
        }
    }

    /// Insert or replace an entry, returning the previous value.
    pub fn put(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.entries.insert(key.into(), value)
    }

    /// Read an entry.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Remove an entry, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    /// Whether an entry exists for `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the dictionary has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// Whether this dictionary is excluded from persistence.
    pub fn is_transient(&self) -> bool {
        self.transient
    }

    /// Rebuild a persistent dictionary from its snapshot JSON.
    pub fn from_json(content: &JsonMap) -> Result<Self, PayloadDecodeError> {
        let items = content
            .get("dictionnary")
            .ok_or(PayloadDecodeError::MissingField {
                field: "dictionnary",
            })?
            .as_array()
            .ok_or_else(|| PayloadDecodeError::BadShape {
                field: "dictionnary",
                reason: "expected an array".into(),
            })?;
        let mut dict = Self::new();
        for item in items {
            let entry = item.as_object().ok_or_else(|| PayloadDecodeError::BadShape {
                field: "dictionnary",
                reason: "entry is not an object".into(),
            })?;
            let key = entry
                .get("str")
                .and_then(Json::as_str)
                .ok_or(PayloadDecodeError::MissingField { field: "str" })?;
            let value = entry
                .get("val")
                .ok_or(PayloadDecodeError::MissingField { field: "val" })?;
            dict.put(key, Value::from_json(value)?);
        }
        Ok(dict)
    }
}

impl PayloadOps for StringDict {
    fn kind(&self) -> PayloadKind {
        PayloadKind::StringDict
    }

    fn mark(&self, marker: &mut Marker) {
        for value in self.entries.values() {
            marker.mark_value(value);
        }
    }

    fn dump_scan(&self, scan: &mut DumpScan) {
        if self.transient {
            return;
        }
        for value in self.entries.values() {
            scan.register_value(value);
        }
    }

    fn dump_json_content(&self, scan: &DumpScan, out: &mut JsonMap) {
        if self.transient {
            return;
        }
        let items: Vec<Json> = self
            .entries
            .iter()
            .filter(|(_, value)| match value {
                // Skip references the scan never planned a record for.
                Value::Object(oid) => scan.is_planned(*oid),
                _ => true,
            })
            .map(|(key, value)| json!({ "str": key, "val": value.to_json() }))
            .collect();
        out.insert("dictionnary".into(), Json::Array(items));
    }

    fn is_erasable(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orb_types::Oid;

    #[test]
    fn put_get_remove() {
        let mut dict = StringDict::new();
        assert!(dict.is_empty());
        assert_eq!(dict.put("a", Value::Int(1)), None);
        assert_eq!(dict.put("a", Value::Int(2)), Some(Value::Int(1)));
        assert_eq!(dict.get("a"), Some(&Value::Int(2)));
        assert!(dict.contains_key("a"));
        assert_eq!(dict.remove("a"), Some(Value::Int(2)));
        assert!(dict.get("a").is_none());
    }

    #[test]
    fn mark_covers_object_values() {
        let mut dict = StringDict::new();
        let target = Oid::random();
        dict.put("ref", Value::Object(target));
        dict.put("plain", Value::Str("no ref".into()));
        let mut marker = Marker::new();
        dict.mark(&mut marker);
        assert!(marker.is_marked(target));
        assert_eq!(marker.marked_count(), 1);
    }

    #[test]
    fn scan_registers_object_values() {
        let mut dict = StringDict::new();
        let target = Oid::random();
        dict.put("ref", Value::Object(target));
        let mut scan = DumpScan::new();
        dict.dump_scan(&mut scan);
        assert!(scan.is_planned(target));
    }

    #[test]
    fn transient_dict_skips_persistence() {
        let mut dict = StringDict::transient();
        dict.put("ref", Value::Object(Oid::random()));
        assert!(dict.is_transient());

        let mut scan = DumpScan::new();
        dict.dump_scan(&mut scan);
        assert_eq!(scan.planned_count(), 0);

        let mut out = JsonMap::new();
        dict.dump_json_content(&scan, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn json_roundtrip() {
        let oid = Oid::random();
        let mut dict = StringDict::new();
        dict.put("count", Value::Int(5));
        dict.put("label", Value::Str("widget".into()));
        dict.put("link", Value::Object(oid));

        let mut scan = DumpScan::new();
        dict.dump_scan(&mut scan);
        let mut out = JsonMap::new();
        dict.dump_json_content(&scan, &mut out);

        let back = StringDict::from_json(&out).unwrap();
        assert_eq!(back, dict);
    }

    #[test]
    fn unplanned_references_are_dropped_on_emission() {
        let mut dict = StringDict::new();
        dict.put("ghost", Value::Object(Oid::random()));
        dict.put("kept", Value::Int(1));
        let scan = DumpScan::new();
        let mut out = JsonMap::new();
        dict.dump_json_content(&scan, &mut out);
        let items = out["dictionnary"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["str"], "kept");
    }

    #[test]
    fn from_json_reports_missing_fields() {
        let empty = JsonMap::new();
        assert!(matches!(
            StringDict::from_json(&empty),
            Err(PayloadDecodeError::MissingField {
                field: "dictionnary"
            })
        ));

        let mut bad = JsonMap::new();
        bad.insert("dictionnary".into(), json!([{ "val": 1 }]));
        assert!(matches!(
            StringDict::from_json(&bad),
            Err(PayloadDecodeError::MissingField { field: "str" })
        ));

        let mut not_array = JsonMap::new();
        not_array.insert("dictionnary".into(), json!("oops"));
        assert!(matches!(
            StringDict::from_json(&not_array),
            Err(PayloadDecodeError::BadShape { .. })
        ));
    }
}
