use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value as Json};
use tracing::{debug, info, warn};

use orb_heap::{DumpScan, JsonMap, Object, Runtime};
use orb_types::{Oid, SpaceId};

use crate::error::{DumpError, DumpResult};

/// Snapshot emission options.
#[derive(Clone, Debug)]
pub struct DumpConfig {
    /// Pretty-print the JSON space files (the default); compact output
    /// is smaller but hostile to inspection and diffing.
    pub pretty: bool,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self { pretty: true }
    }
}

/// Outcome of a dump.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DumpStats {
    /// Records written across all space files.
    pub objects: usize,
    /// Space files written.
    pub spaces: usize,
}

/// File name of a space's snapshot, deterministic from the space's
/// canonical oid string.
pub fn space_file_name(space: SpaceId) -> String {
    format!("space{}.json", space.oid())
}

/// Write a snapshot of the runtime's persistent state into `dir`, one
/// JSON file per space, with default options.
pub fn dump(runtime: &Runtime, dir: &Path) -> DumpResult<DumpStats> {
    dump_with(runtime, dir, &DumpConfig::default())
}

/// Write a snapshot with explicit options.
///
/// The scan pre-pass seeds from the heap's persistent root-object list
/// and transitively follows attribute keys, attribute values,
/// components, and payload references; every discovered object gets one
/// record in its space's file. Transient and process-local payloads
/// contribute no `"payload"` field, so their owners reload as bare
/// records.
pub fn dump_with(runtime: &Runtime, dir: &Path, config: &DumpConfig) -> DumpResult<DumpStats> {
    let heap = runtime.heap();

    let mut scan = DumpScan::new();
    for oid in heap.root_oids() {
        scan.register_oid(oid);
    }

    let mut by_space: BTreeMap<SpaceId, Vec<(Oid, Arc<Object>)>> = BTreeMap::new();
    while let Some(oid) = scan.pop_pending() {
        match heap.get(oid) {
            Some(object) => {
                object.dump_scan_contents(&mut scan);
                by_space
                    .entry(object.space())
                    .or_default()
                    .push((oid, object));
            }
            None => warn!(oid = %oid, "dangling reference met during dump scan"),
        }
    }

    fs::create_dir_all(dir)?;

    let mut stats = DumpStats::default();
    for (space, mut members) in by_space {
        members.sort_by_key(|(oid, _)| *oid);

        let mut top = JsonMap::new();
        for (oid, object) in &members {
            top.insert(
                oid.to_canonical_string(),
                Json::Object(object_record(oid, object, &scan)),
            );
        }

        let path = dir.join(space_file_name(space));
        let mut writer = BufWriter::new(File::create(&path)?);
        let body = Json::Object(top);
        let emit = if config.pretty {
            serde_json::to_writer_pretty(&mut writer, &body)
        } else {
            serde_json::to_writer(&mut writer, &body)
        };
        emit.map_err(|e| DumpError::Serialization(e.to_string()))?;
        writer.flush()?;

        debug!(space = %space, objects = members.len(), path = %path.display(), "wrote space file");
        stats.objects += members.len();
        stats.spaces += 1;
    }

    info!(
        objects = stats.objects,
        spaces = stats.spaces,
        "dump complete"
    );
    Ok(stats)
}

/// Build one record: redundant `"oid"` field, attributes and components
/// when present, then the payload discriminator and content for
/// persistable payloads.
fn object_record(oid: &Oid, object: &Object, scan: &DumpScan) -> JsonMap {
    let mut record = JsonMap::new();
    record.insert("oid".into(), json!(oid.to_canonical_string()));

    let attrs = object.attrs_snapshot();
    if !attrs.is_empty() {
        let items: Vec<Json> = attrs
            .iter()
            .map(|(key, value)| {
                json!({ "at": key.to_canonical_string(), "va": value.to_json() })
            })
            .collect();
        record.insert("attrs".into(), Json::Array(items));
    }

    let comps = object.comps_snapshot();
    if !comps.is_empty() {
        let items: Vec<Json> = comps.iter().map(|value| value.to_json()).collect();
        record.insert("comps".into(), Json::Array(items));
    }

    object.with_payload(|payload| {
        if payload.is_persisted() {
            record.insert("payload".into(), json!(payload.kind().kind_name()));
            payload.dump_json_content(scan, &mut record);
        }
    });

    record
}
