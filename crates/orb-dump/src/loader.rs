use std::collections::HashMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde_json::Value as Json;
use tracing::{debug, info};

use orb_heap::{JsonMap, Payload, PayloadDecodeError, Runtime, StrBuf, StringDict, Symbol};
use orb_types::{Oid, SpaceId, Value};

use crate::error::{LoadError, LoadResult};

/// Decoder rebuilding one payload kind from its record JSON.
pub type PayloadDecoder = fn(&JsonMap) -> Result<Payload, PayloadDecodeError>;

/// Outcome of a load.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Records reconstructed across all space files.
    pub objects: usize,
    /// Space files read.
    pub spaces: usize,
    /// Symbol names re-registered after reconstruction.
    pub symbols: usize,
}

/// The snapshot loader: a registry of payload decoders plus the
/// record-reconstruction loop.
///
/// The built-in kinds are pre-registered; embedders add further kinds
/// through [`Loader::register_payload_loader`] before calling
/// [`Loader::load`]. The `agenda` kind is deliberately not registered —
/// a snapshot claiming it is rejected as fatal, since the agenda always
/// starts each process run empty.
pub struct Loader {
    decoders: HashMap<String, PayloadDecoder>,
}

fn decode_string_dict(content: &JsonMap) -> Result<Payload, PayloadDecodeError> {
    StringDict::from_json(content).map(Payload::StringDict)
}

fn decode_strbuf(content: &JsonMap) -> Result<Payload, PayloadDecodeError> {
    StrBuf::from_json(content).map(Payload::StrBuf)
}

fn decode_symbol(content: &JsonMap) -> Result<Payload, PayloadDecodeError> {
    Symbol::from_json(content).map(Payload::Symbol)
}

impl Loader {
    /// Create a loader with the built-in payload kinds registered.
    pub fn new() -> Self {
        let mut loader = Self {
            decoders: HashMap::new(),
        };
        loader.register_payload_loader("string_dictionnary", decode_string_dict);
        loader.register_payload_loader("strbuf", decode_strbuf);
        loader.register_payload_loader("symbol", decode_symbol);
        loader
    }

    /// Register (or replace) the decoder for a payload kind.
    pub fn register_payload_loader(&mut self, kind_name: &str, decoder: PayloadDecoder) {
        self.decoders.insert(kind_name.to_owned(), decoder);
    }

    /// Read every space file under `dir` and reconstruct its records
    /// into the runtime's heap.
    ///
    /// Malformed input — unparseable identifiers, missing fields,
    /// unknown payload kinds — is reported as a typed error naming the
    /// offending record. Snapshot states that can only mean corruption
    /// are fatal: loading a payload onto an object that already carries
    /// one panics, as does any record claiming the `agenda` kind.
    pub fn load(&self, runtime: &Runtime, dir: &Path) -> LoadResult<LoadStats> {
        let mut space_files: Vec<PathBuf> = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if path.is_file() && name.starts_with("space_") && name.ends_with(".json") {
                space_files.push(path);
            }
        }
        space_files.sort();

        let mut stats = LoadStats::default();
        for path in &space_files {
            stats.objects += self.load_space_file(runtime, path)?;
            stats.spaces += 1;
        }
        stats.symbols = runtime.adopt_loaded_symbols();

        info!(
            objects = stats.objects,
            spaces = stats.spaces,
            symbols = stats.symbols,
            "load complete"
        );
        Ok(stats)
    }

    fn load_space_file(&self, runtime: &Runtime, path: &Path) -> LoadResult<usize> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_owned();
        let space = space_of_file_name(&file_name)?;

        let reader = BufReader::new(File::open(path)?);
        let top: Json = serde_json::from_reader(reader).map_err(|source| LoadError::Json {
            file: file_name.clone(),
            source,
        })?;
        let Json::Object(records) = top else {
            return Err(LoadError::NotAnObject { file: file_name });
        };

        let mut loaded = 0usize;
        for (key, record) in &records {
            self.load_record(runtime, space, key, record)?;
            loaded += 1;
        }
        debug!(file = %file_name, records = loaded, "loaded space file");
        Ok(loaded)
    }

    fn load_record(
        &self,
        runtime: &Runtime,
        space: SpaceId,
        key: &str,
        record: &Json,
    ) -> LoadResult<()> {
        let oid = parse_valid_oid(key)?;
        let record = record.as_object().ok_or_else(|| LoadError::Malformed {
            oid: key.to_owned(),
            reason: "record is not a JSON object".into(),
        })?;

        match record.get("oid") {
            Some(Json::String(field)) if field == key => {}
            Some(Json::String(field)) => {
                return Err(LoadError::OidMismatch {
                    key: key.to_owned(),
                    field: field.clone(),
                });
            }
            _ => {
                return Err(LoadError::Malformed {
                    oid: key.to_owned(),
                    reason: "missing \"oid\" field".into(),
                });
            }
        }

        let object = runtime.heap().find_or_create(oid, space);

        if let Some(attrs) = record.get("attrs") {
            let attrs = attrs.as_array().ok_or_else(|| LoadError::Malformed {
                oid: key.to_owned(),
                reason: "\"attrs\" is not an array".into(),
            })?;
            for item in attrs {
                let entry = item.as_object().ok_or_else(|| LoadError::Malformed {
                    oid: key.to_owned(),
                    reason: "attribute entry is not an object".into(),
                })?;
                let at = entry
                    .get("at")
                    .and_then(Json::as_str)
                    .ok_or_else(|| LoadError::Malformed {
                        oid: key.to_owned(),
                        reason: "attribute entry misses \"at\"".into(),
                    })?;
                let at_oid = parse_valid_oid(at)?;
                let va = entry.get("va").ok_or_else(|| LoadError::Malformed {
                    oid: key.to_owned(),
                    reason: "attribute entry misses \"va\"".into(),
                })?;
                let value = Value::from_json(va).map_err(|source| LoadError::BadValue {
                    oid: key.to_owned(),
                    source,
                })?;
                object.put_attr(at_oid, value);
            }
        }

        if let Some(comps) = record.get("comps") {
            let comps = comps.as_array().ok_or_else(|| LoadError::Malformed {
                oid: key.to_owned(),
                reason: "\"comps\" is not an array".into(),
            })?;
            for item in comps {
                let value = Value::from_json(item).map_err(|source| LoadError::BadValue {
                    oid: key.to_owned(),
                    source,
                })?;
                object.append_comp(value);
            }
        }

        match record.get("payload") {
            None => {}
            Some(Json::String(kind)) => {
                if kind == "agenda" {
                    panic!(
                        "snapshot record {key} carries an agenda payload; \
                         the agenda is never persisted"
                    );
                }
                let decoder =
                    self.decoders
                        .get(kind.as_str())
                        .ok_or_else(|| LoadError::UnknownPayloadKind {
                            oid: key.to_owned(),
                            kind: kind.clone(),
                        })?;
                let payload = decoder(record).map_err(|source| LoadError::Payload {
                    oid: key.to_owned(),
                    source,
                })?;
                // Fatal on an object that already carries a payload.
                object.attach_payload(payload);
            }
            Some(_) => {
                return Err(LoadError::Malformed {
                    oid: key.to_owned(),
                    reason: "\"payload\" is not a string".into(),
                });
            }
        }

        Ok(())
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse an oid out of untrusted text and require it to name an object.
fn parse_valid_oid(text: &str) -> LoadResult<Oid> {
    let oid = Oid::try_parse(text).map_err(|source| LoadError::BadOid {
        text: text.to_owned(),
        source,
    })?;
    if !oid.is_valid() {
        return Err(LoadError::Malformed {
            oid: text.to_owned(),
            reason: "null oid cannot name a record".into(),
        });
    }
    Ok(oid)
}

/// Recover the space oid embedded in a space file name.
fn space_of_file_name(file_name: &str) -> LoadResult<SpaceId> {
    let text = file_name
        .strip_prefix("space")
        .and_then(|rest| rest.strip_suffix(".json"))
        .ok_or_else(|| LoadError::BadSpaceFile {
            file: file_name.to_owned(),
        })?;
    let oid = Oid::try_parse(text).map_err(|source| LoadError::BadOid {
        text: text.to_owned(),
        source,
    })?;
    if !oid.is_valid() {
        return Err(LoadError::BadSpaceFile {
            file: file_name.to_owned(),
        });
    }
    Ok(SpaceId::new(oid))
}
