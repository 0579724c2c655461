//! Persistent per-type interning table shared by the tag and string hash
//! collections

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::codec::string_hash;
use crate::error::Result;

/// On-disk form: type id -> hash code -> interned text
#[derive(Debug, Default, Serialize, Deserialize)]
struct InternFile {
    types: BTreeMap<i16, BTreeMap<i32, String>>,
}

/// Concurrent insert-or-get map of `string_hash(text) -> text`, partitioned by
/// type id and optionally mirrored to a JSON file on every new entry.
#[derive(Debug)]
pub(crate) struct InternTable {
    label: &'static str,
    entries: DashMap<i16, DashMap<i32, String>>,
    file: Option<PathBuf>,
    persist_lock: Mutex<()>,
}

impl InternTable {
    /// Table that is never persisted
    pub(crate) fn in_memory(label: &'static str) -> Self {
        Self {
            label,
            entries: DashMap::new(),
            file: None,
            persist_lock: Mutex::new(()),
        }
    }

    /// Table backed by `path`, loading existing entries if the file exists
    pub(crate) fn open(label: &'static str, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let table = Self {
            file: Some(path.clone()),
            ..Self::in_memory(label)
        };

        if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            let stored: InternFile = if raw.trim().is_empty() {
                InternFile::default()
            } else {
                serde_json::from_str(&raw)?
            };
            for (type_id, values) in stored.types {
                let inner = table.entries.entry(type_id).or_default();
                for (hash, text) in values {
                    inner.insert(hash, text);
                }
            }
            debug!(table = label, path = %path.display(), "Loaded interning table");
        } else {
            table.write_file()?;
        }
        Ok(table)
    }

    /// Interns `text` for `type_id`, returning its hash code
    pub(crate) fn intern(&self, type_id: i16, text: &str) -> i32 {
        let hash = string_hash(text);
        let inserted = {
            let inner = self.entries.entry(type_id).or_default();
            let inserted = match inner.entry(hash) {
                Entry::Occupied(existing) => {
                    if existing.get() != text {
                        warn!(
                            table = self.label,
                            type_id,
                            hash,
                            existing = %existing.get(),
                            new = %text,
                            "Hash collision while interning"
                        );
                    }
                    false
                }
                Entry::Vacant(slot) => {
                    slot.insert(text.to_string());
                    true
                }
            };
            inserted
        };
        if inserted {
            self.persist();
        }
        hash
    }

    pub(crate) fn lookup(&self, type_id: i16, hash: i32) -> Option<String> {
        self.entries
            .get(&type_id)
            .and_then(|inner| inner.get(&hash).map(|v| v.value().clone()))
    }

    pub(crate) fn remove_type(&self, type_id: i16) {
        if self.entries.remove(&type_id).is_some() {
            self.persist();
        }
    }

    pub(crate) fn len(&self, type_id: i16) -> usize {
        self.entries.get(&type_id).map(|m| m.len()).unwrap_or(0)
    }

    fn snapshot(&self) -> InternFile {
        let mut file = InternFile::default();
        for outer in self.entries.iter() {
            let values = outer
                .value()
                .iter()
                .map(|e| (*e.key(), e.value().clone()))
                .collect();
            file.types.insert(*outer.key(), values);
        }
        file
    }

    fn write_file(&self) -> Result<()> {
        let Some(path) = &self.file else {
            return Ok(());
        };
        let _guard = self.persist_lock.lock();
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Writes the table to its file. Failures are logged, not raised.
    pub(crate) fn persist(&self) {
        if let Err(e) = self.write_file() {
            warn!(table = self.label, error = %e, "Failed to persist interning table");
        }
    }
}
