//! Storage configuration
//!
//! The configuration is loaded once (YAML or JSON), validated by
//! [`StorageConfig::initialize`], and then shared read-only.
//!
//! ```text
//! StorageConfig
//! ├── type_settings          TypeId <-> TypeName, related data type, compression
//! └── index_type_mappings    per index TypeId
//!     ├── mode, metadata_stored_separately, query_override_settings
//!     ├── full_data_id_fields
//!     └── indexes
//!         └── Index: suffix, primary sort, tags, capping
//! ```

pub mod full_data_id;

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::codec::DataType;
use crate::error::{Error, Result};
use crate::sort::{BaseComparer, SortOrder, TagKey};

pub use full_data_id::{FullDataIdField, FullDataIdPartFormat, FullDataIdType};

// =============================================================================
// Storage Configuration
// =============================================================================

/// Root configuration of the index store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// File the tag name interning table is persisted to
    #[serde(default = "default_tag_hash_file")]
    pub tag_hash_file: String,

    /// File the string-hashed tag value table is persisted to
    #[serde(default = "default_string_hash_file")]
    pub string_hash_file: String,

    /// Locks per CPU (1-999, anything else falls back to 8)
    #[serde(default)]
    pub lock_multiplier: usize,

    /// Zone this node serves
    #[serde(default)]
    pub my_zone: u16,

    /// Lower bound for the lock pool size
    #[serde(default = "default_clusters")]
    pub num_clusters_in_group: usize,

    #[serde(default)]
    pub type_settings: Vec<TypeSetting>,

    #[serde(default)]
    pub index_type_mappings: Vec<IndexTypeMapping>,

    #[serde(skip)]
    mapping_by_type: HashMap<i16, usize>,

    #[serde(skip)]
    setting_by_type: HashMap<i16, usize>,

    #[serde(skip)]
    type_by_name: HashMap<String, i16>,
}

fn default_tag_hash_file() -> String {
    "tag_hash.json".to_string()
}

fn default_string_hash_file() -> String {
    "string_hash.json".to_string()
}

fn default_clusters() -> usize {
    1
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            tag_hash_file: default_tag_hash_file(),
            string_hash_file: default_string_hash_file(),
            lock_multiplier: 0,
            my_zone: 0,
            num_clusters_in_group: default_clusters(),
            type_settings: Vec::new(),
            index_type_mappings: Vec::new(),
            mapping_by_type: HashMap::new(),
            setting_by_type: HashMap::new(),
            type_by_name: HashMap::new(),
        }
    }
}

impl StorageConfig {
    /// Load from a `.yaml`/`.yml` or `.json` file and initialize
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let mut config: StorageConfig = if is_json {
            serde_json::from_str(&raw)?
        } else {
            serde_yaml::from_str(&raw)?
        };
        config.initialize()?;
        info!(
            path = %path.display(),
            types = config.index_type_mappings.len(),
            "Loaded index storage configuration"
        );
        Ok(config)
    }

    /// Parse YAML and initialize
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let mut config: StorageConfig = serde_yaml::from_str(raw)?;
        config.initialize()?;
        Ok(config)
    }

    /// Validate and build lookup tables. Must run before the config is used.
    pub fn initialize(&mut self) -> Result<()> {
        self.mapping_by_type.clear();
        self.setting_by_type.clear();
        self.type_by_name.clear();

        for (at, setting) in self.type_settings.iter().enumerate() {
            if self.setting_by_type.insert(setting.type_id, at).is_some() {
                return Err(Error::InvalidConfig(format!(
                    "Duplicate TypeSetting for TypeId {}",
                    setting.type_id
                )));
            }
            self.type_by_name
                .insert(setting.type_name.clone(), setting.type_id);
        }

        for (at, mapping) in self.index_type_mappings.iter_mut().enumerate() {
            mapping.initialize()?;
            if self.mapping_by_type.insert(mapping.type_id, at).is_some() {
                return Err(Error::InvalidConfig(format!(
                    "Duplicate IndexTypeMapping for TypeId {}",
                    mapping.type_id
                )));
            }
        }
        Ok(())
    }

    /// Index configuration of a type
    pub fn index_type_mapping(&self, type_id: i16) -> Option<&IndexTypeMapping> {
        self.mapping_by_type
            .get(&type_id)
            .map(|at| &self.index_type_mappings[*at])
    }

    /// Type settings of a type
    pub fn type_setting(&self, type_id: i16) -> Option<&TypeSetting> {
        self.setting_by_type
            .get(&type_id)
            .map(|at| &self.type_settings[*at])
    }

    /// Type id registered under `type_name`
    pub fn type_id(&self, type_name: &str) -> Option<i16> {
        self.type_by_name.get(type_name).copied()
    }
}

/// Per-type settings shared with the relay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeSetting {
    pub type_id: i16,
    pub type_name: String,
    /// Data-tier type holding the payloads indexed by this type
    #[serde(default)]
    pub related_index_type_id: Option<i16>,
    /// Compress payloads stored for this type
    #[serde(default)]
    pub compress: bool,
}

// =============================================================================
// Index Type Mapping
// =============================================================================

/// Whether the index server owns data-tier forwarding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum IndexServerMode {
    #[default]
    #[serde(alias = "databound", alias = "DATABOUND")]
    Databound,
    #[serde(alias = "dataless", alias = "DATALESS")]
    Dataless,
}

/// Server-side guards applied to multi-index queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct QueryOverrideSettings {
    /// Per-index item bound forced onto unbounded full-page queries
    #[serde(default)]
    pub max_items_per_index_threshold: usize,
    /// Result sizes above this are logged
    #[serde(default)]
    pub max_result_items_threshold_log: usize,
    /// Turn full-page queries (page 0) into first-page queries
    #[serde(default)]
    pub disable_full_page_query: bool,
}

/// Index configuration of one type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexTypeMapping {
    pub type_id: i16,
    #[serde(default)]
    pub mode: IndexServerMode,
    #[serde(default)]
    pub metadata_stored_separately: bool,
    #[serde(default)]
    pub query_override_settings: QueryOverrideSettings,
    #[serde(default)]
    pub full_data_id_fields: Vec<FullDataIdField>,
    pub indexes: Vec<Index>,
}

impl IndexTypeMapping {
    fn initialize(&mut self) -> Result<()> {
        full_data_id::validate_parts(self.type_id, &self.full_data_id_fields)?;

        let mut names = HashSet::new();
        let mut suffixes = HashSet::new();
        for index in &mut self.indexes {
            if !names.insert(index.index_name.clone()) {
                return Err(Error::InvalidConfig(format!(
                    "TypeId {} defines index {} more than once",
                    self.type_id, index.index_name
                )));
            }
            if !suffixes.insert(index.extended_id_suffix as u8) {
                return Err(Error::InvalidConfig(format!(
                    "TypeId {} reuses ExtendedIdSuffix {}",
                    self.type_id, index.extended_id_suffix
                )));
            }
            index.initialize(self.type_id)?;
        }

        let capped = self.indexes.iter().any(|i| i.max_index_size > 0);
        if capped && self.indexes.len() > 1 && self.mode == IndexServerMode::Databound {
            return Err(Error::InvalidConfig(format!(
                "TypeId {}: capping is not supported for multiple indexes in Databound mode",
                self.type_id
            )));
        }
        Ok(())
    }

    /// Index definition by name
    pub fn index(&self, name: &str) -> Option<&Index> {
        self.indexes.iter().find(|i| i.index_name == name)
    }

    /// True when the full data id cannot be built without an index id
    pub fn full_data_id_uses_index_id(&self) -> bool {
        self.full_data_id_fields.iter().any(|f| f.uses_index_id())
    }
}

// =============================================================================
// Index
// =============================================================================

/// What an index is sorted on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimarySortInfo {
    #[serde(default)]
    pub is_tag: bool,
    #[serde(default)]
    pub field_name: String,
    pub sort_order_list: Vec<SortOrder>,
}

impl PrimarySortInfo {
    pub fn comparer(&self) -> BaseComparer {
        BaseComparer::new(self.is_tag, &self.field_name, self.sort_order_list.clone())
    }
}

/// Declared tag of an index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagConfig {
    pub name: String,
    #[serde(default)]
    pub data_type: DataType,
    /// Part of item identity when intersecting
    #[serde(default)]
    pub local_identity: bool,
    /// Stored as a 4-byte hash of the string value
    #[serde(default)]
    pub string_hash: bool,
}

/// One named secondary index of a type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Index {
    pub index_name: String,
    #[serde(default)]
    pub extended_id_suffix: i16,
    /// Maximum stored items, 0 for unbounded
    #[serde(default)]
    pub max_index_size: usize,
    /// Evict from the tail instead of the head when capped
    #[serde(default)]
    pub trim_from_tail: bool,
    pub primary_sort_info: PrimarySortInfo,
    #[serde(default)]
    pub metadata_present: bool,
    #[serde(default)]
    pub tags: Vec<TagConfig>,

    #[serde(skip)]
    local_identity_tags: Vec<TagKey>,
    #[serde(skip)]
    string_hash_codes: HashSet<i32>,
}

impl Index {
    /// Minimal index sorted as described
    pub fn new(name: impl Into<String>, primary_sort_info: PrimarySortInfo) -> Self {
        Self {
            index_name: name.into(),
            extended_id_suffix: 0,
            max_index_size: 0,
            trim_from_tail: false,
            primary_sort_info,
            metadata_present: false,
            tags: Vec::new(),
            local_identity_tags: Vec::new(),
            string_hash_codes: HashSet::new(),
        }
    }

    fn initialize(&mut self, type_id: i16) -> Result<()> {
        if self.primary_sort_info.sort_order_list.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "TypeId {}, index {}: empty SortOrderList",
                type_id, self.index_name
            )));
        }
        if self.primary_sort_info.is_tag && self.primary_sort_info.field_name.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "TypeId {}, index {}: tag sort without a field name",
                type_id, self.index_name
            )));
        }

        self.local_identity_tags = self
            .tags
            .iter()
            .filter(|t| t.local_identity)
            .map(|t| TagKey::new(t.name.as_str()))
            .collect();
        self.string_hash_codes = self
            .tags
            .iter()
            .filter(|t| t.string_hash && t.data_type == DataType::String)
            .map(|t| TagKey::new(t.name.as_str()).hash)
            .collect();
        Ok(())
    }

    /// Tags that identify an item across indexes
    pub fn local_identity_tags(&self) -> &[TagKey] {
        &self.local_identity_tags
    }

    /// Names of [`Index::local_identity_tags`]
    pub fn local_identity_tag_names(&self) -> Vec<String> {
        self.local_identity_tags.iter().map(|t| t.name.clone()).collect()
    }

    /// Hash codes of tags stored string-hashed
    pub fn string_hash_codes(&self) -> &HashSet<i32> {
        &self.string_hash_codes
    }

    /// Comparer for the index's primary sort
    pub fn comparer(&self) -> BaseComparer {
        self.primary_sort_info.comparer()
    }

    /// Leading sort order
    pub fn leading_sort_order(&self) -> SortOrder {
        self.primary_sort_info
            .sort_order_list
            .first()
            .copied()
            .unwrap_or_default()
    }
}
