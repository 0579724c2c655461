//! Error types for the CacheIndex storage engine

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while storing or querying cache indexes
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML (de)serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration is structurally invalid
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No index type mapping exists for a type id
    #[error("No IndexTypeMapping found for TypeId {type_id}")]
    TypeMappingNotFound { type_id: i16 },

    /// A related data-tier type could not be resolved
    #[error("Unable to resolve related type for TypeId {type_id}: {detail}")]
    RelatedTypeNotFound { type_id: i16, detail: String },

    // =========================================================================
    // Request Errors
    // =========================================================================
    /// Query or command failed validation
    #[error("{0}")]
    InvalidRequest(String),

    /// Target index is not configured for the type
    #[error("Invalid TargetIndexName - {name}")]
    UnknownIndex { name: String },

    // =========================================================================
    // Codec Errors
    // =========================================================================
    /// Serialized index record is malformed
    #[error("Decode error: {0}")]
    Decode(String),

    /// A tag required for sorting or identity is missing from an item
    #[error("Tag {name} not found on item")]
    TagNotFound { name: String },

    /// Tag hash has no registered name
    #[error("TagHashCode {hash} not found for TypeId {type_id}")]
    TagHashNotFound { type_id: i16, hash: i32 },

    /// String hash has no registered value
    #[error("StringHashCode {hash} not found for TypeId {type_id}")]
    StringHashNotFound { type_id: i16, hash: i32 },

    // =========================================================================
    // Compression Errors
    // =========================================================================
    /// Compression failed
    #[error("Compression failed with {algorithm}: {reason}")]
    CompressionFailed { algorithm: String, reason: String },

    /// Decompression failed
    #[error("Decompression failed with {algorithm}: {reason}")]
    DecompressionFailed { algorithm: String, reason: String },

    // =========================================================================
    // Relay Errors
    // =========================================================================
    /// Storage or forwarder component rejected a message
    #[error("Relay component error: {0}")]
    Relay(String),

    /// Remote cluster query failed
    #[error("Remote query failed: {0}")]
    Remote(String),

    // =========================================================================
    // Processing Errors
    // =========================================================================
    /// A mutation failed; carries the underlying error
    #[error("TypeId {type_id} -- Error processing {operation}: {source}")]
    Processing {
        type_id: i16,
        operation: &'static str,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Returns true for errors that indicate a deployment defect rather than a
    /// data condition. Processors re-raise these instead of folding them into a
    /// result's exception info.
    pub fn is_config_defect(&self) -> bool {
        matches!(
            self,
            Error::InvalidConfig(_)
                | Error::TypeMappingNotFound { .. }
                | Error::RelatedTypeNotFound { .. }
        )
    }

    /// Shorthand for a decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Error::Decode(msg.into())
    }

    /// Wraps a mutation failure with the operation it broke. Configuration
    /// defects pass through unchanged.
    pub fn processing(type_id: i16, operation: &'static str, source: Error) -> Self {
        if source.is_config_defect() {
            return source;
        }
        Error::Processing {
            type_id,
            operation,
            source: Box::new(source),
        }
    }

    /// Shorthand for a request validation error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Error::InvalidRequest(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defect_classification() {
        assert!(Error::TypeMappingNotFound { type_id: 3 }.is_config_defect());
        assert!(Error::RelatedTypeNotFound {
            type_id: 3,
            detail: "x".into()
        }
        .is_config_defect());
        assert!(!Error::decode("short buffer").is_config_defect());
        assert!(!Error::invalid_request("bad offset").is_config_defect());
    }

    #[test]
    fn test_processing_wraps_data_errors_only() {
        let wrapped = Error::processing(4, "save message", Error::decode("short"));
        assert_eq!(
            wrapped.to_string(),
            "TypeId 4 -- Error processing save message: Decode error: short"
        );
        let defect = Error::processing(4, "save message", Error::TypeMappingNotFound { type_id: 4 });
        assert!(defect.is_config_defect());
    }

    #[test]
    fn test_display() {
        let err = Error::UnknownIndex {
            name: "byDate".into(),
        };
        assert_eq!(err.to_string(), "Invalid TargetIndexName - byDate");
    }
}
