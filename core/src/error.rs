//! Error types for persistree

use thiserror::Error;

/// Main error type for persistree
#[derive(Error, Debug)]
pub enum PersistError {
    // ============ Path Errors ============
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
    
    // ============ Configuration Errors ============
    #[error("Configuration error: {0}")]
    ConfigError(String),
    
    #[error("Unknown storage: {0}")]
    UnknownStorage(String),
    
    // ============ Storage Errors ============
    #[error("Storage error: {0}")]
    StorageError(String),
    
    #[error("Stored value under key '{key}' is not a mapping")]
    NotAMapping { key: String },
    
    #[error("Serialization failed: {0}")]
    SerializationError(String),
    
    #[error("Deserialization failed: {0}")]
    DeserializationError(String),
    
    // ============ Store Errors ============
    #[error("Store '{0}' is not persisted")]
    NotPersisted(String),
    
    // ============ General Errors ============
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PersistError {
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        PersistError::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for PersistError {
    fn from(err: std::io::Error) -> Self {
        PersistError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for PersistError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            PersistError::DeserializationError(err.to_string())
        } else {
            PersistError::SerializationError(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_json_error_maps_to_deserialization() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: PersistError = err.into();
        assert!(matches!(err, PersistError::DeserializationError(_)));
    }
    
    #[test]
    fn test_invalid_path_message() {
        let err = PersistError::invalid_path("a..b", "empty segment");
        assert_eq!(err.to_string(), "Invalid path 'a..b': empty segment");
    }
}
