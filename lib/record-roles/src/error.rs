use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Unknown attribute: {model}::{name}")]
    UnknownAttribute { model: String, name: String },

    #[error("Read-only attribute: {model}::{name}")]
    ReadOnlyAttribute { model: String, name: String },

    #[error("Unknown method: {model}::{name}")]
    UnknownMethod { model: String, name: String },

    #[error("Unknown relation: {model}::{relation}")]
    UnknownRelation { model: String, relation: String },

    #[error("Relation {relation} links {pairs} attribute pairs; exactly one is supported")]
    UnsupportedLink { relation: String, pairs: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Validation failed for {model}")]
    ValidationFailed { model: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Not found: {0}")]
    NotFound(String),
}
