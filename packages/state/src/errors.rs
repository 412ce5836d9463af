//! Error types for property state

use thiserror::Error;

/// Required/forbidden/exclusive property violations and rejected values
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("{entity} requires a \"{key}\" property")]
    MissingProperty { entity: String, key: String },

    #[error("{entity} must not have a \"{key}\" property")]
    ForbiddenProperty { entity: String, key: String },

    #[error("{entity} must only have {allowed:?}, found \"{key}\"")]
    UnexpectedProperty {
        entity: String,
        key: String,
        allowed: Vec<String>,
    },

    #[error("Invalid value for \"{key}\": {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Misuse of an observed container
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContainerError {
    #[error("Index {index} out of range for list of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Value not present in list: {0}")]
    ValueNotPresent(String),
}
