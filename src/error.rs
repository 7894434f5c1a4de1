//! Error types for Procflow.
//!
//! All errors in Procflow are represented by the `ProcflowError` enum.
//! Structural errors (unknown definition, template or node type) are returned
//! to the caller of the triggering operation; business failures inside node
//! executors end up in the instance status and history instead.

use std::{io::ErrorKind, string::FromUtf8Error};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all Procflow operations.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq)]
pub enum ProcflowError {
    /// No definition is registered under the requested id.
    #[error("workflow definition '{0}' not found")]
    DefinitionNotFound(String),

    /// No template is registered under the requested id.
    #[error("workflow template '{0}' not found")]
    TemplateNotFound(String),

    /// No instance exists with the requested id.
    #[error("workflow instance '{0}' not found")]
    InstanceNotFound(String),

    /// The definition failed structural validation.
    #[error("invalid workflow definition: {0}")]
    InvalidDefinition(String),

    /// No executor is registered for the node's type tag.
    /// Always fatal to the instance, regardless of `continue_on_error`.
    #[error("unknown node type '{node_type}' on node '{node_id}' (instance {instance_id})")]
    UnknownNodeType {
        instance_id: String,
        node_id: String,
        node_type: String,
    },

    /// A synchronous node did not finish within its timeout.
    #[error("node '{node_id}' timed out after {timeout_secs}s")]
    NodeTimeout {
        node_id: String,
        timeout_secs: u64,
    },

    /// Business failure reported by a node executor.
    #[error("node '{node_id}' failed: {message}")]
    NodeExecution {
        node_id: String,
        message: String,
    },

    /// Another continuation of the same instance is already in progress.
    #[error("instance '{0}' is already being continued")]
    ConcurrentContinuation(String),

    /// The requested status change is not allowed by the instance state machine.
    #[error("instance '{instance_id}' cannot move from {from} to {to}")]
    InvalidStateTransition {
        instance_id: String,
        from: String,
        to: String,
    },

    /// Expression rejected by the safety denylist or failed to evaluate.
    #[error("{0}")]
    Expression(String),

    /// Engine-level errors (startup, shutdown, runtime).
    #[error("{0}")]
    Engine(String),

    /// Configuration parsing or validation errors.
    #[error("{0}")]
    Config(String),

    /// Data conversion errors (JSON, TOML).
    #[error("{0}")]
    Convert(String),

    /// Invalid node configuration for a built-in executor.
    #[error("{0}")]
    Action(String),

    /// Message queue errors.
    #[error("{0}")]
    Queue(String),

    /// I/O operation errors.
    #[error("{0}")]
    IoError(String),
}

impl From<ProcflowError> for String {
    fn from(val: ProcflowError) -> Self {
        val.to_string()
    }
}

impl From<std::io::Error> for ProcflowError {
    fn from(error: std::io::Error) -> Self {
        ProcflowError::IoError(error.to_string())
    }
}

impl From<ProcflowError> for std::io::Error {
    fn from(val: ProcflowError) -> Self {
        #[allow(clippy::io_other_error)]
        std::io::Error::new(ErrorKind::Other, val.to_string())
    }
}

impl From<FromUtf8Error> for ProcflowError {
    fn from(_: FromUtf8Error) -> Self {
        ProcflowError::Convert("Error with utf-8 string convert".to_string())
    }
}

impl From<serde_json::Error> for ProcflowError {
    fn from(error: serde_json::Error) -> Self {
        ProcflowError::Convert(error.to_string())
    }
}

impl From<toml::de::Error> for ProcflowError {
    fn from(error: toml::de::Error) -> Self {
        ProcflowError::Config(error.to_string())
    }
}

impl From<jsonschema::ValidationError<'_>> for ProcflowError {
    fn from(error: jsonschema::ValidationError<'_>) -> Self {
        ProcflowError::Action(error.to_string())
    }
}
