//! Error types
//!
//! Only construction-order and graph-wiring mistakes are errors. Missing or
//! malformed parameter values are resolved to defaults where they are read
//! (see [`crate::config`]) and never reach this type.

use crate::graph::NodeId;
use thiserror::Error;

/// Errors raised by the engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SynthError {
    #[error("effect id `{0}` is already registered")]
    DuplicateEffectId(String),

    #[error("cannot register effect `{0}`: the effects chain is already initialized")]
    RegistrationAfterFinalize(String),

    #[error("the effects chain is already initialized")]
    AlreadyInitialized,

    #[error("no effect registered under id `{0}`")]
    UnknownEffect(String),

    #[error("invalid node")]
    InvalidNode,

    #[error("invalid port `{0}`")]
    InvalidPort(String),

    #[error("invalid parameter `{0}`")]
    InvalidParam(String),

    #[error("cycle detected involving {} nodes without a delay line", nodes.len())]
    CycleDetected { nodes: Vec<NodeId> },
}

pub type Result<T> = std::result::Result<T, SynthError>;
