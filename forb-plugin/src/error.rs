//! Registration and plugin failure types

use crate::CapabilityKind;
use thiserror::Error;

/// A rejected registration. Fatal for that entry only; the host logs and
/// skips it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("duplicate {kind} id: {id}")]
    DuplicateId { kind: CapabilityKind, id: String },

    #[error("invalid {kind} metadata for '{id}': {reason}")]
    InvalidMetadata { kind: CapabilityKind, id: String, reason: String },

    #[error("decoder '{id}': alias '{alias}' collides with decoder '{existing}'")]
    AliasCollision { id: String, alias: String, existing: String },
}

impl RegistryError {
    pub(crate) fn invalid(kind: CapabilityKind, id: &str, reason: impl Into<String>) -> Self {
        Self::InvalidMetadata { kind, id: id.to_string(), reason: reason.into() }
    }

    pub fn kind(&self) -> CapabilityKind {
        match self {
            Self::DuplicateId { kind, .. } | Self::InvalidMetadata { kind, .. } => *kind,
            Self::AliasCollision { .. } => CapabilityKind::Decoder,
        }
    }
}

/// Failure reported by a plugin from inside its own call
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct PluginFailure {
    message: String,
}

impl PluginFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
