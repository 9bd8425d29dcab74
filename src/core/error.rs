//! Generation pass errors.
//!
//! Every variant aborts the whole pass; a partial graph is never emitted.

use crate::core::producer::EntityId;
use crate::core::types::Platform;
use std::fmt;

/// A work item that never became ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StuckItem {
    pub producer: &'static str,
    pub entity: EntityId,
}

impl fmt::Display for StuckItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <- {}", self.producer, self.entity)
    }
}

fn join_items(items: &[StuckItem]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Error raised by a generation pass.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// A producer read an output that was never registered (ordering bug).
    #[error("output of {producer} for '{entity}' requested before it was registered")]
    MissingOutput {
        producer: &'static str,
        entity: EntityId,
    },

    /// The same (producer, entity) output was registered twice.
    #[error("output of {producer} for '{entity}' registered twice")]
    DuplicateOutput {
        producer: &'static str,
        entity: EntityId,
    },

    /// Stored output does not have the producer's output type.
    #[error("output of {producer} for '{entity}' has an unexpected type")]
    OutputTypeMismatch {
        producer: &'static str,
        entity: EntityId,
    },

    /// A full sweep made no progress while items were still pending.
    #[error("generation stalled, {} item(s) can never run: {}", .items.len(), join_items(.items))]
    Stalled { items: Vec<StuckItem> },

    /// Two work items emitted resources with the same address.
    #[error("resource {address} emitted by {producer} for '{entity}' already exists")]
    DuplicateResource {
        address: String,
        producer: &'static str,
        entity: EntityId,
    },

    /// A permission declaration names a resource kind the platform lacks.
    #[error("{location}: {kind} permission is not supported on {platform}")]
    InvalidDeclaration {
        kind: &'static str,
        platform: Platform,
        location: String,
    },

    /// A producer was handed an entity of the wrong variant.
    #[error("producer {producer} cannot generate '{entity}'")]
    UnexpectedEntity {
        producer: &'static str,
        entity: EntityId,
    },

    /// The schema references a lambda that does not exist.
    #[error("'{entity}' references unknown lambda '{lambda}'")]
    UnknownLambda { entity: EntityId, lambda: String },

    /// An output or resource body could not be encoded.
    #[error("cannot encode output of {producer}: {message}")]
    Encode {
        producer: &'static str,
        message: String,
    },
}
