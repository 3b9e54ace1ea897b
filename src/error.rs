//! Error types for the binding and reconciliation engines.

use crate::model::NodeId;
use thiserror::Error;

/// Failures while reading or mutating the document arena.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// A mutation or lookup named a node that is not in the arena.
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    /// A create record reused an id that is already allocated.
    #[error("Node already exists: {0}")]
    DuplicateNode(NodeId),
}

/// Errors raised by the template engines.
///
/// Validation failures are not errors - they come back from `validate` as
/// plain messages.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The template itself is malformed, e.g. an in/out binding combination
    /// with no attribute mapping.
    #[error("Invalid {binding_type} binding: {reason}")]
    Configuration {
        /// Binding or scope type the template declared.
        binding_type: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A binding type no dispatch branch handles.
    #[error("Unknown binding type '{binding_type}' on element {element_id}")]
    UnknownBinding {
        /// Element the template was being applied to.
        element_id: String,
        /// The unrecognized `binding.type`.
        binding_type: String,
    },

    /// A plain property write targeted a non-primitive attribute.
    #[error("Cannot set non-primitive attribute '{name}' on {type_tag}")]
    TypeMismatch {
        /// Attribute the property is bound to.
        name: String,
        /// Type of the node that owns the attribute.
        type_tag: String,
    },

    /// A global scope (e.g. `bpmn:Error`) needs a definitions root and the
    /// element has none.
    #[error("Element {element_id} is not contained in a bpmn:Definitions root")]
    MissingDefinitions {
        /// Element that has no definitions ancestor.
        element_id: String,
    },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Invalid template JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

impl TemplateError {
    pub(crate) fn configuration(binding_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            binding_type: binding_type.into(),
            reason: reason.into(),
        }
    }

    /// Get an error code for this error type.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "CONFIGURATION",
            Self::UnknownBinding { .. } => "UNKNOWN_BINDING",
            Self::TypeMismatch { .. } => "TYPE_MISMATCH",
            Self::MissingDefinitions { .. } => "MISSING_DEFINITIONS",
            Self::Model(_) => "MODEL",
            Self::Parse(_) => "PARSE",
        }
    }
}

pub type Result<T, E = TemplateError> = std::result::Result<T, E>;
