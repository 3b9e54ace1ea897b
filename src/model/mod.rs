//! Process document model.
//!
//! The document is an arena of typed nodes addressed by [`NodeId`]. Parent
//! links are stored as ids, never as references, so a batch under
//! construction can hold ids to nodes that do not exist in the arena yet.
//!
//! ```text
//! bpmn:Definitions (root)
//! ├── rootElements: [bpmn:Process, bpmn:Error, ...]
//! │   └── flowElements: [bpmn:ServiceTask, ...]
//! │       └── extensionElements: bpmn:ExtensionElements
//! │           └── values: [camunda:InputOutput, camunda:Properties, ...]
//! ```
//!
//! Reads go through [`ModelView`], implemented by both [`Document`] and the
//! in-flight [`Transaction`] overlay.

mod command_stack;
mod document;
pub mod schema;
mod transaction;

pub use command_stack::{CommandExecutor, CommandStack};
pub use document::Document;
pub use transaction::{transact, ChangeSet, Mutation, Transaction};

use element_template_types::Scalar;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

// ─── Type tags ────────────────────────────────────────────────

pub mod tags {
    pub const DEFINITIONS: &str = "bpmn:Definitions";
    pub const EXTENSION_ELEMENTS: &str = "bpmn:ExtensionElements";
    pub const FORMAL_EXPRESSION: &str = "bpmn:FormalExpression";
    pub const ERROR: &str = "bpmn:Error";
    pub const INPUT_OUTPUT: &str = "camunda:InputOutput";
    pub const INPUT_PARAMETER: &str = "camunda:InputParameter";
    pub const OUTPUT_PARAMETER: &str = "camunda:OutputParameter";
    pub const SCRIPT: &str = "camunda:Script";
    pub const PROPERTIES: &str = "camunda:Properties";
    pub const PROPERTY: &str = "camunda:Property";
    pub const IN: &str = "camunda:In";
    pub const OUT: &str = "camunda:Out";
    pub const FIELD: &str = "camunda:Field";
    pub const EXECUTION_LISTENER: &str = "camunda:ExecutionListener";
    pub const ERROR_EVENT_DEFINITION: &str = "camunda:ErrorEventDefinition";
    pub const CONNECTOR: &str = "camunda:Connector";
    pub const TASK_HEADERS: &str = "zeebe:TaskHeaders";
    pub const HEADER: &str = "zeebe:Header";
}

// ─── Ids and values ───────────────────────────────────────────

/// Stable identifier of a node in the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(Uuid);

impl NodeId {
    pub fn new() -> Self {
        NodeId(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// An attribute value. `Node` and `List` hold child or reference ids.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Str(String),
    Bool(bool),
    Int(i64),
    Node(NodeId),
    List(Vec<NodeId>),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Value::Node(id) => Some(*id),
            _ => None,
        }
    }

    /// Primitive values as a [`Scalar`]; node-valued attributes yield `None`.
    pub fn to_scalar(&self) -> Option<Scalar> {
        match self {
            Value::Str(s) => Some(Scalar::Str(s.clone())),
            Value::Bool(b) => Some(Scalar::Bool(*b)),
            Value::Int(i) => Some(Scalar::Int(*i)),
            Value::Node(_) | Value::List(_) => None,
        }
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        match s {
            Scalar::Bool(b) => Value::Bool(b),
            Scalar::Int(i) => Value::Int(i),
            Scalar::Str(s) => Value::Str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

// ─── Nodes ────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    pub type_tag: String,
    pub parent: Option<NodeId>,
    pub attrs: BTreeMap<String, Value>,
}

/// A constructed node that is not attached anywhere yet.
///
/// Factory helpers return these; [`Transaction::create`] allocates ids and
/// wires the parent. `children` are single-slot children (such as a
/// parameter's nested script) created together with the node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewNode {
    pub type_tag: String,
    pub attrs: BTreeMap<String, Value>,
    pub children: Vec<(String, NewNode)>,
}

impl NewNode {
    pub fn new(type_tag: impl Into<String>) -> Self {
        Self {
            type_tag: type_tag.into(),
            attrs: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attrs.insert(key.to_string(), value.into());
        self
    }

    /// Set `key` only when a value is present.
    pub fn with_opt(mut self, key: &str, value: Option<impl Into<Value>>) -> Self {
        if let Some(v) = value {
            self.attrs.insert(key.to_string(), v.into());
        }
        self
    }

    pub fn with_child(mut self, key: &str, child: NewNode) -> Self {
        self.children.push((key.to_string(), child));
        self
    }
}

// ─── Read access ──────────────────────────────────────────────

/// Read-only view over a document.
pub trait ModelView {
    fn root(&self) -> NodeId;
    fn type_of(&self, id: NodeId) -> Option<&str>;
    fn parent(&self, id: NodeId) -> Option<NodeId>;
    fn attr(&self, id: NodeId, key: &str) -> Option<&Value>;

    fn is(&self, id: NodeId, type_tag: &str) -> bool {
        self.type_of(id) == Some(type_tag)
    }

    fn str_attr(&self, id: NodeId, key: &str) -> Option<&str> {
        self.attr(id, key).and_then(Value::as_str)
    }

    fn scalar(&self, id: NodeId, key: &str) -> Option<Scalar> {
        self.attr(id, key).and_then(Value::to_scalar)
    }

    /// Single-slot child (or reference) held under `key`.
    fn child(&self, id: NodeId, key: &str) -> Option<NodeId> {
        self.attr(id, key).and_then(Value::as_node)
    }

    /// List-valued children under `key`, in document order.
    fn children(&self, id: NodeId, key: &str) -> Vec<NodeId> {
        match self.attr(id, key) {
            Some(Value::List(ids)) => ids.clone(),
            Some(Value::Node(id)) => vec![*id],
            _ => Vec::new(),
        }
    }

    /// The element's `id` attribute, falling back to the arena id.
    fn element_id(&self, id: NodeId) -> String {
        self.str_attr(id, "id")
            .map(str::to_string)
            .unwrap_or_else(|| id.to_string())
    }

    /// Nearest `bpmn:Definitions` ancestor (or self).
    fn definitions_of(&self, id: NodeId) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(node) = current {
            if self.is(node, tags::DEFINITIONS) {
                return Some(node);
            }
            current = self.parent(node);
        }
        None
    }
}
