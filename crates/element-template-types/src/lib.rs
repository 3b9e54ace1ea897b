//! Element Template Descriptors
//!
//! Serde types for element templates as they are authored in JSON. A template
//! is an ordered list of property descriptors; each descriptor pairs UI
//! metadata with a [`Binding`] that says where its value lives in a process
//! document.
//!
//! ## Rules
//!
//! 1. Descriptors are immutable inputs - nothing in here mutates a document
//! 2. Bindings are a closed tagged union keyed by the JSON `type` field
//! 3. Unknown binding types survive parsing as [`Binding::Unrecognized`] so the
//!    engine can report them against the element they were applied to
//!
//! # Example
//!
//! ```
//! use element_template_types::{Binding, Template};
//!
//! let template: Template = serde_json::from_str(r#"{
//!   "id": "com.example.mail",
//!   "version": 1,
//!   "appliesTo": ["bpmn:ServiceTask"],
//!   "properties": [
//!     { "label": "Recipient",
//!       "value": "ops@example.com",
//!       "binding": { "type": "camunda:inputParameter", "name": "to" } }
//!   ]
//! }"#).unwrap();
//!
//! assert!(matches!(template.properties[0].binding, Binding::InputParameter { .. }));
//! ```

mod binding;
mod scope;

pub use binding::{Binding, Variables};
pub use scope::{Scope, ScopeKind};

use serde::{Deserialize, Serialize};
use std::fmt;

// ── Helper defaults for serde ──

fn default_true() -> bool {
    true
}

fn is_false(v: &bool) -> bool {
    !v
}

fn is_true(v: &bool) -> bool {
    *v
}

// ── Scalar ──

/// A primitive template or document value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl Scalar {
    /// Textual form used when comparing values across representations.
    pub fn as_text(&self) -> String {
        match self {
            Scalar::Bool(b) => b.to_string(),
            Scalar::Int(i) => i.to_string(),
            Scalar::Str(s) => s.clone(),
        }
    }

    /// JavaScript-style truthiness.
    pub fn is_truthy(&self) -> bool {
        match self {
            Scalar::Bool(b) => *b,
            Scalar::Int(i) => *i != 0,
            Scalar::Str(s) => !s.is_empty(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Scalar::Str(s) if s.is_empty())
    }

    pub fn empty() -> Self {
        Scalar::Str(String::new())
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Str(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Str(s)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Int(i)
    }
}

/// Compares two optional values the way reconciliation needs: absent and
/// empty are the same, and `true` equals `"true"`.
pub fn same_value(a: Option<&Scalar>, b: Option<&Scalar>) -> bool {
    let text = |v: Option<&Scalar>| v.map(Scalar::as_text).unwrap_or_default();
    text(a) == text(b)
}

// ── Template ──

/// A versioned set of bindings plus UI metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applies_to: Vec<String>,
    #[serde(default)]
    pub properties: Vec<PropertyDescriptor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<Group>,
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "scope::deserialize_scopes"
    )]
    pub scopes: Vec<Scope>,
}

impl Template {
    /// Whether this template may be applied to an element of `type_tag`.
    /// An empty `appliesTo` list applies everywhere.
    pub fn applies_to(&self, type_tag: &str) -> bool {
        self.applies_to.is_empty() || self.applies_to.iter().any(|t| t == type_tag)
    }

    /// Properties whose binding satisfies `pred`, in template order.
    pub fn properties_where<'a>(
        &'a self,
        pred: impl Fn(&Binding) -> bool + 'a,
    ) -> impl Iterator<Item = &'a PropertyDescriptor> + 'a {
        self.properties.iter().filter(move |p| pred(&p.binding))
    }

    /// Find a scope by kind, and by id for scopes that carry one.
    pub fn scope(&self, kind: &ScopeKind, id: Option<&str>) -> Option<&Scope> {
        self.scopes
            .iter()
            .find(|s| &s.kind() == kind && s.id.as_deref() == id)
    }

    pub fn group_label(&self, group_id: &str) -> Option<&str> {
        self.groups
            .iter()
            .find(|g| g.id == group_id)
            .map(|g| g.label.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub label: String,
}

// ── Property descriptor ──

/// Widget a property is rendered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WidgetType {
    String,
    Text,
    Boolean,
    Dropdown,
    Hidden,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub name: String,
    pub value: String,
}

/// A binding plus UI metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub widget: Option<WidgetType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Scalar>,
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub editable: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Constraints>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
    pub binding: Binding,
}

impl PropertyDescriptor {
    /// A bare descriptor around `binding`, mostly useful in tests.
    pub fn new(binding: Binding) -> Self {
        Self {
            label: None,
            description: None,
            widget: None,
            value: None,
            editable: true,
            optional: false,
            constraints: None,
            group: None,
            choices: Vec::new(),
            binding,
        }
    }

    pub fn with_value(mut self, value: impl Into<Scalar>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

// ── Constraints ──

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraints {
    #[serde(default, skip_serializing_if = "is_false")]
    pub not_empty: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<Pattern>,
}

/// A regex constraint, bare or with a custom message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Pattern {
    Plain(String),
    Described {
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl Pattern {
    pub fn regex(&self) -> &str {
        match self {
            Pattern::Plain(p) => p,
            Pattern::Described { value, .. } => value,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Pattern::Plain(_) => None,
            Pattern::Described { message, .. } => message.as_deref(),
        }
    }
}
