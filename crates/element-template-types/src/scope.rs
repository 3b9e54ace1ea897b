//! Scopes - nested sub-templates bound to a host other than the element.

use crate::PropertyDescriptor;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// A sub-template rooted at a structural type such as a connector or error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    #[serde(rename = "type")]
    pub scope_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub properties: Vec<PropertyDescriptor>,
}

/// Where a scope's host node lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// `camunda:Connector` in the element's extension container.
    Connector,
    /// `bpmn:Error` among the definitions' root elements.
    Error,
    /// A `bpmn:*EventDefinition` in the element's `eventDefinitions`.
    EventDefinition(String),
    Other(String),
}

impl ScopeKind {
    pub const CONNECTOR: &'static str = "camunda:Connector";
    pub const ERROR: &'static str = "bpmn:Error";

    pub fn from_type(scope_type: &str) -> Self {
        match scope_type {
            Self::CONNECTOR => ScopeKind::Connector,
            Self::ERROR => ScopeKind::Error,
            t if t.starts_with("bpmn:") && t.ends_with("EventDefinition") => {
                ScopeKind::EventDefinition(t.to_string())
            }
            t => ScopeKind::Other(t.to_string()),
        }
    }
}

impl Scope {
    pub fn kind(&self) -> ScopeKind {
        ScopeKind::from_type(&self.scope_type)
    }

    /// Stable key used in entry ids, e.g. `camunda-Connector` or `bpmn-Error-err1`.
    pub fn key(&self) -> String {
        let base = self.scope_type.replace(':', "-");
        match &self.id {
            Some(id) => format!("{}-{}", base, id),
            None => base,
        }
    }
}

#[derive(Deserialize)]
struct LegacyScope {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    properties: Vec<PropertyDescriptor>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScopesWire {
    List(Vec<Scope>),
    Map(BTreeMap<String, LegacyScope>),
}

/// Accepts `[{type, id?, properties}]` as well as the older
/// `{"camunda:Connector": {properties}}` map.
pub(crate) fn deserialize_scopes<'de, D>(deserializer: D) -> Result<Vec<Scope>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<ScopesWire>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(ScopesWire::List(list)) => list,
        Some(ScopesWire::Map(map)) => map
            .into_iter()
            .map(|(scope_type, legacy)| Scope {
                scope_type,
                id: legacy.id,
                properties: legacy.properties,
            })
            .collect(),
    })
}
