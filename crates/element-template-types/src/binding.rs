//! Binding descriptors - where a property's value lives.

use serde::{Deserialize, Serialize};
use std::fmt;

/// `variables` marker on in/out mappings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variables {
    All,
    Local,
}

impl Variables {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variables::All => "all",
            Variables::Local => "local",
        }
    }

    fn parse(s: &str) -> Result<Self, String> {
        match s {
            "all" => Ok(Variables::All),
            "local" => Ok(Variables::Local),
            other => Err(format!("invalid variables value '{}'", other)),
        }
    }
}

/// Where a template property's value is read from and written to.
///
/// Serialized with the JSON `type` field as the tag. Anything with an
/// unrecognised tag parses into [`Binding::Unrecognized`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBinding", into = "RawBinding")]
pub enum Binding {
    /// An attribute on the element (or scope host) itself. `script_format`
    /// is only read for `conditionExpression`, where it sets the language.
    Property {
        name: String,
        script_format: Option<String>,
    },
    /// `camunda:Property` inside the `camunda:Properties` extension.
    CamundaProperty { name: String },
    /// `camunda:InputParameter`, keyed by name.
    InputParameter {
        name: String,
        script_format: Option<String>,
    },
    /// `camunda:OutputParameter`, keyed by its source value; the property
    /// value is the parameter name.
    OutputParameter {
        source: String,
        script_format: Option<String>,
    },
    /// `camunda:In` process-variable mapping.
    In {
        target: Option<String>,
        expression: bool,
        variables: Option<Variables>,
    },
    /// `camunda:Out` process-variable mapping.
    Out {
        source: Option<String>,
        source_expression: Option<String>,
        variables: Option<Variables>,
    },
    /// The single `camunda:In` carrying `businessKey`.
    InBusinessKey,
    ExecutionListener {
        event: String,
        implementation_type: Option<String>,
        script_format: Option<String>,
    },
    /// `camunda:Field` injection, keyed by name.
    Field { name: String, expression: bool },
    /// `camunda:ErrorEventDefinition` referencing an error scope.
    ErrorEventDefinition { error_ref: String },
    /// `zeebe:Header` inside `zeebe:TaskHeaders`, keyed by key.
    TaskHeader { key: String },
    Unrecognized { binding_type: String },
}

impl Binding {
    pub const PROPERTY: &'static str = "property";
    pub const CAMUNDA_PROPERTY: &'static str = "camunda:property";
    pub const INPUT_PARAMETER: &'static str = "camunda:inputParameter";
    pub const OUTPUT_PARAMETER: &'static str = "camunda:outputParameter";
    pub const IN: &'static str = "camunda:in";
    pub const OUT: &'static str = "camunda:out";
    pub const IN_BUSINESS_KEY: &'static str = "camunda:in:businessKey";
    pub const EXECUTION_LISTENER: &'static str = "camunda:executionListener";
    pub const FIELD: &'static str = "camunda:field";
    pub const ERROR_EVENT_DEFINITION: &'static str = "camunda:errorEventDefinition";
    pub const TASK_HEADER: &'static str = "zeebe:taskHeader";

    /// The JSON `type` tag of this binding.
    pub fn type_name(&self) -> &str {
        match self {
            Binding::Property { .. } => Self::PROPERTY,
            Binding::CamundaProperty { .. } => Self::CAMUNDA_PROPERTY,
            Binding::InputParameter { .. } => Self::INPUT_PARAMETER,
            Binding::OutputParameter { .. } => Self::OUTPUT_PARAMETER,
            Binding::In { .. } => Self::IN,
            Binding::Out { .. } => Self::OUT,
            Binding::InBusinessKey => Self::IN_BUSINESS_KEY,
            Binding::ExecutionListener { .. } => Self::EXECUTION_LISTENER,
            Binding::Field { .. } => Self::FIELD,
            Binding::ErrorEventDefinition { .. } => Self::ERROR_EVENT_DEFINITION,
            Binding::TaskHeader { .. } => Self::TASK_HEADER,
            Binding::Unrecognized { binding_type } => binding_type,
        }
    }

    pub fn property(name: impl Into<String>) -> Self {
        Binding::Property {
            name: name.into(),
            script_format: None,
        }
    }

    /// Mappings handled by the in/out reconciliation pass.
    pub fn is_in_out(&self) -> bool {
        matches!(
            self,
            Binding::In { .. } | Binding::Out { .. } | Binding::InBusinessKey
        )
    }

    pub fn script_format(&self) -> Option<&str> {
        match self {
            Binding::Property { script_format, .. }
            | Binding::InputParameter { script_format, .. }
            | Binding::OutputParameter { script_format, .. }
            | Binding::ExecutionListener { script_format, .. } => script_format.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

// ── Wire form ──

/// Flat JSON shape shared by every binding type.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBinding {
    #[serde(rename = "type")]
    binding_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source_expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    script_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    variables: Option<String>,
    #[serde(default, skip_serializing_if = "crate::is_false")]
    expression: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    implementation_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<String>,
}

fn required(value: Option<String>, field: &str, binding_type: &str) -> Result<String, String> {
    value.ok_or_else(|| format!("binding '{}' requires '{}'", binding_type, field))
}

impl TryFrom<RawBinding> for Binding {
    type Error = String;

    fn try_from(raw: RawBinding) -> Result<Self, Self::Error> {
        let ty = raw.binding_type.as_str();
        let variables = raw.variables.as_deref().map(Variables::parse).transpose()?;

        let binding = match ty {
            Binding::PROPERTY => Binding::Property {
                name: required(raw.name, "name", ty)?,
                script_format: raw.script_format,
            },
            Binding::CAMUNDA_PROPERTY => Binding::CamundaProperty {
                name: required(raw.name, "name", ty)?,
            },
            Binding::INPUT_PARAMETER => Binding::InputParameter {
                name: required(raw.name, "name", ty)?,
                script_format: raw.script_format,
            },
            Binding::OUTPUT_PARAMETER => Binding::OutputParameter {
                source: required(raw.source, "source", ty)?,
                script_format: raw.script_format,
            },
            Binding::IN => Binding::In {
                target: raw.target,
                expression: raw.expression,
                variables,
            },
            Binding::OUT => Binding::Out {
                source: raw.source,
                source_expression: raw.source_expression,
                variables,
            },
            Binding::IN_BUSINESS_KEY => Binding::InBusinessKey,
            Binding::EXECUTION_LISTENER => Binding::ExecutionListener {
                event: required(raw.event, "event", ty)?,
                implementation_type: raw.implementation_type,
                script_format: raw.script_format,
            },
            Binding::FIELD => Binding::Field {
                name: required(raw.name, "name", ty)?,
                expression: raw.expression,
            },
            Binding::ERROR_EVENT_DEFINITION => Binding::ErrorEventDefinition {
                error_ref: required(raw.error_ref, "errorRef", ty)?,
            },
            Binding::TASK_HEADER => Binding::TaskHeader {
                key: required(raw.key, "key", ty)?,
            },
            other => Binding::Unrecognized {
                binding_type: other.to_string(),
            },
        };
        Ok(binding)
    }
}

impl From<Binding> for RawBinding {
    fn from(binding: Binding) -> Self {
        let binding_type = binding.type_name().to_string();
        let mut raw = RawBinding {
            binding_type,
            ..Default::default()
        };
        match binding {
            Binding::Property {
                name,
                script_format,
            } => {
                raw.name = Some(name);
                raw.script_format = script_format;
            }
            Binding::CamundaProperty { name } => raw.name = Some(name),
            Binding::InputParameter {
                name,
                script_format,
            } => {
                raw.name = Some(name);
                raw.script_format = script_format;
            }
            Binding::OutputParameter {
                source,
                script_format,
            } => {
                raw.source = Some(source);
                raw.script_format = script_format;
            }
            Binding::In {
                target,
                expression,
                variables,
            } => {
                raw.target = target;
                raw.expression = expression;
                raw.variables = variables.map(|v| v.as_str().to_string());
            }
            Binding::Out {
                source,
                source_expression,
                variables,
            } => {
                raw.source = source;
                raw.source_expression = source_expression;
                raw.variables = variables.map(|v| v.as_str().to_string());
            }
            Binding::InBusinessKey | Binding::Unrecognized { .. } => {}
            Binding::ExecutionListener {
                event,
                implementation_type,
                script_format,
            } => {
                raw.event = Some(event);
                raw.implementation_type = implementation_type;
                raw.script_format = script_format;
            }
            Binding::Field { name, expression } => {
                raw.name = Some(name);
                raw.expression = expression;
            }
            Binding::ErrorEventDefinition { error_ref } => raw.error_ref = Some(error_ref),
            Binding::TaskHeader { key } => raw.key = Some(key),
        }
        raw
    }
}
