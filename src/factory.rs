//! Node construction from binding descriptors.
//!
//! Every helper returns an unattached [`NewNode`]. Placing it in the tree is
//! the caller's job, through a [`crate::model::Transaction`].

use crate::error::{Result, TemplateError};
use crate::model::{tags, NewNode, Value};
use element_template_types::{Binding, Scalar, Variables};
use std::collections::BTreeMap;
use uuid::Uuid;

fn text(value: &Scalar) -> Value {
    Value::Str(value.as_text())
}

// ── Containers ──

pub fn create_extension_elements() -> NewNode {
    NewNode::new(tags::EXTENSION_ELEMENTS)
}

pub fn create_input_output() -> NewNode {
    NewNode::new(tags::INPUT_OUTPUT)
}

// ── Scripts and parameters ──

pub fn create_script(script_format: &str, value: &Scalar) -> NewNode {
    NewNode::new(tags::SCRIPT)
        .with("scriptFormat", script_format)
        .with("value", text(value))
}

/// Input parameter named after the binding; a script format wraps the value
/// in a nested script and leaves the plain value unset.
pub fn create_input_parameter(name: &str, script_format: Option<&str>, value: &Scalar) -> NewNode {
    let node = NewNode::new(tags::INPUT_PARAMETER).with("name", name);
    match script_format {
        Some(format) => node.with_child("definition", create_script(format, value)),
        None => node.with("value", text(value)),
    }
}

/// Output parameter: the property value is the parameter name, the
/// binding's source is what it reads.
pub fn create_output_parameter(source: &str, script_format: Option<&str>, value: &Scalar) -> NewNode {
    let node = NewNode::new(tags::OUTPUT_PARAMETER).with("name", text(value));
    let source = Scalar::from(source);
    match script_format {
        Some(format) => node.with_child("definition", create_script(format, &source)),
        None => node.with("value", text(&source)),
    }
}

// ── Extension nodes ──

pub fn create_camunda_property(name: &str, value: &Scalar) -> NewNode {
    NewNode::new(tags::PROPERTY)
        .with("name", name)
        .with("value", text(value))
}

pub fn create_field(name: &str, expression: bool, value: &Scalar) -> NewNode {
    let slot = if expression { "expression" } else { "string" };
    NewNode::new(tags::FIELD)
        .with("name", name)
        .with(slot, text(value))
}

pub fn create_task_header(key: &str, value: &Scalar) -> NewNode {
    NewNode::new(tags::HEADER)
        .with("key", key)
        .with("value", text(value))
}

/// Execution listener carrying either a nested script or one of the
/// `class` / `expression` / `delegateExpression` implementation attributes.
pub fn create_execution_listener(binding: &Binding, value: &Scalar) -> Result<NewNode> {
    let Binding::ExecutionListener {
        event,
        implementation_type,
        script_format,
    } = binding
    else {
        return Err(TemplateError::configuration(
            binding.type_name(),
            "not an execution listener binding",
        ));
    };

    let node = NewNode::new(tags::EXECUTION_LISTENER).with("event", event.as_str());
    match (script_format, implementation_type.as_deref()) {
        (Some(format), _) => Ok(node.with_child("script", create_script(format, value))),
        (None, Some(attr @ ("class" | "expression" | "delegateExpression"))) => {
            Ok(node.with(attr, text(value)))
        }
        (None, Some(other)) => Err(TemplateError::configuration(
            binding.type_name(),
            format!("unsupported implementationType '{}'", other),
        )),
        (None, None) => Err(TemplateError::configuration(
            binding.type_name(),
            "requires scriptFormat or implementationType",
        )),
    }
}

/// Attribute set of an in/out mapping for `binding` carrying `value`.
///
/// Only the combinations below are valid; anything else is a template
/// authoring error.
///
/// | type | binding                                   | attributes                          |
/// |------|-------------------------------------------|-------------------------------------|
/// | in   | target                                    | target, source=value                |
/// | in   | target, expression                        | target, sourceExpression=value      |
/// | in   | variables=local                           | local, variables=all                |
/// | in   | target, variables=local                   | local, source=value, target         |
/// | in   | target, expression, variables=local       | local, sourceExpression=value, target |
/// | in   | variables=all                             | variables=all                       |
/// | out  | source                                    | target=value, source                |
/// | out  | sourceExpression                          | target=value, sourceExpression      |
/// | out  | variables=all                             | variables=all                       |
/// | out  | source, variables=local                   | local, source, target=value         |
/// | out  | sourceExpression, variables=local         | local, sourceExpression, target=value |
/// | out  | variables=local                           | local, variables=all                |
pub fn in_out_attrs(binding: &Binding, value: &Scalar) -> Result<BTreeMap<String, Value>> {
    let invalid = || {
        TemplateError::configuration(binding.type_name(), "unsupported attribute combination")
    };
    let mut attrs = BTreeMap::new();
    let mut put = |key: &str, v: Value| {
        attrs.insert(key.to_string(), v);
    };
    let local = Value::Bool(true);
    let all = Value::str(Variables::All.as_str());

    match binding {
        Binding::In {
            target,
            expression,
            variables,
        } => match (target, *expression, variables) {
            (Some(t), false, None) => {
                put("target", Value::str(t));
                put("source", text(value));
            }
            (Some(t), true, None) => {
                put("target", Value::str(t));
                put("sourceExpression", text(value));
            }
            (None, false, Some(Variables::Local)) => {
                put("local", local);
                put("variables", all);
            }
            (Some(t), false, Some(Variables::Local)) => {
                put("local", local);
                put("source", text(value));
                put("target", Value::str(t));
            }
            (Some(t), true, Some(Variables::Local)) => {
                put("local", local);
                put("sourceExpression", text(value));
                put("target", Value::str(t));
            }
            (None, false, Some(Variables::All)) => put("variables", all),
            _ => return Err(invalid()),
        },
        Binding::Out {
            source,
            source_expression,
            variables,
        } => match (source, source_expression, variables) {
            (Some(s), None, None) => {
                put("target", text(value));
                put("source", Value::str(s));
            }
            (None, Some(e), None) => {
                put("target", text(value));
                put("sourceExpression", Value::str(e));
            }
            (None, None, Some(Variables::All)) => put("variables", all),
            (Some(s), None, Some(Variables::Local)) => {
                put("local", local);
                put("source", Value::str(s));
                put("target", text(value));
            }
            (None, Some(e), Some(Variables::Local)) => {
                put("local", local);
                put("sourceExpression", Value::str(e));
                put("target", text(value));
            }
            (None, None, Some(Variables::Local)) => {
                put("local", local);
                put("variables", all);
            }
            _ => return Err(invalid()),
        },
        Binding::InBusinessKey => put("businessKey", text(value)),
        _ => return Err(invalid()),
    }
    Ok(attrs)
}

pub fn create_in_out(binding: &Binding, value: &Scalar) -> Result<NewNode> {
    let type_tag = match binding {
        Binding::Out { .. } => tags::OUT,
        _ => tags::IN,
    };
    let mut node = NewNode::new(type_tag);
    node.attrs = in_out_attrs(binding, value)?;
    Ok(node)
}

// ── Errors and expressions ──

/// Synthesized error id: `<prefix><errorRef>_<32 hex digits>`.
pub fn next_error_id(prefix: &str, error_ref: &str) -> String {
    format!("{}{}_{}", prefix, error_ref, Uuid::new_v4().simple())
}

pub fn create_error(prefix: &str, error_ref: &str) -> NewNode {
    NewNode::new(tags::ERROR).with("id", next_error_id(prefix, error_ref))
}

/// Error event definition; the caller wires `errorRef`.
pub fn create_error_event_definition(expression: Option<&Scalar>) -> NewNode {
    NewNode::new(tags::ERROR_EVENT_DEFINITION).with_opt("expression", expression.map(text))
}

pub fn create_formal_expression(body: &Scalar, language: Option<&str>) -> NewNode {
    NewNode::new(tags::FORMAL_EXPRESSION)
        .with("body", text(body))
        .with_opt("language", language)
}
