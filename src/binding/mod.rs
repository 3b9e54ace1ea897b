//! Binding value engine.
//!
//! A [`BoundProperty`] pairs a property descriptor with the element (and
//! optional scope) it applies to, and exposes the three operations the UI
//! drives:
//!
//! - `get_value` reads the live value, falling back to the declared default
//! - `set_value` writes through one transaction, creating containers on demand
//! - `validate` checks string constraints
//!
//! The node-level primitives ([`find_node`], [`node_value`], [`update_node`],
//! [`create_node`]) are shared with the reconciliation engine.

mod hosts;
pub mod validate;

pub use hosts::{
    ensure_error_definition, ensure_extension, ensure_extension_elements, ensure_host,
    ensure_input_output, find_host,
};
pub(crate) use hosts::{push_new, set_new};

use crate::accessors::{
    find_camunda_property, find_error_event_definition, find_extension, find_field, find_in_out,
    find_input_output, find_input_parameter, find_listener, find_output_parameter,
    find_task_header, parameter_value, script_of,
};
use crate::config::TemplateConfig;
use crate::error::{Result, TemplateError};
use crate::factory;
use crate::model::schema::attr_kind;
use crate::model::{tags, transact, CommandExecutor, ModelView, NodeId, Transaction, Value};
use element_template_types::{Binding, PropertyDescriptor, Scalar, Scope};

/// Attribute read and written as a nested `bpmn:FormalExpression`.
pub const CONDITION_EXPRESSION: &str = "conditionExpression";

/// Mutually exclusive service-task implementation attributes.
pub const IMPLEMENTATION_ATTRS: [&str; 3] = ["class", "delegateExpression", "expression"];

const IN_OUT_ATTRS: [&str; 6] = [
    "source",
    "sourceExpression",
    "target",
    "variables",
    "local",
    "businessKey",
];

/// Whether a write should materialize: a value is present, or the binding
/// is not optional.
pub fn should_update(value: &Scalar, property: &PropertyDescriptor) -> bool {
    !value.is_empty() || !property.optional
}

/// The value a property contributes when nothing else is known.
pub fn declared_value(property: &PropertyDescriptor) -> Scalar {
    property.value.clone().unwrap_or_else(Scalar::empty)
}

fn unknown_binding<V: ModelView + ?Sized>(view: &V, element: NodeId, binding: &Binding) -> TemplateError {
    TemplateError::UnknownBinding {
        element_id: view.element_id(element),
        binding_type: binding.type_name().to_string(),
    }
}

/// A property descriptor bound to a document element.
#[derive(Debug, Clone, Copy)]
pub struct BoundProperty<'a> {
    element: NodeId,
    property: &'a PropertyDescriptor,
    scope: Option<&'a Scope>,
    config: &'a TemplateConfig,
}

impl<'a> BoundProperty<'a> {
    pub fn new(element: NodeId, property: &'a PropertyDescriptor, config: &'a TemplateConfig) -> Self {
        Self {
            element,
            property,
            scope: None,
            config,
        }
    }

    /// Bind through a scope host instead of the element itself.
    pub fn in_scope(mut self, scope: &'a Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn element(&self) -> NodeId {
        self.element
    }

    pub fn property(&self) -> &'a PropertyDescriptor {
        self.property
    }

    pub fn scope(&self) -> Option<&'a Scope> {
        self.scope
    }

    fn binding<V: ModelView + ?Sized>(&self, view: &V) -> Result<&'a Binding> {
        match &self.property.binding {
            binding @ Binding::Unrecognized { .. } => Err(unknown_binding(view, self.element, binding)),
            binding => Ok(binding),
        }
    }

    /// Current value, or the declared default when nothing is stored.
    /// Optional properties default to empty.
    pub fn get_value<V: ModelView + ?Sized>(&self, view: &V) -> Result<Scalar> {
        let binding = self.binding(view)?;
        let current = find_host(view, self.element, self.scope, self.config)
            .and_then(|host| read_value(view, self.element, host, binding, self.config));
        Ok(current.unwrap_or_else(|| {
            if self.property.optional {
                Scalar::empty()
            } else {
                declared_value(self.property)
            }
        }))
    }

    /// Write `value`; every mutation lands in one batch.
    pub fn set_value<X: CommandExecutor + ?Sized>(&self, executor: &mut X, value: &Scalar) -> Result<()> {
        let binding = self.binding(executor.document())?;
        let label = format!("element-templates.set-value {}", binding);
        transact(executor, &label, |tx| {
            tracing::debug!(binding = %binding, value = %value, "set value");
            if !binding_is_plain(binding) && !should_update(value, self.property) {
                let existing = match find_host(&*tx, self.element, self.scope, self.config) {
                    Some(host) => find_node(&*tx, self.element, host, binding, self.config),
                    None => None,
                };
                return match existing {
                    Some(node) => detach(tx, node),
                    None => Ok(()),
                };
            }
            let host = ensure_host(tx, self.element, self.scope, self.config)?;
            write_value(tx, self.element, host, binding, value, self.config)
        })
    }

    /// First violated constraint's message, if any.
    pub fn validate<V: ModelView + ?Sized>(&self, view: &V, value: &Scalar) -> Result<Option<String>> {
        self.binding(view)?;
        validate::validate(self.property, value)
    }
}

fn binding_is_plain(binding: &Binding) -> bool {
    matches!(binding, Binding::Property { .. })
}

// ── Reads ──

/// Raw stored value for `binding` on `host`, without template defaults.
///
/// Plain attributes report their schema default when unset, so an unset
/// `asyncBefore` reads as `false`.
pub fn read_value<V: ModelView + ?Sized>(
    view: &V,
    element: NodeId,
    host: NodeId,
    binding: &Binding,
    config: &TemplateConfig,
) -> Option<Scalar> {
    match binding {
        Binding::Property { name, .. } if name == CONDITION_EXPRESSION => view
            .child(host, CONDITION_EXPRESSION)
            .and_then(|expr| view.scalar(expr, "body")),
        Binding::Property { name, .. } => view.scalar(host, name).or_else(|| {
            let type_tag = view.type_of(host)?;
            attr_kind(type_tag, name).default_value()
        }),
        _ => find_node(view, element, host, binding, config)
            .and_then(|node| node_value(view, node, binding)),
    }
}

/// The extension node `binding` addresses, if it exists.
pub fn find_node<V: ModelView + ?Sized>(
    view: &V,
    element: NodeId,
    host: NodeId,
    binding: &Binding,
    config: &TemplateConfig,
) -> Option<NodeId> {
    match binding {
        Binding::Property { .. } | Binding::Unrecognized { .. } => None,
        Binding::CamundaProperty { name } => {
            let properties = find_extension(view, host, tags::PROPERTIES)?;
            find_camunda_property(view, properties, name)
        }
        Binding::InputParameter { name, .. } => {
            let mapping = find_input_output(view, host)?;
            find_input_parameter(view, mapping, name)
        }
        Binding::OutputParameter {
            source,
            script_format,
        } => {
            let mapping = find_input_output(view, host)?;
            find_output_parameter(view, mapping, source, script_format.as_deref())
        }
        Binding::In { .. } | Binding::Out { .. } | Binding::InBusinessKey => {
            find_in_out(view, host, binding)
        }
        Binding::ExecutionListener { .. } => find_listener(view, host, binding),
        Binding::Field { name, .. } => find_field(view, host, name),
        Binding::ErrorEventDefinition { error_ref } => {
            find_error_event_definition(view, element, error_ref, &config.error_id_prefix)
        }
        Binding::TaskHeader { key } => {
            let headers = find_extension(view, host, tags::TASK_HEADERS)?;
            find_task_header(view, headers, key)
        }
    }
}

/// The property value an existing extension node carries for `binding`.
pub fn node_value<V: ModelView + ?Sized>(view: &V, node: NodeId, binding: &Binding) -> Option<Scalar> {
    match binding {
        Binding::Property { .. } | Binding::Unrecognized { .. } => None,
        Binding::CamundaProperty { .. } | Binding::TaskHeader { .. } => view.scalar(node, "value"),
        Binding::InputParameter { .. } => parameter_value(view, node),
        Binding::OutputParameter { .. } => view.scalar(node, "name"),
        Binding::In {
            target, expression, ..
        } => {
            target.as_ref()?;
            let key = if *expression { "sourceExpression" } else { "source" };
            view.scalar(node, key)
        }
        Binding::InBusinessKey => view.scalar(node, "businessKey"),
        Binding::Out {
            source,
            source_expression,
            ..
        } => {
            if source.is_none() && source_expression.is_none() {
                return None;
            }
            view.scalar(node, "target")
        }
        Binding::ExecutionListener {
            implementation_type,
            script_format,
            ..
        } => match (script_format, implementation_type) {
            (Some(_), _) => script_of(view, node).and_then(|s| view.scalar(s, "value")),
            (None, Some(attr)) => view.scalar(node, attr),
            (None, None) => None,
        },
        Binding::Field { expression, .. } => {
            view.scalar(node, if *expression { "expression" } else { "string" })
        }
        Binding::ErrorEventDefinition { .. } => view.scalar(node, "expression"),
    }
}

// ── Writes ──

/// Set a plain attribute on `host`.
///
/// Only primitive attributes may be written. Setting one of the
/// implementation attributes clears the other two.
pub fn set_plain(tx: &mut Transaction<'_>, host: NodeId, name: &str, value: &Scalar) -> Result<()> {
    let type_tag = tx.type_of(host).unwrap_or_default().to_string();
    let kind = attr_kind(&type_tag, name);
    if !kind.is_primitive() {
        return Err(TemplateError::TypeMismatch {
            name: name.to_string(),
            type_tag,
        });
    }
    tx.set(host, name, kind.coerce(value))?;
    if IMPLEMENTATION_ATTRS.contains(&name) {
        for other in IMPLEMENTATION_ATTRS.iter().filter(|a| **a != name) {
            tx.set(host, other, None)?;
        }
    }
    Ok(())
}

/// Write a condition expression body, creating the expression when absent.
/// A language is only written when one is given.
pub fn set_condition(
    tx: &mut Transaction<'_>,
    host: NodeId,
    body: &Scalar,
    language: Option<&str>,
) -> Result<()> {
    match tx.child(host, CONDITION_EXPRESSION) {
        Some(expr) => {
            tx.set(expr, "body", Some(Value::Str(body.as_text())))?;
            if let Some(language) = language {
                tx.set(expr, "language", Some(Value::str(language)))?;
            }
        }
        None => {
            set_new(
                tx,
                host,
                CONDITION_EXPRESSION,
                factory::create_formal_expression(body, language),
            )?;
        }
    }
    Ok(())
}

fn write_value(
    tx: &mut Transaction<'_>,
    element: NodeId,
    host: NodeId,
    binding: &Binding,
    value: &Scalar,
    config: &TemplateConfig,
) -> Result<()> {
    match binding {
        Binding::Property {
            name,
            script_format,
        } if name == CONDITION_EXPRESSION => {
            set_condition(tx, host, value, script_format.as_deref())
        }
        Binding::Property { name, .. } => set_plain(tx, host, name, value),
        _ => match find_node(tx, element, host, binding, config) {
            Some(node) => update_node(tx, node, binding, value),
            None => create_node(tx, element, host, binding, value, config).map(|_| ()),
        },
    }
}

/// Rewrite an existing extension node so it carries `value` for `binding`.
pub fn update_node(tx: &mut Transaction<'_>, node: NodeId, binding: &Binding, value: &Scalar) -> Result<()> {
    let text = || Some(Value::Str(value.as_text()));
    match binding {
        Binding::Property { .. } | Binding::Unrecognized { .. } => {}
        Binding::CamundaProperty { .. } | Binding::TaskHeader { .. } => {
            tx.set(node, "value", text())?;
        }
        Binding::InputParameter { script_format, .. } => match script_format {
            Some(format) => {
                match script_of(tx, node) {
                    Some(script) => {
                        tx.set(script, "scriptFormat", Some(Value::str(format)))?;
                        tx.set(script, "value", text())?;
                    }
                    None => {
                        set_new(tx, node, "definition", factory::create_script(format, value))?;
                    }
                }
                tx.set(node, "value", None)?;
            }
            None => {
                tx.set(node, "definition", None)?;
                tx.set(node, "value", text())?;
            }
        },
        Binding::OutputParameter { .. } => tx.set(node, "name", text())?,
        Binding::In { .. } | Binding::Out { .. } | Binding::InBusinessKey => {
            let mut attrs = factory::in_out_attrs(binding, value)?;
            for key in IN_OUT_ATTRS {
                tx.set(node, key, attrs.remove(key))?;
            }
        }
        Binding::ExecutionListener { script_format, .. } => {
            match (script_format, script_of(tx, node)) {
                (Some(_), Some(script)) => tx.set(script, "value", text())?,
                (Some(format), None) => {
                    set_new(tx, node, "script", factory::create_script(format, value))?;
                }
                (None, _) => {
                    let fresh = factory::create_execution_listener(binding, value)?;
                    for attr in IMPLEMENTATION_ATTRS {
                        tx.set(node, attr, fresh.attrs.get(attr).cloned())?;
                    }
                }
            }
        }
        Binding::Field { expression, .. } => {
            let (slot, other) = if *expression {
                ("expression", "string")
            } else {
                ("string", "expression")
            };
            tx.set(node, slot, text())?;
            tx.set(node, other, None)?;
        }
        Binding::ErrorEventDefinition { .. } => tx.set(node, "expression", text())?,
    }
    Ok(())
}

/// Build a new extension node for `binding`, creating its containers.
pub fn create_node(
    tx: &mut Transaction<'_>,
    element: NodeId,
    host: NodeId,
    binding: &Binding,
    value: &Scalar,
    config: &TemplateConfig,
) -> Result<NodeId> {
    match binding {
        Binding::Property { .. } | Binding::Unrecognized { .. } => {
            Err(unknown_binding(tx, element, binding))
        }
        Binding::CamundaProperty { name } => {
            let properties = ensure_extension(tx, host, tags::PROPERTIES)?;
            push_new(tx, properties, "values", factory::create_camunda_property(name, value))
        }
        Binding::TaskHeader { key } => {
            let headers = ensure_extension(tx, host, tags::TASK_HEADERS)?;
            push_new(tx, headers, "values", factory::create_task_header(key, value))
        }
        Binding::InputParameter {
            name,
            script_format,
        } => {
            let mapping = ensure_input_output(tx, host)?;
            let node = factory::create_input_parameter(name, script_format.as_deref(), value);
            push_new(tx, mapping, "inputParameters", node)
        }
        Binding::OutputParameter {
            source,
            script_format,
        } => {
            let mapping = ensure_input_output(tx, host)?;
            let node = factory::create_output_parameter(source, script_format.as_deref(), value);
            push_new(tx, mapping, "outputParameters", node)
        }
        Binding::In { .. } | Binding::Out { .. } | Binding::InBusinessKey => {
            let node = factory::create_in_out(binding, value)?;
            let container = ensure_extension_elements(tx, host)?;
            push_new(tx, container, "values", node)
        }
        Binding::ExecutionListener { .. } => {
            let node = factory::create_execution_listener(binding, value)?;
            let container = ensure_extension_elements(tx, host)?;
            push_new(tx, container, "values", node)
        }
        Binding::Field { name, expression } => {
            let container = ensure_extension_elements(tx, host)?;
            push_new(tx, container, "values", factory::create_field(name, *expression, value))
        }
        Binding::ErrorEventDefinition { error_ref } => {
            let (definition, _) = ensure_error_definition(tx, element, error_ref, config)?;
            update_node(tx, definition, binding, value)?;
            Ok(definition)
        }
    }
}

/// Detach an extension node from the list that holds it in its parent and
/// drop it from the arena.
pub fn detach(tx: &mut Transaction<'_>, node: NodeId) -> Result<()> {
    let Some(parent) = tx.parent(node) else {
        return Ok(());
    };
    let slot = match tx.type_of(node) {
        Some(tags::INPUT_PARAMETER) => "inputParameters",
        Some(tags::OUTPUT_PARAMETER) => "outputParameters",
        _ => "values",
    };
    tx.remove(parent, slot, &[node])?;
    Ok(())
}
