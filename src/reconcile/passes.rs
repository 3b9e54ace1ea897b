//! Per-category reconciliation passes.
//!
//! Each pass runs inside the caller's transaction and only touches nodes of
//! its own category on one host.

use super::matching::{find_old_property, Category};
use crate::accessors::{
    find_extension, find_extensions, find_input_output, find_listeners, is_error_id_for, snapshot,
};
use crate::binding::{
    create_node, declared_value, detach, ensure_extension, ensure_extension_elements, find_node,
    node_value, push_new, read_value, set_condition, set_plain, should_update, update_node,
    CONDITION_EXPRESSION,
};
use crate::config::TemplateConfig;
use crate::error::Result;
use crate::factory;
use crate::model::{tags, ModelView, NewNode, NodeId, Transaction, Value};
use element_template_types::{same_value, Binding, PropertyDescriptor, Scalar};
use std::ops::AddAssign;

const LISTENER_KEYS: [&str; 5] = ["event", "class", "expression", "delegateExpression", "script"];
const PROPERTY_KEYS: [&str; 2] = ["name", "value"];

/// Counts for one pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassStats {
    pub created: usize,
    /// Matched nodes brought to the new template's value.
    pub updated: usize,
    /// Matched nodes left alone because the user edited them.
    pub preserved: usize,
    pub removed: usize,
}

impl PassStats {
    pub fn is_empty(&self) -> bool {
        *self == PassStats::default()
    }
}

impl AddAssign for PassStats {
    fn add_assign(&mut self, other: Self) {
        self.created += other.created;
        self.updated += other.updated;
        self.preserved += other.preserved;
        self.removed += other.removed;
    }
}

/// What one pass reconciles: the element, the node the bindings write to,
/// and the old and new property lists for that host.
pub(crate) struct PassInput<'a> {
    pub element: NodeId,
    pub host: NodeId,
    pub old: &'a [PropertyDescriptor],
    pub new: &'a [PropertyDescriptor],
    pub config: &'a TemplateConfig,
    /// Replace camunda properties wholesale instead of matching them.
    pub replace_properties: bool,
    /// Error refs owned by error scopes; their definitions are never removed.
    pub scoped_errors: Vec<&'a str>,
}

/// Run one category pass. Categories the new property list does not use
/// are left untouched.
pub(crate) fn run(tx: &mut Transaction<'_>, input: &PassInput<'_>, category: Category) -> Result<PassStats> {
    let new: Vec<&PropertyDescriptor> = input
        .new
        .iter()
        .filter(|p| Category::of(&p.binding) == Some(category))
        .collect();
    if new.is_empty() {
        return Ok(PassStats::default());
    }

    match category {
        Category::Property => plain_properties(tx, input, &new),
        Category::ExecutionListener => {
            let desired = build_all(&new, factory::create_execution_listener)?;
            let existing = find_listeners(&*tx, input.host);
            let host = input.host;
            replace_all(tx, existing, desired, &LISTENER_KEYS, |tx| {
                ensure_extension_elements(tx, host)
            })
        }
        Category::CamundaProperty if input.replace_properties => {
            let desired = build_all(&new, |binding, value| match binding {
                Binding::CamundaProperty { name } => Ok(factory::create_camunda_property(name, value)),
                _ => Ok(NewNode::new(tags::PROPERTY)),
            })?;
            let existing = existing_nodes(&*tx, input, category);
            let host = input.host;
            replace_all(tx, existing, desired, &PROPERTY_KEYS, |tx| {
                ensure_extension(tx, host, tags::PROPERTIES)
            })
        }
        _ => match_nodes(tx, input, category, &new),
    }
}

/// Current nodes of `category` on the pass host: the pool that matched
/// nodes are taken from and whose leftovers are removed.
fn existing_nodes<V: ModelView + ?Sized>(view: &V, input: &PassInput<'_>, category: Category) -> Vec<NodeId> {
    let host = input.host;
    let list_of = |container: Option<NodeId>, key: &str| {
        container
            .map(|c| view.children(c, key))
            .unwrap_or_default()
    };
    match category {
        Category::Property => Vec::new(),
        Category::ExecutionListener => find_listeners(view, host),
        Category::Field => find_extensions(view, host, &[tags::FIELD]),
        Category::InOut => find_extensions(view, host, &[tags::IN, tags::OUT]),
        Category::InputOutput => {
            let mapping = find_input_output(view, host);
            let mut nodes = list_of(mapping, "inputParameters");
            nodes.extend(list_of(mapping, "outputParameters"));
            nodes
        }
        Category::CamundaProperty => list_of(find_extension(view, host, tags::PROPERTIES), "values"),
        Category::TaskHeader => list_of(find_extension(view, host, tags::TASK_HEADERS), "values"),
        Category::ErrorEventDefinition => {
            find_extensions(view, input.element, &[tags::ERROR_EVENT_DEFINITION])
        }
    }
}

/// Whether an error event definition belongs to one of the template's error
/// scopes; those are reconciled by the scope pass and never removed here.
fn owned_by_scope<V: ModelView + ?Sized>(view: &V, input: &PassInput<'_>, node: NodeId) -> bool {
    let Some(error_id) = view
        .child(node, "errorRef")
        .and_then(|error| view.str_attr(error, "id"))
    else {
        return false;
    };
    let prefix = input.config.error_id_prefix.as_str();
    input
        .scoped_errors
        .iter()
        .any(|error_ref| is_error_id_for(error_id, prefix, error_ref))
}

/// Keep matched nodes, create unmatched ones, remove the rest.
fn match_nodes(
    tx: &mut Transaction<'_>,
    input: &PassInput<'_>,
    category: Category,
    new: &[&PropertyDescriptor],
) -> Result<PassStats> {
    let mut stats = PassStats::default();
    let mut pool = existing_nodes(&*tx, input, category);

    for property in new {
        let value = declared_value(property);
        let matched = find_old_property(input.old, property).and_then(|old| {
            find_node(&*tx, input.element, input.host, &old.binding, input.config)
                .filter(|node| pool.contains(node))
                .map(|node| (old, node))
        });

        match matched {
            Some((old, node)) => {
                let current = node_value(&*tx, node, &old.binding);
                if !same_value(current.as_ref(), old.value.as_ref()) {
                    stats.preserved += 1;
                } else if should_update(&value, property) {
                    update_node(tx, node, &property.binding, &value)?;
                    stats.updated += 1;
                } else {
                    // Optional and now empty: leave it in the pool.
                    continue;
                }
                pool.retain(|n| *n != node);
            }
            None if should_update(&value, property) => {
                let node = create_node(
                    tx,
                    input.element,
                    input.host,
                    &property.binding,
                    &value,
                    input.config,
                )?;
                // Error event definitions are get-or-create.
                if pool.contains(&node) {
                    pool.retain(|n| *n != node);
                    stats.updated += 1;
                } else {
                    stats.created += 1;
                }
            }
            None => {}
        }
    }

    for node in pool {
        if category == Category::ErrorEventDefinition && owned_by_scope(&*tx, input, node) {
            continue;
        }
        detach(tx, node)?;
        stats.removed += 1;
    }
    Ok(stats)
}

fn plain_properties(
    tx: &mut Transaction<'_>,
    input: &PassInput<'_>,
    new: &[&PropertyDescriptor],
) -> Result<PassStats> {
    let mut stats = PassStats::default();
    for property in new {
        let Binding::Property { name, .. } = &property.binding else {
            continue;
        };
        let old = find_old_property(input.old, property);

        if name == CONDITION_EXPRESSION {
            match condition_expression(tx, input.host, old, property)? {
                Condition::Written => stats.updated += 1,
                Condition::Edited => stats.preserved += 1,
                Condition::Unchanged => {}
            }
            continue;
        }

        let Some(value) = &property.value else {
            continue;
        };
        let current = read_value(&*tx, input.element, input.host, &property.binding, input.config);
        match old {
            Some(old) if !same_value(current.as_ref(), old.value.as_ref()) => stats.preserved += 1,
            _ => {
                set_plain(tx, input.host, name, value)?;
                stats.updated += 1;
            }
        }
    }
    Ok(stats)
}

enum Condition {
    Written,
    /// Nothing written because the user edited body or language.
    Edited,
    Unchanged,
}

/// Body and language are reconciled independently: each is overwritten only
/// while it still holds the old template's value.
fn condition_expression(
    tx: &mut Transaction<'_>,
    host: NodeId,
    old: Option<&PropertyDescriptor>,
    new: &PropertyDescriptor,
) -> Result<Condition> {
    let language = new.binding.script_format();
    let Some(expr) = tx.child(host, CONDITION_EXPRESSION) else {
        return match &new.value {
            Some(body) => {
                set_condition(tx, host, body, language)?;
                Ok(Condition::Written)
            }
            None => Ok(Condition::Unchanged),
        };
    };

    let body_untouched = old.map_or(true, |old| {
        same_value(tx.scalar(expr, "body").as_ref(), old.value.as_ref())
    });
    let language_untouched = old.map_or(true, |old| {
        tx.str_attr(expr, "language") == old.binding.script_format()
    });

    let mut written = false;
    let body = new.value.as_ref().map(|v| Value::Str(v.as_text()));
    if body_untouched && tx.attr(expr, "body") != body.as_ref() {
        tx.set(expr, "body", body)?;
        written = true;
    }
    let language = language.map(Value::str);
    if language_untouched && tx.attr(expr, "language") != language.as_ref() {
        tx.set(expr, "language", language)?;
        written = true;
    }

    Ok(if written {
        Condition::Written
    } else if body_untouched && language_untouched {
        Condition::Unchanged
    } else {
        Condition::Edited
    })
}

/// Factory output for every property that should materialize.
fn build_all<F>(properties: &[&PropertyDescriptor], build: F) -> Result<Vec<NewNode>>
where
    F: Fn(&Binding, &Scalar) -> Result<NewNode>,
{
    properties
        .iter()
        .map(|p| (p, declared_value(p)))
        .filter(|(p, value)| should_update(value, p))
        .map(|(p, value)| build(&p.binding, &value))
        .collect()
}

/// Swap `existing` for `desired` unless they already have the same content.
fn replace_all<C>(
    tx: &mut Transaction<'_>,
    existing: Vec<NodeId>,
    desired: Vec<NewNode>,
    keys: &[&str],
    container: C,
) -> Result<PassStats>
where
    C: FnOnce(&mut Transaction<'_>) -> Result<NodeId>,
{
    let current: Vec<NewNode> = existing
        .iter()
        .filter_map(|id| snapshot(&*tx, *id, keys))
        .collect();
    if current == desired {
        return Ok(PassStats {
            updated: existing.len(),
            ..PassStats::default()
        });
    }

    let mut stats = PassStats::default();
    for node in existing {
        detach(tx, node)?;
        stats.removed += 1;
    }
    if !desired.is_empty() {
        let parent = container(tx)?;
        for node in desired {
            push_new(tx, parent, "values", node)?;
            stats.created += 1;
        }
    }
    Ok(stats)
}
