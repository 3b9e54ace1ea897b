//! Document lookups driven by binding descriptors.
//!
//! Every function here is a pure read over a [`ModelView`]. Absence is a
//! valid answer (`None` / empty list), never an error: callers fall back to
//! defaults or create what is missing.

use crate::model::{tags, ModelView, NewNode, NodeId, Value};
use element_template_types::{Binding, Scalar, Variables};

/// The element's `bpmn:ExtensionElements`, if present.
pub fn extension_container<V: ModelView + ?Sized>(view: &V, element: NodeId) -> Option<NodeId> {
    view.child(element, "extensionElements")
}

/// First extension of `type_tag`.
pub fn find_extension<V: ModelView + ?Sized>(
    view: &V,
    element: NodeId,
    type_tag: &str,
) -> Option<NodeId> {
    let container = extension_container(view, element)?;
    view.children(container, "values")
        .into_iter()
        .find(|id| view.is(*id, type_tag))
}

/// All extensions matching any of `types`, in document order.
pub fn find_extensions<V: ModelView + ?Sized>(
    view: &V,
    element: NodeId,
    types: &[&str],
) -> Vec<NodeId> {
    let Some(container) = extension_container(view, element) else {
        return Vec::new();
    };
    view.children(container, "values")
        .into_iter()
        .filter(|id| view.type_of(*id).is_some_and(|t| types.contains(&t)))
        .collect()
}

/// The input/output mapping of a host. Connectors hold it directly; every
/// other host keeps it in its extension container.
pub fn find_input_output<V: ModelView + ?Sized>(view: &V, host: NodeId) -> Option<NodeId> {
    if view.is(host, tags::CONNECTOR) {
        view.child(host, "inputOutput")
    } else {
        find_extension(view, host, tags::INPUT_OUTPUT)
    }
}

/// Input parameter keyed by name.
pub fn find_input_parameter<V: ModelView + ?Sized>(
    view: &V,
    mapping: NodeId,
    name: &str,
) -> Option<NodeId> {
    view.children(mapping, "inputParameters")
        .into_iter()
        .find(|id| view.str_attr(*id, "name") == Some(name))
}

/// Output parameter keyed by its source value.
///
/// With a script format the nested script body is compared, otherwise the
/// plain value. The parameter name is the write target and plays no part.
pub fn find_output_parameter<V: ModelView + ?Sized>(
    view: &V,
    mapping: NodeId,
    source: &str,
    script_format: Option<&str>,
) -> Option<NodeId> {
    view.children(mapping, "outputParameters")
        .into_iter()
        .find(|id| {
            let value = match script_format {
                Some(_) => script_of(view, *id).and_then(|s| view.str_attr(s, "value")),
                None => view.str_attr(*id, "value"),
            };
            value == Some(source)
        })
}

/// Nested `camunda:Script` under `definition` (parameters) or `script` (listeners).
pub fn script_of<V: ModelView + ?Sized>(view: &V, node: NodeId) -> Option<NodeId> {
    ["definition", "script"]
        .into_iter()
        .filter_map(|slot| view.child(node, slot))
        .find(|child| view.is(*child, tags::SCRIPT))
}

/// A parameter's value: the script body when scripted, else the plain value.
pub fn parameter_value<V: ModelView + ?Sized>(view: &V, parameter: NodeId) -> Option<Scalar> {
    match script_of(view, parameter) {
        Some(script) => view.scalar(script, "value"),
        None => view.scalar(parameter, "value"),
    }
}

/// Whether an existing `camunda:In`/`camunda:Out` node is the one `binding` addresses.
pub fn in_out_matches<V: ModelView + ?Sized>(view: &V, node: NodeId, binding: &Binding) -> bool {
    let variables_match = |variables: &Variables| {
        let local = matches!(view.attr(node, "local"), Some(Value::Bool(true)));
        view.str_attr(node, "variables") == Some("all") && local == (*variables == Variables::Local)
    };

    match binding {
        Binding::InBusinessKey => {
            view.is(node, tags::IN) && view.attr(node, "businessKey").is_some()
        }
        Binding::In {
            target, variables, ..
        } => {
            if !view.is(node, tags::IN) || view.attr(node, "businessKey").is_some() {
                return false;
            }
            match (target, variables) {
                (Some(target), _) => view.str_attr(node, "target") == Some(target.as_str()),
                (None, Some(variables)) => {
                    view.attr(node, "target").is_none() && variables_match(variables)
                }
                (None, None) => false,
            }
        }
        Binding::Out {
            source,
            source_expression,
            variables,
        } => {
            if !view.is(node, tags::OUT) {
                return false;
            }
            if let Some(source) = source {
                return view.str_attr(node, "source") == Some(source.as_str());
            }
            if let Some(expr) = source_expression {
                return view.str_attr(node, "sourceExpression") == Some(expr.as_str());
            }
            match variables {
                Some(variables) => {
                    view.attr(node, "source").is_none()
                        && view.attr(node, "sourceExpression").is_none()
                        && variables_match(variables)
                }
                None => false,
            }
        }
        _ => false,
    }
}

/// The in/out mapping `binding` addresses on `element`.
pub fn find_in_out<V: ModelView + ?Sized>(
    view: &V,
    element: NodeId,
    binding: &Binding,
) -> Option<NodeId> {
    find_extensions(view, element, &[tags::IN, tags::OUT])
        .into_iter()
        .find(|id| in_out_matches(view, *id, binding))
}

/// `camunda:Property` in a properties list, keyed by name.
pub fn find_camunda_property<V: ModelView + ?Sized>(
    view: &V,
    properties: NodeId,
    name: &str,
) -> Option<NodeId> {
    view.children(properties, "values")
        .into_iter()
        .find(|id| view.str_attr(*id, "name") == Some(name))
}

/// `camunda:Field` injection keyed by name.
pub fn find_field<V: ModelView + ?Sized>(view: &V, element: NodeId, name: &str) -> Option<NodeId> {
    find_extensions(view, element, &[tags::FIELD])
        .into_iter()
        .find(|id| view.str_attr(*id, "name") == Some(name))
}

/// `zeebe:Header` keyed by key.
pub fn find_task_header<V: ModelView + ?Sized>(
    view: &V,
    headers: NodeId,
    key: &str,
) -> Option<NodeId> {
    view.children(headers, "values")
        .into_iter()
        .find(|id| view.str_attr(*id, "key") == Some(key))
}

/// Execution listeners of a host, in document order.
pub fn find_listeners<V: ModelView + ?Sized>(view: &V, host: NodeId) -> Vec<NodeId> {
    find_extensions(view, host, &[tags::EXECUTION_LISTENER])
}

/// The listener `binding` addresses: same event, implemented the same way
/// (nested script or the named implementation attribute).
pub fn find_listener<V: ModelView + ?Sized>(
    view: &V,
    host: NodeId,
    binding: &Binding,
) -> Option<NodeId> {
    let Binding::ExecutionListener {
        event,
        implementation_type,
        script_format,
    } = binding
    else {
        return None;
    };
    find_listeners(view, host).into_iter().find(|id| {
        view.str_attr(*id, "event") == Some(event.as_str())
            && match (script_format, implementation_type) {
                (Some(_), _) => script_of(view, *id).is_some(),
                (None, Some(attr)) => view.attr(*id, attr).is_some(),
                (None, None) => false,
            }
    })
}

/// Rebuild an attached node as a [`NewNode`]: primitive attributes and
/// references are kept, owned single-slot children are captured recursively,
/// child lists are dropped. Used to compare existing content with what a
/// factory would build.
pub fn snapshot<V: ModelView + ?Sized>(view: &V, id: NodeId, keys: &[&str]) -> Option<NewNode> {
    let mut node = NewNode::new(view.type_of(id)?);
    for key in keys {
        match view.attr(id, key) {
            Some(Value::Node(child)) if view.parent(*child) == Some(id) => {
                let slots = ["scriptFormat", "value", "body", "language"];
                if let Some(child) = snapshot(view, *child, &slots) {
                    node.children.push((key.to_string(), child));
                }
            }
            Some(Value::List(_)) | None => {}
            Some(value) => {
                node.attrs.insert(key.to_string(), value.clone());
            }
        }
    }
    Some(node)
}

/// Whether `id` is a synthesized error id for `error_ref`: the exact
/// `<prefix><errorRef>_` prefix followed by a 32-digit hex suffix. A ref that
/// merely prefixes another ref (`a` vs `a_b`) does not match.
pub fn is_error_id_for(id: &str, prefix: &str, error_ref: &str) -> bool {
    let Some(rest) = id
        .strip_prefix(prefix)
        .and_then(|r| r.strip_prefix(error_ref))
        .and_then(|r| r.strip_prefix('_'))
    else {
        return false;
    };
    rest.len() == 32 && rest.chars().all(|c| c.is_ascii_hexdigit())
}

/// `camunda:ErrorEventDefinition` whose referenced error was synthesized for `error_ref`.
pub fn find_error_event_definition<V: ModelView + ?Sized>(
    view: &V,
    element: NodeId,
    error_ref: &str,
    prefix: &str,
) -> Option<NodeId> {
    find_extensions(view, element, &[tags::ERROR_EVENT_DEFINITION])
        .into_iter()
        .find(|definition| {
            view.child(*definition, "errorRef")
                .and_then(|error| view.str_attr(error, "id"))
                .is_some_and(|id| is_error_id_for(id, prefix, error_ref))
        })
}

/// First event definition of `type_tag` on the element.
pub fn find_event_definition<V: ModelView + ?Sized>(
    view: &V,
    element: NodeId,
    type_tag: &str,
) -> Option<NodeId> {
    view.children(element, "eventDefinitions")
        .into_iter()
        .find(|id| view.is(*id, type_tag))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Document;

    struct Fixture {
        doc: Document,
        task: NodeId,
        ext: NodeId,
        io: NodeId,
    }

    fn fixture() -> Fixture {
        let mut doc = Document::new();
        let task = doc
            .append(doc.root(), "rootElements", "bpmn:ServiceTask", [("id", "Task_1".into())])
            .unwrap();
        let ext = doc
            .set_child(task, "extensionElements", tags::EXTENSION_ELEMENTS, [])
            .unwrap();
        let io = doc.append(ext, "values", tags::INPUT_OUTPUT, []).unwrap();
        Fixture { doc, task, ext, io }
    }

    #[test]
    fn test_absent_container_yields_nothing() {
        let mut doc = Document::new();
        let task = doc
            .append(doc.root(), "rootElements", "bpmn:Task", [])
            .unwrap();
        assert!(find_extension(&doc, task, tags::INPUT_OUTPUT).is_none());
        assert!(find_extensions(&doc, task, &[tags::IN]).is_empty());
        assert!(find_input_output(&doc, task).is_none());
    }

    #[test]
    fn test_find_extensions_keeps_order() {
        let mut f = fixture();
        let a = f.doc.append(f.ext, "values", tags::FIELD, [("name", "a".into())]).unwrap();
        let _ = f.doc.append(f.ext, "values", tags::PROPERTIES, []).unwrap();
        let b = f.doc.append(f.ext, "values", tags::FIELD, [("name", "b".into())]).unwrap();

        assert_eq!(find_extensions(&f.doc, f.task, &[tags::FIELD]), vec![a, b]);
        assert_eq!(find_field(&f.doc, f.task, "b"), Some(b));
        assert_eq!(find_extension(&f.doc, f.task, tags::INPUT_OUTPUT), Some(f.io));
    }

    #[test]
    fn test_output_parameter_keyed_by_source() {
        let mut f = fixture();
        let plain = f
            .doc
            .append(
                f.io,
                "outputParameters",
                tags::OUTPUT_PARAMETER,
                [("name", "foo".into()), ("value", "x".into())],
            )
            .unwrap();
        let scripted = f
            .doc
            .append(f.io, "outputParameters", tags::OUTPUT_PARAMETER, [("name", "bar".into())])
            .unwrap();
        f.doc
            .set_child(
                scripted,
                "definition",
                tags::SCRIPT,
                [("scriptFormat", "js".into()), ("value", "y".into())],
            )
            .unwrap();

        assert_eq!(find_output_parameter(&f.doc, f.io, "x", None), Some(plain));
        assert_eq!(find_output_parameter(&f.doc, f.io, "foo", None), None);
        assert_eq!(find_output_parameter(&f.doc, f.io, "y", Some("js")), Some(scripted));
        assert_eq!(parameter_value(&f.doc, scripted), Some(Scalar::from("y")));
    }

    #[test]
    fn test_in_out_matching() {
        let mut f = fixture();
        let by_target = f
            .doc
            .append(f.ext, "values", tags::IN, [("target", "v".into()), ("source", "s".into())])
            .unwrap();
        let business_key = f
            .doc
            .append(f.ext, "values", tags::IN, [("businessKey", "#{key}".into())])
            .unwrap();
        let local_all = f
            .doc
            .append(
                f.ext,
                "values",
                tags::OUT,
                [("variables", "all".into()), ("local", Value::Bool(true))],
            )
            .unwrap();

        let in_binding = Binding::In {
            target: Some("v".into()),
            expression: false,
            variables: None,
        };
        assert_eq!(find_in_out(&f.doc, f.task, &in_binding), Some(by_target));
        assert_eq!(find_in_out(&f.doc, f.task, &Binding::InBusinessKey), Some(business_key));

        let out_local = Binding::Out {
            source: None,
            source_expression: None,
            variables: Some(Variables::Local),
        };
        let out_all = Binding::Out {
            source: None,
            source_expression: None,
            variables: Some(Variables::All),
        };
        assert_eq!(find_in_out(&f.doc, f.task, &out_local), Some(local_all));
        assert_eq!(find_in_out(&f.doc, f.task, &out_all), None);
    }

    #[test]
    fn test_listener_lookup_and_snapshot() {
        let mut f = fixture();
        let listener = f
            .doc
            .append(
                f.ext,
                "values",
                tags::EXECUTION_LISTENER,
                [("event", "start".into()), ("class", "com.example.Start".into())],
            )
            .unwrap();

        let by_class = Binding::ExecutionListener {
            event: "start".into(),
            implementation_type: Some("class".into()),
            script_format: None,
        };
        let by_script = Binding::ExecutionListener {
            event: "start".into(),
            implementation_type: None,
            script_format: Some("groovy".into()),
        };
        assert_eq!(find_listener(&f.doc, f.task, &by_class), Some(listener));
        assert_eq!(find_listener(&f.doc, f.task, &by_script), None);

        let snap = snapshot(&f.doc, listener, &["event", "class", "script"]).unwrap();
        let expected = NewNode::new(tags::EXECUTION_LISTENER)
            .with("event", "start")
            .with("class", "com.example.Start");
        assert_eq!(snap, expected);
    }

    #[test]
    fn test_error_id_correlation_is_structural() {
        let suffix = "0123456789abcdef0123456789abcdef";
        assert!(is_error_id_for(&format!("Error_a_{}", suffix), "Error_", "a"));
        assert!(!is_error_id_for(&format!("Error_a_b_{}", suffix), "Error_", "a"));
        assert!(!is_error_id_for("Error_a_123", "Error_", "a"));
        assert!(!is_error_id_for(&format!("Error_ab_{}", suffix), "Error_", "a"));
    }
}
