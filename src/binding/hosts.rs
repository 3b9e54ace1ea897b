//! Host resolution and get-or-create for intermediate containers.
//!
//! Every `ensure_*` function returns the id of an existing node, or queues
//! creation of a new one on the transaction and returns its fresh id.

use crate::accessors::{
    extension_container, find_error_event_definition, find_event_definition, find_extension,
};
use crate::config::TemplateConfig;
use crate::error::{Result, TemplateError};
use crate::factory;
use crate::model::{tags, ModelView, NewNode, NodeId, Transaction, Value};
use element_template_types::{Scope, ScopeKind};

/// Create `node` under `parent` and append it to the list under `key`.
pub(crate) fn push_new(
    tx: &mut Transaction<'_>,
    parent: NodeId,
    key: &str,
    node: NewNode,
) -> Result<NodeId> {
    let id = tx.create(parent, node)?;
    tx.push(parent, key, id)?;
    Ok(id)
}

/// Create `node` under `parent` and hold it in the single slot `key`.
pub(crate) fn set_new(
    tx: &mut Transaction<'_>,
    parent: NodeId,
    key: &str,
    node: NewNode,
) -> Result<NodeId> {
    let id = tx.create(parent, node)?;
    tx.set(parent, key, Some(Value::Node(id)))?;
    Ok(id)
}

pub fn ensure_extension_elements(tx: &mut Transaction<'_>, host: NodeId) -> Result<NodeId> {
    match extension_container(tx, host) {
        Some(id) => Ok(id),
        None => set_new(tx, host, "extensionElements", factory::create_extension_elements()),
    }
}

/// Singleton extension of `type_tag` in the host's extension container.
pub fn ensure_extension(tx: &mut Transaction<'_>, host: NodeId, type_tag: &str) -> Result<NodeId> {
    if let Some(id) = find_extension(tx, host, type_tag) {
        return Ok(id);
    }
    let container = ensure_extension_elements(tx, host)?;
    push_new(tx, container, "values", NewNode::new(type_tag))
}

pub fn ensure_input_output(tx: &mut Transaction<'_>, host: NodeId) -> Result<NodeId> {
    if tx.is(host, tags::CONNECTOR) {
        return match tx.child(host, "inputOutput") {
            Some(id) => Ok(id),
            None => set_new(tx, host, "inputOutput", factory::create_input_output()),
        };
    }
    ensure_extension(tx, host, tags::INPUT_OUTPUT)
}

/// The error event definition for `error_ref` and the `bpmn:Error` it
/// references. A missing pair is created: the error among the definitions'
/// root elements, the event definition in the element's extension container.
pub fn ensure_error_definition(
    tx: &mut Transaction<'_>,
    element: NodeId,
    error_ref: &str,
    config: &TemplateConfig,
) -> Result<(NodeId, NodeId)> {
    if let Some(definition) =
        find_error_event_definition(tx, element, error_ref, &config.error_id_prefix)
    {
        if let Some(error) = tx.child(definition, "errorRef") {
            return Ok((definition, error));
        }
    }

    let definitions = tx
        .definitions_of(element)
        .ok_or_else(|| TemplateError::MissingDefinitions {
            element_id: tx.element_id(element),
        })?;
    let error = push_new(
        tx,
        definitions,
        "rootElements",
        factory::create_error(&config.error_id_prefix, error_ref),
    )?;

    let container = ensure_extension_elements(tx, element)?;
    let definition = push_new(
        tx,
        container,
        "values",
        factory::create_error_event_definition(None),
    )?;
    tx.set(definition, "errorRef", Some(Value::Node(error)))?;
    tracing::debug!(error_ref, "created error and error event definition");
    Ok((definition, error))
}

/// Locate the node a scope's bindings write to. `None` scope means the
/// element itself.
pub fn find_host<V: ModelView + ?Sized>(
    view: &V,
    element: NodeId,
    scope: Option<&Scope>,
    config: &TemplateConfig,
) -> Option<NodeId> {
    let Some(scope) = scope else {
        return Some(element);
    };
    match scope.kind() {
        ScopeKind::Connector => find_extension(view, element, tags::CONNECTOR),
        ScopeKind::Other(type_tag) => find_extension(view, element, &type_tag),
        ScopeKind::EventDefinition(type_tag) => find_event_definition(view, element, &type_tag),
        ScopeKind::Error => {
            let error_ref = scope.id.as_deref()?;
            let definition =
                find_error_event_definition(view, element, error_ref, &config.error_id_prefix)?;
            view.child(definition, "errorRef")
        }
    }
}

/// Like [`find_host`], creating the host when it does not exist yet.
pub fn ensure_host(
    tx: &mut Transaction<'_>,
    element: NodeId,
    scope: Option<&Scope>,
    config: &TemplateConfig,
) -> Result<NodeId> {
    let Some(scope) = scope else {
        return Ok(element);
    };
    match scope.kind() {
        ScopeKind::Connector => ensure_extension(tx, element, tags::CONNECTOR),
        ScopeKind::Other(type_tag) => ensure_extension(tx, element, &type_tag),
        ScopeKind::EventDefinition(type_tag) => {
            match find_event_definition(tx, element, &type_tag) {
                Some(id) => Ok(id),
                None => push_new(tx, element, "eventDefinitions", NewNode::new(type_tag)),
            }
        }
        ScopeKind::Error => {
            let error_ref = scope.id.as_deref().ok_or_else(|| {
                TemplateError::configuration(scope.scope_type.as_str(), "error scope requires an id")
            })?;
            let (_, error) = ensure_error_definition(tx, element, error_ref, config)?;
            Ok(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessors::is_error_id_for;
    use crate::model::Document;

    fn doc_with_task() -> (Document, NodeId) {
        let mut doc = Document::new();
        let task = doc
            .append(doc.root(), "rootElements", "bpmn:ServiceTask", [("id", "Task_1".into())])
            .unwrap();
        (doc, task)
    }

    fn scope(scope_type: &str, id: Option<&str>) -> Scope {
        Scope {
            scope_type: scope_type.into(),
            id: id.map(str::to_string),
            properties: Vec::new(),
        }
    }

    #[test]
    fn test_ensure_is_get_or_create() {
        let (doc, task) = doc_with_task();
        let mut tx = Transaction::new(&doc, "t");
        let a = ensure_extension(&mut tx, task, tags::PROPERTIES).unwrap();
        let b = ensure_extension(&mut tx, task, tags::PROPERTIES).unwrap();
        assert_eq!(a, b);
        assert_eq!(tx.finish().created().count(), 2);
    }

    #[test]
    fn test_connector_holds_input_output_directly() {
        let (doc, task) = doc_with_task();
        let mut tx = Transaction::new(&doc, "t");
        let connector = ensure_host(&mut tx, task, Some(&scope(tags::CONNECTOR, None)), &TemplateConfig::default())
            .unwrap();
        let io = ensure_input_output(&mut tx, connector).unwrap();
        assert_eq!(tx.child(connector, "inputOutput"), Some(io));
        assert!(find_extension(&tx, task, tags::INPUT_OUTPUT).is_none());
    }

    #[test]
    fn test_error_scope_lives_in_root_elements() {
        let (doc, task) = doc_with_task();
        let config = TemplateConfig::default();
        let error_scope = scope(ScopeKind::ERROR, Some("err"));

        let mut tx = Transaction::new(&doc, "t");
        let error = ensure_host(&mut tx, task, Some(&error_scope), &config).unwrap();
        assert_eq!(tx.parent(error), Some(doc.root()));
        assert!(tx.children(doc.root(), "rootElements").contains(&error));
        assert!(is_error_id_for(tx.str_attr(error, "id").unwrap(), "Error_", "err"));
        assert_eq!(find_host(&tx, task, Some(&error_scope), &config), Some(error));
        assert_eq!(ensure_host(&mut tx, task, Some(&error_scope), &config).unwrap(), error);
    }

    #[test]
    fn test_error_scope_without_definitions_root() {
        let mut doc = Document::fragment("bpmn:SubProcess", "Sub_1");
        let task = doc
            .append(doc.root(), "flowElements", "bpmn:ServiceTask", [])
            .unwrap();
        let mut tx = Transaction::new(&doc, "t");
        let err = ensure_error_definition(&mut tx, task, "e", &TemplateConfig::default()).unwrap_err();
        assert_eq!(err.code(), "MISSING_DEFINITIONS");
    }
}
