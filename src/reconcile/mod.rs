//! Template reconciliation engine.
//!
//! [`apply_template`] moves an element from reflecting one template to
//! reflecting another:
//!
//! 1. New template absent: clear the marker attributes, nothing else
//! 2. New template present: set the markers, then run one pass per binding
//!    category and one pass per declared scope
//!
//! Every pass is its own batch on the command executor. A pass for a category
//! the new template does not use leaves that category's nodes alone.

mod matching;
mod passes;

pub use matching::{find_old_property, same_binding, Category};
pub use passes::PassStats;

use crate::binding::{declared_value, ensure_host, find_host, should_update};
use crate::config::TemplateConfig;
use crate::error::{ModelError, Result, TemplateError};
use crate::factory;
use crate::model::{transact, CommandExecutor, ModelView, NodeId, Transaction, Value};
use element_template_types::{Binding, Scope, ScopeKind, Template};
use passes::PassInput;

/// Outcome of one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub label: String,
    pub stats: PassStats,
}

/// Per-pass counts for one template change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub passes: Vec<PassReport>,
}

impl ReconcileReport {
    pub fn totals(&self) -> PassStats {
        let mut totals = PassStats::default();
        for pass in &self.passes {
            totals += pass.stats;
        }
        totals
    }

    pub fn pass(&self, label: &str) -> Option<&PassStats> {
        self.passes.iter().find(|p| p.label == label).map(|p| &p.stats)
    }

    fn record(&mut self, label: String, stats: PassStats) {
        tracing::debug!(
            pass = %label,
            created = stats.created,
            updated = stats.updated,
            preserved = stats.preserved,
            removed = stats.removed,
            "reconciliation pass"
        );
        self.passes.push(PassReport { label, stats });
    }
}

/// Reconcile `element` from `old` to `new`.
pub fn apply_template<X: CommandExecutor + ?Sized>(
    executor: &mut X,
    element: NodeId,
    old: Option<&Template>,
    new: Option<&Template>,
    config: &TemplateConfig,
) -> Result<ReconcileReport> {
    let doc = executor.document();
    if doc.type_of(element).is_none() {
        return Err(ModelError::UnknownNode(element).into());
    }
    let element_id = doc.element_id(element);
    let mut report = ReconcileReport::default();

    let Some(new) = new else {
        transact(executor, "element-templates.remove", |tx| {
            set_markers(tx, element, None, config)
        })?;
        tracing::info!(element = %element_id, "removed element template");
        return Ok(report);
    };

    check_template(doc, element, new)?;

    transact(executor, "element-templates.markers", |tx| {
        set_markers(tx, element, Some(new), config)
    })?;

    let input = PassInput {
        element,
        host: element,
        old: old.map(|t| t.properties.as_slice()).unwrap_or_default(),
        new: &new.properties,
        config,
        replace_properties: false,
        scoped_errors: new
            .scopes
            .iter()
            .filter(|s| s.kind() == ScopeKind::Error)
            .filter_map(|s| s.id.as_deref())
            .collect(),
    };
    for category in Category::ALL {
        let label = format!("element-templates.{}", category.as_str());
        let stats = transact(executor, &label, |tx| passes::run(tx, &input, category))?;
        report.record(label, stats);
    }

    for scope in &new.scopes {
        if scope.kind() == ScopeKind::Error && scope.id.is_none() {
            tracing::warn!(element = %element_id, "skipping bpmn:Error scope without an id");
            continue;
        }
        let old_scope = old.and_then(|t| t.scope(&scope.kind(), scope.id.as_deref()));
        let label = format!("element-templates.scope.{}", scope.key());
        let stats = transact(executor, &label, |tx| {
            reconcile_scope(tx, element, old_scope, scope, config)
        })?;
        report.record(label, stats);
    }

    tracing::info!(
        element = %element_id,
        template = %new.id,
        version = ?new.version,
        from = ?old.map(|t| (&t.id, t.version)),
        "applied element template"
    );
    Ok(report)
}

fn set_markers(
    tx: &mut Transaction<'_>,
    element: NodeId,
    template: Option<&Template>,
    config: &TemplateConfig,
) -> Result<()> {
    let id = template.map(|t| Value::str(t.id.as_str()));
    let version = template
        .and_then(|t| t.version)
        .map(|v| Value::Int(i64::from(v)));
    tx.set(element, &config.template_attribute, id)?;
    tx.set(element, &config.version_attribute, version)?;
    Ok(())
}

/// Fail before touching the document if any property could not be written:
/// unknown bindings, listener or in/out bindings the factory rejects, and
/// error bindings on an element outside a definitions root.
fn check_template<V: ModelView + ?Sized>(view: &V, element: NodeId, template: &Template) -> Result<()> {
    let scoped = template.scopes.iter().flat_map(|s| s.properties.iter());
    let mut needs_definitions = template
        .scopes
        .iter()
        .any(|s| s.kind() == ScopeKind::Error && s.id.is_some());

    for property in template.properties.iter().chain(scoped) {
        let value = declared_value(property);
        match &property.binding {
            Binding::Unrecognized { binding_type } => {
                return Err(TemplateError::UnknownBinding {
                    element_id: view.element_id(element),
                    binding_type: binding_type.clone(),
                });
            }
            binding @ Binding::ExecutionListener { .. } => {
                factory::create_execution_listener(binding, &value)?;
            }
            binding @ (Binding::In { .. } | Binding::Out { .. } | Binding::InBusinessKey) => {
                factory::in_out_attrs(binding, &value)?;
            }
            Binding::ErrorEventDefinition { .. } => {
                needs_definitions |= should_update(&value, property);
            }
            _ => {}
        }
    }

    if needs_definitions && view.definitions_of(element).is_none() {
        return Err(TemplateError::MissingDefinitions {
            element_id: view.element_id(element),
        });
    }
    Ok(())
}

/// One scope: resolve (or create) its host, then run every category pass
/// against it with camunda properties replaced wholesale.
fn reconcile_scope(
    tx: &mut Transaction<'_>,
    element: NodeId,
    old: Option<&Scope>,
    scope: &Scope,
    config: &TemplateConfig,
) -> Result<PassStats> {
    let existed = find_host(&*tx, element, Some(scope), config).is_some();
    let host = ensure_host(tx, element, Some(scope), config)?;

    let input = PassInput {
        element,
        host,
        old: old.map(|s| s.properties.as_slice()).unwrap_or_default(),
        new: &scope.properties,
        config,
        replace_properties: true,
        scoped_errors: Vec::new(),
    };
    let mut stats = PassStats {
        created: usize::from(!existed),
        ..PassStats::default()
    };
    for category in Category::ALL {
        stats += passes::run(tx, &input, category)?;
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessors::find_extension;
    use crate::model::{tags, CommandStack, Document};
    use serde_json::json;

    fn task() -> (CommandStack, NodeId) {
        let mut doc = Document::new();
        let task = doc
            .append(doc.root(), "rootElements", "bpmn:ServiceTask", [("id", "Task_1".into())])
            .unwrap();
        (CommandStack::new(doc), task)
    }

    fn template(value: serde_json::Value) -> Template {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_unknown_element() {
        let (mut stack, _) = task();
        let t = template(json!({ "id": "t", "properties": [] }));
        let err = apply_template(&mut stack, NodeId::new(), None, Some(&t), &TemplateConfig::default())
            .unwrap_err();
        assert_eq!(err.code(), "MODEL");
    }

    #[test]
    fn test_optional_emptied_binding_is_removed() {
        let (mut stack, task) = task();
        let config = TemplateConfig::default();
        let v1 = template(json!({ "id": "t", "version": 1, "properties": [
            { "value": "x", "optional": true,
              "binding": { "type": "camunda:property", "name": "cc" } }
        ]}));
        let v2 = template(json!({ "id": "t", "version": 2, "properties": [
            { "optional": true, "binding": { "type": "camunda:property", "name": "cc" } }
        ]}));

        apply_template(&mut stack, task, None, Some(&v1), &config).unwrap();
        let properties = find_extension(stack.document(), task, tags::PROPERTIES).unwrap();
        assert_eq!(stack.document().children(properties, "values").len(), 1);

        let report = apply_template(&mut stack, task, Some(&v1), Some(&v2), &config).unwrap();
        assert!(stack.document().children(properties, "values").is_empty());
        assert_eq!(report.pass("element-templates.camunda-properties").unwrap().removed, 1);
    }

    #[test]
    fn test_error_scope_without_id_is_skipped() {
        let (mut stack, task) = task();
        let t = template(json!({
            "id": "t",
            "properties": [],
            "scopes": [
                { "type": "bpmn:Error",
                  "properties": [ { "value": "E", "binding": { "type": "property", "name": "errorCode" } } ] }
            ]
        }));
        let report = apply_template(&mut stack, task, None, Some(&t), &TemplateConfig::default()).unwrap();
        assert!(report.passes.iter().all(|p| !p.label.contains("scope")));
        assert!(report.totals().is_empty());
    }

    #[test]
    fn test_report_totals() {
        let mut report = ReconcileReport::default();
        report.record("a".into(), PassStats { created: 2, ..PassStats::default() });
        report.record("b".into(), PassStats { removed: 1, preserved: 1, ..PassStats::default() });
        let totals = report.totals();
        assert_eq!((totals.created, totals.removed, totals.preserved), (2, 1, 1));
        assert_eq!(report.pass("b").map(|s| s.removed), Some(1));
    }
}
