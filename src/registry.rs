//! Template source and the element-templates service.

use crate::config::TemplateConfig;
use crate::custom_props::{entry_groups, EntryGroup};
use crate::error::{Result, TemplateError};
use crate::model::{CommandExecutor, ModelView, NodeId};
use crate::reconcile::{apply_template, ReconcileReport};
use anyhow::Context;
use element_template_types::Template;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

type RegistryKey = (String, Option<u32>);

#[derive(Deserialize)]
#[serde(untagged)]
enum TemplateFile {
    Many(Vec<Template>),
    One(Box<Template>),
}

/// In-memory store of templates keyed by (id, version).
///
/// Registering the same (id, version) twice keeps the later template.
#[derive(Debug, Default, Clone)]
pub struct TemplateRegistry {
    templates: BTreeMap<RegistryKey, Template>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON array of templates or a single template object.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut registry = Self::new();
        registry.add_json(json)?;
        Ok(registry)
    }

    /// Read a template file from disk.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading element templates {}", path.display()))?;
        let registry = Self::from_json(&text)
            .with_context(|| format!("parsing element templates {}", path.display()))?;
        tracing::info!(path = %path.display(), templates = registry.len(), "loaded element templates");
        Ok(registry)
    }

    /// Parse and register; returns how many templates were added.
    pub fn add_json(&mut self, json: &str) -> Result<usize> {
        let templates = match serde_json::from_str(json).map_err(TemplateError::Parse)? {
            TemplateFile::Many(list) => list,
            TemplateFile::One(template) => vec![*template],
        };
        let count = templates.len();
        for template in templates {
            self.register(template);
        }
        Ok(count)
    }

    pub fn register(&mut self, template: Template) {
        let key = (template.id.clone(), template.version);
        if self.templates.insert(key, template).is_some() {
            tracing::debug!("replaced registered element template");
        }
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn get(&self, id: &str, version: Option<u32>) -> Option<&Template> {
        self.templates.get(&(id.to_string(), version))
    }

    /// Highest version registered for `id`. Unversioned sorts lowest.
    pub fn latest(&self, id: &str) -> Option<&Template> {
        self.templates
            .iter()
            .filter(|((key, _), _)| key == id)
            .map(|(_, template)| template)
            .last()
    }

    /// Latest version of every template applicable to `type_tag`.
    pub fn for_element(&self, type_tag: &str) -> Vec<&Template> {
        let mut latest: BTreeMap<&str, &Template> = BTreeMap::new();
        for ((id, _), template) in &self.templates {
            if template.applies_to(type_tag) {
                latest.insert(id.as_str(), template);
            }
        }
        latest.into_values().collect()
    }

    /// The template an element's marker attributes point at.
    pub fn applied_template<V: ModelView + ?Sized>(
        &self,
        view: &V,
        element: NodeId,
        config: &TemplateConfig,
    ) -> Option<&Template> {
        let id = view.str_attr(element, &config.template_attribute)?;
        let version = view
            .scalar(element, &config.version_attribute)
            .and_then(|v| v.as_text().trim().parse::<u32>().ok());
        self.get(id, version)
    }
}

/// Applies registered templates to elements and exposes their UI entries.
#[derive(Debug, Default, Clone)]
pub struct ElementTemplates {
    registry: TemplateRegistry,
    config: TemplateConfig,
}

impl ElementTemplates {
    pub fn new(registry: TemplateRegistry, config: TemplateConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut TemplateRegistry {
        &mut self.registry
    }

    pub fn config(&self) -> &TemplateConfig {
        &self.config
    }

    pub fn applied_template<V: ModelView + ?Sized>(&self, view: &V, element: NodeId) -> Option<&Template> {
        self.registry.applied_template(view, element, &self.config)
    }

    /// Switch `element` to `template`, reconciling from whatever template its
    /// markers currently name.
    pub fn apply_template<X: CommandExecutor + ?Sized>(
        &self,
        executor: &mut X,
        element: NodeId,
        template: &Template,
    ) -> Result<ReconcileReport> {
        let old = self.applied_template(executor.document(), element);
        apply_template(executor, element, old, Some(template), &self.config)
    }

    /// Detach the template: markers are cleared, content stays.
    pub fn remove_template<X: CommandExecutor + ?Sized>(
        &self,
        executor: &mut X,
        element: NodeId,
    ) -> Result<ReconcileReport> {
        let old = self.applied_template(executor.document(), element);
        apply_template(executor, element, old, None, &self.config)
    }

    /// UI entries for the element's applied template, if any.
    pub fn entries<V: ModelView + ?Sized>(&self, view: &V, element: NodeId) -> Vec<EntryGroup<'_>> {
        match self.applied_template(view, element) {
            Some(template) => entry_groups(template, element, &self.config),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CommandStack, Document};
    use serde_json::json;

    fn templates_json() -> String {
        json!([
            { "id": "mail", "version": 1, "appliesTo": ["bpmn:ServiceTask"], "properties": [] },
            { "id": "mail", "version": 2, "appliesTo": ["bpmn:ServiceTask"], "properties": [] },
            { "id": "timer", "appliesTo": ["bpmn:IntermediateCatchEvent"], "properties": [] }
        ])
        .to_string()
    }

    #[test]
    fn test_lookup() {
        let registry = TemplateRegistry::from_json(&templates_json()).unwrap();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.latest("mail").and_then(|t| t.version), Some(2));
        assert!(registry.get("mail", Some(1)).is_some());
        assert!(registry.get("timer", None).is_some());

        let ids: Vec<_> = registry
            .for_element("bpmn:ServiceTask")
            .iter()
            .map(|t| (t.id.as_str(), t.version))
            .collect();
        assert_eq!(ids, vec![("mail", Some(2))]);
    }

    #[test]
    fn test_single_template_object() {
        let registry =
            TemplateRegistry::from_json(r#"{ "id": "one", "properties": [] }"#).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(
            TemplateRegistry::from_json("[1, 2]").unwrap_err().code(),
            "PARSE"
        );
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("templates.json");
        std::fs::write(&path, templates_json()).unwrap();
        assert_eq!(TemplateRegistry::load(&path).unwrap().len(), 3);

        let err = TemplateRegistry::load(dir.path().join("missing.json")).unwrap_err();
        assert!(err.to_string().contains("missing.json"));
    }

    #[test]
    fn test_service_tracks_markers() {
        let registry = TemplateRegistry::from_json(&templates_json()).unwrap();
        let service = ElementTemplates::new(registry, TemplateConfig::default());
        let mut doc = Document::new();
        let task = doc
            .append(doc.root(), "rootElements", "bpmn:ServiceTask", [("id", "Task_1".into())])
            .unwrap();
        let mut stack = CommandStack::new(doc);

        let v2 = service.registry().get("mail", Some(2)).unwrap().clone();
        service.apply_template(&mut stack, task, &v2).unwrap();
        let applied = service.applied_template(stack.document(), task).unwrap();
        assert_eq!(applied.version, Some(2));

        service.remove_template(&mut stack, task).unwrap();
        assert!(service.applied_template(stack.document(), task).is_none());
        assert!(stack.document().attr(task, "camunda:modelerTemplate").is_none());
    }
}
