//! Custom-property UI assembly.
//!
//! Turns a template into grouped entry descriptors for a rendering layer.
//! Each entry carries its [`BoundProperty`] so the renderer can call
//! `get_value` / `set_value` / `validate` without knowing about bindings.

use crate::binding::BoundProperty;
use crate::config::TemplateConfig;
use crate::error::Result;
use crate::model::{CommandExecutor, ModelView, NodeId};
use element_template_types::{
    Binding, Choice, PropertyDescriptor, Scalar, Scope, Template, WidgetType,
};

/// One renderable property.
#[derive(Debug, Clone)]
pub struct Entry<'a> {
    pub id: String,
    pub widget: WidgetType,
    pub label: Option<&'a str>,
    pub description: Option<&'a str>,
    pub disabled: bool,
    pub bound: BoundProperty<'a>,
}

impl<'a> Entry<'a> {
    pub fn get_value<V: ModelView + ?Sized>(&self, view: &V) -> Result<Scalar> {
        self.bound.get_value(view)
    }

    pub fn set_value<X: CommandExecutor + ?Sized>(&self, executor: &mut X, value: &Scalar) -> Result<()> {
        self.bound.set_value(executor, value)
    }

    pub fn validate<V: ModelView + ?Sized>(&self, view: &V, value: &Scalar) -> Result<Option<String>> {
        self.bound.validate(view, value)
    }

    pub fn choices(&self) -> &'a [Choice] {
        &self.bound.property().choices
    }
}

#[derive(Debug, Clone)]
pub struct EntryGroup<'a> {
    pub id: String,
    pub label: String,
    pub entries: Vec<Entry<'a>>,
}

/// Widget used when a property declares none.
pub fn default_widget(binding: &Binding) -> WidgetType {
    match binding {
        Binding::ExecutionListener { .. } => WidgetType::Hidden,
        _ => WidgetType::String,
    }
}

/// Group a template's properties (element and scoped) into UI entries.
///
/// Declared groups come first, in declaration order, followed by the
/// default group for properties with a missing or unknown group. Hidden
/// properties produce no entry; groups left empty are omitted.
pub fn entry_groups<'a>(
    template: &'a Template,
    element: NodeId,
    config: &'a TemplateConfig,
) -> Vec<EntryGroup<'a>> {
    let mut groups: Vec<EntryGroup<'a>> = template
        .groups
        .iter()
        .map(|g| EntryGroup {
            id: g.id.clone(),
            label: g.label.clone(),
            entries: Vec::new(),
        })
        .collect();
    let mut fallback = EntryGroup {
        id: config.default_group.id.clone(),
        label: config.default_group.label.clone(),
        entries: Vec::new(),
    };

    let prefix = format!("{}-{}", config.entry_id_prefix, template.id);
    let element_entries = template.properties.iter().enumerate().filter_map(|(index, p)| {
        let bound = BoundProperty::new(element, p, config);
        entry(format!("{}-{}", prefix, index), p, bound)
    });
    let scoped_entries = template.scopes.iter().flat_map(|scope| {
        scoped(&prefix, scope, element, config)
    });

    for item in element_entries.chain(scoped_entries) {
        let group_id = item.bound.property().group.as_deref();
        match group_id.and_then(|id| groups.iter_mut().find(|g| g.id == id)) {
            Some(group) => group.entries.push(item),
            None => fallback.entries.push(item),
        }
    }

    groups.push(fallback);
    groups.retain(|g| !g.entries.is_empty());
    groups
}

fn scoped<'a>(
    prefix: &str,
    scope: &'a Scope,
    element: NodeId,
    config: &'a TemplateConfig,
) -> Vec<Entry<'a>> {
    let prefix = format!("{}-{}", prefix, scope.key());
    scope
        .properties
        .iter()
        .enumerate()
        .filter_map(|(index, p)| {
            let bound = BoundProperty::new(element, p, config).in_scope(scope);
            entry(format!("{}-{}", prefix, index), p, bound)
        })
        .collect()
}

fn entry<'a>(id: String, property: &'a PropertyDescriptor, bound: BoundProperty<'a>) -> Option<Entry<'a>> {
    let widget = property
        .widget
        .unwrap_or_else(|| default_widget(&property.binding));
    if widget == WidgetType::Hidden {
        return None;
    }
    Some(Entry {
        id,
        widget,
        label: property.label.as_deref(),
        description: property.description.as_deref(),
        disabled: !property.editable,
        bound,
    })
}
