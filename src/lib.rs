//! Element Templates
//!
//! Binds template property descriptors to a BPMN process document and keeps
//! an element consistent with the template applied to it.
//!
//! ## Layers
//!
//! - [`model`]: node arena, schema, transactions and the undoable command stack
//! - [`accessors`] / [`factory`]: binding-driven lookups and node construction
//! - [`binding`]: `get_value` / `set_value` / `validate` for one property
//! - [`reconcile`]: switching an element between templates without losing
//!   user edits
//! - [`custom_props`]: grouped UI entries for an applied template
//! - [`registry`]: template storage and the [`ElementTemplates`] service
//!
//! Every document change goes through a [`model::CommandExecutor`] as a
//! labelled batch, so one user action is one undo step.
//!
//! # Example
//!
//! ```
//! use element_templates::model::{CommandExecutor, CommandStack, Document, ModelView};
//! use element_templates::{ElementTemplates, TemplateConfig, TemplateRegistry};
//!
//! let registry = TemplateRegistry::from_json(r#"[{
//!   "id": "com.example.mail",
//!   "version": 1,
//!   "appliesTo": ["bpmn:ServiceTask"],
//!   "properties": [
//!     { "value": "ops@example.com",
//!       "binding": { "type": "camunda:inputParameter", "name": "to" } }
//!   ]
//! }]"#).unwrap();
//! let service = ElementTemplates::new(registry, TemplateConfig::default());
//!
//! let mut doc = Document::new();
//! let root = doc.root();
//! let task = doc
//!     .append(root, "rootElements", "bpmn:ServiceTask", [("id", "Task_1".into())])
//!     .unwrap();
//! let mut stack = CommandStack::new(doc);
//!
//! let template = service.registry().latest("com.example.mail").unwrap().clone();
//! service.apply_template(&mut stack, task, &template).unwrap();
//! assert_eq!(
//!     stack.document().str_attr(task, "camunda:modelerTemplate"),
//!     Some("com.example.mail")
//! );
//! ```

pub mod accessors;
pub mod binding;
pub mod config;
pub mod custom_props;
pub mod error;
pub mod factory;
pub mod model;
pub mod reconcile;
pub mod registry;

pub use binding::BoundProperty;
pub use config::TemplateConfig;
pub use custom_props::{entry_groups, Entry, EntryGroup};
pub use error::{ModelError, Result, TemplateError};
pub use reconcile::{apply_template, ReconcileReport};
pub use registry::{ElementTemplates, TemplateRegistry};

pub use element_template_types::{
    same_value, Binding, PropertyDescriptor, Scalar, Scope, ScopeKind, Template, WidgetType,
};
