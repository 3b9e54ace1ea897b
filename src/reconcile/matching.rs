//! Binding identity across template versions.

use element_template_types::{Binding, PropertyDescriptor};

/// Reconciliation pass a binding belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Property,
    ExecutionListener,
    Field,
    InOut,
    InputOutput,
    CamundaProperty,
    TaskHeader,
    ErrorEventDefinition,
}

impl Category {
    /// Pass order for the element itself.
    pub const ALL: [Category; 8] = [
        Category::Property,
        Category::ExecutionListener,
        Category::Field,
        Category::InOut,
        Category::InputOutput,
        Category::CamundaProperty,
        Category::TaskHeader,
        Category::ErrorEventDefinition,
    ];

    pub fn of(binding: &Binding) -> Option<Category> {
        Some(match binding {
            Binding::Property { .. } => Category::Property,
            Binding::ExecutionListener { .. } => Category::ExecutionListener,
            Binding::Field { .. } => Category::Field,
            Binding::In { .. } | Binding::Out { .. } | Binding::InBusinessKey => Category::InOut,
            Binding::InputParameter { .. } | Binding::OutputParameter { .. } => {
                Category::InputOutput
            }
            Binding::CamundaProperty { .. } => Category::CamundaProperty,
            Binding::TaskHeader { .. } => Category::TaskHeader,
            Binding::ErrorEventDefinition { .. } => Category::ErrorEventDefinition,
            Binding::Unrecognized { .. } => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Property => "properties",
            Category::ExecutionListener => "execution-listeners",
            Category::Field => "fields",
            Category::InOut => "in-out",
            Category::InputOutput => "input-output",
            Category::CamundaProperty => "camunda-properties",
            Category::TaskHeader => "task-headers",
            Category::ErrorEventDefinition => "error-event-definitions",
        }
    }
}

/// Whether `old` and `new` address the same document node.
///
/// Identity is type specific and never looks at values:
/// - property, field, camunda property: same name (fields also same slot)
/// - input parameter: same name and script format
/// - output parameter: same source and script format
/// - in mapping: same target and same expression flag; variables-only
///   mappings by their variables marker
/// - out mapping: same source, or same source expression
/// - error event definition: same error ref
///
/// Execution listeners never match; their category is replaced wholesale.
pub fn same_binding(old: &Binding, new: &Binding) -> bool {
    match (old, new) {
        (Binding::Property { name: a, .. }, Binding::Property { name: b, .. }) => a == b,
        (Binding::CamundaProperty { name: a }, Binding::CamundaProperty { name: b }) => a == b,
        (
            Binding::Field {
                name: a,
                expression: ea,
            },
            Binding::Field {
                name: b,
                expression: eb,
            },
        ) => a == b && ea == eb,
        (
            Binding::InputParameter {
                name: a,
                script_format: sa,
            },
            Binding::InputParameter {
                name: b,
                script_format: sb,
            },
        ) => a == b && sa == sb,
        (
            Binding::OutputParameter {
                source: a,
                script_format: sa,
            },
            Binding::OutputParameter {
                source: b,
                script_format: sb,
            },
        ) => a == b && sa == sb,
        (
            Binding::In {
                target: ta,
                expression: ea,
                variables: va,
            },
            Binding::In {
                target: tb,
                expression: eb,
                variables: vb,
            },
        ) => match (ta, tb) {
            (Some(a), Some(b)) => a == b && ea == eb,
            (None, None) => va.is_some() && va == vb,
            _ => false,
        },
        (Binding::InBusinessKey, Binding::InBusinessKey) => true,
        (
            Binding::Out {
                source: sa,
                source_expression: xa,
                variables: va,
            },
            Binding::Out {
                source: sb,
                source_expression: xb,
                variables: vb,
            },
        ) => {
            let by_source = sa.is_some() && sa == sb;
            let by_expression = xa.is_some() && xa == xb;
            let variables_only = sa.is_none()
                && xa.is_none()
                && sb.is_none()
                && xb.is_none()
                && va.is_some()
                && va == vb;
            by_source || by_expression || variables_only
        }
        (
            Binding::ErrorEventDefinition { error_ref: a },
            Binding::ErrorEventDefinition { error_ref: b },
        ) => a == b,
        (Binding::TaskHeader { key: a }, Binding::TaskHeader { key: b }) => a == b,
        _ => false,
    }
}

/// The property of `old` whose binding matches `new`.
pub fn find_old_property<'a>(
    old: &'a [PropertyDescriptor],
    new: &PropertyDescriptor,
) -> Option<&'a PropertyDescriptor> {
    old.iter().find(|p| same_binding(&p.binding, &new.binding))
}
