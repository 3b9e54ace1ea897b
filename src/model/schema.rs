//! Attribute typing for plain property bindings.
//!
//! Only primitive attributes may be written through a `property` binding.
//! Names are classified by their local part, so `camunda:asyncBefore` and
//! `asyncBefore` resolve the same way.

use super::Value;
use element_template_types::Scalar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    Boolean { default: bool },
    Integer,
    String,
    /// Child elements, lists and references.
    Element,
}

impl AttrKind {
    pub fn is_primitive(&self) -> bool {
        !matches!(self, AttrKind::Element)
    }

    /// Value reported for an unset attribute, if the kind has one.
    pub fn default_value(&self) -> Option<Scalar> {
        match self {
            AttrKind::Boolean { default } => Some(Scalar::Bool(*default)),
            _ => None,
        }
    }

    /// Coerce a scalar for storage.
    ///
    /// Booleans follow truthiness. Integers are parsed; an unparseable
    /// integer yields `None` so the attribute is left unset.
    pub fn coerce(&self, value: &Scalar) -> Option<Value> {
        match self {
            AttrKind::Boolean { .. } => Some(Value::Bool(value.is_truthy())),
            AttrKind::Integer => match value {
                Scalar::Int(i) => Some(Value::Int(*i)),
                Scalar::Str(s) => s.trim().parse::<i64>().ok().map(Value::Int),
                Scalar::Bool(_) => None,
            },
            AttrKind::String | AttrKind::Element => Some(Value::Str(value.as_text())),
        }
    }
}

const TRUE_BY_DEFAULT: &[&str] = &[
    "exclusive",
    "isInterrupting",
    "cancelActivity",
    "isStartableInTasklist",
];

const BOOLEANS: &[&str] = &[
    "asyncBefore",
    "asyncAfter",
    "async",
    "isForCompensation",
    "triggeredByEvent",
    "isExecutable",
    "isImmediate",
    "parallelMultiple",
    "isSequential",
    "instantiate",
    "isClosed",
];

const INTEGERS: &[&str] = &["startQuantity", "completionQuantity"];

const ELEMENTS: &[&str] = &[
    "extensionElements",
    "eventDefinitions",
    "conditionExpression",
    "loopCharacteristics",
    "ioSpecification",
    "dataInputAssociations",
    "dataOutputAssociations",
    "documentation",
    "incoming",
    "outgoing",
    "default",
    "attachedToRef",
    "rootElements",
    "flowElements",
    "messageRef",
    "errorRef",
    "signalRef",
    "escalationRef",
    "timeDate",
    "timeDuration",
    "timeCycle",
    "inputOutput",
    "properties",
    "values",
];

fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, local)| local).unwrap_or(name)
}

/// Classify `name` on an element of `type_tag`.
pub fn attr_kind(type_tag: &str, name: &str) -> AttrKind {
    let local = local_name(name);
    if TRUE_BY_DEFAULT.contains(&local) {
        return AttrKind::Boolean { default: true };
    }
    if BOOLEANS.contains(&local) {
        return AttrKind::Boolean { default: false };
    }
    if INTEGERS.contains(&local) {
        return AttrKind::Integer;
    }
    if ELEMENTS.contains(&local) {
        return AttrKind::Element;
    }
    // Sequence flows reference their endpoints.
    if type_tag == "bpmn:SequenceFlow" && matches!(local, "sourceRef" | "targetRef") {
        return AttrKind::Element;
    }
    AttrKind::String
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(
            attr_kind("bpmn:ServiceTask", "camunda:asyncBefore"),
            AttrKind::Boolean { default: false }
        );
        assert_eq!(
            attr_kind("bpmn:ServiceTask", "camunda:exclusive"),
            AttrKind::Boolean { default: true }
        );
        assert_eq!(attr_kind("bpmn:Task", "completionQuantity"), AttrKind::Integer);
        assert_eq!(attr_kind("bpmn:Task", "extensionElements"), AttrKind::Element);
        assert_eq!(attr_kind("bpmn:SequenceFlow", "targetRef"), AttrKind::Element);
        assert_eq!(attr_kind("bpmn:Task", "camunda:class"), AttrKind::String);
    }

    #[test]
    fn test_coercion() {
        let b = AttrKind::Boolean { default: false };
        assert_eq!(b.coerce(&Scalar::from("yes")), Some(Value::Bool(true)));
        assert_eq!(b.coerce(&Scalar::empty()), Some(Value::Bool(false)));

        assert_eq!(AttrKind::Integer.coerce(&Scalar::from(" 42 ")), Some(Value::Int(42)));
        assert_eq!(AttrKind::Integer.coerce(&Scalar::from("4x2")), None);

        assert_eq!(AttrKind::String.coerce(&Scalar::Int(7)), Some(Value::str("7")));
    }
}
