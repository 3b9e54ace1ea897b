use super::{tags, ModelView, Node, NodeId, Value};
use crate::error::ModelError;
use std::collections::{BTreeMap, HashMap};

/// Arena-backed process document.
///
/// Building a document (import, diagram edits) happens through the direct
/// methods here. Template engines never call them; they go through a
/// [`super::Transaction`] submitted to a [`super::CommandExecutor`].
#[derive(Debug, Clone)]
pub struct Document {
    nodes: HashMap<NodeId, Node>,
    root: NodeId,
}

impl Document {
    /// A document with an empty `bpmn:Definitions` root.
    pub fn new() -> Self {
        Self::fragment(tags::DEFINITIONS, "Definitions_1")
    }

    /// A document rooted at an arbitrary element, such as a copied
    /// sub-process. Global elements cannot be created in it.
    pub fn fragment(type_tag: &str, id: &str) -> Self {
        let root = NodeId::new();
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            Node {
                type_tag: type_tag.to_string(),
                parent: None,
                attrs: BTreeMap::from([("id".to_string(), Value::str(id))]),
            },
        );
        Self { nodes, root }
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Create a node and append it to `parent`'s list under `slot`.
    pub fn append(
        &mut self,
        parent: NodeId,
        slot: &str,
        type_tag: &str,
        attrs: impl IntoIterator<Item = (&'static str, Value)>,
    ) -> Result<NodeId, ModelError> {
        let id = self.alloc(parent, type_tag, attrs)?;
        let parent_node = self
            .nodes
            .get_mut(&parent)
            .ok_or(ModelError::UnknownNode(parent))?;
        match parent_node.attrs.get_mut(slot) {
            Some(Value::List(ids)) => ids.push(id),
            _ => {
                parent_node
                    .attrs
                    .insert(slot.to_string(), Value::List(vec![id]));
            }
        }
        Ok(id)
    }

    /// Create a node and place it in `parent`'s single-child `slot`.
    pub fn set_child(
        &mut self,
        parent: NodeId,
        slot: &str,
        type_tag: &str,
        attrs: impl IntoIterator<Item = (&'static str, Value)>,
    ) -> Result<NodeId, ModelError> {
        let id = self.alloc(parent, type_tag, attrs)?;
        self.set(parent, slot, Some(Value::Node(id)))?;
        Ok(id)
    }

    /// Directly set or unset an attribute, bypassing any command stack.
    pub fn set(&mut self, id: NodeId, key: &str, value: Option<Value>) -> Result<(), ModelError> {
        let node = self.nodes.get_mut(&id).ok_or(ModelError::UnknownNode(id))?;
        match value {
            Some(v) => node.attrs.insert(key.to_string(), v),
            None => node.attrs.remove(key),
        };
        Ok(())
    }

    fn alloc(
        &mut self,
        parent: NodeId,
        type_tag: &str,
        attrs: impl IntoIterator<Item = (&'static str, Value)>,
    ) -> Result<NodeId, ModelError> {
        if !self.nodes.contains_key(&parent) {
            return Err(ModelError::UnknownNode(parent));
        }
        let id = NodeId::new();
        self.nodes.insert(
            id,
            Node {
                type_tag: type_tag.to_string(),
                parent: Some(parent),
                attrs: attrs
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
            },
        );
        Ok(id)
    }

    pub(crate) fn insert_node(&mut self, id: NodeId, node: Node) -> Result<(), ModelError> {
        if self.nodes.contains_key(&id) {
            return Err(ModelError::DuplicateNode(id));
        }
        self.nodes.insert(id, node);
        Ok(())
    }

    pub(crate) fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        self.nodes.remove(&id)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelView for Document {
    fn root(&self) -> NodeId {
        self.root
    }

    fn type_of(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(&id).map(|n| n.type_tag.as_str())
    }

    fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    fn attr(&self, id: NodeId, key: &str) -> Option<&Value> {
        self.nodes.get(&id).and_then(|n| n.attrs.get(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_and_walk() {
        let mut doc = Document::new();
        let root = doc.root();
        let process = doc
            .append(root, "rootElements", "bpmn:Process", [("id", "P".into())])
            .unwrap();
        let task = doc
            .append(process, "flowElements", "bpmn:ServiceTask", [("id", "Task_1".into())])
            .unwrap();

        assert_eq!(doc.children(root, "rootElements"), vec![process]);
        assert_eq!(doc.parent(task), Some(process));
        assert_eq!(doc.definitions_of(task), Some(root));
        assert_eq!(doc.element_id(task), "Task_1");
    }

    #[test]
    fn test_set_and_unset() {
        let mut doc = Document::new();
        let root = doc.root();
        doc.set(root, "name", Some("x".into())).unwrap();
        assert_eq!(doc.str_attr(root, "name"), Some("x"));
        doc.set(root, "name", None).unwrap();
        assert!(doc.attr(root, "name").is_none());

        let missing = NodeId::new();
        assert_eq!(doc.set(missing, "a", None), Err(ModelError::UnknownNode(missing)));
    }
}
