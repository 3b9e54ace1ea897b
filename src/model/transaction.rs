//! Transaction builder.
//!
//! A [`Transaction`] overlays pending edits on a read-only document. Lookups
//! through it see the batch's own creations and updates, so a multi-step
//! write (container, then mapping, then parameter) can be expressed as plain
//! get-or-create steps. [`Transaction::finish`] turns the overlay into a
//! [`ChangeSet`] that a [`CommandExecutor`] applies as one undo step.

use super::{CommandExecutor, Document, ModelView, NewNode, Node, NodeId, Value};
use crate::error::ModelError;
use std::collections::{BTreeMap, HashMap, HashSet};

/// One typed mutation record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mutation {
    /// Insert a new node (already carrying its parent id and final attributes).
    Create { id: NodeId, node: Node },
    /// Set (`Some`) or unset (`None`) attributes on an existing node.
    Update {
        node: NodeId,
        properties: BTreeMap<String, Option<Value>>,
    },
    /// Drop a detached node from the arena.
    Delete { id: NodeId },
}

/// An ordered batch of mutations applied atomically.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub label: String,
    pub mutations: Vec<Mutation>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn created(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.mutations.iter().filter_map(|m| match m {
            Mutation::Create { id, .. } => Some(*id),
            _ => None,
        })
    }

    pub fn deleted(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.mutations.iter().filter_map(|m| match m {
            Mutation::Delete { id } => Some(*id),
            _ => None,
        })
    }
}

pub struct Transaction<'a> {
    base: &'a Document,
    label: String,
    created: Vec<NodeId>,
    fresh: HashMap<NodeId, Node>,
    touched: Vec<NodeId>,
    updates: HashMap<NodeId, BTreeMap<String, Option<Value>>>,
    deleted: Vec<NodeId>,
}

impl<'a> Transaction<'a> {
    pub fn new(base: &'a Document, label: impl Into<String>) -> Self {
        Self {
            base,
            label: label.into(),
            created: Vec::new(),
            fresh: HashMap::new(),
            touched: Vec::new(),
            updates: HashMap::new(),
            deleted: Vec::new(),
        }
    }

    fn exists(&self, id: NodeId) -> bool {
        self.fresh.contains_key(&id) || (self.base.contains(id) && !self.deleted.contains(&id))
    }

    /// Children whose parent link points at `id`; cross references such as
    /// `errorRef` are not followed.
    fn owned_children(&self, id: NodeId) -> Vec<NodeId> {
        let mut keys: Vec<&str> = match self.fresh.get(&id) {
            Some(node) => node.attrs.keys().map(String::as_str).collect(),
            None => self
                .base
                .get(id)
                .map(|node| node.attrs.keys().map(String::as_str).collect())
                .unwrap_or_default(),
        };
        if let Some(props) = self.updates.get(&id) {
            keys.extend(props.keys().map(String::as_str));
        }
        keys.sort_unstable();
        keys.dedup();

        keys.into_iter()
            .flat_map(|key| self.children(id, key))
            .filter(|child| self.parent(*child) == Some(id))
            .collect()
    }

    /// Remove `id` and everything it owns from the arena. The caller has
    /// already unlinked it from its parent.
    fn delete(&mut self, id: NodeId) {
        for child in self.owned_children(id) {
            self.delete(child);
        }
        if self.fresh.remove(&id).is_some() {
            self.created.retain(|c| *c != id);
        } else if self.base.contains(id) && !self.deleted.contains(&id) {
            self.deleted.push(id);
        }
    }

    /// Allocate `node` (and its nested children) under `parent`.
    ///
    /// The node is not placed in any of the parent's slots; callers attach it
    /// with [`Transaction::push`] or [`Transaction::set`].
    pub fn create(&mut self, parent: NodeId, node: NewNode) -> Result<NodeId, ModelError> {
        if !self.exists(parent) {
            return Err(ModelError::UnknownNode(parent));
        }
        let id = NodeId::new();
        self.created.push(id);
        self.fresh.insert(
            id,
            Node {
                type_tag: node.type_tag,
                parent: Some(parent),
                attrs: node.attrs,
            },
        );
        for (slot, child) in node.children {
            let child_id = self.create(id, child)?;
            self.set(id, &slot, Some(Value::Node(child_id)))?;
        }
        Ok(id)
    }

    /// Set or unset an attribute. Writes that leave the value unchanged are
    /// not recorded.
    pub fn set(&mut self, id: NodeId, key: &str, value: Option<Value>) -> Result<(), ModelError> {
        if let Some(node) = self.fresh.get_mut(&id) {
            match value {
                Some(v) => node.attrs.insert(key.to_string(), v),
                None => node.attrs.remove(key),
            };
            return Ok(());
        }
        if !self.exists(id) {
            return Err(ModelError::UnknownNode(id));
        }
        if self.attr(id, key) == value.as_ref() {
            return Ok(());
        }
        if !self.updates.contains_key(&id) {
            self.touched.push(id);
        }
        self.updates
            .entry(id)
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    /// Append `child` to the list under `key`.
    pub fn push(&mut self, parent: NodeId, key: &str, child: NodeId) -> Result<(), ModelError> {
        let mut list = self.children(parent, key);
        list.push(child);
        self.set(parent, key, Some(Value::List(list)))
    }

    /// Drop `removed` from the list under `key`, keeping the others in order,
    /// and delete the removed subtrees.
    pub fn remove(
        &mut self,
        parent: NodeId,
        key: &str,
        removed: &[NodeId],
    ) -> Result<(), ModelError> {
        if removed.is_empty() {
            return Ok(());
        }
        let list: Vec<NodeId> = self
            .children(parent, key)
            .into_iter()
            .filter(|id| !removed.contains(id))
            .collect();
        self.set(parent, key, Some(Value::List(list)))?;
        for id in removed {
            if self.parent(*id) == Some(parent) {
                self.delete(*id);
            }
        }
        Ok(())
    }

    /// Close the transaction into a change set: creations first, then one
    /// update per touched node holding only attributes that really changed,
    /// then deletions.
    pub fn finish(mut self) -> ChangeSet {
        let mut mutations =
            Vec::with_capacity(self.created.len() + self.touched.len() + self.deleted.len());
        let deleted: HashSet<NodeId> = self.deleted.iter().copied().collect();

        for id in &self.created {
            if let Some(node) = self.fresh.remove(id) {
                mutations.push(Mutation::Create { id: *id, node });
            }
        }

        for id in &self.touched {
            if deleted.contains(id) {
                continue;
            }
            let Some(props) = self.updates.remove(id) else {
                continue;
            };
            let properties: BTreeMap<String, Option<Value>> = props
                .into_iter()
                .filter(|(k, v)| self.base.attr(*id, k) != v.as_ref())
                .collect();
            if !properties.is_empty() {
                mutations.push(Mutation::Update {
                    node: *id,
                    properties,
                });
            }
        }

        mutations.extend(self.deleted.iter().map(|id| Mutation::Delete { id: *id }));

        ChangeSet {
            label: self.label,
            mutations,
        }
    }
}

impl ModelView for Transaction<'_> {
    fn root(&self) -> NodeId {
        self.base.root()
    }

    fn type_of(&self, id: NodeId) -> Option<&str> {
        match self.fresh.get(&id) {
            Some(node) => Some(node.type_tag.as_str()),
            None if self.deleted.contains(&id) => None,
            None => self.base.type_of(id),
        }
    }

    fn parent(&self, id: NodeId) -> Option<NodeId> {
        match self.fresh.get(&id) {
            Some(node) => node.parent,
            None if self.deleted.contains(&id) => None,
            None => self.base.parent(id),
        }
    }

    fn attr(&self, id: NodeId, key: &str) -> Option<&Value> {
        if let Some(node) = self.fresh.get(&id) {
            return node.attrs.get(key);
        }
        if self.deleted.contains(&id) {
            return None;
        }
        match self.updates.get(&id).and_then(|props| props.get(key)) {
            Some(pending) => pending.as_ref(),
            None => self.base.attr(id, key),
        }
    }
}

/// Build one batch against the executor's document and submit it.
///
/// Empty batches are not submitted.
pub fn transact<X, T, E, F>(executor: &mut X, label: &str, build: F) -> Result<T, E>
where
    X: CommandExecutor + ?Sized,
    E: From<ModelError>,
    F: FnOnce(&mut Transaction<'_>) -> Result<T, E>,
{
    let (out, changes) = {
        let mut tx = Transaction::new(executor.document(), label);
        let out = build(&mut tx)?;
        (out, tx.finish())
    };
    if !changes.is_empty() {
        tracing::debug!(label, mutations = changes.len(), "submitting change set");
        executor.execute(changes)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{tags, CommandStack};

    fn doc_with_task() -> (Document, NodeId) {
        let mut doc = Document::new();
        let task = doc
            .append(doc.root(), "rootElements", "bpmn:ServiceTask", [("id", "T".into())])
            .unwrap();
        (doc, task)
    }

    #[test]
    fn test_overlay_sees_pending_writes() {
        let (doc, task) = doc_with_task();
        let mut tx = Transaction::new(&doc, "t");

        let ext = tx
            .create(task, NewNode::new(tags::EXTENSION_ELEMENTS))
            .unwrap();
        tx.set(task, "extensionElements", Some(Value::Node(ext)))
            .unwrap();
        let io = tx.create(ext, NewNode::new(tags::INPUT_OUTPUT)).unwrap();
        tx.push(ext, "values", io).unwrap();

        assert_eq!(tx.child(task, "extensionElements"), Some(ext));
        assert_eq!(tx.children(ext, "values"), vec![io]);
        assert!(doc.attr(task, "extensionElements").is_none());

        let changes = tx.finish();
        assert_eq!(changes.created().count(), 2);
        assert_eq!(changes.len(), 3);
    }

    #[test]
    fn test_noop_writes_are_dropped() {
        let (doc, task) = doc_with_task();
        let mut tx = Transaction::new(&doc, "t");
        tx.set(task, "id", Some("T".into())).unwrap();
        tx.set(task, "name", Some("a".into())).unwrap();
        tx.set(task, "name", None).unwrap();
        assert!(tx.finish().is_empty());
    }

    #[test]
    fn test_remove_deletes_owned_subtree() {
        let (mut doc, task) = doc_with_task();
        let error = doc
            .append(doc.root(), "rootElements", tags::ERROR, [("id", "E".into())])
            .unwrap();
        let mut stack = CommandStack::new(doc);
        let param = transact(&mut stack, "add", |tx| {
            let p = tx.create(
                task,
                NewNode::new(tags::INPUT_PARAMETER)
                    .with("errorRef", Value::Node(error))
                    .with_child("definition", NewNode::new(tags::SCRIPT)),
            )?;
            tx.push(task, "values", p)?;
            Ok::<_, ModelError>(p)
        })
        .unwrap();
        let script = stack.document().child(param, "definition").unwrap();

        let mut tx = Transaction::new(stack.document(), "t");
        tx.remove(task, "values", &[param]).unwrap();
        assert_eq!(tx.type_of(param), None);
        assert_eq!(tx.type_of(script), None);
        assert!(tx.set(param, "name", Some("x".into())).is_err());

        let deleted: Vec<NodeId> = tx.finish().deleted().collect();
        assert_eq!(deleted.len(), 2);
        assert!(deleted.contains(&param) && deleted.contains(&script));
        assert!(!deleted.contains(&error));
    }

    #[test]
    fn test_remove_of_fresh_node_leaves_no_trace() {
        let (doc, task) = doc_with_task();
        let mut tx = Transaction::new(&doc, "t");
        let node = tx.create(task, NewNode::new("x:Child")).unwrap();
        tx.push(task, "values", node).unwrap();
        tx.remove(task, "values", &[node]).unwrap();

        let changes = tx.finish();
        assert_eq!(changes.created().count(), 0);
        assert_eq!(changes.deleted().count(), 0);
    }

    #[test]
    fn test_unknown_node_rejected() {
        let (doc, _) = doc_with_task();
        let mut tx = Transaction::new(&doc, "t");
        let ghost = NodeId::new();
        assert_eq!(
            tx.set(ghost, "a", None),
            Err(ModelError::UnknownNode(ghost))
        );
        assert!(tx.create(ghost, NewNode::new("x")).is_err());
    }
}
