use super::{ChangeSet, Document, ModelView, Mutation, Node, NodeId, Value};
use crate::error::ModelError;
use std::collections::{BTreeMap, HashSet};

/// Applies change sets to a document.
pub trait CommandExecutor {
    fn document(&self) -> &Document;

    /// Apply `changes` atomically: either every mutation lands or none does.
    fn execute(&mut self, changes: ChangeSet) -> Result<(), ModelError>;
}

// ---------------------------------------------------------------------------
// CommandStack
// ---------------------------------------------------------------------------

/// What a change set replaced, so it can be put back.
#[derive(Default)]
struct Replaced {
    attrs: Vec<(NodeId, BTreeMap<String, Option<Value>>)>,
    nodes: Vec<(NodeId, Node)>,
}

struct AppliedBatch {
    changes: ChangeSet,
    previous: Replaced,
}

/// Owns a document and keeps every executed change set as one undo step.
pub struct CommandStack {
    document: Document,
    undo_stack: Vec<AppliedBatch>,
    redo_stack: Vec<ChangeSet>,
}

impl CommandStack {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        }
    }

    /// Mutable access for edits made outside the command stack (imports,
    /// hand edits in tests). Such edits are not undoable.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// Labels of executed batches, oldest first.
    pub fn history(&self) -> Vec<&str> {
        self.undo_stack
            .iter()
            .map(|b| b.changes.label.as_str())
            .collect()
    }

    /// The most recently executed change set.
    pub fn last(&self) -> Option<&ChangeSet> {
        self.undo_stack.last().map(|b| &b.changes)
    }

    /// Revert the last batch. Returns `false` when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(batch) = self.undo_stack.pop() else {
            return false;
        };
        for (id, node) in batch.previous.nodes.into_iter().rev() {
            // Deleted ids cannot have been reused.
            let _ = self.document.insert_node(id, node);
        }
        for (id, props) in batch.previous.attrs.iter().rev() {
            for (key, value) in props {
                // Nodes were validated when the batch was applied.
                let _ = self.document.set(*id, key, value.clone());
            }
        }
        for id in batch.changes.created() {
            self.document.remove_node(id);
        }
        tracing::debug!(label = %batch.changes.label, "undo");
        self.redo_stack.push(batch.changes);
        true
    }

    /// Re-apply the last undone batch. Returns `false` when there is nothing to redo.
    pub fn redo(&mut self) -> Result<bool, ModelError> {
        let Some(changes) = self.redo_stack.pop() else {
            return Ok(false);
        };
        let previous = apply(&mut self.document, &changes)?;
        tracing::debug!(label = %changes.label, "redo");
        self.undo_stack.push(AppliedBatch { changes, previous });
        Ok(true)
    }
}

impl CommandExecutor for CommandStack {
    fn document(&self) -> &Document {
        &self.document
    }

    fn execute(&mut self, changes: ChangeSet) -> Result<(), ModelError> {
        let previous = apply(&mut self.document, &changes)?;
        self.undo_stack.push(AppliedBatch { changes, previous });
        self.redo_stack.clear();
        Ok(())
    }
}

fn validate(document: &Document, changes: &ChangeSet) -> Result<(), ModelError> {
    let mut created = HashSet::new();
    for mutation in &changes.mutations {
        if let Mutation::Create { id, .. } = mutation {
            if document.contains(*id) || !created.insert(*id) {
                return Err(ModelError::DuplicateNode(*id));
            }
        }
    }
    for mutation in &changes.mutations {
        match mutation {
            Mutation::Create { node, .. } => {
                if let Some(parent) = node.parent {
                    if !document.contains(parent) && !created.contains(&parent) {
                        return Err(ModelError::UnknownNode(parent));
                    }
                }
            }
            Mutation::Update { node, .. } => {
                if !document.contains(*node) && !created.contains(node) {
                    return Err(ModelError::UnknownNode(*node));
                }
            }
            Mutation::Delete { id } => {
                if !document.contains(*id) {
                    return Err(ModelError::UnknownNode(*id));
                }
            }
        }
    }
    Ok(())
}

/// Apply a validated change set, returning the attribute values and nodes
/// it replaced.
fn apply(document: &mut Document, changes: &ChangeSet) -> Result<Replaced, ModelError> {
    validate(document, changes)?;

    let mut previous = Replaced::default();
    for mutation in &changes.mutations {
        match mutation {
            Mutation::Create { id, node } => document.insert_node(*id, node.clone())?,
            Mutation::Update { node, properties } => {
                let mut old = BTreeMap::new();
                for (key, value) in properties {
                    old.insert(key.clone(), document.attr(*node, key).cloned());
                    document.set(*node, key, value.clone())?;
                }
                previous.attrs.push((*node, old));
            }
            Mutation::Delete { id } => {
                let node = document.remove_node(*id).ok_or(ModelError::UnknownNode(*id))?;
                previous.nodes.push((*id, node));
            }
        }
    }
    Ok(previous)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{transact, NewNode};

    fn stack_with_task() -> (CommandStack, NodeId) {
        let mut doc = Document::new();
        let task = doc
            .append(doc.root(), "rootElements", "bpmn:Task", [("id", "T".into())])
            .unwrap();
        (CommandStack::new(doc), task)
    }

    #[test]
    fn test_batch_undo_redo_as_one_step() {
        let (mut stack, task) = stack_with_task();

        let param = transact(&mut stack, "add", |tx| {
            tx.set(task, "name", Some("n".into()))?;
            let p = tx.create(task, NewNode::new("x:Child").with("v", "1"))?;
            tx.push(task, "children", p)?;
            Ok::<_, ModelError>(p)
        })
        .unwrap();

        assert_eq!(stack.undo_len(), 1);
        assert!(stack.document().contains(param));
        assert_eq!(stack.document().str_attr(task, "name"), Some("n"));

        assert!(stack.undo());
        assert!(!stack.document().contains(param));
        assert!(stack.document().attr(task, "name").is_none());
        assert!(stack.document().attr(task, "children").is_none());

        assert!(stack.redo().unwrap());
        assert_eq!(stack.document().children(task, "children"), vec![param]);
        assert!(!stack.redo().unwrap());
    }

    #[test]
    fn test_invalid_batch_leaves_document_untouched() {
        let (mut stack, task) = stack_with_task();
        let ghost = NodeId::new();
        let changes = ChangeSet {
            label: "bad".into(),
            mutations: vec![
                Mutation::Update {
                    node: task,
                    properties: BTreeMap::from([("name".to_string(), Some(Value::str("x")))]),
                },
                Mutation::Update {
                    node: ghost,
                    properties: BTreeMap::new(),
                },
            ],
        };

        assert_eq!(stack.execute(changes), Err(ModelError::UnknownNode(ghost)));
        assert!(stack.document().attr(task, "name").is_none());
        assert_eq!(stack.undo_len(), 0);
    }

    #[test]
    fn test_removed_nodes_leave_the_arena_until_undo() {
        let (mut stack, task) = stack_with_task();
        let child = transact(&mut stack, "add", |tx| {
            let c = tx.create(task, NewNode::new("x:Child").with_child("body", NewNode::new("x:Body")))?;
            tx.push(task, "children", c)?;
            Ok::<_, ModelError>(c)
        })
        .unwrap();
        let body = stack.document().child(child, "body").unwrap();
        let size = stack.document().len();

        transact(&mut stack, "remove", |tx| tx.remove(task, "children", &[child])).unwrap();
        assert_eq!(stack.document().len(), size - 2);
        assert!(!stack.document().contains(child));
        assert!(!stack.document().contains(body));

        assert!(stack.undo());
        assert_eq!(stack.document().len(), size);
        assert_eq!(stack.document().children(task, "children"), vec![child]);
        assert_eq!(stack.document().child(child, "body"), Some(body));

        assert!(stack.redo().unwrap());
        assert!(!stack.document().contains(child));
    }

    #[test]
    fn test_empty_transaction_not_submitted() {
        let (mut stack, task) = stack_with_task();
        transact(&mut stack, "noop", |tx| tx.set(task, "id", Some("T".into()))).unwrap();
        assert_eq!(stack.undo_len(), 0);
    }
}
