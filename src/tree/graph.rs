use std::collections::HashMap;
use tracing::debug;

use super::node::{rank_confidence, IdeaNode, NodeId, NodeKind, NodeSource, Suggestion};
use crate::error::SessionError;

/// Result of activating a node.
#[derive(Debug, Clone, PartialEq)]
pub enum Activation {
    /// A candidate was promoted in place.
    Committed(NodeId),
    /// Root/committed node that already has children. Nothing to do.
    AlreadyExpanded,
    /// Root/committed node without children: ask the backend for branches.
    NeedsGeneration { text: String, parent_content: Option<String> },
}

/// The branching "mind map" of a session.
///
/// Parent links live on the nodes; the reverse direction is kept in an
/// explicit adjacency map so activation never scans the whole tree.
/// Children are stored in insertion order and are never re-sorted.
#[derive(Debug, Clone)]
pub struct IdeaTree {
    nodes: HashMap<NodeId, IdeaNode>,
    children: HashMap<NodeId, Vec<NodeId>>,
    root: NodeId,
    next_id: u64,
    epoch: u64,
}

impl IdeaTree {
    pub fn new(root_content: &str) -> Self {
        let mut tree = Self {
            nodes: HashMap::new(),
            children: HashMap::new(),
            root: NodeId(0),
            next_id: 0,
            epoch: 0,
        };
        tree.plant(root_content);
        tree
    }

    fn plant(&mut self, root_content: &str) {
        let id = self.allocate();
        self.nodes.insert(id, IdeaNode {
            id,
            parent_id: None,
            kind: NodeKind::Root,
            content: root_content.to_string(),
            source: NodeSource::Auto,
            confidence: None,
            category: None,
        });
        self.root = id;
    }

    fn allocate(&mut self) -> NodeId {
        self.next_id += 1;
        NodeId(self.next_id)
    }

    /// Throws away every node and starts over from a new root. The epoch
    /// advances so in-flight generations for the old tree can be recognised.
    /// Node ids are never reused across resets.
    pub fn reset(&mut self, root_content: &str) {
        self.nodes.clear();
        self.children.clear();
        self.epoch += 1;
        self.plant(root_content);
        debug!("Tree reset, epoch {}", self.epoch);
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn root(&self) -> &IdeaNode {
        // The root is inserted on construction and on every reset.
        &self.nodes[&self.root]
    }

    pub fn root_id(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&IdeaNode> {
        self.nodes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_children(&self, id: NodeId) -> bool {
        !self.children(id).is_empty()
    }

    /// Decides what activating `id` means without changing anything.
    /// `Committed` here says the node *would* be committed.
    pub fn classify(&self, id: NodeId) -> Result<Activation, SessionError> {
        let node = self.nodes.get(&id).ok_or(SessionError::UnknownNode(id))?;

        if node.kind == NodeKind::Candidate {
            return Ok(Activation::Committed(id));
        }
        if self.has_children(id) {
            return Ok(Activation::AlreadyExpanded);
        }

        let parent_content = node
            .parent_id
            .and_then(|pid| self.nodes.get(&pid))
            .map(|p| p.content.clone());

        Ok(Activation::NeedsGeneration {
            text: node.content.clone(),
            parent_content,
        })
    }

    /// Candidate → committed. Returns false for nodes that are not
    /// candidates; a committed node never reverts.
    pub fn commit(&mut self, id: NodeId) -> Result<bool, SessionError> {
        let node = self.nodes.get_mut(&id).ok_or(SessionError::UnknownNode(id))?;
        if node.kind != NodeKind::Candidate {
            return Ok(false);
        }
        node.kind = NodeKind::Committed;
        debug!("Node {} committed", id);
        Ok(true)
    }

    /// Candidate → committed, or decide whether a generation is due.
    pub fn activate(&mut self, id: NodeId) -> Result<Activation, SessionError> {
        let activation = self.classify(id)?;
        if let Activation::Committed(id) = activation {
            self.commit(id)?;
        }
        Ok(activation)
    }

    /// Appends one candidate per suggestion under `parent`, in order, with
    /// rank-seeded confidence. Refuses a parent that already has children.
    pub fn add_candidates(&mut self, parent: NodeId, suggestions: &[Suggestion]) -> Result<Vec<NodeId>, SessionError> {
        let parent_node = self.nodes.get(&parent).ok_or(SessionError::UnknownNode(parent))?;
        if !parent_node.can_expand() {
            return Err(SessionError::InvalidInput(format!("{} is a candidate and cannot branch", parent)));
        }
        if self.has_children(parent) {
            return Err(SessionError::InvalidInput(format!("{} already has branches", parent)));
        }

        let mut ids = Vec::with_capacity(suggestions.len());
        for (rank, suggestion) in suggestions.iter().enumerate() {
            let id = self.allocate();
            self.nodes.insert(id, IdeaNode {
                id,
                parent_id: Some(parent),
                kind: NodeKind::Candidate,
                content: suggestion.content.clone(),
                source: NodeSource::Auto,
                confidence: Some(rank_confidence(rank)),
                category: suggestion.category.clone(),
            });
            ids.push(id);
        }
        if !ids.is_empty() {
            self.children.insert(parent, ids.clone());
        }
        Ok(ids)
    }

    /// A branch the user wrote themselves. It is committed on creation and
    /// counts as the parent's expansion.
    pub fn add_manual(&mut self, parent: NodeId, content: &str) -> Result<NodeId, SessionError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(SessionError::InvalidInput("empty branch".to_string()));
        }
        let parent_node = self.nodes.get(&parent).ok_or(SessionError::UnknownNode(parent))?;
        if !parent_node.can_expand() {
            return Err(SessionError::InvalidInput(format!("commit {} before branching from it", parent)));
        }

        let id = self.allocate();
        self.nodes.insert(id, IdeaNode {
            id,
            parent_id: Some(parent),
            kind: NodeKind::Committed,
            content: content.to_string(),
            source: NodeSource::Manual,
            confidence: None,
            category: None,
        });
        self.children.entry(parent).or_default().push(id);
        Ok(id)
    }

    /// Root-first chain ending at `id`. Empty if `id` is unknown.
    pub fn path_to(&self, id: NodeId) -> Vec<&IdeaNode> {
        let mut path = Vec::new();
        let mut cursor = self.nodes.get(&id);
        while let Some(node) = cursor {
            path.push(node);
            cursor = node.parent_id.and_then(|pid| self.nodes.get(&pid));
        }
        path.reverse();
        path
    }

    /// Depth-first, insertion-ordered projection used for rendering.
    pub fn flatten(&self) -> Vec<(usize, &IdeaNode)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(0usize, self.root)];
        while let Some((depth, id)) = stack.pop() {
            if let Some(node) = self.nodes.get(&id) {
                out.push((depth, node));
                for child in self.children(id).iter().rev() {
                    stack.push((depth + 1, *child));
                }
            }
        }
        out
    }
}
