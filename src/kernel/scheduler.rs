use super::pending::PendingRequests;
use super::state::StateDelta;
use crate::history::{EntryKind, NewEntry};
use crate::transcript::Speaker;
use crate::tree::{Activation, IdeaTree, NodeId};

pub struct Scheduler;

/// Work the controller hands to its driver.
#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    Log(String),
    RequestSuggestions(SuggestionRequest),
    /// Forward typed dialogue to the backend so its context stays complete.
    DeliverText { text: String, speaker: Speaker },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SuggestionRequest {
    pub node_id: NodeId,
    pub epoch: u64,
    pub text: String,
    pub parent_content: Option<String>,
}

impl Scheduler {
    /// Pure Projection: Activation + Context -> (StateDeltas, SideEffect)
    ///
    /// Does not record the request as pending; the caller does that when it
    /// accepts a `RequestSuggestions` effect.
    pub fn plan_activation(
        &self,
        tree: &IdeaTree,
        pending: &PendingRequests,
        id: NodeId,
    ) -> (Vec<StateDelta>, Option<SideEffect>) {
        match tree.classify(id) {
            Err(e) => (vec![StateDelta::History(NewEntry::error(e.to_string()))], None),
            Ok(Activation::Committed(id)) => {
                let content = tree.get(id).map(|n| n.content.clone()).unwrap_or_default();
                (
                    vec![
                        StateDelta::NodeCommitted(id),
                        StateDelta::History(NewEntry::new(EntryKind::Commit, format!("Committed: {}", content))),
                    ],
                    None,
                )
            }
            Ok(Activation::AlreadyExpanded) => (vec![], Some(SideEffect::Log(format!("{} already expanded", id)))),
            Ok(Activation::NeedsGeneration { .. }) if pending.contains(id) => {
                (vec![], Some(SideEffect::Log(format!("{} already generating, coalesced", id))))
            }
            Ok(Activation::NeedsGeneration { text, parent_content }) => (
                vec![],
                Some(SideEffect::RequestSuggestions(SuggestionRequest {
                    node_id: id,
                    epoch: tree.epoch(),
                    text,
                    parent_content,
                })),
            ),
        }
    }
}
