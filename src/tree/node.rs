use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl std::str::FromStr for NodeId {
    type Err = std::num::ParseIntError;

    /// Accepts both `n7` and `7`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s.strip_prefix('n').unwrap_or(s);
        digits.parse().map(NodeId)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Root,
    Candidate,
    Committed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeSource {
    Auto,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdeaNode {
    pub id: NodeId,
    pub parent_id: Option<NodeId>,
    pub kind: NodeKind,
    pub content: String,
    pub source: NodeSource,
    /// `None` for the root and for manually added branches.
    pub confidence: Option<f32>,
    /// Suggestion flavour reported by the backend (quote, humor, insight...).
    pub category: Option<String>,
}

impl IdeaNode {
    /// Root and committed nodes may spawn a generation; candidates only commit.
    pub fn can_expand(&self) -> bool {
        matches!(self.kind, NodeKind::Root | NodeKind::Committed)
    }
}

/// One suggestion returned by the backend, normalized from either wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub content: String,
    pub category: Option<String>,
}

impl Suggestion {
    pub fn plain(content: impl Into<String>) -> Self {
        Self { content: content.into(), category: None }
    }
}

/// Seed confidence for the candidate at `rank` (0-based). Strictly
/// decreasing over the first few hundred ranks; past that f32 runs out of
/// precision and neighbours can tie. Batches are a handful of items.
pub fn rank_confidence(rank: usize) -> f32 {
    0.95 * 0.85_f32.powi(rank as i32)
}
