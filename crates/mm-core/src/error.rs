use crate::id::NodeId;
use thiserror::Error;

/// Invariant violations surfaced by the explicit hardening checks.
///
/// Expected rejections (self-loops, duplicates, missing link targets) are
/// plain `None`s and never show up here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MindMapError {
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
    #[error("primary-parent chain starting at {start} cycles back to {repeat}")]
    ParentCycle { start: NodeId, repeat: NodeId },
}
