//! Branch extents and group brace geometry.
//!
//! `compute_subtree_bounds` answers "how much vertical space does this whole
//! branch occupy", which is what placement and collision reasoning need
//! instead of a single node's box.

use crate::geometry::{VerticalExtent, union_all};
use crate::graph::subtree_of;
use crate::id::{GroupId, NodeId};
use crate::model::{Group, GroupOrientation, MindMap};
use kurbo::{Point, Rect};

/// Gap between the member bounding box and the brace.
pub const BRACE_GAP: f64 = 12.0;
/// Distance from the brace's back to its tip.
pub const BRACE_DEPTH: f64 = 16.0;
/// Gap between the brace tip and the label node's near edge.
pub const LABEL_GAP: f64 = 12.0;
/// Padding around member rectangles inside the brace.
pub const GROUP_PADDING: f64 = 8.0;

/// Vertical extent of `id` and every descendant. `None` for unknown nodes.
pub fn compute_subtree_bounds(map: &MindMap, id: NodeId) -> Option<VerticalExtent> {
    subtree_of(map, id)
        .into_iter()
        .filter_map(|n| map.node(n))
        .map(|n| n.extent())
        .reduce(VerticalExtent::union)
}

/// Full 2D box of a branch.
pub fn compute_subtree_rect(map: &MindMap, id: NodeId) -> Option<Rect> {
    union_all(
        subtree_of(map, id)
            .into_iter()
            .filter_map(|n| map.node(n))
            .map(|n| n.rect()),
    )
}

/// Union of the member rectangles, padded. `None` when no member exists.
pub fn compute_bounding_box(map: &MindMap, group: &Group) -> Option<Rect> {
    union_all(
        group
            .member_node_ids
            .iter()
            .filter_map(|m| map.node(*m))
            .map(|n| n.rect()),
    )
    .map(|r| r.inflate(GROUP_PADDING, GROUP_PADDING))
}

/// What a renderer needs to draw a group's brace.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupBrace {
    pub bounds: Rect,
    pub orientation: GroupOrientation,
    /// Straight back of the brace: two points along the member box.
    pub back_start: Point,
    pub back_end: Point,
    /// Point of the brace, where the label attaches.
    pub tip: Point,
    /// Where the label node's center belongs.
    pub label_center: Point,
}

/// Brace geometry for a group. Vertical groups get a brace on their right,
/// horizontal groups one underneath. Orientation follows the members'
/// current positions, not the value stored when the group was created.
pub fn group_brace(map: &MindMap, group: &Group, orientation_factor: f64) -> Option<GroupBrace> {
    let bounds = compute_bounding_box(map, group)?;
    let orientation = map.orientation_of(&group.member_node_ids, orientation_factor);
    let label_size = map
        .node(group.label_node_id)
        .map(|n| n.size)
        .unwrap_or_default();
    let center = bounds.center();
    let brace = match orientation {
        GroupOrientation::Vertical => {
            let back_x = bounds.x1 + BRACE_GAP;
            let tip = Point::new(back_x + BRACE_DEPTH, center.y);
            GroupBrace {
                bounds,
                orientation,
                back_start: Point::new(back_x, bounds.y0),
                back_end: Point::new(back_x, bounds.y1),
                tip,
                label_center: Point::new(tip.x + LABEL_GAP + label_size.width / 2.0, tip.y),
            }
        }
        GroupOrientation::Horizontal => {
            let back_y = bounds.y1 + BRACE_GAP;
            let tip = Point::new(center.x, back_y + BRACE_DEPTH);
            GroupBrace {
                bounds,
                orientation,
                back_start: Point::new(bounds.x0, back_y),
                back_end: Point::new(bounds.x1, back_y),
                tip,
                label_center: Point::new(tip.x, tip.y + LABEL_GAP + label_size.height / 2.0),
            }
        }
    };
    Some(brace)
}

/// Move a group's label node to its brace tip (unless pinned). Returns
/// whether the label moved.
pub fn place_group_label(map: &mut MindMap, id: GroupId, orientation_factor: f64) -> bool {
    let Some(brace) = map
        .group(id)
        .and_then(|g| group_brace(map, g, orientation_factor))
    else {
        return false;
    };
    let Some(label_id) = map.group(id).map(|g| g.label_node_id) else {
        return false;
    };
    match map.node_mut(label_id) {
        Some(label) if !label.is_pinned => {
            label.center = brace.label_center;
            true
        }
        _ => false,
    }
}
