//! Mind-map auto-layout.
//!
//! Children grow horizontally away from their parent. A root spreads its
//! children over both sides, always feeding the less crowded one; deeper
//! branches keep flowing in the direction they started. New children stack
//! below the lowest branch already on their side, then the parent is
//! re-centered on its children ("trident"). A root never moves: its
//! children shift instead.

use crate::bounds::compute_subtree_bounds;
use crate::collision::{
    CollisionOutcome, resolve_for_new_node, resolve_sibling_collisions, separate_trees,
    translate_subtree,
};
use crate::config::LayoutConfig;
use crate::geometry::mirror_x;
use crate::graph::{ancestors_of, children_of, is_root, parent_of, root_of, siblings_of, subtree_of};
use crate::id::NodeId;
use crate::model::{Connection, MindMap, Node};
use kurbo::{Point, Size, Vec2};

/// Horizontal side a branch grows toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    /// Side of `x` relative to `axis_x`. Exactly on the axis counts as right.
    pub fn of(x: f64, axis_x: f64) -> Self {
        if x < axis_x { Self::Left } else { Self::Right }
    }

    fn sign(self) -> f64 {
        match self {
            Self::Left => -1.0,
            Self::Right => 1.0,
        }
    }
}

/// Where a new child goes, and whether its parent needs re-centering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub position: Point,
    pub direction: Direction,
    pub parent_is_root: bool,
    pub rebalance_needed: bool,
    /// `parent.y - center_of_same_side_children`; only meaningful when
    /// `rebalance_needed`.
    pub rebalance_delta: f64,
}

/// Compute the position of a new child of `parent`.
///
/// `siblings` are the parent's existing children. Returns `None` when the
/// parent does not exist.
pub fn place_new_child(
    map: &MindMap,
    parent: NodeId,
    siblings: &[NodeId],
    new_size: Size,
    config: &LayoutConfig,
) -> Option<Placement> {
    let p = map.node(parent)?;
    let parent_is_root = is_root(map, parent);

    let direction = if parent_is_root {
        let left = siblings
            .iter()
            .filter_map(|s| map.node(*s))
            .filter(|s| s.center.x < p.center.x)
            .count();
        let right = siblings.iter().filter_map(|s| map.node(*s)).count() - left;
        // Fewer wins; a tie goes right.
        if left < right { Direction::Left } else { Direction::Right }
    } else {
        let root_x = map.node(root_of(map, parent)).map_or(p.center.x, |r| r.center.x);
        Direction::of(p.center.x, root_x)
    };

    let x = p.center.x + direction.sign() * config.horizontal_gap;

    let same_side: Vec<&Node> = siblings
        .iter()
        .filter_map(|s| map.node(*s))
        .filter(|s| Direction::of(s.center.x, p.center.x) == direction)
        .collect();

    let y = same_side
        .iter()
        .filter_map(|s| compute_subtree_bounds(map, s.id))
        .map(|b| b.max_y)
        .reduce(f64::max)
        .map_or(p.center.y, |lowest| {
            lowest + config.vertical_padding + new_size.height / 2.0
        });

    let mut centers: Vec<f64> = same_side.iter().map(|s| s.center.y).collect();
    centers.push(y);
    let (rebalance_needed, rebalance_delta) = rebalance_offset(p.center.y, &centers, config);

    log::debug!(
        "placing child of {parent} {direction:?} at ({x:.1}, {y:.1}), rebalance={rebalance_needed}"
    );
    Some(Placement {
        position: Point::new(x, y),
        direction,
        parent_is_root,
        rebalance_needed,
        rebalance_delta,
    })
}

fn rebalance_offset(parent_y: f64, centers: &[f64], config: &LayoutConfig) -> (bool, f64) {
    if centers.len() < 2 {
        return (false, 0.0);
    }
    let min = centers.iter().copied().fold(f64::MAX, f64::min);
    let max = centers.iter().copied().fold(f64::MIN, f64::max);
    let offset = parent_y - (min + max) / 2.0;
    if offset.abs() > config.rebalance_threshold {
        (true, offset)
    } else {
        (false, 0.0)
    }
}

/// Apply a rebalance computed by `place_new_child` (after the new child has
/// been inserted). A root stays fixed and every branch on `direction`'s
/// side shifts by `offset`; any other parent moves itself by `offset`.
pub fn apply_rebalance(map: &mut MindMap, parent: NodeId, direction: Direction, offset: f64) {
    let Some(parent_x) = map.node(parent).map(|p| p.center.x) else {
        return;
    };
    if is_root(map, parent) {
        let same_side: Vec<NodeId> = children_of(map, parent)
            .into_iter()
            .filter(|c| {
                map.node(*c)
                    .is_some_and(|n| Direction::of(n.center.x, parent_x) == direction)
            })
            .collect();
        for child in same_side {
            translate_subtree(map, child, Vec2::new(0.0, offset));
        }
    } else if let Some(p) = map.node_mut(parent)
        && !p.is_pinned
    {
        p.center.y -= offset;
    }
}

/// Trident layout: put `parent` halfway between its outermost children.
/// A root stays fixed and its children shift the other way. Returns
/// whether anything moved.
pub fn center_parent_over_children(map: &mut MindMap, parent: NodeId) -> bool {
    let Some(parent_y) = map.node(parent).map(|p| p.center.y) else {
        return false;
    };
    let mut ys: Vec<f64> = children_of(map, parent)
        .into_iter()
        .filter_map(|c| map.node(c))
        .map(|c| c.center.y)
        .collect();
    if ys.is_empty() {
        return false;
    }
    ys.sort_by(f64::total_cmp);
    let target = (ys[0] + ys[ys.len() - 1]) / 2.0;
    let delta = target - parent_y;
    if delta.abs() < f64::EPSILON {
        return false;
    }

    if is_root(map, parent) {
        for child in children_of(map, parent) {
            translate_subtree(map, child, Vec2::new(0.0, -delta));
        }
        true
    } else {
        match map.node_mut(parent) {
            Some(p) if !p.is_pinned => {
                p.center.y = target;
                true
            }
            _ => false,
        }
    }
}

/// Whether a move from `old_x` to `new_x` crossed the vertical line `root_x`.
pub fn crossed_root_axis(old_x: f64, new_x: f64, root_x: f64) -> bool {
    Direction::of(old_x, root_x) != Direction::of(new_x, root_x)
}

/// Reflect every descendant of `id` (not `id` itself) across `x = root_x`.
/// Pinned descendants stay where they are.
pub fn mirror_subtree(map: &mut MindMap, id: NodeId, root_x: f64) -> Vec<NodeId> {
    let mut mirrored = Vec::new();
    for n in subtree_of(map, id).into_iter().skip(1) {
        if let Some(node) = map.node_mut(n)
            && !node.is_pinned
        {
            node.center.x = mirror_x(node.center.x, root_x);
            mirrored.push(n);
        }
    }
    mirrored
}

/// What a post-drag reflow did.
#[derive(Debug, Clone, PartialEq)]
pub struct ReflowReport {
    pub mirrored: bool,
    pub centered: Vec<NodeId>,
    pub separated: Vec<NodeId>,
    pub collision: CollisionOutcome,
}

/// Hybrid update after a manual move: re-center every ancestor from the
/// moved node up to the root, separate the moved node from its siblings,
/// then clear any remaining overlap for the moved node.
pub fn reflow(map: &mut MindMap, moved: NodeId, config: &LayoutConfig) -> ReflowReport {
    let mut centered = Vec::new();
    for ancestor in ancestors_of(map, moved) {
        if center_parent_over_children(map, ancestor) {
            centered.push(ancestor);
        }
    }

    let mut level = siblings_of(map, moved);
    level.push(moved);
    let separated = resolve_sibling_collisions(map, &level, config);
    let collision = resolve_for_new_node(map, moved, config);

    ReflowReport {
        mirrored: false,
        centered,
        separated,
        collision,
    }
}

/// End of a node drag that started at `origin`: mirror the branch if the
/// node changed sides of its root, then reflow.
pub fn finish_drag(
    map: &mut MindMap,
    id: NodeId,
    origin: Point,
    config: &LayoutConfig,
) -> ReflowReport {
    let mut mirrored = false;
    if let Some(now) = map.node(id).map(|n| n.center)
        && !is_root(map, id)
    {
        let root = root_of(map, id);
        if let Some(root_x) = map.node(root).map(|r| r.center.x)
            && crossed_root_axis(origin.x, now.x, root_x)
        {
            log::debug!("{id} crossed the root axis; mirroring its branch");
            mirror_subtree(map, id, root_x);
            mirrored = true;
        }
    }
    let mut report = reflow(map, id, config);
    report.mirrored = mirrored;
    report
}

/// Separate sibling branches at every level from `id`'s parent up to the
/// root, so a branch that grew cannot overlap a neighbouring one.
pub fn settle_branch(map: &mut MindMap, id: NodeId, config: &LayoutConfig) -> Vec<NodeId> {
    let mut shifted = Vec::new();
    let mut level_of = Some(id);
    let chain_len = ancestors_of(map, id).len();
    for _ in 0..=chain_len {
        let Some(current) = level_of else { break };
        let mut level = siblings_of(map, current);
        level.push(current);
        shifted.extend(resolve_sibling_collisions(map, &level, config));
        level_of = parent_of(map, current);
    }
    shifted
}

/// Outcome of `insert_child`.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertedChild {
    pub id: NodeId,
    pub connection: Connection,
    pub placement: Placement,
    pub collision: CollisionOutcome,
}

/// Full "add a child" pipeline: place, insert node + connection,
/// rebalance, resolve the newcomer's collisions, settle the branch, then
/// keep the other trees of the map clear of it.
/// `node.center` is overwritten with the computed position.
///
/// Rejected without touching the map when `node.id` is already taken.
pub fn insert_child(
    map: &mut MindMap,
    parent: NodeId,
    mut node: Node,
    config: &LayoutConfig,
) -> Option<InsertedChild> {
    if map.contains(node.id) {
        log::debug!("{} already exists; not inserting it as a child", node.id);
        return None;
    }
    let siblings = children_of(map, parent);
    let placement = place_new_child(map, parent, &siblings, node.size, config)?;

    node.center = placement.position;
    let id = node.id;
    map.add_node(node);
    let connection = Connection::new(parent, id);
    if map.add_connection(connection.clone()).is_none() {
        map.remove_node(id);
        return None;
    }
    if placement.rebalance_needed {
        apply_rebalance(map, parent, placement.direction, placement.rebalance_delta);
    }
    // Rebalancing can push a branch into a neighbouring tree.
    separate_trees(map, config);
    let collision = resolve_for_new_node(map, id, config);
    settle_branch(map, id, config);
    separate_trees(map, config);

    let connection = map.outgoing(parent).into_iter().find(|c| c.target == id)?.clone();
    Some(InsertedChild {
        id,
        connection,
        placement,
        collision,
    })
}

/// Where Enter puts a new node next to `id`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SiblingPlacement {
    /// A new child of `parent`.
    Child { parent: NodeId, placement: Placement },
    /// `id` is a root: a free node below its whole branch.
    Free(Point),
}

/// Placement for a sibling of `id`: a child of `id`'s parent, or for a root
/// a free node dropped below the root's subtree.
pub fn place_new_sibling(
    map: &MindMap,
    id: NodeId,
    new_size: Size,
    config: &LayoutConfig,
) -> Option<SiblingPlacement> {
    let node = map.node(id)?;
    if let Some(parent) = parent_of(map, id) {
        let siblings = children_of(map, parent);
        let placement = place_new_child(map, parent, &siblings, new_size, config)?;
        return Some(SiblingPlacement::Child { parent, placement });
    }
    let bottom = compute_subtree_bounds(map, id)?.max_y;
    Some(SiblingPlacement::Free(Point::new(
        node.center.x,
        bottom + config.vertical_padding + new_size.height / 2.0,
    )))
}
