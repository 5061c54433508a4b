//! Overlap detection and repulsion.
//!
//! Node rectangles are padded by `collision_padding` for every test. Pinned
//! nodes are never displaced here, but they still act as obstacles.

use crate::bounds::compute_subtree_bounds;
use crate::config::LayoutConfig;
use crate::geometry::overlaps;
use crate::graph::{parent_of, root_of, subtree_of};
use crate::id::NodeId;
use crate::model::MindMap;
use kurbo::Vec2;
use std::collections::{HashMap, HashSet};

/// Overlap depths below this are treated as rounding noise.
const OVERLAP_EPSILON: f64 = 1e-6;

/// Result of a bounded resolution loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionOutcome {
    /// Number of displacement steps applied.
    pub attempts: usize,
    /// `false` when the attempt cap was hit with overlaps remaining.
    pub resolved: bool,
}

impl CollisionOutcome {
    const CLEAN: Self = Self {
        attempts: 0,
        resolved: true,
    };
}

/// Summary of a whole-map relaxation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelaxationReport {
    pub moved: Vec<NodeId>,
    pub unresolved: Vec<NodeId>,
}

/// Shift `id` and all its descendants by `delta`.
///
/// A pinned node stays put but does not shield its descendants: each node
/// is checked for its own pin. Returns the ids that actually moved.
pub fn translate_subtree(map: &mut MindMap, id: NodeId, delta: Vec2) -> Vec<NodeId> {
    let mut moved = Vec::new();
    for n in subtree_of(map, id) {
        if let Some(node) = map.node_mut(n)
            && !node.is_pinned
        {
            node.center += delta;
            moved.push(n);
        }
    }
    moved
}

/// Ids whose padded rectangle overlaps `id`'s, skipping `ignore`.
pub fn find_overlaps(
    map: &MindMap,
    id: NodeId,
    ignore: &HashSet<NodeId>,
    config: &LayoutConfig,
) -> Vec<NodeId> {
    overlapping(map, id, |other| !ignore.contains(&other), config)
}

fn overlapping(
    map: &MindMap,
    id: NodeId,
    consider: impl Fn(NodeId) -> bool,
    config: &LayoutConfig,
) -> Vec<NodeId> {
    let Some(node) = map.node(id) else {
        return Vec::new();
    };
    let rect = node.padded_rect(config.collision_padding);
    map.nodes()
        .filter(|other| other.id != id && consider(other.id))
        .filter(|other| overlaps(&rect, &other.padded_rect(config.collision_padding)))
        .map(|other| other.id)
        .collect()
}

/// Push a freshly placed node (with its subtree, if any) out of every
/// overlap, one largest-repulsion step at a time.
///
/// Gives up after `max_collision_attempts` steps, logging a warning and
/// leaving the layout as it is.
pub fn resolve_for_new_node(
    map: &mut MindMap,
    id: NodeId,
    config: &LayoutConfig,
) -> CollisionOutcome {
    match map.node(id) {
        Some(node) if !node.is_pinned => {}
        _ => return CollisionOutcome::CLEAN,
    }
    let own: HashSet<NodeId> = subtree_of(map, id).into_iter().collect();

    for attempt in 0..config.max_collision_attempts {
        let hits = find_overlaps(map, id, &own, config);
        if hits.is_empty() {
            return CollisionOutcome {
                attempts: attempt,
                resolved: true,
            };
        }
        let Some(node) = map.node(id) else {
            return CollisionOutcome::CLEAN;
        };
        let rect = node.padded_rect(config.collision_padding);
        let center_y = node.center.y;
        let fallback = config.vertical_padding + node.size.height;

        let dy = hits
            .iter()
            .filter_map(|other| map.node(*other))
            .map(|other| {
                let o = other.padded_rect(config.collision_padding);
                if center_y < other.center.y {
                    -(rect.y1 - o.y0 + config.collision_padding)
                } else {
                    o.y1 - rect.y0 + config.collision_padding
                }
            })
            .filter(|d| d.is_finite() && d.abs() > OVERLAP_EPSILON)
            .max_by(|a, b| a.abs().total_cmp(&b.abs()))
            .unwrap_or(fallback);

        log::trace!("collision step {attempt} for {id}: dy={dy:.2} ({} hits)", hits.len());
        translate_subtree(map, id, Vec2::new(0.0, dy));
    }

    let resolved = find_overlaps(map, id, &own, config).is_empty();
    if !resolved {
        log::warn!(
            "collision resolution for {id} gave up after {} attempts",
            config.max_collision_attempts
        );
    }
    CollisionOutcome {
        attempts: config.max_collision_attempts,
        resolved,
    }
}

/// Separate sibling branches vertically: walking top to bottom, each
/// branch whose extent (plus padding) reaches into the next pushes that
/// next branch down by the overlap. Siblings on opposite sides of their
/// parent never push each other.
///
/// Returns the ids of siblings whose branch was shifted.
pub fn resolve_sibling_collisions(
    map: &mut MindMap,
    siblings: &[NodeId],
    config: &LayoutConfig,
) -> Vec<NodeId> {
    let mut left = Vec::new();
    let mut right = Vec::new();
    for &id in siblings {
        let Some(node) = map.node(id) else { continue };
        let parent_x = parent_of(map, id)
            .and_then(|p| map.node(p))
            .map(|p| p.center.x);
        match parent_x {
            Some(px) if node.center.x < px => left.push(id),
            _ => right.push(id),
        }
    }

    let mut shifted = separate_column(map, left, config);
    shifted.extend(separate_column(map, right, config));
    shifted
}

fn separate_column(
    map: &mut MindMap,
    mut column: Vec<NodeId>,
    config: &LayoutConfig,
) -> Vec<NodeId> {
    column.sort_by(|a, b| {
        let ya = map.node(*a).map_or(0.0, |n| n.center.y);
        let yb = map.node(*b).map_or(0.0, |n| n.center.y);
        ya.total_cmp(&yb)
    });

    let mut shifted = Vec::new();
    for pair in column.windows(2) {
        let (upper, lower) = (pair[0], pair[1]);
        let (Some(ub), Some(lb)) = (
            compute_subtree_bounds(map, upper),
            compute_subtree_bounds(map, lower),
        ) else {
            continue;
        };
        let overlap = ub.overlap_into(&lb, config.collision_padding);
        if overlap > OVERLAP_EPSILON {
            log::debug!("separating {lower} from {upper}: shifting down {overlap:.2}");
            translate_subtree(map, lower, Vec2::new(0.0, overlap));
            shifted.push(lower);
        }
    }
    shifted
}

/// Keep separate trees (nodes grouped by `root_of`) from overlapping.
///
/// Trees are visited by their topmost node. Each one moves down as a block
/// until none of its nodes overlaps a tree visited before it, so the
/// layout inside every tree is untouched. Pinned nodes neither move nor
/// push. Returns the roots of the trees that moved.
pub fn separate_trees(map: &mut MindMap, config: &LayoutConfig) -> Vec<NodeId> {
    let mut trees: Vec<(NodeId, Vec<NodeId>)> = Vec::new();
    let mut slots: HashMap<NodeId, usize> = HashMap::new();
    for id in map.node_ids() {
        let root = root_of(map, id);
        let slot = *slots.entry(root).or_insert_with(|| {
            trees.push((root, Vec::new()));
            trees.len() - 1
        });
        trees[slot].1.push(id);
    }
    if trees.len() < 2 {
        return Vec::new();
    }
    let top_of = |map: &MindMap, members: &[NodeId]| {
        members
            .iter()
            .filter_map(|m| map.node(*m))
            .map(|n| n.rect().y0)
            .fold(f64::INFINITY, f64::min)
    };
    let view: &MindMap = map;
    trees.sort_by(|a, b| top_of(view, &a.1).total_cmp(&top_of(view, &b.1)));

    let mut placed: Vec<NodeId> = Vec::new();
    let mut moved = Vec::new();
    for (root, members) in trees {
        // Every step clears one (member, obstacle) pair for good.
        for _ in 0..=members.len() * placed.len() {
            let dy = clearance_below(map, &members, &placed, config);
            if dy <= OVERLAP_EPSILON {
                break;
            }
            for m in &members {
                if let Some(node) = map.node_mut(*m)
                    && !node.is_pinned
                {
                    node.center.y += dy;
                }
            }
            if !moved.contains(&root) {
                moved.push(root);
            }
        }
        placed.extend(members);
    }
    if !moved.is_empty() {
        log::debug!("separated {} trees from the ones above them", moved.len());
    }
    moved
}

/// Downward shift that takes the deepest overlap between `members` and
/// `placed` to edge contact.
fn clearance_below(
    map: &MindMap,
    members: &[NodeId],
    placed: &[NodeId],
    config: &LayoutConfig,
) -> f64 {
    let mut dy = 0.0_f64;
    for node in members.iter().filter_map(|m| map.node(*m)) {
        if node.is_pinned {
            continue;
        }
        let rect = node.padded_rect(config.collision_padding);
        for other in placed.iter().filter_map(|o| map.node(*o)) {
            let o = other.padded_rect(config.collision_padding);
            if overlaps(&rect, &o) {
                dy = dy.max(o.y1 - rect.y0);
            }
        }
    }
    dy
}

/// Approximate global relaxation: visit every node top to bottom and push
/// it below whatever already-settled node it overlaps. Pinned nodes count
/// as settled from the start. Not a guaranteed fixed point, but converges
/// in practice for tree-shaped maps.
pub fn resolve_all_collisions(map: &mut MindMap, config: &LayoutConfig) -> RelaxationReport {
    let mut order: Vec<(NodeId, f64)> = map.nodes().map(|n| (n.id, n.center.y)).collect();
    order.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut settled: HashSet<NodeId> = map.nodes().filter(|n| n.is_pinned).map(|n| n.id).collect();
    let mut report = RelaxationReport::default();
    for (id, _) in order {
        if settled.contains(&id) {
            continue;
        }
        let outcome = settle_below(map, id, &settled, config);
        if outcome.attempts > 0 {
            report.moved.push(id);
        }
        if !outcome.resolved {
            report.unresolved.push(id);
        }
        settled.insert(id);
    }
    if !report.unresolved.is_empty() {
        log::warn!("{} nodes still overlap after relaxation", report.unresolved.len());
    }
    report
}

fn settle_below(
    map: &mut MindMap,
    id: NodeId,
    settled: &HashSet<NodeId>,
    config: &LayoutConfig,
) -> CollisionOutcome {
    for attempt in 0..config.max_collision_attempts {
        let hits = overlapping(map, id, |other| settled.contains(&other), config);
        let Some(node) = map.node(id) else {
            return CollisionOutcome::CLEAN;
        };
        if hits.is_empty() {
            return CollisionOutcome {
                attempts: attempt,
                resolved: true,
            };
        }
        let top = node.padded_rect(config.collision_padding).y0;
        let dy = hits
            .iter()
            .filter_map(|other| map.node(*other))
            .map(|other| {
                other.padded_rect(config.collision_padding).y1 - top + config.collision_padding
            })
            .fold(0.0_f64, f64::max);
        map.translate(id, Vec2::new(0.0, dy.max(OVERLAP_EPSILON)));
    }
    let resolved = overlapping(map, id, |other| settled.contains(&other), config).is_empty();
    CollisionOutcome {
        attempts: config.max_collision_attempts,
        resolved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Connection, Node};
    use kurbo::Point;
    use pretty_assertions::assert_eq;

    fn add(map: &mut MindMap, name: &str, x: f64, y: f64) -> NodeId {
        let id = NodeId::intern(name);
        map.add_node(Node::new(id, Point::new(x, y)));
        id
    }

    fn any_overlap(map: &MindMap, cfg: &LayoutConfig) -> bool {
        map.node_ids()
            .into_iter()
            .any(|id| !find_overlaps(map, id, &HashSet::new(), cfg).is_empty())
    }

    #[test]
    fn new_node_below_is_pushed_down() {
        let cfg = LayoutConfig::default();
        let mut map = MindMap::new();
        add(&mut map, "cr_old", 0.0, 0.0);
        let new = add(&mut map, "cr_new", 10.0, 20.0);

        let outcome = resolve_for_new_node(&mut map, new, &cfg);
        assert!(outcome.resolved);
        assert_eq!(outcome.attempts, 1);
        let y = map.node(new).unwrap().center.y;
        // old padded bottom = 28, new padded top = 20 - 28 = -8 → 36 overlap + 20
        assert_eq!(y, 20.0 + 56.0);
        assert!(!any_overlap(&map, &cfg));
    }

    #[test]
    fn new_node_above_is_pushed_up() {
        let cfg = LayoutConfig::default();
        let mut map = MindMap::new();
        add(&mut map, "cu_old", 0.0, 0.0);
        let new = add(&mut map, "cu_new", 0.0, -10.0);
        assert!(resolve_for_new_node(&mut map, new, &cfg).resolved);
        assert!(map.node(new).unwrap().center.y < -10.0);
    }

    #[test]
    fn pinned_nodes_are_obstacles_not_movers() {
        let cfg = LayoutConfig::default();
        let mut map = MindMap::new();
        let pinned = NodeId::intern("cp_pinned");
        map.add_node(Node::new(pinned, Point::new(0.0, 0.0)).pinned());
        let new = add(&mut map, "cp_new", 0.0, 5.0);

        resolve_for_new_node(&mut map, new, &cfg);
        assert_eq!(map.node(pinned).unwrap().center, Point::new(0.0, 0.0));
        assert!(!any_overlap(&map, &cfg));

        // A pinned newcomer is left where it is.
        let stuck = NodeId::intern("cp_stuck");
        map.add_node(Node::new(stuck, Point::new(0.0, 1.0)).pinned());
        assert_eq!(resolve_for_new_node(&mut map, stuck, &cfg), CollisionOutcome::CLEAN);
        assert_eq!(map.node(stuck).unwrap().center.y, 1.0);
    }

    #[test]
    fn attempt_cap_is_reported_not_fatal() {
        let cfg = LayoutConfig {
            max_collision_attempts: 1,
            ..LayoutConfig::default()
        };
        let mut map = MindMap::new();
        // A tall column of pinned blockers: one step cannot clear them all.
        for i in 0..6 {
            let id = NodeId::intern(&format!("cap_block_{i}"));
            map.add_node(Node::new(id, Point::new(0.0, i as f64 * 40.0)).pinned());
        }
        let new = add(&mut map, "cap_new", 0.0, 60.0);
        let outcome = resolve_for_new_node(&mut map, new, &cfg);
        assert_eq!(outcome.attempts, 1);
        assert!(!outcome.resolved);
    }

    #[test]
    fn translate_subtree_skips_only_pinned_nodes() {
        let mut map = MindMap::new();
        let parent = NodeId::intern("ts_parent");
        map.add_node(Node::new(parent, Point::new(0.0, 0.0)).pinned());
        let child = add(&mut map, "ts_child", 200.0, 0.0);
        map.add_connection(Connection::new(parent, child));

        let moved = translate_subtree(&mut map, parent, Vec2::new(0.0, 50.0));
        assert_eq!(moved, vec![child]);
        assert_eq!(map.node(parent).unwrap().center.y, 0.0);
        assert_eq!(map.node(child).unwrap().center.y, 50.0);
    }

    #[test]
    fn sibling_branches_are_separated() {
        let cfg = LayoutConfig::default();
        let mut map = MindMap::new();
        let root = add(&mut map, "sb_root", 0.0, 0.0);
        let a = add(&mut map, "sb_a", 200.0, 0.0);
        let a_kid = add(&mut map, "sb_a_kid", 400.0, 100.0);
        let b = add(&mut map, "sb_b", 200.0, 60.0);
        let left = add(&mut map, "sb_left", -200.0, 10.0);
        for (s, t) in [(root, a), (a, a_kid), (root, b), (root, left)] {
            map.add_connection(Connection::new(s, t));
        }

        let shifted = resolve_sibling_collisions(&mut map, &[a, b, left], &cfg);
        assert_eq!(shifted, vec![b]);
        // a's branch reaches 118; b must start 20 below it.
        let b_top = map.node(b).unwrap().extent().min_y;
        assert!((b_top - 138.0).abs() < 1e-9);
        // The left sibling is on the other side and stays.
        assert_eq!(map.node(left).unwrap().center.y, 10.0);
    }

    #[test]
    fn trees_move_apart_as_blocks() {
        let cfg = LayoutConfig::default();
        let mut map = MindMap::new();
        let upper = add(&mut map, "ct_upper", 0.0, 0.0);
        let upper_kid = add(&mut map, "ct_upper_kid", 200.0, 38.0);
        map.add_connection(Connection::new(upper, upper_kid));
        let lower = add(&mut map, "ct_lower", 0.0, 96.0);
        let lower_kid = add(&mut map, "ct_lower_kid", 200.0, 76.0);
        map.add_connection(Connection::new(lower, lower_kid));

        assert!(any_overlap(&map, &cfg));
        assert_eq!(separate_trees(&mut map, &cfg), vec![lower]);
        assert!(!any_overlap(&map, &cfg));

        // The upper tree stays; the lower one keeps its shape.
        assert_eq!(map.node(upper_kid).unwrap().center, Point::new(200.0, 38.0));
        let root = map.node(lower).unwrap().center;
        let kid = map.node(lower_kid).unwrap().center;
        assert_eq!(kid.y - root.y, -20.0);
        assert_eq!(separate_trees(&mut map, &cfg), Vec::<NodeId>::new());
    }

    #[test]
    fn global_relaxation_clears_simple_pileup() {
        let cfg = LayoutConfig::default();
        let mut map = MindMap::new();
        for i in 0..4 {
            add(&mut map, &format!("gr_{i}"), 0.0, i as f64 * 10.0);
        }
        let report = resolve_all_collisions(&mut map, &cfg);
        assert!(report.unresolved.is_empty());
        assert!(!any_overlap(&map, &cfg));
    }
}
