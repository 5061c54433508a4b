//! Property-based invariant tests for the layout core.
//!
//! 1. A branch's vertical bounds contain every node of the branch.
//! 2. Zooming keeps the world point under the anchor fixed.
//! 3. Mirroring a branch twice restores it.
//! 4. Any sequence of child insertions leaves no two nodes overlapping.

use kurbo::Vec2;
use mm_core::bounds::compute_subtree_bounds;
use mm_core::graph::subtree_of;
use mm_core::layout::{insert_child, mirror_subtree};
use mm_core::{Connection, LayoutConfig, MindMap, Node, NodeId, Point, Viewport};
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

/// A random forest shape: node `i > 0` hangs off `parents[i - 1] % i`.
fn tree_strategy() -> impl Strategy<Value = (Vec<usize>, Vec<(f64, f64)>)> {
    (2usize..24).prop_flat_map(|n| {
        (
            prop::collection::vec(any::<usize>(), n - 1),
            prop::collection::vec((-2000.0f64..2000.0, -2000.0f64..2000.0), n),
        )
    })
}

fn build_tree(tag: &str, parents: &[usize], positions: &[(f64, f64)]) -> (MindMap, Vec<NodeId>) {
    let mut map = MindMap::new();
    let ids: Vec<NodeId> = positions
        .iter()
        .enumerate()
        .map(|(i, (x, y))| {
            let id = NodeId::intern(&format!("{tag}_{i}"));
            map.add_node(Node::new(id, Point::new(*x, *y)));
            id
        })
        .collect();
    for (i, p) in parents.iter().enumerate() {
        let child = i + 1;
        map.add_connection(Connection::new(ids[p % child], ids[child]));
    }
    (map, ids)
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Subtree containment
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn subtree_bounds_contain_every_descendant((parents, positions) in tree_strategy()) {
        let (map, ids) = build_tree("pt_contain", &parents, &positions);
        for id in &ids {
            let bounds = compute_subtree_bounds(&map, *id).unwrap();
            for member in subtree_of(&map, *id) {
                let extent = map.node(member).unwrap().extent();
                prop_assert!(
                    bounds.contains(&extent),
                    "bounds {:?} of {} miss {} at {:?}",
                    bounds, id, member, extent
                );
            }
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Zoom anchor fixpoint
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn zoom_keeps_anchor_fixed(
        zoom in 0.1f64..5.0,
        pan in (-5000.0f64..5000.0, -5000.0f64..5000.0),
        anchor in (0.0f64..2000.0, 0.0f64..2000.0),
        factor in 0.2f64..3.0,
    ) {
        let cfg = LayoutConfig::default();
        let mut vp = Viewport { zoom, pan: Vec2::new(pan.0, pan.1) };
        let anchor = Point::new(anchor.0, anchor.1);
        let before = vp.screen_to_world(anchor);
        vp.process_zoom(factor, anchor, &cfg);
        let after = vp.screen_to_world(anchor);
        prop_assert!(vp.zoom >= cfg.min_zoom && vp.zoom <= cfg.max_zoom);
        prop_assert!(
            (before - after).hypot() < 1e-6 * (1.0 + before.to_vec2().hypot()),
            "anchor drifted from {:?} to {:?}",
            before, after
        );
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Mirroring round-trip
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn mirroring_twice_is_identity(
        (parents, positions) in tree_strategy(),
        root_x in -1000.0f64..1000.0,
    ) {
        let (mut map, ids) = build_tree("pt_mirror", &parents, &positions);
        let before: Vec<Point> = ids.iter().map(|id| map.node(*id).unwrap().center).collect();
        mirror_subtree(&mut map, ids[0], root_x);
        mirror_subtree(&mut map, ids[0], root_x);
        for (id, old) in ids.iter().zip(before) {
            let now = map.node(*id).unwrap().center;
            prop_assert!((now - old).hypot() < 1e-9, "{} moved from {:?} to {:?}", id, old, now);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. No overlap after insertions
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn insertions_never_overlap(picks in prop::collection::vec(any::<usize>(), 1..30)) {
        let cfg = LayoutConfig::default();
        let mut map = MindMap::new();
        let root = NodeId::generate();
        map.add_node(Node::new(root, Point::new(5000.0, 5000.0)));
        let mut ids = vec![root];
        for pick in picks {
            let parent = ids[pick % ids.len()];
            let node = Node::new(NodeId::generate(), Point::ZERO);
            let inserted = insert_child(&mut map, parent, node, &cfg);
            prop_assert!(inserted.is_some());
            ids.push(inserted.unwrap().id);
        }

        let nodes: Vec<&Node> = map.nodes().collect();
        for (i, a) in nodes.iter().enumerate() {
            for b in &nodes[i + 1..] {
                let ra = a.padded_rect(cfg.collision_padding).inflate(-1e-6, -1e-6);
                let rb = b.padded_rect(cfg.collision_padding).inflate(-1e-6, -1e-6);
                prop_assert!(
                    !mm_core::geometry::overlaps(&ra, &rb),
                    "{} at {:?} overlaps {} at {:?}",
                    a.id, a.center, b.id, b.center
                );
            }
        }
    }
}
