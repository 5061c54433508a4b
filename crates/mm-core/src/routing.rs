//! Connection curves.
//!
//! Edges attach to the midpoint of a flat side of each node (never to a
//! corner) and bend into an S-curve whose reach grows with distance. When a
//! third node sits in the straight corridor between the anchors the edge
//! bypasses the whole obstacle cluster with two quadratic segments.

use crate::config::LayoutConfig;
use crate::geometry::overlaps;
use crate::id::{ConnectionId, NodeId};
use crate::model::{Connection, MindMap, Node, TextRange};
use kurbo::{BezPath, CubicBez, Point, QuadBez, Rect, Vec2};

/// Control-point reach as a fraction of anchor distance.
const CURVE_FACTOR: f64 = 0.4;
const MIN_REACH: f64 = 40.0;
const MAX_REACH: f64 = 120.0;
/// Perpendicular spread of the first control point across a fan of siblings.
const FAN_SPREAD: f64 = 10.0;
/// Extra reach granted to steep edges, as a fraction of the base reach.
const STEEP_EXTRA_REACH: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl Axis {
    /// Dominant axis of `delta`; ties are vertical.
    pub fn of(delta: Vec2) -> Self {
        if delta.x.abs() > delta.y.abs() {
            Self::Horizontal
        } else {
            Self::Vertical
        }
    }
}

/// Position of an edge among the outgoing edges of its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fan {
    pub index: usize,
    pub count: usize,
}

impl Fan {
    /// Perpendicular offset of the first control point, spread linearly
    /// over `[-FAN_SPREAD, FAN_SPREAD]`.
    pub fn offset(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        let t = self.index.min(self.count - 1) as f64 / (self.count - 1) as f64;
        -FAN_SPREAD + 2.0 * FAN_SPREAD * t
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathShape {
    Direct(CubicBez),
    /// Two quadratic segments meeting at the bypass point.
    Bypass(QuadBez, QuadBez),
}

/// A routed connection, ready for a renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectionPath {
    pub shape: PathShape,
    pub start: Point,
    pub end: Point,
    /// Where a label goes: the curve midpoint, or the bypass point.
    pub label_point: Point,
}

impl ConnectionPath {
    pub fn to_bez_path(&self) -> BezPath {
        let mut path = BezPath::new();
        match self.shape {
            PathShape::Direct(c) => {
                path.move_to(c.p0);
                path.curve_to(c.p1, c.p2, c.p3);
            }
            PathShape::Bypass(a, b) => {
                path.move_to(a.p0);
                path.quad_to(a.p1, a.p2);
                path.quad_to(b.p1, b.p2);
            }
        }
        path
    }

    pub fn is_bypass(&self) -> bool {
        matches!(self.shape, PathShape::Bypass(..))
    }
}

/// Midpoint of a cubic Bézier: `(p0 + 3·p1 + 3·p2 + p3) / 8`.
pub fn cubic_midpoint(c: &CubicBez) -> Point {
    let v = c.p0.to_vec2() + 3.0 * c.p1.to_vec2() + 3.0 * c.p2.to_vec2() + c.p3.to_vec2();
    (v / 8.0).to_point()
}

// ─── Anchoring ───────────────────────────────────────────────────────────

/// Midpoint of the side of `rect` facing along `axis` in direction `sign`.
fn side_midpoint(rect: Rect, axis: Axis, sign: f64) -> Point {
    let c = rect.center();
    match (axis, sign >= 0.0) {
        (Axis::Horizontal, true) => Point::new(rect.x1, c.y),
        (Axis::Horizontal, false) => Point::new(rect.x0, c.y),
        (Axis::Vertical, true) => Point::new(c.x, rect.y1),
        (Axis::Vertical, false) => Point::new(c.x, rect.y0),
    }
}

/// Cardinal anchors for an edge from `source` to `target`: the facing side
/// midpoints along the dominant axis between the centers.
pub fn cardinal_anchors(source: Rect, target: Rect) -> (Point, Point, Axis) {
    let delta = target.center() - source.center();
    let axis = Axis::of(delta);
    let sign = match axis {
        Axis::Horizontal => delta.x.signum(),
        Axis::Vertical => delta.y.signum(),
    };
    (
        side_midpoint(source, axis, sign),
        side_midpoint(target, axis, -sign),
        axis,
    )
}

/// Estimated point of a word range on a node's single text line: the
/// range midpoint's share of the text length, mapped across the node
/// width. `None` when no anchor still fits the text.
pub fn word_anchor_point(node: &Node, anchors: &[TextRange]) -> Option<Point> {
    let len = node.char_len();
    if anchors.is_empty() || !anchors.iter().all(|r| r.fits(len)) {
        return None;
    }
    let start = anchors.iter().map(|r| r.start).min()?;
    let end = anchors.iter().map(|r| r.end).max()?;
    let share = (start + end) as f64 / 2.0 / len as f64;
    let rect = node.rect();
    Some(Point::new(rect.x0 + share * rect.width(), node.center.y))
}

// ─── Routing ─────────────────────────────────────────────────────────────

/// Route between two node rectangles. `fan` selects the dynamic variant
/// (per-sibling exit spread plus extra reach for steep edges).
pub fn route(
    source: Rect,
    target: Rect,
    obstacles: &[Rect],
    fan: Option<Fan>,
    config: &LayoutConfig,
) -> ConnectionPath {
    let (start, end, axis) = cardinal_anchors(source, target);
    route_between(start, end, axis, obstacles, fan, config)
}

/// Route from an explicit start point (a word anchor) to `target`.
pub fn route_from_point(
    start: Point,
    target: Rect,
    obstacles: &[Rect],
    fan: Option<Fan>,
    config: &LayoutConfig,
) -> ConnectionPath {
    let delta = target.center() - start;
    let axis = Axis::of(delta);
    let sign = match axis {
        Axis::Horizontal => delta.x.signum(),
        Axis::Vertical => delta.y.signum(),
    };
    let end = side_midpoint(target, axis, -sign);
    route_between(start, end, axis, obstacles, fan, config)
}

fn route_between(
    start: Point,
    end: Point,
    axis: Axis,
    obstacles: &[Rect],
    fan: Option<Fan>,
    config: &LayoutConfig,
) -> ConnectionPath {
    let blocking = corridor_obstacles(start, end, obstacles, config);
    if axis == Axis::Horizontal
        && let Some(cluster) = blocking
    {
        return bypass(start, end, cluster, config);
    }

    let delta = end - start;
    let distance = delta.hypot();
    let mut reach = (distance * CURVE_FACTOR).clamp(MIN_REACH, MAX_REACH);
    let mut spread = 0.0;
    if let Some(fan) = fan {
        spread = fan.offset();
        let cross = match axis {
            Axis::Horizontal => delta.y.abs(),
            Axis::Vertical => delta.x.abs(),
        };
        if distance > 0.0 {
            reach *= 1.0 + STEEP_EXTRA_REACH * (cross / distance).min(1.0);
        }
    }

    let (along, across) = match axis {
        Axis::Horizontal => (Vec2::new(delta.x.signum(), 0.0), Vec2::new(0.0, 1.0)),
        Axis::Vertical => (Vec2::new(0.0, delta.y.signum()), Vec2::new(1.0, 0.0)),
    };
    let p1 = start + along * reach + across * spread;
    let p2 = end - along * reach;
    let curve = CubicBez::new(start, p1, p2, end);
    log::trace!("direct edge {start:?} -> {end:?}, reach {reach:.1}");
    ConnectionPath {
        shape: PathShape::Direct(curve),
        start,
        end,
        label_point: cubic_midpoint(&curve),
    }
}

/// Union of the obstacle rectangles that cut the straight corridor
/// between the anchors, if any.
fn corridor_obstacles(
    start: Point,
    end: Point,
    obstacles: &[Rect],
    config: &LayoutConfig,
) -> Option<Rect> {
    let corridor = Rect::from_points(start, end).inflate(0.0, config.edge_padding);
    obstacles
        .iter()
        .filter(|r| overlaps(r, &corridor))
        .copied()
        .reduce(|a, b| a.union(b))
}

/// Pass above or below `cluster`, whichever is closer to the straight line's
/// midpoint, through a single bypass point.
fn bypass(start: Point, end: Point, cluster: Rect, config: &LayoutConfig) -> ConnectionPath {
    let mid = start.midpoint(end);
    let above = cluster.y0 - config.bypass_margin;
    let below = cluster.y1 + config.bypass_margin;
    let y = if (mid.y - above).abs() <= (below - mid.y).abs() { above } else { below };
    let via = Point::new(mid.x, y);
    log::debug!("edge bypasses obstacles at y={y:.1}");

    let first = QuadBez::new(start, Point::new((start.x + via.x) / 2.0, via.y), via);
    let second = QuadBez::new(via, Point::new((via.x + end.x) / 2.0, via.y), end);
    ConnectionPath {
        shape: PathShape::Bypass(first, second),
        start,
        end,
        label_point: via,
    }
}

// ─── Map-level queries ───────────────────────────────────────────────────

/// Route `conn` against the current map. Every node other than the two
/// endpoints counts as an obstacle; the fan comes from the source's
/// outgoing connections. `None` when an endpoint is missing.
pub fn create_connection_path(
    map: &MindMap,
    conn: &Connection,
    config: &LayoutConfig,
) -> Option<ConnectionPath> {
    let source = map.node(conn.source)?;
    let target = map.node(conn.target)?;
    let obstacles = obstacle_rects(map, &[conn.source, conn.target]);

    let outgoing = map.outgoing(conn.source);
    let fan = outgoing
        .iter()
        .position(|c| c.id == conn.id)
        .map(|index| Fan {
            index,
            count: outgoing.len(),
        });

    let word = if conn.anchors.is_empty() {
        None
    } else {
        let point = word_anchor_point(source, &conn.anchors);
        if point.is_none() {
            log::debug!("anchors of {} no longer fit; using the whole node", conn.id);
        }
        point
    };

    Some(match word {
        Some(start) => route_from_point(start, target.rect(), &obstacles, fan, config),
        None => route(source.rect(), target.rect(), &obstacles, fan, config),
    })
}

/// Paths for every connection, in insertion order.
pub fn route_all(map: &MindMap, config: &LayoutConfig) -> Vec<(ConnectionId, ConnectionPath)> {
    map.connections()
        .filter_map(|c| create_connection_path(map, c, config).map(|p| (c.id, p)))
        .collect()
}

fn obstacle_rects(map: &MindMap, exclude: &[NodeId]) -> Vec<Rect> {
    map.nodes()
        .filter(|n| !exclude.contains(&n.id))
        .map(Node::rect)
        .collect()
}
