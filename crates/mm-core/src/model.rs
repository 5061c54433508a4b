//! Core data model for mind maps.
//!
//! The map is an arena: nodes live in a `StableDiGraph` and connections are
//! its edges, so every "pointer" between entities is an index or an id
//! lookup. Layout treats the first incoming connection of a node (by
//! insertion order) as its primary parent; the data model itself permits
//! arbitrary graphs. Groups are a side list of visual annotations that
//! reference nodes by id without owning them.

use crate::geometry::{VerticalExtent, node_rect, padded_rect};
use crate::id::{ConnectionId, GroupId, NodeId};
use kurbo::{Point, Rect, Size, Vec2};
use petgraph::Direction;
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashMap;

// ─── Node ────────────────────────────────────────────────────────────────

pub const MIN_WIDTH: f64 = 60.0;
pub const MIN_HEIGHT: f64 = 28.0;
pub const DEFAULT_WIDTH: f64 = 100.0;
pub const DEFAULT_HEIGHT: f64 = 36.0;

/// Rough glyph advance used by auto-fit. Real text metrics belong to the renderer.
pub const CHAR_WIDTH: f64 = 8.0;
pub const LINE_HEIGHT: f64 = 20.0;
const TEXT_INSET: f64 = 24.0;

/// A positioned, sized, textual entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub text: String,
    /// Center in world coordinates.
    pub center: Point,
    pub size: Size,
    /// User-fixed size; `auto_fit` leaves it alone.
    pub is_manually_sized: bool,
    /// Exempt from every automatic move (layout, rebalance, collisions).
    pub is_pinned: bool,
}

impl Node {
    pub fn new(id: NodeId, center: Point) -> Self {
        Self {
            id,
            text: String::new(),
            center,
            size: Size::new(DEFAULT_WIDTH, DEFAULT_HEIGHT),
            is_manually_sized: false,
            is_pinned: false,
        }
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    #[must_use]
    pub fn with_size(mut self, size: Size) -> Self {
        self.set_size(size);
        self
    }

    #[must_use]
    pub fn pinned(mut self) -> Self {
        self.is_pinned = true;
        self
    }

    /// Set the size, clamped to the minimums.
    pub fn set_size(&mut self, size: Size) {
        self.size = clamp_size(size);
    }

    /// Re-derive the size from the text unless the user fixed it.
    pub fn auto_fit(&mut self) {
        if self.is_manually_sized {
            return;
        }
        let lines = self.text.lines().count().max(1);
        let longest = self
            .text
            .lines()
            .map(|l| l.chars().count())
            .max()
            .unwrap_or(0);
        let width = (longest as f64 * CHAR_WIDTH + TEXT_INSET).max(DEFAULT_WIDTH);
        let height = (lines as f64 * LINE_HEIGHT + TEXT_INSET / 2.0).max(DEFAULT_HEIGHT);
        self.set_size(Size::new(width, height));
    }

    pub fn rect(&self) -> Rect {
        node_rect(self.center, self.size)
    }

    pub fn padded_rect(&self, padding: f64) -> Rect {
        padded_rect(self.center, self.size, padding)
    }

    pub fn extent(&self) -> VerticalExtent {
        VerticalExtent::of_node(self.center, self.size)
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

pub fn clamp_size(size: Size) -> Size {
    Size::new(size.width.max(MIN_WIDTH), size.height.max(MIN_HEIGHT))
}

// ─── Connections ─────────────────────────────────────────────────────────

/// Half-open character range `[start, end)` of a node's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Whether the range still addresses real characters of a text of `len` chars.
    pub fn fits(&self, len: usize) -> bool {
        self.start < self.end && self.end <= len
    }

    pub fn midpoint(&self) -> f64 {
        (self.start + self.end) as f64 / 2.0
    }
}

/// A directed edge from `source` to `target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub source: NodeId,
    pub target: NodeId,
    pub label: String,
    /// Word-level origin on the source's text; empty means the whole node.
    pub anchors: SmallVec<[TextRange; 2]>,
    /// Insertion order within the map. Assigned by `MindMap::add_connection`.
    #[serde(skip)]
    pub seq: u64,
}

impl Connection {
    pub fn new(source: NodeId, target: NodeId) -> Self {
        Self {
            id: ConnectionId::generate(),
            source,
            target,
            label: String::new(),
            anchors: SmallVec::new(),
            seq: 0,
        }
    }

    #[must_use]
    pub fn with_anchors(mut self, anchors: impl IntoIterator<Item = TextRange>) -> Self {
        self.anchors = anchors.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Same endpoints and the same anchor set (order-insensitive).
    pub fn duplicates(&self, other: &Connection) -> bool {
        self.source == other.source
            && self.target == other.target
            && sorted_anchors(&self.anchors) == sorted_anchors(&other.anchors)
    }
}

fn sorted_anchors(anchors: &[TextRange]) -> SmallVec<[TextRange; 2]> {
    let mut v: SmallVec<[TextRange; 2]> = anchors.iter().copied().collect();
    v.sort_unstable();
    v.dedup();
    v
}

// ─── Groups ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GroupOrientation {
    #[default]
    Vertical,
    Horizontal,
}

impl GroupOrientation {
    /// Vertical iff the vertical spread of `centers` exceeds the horizontal
    /// spread scaled by `factor`.
    pub fn from_centers(centers: &[Point], factor: f64) -> Self {
        if centers.is_empty() {
            return Self::Vertical;
        }
        let (mut min_x, mut max_x) = (f64::MAX, f64::MIN);
        let (mut min_y, mut max_y) = (f64::MAX, f64::MIN);
        for c in centers {
            min_x = min_x.min(c.x);
            max_x = max_x.max(c.x);
            min_y = min_y.min(c.y);
            max_y = max_y.max(c.y);
        }
        if (max_y - min_y) > (max_x - min_x) * factor {
            Self::Vertical
        } else {
            Self::Horizontal
        }
    }
}

/// A brace wrapping a set of nodes, labelled by another node at its tip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub member_node_ids: Vec<NodeId>,
    pub label_node_id: NodeId,
    pub orientation: GroupOrientation,
}

impl Group {
    pub fn new(members: impl IntoIterator<Item = NodeId>, label_node_id: NodeId) -> Self {
        let mut member_node_ids: Vec<NodeId> = Vec::new();
        for id in members {
            if !member_node_ids.contains(&id) {
                member_node_ids.push(id);
            }
        }
        Self {
            id: GroupId::generate(),
            member_node_ids,
            label_node_id,
            orientation: GroupOrientation::default(),
        }
    }
}

// ─── Map arena ───────────────────────────────────────────────────────────

/// Everything a node deletion took with it, for mirroring into a store.
#[derive(Debug, Clone, Default)]
pub struct Removal {
    pub node: Option<Node>,
    pub connections: Vec<Connection>,
    pub groups: Vec<Group>,
}

/// The complete map: nodes, connections, groups.
#[derive(Debug, Clone, Default)]
pub struct MindMap {
    /// Node weights are nodes, edge weights are connections.
    pub graph: StableDiGraph<Node, Connection>,
    pub id_index: HashMap<NodeId, NodeIndex>,
    pub connection_index: HashMap<ConnectionId, EdgeIndex>,
    pub groups: Vec<Group>,
    next_seq: u64,
}

impl MindMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a map from a flat snapshot. Connections keep the given order;
    /// invalid ones (self-loops, dangling, duplicates) are dropped.
    pub fn from_parts(
        nodes: impl IntoIterator<Item = Node>,
        connections: impl IntoIterator<Item = Connection>,
        groups: impl IntoIterator<Item = Group>,
    ) -> Self {
        let mut map = Self::new();
        for node in nodes {
            map.add_node(node);
        }
        for conn in connections {
            let id = conn.id;
            if map.add_connection(conn).is_none() {
                log::warn!("dropping invalid connection {id} while loading");
            }
        }
        for group in groups {
            if map.node(group.label_node_id).is_some() {
                map.groups.push(group);
            } else {
                log::warn!("dropping group {} with missing label node", group.id);
            }
        }
        map
    }

    // ── Nodes ──

    /// Insert a node. A node with the same id is replaced in place.
    pub fn add_node(&mut self, node: Node) -> NodeIndex {
        if let Some(&idx) = self.id_index.get(&node.id) {
            self.graph[idx] = node;
            return idx;
        }
        let id = node.id;
        let idx = self.graph.add_node(node);
        self.id_index.insert(id, idx);
        idx
    }

    /// Remove a node and cascade to every connection touching it and every
    /// group it labels. Other groups simply forget it as a member.
    pub fn remove_node(&mut self, id: NodeId) -> Option<Removal> {
        let idx = self.index_of(id)?;
        let mut removal = Removal::default();

        let touching: Vec<EdgeIndex> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .chain(self.graph.edges_directed(idx, Direction::Incoming))
            .map(|e| e.id())
            .collect();
        for edge in touching {
            if let Some(conn) = self.graph.remove_edge(edge) {
                self.connection_index.remove(&conn.id);
                removal.connections.push(conn);
            }
        }
        removal.connections.sort_by_key(|c| c.seq);

        let (labelled, kept): (Vec<Group>, Vec<Group>) = std::mem::take(&mut self.groups)
            .into_iter()
            .partition(|g| g.label_node_id == id);
        self.groups = kept;
        for group in &mut self.groups {
            group.member_node_ids.retain(|m| *m != id);
        }
        removal.groups = labelled;

        removal.node = self.graph.remove_node(idx);
        self.id_index.remove(&id);
        Some(removal)
    }

    pub fn index_of(&self, id: NodeId) -> Option<NodeIndex> {
        self.id_index.get(&id).copied()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.index_of(id).map(|idx| &self.graph[idx])
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.index_of(id).map(|idx| &mut self.graph[idx])
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.id_index.contains_key(&id)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// All nodes in arena order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.graph.node_indices().map(move |idx| &self.graph[idx])
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes().map(|n| n.id).collect()
    }

    pub fn set_position(&mut self, id: NodeId, center: Point) -> bool {
        match self.node_mut(id) {
            Some(node) => {
                node.center = center;
                true
            }
            None => false,
        }
    }

    pub fn translate(&mut self, id: NodeId, delta: Vec2) -> bool {
        match self.node_mut(id) {
            Some(node) => {
                node.center += delta;
                true
            }
            None => false,
        }
    }

    /// Resize (clamped to minimums) and mark the node as manually sized.
    pub fn set_size(&mut self, id: NodeId, size: Size) -> bool {
        match self.node_mut(id) {
            Some(node) => {
                node.set_size(size);
                node.is_manually_sized = true;
                true
            }
            None => false,
        }
    }

    // ── Connections ──

    /// Add a connection. Returns `None` for self-loops, unknown endpoints,
    /// and duplicates of an existing connection.
    pub fn add_connection(&mut self, mut conn: Connection) -> Option<ConnectionId> {
        if conn.source == conn.target {
            log::debug!("rejecting self-loop on {}", conn.source);
            return None;
        }
        let from = self.index_of(conn.source)?;
        let to = self.index_of(conn.target)?;
        if self.connections().any(|c| c.duplicates(&conn)) {
            log::debug!("rejecting duplicate {} -> {}", conn.source, conn.target);
            return None;
        }
        conn.seq = self.next_seq;
        self.next_seq += 1;
        let id = conn.id;
        let edge = self.graph.add_edge(from, to, conn);
        self.connection_index.insert(id, edge);
        Some(id)
    }

    pub fn remove_connection(&mut self, id: ConnectionId) -> Option<Connection> {
        let edge = self.connection_index.remove(&id)?;
        self.graph.remove_edge(edge)
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connection_index
            .get(&id)
            .and_then(|e| self.graph.edge_weight(*e))
    }

    /// All connections in insertion order.
    pub fn connections(&self) -> impl Iterator<Item = &Connection> + '_ {
        let mut all: Vec<&Connection> = self.graph.edge_weights().collect();
        all.sort_by_key(|c| c.seq);
        all.into_iter()
    }

    /// Connections leaving `id`, in insertion order.
    pub fn outgoing(&self, id: NodeId) -> Vec<&Connection> {
        self.directed(id, Direction::Outgoing)
    }

    /// Connections arriving at `id`, in insertion order.
    pub fn incoming(&self, id: NodeId) -> Vec<&Connection> {
        self.directed(id, Direction::Incoming)
    }

    fn directed(&self, id: NodeId, dir: Direction) -> Vec<&Connection> {
        let Some(idx) = self.index_of(id) else {
            return Vec::new();
        };
        let mut conns: Vec<&Connection> = self
            .graph
            .edges_directed(idx, dir)
            .map(|e| e.weight())
            .collect();
        conns.sort_by_key(|c| c.seq);
        conns
    }

    // ── Groups ──

    /// Add a group, deriving its orientation from the current member
    /// positions. Rejected when the label node does not exist.
    pub fn add_group(&mut self, mut group: Group, orientation_factor: f64) -> Option<GroupId> {
        if !self.contains(group.label_node_id) {
            return None;
        }
        group.member_node_ids.retain(|m| self.id_index.contains_key(m));
        group.orientation = self.orientation_of(&group.member_node_ids, orientation_factor);
        let id = group.id;
        self.groups.push(group);
        Some(id)
    }

    /// Remove a group. The label node stays.
    pub fn remove_group(&mut self, id: GroupId) -> Option<Group> {
        let pos = self.groups.iter().position(|g| g.id == id)?;
        Some(self.groups.remove(pos))
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn orientation_of(&self, members: &[NodeId], factor: f64) -> GroupOrientation {
        let centers: Vec<Point> = members
            .iter()
            .filter_map(|m| self.node(*m))
            .map(|n| n.center)
            .collect();
        GroupOrientation::from_centers(&centers, factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn node(name: &str, x: f64, y: f64) -> Node {
        Node::new(NodeId::intern(name), Point::new(x, y))
    }

    #[test]
    fn sizes_clamp_to_minimums() {
        let n = node("tiny", 0.0, 0.0).with_size(Size::new(10.0, 5.0));
        assert_eq!(n.size, Size::new(MIN_WIDTH, MIN_HEIGHT));
    }

    #[test]
    fn auto_fit_grows_with_text_but_respects_manual_size() {
        let mut n = node("fit", 0.0, 0.0).with_text("a fairly long idea title");
        n.auto_fit();
        assert!(n.size.width > DEFAULT_WIDTH);

        let mut fixed = node("fixed", 0.0, 0.0).with_text("a fairly long idea title");
        fixed.is_manually_sized = true;
        fixed.auto_fit();
        assert_eq!(fixed.size.width, DEFAULT_WIDTH);
    }

    #[test]
    fn rejects_self_loop_and_duplicates() {
        let mut map = MindMap::new();
        let a = node("dup_a", 0.0, 0.0);
        let b = node("dup_b", 200.0, 0.0);
        let (a_id, b_id) = (a.id, b.id);
        map.add_node(a);
        map.add_node(b);

        assert!(map.add_connection(Connection::new(a_id, a_id)).is_none());
        assert!(map.add_connection(Connection::new(a_id, b_id)).is_some());
        assert!(map.add_connection(Connection::new(a_id, b_id)).is_none());

        let w1 = Connection::new(a_id, b_id).with_anchors([TextRange::new(0, 3)]);
        let w2 = Connection::new(a_id, b_id).with_anchors([TextRange::new(4, 7)]);
        assert!(map.add_connection(w1).is_some());
        assert!(map.add_connection(w2).is_some());
        // Repeated ranges collapse, so this is w2's anchor set again.
        let w3 = Connection::new(a_id, b_id)
            .with_anchors([TextRange::new(4, 7), TextRange::new(4, 7)]);
        assert!(map.add_connection(w3).is_none());
        assert_eq!(map.connections().count(), 3);
    }

    #[test]
    fn remove_node_cascades() {
        let mut map = MindMap::new();
        for (name, x) in [("c_hub", 0.0), ("c_x", 200.0), ("c_y", 400.0), ("c_z", -200.0)] {
            map.add_node(node(name, x, 0.0));
        }
        let id = NodeId::intern;
        map.add_connection(Connection::new(id("c_hub"), id("c_x")));
        map.add_connection(Connection::new(id("c_hub"), id("c_y")));
        map.add_connection(Connection::new(id("c_z"), id("c_hub")));
        map.add_connection(Connection::new(id("c_x"), id("c_y")));

        let labelled = Group::new([id("c_x"), id("c_y")], id("c_hub"));
        let member_of = Group::new([id("c_hub"), id("c_x")], id("c_z"));
        map.add_group(labelled, 1.0);
        map.add_group(member_of, 1.0);

        let removal = map.remove_node(id("c_hub")).unwrap();
        assert_eq!(removal.connections.len(), 3);
        assert_eq!(removal.groups.len(), 1);
        assert_eq!(map.connections().count(), 1);
        assert_eq!(map.groups.len(), 1);
        assert_eq!(map.groups[0].member_node_ids, vec![id("c_x")]);
        assert!(!map.contains(id("c_hub")));
    }

    #[test]
    fn orientation_follows_spread() {
        let tall = [Point::new(0.0, 0.0), Point::new(10.0, 200.0)];
        let wide = [Point::new(0.0, 0.0), Point::new(300.0, 20.0)];
        assert_eq!(GroupOrientation::from_centers(&tall, 1.0), GroupOrientation::Vertical);
        assert_eq!(GroupOrientation::from_centers(&wide, 1.0), GroupOrientation::Horizontal);
        // A large factor makes horizontal spread dominate.
        assert_eq!(GroupOrientation::from_centers(&tall, 30.0), GroupOrientation::Horizontal);
    }

    #[test]
    fn incoming_is_in_insertion_order() {
        let mut map = MindMap::new();
        for name in ["o_p1", "o_p2", "o_child"] {
            map.add_node(node(name, 0.0, 0.0));
        }
        let id = NodeId::intern;
        map.add_connection(Connection::new(id("o_p2"), id("o_child")));
        map.add_connection(Connection::new(id("o_p1"), id("o_child")));
        let sources: Vec<NodeId> = map.incoming(id("o_child")).iter().map(|c| c.source).collect();
        assert_eq!(sources, vec![id("o_p2"), id("o_p1")]);
    }
}
