//! Mutation engine: keeps the in-memory map and the store in step.
//!
//! `apply_mutation` is the single write path. Each mutation updates the
//! `MindMap` first (which stays the source of truth), runs whatever layout
//! pass the change calls for, and then mirrors every touched record into
//! the store. Store failures are logged and otherwise ignored.
//!
//! Some mutations also want the UI to react once the new element has been
//! drawn (start editing a new node's text, focus a new connection). Those
//! requests queue up as `UiIntent`s and are handed out exactly once by
//! `take_intents`, which the host calls after its next render.

use crate::store::{MemoryStore, Record, RecordKey, Store, StoreError};
use kurbo::{Size, Vec2};
use mm_core::bounds::{GroupBrace, group_brace, place_group_label};
use mm_core::collision::{resolve_for_new_node, separate_trees};
use mm_core::layout::{SiblingPlacement, finish_drag, insert_child, place_new_sibling};
use mm_core::routing::{ConnectionPath, route_all};
use mm_core::{
    Connection, ConnectionId, Group, GroupId, LayoutConfig, MindMap, Node, NodeId, Point,
};
use std::collections::HashMap;

/// A change requested by the canvas or the host.
#[derive(Debug, Clone)]
pub enum GraphMutation {
    /// A free node at its own position (double-tap on empty canvas).
    AddNode { node: Box<Node>, edit_text: bool },
    /// A laid-out child of `parent`; `node.center` is computed.
    AddChild { parent: NodeId, node: Box<Node> },
    /// A laid-out sibling of `of`; a free node below the branch for roots.
    AddSibling { of: NodeId, node: Box<Node> },
    RemoveNode { id: NodeId },
    /// Live drag step in world units.
    MoveNode { id: NodeId, dx: f64, dy: f64 },
    ResizeNode {
        id: NodeId,
        width: f64,
        height: f64,
        center: Point,
    },
    SetText { id: NodeId, text: String },
    /// End of a drag that started with the node at `origin`.
    FinishDrag { id: NodeId, origin: Point },
    AddConnection { connection: Connection },
    RemoveConnection { id: ConnectionId },
    AddGroup { group: Group },
    RemoveGroup { id: GroupId },
    SetPinned { id: NodeId, pinned: bool },
}

/// Work for the UI once the current frame is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiIntent {
    BeginTextEdit(NodeId),
    FocusConnection(ConnectionId),
}

/// The engine owns the authoritative map and its persistence mirror.
pub struct MindMapEngine<S: Store = MemoryStore> {
    pub map: MindMap,
    pub store: S,
    pub config: LayoutConfig,
    intents: Vec<UiIntent>,
}

impl MindMapEngine<MemoryStore> {
    /// An empty map backed by a fresh in-memory store.
    pub fn in_memory(config: LayoutConfig) -> Self {
        Self::from_store(MemoryStore::new(), config)
    }
}

impl<S: Store> MindMapEngine<S> {
    /// Load the map from whatever the store already holds.
    pub fn from_store(store: S, config: LayoutConfig) -> Self {
        let snapshot = store.fetch_all();
        log::debug!(
            "loading {} nodes, {} connections, {} groups",
            snapshot.nodes.len(),
            snapshot.connections.len(),
            snapshot.groups.len()
        );
        let map = MindMap::from_parts(snapshot.nodes, snapshot.connections, snapshot.groups);
        Self {
            map,
            store,
            config,
            intents: Vec::new(),
        }
    }

    /// Drain pending UI intents. Each intent is returned exactly once.
    pub fn take_intents(&mut self) -> Vec<UiIntent> {
        std::mem::take(&mut self.intents)
    }

    pub fn pending_intents(&self) -> &[UiIntent] {
        &self.intents
    }

    // ─── Mutations ───────────────────────────────────────────────────────

    /// Apply a mutation. Returns `false` when it was rejected (unknown ids,
    /// ids already in use, self-loops, duplicate connections) and nothing
    /// changed.
    pub fn apply_mutation(&mut self, mutation: GraphMutation) -> bool {
        match mutation {
            GraphMutation::AddNode { node, edit_text } => {
                let id = node.id;
                if self.map.contains(id) {
                    return false;
                }
                self.map.add_node(*node);
                self.save_node(id);
                if edit_text {
                    self.intents.push(UiIntent::BeginTextEdit(id));
                }
                true
            }
            GraphMutation::AddChild { parent, node } => self.add_child(parent, *node),
            GraphMutation::AddSibling { of, node } => {
                if self.map.contains(node.id) {
                    return false;
                }
                let Some(placement) = place_new_sibling(&self.map, of, node.size, &self.config)
                else {
                    return false;
                };
                match placement {
                    SiblingPlacement::Child { parent, .. } => self.add_child(parent, *node),
                    SiblingPlacement::Free(position) => {
                        let before = self.positions();
                        let mut node = *node;
                        let id = node.id;
                        node.center = position;
                        self.map.add_node(node);
                        resolve_for_new_node(&mut self.map, id, &self.config);
                        separate_trees(&mut self.map, &self.config);
                        self.save_node(id);
                        self.save_moved(&before);
                        self.intents.push(UiIntent::BeginTextEdit(id));
                        true
                    }
                }
            }
            GraphMutation::RemoveNode { id } => self.remove_node(id),
            GraphMutation::MoveNode { id, dx, dy } => {
                if !self.map.translate(id, Vec2::new(dx, dy)) {
                    return false;
                }
                self.save_node(id);
                true
            }
            GraphMutation::ResizeNode {
                id,
                width,
                height,
                center,
            } => {
                if !self.map.set_size(id, Size::new(width, height)) {
                    return false;
                }
                self.map.set_position(id, center);
                self.save_node(id);
                true
            }
            GraphMutation::SetText { id, text } => {
                let Some(node) = self.map.node_mut(id) else {
                    return false;
                };
                node.text = text;
                node.auto_fit();
                self.save_node(id);
                true
            }
            GraphMutation::FinishDrag { id, origin } => {
                if !self.map.contains(id) {
                    return false;
                }
                let before = self.positions();
                let report = finish_drag(&mut self.map, id, origin, &self.config);
                log::debug!(
                    "drag of {id} finished: mirrored={}, {} ancestors re-centered",
                    report.mirrored,
                    report.centered.len()
                );
                self.save_moved(&before);
                true
            }
            GraphMutation::AddConnection { connection } => {
                let Some(id) = self.map.add_connection(connection) else {
                    return false;
                };
                if let Some(record) = self.map.connection(id).cloned() {
                    self.persist(Record::Connection(record));
                }
                self.intents.push(UiIntent::FocusConnection(id));
                true
            }
            GraphMutation::RemoveConnection { id } => {
                if self.map.remove_connection(id).is_none() {
                    return false;
                }
                self.forget(RecordKey::Connection(id));
                true
            }
            GraphMutation::AddGroup { group } => {
                let Some(id) = self.map.add_group(group, self.config.orientation_factor) else {
                    return false;
                };
                if place_group_label(&mut self.map, id, self.config.orientation_factor)
                    && let Some(label) = self.map.group(id).map(|g| g.label_node_id)
                {
                    self.save_node(label);
                }
                if let Some(group) = self.map.group(id).cloned() {
                    self.persist(Record::Group(group));
                }
                true
            }
            GraphMutation::RemoveGroup { id } => {
                if self.map.remove_group(id).is_none() {
                    return false;
                }
                self.forget(RecordKey::Group(id));
                true
            }
            GraphMutation::SetPinned { id, pinned } => {
                let Some(node) = self.map.node_mut(id) else {
                    return false;
                };
                node.is_pinned = pinned;
                self.save_node(id);
                true
            }
        }
    }

    fn add_child(&mut self, parent: NodeId, node: Node) -> bool {
        let before = self.positions();
        let Some(inserted) = insert_child(&mut self.map, parent, node, &self.config) else {
            return false;
        };
        if !inserted.collision.resolved {
            log::warn!("{} still overlaps after placement", inserted.id);
        }
        self.save_node(inserted.id);
        self.persist(Record::Connection(inserted.connection));
        self.save_moved(&before);
        self.intents.push(UiIntent::BeginTextEdit(inserted.id));
        true
    }

    /// Delete a node and mirror the cascade: one store delete per removed
    /// connection and labelled group, then the node itself.
    fn remove_node(&mut self, id: NodeId) -> bool {
        let member_of: Vec<GroupId> = self
            .map
            .groups
            .iter()
            .filter(|g| g.label_node_id != id && g.member_node_ids.contains(&id))
            .map(|g| g.id)
            .collect();
        let Some(removal) = self.map.remove_node(id) else {
            return false;
        };
        for conn in &removal.connections {
            self.forget(RecordKey::Connection(conn.id));
        }
        for group in &removal.groups {
            self.forget(RecordKey::Group(group.id));
        }
        // Groups that merely listed the node as a member changed too.
        for gid in member_of {
            if let Some(group) = self.map.group(gid).cloned() {
                self.persist(Record::Group(group));
            }
        }
        self.forget(RecordKey::Node(id));
        self.intents.retain(|i| *i != UiIntent::BeginTextEdit(id));
        true
    }

    // ─── Persistence ─────────────────────────────────────────────────────

    fn positions(&self) -> HashMap<NodeId, Point> {
        self.map.nodes().map(|n| (n.id, n.center)).collect()
    }

    /// Save every node whose position differs from `before`.
    fn save_moved(&mut self, before: &HashMap<NodeId, Point>) {
        let moved: Vec<NodeId> = self
            .map
            .nodes()
            .filter(|n| before.get(&n.id).is_some_and(|p| *p != n.center))
            .map(|n| n.id)
            .collect();
        for id in moved {
            self.save_node(id);
        }
    }

    fn save_node(&mut self, id: NodeId) {
        if let Some(node) = self.map.node(id).cloned() {
            self.persist(Record::Node(node));
        }
    }

    fn persist(&mut self, record: Record) {
        let key = record.key();
        if let Err(err) = self.store.insert(record) {
            log_store_error("insert", key, &err);
        }
    }

    fn forget(&mut self, key: RecordKey) {
        if let Err(err) = self.store.delete(key) {
            log_store_error("delete", key, &err);
        }
    }

    // ─── Renderer queries ────────────────────────────────────────────────

    pub fn connection_paths(&self) -> Vec<(ConnectionId, ConnectionPath)> {
        route_all(&self.map, &self.config)
    }

    pub fn group_braces(&self) -> Vec<(GroupId, GroupBrace)> {
        self.map
            .groups
            .iter()
            .filter_map(|g| {
                group_brace(&self.map, g, self.config.orientation_factor).map(|b| (g.id, b))
            })
            .collect()
    }
}

fn log_store_error(op: &str, key: RecordKey, err: &StoreError) {
    log::warn!("store {op} of {key:?} failed: {err}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreCall;
    use pretty_assertions::assert_eq;

    fn engine_with_root(name: &str) -> (MindMapEngine, NodeId) {
        let mut engine = MindMapEngine::in_memory(LayoutConfig::default());
        let root = NodeId::intern(name);
        engine.apply_mutation(GraphMutation::AddNode {
            node: Box::new(Node::new(root, Point::ZERO)),
            edit_text: false,
        });
        (engine, root)
    }

    fn child(engine: &mut MindMapEngine, parent: NodeId, name: &str) -> NodeId {
        let id = NodeId::intern(name);
        assert!(engine.apply_mutation(GraphMutation::AddChild {
            parent,
            node: Box::new(Node::new(id, Point::ZERO)),
        }));
        id
    }

    #[test]
    fn add_child_persists_node_and_connection() {
        let (mut engine, root) = engine_with_root("sy_add_root");
        let kid = child(&mut engine, root, "sy_add_kid");
        assert_eq!(engine.map.node(kid).unwrap().center, Point::new(200.0, 0.0));

        let snap = engine.store.fetch_all();
        assert_eq!(snap.nodes.len(), 2);
        assert_eq!(snap.connections.len(), 1);
        assert_eq!(engine.take_intents(), vec![UiIntent::BeginTextEdit(kid)]);
        assert!(engine.take_intents().is_empty());
    }

    #[test]
    fn rebalance_moves_are_persisted() {
        let (mut engine, root) = engine_with_root("sy_rb_root");
        let a = child(&mut engine, root, "sy_rb_a");
        child(&mut engine, root, "sy_rb_b");
        child(&mut engine, root, "sy_rb_c");
        let stored = engine
            .store
            .fetch_all()
            .nodes
            .into_iter()
            .find(|n| n.id == a)
            .unwrap();
        assert_eq!(stored.center.y, -38.0);
        assert_eq!(stored.center, engine.map.node(a).unwrap().center);
    }

    #[test]
    fn cascade_delete_reaches_the_store() {
        let (mut engine, root) = engine_with_root("sy_del_root");
        let hub = child(&mut engine, root, "sy_del_hub");
        let leaf = child(&mut engine, hub, "sy_del_leaf");
        assert_eq!(engine.store.fetch_all().connections.len(), 2);
        engine.store.clear_calls();

        assert!(engine.apply_mutation(GraphMutation::RemoveNode { id: hub }));
        let deletes: Vec<RecordKey> = engine.store.deletes().collect();
        assert_eq!(deletes.len(), 3);
        assert_eq!(deletes.last(), Some(&RecordKey::Node(hub)));
        assert!(engine.store.fetch_all().connections.is_empty());
        assert!(engine.map.contains(leaf));
        assert!(!engine.apply_mutation(GraphMutation::RemoveNode { id: hub }));
    }

    #[test]
    fn hub_with_two_children_loses_three_links() {
        let (mut engine, root) = engine_with_root("sy_hub_root");
        let hub = child(&mut engine, root, "sy_hub");
        let left = child(&mut engine, hub, "sy_hub_left");
        let right = child(&mut engine, hub, "sy_hub_right");
        assert_eq!(engine.map.outgoing(hub).len(), 2);
        assert_eq!(engine.map.incoming(hub).len(), 1);
        engine.store.clear_calls();

        assert!(engine.apply_mutation(GraphMutation::RemoveNode { id: hub }));
        let deletes: Vec<RecordKey> = engine.store.deletes().collect();
        let links = deletes
            .iter()
            .filter(|k| matches!(k, RecordKey::Connection(_)))
            .count();
        assert_eq!(links, 3);
        assert_eq!(deletes.len(), 4);
        assert_eq!(deletes.last(), Some(&RecordKey::Node(hub)));
        assert_eq!(engine.map.connections().count(), 0);
        assert!(engine.store.fetch_all().connections.is_empty());
        assert!(engine.map.contains(left) && engine.map.contains(right));
    }

    #[test]
    fn ids_already_in_use_are_rejected() {
        let (mut engine, root) = engine_with_root("sy_taken_root");
        let kid = child(&mut engine, root, "sy_taken_kid");
        let kid_center = engine.map.node(kid).unwrap().center;
        engine.take_intents();
        engine.store.clear_calls();

        assert!(!engine.apply_mutation(GraphMutation::AddChild {
            parent: root,
            node: Box::new(Node::new(kid, Point::ZERO)),
        }));
        assert!(!engine.apply_mutation(GraphMutation::AddChild {
            parent: root,
            node: Box::new(Node::new(root, Point::ZERO)),
        }));
        assert!(!engine.apply_mutation(GraphMutation::AddSibling {
            of: root,
            node: Box::new(Node::new(kid, Point::ZERO)),
        }));
        assert!(!engine.apply_mutation(GraphMutation::AddNode {
            node: Box::new(Node::new(root, Point::new(900.0, 900.0))),
            edit_text: true,
        }));

        assert!(engine.store.calls.is_empty());
        assert!(engine.take_intents().is_empty());
        assert_eq!(engine.map.node(root).unwrap().center, Point::ZERO);
        assert_eq!(engine.map.node(kid).unwrap().center, kid_center);
        assert_eq!(mm_core::graph::children_of(&engine.map, root), vec![kid]);
        assert_eq!(engine.store.fetch_all().nodes.len(), 2);
    }

    #[test]
    fn rejected_connections_touch_nothing() {
        let (mut engine, root) = engine_with_root("sy_rej_root");
        let kid = child(&mut engine, root, "sy_rej_kid");
        engine.take_intents();
        engine.store.clear_calls();

        assert!(!engine.apply_mutation(GraphMutation::AddConnection {
            connection: Connection::new(root, kid),
        }));
        assert!(!engine.apply_mutation(GraphMutation::AddConnection {
            connection: Connection::new(kid, kid),
        }));
        assert!(engine.store.calls.is_empty());
        assert!(engine.take_intents().is_empty());

        let other = NodeId::intern("sy_rej_other");
        engine.map.add_node(Node::new(other, Point::new(400.0, 300.0)));
        let back = Connection::new(kid, other);
        let back_id = back.id;
        assert!(engine.apply_mutation(GraphMutation::AddConnection { connection: back }));
        assert_eq!(engine.take_intents(), vec![UiIntent::FocusConnection(back_id)]);
        assert_eq!(engine.store.calls, vec![StoreCall::Insert(RecordKey::Connection(back_id))]);
    }

    #[test]
    fn store_failures_do_not_block_the_map() {
        let mut engine =
            MindMapEngine::from_store(MemoryStore::unavailable(), LayoutConfig::default());
        let id = NodeId::intern("sy_down");
        assert!(engine.apply_mutation(GraphMutation::AddNode {
            node: Box::new(Node::new(id, Point::ZERO)),
            edit_text: true,
        }));
        assert!(engine.map.contains(id));
        assert_eq!(engine.take_intents(), vec![UiIntent::BeginTextEdit(id)]);
    }

    #[test]
    fn sibling_of_root_is_a_free_node() {
        let (mut engine, root) = engine_with_root("sy_sib_root");
        let kid = child(&mut engine, root, "sy_sib_kid");
        let free = NodeId::intern("sy_sib_free");
        assert!(engine.apply_mutation(GraphMutation::AddSibling {
            of: root,
            node: Box::new(Node::new(free, Point::ZERO)),
        }));
        assert!(mm_core::graph::is_root(&engine.map, free));
        assert!(engine.map.node(free).unwrap().center.y > 18.0);

        let sib = NodeId::intern("sy_sib_sib");
        assert!(engine.apply_mutation(GraphMutation::AddSibling {
            of: kid,
            node: Box::new(Node::new(sib, Point::ZERO)),
        }));
        assert_eq!(mm_core::graph::parent_of(&engine.map, sib), Some(root));
    }

    #[test]
    fn separate_roots_never_overlap() {
        let (mut engine, root) = engine_with_root("sy_roots_r");
        let free = NodeId::intern("sy_roots_free");
        assert!(engine.apply_mutation(GraphMutation::AddSibling {
            of: root,
            node: Box::new(Node::new(free, Point::ZERO)),
        }));
        let free_kid = child(&mut engine, free, "sy_roots_free_kid");
        for name in ["sy_roots_a", "sy_roots_b", "sy_roots_c"] {
            child(&mut engine, root, name);
        }

        let cfg = engine.config.clone();
        let nobody = std::collections::HashSet::new();
        for id in engine.map.node_ids() {
            let hits = mm_core::collision::find_overlaps(&engine.map, id, &nobody, &cfg);
            assert!(hits.is_empty(), "{id} overlaps {hits:?}");
        }
        assert_eq!(mm_core::graph::parent_of(&engine.map, free_kid), Some(free));

        // Whatever moved was written back.
        let stored = engine.store.fetch_all();
        for node in engine.map.nodes() {
            let saved = stored.nodes.iter().find(|n| n.id == node.id).unwrap();
            assert_eq!(saved.center, node.center);
        }
    }

    #[test]
    fn engine_reloads_from_store() {
        let (mut engine, root) = engine_with_root("sy_load_root");
        let kid = child(&mut engine, root, "sy_load_kid");
        let reloaded = MindMapEngine::from_store(engine.store.clone(), LayoutConfig::default());
        assert_eq!(mm_core::graph::children_of(&reloaded.map, root), vec![kid]);
        assert_eq!(
            reloaded.map.node(kid).unwrap().center,
            engine.map.node(kid).unwrap().center
        );
    }

    #[test]
    fn groups_place_their_label() {
        let (mut engine, root) = engine_with_root("sy_grp_root");
        let a = child(&mut engine, root, "sy_grp_a");
        let b = child(&mut engine, root, "sy_grp_b");
        let label = NodeId::intern("sy_grp_label");
        engine.apply_mutation(GraphMutation::AddNode {
            node: Box::new(Node::new(label, Point::new(-900.0, -900.0))),
            edit_text: false,
        });
        let group = Group::new([a, b], label);
        let gid = group.id;
        assert!(engine.apply_mutation(GraphMutation::AddGroup { group }));
        assert_eq!(engine.group_braces().len(), 1);
        assert_ne!(engine.map.node(label).unwrap().center, Point::new(-900.0, -900.0));

        engine.store.clear_calls();
        engine.apply_mutation(GraphMutation::RemoveNode { id: label });
        assert!(engine.store.deletes().any(|k| k == RecordKey::Group(gid)));
        assert!(engine.map.groups.is_empty());
    }
}
