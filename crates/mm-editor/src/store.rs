//! Persistence collaborator contract.
//!
//! The engine mirrors every arena change into a `Store` as it happens.
//! Stores own their failure handling: the engine logs a failed write and
//! keeps going with the in-memory map as the source of truth.

use mm_core::{Connection, ConnectionId, Group, GroupId, Node, NodeId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One persisted entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Record {
    Node(Node),
    Connection(Connection),
    Group(Group),
}

impl Record {
    pub fn key(&self) -> RecordKey {
        match self {
            Self::Node(n) => RecordKey::Node(n.id),
            Self::Connection(c) => RecordKey::Connection(c.id),
            Self::Group(g) => RecordKey::Group(g.id),
        }
    }
}

/// Identity of a persisted entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKey {
    Node(NodeId),
    Connection(ConnectionId),
    Group(GroupId),
}

/// Everything a store holds, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub nodes: Vec<Node>,
    pub connections: Vec<Connection>,
    pub groups: Vec<Group>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("no stored record for {0:?}")]
    Missing(RecordKey),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub trait Store {
    /// Insert a record, replacing any record with the same key.
    fn insert(&mut self, record: Record) -> Result<(), StoreError>;

    fn delete(&mut self, key: RecordKey) -> Result<(), StoreError>;

    fn fetch_all(&self) -> Snapshot;
}

/// A write the store received, kept for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreCall {
    Insert(RecordKey),
    Delete(RecordKey),
}

/// In-memory store: the non-persistent fallback, and the store tests use.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    snapshot: Snapshot,
    /// Every call, successful or not, in order.
    pub calls: Vec<StoreCall>,
    unavailable: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing contents.
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            ..Self::default()
        }
    }

    /// A store whose writes all fail, for exercising the error path.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn deletes(&self) -> impl Iterator<Item = RecordKey> + '_ {
        self.calls.iter().filter_map(|c| match c {
            StoreCall::Delete(key) => Some(*key),
            StoreCall::Insert(_) => None,
        })
    }

    pub fn inserts(&self) -> impl Iterator<Item = RecordKey> + '_ {
        self.calls.iter().filter_map(|c| match c {
            StoreCall::Insert(key) => Some(*key),
            StoreCall::Delete(_) => None,
        })
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }
}

fn upsert<T>(items: &mut Vec<T>, item: T, same: impl Fn(&T) -> bool) {
    match items.iter_mut().find(|existing| same(existing)) {
        Some(slot) => *slot = item,
        None => items.push(item),
    }
}

fn remove<T>(items: &mut Vec<T>, same: impl Fn(&T) -> bool) -> bool {
    let before = items.len();
    items.retain(|item| !same(item));
    items.len() != before
}

impl Store for MemoryStore {
    fn insert(&mut self, record: Record) -> Result<(), StoreError> {
        self.calls.push(StoreCall::Insert(record.key()));
        if self.unavailable {
            return Err(StoreError::Unavailable("memory store disabled".into()));
        }
        match record {
            Record::Node(n) => {
                let id = n.id;
                upsert(&mut self.snapshot.nodes, n, |x| x.id == id);
            }
            Record::Connection(c) => {
                let id = c.id;
                upsert(&mut self.snapshot.connections, c, |x| x.id == id);
            }
            Record::Group(g) => {
                let id = g.id;
                upsert(&mut self.snapshot.groups, g, |x| x.id == id);
            }
        }
        Ok(())
    }

    fn delete(&mut self, key: RecordKey) -> Result<(), StoreError> {
        self.calls.push(StoreCall::Delete(key));
        if self.unavailable {
            return Err(StoreError::Unavailable("memory store disabled".into()));
        }
        let removed = match key {
            RecordKey::Node(id) => remove(&mut self.snapshot.nodes, |x| x.id == id),
            RecordKey::Connection(id) => remove(&mut self.snapshot.connections, |x| x.id == id),
            RecordKey::Group(id) => remove(&mut self.snapshot.groups, |x| x.id == id),
        };
        if removed {
            Ok(())
        } else {
            Err(StoreError::Missing(key))
        }
    }

    fn fetch_all(&self) -> Snapshot {
        self.snapshot.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mm_core::Point;
    use pretty_assertions::assert_eq;

    #[test]
    fn insert_replaces_by_key() {
        let mut store = MemoryStore::new();
        let id = NodeId::intern("st_node");
        store.insert(Record::Node(Node::new(id, Point::ZERO))).unwrap();
        store
            .insert(Record::Node(Node::new(id, Point::new(10.0, 0.0))))
            .unwrap();
        let snap = store.fetch_all();
        assert_eq!(snap.nodes.len(), 1);
        assert_eq!(snap.nodes[0].center.x, 10.0);
        assert_eq!(store.inserts().count(), 2);
    }

    #[test]
    fn deleting_unknown_record_is_an_error() {
        let mut store = MemoryStore::new();
        let key = RecordKey::Node(NodeId::intern("st_missing"));
        assert_eq!(store.delete(key), Err(StoreError::Missing(key)));
        assert_eq!(store.deletes().collect::<Vec<_>>(), vec![key]);
    }

    #[test]
    fn unavailable_store_rejects_writes() {
        let mut store = MemoryStore::unavailable();
        let result = store.insert(Record::Node(Node::new(NodeId::intern("st_down"), Point::ZERO)));
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert!(store.fetch_all().nodes.is_empty());
    }
}
