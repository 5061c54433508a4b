//! Hit testing: world point → node, handle, or word.
//!
//! Nodes later in arena order paint on top, so point lookups walk the
//! arena in reverse and return the first hit.

use kurbo::{Point, Rect};
use mm_core::NodeId;
use mm_core::geometry::overlaps;
use mm_core::model::{CHAR_WIDTH, MindMap, Node, TextRange};

/// Side length of a resize handle, in screen pixels.
pub const HANDLE_SIZE: f64 = 10.0;

/// Find the topmost node containing `world`.
pub fn hit_test(map: &MindMap, world: Point) -> Option<NodeId> {
    let nodes: Vec<&Node> = map.nodes().collect();
    nodes
        .into_iter()
        .rev()
        .find(|n| n.rect().contains(world))
        .map(|n| n.id)
}

/// Topmost node at `world` other than `exclude`.
pub fn hit_test_except(map: &MindMap, world: Point, exclude: NodeId) -> Option<NodeId> {
    let nodes: Vec<&Node> = map.nodes().collect();
    nodes
        .into_iter()
        .rev()
        .find(|n| n.id != exclude && n.rect().contains(world))
        .map(|n| n.id)
}

/// All nodes whose rectangle intersects `area`, in arena order. The
/// rectangle may be given corner-to-corner in any direction.
pub fn hit_test_rect(map: &MindMap, area: Rect) -> Vec<NodeId> {
    let area = area.abs();
    map.nodes()
        .filter(|n| overlaps(&n.rect(), &area))
        .map(|n| n.id)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomLeft,
        Corner::BottomRight,
    ];

    pub fn of(self, rect: Rect) -> Point {
        match self {
            Corner::TopLeft => Point::new(rect.x0, rect.y0),
            Corner::TopRight => Point::new(rect.x1, rect.y0),
            Corner::BottomLeft => Point::new(rect.x0, rect.y1),
            Corner::BottomRight => Point::new(rect.x1, rect.y1),
        }
    }

    pub fn opposite(self) -> Corner {
        match self {
            Corner::TopLeft => Corner::BottomRight,
            Corner::TopRight => Corner::BottomLeft,
            Corner::BottomLeft => Corner::TopRight,
            Corner::BottomRight => Corner::TopLeft,
        }
    }
}

/// Resize handle under `world`. Handles keep a constant screen size, so
/// their world size shrinks as `zoom` grows.
pub fn hit_resize_handle(map: &MindMap, world: Point, zoom: f64) -> Option<(NodeId, Corner)> {
    let half = HANDLE_SIZE / zoom / 2.0;
    let nodes: Vec<&Node> = map.nodes().collect();
    for node in nodes.into_iter().rev() {
        let rect = node.rect();
        for corner in Corner::ALL {
            let c = corner.of(rect);
            if (world.x - c.x).abs() <= half && (world.y - c.y).abs() <= half {
                return Some((node.id, corner));
            }
        }
    }
    None
}

/// Word of `node`'s text under `world`, estimated from a centered single
/// line of fixed-width glyphs. `None` over whitespace or outside the text.
pub fn hit_word(node: &Node, world: Point) -> Option<TextRange> {
    let chars: Vec<char> = node.text.chars().collect();
    if chars.is_empty() || !node.rect().contains(world) {
        return None;
    }
    let line_width = chars.len() as f64 * CHAR_WIDTH;
    let left = node.center.x - line_width / 2.0;
    let offset = ((world.x - left) / CHAR_WIDTH).floor();
    if offset < 0.0 || offset >= chars.len() as f64 {
        return None;
    }
    let at = offset as usize;
    if chars[at].is_whitespace() {
        return None;
    }
    let start = chars[..at]
        .iter()
        .rposition(|c| c.is_whitespace())
        .map_or(0, |i| i + 1);
    let end = chars[at..]
        .iter()
        .position(|c| c.is_whitespace())
        .map_or(chars.len(), |i| at + i);
    Some(TextRange::new(start, end))
}
