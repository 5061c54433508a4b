//! Geometry primitives on top of `kurbo`.
//!
//! Nodes are stored by center + size; everything that needs edges goes
//! through `node_rect` / `padded_rect` so the center convention lives in
//! one place.

use kurbo::{Point, Rect, Size};
use serde::{Deserialize, Serialize};

pub use kurbo::{BezPath, CubicBez, ParamCurve, QuadBez, Vec2};

/// Rectangle of a node centered at `center`.
pub fn node_rect(center: Point, size: Size) -> Rect {
    Rect::from_center_size(center, size)
}

/// Node rectangle grown by half the padding on every side:
/// `center ± (w/2 + p/2, h/2 + p/2)`.
pub fn padded_rect(center: Point, size: Size, padding: f64) -> Rect {
    Rect::from_center_size(
        center,
        Size::new(size.width + padding, size.height + padding),
    )
}

/// Strict AABB overlap. Rectangles that only share an edge do not overlap.
pub fn overlaps(a: &Rect, b: &Rect) -> bool {
    a.x0 < b.x1 && a.x1 > b.x0 && a.y0 < b.y1 && a.y1 > b.y0
}

/// Smallest rectangle containing every rectangle in `rects`.
pub fn union_all(rects: impl IntoIterator<Item = Rect>) -> Option<Rect> {
    rects.into_iter().reduce(|acc, r| acc.union(r))
}

/// Reflect an x coordinate across the vertical line `x = axis`.
pub fn mirror_x(x: f64, axis: f64) -> f64 {
    2.0 * axis - x
}

/// Vertical span `[min_y, max_y]` occupied by a node or a whole branch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerticalExtent {
    pub min_y: f64,
    pub max_y: f64,
}

impl VerticalExtent {
    pub fn new(min_y: f64, max_y: f64) -> Self {
        Self { min_y, max_y }
    }

    /// Extent of a single node: `center.y ± height / 2`.
    pub fn of_node(center: Point, size: Size) -> Self {
        let half = size.height / 2.0;
        Self::new(center.y - half, center.y + half)
    }

    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self::new(self.min_y.min(other.min_y), self.max_y.max(other.max_y))
    }

    pub fn contains(&self, other: &Self) -> bool {
        self.min_y <= other.min_y && self.max_y >= other.max_y
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    #[must_use]
    pub fn translated(self, dy: f64) -> Self {
        Self::new(self.min_y + dy, self.max_y + dy)
    }

    /// How far `self`, grown downward by `padding`, reaches into `lower`.
    /// Zero or negative means there is clearance.
    pub fn overlap_into(&self, lower: &Self, padding: f64) -> f64 {
        self.max_y + padding - lower.min_y
    }
}
