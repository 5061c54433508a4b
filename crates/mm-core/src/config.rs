//! Tunable layout constants.
//!
//! Every layout, collision, routing, and viewport entry point takes a
//! `&LayoutConfig` instead of reading globals, so hosts can override any
//! subset (missing fields fall back to the defaults when deserializing).

use serde::{Deserialize, Serialize};

/// Spacing, padding, and limits used across the layout engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Horizontal distance from a parent's center to a new child's center.
    pub horizontal_gap: f64,
    /// Vertical gap left below the lowest subtree when stacking a new child.
    pub vertical_padding: f64,
    /// Minimum centering offset that triggers a rebalance.
    pub rebalance_threshold: f64,
    /// Padding added around node rectangles for overlap tests.
    pub collision_padding: f64,
    /// Iteration cap for `resolve_for_new_node`.
    pub max_collision_attempts: usize,
    /// Scale applied to horizontal spread when deriving group orientation.
    pub orientation_factor: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Zoom changes smaller than this are ignored.
    pub zoom_epsilon: f64,
    /// Screen-space distance a pointer must travel before a press becomes a drag.
    pub drag_threshold: f64,
    /// Vertical padding of the straight corridor checked for edge obstacles.
    pub edge_padding: f64,
    /// Clearance kept between a bypassing edge and the obstacle cluster.
    pub bypass_margin: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            horizontal_gap: 200.0,
            vertical_padding: 40.0,
            rebalance_threshold: 10.0,
            collision_padding: 20.0,
            max_collision_attempts: 20,
            orientation_factor: 1.0,
            min_zoom: 0.1,
            max_zoom: 5.0,
            zoom_epsilon: 0.0001,
            drag_threshold: 6.0,
            edge_padding: 20.0,
            bypass_margin: 30.0,
        }
    }
}
