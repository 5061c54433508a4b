pub mod bounds;
pub mod collision;
pub mod config;
pub mod error;
pub mod geometry;
pub mod graph;
pub mod id;
pub mod layout;
pub mod model;
pub mod routing;
pub mod viewport;

pub use bounds::{GroupBrace, compute_bounding_box, compute_subtree_bounds, group_brace};
pub use collision::{CollisionOutcome, resolve_all_collisions, resolve_for_new_node};
pub use config::LayoutConfig;
pub use error::MindMapError;
pub use geometry::VerticalExtent;
pub use id::{ConnectionId, GroupId, NodeId};
pub use layout::{Direction, Placement, place_new_child};
pub use model::*;
pub use routing::{ConnectionPath, PathShape, create_connection_path};
pub use viewport::Viewport;

// kurbo and petgraph types that appear throughout the public API
pub use kurbo::{Point, Rect, Size};
pub use petgraph::graph::{EdgeIndex, NodeIndex};
