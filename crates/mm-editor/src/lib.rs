pub mod hit;
pub mod input;
pub mod store;
pub mod sync;
pub mod tools;

pub use input::{InputEvent, Key, Modifiers};
pub use store::{MemoryStore, Record, RecordKey, Snapshot, Store, StoreError};
pub use sync::{GraphMutation, MindMapEngine, UiIntent};
pub use tools::{Canvas, CanvasInteraction, InteractionState};
