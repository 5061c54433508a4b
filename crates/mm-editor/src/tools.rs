//! Canvas interaction state machine.
//!
//! `CanvasInteraction` turns `InputEvent`s into `GraphMutation`s. A press
//! stays `Pressed` until the pointer travels past the drag threshold (in
//! screen pixels); what it becomes then depends on what was under the
//! press and which modifiers were held:
//!
//! | press target     | modifier | drag becomes   |
//! |------------------|----------|----------------|
//! | resize handle    | any      | `ResizingNode` |
//! | word of a node   | shift    | `Linking`      |
//! | node             | shift    | `Linking`      |
//! | node             | none     | `DraggingNode` |
//! | empty canvas     | alt      | `Panning`      |
//! | empty canvas     | none     | `Selecting`    |
//!
//! Camera changes (pan, zoom) apply to the `Viewport` directly and never
//! produce mutations.

use crate::hit::{Corner, hit_resize_handle, hit_test, hit_test_except, hit_test_rect, hit_word};
use crate::input::{InputEvent, Key, Modifiers};
use crate::store::{MemoryStore, Store};
use crate::sync::{GraphMutation, MindMapEngine, UiIntent};
use kurbo::{Point, Rect, Size, Vec2};
use mm_core::model::clamp_size;
use mm_core::{Connection, LayoutConfig, MindMap, Node, NodeId, TextRange, Viewport};
use smallvec::SmallVec;

/// What a press landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressTarget {
    Empty,
    Node(NodeId),
    Word(NodeId, TextRange),
    Handle(NodeId, Corner),
}

#[derive(Debug, Clone, PartialEq)]
pub enum InteractionState {
    Idle,
    /// Pointer is down but has not yet moved past the drag threshold.
    Pressed {
        screen: Point,
        world: Point,
        target: PressTarget,
        modifiers: Modifiers,
    },
    /// Rubber-band selection from `origin` (world).
    Selecting { origin: Point, current: Point },
    Panning { last: Point },
    DraggingNode {
        id: NodeId,
        /// Node center when the drag started.
        origin: Point,
        /// Last pointer position, world space.
        last: Point,
    },
    Linking {
        source: NodeId,
        anchors: SmallVec<[TextRange; 2]>,
        /// Floating endpoint, world space.
        pointer: Point,
    },
    ResizingNode { id: NodeId, fixed: Point },
}

pub struct CanvasInteraction {
    pub state: InteractionState,
    /// Selected nodes in selection order.
    pub selection: Vec<NodeId>,
}

impl Default for CanvasInteraction {
    fn default() -> Self {
        Self::new()
    }
}

impl CanvasInteraction {
    pub fn new() -> Self {
        Self {
            state: InteractionState::Idle,
            selection: Vec::new(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == InteractionState::Idle
    }

    /// Live marquee rectangle (normalized, world space) while selecting.
    pub fn marquee(&self) -> Option<Rect> {
        match self.state {
            InteractionState::Selecting { origin, current } => {
                Some(Rect::from_points(origin, current))
            }
            _ => None,
        }
    }

    /// Source and floating endpoint of an in-progress link.
    pub fn pending_link(&self) -> Option<(NodeId, Point)> {
        match &self.state {
            InteractionState::Linking {
                source, pointer, ..
            } => Some((*source, *pointer)),
            _ => None,
        }
    }

    /// Escape: abandon linking or selecting and clear the selection.
    /// Committed drag and resize steps stay where they are.
    pub fn cancel(&mut self) {
        if !self.is_idle() {
            log::debug!("cancelling {:?}", self.state);
        }
        self.state = InteractionState::Idle;
        self.selection.clear();
    }

    /// Feed one event. Camera events update `viewport` in place.
    pub fn handle(
        &mut self,
        event: &InputEvent,
        map: &MindMap,
        viewport: &mut Viewport,
        config: &LayoutConfig,
    ) -> Vec<GraphMutation> {
        match event {
            InputEvent::PointerDown { x, y, modifiers } => {
                self.pointer_down(Point::new(*x, *y), *modifiers, map, viewport);
                vec![]
            }
            InputEvent::PointerMove { x, y, .. } => {
                self.pointer_move(Point::new(*x, *y), map, viewport, config)
            }
            InputEvent::PointerUp { x, y, .. } => {
                self.pointer_up(Point::new(*x, *y), map, viewport)
            }
            InputEvent::Tap { x, y, count } => {
                let world = viewport.screen_to_world(Point::new(*x, *y));
                if *count >= 2 && hit_test(map, world).is_none() {
                    let node = Node::new(NodeId::generate(), world);
                    self.selection = vec![node.id];
                    return vec![GraphMutation::AddNode {
                        node: Box::new(node),
                        edit_text: true,
                    }];
                }
                vec![]
            }
            InputEvent::Scroll { dx, dy } => {
                viewport.pan_by(Vec2::new(*dx, *dy));
                vec![]
            }
            InputEvent::TrackpadPan { dx, dy } => {
                viewport.pan_xy(*dx, *dy);
                vec![]
            }
            InputEvent::Magnify { factor, x, y } => {
                viewport.process_zoom(*factor, Point::new(*x, *y), config);
                vec![]
            }
            InputEvent::Key { key, .. } => self.key(*key, map),
        }
    }

    fn pointer_down(
        &mut self,
        screen: Point,
        modifiers: Modifiers,
        map: &MindMap,
        viewport: &Viewport,
    ) {
        let world = viewport.screen_to_world(screen);
        let target = if let Some((id, corner)) = hit_resize_handle(map, world, viewport.zoom) {
            PressTarget::Handle(id, corner)
        } else if let Some(id) = hit_test(map, world) {
            let word = if modifiers.shift {
                map.node(id).and_then(|n| hit_word(n, world))
            } else {
                None
            };
            match word {
                Some(range) => PressTarget::Word(id, range),
                None => PressTarget::Node(id),
            }
        } else {
            PressTarget::Empty
        };
        self.state = InteractionState::Pressed {
            screen,
            world,
            target,
            modifiers,
        };
    }

    fn pointer_move(
        &mut self,
        screen: Point,
        map: &MindMap,
        viewport: &mut Viewport,
        config: &LayoutConfig,
    ) -> Vec<GraphMutation> {
        let world = viewport.screen_to_world(screen);
        match self.state.clone() {
            InteractionState::Idle => vec![],
            InteractionState::Pressed {
                screen: start,
                world: start_world,
                target,
                modifiers,
            } => {
                if (screen - start).hypot() < config.drag_threshold {
                    return vec![];
                }
                self.begin_drag(target, modifiers, start, start_world, map);
                log::trace!("drag began as {:?}", self.state);
                self.pointer_move(screen, map, viewport, config)
            }
            InteractionState::Selecting { origin, .. } => {
                self.state = InteractionState::Selecting {
                    origin,
                    current: world,
                };
                self.selection = hit_test_rect(map, Rect::from_points(origin, world));
                vec![]
            }
            InteractionState::Panning { last } => {
                viewport.pan_by(screen - last);
                self.state = InteractionState::Panning { last: screen };
                vec![]
            }
            InteractionState::DraggingNode { id, origin, last } => {
                let delta = world - last;
                self.state = InteractionState::DraggingNode {
                    id,
                    origin,
                    last: world,
                };
                vec![GraphMutation::MoveNode {
                    id,
                    dx: delta.x,
                    dy: delta.y,
                }]
            }
            InteractionState::Linking {
                source, anchors, ..
            } => {
                self.state = InteractionState::Linking {
                    source,
                    anchors,
                    pointer: world,
                };
                vec![]
            }
            InteractionState::ResizingNode { id, fixed } => vec![resize_from(id, fixed, world)],
        }
    }

    fn begin_drag(
        &mut self,
        target: PressTarget,
        modifiers: Modifiers,
        start: Point,
        start_world: Point,
        map: &MindMap,
    ) {
        self.state = match target {
            PressTarget::Handle(id, corner) => match map.node(id) {
                Some(node) => InteractionState::ResizingNode {
                    id,
                    fixed: corner.opposite().of(node.rect()),
                },
                None => InteractionState::Idle,
            },
            PressTarget::Word(source, range) => InteractionState::Linking {
                source,
                anchors: SmallVec::from_slice(&[range]),
                pointer: start_world,
            },
            PressTarget::Node(source) if modifiers.shift => InteractionState::Linking {
                source,
                anchors: SmallVec::new(),
                pointer: start_world,
            },
            PressTarget::Node(id) => match map.node(id) {
                Some(node) => {
                    if !self.selection.contains(&id) {
                        self.selection = vec![id];
                    }
                    InteractionState::DraggingNode {
                        id,
                        origin: node.center,
                        last: start_world,
                    }
                }
                None => InteractionState::Idle,
            },
            PressTarget::Empty if modifiers.alt => InteractionState::Panning { last: start },
            PressTarget::Empty => {
                self.selection.clear();
                InteractionState::Selecting {
                    origin: start_world,
                    current: start_world,
                }
            }
        };
    }

    fn pointer_up(
        &mut self,
        screen: Point,
        map: &MindMap,
        viewport: &Viewport,
    ) -> Vec<GraphMutation> {
        let world = viewport.screen_to_world(screen);
        let state = std::mem::replace(&mut self.state, InteractionState::Idle);
        match state {
            InteractionState::Pressed { target, .. } => {
                // A tap: select what was under it.
                self.selection = match target {
                    PressTarget::Empty => vec![],
                    PressTarget::Node(id)
                    | PressTarget::Word(id, _)
                    | PressTarget::Handle(id, _) => vec![id],
                };
                vec![]
            }
            InteractionState::DraggingNode { id, origin, .. } => {
                vec![GraphMutation::FinishDrag { id, origin }]
            }
            InteractionState::Linking {
                source, anchors, ..
            } => match hit_test_except(map, world, source) {
                Some(target) => vec![GraphMutation::AddConnection {
                    connection: Connection::new(source, target).with_anchors(anchors),
                }],
                None => {
                    log::debug!("link from {source} released over nothing; discarded");
                    vec![]
                }
            },
            InteractionState::Idle
            | InteractionState::Selecting { .. }
            | InteractionState::Panning { .. }
            | InteractionState::ResizingNode { .. } => vec![],
        }
    }

    fn key(&mut self, key: Key, map: &MindMap) -> Vec<GraphMutation> {
        match key {
            Key::Escape => {
                self.cancel();
                vec![]
            }
            Key::Enter | Key::Tab => {
                let [selected] = self.selection[..] else {
                    return vec![];
                };
                if !map.contains(selected) {
                    return vec![];
                }
                let node = Box::new(Node::new(NodeId::generate(), Point::ZERO));
                self.selection = vec![node.id];
                if key == Key::Enter {
                    vec![GraphMutation::AddSibling { of: selected, node }]
                } else {
                    vec![GraphMutation::AddChild {
                        parent: selected,
                        node,
                    }]
                }
            }
            Key::Delete | Key::Backspace if self.is_idle() => std::mem::take(&mut self.selection)
                .into_iter()
                .map(|id| GraphMutation::RemoveNode { id })
                .collect(),
            Key::Delete | Key::Backspace | Key::Char(_) => vec![],
        }
    }
}

/// Resize keeping `fixed` in place; the size never drops below the
/// minimums, growing away from the fixed corner instead.
fn resize_from(id: NodeId, fixed: Point, pointer: Point) -> GraphMutation {
    let raw = pointer - fixed;
    let size = clamp_size(Size::new(raw.x.abs(), raw.y.abs()));
    let sx = if raw.x < 0.0 { -1.0 } else { 1.0 };
    let sy = if raw.y < 0.0 { -1.0 } else { 1.0 };
    let center = fixed + Vec2::new(sx * size.width / 2.0, sy * size.height / 2.0);
    GraphMutation::ResizeNode {
        id,
        width: size.width,
        height: size.height,
        center,
    }
}

// ─── Canvas ──────────────────────────────────────────────────────────────

/// Engine, interaction state, and camera wired together.
pub struct Canvas<S: Store = MemoryStore> {
    pub engine: MindMapEngine<S>,
    pub interaction: CanvasInteraction,
    pub viewport: Viewport,
}

impl<S: Store> Canvas<S> {
    pub fn new(engine: MindMapEngine<S>) -> Self {
        Self {
            engine,
            interaction: CanvasInteraction::new(),
            viewport: Viewport::default(),
        }
    }

    /// Dispatch one event and apply what it produced. Returns how many
    /// mutations were applied.
    pub fn handle_event(&mut self, event: &InputEvent) -> usize {
        let mutations = self.interaction.handle(
            event,
            &self.engine.map,
            &mut self.viewport,
            &self.engine.config,
        );
        let mut applied = 0;
        for mutation in mutations {
            if self.engine.apply_mutation(mutation) {
                applied += 1;
            }
        }
        let map = &self.engine.map;
        self.interaction.selection.retain(|id| map.contains(*id));
        applied
    }

    /// Center the whole map on a screen of `screen` size at the current zoom.
    pub fn fit_to_content(&mut self, screen: Size) {
        let content = self
            .engine
            .map
            .nodes()
            .map(Node::rect)
            .reduce(|a, b| a.union(b));
        if let Some(content) = content {
            self.viewport.fit_content(content, screen);
        }
    }

    pub fn take_intents(&mut self) -> Vec<UiIntent> {
        self.engine.take_intents()
    }
}
