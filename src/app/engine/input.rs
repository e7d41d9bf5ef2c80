use eframe::egui::{Pos2, Vec2};

use super::GraphEngine;
use super::camera::{SMOOTHING, TOUCH_VELOCITY_SMOOTHING, smooth};
use super::EngineEvent;

/// Squared pixel distance a pointer may travel before a press stops being a
/// click and becomes a drag.
const DRAG_THRESHOLD_SQ: f32 = 25.0;
const WHEEL_ZOOM_BASE: f32 = 1.5;
const WHEEL_NOTCH: f32 = 120.0;
const MIN_PINCH_DISTANCE: f32 = 1.0;

/// Engine-owned input vocabulary. The shell translates raw host events into
/// these; pointer events are mouse-only, touch contacts arrive separately.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    PointerDown { position: Pos2 },
    PointerMove { position: Pos2 },
    PointerUp { position: Pos2 },
    TouchStart { id: u64, position: Pos2 },
    TouchMove { id: u64, position: Pos2 },
    TouchEnd { id: u64 },
    Wheel { delta: f32, position: Pos2 },
}

pub(super) enum Gesture {
    Idle,
    DragCandidate {
        id: String,
        start: Pos2,
        touch: Option<u64>,
    },
    Dragging {
        id: String,
        touch: Option<u64>,
    },
    Panning {
        last: Pos2,
        velocity: Vec2,
        touch: Option<u64>,
    },
    Pinching {
        first: (u64, Pos2),
        second: (u64, Pos2),
        start_distance: f32,
        start_centroid: Pos2,
        start_target_scale: f32,
        start_pan: Vec2,
    },
}

pub(super) struct Interaction {
    pub(super) gesture: Gesture,
    pub(super) pointer: Option<Pos2>,
    pub(super) touch_seen: bool,
}

impl Interaction {
    pub(super) fn new() -> Self {
        Self {
            gesture: Gesture::Idle,
            pointer: None,
            touch_seen: false,
        }
    }
}

impl GraphEngine {
    pub(super) fn handle_input(&mut self, events: &[InputEvent]) {
        for event in events {
            match *event {
                InputEvent::PointerDown { position } => self.press(position, None),
                InputEvent::PointerMove { position } => self.movement(position, None),
                InputEvent::PointerUp { position } => self.release_pointer(position),
                InputEvent::TouchStart { id, position } => self.touch_start(id, position),
                InputEvent::TouchMove { id, position } => self.movement(position, Some(id)),
                InputEvent::TouchEnd { id } => self.touch_end(id),
                InputEvent::Wheel { delta, position } => self.wheel(delta, position),
            }
        }
    }

    fn press(&mut self, position: Pos2, touch: Option<u64>) {
        self.wake();
        if touch.is_none() {
            self.interaction.pointer = Some(position);
        }

        self.interaction.gesture = match self.node_at(position) {
            Some(id) => Gesture::DragCandidate {
                id,
                start: position,
                touch,
            },
            None => Gesture::Panning {
                last: position,
                velocity: Vec2::ZERO,
                touch,
            },
        };
    }

    fn movement(&mut self, position: Pos2, touch: Option<u64>) {
        if touch.is_none() {
            self.interaction.pointer = Some(position);
        }

        let gesture = std::mem::replace(&mut self.interaction.gesture, Gesture::Idle);
        self.interaction.gesture = match gesture {
            Gesture::Idle => {
                if touch.is_none() {
                    self.update_hover(position);
                }
                Gesture::Idle
            }
            Gesture::DragCandidate { id, start, touch: owner } if owner == touch => {
                if (position - start).length_sq() > DRAG_THRESHOLD_SQ {
                    // Committing to a drag cancels click semantics.
                    self.pin_at(&id, position);
                    self.highlight = Some(id.clone());
                    self.wake();
                    Gesture::Dragging { id, touch: owner }
                } else {
                    Gesture::DragCandidate { id, start, touch: owner }
                }
            }
            Gesture::Dragging { id, touch: owner } if owner == touch => {
                self.pin_at(&id, position);
                self.wake();
                Gesture::Dragging { id, touch: owner }
            }
            Gesture::Panning {
                last,
                velocity,
                touch: owner,
            } if owner == touch => {
                let delta = position - last;
                self.camera.pan += delta;
                let factor = if owner.is_some() {
                    TOUCH_VELOCITY_SMOOTHING
                } else {
                    SMOOTHING
                };
                let velocity = Vec2::new(
                    smooth(velocity.x, delta.x, factor),
                    smooth(velocity.y, delta.y, factor),
                );
                self.wake();
                Gesture::Panning {
                    last: position,
                    velocity,
                    touch: owner,
                }
            }
            Gesture::Pinching {
                mut first,
                mut second,
                start_distance,
                start_centroid,
                start_target_scale,
                start_pan,
            } => {
                let tracked = touch == Some(first.0) || touch == Some(second.0);
                if tracked {
                    if touch == Some(first.0) {
                        first.1 = position;
                    } else {
                        second.1 = position;
                    }

                    let distance = (first.1 - second.1).length().max(MIN_PINCH_DISTANCE);
                    let centroid = first.1 + (second.1 - first.1) * 0.5;
                    self.camera
                        .set_target_scale(start_target_scale * (distance / start_distance));
                    self.camera.zoom_center = centroid;
                    self.camera.pan = start_pan + (centroid - start_centroid);
                    self.wake();
                }
                Gesture::Pinching {
                    first,
                    second,
                    start_distance,
                    start_centroid,
                    start_target_scale,
                    start_pan,
                }
            }
            other => other,
        };
    }

    fn release_pointer(&mut self, position: Pos2) {
        self.interaction.pointer = Some(position);
        let gesture = std::mem::replace(&mut self.interaction.gesture, Gesture::Idle);
        self.interaction.gesture = match gesture {
            Gesture::DragCandidate { id, touch: None, .. } => {
                self.finish_click(&id);
                Gesture::Idle
            }
            Gesture::Dragging { id, touch: None } => {
                self.unpin(&id);
                self.wake();
                Gesture::Idle
            }
            Gesture::Panning {
                velocity,
                touch: None,
                ..
            } => {
                self.camera.pan_velocity = velocity;
                self.wake();
                Gesture::Idle
            }
            other => other,
        };
    }

    fn touch_start(&mut self, id: u64, position: Pos2) {
        self.interaction.touch_seen = true;
        self.wake();

        let gesture = std::mem::replace(&mut self.interaction.gesture, Gesture::Idle);
        self.interaction.gesture = match gesture {
            Gesture::Idle => {
                self.press(position, Some(id));
                std::mem::replace(&mut self.interaction.gesture, Gesture::Idle)
            }
            Gesture::DragCandidate {
                start,
                touch: Some(owner),
                ..
            } if owner != id => self.make_pinch((owner, start), (id, position)),
            Gesture::Dragging {
                id: node_id,
                touch: Some(owner),
            } if owner != id => {
                self.unpin(&node_id);
                let anchor = self
                    .nodes
                    .get(&node_id)
                    .and_then(|node| node.screen.as_ref())
                    .map(|screen| screen.position)
                    .unwrap_or(position);
                self.make_pinch((owner, anchor), (id, position))
            }
            Gesture::Panning {
                last,
                touch: Some(owner),
                ..
            } if owner != id => self.make_pinch((owner, last), (id, position)),
            // Two tracked touches win; extra contacts wait for a free slot.
            other => other,
        };
    }

    fn touch_end(&mut self, id: u64) {
        self.wake();
        let gesture = std::mem::replace(&mut self.interaction.gesture, Gesture::Idle);
        self.interaction.gesture = match gesture {
            Gesture::DragCandidate {
                id: node_id,
                touch: Some(owner),
                ..
            } if owner == id => {
                self.finish_click(&node_id);
                Gesture::Idle
            }
            Gesture::Dragging {
                id: node_id,
                touch: Some(owner),
            } if owner == id => {
                self.unpin(&node_id);
                Gesture::Idle
            }
            Gesture::Panning {
                velocity,
                touch: Some(owner),
                ..
            } if owner == id => {
                self.camera.pan_velocity = velocity;
                Gesture::Idle
            }
            Gesture::Pinching { first, second, .. } if first.0 == id || second.0 == id => {
                // The surviving contact keeps panning; the gesture does not
                // restart.
                let survivor = if first.0 == id { second } else { first };
                Gesture::Panning {
                    last: survivor.1,
                    velocity: Vec2::ZERO,
                    touch: Some(survivor.0),
                }
            }
            other => other,
        };
    }

    fn wheel(&mut self, delta: f32, position: Pos2) {
        let factor = WHEEL_ZOOM_BASE.powf(-delta / WHEEL_NOTCH);
        let center = if factor > 1.0 {
            position
        } else {
            self.canvas_rect.center()
        };
        self.camera.zoom_by(factor, center);
        self.wake();
    }

    fn make_pinch(&mut self, first: (u64, Pos2), second: (u64, Pos2)) -> Gesture {
        Gesture::Pinching {
            start_distance: (first.1 - second.1).length().max(MIN_PINCH_DISTANCE),
            start_centroid: first.1 + (second.1 - first.1) * 0.5,
            start_target_scale: self.camera.target_scale(),
            start_pan: self.camera.pan,
            first,
            second,
        }
    }

    fn pin_at(&mut self, id: &str, position: Pos2) {
        let world = self.camera.screen_to_world(self.canvas_rect, position);
        if let Some(node) = self.nodes.get_mut(id) {
            node.pinned = Some(world);
            node.position = Some(world);
        }
        self.solver.pin_node(id, Some(world));
    }

    fn unpin(&mut self, id: &str) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.pinned = None;
        }
        self.solver.pin_node(id, None);
    }

    fn finish_click(&mut self, id: &str) {
        // The pin is released on pointer-up whether or not a drag happened.
        self.unpin(id);
        if let Some(node) = self.nodes.get(id) {
            self.events.push(EngineEvent::NodeClicked {
                id: id.to_owned(),
                kind: node.kind,
            });
        }
        self.wake();
    }

    fn update_hover(&mut self, position: Pos2) {
        let hit = self.node_at(position);
        if hit == self.highlight {
            return;
        }

        match &hit {
            Some(id) => {
                if let Some(node) = self.nodes.get(id) {
                    self.events.push(EngineEvent::NodeHovered {
                        id: id.clone(),
                        kind: node.kind,
                    });
                }
            }
            None => self.events.push(EngineEvent::HoverCleared),
        }
        self.highlight = hit;
        self.wake();
    }

    /// The simulation can move a node out from under a stationary pointer;
    /// the highlight is re-checked against the last pointer position every
    /// frame.
    pub(super) fn revalidate_hover(&mut self) {
        if !matches!(self.interaction.gesture, Gesture::Idle) {
            return;
        }
        let (Some(highlight), Some(pointer)) = (&self.highlight, self.interaction.pointer) else {
            return;
        };

        let still_under = self
            .nodes
            .get(highlight)
            .and_then(|node| node.screen.as_ref())
            .is_some_and(|screen| (screen.position - pointer).length() <= screen.hit_radius);

        if !still_under {
            self.highlight = None;
            self.events.push(EngineEvent::HoverCleared);
            self.wake();
        }
    }

    fn node_at(&self, position: Pos2) -> Option<String> {
        self.nodes
            .values()
            .filter_map(|node| {
                let screen = node.screen.as_ref()?;
                node.position?;
                let distance = (screen.position - position).length();
                (distance <= screen.hit_radius).then(|| (distance, node.id.clone()))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, id)| id)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::mpsc::Receiver;

    use eframe::egui::{Rect, pos2, vec2};

    use super::super::camera::{SCALE_MAX, SCALE_MIN};
    use super::*;
    use crate::graph_data::{NodeKind, NodeSpec};
    use crate::solver::SolverCommand;

    fn canvas() -> Rect {
        Rect::from_min_size(pos2(0.0, 0.0), vec2(800.0, 600.0))
    }

    fn engine_with_node() -> (GraphEngine, Receiver<SolverCommand>) {
        let (mut engine, commands, _snapshots) = GraphEngine::for_test();
        let specs = HashMap::from([(
            "a.md".to_string(),
            NodeSpec {
                kind: NodeKind::Normal,
                links: HashMap::new(),
                display_text: None,
                color: None,
            },
        )]);
        engine.set_graph(&specs, None);
        engine.set_node_position("a.md", 0.0, 0.0);
        engine.advance(canvas(), &[]);
        while commands.try_recv().is_ok() {}
        (engine, commands)
    }

    fn pins(commands: &Receiver<SolverCommand>) -> Vec<Option<(f32, f32)>> {
        commands
            .try_iter()
            .filter_map(|command| match command {
                SolverCommand::Pin { position, .. } => {
                    Some(position.map(|world| (world.x, world.y)))
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn short_press_is_a_click_and_releases_the_pin() {
        let (mut engine, commands) = engine_with_node();
        let center = canvas().center();

        engine.handle_input(&[
            InputEvent::PointerDown { position: center },
            InputEvent::PointerMove {
                position: center + vec2(2.0, 1.0),
            },
            InputEvent::PointerUp {
                position: center + vec2(2.0, 1.0),
            },
        ]);

        let events = engine.take_events();
        assert!(events.iter().any(|event| matches!(
            event,
            EngineEvent::NodeClicked { id, .. } if id == "a.md"
        )));
        assert_eq!(pins(&commands), vec![None]);
    }

    #[test]
    fn long_press_drags_pins_then_releases() {
        let (mut engine, commands) = engine_with_node();
        let center = canvas().center();

        engine.handle_input(&[
            InputEvent::PointerDown { position: center },
            InputEvent::PointerMove {
                position: center + vec2(100.0, 200.0),
            },
            InputEvent::PointerUp {
                position: center + vec2(100.0, 200.0),
            },
        ]);

        let events = engine.take_events();
        assert!(!events
            .iter()
            .any(|event| matches!(event, EngineEvent::NodeClicked { .. })));
        // Dragging node a to world (100, 200) then releasing.
        assert_eq!(pins(&commands), vec![Some((100.0, 200.0)), None]);
    }

    #[test]
    fn background_pan_hands_velocity_to_inertia() {
        let (mut engine, _commands) = engine_with_node();

        engine.handle_input(&[
            InputEvent::PointerDown {
                position: pos2(50.0, 50.0),
            },
            InputEvent::PointerMove {
                position: pos2(60.0, 50.0),
            },
            InputEvent::PointerMove {
                position: pos2(72.0, 50.0),
            },
            InputEvent::PointerUp {
                position: pos2(72.0, 50.0),
            },
        ]);

        assert_eq!(engine.camera.pan, vec2(22.0, 0.0));
        assert!(engine.camera.pan_velocity.x > 0.0);
    }

    #[test]
    fn pinch_distance_doubling_doubles_target_scale_at_the_centroid() {
        let (mut engine, _commands) = engine_with_node();

        engine.handle_input(&[
            InputEvent::TouchStart {
                id: 1,
                position: pos2(300.0, 300.0),
            },
            InputEvent::TouchStart {
                id: 2,
                position: pos2(500.0, 300.0),
            },
            InputEvent::TouchMove {
                id: 1,
                position: pos2(200.0, 300.0),
            },
            InputEvent::TouchMove {
                id: 2,
                position: pos2(600.0, 300.0),
            },
        ]);

        assert!((engine.camera.target_scale() - 2.0).abs() < 1e-5);
        assert_eq!(engine.camera.zoom_center, pos2(400.0, 300.0));
        assert_eq!(engine.camera.pan, Vec2::ZERO);
    }

    #[test]
    fn losing_one_pinch_touch_demotes_to_pan_with_the_survivor() {
        let (mut engine, _commands) = engine_with_node();

        engine.handle_input(&[
            InputEvent::TouchStart {
                id: 1,
                position: pos2(300.0, 300.0),
            },
            InputEvent::TouchStart {
                id: 2,
                position: pos2(500.0, 300.0),
            },
            InputEvent::TouchEnd { id: 1 },
        ]);
        let pan_before = engine.camera.pan;

        engine.handle_input(&[InputEvent::TouchMove {
            id: 2,
            position: pos2(510.0, 310.0),
        }]);

        assert_eq!(engine.camera.pan - pan_before, vec2(10.0, 10.0));
        assert!(matches!(
            engine.interaction.gesture,
            Gesture::Panning { touch: Some(2), .. }
        ));
    }

    #[test]
    fn a_third_touch_is_ignored_mid_pinch() {
        let (mut engine, _commands) = engine_with_node();

        engine.handle_input(&[
            InputEvent::TouchStart {
                id: 1,
                position: pos2(300.0, 300.0),
            },
            InputEvent::TouchStart {
                id: 2,
                position: pos2(500.0, 300.0),
            },
            InputEvent::TouchStart {
                id: 3,
                position: pos2(400.0, 100.0),
            },
            InputEvent::TouchMove {
                id: 3,
                position: pos2(400.0, 50.0),
            },
        ]);

        assert!(matches!(
            engine.interaction.gesture,
            Gesture::Pinching { first: (1, _), second: (2, _), .. }
        ));
        // The untracked contact moved; nothing changed.
        assert_eq!(engine.camera.target_scale(), 1.0);
    }

    #[test]
    fn wheel_zoom_stays_clamped() {
        let (mut engine, _commands) = engine_with_node();

        for _ in 0..100 {
            engine.handle_input(&[InputEvent::Wheel {
                delta: -120.0,
                position: pos2(100.0, 100.0),
            }]);
        }
        assert_eq!(engine.camera.target_scale(), SCALE_MAX);

        for _ in 0..200 {
            engine.handle_input(&[InputEvent::Wheel {
                delta: 120.0,
                position: pos2(100.0, 100.0),
            }]);
        }
        assert_eq!(engine.camera.target_scale(), SCALE_MIN);
    }

    #[test]
    fn mouse_hover_sets_and_clears_the_highlight() {
        let (mut engine, _commands) = engine_with_node();
        let center = canvas().center();

        engine.handle_input(&[InputEvent::PointerMove { position: center }]);
        assert_eq!(engine.highlight.as_deref(), Some("a.md"));
        assert!(engine.take_events().iter().any(|event| matches!(
            event,
            EngineEvent::NodeHovered { id, .. } if id == "a.md"
        )));

        // The node drifts out from under the stationary pointer.
        engine.set_node_position("a.md", 4000.0, 0.0);
        engine.advance(canvas(), &[]);

        assert_eq!(engine.highlight, None);
        assert!(engine
            .take_events()
            .iter()
            .any(|event| matches!(event, EngineEvent::HoverCleared)));
    }

    #[test]
    fn touch_never_hovers() {
        let (mut engine, _commands) = engine_with_node();
        let center = canvas().center();

        engine.handle_input(&[
            InputEvent::TouchStart {
                id: 7,
                position: pos2(10.0, 10.0),
            },
            InputEvent::TouchEnd { id: 7 },
            InputEvent::TouchStart {
                id: 8,
                position: center,
            },
        ]);

        assert_eq!(engine.highlight, None);
        assert!(!engine
            .take_events()
            .iter()
            .any(|event| matches!(event, EngineEvent::NodeHovered { .. })));
    }
}
