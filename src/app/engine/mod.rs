pub mod camera;
mod input;
mod link;
mod lod;
mod node;

pub use input::InputEvent;

use std::collections::HashMap;

use eframe::egui::{Color32, Painter, Pos2, Rect, Vec2, vec2};
use log::debug;

use crate::graph_data::{NodeKind, NodeSpec};
use crate::solver::{ForceParams, REBUILD_ALPHA, SeedNode, SolverLink};
use crate::util::stable_pair;

use camera::Camera;
use input::Interaction;
use link::{LinkKey, VisualLink};
use node::VisualNode;

/// Consecutive static frames after which repaint requests stop until the
/// next mutating event.
const IDLE_FRAME_LIMIT: u32 = 60;
const PLACEMENT_JITTER: f32 = 30.0;
const RING_MARGIN: f32 = 100.0;
const FALLBACK_RING_RADIUS: f32 = 200.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderOptions {
    pub node_size_multiplier: f32,
    pub line_size_multiplier: f32,
    pub show_arrow: bool,
    pub text_fade_multiplier: f32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            node_size_multiplier: 1.0,
            line_size_multiplier: 1.0,
            show_arrow: false,
            text_fade_multiplier: 1.0,
        }
    }
}

/// Colors are supplied by the host; the engine never hardcodes theme values
/// outside this struct's defaults.
#[derive(Clone, Copy, Debug)]
pub struct Palette {
    pub normal: Color32,
    pub focused: Color32,
    pub tag: Color32,
    pub unresolved: Color32,
    pub attachment: Color32,
    pub link: Color32,
    pub link_highlight: Color32,
    pub highlight_ring: Color32,
    pub label: Color32,
    pub background: Color32,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            normal: Color32::from_rgb(136, 146, 160),
            focused: Color32::from_rgb(146, 116, 240),
            tag: Color32::from_rgb(86, 170, 130),
            unresolved: Color32::from_rgb(92, 98, 110),
            attachment: Color32::from_rgb(196, 150, 92),
            link: Color32::from_rgb(72, 72, 72),
            link_highlight: Color32::from_rgb(241, 146, 94),
            highlight_ring: Color32::from_rgb(245, 206, 93),
            label: Color32::from_gray(238),
            background: Color32::from_rgb(19, 23, 29),
        }
    }
}

impl Palette {
    pub fn node_color(&self, kind: NodeKind) -> Color32 {
        match kind {
            NodeKind::Normal => self.normal,
            NodeKind::Focused => self.focused,
            NodeKind::Tag => self.tag,
            NodeKind::Unresolved => self.unresolved,
            NodeKind::Attachment => self.attachment,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    NodeClicked { id: String, kind: NodeKind },
    NodeHovered { id: String, kind: NodeKind },
    HoverCleared,
}

pub struct GraphEngine {
    nodes: HashMap<String, VisualNode>,
    links: HashMap<LinkKey, VisualLink>,
    camera: Camera,
    options: RenderOptions,
    palette: Palette,
    forces: ForceParams,
    solver: SolverLink,
    interaction: Interaction,
    highlight: Option<String>,
    events: Vec<EngineEvent>,
    idle_frames: u32,
    canvas_rect: Rect,
}

impl GraphEngine {
    pub fn new(solver: SolverLink, palette: Palette) -> Self {
        Self {
            nodes: HashMap::new(),
            links: HashMap::new(),
            camera: Camera::new(),
            options: RenderOptions::default(),
            palette,
            forces: ForceParams::default(),
            solver,
            interaction: Interaction::new(),
            highlight: None,
            events: Vec::new(),
            idle_frames: 0,
            canvas_rect: Rect::NOTHING,
        }
    }

    #[cfg(test)]
    pub(crate) fn for_test() -> (
        Self,
        std::sync::mpsc::Receiver<crate::solver::SolverCommand>,
        std::sync::mpsc::Sender<crate::solver::PositionSnapshot>,
    ) {
        let (solver, commands, snapshots) = SolverLink::loopback();
        (Self::new(solver, Palette::default()), commands, snapshots)
    }

    /// Full-replacement graph update. Diffs against the current node/link
    /// set, places newly added nodes, recomputes weights, and reseeds the
    /// solver.
    pub fn set_graph(
        &mut self,
        specs: &HashMap<String, NodeSpec>,
        weights: Option<&HashMap<String, f32>>,
    ) {
        let stale = self
            .nodes
            .keys()
            .filter(|id| !specs.contains_key(*id))
            .cloned()
            .collect::<Vec<_>>();
        for id in &stale {
            if let Some(mut node) = self.nodes.remove(id) {
                node.release();
            }
        }

        for (id, spec) in specs {
            let node = self
                .nodes
                .entry(id.clone())
                .or_insert_with(|| VisualNode::new(id.clone()));
            node.kind = spec.kind;
            node.display_text = spec.display_text.clone();
            node.color = spec.color;
        }

        self.rebuild_links(specs);

        for (id, node) in &mut self.nodes {
            let degree = (node.forward.len() + node.reverse.len()) as f32;
            node.weight = weights
                .and_then(|weights| weights.get(id))
                .copied()
                .unwrap_or(degree);
        }

        self.place_new_nodes();

        if let Some(highlight) = &self.highlight
            && !self.nodes.contains_key(highlight)
        {
            self.highlight = None;
            self.events.push(EngineEvent::HoverCleared);
        }

        debug!(
            "graph updated: {} nodes, {} links, {} removed",
            self.nodes.len(),
            self.links.len(),
            stale.len()
        );

        self.push_graph_to_solver();
        self.wake();
    }

    fn rebuild_links(&mut self, specs: &HashMap<String, NodeSpec>) {
        self.links.clear();
        for node in self.nodes.values_mut() {
            node.forward.clear();
            node.reverse.clear();
        }

        let mut keys = Vec::new();
        for (source, spec) in specs {
            for target in spec.links.keys() {
                // A neighbor id missing from the node set produces no link.
                if source != target && self.nodes.contains_key(target) {
                    keys.push(LinkKey {
                        source: source.clone(),
                        target: target.clone(),
                    });
                }
            }
        }

        for key in keys {
            if let Some(node) = self.nodes.get_mut(&key.source) {
                node.forward.insert(key.target.clone(), key.clone());
            }
            if let Some(node) = self.nodes.get_mut(&key.target) {
                node.reverse.insert(key.source.clone(), key.clone());
            }
            self.links.insert(
                key.clone(),
                VisualLink {
                    source: key.source,
                    target: key.target,
                },
            );
        }
    }

    /// New nodes land near the centroid of their already-positioned
    /// neighbors with a deterministic jitter, or on a ring just outside the
    /// current bounding radius when nothing adjacent is placed yet.
    fn place_new_nodes(&mut self) {
        let positioned = self
            .nodes
            .iter()
            .filter_map(|(id, node)| node.position.map(|position| (id.clone(), position)))
            .collect::<HashMap<_, _>>();

        let bounding_radius = positioned
            .values()
            .map(|position| position.length())
            .fold(0.0_f32, f32::max);
        let ring_radius = if positioned.is_empty() {
            FALLBACK_RING_RADIUS
        } else {
            bounding_radius + RING_MARGIN
        };

        let mut placements = Vec::new();
        for (id, node) in &self.nodes {
            if node.position.is_some() {
                continue;
            }

            let neighbors = node
                .forward
                .keys()
                .chain(node.reverse.keys())
                .filter_map(|neighbor| positioned.get(neighbor))
                .copied()
                .collect::<Vec<_>>();

            let (jitter_x, jitter_y) = stable_pair(id);
            let position = if neighbors.is_empty() {
                let angle = jitter_y.atan2(jitter_x);
                vec2(angle.cos(), angle.sin()) * ring_radius
            } else {
                let centroid =
                    neighbors.iter().fold(Vec2::ZERO, |sum, &p| sum + p) / neighbors.len() as f32;
                centroid + vec2(jitter_x, jitter_y) * PLACEMENT_JITTER
            };
            placements.push((id.clone(), position));
        }

        for (id, position) in placements {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.position = Some(position);
            }
        }
    }

    fn push_graph_to_solver(&self) {
        let seeds = self
            .nodes
            .iter()
            .filter_map(|(id, node)| {
                node.position.map(|position| SeedNode {
                    id: id.clone(),
                    position,
                })
            })
            .collect();
        let edges = self
            .links
            .keys()
            .map(|key| (key.source.clone(), key.target.clone()))
            .collect();
        self.solver.set_graph(seeds, edges, REBUILD_ALPHA, true);
    }

    /// Pushes the engine's current positions back to the solver; used by the
    /// host to restore layout continuity after external position edits.
    pub fn resync_solver(&self) {
        self.push_graph_to_solver();
    }

    pub fn set_render_options(&mut self, options: RenderOptions) {
        self.options = options;
        self.wake();
    }

    pub fn options(&self) -> RenderOptions {
        self.options
    }

    pub fn set_forces(&mut self, forces: ForceParams) {
        self.forces = forces;
        self.solver.set_forces(forces);
        self.wake();
    }

    pub fn forces(&self) -> ForceParams {
        self.forces
    }

    pub fn resize(&mut self, size: Vec2) {
        // The camera transform is anchored at the canvas center, so pan
        // stays proportionally centered across size changes by itself.
        self.canvas_rect = Rect::from_min_size(self.canvas_rect.min, size);
        self.wake();
    }

    pub fn node_positions(&self) -> HashMap<String, [f32; 2]> {
        self.nodes
            .iter()
            .filter_map(|(id, node)| {
                node.position
                    .map(|position| (id.clone(), [position.x, position.y]))
            })
            .collect()
    }

    pub fn set_node_position(&mut self, id: &str, x: f32, y: f32) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.position = Some(vec2(x, y));
            self.wake();
        }
    }

    pub fn take_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// One frame of non-drawing work: input, solver snapshot consumption,
    /// camera animation, LOD materialization, node state advance. Returns
    /// whether another frame should be scheduled.
    pub fn advance(&mut self, rect: Rect, events: &[InputEvent]) -> bool {
        if rect.width() < 1.0 || rect.height() < 1.0 {
            return false;
        }
        if rect != self.canvas_rect {
            self.canvas_rect = rect;
            self.wake();
        }

        self.handle_input(events);

        if let Some(snapshot) = self.solver.poll() {
            for (id, x, y) in snapshot.positions() {
                if let Some(node) = self.nodes.get_mut(id) {
                    node.position = Some(vec2(x, y));
                }
            }
            self.wake();
        }

        if self.camera.animate(rect) {
            self.wake();
        }

        let viewport = self.camera.viewport(rect);
        let candidates = lod::select_candidates(self.nodes.values(), viewport.center());
        if !candidates.is_empty() {
            let touch = self.interaction.touch_seen;
            for id in &candidates {
                if let Some(node) = self.nodes.get_mut(id) {
                    node.materialize(touch);
                }
            }
            self.wake();
        }

        let highlight = self.highlight.clone();
        let touch = self.interaction.touch_seen;
        let mut animating = false;
        for node in self.nodes.values_mut() {
            let highlighted = highlight.as_deref() == Some(node.id.as_str());
            let dimmed = match &highlight {
                None => false,
                Some(target) => {
                    !highlighted
                        && !node.forward.contains_key(target)
                        && !node.reverse.contains_key(target)
                }
            };
            animating |= node.advance(&self.camera, rect, &self.options, highlighted, dimmed, touch);
        }
        if animating {
            self.wake();
        }

        self.revalidate_hover();

        let request = self.idle_frames < IDLE_FRAME_LIMIT;
        self.idle_frames = self.idle_frames.saturating_add(1);
        request
    }

    pub fn paint(&self, painter: &Painter, rect: Rect) {
        painter.rect_filled(rect, 0.0, self.palette.background);

        let stroke_width =
            (1.2 * self.options.line_size_multiplier * self.camera.scale.sqrt()).clamp(0.5, 4.0);

        for (key, link) in &self.links {
            let bidirectional = self.links.contains_key(&key.reversed());
            if !link.owns_render(bidirectional) {
                continue;
            }

            let (Some(source), Some(target)) =
                (self.nodes.get(&link.source), self.nodes.get(&link.target))
            else {
                continue;
            };
            let (Some(source_screen), Some(target_screen)) = (&source.screen, &target.screen)
            else {
                continue;
            };
            if source.position.is_none() || target.position.is_none() {
                continue;
            }

            let involved = self.highlight.as_deref() == Some(link.source.as_str())
                || self.highlight.as_deref() == Some(link.target.as_str());
            let base = if involved {
                self.palette.link_highlight
            } else {
                self.palette.link
            };
            let fade = source.fade_alpha.min(target.fade_alpha);
            let color = Color32::from_rgba_unmultiplied(
                base.r(),
                base.g(),
                base.b(),
                (base.a() as f32 * fade) as u8,
            );

            link.draw(
                painter,
                rect,
                (source_screen.position, source_screen.radius),
                (target_screen.position, target_screen.radius),
                color,
                stroke_width,
                self.options.show_arrow || involved,
            );
        }

        for node in self.nodes.values() {
            if self.highlight.as_deref() == Some(node.id.as_str()) {
                continue;
            }
            node.draw(painter, rect, &self.camera, &self.options, &self.palette, false);
        }

        // The highlight draws last, above its neighborhood.
        if let Some(highlight) = &self.highlight
            && let Some(node) = self.nodes.get(highlight)
        {
            node.draw(painter, rect, &self.camera, &self.options, &self.palette, true);
        }
    }

    fn wake(&mut self) {
        self.idle_frames = 0;
    }
}

fn circle_visible(rect: Rect, position: Pos2, radius: f32) -> bool {
    !(position.x + radius < rect.left()
        || position.x - radius > rect.right()
        || position.y + radius < rect.top()
        || position.y - radius > rect.bottom())
}

#[cfg(test)]
mod tests {
    use super::*;
    use eframe::egui::pos2;

    fn spec(links: &[&str]) -> NodeSpec {
        NodeSpec {
            kind: NodeKind::Normal,
            links: links.iter().map(|id| (id.to_string(), true)).collect(),
            display_text: None,
            color: None,
        }
    }

    fn graph(entries: &[(&str, &[&str])]) -> HashMap<String, NodeSpec> {
        entries
            .iter()
            .map(|(id, links)| (id.to_string(), spec(links)))
            .collect()
    }

    fn canvas() -> Rect {
        Rect::from_min_size(pos2(0.0, 0.0), vec2(800.0, 600.0))
    }

    #[test]
    fn set_graph_builds_symmetric_adjacency() {
        let (mut engine, _commands, _snapshots) = GraphEngine::for_test();
        engine.set_graph(&graph(&[("a", &["b", "c"]), ("b", &["a"]), ("c", &[])]), None);

        for node in engine.nodes.values() {
            for (neighbor, key) in &node.forward {
                let other = engine.nodes.get(neighbor).expect("neighbor exists");
                assert_eq!(other.reverse.get(&node.id), Some(key));
            }
            for (neighbor, key) in &node.reverse {
                let other = engine.nodes.get(neighbor).expect("neighbor exists");
                assert_eq!(other.forward.get(&node.id), Some(key));
            }
        }
    }

    #[test]
    fn simple_two_node_scenario() {
        let (mut engine, _commands, _snapshots) = GraphEngine::for_test();
        engine.set_graph(&graph(&[("A", &["B"]), ("B", &[])]), None);

        assert_eq!(engine.links.len(), 1);
        assert_eq!(engine.nodes["A"].forward.keys().collect::<Vec<_>>(), vec!["B"]);
        assert!(engine.nodes["A"].reverse.is_empty());
        assert_eq!(engine.nodes["B"].reverse.keys().collect::<Vec<_>>(), vec!["A"]);
        assert!(engine.nodes["B"].forward.is_empty());
    }

    #[test]
    fn links_to_missing_ids_are_skipped() {
        let (mut engine, _commands, _snapshots) = GraphEngine::for_test();
        engine.set_graph(&graph(&[("a", &["ghost"])]), None);

        assert!(engine.links.is_empty());
        assert!(engine.nodes["a"].forward.is_empty());
    }

    #[test]
    fn removed_nodes_release_screen_objects_and_links() {
        let (mut engine, _commands, _snapshots) = GraphEngine::for_test();
        engine.set_graph(&graph(&[("a", &["b"]), ("b", &[])]), None);
        engine.advance(canvas(), &[]);
        assert!(engine.nodes["b"].is_materialized());

        engine.set_graph(&graph(&[("a", &[])]), None);
        assert!(!engine.nodes.contains_key("b"));
        assert!(engine.links.is_empty());
        assert!(engine.nodes["a"].forward.is_empty());
    }

    #[test]
    fn materialization_is_bounded_per_frame() {
        let (mut engine, _commands, _snapshots) = GraphEngine::for_test();
        let entries = (0..130).map(|i| format!("n{i}")).collect::<Vec<_>>();
        let specs = entries
            .iter()
            .map(|id| (id.clone(), spec(&[])))
            .collect::<HashMap<_, _>>();
        engine.set_graph(&specs, None);

        engine.advance(canvas(), &[]);
        let first = engine.nodes.values().filter(|n| n.is_materialized()).count();
        assert_eq!(first, lod::MATERIALIZE_PER_FRAME);

        engine.advance(canvas(), &[]);
        let second = engine.nodes.values().filter(|n| n.is_materialized()).count();
        assert_eq!(second, 2 * lod::MATERIALIZE_PER_FRAME);

        engine.advance(canvas(), &[]);
        assert_eq!(engine.nodes.values().filter(|n| n.is_materialized()).count(), 130);
    }

    #[test]
    fn weights_default_to_degree_and_respect_overrides() {
        let (mut engine, _commands, _snapshots) = GraphEngine::for_test();
        let weights = [("a".to_string(), 9.0_f32)].into_iter().collect();
        engine.set_graph(&graph(&[("a", &["b"]), ("b", &["c"]), ("c", &[])]), Some(&weights));

        assert_eq!(engine.nodes["a"].weight, 9.0);
        assert_eq!(engine.nodes["b"].weight, 2.0);
        assert_eq!(engine.nodes["c"].weight, 1.0);
    }

    #[test]
    fn new_nodes_join_near_positioned_neighbors() {
        let (mut engine, _commands, _snapshots) = GraphEngine::for_test();
        engine.set_graph(&graph(&[("a", &[])]), None);
        engine.set_node_position("a", 500.0, 500.0);

        engine.set_graph(&graph(&[("a", &["b"]), ("b", &[])]), None);

        let placed = engine.nodes["b"].position.expect("placed on arrival");
        assert!((placed - vec2(500.0, 500.0)).length() <= PLACEMENT_JITTER * 1.5);
    }

    #[test]
    fn isolated_new_nodes_land_on_the_outer_ring() {
        let (mut engine, _commands, _snapshots) = GraphEngine::for_test();
        engine.set_graph(&graph(&[("a", &[])]), None);
        engine.set_node_position("a", 300.0, 0.0);

        engine.set_graph(&graph(&[("a", &[]), ("loner", &[])]), None);

        let placed = engine.nodes["loner"].position.expect("placed on arrival");
        assert!((placed.length() - (300.0 + RING_MARGIN)).abs() < 1.0);
    }

    #[test]
    fn snapshot_positions_are_applied_to_nodes() {
        let (mut engine, _commands, snapshots) = GraphEngine::for_test();
        engine.set_graph(&graph(&[("a", &[])]), None);

        let mut buffer = Vec::new();
        buffer.extend_from_slice(&42.0_f32.to_le_bytes());
        buffer.extend_from_slice(&(-7.0_f32).to_le_bytes());
        buffer.extend_from_slice(&1_u32.to_le_bytes());
        snapshots
            .send(crate::solver::PositionSnapshot {
                ids: vec!["a".to_string()].into(),
                buffer: buffer.into(),
            })
            .expect("open channel");

        engine.advance(canvas(), &[]);
        assert_eq!(engine.nodes["a"].position, Some(vec2(42.0, -7.0)));
    }

    #[test]
    fn idle_throttling_stops_repaint_requests_after_a_static_minute() {
        let (mut engine, _commands, _snapshots) = GraphEngine::for_test();
        engine.set_graph(&graph(&[("a", &[])]), None);

        let mut requests = 0;
        for _ in 0..(IDLE_FRAME_LIMIT as usize * 4) {
            if engine.advance(canvas(), &[]) {
                requests += 1;
            }
        }
        assert!(requests >= IDLE_FRAME_LIMIT as usize);
        assert!(!engine.advance(canvas(), &[]));

        // Any mutating event restarts the loop.
        engine.set_node_position("a", 1.0, 1.0);
        assert!(engine.advance(canvas(), &[]));
    }
}
