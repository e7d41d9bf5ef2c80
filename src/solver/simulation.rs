use std::collections::HashMap;

use eframe::egui::Vec2;

use super::SeedNode;
use super::quadtree::{QuadNode, accumulate_repulsion};

const ALPHA_MIN: f32 = 0.001;
const ALPHA_DECAY: f32 = 0.0228;
const VELOCITY_DECAY: f32 = 0.6;
const BARNES_HUT_THETA: f32 = 0.9;

/// Simulation constants adjustable without reseeding positions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ForceParams {
    pub center_strength: f32,
    pub link_strength: f32,
    pub link_distance: f32,
    pub repel_strength: f32,
}

impl Default for ForceParams {
    fn default() -> Self {
        Self {
            center_strength: 0.07,
            link_strength: 1.0,
            link_distance: 120.0,
            repel_strength: 900.0,
        }
    }
}

struct SimNode {
    id: String,
    position: Vec2,
    velocity: Vec2,
    pinned: Option<Vec2>,
}

pub(super) struct Simulation {
    nodes: Vec<SimNode>,
    index_by_id: HashMap<String, usize>,
    edges: Vec<(usize, usize)>,
    params: ForceParams,
    alpha: f32,
    alpha_target: f32,
    position_scratch: Vec<Vec2>,
}

impl Simulation {
    pub(super) fn new() -> Self {
        Self {
            nodes: Vec::new(),
            index_by_id: HashMap::new(),
            edges: Vec::new(),
            params: ForceParams::default(),
            alpha: 0.0,
            alpha_target: 0.0,
            position_scratch: Vec::new(),
        }
    }

    /// Full reseed: replaces node and edge sets, preserving pins for ids that
    /// survive. Edges naming unknown ids are dropped.
    pub(super) fn seed(&mut self, seeds: Vec<SeedNode>, edges: Vec<(String, String)>, alpha: f32, run: bool) {
        let mut prior_pins = HashMap::new();
        for node in &self.nodes {
            if let Some(pin) = node.pinned {
                prior_pins.insert(node.id.clone(), pin);
            }
        }

        self.index_by_id.clear();
        self.nodes.clear();
        for seed in seeds {
            if self.index_by_id.contains_key(&seed.id) {
                continue;
            }
            self.index_by_id.insert(seed.id.clone(), self.nodes.len());
            let pinned = prior_pins.get(&seed.id).copied();
            self.nodes.push(SimNode {
                position: pinned.unwrap_or(seed.position),
                velocity: Vec2::ZERO,
                pinned,
                id: seed.id,
            });
        }

        self.edges.clear();
        for (source, target) in edges {
            if let (Some(&from), Some(&to)) = (
                self.index_by_id.get(&source),
                self.index_by_id.get(&target),
            ) && from != to
            {
                self.edges.push((from, to));
            }
        }
        self.edges.sort_unstable();
        self.edges.dedup();

        if run {
            self.alpha = self.alpha.max(alpha);
        }
    }

    pub(super) fn set_forces(&mut self, params: ForceParams) {
        self.params = params;
    }

    /// Pinning overrides the simulated position and keeps the rest of the
    /// graph energized around it; unpinning lets the energy decay again.
    pub(super) fn pin(&mut self, id: &str, position: Option<Vec2>, alpha: f32, alpha_target: f32) {
        let Some(&index) = self.index_by_id.get(id) else {
            return;
        };

        self.nodes[index].pinned = position;
        if position.is_some() {
            self.alpha = self.alpha.max(alpha);
            self.alpha_target = alpha_target;
        } else {
            self.alpha_target = 0.0;
        }
    }

    pub(super) fn active(&self) -> bool {
        !self.nodes.is_empty() && (self.alpha >= ALPHA_MIN || self.alpha_target >= ALPHA_MIN)
    }

    pub(super) fn ids(&self) -> Vec<String> {
        self.nodes.iter().map(|node| node.id.clone()).collect()
    }

    pub(super) fn positions(&self) -> impl ExactSizeIterator<Item = Vec2> + '_ {
        self.nodes.iter().map(|node| node.position)
    }

    pub(super) fn step(&mut self) {
        if self.nodes.is_empty() {
            return;
        }

        self.alpha += (self.alpha_target - self.alpha) * ALPHA_DECAY;
        let alpha = self.alpha;
        let params = self.params;

        self.position_scratch.clear();
        self.position_scratch
            .extend(self.nodes.iter().map(|node| node.position));

        if let Some(tree) = QuadNode::build(&self.position_scratch) {
            for (index, node) in self.nodes.iter_mut().enumerate() {
                let mut push = Vec2::ZERO;
                accumulate_repulsion(
                    &tree,
                    index,
                    &self.position_scratch,
                    params.repel_strength,
                    BARNES_HUT_THETA,
                    &mut push,
                );
                node.velocity += push * alpha;
            }
        }

        for &(from, to) in &self.edges {
            let delta = (self.nodes[to].position + self.nodes[to].velocity)
                - (self.nodes[from].position + self.nodes[from].velocity);
            let distance = delta.length().max(0.01);
            let displacement =
                (distance - params.link_distance) / distance * alpha * params.link_strength;
            let correction = delta * displacement * 0.5;

            self.nodes[to].velocity -= correction;
            self.nodes[from].velocity += correction;
        }

        for node in &mut self.nodes {
            node.velocity -= node.position * (params.center_strength * alpha);

            node.velocity *= VELOCITY_DECAY;
            node.position += node.velocity;

            if let Some(pin) = node.pinned {
                node.position = pin;
                node.velocity = Vec2::ZERO;
            }
        }
    }
}
