use std::collections::HashMap;

use eframe::egui::{Align2, Color32, FontId, Painter, Pos2, Rect, Vec2};

use crate::graph_data::NodeKind;
use crate::util::display_name;

use super::camera::{Camera, SMOOTHING, smooth};
use super::link::LinkKey;
use super::{Palette, RenderOptions, circle_visible};

const RADIUS_MIN: f32 = 8.0;
const RADIUS_MAX: f32 = 30.0;
const DIM_FADE: f32 = 0.2;
const TOUCH_HIT_RADIUS: f32 = 24.0;
const HIGHLIGHT_LABEL_OFFSET: f32 = 10.0;
const FADE_EPSILON: f32 = 0.005;
const LABEL_FONT: f32 = 12.0;

/// Screen primitives for one node, allocated by `materialize` and released
/// when the LOD policy or a graph update retires the node.
pub struct ScreenState {
    pub position: Pos2,
    pub radius: f32,
    pub hit_radius: f32,
    label_offset: f32,
}

pub struct VisualNode {
    pub id: String,
    pub kind: NodeKind,
    pub display_text: Option<String>,
    pub color: Option<Color32>,
    pub position: Option<Vec2>,
    pub pinned: Option<Vec2>,
    pub weight: f32,
    pub fade_alpha: f32,
    pub forward: HashMap<String, LinkKey>,
    pub reverse: HashMap<String, LinkKey>,
    pub screen: Option<ScreenState>,
}

impl VisualNode {
    pub fn new(id: String) -> Self {
        Self {
            id,
            kind: NodeKind::Normal,
            display_text: None,
            color: None,
            position: None,
            pinned: None,
            weight: 0.0,
            fade_alpha: 1.0,
            forward: HashMap::new(),
            reverse: HashMap::new(),
            screen: None,
        }
    }

    /// Unscaled radius from the link weight.
    pub fn base_size(&self) -> f32 {
        (3.0 * (self.weight + 1.0).sqrt()).clamp(RADIUS_MIN, RADIUS_MAX)
    }

    /// Allocates screen state; returns whether it actually did. Idempotent.
    pub fn materialize(&mut self, touch: bool) -> bool {
        if self.screen.is_some() {
            return false;
        }

        self.screen = Some(ScreenState {
            position: Pos2::ZERO,
            radius: self.base_size(),
            hit_radius: if touch {
                self.base_size().max(TOUCH_HIT_RADIUS)
            } else {
                self.base_size()
            },
            label_offset: 0.0,
        });
        true
    }

    /// Idempotent inverse of `materialize`; safe on an unmaterialized node.
    pub fn release(&mut self) {
        self.screen = None;
    }

    pub fn is_materialized(&self) -> bool {
        self.screen.is_some()
    }

    /// Per-frame state update: fade smoothing, projected screen position,
    /// rendered radius, highlight label offset. Returns whether any animation
    /// is still in flight.
    pub fn advance(
        &mut self,
        camera: &Camera,
        rect: Rect,
        options: &RenderOptions,
        highlighted: bool,
        dimmed: bool,
        touch: bool,
    ) -> bool {
        let target_fade = if dimmed { DIM_FADE } else { 1.0 };
        self.fade_alpha = smooth(self.fade_alpha, target_fade, SMOOTHING);
        if (self.fade_alpha - target_fade).abs() < FADE_EPSILON {
            self.fade_alpha = target_fade;
        }

        let mut animating = self.fade_alpha != target_fade;

        let radius =
            self.weight_radius(options) * camera.node_scale() * camera.scale;

        let (Some(position), Some(screen)) = (self.position, self.screen.as_mut()) else {
            return animating;
        };

        screen.position = camera.world_to_screen(rect, position);
        screen.radius = radius;
        screen.hit_radius = if touch {
            radius.max(TOUCH_HIT_RADIUS)
        } else {
            radius
        };

        let offset_target = if highlighted {
            HIGHLIGHT_LABEL_OFFSET
        } else {
            0.0
        };
        screen.label_offset = smooth(screen.label_offset, offset_target, SMOOTHING);
        if (screen.label_offset - offset_target).abs() < 0.05 {
            screen.label_offset = offset_target;
        }
        animating |= screen.label_offset != offset_target;

        animating
    }

    fn weight_radius(&self, options: &RenderOptions) -> f32 {
        self.base_size() * options.node_size_multiplier
    }

    pub fn draw(
        &self,
        painter: &Painter,
        rect: Rect,
        camera: &Camera,
        options: &RenderOptions,
        palette: &Palette,
        highlighted: bool,
    ) {
        let Some(screen) = &self.screen else {
            return;
        };
        if self.position.is_none() {
            return;
        }

        // Offscreen nodes keep their state advanced but draw nothing; the
        // highlight stays visible even while dragged out of view.
        if !highlighted && !circle_visible(rect, screen.position, screen.radius) {
            return;
        }

        let base_color = self.color.unwrap_or_else(|| palette.node_color(self.kind));
        let color = fade_color(base_color, self.fade_alpha);
        painter.circle_filled(screen.position, screen.radius, color);

        if highlighted {
            painter.circle_stroke(
                screen.position,
                screen.radius + 3.0,
                (1.5, palette.highlight_ring),
            );
        }

        let text_alpha = if highlighted {
            1.0
        } else {
            self.fade_alpha * text_visibility(camera.scale, options)
        };
        if text_alpha > 0.02 {
            let label_position =
                screen.position + Vec2::new(0.0, screen.radius + 6.0 + screen.label_offset);
            painter.text(
                label_position,
                Align2::CENTER_TOP,
                self.display_text
                    .as_deref()
                    .unwrap_or_else(|| display_name(&self.id)),
                FontId::proportional(LABEL_FONT),
                fade_color(palette.label, text_alpha),
            );
        }
    }
}

fn text_visibility(scale: f32, options: &RenderOptions) -> f32 {
    ((scale * 3.0 * options.text_fade_multiplier) - 1.0).clamp(0.0, 1.0)
}

fn fade_color(color: Color32, alpha: f32) -> Color32 {
    Color32::from_rgba_unmultiplied(
        color.r(),
        color.g(),
        color.b(),
        (color.a() as f32 * alpha.clamp(0.0, 1.0)) as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn materialize_and_release_are_idempotent() {
        let mut node = VisualNode::new("a.md".to_string());

        assert!(node.materialize(false));
        assert!(!node.materialize(false));
        assert!(node.is_materialized());

        node.release();
        node.release();
        assert!(!node.is_materialized());

        assert!(node.materialize(false));
    }

    #[test]
    fn touch_materialization_enlarges_the_hit_target() {
        let mut node = VisualNode::new("a.md".to_string());
        node.materialize(true);
        let screen = node.screen.as_ref().expect("materialized");
        assert!(screen.hit_radius >= TOUCH_HIT_RADIUS);
    }

    #[test]
    fn base_size_follows_the_weight_law() {
        let mut node = VisualNode::new("a.md".to_string());

        node.weight = 0.0;
        assert_eq!(node.base_size(), RADIUS_MIN);

        node.weight = 50.0;
        let expected = 3.0 * 51.0_f32.sqrt();
        assert!((node.base_size() - expected).abs() < 1e-4);

        node.weight = 10_000.0;
        assert_eq!(node.base_size(), RADIUS_MAX);
    }

    #[test]
    fn fade_approaches_target_exponentially() {
        let mut node = VisualNode::new("a.md".to_string());
        let camera = Camera::new();
        let rect = Rect::from_min_size(Pos2::ZERO, Vec2::new(800.0, 600.0));
        let options = RenderOptions::default();

        node.fade_alpha = 1.0;
        let animating = node.advance(&camera, rect, &options, false, true, false);
        assert!(animating);
        let expected = smooth(1.0, DIM_FADE, SMOOTHING);
        assert!((node.fade_alpha - expected).abs() < 1e-5);

        for _ in 0..200 {
            node.advance(&camera, rect, &options, false, true, false);
        }
        assert_eq!(node.fade_alpha, DIM_FADE);

        for _ in 0..200 {
            node.advance(&camera, rect, &options, false, false, false);
        }
        assert_eq!(node.fade_alpha, 1.0);
    }
}
