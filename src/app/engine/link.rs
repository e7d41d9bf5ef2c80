use eframe::egui::{Color32, Painter, Pos2, Rect, Stroke, Vec2};

/// Directed edge identity; also the adjacency-map value on both endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LinkKey {
    pub source: String,
    pub target: String,
}

impl LinkKey {
    pub fn reversed(&self) -> Self {
        Self {
            source: self.target.clone(),
            target: self.source.clone(),
        }
    }
}

/// A link owns no position of its own; endpoints are projected fresh each
/// frame from the two nodes it joins.
pub struct VisualLink {
    pub source: String,
    pub target: String,
}

impl VisualLink {
    /// When both A→B and B→A exist only one of the pair draws; the lower id
    /// owns the visible line.
    pub fn owns_render(&self, bidirectional: bool) -> bool {
        !bidirectional || self.source < self.target
    }

    pub fn draw(
        &self,
        painter: &Painter,
        rect: Rect,
        source: (Pos2, f32),
        target: (Pos2, f32),
        color: Color32,
        stroke_width: f32,
        show_arrow: bool,
    ) {
        let delta = target.0 - source.0;
        let distance = delta.length();
        // Endpoints are inset by each node's rendered radius; nothing is left
        // to draw when the circles overlap.
        let inset_length = distance - source.1 - target.1;
        if distance < 0.0001 || inset_length <= 0.0 {
            return;
        }

        let direction = delta / distance;
        let start = source.0 + direction * source.1;
        let end = target.0 - direction * target.1;

        if !segment_visible(rect, start, end, stroke_width) {
            return;
        }

        painter.line_segment([start, end], Stroke::new(stroke_width, color));

        // A chevron on a line shorter than its own stroke degenerates into a
        // blob on two near-coincident nodes.
        if show_arrow && inset_length > stroke_width {
            let arrow_size = (4.0 * stroke_width).clamp(4.0, 10.0);
            let perpendicular = Vec2::new(-direction.y, direction.x);
            let back = end - direction * arrow_size;
            painter.line_segment(
                [end, back + perpendicular * (arrow_size * 0.5)],
                Stroke::new(stroke_width, color),
            );
            painter.line_segment(
                [end, back - perpendicular * (arrow_size * 0.5)],
                Stroke::new(stroke_width, color),
            );
        }
    }
}

fn segment_visible(rect: Rect, start: Pos2, end: Pos2, padding: f32) -> bool {
    let min_x = start.x.min(end.x) - padding;
    let max_x = start.x.max(end.x) + padding;
    let min_y = start.y.min(end.y) - padding;
    let max_y = start.y.max(end.y) + padding;

    !(max_x < rect.left() || min_x > rect.right() || max_y < rect.top() || min_y > rect.bottom())
}

#[cfg(test)]
mod tests {
    use super::*;
    use eframe::egui::pos2;

    #[test]
    fn lower_id_owns_a_bidirectional_pair() {
        let forward = VisualLink {
            source: "a.md".to_string(),
            target: "b.md".to_string(),
        };
        let backward = VisualLink {
            source: "b.md".to_string(),
            target: "a.md".to_string(),
        };

        assert!(forward.owns_render(true));
        assert!(!backward.owns_render(true));

        // A one-way link always draws.
        assert!(backward.owns_render(false));
    }

    #[test]
    fn link_key_reversal() {
        let key = LinkKey {
            source: "a.md".to_string(),
            target: "b.md".to_string(),
        };
        let reversed = key.reversed();
        assert_eq!(reversed.source, "b.md");
        assert_eq!(reversed.target, "a.md");
    }

    #[test]
    fn segment_visibility_uses_padded_bounds() {
        let rect = Rect::from_min_size(pos2(0.0, 0.0), Vec2::new(100.0, 100.0));

        assert!(segment_visible(rect, pos2(10.0, 10.0), pos2(90.0, 90.0), 1.0));
        assert!(segment_visible(rect, pos2(-50.0, 50.0), pos2(150.0, 50.0), 1.0));
        assert!(!segment_visible(rect, pos2(-50.0, -20.0), pos2(150.0, -10.0), 1.0));
    }
}
