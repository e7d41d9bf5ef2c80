use eframe::egui::Vec2;

use super::node::VisualNode;

/// Upper bound on unmaterialized→materialized transitions per frame; keeps
/// per-frame cost independent of total graph size.
pub const MATERIALIZE_PER_FRAME: usize = 50;

/// Selects the next batch of nodes to materialize: the bounded working set of
/// unmaterialized, positioned nodes nearest to the viewport center. The set
/// is rebuilt from scratch every frame, so append/sort/truncate beats a heap
/// at this capacity.
pub fn select_candidates<'a>(
    nodes: impl Iterator<Item = &'a VisualNode>,
    viewport_center: Vec2,
) -> Vec<String> {
    let mut working: Vec<(f32, &str)> = Vec::with_capacity(MATERIALIZE_PER_FRAME + 1);

    for node in nodes {
        if node.is_materialized() {
            continue;
        }
        let Some(position) = node.position else {
            continue;
        };

        working.push(((position - viewport_center).length_sq(), &node.id));
        if working.len() > MATERIALIZE_PER_FRAME {
            working.sort_by(|a, b| a.0.total_cmp(&b.0));
            working.pop();
        }
    }

    working.sort_by(|a, b| a.0.total_cmp(&b.0));
    working.into_iter().map(|(_, id)| id.to_string()).collect()
}
