use eframe::egui::{Slider, Ui};

use super::GraphView;

impl GraphView {
    pub(super) fn controls(&mut self, ui: &mut Ui) {
        ui.add_space(6.0);
        ui.heading("Graph");
        ui.label(format!(
            "{} nodes, {} links",
            self.engine.node_count(),
            self.engine.link_count()
        ));
        if let Some(focus) = &self.focus {
            ui.label(format!("focus: {focus}"));
        }

        ui.separator();
        ui.heading("Forces");
        let mut forces = self.engine.forces();
        let mut forces_changed = false;
        forces_changed |= ui
            .add(Slider::new(&mut forces.center_strength, 0.0..=0.3).text("center"))
            .changed();
        forces_changed |= ui
            .add(Slider::new(&mut forces.link_strength, 0.0..=2.0).text("link force"))
            .changed();
        forces_changed |= ui
            .add(Slider::new(&mut forces.link_distance, 30.0..=400.0).text("link distance"))
            .changed();
        forces_changed |= ui
            .add(Slider::new(&mut forces.repel_strength, 0.0..=3000.0).text("repel"))
            .changed();
        if forces_changed {
            self.engine.set_forces(forces);
        }

        ui.separator();
        ui.heading("Display");
        let mut options = self.engine.options();
        let mut options_changed = false;
        options_changed |= ui
            .add(Slider::new(&mut options.node_size_multiplier, 0.3..=3.0).text("node size"))
            .changed();
        options_changed |= ui
            .add(Slider::new(&mut options.line_size_multiplier, 0.3..=3.0).text("line width"))
            .changed();
        options_changed |= ui
            .add(Slider::new(&mut options.text_fade_multiplier, 0.0..=3.0).text("text fade"))
            .changed();
        options_changed |= ui.checkbox(&mut options.show_arrow, "always show arrows").changed();
        if options_changed {
            self.engine.set_render_options(options);
        }

        ui.separator();
        if ui.button("Resync layout").clicked() {
            self.engine.resync_solver();
        }
    }
}
