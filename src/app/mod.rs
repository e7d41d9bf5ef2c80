use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Duration;

use eframe::egui::{self, Context, PointerButton, Rect, Response, Sense, TouchPhase, Ui};
use log::{info, warn};

use crate::graph_data::{self, GraphFile};
use crate::solver::SolverLink;

mod engine;
mod ui;

use engine::{EngineEvent, GraphEngine, InputEvent, Palette};

const LOAD_RETRY_DELAY: Duration = Duration::from_millis(500);

pub struct NoteGraphApp {
    graph_path: PathBuf,
    state: AppState,
}

enum AppState {
    Loading {
        rx: Receiver<Result<GraphFile, String>>,
        retried: bool,
    },
    Ready(Box<GraphView>),
    Error(String),
}

pub(crate) struct GraphView {
    file: GraphFile,
    focus: Option<String>,
    engine: GraphEngine,
    hovered: Option<String>,
    active_touches: u32,
    canvas_size: egui::Vec2,
}

impl NoteGraphApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, graph_path: String) -> Self {
        let graph_path = PathBuf::from(graph_path);
        let state = AppState::Loading {
            rx: Self::spawn_load(graph_path.clone(), Duration::ZERO),
            retried: false,
        };
        Self { graph_path, state }
    }

    fn spawn_load(path: PathBuf, delay: Duration) -> Receiver<Result<GraphFile, String>> {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            if !delay.is_zero() {
                thread::sleep(delay);
            }
            let result = graph_data::load_graph_file(&path).map_err(|error| format!("{error:#}"));
            let _ = tx.send(result);
        });

        rx
    }
}

impl eframe::App for NoteGraphApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let mut transition = None;

        match &mut self.state {
            AppState::Loading { rx, retried } => {
                match rx.try_recv() {
                    Ok(Ok(file)) => {
                        info!(
                            "loaded graph {}: {} documents",
                            self.graph_path.display(),
                            file.nodes.len()
                        );
                        transition = Some(AppState::Ready(Box::new(GraphView::new(ctx, file))));
                    }
                    Ok(Err(error)) if !*retried => {
                        warn!("graph load failed, retrying once: {error}");
                        transition = Some(AppState::Loading {
                            rx: Self::spawn_load(self.graph_path.clone(), LOAD_RETRY_DELAY),
                            retried: true,
                        });
                    }
                    Ok(Err(error)) => transition = Some(AppState::Error(error)),
                    Err(TryRecvError::Empty) => {}
                    Err(TryRecvError::Disconnected) => {
                        transition =
                            Some(AppState::Error("graph load worker disconnected".to_owned()));
                    }
                }

                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Loading graph...");
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
                ctx.request_repaint_after(Duration::from_millis(50));
            }
            AppState::Error(error) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Failed to load graph");
                    ui.add_space(6.0);
                    ui.label(error.as_str());
                    ui.add_space(10.0);
                    if ui.button("Retry").clicked() {
                        transition = Some(AppState::Loading {
                            rx: Self::spawn_load(self.graph_path.clone(), Duration::ZERO),
                            retried: true,
                        });
                    }
                });
            }
            AppState::Ready(view) => view.show(ctx),
        }

        if let Some(next_state) = transition {
            self.state = next_state;
        }
    }
}

impl GraphView {
    fn new(ctx: &Context, file: GraphFile) -> Self {
        let waker = ctx.clone();
        let solver = SolverLink::spawn(move || waker.request_repaint());
        let mut engine = GraphEngine::new(solver, Palette::default());

        let focus = file.focus.clone();
        let specs = graph_data::build_specs(&file, focus.as_deref());
        engine.set_graph(&specs, (!file.weights.is_empty()).then_some(&file.weights));

        Self {
            file,
            focus,
            engine,
            hovered: None,
            active_touches: 0,
            canvas_size: egui::Vec2::ZERO,
        }
    }

    fn show(&mut self, ctx: &Context) {
        egui::SidePanel::right("controls")
            .default_width(230.0)
            .show(ctx, |ui| self.controls(ui));

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                let (rect, response) =
                    ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
                if rect.size() != self.canvas_size {
                    self.canvas_size = rect.size();
                    self.engine.resize(rect.size());
                }
                let events = self.collect_input(ui, rect, &response);

                let keep_animating = self.engine.advance(rect, &events);
                let painter = ui.painter_at(rect);
                self.engine.paint(&painter, rect);

                if let Some(hovered) = &self.hovered {
                    painter.text(
                        rect.left_top() + egui::vec2(10.0, 10.0),
                        egui::Align2::LEFT_TOP,
                        hovered,
                        egui::FontId::proportional(13.0),
                        egui::Color32::from_gray(240),
                    );
                }

                if keep_animating {
                    ui.ctx().request_repaint();
                }
            });

        for event in self.engine.take_events() {
            match event {
                EngineEvent::NodeClicked { id, kind } => self.navigate_to(&id, kind),
                EngineEvent::NodeHovered { id, .. } => self.hovered = Some(id),
                EngineEvent::HoverCleared => self.hovered = None,
            }
        }
    }

    /// Click-to-navigate: the clicked document becomes the focus and the
    /// graph is replaced around it. Positions are saved across the
    /// replacement and pushed back to the solver so the same logical graph
    /// keeps its layout.
    fn navigate_to(&mut self, id: &str, kind: graph_data::NodeKind) {
        if kind == graph_data::NodeKind::Unresolved {
            return;
        }

        info!("navigating to {id}");
        self.focus = Some(id.to_owned());

        let saved = self.engine.node_positions();
        let specs = graph_data::build_specs(&self.file, Some(id));
        self.engine
            .set_graph(&specs, (!self.file.weights.is_empty()).then_some(&self.file.weights));
        for (node_id, [x, y]) in &saved {
            self.engine.set_node_position(node_id, *x, *y);
        }
        self.engine.resync_solver();
    }

    fn collect_input(&mut self, ui: &Ui, rect: Rect, response: &Response) -> Vec<InputEvent> {
        let mut events = Vec::new();

        ui.input(|input| {
            for event in &input.raw.events {
                match event {
                    egui::Event::Touch {
                        id, phase, pos, ..
                    } => match phase {
                        TouchPhase::Start => {
                            self.active_touches += 1;
                            events.push(InputEvent::TouchStart {
                                id: id.0,
                                position: *pos,
                            });
                        }
                        TouchPhase::Move => events.push(InputEvent::TouchMove {
                            id: id.0,
                            position: *pos,
                        }),
                        TouchPhase::End | TouchPhase::Cancel => {
                            self.active_touches = self.active_touches.saturating_sub(1);
                            events.push(InputEvent::TouchEnd { id: id.0 });
                        }
                    },
                    // Touch contacts also synthesize pointer events; those
                    // must not reach the mouse paths (hover is mouse-only).
                    _ if self.active_touches > 0 => {}
                    egui::Event::PointerButton {
                        pos,
                        button: PointerButton::Primary,
                        pressed,
                        ..
                    } => {
                        if *pressed {
                            if rect.contains(*pos) {
                                events.push(InputEvent::PointerDown { position: *pos });
                            }
                        } else {
                            events.push(InputEvent::PointerUp { position: *pos });
                        }
                    }
                    egui::Event::PointerMoved(pos) => {
                        events.push(InputEvent::PointerMove { position: *pos });
                    }
                    egui::Event::MouseWheel { unit, delta, .. } => {
                        if response.hovered() {
                            let pixels = match unit {
                                egui::MouseWheelUnit::Point => delta.y,
                                egui::MouseWheelUnit::Line => delta.y * 40.0,
                                egui::MouseWheelUnit::Page => delta.y * 400.0,
                            };
                            let position = input.pointer.hover_pos().unwrap_or_else(|| rect.center());
                            events.push(InputEvent::Wheel {
                                delta: -pixels,
                                position,
                            });
                        }
                    }
                    _ => {}
                }
            }
        });

        events
    }
}
