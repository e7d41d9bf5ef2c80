mod quadtree;
mod simulation;
mod snapshot;

pub use simulation::ForceParams;
pub use snapshot::PositionSnapshot;

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use eframe::egui::Vec2;
use log::{debug, trace, warn};

use simulation::Simulation;
use snapshot::SnapshotEncoder;

/// Perturbation energy applied while a node is dragged; the sustained target
/// keeps neighbors relaxing around the pin until release.
pub const DRAG_ALPHA: f32 = 0.3;
pub const DRAG_ALPHA_TARGET: f32 = 0.3;
/// Energy injected when the graph is (re)seeded.
pub const REBUILD_ALPHA: f32 = 0.3;

const STEP_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Clone, Debug)]
pub struct SeedNode {
    pub id: String,
    pub position: Vec2,
}

pub enum SolverCommand {
    SetGraph {
        nodes: Vec<SeedNode>,
        edges: Vec<(String, String)>,
        alpha: f32,
        run: bool,
    },
    SetForces(ForceParams),
    Pin {
        id: String,
        position: Option<Vec2>,
    },
    Stop,
}

/// Admission check for incoming snapshots. A buffer the worker rewrote in
/// place is recognized by its data address and accepted only when its
/// embedded version moved forward; a distinct buffer is always applied.
///
/// The gate records the address rather than holding an `Arc` clone: keeping
/// the buffer alive here would deny the worker unique ownership and with it
/// any chance of in-place reuse. A recycled allocation at the same address
/// always carries a higher version, so the address comparison stays sound.
struct SnapshotGate {
    last_buffer: Option<(usize, u32)>,
}

impl SnapshotGate {
    fn new() -> Self {
        Self { last_buffer: None }
    }

    fn admit(&mut self, snapshot: &PositionSnapshot) -> bool {
        if !snapshot.is_well_formed() {
            warn!(
                "dropping malformed position snapshot: {} ids, {} bytes",
                snapshot.ids.len(),
                snapshot.buffer.len()
            );
            return false;
        }

        let address = snapshot.buffer.as_ptr() as usize;
        let version = snapshot.version();
        if let Some((last_address, last_version)) = self.last_buffer
            && address == last_address
            && version <= last_version
        {
            trace!("skipping unchanged snapshot (version {version})");
            return false;
        }

        self.last_buffer = Some((address, version));
        true
    }
}

/// UI-thread handle to the layout solver worker. Commands go out over an
/// ordered channel; position snapshots come back and are consumed
/// opportunistically via [`SolverLink::poll`]. Dropping the link stops and
/// joins the worker.
pub struct SolverLink {
    commands: Sender<SolverCommand>,
    snapshots: Receiver<PositionSnapshot>,
    gate: SnapshotGate,
    worker: Option<JoinHandle<()>>,
}

impl SolverLink {
    pub fn spawn(waker: impl Fn() + Send + 'static) -> Self {
        let (command_tx, command_rx) = mpsc::channel();
        let (snapshot_tx, snapshot_rx) = mpsc::channel();

        let worker = thread::Builder::new()
            .name("layout-solver".to_owned())
            .spawn(move || run_worker(command_rx, snapshot_tx, waker))
            .expect("spawning solver thread");

        Self {
            commands: command_tx,
            snapshots: snapshot_rx,
            gate: SnapshotGate::new(),
            worker: Some(worker),
        }
    }

    #[cfg(test)]
    pub(crate) fn loopback() -> (Self, Receiver<SolverCommand>, Sender<PositionSnapshot>) {
        let (command_tx, command_rx) = mpsc::channel();
        let (snapshot_tx, snapshot_rx) = mpsc::channel();

        let link = Self {
            commands: command_tx,
            snapshots: snapshot_rx,
            gate: SnapshotGate::new(),
            worker: None,
        };
        (link, command_rx, snapshot_tx)
    }

    pub fn set_graph(
        &self,
        nodes: Vec<SeedNode>,
        edges: Vec<(String, String)>,
        alpha: f32,
        run: bool,
    ) {
        self.send(SolverCommand::SetGraph {
            nodes,
            edges,
            alpha,
            run,
        });
    }

    pub fn set_forces(&self, params: ForceParams) {
        self.send(SolverCommand::SetForces(params));
    }

    pub fn pin_node(&self, id: &str, position: Option<Vec2>) {
        self.send(SolverCommand::Pin {
            id: id.to_owned(),
            position,
        });
    }

    /// Drains the snapshot channel, keeping only the newest message, and
    /// returns it if the gate admits it. Never blocks.
    pub fn poll(&mut self) -> Option<PositionSnapshot> {
        let newest = self.snapshots.try_iter().last()?;
        self.gate.admit(&newest).then_some(newest)
    }

    fn send(&self, command: SolverCommand) {
        if self.commands.send(command).is_err() {
            debug!("solver worker is gone; command dropped");
        }
    }
}

impl Drop for SolverLink {
    fn drop(&mut self) {
        let _ = self.commands.send(SolverCommand::Stop);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_worker(
    commands: Receiver<SolverCommand>,
    snapshots: Sender<PositionSnapshot>,
    waker: impl Fn(),
) {
    let mut simulation = Simulation::new();
    let mut encoder = SnapshotEncoder::new();

    loop {
        // Block while at rest; otherwise pick up commands between paced steps.
        let first = if simulation.active() {
            match commands.recv_timeout(STEP_INTERVAL) {
                Ok(command) => Some(command),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => return,
            }
        } else {
            match commands.recv() {
                Ok(command) => Some(command),
                Err(_) => return,
            }
        };

        let mut pending = first.into_iter().chain(commands.try_iter());
        let mut stopped = false;
        for command in &mut pending {
            match command {
                SolverCommand::SetGraph {
                    nodes,
                    edges,
                    alpha,
                    run,
                } => {
                    simulation.seed(nodes, edges, alpha, run);
                    encoder.set_ids(simulation.ids());
                }
                SolverCommand::SetForces(params) => simulation.set_forces(params),
                SolverCommand::Pin { id, position } => {
                    simulation.pin(&id, position, DRAG_ALPHA, DRAG_ALPHA_TARGET);
                }
                SolverCommand::Stop => {
                    stopped = true;
                    break;
                }
            }
        }
        if stopped {
            return;
        }

        if simulation.active() {
            simulation.step();
            let snapshot = encoder.encode(simulation.positions());
            if snapshots.send(snapshot).is_err() {
                return;
            }
            waker();
        }
    }
}
