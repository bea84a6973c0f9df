//! Background worker owning a [`Simulator`].
//!
//! The worker thread is the only place the world is mutated. The controller
//! queues commands to it and can raise the cooperative stop flag; results
//! come back through the simulator's event channel.

use msystem_core::simulator::StopFlag;
use msystem_core::{SimError, Simulator};
use std::sync::atomic::Ordering;
use std::thread::JoinHandle;
use tokio::sync::mpsc::{self, UnboundedSender};

#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    Start {
        max_steps: u64,
    },
    StartWithKillProbability {
        max_steps: u64,
        tile: String,
        probability: f64,
    },
    StartWithKills {
        max_steps: u64,
        tile: String,
        count: usize,
        probabilistic: bool,
    },
    Step,
    Restart,
    Shutdown,
}

fn execute(simulator: &mut Simulator, command: ControlCommand) -> Result<(), SimError> {
    match command {
        ControlCommand::Start { max_steps } => simulator.run_simulation(max_steps).map(|_| ()),
        ControlCommand::StartWithKillProbability {
            max_steps,
            tile,
            probability,
        } => simulator
            .run_with_kill_probability(max_steps, &tile, probability)
            .map(|_| ()),
        ControlCommand::StartWithKills {
            max_steps,
            tile,
            count,
            probabilistic,
        } => simulator
            .run_with_kills(max_steps, &tile, count, probabilistic)
            .map(|_| ()),
        ControlCommand::Step => simulator.step().map(|_| ()),
        ControlCommand::Restart => {
            simulator.restart();
            Ok(())
        }
        ControlCommand::Shutdown => Ok(()),
    }
}

pub struct SimulationController {
    commands: UnboundedSender<ControlCommand>,
    stop: StopFlag,
    worker: Option<JoinHandle<Simulator>>,
}

impl SimulationController {
    /// Moves `simulator` onto a dedicated worker thread.
    pub fn spawn(mut simulator: Simulator) -> Self {
        let (commands, mut rx) = mpsc::unbounded_channel::<ControlCommand>();
        let stop = simulator.stop_flag();
        let worker = std::thread::Builder::new()
            .name("msystem-worker".into())
            .spawn(move || {
                while let Some(command) = rx.blocking_recv() {
                    if command == ControlCommand::Shutdown {
                        break;
                    }
                    tracing::debug!(?command, "Worker command");
                    if let Err(e) = execute(&mut simulator, command) {
                        tracing::error!(error = %e, "Simulation command failed");
                    }
                }
                simulator
            });

        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!(error = %e, "Failed to spawn simulation worker");
                None
            }
        };
        Self {
            commands,
            stop,
            worker,
        }
    }

    fn send(&self, command: ControlCommand) -> Result<(), SimError> {
        if self.worker.is_none() {
            return Err(SimError::WorkerUnavailable);
        }
        self.commands
            .send(command)
            .map_err(|_| SimError::WorkerUnavailable)
    }

    pub fn start(&self, max_steps: u64) -> Result<(), SimError> {
        self.send(ControlCommand::Start { max_steps })
    }

    pub fn start_with_kill_probability(
        &self,
        max_steps: u64,
        tile: &str,
        probability: f64,
    ) -> Result<(), SimError> {
        self.send(ControlCommand::StartWithKillProbability {
            max_steps,
            tile: tile.to_string(),
            probability,
        })
    }

    pub fn start_with_kills(
        &self,
        max_steps: u64,
        tile: &str,
        count: usize,
        probabilistic: bool,
    ) -> Result<(), SimError> {
        self.send(ControlCommand::StartWithKills {
            max_steps,
            tile: tile.to_string(),
            count,
            probabilistic,
        })
    }

    pub fn step(&self) -> Result<(), SimError> {
        self.send(ControlCommand::Step)
    }

    pub fn restart(&self) -> Result<(), SimError> {
        self.send(ControlCommand::Restart)
    }

    /// Ends the current run at the next step boundary.
    ///
    /// A stop raised while the worker is idle ends the next run before its first step.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        tracing::info!("Stop requested");
    }

    #[must_use]
    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    /// Lets queued commands finish, then hands the simulator back.
    pub fn shutdown(mut self) -> Result<Simulator, SimError> {
        let worker = self.worker.take().ok_or(SimError::WorkerUnavailable)?;
        // A worker that already exited has dropped its receiver.
        let _ = self.commands.send(ControlCommand::Shutdown);
        worker.join().map_err(|_| SimError::WorkerUnavailable)
    }
}
