// Termination signal shared by the coordinator and both relay activities
use crossbeam::channel::{bounded, unbounded, Receiver, Sender};
use relay_core::{Direction, RelayExit, TerminationCause};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Relay side of the signal: report an exit, observe cancellation.
#[derive(Clone)]
pub struct SessionSignal {
    shutting_down: Arc<AtomicBool>,
    exits: Sender<RelayExit>,
    cancel: Receiver<()>,
}

/// Coordinator side of the signal.
pub struct SignalController {
    shutting_down: Arc<AtomicBool>,
    exits: Receiver<RelayExit>,
    // Dropped to broadcast cancellation to every relay
    cancel_tx: Mutex<Option<Sender<()>>>,
}

pub fn session_signal() -> (SessionSignal, SignalController) {
    let shutting_down = Arc::new(AtomicBool::new(false));
    let (exit_tx, exit_rx) = unbounded();
    let (cancel_tx, cancel_rx) = bounded(0);

    let signal = SessionSignal {
        shutting_down: Arc::clone(&shutting_down),
        exits: exit_tx,
        cancel: cancel_rx,
    };
    let controller = SignalController {
        shutting_down,
        exits: exit_rx,
        cancel_tx: Mutex::new(Some(cancel_tx)),
    };
    (signal, controller)
}

impl SessionSignal {
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// Becomes ready (disconnected) once the coordinator trips the signal.
    pub fn cancelled(&self) -> &Receiver<()> {
        &self.cancel
    }

    /// Guard that delivers this relay's exit exactly once, even if the relay
    /// unwinds before reporting.
    pub fn reporter(&self, direction: Direction) -> ExitReporter {
        ExitReporter {
            direction,
            exits: self.exits.clone(),
            reported: false,
        }
    }
}

impl SignalController {
    /// Block until the first relay reports.
    pub fn wait_first(&self) -> RelayExit {
        // Reporters always send before they drop, so disconnect means every
        // relay thread is gone without a trace
        self.exits
            .recv()
            .unwrap_or_else(|_| RelayExit::new(Direction::Inbound, TerminationCause::Panicked, 0))
    }

    /// Mark the session as shutting down and wake cancellable waits.
    /// Returns true only for the call that actually tripped it.
    pub fn trip(&self) -> bool {
        let first = !self.shutting_down.swap(true, Ordering::AcqRel);
        let mut guard = match self.cancel_tx.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.take();
        first
    }

    pub fn is_tripped(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }
}

pub struct ExitReporter {
    direction: Direction,
    exits: Sender<RelayExit>,
    reported: bool,
}

impl ExitReporter {
    pub fn report(mut self, exit: RelayExit) -> RelayExit {
        self.reported = true;
        let _ = self.exits.send(exit.clone());
        exit
    }
}

impl Drop for ExitReporter {
    fn drop(&mut self) {
        if !self.reported {
            let _ = self
                .exits
                .send(RelayExit::new(self.direction, TerminationCause::Panicked, 0));
        }
    }
}
