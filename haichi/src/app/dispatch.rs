use std::time::Instant;

use tokio::sync::mpsc;

use crate::core::{signature, LiveDisplay, Reconciler};
use crate::event_emitter::EventEmitter;
use crate::platform::{DisplayConfigurator, DisplaySystem};
use crate::store::ProfileStore;
use haichi_ipc::{
    Command, DisplayStatus, Response, RestoreOutcome, RestoreTrigger, StateEvent, StatusInfo,
};

/// What to tell the IPC client.
#[derive(Debug, PartialEq)]
pub enum Dispatch {
    Reply(Response),
    /// A manual restore is waiting on its verification retry; answer when
    /// the matching `RestoreCompleted` event is published.
    Deferred,
}

/// IPC callers whose manual restore is still waiting on a retry.
///
/// Every manual outcome answers all of them: a restore that supersedes a
/// pending retry finishes the earlier request too.
#[derive(Default)]
pub struct PendingRestores {
    waiting: Vec<mpsc::Sender<Response>>,
}

impl PendingRestores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send a dispatch result to its caller, or park the caller.
    pub fn route(&mut self, result: Dispatch, resp_tx: mpsc::Sender<Response>) {
        match result {
            Dispatch::Reply(response) => {
                if let Response::Restore { outcome } = &response {
                    self.answer(outcome);
                }
                let _ = resp_tx.blocking_send(response);
            }
            Dispatch::Deferred => self.waiting.push(resp_tx),
        }
    }

    /// Answer parked callers if `events` carry a manual restore outcome.
    pub fn resolve(&mut self, events: &[StateEvent]) {
        if let Some(outcome) = manual_outcome(events) {
            self.answer(&outcome);
        }
    }

    pub fn fail_all(&mut self, message: &str) {
        for resp_tx in self.waiting.drain(..) {
            let _ = resp_tx.blocking_send(Response::Error {
                message: message.to_string(),
            });
        }
    }

    fn answer(&mut self, outcome: &RestoreOutcome) {
        if !self.waiting.is_empty() {
            tracing::debug!("Answering {} waiting restore request(s)", self.waiting.len());
        }
        for resp_tx in self.waiting.drain(..) {
            let _ = resp_tx.blocking_send(Response::Restore {
                outcome: outcome.clone(),
            });
        }
    }
}

/// Run one IPC command on the serial display context.
pub fn dispatch_command<D, P>(
    cmd: &Command,
    reconciler: &mut Reconciler,
    system: &D,
    store: &mut P,
    event_emitter: &EventEmitter,
    now: Instant,
) -> Dispatch
where
    D: DisplaySystem + DisplayConfigurator,
    P: ProfileStore,
{
    let response = match cmd {
        Command::Snapshot => match reconciler.save_snapshot(system, store) {
            Ok(profile) => Response::Profile {
                profile: Some(profile),
            },
            Err(e) => Response::Error {
                message: format!("Snapshot failed: {}", e),
            },
        },
        Command::Restore => {
            let events = reconciler.restore_now(now, system, store);
            let outcome = manual_outcome(&events);
            event_emitter.emit_all(events);
            match outcome {
                Some(outcome) => Response::Restore { outcome },
                None => return Dispatch::Deferred,
            }
        }
        Command::ShowProfile => Response::Profile {
            profile: store.load_default(),
        },
        Command::Forget => {
            store.clear_default();
            Response::Ok
        }
        Command::ClearTracked => {
            reconciler.clear_tracked_positions();
            Response::Ok
        }
        Command::ClearOverride => {
            reconciler.clear_override(system, store);
            Response::Ok
        }
        Command::SetAutoRestore { enabled } => {
            reconciler.set_auto_restore(*enabled);
            Response::Ok
        }
        Command::Status => Response::Status {
            status: status_info(reconciler, system, store),
        },
        Command::Quit => {
            tracing::info!("Quit command received");
            reconciler.stop_observing();
            Response::Ok
        }
    };
    Dispatch::Reply(response)
}

/// Outcome of a manual restore among freshly produced events.
pub fn manual_outcome(events: &[StateEvent]) -> Option<RestoreOutcome> {
    events.iter().find_map(|event| match event {
        StateEvent::RestoreCompleted {
            trigger: RestoreTrigger::Manual,
            outcome,
        } => Some(outcome.clone()),
        _ => None,
    })
}

fn status_info<S: DisplaySystem, P: ProfileStore>(
    reconciler: &Reconciler,
    system: &S,
    store: &P,
) -> StatusInfo {
    let displays = system.active_displays();
    let signature = signature(&displays);
    StatusInfo {
        phase: reconciler.phase().name().to_string(),
        auto_restore: reconciler.auto_restore(),
        observing: reconciler.is_observing(),
        has_default: store.load_default().is_some(),
        override_active: store.has_override(&signature),
        tracking_positions: reconciler.tracking_positions(),
        displays: displays.iter().map(display_to_status).collect(),
        signature,
    }
}

fn display_to_status(display: &LiveDisplay) -> DisplayStatus {
    DisplayStatus {
        id: display.id,
        name: display.name.clone(),
        x: display.bounds.x,
        y: display.bounds.y,
        width: display.bounds.width,
        height: display.bounds.height,
        is_main: display.is_main,
        is_builtin: display.is_builtin,
    }
}
