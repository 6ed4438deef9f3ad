use std::collections::HashMap;
use std::time::Instant;

use haichi_ipc::{DisplayLayoutProfile, RestoreOutcome, RestoreTrigger, StateEvent};

use super::signature::{normalize_to_main, signature};
use super::{
    apply_configuration, map_displays, snapshot, unix_now, verify, ChangeKind, EngineConfig,
    Point, ReconfigFlags, SnapshotError,
};
use crate::macos::DisplayId;
use crate::platform::{DisplayConfigurator, DisplaySystem};
use crate::store::ProfileStore;

/// Where the reconciliation cycle is. Timers are deadlines polled by
/// [`Reconciler::tick`]; replacing a phase cancels its timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    PendingDebounce {
        deadline: Instant,
    },
    StabilityCheck {
        signature: String,
        deadline: Instant,
    },
    Applying,
    /// Verification failed once; the whole restore runs again at `deadline`.
    RetryPending {
        trigger: RestoreTrigger,
        deadline: Instant,
    },
    Cooldown {
        until: Instant,
    },
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::PendingDebounce { .. } => "pending_debounce",
            Phase::StabilityCheck { .. } => "stability_check",
            Phase::Applying => "applying",
            Phase::RetryPending { .. } => "retry_pending",
            Phase::Cooldown { .. } => "cooldown",
        }
    }

    /// Callbacks seen in these phases are our own writes settling.
    fn suppresses_callbacks(&self) -> bool {
        matches!(
            self,
            Phase::Applying | Phase::RetryPending { .. } | Phase::Cooldown { .. }
        )
    }
}

/// Main-relative targets of the last successful restore.
#[derive(Debug, Clone, PartialEq, Eq)]
struct AppliedPositions {
    positions: HashMap<DisplayId, Point>,
    signature: String,
}

enum Attempt {
    Done(RestoreOutcome),
    /// Verification failed; `settled` is when apply and verify finished.
    Retry { settled: Instant },
}

pub struct Reconciler {
    config: EngineConfig,
    phase: Phase,
    applied: Option<AppliedPositions>,
    observing: bool,
}

impl Reconciler {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            phase: Phase::Idle,
            applied: None,
            observing: false,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn auto_restore(&self) -> bool {
        self.config.auto_restore
    }

    pub fn set_auto_restore(&mut self, enabled: bool) {
        tracing::info!("Auto-restore {}", if enabled { "enabled" } else { "disabled" });
        self.config.auto_restore = enabled;
    }

    pub fn is_observing(&self) -> bool {
        self.observing
    }

    pub fn start_observing(&mut self) {
        self.observing = true;
        tracing::debug!("Observing display reconfiguration");
    }

    /// Stops reacting to callbacks and drops any pending timer.
    pub fn stop_observing(&mut self) {
        self.observing = false;
        self.set_phase(Phase::Idle);
    }

    pub fn tracking_positions(&self) -> bool {
        self.applied.is_some()
    }

    pub fn clear_tracked_positions(&mut self) {
        if self.applied.take().is_some() {
            tracing::debug!("Cleared tracked positions");
        }
    }

    /// Feed one OS reconfiguration callback.
    pub fn handle_reconfig<S, P>(
        &mut self,
        flags: ReconfigFlags,
        now: Instant,
        system: &S,
        store: &mut P,
    ) -> Vec<StateEvent>
    where
        S: DisplaySystem,
        P: ProfileStore,
    {
        if !self.observing {
            return Vec::new();
        }
        self.expire_cooldown(now);

        let kind = flags.classify();
        if matches!(kind, ChangeKind::BeginConfiguration | ChangeKind::Other) {
            return Vec::new();
        }
        if self.phase.suppresses_callbacks() {
            tracing::debug!("Ignoring reconfiguration {:?} during {}", flags, self.phase.name());
            return Vec::new();
        }

        match kind {
            ChangeKind::Topology => {
                self.clear_tracked_positions();
                self.set_phase(Phase::PendingDebounce {
                    deadline: now + self.config.debounce(),
                });
                Vec::new()
            }
            ChangeKind::ShapeOnly => self.check_manual_change(system, store).into_iter().collect(),
            ChangeKind::BeginConfiguration | ChangeKind::Other => Vec::new(),
        }
    }

    /// Advance whichever timer has come due.
    pub fn tick<D, P>(&mut self, now: Instant, system: &D, store: &mut P) -> Vec<StateEvent>
    where
        D: DisplaySystem + DisplayConfigurator,
        P: ProfileStore,
    {
        match self.phase.clone() {
            Phase::PendingDebounce { deadline } if now >= deadline => {
                let signature = signature(&system.active_displays());
                self.set_phase(Phase::StabilityCheck {
                    signature,
                    deadline: now + self.config.stability_wait(),
                });
                Vec::new()
            }
            Phase::StabilityCheck {
                signature: first,
                deadline,
            } if now >= deadline => {
                self.set_phase(Phase::Idle);
                let second = signature(&system.active_displays());
                if first != second {
                    tracing::debug!("Topology still changing ({} -> {})", first, second);
                    return Vec::new();
                }

                tracing::info!("Display configuration settled: {}", second);
                let mut events = vec![StateEvent::ConfigurationChanged { signature: second }];
                if self.config.auto_restore {
                    events.extend(self.run_restore(RestoreTrigger::Auto, 1, now, system, store));
                }
                events
            }
            Phase::RetryPending { trigger, deadline } if now >= deadline => {
                self.set_phase(Phase::Idle);
                self.run_restore(trigger, 2, now, system, store)
            }
            Phase::Cooldown { until } if now >= until => {
                self.set_phase(Phase::Idle);
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// Manual restore. Does not depend on auto-restore being enabled and
    /// supersedes a pending retry. A debounce or stability cycle still in
    /// flight is closed first with a `ConfigurationChanged` for the live
    /// topology. Returns no restore outcome if a retry was scheduled.
    pub fn restore_now<D, P>(&mut self, now: Instant, system: &D, store: &mut P) -> Vec<StateEvent>
    where
        D: DisplaySystem + DisplayConfigurator,
        P: ProfileStore,
    {
        let mut events = Vec::new();
        match self.phase {
            Phase::RetryPending { .. } => {
                tracing::debug!("Manual restore supersedes pending retry");
                self.set_phase(Phase::Idle);
            }
            Phase::PendingDebounce { .. } | Phase::StabilityCheck { .. } => {
                let signature = signature(&system.active_displays());
                tracing::info!("Manual restore preempts settling topology: {}", signature);
                self.set_phase(Phase::Idle);
                events.push(StateEvent::ConfigurationChanged { signature });
            }
            _ => {}
        }
        events.extend(self.run_restore(RestoreTrigger::Manual, 1, now, system, store));
        events
    }

    /// Snapshot the live arrangement and save it as the default.
    pub fn save_snapshot<S, P>(
        &mut self,
        system: &S,
        store: &mut P,
    ) -> Result<DisplayLayoutProfile, SnapshotError>
    where
        S: DisplaySystem,
        P: ProfileStore,
    {
        let profile = snapshot(&system.active_displays(), unix_now())?;
        store.save_default(profile.clone());
        self.clear_tracked_positions();
        Ok(profile)
    }

    /// Re-enable auto-restore for the current topology.
    pub fn clear_override<S, P>(&mut self, system: &S, store: &mut P)
    where
        S: DisplaySystem,
        P: ProfileStore,
    {
        let signature = signature(&system.active_displays());
        store.clear_override(&signature);
        self.clear_tracked_positions();
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            tracing::debug!("Phase {} -> {}", self.phase.name(), phase.name());
        }
        self.phase = phase;
    }

    fn expire_cooldown(&mut self, now: Instant) {
        if let Phase::Cooldown { until } = self.phase {
            if now >= until {
                self.set_phase(Phase::Idle);
            }
        }
    }

    fn run_restore<D, P>(
        &mut self,
        trigger: RestoreTrigger,
        attempt: u32,
        now: Instant,
        system: &D,
        store: &mut P,
    ) -> Vec<StateEvent>
    where
        D: DisplaySystem + DisplayConfigurator,
        P: ProfileStore,
    {
        tracing::info!("Restore ({:?}) attempt {}", trigger, attempt);
        match self.attempt_restore(attempt, now, system, store) {
            Attempt::Done(outcome) => {
                tracing::info!("Restore ({:?}) finished: {}", trigger, outcome);
                vec![StateEvent::RestoreCompleted { trigger, outcome }]
            }
            Attempt::Retry { settled } => {
                tracing::info!("Verification failed, retrying once");
                self.set_phase(Phase::RetryPending {
                    trigger,
                    deadline: settled + self.config.retry_delay(),
                });
                Vec::new()
            }
        }
    }

    fn attempt_restore<D, P>(
        &mut self,
        attempt: u32,
        now: Instant,
        system: &D,
        store: &mut P,
    ) -> Attempt
    where
        D: DisplaySystem + DisplayConfigurator,
        P: ProfileStore,
    {
        let Some(profile) = store.load_default() else {
            return Attempt::Done(RestoreOutcome::NoDefault);
        };
        let displays = system.active_displays();
        let current = signature(&displays);
        if store.has_override(&current) {
            return Attempt::Done(RestoreOutcome::OverrideActive);
        }
        if system.is_mirroring_active() {
            return Attempt::Done(RestoreOutcome::MirroringDetected);
        }
        if !profile.is_well_formed() {
            return Attempt::Done(RestoreOutcome::InvalidProfile);
        }
        let Ok(mapping) = map_displays(&profile.displays, &displays) else {
            tracing::warn!("No live display matches the saved main display");
            return Attempt::Done(RestoreOutcome::MappingFailed);
        };

        self.set_phase(Phase::Applying);
        let started = Instant::now();
        let result = apply_configuration(system, &mapping);
        let verified = match result {
            Ok(_) => verify(
                &system.active_displays(),
                &mapping,
                self.config.verify_tolerance(),
            ),
            Err(_) => false,
        };
        let settled = now + started.elapsed();

        let outcome = match result {
            Err(e) => {
                tracing::warn!("Restore failed: {}", e);
                RestoreOutcome::ConfigurationFailed {
                    stage: e.stage.to_string(),
                    code: e.code,
                }
            }
            Ok(_) if verified => {
                self.applied = Some(AppliedPositions {
                    positions: mapping
                        .iter()
                        .map(|m| (m.display_id, Point::new(m.target_x, m.target_y)))
                        .collect(),
                    signature: current,
                });
                RestoreOutcome::Success
            }
            Ok(_) if attempt < 2 => return Attempt::Retry { settled },
            Ok(_) => RestoreOutcome::VerificationFailed,
        };

        self.set_phase(Phase::Cooldown {
            until: settled + self.config.cooldown(),
        });
        Attempt::Done(outcome)
    }

    fn check_manual_change<S, P>(&mut self, system: &S, store: &mut P) -> Option<StateEvent>
    where
        S: DisplaySystem,
        P: ProfileStore,
    {
        let applied = self.applied.as_ref()?;
        let displays = system.active_displays();
        let current = signature(&displays);
        if applied.signature != current || store.has_override(&current) {
            return None;
        }
        let positions = normalize_to_main(&displays)?;

        let mut moved = false;
        for (id, target) in &applied.positions {
            let Some(actual) = positions.get(id) else {
                tracing::debug!("Tracked display {} is gone, skipping manual-change check", id);
                return None;
            };
            let tolerance = self.config.manual_change_tolerance;
            if (actual.x - target.x).abs() > tolerance || (actual.y - target.y).abs() > tolerance {
                moved = true;
            }
        }
        if !moved {
            return None;
        }

        tracing::info!("Manual arrangement change detected for {}", current);
        store.set_override(&current);
        self.applied = None;
        Some(StateEvent::ManualChangeDetected { signature: current })
    }
}
