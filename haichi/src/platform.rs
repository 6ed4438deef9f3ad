use crate::core::LiveDisplay;
use crate::macos::{self, DisplayConfigRef, DisplayId};

/// Trait for querying display information from the system.
/// This abstraction allows mocking in tests.
pub trait DisplaySystem {
    fn active_displays(&self) -> Vec<LiveDisplay>;
    fn is_mirroring_active(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitMode {
    Permanent,
    Session,
}

/// Trait for display configuration transactions (side effects).
/// Errors are raw CGError codes.
pub trait DisplayConfigurator {
    type Config;

    fn begin_configuration(&self) -> Result<Self::Config, i32>;
    fn configure_origin(
        &self,
        config: &Self::Config,
        display_id: DisplayId,
        x: i32,
        y: i32,
    ) -> Result<(), i32>;
    /// Consumes the configuration whether or not the commit succeeds.
    fn complete_configuration(&self, config: Self::Config, mode: CommitMode) -> Result<(), i32>;
    fn cancel_configuration(&self, config: Self::Config);
}

/// macOS implementation of DisplaySystem and DisplayConfigurator
#[derive(Default)]
pub struct MacOSDisplaySystem;

impl DisplaySystem for MacOSDisplaySystem {
    fn active_displays(&self) -> Vec<LiveDisplay> {
        macos::get_all_displays()
            .iter()
            .map(LiveDisplay::from_display_info)
            .collect()
    }

    fn is_mirroring_active(&self) -> bool {
        macos::is_mirroring_active()
    }
}

impl DisplayConfigurator for MacOSDisplaySystem {
    type Config = DisplayConfigRef;

    fn begin_configuration(&self) -> Result<DisplayConfigRef, i32> {
        macos::begin_configuration()
    }

    fn configure_origin(
        &self,
        config: &DisplayConfigRef,
        display_id: DisplayId,
        x: i32,
        y: i32,
    ) -> Result<(), i32> {
        macos::configure_display_origin(*config, display_id, x, y)
    }

    fn complete_configuration(&self, config: DisplayConfigRef, mode: CommitMode) -> Result<(), i32> {
        let option = match mode {
            CommitMode::Permanent => macos::CONFIGURE_PERMANENTLY,
            CommitMode::Session => macos::CONFIGURE_FOR_SESSION,
        };
        macos::complete_configuration(config, option)
    }

    fn cancel_configuration(&self, config: DisplayConfigRef) {
        macos::cancel_configuration(config)
    }
}

#[cfg(test)]
pub mod mock {
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::time::Duration;

    use super::*;
    use crate::core::Rect;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ConfigCall {
        Begin,
        ConfigureOrigin {
            display_id: DisplayId,
            x: i32,
            y: i32,
        },
        Complete(CommitMode),
        Cancel,
    }

    /// Scriptable display system. Committed origins are applied to the
    /// display list, then the next queued drift (if any) is added on top,
    /// standing in for the OS nudging displays after a commit.
    #[derive(Default)]
    pub struct MockDisplaySystem {
        displays: RefCell<Vec<LiveDisplay>>,
        mirroring: Cell<bool>,
        probe_count: Cell<usize>,
        calls: RefCell<Vec<ConfigCall>>,
        pending: RefCell<Vec<(DisplayId, i32, i32)>>,
        fail_begin: Cell<Option<i32>>,
        fail_origin: Cell<Option<(DisplayId, i32)>>,
        fail_permanent: Cell<Option<i32>>,
        fail_session: Cell<Option<i32>>,
        drift: RefCell<VecDeque<Vec<(DisplayId, i32, i32)>>>,
        commit_delay: Cell<Option<Duration>>,
    }

    impl MockDisplaySystem {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_displays(self, displays: Vec<LiveDisplay>) -> Self {
            *self.displays.borrow_mut() = displays;
            self
        }

        pub fn with_mirroring(self, mirroring: bool) -> Self {
            self.mirroring.set(mirroring);
            self
        }

        pub fn with_begin_failure(self, code: i32) -> Self {
            self.fail_begin.set(Some(code));
            self
        }

        pub fn with_origin_failure(self, display_id: DisplayId, code: i32) -> Self {
            self.fail_origin.set(Some((display_id, code)));
            self
        }

        pub fn with_permanent_commit_failure(self, code: i32) -> Self {
            self.fail_permanent.set(Some(code));
            self
        }

        pub fn with_session_commit_failure(self, code: i32) -> Self {
            self.fail_session.set(Some(code));
            self
        }

        /// Each commit blocks this long, like a slow display server.
        pub fn with_commit_delay(self, delay: Duration) -> Self {
            self.commit_delay.set(Some(delay));
            self
        }

        /// Queue per-display (dx, dy) offsets applied after the next commit.
        pub fn push_drift(&self, offsets: Vec<(DisplayId, i32, i32)>) {
            self.drift.borrow_mut().push_back(offsets);
        }

        pub fn set_displays(&self, displays: Vec<LiveDisplay>) {
            *self.displays.borrow_mut() = displays;
        }

        pub fn move_display(&self, display_id: DisplayId, x: i32, y: i32) {
            if let Some(d) = self
                .displays
                .borrow_mut()
                .iter_mut()
                .find(|d| d.id == display_id)
            {
                d.bounds.x = x;
                d.bounds.y = y;
            }
        }

        pub fn remove_display(&self, display_id: DisplayId) {
            self.displays.borrow_mut().retain(|d| d.id != display_id);
        }

        pub fn displays(&self) -> Vec<LiveDisplay> {
            self.displays.borrow().clone()
        }

        pub fn probe_count(&self) -> usize {
            self.probe_count.get()
        }

        pub fn calls(&self) -> Vec<ConfigCall> {
            self.calls.borrow().clone()
        }

        pub fn commits(&self) -> usize {
            self.calls
                .borrow()
                .iter()
                .filter(|c| matches!(c, ConfigCall::Complete(_)))
                .count()
        }

        fn commit_pending(&self) {
            let pending: Vec<_> = self.pending.borrow_mut().drain(..).collect();
            let mut displays = self.displays.borrow_mut();
            for (id, x, y) in pending {
                if let Some(d) = displays.iter_mut().find(|d| d.id == id) {
                    d.bounds.x = x;
                    d.bounds.y = y;
                }
            }
            // The display placed at the global origin becomes main
            if displays.iter().any(|d| d.bounds.x == 0 && d.bounds.y == 0) {
                for d in displays.iter_mut() {
                    d.is_main = d.bounds.x == 0 && d.bounds.y == 0;
                }
            }
            if let Some(offsets) = self.drift.borrow_mut().pop_front() {
                for (id, dx, dy) in offsets {
                    if let Some(d) = displays.iter_mut().find(|d| d.id == id) {
                        d.bounds.x += dx;
                        d.bounds.y += dy;
                    }
                }
            }
        }
    }

    impl DisplaySystem for MockDisplaySystem {
        fn active_displays(&self) -> Vec<LiveDisplay> {
            self.probe_count.set(self.probe_count.get() + 1);
            self.displays.borrow().clone()
        }

        fn is_mirroring_active(&self) -> bool {
            self.mirroring.get()
        }
    }

    impl DisplayConfigurator for MockDisplaySystem {
        type Config = ();

        fn begin_configuration(&self) -> Result<(), i32> {
            self.calls.borrow_mut().push(ConfigCall::Begin);
            if let Some(code) = self.fail_begin.get() {
                return Err(code);
            }
            self.pending.borrow_mut().clear();
            Ok(())
        }

        fn configure_origin(
            &self,
            _config: &(),
            display_id: DisplayId,
            x: i32,
            y: i32,
        ) -> Result<(), i32> {
            self.calls
                .borrow_mut()
                .push(ConfigCall::ConfigureOrigin { display_id, x, y });
            if let Some((id, code)) = self.fail_origin.get() {
                if id == display_id {
                    return Err(code);
                }
            }
            self.pending.borrow_mut().push((display_id, x, y));
            Ok(())
        }

        fn complete_configuration(&self, _config: (), mode: CommitMode) -> Result<(), i32> {
            self.calls.borrow_mut().push(ConfigCall::Complete(mode));
            if let Some(delay) = self.commit_delay.get() {
                std::thread::sleep(delay);
            }
            let failure = match mode {
                CommitMode::Permanent => self.fail_permanent.get(),
                CommitMode::Session => self.fail_session.get(),
            };
            if let Some(code) = failure {
                self.pending.borrow_mut().clear();
                return Err(code);
            }
            self.commit_pending();
            Ok(())
        }

        fn cancel_configuration(&self, _config: ()) {
            self.calls.borrow_mut().push(ConfigCall::Cancel);
            self.pending.borrow_mut().clear();
        }
    }

    impl LiveDisplay {
        pub fn with_hardware(mut self, vendor: u32, model: u32) -> Self {
            self.vendor = vendor;
            self.model = model;
            self
        }
    }

    pub fn create_test_display(
        id: DisplayId,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> LiveDisplay {
        LiveDisplay {
            id,
            name: format!("Display {}", id),
            bounds: Rect::new(x, y, width, height),
            is_main: id == 1,
            is_builtin: false,
            vendor: 4268,
            model: 16560 + id,
        }
    }
}
