mod channels;
mod dispatch;

use std::cell::RefCell;
use std::path::PathBuf;
use std::sync::mpsc as std_mpsc;
use std::time::Instant;

use anyhow::{Context, Result};
use core_foundation::runloop::{kCFRunLoopDefaultMode, CFRunLoop};

use crate::core::{EngineConfig, ReconfigFlags, Reconciler};
use crate::event_emitter::EventEmitter;
use crate::macos::{self, DisplayReconfigEvent};
use crate::platform::MacOSDisplaySystem;
use crate::store::JsonProfileStore;
use channels::{IpcCommandWithResponse, MainChannels};
use dispatch::{dispatch_command, PendingRestores};
use haichi_ipc::{Command, StateEvent};

const CONFIG_FILE: &str = "config.json";
const PROFILES_FILE: &str = "profiles.json";

/// Everything the serial display context owns. Lives in a thread-local on
/// the main thread for the lifetime of the run loop.
struct RunLoopContext {
    ipc_cmd_rx: std_mpsc::Receiver<IpcCommandWithResponse>,
    display_reconfig_rx: std_mpsc::Receiver<DisplayReconfigEvent>,
    system: MacOSDisplaySystem,
    store: JsonProfileStore,
    reconciler: Reconciler,
    event_emitter: EventEmitter,
    pending_restores: PendingRestores,
}

thread_local! {
    static CONTEXT: RefCell<Option<RunLoopContext>> = const { RefCell::new(None) };
}

pub struct App {}

impl App {
    pub fn run() -> Result<()> {
        let config_dir = config_dir()?;
        let config = EngineConfig::load(&config_dir.join(CONFIG_FILE))?;
        let store = JsonProfileStore::open(config_dir.join(PROFILES_FILE))?;

        let (tokio_channels, main_channels) = channels::create_channels();
        let reply_timeout = config.reply_timeout();

        // Spawn tokio runtime in separate thread
        std::thread::spawn(move || {
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::error!("Failed to start tokio runtime: {}", e);
                    return;
                }
            };
            rt.block_on(channels::run_async(tokio_channels, reply_timeout));
        });

        let app = App {};
        app.run_main_loop(main_channels, config, store)
    }

    fn run_main_loop(
        self,
        channels: MainChannels,
        config: EngineConfig,
        store: JsonProfileStore,
    ) -> Result<()> {
        tracing::info!("Starting main loop");

        let MainChannels {
            ipc_cmd_rx,
            state_event_tx,
            display_reconfig_tx,
            display_reconfig_rx,
        } = channels;

        macos::register_display_callback(display_reconfig_tx)?;
        let mut reconciler = Reconciler::new(config);
        reconciler.start_observing();

        CONTEXT.with(|slot| {
            *slot.borrow_mut() = Some(RunLoopContext {
                ipc_cmd_rx,
                display_reconfig_rx,
                system: MacOSDisplaySystem,
                store,
                reconciler,
                event_emitter: EventEmitter::new(state_event_tx),
                pending_restores: PendingRestores::new(),
            });
        });

        let mut timer_context = core_foundation::runloop::CFRunLoopTimerContext {
            version: 0,
            info: std::ptr::null_mut(),
            retain: None,
            release: None,
            copyDescription: None,
        };

        extern "C" fn timer_callback(
            _timer: core_foundation::runloop::CFRunLoopTimerRef,
            _info: *mut std::ffi::c_void,
        ) {
            let quit = CONTEXT.with(|slot| match slot.borrow_mut().as_mut() {
                Some(ctx) => ctx.poll(),
                None => false,
            });
            if quit {
                CFRunLoop::get_current().stop();
            }
        }

        let timer = unsafe {
            core_foundation::runloop::CFRunLoopTimer::new(
                core_foundation::date::CFAbsoluteTimeGetCurrent(),
                0.05, // 50ms interval
                0,
                0,
                timer_callback,
                &mut timer_context,
            )
        };

        let run_loop = CFRunLoop::get_current();
        run_loop.add_timer(&timer, unsafe { kCFRunLoopDefaultMode });

        tracing::info!("Entering CFRunLoop");
        CFRunLoop::run_current();
        tracing::info!("CFRunLoop exited");

        macos::unregister_display_callback();
        CONTEXT.with(|slot| {
            if let Some(mut ctx) = slot.borrow_mut().take() {
                ctx.reconciler.stop_observing();
                ctx.pending_restores.fail_all("haichi is shutting down");
            }
        });
        Ok(())
    }
}

impl RunLoopContext {
    /// Drain queued work and advance timers. Returns true on quit.
    fn poll(&mut self) -> bool {
        let mut quit = false;

        // Process IPC commands
        while let Ok((cmd, resp_tx)) = self.ipc_cmd_rx.try_recv() {
            tracing::debug!("Received IPC command: {:?}", cmd);
            let result = dispatch_command(
                &cmd,
                &mut self.reconciler,
                &self.system,
                &mut self.store,
                &self.event_emitter,
                Instant::now(),
            );
            self.pending_restores.route(result, resp_tx);

            // Handle Quit command after sending response
            if matches!(cmd, Command::Quit) {
                quit = true;
            }
        }
        if quit {
            return true;
        }

        // Process display reconfiguration callbacks
        while let Ok(event) = self.display_reconfig_rx.try_recv() {
            let flags = ReconfigFlags::from_bits_retain(event.flags);
            tracing::debug!(
                "Display reconfiguration: display={} flags={:?}",
                event.display_id,
                flags
            );
            let events =
                self.reconciler
                    .handle_reconfig(flags, Instant::now(), &self.system, &mut self.store);
            self.publish(events);
        }

        let events = self
            .reconciler
            .tick(Instant::now(), &self.system, &mut self.store);
        self.publish(events);

        false
    }

    fn publish(&mut self, events: Vec<StateEvent>) {
        if events.is_empty() {
            return;
        }
        self.pending_restores.resolve(&events);
        self.event_emitter.emit_all(events);
    }
}

fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("haichi"))
        .context("Could not determine the user config directory")
}
