use std::sync::mpsc as std_mpsc;
use std::time::Duration;

use core_foundation_sys::runloop::{CFRunLoopGetMain, CFRunLoopStop};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

use crate::ipc::{EventBroadcaster, EventServer, IpcServer};
use crate::macos::DisplayReconfigEvent;
use haichi_ipc::{Command, Response, StateEvent};

pub type IpcCommandWithResponse = (Command, mpsc::Sender<Response>);

pub struct IpcRelay {
    pub cmd_tx: std_mpsc::Sender<IpcCommandWithResponse>,
    pub server_tx: mpsc::Sender<IpcCommandWithResponse>,
    pub server_rx: mpsc::Receiver<IpcCommandWithResponse>,
}

pub struct EventStreaming {
    pub broadcaster: EventBroadcaster,
    pub event_server_rx: tokio::sync::broadcast::Receiver<StateEvent>,
    pub state_event_rx: std_mpsc::Receiver<StateEvent>,
}

pub struct TokioChannels {
    pub ipc: IpcRelay,
    pub events: EventStreaming,
}

pub struct MainChannels {
    pub ipc_cmd_rx: std_mpsc::Receiver<IpcCommandWithResponse>,
    pub state_event_tx: std_mpsc::Sender<StateEvent>,
    pub display_reconfig_tx: std_mpsc::Sender<DisplayReconfigEvent>,
    pub display_reconfig_rx: std_mpsc::Receiver<DisplayReconfigEvent>,
}

pub fn create_channels() -> (TokioChannels, MainChannels) {
    // Channel: IPC commands (tokio -> main thread)
    let (ipc_cmd_tx, ipc_cmd_rx) = std_mpsc::channel::<IpcCommandWithResponse>();

    // Channel for IPC server (tokio internal)
    let (ipc_server_tx, ipc_server_rx) = mpsc::channel::<IpcCommandWithResponse>(256);

    // Event broadcasting for state streaming
    let event_broadcaster = EventBroadcaster::new(256);
    let event_server_rx = event_broadcaster.subscribe();

    // Channel: state events (main thread -> tokio)
    let (state_event_tx, state_event_rx) = std_mpsc::channel::<StateEvent>();

    // Channel: display reconfiguration events (callback -> main thread)
    let (display_reconfig_tx, display_reconfig_rx) = std_mpsc::channel::<DisplayReconfigEvent>();

    let tokio_channels = TokioChannels {
        ipc: IpcRelay {
            cmd_tx: ipc_cmd_tx,
            server_tx: ipc_server_tx,
            server_rx: ipc_server_rx,
        },
        events: EventStreaming {
            broadcaster: event_broadcaster,
            event_server_rx,
            state_event_rx,
        },
    };

    let main_channels = MainChannels {
        ipc_cmd_rx,
        state_event_tx,
        display_reconfig_tx,
        display_reconfig_rx,
    };

    (tokio_channels, main_channels)
}

pub async fn run_async(channels: TokioChannels, reply_timeout: Duration) {
    // Destructure for partial moves
    let TokioChannels { ipc, events } = channels;
    let IpcRelay {
        cmd_tx: ipc_cmd_tx,
        server_tx: ipc_server_tx,
        server_rx: mut ipc_rx,
    } = ipc;
    let EventStreaming {
        broadcaster: event_broadcaster,
        event_server_rx,
        state_event_rx,
    } = events;

    tracing::info!("Tokio runtime started");

    // Start IPC server
    let ipc_server = IpcServer::new(ipc_server_tx, reply_timeout);
    tokio::spawn(async move {
        if let Err(e) = ipc_server.run().await {
            tracing::error!("IPC server error: {:#}", e);
        }
    });

    // Start Event server
    let event_server = EventServer::new(event_server_rx);
    tokio::spawn(async move {
        if let Err(e) = event_server.run().await {
            tracing::error!("Event server error: {:#}", e);
        }
    });

    // Forward state events from main thread to broadcast channel
    let broadcaster_clone = event_broadcaster.clone();
    std::thread::spawn(move || {
        while let Ok(event) = state_event_rx.recv() {
            broadcaster_clone.send(event);
        }
    });

    tokio::spawn(async {
        match wait_for_shutdown_signal().await {
            Ok(()) => {
                tracing::info!("Shutdown signal received");
                stop_main_run_loop();
            }
            Err(e) => tracing::warn!("Failed to install signal handlers: {}", e),
        }
    });

    while let Some((cmd, resp_tx)) = ipc_rx.recv().await {
        // Forward IPC commands to main thread
        if ipc_cmd_tx.send((cmd, resp_tx)).is_err() {
            tracing::error!("Failed to forward IPC command to main thread");
            break;
        }
    }

    tracing::info!("Tokio runtime exiting");
}

async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

/// CFRunLoopStop is safe to call from any thread.
fn stop_main_run_loop() {
    unsafe {
        CFRunLoopStop(CFRunLoopGetMain());
    }
}
