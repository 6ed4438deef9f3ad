mod client;
mod event_server;
mod server;

pub use client::{subscribe_and_print, IpcClient};
pub use event_server::{EventBroadcaster, EventServer};
pub use server::IpcServer;

pub const SOCKET_PATH: &str = "/tmp/haichi.sock";
pub const EVENT_SOCKET_PATH: &str = "/tmp/haichi-events.sock";
