use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;

use haichi_ipc::{StateEvent, SubscribeRequest};

use super::EVENT_SOCKET_PATH;

pub struct EventServer {
    socket_path: PathBuf,
    event_rx: broadcast::Receiver<StateEvent>,
}

impl EventServer {
    pub fn new(event_rx: broadcast::Receiver<StateEvent>) -> Self {
        Self {
            socket_path: PathBuf::from(EVENT_SOCKET_PATH),
            event_rx,
        }
    }

    pub async fn run(self) -> Result<()> {
        // Remove existing socket file if it exists
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)
                .with_context(|| format!("Failed to remove stale socket {:?}", self.socket_path))?;
        }

        let listener = UnixListener::bind(&self.socket_path)
            .with_context(|| format!("Failed to bind {:?}", self.socket_path))?;
        tracing::info!("Event server listening on {:?}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let event_rx = self.event_rx.resubscribe();
                    tokio::spawn(async move {
                        if let Err(e) = Self::handle_connection(stream, event_rx).await {
                            tracing::debug!("Event subscriber disconnected: {}", e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Event server accept error: {}", e);
                }
            }
        }
    }

    async fn handle_connection(
        stream: UnixStream,
        mut event_rx: broadcast::Receiver<StateEvent>,
    ) -> Result<()> {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        // Read subscribe request
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Ok(()); // EOF
        }

        let request: SubscribeRequest = serde_json::from_str(line.trim()).unwrap_or_default();
        let filter = request.effective_filter();

        tracing::debug!("New event subscriber with filter: {:?}", filter);

        loop {
            match event_rx.recv().await {
                Ok(event) => {
                    if filter.matches(&event) {
                        let json = serde_json::to_string(&event)?;
                        writer.write_all(json.as_bytes()).await?;
                        writer.write_all(b"\n").await?;
                        writer.flush().await?;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Event subscriber lagged by {} messages", n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    break;
                }
            }
        }

        Ok(())
    }
}

impl Drop for EventServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

/// Event broadcaster that holds the sender side of the broadcast channel
#[derive(Clone)]
pub struct EventBroadcaster {
    event_tx: broadcast::Sender<StateEvent>,
}

impl EventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity);
        Self { event_tx }
    }

    /// Get a receiver for the event server
    pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
        self.event_tx.subscribe()
    }

    /// Send an event to all subscribers
    pub fn send(&self, event: StateEvent) {
        // Ignore send errors (no subscribers)
        let _ = self.event_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haichi_ipc::{RestoreOutcome, RestoreTrigger};

    #[test]
    fn test_broadcaster_fans_out_to_subscribers() {
        let broadcaster = EventBroadcaster::new(8);
        let mut a = broadcaster.subscribe();
        let mut b = a.resubscribe();

        let event = StateEvent::RestoreCompleted {
            trigger: RestoreTrigger::Auto,
            outcome: RestoreOutcome::Success,
        };
        broadcaster.send(event.clone());

        assert_eq!(a.try_recv().unwrap(), event);
        assert_eq!(b.try_recv().unwrap(), event);
    }

    #[test]
    fn test_send_without_subscribers_is_ignored() {
        EventBroadcaster::new(1).send(StateEvent::ConfigurationChanged {
            signature: "1".to_string(),
        });
    }
}
