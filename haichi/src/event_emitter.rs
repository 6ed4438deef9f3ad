use std::sync::mpsc as std_mpsc;

use haichi_ipc::StateEvent;

/// Event emitter for sending state change events from the main thread to the tokio thread.
/// Uses std::sync::mpsc for thread-safe communication.
pub struct EventEmitter {
    tx: std_mpsc::Sender<StateEvent>,
}

impl EventEmitter {
    pub fn new(tx: std_mpsc::Sender<StateEvent>) -> Self {
        Self { tx }
    }

    /// Send an event to subscribers
    pub fn emit(&self, event: StateEvent) {
        tracing::debug!("Emitting event: {:?}", event);
        if let Err(e) = self.tx.send(event) {
            tracing::debug!("Failed to emit event (no receivers?): {}", e);
        }
    }

    pub fn emit_all(&self, events: impl IntoIterator<Item = StateEvent>) {
        for event in events {
            self.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_all_preserves_order() {
        let (tx, rx) = std_mpsc::channel();
        let emitter = EventEmitter::new(tx);

        emitter.emit_all(vec![
            StateEvent::ConfigurationChanged {
                signature: "a".to_string(),
            },
            StateEvent::ManualChangeDetected {
                signature: "a".to_string(),
            },
        ]);

        assert!(matches!(
            rx.try_recv(),
            Ok(StateEvent::ConfigurationChanged { .. })
        ));
        assert!(matches!(
            rx.try_recv(),
            Ok(StateEvent::ManualChangeDetected { .. })
        ));
    }

    #[test]
    fn test_emit_without_receiver_does_not_panic() {
        let (tx, rx) = std_mpsc::channel();
        drop(rx);
        EventEmitter::new(tx).emit(StateEvent::ConfigurationChanged {
            signature: String::new(),
        });
    }
}
