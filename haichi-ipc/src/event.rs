use serde::{Deserialize, Serialize};

use crate::{RestoreOutcome, RestoreTrigger};

/// Event filter for subscribing to specific event types
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// Subscribe to configuration changed events
    #[serde(default)]
    pub configuration: bool,
    /// Subscribe to restore completed events
    #[serde(default)]
    pub restore: bool,
    /// Subscribe to manual change events
    #[serde(default)]
    pub manual_change: bool,
}

impl EventFilter {
    /// Create a filter that subscribes to all events
    pub fn all() -> Self {
        Self {
            configuration: true,
            restore: true,
            manual_change: true,
        }
    }

    /// Check if the filter matches a given event
    pub fn matches(&self, event: &StateEvent) -> bool {
        match event {
            StateEvent::ConfigurationChanged { .. } => self.configuration,
            StateEvent::RestoreCompleted { .. } => self.restore,
            StateEvent::ManualChangeDetected { .. } => self.manual_change,
        }
    }

    /// Check if any filter is set
    pub fn any(&self) -> bool {
        self.configuration || self.restore || self.manual_change
    }
}

/// Request to subscribe to state events
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscribeRequest {
    /// Event filter (if not set or all false, subscribes to all events)
    #[serde(default)]
    pub filter: EventFilter,
}

impl SubscribeRequest {
    /// Get the effective filter (all if none specified)
    pub fn effective_filter(&self) -> EventFilter {
        if self.filter.any() {
            self.filter.clone()
        } else {
            EventFilter::all()
        }
    }
}

/// Notifications sent to subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateEvent {
    /// Display topology settled after a change.
    ConfigurationChanged { signature: String },
    RestoreCompleted {
        trigger: RestoreTrigger,
        outcome: RestoreOutcome,
    },
    /// The user rearranged displays after a restore; auto-restore is now
    /// suppressed for this signature.
    ManualChangeDetected { signature: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restore_completed_serialization() {
        let event = StateEvent::RestoreCompleted {
            trigger: RestoreTrigger::Auto,
            outcome: RestoreOutcome::Success,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"restore_completed\""));
        assert!(json.contains("\"trigger\":\"auto\""));

        let deserialized: StateEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, event);
    }

    #[test]
    fn test_effective_filter_defaults_to_all() {
        let req = SubscribeRequest::default();
        let filter = req.effective_filter();
        assert!(filter.configuration && filter.restore && filter.manual_change);
    }

    #[test]
    fn test_filter_matches() {
        let filter = EventFilter {
            manual_change: true,
            ..Default::default()
        };
        assert!(filter.matches(&StateEvent::ManualChangeDetected {
            signature: "x".to_string()
        }));
        assert!(!filter.matches(&StateEvent::ConfigurationChanged {
            signature: "x".to_string()
        }));
    }

    #[test]
    fn test_subscribe_request_deserializes_partial() {
        let req: SubscribeRequest =
            serde_json::from_str("{\"filter\":{\"restore\":true}}").unwrap();
        assert!(req.filter.restore);
        assert!(!req.filter.configuration);
    }
}
