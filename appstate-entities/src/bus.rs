//! Clone-shared state bus.

use std::collections::HashMap;
use std::sync::Arc;

use appstate_primitives::EntityId;
use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use crate::{EntityState, StateValue};

const EVENT_CAPACITY: usize = 128;

/// An event fired by an app, broadcast to all subscribers.
#[derive(Clone, Debug, PartialEq)]
pub struct StateEvent {
    /// Event name, e.g. `twitch_playback_state_changed`.
    pub name: String,
    /// Structured event payload.
    pub payload: Value,
}

struct Inner {
    states: RwLock<HashMap<EntityId, EntityState>>,
    events: broadcast::Sender<StateEvent>,
}

/// Central entity store shared by all running apps.
#[derive(Clone)]
pub struct StateBus {
    inner: Arc<Inner>,
}

impl Default for StateBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StateBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateBus")
            .field("subscribers", &self.inner.events.receiver_count())
            .finish()
    }
}

impl StateBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                states: RwLock::new(HashMap::new()),
                events,
            }),
        }
    }

    /// Publishes the latest state of an entity, replacing any previous value.
    pub async fn set_state(
        &self,
        entity: EntityId,
        value: StateValue,
        attributes: Map<String, Value>,
    ) {
        debug!(entity = %entity, state = %value, "set_state");
        let state = EntityState {
            value,
            attributes,
            updated: Utc::now(),
        };
        self.inner.states.write().await.insert(entity, state);
    }

    /// Returns the latest state of an entity, if one was ever published.
    pub async fn state_of(&self, entity: &EntityId) -> Option<EntityState> {
        self.inner.states.read().await.get(entity).cloned()
    }

    /// Returns `true` when the entity currently reports `on`.
    pub async fn is_on(&self, entity: &EntityId) -> bool {
        self.inner
            .states
            .read()
            .await
            .get(entity)
            .is_some_and(|state| state.value.is_on())
    }

    /// Fires an event. Publishing never fails; without subscribers the event
    /// is simply dropped.
    pub fn fire_event(&self, name: impl Into<String>, payload: Value) {
        let event = StateEvent {
            name: name.into(),
            payload,
        };
        debug!(event = %event.name, "fire_event");
        let _ = self.inner.events.send(event);
    }

    /// Subscribes to the event stream.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
        self.inner.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn stores_latest_state() {
        let bus = StateBus::new();
        let entity = EntityId::sensor("firetv_twitch_playback_state").unwrap();

        bus.set_state(entity.clone(), StateValue::Integer(3), Map::new())
            .await;
        let state = bus.state_of(&entity).await.unwrap();
        assert_eq!(state.value, StateValue::Integer(3));

        bus.set_state(entity.clone(), StateValue::Unknown, Map::new())
            .await;
        let state = bus.state_of(&entity).await.unwrap();
        assert_eq!(state.value, StateValue::Unknown);
    }

    #[tokio::test]
    async fn is_on_only_for_on_binary_sensors() {
        let bus = StateBus::new();
        let entity = EntityId::binary_sensor("firetv_twitch_playing").unwrap();

        assert!(!bus.is_on(&entity).await);
        bus.set_state(entity.clone(), StateValue::OnOff(true), Map::new())
            .await;
        assert!(bus.is_on(&entity).await);
        bus.set_state(entity.clone(), StateValue::OnOff(false), Map::new())
            .await;
        assert!(!bus.is_on(&entity).await);
    }

    #[tokio::test]
    async fn events_reach_subscribers() {
        let bus = StateBus::new();
        let mut events = bus.subscribe();

        bus.fire_event("twitch_playback_state_changed", json!({"state": 3}));
        let event = events.recv().await.unwrap();
        assert_eq!(event.name, "twitch_playback_state_changed");
        assert_eq!(event.payload["state"], 3);
    }

    #[test]
    fn firing_without_subscribers_is_fine() {
        let bus = StateBus::new();
        bus.fire_event("twitch_is_focused_changed", json!({"state": null}));
    }
}
