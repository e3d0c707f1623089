//! Stream subscriptions index.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Default)]
struct HubState {
    /// stream -> session id -> channel identifiers
    streams: HashMap<String, HashMap<String, HashSet<String>>>,
    /// session id -> channel identifier -> streams
    sessions: HashMap<String, HashMap<String, HashSet<String>>>,
}

/// Maps streams to the (session, channel) pairs listening on them.
#[derive(Default)]
pub struct Hub {
    state: Mutex<HubState>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, sid: &str, identifier: &str, stream: &str) {
        let mut state = self.state.lock().expect("hub mutex poisoned");

        state
            .streams
            .entry(stream.to_string())
            .or_default()
            .entry(sid.to_string())
            .or_default()
            .insert(identifier.to_string());

        state
            .sessions
            .entry(sid.to_string())
            .or_default()
            .entry(identifier.to_string())
            .or_default()
            .insert(stream.to_string());
    }

    pub fn unsubscribe(&self, sid: &str, identifier: &str, stream: &str) {
        let mut state = self.state.lock().expect("hub mutex poisoned");
        Self::remove_stream(&mut state, sid, identifier, stream);

        if let Some(channels) = state.sessions.get_mut(sid) {
            if let Some(streams) = channels.get_mut(identifier) {
                streams.remove(stream);
                if streams.is_empty() {
                    channels.remove(identifier);
                }
            }
            if channels.is_empty() {
                state.sessions.remove(sid);
            }
        }
    }

    /// Stop every stream of one channel subscription.
    pub fn unsubscribe_all(&self, sid: &str, identifier: &str) {
        let mut state = self.state.lock().expect("hub mutex poisoned");

        let streams = state
            .sessions
            .get_mut(sid)
            .and_then(|channels| channels.remove(identifier))
            .unwrap_or_default();

        if state.sessions.get(sid).is_some_and(HashMap::is_empty) {
            state.sessions.remove(sid);
        }

        for stream in streams {
            Self::remove_stream(&mut state, sid, identifier, &stream);
        }
    }

    pub fn remove_session(&self, sid: &str) {
        let mut state = self.state.lock().expect("hub mutex poisoned");

        let Some(channels) = state.sessions.remove(sid) else {
            return;
        };

        for (identifier, streams) in channels {
            for stream in streams {
                Self::remove_stream(&mut state, sid, &identifier, &stream);
            }
        }
    }

    /// (session id, channel identifier) pairs subscribed to a stream.
    pub fn subscribers(&self, stream: &str) -> Vec<(String, String)> {
        let state = self.state.lock().expect("hub mutex poisoned");

        state
            .streams
            .get(stream)
            .map(|sessions| {
                sessions
                    .iter()
                    .flat_map(|(sid, identifiers)| {
                        identifiers.iter().map(move |id| (sid.clone(), id.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn streams_count(&self) -> usize {
        self.state.lock().expect("hub mutex poisoned").streams.len()
    }

    fn remove_stream(state: &mut HubState, sid: &str, identifier: &str, stream: &str) {
        let Some(sessions) = state.streams.get_mut(stream) else {
            return;
        };

        if let Some(identifiers) = sessions.get_mut(sid) {
            identifiers.remove(identifier);
            if identifiers.is_empty() {
                sessions.remove(sid);
            }
        }
        if sessions.is_empty() {
            state.streams.remove(stream);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fans_out_to_every_subscription() {
        let hub = Hub::new();
        hub.subscribe("s1", "chat_1", "room");
        hub.subscribe("s1", "chat_2", "room");
        hub.subscribe("s2", "chat_1", "room");

        let mut subscribers = hub.subscribers("room");
        subscribers.sort();
        assert_eq!(
            subscribers,
            vec![
                ("s1".to_string(), "chat_1".to_string()),
                ("s1".to_string(), "chat_2".to_string()),
                ("s2".to_string(), "chat_1".to_string()),
            ]
        );
    }

    #[test]
    fn unsubscribe_all_only_touches_one_channel() {
        let hub = Hub::new();
        hub.subscribe("s1", "chat", "room_a");
        hub.subscribe("s1", "chat", "room_b");
        hub.subscribe("s1", "presence", "room_a");

        hub.unsubscribe_all("s1", "chat");

        assert_eq!(hub.subscribers("room_a"), vec![("s1".into(), "presence".into())]);
        assert!(hub.subscribers("room_b").is_empty());
        assert_eq!(hub.streams_count(), 1);
    }

    #[test]
    fn removing_session_drops_empty_streams() {
        let hub = Hub::new();
        hub.subscribe("s1", "chat", "room");
        hub.subscribe("s2", "chat", "room");
        hub.unsubscribe("s2", "chat", "room");
        hub.remove_session("s1");

        assert!(hub.subscribers("room").is_empty());
        assert_eq!(hub.streams_count(), 0);
    }
}
