//! Records session events for later assertions.

use std::sync::{Arc, Mutex};

use crate::session::{DeviceSession, SessionEvent};

/// Collects every event a session emits.
#[derive(Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<SessionEvent>>>,
}

impl EventRecorder {
    /// Register a recorder on `session`.
    pub fn attach(session: &DeviceSession) -> Self {
        let recorder = Self::default();
        let sink = recorder.events.clone();
        session.on_event(Arc::new(move |event: &SessionEvent| {
            sink.lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(event.clone());
        }));
        recorder
    }

    /// Events recorded so far, in emission order.
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of recorded events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&SessionEvent) -> bool) -> usize {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|e| predicate(e))
            .count()
    }

    /// Forget recorded events.
    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}
