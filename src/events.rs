//! Process-wide session notifications.
//!
//! Independent parts of the application (the shell, the permission cache,
//! open screens) each hold a receiver and reset their own derived state when
//! the session changes. Expiry is broadcast here rather than only returned as
//! an error because the call that discovers it is rarely the one that owns
//! the state to reset.
//!
//! ```
//! use dashboard_client::{SessionEvent, SessionEvents};
//!
//! # tokio_test::block_on(async {
//! let events = SessionEvents::new();
//! let mut permissions = events.subscribe();
//!
//! events.emit(SessionEvent::Expired);
//! assert_eq!(permissions.recv().await.unwrap(), SessionEvent::Expired);
//! # });
//! ```

use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 16;

/// A change in the signed-in session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// A user signed in.
    LoggedIn,
    /// The user signed out.
    LoggedOut,
    /// The credential was rejected and could not be refreshed; it has been cleared.
    Expired,
}

/// Broadcast hub for [`SessionEvent`]s. Clones share the channel.
#[derive(Debug, Clone)]
pub struct SessionEvents {
    sender: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    /// A hub with no subscribers yet.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Notify all current subscribers. Having none is fine.
    pub fn emit(&self, event: SessionEvent) {
        let delivered = self.sender.send(event).unwrap_or(0);
        tracing::debug!(?event, delivered, "session event emitted");
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_subscriber_receives() {
        let events = SessionEvents::new();
        let mut shell = events.subscribe();
        let mut permissions = events.subscribe();
        assert_eq!(events.subscriber_count(), 2);

        events.emit(SessionEvent::Expired);

        assert_eq!(shell.recv().await.unwrap(), SessionEvent::Expired);
        assert_eq!(permissions.recv().await.unwrap(), SessionEvent::Expired);
    }

    #[test]
    fn test_emit_without_subscribers() {
        SessionEvents::new().emit(SessionEvent::LoggedOut);
    }
}
