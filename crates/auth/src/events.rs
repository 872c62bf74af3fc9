use tokio::sync::broadcast;

use crate::token::UserInfo;

/// Authentication state transitions published to interested components.
#[derive(Clone, Debug)]
pub enum AuthEvent {
    /// A token was obtained through an interactive code exchange.
    SignedIn { user: Option<UserInfo> },
    /// The current token was replaced by a successful refresh.
    TokenRefreshed,
    /// Tokens were cleared and the session is over.
    SignedOut { reason: SignOutReason },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SignOutReason {
    UserRequested,
    RefreshFailed,
}

/// Broadcast bus that fans auth transitions out to any number of listeners.
///
/// Publishing never blocks and never fails: with no subscribers the event is
/// dropped, and a lagging subscriber loses old events rather than stalling
/// the publisher.
#[derive(Clone)]
pub struct AuthEventBus {
    sender: broadcast::Sender<AuthEvent>,
}

impl AuthEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        AuthEventBus { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: AuthEvent) {
        // send only errors when there are no receivers, which is fine
        let _ = self.sender.send(event);
    }
}

impl Default for AuthEventBus {
    fn default() -> Self {
        AuthEventBus::new(16)
    }
}
