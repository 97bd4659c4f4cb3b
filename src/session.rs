/// Signed-in-user state with an explicit lifecycle
///
/// The session is process-wide state, not an ad hoc singleton:
/// - initialized at startup by querying the identity collaborator
/// - updated only through the collaborator's change subscription
/// - torn down by dropping the subscription on shutdown

use tokio::sync::watch;

use crate::remote::{Identity, RemoteError, User};

#[derive(Debug, Clone)]
pub struct Session {
    current: Option<User>,
    subscription: Option<watch::Receiver<Option<User>>>,
}

impl Session {
    /// A signed-out session with no subscription, used when the identity
    /// collaborator cannot be reached at startup
    pub fn disconnected() -> Self {
        Session {
            current: None,
            subscription: None,
        }
    }

    /// Query the identity collaborator for the restored session and
    /// subscribe to its change notifications
    pub async fn initialize<I: Identity>(identity: &I) -> Result<Self, RemoteError> {
        let current = identity.current_user().await?;
        let subscription = identity.subscribe();
        Ok(Session {
            current,
            subscription: Some(subscription),
        })
    }

    pub fn user(&self) -> Option<&User> {
        self.current.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.current.is_some()
    }

    /// Apply a value observed on the change subscription.
    /// This is the only mutation path after initialization.
    ///
    /// Reads through the stored subscription when one exists: that marks
    /// the change as seen, so the next `watcher` clone waits for a new
    /// change instead of re-observing this one, and it picks up anything
    /// newer that landed since the observation.
    pub fn apply(&mut self, user: Option<User>) {
        self.current = match self.subscription.as_mut() {
            Some(rx) => rx.borrow_and_update().clone(),
            None => user,
        };
    }

    /// A receiver to wait on for the next change, or None after shutdown
    pub fn watcher(&self) -> Option<watch::Receiver<Option<User>>> {
        self.subscription.clone()
    }

    /// Drop the change subscription; no further updates are observed
    pub fn shutdown(&mut self) {
        self.subscription = None;
    }
}

/// Wait for the next session change on `rx`.
/// Returns None when the identity collaborator has gone away.
pub async fn next_change(mut rx: watch::Receiver<Option<User>>) -> Option<Option<User>> {
    rx.changed().await.ok()?;
    Some(rx.borrow_and_update().clone())
}
