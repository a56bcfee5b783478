//! The till's view of who is signed in.
//!
//! A [`SessionHolder`] is started once at boot. It subscribes to the
//! backend's session-change stream *before* fetching the current session, so
//! no event between the two can be lost, and then overwrites its copy with
//! every event's payload. Handlers read it through application state; nothing
//! else caches the session.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use countertop_core::{Identity, Session};

use crate::backend::Auth;
use crate::error::{clear_sentry_user, set_sentry_user};

/// How long a handler waits for the holder to observe its own sign-in/out.
pub const AUTH_CHANGE_WAIT: Duration = Duration::from_secs(2);

/// How often the refresh task checks the session's expiry.
pub const REFRESH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Refresh once the access token expires within this margin.
pub const REFRESH_MARGIN_SECS: i64 = 60;

/// Process-wide holder of the current session.
#[derive(Debug)]
pub struct SessionHolder {
    session: watch::Receiver<Option<Session>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionHolder {
    /// Subscribe to session changes, then fetch the current session.
    ///
    /// A failed fetch is logged and treated as "no session"; it is not
    /// retried.
    pub async fn start<B: Auth>(backend: &B) -> Self {
        let mut subscription = backend.subscribe();

        let initial = match backend.get_session().await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Failed to fetch initial session, starting signed out");
                None
            }
        };
        update_sentry_user(initial.as_ref());
        match &initial {
            Some(session) => info!(user_id = %session.user.id, "Restored session"),
            None => info!("No session, login required"),
        }

        let (sender, receiver) = watch::channel(initial);
        let listener = tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                debug!(kind = %event.kind, "Session holder observed auth event");
                update_sentry_user(event.session.as_ref());
                sender.send_replace(event.session);
            }
            debug!("Auth event stream closed");
        });

        Self {
            session: receiver,
            tasks: Mutex::new(vec![listener]),
        }
    }

    /// The session as of the last observed event.
    #[must_use]
    pub fn current(&self) -> Option<Session> {
        self.session.borrow().clone()
    }

    /// The signed-in identity, if any.
    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        self.session.borrow().as_ref().map(|s| s.user.clone())
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.session.borrow().is_some()
    }

    /// A receiver that wakes on every session change.
    #[must_use]
    pub fn changes(&self) -> watch::Receiver<Option<Session>> {
        self.session.clone()
    }

    /// Wait until the holder agrees on whether someone is signed in.
    ///
    /// Returns `false` if that did not happen within [`AUTH_CHANGE_WAIT`].
    pub async fn wait_for_signed_in(&self, signed_in: bool) -> bool {
        let mut changes = self.session.clone();
        let observed = tokio::time::timeout(
            AUTH_CHANGE_WAIT,
            changes.wait_for(|session| session.is_some() == signed_in),
        )
        .await;
        matches!(observed, Ok(Ok(_)))
    }

    /// Refresh the session in the background before it expires.
    pub fn keep_fresh<B: Auth + 'static>(&self, backend: Arc<B>) {
        let session = self.session.clone();
        let refresher = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(REFRESH_CHECK_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let due = session.borrow().as_ref().is_some_and(|s| {
                    s.expires_within(Utc::now(), chrono::Duration::seconds(REFRESH_MARGIN_SECS))
                });
                if !due {
                    continue;
                }
                match backend.refresh_session().await {
                    Ok(refreshed) => {
                        debug!(expires_at = %refreshed.expires_at, "Session refreshed");
                    }
                    Err(e) => warn!(error = %e, "Session refresh failed"),
                }
            }
        });
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(refresher);
    }

    /// Stop observing session changes. The held session is kept as-is.
    pub fn shutdown(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        for task in tasks {
            task.abort();
        }
        debug!("Session holder stopped");
    }
}

fn update_sentry_user(session: Option<&Session>) {
    match session {
        Some(session) => set_sentry_user(&session.user.id, session.user.email.as_deref()),
        None => clear_sentry_user(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::backend::{Credentials, MemoryBackend};

    #[tokio::test]
    async fn test_starts_signed_out_without_session() {
        let backend = MemoryBackend::new();
        let holder = SessionHolder::start(&backend).await;
        assert!(holder.current().is_none());
        holder.shutdown();
    }

    #[tokio::test]
    async fn test_restores_existing_session() {
        let backend = MemoryBackend::new();
        let session = backend.sign_in_as("cashier@example.com");

        let holder = SessionHolder::start(&backend).await;
        assert_eq!(holder.current(), Some(session));
        holder.shutdown();
    }

    #[tokio::test]
    async fn test_failed_fetch_means_no_session() {
        let backend = MemoryBackend::new();
        backend.sign_in_as("cashier@example.com");
        backend.fail_session_fetch();

        let holder = SessionHolder::start(&backend).await;
        assert!(holder.current().is_none());
        holder.shutdown();
    }

    #[tokio::test]
    async fn test_follows_sign_in_and_sign_out() {
        let backend = MemoryBackend::new();
        backend.register_user("cashier@example.com", "hunter22");
        let holder = SessionHolder::start(&backend).await;

        let session = backend
            .sign_in(&Credentials::new("cashier@example.com", "hunter22"))
            .await
            .unwrap();
        assert!(holder.wait_for_signed_in(true).await);
        assert_eq!(holder.current(), Some(session));
        assert_eq!(
            holder.identity().unwrap().email.as_deref(),
            Some("cashier@example.com")
        );

        backend.sign_out().await.unwrap();
        assert!(holder.wait_for_signed_in(false).await);
        assert!(holder.current().is_none());
        holder.shutdown();
    }

    #[tokio::test]
    async fn test_ignores_events_after_shutdown() {
        let backend = MemoryBackend::new();
        let holder = SessionHolder::start(&backend).await;
        holder.shutdown();
        tokio::task::yield_now().await;

        backend.sign_in_as("cashier@example.com");
        tokio::task::yield_now().await;
        assert!(holder.current().is_none());
    }
}
