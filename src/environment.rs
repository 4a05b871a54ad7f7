//! Traits for the collaborators that live outside the engine: the media
//! session provider, the preference store and the application registry.
//! Embedders implement these against their platform; tests use recording
//! doubles.

use std::collections::HashSet;

use thiserror::Error;

use crate::media_events::{MediaSession, SessionToken};
use crate::presence::ActivityType;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The environment refused the subscription (permission withdrawn).
    #[error("access to media sessions denied")]
    AccessDenied,
    #[error("session {0:?} is gone")]
    StaleSession(SessionToken),
    #[error("{0}")]
    Other(String),
}

/// Owned subscription to one session's callbacks. Dropping it releases the
/// registration; release failures on an already dead session are swallowed
/// by the closure itself.
pub struct SubscriptionHandle {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl SubscriptionHandle {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        SubscriptionHandle {
            release: Some(Box::new(release)),
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SubscriptionHandle")
    }
}

/// Source of media sessions. Candidate order is environment-defined and not
/// contractually meaningful; the selector only relies on it as a tie-break
/// when nothing is playing.
pub trait MediaSessionProvider {
    fn active_candidates(&self) -> Vec<MediaSession>;

    /// Register for metadata / playback-state / destroyed callbacks on one
    /// session. The provider routes those callbacks onto the engine's event
    /// channel tagged with the session token.
    fn subscribe(&self, session: &MediaSession) -> Result<SubscriptionHandle, ProviderError>;
}

/// User preferences, read-only from the engine's point of view.
pub trait ConfigStore {
    /// Global on/off switch. When false the engine unsubscribes and clears
    /// the published presence instead of going idle.
    fn is_enabled(&self) -> bool;

    fn allow_list(&self) -> HashSet<String>;

    /// Per-source activity type; Listening unless the user chose otherwise.
    fn activity_type(&self, source_id: &str) -> ActivityType {
        let _ = source_id;
        ActivityType::Listening
    }
}

/// Resolves source ids to human-readable application names.
pub trait AppRegistry {
    fn display_name(&self, source_id: &str) -> Option<String>;
}
