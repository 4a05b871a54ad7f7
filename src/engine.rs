//! The engine loop. One task owns the selector state, the artwork store and
//! the gateway; media-session adapters and upload tasks talk to it through
//! the event channel, so nothing here needs a lock.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;

use crate::artwork::{ArtworkStore, ArtworkUploader};
use crate::composer::{Composed, compose, idle_payload};
use crate::environment::{AppRegistry, ConfigStore, MediaSessionProvider, SubscriptionHandle};
use crate::media_events::{
    EngineEvent, EngineNotification, MediaSession, PlaybackState, PresenceUpdate, SessionToken,
};
use crate::parsing::ParserRegistry;
use crate::presence::PresenceGateway;

const EVENT_CHANNEL_CAPACITY: usize = 100;
const NOTIFICATION_CHANNEL_CAPACITY: usize = 10;

/// Cheap clonable handle for feeding events into a running engine.
#[derive(Clone)]
pub struct EngineHandle {
    events_tx: mpsc::Sender<EngineEvent>,
}

impl EngineHandle {
    pub async fn send(&self, event: EngineEvent) {
        if self.events_tx.send(event).await.is_err() {
            log::warn!("engine loop not running, event dropped");
        }
    }

    /// Non-async variant for callers outside the runtime.
    pub fn try_send(&self, event: EngineEvent) {
        if self.events_tx.try_send(event).is_err() {
            log::warn!("engine loop not running or backed up, event dropped");
        }
    }

    /// Re-evaluate the candidate set immediately.
    pub async fn refresh_now(&self) {
        self.send(EngineEvent::RefreshSessions).await;
    }

    /// Unsubscribe everything and clear the published presence.
    pub async fn shutdown(&self) {
        self.send(EngineEvent::Shutdown).await;
    }
}

enum SelectorState {
    Idle,
    Subscribed {
        /// Latest snapshot of the observed session, refreshed on every
        /// metadata and playback-state event.
        session: MediaSession,
        /// Owned registration; dropping it releases the callbacks on every
        /// exit path (re-selection, idle transition, shutdown).
        _handle: SubscriptionHandle,
    },
}

impl SelectorState {
    fn current_token(&self) -> Option<SessionToken> {
        match self {
            SelectorState::Idle => None,
            SelectorState::Subscribed { session, .. } => Some(session.token),
        }
    }
}

enum Flow {
    Continue,
    Shutdown,
}

pub struct PresenceEngine<P, C, A, G> {
    provider: P,
    config: C,
    apps: A,
    gateway: G,
    registry: ParserRegistry,
    artwork: ArtworkStore,
    state: SelectorState,
    events_rx: mpsc::Receiver<EngineEvent>,
    notifications_tx: mpsc::Sender<EngineNotification>,
}

impl<P, C, A, G> PresenceEngine<P, C, A, G>
where
    P: MediaSessionProvider,
    C: ConfigStore,
    A: AppRegistry,
    G: PresenceGateway,
{
    pub fn new(
        provider: P,
        config: C,
        apps: A,
        gateway: G,
        uploader: Arc<dyn ArtworkUploader>,
    ) -> (Self, EngineHandle, mpsc::Receiver<EngineNotification>) {
        Self::with_registry(provider, config, apps, gateway, uploader, ParserRegistry::new())
    }

    /// Like [`PresenceEngine::new`] but with a caller-assembled parser
    /// registry.
    pub fn with_registry(
        provider: P,
        config: C,
        apps: A,
        gateway: G,
        uploader: Arc<dyn ArtworkUploader>,
        registry: ParserRegistry,
    ) -> (Self, EngineHandle, mpsc::Receiver<EngineNotification>) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (notifications_tx, notifications_rx) = mpsc::channel(NOTIFICATION_CHANNEL_CAPACITY);

        let engine = PresenceEngine {
            provider,
            config,
            apps,
            gateway,
            registry,
            artwork: ArtworkStore::new(uploader, events_tx.clone()),
            state: SelectorState::Idle,
            events_rx,
            notifications_tx,
        };

        (engine, EngineHandle { events_tx }, notifications_rx)
    }

    /// Consumes events until the channel closes or a shutdown arrives.
    pub async fn run(mut self) {
        while let Some(event) = self.events_rx.recv().await {
            if let Flow::Shutdown = self.handle_event(event) {
                break;
            }
        }
        log::debug!("engine loop finished");
    }

    fn handle_event(&mut self, event: EngineEvent) -> Flow {
        match event {
            EngineEvent::SessionsChanged(candidates) => {
                self.handle_sessions_changed(candidates);
            }

            EngineEvent::MetadataChanged(token, metadata) => {
                if !self.config.is_enabled() {
                    self.disable_and_clear();
                } else if let SelectorState::Subscribed { session, .. } = &mut self.state
                    && session.token == token
                {
                    session.metadata = metadata;
                    self.publish_current();
                }
            }

            EngineEvent::PlaybackStateChanged(token, playback) => {
                if !self.config.is_enabled() {
                    self.disable_and_clear();
                } else if let SelectorState::Subscribed { session, .. } = &mut self.state
                    && session.token == token
                {
                    session.playback = playback;
                    self.publish_current();
                }
            }

            EngineEvent::SessionDestroyed(token) => {
                if self.state.current_token() == Some(token) {
                    log::debug!("current session destroyed");
                    self.state = SelectorState::Idle;
                    self.publish_idle();
                }
            }

            EngineEvent::ArtworkUploaded { fingerprint, url } => {
                // A completed upload for a track that has since stopped
                // playing still lands in the cache; only the recompute for
                // the current session cares whether a URL arrived.
                if self.artwork.complete_upload(&fingerprint, url) {
                    if !self.config.is_enabled() {
                        self.disable_and_clear();
                    } else {
                        self.publish_current();
                    }
                }
            }

            EngineEvent::RefreshSessions => {
                let candidates = self.provider.active_candidates();
                self.handle_sessions_changed(candidates);
            }

            EngineEvent::Shutdown => {
                log::debug!("shutting down");
                self.state = SelectorState::Idle;
                self.gateway.clear();
                self.gateway.close();
                self.notify(EngineNotification::PresenceCleared);
                return Flow::Shutdown;
            }
        }

        Flow::Continue
    }

    fn handle_sessions_changed(&mut self, candidates: Vec<MediaSession>) {
        if !self.config.is_enabled() {
            self.disable_and_clear();
            return;
        }

        let observed = candidates
            .iter()
            .map(|c| c.source_id.clone())
            .collect::<Vec<_>>();
        self.notify(EngineNotification::CandidateAppsObserved(observed));

        let allow_list = self.config.allow_list();
        let mut filtered = candidates
            .into_iter()
            .filter(|c| allow_list.contains(&c.source_id))
            .collect::<Vec<_>>();

        if filtered.is_empty() {
            log::debug!("no allowed sessions, going idle");
            self.state = SelectorState::Idle;
            self.publish_idle();
            return;
        }

        // Prefer whatever is playing; otherwise take the first allowed
        // candidate in environment order.
        let selected_index = filtered
            .iter()
            .position(|c| c.playback.state == PlaybackState::Playing)
            .unwrap_or(0);
        let selected = filtered.swap_remove(selected_index);

        if self.state.current_token() == Some(selected.token) {
            // Same session; refresh the snapshot and recompose. Composition
            // is idempotent so the redundant publish is harmless.
            if let SelectorState::Subscribed { session, .. } = &mut self.state {
                *session = selected;
            }
            self.publish_current();
            return;
        }

        // Drops the previous subscription before registering the new one.
        self.state = SelectorState::Idle;

        match self.provider.subscribe(&selected) {
            Ok(handle) => {
                log::info!("switched to session from {}", selected.source_id);
                self.state = SelectorState::Subscribed {
                    session: selected,
                    _handle: handle,
                };
                self.publish_current();
            }
            Err(e) => {
                // No retry here; the next candidates change drives progress.
                log::error!("could not subscribe to {}: {e}", selected.source_id);
            }
        }
    }

    fn publish_current(&mut self) {
        let SelectorState::Subscribed { session, .. } = &self.state else {
            return;
        };
        let session = session.clone();

        let composed = compose(
            &session,
            &self.registry,
            &self.config,
            &self.apps,
            &mut self.artwork,
            now_ms(),
        );

        match composed.timestamps {
            Some(ts) => self.gateway.update_with_timestamps(&composed.payload, ts),
            None => self.gateway.update(&composed.payload),
        }

        self.notify(EngineNotification::PresenceUpdated(presence_update(&composed)));
    }

    fn publish_idle(&mut self) {
        let payload = idle_payload();
        self.gateway.update(&payload);

        self.notify(EngineNotification::PresenceUpdated(PresenceUpdate {
            app_name: payload.app_name.clone(),
            details: payload.details.clone(),
            state: payload.state.clone(),
            image_key: String::new(),
            activity_type: payload.activity_type.value(),
            display_type: payload.display_type.value(),
            is_playing: false,
            start_time: 0,
            end_time: 0,
        }));
    }

    fn disable_and_clear(&mut self) {
        log::debug!("presence disabled, clearing activity");
        self.state = SelectorState::Idle;
        self.gateway.clear();
        self.gateway.close();
        self.notify(EngineNotification::PresenceCleared);
    }

    fn notify(&self, notification: EngineNotification) {
        if self.notifications_tx.try_send(notification).is_err() {
            log::debug!("notification receiver gone or backed up");
        }
    }
}

fn presence_update(composed: &Composed) -> PresenceUpdate {
    PresenceUpdate {
        app_name: composed.payload.app_name.clone(),
        details: composed.payload.details.clone(),
        state: composed.payload.state.clone(),
        image_key: composed.payload.image_key.clone(),
        activity_type: composed.payload.activity_type.value(),
        display_type: composed.payload.display_type.value(),
        is_playing: composed.is_playing,
        start_time: composed.timestamps.map(|ts| ts.start).unwrap_or_default(),
        end_time: composed.timestamps.map(|ts| ts.end).unwrap_or_default(),
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
