use strum::EnumString;

/// Opaque identity of a media session. The environment hands out a fresh
/// token whenever the underlying session is replaced, so comparing tokens is
/// how the selector tells "same session, new event" from "new session".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionToken(pub u64);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataInfo {
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Track length in milliseconds; 0 or negative means unknown.
    pub duration: i64,
    /// Raw cover art bytes, empty when the session reports none.
    pub art_bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackInfo {
    pub state: PlaybackState,
    /// Playback position in milliseconds.
    pub position: i64,
}

impl Default for PlaybackInfo {
    fn default() -> Self {
        PlaybackInfo {
            state: PlaybackState::Other,
            position: 0,
        }
    }
}

#[derive(EnumString, strum::Display, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackState {
    Playing,
    Paused,
    Stopped,
    Other,
}

/// Snapshot of one candidate session as reported by the environment. The
/// engine never holds environment handles, only these value snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSession {
    /// Stable application identifier (package name, dbus name, ...).
    pub source_id: String,
    pub token: SessionToken,
    pub metadata: MetadataInfo,
    pub playback: PlaybackInfo,
}

/// Everything the engine loop reacts to. Environment adapters and the
/// artwork upload tasks feed these through one channel, so all selector and
/// cache state is touched from a single task.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// The candidate set changed; carries fresh snapshots of every session.
    SessionsChanged(Vec<MediaSession>),
    MetadataChanged(SessionToken, MetadataInfo),
    PlaybackStateChanged(SessionToken, PlaybackInfo),
    SessionDestroyed(SessionToken),
    /// Posted by an upload task when it finishes. `url` is None on failure.
    ArtworkUploaded {
        fingerprint: String,
        url: Option<String>,
    },
    /// Re-pull candidates from the provider and re-evaluate.
    RefreshSessions,
    Shutdown,
}

/// Outgoing notifications for whatever UI is embedding the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineNotification {
    PresenceUpdated(PresenceUpdate),
    /// Presence was cleared because the engine was disabled or shut down.
    PresenceCleared,
    /// Raw pre-filter source ids, for allow-list configuration UI.
    CandidateAppsObserved(Vec<String>),
}

/// Mirror of the last published presence, for rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresenceUpdate {
    pub app_name: String,
    pub details: String,
    pub state: String,
    pub image_key: String,
    pub activity_type: i32,
    pub display_type: i32,
    pub is_playing: bool,
    /// 0 when the static publish variant was used.
    pub start_time: i64,
    pub end_time: i64,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn playback_state_round_trips_through_strings() {
        assert_eq!(
            PlaybackState::from_str("Playing").unwrap(),
            PlaybackState::Playing
        );
        assert_eq!(PlaybackState::Paused.to_string(), "Paused");
    }

    #[test]
    fn unknown_playback_state_string_is_an_error() {
        assert!(PlaybackState::from_str("Buffering").is_err());
    }
}
