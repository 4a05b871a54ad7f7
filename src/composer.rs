//! Turns a session snapshot into a presence payload. Composition is pure
//! apart from possibly kicking off an artwork upload, so it is safe to
//! re-run on every metadata, playback-state, selection or artwork event.

use crate::artwork::{ArtworkStore, track_fingerprint};
use crate::environment::{AppRegistry, ConfigStore};
use crate::media_events::{MediaSession, PlaybackState};
use crate::parsing::ParserRegistry;
use crate::presence::{ActivityType, PresencePayload, StatusDisplayType, Timestamps};

pub(crate) const IDLE_APP_NAME: &str = "Media Presence";
pub(crate) const IDLE_DETAILS: &str = "Idle";
pub(crate) const IDLE_STATE: &str = "Waiting for media...";

const UNKNOWN_APP: &str = "Unknown App";

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Composed {
    pub payload: PresencePayload,
    /// Some when the timestamped publish variant applies.
    pub timestamps: Option<Timestamps>,
    pub is_playing: bool,
}

pub(crate) fn compose(
    session: &MediaSession,
    registry: &ParserRegistry,
    config: &impl ConfigStore,
    apps: &impl AppRegistry,
    artwork: &mut ArtworkStore,
    now_ms: i64,
) -> Composed {
    let app_name = apps
        .display_name(&session.source_id)
        .unwrap_or_else(|| UNKNOWN_APP.to_string());

    let parsed = registry.resolve(&session.source_id).parse(&session.metadata);

    let fingerprint = track_fingerprint(&parsed.details, &parsed.state, &session.source_id);
    let image_key = artwork.resolve(&fingerprint, &session.metadata.art_bytes);

    let activity_type = config.activity_type(&session.source_id);

    let is_playing = session.playback.state == PlaybackState::Playing;
    let timestamps = if session.metadata.duration > 0 && is_playing {
        let start = now_ms - session.playback.position;
        Some(Timestamps {
            start,
            end: start + session.metadata.duration,
        })
    } else {
        None
    };

    Composed {
        payload: PresencePayload {
            app_name,
            details: parsed.details,
            state: parsed.state,
            image_key,
            activity_type,
            display_type: parsed.display_type,
        },
        timestamps,
        is_playing,
    }
}

/// Fixed payload published when no trackable source exists.
pub(crate) fn idle_payload() -> PresencePayload {
    PresencePayload {
        app_name: IDLE_APP_NAME.to_string(),
        details: IDLE_DETAILS.to_string(),
        state: IDLE_STATE.to_string(),
        image_key: String::new(),
        activity_type: ActivityType::Listening,
        display_type: StatusDisplayType::State,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::*;
    use crate::artwork::{ArtworkUploader, UploadError};
    use crate::media_events::{MetadataInfo, PlaybackInfo, SessionToken};

    struct NullUploader;

    #[async_trait]
    impl ArtworkUploader for NullUploader {
        async fn upload(&self, _bytes: Vec<u8>) -> Result<String, UploadError> {
            Err(UploadError::EmptyBody)
        }
    }

    struct TestConfig;

    impl ConfigStore for TestConfig {
        fn is_enabled(&self) -> bool {
            true
        }

        fn allow_list(&self) -> HashSet<String> {
            HashSet::new()
        }
    }

    struct TestApps;

    impl AppRegistry for TestApps {
        fn display_name(&self, source_id: &str) -> Option<String> {
            (source_id == "com.example.music").then(|| "Example Music".to_string())
        }
    }

    fn artwork_store() -> ArtworkStore {
        let (tx, _rx) = mpsc::channel(1);
        ArtworkStore::new(Arc::new(NullUploader), tx)
    }

    fn session(state: PlaybackState, duration: i64, position: i64) -> MediaSession {
        MediaSession {
            source_id: "com.example.music".to_string(),
            token: SessionToken(1),
            metadata: MetadataInfo {
                title: "Song".to_string(),
                artist: "Artist".to_string(),
                duration,
                ..Default::default()
            },
            playback: PlaybackInfo { state, position },
        }
    }

    #[test]
    fn playing_track_with_duration_gets_timestamps() {
        let now = 1_700_000_000_000;
        let composed = compose(
            &session(PlaybackState::Playing, 180_000, 30_000),
            &ParserRegistry::new(),
            &TestConfig,
            &TestApps,
            &mut artwork_store(),
            now,
        );

        let ts = composed.timestamps.expect("timestamped variant");
        assert_eq!(ts.start, now - 30_000);
        assert_eq!(ts.end, now + 150_000);
        assert!(composed.is_playing);
        assert_eq!(composed.payload.app_name, "Example Music");
        assert_eq!(composed.payload.details, "Song");
        assert_eq!(composed.payload.state, "Artist");
    }

    #[test]
    fn unknown_duration_uses_static_variant() {
        let composed = compose(
            &session(PlaybackState::Playing, 0, 30_000),
            &ParserRegistry::new(),
            &TestConfig,
            &TestApps,
            &mut artwork_store(),
            1_700_000_000_000,
        );

        assert!(composed.timestamps.is_none());
    }

    #[test]
    fn paused_track_uses_static_variant() {
        let composed = compose(
            &session(PlaybackState::Paused, 180_000, 30_000),
            &ParserRegistry::new(),
            &TestConfig,
            &TestApps,
            &mut artwork_store(),
            1_700_000_000_000,
        );

        assert!(composed.timestamps.is_none());
        assert!(!composed.is_playing);
    }

    #[test]
    fn unresolvable_source_falls_back_to_unknown_app() {
        let mut s = session(PlaybackState::Playing, 0, 0);
        s.source_id = "com.unknown.player".to_string();

        let composed = compose(
            &s,
            &ParserRegistry::new(),
            &TestConfig,
            &TestApps,
            &mut artwork_store(),
            0,
        );

        assert_eq!(composed.payload.app_name, UNKNOWN_APP);
    }

    #[test]
    fn recomposing_an_unchanged_snapshot_yields_an_unchanged_payload() {
        let mut artwork = artwork_store();
        let s = session(PlaybackState::Paused, 180_000, 30_000);
        let registry = ParserRegistry::new();

        let first = compose(&s, &registry, &TestConfig, &TestApps, &mut artwork, 7);
        let second = compose(&s, &registry, &TestConfig, &TestApps, &mut artwork, 7);
        assert_eq!(first, second);
    }
}
