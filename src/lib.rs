//! Mirrors a device's currently playing media into a rich-presence service.
//!
//! The engine selects one session among the environment's candidates,
//! follows its metadata and playback-state events, normalizes them through
//! per-source parsers and publishes presence payloads through a
//! [`presence::PresenceGateway`]. Cover art is uploaded at most once per
//! track in the background and picked up by a recompute when the hosted URL
//! is ready.
//!
//! The environment (session provider, preferences, app names, the presence
//! transport) is supplied as trait implementations; the engine itself runs
//! as one event-loop task fed through [`engine::EngineHandle`].

pub mod artwork;
mod composer;
pub mod engine;
pub mod environment;
pub mod media_events;
pub mod parsing;
pub mod presence;

pub use artwork::{ArtworkUploader, CatboxUploader, UploadError};
pub use engine::{EngineHandle, PresenceEngine};
pub use environment::{
    AppRegistry, ConfigStore, MediaSessionProvider, ProviderError, SubscriptionHandle,
};
pub use media_events::{
    EngineEvent, EngineNotification, MediaSession, MetadataInfo, PlaybackInfo, PlaybackState,
    PresenceUpdate, SessionToken,
};
pub use parsing::{MetadataParser, ParsedPresence, ParserRegistry};
pub use presence::{ActivityType, PresenceGateway, PresencePayload, StatusDisplayType, Timestamps};
