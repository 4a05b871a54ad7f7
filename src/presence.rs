//! Presence payload types and the publishing boundary. The gateway is an
//! opaque transport owned by the embedder; payloads are fire-and-forget
//! from the engine's perspective.

/// Discord-style activity kinds. The numeric values are the wire values
/// used by rich-presence transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum ActivityType {
    Playing = 0,
    Streaming = 1,
    #[default]
    Listening = 2,
    Watching = 3,
    Custom = 4,
    Competing = 5,
}

impl ActivityType {
    pub fn value(self) -> i32 {
        self as i32
    }
}

/// Which payload line the status surface renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum StatusDisplayType {
    Name = 0,
    #[default]
    State = 1,
    Details = 2,
}

impl StatusDisplayType {
    pub fn value(self) -> i32 {
        self as i32
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresencePayload {
    pub app_name: String,
    pub details: String,
    pub state: String,
    /// Hosted artwork URL, or empty for no image.
    pub image_key: String,
    pub activity_type: ActivityType,
    pub display_type: StatusDisplayType,
}

/// Unix epoch milliseconds bracketing the current track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamps {
    pub start: i64,
    pub end: i64,
}

/// Publishing boundary. Implementations own their connection and auth state
/// and deal with their own failures; the engine never retries a publish.
pub trait PresenceGateway {
    /// Static publish variant, no timestamps.
    fn update(&self, payload: &PresencePayload);

    /// Timestamped publish variant, used while a track of known duration is
    /// playing.
    fn update_with_timestamps(&self, payload: &PresencePayload, timestamps: Timestamps);

    /// Remove the published presence without tearing the connection down.
    fn clear(&self);

    /// Tear down the transport entirely.
    fn close(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_type_values_match_wire_protocol() {
        assert_eq!(ActivityType::Playing.value(), 0);
        assert_eq!(ActivityType::Listening.value(), 2);
        assert_eq!(ActivityType::Competing.value(), 5);
        assert_eq!(StatusDisplayType::Details.value(), 2);
    }
}
