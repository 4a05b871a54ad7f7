//! Per-source metadata normalization. Most players report plain
//! title/artist pairs; some encode structure into the title that is worth
//! splitting out. Parsers are looked up by source id with a mandatory
//! default fallback, so resolution never fails.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::media_events::MetadataInfo;
use crate::presence::StatusDisplayType;

pub const UNKNOWN_TITLE: &str = "Unknown Title";

/// Source id of the shipped episode-title specialization.
pub const EPISODE_TITLE_SOURCE: &str = "com.stremio.one";

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPresence {
    /// Top line.
    pub details: String,
    /// Bottom line.
    pub state: String,
    pub display_type: StatusDisplayType,
}

pub trait MetadataParser: Send + Sync {
    fn parse(&self, metadata: &MetadataInfo) -> ParsedPresence;
}

pub struct DefaultParser;

impl MetadataParser for DefaultParser {
    fn parse(&self, metadata: &MetadataInfo) -> ParsedPresence {
        let title = if metadata.title.is_empty() {
            UNKNOWN_TITLE.to_string()
        } else {
            metadata.title.clone()
        };

        ParsedPresence {
            details: title,
            state: metadata.artist.clone(),
            display_type: StatusDisplayType::State,
        }
    }
}

static EPISODE_TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?) - (S\d+E\d+) - (.*)$").unwrap());

/// Splits "Show Name - S01E02 - Episode Title" into show / episode lines.
/// Anything that does not match the pattern degrades to [`DefaultParser`].
pub struct EpisodeTitleParser;

impl MetadataParser for EpisodeTitleParser {
    fn parse(&self, metadata: &MetadataInfo) -> ParsedPresence {
        match EPISODE_TITLE_RE.captures(&metadata.title) {
            Some(captures) => {
                let show = &captures[1];
                let season_episode = &captures[2];
                let episode_title = &captures[3];

                ParsedPresence {
                    details: show.to_string(),
                    state: format!("{season_episode} - {episode_title}"),
                    display_type: StatusDisplayType::Details,
                }
            }
            None => DefaultParser.parse(metadata),
        }
    }
}

pub struct ParserRegistry {
    parsers: HashMap<String, Box<dyn MetadataParser>>,
    default: DefaultParser,
}

impl ParserRegistry {
    pub fn new() -> Self {
        let mut registry = ParserRegistry {
            parsers: HashMap::new(),
            default: DefaultParser,
        };
        registry.register(EPISODE_TITLE_SOURCE, EpisodeTitleParser);
        registry
    }

    pub fn register(&mut self, source_id: &str, parser: impl MetadataParser + 'static) {
        self.parsers.insert(source_id.to_string(), Box::new(parser));
    }

    /// Pure lookup; unknown source ids resolve to the default parser.
    pub fn resolve(&self, source_id: &str) -> &dyn MetadataParser {
        match self.parsers.get(source_id) {
            Some(parser) => parser.as_ref(),
            None => &self.default,
        }
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(title: &str, artist: &str) -> MetadataInfo {
        MetadataInfo {
            title: title.to_string(),
            artist: artist.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn default_parser_maps_title_and_artist() {
        let parsed = DefaultParser.parse(&metadata("Song", "Artist"));
        assert_eq!(parsed.details, "Song");
        assert_eq!(parsed.state, "Artist");
        assert_eq!(parsed.display_type, StatusDisplayType::State);
    }

    #[test]
    fn default_parser_substitutes_unknown_title() {
        let parsed = DefaultParser.parse(&metadata("", ""));
        assert_eq!(parsed.details, UNKNOWN_TITLE);
        assert_eq!(parsed.state, "");
    }

    #[test]
    fn episode_parser_splits_structured_titles() {
        let parsed = EpisodeTitleParser.parse(&metadata("Inception - S01E02 - The Heist", ""));
        assert_eq!(parsed.details, "Inception");
        assert_eq!(parsed.state, "S01E02 - The Heist");
        assert_eq!(parsed.display_type, StatusDisplayType::Details);
    }

    #[test]
    fn episode_parser_falls_back_on_plain_titles() {
        let parsed = EpisodeTitleParser.parse(&metadata("Random Movie Title", ""));
        assert_eq!(parsed.details, "Random Movie Title");
        assert_eq!(parsed.state, "");
        assert_eq!(parsed.display_type, StatusDisplayType::State);
    }

    #[test]
    fn registry_resolves_registered_source_and_defaults_otherwise() {
        let registry = ParserRegistry::new();

        let parsed = registry
            .resolve(EPISODE_TITLE_SOURCE)
            .parse(&metadata("Show - S02E05 - Finale", ""));
        assert_eq!(parsed.details, "Show");

        let parsed = registry
            .resolve("com.example.music")
            .parse(&metadata("Track", "Band"));
        assert_eq!(parsed.details, "Track");
        assert_eq!(parsed.state, "Band");
    }
}
