use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Streaming site an item was scraped from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum StreamingService {
    Netflix,
    Youtube,
    Disneyplus,
    Primevideo,
    Max,
    Hulu,
    Appletv,
    #[default]
    Other,
}

/// Host suffixes recognised for each service. Checked in order, first match wins.
const HOST_TABLE: &[(&str, StreamingService)] = &[
    ("netflix.com", StreamingService::Netflix),
    ("youtube.com", StreamingService::Youtube),
    ("youtu.be", StreamingService::Youtube),
    ("disneyplus.com", StreamingService::Disneyplus),
    ("primevideo.com", StreamingService::Primevideo),
    ("amazon.com", StreamingService::Primevideo),
    ("hbomax.com", StreamingService::Max),
    ("max.com", StreamingService::Max),
    ("hulu.com", StreamingService::Hulu),
    ("tv.apple.com", StreamingService::Appletv),
];

impl StreamingService {
    pub const ALL: [StreamingService; 8] = [
        StreamingService::Netflix,
        StreamingService::Youtube,
        StreamingService::Disneyplus,
        StreamingService::Primevideo,
        StreamingService::Max,
        StreamingService::Hulu,
        StreamingService::Appletv,
        StreamingService::Other,
    ];

    /// Wire name, as stored in the queue blob
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamingService::Netflix => "netflix",
            StreamingService::Youtube => "youtube",
            StreamingService::Disneyplus => "disneyplus",
            StreamingService::Primevideo => "primevideo",
            StreamingService::Max => "max",
            StreamingService::Hulu => "hulu",
            StreamingService::Appletv => "appletv",
            StreamingService::Other => "other",
        }
    }

    /// Resolve a page hostname to the service that serves it.
    ///
    /// Matches the host itself or any subdomain of a known host, so
    /// `www.netflix.com` resolves to Netflix but `notnetflix.com` does not.
    pub fn from_host(host: &str) -> Self {
        let host = host.trim().trim_end_matches('.').to_lowercase();
        HOST_TABLE
            .iter()
            .find(|(suffix, _)| {
                host == *suffix
                    || host
                        .strip_suffix(suffix)
                        .is_some_and(|prefix| prefix.ends_with('.'))
            })
            .map(|(_, service)| *service)
            .unwrap_or(StreamingService::Other)
    }
}

impl fmt::Display for StreamingService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamingService {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .find(|service| service.as_str() == wanted)
            .copied()
            .ok_or_else(|| format!("Unknown streaming service: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_host_matches_subdomains() {
        assert_eq!(StreamingService::from_host("www.netflix.com"), StreamingService::Netflix);
        assert_eq!(StreamingService::from_host("netflix.com"), StreamingService::Netflix);
        assert_eq!(StreamingService::from_host("play.max.com"), StreamingService::Max);
        assert_eq!(StreamingService::from_host("tv.apple.com"), StreamingService::Appletv);
        assert_eq!(StreamingService::from_host("WWW.HULU.COM"), StreamingService::Hulu);
    }

    #[test]
    fn test_from_host_rejects_lookalikes() {
        assert_eq!(StreamingService::from_host("notnetflix.com"), StreamingService::Other);
        assert_eq!(StreamingService::from_host("apple.com"), StreamingService::Other);
        assert_eq!(StreamingService::from_host("localhost"), StreamingService::Other);
    }

    #[test]
    fn test_wire_names() {
        for service in StreamingService::ALL {
            let parsed: StreamingService = service.as_str().parse().unwrap();
            assert_eq!(parsed, service);
        }
        assert_eq!(serde_json::to_string(&StreamingService::Disneyplus).unwrap(), "\"disneyplus\"");
        assert!("crunchyroll".parse::<StreamingService>().is_err());
    }
}
