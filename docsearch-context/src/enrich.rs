//! Heuristic year and place extraction for chunk metadata.
//!
//! Historical mining records rarely carry structured dates or places, so each chunk is
//! scanned for the first plausible year (1800-2099) and the first known place name from a
//! gazetteer. The results feed the `date_year` and `location` search filters.

use crate::metadata::ChunkMetadata;
use regex::Regex;
use std::sync::LazyLock;

static YEAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(1[89]\d{2}|20\d{2})\b").expect("valid year pattern"));

/// Victorian goldfield towns searched for by default, in priority order.
pub const DEFAULT_LOCATIONS: &[&str] = &[
    "Bendigo",
    "Ballarat",
    "Castlemaine",
    "Yea",
    "Beechworth",
    "Ararat",
    "Dunolly",
    "Maryborough",
    "Clunes",
    "Stawell",
    "Melbourne",
    "Victoria",
];

/// First year between 1800 and 2099 appearing as a whole word in `text`.
pub fn extract_year(text: &str) -> Option<i32> {
    YEAR_PATTERN
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
}

/// Fills `date_year` and `location` from chunk text.
#[derive(Debug, Clone)]
pub struct MetadataEnricher {
    locations: Vec<String>,
    lowered: Vec<String>,
}

impl Default for MetadataEnricher {
    fn default() -> Self {
        Self::new(DEFAULT_LOCATIONS.iter().map(|s| s.to_string()))
    }
}

impl MetadataEnricher {
    /// Create an enricher searching for `locations`, earlier entries winning.
    pub fn new<I>(locations: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let locations: Vec<String> = locations.into_iter().collect();
        let lowered = locations.iter().map(|l| l.to_lowercase()).collect();
        Self { locations, lowered }
    }

    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    /// First gazetteer entry contained in `text`, compared case-insensitively.
    ///
    /// This is a plain substring test, so "Yea" also matches inside "years".
    pub fn extract_location(&self, text: &str) -> Option<&str> {
        let text = text.to_lowercase();
        self.lowered
            .iter()
            .position(|location| text.contains(location.as_str()))
            .map(|i| self.locations[i].as_str())
    }

    /// Set `date_year` and `location` on `metadata` when `text` mentions them.
    ///
    /// Existing values are only replaced when something was found.
    pub fn enrich(&self, text: &str, metadata: &mut ChunkMetadata) {
        if let Some(year) = extract_year(text) {
            metadata.date_year = Some(year);
        }
        if let Some(location) = self.extract_location(text) {
            metadata.location = Some(location.to_string());
        }
    }
}
