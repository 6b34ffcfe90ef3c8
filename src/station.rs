//! Station-name canonicalization and categorization.
//!
//! Free-text names such as `"Bloor BD"` or `"YONGE SHP STA"` are folded
//! onto the registry vocabulary. Names carrying directional phrasing
//! (`"... TOWARD KING"`) are not rewritten past the token clean-up; they are
//! reported through [`StationNormalizer::has_directional`] instead.

use regex::Regex;

use crate::records::StationCategory;
use crate::registry::ReferenceRegistry;

/// Tokens a canonical station name may end with.
pub const STATION_SUFFIX_KEYWORDS: [&str; 7] =
    ["STATION", "YARD", "HOSTLER", "WYE", "POCKET", "TAIL", "TRACK"];

/// Suffixes that mark a known non-passenger location.
pub const NON_PASSENGER_KEYWORDS: [&str; 6] = ["YARD", "HOSTLER", "WYE", "POCKET", "TAIL", "TRACK"];

/// Truncated spellings of `STATION`, longest first.
const TRUNCATED_STATION_SUFFIXES: [&str; 4] = [" STATIO", " STATI", " STAT", " STA"];

pub struct StationNormalizer<'a> {
    whitespace: Regex,
    street: Regex,
    line_codes: Regex,
    directional: Regex,
    registry: &'a ReferenceRegistry,
}

impl<'a> StationNormalizer<'a> {
    /// Compiles the token patterns from the registry's line-code aliases.
    pub fn new(registry: &'a ReferenceRegistry) -> Result<Self, regex::Error> {
        let mut aliases: Vec<&str> = registry
            .line_code_aliases()
            .iter()
            .map(String::as_str)
            .filter(|a| !a.is_empty())
            .collect();
        // longest first so "BD-S" wins over "BD"
        aliases.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));

        let mut alternatives: Vec<String> = aliases.iter().map(|a| regex::escape(a)).collect();
        alternatives.push(r"LINE\s?\d+".to_string());
        let line_codes = Regex::new(&format!(r"\b(?:{})\b", alternatives.join("|")))?;

        Ok(StationNormalizer {
            whitespace: Regex::new(r"\s+")?,
            street: Regex::new(r"\bST\s")?,
            line_codes,
            directional: Regex::new(r"\b(?:TO|TOWARD|TOWARDS)\b")?,
            registry,
        })
    }

    /// Canonicalizes a raw station name. Applying it twice yields the same
    /// result as applying it once.
    pub fn normalize(&self, raw: &str) -> String {
        let mut name = self.collapse(&raw.to_uppercase());

        name = self.street.replace_all(&name, "ST. ").into_owned();
        name = self.strip_line_codes(name);
        name = repair_truncated_suffix(name);

        if self.has_directional(&name) {
            return name;
        }

        if !ends_with_keyword(&name, &STATION_SUFFIX_KEYWORDS) {
            name = if name.is_empty() {
                "STATION".to_string()
            } else {
                format!("{name} STATION")
            };
            name = self.street.replace_all(&name, "ST. ").into_owned();
        }

        if let Some(canonical) = self.registry.station_alias(&name) {
            name = canonical.to_string();
        }

        self.collapse(&name)
    }

    /// Whether a name still contains `TO` / `TOWARD` / `TOWARDS` as a word.
    pub fn has_directional(&self, name: &str) -> bool {
        self.directional.is_match(&name.to_uppercase())
    }

    fn collapse(&self, name: &str) -> String {
        self.whitespace.replace_all(name.trim(), " ").into_owned()
    }

    // Removal can join fragments into a new token ("LINE YU 2" -> "LINE 2"),
    // so strip until nothing changes.
    fn strip_line_codes(&self, mut name: String) -> String {
        loop {
            let next = self.collapse(&self.line_codes.replace_all(&name, ""));
            if next == name {
                return next;
            }
            name = next;
        }
    }
}

fn repair_truncated_suffix(name: String) -> String {
    for suffix in TRUNCATED_STATION_SUFFIXES {
        if let Some(stem) = name.strip_suffix(suffix) {
            return format!("{stem} STATION");
        }
    }
    name
}

fn ends_with_keyword(name: &str, keywords: &[&str]) -> bool {
    name.split(' ')
        .next_back()
        .is_some_and(|last| keywords.contains(&last))
}

/// Classifies a canonical name against the registry.
pub fn categorize(name: &str, registry: &ReferenceRegistry) -> StationCategory {
    if registry.is_passenger_station(name) {
        StationCategory::Passenger
    } else if ends_with_keyword(name, &NON_PASSENGER_KEYWORDS) {
        StationCategory::NonPassenger
    } else {
        StationCategory::Unknown
    }
}
