use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::DelayCodeInfo;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to read reference file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed station entry on line {line}: {entry:?}")]
    MalformedStationEntry { line: usize, entry: String },
    #[error("delay code table is missing column {0:?}")]
    MissingColumn(&'static str),
    #[error("delay code table: {0}")]
    Csv(#[from] csv::Error),
    #[error("rush-hour boundaries must be ordered morning_start <= morning_end <= evening_start <= evening_end")]
    InvalidRushHours,
    #[error("season calendar references invalid month {0}")]
    InvalidMonth(u32),
    #[error("month {0} is assigned to more than one season")]
    DuplicateMonth(u32),
    #[error("month {0} is not assigned to any season")]
    UncoveredMonth(u32),
}

pub(super) fn read_text(path: &Path) -> Result<String, RegistryError> {
    std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
        path: path.display().to_string(),
        source,
    })
}

pub(super) fn open(path: &Path) -> Result<File, RegistryError> {
    File::open(path).map_err(|source| RegistryError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// One upper-cased station name per non-blank line.
pub fn parse_station_list(text: &str) -> BTreeSet<String> {
    text.lines()
        .map(|l| l.trim().to_uppercase())
        .filter(|l| !l.is_empty())
        .collect()
}

/// Parses `NAME STATION['YU', 'BD']` entries, one per non-blank line.
pub fn parse_station_lines(text: &str) -> Result<BTreeMap<String, Vec<String>>, RegistryError> {
    let mut stations = BTreeMap::new();

    for (i, line) in text.lines().enumerate() {
        let entry = line.trim().to_uppercase();
        if entry.is_empty() {
            continue;
        }

        let malformed = || RegistryError::MalformedStationEntry {
            line: i + 1,
            entry: line.to_string(),
        };

        let split = entry.find("STATION").ok_or_else(malformed)? + "STATION".len();
        let (name, codes) = entry.split_at(split);
        let codes = codes
            .trim()
            .strip_prefix('[')
            .and_then(|c| c.strip_suffix(']'))
            .ok_or_else(malformed)?;

        let codes: Vec<String> = codes
            .split(',')
            .map(|c| c.trim().trim_matches(|q| q == '\'' || q == '"').trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();

        stations.insert(name.trim().to_string(), codes);
    }

    Ok(stations)
}

const CODE_COLUMN: &str = "CODE";
const DESCRIPTION_COLUMN: &str = "DESCRIPTION";
const CATEGORY_COLUMN: &str = "CATEGORY";
const EXPLANATION_COLUMN: &str = "PUBLIC EXPLANATION";

/// Reads the delay-code table. Columns are matched case-insensitively, extra
/// columns are ignored, and non-ASCII characters are removed from every
/// field so mojibake from spreadsheet exports never reaches the output.
pub fn parse_delay_codes<R: Read>(reader: R) -> Result<HashMap<String, DelayCodeInfo>, RegistryError> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| strip_non_ascii(h).trim().to_uppercase())
        .collect();
    let column = |name: &'static str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or(RegistryError::MissingColumn(name))
    };

    let code_idx = column(CODE_COLUMN)?;
    let description_idx = column(DESCRIPTION_COLUMN)?;
    let category_idx = column(CATEGORY_COLUMN)?;
    let explanation_idx = column(EXPLANATION_COLUMN)?;

    let mut codes = HashMap::new();
    for record in rdr.records() {
        let record = record?;
        let field = |i: usize| strip_non_ascii(record.get(i).unwrap_or("")).trim().to_string();

        let code = field(code_idx).to_uppercase();
        if code.is_empty() {
            continue;
        }

        codes.insert(
            code,
            DelayCodeInfo {
                category: field(category_idx),
                description: field(description_idx),
                public_explanation: field(explanation_idx),
            },
        );
    }

    Ok(codes)
}

pub fn strip_non_ascii(text: &str) -> String {
    text.chars().filter(char::is_ascii).collect()
}
