//! Line-code and direction reconciliation.
//!
//! A wrong code is corrected only when exactly one valid answer exists.
//! Whenever two or more lines could have been meant the field is nulled
//! instead of guessed.

use crate::registry::ReferenceRegistry;

/// Trims and upper-cases a code cell; blank cells become `None`.
pub fn clean_code(raw: &str) -> Option<String> {
    let code = raw.trim().to_uppercase();
    (!code.is_empty()).then_some(code)
}

pub fn reconcile_line(
    station: &str,
    line: Option<&str>,
    registry: &ReferenceRegistry,
) -> Option<String> {
    let Some(valid_codes) = registry.lines_for_station(station) else {
        // non-passenger locations have nothing to check against
        return line.map(str::to_string);
    };

    if let Some(line) = line {
        if valid_codes.iter().any(|c| c == line) {
            return Some(line.to_string());
        }
    }

    match valid_codes {
        [only] => Some(only.clone()),
        _ => None,
    }
}

/// `line` must already be the reconciled line.
pub fn reconcile_bound(
    station: &str,
    line: Option<&str>,
    bound: Option<&str>,
    registry: &ReferenceRegistry,
) -> Option<String> {
    let bound = bound?;

    let line_directions = line
        .filter(|_| registry.is_passenger_station(station))
        .and_then(|l| registry.bounds_for_line(l));

    let valid = match line_directions {
        Some(directions) => directions.iter().any(|d| d == bound),
        None => registry.is_valid_bound(bound),
    };

    valid.then(|| bound.to_string())
}
