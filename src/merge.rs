//! Reconciles differently-shaped source tables into one row set.
//!
//! Each source (a workbook, a directory of exports...) contributes one or more
//! sub-batches. A sub-batch is accepted only when its columns are exactly the
//! reference set, optionally plus the internal `_id` column which is dropped.
//! Anything else is skipped whole and reported in the [`MergeSummary`].

use std::collections::{BTreeSet, HashMap};
use tracing::{info, warn};

use crate::records::{INTERNAL_ID_COLUMN, REFERENCE_COLUMNS, RawRecord};

/// One table: a sheet of a workbook or a single exported file.
#[derive(Debug, Clone)]
pub struct SubBatch {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Set when the file could not be read at all. Such a sub-batch is
    /// counted and reported, never merged.
    pub read_error: Option<String>,
}

impl SubBatch {
    pub fn new(name: &str, columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        SubBatch {
            name: name.to_string(),
            columns,
            rows,
            read_error: None,
        }
    }

    pub fn unreadable(name: &str, error: String) -> Self {
        SubBatch {
            name: name.to_string(),
            columns: Vec::new(),
            rows: Vec::new(),
            read_error: Some(error),
        }
    }
}

/// A named source made of one or more sub-batches.
#[derive(Debug, Clone)]
pub struct SourceBatch {
    pub name: String,
    pub sub_batches: Vec<SubBatch>,
}

/// Result of comparing a sub-batch's columns with the reference set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaCheck {
    Matches,
    /// Only the internal id column is extra; it is dropped.
    DropInternalId,
    Mismatch {
        missing: Vec<String>,
        extra: Vec<String>,
    },
    Unreadable {
        error: String,
    },
}

pub fn check_schema(columns: &[String], reference: &[&str]) -> SchemaCheck {
    let actual: BTreeSet<&str> = columns.iter().map(String::as_str).collect();
    let expected: BTreeSet<&str> = reference.iter().copied().collect();

    let missing: Vec<String> = expected.difference(&actual).map(|c| c.to_string()).collect();
    let extra: Vec<String> = actual.difference(&expected).map(|c| c.to_string()).collect();

    if missing.is_empty() && extra.is_empty() {
        SchemaCheck::Matches
    } else if missing.is_empty() && extra == [INTERNAL_ID_COLUMN] {
        SchemaCheck::DropInternalId
    } else {
        SchemaCheck::Mismatch { missing, extra }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaIssue {
    pub sub_batch: String,
    pub check: SchemaCheck,
}

/// Audit record of a merge. Not consumed by downstream stages.
#[derive(Debug, Clone, Default)]
pub struct MergeSummary {
    pub total: usize,
    pub accepted: Vec<String>,
    pub issues: Vec<SchemaIssue>,
    pub rows: usize,
}

impl MergeSummary {
    /// Human-readable audit lines, one fact per line.
    pub fn log_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();

        for issue in &self.issues {
            match &issue.check {
                SchemaCheck::Mismatch { missing, extra } => {
                    lines.push(format!("{} has issues:", issue.sub_batch));
                    if !missing.is_empty() {
                        lines.push(format!("   Missing columns: {missing:?}"));
                    }
                    if !extra.is_empty() {
                        lines.push(format!("   Extra columns: {extra:?}"));
                    }
                    lines.push("   -> Skipped.".to_string());
                }
                SchemaCheck::DropInternalId => {
                    lines.push(format!("{} has '{INTERNAL_ID_COLUMN}' column.", issue.sub_batch));
                    lines.push(format!("   -> Dropping '{INTERNAL_ID_COLUMN}' column."));
                }
                SchemaCheck::Unreadable { error } => {
                    lines.push(format!("{} could not be read: {error}", issue.sub_batch));
                    lines.push("   -> Skipped.".to_string());
                }
                SchemaCheck::Matches => {}
            }
        }

        if self.accepted.is_empty() {
            lines.push("No valid sub-batches were merged.".to_string());
        } else {
            lines.push(format!(
                "Merged {} out of {} sub-batches ({} rows).",
                self.accepted.len(),
                self.total,
                self.rows
            ));
            lines.push("Sub-batches merged:".to_string());
            lines.extend(self.accepted.iter().map(|name| format!(" - {name}")));
        }

        lines
    }
}

#[derive(Debug)]
pub struct Merged {
    pub records: Vec<RawRecord>,
    pub summary: MergeSummary,
}

fn clean_header(header: &str) -> String {
    header.trim_start_matches('\u{feff}').trim().to_string()
}

/// Reorders a sub-batch's rows into reference column order. Short rows are
/// padded with empty cells.
fn reorder_rows(sub: &SubBatch, reference: &[&str]) -> Vec<Vec<String>> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    for (i, column) in sub.columns.iter().enumerate() {
        positions.entry(column.as_str()).or_insert(i);
    }

    let indices: Vec<Option<usize>> = reference.iter().map(|c| positions.get(c).copied()).collect();

    sub.rows
        .iter()
        .map(|row| {
            indices
                .iter()
                .map(|idx| idx.and_then(|i| row.get(i)).cloned().unwrap_or_default())
                .collect()
        })
        .collect()
}

#[tracing::instrument(skip_all, fields(sources = sources.len()))]
pub fn merge_batches(sources: Vec<SourceBatch>) -> Merged {
    let mut summary = MergeSummary::default();
    let mut records = Vec::new();

    for source in sources {
        for mut sub in source.sub_batches {
            summary.total += 1;
            if let Some(error) = sub.read_error.take() {
                warn!(
                    source = %source.name,
                    sub_batch = %sub.name,
                    %error,
                    "Skipping unreadable sub-batch"
                );
                summary.issues.push(SchemaIssue {
                    sub_batch: sub.name,
                    check: SchemaCheck::Unreadable { error },
                });
                continue;
            }
            sub.columns = sub.columns.iter().map(|c| clean_header(c)).collect();

            let check = check_schema(&sub.columns, &REFERENCE_COLUMNS);
            match &check {
                SchemaCheck::Mismatch { missing, extra } => {
                    warn!(
                        source = %source.name,
                        sub_batch = %sub.name,
                        ?missing,
                        ?extra,
                        "Skipping sub-batch with mismatched columns"
                    );
                    summary.issues.push(SchemaIssue {
                        sub_batch: sub.name,
                        check,
                    });
                    continue;
                }
                SchemaCheck::DropInternalId => {
                    info!(sub_batch = %sub.name, "Dropping internal id column");
                    summary.issues.push(SchemaIssue {
                        sub_batch: sub.name.clone(),
                        check,
                    });
                }
                SchemaCheck::Matches | SchemaCheck::Unreadable { .. } => {}
            }

            let rows = reorder_rows(&sub, &REFERENCE_COLUMNS);
            summary.rows += rows.len();
            records.extend(rows.iter().map(|row| RawRecord::from_row(&sub.name, row)));
            summary.accepted.push(sub.name);
        }
    }

    info!(
        accepted = summary.accepted.len(),
        total = summary.total,
        rows = summary.rows,
        "Merge complete"
    );

    Merged { records, summary }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|c| c.to_string()).collect()
    }

    fn reference_row(marker: &str) -> Vec<String> {
        REFERENCE_COLUMNS
            .iter()
            .map(|c| format!("{marker}:{c}"))
            .collect()
    }

    fn sub(name: &str, cols: Vec<String>, rows: Vec<Vec<String>>) -> SubBatch {
        SubBatch::new(name, cols, rows)
    }

    #[test]
    fn test_check_schema() {
        let reference = columns(&REFERENCE_COLUMNS);
        assert_eq!(check_schema(&reference, &REFERENCE_COLUMNS), SchemaCheck::Matches);

        let mut with_id = reference.clone();
        with_id.push("_id".into());
        assert_eq!(
            check_schema(&with_id, &REFERENCE_COLUMNS),
            SchemaCheck::DropInternalId
        );

        let mut extra = reference.clone();
        extra.push("Notes".into());
        assert_eq!(
            check_schema(&extra, &REFERENCE_COLUMNS),
            SchemaCheck::Mismatch {
                missing: vec![],
                extra: vec!["Notes".into()],
            }
        );

        let missing: Vec<String> = reference.into_iter().filter(|c| c != "Line").collect();
        assert_eq!(
            check_schema(&missing, &REFERENCE_COLUMNS),
            SchemaCheck::Mismatch {
                missing: vec!["Line".into()],
                extra: vec![],
            }
        );
    }

    #[test]
    fn test_missing_column_with_id_is_skipped() {
        let mut cols: Vec<String> = columns(&REFERENCE_COLUMNS)
            .into_iter()
            .filter(|c| c != "Bound")
            .collect();
        cols.push("_id".into());

        assert_eq!(
            check_schema(&cols, &REFERENCE_COLUMNS),
            SchemaCheck::Mismatch {
                missing: vec!["Bound".into()],
                extra: vec!["_id".into()],
            }
        );
    }

    #[test]
    fn test_merge_reorders_and_drops_id() {
        let mut shuffled: Vec<String> = columns(&REFERENCE_COLUMNS);
        shuffled.reverse();
        shuffled.insert(0, "_id".into());
        let mut row = reference_row("b");
        row.reverse();
        row.insert(0, "42".into());

        let sources = vec![
            SourceBatch {
                name: "2023".into(),
                sub_batches: vec![sub(
                    "2023.csv",
                    columns(&REFERENCE_COLUMNS),
                    vec![reference_row("a")],
                )],
            },
            SourceBatch {
                name: "2024".into(),
                sub_batches: vec![sub("2024 Sheet0", shuffled, vec![row])],
            },
        ];

        let merged = merge_batches(sources);

        assert_eq!(merged.records.len(), 2);
        assert_eq!(merged.records[0].date, "a:Date");
        assert_eq!(merged.records[1].date, "b:Date");
        assert_eq!(merged.records[1].vehicle, "b:Vehicle");
        assert_eq!(merged.records[1].source, "2024 Sheet0");
        assert_eq!(merged.summary.accepted, vec!["2023.csv", "2024 Sheet0"]);
        assert_eq!(merged.summary.issues.len(), 1);
    }

    #[test]
    fn test_merge_skips_bad_sub_batch_and_continues() {
        let mut bad_cols = columns(&REFERENCE_COLUMNS);
        bad_cols.push("Comments".into());

        let sources = vec![SourceBatch {
            name: "workbook".into(),
            sub_batches: vec![
                sub("Sheet0", bad_cols, vec![reference_row("x")]),
                sub("Sheet1", columns(&REFERENCE_COLUMNS), vec![reference_row("y")]),
            ],
        }];

        let merged = merge_batches(sources);

        assert_eq!(merged.records.len(), 1);
        assert_eq!(merged.records[0].station, "y:Station");
        assert_eq!(merged.summary.total, 2);
        assert_eq!(merged.summary.accepted, vec!["Sheet1"]);

        let lines = merged.summary.log_lines();
        assert!(lines.iter().any(|l| l.contains("Extra columns") && l.contains("Comments")));
        assert!(lines.iter().any(|l| l == "Merged 1 out of 2 sub-batches (1 rows)."));
    }

    #[test]
    fn test_unreadable_sub_batch_counted_and_reported() {
        let sources = vec![SourceBatch {
            name: "2024".into(),
            sub_batches: vec![
                SubBatch::unreadable("broken.csv.gz", "corrupt deflate stream".into()),
                sub("ok.csv", columns(&REFERENCE_COLUMNS), vec![reference_row("z")]),
            ],
        }];

        let merged = merge_batches(sources);

        assert_eq!(merged.records.len(), 1);
        assert_eq!(merged.summary.total, 2);
        assert_eq!(merged.summary.accepted, vec!["ok.csv"]);

        let lines = merged.summary.log_lines();
        assert_eq!(lines[0], "broken.csv.gz could not be read: corrupt deflate stream");
        assert_eq!(lines[1], "   -> Skipped.");
    }

    #[test]
    fn test_headers_trimmed_and_bom_removed() {
        let mut cols = columns(&REFERENCE_COLUMNS);
        cols[0] = "\u{feff}Date".into();
        cols[5] = " Min Delay ".into();

        let merged = merge_batches(vec![SourceBatch {
            name: "s".into(),
            sub_batches: vec![sub("s.csv", cols, vec![reference_row("z")])],
        }]);

        assert_eq!(merged.records.len(), 1);
        assert!(merged.summary.issues.is_empty());
    }

    #[test]
    fn test_nothing_merged() {
        let merged = merge_batches(vec![]);
        assert!(merged.records.is_empty());
        assert_eq!(
            merged.summary.log_lines(),
            vec!["No valid sub-batches were merged."]
        );
    }
}
