//! Composes the cleaning stages into one batch run.
//!
//! merge -> validate -> dedupe -> station -> time -> delay code -> route.
//! Every stage either maps a row to a new value or routes it to the dropped
//! side-channel with a single reason. Nothing is ever resurrected.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::merge::{MergeSummary, SourceBatch, merge_batches};
use crate::records::{
    DelayEvent, DropReason, DroppedRecord, RawRecord, StationCategory, UnknownCodeRecord,
};
use crate::registry::ReferenceRegistry;
use crate::route::{clean_code, reconcile_bound, reconcile_line};
use crate::station::{StationNormalizer, categorize};
use crate::temporal::time_context;
use crate::validate::{ValidRecord, drop_duplicates, validate_records};

/// Everything a cleaning run produces.
#[derive(Debug, Default)]
pub struct CleanOutcome {
    /// Surviving rows, ordered by timestamp.
    pub events: Vec<DelayEvent>,
    pub dropped: Vec<DroppedRecord>,
    pub unknown_codes: Vec<UnknownCodeRecord>,
    pub merge_summary: MergeSummary,
    /// Canonical station names seen, by category. Includes names whose rows
    /// were later dropped as unknown.
    pub stations_by_category: BTreeMap<StationCategory, BTreeSet<String>>,
    pub directional_names: BTreeSet<String>,
}

impl CleanOutcome {
    pub fn dropped_count(&self, reason: DropReason) -> usize {
        self.dropped.iter().filter(|d| d.reason == reason).count()
    }
}

pub struct Pipeline<'a> {
    registry: &'a ReferenceRegistry,
    normalizer: StationNormalizer<'a>,
}

impl<'a> Pipeline<'a> {
    pub fn new(registry: &'a ReferenceRegistry) -> Result<Self, regex::Error> {
        Ok(Pipeline {
            registry,
            normalizer: StationNormalizer::new(registry)?,
        })
    }

    /// Merges the sources and cleans the resulting rows.
    #[tracing::instrument(skip_all, fields(sources = sources.len()))]
    pub fn run(&self, sources: Vec<SourceBatch>) -> CleanOutcome {
        let merged = merge_batches(sources);
        let mut outcome = self.clean_records(merged.records);
        outcome.merge_summary = merged.summary;
        outcome
    }

    /// Cleans rows that are already in reference column order.
    #[tracing::instrument(skip_all, fields(rows = rows.len()))]
    pub fn clean_records(&self, rows: Vec<RawRecord>) -> CleanOutcome {
        let mut outcome = CleanOutcome::default();

        let validated = validate_records(rows);
        outcome.dropped.extend(validated.dropped);

        let deduped = drop_duplicates(validated.kept);
        outcome.dropped.extend(deduped.dropped);

        for row in deduped.kept {
            match self.clean_row(row, &mut outcome) {
                Ok(event) => outcome.events.push(event),
                Err(dropped) => outcome.dropped.push(dropped),
            }
        }

        // stable, so same-minute rows keep their source order
        outcome.events.sort_by_key(|e| e.datetime);

        info!(
            kept = outcome.events.len(),
            dropped = outcome.dropped.len(),
            unknown_codes = outcome.unknown_codes.len(),
            directional = outcome.directional_names.len(),
            "Cleaning complete"
        );

        outcome
    }

    fn clean_row(
        &self,
        row: ValidRecord,
        outcome: &mut CleanOutcome,
    ) -> Result<DelayEvent, DroppedRecord> {
        let raw = row.raw;

        let station = self.normalizer.normalize(&raw.station);
        let category = categorize(&station, self.registry);
        outcome
            .stations_by_category
            .entry(category)
            .or_default()
            .insert(station.clone());
        if self.normalizer.has_directional(&station) {
            outcome.directional_names.insert(station.clone());
        }

        if category == StationCategory::Unknown {
            debug!(station = %station, source = %raw.source, "Unknown station");
            return Err(DroppedRecord {
                raw,
                reason: DropReason::UnknownStation,
            });
        }

        let ctx = match time_context(&raw.date, &raw.time, self.registry) {
            Ok(ctx) => ctx,
            Err(e) => {
                debug!(error = %e, source = %raw.source, "Unparseable timestamp");
                return Err(DroppedRecord {
                    raw,
                    reason: DropReason::UnparseableDatetime,
                });
            }
        };

        let code = clean_code(&raw.code);
        let code_info = code.as_deref().and_then(|c| self.registry.delay_code(c));
        if code_info.is_none() {
            outcome.unknown_codes.push(UnknownCodeRecord {
                raw: raw.clone(),
                code: code.clone().unwrap_or_default(),
            });
        }

        let line = reconcile_line(&station, clean_code(&raw.line).as_deref(), self.registry);
        let bound = reconcile_bound(
            &station,
            line.as_deref(),
            clean_code(&raw.bound).as_deref(),
            self.registry,
        );

        Ok(DelayEvent {
            date: ctx.datetime.date(),
            time: ctx.datetime.time(),
            day: ctx.day,
            station,
            station_category: category,
            delay_code: code_info.and(code),
            delay_minutes: row.delay_minutes,
            gap_minutes: row.gap_minutes,
            bound,
            line,
            vehicle_id: row.vehicle_id,
            datetime: ctx.datetime,
            is_weekday: ctx.is_weekday,
            rush_hour_bucket: ctx.rush_hour_bucket,
            season: ctx.season,
            delay_category: code_info.map(|i| i.category.clone()),
            delay_description: code_info.map(|i| i.description.clone()),
        })
    }
}
