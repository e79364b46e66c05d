//! One scheduling run, from candidate table to stored program.
//!
//! 1. select candidates from the table, one per object;
//! 2. predict every selected target at dusk (lookups run concurrently);
//! 3. keep targets whose visibility window is long enough;
//! 4. pack them into observing groups;
//! 5. persist targets, blocks and groups, recording failures per record.
//!
//! Per-target problems (no ephemeris, undecodable designation, rejection)
//! never stop the run; they are listed in the [`RunReport`].

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::{self, Write};

use anyhow::{Context, Result};
use futures::future::join_all;
use log::{info, warn};
use qtty::Hours;

use super::scheduler::{ObservingGroupScheduler, ScheduleOutcome};
use super::visibility::{compute_visibility, darkness_interval, Rejection, Visibility};
use crate::db::ProgramRepository;
use crate::ephemeris::EphemerisProvider;
use crate::models::{
    CandidateTarget, ModifiedJulianDate, ObserverSite, Period, ProgramTokens, TargetRecord,
    VisibleTarget,
};
use crate::parsing::{split_duplicates, CandidateTable, SelectionCriteria};

/// Kind of record a persistence failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Target,
    ObservingBlock,
    ObservingGroup,
    /// Writing out the whole program.
    Program,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecordKind::Target => "target",
            RecordKind::ObservingBlock => "observing block",
            RecordKind::ObservingGroup => "observing group",
            RecordKind::Program => "program",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersistenceFailure {
    pub kind: RecordKind,
    pub token: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RejectedTarget {
    pub candidate: CandidateTarget,
    pub rejection: Rejection,
}

/// Target dropped before the visibility check.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedTarget {
    pub raw_designation: String,
    pub reason: String,
}

/// Everything an operator needs to know about one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub dark: Period,
    /// Visible targets, ordered by right ascension.
    pub accepted: Vec<VisibleTarget>,
    pub rejected: Vec<RejectedTarget>,
    pub skipped: Vec<SkippedTarget>,
    pub schedule: ScheduleOutcome,
    pub failures: Vec<PersistenceFailure>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Operator-facing lines, in print order.
    pub fn console_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        lines.push(format!("Dark interval: {} -> {}", self.dark.start, self.dark.stop));

        for target in &self.accepted {
            lines.push(accepted_line(target));
        }
        for rejected in &self.rejected {
            lines.push(format!(
                "rejected {}: {}",
                rejected.candidate.raw_designation,
                rejected.rejection.describe()
            ));
        }
        for skipped in &self.skipped {
            lines.push(format!("skipped {}: {}", skipped.raw_designation, skipped.reason));
        }
        for target in &self.schedule.unschedulable {
            lines.push(format!("unschedulable {}", target.candidate.raw_designation));
        }
        for group in &self.schedule.groups {
            lines.push(format!(
                "OG {} is {}s in duration.",
                group.token,
                group.duration.value()
            ));
        }
        for failure in &self.failures {
            lines.push(format!(
                "failed to store {} {}: {}",
                failure.kind, failure.token, failure.message
            ));
        }

        lines.push(format!(
            "{} accepted, {} rejected, {} skipped, {} unschedulable; {} group(s) in {} cop{}, {}s total",
            self.accepted.len(),
            self.rejected.len(),
            self.skipped.len(),
            self.schedule.unschedulable.len(),
            self.schedule.logical_groups,
            self.schedule.groups.len(),
            if self.schedule.groups.len() == 1 { "y" } else { "ies" },
            self.schedule.total_exposure.value()
        ));
        lines
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        for line in self.console_lines() {
            writeln!(writer, "{}", line)?;
        }
        Ok(())
    }
}

fn format_instant(at: Option<ModifiedJulianDate>) -> String {
    at.map(|at| at.to_datetime().format("%Y-%m-%dT%H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// `RA Dec designation event uncertainty rise set hours-up`
fn accepted_line(target: &VisibleTarget) -> String {
    format!(
        "{:>9.4} {:>8.4} {:<14} {:<16} {:>7.2} {:<16} {:<16} {:>5.2}",
        target.coordinate.ra.value(),
        target.coordinate.dec.value(),
        target.designation().to_string(),
        format_instant(target.candidate.event_time),
        target.candidate.position_uncertainty.value(),
        format_instant(target.rise_set.rise()),
        format_instant(target.rise_set.set()),
        target.window.duration_hours()
    )
}

/// Runs the whole pipeline for one night.
pub struct ReconPlanner {
    site: ObserverSite,
    scheduler: ObservingGroupScheduler,
    minimum_window: Hours,
    tokens: ProgramTokens,
}

impl ReconPlanner {
    pub fn new(
        site: ObserverSite,
        scheduler: ObservingGroupScheduler,
        minimum_window: Hours,
        tokens: ProgramTokens,
    ) -> Self {
        Self {
            site,
            scheduler,
            minimum_window,
            tokens,
        }
    }

    pub fn tokens(&self) -> &ProgramTokens {
        &self.tokens
    }

    /// Plan the night that begins at or after `start` and store the result.
    ///
    /// # Errors
    /// Only when the site has no dark time after `start`; everything else is
    /// reported in the returned [`RunReport`].
    pub async fn run(
        &self,
        table: &CandidateTable,
        criteria: &SelectionCriteria,
        start: ModifiedJulianDate,
        ephemeris: &dyn EphemerisProvider,
        repository: &dyn ProgramRepository,
    ) -> Result<RunReport> {
        let dark = darkness_interval(&self.site, start)
            .with_context(|| format!("No observing night after {}", start))?;
        info!("Planning {} -> {} at {}", dark.start, dark.stop, self.site.name);

        let mut skipped: Vec<SkippedTarget> = table
            .undecoded
            .iter()
            .map(|row| SkippedTarget {
                raw_designation: row.raw_designation.clone(),
                reason: row.error.to_string(),
            })
            .collect();

        let (selected, duplicates) = split_duplicates(table.select(criteria));
        for duplicate in duplicates {
            info!("Skipping repeated row for {}", duplicate.designation);
            skipped.push(SkippedTarget {
                reason: format!("repeated entry for {}", duplicate.designation),
                raw_designation: duplicate.raw_designation,
            });
        }

        let predictions = join_all(
            selected
                .iter()
                .map(|candidate| ephemeris.predict(&candidate.designation, dark.start)),
        )
        .await;

        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        for (candidate, prediction) in selected.into_iter().zip(predictions) {
            let point = match prediction {
                Ok(point) => point,
                Err(e) => {
                    warn!("Skipping {}: {}", candidate.raw_designation, e);
                    skipped.push(SkippedTarget {
                        raw_designation: candidate.raw_designation,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            match compute_visibility(
                &self.site,
                &point.coordinate,
                &dark,
                start,
                self.minimum_window,
            ) {
                Visibility::Visible { window, rise_set } => {
                    info!(
                        "{} is up for {:.2} hours",
                        candidate.designation,
                        window.duration_hours()
                    );
                    accepted.push(VisibleTarget {
                        candidate,
                        coordinate: point.coordinate,
                        magnitude: point.magnitude,
                        window,
                        rise_set,
                    });
                }
                Visibility::Rejected { rejection, .. } => {
                    info!("{} rejected: {}", candidate.designation, rejection.describe());
                    rejected.push(RejectedTarget {
                        candidate,
                        rejection,
                    });
                }
            }
        }

        accepted.sort_by(|a, b| a.coordinate.ra.value().total_cmp(&b.coordinate.ra.value()));
        let schedule = self.scheduler.build_groups(&accepted, &self.tokens);
        let failures = self.persist(&accepted, &schedule, dark.start, repository).await;
        if !failures.is_empty() {
            warn!("{} record(s) could not be stored", failures.len());
        }

        Ok(RunReport {
            dark,
            accepted,
            rejected,
            skipped,
            schedule,
            failures,
        })
    }

    /// Store targets, then blocks, then groups, so that every reference
    /// points at an already stored record.
    async fn persist(
        &self,
        accepted: &[VisibleTarget],
        schedule: &ScheduleOutcome,
        epoch: ModifiedJulianDate,
        repository: &dyn ProgramRepository,
    ) -> Vec<PersistenceFailure> {
        let mut failures = Vec::new();
        let by_token: HashMap<String, &VisibleTarget> = accepted
            .iter()
            .map(|target| (self.tokens.target_token(target.designation()), target))
            .collect();

        let mut stored_targets = HashSet::new();
        let mut stored_blocks = HashSet::new();
        for group in schedule.groups.iter().filter(|group| group.repeat == 0) {
            for block in &group.blocks {
                if !stored_targets.insert(block.target_token.clone()) {
                    continue;
                }
                let Some(target) = by_token.get(&block.target_token) else {
                    failures.push(PersistenceFailure {
                        kind: RecordKind::Target,
                        token: block.target_token.clone(),
                        message: "no visible target for this token".to_string(),
                    });
                    continue;
                };
                let record = TargetRecord {
                    token: block.target_token.clone(),
                    name: target.designation().to_string(),
                    coordinate: target.coordinate,
                    magnitude: target.magnitude,
                    epoch,
                };
                if let Err(e) = repository.persist_target(&record).await {
                    failures.push(failure(RecordKind::Target, &record.token, e));
                }
            }
        }

        for group in &schedule.groups {
            for block in &group.blocks {
                if !stored_blocks.insert(block.token.clone()) {
                    continue;
                }
                if let Err(e) = repository.persist_block(block).await {
                    failures.push(failure(RecordKind::ObservingBlock, &block.token, e));
                }
            }
        }

        for group in &schedule.groups {
            if let Err(e) = repository.persist_group(group).await {
                failures.push(failure(RecordKind::ObservingGroup, &group.token, e));
            }
        }

        if let Err(e) = repository.flush().await {
            failures.push(failure(RecordKind::Program, &self.tokens.runid, e));
        }
        failures
    }
}

fn failure(kind: RecordKind, token: &str, error: impl fmt::Display) -> PersistenceFailure {
    warn!("Failed to store {} {}: {}", kind, token, error);
    PersistenceFailure {
        kind,
        token: token.to_string(),
        message: error.to_string(),
    }
}
