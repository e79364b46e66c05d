//! Observing-group scheduler.
//!
//! Greedy single pass with restart over the RA-sorted visible targets: each
//! pass opens a group anchored on the first unscheduled target, adds the
//! targets within the separation radius of the anchor and closes the group
//! when the fill policy says so. Every logical group is emitted
//! `repeat_count + 1` times with distinct tokens.
//!
//! This is a heuristic packing. It guarantees the anchor radius, the budget
//! check and termination, nothing about optimality.

use std::fmt;
use std::str::FromStr;

use log::{debug, info, warn};
use qtty::{Degrees, Seconds};
use serde::{Deserialize, Serialize};

use super::exposure::InstrumentConfigurations;
use crate::models::{
    ObservingBlock, ObservingGroup, ProgramTokens, SkyCoordinate, VisibleTarget,
    DEFAULT_CONSTRAINT_ID,
};

pub const DEFAULT_SEPARATION_RADIUS_DEG: f64 = 10.0;
pub const DEFAULT_DURATION_BUDGET_SEC: f64 = 3000.0;
pub const DEFAULT_REPEAT_COUNT: u32 = 2;

/// When a group stops accepting targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupFillPolicy {
    /// Close the group after its first accepted target.
    #[default]
    SingleTarget,
    /// Keep accepting targets until the running duration exceeds the budget.
    FillToBudget,
}

impl FromStr for GroupFillPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "single-target" | "single" => Ok(GroupFillPolicy::SingleTarget),
            "fill-to-budget" | "fill" => Ok(GroupFillPolicy::FillToBudget),
            _ => Err(format!("Unknown group fill policy: {}", s)),
        }
    }
}

impl fmt::Display for GroupFillPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupFillPolicy::SingleTarget => f.write_str("single-target"),
            GroupFillPolicy::FillToBudget => f.write_str("fill-to-budget"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub separation_radius: Degrees,
    pub duration_budget: Seconds,
    /// Extra persisted copies per logical group.
    pub repeat_count: u32,
    pub fill_policy: GroupFillPolicy,
    /// Added to the group duration for every block.
    pub block_overhead: Seconds,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            separation_radius: Degrees::new(DEFAULT_SEPARATION_RADIUS_DEG),
            duration_budget: Seconds::new(DEFAULT_DURATION_BUDGET_SEC),
            repeat_count: DEFAULT_REPEAT_COUNT,
            fill_policy: GroupFillPolicy::default(),
            block_overhead: Seconds::new(0.0),
        }
    }
}

/// Result of one scheduling run.
#[derive(Debug, Clone)]
pub struct ScheduleOutcome {
    /// Every persisted copy, ordered by group index then repeat.
    pub groups: Vec<ObservingGroup>,
    pub logical_groups: usize,
    /// Sum of group durations over every copy.
    pub total_exposure: Seconds,
    /// Targets left over when a pass could not schedule anything.
    pub unschedulable: Vec<VisibleTarget>,
}

impl Default for ScheduleOutcome {
    fn default() -> Self {
        Self {
            groups: Vec::new(),
            logical_groups: 0,
            total_exposure: Seconds::new(0.0),
            unschedulable: Vec::new(),
        }
    }
}

impl ScheduleOutcome {
    pub fn scheduled_count(&self) -> usize {
        self.groups
            .iter()
            .filter(|group| group.repeat == 0)
            .map(|group| group.blocks.len())
            .sum()
    }
}

/// Mutable state of one `build_groups` call.
struct SchedulingPass<'a> {
    targets: Vec<&'a VisibleTarget>,
    scheduled: Vec<bool>,
    remaining: usize,
}

/// Group under construction.
struct OpenGroup {
    anchor: SkyCoordinate,
    blocks: Vec<ObservingBlock>,
    duration: f64,
}

impl<'a> SchedulingPass<'a> {
    fn new(targets: &'a [VisibleTarget]) -> Self {
        let mut sorted: Vec<&VisibleTarget> = targets.iter().collect();
        // `sort_by` is stable: equal RAs keep their input order.
        sorted.sort_by(|a, b| a.coordinate.ra.value().total_cmp(&b.coordinate.ra.value()));
        Self {
            scheduled: vec![false; sorted.len()],
            remaining: sorted.len(),
            targets: sorted,
        }
    }

    fn is_done(&self) -> bool {
        self.remaining == 0
    }

    /// Scan the unscheduled targets once and build a single group.
    fn fill_group(
        &mut self,
        config: &SchedulerConfig,
        exposures: &InstrumentConfigurations,
        tokens: &ProgramTokens,
    ) -> Option<OpenGroup> {
        let mut anchor: Option<SkyCoordinate> = None;
        let mut blocks = Vec::new();
        let mut duration = 0.0;

        for (i, target) in self.targets.iter().enumerate() {
            if self.scheduled[i] {
                continue;
            }

            let group_anchor = *anchor.get_or_insert(target.coordinate);
            if group_anchor.separation(&target.coordinate) > config.separation_radius {
                continue;
            }

            self.scheduled[i] = true;
            self.remaining -= 1;

            let selection = exposures.select(target.magnitude);
            let target_token = tokens.target_token(target.designation());
            blocks.push(ObservingBlock {
                token: tokens.block_token(&target_token),
                target_token,
                designation: target.designation().clone(),
                configuration_id: selection.configuration_id,
                exposure: selection.exposure,
                constraint_id: DEFAULT_CONSTRAINT_ID.to_string(),
            });
            duration += selection.exposure.value() + config.block_overhead.value();

            if config.fill_policy == GroupFillPolicy::SingleTarget {
                break;
            }
            if duration > config.duration_budget.value() {
                break;
            }
        }

        let anchor = anchor?;
        if blocks.is_empty() {
            return None;
        }
        Some(OpenGroup {
            anchor,
            blocks,
            duration,
        })
    }

    fn into_unscheduled(self) -> Vec<VisibleTarget> {
        self.targets
            .into_iter()
            .zip(self.scheduled)
            .filter(|(_, scheduled)| !scheduled)
            .map(|(target, _)| target.clone())
            .collect()
    }
}

/// Packs visible targets into observing groups.
#[derive(Debug, Clone, Default)]
pub struct ObservingGroupScheduler {
    config: SchedulerConfig,
    exposures: InstrumentConfigurations,
}

impl ObservingGroupScheduler {
    pub fn new(config: SchedulerConfig, exposures: InstrumentConfigurations) -> Self {
        Self { config, exposures }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn exposures(&self) -> &InstrumentConfigurations {
        &self.exposures
    }

    /// Build every group (and its repeats) for `targets`.
    pub fn build_groups(&self, targets: &[VisibleTarget], tokens: &ProgramTokens) -> ScheduleOutcome {
        let mut pass = SchedulingPass::new(targets);
        let mut outcome = ScheduleOutcome::default();
        let mut total_exposure = 0.0;

        while !pass.is_done() {
            let Some(group) = pass.fill_group(&self.config, &self.exposures, tokens) else {
                warn!(
                    "No target could anchor a new group; {} target(s) left unscheduled",
                    pass.remaining
                );
                break;
            };

            outcome.logical_groups += 1;
            let index = outcome.logical_groups as u32;
            debug!(
                "Group {} anchored at {}: {} block(s), {:.0}s",
                index,
                group.anchor,
                group.blocks.len(),
                group.duration
            );

            for repeat in 0..=self.config.repeat_count {
                outcome.groups.push(ObservingGroup {
                    token: tokens.group_token(index, repeat),
                    index,
                    repeat,
                    anchor: group.anchor,
                    blocks: group.blocks.clone(),
                    duration: Seconds::new(group.duration),
                });
                total_exposure += group.duration;
            }
        }

        outcome.total_exposure = Seconds::new(total_exposure);
        outcome.unschedulable = pass.into_unscheduled();

        info!(
            "Scheduled {} of {} target(s) into {} group(s) ({} copies, {:.0}s total)",
            outcome.scheduled_count(),
            targets.len(),
            outcome.logical_groups,
            outcome.groups.len(),
            total_exposure
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    use proptest::prelude::*;
    use qtty::Arcseconds;

    use crate::astro::RiseSet;
    use crate::models::{CandidateTarget, Designation, OrbitClass, Period};

    fn visible(number: u32, ra: f64, dec: f64, magnitude: f64) -> VisibleTarget {
        VisibleTarget {
            candidate: CandidateTarget {
                raw_designation: number.to_string(),
                designation: Designation::Numbered(number),
                orbit_class: OrbitClass::Classical,
                position_uncertainty: Arcseconds::new(1.0),
                event_time: None,
            },
            coordinate: SkyCoordinate::from_degrees(ra, dec).unwrap(),
            magnitude,
            window: Period::from_mjd(58133.3, 58133.6),
            rise_set: RiseSet::AlwaysUp,
        }
    }

    fn tokens() -> ProgramTokens {
        ProgramTokens::new("18AC99", "Q1")
    }

    fn scheduler(fill_policy: GroupFillPolicy) -> ObservingGroupScheduler {
        ObservingGroupScheduler::new(
            SchedulerConfig {
                fill_policy,
                ..SchedulerConfig::default()
            },
            InstrumentConfigurations::default(),
        )
    }

    fn scenario() -> Vec<VisibleTarget> {
        vec![
            visible(3, 200.0, 0.0, 26.0),
            visible(1, 10.0, 0.0, 22.0),
            visible(2, 12.0, 0.0, 24.5),
        ]
    }

    fn block_exposures(group: &ObservingGroup) -> Vec<f64> {
        group.blocks.iter().map(|block| block.exposure.value()).collect()
    }

    #[test]
    fn test_fill_policy_parsing() {
        assert_eq!("single-target".parse::<GroupFillPolicy>().unwrap(), GroupFillPolicy::SingleTarget);
        assert_eq!("FILL_TO_BUDGET".parse::<GroupFillPolicy>().unwrap(), GroupFillPolicy::FillToBudget);
        assert!("greedy".parse::<GroupFillPolicy>().is_err());
        assert_eq!(GroupFillPolicy::FillToBudget.to_string(), "fill-to-budget");
    }

    #[test]
    fn test_single_target_policy_emits_one_target_per_group() {
        let outcome = scheduler(GroupFillPolicy::SingleTarget).build_groups(&scenario(), &tokens());

        assert_eq!(outcome.logical_groups, 3);
        assert_eq!(outcome.groups.len(), 9);
        assert!(outcome.unschedulable.is_empty());

        let firsts: Vec<&ObservingGroup> = outcome.groups.iter().filter(|g| g.repeat == 0).collect();
        assert_eq!(block_exposures(firsts[0]), vec![80.0]);
        assert_eq!(block_exposures(firsts[1]), vec![340.0]);
        assert_eq!(block_exposures(firsts[2]), vec![500.0]);
        assert_eq!(outcome.total_exposure.value(), 3.0 * (80.0 + 340.0 + 500.0));
    }

    #[test]
    fn test_fill_to_budget_groups_close_targets() {
        let outcome = scheduler(GroupFillPolicy::FillToBudget).build_groups(&scenario(), &tokens());

        assert_eq!(outcome.logical_groups, 2);
        assert_eq!(outcome.groups.len(), 6);

        let first = &outcome.groups[0];
        assert_eq!(first.token, "OG-18AC99-Q1-1-0");
        assert_eq!(
            first.block_tokens(),
            vec!["OB-Q1-18AC99-1", "OB-Q1-18AC99-2"]
        );
        assert_eq!(first.duration.value(), 420.0);

        let last = outcome.groups.last().unwrap();
        assert_eq!(last.token, "OG-18AC99-Q1-2-2");
        assert_eq!(block_exposures(last), vec![500.0]);
        assert_eq!(last.blocks[0].configuration_id, "I13");
        assert_eq!(outcome.total_exposure.value(), 3.0 * 920.0);
    }

    #[test]
    fn test_repeats_share_blocks_with_distinct_tokens() {
        let outcome = scheduler(GroupFillPolicy::FillToBudget).build_groups(&scenario(), &tokens());
        let copies: Vec<&ObservingGroup> = outcome.groups.iter().filter(|g| g.index == 1).collect();

        assert_eq!(copies.len(), 3);
        assert_eq!(copies[0].blocks, copies[1].blocks);
        assert_eq!(copies[1].blocks, copies[2].blocks);
        let tokens: HashSet<&str> = copies.iter().map(|g| g.token.as_str()).collect();
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn test_budget_closes_group_after_it_is_exceeded() {
        // Ten reference-magnitude targets at 340s each: nine exceed 3000s.
        let targets: Vec<VisibleTarget> = (1..=10).map(|n| visible(n, 50.0 + n as f64 * 0.1, 5.0, 24.5)).collect();
        let outcome = scheduler(GroupFillPolicy::FillToBudget).build_groups(&targets, &tokens());

        assert_eq!(outcome.logical_groups, 2);
        assert_eq!(outcome.groups[0].blocks.len(), 9);
        assert_eq!(outcome.groups[0].duration.value(), 3060.0);
        assert_eq!(outcome.groups[3].blocks.len(), 1);
    }

    #[test]
    fn test_block_overhead_counts_toward_duration() {
        let config = SchedulerConfig {
            fill_policy: GroupFillPolicy::FillToBudget,
            block_overhead: Seconds::new(40.0),
            ..SchedulerConfig::default()
        };
        let outcome = ObservingGroupScheduler::new(config, InstrumentConfigurations::default())
            .build_groups(&scenario(), &tokens());
        assert_eq!(outcome.groups[0].duration.value(), 420.0 + 80.0);
    }

    #[test]
    fn test_equal_ra_keeps_input_order() {
        let targets = vec![visible(7, 50.0, 0.0, 23.0), visible(4, 50.0, 0.0, 23.0)];
        let outcome = scheduler(GroupFillPolicy::SingleTarget).build_groups(&targets, &tokens());
        assert_eq!(outcome.groups[0].blocks[0].designation, Designation::Numbered(7));
    }

    #[test]
    fn test_mutually_close_targets_are_all_scheduled_once() {
        let targets: Vec<VisibleTarget> = (1..=6).map(|n| visible(n, 100.0 + n as f64, 10.0, 23.5)).collect();
        let outcome = scheduler(GroupFillPolicy::SingleTarget).build_groups(&targets, &tokens());

        assert_eq!(outcome.logical_groups, 6);
        assert_eq!(outcome.groups.len(), 6 * 3);
        assert_eq!(outcome.scheduled_count(), 6);
    }

    #[test]
    fn test_starvation_terminates_with_remainder() {
        let config = SchedulerConfig {
            separation_radius: Degrees::new(-1.0),
            ..SchedulerConfig::default()
        };
        let outcome = ObservingGroupScheduler::new(config, InstrumentConfigurations::default())
            .build_groups(&scenario(), &tokens());

        assert!(outcome.groups.is_empty());
        assert_eq!(outcome.unschedulable.len(), 3);
        assert_eq!(outcome.total_exposure.value(), 0.0);
    }

    #[test]
    fn test_empty_input() {
        let outcome = ObservingGroupScheduler::default().build_groups(&[], &tokens());
        assert_eq!(outcome.logical_groups, 0);
        assert!(outcome.groups.is_empty());
    }

    fn arb_targets() -> impl Strategy<Value = Vec<(f64, f64, f64)>> {
        prop::collection::vec((0.0f64..360.0, -30.0f64..60.0, 20.0f64..27.0), 0..40)
    }

    proptest! {
        #[test]
        fn prop_groups_respect_anchor_radius_and_schedule_each_target_once(
            raw in arb_targets(),
            fill in prop::bool::ANY,
        ) {
            let targets: Vec<VisibleTarget> = raw
                .iter()
                .enumerate()
                .map(|(i, (ra, dec, mag))| visible(i as u32 + 1, *ra, *dec, *mag))
                .collect();
            let by_token: HashMap<String, SkyCoordinate> = targets
                .iter()
                .map(|t| (tokens().target_token(t.designation()), t.coordinate))
                .collect();
            let policy = if fill { GroupFillPolicy::FillToBudget } else { GroupFillPolicy::SingleTarget };
            let outcome = scheduler(policy).build_groups(&targets, &tokens());

            prop_assert!(outcome.unschedulable.is_empty());
            prop_assert_eq!(outcome.groups.len(), outcome.logical_groups * 3);

            let mut seen = HashSet::new();
            for group in outcome.groups.iter().filter(|g| g.repeat == 0) {
                for block in &group.blocks {
                    let coordinate = by_token[&block.target_token];
                    prop_assert!(group.anchor.separation(&coordinate).value() <= DEFAULT_SEPARATION_RADIUS_DEG);
                    prop_assert!(seen.insert(block.target_token.clone()));
                }
                // Before its last block the group was still within budget.
                let last = group.blocks.last().unwrap().exposure.value();
                prop_assert!(group.duration.value() - last <= DEFAULT_DURATION_BUDGET_SEC);
            }
            prop_assert_eq!(seen.len(), targets.len());
        }
    }
}
