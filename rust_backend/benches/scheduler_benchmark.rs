use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use qtty::Arcseconds;
use recon_scheduler::astro::RiseSet;
use recon_scheduler::models::{
    CandidateTarget, Designation, ModifiedJulianDate, ObserverSite, OrbitClass, Period, ProgramTokens, SkyCoordinate,
    VisibleTarget,
};
use recon_scheduler::services::visibility::{compute_visibility, darkness_interval, default_minimum};
use recon_scheduler::services::{GroupFillPolicy, InstrumentConfigurations, ObservingGroupScheduler, SchedulerConfig};

/// Targets spread along a band of sky, a few degrees apart.
fn field(count: u32) -> Vec<VisibleTarget> {
    (0..count)
        .map(|i| {
            let ra = (i as f64 * 7.3) % 360.0;
            let dec = ((i as f64 * 3.1) % 40.0) - 10.0;
            VisibleTarget {
                candidate: CandidateTarget {
                    raw_designation: i.to_string(),
                    designation: Designation::Numbered(i + 1),
                    orbit_class: OrbitClass::Classical,
                    position_uncertainty: Arcseconds::new(1.0),
                    event_time: None,
                },
                coordinate: SkyCoordinate::from_degrees(ra, dec).unwrap(),
                magnitude: 21.0 + (i % 5) as f64,
                window: Period::from_mjd(58133.25, 58133.6),
                rise_set: RiseSet::AlwaysUp,
            }
        })
        .collect()
}

fn bench_build_groups(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_groups");
    let tokens = ProgramTokens::new("18AC99", "Q1");

    for policy in [GroupFillPolicy::SingleTarget, GroupFillPolicy::FillToBudget] {
        let scheduler = ObservingGroupScheduler::new(
            SchedulerConfig {
                fill_policy: policy,
                ..SchedulerConfig::default()
            },
            InstrumentConfigurations::default(),
        );
        for count in [50, 500] {
            let targets = field(count);
            group.bench_with_input(
                BenchmarkId::new(policy.to_string(), count),
                &targets,
                |b, targets| b.iter(|| scheduler.build_groups(black_box(targets), &tokens)),
            );
        }
    }

    group.finish();
}

fn bench_visibility(c: &mut Criterion) {
    let site = ObserverSite::cfht();
    let start = ModifiedJulianDate::new(58133.0);
    let dark = darkness_interval(&site, start).unwrap();
    let targets = field(200);

    c.bench_function("compute_visibility_200", |b| {
        b.iter(|| {
            for target in &targets {
                black_box(compute_visibility(
                    &site,
                    &target.coordinate,
                    &dark,
                    start,
                    default_minimum(),
                ));
            }
        });
    });
}

criterion_group!(benches, bench_build_groups, bench_visibility);
criterion_main!(benches);
