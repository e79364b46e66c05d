//! End-to-end runs from candidate table to stored program.

use std::fs;

use recon_scheduler::config::RunConfig;
use recon_scheduler::db::{JsonProgramRepository, LocalRepository, ProgramRepository};
use recon_scheduler::ephemeris::TableEphemeris;
use recon_scheduler::parsing::read_candidate_table;
use recon_scheduler::services::{
    InstrumentConfigurations, ObservingGroupScheduler, ReconPlanner, Rejection,
};
use tempfile::tempdir;

const CANDIDATES: &str = "\
Desig,DES Classification,TNO pos err,ET
03UZ413,CLASSICAL,0.5,2018 Jan 20 06:12:45
15760 Albion,RESONANT,2.0,
14UZ224,SCATNEAR,1.0,2018 Jan 25 01:00:00
K03U41Z,CLASSICAL,3.0,2018 Jan 26 01:00:00
05RN43,CENTAURR,1.0,2018 Jan 22 00:00:00
";

const EPHEMERIS: &str = r#"{
  "targets": [
    {"designation": "03UZ413", "points": [
      {"mjd": 58133.0, "ra": 110.0, "dec": 20.0, "mag": 23.0},
      {"mjd": 58134.0, "ra": 110.1, "dec": 20.0, "mag": 23.0}
    ]},
    {"designation": "15760", "points": [
      {"mjd": 58133.0, "ra_deg": 114.0, "dec_deg": 18.0, "V": 23.0}
    ]},
    {"designation": "2014 UZ224", "points": [
      {"mjd": 58133.0, "ra": 250.0, "dec": -10.0, "mag": 22.0}
    ]}
  ]
}"#;

const CONFIG: &str = r#"
[run]
runid = "18AC99"
qrunid = "Q1"
start = "2018-01-15T00:00:00"
stop = "2018-02-15T00:00:00"

[scheduler]
fill_policy = "fill-to-budget"
"#;

fn planner(config: &RunConfig) -> ReconPlanner {
    ReconPlanner::new(
        config.site().unwrap(),
        ObservingGroupScheduler::new(config.scheduler_config(), InstrumentConfigurations::default()),
        config.minimum_window(),
        config.tokens(),
    )
}

#[tokio::test]
async fn test_plan_writes_program_document() {
    let dir = tempdir().unwrap();
    let candidates = dir.path().join("recon.csv");
    let ephemeris = dir.path().join("ephemeris.json");
    let program = dir.path().join("PH2_18AC99_Q1.json");
    fs::write(&candidates, CANDIDATES).unwrap();
    fs::write(&ephemeris, EPHEMERIS).unwrap();

    let config = RunConfig::from_toml_str(CONFIG).unwrap();
    let table = read_candidate_table(&candidates).unwrap();
    let provider = TableEphemeris::from_file(&ephemeris).unwrap();
    let repo = JsonProgramRepository::open(&program, "18AC99", "recon").await.unwrap();

    let report = planner(&config)
        .run(
            &table,
            &config.selection_criteria().unwrap(),
            config.start_time().unwrap().unwrap(),
            &provider,
            &repo,
        )
        .await
        .unwrap();

    assert!(report.is_success());
    let accepted: Vec<String> = report
        .accepted
        .iter()
        .map(|target| target.designation().to_string())
        .collect();
    assert_eq!(accepted, vec!["2003 UZ413", "15760"]);
    assert_eq!(report.rejected.len(), 1);
    assert!(!matches!(report.rejected[0].rejection, Rejection::NeverRises));
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].raw_designation, "K03U41Z");

    // Both targets fit one group, stored three times.
    assert_eq!(report.schedule.logical_groups, 1);
    let lines = report.console_lines();
    for repeat in 0..3 {
        let prefix = format!("OG OG-18AC99-Q1-1-{} is ", repeat);
        assert!(lines.iter().any(|line| line.starts_with(&prefix)));
    }

    let stored = JsonProgramRepository::open(&program, "18AC99", "recon").await.unwrap();
    let group = stored.get_observing_group("OG-18AC99-Q1-1-2").await.unwrap();
    assert_eq!(
        group.block_tokens(),
        vec!["OB-Q1-18AC99-2003_UZ413", "OB-Q1-18AC99-15760"]
    );
    let document: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&program).unwrap()).unwrap();
    assert_eq!(document["runid"], "18AC99");
    assert_eq!(
        document["program_configuration"]["targets"]
            .as_array()
            .unwrap()
            .len(),
        2
    );
}

#[tokio::test]
async fn test_events_outside_window_are_not_planned() {
    let config = RunConfig::from_toml_str(
        r#"
        [run]
        start = "2018-01-15T00:00:00"
        stop = "2018-01-21T00:00:00"
        "#,
    )
    .unwrap();
    let dir = tempdir().unwrap();
    let candidates = dir.path().join("recon.csv");
    fs::write(&candidates, CANDIDATES).unwrap();
    let table = read_candidate_table(&candidates).unwrap();
    let provider = TableEphemeris::from_json_str(EPHEMERIS).unwrap();
    let repo = LocalRepository::new();

    let report = planner(&config)
        .run(
            &table,
            &config.selection_criteria().unwrap(),
            config.start_time().unwrap().unwrap(),
            &provider,
            &repo,
        )
        .await
        .unwrap();

    // 2014 UZ224 and K03U41Z have events after the 21st; 15760 has none.
    let accepted: Vec<String> = report
        .accepted
        .iter()
        .map(|target| target.designation().to_string())
        .collect();
    assert_eq!(accepted, vec!["2003 UZ413", "15760"]);
    assert!(report.rejected.is_empty());
    assert!(report.skipped.is_empty());

    // Single-target groups by default: two groups, three copies each.
    assert_eq!(report.schedule.logical_groups, 2);
    assert_eq!(repo.list_observing_groups().await.unwrap().len(), 6);
}
