use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use distance_survey::app::pipeline::{prepare_table, run_analysis};
use distance_survey::config::SurveyConfig;
use distance_survey::data::{SimulationConfig, simulate, write_simulation};
use distance_survey::domain::KeyFunction;
use distance_survey::io::{write_report_json, write_table_csv};

fn write_simulated(path: &Path, config: &SimulationConfig) {
    let rows = simulate(config).unwrap();
    write_simulation(&rows, File::create(path).unwrap()).unwrap();
}

#[test]
fn analyze_simulated_survey_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("survey.csv");
    let sim = SimulationConfig::default();
    write_simulated(&input, &sim);

    let run = run_analysis(&input, &SurveyConfig::default()).unwrap();

    // Effort is base length × visits on every transect.
    assert_eq!(run.prepared.dataset.transects, sim.transects);
    assert!((run.prepared.dataset.total_effort - 20.0 * 5.0 * 8.0).abs() < 1e-9);

    // Both default keys compared, chosen model first with ΔAIC = 0.
    assert_eq!(run.report.candidates.len() + run.report.skipped.len(), 2);
    assert!(run.report.candidates[0].chosen);
    assert_eq!(run.report.candidates[0].delta_aic, 0.0);

    // True density of clusters: E[n] / (2 σ √(π/2) c L) with P(detect | x) half-normal.
    let expected_n = sim.mean_detections * (sim.transects as f64) * f64::from(sim.visits);
    let true_esw = sim.sigma * (std::f64::consts::PI / 2.0).sqrt();
    let true_density = expected_n / (2.0 * true_esw * 0.001 * 800.0);
    let d = run.estimates.clusters.density;
    assert!(d.value > 0.5 * true_density && d.value < 1.5 * true_density, "D={} true={true_density}", d.value);
    assert!(d.lcl < d.value && d.value < d.ucl);

    // Individuals scale by mean cluster size; abundance by area.
    let ind = run.estimates.individuals;
    assert!(ind.density.value >= d.value);
    assert!((ind.abundance.value - ind.density.value * 10.8).abs() < 1e-9);
}

#[test]
fn exports_table_and_report() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("survey.csv");
    write_simulated(&input, &SimulationConfig::default());

    let run = run_analysis(&input, &SurveyConfig::default()).unwrap();
    let table_path = dir.path().join("table.csv");
    let report_path = dir.path().join("report.json");
    write_table_csv(&table_path, &run.prepared.table).unwrap();
    write_report_json(&report_path, &run.report).unwrap();

    let table = fs::read_to_string(&table_path).unwrap();
    assert!(table.starts_with("distance,Sample.Label,Effort,Region.Label,Area,size,"));
    assert_eq!(table.lines().count(), run.prepared.table.len() + 1);

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(json["dataset"]["region_label"], "GPNP");
    assert!(json["estimates"]["individuals"]["abundance"]["value"].as_f64().unwrap() > 0.0);
    assert_eq!(json["candidates"].as_array().unwrap().len(), run.report.candidates.len());
}

#[test]
fn yaml_config_drives_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("survey.csv");
    write_simulated(
        &input,
        &SimulationConfig {
            visits: 4,
            ..SimulationConfig::default()
        },
    );

    let config_path = dir.path().join("config.yaml");
    let mut f = File::create(&config_path).unwrap();
    writeln!(
        f,
        "design:\n  visits: 4\n  region_label: North\n  area: 25.0\nfitting:\n  keys: [half-normal]\n  max_adjustments: 0"
    )
    .unwrap();

    let config = SurveyConfig::from_yaml(&config_path).unwrap();
    let run = run_analysis(&input, &config).unwrap();

    assert_eq!(run.report.candidates.len(), 1);
    assert_eq!(run.report.chosen.key, KeyFunction::HalfNormal);
    assert!(run.report.chosen.adjustment_orders.is_empty());
    assert_eq!(run.estimates.region_label, "North");
    assert!((run.prepared.dataset.total_effort - 20.0 * 5.0 * 4.0).abs() < 1e-9);
}

#[test]
fn missing_column_is_an_input_error() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("survey.csv");
    fs::write(&input, "transect,angle,size,effort\nT1,10,1,5\n").unwrap();

    let err = prepare_table(&input, &SurveyConfig::default()).unwrap_err();
    assert_eq!(err.exit_code(), 2);
    assert!(err.to_string().contains("distance"));
}

#[test]
fn no_usable_rows_is_a_data_error() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("survey.csv");
    fs::write(&input, "transect,angle,distance,size,effort\nT1,120,10,1,5\nT2,95,20,1,5\n").unwrap();

    let err = prepare_table(&input, &SurveyConfig::default()).unwrap_err();
    assert_eq!(err.exit_code(), 3);
}

#[test]
fn out_of_range_angles_are_reported_not_dropped_silently() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("survey.csv");
    fs::write(
        &input,
        "transect,angle,distance,size,effort\nT1,30,100,1,5\nT1,120,10,1,5\nT2,,,,3\n",
    )
    .unwrap();

    let prepared = prepare_table(&input, &SurveyConfig::default()).unwrap();
    assert_eq!(prepared.dataset.rows_read, 3);
    assert_eq!(prepared.dataset.rows_used, 3);
    assert_eq!(prepared.dataset.detections, 1);
    assert_eq!(prepared.dataset.row_errors.len(), 1);
    assert_eq!(prepared.dataset.row_errors[0].line, 3);

    let mut clamp = SurveyConfig::default();
    clamp.input.angle_policy = distance_survey::domain::AnglePolicy::Clamp;
    let prepared = prepare_table(&input, &clamp).unwrap();
    assert_eq!(prepared.dataset.rows_used, 3);
    assert_eq!(prepared.dataset.detections, 2);
    assert!(prepared.dataset.row_errors.is_empty());
}

#[test]
fn rejected_sighting_keeps_its_transect_effort() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("survey.csv");
    fs::write(&input, "transect,angle,distance,size,effort\nT1,30,100,1,5\nT2,120,10,1,5\n").unwrap();

    let prepared = prepare_table(&input, &SurveyConfig::default()).unwrap();
    assert_eq!(prepared.dataset.row_errors.len(), 1);
    assert_eq!(prepared.dataset.detections, 1);
    assert_eq!(prepared.table.transects().len(), 2);
    assert_eq!(prepared.dataset.transects, 2);
    assert!((prepared.table.total_effort() - 80.0).abs() < 1e-9);
}

#[test]
fn unmapped_column_named_like_a_table_column_is_an_input_error() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("survey.csv");
    fs::write(
        &input,
        "date,transect,replicate,angle,distance,size,effort\n2021-03-01,T1,1,30,100,2,5\n",
    )
    .unwrap();

    let mut config = SurveyConfig::default();
    config.input.columns.date = None;
    let err = prepare_table(&input, &config).unwrap_err();
    assert_eq!(err.exit_code(), 2);
    assert!(err.to_string().contains("`date`"));

    // A leftover `distance` column once radial distance is mapped elsewhere.
    fs::write(&input, "transect,angle,slant,distance,size,effort\nT1,30,100,7,2,5\n").unwrap();
    let mut config = SurveyConfig::default();
    config.input.columns.radial_distance = "slant".to_string();
    let err = prepare_table(&input, &config).unwrap_err();
    assert_eq!(err.exit_code(), 2);
}
