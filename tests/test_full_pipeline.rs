//! Integration test: Full pipeline (scale → measure → balance → situation test → measure)

use fairbalance::balance::BalanceAction;
use fairbalance::dataset::Dataset;
use fairbalance::fairness::FairnessConfig;
use fairbalance::pipeline::{FairBalancePipeline, PipelineConfig};
use fairbalance::situation::RemovalPolicy;
use tempfile::NamedTempFile;

const ATTRIBUTES: [&str; 3] = ["derived_ethnicity", "derived_race", "derived_sex"];

/// Eight subgroups (three binary attributes) with uneven class counts
fn create_lending_dataset() -> Dataset {
    let mut rows = Vec::new();
    for g in 0..8usize {
        let attrs = [(g & 1) as f64, ((g >> 1) & 1) as f64, ((g >> 2) & 1) as f64];
        let positives = 8 + 5 * g;
        let negatives = 30 - 3 * g;
        for i in 0..positives {
            let x = ((i * 37 + g * 11) % 100) as f64;
            rows.push((vec![attrs[0], attrs[1], attrs[2], 40.0 + x, 100.0 + 2.0 * x], 1));
        }
        for i in 0..negatives {
            let x = ((i * 53 + g * 7) % 100) as f64;
            rows.push((vec![attrs[0], attrs[1], attrs[2], x * 0.6, 300.0 - x], 0));
        }
    }
    let mut names: Vec<&str> = ATTRIBUTES.to_vec();
    names.extend(["income", "loan_amount"]);
    Dataset::from_numeric(&names, "action_taken", rows).unwrap()
}

fn config() -> PipelineConfig {
    PipelineConfig::default()
        .with_seed(42)
        .with_fairness(
            FairnessConfig::default()
                .with_privileged_value(1.0)
                .with_unprivileged_value(0.0),
        )
}

#[test]
fn test_full_pipeline_remove_policy() {
    let ds = create_lending_dataset();
    let output = FairBalancePipeline::new(config()).run(&ds).unwrap();
    let report = &output.report;

    assert_eq!(report.input_rows, ds.len());
    // counts 8..43 and 9..30 -> median (21 + 23) / 2
    assert_eq!(report.balance.target, 22);
    assert_eq!(report.balance.outcomes.len(), 8);
    assert_eq!(report.balance.skipped().count(), 0);

    for outcome in &report.balance.outcomes {
        match outcome.action {
            BalanceAction::Empty | BalanceAction::Retain => {}
            _ => {
                assert_eq!(outcome.positives_after, 22, "subgroup {}", outcome.key);
                assert_eq!(outcome.negatives_after, 22, "subgroup {}", outcome.key);
            }
        }
    }

    assert_eq!(report.balanced_rows, output.balanced.len());
    assert_eq!(report.situation.tested, output.balanced.len());
    assert_eq!(report.situation.inconsistent, output.flagged.len());
    assert_eq!(report.final_rows, report.balanced_rows - report.situation.inconsistent);
    assert_eq!(output.dataset.len(), report.final_rows);

    for stage in [&report.before, &report.after] {
        assert_eq!(stage.fairness.len(), 3);
        for attribute in ATTRIBUTES {
            let group = stage.for_attribute(attribute).unwrap();
            assert!(group.equal_opportunity_difference.abs() <= 1.0);
            assert!(group.average_odds_difference.abs() <= 1.0);
        }
        let audit = stage.audit.as_ref().unwrap();
        assert!((0.0..=1.0).contains(&audit.inconsistency_rate));
        assert!((0.0..=1.0).contains(&audit.performance.accuracy));
    }
}

#[test]
fn test_full_pipeline_flag_policy_keeps_rows() {
    let ds = create_lending_dataset();
    let config = config()
        .with_removal_policy(RemovalPolicy::Flag)
        .with_measure_inconsistency(false);
    let output = FairBalancePipeline::new(config).run(&ds).unwrap();

    assert_eq!(output.dataset.len(), output.balanced.len());
    assert_eq!(output.report.situation.policy, RemovalPolicy::Flag);
    assert!(output.report.before.audit.is_none());
    assert!(output.report.after.audit.is_none());
}

#[test]
fn test_seeded_pipeline_is_reproducible() {
    let ds = create_lending_dataset();
    let a = FairBalancePipeline::new(config()).run(&ds).unwrap();
    let b = FairBalancePipeline::new(config()).run(&ds).unwrap();
    assert_eq!(a.dataset, b.dataset);
    assert_eq!(a.flagged, b.flagged);
    assert_eq!(a.report.balance, b.report.balance);
}

#[test]
fn test_report_is_written_as_json() {
    let ds = create_lending_dataset();
    let output = FairBalancePipeline::new(config().with_measure_inconsistency(false))
        .run(&ds)
        .unwrap();

    let file = NamedTempFile::with_suffix(".json").unwrap();
    output.report.save(file.path()).unwrap();

    let content = std::fs::read_to_string(file.path()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(json["balance"]["target"], 22);
    assert_eq!(json["before"]["fairness"].as_array().unwrap().len(), 3);
    assert_eq!(json["situation"]["policy"], "Remove");
}

#[test]
fn test_invalid_config_is_rejected() {
    let ds = create_lending_dataset();
    let config = config().with_protected_attributes(vec!["not_a_column".to_string()]);
    assert!(FairBalancePipeline::new(config).run(&ds).is_err());
}
