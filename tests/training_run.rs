//! End-to-end evaluation over a generated training directory.

use std::fs;
use std::path::Path;

use serde_json::{json, Value};

use flowctl::config::{EvalConfig, RewardEstimator};
use flowctl::evaluation::{EvaluationPipeline, SinusoidalRotation};
use flowctl::report::{write_summary, OutputFormat};
use flowctl::EvalError;

/// A rollout whose policy keeps the Beta mean at `unit` and earns `reward` per step.
fn rollout(steps: usize, unit: f64, reward: f64) -> Value {
    let alpha = unit * 10.0;
    let beta = (1.0 - unit) * 10.0;
    json!({
        "states": vec![vec![0.0; 12]; steps],
        "actions": vec![0.0; steps],
        "rewards": vec![reward; steps],
        "alpha": vec![alpha; steps],
        "beta": vec![beta; steps],
        "t": (0..steps).map(|k| 4.0 + k as f64 * 0.02).collect::<Vec<_>>(),
        "cd": vec![3.2 - reward * 0.1; steps * 4],
        "cl": vec![0.0; steps * 4],
    })
}

fn write_run(dir: &Path, episodes: &[(u32, Vec<Value>)]) {
    for (index, records) in episodes {
        fs::write(
            dir.join(format!("observations_{index}.json")),
            serde_json::to_string(&json!({ "trajectories": records })).unwrap(),
        )
        .unwrap();
        fs::write(dir.join(format!("checkpoint_{index}.pt")), b"opaque").unwrap();
        fs::write(dir.join(format!("policy_trace_{index}.pt")), b"opaque").unwrap();
    }
}

#[test]
fn selects_best_policy_and_resolves_artifacts() {
    let tmp = tempfile::tempdir().unwrap();
    write_run(
        tmp.path(),
        &[
            (0, vec![rollout(10, 0.5, -0.4), rollout(8, 0.5, -0.2)]),
            (1, vec![rollout(10, 0.6, 0.1), rollout(12, 0.6, 0.3)]),
            (2, vec![rollout(10, 0.7, 0.05)]),
        ],
    );

    let pipeline = EvaluationPipeline::new(EvalConfig::default(), tmp.path()).unwrap();
    let (report, selection) = pipeline.evaluate().unwrap();

    assert_eq!(selection.episode, 1);
    assert!((selection.mean_reward - 0.2).abs() < 1e-12);
    assert!(selection.checkpoint.exists);
    assert!(selection.traced_policy.exists);
    assert_eq!(selection.traced_policy.path, tmp.path().join("policy_trace_1.pt"));

    // Beta mean 0.6 on [-5, 5] is an expected action of 1.0 rad/s.
    let best = report.summary_for(1).unwrap();
    assert!((best.mean_action_magnitude - 1.0).abs() < 1e-9);
}

#[test]
fn sum_estimator_can_change_the_winner() {
    let tmp = tempfile::tempdir().unwrap();
    write_run(
        tmp.path(),
        &[
            // Higher per-step reward, short rollouts.
            (0, vec![rollout(2, 0.5, 1.0)]),
            // Lower per-step reward, long rollouts.
            (1, vec![rollout(10, 0.5, 0.5)]),
        ],
    );

    let mean = EvaluationPipeline::new(EvalConfig::default(), tmp.path())
        .unwrap()
        .evaluate()
        .unwrap()
        .1;
    assert_eq!(mean.episode, 0);

    let mut config = EvalConfig::default();
    config.selection.estimator = RewardEstimator::Sum;
    let sum = EvaluationPipeline::new(config, tmp.path())
        .unwrap()
        .evaluate()
        .unwrap()
        .1;
    assert_eq!(sum.episode, 1);
}

#[test]
fn recovers_from_missing_unreadable_and_malformed_inputs() {
    let tmp = tempfile::tempdir().unwrap();
    write_run(
        tmp.path(),
        &[
            (0, vec![rollout(5, 0.5, 0.1)]),
            (2, vec![json!({"states": [[0.0]], "actions": [0.0]})]),
            (4, vec![rollout(5, 0.5, 0.2), json!({"rewards": "oops"})]),
        ],
    );
    fs::write(tmp.path().join("observations_3.json"), "{ truncated").unwrap();

    let pipeline = EvaluationPipeline::new(EvalConfig::default(), tmp.path()).unwrap();
    let (report, selection) = pipeline.evaluate().unwrap();

    assert_eq!(report.expected_episodes, 5);
    assert_eq!(report.missing_files, vec![1]);
    assert_eq!(report.unreadable_files, vec![3]);
    assert_eq!(report.excluded.len(), 1);
    assert_eq!(report.excluded[0].episode, 2);
    assert_eq!(report.malformed_trajectories, 2);
    assert_eq!(selection.episode, 4);
}

#[test]
fn no_usable_data_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("observations_0.json"), "[]").unwrap();

    let pipeline = EvaluationPipeline::new(EvalConfig::default(), tmp.path()).unwrap();
    assert!(matches!(pipeline.evaluate(), Err(EvalError::NoEpisodes)));
}

#[test]
fn series_and_summary_for_selected_episode() {
    let tmp = tempfile::tempdir().unwrap();
    write_run(tmp.path(), &[(0, vec![rollout(4, 0.75, 0.3)])]);

    let pipeline = EvaluationPipeline::new(EvalConfig::default(), tmp.path()).unwrap();
    let (report, selection) = pipeline.evaluate().unwrap();

    let series = pipeline
        .episode_series(selection.episode, Some(&SinusoidalRotation::new(1.0, 2.0, 0.0)))
        .unwrap();
    let metrics = &series.trajectories[0];
    for (t, expected) in metrics.action.time.iter().zip([4.0, 4.02, 4.04, 4.06]) {
        assert!((t - expected).abs() < 1e-12);
    }
    assert!(metrics.action.values.iter().all(|v| (v - 2.5).abs() < 1e-9));
    assert_eq!(metrics.drag.len(), 16);
    // Solver-rate forces span the recorded control window 4.0..4.08.
    assert!((metrics.drag.time[0] - 4.0).abs() < 1e-9);
    assert!((metrics.drag.time[15] - 4.075).abs() < 1e-9);
    assert_eq!(series.reference.as_ref().unwrap().len(), 4);

    let mut out = Vec::new();
    write_summary(&report, Some(&selection), OutputFormat::Markdown, &mut out).unwrap();
    let md = String::from_utf8(out).unwrap();
    assert!(md.contains("| **0** |"));
}
