use action_seg_eval::{
    config::Config,
    dataset::{align_to_features, load_ground_truth, video_ids, LabelDictionary},
    metrics::MetricsAggregator,
    metrics_log::MetricsLog,
    report::PredictionReport,
    segment::{decompose, expand, shrink},
    Checkpoint, CheckpointState, EvalError,
};
use std::fs;
use tempfile::tempdir;

fn write_groundtruth(dir: &std::path::Path) {
    fs::write(
        dir.join("video_a.txt"),
        "NIL\nNIL\npour\npour\npour\nNIL\nNIL\n",
    )
    .unwrap();
    fs::write(dir.join("video_b.txt"), "NIL\ncut\ncut\nNIL\n").unwrap();
    fs::write(dir.join("README.md"), "one label per frame\n").unwrap();
}

#[test]
fn dataset_to_metrics_log() {
    let root = tempdir().unwrap();
    let groundtruth_dir = root.path().join("groundTruth");
    fs::create_dir(&groundtruth_dir).unwrap();
    write_groundtruth(&groundtruth_dir);

    let dictionary = LabelDictionary::from_dir(&groundtruth_dir).unwrap();
    assert_eq!(dictionary.index_of("pour"), Some(1));
    assert_eq!(dictionary.index_of("cut"), Some(2));
    assert_eq!(dictionary.len(), 3);

    let config = Config {
        eval_background: false,
        ..Config::default()
    };
    let mut checkpoint = Checkpoint::from_config(4, &config).unwrap();

    // video_a is predicted at half rate and upsampled back.
    let predictions = [
        ("video_a", expand(&[0, 1, 1, 0], 7)),
        ("video_b", vec![0, 2, 0, 0]),
    ];
    for ((video, predicted), id) in predictions.iter().zip(video_ids(&groundtruth_dir).unwrap()) {
        assert_eq!(*video, id);
        let labels = load_ground_truth(&groundtruth_dir, video, &dictionary).unwrap();
        let labels = align_to_features(predicted.len(), labels);
        checkpoint.record(video, &labels, predicted).unwrap();
    }

    let metrics = checkpoint.compute_metrics().clone();
    assert_eq!(checkpoint.state(), CheckpointState::Finalized);
    assert_eq!(
        metrics.keys().collect::<Vec<_>>(),
        vec!["AccB", "Acc", "F1@0.10", "F1@0.25", "F1@0.50"]
    );
    for (_, value) in metrics.iter() {
        assert!((0.0..=100.0).contains(&value));
    }

    let report_path = root.path().join("test.json");
    checkpoint.report().write_json(&report_path, false).unwrap();

    let restored = PredictionReport::read_json(&report_path).unwrap();
    let mut rescored = Checkpoint::from_config(4, &config).unwrap();
    assert_eq!(rescored.record_report(&restored).unwrap(), 2);
    assert_eq!(rescored.compute_metrics(), &metrics);

    let log_path = root.path().join("test_metrics.csv");
    let mut log = MetricsLog::create(&log_path).unwrap();
    log.append(4, "test-metric", &metrics).unwrap();
    drop(log);

    let mut reader = csv::Reader::from_path(&log_path).unwrap();
    assert_eq!(reader.headers().unwrap().len(), 6);
    assert_eq!(reader.records().count(), 1);
}

#[test]
fn accuracy_with_and_without_background_frames() {
    let mut checkpoint = Checkpoint::open(0, [0].into_iter().collect());
    checkpoint.record("v", &[0, 1, 1, 0], &[0, 1, 0, 0]).unwrap();

    let metrics = checkpoint.compute_metrics();
    assert!((metrics.get("AccB").unwrap() - 75.0).abs() < 1e-9);
    assert!((metrics.get("Acc").unwrap() - 50.0).abs() < 1e-9);
}

#[test]
fn split_aggregation_merges_into_whole() {
    let videos = vec![
        ("a".to_string(), vec![0, 1, 1, 2, 2, 0], vec![0, 1, 2, 2, 2, 0]),
        ("b".to_string(), vec![3, 3, 3, 3], vec![3, 3, 0, 3]),
        ("c".to_string(), vec![0, 0, 4, 4], vec![4, 4, 4, 4]),
    ];
    let background = [0].into_iter().collect::<std::collections::BTreeSet<_>>();

    let mut whole = Checkpoint::open(0, background.clone());
    whole.record_batch(&videos).unwrap();

    let mut first = Checkpoint::open(0, background.clone());
    first.record_batch(&videos[..1]).unwrap();
    let mut second = Checkpoint::open(0, background);
    second.record_batch(&videos[1..]).unwrap();

    let mut merged: MetricsAggregator = first.aggregator().clone();
    merged.merge(second.aggregator().clone()).unwrap();
    assert_eq!(merged.compute(), whole.aggregator().compute());
}

#[test]
fn finalized_checkpoint_rejects_new_videos() {
    let mut checkpoint = Checkpoint::open(2, Default::default());
    checkpoint.record("v", &[1, 1], &[1, 1]).unwrap();
    checkpoint.compute_metrics();

    let report: PredictionReport = checkpoint.report();
    let mut other = report.clone();
    other.insert(
        "w",
        action_seg_eval::report::VideoResult {
            groundtruth: Some(vec![1]),
            predictions: vec![1],
        },
    );
    assert!(matches!(
        checkpoint.record_report(&other),
        Err(EvalError::CheckpointFinalized { run_id: 2, .. })
    ));
}

#[test]
fn down_sampled_labels_keep_their_segments() {
    let labels = vec![0, 0, 0, 0, 5, 5, 5, 5, 2, 2];
    let short = shrink(&labels, 2);
    assert_eq!(short, vec![0, 0, 5, 5, 2]);
    assert_eq!(decompose(&short).len(), decompose(&labels).len());
    assert_eq!(expand(&short, labels.len()), labels);
}
