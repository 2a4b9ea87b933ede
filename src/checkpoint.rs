use crate::{
    config::Config,
    error::{EvalError, EvalResult},
    matcher::{MatchCounts, SegmentMatcher},
    metrics::{MetricsAggregator, MetricsTable, DEFAULT_OVERLAPS},
    report::{PredictionReport, VideoResult},
    segment::decompose,
};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::{BTreeSet, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointState {
    /// Videos can still be recorded.
    Open,
    /// Metrics were computed; recording is rejected.
    Finalized,
}

/// The matched result of one video, ready to be folded into a [Checkpoint].
///
/// Computing it touches no shared state, so it can be produced on any thread.
/// Only [Checkpoint::evaluate] builds one, and it remembers the overlaps and
/// background classes it was matched with.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoEvaluation {
    video: String,
    ground_truth: Vec<usize>,
    predictions: Vec<usize>,
    counts: Vec<MatchCounts>,
    edit: Option<f64>,
    overlaps: Vec<f64>,
    background_classes: BTreeSet<usize>,
}

impl VideoEvaluation {
    pub fn video(&self) -> &str {
        &self.video
    }

    pub fn ground_truth(&self) -> &[usize] {
        &self.ground_truth
    }

    pub fn predictions(&self) -> &[usize] {
        &self.predictions
    }

    /// One entry per overlap threshold, in [VideoEvaluation::overlaps] order.
    pub fn counts(&self) -> &[MatchCounts] {
        &self.counts
    }

    pub fn edit(&self) -> Option<f64> {
        self.edit
    }

    pub fn overlaps(&self) -> &[f64] {
        &self.overlaps
    }

    pub fn background_classes(&self) -> &BTreeSet<usize> {
        &self.background_classes
    }
}

/// This is the per-pass accumulator of an evaluation run.
///
/// A checkpoint is opened at the start of a pass, fed one video at a time and
/// finalized by [Checkpoint::compute_metrics]. It is not reused across passes.
pub struct Checkpoint {
    run_id: i64,
    state: CheckpointState,
    overlaps: Vec<f64>,
    matcher: SegmentMatcher,
    aggregator: MetricsAggregator,
    videos: Vec<VideoEvaluation>,
    recorded: HashSet<String>,
    metrics: Option<MetricsTable>,
}

impl Checkpoint {
    /// Open a checkpoint reporting F1 at the default overlaps.
    ///
    /// Example:
    ///
    /// ```rust
    /// use action_seg_eval::Checkpoint;
    ///
    /// let mut ckpt = Checkpoint::open(-1, [0].into_iter().collect());
    /// ckpt.record("video_01", &[0, 0, 1, 1, 1, 0, 0], &[0, 0, 1, 1, 0, 0, 0])
    ///     .unwrap();
    /// let metrics = ckpt.compute_metrics();
    /// assert_eq!(metrics.get("F1@0.50").map(f64::round), Some(100.0));
    /// ```
    pub fn open(run_id: i64, background_classes: BTreeSet<usize>) -> Self {
        Self::open_with_overlaps(run_id, background_classes, DEFAULT_OVERLAPS.to_vec())
    }

    pub fn open_with_overlaps(
        run_id: i64,
        background_classes: BTreeSet<usize>,
        overlaps: Vec<f64>,
    ) -> Self {
        Self::open_with_options(run_id, background_classes, overlaps, false)
    }

    /// Open a checkpoint that also reports the Edit score when `eval_edit`
    /// is set.
    pub fn open_with_options(
        run_id: i64,
        background_classes: BTreeSet<usize>,
        overlaps: Vec<f64>,
        eval_edit: bool,
    ) -> Self {
        let aggregator = MetricsAggregator::new(overlaps.clone());
        Self {
            run_id,
            state: CheckpointState::Open,
            matcher: SegmentMatcher::new(background_classes),
            aggregator: if eval_edit {
                aggregator.with_edit()
            } else {
                aggregator
            },
            overlaps,
            videos: vec![],
            recorded: HashSet::new(),
            metrics: None,
        }
    }

    pub fn from_config(run_id: i64, config: &Config) -> EvalResult<Self> {
        config.validate()?;
        Ok(Self::open_with_options(
            run_id,
            config.effective_background(),
            config.overlaps.clone(),
            config.eval_edit,
        ))
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    pub fn state(&self) -> CheckpointState {
        self.state
    }

    pub fn overlaps(&self) -> &[f64] {
        &self.overlaps
    }

    pub fn background_classes(&self) -> &BTreeSet<usize> {
        self.matcher.background_classes()
    }

    pub fn evaluates_edit(&self) -> bool {
        self.aggregator.evaluates_edit()
    }

    pub fn aggregator(&self) -> &MetricsAggregator {
        &self.aggregator
    }

    /// Names of the videos recorded so far, in recording order.
    pub fn recorded_videos(&self) -> impl Iterator<Item = &str> {
        self.videos.iter().map(|evaluation| evaluation.video.as_str())
    }

    pub fn contains(&self, video: &str) -> bool {
        self.recorded.contains(video)
    }

    pub fn num_videos(&self) -> usize {
        self.videos.len()
    }

    /// Match one video without recording it.
    ///
    /// Sequences of different lengths are truncated to the shorter one.
    pub fn evaluate(&self, video: &str, ground_truth: &[usize], predictions: &[usize]) -> VideoEvaluation {
        let len = ground_truth.len().min(predictions.len());
        if ground_truth.len() != predictions.len() {
            warn!(
                "video {video}: {} ground-truth frames but {} predicted, truncating to {len}",
                ground_truth.len(),
                predictions.len()
            );
        }
        let ground_truth = &ground_truth[..len];
        let predictions = &predictions[..len];

        let pred_segments = decompose(predictions);
        let gt_segments = decompose(ground_truth);
        let counts = self
            .matcher
            .match_at_overlaps(&pred_segments, &gt_segments, &self.overlaps);
        let edit = self
            .evaluates_edit()
            .then(|| self.matcher.edit_score(&pred_segments, &gt_segments));
        debug!("video {video}: {counts:?}, edit {edit:?}");

        VideoEvaluation {
            video: video.to_string(),
            ground_truth: ground_truth.to_vec(),
            predictions: predictions.to_vec(),
            counts,
            edit,
            overlaps: self.overlaps.clone(),
            background_classes: self.background_classes().clone(),
        }
    }

    /// Record one video of the pass.
    pub fn record(&mut self, video: &str, ground_truth: &[usize], predictions: &[usize]) -> EvalResult<()> {
        self.ensure_recordable(video)?;
        let evaluation = self.evaluate(video, ground_truth, predictions);
        self.record_evaluation(evaluation)
    }

    /// Fold in a video matched elsewhere, e.g. on a worker thread.
    ///
    /// The evaluation must come from a checkpoint with the same overlaps,
    /// background classes and Edit setting.
    pub fn record_evaluation(&mut self, evaluation: VideoEvaluation) -> EvalResult<()> {
        self.ensure_recordable(&evaluation.video)?;
        self.ensure_compatible(&evaluation)?;

        self.aggregator.add_video(
            &evaluation.ground_truth,
            &evaluation.predictions,
            &evaluation.counts,
            evaluation.edit,
        )?;
        self.recorded.insert(evaluation.video.clone());
        self.videos.push(evaluation);
        Ok(())
    }

    /// Record several videos, matching them in parallel.
    ///
    /// The whole batch is rejected before any matching if one of its videos
    /// cannot be recorded. Results are folded in input order.
    pub fn record_batch(&mut self, videos: &[(String, Vec<usize>, Vec<usize>)]) -> EvalResult<()> {
        let mut batch_names = HashSet::new();
        for (video, _, _) in videos {
            self.ensure_recordable(video)?;
            if !batch_names.insert(video.as_str()) {
                return Err(EvalError::DuplicateVideo {
                    video: video.clone(),
                });
            }
        }

        let evaluations: Vec<VideoEvaluation> = videos
            .par_iter()
            .map(|(video, ground_truth, predictions)| self.evaluate(video, ground_truth, predictions))
            .collect();

        evaluations
            .into_iter()
            .try_for_each(|evaluation| self.record_evaluation(evaluation))
    }

    /// Record every video of a persisted report that carries ground truth.
    /// Videos without ground truth are skipped. Returns the number recorded.
    pub fn record_report(&mut self, report: &PredictionReport) -> EvalResult<usize> {
        let videos: Vec<(String, Vec<usize>, Vec<usize>)> = report
            .iter()
            .filter_map(|(video, result)| match &result.groundtruth {
                Some(ground_truth) => Some((
                    video.to_string(),
                    ground_truth.clone(),
                    result.predictions.clone(),
                )),
                None => {
                    warn!("video {video} has no ground truth, skipped");
                    None
                }
            })
            .collect();

        self.record_batch(&videos)?;
        Ok(videos.len())
    }

    /// Compute the metrics table from everything recorded so far.
    ///
    /// Calling it again recomputes the same table from the same sums.
    pub fn compute_metrics(&mut self) -> &MetricsTable {
        self.state = CheckpointState::Finalized;
        let table = self.aggregator.compute();
        info!(
            "run {} over {} videos: {}",
            self.run_id,
            self.videos.len(),
            table.to_log_line()
        );
        self.metrics.insert(table)
    }

    pub fn metrics(&self) -> Option<&MetricsTable> {
        self.metrics.as_ref()
    }

    /// Per-video ground truth and predictions, for persistence.
    pub fn report(&self) -> PredictionReport {
        self.videos
            .iter()
            .map(|evaluation| {
                let result = VideoResult {
                    groundtruth: Some(evaluation.ground_truth.clone()),
                    predictions: evaluation.predictions.clone(),
                };
                (evaluation.video.clone(), result)
            })
            .collect()
    }

    fn ensure_recordable(&self, video: &str) -> EvalResult<()> {
        if self.state == CheckpointState::Finalized {
            return Err(EvalError::CheckpointFinalized {
                run_id: self.run_id,
                video: video.to_string(),
            });
        }
        if self.recorded.contains(video) {
            return Err(EvalError::DuplicateVideo {
                video: video.to_string(),
            });
        }
        Ok(())
    }

    fn ensure_compatible(&self, evaluation: &VideoEvaluation) -> EvalResult<()> {
        let incompatible = |reason: String| EvalError::IncompatibleEvaluation {
            video: evaluation.video.clone(),
            reason,
        };

        if evaluation.overlaps != self.overlaps {
            return Err(incompatible(format!(
                "overlaps {:?}, expected {:?}",
                evaluation.overlaps, self.overlaps
            )));
        }
        if &evaluation.background_classes != self.background_classes() {
            return Err(incompatible(format!(
                "background classes {:?}, expected {:?}",
                evaluation.background_classes,
                self.background_classes()
            )));
        }
        if evaluation.edit.is_some() != self.evaluates_edit() {
            return Err(incompatible("different Edit setting".to_string()));
        }
        Ok(())
    }
}
