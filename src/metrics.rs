use crate::{
    error::{EvalError, EvalResult},
    matcher::MatchCounts,
};
use serde::{Serialize, Serializer};

/// Overlap thresholds reported when none are configured.
pub const DEFAULT_OVERLAPS: [f64; 3] = [0.1, 0.25, 0.5];

/// Added to every precision, recall and F1 denominator.
const EPSILON: f64 = 1e-5;

/// Background label excluded from the "Acc" framewise accuracy.
const BACKGROUND_LABEL: usize = 0;

/// Final metrics of one evaluation pass, in insertion order.
///
/// Values are percentages. The table is produced in one go by
/// [MetricsAggregator::compute] and is read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsTable {
    entries: Vec<(String, f64)>,
}

impl MetricsTable {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|&(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), *value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One-line summary such as `AccB:75.0, Acc:50.0, F1@0.10:66.7`.
    pub fn to_log_line(&self) -> String {
        self.entries
            .iter()
            .map(|(key, value)| format!("{key}:{value:.1}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromIterator<(String, f64)> for MetricsTable {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl Serialize for MetricsTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

/// Running sums over an evaluation corpus.
///
/// Holds one [MatchCounts] per overlap threshold, framewise hit counts and,
/// when the Edit score is enabled, one edit score per video. Adding videos is
/// a plain sum, so aggregators built over disjoint subsets can be merged in
/// any order.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsAggregator {
    overlaps: Vec<f64>,
    counts: Vec<MatchCounts>,
    frames: FrameTally,
    foreground_frames: FrameTally,
    edit_scores: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct FrameTally {
    correct: usize,
    total: usize,
}

impl FrameTally {
    fn add(&mut self, hit: bool) {
        self.correct += usize::from(hit);
        self.total += 1;
    }

    fn merge(&mut self, other: FrameTally) {
        self.correct += other.correct;
        self.total += other.total;
    }

    fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.correct as f64 / self.total as f64 * 100.0
    }
}

impl MetricsAggregator {
    pub fn new(overlaps: Vec<f64>) -> Self {
        let counts = vec![MatchCounts::default(); overlaps.len()];
        Self {
            overlaps,
            counts,
            frames: FrameTally::default(),
            foreground_frames: FrameTally::default(),
            edit_scores: None,
        }
    }

    /// Also report the mean per-video Edit score.
    pub fn with_edit(mut self) -> Self {
        self.edit_scores = Some(vec![]);
        self
    }

    pub fn overlaps(&self) -> &[f64] {
        &self.overlaps
    }

    pub fn evaluates_edit(&self) -> bool {
        self.edit_scores.is_some()
    }

    pub fn counts(&self) -> &[MatchCounts] {
        &self.counts
    }

    pub fn num_frames(&self) -> usize {
        self.frames.total
    }

    /// Add one video: its aligned frame labels, its counts (one entry per
    /// overlap threshold) and its Edit score.
    ///
    /// `edit` must be present exactly when the Edit score is enabled.
    pub fn add_video(
        &mut self,
        ground_truth: &[usize],
        predictions: &[usize],
        counts: &[MatchCounts],
        edit: Option<f64>,
    ) -> EvalResult<()> {
        if counts.len() != self.overlaps.len() {
            return Err(EvalError::InvalidConfiguration {
                reason: format!(
                    "{} counts for {} overlaps",
                    counts.len(),
                    self.overlaps.len()
                ),
            });
        }
        if edit.is_some() != self.evaluates_edit() {
            return Err(EvalError::InvalidConfiguration {
                reason: format!(
                    "edit score {} but the aggregator {} it",
                    if edit.is_some() { "given" } else { "missing" },
                    if self.evaluates_edit() { "expects" } else { "does not expect" }
                ),
            });
        }

        for (&gt, &pred) in ground_truth.iter().zip(predictions) {
            self.frames.add(gt == pred);
            if gt != BACKGROUND_LABEL {
                self.foreground_frames.add(gt == pred);
            }
        }
        self.counts
            .iter_mut()
            .zip(counts)
            .for_each(|(total, &video)| *total += video);
        if let (Some(scores), Some(score)) = (&mut self.edit_scores, edit) {
            scores.push(score);
        }
        Ok(())
    }

    /// Fold in an aggregator built over another, disjoint set of videos.
    pub fn merge(&mut self, other: MetricsAggregator) -> EvalResult<()> {
        if self.overlaps != other.overlaps {
            return Err(EvalError::InvalidConfiguration {
                reason: format!(
                    "cannot merge aggregators with overlaps {:?} and {:?}",
                    self.overlaps, other.overlaps
                ),
            });
        }
        if self.evaluates_edit() != other.evaluates_edit() {
            return Err(EvalError::InvalidConfiguration {
                reason: "cannot merge aggregators with different edit settings".to_string(),
            });
        }

        self.frames.merge(other.frames);
        self.foreground_frames.merge(other.foreground_frames);
        self.counts
            .iter_mut()
            .zip(other.counts)
            .for_each(|(total, video)| *total += video);
        if let (Some(scores), Some(others)) = (&mut self.edit_scores, other.edit_scores) {
            scores.extend(others);
        }
        Ok(())
    }

    /// Framewise accuracy in percent, as `(AccB, Acc)`.
    ///
    /// `AccB` counts every frame. `Acc` only counts frames whose ground truth
    /// is not background. Either is `0.0` when it has no frames to count.
    pub fn framewise_accuracy(&self) -> (f64, f64) {
        (self.frames.percent(), self.foreground_frames.percent())
    }

    /// Segment F1 in percent at one of the configured overlaps.
    pub fn f1_at(&self, overlap: f64) -> Option<f64> {
        let idx = self.overlaps.iter().position(|&known| known == overlap)?;
        Some(f1_score(&self.counts[idx]))
    }

    /// Mean per-video Edit score in percent, `None` when not enabled.
    pub fn edit_score(&self) -> Option<f64> {
        let scores = self.edit_scores.as_ref()?;
        if scores.is_empty() {
            return Some(0.0);
        }
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    }

    /// Build the final table: `AccB`, `Acc`, `Edit` when enabled, then
    /// `F1@x.xx` per overlap.
    pub fn compute(&self) -> MetricsTable {
        let (acc_with_background, acc) = self.framewise_accuracy();

        let framewise = [
            ("AccB".to_string(), acc_with_background),
            ("Acc".to_string(), acc),
        ];
        let edit = self.edit_score().map(|score| ("Edit".to_string(), score));
        let segmental = self
            .overlaps
            .iter()
            .zip(&self.counts)
            .map(|(overlap, counts)| (format!("F1@{overlap:.2}"), f1_score(counts)));

        framewise.into_iter().chain(edit).chain(segmental).collect()
    }
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_OVERLAPS.to_vec())
    }
}

fn f1_score(counts: &MatchCounts) -> f64 {
    let MatchCounts {
        true_positive: tp,
        false_positive: fp,
        false_negative: fn_,
    } = *counts;

    let precision = tp / (tp + fp + EPSILON);
    let recall = tp / (tp + fn_ + EPSILON);
    let f1 = 2.0 * (precision * recall) / (precision + recall + EPSILON);
    if f1.is_nan() {
        0.0
    } else {
        f1 * 100.0
    }
}
