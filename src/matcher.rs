use crate::{
    iou_matrix::{Element, IouMatrix, Pred},
    segment::{edit_distance, transcript, Segment},
};
use std::{
    collections::BTreeSet,
    iter::Sum,
    ops::{Add, AddAssign},
};

/// Segment-level detection counts of one video at one overlap threshold.
///
/// Counts are kept as `f64` so that corpus sums feed straight into the
/// precision/recall arithmetic.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MatchCounts {
    pub true_positive: f64,
    pub false_positive: f64,
    pub false_negative: f64,
}

impl Add for MatchCounts {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            true_positive: self.true_positive + other.true_positive,
            false_positive: self.false_positive + other.false_positive,
            false_negative: self.false_negative + other.false_negative,
        }
    }
}

impl AddAssign for MatchCounts {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl Sum for MatchCounts {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

/// Greedy one-to-one matcher between predicted and ground-truth segments.
///
/// Predictions are visited in temporal order. Each one looks up its best
/// same-action ground-truth segment and counts as a true positive only if that
/// segment reaches the overlap threshold and is still unclaimed. A claimed best
/// candidate is never replaced by a runner-up.
#[derive(Debug, Clone, Default)]
pub struct SegmentMatcher {
    background_classes: BTreeSet<usize>,
}

impl SegmentMatcher {
    pub fn new(background_classes: BTreeSet<usize>) -> Self {
        Self { background_classes }
    }

    pub fn background_classes(&self) -> &BTreeSet<usize> {
        &self.background_classes
    }

    /// Match one video at a single overlap threshold.
    pub fn match_segments(
        &self,
        pred_segments: &[Segment],
        gt_segments: &[Segment],
        overlap: f64,
    ) -> MatchCounts {
        self.match_at_overlaps(pred_segments, gt_segments, &[overlap])[0]
    }

    /// Match one video at every threshold in `overlaps`, returning counts in
    /// the same order.
    pub fn match_at_overlaps(
        &self,
        pred_segments: &[Segment],
        gt_segments: &[Segment],
        overlaps: &[f64],
    ) -> Vec<MatchCounts> {
        let pred = self.foreground(pred_segments);
        let gt = self.foreground(gt_segments);

        // The best candidate of each prediction does not depend on the threshold
        let iou_matrix = IouMatrix::build(&pred, &gt);
        let best_candidates: Vec<Option<Element>> = (0..pred.len())
            .map(|pred_idx| iou_matrix.max_from_row(&Pred(pred_idx)))
            .collect();

        overlaps
            .iter()
            .map(|&overlap| greedy_assign(&best_candidates, gt.len(), overlap))
            .collect()
    }

    /// Edit score in percent between the foreground transcripts of one video:
    /// `(1 - distance / longest transcript) * 100`. Two empty transcripts
    /// score 100.
    pub fn edit_score(&self, pred_segments: &[Segment], gt_segments: &[Segment]) -> f64 {
        let pred = transcript(&self.foreground(pred_segments));
        let gt = transcript(&self.foreground(gt_segments));

        let longest = pred.len().max(gt.len());
        if longest == 0 {
            return 100.0;
        }
        (1.0 - edit_distance(&pred, &gt) as f64 / longest as f64) * 100.0
    }

    fn foreground(&self, segments: &[Segment]) -> Vec<Segment> {
        segments
            .iter()
            .filter(|segment| !self.background_classes.contains(&segment.action))
            .copied()
            .collect()
    }
}

/// Match one video at one overlap threshold.
pub fn match_segments(
    pred_segments: &[Segment],
    gt_segments: &[Segment],
    overlap: f64,
    background_classes: &BTreeSet<usize>,
) -> MatchCounts {
    SegmentMatcher::new(background_classes.clone()).match_segments(
        pred_segments,
        gt_segments,
        overlap,
    )
}

fn greedy_assign(best_candidates: &[Option<Element>], num_gt: usize, overlap: f64) -> MatchCounts {
    let mut claimed = vec![false; num_gt];
    let mut counts = MatchCounts::default();

    for candidate in best_candidates {
        match candidate {
            Some(Element { gt, iou, .. }) if iou.0.raw() >= overlap && !claimed[gt.0] => {
                claimed[gt.0] = true;
                counts.true_positive += 1.0;
            }
            _ => counts.false_positive += 1.0,
        }
    }

    counts.false_negative = claimed.iter().filter(|&&hit| !hit).count() as f64;
    counts
}
