use crate::segment::Segment;
use itertools::Itertools;
use noisy_float::types::{r64, R64};
use priority_matrix::PriorityMatrix;
use std::cmp::Reverse;

/// Candidate pairs between predicted and ground-truth segments of one video.
///
/// Only pairs with the same action and a positive overlap are stored. Each
/// row is a predicted segment and each column a ground-truth segment.
#[derive(Debug, Clone)]
pub struct IouMatrix {
    matrix: PriorityMatrix<Pred, Gt, Affinity>,
}

impl IouMatrix {
    pub fn build(pred_segments: &[Segment], gt_segments: &[Segment]) -> Self {
        let matrix: PriorityMatrix<Pred, Gt, Affinity> = pred_segments
            .iter()
            .enumerate()
            .cartesian_product(gt_segments.iter().enumerate())
            // Different actions never match
            .filter(|((_, pred), (_, gt))| pred.action == gt.action)
            .filter_map(|((pred_idx, pred), (gt_idx, gt))| {
                let iou = pred.iou_with(gt);
                (iou > 0.0).then(|| {
                    let gt_idx = Gt(gt_idx);
                    let affinity = Affinity {
                        iou: Iou(r64(iou)),
                        rank: Reverse(gt_idx),
                    };
                    (Pred(pred_idx), gt_idx, affinity)
                })
            })
            .collect();

        IouMatrix { matrix }
    }

    /// The best ground-truth candidate of a predicted segment. Among equal
    /// IoUs the lowest ground-truth index wins.
    pub fn max_from_row(&self, row: &Pred) -> Option<Element> {
        let entry = self.matrix.peek_from_row(row)?;
        Some(Element {
            gt: *entry.column,
            iou: entry.weight.iou,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pred(pub usize);

#[derive(Debug, Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub struct Gt(pub usize);

#[derive(Debug, Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub struct Iou(pub R64);

/// Matrix weight. Orders by IoU first, then prefers the earlier ground-truth
/// segment.
#[derive(Debug, Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash)]
struct Affinity {
    iou: Iou,
    rank: Reverse<Gt>,
}

#[derive(Clone, Debug)]
pub struct Element {
    pub gt: Gt,
    pub iou: Iou,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_same_action_overlaps() {
        let pred = [Segment::new(1, 0, 3), Segment::new(2, 4, 6)];
        let gt = [Segment::new(1, 0, 1), Segment::new(2, 2, 3), Segment::new(1, 8, 9)];
        let matrix = IouMatrix::build(&pred, &gt);

        let best = matrix.max_from_row(&Pred(0)).unwrap();
        assert_eq!(best.gt, Gt(0));
        assert_eq!(best.iou, Iou(r64(0.5)));
        assert!(matrix.max_from_row(&Pred(1)).is_none());
    }

    #[test]
    fn picks_highest_iou_in_row() {
        let pred = [Segment::new(1, 2, 7)];
        let gt = [Segment::new(1, 0, 2), Segment::new(1, 3, 8)];
        let matrix = IouMatrix::build(&pred, &gt);

        let best = matrix.max_from_row(&Pred(0)).unwrap();
        assert_eq!(best.gt, Gt(1));
    }

    #[test]
    fn ties_prefer_lowest_ground_truth_index() {
        // Both ground-truth segments reach an IoU of 1/5 with the prediction.
        let pred = [Segment::new(4, 2, 4)];
        let gt = [Segment::new(4, 0, 2), Segment::new(4, 4, 6)];
        let matrix = IouMatrix::build(&pred, &gt);

        let best = matrix.max_from_row(&Pred(0)).unwrap();
        assert_eq!(best.gt, Gt(0));
    }

    #[test]
    fn empty_inputs_build_empty_matrix() {
        let no_gt = IouMatrix::build(&[Segment::new(1, 0, 3)], &[]);
        assert!(no_gt.max_from_row(&Pred(0)).is_none());

        let no_pred = IouMatrix::build(&[], &[Segment::new(1, 0, 3)]);
        assert!(no_pred.max_from_row(&Pred(0)).is_none());
    }
}
