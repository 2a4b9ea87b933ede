use itertools::Itertools;
use std::iter;

/// A maximal run of one action label. Both `start` and `end` are inclusive
/// frame indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Segment {
    pub action: usize,
    pub start: usize,
    pub end: usize,
}

impl Segment {
    pub fn new(action: usize, start: usize, end: usize) -> Self {
        Self { action, start, end }
    }

    /// Number of frames covered by the segment.
    pub fn len(&self) -> usize {
        (self.end + 1).saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Temporal intersection-over-union of two frame ranges.
    ///
    /// Disjoint segments yield `0.0`. A zero-width union, only reachable with
    /// a degenerate segment whose `end` precedes its `start`, also yields
    /// `0.0`.
    pub fn iou_with(&self, other: &Segment) -> f64 {
        let intersection = (self.end.min(other.end) + 1).saturating_sub(self.start.max(other.start));
        let union = (self.end.max(other.end) + 1).saturating_sub(self.start.min(other.start));
        if union == 0 {
            return 0.0;
        }
        intersection as f64 / union as f64
    }
}

/// Split a frame label sequence into its ordered segments.
///
/// ```rust
/// use action_seg_eval::segment::{decompose, Segment};
///
/// let segments = decompose(&[0, 0, 1, 1, 1, 0, 0]);
/// assert_eq!(
///     segments,
///     vec![Segment::new(0, 0, 1), Segment::new(1, 2, 4), Segment::new(0, 5, 6)]
/// );
/// ```
pub fn decompose(sequence: &[usize]) -> Vec<Segment> {
    sequence
        .iter()
        .dedup_with_count()
        .scan(0, |start, (count, &action)| {
            let segment = Segment::new(action, *start, *start + count - 1);
            *start += count;
            Some(segment)
        })
        .collect()
}

/// Rebuild the frame label sequence from its segments.
pub fn compose(segments: &[Segment]) -> Vec<usize> {
    segments
        .iter()
        .flat_map(|segment| iter::repeat(segment.action).take(segment.len()))
        .collect()
}

/// The ordered action labels of a segment list.
pub fn transcript(segments: &[Segment]) -> Vec<usize> {
    segments.iter().map(|segment| segment.action).collect()
}

/// Levenshtein distance between two label sequences, with unit cost for
/// insertion, deletion and substitution.
pub fn edit_distance(a: &[usize], b: &[usize]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, &left) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, &right) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(left != right);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

/// Down-sample a label sequence by majority vote over windows of `stride`
/// frames. The trailing window may be shorter.
///
/// Ties go to the label seen first inside the window.
pub fn shrink(sequence: &[usize], stride: usize) -> Vec<usize> {
    if stride <= 1 {
        return sequence.to_vec();
    }
    sequence.chunks(stride).map(majority_label).collect()
}

/// Up-sample a label sequence to `target_len` frames by nearest-neighbour
/// lookup.
pub fn expand(sequence: &[usize], target_len: usize) -> Vec<usize> {
    if sequence.is_empty() {
        return vec![];
    }
    if sequence.len() == target_len {
        return sequence.to_vec();
    }
    (0..target_len)
        .map(|idx| sequence[idx * sequence.len() / target_len])
        .collect()
}

fn majority_label(window: &[usize]) -> usize {
    // Counts in first-seen order
    let mut counts: Vec<(usize, usize)> = vec![];
    for &label in window {
        match counts.iter_mut().find(|(seen, _)| *seen == label) {
            Some((_, count)) => *count += 1,
            None => counts.push((label, 1)),
        }
    }

    let (label, _) = counts
        .into_iter()
        .fold((window[0], 0), |best, candidate| {
            if candidate.1 > best.1 {
                candidate
            } else {
                best
            }
        });
    label
}
