use crate::{
    error::{EvalError, EvalResult},
    segment::shrink,
};
use log::warn;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

/// Label of the background class, always at index 0.
pub const NIL_LABEL: &str = "NIL";

/// Mapping between ground-truth label names and class indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelDictionary {
    label_to_index: HashMap<String, usize>,
    index_to_label: Vec<String>,
}

impl Default for LabelDictionary {
    fn default() -> Self {
        Self::new()
    }
}

impl LabelDictionary {
    /// A dictionary holding only the background label.
    pub fn new() -> Self {
        let mut dictionary = Self {
            label_to_index: HashMap::new(),
            index_to_label: vec![],
        };
        dictionary.insert(NIL_LABEL);
        dictionary
    }

    /// Build the dictionary from every `.txt` ground-truth file of a
    /// directory.
    ///
    /// Files are read in name order and new labels get the next index in the
    /// order they first appear. Empty lines are ignored.
    pub fn from_dir(groundtruth_dir: impl AsRef<Path>) -> EvalResult<Self> {
        let mut dictionary = Self::new();
        for path in sorted_files(groundtruth_dir.as_ref())? {
            let text = fs::read_to_string(&path)?;
            text.lines()
                .filter(|line| !line.is_empty())
                .for_each(|label| {
                    dictionary.insert(label);
                });
        }
        Ok(dictionary)
    }

    /// Index of `label`, inserting it if unseen.
    pub fn insert(&mut self, label: &str) -> usize {
        if let Some(&index) = self.label_to_index.get(label) {
            return index;
        }
        let index = self.index_to_label.len();
        self.label_to_index.insert(label.to_string(), index);
        self.index_to_label.push(label.to_string());
        index
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.label_to_index.get(label).copied()
    }

    pub fn label_of(&self, index: usize) -> Option<&str> {
        self.index_to_label.get(index).map(String::as_str)
    }

    /// Number of classes, background included.
    pub fn len(&self) -> usize {
        self.index_to_label.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index_to_label.is_empty()
    }
}

/// Video ids of a ground-truth directory: `.txt` file stems in name order.
pub fn video_ids(groundtruth_dir: impl AsRef<Path>) -> EvalResult<Vec<String>> {
    let ids: Vec<String> = sorted_files(groundtruth_dir.as_ref())?
        .iter()
        .filter_map(|path| path.file_stem())
        .map(|stem| stem.to_string_lossy().into_owned())
        .collect();
    Ok(ids)
}

/// Read `<video>.txt`, one label per frame, into class indices.
pub fn load_ground_truth(
    groundtruth_dir: impl AsRef<Path>,
    video: &str,
    dictionary: &LabelDictionary,
) -> EvalResult<Vec<usize>> {
    let path = groundtruth_dir.as_ref().join(format!("{video}.txt"));
    let text = fs::read_to_string(&path)?;
    text.lines()
        .map(|label| {
            dictionary
                .index_of(label)
                .ok_or_else(|| EvalError::UnknownLabel {
                    label: label.to_string(),
                    path: path.clone(),
                })
        })
        .collect()
}

/// Trim ground truth to the number of feature frames actually extracted.
pub fn align_to_features(num_features: usize, mut labels: Vec<usize>) -> Vec<usize> {
    if labels.len() != num_features {
        warn!(
            "{} labels for {num_features} feature frames, keeping {}",
            labels.len(),
            labels.len().min(num_features)
        );
        labels.truncate(num_features);
    }
    labels
}

/// Labels for training (down-sampled by `sample_rate`) and for evaluation
/// (full resolution), as `(train, eval)`.
pub fn train_and_eval_labels(labels: Vec<usize>, sample_rate: usize) -> (Vec<usize>, Vec<usize>) {
    let train = shrink(&labels, sample_rate);
    (train, labels)
}

/// Shuffle video ids with a seeded generator and split them into
/// `(train, test)` at `floor(train_fraction * len)`.
pub fn split_videos(
    mut video_ids: Vec<String>,
    train_fraction: f64,
    seed: u64,
) -> (Vec<String>, Vec<String>) {
    let mut rng = StdRng::seed_from_u64(seed);
    video_ids.shuffle(&mut rng);

    let cut = ((train_fraction * video_ids.len() as f64) as usize).min(video_ids.len());
    let test = video_ids.split_off(cut);
    (video_ids, test)
}

/// The `.txt` files of a directory in name order.
fn sorted_files(dir: &Path) -> EvalResult<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<Result<_, _>>()?;
    files.retain(|path| {
        path.is_file() && path.extension().is_some_and(|extension| extension == "txt")
    });
    files.sort();
    Ok(files)
}
