use crate::error::{EvalError, EvalResult};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Frame labels of one video as persisted after an evaluation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoResult {
    /// Absent for inference-only runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groundtruth: Option<Vec<usize>>,
    pub predictions: Vec<usize>,
}

/// The JSON report of an evaluation run: `video -> {groundtruth, predictions}`.
///
/// Frame order inside every array is kept as recorded. Videos are keyed by
/// name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredictionReport {
    videos: BTreeMap<String, VideoResult>,
}

impl PredictionReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, video: impl Into<String>, result: VideoResult) -> Option<VideoResult> {
        self.videos.insert(video.into(), result)
    }

    pub fn get(&self, video: &str) -> Option<&VideoResult> {
        self.videos.get(video)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &VideoResult)> {
        self.videos.iter().map(|(video, result)| (video.as_str(), result))
    }

    pub fn len(&self) -> usize {
        self.videos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }

    /// Write the report as pretty JSON. An existing file is only replaced
    /// when `overwrite` is set.
    pub fn write_json(&self, path: impl AsRef<Path>, overwrite: bool) -> EvalResult<()> {
        let path = path.as_ref();
        if path.exists() && !overwrite {
            return Err(EvalError::OutputExists {
                path: path.to_path_buf(),
            });
        }

        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_json(path: impl AsRef<Path>) -> EvalResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

impl FromIterator<(String, VideoResult)> for PredictionReport {
    fn from_iter<I: IntoIterator<Item = (String, VideoResult)>>(iter: I) -> Self {
        Self {
            videos: iter.into_iter().collect(),
        }
    }
}
