use crate::{
    error::{EvalError, EvalResult},
    metrics::MetricsTable,
};
use std::{
    fs::{File, OpenOptions},
    io::{ErrorKind, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

const EPOCH_COLUMN: &str = "epoch_nb";

/// Tabular log with one row per evaluation event.
///
/// Columns are `epoch_nb` followed by `<prefix>/<metric>` for every metric of
/// the first row. The header is written together with that row and every
/// later row must produce the same columns.
pub struct MetricsLog {
    path: PathBuf,
    header: Option<Vec<String>>,
    writer: csv::Writer<File>,
}

impl MetricsLog {
    /// Start a new log. Fails if the file already exists.
    pub fn create(path: impl AsRef<Path>) -> EvalResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|err| match err.kind() {
                ErrorKind::AlreadyExists => EvalError::OutputExists {
                    path: path.to_path_buf(),
                },
                _ => err.into(),
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            header: None,
            writer: csv::Writer::from_writer(file),
        })
    }

    /// Continue an existing log, or start one if there is none.
    ///
    /// A final line without a line terminator is terminated before the first
    /// new row.
    pub fn open(path: impl AsRef<Path>) -> EvalResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Self::create(path);
        }

        let mut reader = csv::Reader::from_path(path)?;
        let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut file = OpenOptions::new().read(true).append(true).open(path)?;
        if file.metadata()?.len() > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1))?;
            file.read_exact(&mut last)?;
            if last[0] != b'\n' {
                file.write_all(b"\n")?;
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            header: (!header.is_empty()).then_some(header),
            writer: csv::Writer::from_writer(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> Option<&[String]> {
        self.header.as_deref()
    }

    /// Append one row and flush it to disk.
    pub fn append(&mut self, epoch: i64, prefix: &str, metrics: &MetricsTable) -> EvalResult<()> {
        let columns: Vec<String> = std::iter::once(EPOCH_COLUMN.to_string())
            .chain(metrics.keys().map(|key| format!("{prefix}/{key}")))
            .collect();

        if let Some(header) = &self.header {
            if *header != columns {
                return Err(EvalError::HeaderMismatch {
                    expected: header.clone(),
                    actual: columns,
                });
            }
        } else {
            self.writer.write_record(&columns)?;
            self.header = Some(columns);
        }

        let row: Vec<String> = std::iter::once(epoch.to_string())
            .chain(metrics.iter().map(|(_, value)| format!("{value:?}")))
            .collect();
        self.writer.write_record(&row)?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn table(values: &[(&str, f64)]) -> MetricsTable {
        values
            .iter()
            .map(|&(key, value)| (key.to_string(), value))
            .collect()
    }

    #[test]
    fn writes_header_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test_metrics.csv");

        let mut log = MetricsLog::create(&path).unwrap();
        log.append(9, "test-metric", &table(&[("AccB", 75.0), ("F1@0.10", 50.5)]))
            .unwrap();
        log.append(19, "test-metric", &table(&[("AccB", 80.0), ("F1@0.10", 60.0)]))
            .unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let header: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(
            header,
            vec!["epoch_nb", "test-metric/AccB", "test-metric/F1@0.10"]
        );
        let rows: Vec<Vec<String>> = reader
            .records()
            .map(|record| record.unwrap().iter().map(String::from).collect())
            .collect();
        assert_eq!(rows, vec![vec!["9", "75.0", "50.5"], vec!["19", "80.0", "60.0"]]);
    }

    #[test]
    fn rejects_existing_file_on_create() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("train_metrics.csv");
        std::fs::write(&path, "").unwrap();

        assert!(matches!(
            MetricsLog::create(&path),
            Err(EvalError::OutputExists { .. })
        ));
    }

    #[test]
    fn rejects_rows_with_a_different_shape() {
        let dir = tempdir().unwrap();
        let mut log = MetricsLog::create(dir.path().join("m.csv")).unwrap();
        log.append(0, "train-metric", &table(&[("AccB", 1.0)])).unwrap();

        match log.append(1, "train-metric", &table(&[("AccB", 1.0), ("Acc", 2.0)])) {
            Err(EvalError::HeaderMismatch { expected, actual }) => {
                assert_eq!(expected.len(), 2);
                assert_eq!(actual.len(), 3);
            }
            other => panic!("Expected HeaderMismatch, got {other:?}"),
        }
    }

    #[test]
    fn reopened_log_without_final_newline_gets_a_new_row() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.csv");
        std::fs::write(&path, "epoch_nb,test-metric/Acc\n0,10.0").unwrap();

        let mut log = MetricsLog::open(&path).unwrap();
        log.append(1, "test-metric", &table(&[("Acc", 20.0)])).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<Vec<String>> = reader
            .records()
            .map(|record| record.unwrap().iter().map(String::from).collect())
            .collect();
        assert_eq!(rows, vec![vec!["0", "10.0"], vec!["1", "20.0"]]);
    }

    #[test]
    fn reopened_log_keeps_its_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.csv");
        {
            let mut log = MetricsLog::create(&path).unwrap();
            log.append(0, "test-metric", &table(&[("Acc", 10.0)])).unwrap();
        }

        let mut log = MetricsLog::open(&path).unwrap();
        assert_eq!(
            log.header(),
            Some(&["epoch_nb".to_string(), "test-metric/Acc".to_string()][..])
        );
        log.append(1, "test-metric", &table(&[("Acc", 20.0)])).unwrap();
        assert!(log.append(2, "train-metric", &table(&[("Acc", 20.0)])).is_err());

        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(reader.records().count(), 2);
    }
}
