use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::model::Dataset;
use crate::ops::arrangement::normalize_routes;

/// Error type for reading and writing the dataset file
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("could not read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("could not write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("malformed dataset {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("could not encode dataset: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Read and normalize a dataset: orders sorted by stored arrangement and
/// renumbered from 0, unset counters recounted.
pub fn read_dataset(path: &Path) -> Result<Dataset, DatasetError> {
    let mut dataset = read_dataset_raw(path)?;
    normalize_routes(&mut dataset.routes);
    Ok(dataset)
}

/// Read the dataset exactly as stored, for integrity checks
pub fn read_dataset_raw(path: &Path) -> Result<Dataset, DatasetError> {
    let text = fs::read_to_string(path).map_err(|e| DatasetError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&text).map_err(|e| DatasetError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Write the dataset as pretty JSON, atomically
pub fn write_dataset(path: &Path, dataset: &Dataset) -> Result<(), DatasetError> {
    let mut content = serde_json::to_string_pretty(dataset)?;
    content.push('\n');
    atomic_write(path, content.as_bytes()).map_err(|e| DatasetError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Write via a temp file in the same directory, then rename over the target
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
