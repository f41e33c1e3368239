//! Golden-suite files: one TOML per image format, each a list of expected
//! rows plus the folder its test files live in.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::expected::{BlockImageExpected, OpticalImageExpected};

#[derive(Debug, thiserror::Error)]
pub enum SuiteError {
    #[error("Error reading {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("Error parsing {0}: {1}")]
    Parse(PathBuf, #[source] Box<toml::de::Error>),
    #[error("Bad golden row: {0}")]
    BadRow(String)
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FixtureSuite {
    /// Folder the suite's test files live in, relative to the suite file
    /// unless overridden on the command line.
    pub data_folder: String,

    #[serde(default, rename = "test", skip_serializing_if = "Vec::is_empty")]
    pub block: Vec<BlockImageExpected>,

    #[serde(default, rename = "optical_test", skip_serializing_if = "Vec::is_empty")]
    pub optical: Vec<OpticalImageExpected>
}

impl FixtureSuite {
    pub fn parse(text: &str) -> Result<Self, Box<toml::de::Error>> {
        toml::from_str(text).map_err(Box::new)
    }

    pub fn load<T: AsRef<Path>>(path: T) -> Result<Self, SuiteError> {
        let path = path.as_ref();

        let text = std::fs::read_to_string(path)
            .map_err(|e| SuiteError::Io(path.into(), e))?;

        let suite = Self::parse(&text).map_err(|e| SuiteError::Parse(path.into(), e))?;
        suite.validate()?;
        Ok(suite)
    }

    pub fn validate(&self) -> Result<(), SuiteError> {
        for row in &self.block {
            row.validate().map_err(SuiteError::BadRow)?;
        }
        for row in &self.optical {
            row.validate().map_err(SuiteError::BadRow)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.block.is_empty() && self.optical.is_empty()
    }
}

/// Finds the on-disk file for a golden row's `test_file`. The upstream
/// corpora ship rows named after their compressed archives, so a trailing
/// `.lz` or `.gz` is dropped when only the unpacked file exists.
pub fn resolve_test_file(data_folder: &Path, test_file: &str) -> PathBuf {
    let direct = data_folder.join(test_file);
    if direct.exists() {
        return direct;
    }

    for ext in [".lz", ".gz"] {
        if let Some(stem) = test_file.strip_suffix(ext) {
            let unpacked = data_folder.join(stem);
            if unpacked.exists() {
                return unpacked;
            }
        }
    }

    direct
}
