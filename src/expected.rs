//! Expected-metadata records: the golden rows a decoded image is checked
//! against. These mirror the layout of the upstream fixture tables and are
//! never mutated after load.

use serde::{Deserialize, Serialize};

use crate::media::MediaType;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionVolume {
    pub start: u64,
    pub length: u64
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystemExpected {
    pub clusters: u64,
    pub cluster_size: u32,
    #[serde(rename = "type")]
    pub fs_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_serial: Option<String>,
    #[serde(default)]
    pub bootable: bool
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackExpected {
    pub session: u16,
    pub start: u64,
    pub end: u64,
    pub pregap: u64,
    pub flags: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesystems: Option<Vec<FileSystemExpected>>
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockImageExpected {
    pub test_file: String,
    pub media_type: MediaType,
    pub sectors: u64,
    pub sector_size: u32,
    pub md5: String,
    /// Absent means "don't check", not "expect none": a few upstream rows
    /// omit the table because the partition scanner used to throw on them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partitions: Option<Vec<PartitionVolume>>
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpticalImageExpected {
    pub test_file: String,
    pub media_type: MediaType,
    pub sectors: u64,
    pub md5: String,
    pub long_md5: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subchannel_md5: Option<String>,
    pub tracks: Vec<TrackExpected>
}

fn md5_ok(s: &str) -> bool {
    s.len() == 32 && s.bytes().all(|b| b.is_ascii_hexdigit())
        && s.bytes().all(|b| !b.is_ascii_uppercase())
}

impl BlockImageExpected {
    /// Internal self-consistency of a golden row, checked at suite load.
    pub fn validate(&self) -> Result<(), String> {
        if !md5_ok(&self.md5) {
            return Err(format!("{}: md5 is not 32 hex digits", self.test_file));
        }
        if self.sectors == 0 || self.sector_size == 0 {
            return Err(format!("{}: empty geometry", self.test_file));
        }
        for p in self.partitions.iter().flatten() {
            if p.start + p.length > self.sectors {
                return Err(format!(
                    "{}: partition {}+{} exceeds {} sectors",
                    self.test_file, p.start, p.length, self.sectors
                ));
            }
        }
        Ok(())
    }
}

impl OpticalImageExpected {
    pub fn validate(&self) -> Result<(), String> {
        for m in [&self.md5, &self.long_md5]
            .into_iter()
            .chain(self.subchannel_md5.iter())
        {
            if !md5_ok(m) {
                return Err(format!("{}: md5 is not 32 hex digits", self.test_file));
            }
        }
        if self.tracks.is_empty() {
            return Err(format!("{}: no tracks", self.test_file));
        }
        for t in &self.tracks {
            if t.end < t.start {
                return Err(format!(
                    "{}: track ends at {} before start {}",
                    self.test_file, t.end, t.start
                ));
            }
        }
        Ok(())
    }
}
