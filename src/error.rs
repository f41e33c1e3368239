use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum OpenErrorKind {
    #[error("Not a recognized disk image format")]
    UnknownFormat,
    #[error("Bad {0} magic")]
    BadMagic(&'static str),
    #[error("Truncated {what}: need {need} bytes, have {have}")]
    Truncated {
        what: &'static str,
        need: usize,
        have: usize
    },
    #[error("{what} checksum failed: calculated {calculated:#010x}, stored {stored:#010x}")]
    BadChecksum {
        what: &'static str,
        calculated: u32,
        stored: u32
    },
    #[error("Unsupported {what}: {value}")]
    Unsupported {
        what: &'static str,
        value: u64
    },
    #[error("Track {number} ends at {end} before its start {start}")]
    BadTrack {
        number: u32,
        start: u64,
        end: u64
    },
    #[error("{0}")]
    Io(#[from] std::io::Error)
}

#[derive(Debug, thiserror::Error)]
#[error(
    "{}{}{source}",
    path.as_deref().unwrap_or(Path::new("")).display(),
    path.as_ref().map(|_| ": ").unwrap_or("")
)]
pub struct OpenError {
    path: Option<PathBuf>,
    #[source]
    pub source: OpenErrorKind
}

impl OpenError {
    pub fn with_path<T: AsRef<Path>>(self, path: T) -> Self {
        Self {
            path: Some(path.as_ref().into()),
            source: self.source
        }
    }
}

impl From<OpenErrorKind> for OpenError {
    fn from(e: OpenErrorKind) -> Self {
        Self {
            path: None,
            source: e
        }
    }
}

impl From<std::io::Error> for OpenError {
    fn from(e: std::io::Error) -> Self {
        OpenErrorKind::Io(e).into()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("Requested sector {0} is beyond end of image {1}")]
    SectorBeyondEnd(u64, u64),
    #[error("Sector {0} is not covered by any track")]
    SectorOutsideTracks(u64),
    #[error("Image has no subchannel data")]
    NoSubchannel,
    #[error("{0}")]
    Io(#[from] std::io::Error)
}
