//! ImageDisk (.IMD) images: an ASCII header terminated by 0x1A, then one
//! record per track with per-sector data marks. Sectors may be stored out
//! of order (interleave) or as a single fill byte.

use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::error::{OpenError, OpenErrorKind, ReadError};
use crate::formats::cursor::ByteCursor;
use crate::formats::OpenOptions;
use crate::image::{slice_sectors, ImageInfo, MediaImage};
use crate::media::MediaType;

pub const MAGIC: &[u8] = b"IMD ";
const EOH: u8 = 0x1a;

const HEAD_HAS_CYL_MAP: u8 = 0x80;
const HEAD_HAS_HEAD_MAP: u8 = 0x40;

pub fn identify(data: &[u8]) -> bool {
    data.starts_with(MAGIC) && data.contains(&EOH)
}

#[derive(Debug)]
pub struct ImageDiskImage {
    info: ImageInfo,
    data: Vec<u8>
}

impl ImageDiskImage {
    pub fn open(data: &[u8], _options: &OpenOptions) -> Result<Self, OpenError> {
        let eoh = match data.iter().position(|b| *b == EOH) {
            Some(eoh) if identify(data) => eoh,
            _ => return Err(OpenErrorKind::BadMagic("ImageDisk").into())
        };
        let text = String::from_utf8_lossy(&data[..eoh]);
        let (header_line, comment) = match text.split_once(['\r', '\n']) {
            Some((h, c)) => (h.to_string(), c.trim_matches(['\r', '\n']).to_string()),
            None => (text.into_owned(), String::new())
        };

        let mut r = ByteCursor::at(data, eoh + 1);

        // (cylinder, head) -> sectors sorted by id
        let mut tracks: BTreeMap<(u8, u8), BTreeMap<u8, Vec<u8>>> = BTreeMap::new();
        let mut sector_size = None;

        while !r.at_end() {
            let _mode = r.u8("IMD track mode")?;
            let cylinder = r.u8("IMD cylinder")?;
            let head_byte = r.u8("IMD head")?;
            let head = head_byte & 0x3f;
            let count = r.u8("IMD sector count")?;
            let size_code = r.u8("IMD sector size")?;

            if size_code > 6 {
                return Err(OpenErrorKind::Unsupported {
                    what: "IMD sector size code",
                    value: size_code as u64
                }
                .into());
            }
            let ssize = 128usize << size_code;

            match sector_size {
                None => sector_size = Some(ssize),
                Some(s) if s != ssize => {
                    return Err(OpenErrorKind::Unsupported {
                        what: "IMD mixed sector sizes",
                        value: ssize as u64
                    }
                    .into())
                },
                Some(_) => {}
            }

            let id_map = r.bytes(count as usize, "IMD sector map")?.to_vec();
            if head_byte & HEAD_HAS_CYL_MAP != 0 {
                r.bytes(count as usize, "IMD cylinder map")?;
            }
            if head_byte & HEAD_HAS_HEAD_MAP != 0 {
                r.bytes(count as usize, "IMD head map")?;
            }

            let track = tracks.entry((cylinder, head)).or_default();

            for id in id_map {
                let mark = r.u8("IMD sector mark")?;
                let sector = match mark {
                    // unavailable
                    0 => vec![0; ssize],
                    // stored in full, possibly deleted/errored
                    1 | 3 | 5 | 7 => r.bytes(ssize, "IMD sector data")?.to_vec(),
                    // a single fill byte
                    2 | 4 | 6 | 8 => {
                        let fill = r.u8("IMD fill byte")?;
                        vec![fill; ssize]
                    },
                    _ => {
                        return Err(OpenErrorKind::Unsupported {
                            what: "IMD sector mark",
                            value: mark as u64
                        }
                        .into())
                    }
                };

                if mark >= 5 {
                    warn!("IMD sector {id} on {cylinder}/{head} recorded with errors");
                }

                track.insert(id, sector);
            }
        }

        let sector_size = sector_size.ok_or(OpenErrorKind::Truncated {
            what: "IMD track records",
            need: 5,
            have: 0
        })? as u32;

        let cylinders = tracks.keys().map(|k| k.0 as u16 + 1).max().unwrap_or(0);
        let heads = tracks.keys().map(|k| k.1 + 1).max().unwrap_or(0);

        // nominal sectors per track comes from the merged maps, not the raw
        // record counts: a track split across records holds more ids than
        // either record advertises
        let spt = tracks.values().map(BTreeMap::len).max().unwrap_or(0);
        let spt = u8::try_from(spt).map_err(|_| OpenErrorKind::Unsupported {
            what: "IMD sectors per track",
            value: spt as u64
        })?;

        debug!("{header_line}: {cylinders}x{heads}x{spt}x{sector_size}");

        // linearize ascending by cylinder, head, sector id; tracks the
        // imager skipped come back as zero fill
        let mut linear = vec![];
        for c in 0..cylinders as u8 {
            for h in 0..heads {
                match tracks.get(&(c, h)) {
                    Some(t) => {
                        for s in t.values() {
                            linear.extend_from_slice(s);
                        }
                        // short tracks pad to the nominal length
                        let missing = spt as usize - t.len();
                        linear.resize(linear.len() + missing * sector_size as usize, 0);
                    },
                    None => linear.resize(
                        linear.len() + spt as usize * sector_size as usize,
                        0
                    )
                }
            }
        }

        let sectors = cylinders as u64 * heads as u64 * spt as u64;

        let mut info = ImageInfo::new(
            sectors,
            sector_size,
            MediaType::from_geometry(cylinders, heads, spt, sector_size)
        )
        .with_geometry(cylinders, heads, spt);
        info.application = Some(header_line);
        if !comment.is_empty() {
            info.comment = Some(comment);
        }

        Ok(Self { info, data: linear })
    }
}

impl MediaImage for ImageDiskImage {
    fn info(&self) -> &ImageInfo {
        &self.info
    }

    fn read_sector(&self, lba: u64) -> Result<Vec<u8>, ReadError> {
        self.read_sectors(lba, 1)
    }

    fn read_sectors(&self, lba: u64, count: u32) -> Result<Vec<u8>, ReadError> {
        slice_sectors(
            &self.data,
            self.info.sector_size,
            self.info.sectors,
            lba,
            count
        )
        .map(<[u8]>::to_vec)
    }
}
