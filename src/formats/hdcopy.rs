//! HD-Copy images: a tiny header with a track-presence map, then each
//! present track as a length-prefixed, escape-byte RLE block. The format
//! has no magic; identification is by plausibility.

use byteorder::{ByteOrder, LittleEndian};
use tracing::debug;

use crate::error::{OpenError, OpenErrorKind, ReadError};
use crate::formats::OpenOptions;
use crate::image::{slice_sectors, ImageInfo, MediaImage};
use crate::media::MediaType;

const SECTOR_SIZE: u32 = 512;
const MAX_CYLINDER: u8 = 82;

pub fn identify(data: &[u8]) -> bool {
    if data.len() < 2 {
        return false;
    }

    let last_cylinder = data[0];
    let heads = data[1];

    if !(39..=MAX_CYLINDER).contains(&last_cylinder) || !(1..=2).contains(&heads) {
        return false;
    }

    let map_len = 2 * (last_cylinder as usize + 1);
    let Some(map) = data.get(2..2 + map_len) else {
        return false;
    };

    // presence map entries are strictly 0 or 1, and an image of nothing
    // is not an image
    map.iter().all(|b| *b <= 1) && map.contains(&1)
}

/// Expands one track block. The first byte is the escape;
/// `esc, value, count` expands to `value` repeated `count` times.
fn expand_track(block: &[u8]) -> Result<Vec<u8>, OpenError> {
    let mut out = vec![];

    let (escape, mut rest) = block.split_first().ok_or(OpenErrorKind::Truncated {
        what: "HD-Copy track block",
        need: 1,
        have: 0
    })?;

    while let Some((b, tail)) = rest.split_first() {
        if b == escape {
            let [value, count] = *tail.first_chunk().ok_or(OpenErrorKind::Truncated {
                what: "HD-Copy escape sequence",
                need: 2,
                have: tail.len()
            })?;
            out.resize(out.len() + count as usize, value);
            rest = &tail[2..];
        }
        else {
            out.push(*b);
            rest = tail;
        }
    }

    Ok(out)
}

#[derive(Debug)]
pub struct HdCopyImage {
    info: ImageInfo,
    data: Vec<u8>
}

impl HdCopyImage {
    pub fn open(data: &[u8], _options: &OpenOptions) -> Result<Self, OpenError> {
        if !identify(data) {
            return Err(OpenErrorKind::BadMagic("HD-Copy").into());
        }

        let cylinders = data[0] as u16 + 1;
        let heads = data[1];
        let map_len = 2 * cylinders as usize;
        let map = &data[2..2 + map_len];
        let mut rest = &data[2 + map_len..];

        // the first stored track fixes the track length for the whole disk
        let mut track_len = None;
        let mut tracks: Vec<Option<Vec<u8>>> = vec![];

        for (i, present) in map.iter().enumerate() {
            if i % 2 >= heads as usize {
                continue;
            }

            if *present == 0 {
                tracks.push(None);
                continue;
            }

            if rest.len() < 2 {
                return Err(OpenErrorKind::Truncated {
                    what: "HD-Copy track length",
                    need: 2,
                    have: rest.len()
                }
                .into());
            }
            let stored = LittleEndian::read_u16(rest) as usize;
            rest = &rest[2..];

            if rest.len() < stored {
                return Err(OpenErrorKind::Truncated {
                    what: "HD-Copy track block",
                    need: stored,
                    have: rest.len()
                }
                .into());
            }

            let track = expand_track(&rest[..stored])?;
            rest = &rest[stored..];

            match track_len {
                None => track_len = Some(track.len()),
                Some(l) if l != track.len() => {
                    return Err(OpenErrorKind::Truncated {
                        what: "HD-Copy track data",
                        need: l,
                        have: track.len()
                    }
                    .into())
                },
                Some(_) => {}
            }

            tracks.push(Some(track));
        }

        let track_len = track_len.ok_or(OpenErrorKind::Unsupported {
            what: "HD-Copy image with no stored tracks",
            value: 0
        })?;

        if track_len % SECTOR_SIZE as usize != 0 {
            return Err(OpenErrorKind::Unsupported {
                what: "HD-Copy track length",
                value: track_len as u64
            }
            .into());
        }
        let spt = (track_len / SECTOR_SIZE as usize) as u8;

        debug!("HD-Copy: {cylinders}x{heads}x{spt}, {} track slots", tracks.len());

        // absent tracks read back as zero fill
        let mut linear = Vec::with_capacity(tracks.len() * track_len);
        for t in &tracks {
            match t {
                Some(t) => linear.extend_from_slice(t),
                None => linear.resize(linear.len() + track_len, 0)
            }
        }

        let sectors = cylinders as u64 * heads as u64 * spt as u64;

        let info = ImageInfo::new(
            sectors,
            SECTOR_SIZE,
            MediaType::from_geometry(cylinders, heads, spt, SECTOR_SIZE)
        )
        .with_geometry(cylinders, heads, spt);

        Ok(Self { info, data: linear })
    }
}

impl MediaImage for HdCopyImage {
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
