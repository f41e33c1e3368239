//! DiscJuggler (.CDI) optical images: sector data up front, a session/track
//! descriptor at the end of the file, and the descriptor length in the last
//! four bytes. Tracks are announced by two 10-byte start marks, carry their
//! pregap inside the stored data, and may interleave 96 subchannel bytes
//! after each raw sector.

use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, warn};

use crate::error::{OpenError, OpenErrorKind, ReadError};
use crate::formats::cursor::ByteCursor;
use crate::formats::OpenOptions;
use crate::image::{ImageInfo, MediaImage, OpticalImage, Track};
use crate::media::MediaType;

pub const TRACK_START_MARK: [u8; 10] = [0, 0, 1, 0, 0, 0, 0xff, 0xff, 0xff, 0xff];

pub const SUBCHANNEL_LEN: usize = 96;
const RAW_SECTOR: usize = 2352;
const SYNC_HEADER: usize = 16;

const MODE_AUDIO: u32 = 0;
const MODE1: u32 = 1;
const MODE2: u32 = 2;

fn stored_size(code: u32) -> Option<usize> {
    match code {
        0 => Some(2048),
        1 => Some(2336),
        2 => Some(RAW_SECTOR),
        3 => Some(RAW_SECTOR + SUBCHANNEL_LEN),
        _ => None
    }
}

pub fn identify(data: &[u8]) -> bool {
    if data.len() < 8 {
        return false;
    }

    let desc_len = LittleEndian::read_u32(&data[data.len() - 4..]) as usize;
    if desc_len < 6 || desc_len > data.len() {
        return false;
    }

    let desc = &data[data.len() - desc_len..];
    let sessions = LittleEndian::read_u16(desc);

    // first track mark sits right after the session header and the
    // track's reserved dword
    (1..=16).contains(&sessions)
        && desc.len() >= 8 + TRACK_START_MARK.len()
        && desc[8..8 + TRACK_START_MARK.len()] == TRACK_START_MARK
}

#[derive(Debug)]
pub struct DiscJugglerImage {
    info: ImageInfo,
    tracks: Vec<Track>,
    entries: Vec<(u32, usize, usize)>, // mode, stored size, file offset per track
    sessions: u16,
    has_subchannel: bool,
    data: Vec<u8>
}

impl DiscJugglerImage {
    pub fn open(data: &[u8], _options: &OpenOptions) -> Result<Self, OpenError> {
        if !identify(data) {
            return Err(OpenErrorKind::BadMagic("DiscJuggler").into());
        }

        let desc_len = LittleEndian::read_u32(&data[data.len() - 4..]) as usize;
        let desc = &data[data.len() - desc_len..data.len() - 4];

        let mut c = ByteCursor::new(desc);
        let session_count = c.u16_le("CDI session count")?;

        let mut entries = vec![];
        let mut tracks = vec![];
        let mut file_offset = 0usize;
        let mut number = 1u32;

        for session in 1..=session_count {
            let track_count = c.u16_le("CDI track count")?;

            for _ in 0..track_count {
                c.skip(4, "CDI track header")?;

                for _ in 0..2 {
                    let mark = c.bytes(TRACK_START_MARK.len(), "CDI track mark")?;
                    if mark != TRACK_START_MARK {
                        return Err(OpenErrorKind::BadMagic("CDI track mark").into());
                    }
                }

                let fn_len = c.u8("CDI filename length")? as usize;
                let filename = c.bytes(fn_len, "CDI filename")?;
                debug!(
                    "CDI track {number}: source {}",
                    String::from_utf8_lossy(filename)
                );

                let pregap = c.u32_le("CDI pregap")? as u64;
                let length = c.u32_le("CDI track length")? as u64;
                let mode = c.u32_le("CDI track mode")?;
                let start = c.u32_le("CDI start lba")? as u64;
                let total = c.u32_le("CDI total length")? as u64;
                let size_code = c.u32_le("CDI sector size code")?;
                let flags = c.u8("CDI track flags")?;

                if total != pregap + length {
                    warn!(
                        "CDI track {number}: total {total} != pregap {pregap} + length {length}"
                    );
                }

                let stored = stored_size(size_code).ok_or(OpenErrorKind::Unsupported {
                    what: "CDI sector size code",
                    value: size_code as u64
                })?;

                if !matches!(mode, MODE_AUDIO | MODE1 | MODE2) {
                    return Err(OpenErrorKind::Unsupported {
                        what: "CDI track mode",
                        value: mode as u64
                    }
                    .into());
                }

                if length == 0 {
                    return Err(OpenErrorKind::Unsupported {
                        what: "CDI empty track",
                        value: number as u64
                    }
                    .into());
                }

                let end = start + length - 1;
                tracks.push(Track::new(session, number, start, end, pregap, flags)?);

                // mode, stored sector size, and byte offset of the track's
                // stored data (which includes its pregap sectors)
                entries.push((mode, stored, file_offset));

                file_offset += total as usize * stored;
                number += 1;
            }
        }

        if file_offset > data.len() - desc_len {
            return Err(OpenErrorKind::Truncated {
                what: "CDI sector data",
                need: file_offset + desc_len,
                have: data.len()
            }
            .into());
        }

        let has_subchannel = entries.iter().any(|e| e.1 > RAW_SECTOR);
        let has_mode1 = entries.iter().any(|e| e.0 == MODE1);
        let has_mode2 = entries.iter().any(|e| e.0 == MODE2);

        let media_type = if has_mode2 {
            MediaType::CDROMXA
        }
        else if has_mode1 {
            MediaType::CDROM
        }
        else {
            MediaType::CDR
        };

        let sectors = tracks.iter().map(|t| t.end + 1).max().unwrap_or(0);
        let sector_size = if has_mode1 { 2048 } else if has_mode2 { 2336 } else { RAW_SECTOR as u32 };

        let info = ImageInfo::new(sectors, sector_size, media_type);

        Ok(Self {
            info,
            tracks,
            entries,
            sessions: session_count,
            has_subchannel,
            data: data[..data.len() - desc_len].to_vec()
        })
    }

    fn entry_for(&self, lba: u64) -> Result<(usize, &Track, u32, usize), ReadError> {
        self.tracks
            .iter()
            .position(|t| (t.start..=t.end).contains(&lba))
            .map(|i| {
                let (mode, stored, _) = self.entries[i];
                (i, &self.tracks[i], mode, stored)
            })
            .ok_or(ReadError::SectorOutsideTracks(lba))
    }

    fn raw_frame(&self, lba: u64) -> Result<(&[u8], u32, usize), ReadError> {
        let (i, track, mode, stored) = self.entry_for(lba)?;
        let (_, _, base) = self.entries[i];

        let index = track.pregap + (lba - track.start);
        let beg = base + index as usize * stored;
        let frame = self
            .data
            .get(beg..beg + stored)
            .ok_or(ReadError::SectorBeyondEnd(lba, self.info.sectors))?;

        Ok((frame, mode, stored))
    }
}

impl MediaImage for DiscJugglerImage {
    fn info(&self) -> &ImageInfo {
        &self.info
    }

    /// User data only: 2048 bytes for mode 1, 2336 for mode 2, the whole
    /// 2352-byte frame for audio.
    fn read_sector(&self, lba: u64) -> Result<Vec<u8>, ReadError> {
        let (frame, mode, stored) = self.raw_frame(lba)?;

        let sector = &frame[..stored.min(RAW_SECTOR)];
        let user = match (mode, sector.len()) {
            (MODE1, RAW_SECTOR) => &sector[SYNC_HEADER..SYNC_HEADER + 2048],
            (MODE2, RAW_SECTOR) => &sector[SYNC_HEADER..],
            _ => sector
        };

        Ok(user.to_vec())
    }

    /// The full raw frame, without subchannel.
    fn read_sector_long(&self, lba: u64) -> Result<Vec<u8>, ReadError> {
        let (frame, _, stored) = self.raw_frame(lba)?;
        Ok(frame[..stored.min(RAW_SECTOR)].to_vec())
    }
}

impl OpticalImage for DiscJugglerImage {
    fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    fn sessions(&self) -> u16 {
        self.sessions
    }

    fn has_subchannel(&self) -> bool {
        self.has_subchannel
    }

    fn read_subchannel(&self, lba: u64) -> Result<Vec<u8>, ReadError> {
        let (frame, _, stored) = self.raw_frame(lba)?;
        if stored <= RAW_SECTOR {
            return Err(ReadError::NoSubchannel);
        }
        Ok(frame[RAW_SECTOR..].to_vec())
    }
}
