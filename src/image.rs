use crate::error::{OpenError, OpenErrorKind, ReadError};
use crate::media::MediaType;

/// Decoded image geometry and metadata, as reported by a format decoder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageInfo {
    pub sectors: u64,
    pub sector_size: u32,
    pub media_type: MediaType,

    pub cylinders: Option<u16>,
    pub heads: Option<u8>,
    pub sectors_per_track: Option<u8>,

    /// True when sectors carry out-of-band data (e.g. DiskCopy 4.2 tags)
    /// reachable through `read_sector_long`.
    pub has_tags: bool,

    pub application: Option<String>,
    pub comment: Option<String>
}

impl ImageInfo {
    pub fn new(sectors: u64, sector_size: u32, media_type: MediaType) -> Self {
        Self {
            sectors,
            sector_size,
            media_type,
            cylinders: None,
            heads: None,
            sectors_per_track: None,
            has_tags: false,
            application: None,
            comment: None
        }
    }

    pub fn with_geometry(
        mut self,
        cylinders: u16,
        heads: u8,
        sectors_per_track: u8
    ) -> Self
    {
        self.cylinders = Some(cylinders);
        self.heads = Some(heads);
        self.sectors_per_track = Some(sectors_per_track);
        self
    }
}

pub trait MediaImage {
    fn info(&self) -> &ImageInfo;

    fn read_sector(&self, lba: u64) -> Result<Vec<u8>, ReadError>;

    fn read_sectors(&self, lba: u64, count: u32) -> Result<Vec<u8>, ReadError> {
        let mut out = vec![];
        for s in lba..lba + count as u64 {
            out.extend(self.read_sector(s)?);
        }
        Ok(out)
    }

    /// Sector plus any out-of-band data. Formats without tags or raw
    /// sector framing return the plain sector.
    fn read_sector_long(&self, lba: u64) -> Result<Vec<u8>, ReadError> {
        self.read_sector(lba)
    }
}

/// One optical track as decoded from the image descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Track {
    pub session: u16,
    pub number: u32,
    pub start: u64,
    pub end: u64,
    pub pregap: u64,
    /// Subchannel Q control nibble (audio/data, copy-permitted, ...).
    pub flags: u8
}

impl Track {
    pub fn new(
        session: u16,
        number: u32,
        start: u64,
        end: u64,
        pregap: u64,
        flags: u8
    ) -> Result<Self, OpenError>
    {
        if end < start {
            return Err(OpenErrorKind::BadTrack { number, start, end }.into());
        }
        Ok(Self {
            session,
            number,
            start,
            end,
            pregap,
            flags
        })
    }

    pub fn sectors(&self) -> u64 {
        self.end - self.start + 1
    }
}

pub trait OpticalImage: MediaImage {
    fn tracks(&self) -> &[Track];

    fn sessions(&self) -> u16;

    fn has_subchannel(&self) -> bool;

    /// The 96 subchannel bytes trailing sector `lba`, for images that
    /// interleave them. `ReadError::NoSubchannel` otherwise.
    fn read_subchannel(&self, lba: u64) -> Result<Vec<u8>, ReadError>;
}

/// Bounds-checked slice of `count` sectors out of a linear decoded buffer.
/// Most of the block decoders store their payload this way.
pub(crate) fn slice_sectors(
    data: &[u8],
    sector_size: u32,
    total_sectors: u64,
    lba: u64,
    count: u32
) -> Result<&[u8], ReadError>
{
    let last = lba + count as u64;
    if last > total_sectors {
        return Err(ReadError::SectorBeyondEnd(last - 1, total_sectors));
    }

    let beg = lba as usize * sector_size as usize;
    let end = last as usize * sector_size as usize;
    Ok(&data[beg..end])
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn track_end_before_start_rejected() {
        assert!(Track::new(1, 2, 300, 150, 0, 4).is_err());
        let t = Track::new(1, 1, 0, 149, 150, 4).unwrap();
        assert_eq!(t.sectors(), 150);
    }

    #[test]
    fn slice_sectors_bounds() {
        let data = [0u8; 2048];

        let s = slice_sectors(&data, 512, 4, 1, 2).unwrap();
        assert_eq!(s.len(), 1024);

        assert!(matches!(
            slice_sectors(&data, 512, 4, 3, 2),
            Err(ReadError::SectorBeyondEnd(4, 4))
        ));
    }
}
