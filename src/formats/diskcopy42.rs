//! Apple DiskCopy 4.2 images: an 84-byte big-endian header, user data, then
//! optional 12-byte-per-sector tag data. Checksums use Apple's rotating sum.

use byteorder::{BigEndian, ByteOrder};
use tracing::warn;

use crate::error::{OpenError, OpenErrorKind, ReadError};
use crate::formats::{ChecksumPolicy, OpenOptions};
use crate::image::{slice_sectors, ImageInfo, MediaImage};
use crate::media::MediaType;

const HEADER_LEN: usize = 0x54;
const MAGIC: u16 = 0x0100;
const SECTOR_SIZE: u32 = 512;
pub const TAG_SIZE: usize = 12;

pub fn identify(data: &[u8]) -> bool {
    if data.len() < HEADER_LEN {
        return false;
    }

    let name_len = data[0] as usize;
    let data_size = BigEndian::read_u32(&data[0x40..]) as usize;
    let tag_size = BigEndian::read_u32(&data[0x44..]) as usize;

    BigEndian::read_u16(&data[0x52..]) == MAGIC
        && name_len <= 63
        && data_size % SECTOR_SIZE as usize == 0
        && data_size > 0
        && HEADER_LEN + data_size + tag_size <= data.len()
}

/// Apple's checksum: sum big-endian words into a u32, rotating right one
/// bit after every word.
pub(crate) fn checksum(data: &[u8]) -> u32 {
    data.chunks_exact(2).fold(0u32, |sum, w| {
        sum.wrapping_add(BigEndian::read_u16(w) as u32).rotate_right(1)
    })
}

fn media_for(disk_format: u8, sectors: u64) -> MediaType {
    match disk_format {
        0 => MediaType::AppleSonySS,
        1 => MediaType::AppleSonyDS,
        2 => MediaType::DOS_35_DS_DD_9,
        3 => MediaType::DOS_35_HD,
        // some writers leave the format byte garbage; fall back on size
        _ => match sectors {
            800 => MediaType::AppleSonySS,
            1600 => MediaType::AppleSonyDS,
            1440 => MediaType::DOS_35_DS_DD_9,
            2880 => MediaType::DOS_35_HD,
            _ => MediaType::Unknown
        }
    }
}

#[derive(Debug)]
pub struct DiskCopy42Image {
    info: ImageInfo,
    data: Vec<u8>,
    tags: Vec<u8>
}

impl DiskCopy42Image {
    pub fn open(data: &[u8], options: &OpenOptions) -> Result<Self, OpenError> {
        if !identify(data) {
            return Err(OpenErrorKind::BadMagic("DiskCopy 4.2").into());
        }

        let name_len = data[0] as usize;
        let name = String::from_utf8_lossy(&data[1..1 + name_len]).into_owned();

        let data_size = BigEndian::read_u32(&data[0x40..]) as usize;
        let tag_size = BigEndian::read_u32(&data[0x44..]) as usize;
        let data_checksum = BigEndian::read_u32(&data[0x48..]);
        let tag_checksum = BigEndian::read_u32(&data[0x4C..]);
        let disk_format = data[0x50];

        let user = data[HEADER_LEN..HEADER_LEN + data_size].to_vec();
        let tags = data[HEADER_LEN + data_size..HEADER_LEN + data_size + tag_size].to_vec();

        let calculated = checksum(&user);
        if calculated != data_checksum {
            match options.checksum_policy {
                ChecksumPolicy::Error => {
                    return Err(OpenErrorKind::BadChecksum {
                        what: "DiskCopy 4.2 data",
                        calculated,
                        stored: data_checksum
                    }
                    .into())
                },
                ChecksumPolicy::Warn =>
                    warn!("DiskCopy 4.2 data checksum mismatch: {calculated:#010x} != {data_checksum:#010x}")
            }
        }

        // the first tagged sector is skipped by the original tool
        if tags.len() > TAG_SIZE {
            let calculated = checksum(&tags[TAG_SIZE..]);
            if calculated != tag_checksum {
                match options.checksum_policy {
                    ChecksumPolicy::Error => {
                        return Err(OpenErrorKind::BadChecksum {
                            what: "DiskCopy 4.2 tags",
                            calculated,
                            stored: tag_checksum
                        }
                        .into())
                    },
                    ChecksumPolicy::Warn =>
                        warn!("DiskCopy 4.2 tag checksum mismatch: {calculated:#010x} != {tag_checksum:#010x}")
                }
            }
        }

        let sectors = (data_size / SECTOR_SIZE as usize) as u64;

        let mut info = ImageInfo::new(sectors, SECTOR_SIZE, media_for(disk_format, sectors));
        info.has_tags = !tags.is_empty();
        if !name.is_empty() {
            info.application = Some(name);
        }
        if disk_format == 2 {
            info = info.with_geometry(80, 2, 9);
        }
        else if disk_format == 3 {
            info = info.with_geometry(80, 2, 18);
        }

        Ok(Self {
            info,
            data: user,
            tags
        })
    }
}

impl MediaImage for DiskCopy42Image {
    fn info(&self) -> &ImageInfo {
        &self.info
    }

    fn read_sector(&self, lba: u64) -> Result<Vec<u8>, ReadError> {
        self.read_sectors(lba, 1)
    }

    fn read_sectors(&self, lba: u64, count: u32) -> Result<Vec<u8>, ReadError> {
        slice_sectors(&self.data, SECTOR_SIZE, self.info.sectors, lba, count)
            .map(<[u8]>::to_vec)
    }

    fn read_sector_long(&self, lba: u64) -> Result<Vec<u8>, ReadError> {
        let mut out = self.read_sector(lba)?;

        let beg = lba as usize * TAG_SIZE;
        if let Some(tag) = self.tags.get(beg..beg + TAG_SIZE) {
            out.extend_from_slice(tag);
        }

        Ok(out)
    }
}
