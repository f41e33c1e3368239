//! Ray Arachelian disk images (.DIM): a 256-byte header with an ASCII
//! signature and a one-byte-per-field geometry block, then raw sectors.

use tracing::debug;

use crate::error::{OpenError, OpenErrorKind, ReadError};
use crate::formats::OpenOptions;
use crate::image::{slice_sectors, ImageInfo, MediaImage};
use crate::media::MediaType;

pub const SIG_PREFIX: &[u8] = b"Disk IMage VER ";
const SIG_AUTHOR: &[u8] = b"Ray Arachelian";

const HEADER_LEN: usize = 0x100;
const H_DISK_TYPE: usize = 0x4e;
const H_CYLS: usize = 0x4f;
const H_SPT: usize = 0x50;
const H_HEADS: usize = 0x51;

const SECTOR_SIZE: u32 = 512;

pub fn identify(data: &[u8]) -> bool {
    data.len() > HEADER_LEN
        && data.starts_with(SIG_PREFIX)
        && data[..H_DISK_TYPE]
            .windows(SIG_AUTHOR.len())
            .any(|w| w == SIG_AUTHOR)
}

#[derive(Debug)]
pub struct RayDimImage {
    info: ImageInfo,
    data: Vec<u8>
}

impl RayDimImage {
    pub fn open(data: &[u8], _options: &OpenOptions) -> Result<Self, OpenError> {
        if !identify(data) {
            return Err(OpenErrorKind::BadMagic("RayDIM").into());
        }

        let disk_type = data[H_DISK_TYPE];
        let cylinders = data[H_CYLS] as u16;
        let spt = data[H_SPT];
        let heads = data[H_HEADS];

        if cylinders == 0 || spt == 0 || !(1..=2).contains(&heads) {
            return Err(OpenErrorKind::Unsupported {
                what: "RayDIM geometry",
                value: ((cylinders as u64) << 16) | ((spt as u64) << 8) | heads as u64
            }
            .into());
        }

        let sectors = cylinders as u64 * heads as u64 * spt as u64;
        let size = sectors as usize * SECTOR_SIZE as usize;

        if data.len() < HEADER_LEN + size {
            return Err(OpenErrorKind::Truncated {
                what: "RayDIM sector data",
                need: HEADER_LEN + size,
                have: data.len()
            }
            .into());
        }

        debug!("RayDIM type {disk_type}: {cylinders}x{heads}x{spt}");

        let mut info = ImageInfo::new(
            sectors,
            SECTOR_SIZE,
            MediaType::from_geometry(cylinders, heads, spt, SECTOR_SIZE)
        )
        .with_geometry(cylinders, heads, spt);
        info.application = Some(
            String::from_utf8_lossy(&data[..H_DISK_TYPE])
                .trim_end_matches(['\0', ' '])
                .to_string()
        );

        Ok(Self {
            info,
            data: data[HEADER_LEN..HEADER_LEN + size].to_vec()
        })
    }
}

impl MediaImage for RayDimImage {
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
}
