//! Digital Research DISKCOPY images: raw sector data followed by a 256-byte
//! footer carrying an ASCII signature and a copy of the disk's BPB.

use byteorder::{ByteOrder, LittleEndian};
use tracing::debug;

use crate::error::{OpenError, OpenErrorKind, ReadError};
use crate::formats::OpenOptions;
use crate::image::{slice_sectors, ImageInfo, MediaImage};
use crate::media::MediaType;

pub const FOOTER_LEN: usize = 256;
const SIG_PREFIX: &[u8] = b"DiskImage ";
const SIG_VENDOR: &[u8] = b"Digital Research Inc";

// BPB copy offsets within the footer
const F_BPS: usize = 0x36;
const F_SPC: usize = 0x38;
const F_CYLS: usize = 0x39;
const F_HEADS: usize = 0x3B;
const F_SPT: usize = 0x3C;
const F_TOTAL: usize = 0x3E;

fn footer(data: &[u8]) -> Option<&[u8]> {
    data.len()
        .checked_sub(FOOTER_LEN)
        .map(|beg| &data[beg..])
}

pub fn identify(data: &[u8]) -> bool {
    let Some(f) = footer(data) else {
        return false;
    };

    if !f.starts_with(SIG_PREFIX)
        || !f[..0x36].windows(SIG_VENDOR.len()).any(|w| w == SIG_VENDOR)
    {
        return false;
    }

    let bps = LittleEndian::read_u16(&f[F_BPS..]) as usize;
    let total = LittleEndian::read_u32(&f[F_TOTAL..]) as usize;

    bps > 0 && bps % 128 == 0 && total * bps == data.len() - FOOTER_LEN
}

#[derive(Debug)]
pub struct DriDiskCopyImage {
    info: ImageInfo,
    data: Vec<u8>
}

impl DriDiskCopyImage {
    pub fn open(data: &[u8], _options: &OpenOptions) -> Result<Self, OpenError> {
        let Some(f) = footer(data).filter(|_| identify(data)) else {
            return Err(OpenErrorKind::BadMagic("DRI DISKCOPY").into());
        };

        let version = f[SIG_PREFIX.len()..]
            .iter()
            .take_while(|b| !b" (\0".contains(*b))
            .map(|b| *b as char)
            .collect::<String>();

        let sector_size = LittleEndian::read_u16(&f[F_BPS..]) as u32;
        let cylinders = LittleEndian::read_u16(&f[F_CYLS..]);
        let heads = f[F_HEADS];
        let spt = LittleEndian::read_u16(&f[F_SPT..]) as u8;
        let sectors = LittleEndian::read_u32(&f[F_TOTAL..]) as u64;

        debug!("DRI DISKCOPY v{version}: {cylinders}x{heads}x{spt}x{sector_size}");

        let mut info = ImageInfo::new(
            sectors,
            sector_size,
            MediaType::from_geometry(cylinders, heads, spt, sector_size)
        )
        .with_geometry(cylinders, heads, spt);
        info.application = Some(format!("DiskImage {version}"));

        Ok(Self {
            info,
            data: data[..data.len() - FOOTER_LEN].to_vec()
        })
    }
}

impl MediaImage for DriDiskCopyImage {
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

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    pub(crate) fn mk_image(
        cylinders: u16,
        heads: u8,
        spt: u8,
        sector_size: u16,
        payload: &[u8]
    ) -> Vec<u8>
    {
        let mut f = vec![0u8; FOOTER_LEN];
        let sig = b"DiskImage 2.01 (C) 1990,1991 Digital Research Inc\0";
        f[..sig.len()].copy_from_slice(sig);
        LittleEndian::write_u16(&mut f[F_BPS..], sector_size);
        f[F_SPC] = 2;
        LittleEndian::write_u16(&mut f[F_CYLS..], cylinders);
        f[F_HEADS] = heads;
        LittleEndian::write_u16(&mut f[F_SPT..], spt as u16);
        LittleEndian::write_u32(
            &mut f[F_TOTAL..],
            (payload.len() / sector_size as usize) as u32
        );

        let mut img = payload.to_vec();
        img.extend(f);
        img
    }

    #[test]
    fn open_720k() {
        let payload: Vec<u8> = (0..1440usize * 512).map(|i| (i / 512) as u8).collect();
        let img = mk_image(80, 2, 9, 512, &payload);

        assert!(identify(&img));

        let dri = DriDiskCopyImage::open(&img, &OpenOptions::default()).unwrap();
        assert_eq!(dri.info().sectors, 1440);
        assert_eq!(dri.info().media_type, MediaType::DOS_35_DS_DD_9);
        assert_eq!(dri.info().application.as_deref(), Some("DiskImage 2.01"));

        assert_eq!(dri.read_sectors(0, 1440).unwrap(), payload);
        assert_eq!(dri.read_sector(255).unwrap(), vec![255u8; 512]);
    }

    #[test]
    fn rejects_size_mismatch() {
        let payload = vec![0u8; 720 * 512];
        let mut img = mk_image(40, 2, 9, 512, &payload);
        // grow the data area without touching the footer's sector count
        img.splice(0..0, std::iter::repeat(0u8).take(512));
        assert!(!identify(&img));
    }

    #[test]
    fn rejects_foreign_signature() {
        let payload = vec![0u8; 9 * 512];
        let mut img = mk_image(40, 1, 9, 512, &payload);
        let beg = img.len() - FOOTER_LEN;
        img[beg..beg + 9].copy_from_slice(b"DiskImagX");
        assert!(!identify(&img));
    }
}
