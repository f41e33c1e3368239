//! Sydex CopyQM (.CQM) images: a 133-byte header, an optional comment, and
//! the sector data as signed-length RLE blocks.

use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, warn};

use crate::error::{OpenError, OpenErrorKind, ReadError};
use crate::formats::{ChecksumPolicy, OpenOptions};
use crate::image::{slice_sectors, ImageInfo, MediaImage};
use crate::media::MediaType;

pub const MAGIC: [u8; 3] = [b'C', b'Q', 0x14];
const HEADER_LEN: usize = 0x85;

pub fn identify(data: &[u8]) -> bool {
    data.len() >= HEADER_LEN && data[..3] == MAGIC
}

struct Header {
    sector_size: u16,
    used_sectors: u16,
    sectors_per_track: u16,
    heads: u16,
    blind: u8,
    density: u8,
    used_tracks: u8,
    total_tracks: u8,
    crc: u32,
    label: String,
    comment_length: u16
}

/// The trailing header byte makes the whole 133 bytes sum to zero mod 256.
pub(crate) fn header_checksum(header: &[u8]) -> u8 {
    header[..HEADER_LEN - 1]
        .iter()
        .fold(0u8, |s, b| s.wrapping_add(*b))
        .wrapping_neg()
}

fn parse_header(data: &[u8], options: &OpenOptions) -> Result<Header, OpenError> {
    let h = &data[..HEADER_LEN];

    let stored = h[HEADER_LEN - 1];
    let calculated = header_checksum(h);
    if stored != calculated {
        match options.checksum_policy {
            ChecksumPolicy::Error => {
                return Err(OpenErrorKind::BadChecksum {
                    what: "CopyQM header",
                    calculated: calculated as u32,
                    stored: stored as u32
                }
                .into())
            },
            ChecksumPolicy::Warn =>
                warn!("CopyQM header checksum mismatch: {calculated:#04x} != {stored:#04x}")
        }
    }

    let label_raw = &h[0x60..0x6B];
    let label = label_raw
        .iter()
        .take_while(|b| **b != 0)
        .map(|b| *b as char)
        .collect::<String>()
        .trim_end()
        .to_string();

    Ok(Header {
        sector_size: LittleEndian::read_u16(&h[0x03..]),
        used_sectors: LittleEndian::read_u16(&h[0x0B..]),
        sectors_per_track: LittleEndian::read_u16(&h[0x10..]),
        heads: LittleEndian::read_u16(&h[0x12..]),
        blind: h[0x58],
        density: h[0x59],
        used_tracks: h[0x5A],
        total_tracks: h[0x5B],
        crc: LittleEndian::read_u32(&h[0x5C..]),
        label,
        comment_length: LittleEndian::read_u16(&h[0x6F..])
    })
}

/// Expands the RLE stream: each block is an i16 length; negative means one
/// byte repeated -length times, positive means length literal bytes.
fn decompress(mut data: &[u8], expected: usize) -> Result<Vec<u8>, OpenError> {
    let mut out = Vec::with_capacity(expected);

    while data.len() >= 2 && out.len() < expected {
        let length = LittleEndian::read_i16(data);
        data = &data[2..];

        if length < 0 {
            let run = -(length as i32) as usize;
            let fill = *data.first().ok_or(OpenErrorKind::Truncated {
                what: "CopyQM run block",
                need: 1,
                have: 0
            })?;
            data = &data[1..];
            out.resize(out.len() + run, fill);
        }
        else {
            let run = length as usize;
            if data.len() < run {
                return Err(OpenErrorKind::Truncated {
                    what: "CopyQM literal block",
                    need: run,
                    have: data.len()
                }
                .into());
            }
            out.extend_from_slice(&data[..run]);
            data = &data[run..];
        }
    }

    Ok(out)
}

#[derive(Debug)]
pub struct CopyQmImage {
    info: ImageInfo,
    data: Vec<u8>
}

impl CopyQmImage {
    pub fn open(data: &[u8], options: &OpenOptions) -> Result<Self, OpenError> {
        if !identify(data) {
            return Err(OpenErrorKind::BadMagic("CopyQM").into());
        }

        let header = parse_header(data, options)?;

        if header.sector_size == 0 || header.sectors_per_track == 0 || header.heads == 0 {
            return Err(OpenErrorKind::Unsupported {
                what: "CopyQM geometry",
                value: 0
            }
            .into());
        }

        let comment_end = HEADER_LEN + header.comment_length as usize;
        if data.len() < comment_end {
            return Err(OpenErrorKind::Truncated {
                what: "CopyQM comment",
                need: comment_end,
                have: data.len()
            }
            .into());
        }

        let comment = match header.comment_length {
            0 => None,
            _ => Some(String::from_utf8_lossy(&data[HEADER_LEN..comment_end]).into_owned())
        };

        let cylinders = header.total_tracks as u16;
        let heads = header.heads as u8;
        let spt = header.sectors_per_track as u8;
        let sector_size = header.sector_size as u32;

        let sectors =
            cylinders as u64 * heads as u64 * spt as u64;
        let expected = sectors as usize * sector_size as usize;

        debug!(
            "CopyQM: {}x{}x{}x{} blind={} density={} used {}/{} tracks",
            cylinders, heads, spt, sector_size,
            header.blind, header.density, header.used_tracks, header.total_tracks
        );

        let mut decoded = decompress(&data[comment_end..], expected)?;

        // blind copies only store the cycles that were read; the rest of
        // the disk reads back as zero fill
        if decoded.len() < expected {
            decoded.resize(expected, 0);
        }
        else {
            decoded.truncate(expected);
        }

        // The stored CRC predates any settled polynomial choice among the
        // surviving CopyQM implementations, so a mismatch is never fatal.
        let crc = crc32fast::hash(&decoded);
        if header.crc != 0 && crc != header.crc {
            warn!("CopyQM data CRC mismatch: {crc:#010x} != {:#010x}", header.crc);
        }

        let mut info = ImageInfo::new(
            sectors,
            sector_size,
            MediaType::from_geometry(cylinders, heads, spt, sector_size)
        )
        .with_geometry(cylinders, heads, spt);

        if !header.label.is_empty() {
            info.application = Some(header.label);
        }
        info.comment = comment;

        if header.used_sectors as u64 > sectors {
            warn!(
                "CopyQM used sector count {} exceeds geometry {}",
                header.used_sectors, sectors
            );
        }

        Ok(Self { info, data: decoded })
    }
}

impl MediaImage for CopyQmImage {
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

    /// RLE-encodes `payload` the way CopyQM does: byte runs of four or more
    /// become repeat blocks, everything else literal blocks.
    fn rle_encode(payload: &[u8]) -> Vec<u8> {
        let mut out = vec![];
        let mut i = 0;

        while i < payload.len() {
            let b = payload[i];
            let mut run = 1;
            while i + run < payload.len() && payload[i + run] == b && run < 0x7fff {
                run += 1;
            }

            if run >= 4 {
                out.extend((-(run as i16)).to_le_bytes());
                out.push(b);
                i += run;
            }
            else {
                let mut lit = run;
                while i + lit < payload.len() && lit < 0x7fff {
                    let c = payload[i + lit];
                    let mut r = 1;
                    while i + lit + r < payload.len() && payload[i + lit + r] == c && r < 4 {
                        r += 1;
                    }
                    if r >= 4 {
                        break;
                    }
                    lit += r;
                }
                out.extend((lit as i16).to_le_bytes());
                out.extend_from_slice(&payload[i..i + lit]);
                i += lit;
            }
        }

        out
    }

    pub(crate) fn mk_image(
        cylinders: u8,
        heads: u16,
        spt: u16,
        sector_size: u16,
        comment: &[u8],
        payload: &[u8]
    ) -> Vec<u8>
    {
        let mut h = vec![0u8; HEADER_LEN];
        h[..3].copy_from_slice(&MAGIC);
        LittleEndian::write_u16(&mut h[0x03..], sector_size);
        LittleEndian::write_u16(
            &mut h[0x0B..],
            cylinders as u16 * heads * spt
        );
        LittleEndian::write_u16(&mut h[0x10..], spt);
        LittleEndian::write_u16(&mut h[0x12..], heads);
        h[0x58] = 1; // blind
        h[0x59] = if spt >= 15 { 1 } else { 0 };
        h[0x5A] = cylinders;
        h[0x5B] = cylinders;
        LittleEndian::write_u32(&mut h[0x5C..], crc32fast::hash(payload));
        h[0x60..0x60 + 6].copy_from_slice(b"FDTEST");
        LittleEndian::write_u16(&mut h[0x6F..], comment.len() as u16);
        let cs = header_checksum(&h);
        h[HEADER_LEN - 1] = cs;

        let mut img = h;
        img.extend_from_slice(comment);
        img.extend(rle_encode(payload));
        img
    }

    fn pattern(sectors: usize, sector_size: usize) -> Vec<u8> {
        let mut p = vec![];
        for s in 0..sectors {
            p.extend(std::iter::repeat((s & 0xff) as u8).take(sector_size));
        }
        p
    }

    #[test]
    fn open_hd_image() {
        let payload = pattern(2880, 512);
        let img = mk_image(80, 2, 18, 512, b"test disk", &payload);

        assert!(identify(&img));

        let q = CopyQmImage::open(&img, &OpenOptions::default()).unwrap();
        assert_eq!(q.info().sectors, 2880);
        assert_eq!(q.info().sector_size, 512);
        assert_eq!(q.info().media_type, MediaType::DOS_35_HD);
        assert_eq!(q.info().comment.as_deref(), Some("test disk"));
        assert_eq!(q.info().application.as_deref(), Some("FDTEST"));

        assert_eq!(q.read_sectors(0, 2880).unwrap(), payload);
        assert_eq!(q.read_sector(17).unwrap(), vec![17u8; 512]);
    }

    #[test]
    fn blind_copy_zero_fills_missing_tail() {
        // only the first 9 sectors were imaged
        let stored = pattern(9, 512);
        let img = mk_image(40, 2, 9, 512, b"", &stored);

        let q = CopyQmImage::open(&img, &OpenOptions::default()).unwrap();
        assert_eq!(q.info().media_type, MediaType::DOS_525_DS_DD_9);
        assert_eq!(q.info().sectors, 720);

        assert_eq!(q.read_sector(8).unwrap(), vec![8u8; 512]);
        assert_eq!(q.read_sector(719).unwrap(), vec![0u8; 512]);
    }

    #[test]
    fn corrupt_header_checksum() {
        let mut img = mk_image(40, 2, 9, 512, b"", &pattern(720, 512));
        img[0x10] ^= 0xff; // clobber sectors per track

        let strict = OpenOptions {
            checksum_policy: ChecksumPolicy::Error
        };
        assert!(CopyQmImage::open(&img, &strict).is_err());
    }

    #[test]
    fn bad_magic() {
        let img = vec![0u8; 256];
        assert!(!identify(&img));
        assert!(CopyQmImage::open(&img, &OpenOptions::default()).is_err());
    }

    #[test]
    fn truncated_literal_block() {
        let mut img = mk_image(40, 2, 9, 512, b"", &pattern(1, 512));
        // a literal block claiming more bytes than the file has left
        img.extend(50i16.to_le_bytes());
        img.extend_from_slice(&[1, 2, 3, 4, 5]);
        assert!(CopyQmImage::open(&img, &OpenOptions::default()).is_err());
    }
}
