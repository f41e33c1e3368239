//! MBR partition-table scanning, enough to produce the start/length pairs
//! the golden tables record for partitioned media.

use byteorder::{ByteOrder, LittleEndian};
use tracing::debug;

use crate::error::ReadError;
use crate::expected::PartitionVolume;
use crate::image::MediaImage;

const BOOT_SIG: u16 = 0xaa55;
const ENTRY_TABLE: usize = 446;
const ENTRY_LEN: usize = 16;

/// Walks the four MBR entries of sector 0. Images without a valid boot
/// signature simply have no partitions.
pub fn scan(image: &dyn MediaImage) -> Result<Vec<PartitionVolume>, ReadError> {
    if image.info().sectors == 0 || image.info().sector_size < 512 {
        return Ok(vec![]);
    }

    let mbr = image.read_sector(0)?;
    if LittleEndian::read_u16(&mbr[510..]) != BOOT_SIG {
        return Ok(vec![]);
    }

    let mut found = vec![];

    for i in 0..4 {
        let e = &mbr[ENTRY_TABLE + i * ENTRY_LEN..ENTRY_TABLE + (i + 1) * ENTRY_LEN];
        let kind = e[4];
        let start = LittleEndian::read_u32(&e[8..]) as u64;
        let length = LittleEndian::read_u32(&e[12..]) as u64;

        if kind == 0 || length == 0 {
            continue;
        }

        // a "partition" covering nothing inside the image is table garbage,
        // common on reformatted floppies whose sector 0 kept old bytes
        if start >= image.info().sectors {
            debug!("MBR entry {i} starts beyond the image, ignoring");
            continue;
        }

        found.push(PartitionVolume { start, length });
    }

    Ok(found)
}
