//! Filesystem sniffing over decoded sector data: enough FAT12/16 and
//! ISO9660 to produce the cluster/volume facts the golden tables record.

use byteorder::{ByteOrder, LittleEndian};
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilesystemInfo {
    pub fs_type: String,
    pub clusters: u64,
    pub cluster_size: u32,
    pub volume_name: Option<String>,
    pub volume_serial: Option<String>,
    pub bootable: bool
}

/// Sniffs the region starting at a partition or track. `data` holds the
/// first sectors of the region, `sector_size` the region's sector size.
pub fn sniff(data: &[u8], sector_size: u32) -> Option<FilesystemInfo> {
    iso9660(data, sector_size).or_else(|| fat(data))
}

fn ascii_field(raw: &[u8]) -> Option<String> {
    let s = String::from_utf8_lossy(raw).trim_end().to_string();
    (!s.is_empty() && s != "NO NAME").then_some(s)
}

fn fat(data: &[u8]) -> Option<FilesystemInfo> {
    if data.len() < 512 {
        return None;
    }

    let jump_ok = data[0] == 0xe9 || (data[0] == 0xeb && data[2] == 0x90);
    let bps = LittleEndian::read_u16(&data[11..]) as u64;
    let spc = data[13] as u64;
    let reserved = LittleEndian::read_u16(&data[14..]) as u64;
    let fats = data[16] as u64;
    let root_entries = LittleEndian::read_u16(&data[17..]) as u64;
    let total16 = LittleEndian::read_u16(&data[19..]) as u64;
    let fat_size = LittleEndian::read_u16(&data[22..]) as u64;
    let total32 = LittleEndian::read_u32(&data[32..]) as u64;

    if !jump_ok
        || !bps.is_power_of_two()
        || !(128..=4096).contains(&bps)
        || !spc.is_power_of_two()
        || spc > 128
        || reserved == 0
        || fats == 0
        || fat_size == 0
    {
        return None;
    }

    let total = if total16 != 0 { total16 } else { total32 };
    if total == 0 {
        return None;
    }

    let root_dir_sectors = (root_entries * 32).div_ceil(bps);
    let data_start = reserved + fats * fat_size + root_dir_sectors;
    if data_start >= total {
        return None;
    }

    let clusters = (total - data_start) / spc;
    let fs_type = if clusters < 4085 { "FAT12" } else { "FAT16" };

    // EBPB with signature 0x29 carries label and serial
    let (volume_name, volume_serial) = if data[38] == 0x29 {
        (
            ascii_field(&data[43..54]),
            Some(format!("{:08X}", LittleEndian::read_u32(&data[39..])))
        )
    }
    else {
        (None, None)
    };

    let bootable = LittleEndian::read_u16(&data[510..]) == 0xaa55
        // boot code area is all zero on non-bootable data disks
        && data[62..510].iter().any(|b| *b != 0);

    debug!("{fs_type}: {clusters} clusters of {}", spc * bps);

    Some(FilesystemInfo {
        fs_type: fs_type.into(),
        clusters,
        cluster_size: (spc * bps) as u32,
        volume_name,
        volume_serial,
        bootable
    })
}

const ISO_ID: &[u8] = b"CD001";
const PVD_SECTOR: usize = 16;

fn iso9660(data: &[u8], sector_size: u32) -> Option<FilesystemInfo> {
    let ss = sector_size as usize;
    if ss != 2048 {
        return None;
    }

    let pvd = data.get(PVD_SECTOR * ss..(PVD_SECTOR + 1) * ss)?;
    if pvd[0] != 1 || &pvd[1..6] != ISO_ID {
        return None;
    }

    let space = LittleEndian::read_u32(&pvd[80..]) as u64;
    let block = LittleEndian::read_u16(&pvd[128..]) as u32;
    let volume_name = ascii_field(&pvd[40..72]);

    // an El Torito boot record among the descriptors marks the disc bootable
    let mut bootable = false;
    for s in PVD_SECTOR + 1.. {
        let Some(vd) = data.get(s * ss..(s + 1) * ss) else {
            break;
        };
        match vd[0] {
            0 if &vd[1..6] == ISO_ID => bootable = true,
            255 => break,
            _ => {}
        }
    }

    Some(FilesystemInfo {
        fs_type: "ISO9660".into(),
        clusters: space,
        cluster_size: block,
        volume_name,
        volume_serial: None,
        bootable
    })
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    pub(crate) fn mk_fat_boot(
        total: u16,
        spc: u8,
        label: &[u8; 11],
        serial: u32,
        with_code: bool
    ) -> Vec<u8>
    {
        let mut s = vec![0u8; 512];
        s[0] = 0xeb;
        s[1] = 0x3c;
        s[2] = 0x90;
        s[3..11].copy_from_slice(b"MSDOS5.0");
        LittleEndian::write_u16(&mut s[11..], 512);
        s[13] = spc;
        LittleEndian::write_u16(&mut s[14..], 1); // reserved
        s[16] = 2; // fats
        LittleEndian::write_u16(&mut s[17..], 224);
        LittleEndian::write_u16(&mut s[19..], total);
        s[21] = 0xf0; // media descriptor
        LittleEndian::write_u16(&mut s[22..], 9); // fat size
        s[38] = 0x29;
        LittleEndian::write_u32(&mut s[39..], serial);
        s[43..54].copy_from_slice(label);
        s[54..62].copy_from_slice(b"FAT12   ");
        if with_code {
            s[62] = 0xfa; // cli
        }
        LittleEndian::write_u16(&mut s[510..], 0xaa55);
        s
    }

    #[test]
    fn sniff_fat12_floppy() {
        let boot = mk_fat_boot(2880, 1, b"DISKUTILS  ", 0x263d_420f, true);

        let fs = sniff(&boot, 512).unwrap();
        assert_eq!(fs.fs_type, "FAT12");
        // 2880 - (1 + 2*9 + 14) = 2847 data sectors, 1 sector clusters
        assert_eq!(fs.clusters, 2847);
        assert_eq!(fs.cluster_size, 512);
        assert_eq!(fs.volume_name.as_deref(), Some("DISKUTILS"));
        assert_eq!(fs.volume_serial.as_deref(), Some("263D420F"));
        assert!(fs.bootable);
    }

    #[test]
    fn blank_sector_is_not_a_filesystem() {
        assert_eq!(sniff(&[0u8; 4096], 512), None);
        assert_eq!(sniff(&[0u8; 128], 512), None);
    }

    pub(crate) fn mk_iso(volume_name: &str, space: u32, bootable: bool) -> Vec<u8> {
        let mut data = vec![0u8; 21 * 2048];

        let pvd = 16 * 2048;
        data[pvd] = 1;
        data[pvd + 1..pvd + 6].copy_from_slice(ISO_ID);
        let mut id = [b' '; 32];
        id[..volume_name.len()].copy_from_slice(volume_name.as_bytes());
        data[pvd + 40..pvd + 72].copy_from_slice(&id);
        LittleEndian::write_u32(&mut data[pvd + 80..], space);
        LittleEndian::write_u16(&mut data[pvd + 128..], 2048);

        let mut next = pvd + 2048;
        if bootable {
            data[next] = 0;
            data[next + 1..next + 6].copy_from_slice(ISO_ID);
            data[next + 7..next + 39].copy_from_slice(b"EL TORITO SPECIFICATION\0\0\0\0\0\0\0\0\0");
            next += 2048;
        }
        data[next] = 255;
        data[next + 1..next + 6].copy_from_slice(ISO_ID);

        data
    }

    #[test]
    fn sniff_iso9660() {
        let data = mk_iso("ARCHIVE_1996", 254265, true);

        let fs = sniff(&data, 2048).unwrap();
        assert_eq!(fs.fs_type, "ISO9660");
        assert_eq!(fs.clusters, 254265);
        assert_eq!(fs.cluster_size, 2048);
        assert_eq!(fs.volume_name.as_deref(), Some("ARCHIVE_1996"));
        assert_eq!(fs.volume_serial, None);
        assert!(fs.bootable);

        let plain = mk_iso("X", 100, false);
        assert!(!sniff(&plain, 2048).unwrap().bootable);
    }
}
