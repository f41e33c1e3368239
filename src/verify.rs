//! Checks a decoded image against its golden row and reports every
//! disagreement, not just the first.

use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;
use tracing::debug;

use crate::detect::{open_image, ImageFormat, ImageKind};
use crate::error::ReadError;
use crate::expected::{BlockImageExpected, OpticalImageExpected, TrackExpected};
use crate::filesystem;
use crate::formats::OpenOptions;
use crate::hasher::{DigestSet, HashType, Md5Stream};
use crate::image::{MediaImage, OpticalImage};
use crate::partition;
use crate::suite::resolve_test_file;

/// Sectors hashed per read; keeps reads around a megabyte for 512-byte media.
const CHUNK_SECTORS: u32 = 2048;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mismatch {
    pub field: String,
    pub expected: String,
    pub actual: String
}

#[derive(Debug, Default)]
pub struct VerifyReport {
    pub test_file: String,
    pub format: Option<ImageFormat>,
    pub mismatches: Vec<Mismatch>,
    /// Set when the image could not be opened or read at all.
    pub error: Option<String>
}

impl VerifyReport {
    pub fn passed(&self) -> bool {
        self.error.is_none() && self.mismatches.is_empty()
    }

    fn check<T: PartialEq + Display>(&mut self, field: &str, expected: T, actual: T) {
        if expected != actual {
            self.mismatches.push(Mismatch {
                field: field.into(),
                expected: expected.to_string(),
                actual: actual.to_string()
            });
        }
    }

    fn check_opt<T: PartialEq + Display>(
        &mut self,
        field: &str,
        expected: Option<T>,
        actual: Option<T>
    )
    {
        let fmt = |v: &Option<T>| match v {
            Some(v) => v.to_string(),
            None => "(none)".into()
        };
        if expected != actual {
            self.mismatches.push(Mismatch {
                field: field.into(),
                expected: fmt(&expected),
                actual: fmt(&actual)
            });
        }
    }
}

/// Streams the full image through all requested digests, in chunks like the
/// interactive tools do.
pub fn hash_media<T: IntoIterator<Item = HashType>>(
    image: &dyn MediaImage,
    types: T
) -> Result<HashMap<HashType, String>, ReadError>
{
    let mut hasher = DigestSet::new(types);
    let sectors = image.info().sectors;

    let mut lba = 0;
    while lba < sectors {
        let count = CHUNK_SECTORS.min((sectors - lba) as u32);
        hasher.update(&image.read_sectors(lba, count)?);
        lba += count as u64;
    }

    Ok(hasher.finalize_hex())
}

fn md5_by_sector<F>(sectors: u64, read: F) -> Result<String, ReadError>
where
    F: Fn(u64) -> Result<Vec<u8>, ReadError>
{
    let mut md5 = Md5Stream::new();
    for lba in 0..sectors {
        md5.update(&read(lba)?);
    }
    Ok(md5.finalize_hex())
}

pub fn verify_block(
    row: &BlockImageExpected,
    data_folder: &Path,
    options: &OpenOptions
) -> VerifyReport
{
    let mut report = VerifyReport {
        test_file: row.test_file.clone(),
        ..Default::default()
    };

    let path = resolve_test_file(data_folder, &row.test_file);
    debug!("verifying {}", path.display());

    let image = match open_image(&path, options) {
        Ok((format, ImageKind::Block(image))) => {
            report.format = Some(format);
            image
        },
        Ok((format, ImageKind::Optical(_))) => {
            report.error = Some(format!("expected a block image, {format} is optical"));
            return report;
        },
        Err(e) => {
            report.error = Some(e.to_string());
            return report;
        }
    };

    let info = image.info();
    report.check("media_type", row.media_type, info.media_type);
    report.check("sectors", row.sectors, info.sectors);
    report.check("sector_size", row.sector_size, info.sector_size);

    // geometry mismatches make the stream hash meaningless noise
    if row.sectors == info.sectors && row.sector_size == info.sector_size {
        match hash_media(image.as_ref(), [HashType::MD5]) {
            Ok(mut hashes) => report.check(
                "md5",
                row.md5.as_str(),
                hashes.remove(&HashType::MD5).unwrap_or_default().as_str()
            ),
            Err(e) => report.error = Some(e.to_string())
        }
    }

    if let Some(expected) = &row.partitions {
        match partition::scan(image.as_ref()) {
            Ok(actual) => {
                report.check("partitions", expected.len(), actual.len());
                for (i, (e, a)) in expected.iter().zip(&actual).enumerate() {
                    report.check(&format!("partitions[{i}].start"), e.start, a.start);
                    report.check(&format!("partitions[{i}].length"), e.length, a.length);
                }
            },
            Err(e) => report.error = Some(e.to_string())
        }
    }

    report
}

fn verify_track(
    report: &mut VerifyReport,
    image: &dyn OpticalImage,
    i: usize,
    expected: &TrackExpected
)
{
    let Some(actual) = image.tracks().get(i) else {
        report.mismatches.push(Mismatch {
            field: format!("tracks[{i}]"),
            expected: format!("session {} {}-{}", expected.session, expected.start, expected.end),
            actual: "(missing)".into()
        });
        return;
    };

    report.check(&format!("tracks[{i}].session"), expected.session, actual.session);
    report.check(&format!("tracks[{i}].start"), expected.start, actual.start);
    report.check(&format!("tracks[{i}].end"), expected.end, actual.end);
    report.check(&format!("tracks[{i}].pregap"), expected.pregap, actual.pregap);
    report.check(&format!("tracks[{i}].flags"), expected.flags, actual.flags);
    if let Some(number) = expected.number {
        report.check(&format!("tracks[{i}].number"), number, actual.number);
    }

    let Some(filesystems) = &expected.filesystems else {
        return;
    };

    // sniff over the first sectors of the track's user data
    let mut region = vec![];
    let mut sector_size = 0;
    for lba in actual.start..=actual.end.min(actual.start + 20) {
        match image.read_sector(lba) {
            Ok(s) => {
                sector_size = s.len() as u32;
                region.extend(s);
            },
            Err(e) => {
                report.error = Some(e.to_string());
                return;
            }
        }
    }

    let sniffed = filesystem::sniff(&region, sector_size);

    report.check(
        &format!("tracks[{i}].filesystems"),
        filesystems.len(),
        sniffed.iter().count()
    );

    if let (Some(e), Some(a)) = (filesystems.first(), &sniffed) {
        let f = format!("tracks[{i}].filesystems[0]");
        report.check(&format!("{f}.type"), e.fs_type.as_str(), a.fs_type.as_str());
        report.check(&format!("{f}.clusters"), e.clusters, a.clusters);
        report.check(&format!("{f}.cluster_size"), e.cluster_size, a.cluster_size);
        report.check_opt(
            &format!("{f}.volume_name"),
            e.volume_name.as_deref(),
            a.volume_name.as_deref()
        );
        if e.volume_serial.is_some() {
            report.check_opt(
                &format!("{f}.volume_serial"),
                e.volume_serial.as_deref(),
                a.volume_serial.as_deref()
            );
        }
        report.check(&format!("{f}.bootable"), e.bootable, a.bootable);
    }
}

pub fn verify_optical(
    row: &OpticalImageExpected,
    data_folder: &Path,
    options: &OpenOptions
) -> VerifyReport
{
    let mut report = VerifyReport {
        test_file: row.test_file.clone(),
        ..Default::default()
    };

    let path = resolve_test_file(data_folder, &row.test_file);
    debug!("verifying {}", path.display());

    let image = match open_image(&path, options) {
        Ok((format, ImageKind::Optical(image))) => {
            report.format = Some(format);
            image
        },
        Ok((format, ImageKind::Block(_))) => {
            report.error = Some(format!("expected an optical image, {format} is block media"));
            return report;
        },
        Err(e) => {
            report.error = Some(e.to_string());
            return report;
        }
    };

    report.check("media_type", row.media_type, image.info().media_type);
    report.check("sectors", row.sectors, image.info().sectors);

    if row.sectors == image.info().sectors {
        let sectors = row.sectors;

        match md5_by_sector(sectors, |lba| image.read_sector(lba)) {
            Ok(md5) => report.check("md5", row.md5.as_str(), md5.as_str()),
            Err(e) => report.error = Some(e.to_string())
        }

        match md5_by_sector(sectors, |lba| image.read_sector_long(lba)) {
            Ok(md5) => report.check("long_md5", row.long_md5.as_str(), md5.as_str()),
            Err(e) => report.error = Some(e.to_string())
        }

        if let Some(expected) = &row.subchannel_md5 {
            match md5_by_sector(sectors, |lba| image.read_subchannel(lba)) {
                Ok(md5) => report.check("subchannel_md5", expected.as_str(), md5.as_str()),
                Err(e) => report.error = Some(e.to_string())
            }
        }
    }

    report.check("tracks", row.tracks.len(), image.tracks().len());
    for (i, t) in row.tracks.iter().enumerate() {
        verify_track(&mut report, image.as_ref(), i, t);
    }

    report
}
