pub mod detect;
pub mod error;
pub mod expected;
pub mod filesystem;
pub mod formats;
pub mod hasher;
pub mod image;
pub mod media;
pub mod partition;
pub mod source;
pub mod suite;
pub mod verify;

#[cfg(test)]
mod test {
    use crate::{
        detect::{open_bytes, ImageFormat, ImageKind},
        formats::OpenOptions,
        hasher::{DigestSet, HashType},
        image::MediaImage,
        media::MediaType,
        suite::FixtureSuite
    };

    use rand::Rng;
    use std::collections::HashMap;

    /// Hashes an image sector by sector in randomly sized batches, so chunked
    /// reads get exercised the same way the CLI's megabyte loop does.
    #[track_caller]
    fn do_hash(
        image: &dyn MediaImage,
        random_batches: bool
    ) -> HashMap<HashType, String>
    {
        let mut hasher = DigestSet::new([HashType::MD5, HashType::SHA1]);

        let sectors = image.info().sectors;
        let mut lba = 0;
        while lba < sectors {
            let count = if random_batches {
                rand::rng().random_range(1..=64u32)
            }
            else {
                64
            };
            let count = count.min((sectors - lba) as u32);

            hasher.update(&image.read_sectors(lba, count).unwrap());
            lba += count as u64;
        }

        hasher.finalize_hex()
    }

    #[test]
    fn chunked_reads_match_whole_image_hash() {
        let payload: Vec<u8> =
            (0..720usize * 512).map(|i| (i * 31 % 251) as u8).collect();
        let img = crate::formats::copyqm::test::mk_image(40, 2, 9, 512, b"", &payload);

        let (format, kind) = open_bytes(&img, &OpenOptions::default()).unwrap();
        assert_eq!(format, ImageFormat::CopyQm);

        let whole = do_hash(kind.as_media(), false);
        for _ in 0..4 {
            assert_eq!(do_hash(kind.as_media(), true), whole);
        }
    }

    #[test]
    fn fixture_suites_are_well_formed() {
        let suites = [
            include_str!("../fixtures/copyqm.toml"),
            include_str!("../fixtures/diskcopy42.toml"),
            include_str!("../fixtures/dridiskcopy.toml"),
            include_str!("../fixtures/hdcopy.toml"),
            include_str!("../fixtures/imagedisk.toml"),
            include_str!("../fixtures/raydim.toml"),
            include_str!("../fixtures/discjuggler.toml")
        ];

        for s in suites {
            let suite = FixtureSuite::parse(s).unwrap();
            assert!(!suite.is_empty());
            suite.validate().unwrap();
        }
    }

    #[test]
    fn copyqm_suite_pins_known_rows() {
        let suite =
            FixtureSuite::parse(include_str!("../fixtures/copyqm.toml")).unwrap();

        let row = &suite.block[0];
        assert_eq!(row.test_file, "DSKA0000.CQM.lz");
        assert_eq!(row.media_type, MediaType::DOS_35_HD);
        assert_eq!(row.sectors, 2880);
        assert_eq!(row.sector_size, 512);
        assert_eq!(row.md5, "e8bbbd22db87181974e12ba0227ea011");
    }

    #[test]
    fn discjuggler_suite_rows_are_optical() {
        let suite =
            FixtureSuite::parse(include_str!("../fixtures/discjuggler.toml")).unwrap();

        assert!(suite.block.is_empty());
        assert!(!suite.optical.is_empty());
        for row in &suite.optical {
            assert!(row.media_type.is_optical());
            assert!(!row.tracks.is_empty());
        }
    }

    #[test]
    fn detected_images_report_consistent_geometry() {
        let payload = vec![0u8; 720 * 512];

        let cases: Vec<(ImageFormat, Vec<u8>)> = vec![
            (
                ImageFormat::CopyQm,
                crate::formats::copyqm::test::mk_image(40, 2, 9, 512, b"", &payload)
            ),
            (
                ImageFormat::DriDiskCopy,
                crate::formats::dridiskcopy::test::mk_image(40, 2, 9, 512, &payload)
            ),
            (
                ImageFormat::DiskCopy42,
                crate::formats::diskcopy42::test::mk_image(
                    "-not a Macintosh disk-",
                    2,
                    &payload,
                    &[]
                )
            )
        ];

        for (expected, img) in cases {
            let (format, kind) = open_bytes(&img, &OpenOptions::default()).unwrap();
            assert_eq!(format, expected);
            assert!(matches!(kind, ImageKind::Block(_)));
            assert_eq!(kind.as_media().info().sectors, 720);
        }
    }
}
