use std::{fmt, path::Path};
use tracing::debug;

use crate::error::{OpenError, OpenErrorKind};
use crate::formats::{
    copyqm::{self, CopyQmImage},
    discjuggler::{self, DiscJugglerImage},
    diskcopy42::{self, DiskCopy42Image},
    dridiskcopy::{self, DriDiskCopyImage},
    hdcopy::{self, HdCopyImage},
    imagedisk::{self, ImageDiskImage},
    raydim::{self, RayDimImage},
    OpenOptions
};
use crate::image::{MediaImage, OpticalImage};
use crate::source::load_bytes;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageFormat {
    CopyQm,
    DiskCopy42,
    DriDiskCopy,
    HdCopy,
    ImageDisk,
    RayDim,
    DiscJuggler
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CopyQm => "CopyQM",
            Self::DiskCopy42 => "Apple DiskCopy 4.2",
            Self::DriDiskCopy => "DRI DISKCOPY",
            Self::HdCopy => "HD-Copy",
            Self::ImageDisk => "ImageDisk",
            Self::RayDim => "RayDIM",
            Self::DiscJuggler => "DiscJuggler"
        })
    }
}

pub enum ImageKind {
    Block(Box<dyn MediaImage>),
    Optical(Box<dyn OpticalImage>)
}

impl ImageKind {
    pub fn as_media(&self) -> &dyn MediaImage {
        match self {
            Self::Block(i) => i.as_ref(),
            Self::Optical(i) => i.as_ref() as &dyn MediaImage
        }
    }
}

/// Sniffs the format of an in-memory image and decodes it. Formats with
/// real magic are tried first; HD-Copy's plausibility test goes last.
pub fn open_bytes(
    data: &[u8],
    options: &OpenOptions
) -> Result<(ImageFormat, ImageKind), OpenError>
{
    if imagedisk::identify(data) {
        return ImageDiskImage::open(data, options)
            .map(|i| (ImageFormat::ImageDisk, ImageKind::Block(Box::new(i))));
    }
    if copyqm::identify(data) {
        return CopyQmImage::open(data, options)
            .map(|i| (ImageFormat::CopyQm, ImageKind::Block(Box::new(i))));
    }
    if raydim::identify(data) {
        return RayDimImage::open(data, options)
            .map(|i| (ImageFormat::RayDim, ImageKind::Block(Box::new(i))));
    }
    if dridiskcopy::identify(data) {
        return DriDiskCopyImage::open(data, options)
            .map(|i| (ImageFormat::DriDiskCopy, ImageKind::Block(Box::new(i))));
    }
    if diskcopy42::identify(data) {
        return DiskCopy42Image::open(data, options)
            .map(|i| (ImageFormat::DiskCopy42, ImageKind::Block(Box::new(i))));
    }
    if discjuggler::identify(data) {
        return DiscJugglerImage::open(data, options)
            .map(|i| (ImageFormat::DiscJuggler, ImageKind::Optical(Box::new(i))));
    }
    if hdcopy::identify(data) {
        return HdCopyImage::open(data, options)
            .map(|i| (ImageFormat::HdCopy, ImageKind::Block(Box::new(i))));
    }

    Err(OpenErrorKind::UnknownFormat.into())
}

pub fn open_image<T: AsRef<Path>>(
    path: T,
    options: &OpenOptions
) -> Result<(ImageFormat, ImageKind), OpenError>
{
    let path = path.as_ref();
    let data = load_bytes(path)?;

    let (format, image) = open_bytes(&data, options).map_err(|e| e.with_path(path))?;
    debug!("{} detected as {format}", path.display());
    Ok((format, image))
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::formats::{
        copyqm::test::mk_image as mk_cqm,
        discjuggler::test::{mk_image as mk_cdi, TestTrack},
        diskcopy42::test::mk_image as mk_dc42,
        dridiskcopy::test::mk_image as mk_dri,
        hdcopy::test::mk_image as mk_hd,
        imagedisk::test::{mk_image as mk_imd, TestSector},
        raydim::test::mk_image as mk_dim
    };

    #[test]
    fn detects_each_format() {
        let opts = OpenOptions::default();

        let cqm = mk_cqm(40, 2, 9, 512, b"", &vec![0u8; 720 * 512]);
        assert_eq!(open_bytes(&cqm, &opts).unwrap().0, ImageFormat::CopyQm);

        let dc42 = mk_dc42("d", 0, &vec![0u8; 800 * 512], &[]);
        assert_eq!(open_bytes(&dc42, &opts).unwrap().0, ImageFormat::DiskCopy42);

        let dri = mk_dri(40, 2, 9, 512, &vec![0u8; 720 * 512]);
        assert_eq!(open_bytes(&dri, &opts).unwrap().0, ImageFormat::DriDiskCopy);

        let dim = mk_dim(4, 80, 2, 18, &vec![0u8; 2880 * 512]);
        assert_eq!(open_bytes(&dim, &opts).unwrap().0, ImageFormat::RayDim);

        let imd = mk_imd(
            "detect",
            &[(0, 0, 2, vec![TestSector {
                id: 1,
                mark: 2,
                payload: vec![0x42]
            }])]
        );
        assert_eq!(open_bytes(&imd, &opts).unwrap().0, ImageFormat::ImageDisk);

        let tracks: Vec<Option<Vec<u8>>> =
            (0..80).map(|_| Some(vec![0x55u8; 9 * 512])).collect();
        let hd = mk_hd(40, 2, &tracks);
        assert_eq!(open_bytes(&hd, &opts).unwrap().0, ImageFormat::HdCopy);

        let cdi = mk_cdi(&[TestTrack {
            session: 1,
            pregap: 150,
            mode: 1,
            size_code: 0,
            flags: 4,
            fills: vec![1, 2]
        }]);
        let (format, kind) = open_bytes(&cdi, &opts).unwrap();
        assert_eq!(format, ImageFormat::DiscJuggler);
        assert!(matches!(kind, ImageKind::Optical(_)));
    }

    #[test]
    fn unknown_input_rejected() {
        let junk = vec![0xa5u8; 4096];
        assert!(open_bytes(&junk, &OpenOptions::default()).is_err());
    }
}
