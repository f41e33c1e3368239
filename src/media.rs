use serde::{Deserialize, Serialize};
use std::fmt;

/// Media classification, named after the fixture vocabulary of the upstream
/// test corpora (`DOS_35_HD` and friends), which is why the variant names
/// are not camel case.
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    Unknown,

    // 5.25" double density
    DOS_525_SS_DD_8,
    DOS_525_SS_DD_9,
    DOS_525_DS_DD_8,
    DOS_525_DS_DD_9,
    // 5.25" high density (1.2M)
    DOS_525_HD,

    // 3.5"
    DOS_35_SS_DD_9,
    DOS_35_DS_DD_9,
    DOS_35_HD,
    DOS_35_ED,
    DMF,
    XDF_35,

    // Atari ST 10/11 sectors per track
    ATARI_35_SS_DD,
    ATARI_35_DS_DD,
    ATARI_35_SS_DD_11,
    ATARI_35_DS_DD_11,

    // Apple 400K/800K GCR (DiskCopy 4.2 territory)
    AppleSonySS,
    AppleSonyDS,

    // NEC PC-98 1232K, 8 x 1024-byte sectors
    NEC_525_HD,

    // optical
    CDROM,
    CDR,
    CDROMXA
}

impl MediaType {
    /// Classifies from CHS geometry. Unmatched geometries are `Unknown`
    /// rather than an error; decoders may still expose them.
    pub fn from_geometry(
        cylinders: u16,
        heads: u8,
        sectors_per_track: u8,
        sector_size: u32
    ) -> Self
    {
        match (cylinders, heads, sectors_per_track, sector_size) {
            (40, 1, 8, 512) => Self::DOS_525_SS_DD_8,
            (40, 1, 9, 512) => Self::DOS_525_SS_DD_9,
            (40, 2, 8, 512) => Self::DOS_525_DS_DD_8,
            (40, 2, 9, 512) => Self::DOS_525_DS_DD_9,
            (80, 2, 15, 512) => Self::DOS_525_HD,

            (80, 1, 9, 512) => Self::DOS_35_SS_DD_9,
            (80, 2, 9, 512) => Self::DOS_35_DS_DD_9,
            (80, 2, 18, 512) => Self::DOS_35_HD,
            (80, 2, 36, 512) => Self::DOS_35_ED,
            (80, 2, 21, 512) => Self::DMF,
            (80, 2, 23, 512) => Self::XDF_35,

            (80, 1, 10, 512) => Self::ATARI_35_SS_DD,
            (80, 2, 10, 512) => Self::ATARI_35_DS_DD,
            (80, 1, 11, 512) => Self::ATARI_35_SS_DD_11,
            (80, 2, 11, 512) => Self::ATARI_35_DS_DD_11,

            (77, 2, 8, 1024) => Self::NEC_525_HD,

            _ => Self::Unknown
        }
    }

    pub fn is_optical(self) -> bool {
        matches!(self, Self::CDROM | Self::CDR | Self::CDROMXA)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
