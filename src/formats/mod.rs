pub(crate) mod cursor;

pub mod copyqm;
pub mod discjuggler;
pub mod diskcopy42;
pub mod dridiskcopy;
pub mod hdcopy;
pub mod imagedisk;
pub mod raydim;

/// What to do when a stored checksum disagrees with the data.
///
/// Fixture corpora contain known-damaged images that are still expected to
/// open, so the default only warns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChecksumPolicy {
    Error,
    #[default]
    Warn
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OpenOptions {
    pub checksum_policy: ChecksumPolicy
}
