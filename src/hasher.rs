//! Digest plumbing for sector streams. The golden rows record MD5 oracles
//! only (user data, long sectors, subchannel), so `Md5Stream` is the common
//! path; `DigestSet` backs the CLI's optional extra hashes.

use digest::{Digest, DynDigest};
use md5::Md5;
use sha1::Sha1;
use sha2::Sha256;

use std::{collections::HashMap, fmt};

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum HashType {
    MD5,
    SHA1,
    SHA256
}

impl HashType {
    pub fn name(self) -> &'static str {
        match self {
            Self::MD5 => "MD5",
            Self::SHA1 => "SHA1",
            Self::SHA256 => "SHA256"
        }
    }

    fn digest(self) -> Box<dyn DynDigest> {
        match self {
            Self::MD5 => Box::<Md5>::default(),
            Self::SHA1 => Box::<Sha1>::default(),
            Self::SHA256 => Box::<Sha256>::default()
        }
    }
}

impl fmt::Display for HashType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runs one sector stream through several digests at once.
pub struct DigestSet {
    digests: Vec<(HashType, Box<dyn DynDigest>)>
}

impl DigestSet {
    pub fn new<T: IntoIterator<Item = HashType>>(types: T) -> Self {
        Self {
            digests: types.into_iter().map(|t| (t, t.digest())).collect()
        }
    }

    pub fn update(&mut self, buf: &[u8]) {
        for (_, d) in &mut self.digests {
            d.update(buf);
        }
    }

    pub fn finalize_hex(self) -> HashMap<HashType, String> {
        self.digests
            .into_iter()
            .map(|(t, d)| (t, hex::encode(d.finalize())))
            .collect()
    }
}

/// Single MD5 over a sector stream, hex out: the shape of every oracle
/// comparison in the golden tables.
pub struct Md5Stream(Md5);

impl Md5Stream {
    pub fn new() -> Self {
        Self(Md5::new())
    }

    pub fn update(&mut self, buf: &[u8]) {
        Digest::update(&mut self.0, buf);
    }

    pub fn finalize_hex(self) -> String {
        hex::encode(Digest::finalize(self.0))
    }
}

impl Default for Md5Stream {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const FOX: &[u8] = b"The quick brown fox jumps over the lazy dog";

    #[test]
    fn digest_set_known_vectors() {
        let mut set = DigestSet::new([
            HashType::MD5,
            HashType::SHA1,
            HashType::SHA256
        ]);
        set.update(FOX);

        let hex = set.finalize_hex();
        assert_eq!(hex[&HashType::MD5], "9e107d9d372bb6826bd81d3542a419d6");
        assert_eq!(
            hex[&HashType::SHA1],
            "2fd4e1c67a2d28fced849ee1bb76e7391b93eb12"
        );
        assert_eq!(
            hex[&HashType::SHA256],
            "d7a8fbb307d7809469ca9abcb0082e4f8d5651e46d3cdb762d02d0bf37c9e592"
        );
    }

    #[test]
    fn digest_set_chunking_is_invisible() {
        let mut whole = DigestSet::new([HashType::MD5]);
        whole.update(FOX);

        let mut split = DigestSet::new([HashType::MD5]);
        for chunk in FOX.chunks(7) {
            split.update(chunk);
        }

        assert_eq!(whole.finalize_hex(), split.finalize_hex());
    }

    #[test]
    fn empty_stream_md5() {
        // the oracle for a zero-sector read
        assert_eq!(
            Md5Stream::new().finalize_hex(),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
    }

    #[test]
    fn md5_stream_matches_digest_set() {
        let mut s = Md5Stream::new();
        s.update(FOX);

        let mut set = DigestSet::new([HashType::MD5]);
        set.update(FOX);

        assert_eq!(
            Some(s.finalize_hex()),
            set.finalize_hex().remove(&HashType::MD5)
        );
    }

    #[test]
    fn hash_type_names() {
        assert_eq!(HashType::MD5.to_string(), "MD5");
        assert_eq!(HashType::SHA256.name(), "SHA256");
    }
}
