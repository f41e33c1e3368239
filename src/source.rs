use std::{
    fs::File,
    io::Read,
    path::Path
};
use tracing::debug;

use crate::error::OpenError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Reads a whole image file into memory, transparently decompressing
/// gzip-compressed input. Fixture corpora are usually shipped compressed.
pub fn load_bytes<T: AsRef<Path>>(path: T) -> Result<Vec<u8>, OpenError> {
    let path = path.as_ref();

    let mut raw = vec![];
    File::open(path)
        .and_then(|mut f| f.read_to_end(&mut raw))
        .map_err(OpenError::from)
        .map_err(|e| e.with_path(path))?;

    if raw.len() >= 2 && raw[..2] == GZIP_MAGIC {
        debug!("gzip input, decompressing {}", path.display());

        let mut data = vec![];
        flate2::read::GzDecoder::new(&raw[..])
            .read_to_end(&mut data)
            .map_err(OpenError::from)
            .map_err(|e| e.with_path(path))?;
        raw = data;
    }

    Ok(raw)
}

#[cfg(test)]
mod test {
    use super::*;

    use flate2::{write::GzEncoder, Compression};
    use std::io::Write;

    fn tmp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("dimg-source-{}-{}", std::process::id(), name))
    }

    #[test]
    fn load_plain() {
        let p = tmp_path("plain.img");
        std::fs::write(&p, b"raw sector bytes").unwrap();

        assert_eq!(load_bytes(&p).unwrap(), b"raw sector bytes");
        std::fs::remove_file(&p).unwrap();
    }

    #[test]
    fn load_gzip() {
        let p = tmp_path("packed.img.gz");

        let mut enc = GzEncoder::new(vec![], Compression::default());
        enc.write_all(b"raw sector bytes").unwrap();
        std::fs::write(&p, enc.finish().unwrap()).unwrap();

        assert_eq!(load_bytes(&p).unwrap(), b"raw sector bytes");
        std::fs::remove_file(&p).unwrap();
    }

    #[test]
    fn load_missing() {
        let e = load_bytes(tmp_path("no-such-file")).unwrap_err();
        assert!(e.to_string().contains("no-such-file"));
    }
}
