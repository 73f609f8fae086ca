use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};

use super::error::Error;

/// Serializes `value` to `path` with bincode.
///
/// The bytes go to a sibling temporary file that is renamed over `path`
/// once fully flushed, so readers never observe a partial blob.
pub fn write_blob<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    let tmp = temp_path(path);
    let file = File::create(&tmp).map_err(|e| Error::io(&tmp, e))?;
    let mut writer = BufWriter::new(file);
    bincode::serialize_into(&mut writer, value).map_err(|source| Error::Encode {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(|e| Error::io(&tmp, e))?;
    writer
        .get_ref()
        .sync_all()
        .map_err(|e| Error::io(&tmp, e))?;
    drop(writer);
    fs::rename(&tmp, path).map_err(|e| Error::io(path, e))
}

pub fn read_blob<T: DeserializeOwned>(path: &Path) -> Result<T, Error> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    bincode::deserialize_from(BufReader::new(file)).map_err(|source| Error::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Like [`read_blob`], but a missing file yields `Ok(None)`.
pub fn read_optional<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, Error> {
    match read_blob(path) {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Deletes `path`; returns whether anything was removed.
pub fn remove_if_exists(path: &Path) -> Result<bool, Error> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::io(path, e)),
    }
}

/// Hex SHA-256 of a file's contents, read in 64 KiB chunks.
pub fn sha256_file(path: &Path) -> Result<String, Error> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 65536];
    loop {
        let n = reader.read(&mut buffer).map_err(|e| Error::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Sibling `<name>.tmp` that is written first and renamed over `path`.
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn blob_roundtrip_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/value.bin");
        write_blob(&path, &vec![1u32, 2, 3]).unwrap();
        let back: Vec<u32> = read_blob(&path).unwrap();
        assert_eq!(back, vec![1, 2, 3]);
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn write_replaces_existing_blob() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("n.bin");
        write_blob(&path, &1usize).unwrap();
        write_blob(&path, &2usize).unwrap();
        assert_eq!(read_blob::<usize>(&path).unwrap(), 2);
    }

    #[test]
    fn missing_blob_is_optional() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.bin");
        assert_eq!(read_optional::<usize>(&path).unwrap(), None);
        assert!(read_blob::<usize>(&path).unwrap_err().is_not_found());
    }

    #[test]
    fn corrupt_blob_is_a_decode_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.bin");
        fs::write(&path, [1u8]).unwrap();
        assert!(matches!(
            read_blob::<Vec<u64>>(&path),
            Err(Error::Decode { .. })
        ));
    }

    #[test]
    fn remove_reports_presence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.bin");
        assert!(!remove_if_exists(&path).unwrap());
        write_blob(&path, &0u8).unwrap();
        assert!(remove_if_exists(&path).unwrap());
    }

    #[test]
    fn sha256_of_known_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hello.txt");
        fs::write(&path, b"hello world").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }
}
