//! Directory-backed key-value store.

use super::{KvResult, KvStore};
use crate::error::KvError;
use fs2::FileExt;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

/// Magic bytes for value files.
const VALUE_MAGIC: &[u8; 4] = b"FWK\0";

/// Current value file format version.
const VALUE_VERSION: u8 = 1;

/// Name of the directory lock file.
const LOCK_FILE: &str = "LOCK";

/// Key-value store keeping one file per key.
///
/// Files are named by the SHA-256 of the key, so any string is a valid key.
/// A value is written to a temporary file and renamed into place, so readers
/// see either the old value or the new one. The directory is locked for the
/// lifetime of the store.
pub struct FileStore {
    /// Base directory for value files.
    path: PathBuf,

    /// Lock file for exclusive access.
    _lock_file: File,

    /// Serializes writers within this process.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open the store at `path`, creating the directory if needed.
    pub fn open(path: impl AsRef<Path>) -> KvResult<Self> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path)?;

        let lock_file = Self::acquire_lock(&path)?;

        Ok(Self {
            path,
            _lock_file: lock_file,
            write_lock: Mutex::new(()),
        })
    }

    /// Base directory of the store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the value under `key`. Returns whether it existed.
    pub fn remove(&self, key: &str) -> KvResult<bool> {
        let _lock = self.write_lock.lock();

        match fs::remove_file(self.value_path(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn acquire_lock(path: &Path) -> KvResult<File> {
        let lock_file = File::create(path.join(LOCK_FILE))?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| KvError::Locked)?;

        Ok(lock_file)
    }

    fn file_name(key: &str) -> String {
        hex::encode(Sha256::digest(key.as_bytes()))
    }

    fn value_path(&self, key: &str) -> PathBuf {
        self.path.join(Self::file_name(key))
    }

    fn read_value(mut file: File) -> KvResult<Vec<u8>> {
        // Read and verify magic
        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != VALUE_MAGIC {
            return Err(KvError::InvalidFormat("Invalid value magic".into()));
        }

        // Read version
        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != VALUE_VERSION {
            return Err(KvError::InvalidFormat(format!(
                "Unsupported value version: {}",
                version[0]
            )));
        }

        // Read content
        let mut len_bytes = [0u8; 8];
        file.read_exact(&mut len_bytes)?;
        let len = u64::from_le_bytes(len_bytes);
        let file_len = file.metadata()?.len();
        if len > file_len {
            return Err(KvError::InvalidFormat(format!(
                "Value length {} exceeds file size {}",
                len, file_len
            )));
        }

        let mut content = vec![0u8; len as usize];
        file.read_exact(&mut content)?;

        // Read and verify checksum
        let mut checksum_bytes = [0u8; 4];
        file.read_exact(&mut checksum_bytes)?;
        let stored_checksum = u32::from_le_bytes(checksum_bytes);
        let computed_checksum = crc32fast::hash(&content);

        if stored_checksum != computed_checksum {
            return Err(KvError::ChecksumMismatch {
                expected: stored_checksum,
                got: computed_checksum,
            });
        }

        Ok(content)
    }

    fn write_value(path: &Path, value: &[u8]) -> std::io::Result<()> {
        let mut file = File::create(path)?;

        // Write header
        file.write_all(VALUE_MAGIC)?;
        file.write_all(&[VALUE_VERSION])?;

        // Write content
        file.write_all(&(value.len() as u64).to_le_bytes())?;
        file.write_all(value)?;

        // Write checksum
        file.write_all(&crc32fast::hash(value).to_le_bytes())?;

        file.sync_all()
    }

    /// Persist the rename itself.
    #[cfg(unix)]
    fn sync_dir(&self) -> KvResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_dir(&self) -> KvResult<()> {
        Ok(())
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> KvResult<Option<Vec<u8>>> {
        let file = match File::open(self.value_path(key)) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        Self::read_value(file).map(Some)
    }

    fn set(&self, key: &str, value: &[u8]) -> KvResult<()> {
        let _lock = self.write_lock.lock();

        let target = self.value_path(key);
        let tmp = target.with_extension("tmp");

        let written = Self::write_value(&tmp, value).and_then(|()| fs::rename(&tmp, &target));
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        self.sync_dir()
    }
}
