use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{ProcessingError, Result};
use crate::utils::constants::{CACHE_FILE_EXTENSION, HASH_BLOCK_SIZE};

/// Hex-encoded SHA-256 of a file's content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Stream the file through the hasher in fixed-size blocks.
    pub fn of_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::of_reader(BufReader::with_capacity(HASH_BLOCK_SIZE, file))
    }

    pub fn of_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut hasher = Sha256::new();
        let mut block = [0u8; HASH_BLOCK_SIZE];
        loop {
            let read = match reader.read(&mut block) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            hasher.update(&block[..read]);
        }
        Ok(Self(format!("{:x}", hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub logical_name: String,
    pub fingerprint: Fingerprint,
}

/// Durable map from a source file's logical name to the fingerprint of the
/// content last processed successfully. One `<name>.hash` file per entry.
///
/// Check-then-mark is not atomic: callers must not process the same source
/// from two workers at once.
#[derive(Debug, Clone)]
pub struct ProcessingCache {
    cache_dir: PathBuf,
}

impl ProcessingCache {
    pub fn open(cache_dir: impl Into<PathBuf>) -> Result<Self> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir).map_err(|e| ProcessingError::cache(&cache_dir, e))?;
        Ok(Self { cache_dir })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Logical identity of a source: its file name.
    pub fn logical_name(source: &Path) -> Result<String> {
        source
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                ProcessingError::InvalidFormat(format!(
                    "Source path has no usable file name: '{}'",
                    source.display()
                ))
            })
    }

    fn record_path(&self, logical_name: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}.{}", logical_name, CACHE_FILE_EXTENSION))
    }

    /// Stored fingerprint, `None` when never recorded. Any other read failure
    /// is an error, never a silent "not processed".
    pub fn stored_fingerprint(&self, logical_name: &str) -> Result<Option<Fingerprint>> {
        let path = self.record_path(logical_name);
        match fs::read_to_string(&path) {
            Ok(contents) => {
                let value = contents.trim();
                if value.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(Fingerprint(value.to_string())))
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ProcessingError::cache(path, e)),
        }
    }

    /// True only when a fingerprint is stored for this name and matches the
    /// current content. Never-seen and changed both read as false.
    pub fn is_already_processed(&self, source: &Path) -> Result<bool> {
        let name = Self::logical_name(source)?;
        let Some(stored) = self.stored_fingerprint(&name)? else {
            debug!(source = %name, "no cache record");
            return Ok(false);
        };

        let current = Fingerprint::of_file(source)?;
        let unchanged = stored == current;
        debug!(source = %name, unchanged, "cache record found");
        Ok(unchanged)
    }

    pub fn needs_processing(&self, source: &Path) -> Result<bool> {
        Ok(!self.is_already_processed(source)?)
    }

    /// Record the current content fingerprint, replacing any earlier one.
    pub fn mark_processed(&self, source: &Path) -> Result<Fingerprint> {
        let fingerprint = Fingerprint::of_file(source)?;
        self.mark_fingerprint(source, &fingerprint)?;
        Ok(fingerprint)
    }

    /// Record a fingerprint taken from the bytes that were actually ingested.
    /// Content written to `source` afterwards stays unprocessed.
    pub fn mark_fingerprint(&self, source: &Path, fingerprint: &Fingerprint) -> Result<()> {
        let name = Self::logical_name(source)?;
        let path = self.record_path(&name);

        let mut tmp = NamedTempFile::new_in(&self.cache_dir)
            .map_err(|e| ProcessingError::cache(&self.cache_dir, e))?;
        tmp.write_all(fingerprint.as_str().as_bytes())
            .and_then(|_| tmp.flush())
            .map_err(|e| ProcessingError::cache(tmp.path(), e))?;
        tmp.persist(&path)
            .map_err(|e| ProcessingError::cache(&path, e.error))?;

        debug!(source = %name, %fingerprint, "marked processed");
        Ok(())
    }

    /// Drop the record for a logical name. Returns whether one existed.
    pub fn forget(&self, logical_name: &str) -> Result<bool> {
        let path = self.record_path(logical_name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ProcessingError::cache(path, e)),
        }
    }

    pub fn entries(&self) -> Result<Vec<CacheEntry>> {
        let read_dir =
            fs::read_dir(&self.cache_dir).map_err(|e| ProcessingError::cache(&self.cache_dir, e))?;

        let mut entries = Vec::new();
        for entry in read_dir {
            let path = entry
                .map_err(|e| ProcessingError::cache(&self.cache_dir, e))?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some(CACHE_FILE_EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Some(fingerprint) = self.stored_fingerprint(name)? {
                entries.push(CacheEntry {
                    logical_name: name.to_string(),
                    fingerprint,
                });
            }
        }

        entries.sort_by(|a, b| a.logical_name.cmp(&b.logical_name));
        Ok(entries)
    }
}
