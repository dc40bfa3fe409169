//! Crash-safe storage of counters and sink configuration.
//!
//! A commit serializes the whole record, skips the write when storage already
//! holds the same bytes, and otherwise writes a temporary file, removes the
//! canonical one and renames the temporary into its place. SPIFFS cannot
//! rename onto an existing file, so a power cut can leave only the temporary
//! behind; loading promotes it when it holds a complete record. Loading then
//! falls back through the legacy layouts and finally to defaults; nothing here
//! is fatal to the device.

pub mod buffer;
pub mod legacy;
pub mod record;
pub mod storage;

pub use buffer::BoundedBuffer;
pub use record::{ChannelRecord, PersistedRecord, RecordV1, SCHEMA_VERSION};
pub use storage::{FsStorage, MemStorage, Storage};

use crate::config::PersistenceConfig;
use crate::error::{MeterError, MeterResult};
use std::time::{Duration, Instant};

/// Where the record returned by `load` came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Current,
    /// Canonical file in an older schema, upgraded in place
    OlderSchema(u32),
    LegacyKeyFiles,
    LegacyBinary,
    Defaults,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Written { bytes: usize, duration: Duration },
    Unchanged,
}

#[derive(Debug, Clone, Default)]
pub struct PersistenceStats {
    pub writes: u32,
    pub suppressed: u32,
    pub faults: u32,
    pub last_write_duration: Option<Duration>,
    pub last_size: usize,
    pub capacity: usize,
}

pub struct Persistence<S: Storage> {
    storage: S,
    config: PersistenceConfig,
    capacity: usize,
    stats: PersistenceStats,
}

impl<S: Storage> Persistence<S> {
    pub fn new(storage: S, config: PersistenceConfig) -> Self {
        let capacity = config.initial_capacity.min(config.max_capacity);
        Self {
            storage,
            config,
            capacity,
            stats: PersistenceStats {
                capacity,
                ..Default::default()
            },
        }
    }

    pub fn stats(&self) -> &PersistenceStats {
        &self.stats
    }

    /// Serialize `record` and make it the durable state.
    ///
    /// On any error the previously committed record stays readable.
    pub fn commit(&mut self, record: &PersistedRecord) -> MeterResult<CommitOutcome> {
        let bytes = self.serialize(record)?;

        if self.matches_stored(&bytes) {
            self.stats.suppressed += 1;
            log::debug!("Persist: {} bytes unchanged, write skipped", bytes.len());
            return Ok(CommitOutcome::Unchanged);
        }

        let started = Instant::now();
        self.storage
            .write(self.config.temp_file, &bytes)
            .and_then(|_| self.storage.remove(self.config.state_file))
            .and_then(|_| {
                self.storage
                    .rename(self.config.temp_file, self.config.state_file)
            })
            .map_err(|e| {
                self.stats.faults += 1;
                log::error!("Persist: commit failed, previous state kept: {}", e);
                MeterError::Storage(e)
            })?;
        let duration = started.elapsed();

        self.stats.writes += 1;
        self.stats.last_size = bytes.len();
        self.stats.last_write_duration = Some(duration);
        log::info!(
            "Persist: wrote {} bytes in {} ms",
            bytes.len(),
            duration.as_millis()
        );

        Ok(CommitOutcome::Written {
            bytes: bytes.len(),
            duration,
        })
    }

    /// Serialize into a bounded buffer, growing it after each overflow.
    ///
    /// The capacity that finally fits is kept for the next commit.
    fn serialize(&mut self, record: &PersistedRecord) -> MeterResult<Vec<u8>> {
        let mut capacity = self.capacity;
        loop {
            let mut buffer = BoundedBuffer::with_capacity(capacity);
            match serde_json::to_writer(&mut buffer, record) {
                Ok(()) => {
                    if capacity != self.capacity {
                        log::info!(
                            "Persist: serialization buffer grown {} -> {} bytes",
                            self.capacity,
                            capacity
                        );
                        self.capacity = capacity;
                        self.stats.capacity = capacity;
                    }
                    return Ok(buffer.into_inner());
                }
                Err(_) if buffer.overflowed() => {
                    if capacity >= self.config.max_capacity {
                        self.stats.faults += 1;
                        log::error!(
                            "Persist: record exceeds maximum buffer of {} bytes, commit aborted",
                            self.config.max_capacity
                        );
                        return Err(MeterError::CapacityExceeded {
                            required_at_least: capacity + 1,
                            max: self.config.max_capacity,
                        });
                    }
                    capacity = (capacity + self.config.grow_step).min(self.config.max_capacity);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn matches_stored(&self, bytes: &[u8]) -> bool {
        match self.storage.size(self.config.state_file) {
            Ok(Some(size)) if size == bytes.len() as u64 => {}
            _ => return false,
        }
        matches!(self.storage.read(self.config.state_file), Ok(Some(stored)) if stored == bytes)
    }

    /// Load the durable state, upgrading legacy layouts on the way.
    pub fn load(&mut self) -> (PersistedRecord, LoadSource) {
        let stored = match self.storage.read(self.config.state_file) {
            Ok(Some(bytes)) => {
                // Leftover of a commit interrupted before the old file went
                self.discard_temp();
                Some(bytes)
            }
            Ok(None) => self.recover_temp(),
            Err(e) => {
                log::warn!("Persist: reading stored state failed: {}", e);
                None
            }
        };

        match stored {
            Some(bytes) => match record::decode(&bytes) {
                Some((record, SCHEMA_VERSION)) => {
                    log::info!("Persist: loaded {} bytes", bytes.len());
                    return (record, LoadSource::Current);
                }
                Some((record, version)) => {
                    log::info!("Persist: upgrading schema {} -> {}", version, SCHEMA_VERSION);
                    self.upgrade(&record);
                    return (record, LoadSource::OlderSchema(version));
                }
                None => log::warn!("Persist: stored state unreadable, treating as absent"),
            },
            None => log::info!("Persist: no stored state"),
        }

        match legacy::read_key_files(&self.storage, self.config.legacy_dir) {
            Ok(Some(record)) => {
                log::info!("Persist: migrating legacy key files");
                if self.upgrade(&record) {
                    self.clear_legacy_key_files();
                }
                return (record, LoadSource::LegacyKeyFiles);
            }
            Ok(None) => {}
            Err(e) => log::warn!("Persist: reading legacy key files failed: {}", e),
        }

        match self.storage.read(self.config.legacy_binary_file) {
            Ok(Some(bytes)) => match legacy::decode_binary(&bytes) {
                Some(record) => {
                    log::info!("Persist: migrating legacy binary record");
                    if self.upgrade(&record) {
                        self.clear_legacy_binary();
                    }
                    return (record, LoadSource::LegacyBinary);
                }
                None => log::warn!("Persist: legacy binary record has no valid signature"),
            },
            Ok(None) => {}
            Err(e) => log::warn!("Persist: reading legacy binary record failed: {}", e),
        }

        log::info!("Persist: starting from defaults");
        (PersistedRecord::default(), LoadSource::Defaults)
    }

    fn discard_temp(&mut self) {
        if let Err(e) = self.storage.remove(self.config.temp_file) {
            log::warn!("Persist: could not remove stale temp file: {}", e);
        }
    }

    /// Canonical file missing: a commit may have stopped between removing it
    /// and renaming the temporary. A temporary that decodes is complete.
    fn recover_temp(&mut self) -> Option<Vec<u8>> {
        let bytes = match self.storage.read(self.config.temp_file) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Persist: reading temp file failed: {}", e);
                return None;
            }
        };
        if record::decode(&bytes).is_none() {
            log::warn!("Persist: discarding incomplete temp file");
            self.discard_temp();
            return None;
        }

        log::info!("Persist: recovering record from interrupted commit");
        if let Err(e) = self
            .storage
            .rename(self.config.temp_file, self.config.state_file)
        {
            log::warn!("Persist: could not promote temp file: {}", e);
        }
        Some(bytes)
    }

    /// Re-commit an upgraded record in the current format
    fn upgrade(&mut self, record: &PersistedRecord) -> bool {
        match self.commit(record) {
            Ok(_) => true,
            Err(e) => {
                log::error!("Persist: upgrade commit failed, will retry next boot: {}", e);
                false
            }
        }
    }

    fn clear_legacy_key_files(&mut self) {
        if let Err(e) = legacy::remove_key_files(&mut self.storage, self.config.legacy_dir) {
            log::warn!("Persist: could not clear legacy key files: {}", e);
        }
    }

    fn clear_legacy_binary(&mut self) {
        if let Err(e) = self.storage.remove(self.config.legacy_binary_file) {
            log::warn!("Persist: could not clear legacy binary record: {}", e);
        }
    }
}
