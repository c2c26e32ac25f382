//! Persistence of finished runs.
//!
//! A run is serialized exactly once; every later read returns those bytes
//! unchanged, so exports never recompute anything.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};

use crate::orchestrator::{OptimizationRequest, OptimizationResult};

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error in result store: {0}")]
    Io(#[from] io::Error),
    #[error("Could not serialize session: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Session '{0}' not found")]
    NotFound(SessionId),
    #[error("Session '{0}' failed its checksum verification")]
    Corrupted(SessionId),
    #[error("Invalid session id '{0}'")]
    InvalidId(String),
    #[error("Result store lock poisoned")]
    LockPoisoned,
}

/// Identifier of a stored run: `<unix millis hex>-<process id hex>-<counter hex>`.
///
/// The process id keeps ids apart when several services share one store directory.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generates an id unique among the processes sharing a store.
    pub fn generate() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let pid = process::id();
        let counter = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!("{millis:x}-{pid:x}-{counter:x}"))
    }

    /// Parses an id received from a caller.
    ///
    /// Only three groups of lowercase hex digits joined by `-` are accepted,
    /// which keeps ids safe to use as file names.
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let parts: Vec<&str> = raw.split('-').collect();
        let valid = parts.len() == 3 && parts.iter().all(|part| is_hex(part));
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(StoreError::InvalidId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_hex(part: &str) -> bool {
    !part.is_empty()
        && part
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A finished run together with the request that produced it.
#[derive(Clone, Copy, Debug)]
pub struct SessionRecord<'a> {
    pub request: &'a OptimizationRequest,
    pub result: &'a OptimizationResult,
}

#[derive(Serialize)]
struct StoredSession<'a> {
    session_id: &'a SessionId,
    created_at_ms: u64,
    request: &'a OptimizationRequest,
    result: &'a OptimizationResult,
}

impl SessionRecord<'_> {
    fn to_bytes(self, id: &SessionId) -> Result<Vec<u8>, StoreError> {
        let created_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        let stored = StoredSession {
            session_id: id,
            created_at_ms,
            request: self.request,
            result: self.result,
        };
        Ok(serde_json::to_vec(&stored)?)
    }
}

/// Storage for finished runs.
///
/// Implementations must accept concurrent writes from independent runs.
pub trait ResultStore: Send + Sync {
    /// Serializes and stores a run under a new session id.
    fn save(&self, record: SessionRecord<'_>) -> Result<SessionId, StoreError>;

    /// Returns exactly the bytes written by [`ResultStore::save`].
    fn load(&self, id: &SessionId) -> Result<Vec<u8>, StoreError>;
}

/// Process-local store, lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<SessionId, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultStore for MemoryStore {
    fn save(&self, record: SessionRecord<'_>) -> Result<SessionId, StoreError> {
        let id = SessionId::generate();
        let bytes = record.to_bytes(&id)?;
        self.sessions
            .write()
            .map_err(|_| StoreError::LockPoisoned)?
            .insert(id.clone(), bytes);
        Ok(id)
    }

    fn load(&self, id: &SessionId) -> Result<Vec<u8>, StoreError> {
        self.sessions
            .read()
            .map_err(|_| StoreError::LockPoisoned)?
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }
}

/// One JSON file per session plus a SHA-256 digest next to it.
///
/// Files are written under a temporary name and renamed into place.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Opens (and creates, if needed) the store directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn data_path(&self, id: &SessionId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn digest_path(&self, id: &SessionId) -> PathBuf {
        self.dir.join(format!("{id}.sha256"))
    }

    fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        let written = fs::File::create(&tmp_path)
            .and_then(|mut file| {
                file.write_all(bytes)?;
                file.sync_all()
            })
            .and_then(|()| fs::rename(&tmp_path, path));

        if let Err(err) = written {
            if let Err(cleanup) = fs::remove_file(&tmp_path) {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    warn!(path = %tmp_path.display(), error = %cleanup, "Could not remove temporary session file");
                }
            }
            return Err(err.into());
        }
        Ok(())
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

impl ResultStore for JsonFileStore {
    fn save(&self, record: SessionRecord<'_>) -> Result<SessionId, StoreError> {
        let id = SessionId::generate();
        let bytes = record.to_bytes(&id)?;

        Self::write_atomic(&self.data_path(&id), &bytes)?;
        Self::write_atomic(&self.digest_path(&id), sha256_hex(&bytes).as_bytes())?;
        debug!(session_id = %id, bytes = bytes.len(), "Stored session");
        Ok(id)
    }

    fn load(&self, id: &SessionId) -> Result<Vec<u8>, StoreError> {
        let bytes = match fs::read(self.data_path(id)) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.clone()));
            }
            Err(err) => return Err(err.into()),
        };

        let expected = fs::read_to_string(self.digest_path(id))?;
        if expected.trim() != sha256_hex(&bytes) {
            return Err(StoreError::Corrupted(id.clone()));
        }
        Ok(bytes)
    }
}
