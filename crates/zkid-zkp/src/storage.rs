//! # Circuit Artifact Storage
//!
//! Each circuit id maps to three immutable blobs: the witness generator
//! (`wasm`), the Groth16 proving key (`.zkey`) and the snarkjs
//! verification key (JSON). [`CircuitStorage`] is the port; this module
//! ships a file-system store, an in-memory store, and a read-through cache
//! for callers that prove repeatedly with the same circuits.
//!
//! ## File-system layout
//!
//! ```text
//! <root>/<circuitId>/circuit.wasm
//! <root>/<circuitId>/circuit_final.zkey
//! <root>/<circuitId>/verification_key.json
//! ```
//!
//! File names come from [`CircuitStorageConfig`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::debug;

use crate::circuits::CircuitId;

/// Artifacts of one circuit. A `None` artifact is not provisioned.
#[derive(Clone, PartialEq, Eq)]
pub struct CircuitData {
    /// Circuit the artifacts belong to.
    pub circuit_id: CircuitId,
    /// Witness generator module.
    pub wasm: Option<Vec<u8>>,
    /// Groth16 proving key in `.zkey` format.
    pub proving_key: Option<Vec<u8>>,
    /// snarkjs verification key JSON.
    pub verification_key: Option<Vec<u8>>,
}

impl std::fmt::Debug for CircuitData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = |b: &Option<Vec<u8>>| b.as_ref().map(Vec::len);
        f.debug_struct("CircuitData")
            .field("circuit_id", &self.circuit_id)
            .field("wasm_len", &len(&self.wasm))
            .field("proving_key_len", &len(&self.proving_key))
            .field("verification_key_len", &len(&self.verification_key))
            .finish()
    }
}

impl CircuitData {
    /// All three artifacts.
    pub fn new(circuit_id: CircuitId, wasm: Vec<u8>, proving_key: Vec<u8>, verification_key: Vec<u8>) -> Self {
        Self {
            circuit_id,
            wasm: Some(wasm),
            proving_key: Some(proving_key),
            verification_key: Some(verification_key),
        }
    }

    fn require<'a>(&self, blob: &'a Option<Vec<u8>>, artifact: &'static str) -> Result<&'a [u8], StorageError> {
        blob.as_deref().ok_or(StorageError::MissingArtifact {
            circuit: self.circuit_id,
            artifact,
        })
    }

    /// The witness generator, or `MissingArtifact`.
    pub fn wasm(&self) -> Result<&[u8], StorageError> {
        self.require(&self.wasm, "wasm")
    }

    /// The proving key, or `MissingArtifact`.
    pub fn proving_key(&self) -> Result<&[u8], StorageError> {
        self.require(&self.proving_key, "proving key")
    }

    /// The verification key, or `MissingArtifact`.
    pub fn verification_key(&self) -> Result<&[u8], StorageError> {
        self.require(&self.verification_key, "verification key")
    }
}

/// Error loading or saving circuit artifacts.
#[derive(Error, Debug)]
pub enum StorageError {
    /// No artifacts are stored for the circuit.
    #[error("no artifacts stored for circuit {0}")]
    NotFound(CircuitId),

    /// One artifact of the circuit is not provisioned.
    #[error("circuit {circuit} has no {artifact}")]
    MissingArtifact {
        /// Circuit id.
        circuit: CircuitId,
        /// Artifact name.
        artifact: &'static str,
    },

    /// File-system failure.
    #[error("i/o error at {path}: {source}")]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Port for circuit artifact storage.
pub trait CircuitStorage: Send + Sync {
    /// Name of the storage backend for logs.
    fn storage_name(&self) -> &str;

    /// Load every provisioned artifact of `circuit`.
    fn load_circuit_data(&self, circuit: CircuitId) -> Result<CircuitData, StorageError>;

    /// Store the provisioned artifacts of `data`.
    fn save_circuit_data(&self, data: &CircuitData) -> Result<(), StorageError>;

    /// Load only the verification key.
    fn load_verification_key(&self, circuit: CircuitId) -> Result<Vec<u8>, StorageError> {
        Ok(self.load_circuit_data(circuit)?.verification_key()?.to_vec())
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is unset.
    #[error("{0} environment variable is required")]
    MissingVar(&'static str),
    /// A variable holds an unusable value.
    #[error("invalid value for {var}: {reason}")]
    Invalid {
        /// Variable name.
        var: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// File-system circuit storage configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitStorageConfig {
    /// Directory holding one sub-directory per circuit id.
    pub root: PathBuf,
    /// Witness generator file name.
    pub wasm_file: String,
    /// Proving key file name.
    pub proving_key_file: String,
    /// Verification key file name.
    pub verification_key_file: String,
}

impl CircuitStorageConfig {
    /// Default file names under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            wasm_file: "circuit.wasm".into(),
            proving_key_file: "circuit_final.zkey".into(),
            verification_key_file: "verification_key.json".into(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `ZKID_CIRCUITS_DIR` (required)
    /// - `ZKID_WASM_FILE` (default: `circuit.wasm`)
    /// - `ZKID_PROVING_KEY_FILE` (default: `circuit_final.zkey`)
    /// - `ZKID_VERIFICATION_KEY_FILE` (default: `verification_key.json`)
    pub fn from_env() -> Result<Self, ConfigError> {
        let root = std::env::var("ZKID_CIRCUITS_DIR").map_err(|_| ConfigError::MissingVar("ZKID_CIRCUITS_DIR"))?;
        if root.trim().is_empty() {
            return Err(ConfigError::Invalid {
                var: "ZKID_CIRCUITS_DIR",
                reason: "empty path".into(),
            });
        }
        let defaults = Self::new(root);
        Ok(Self {
            wasm_file: env_file("ZKID_WASM_FILE", defaults.wasm_file.clone())?,
            proving_key_file: env_file("ZKID_PROVING_KEY_FILE", defaults.proving_key_file.clone())?,
            verification_key_file: env_file("ZKID_VERIFICATION_KEY_FILE", defaults.verification_key_file.clone())?,
            ..defaults
        })
    }

    /// Directory of one circuit.
    pub fn circuit_dir(&self, circuit: CircuitId) -> PathBuf {
        self.root.join(circuit.as_str())
    }
}

fn env_file(var: &'static str, default: String) -> Result<String, ConfigError> {
    let Ok(value) = std::env::var(var) else {
        return Ok(default);
    };
    validate_file_name(var, value)
}

fn validate_file_name(var: &'static str, value: String) -> Result<String, ConfigError> {
    if value.is_empty() || value.contains('/') || value.contains('\\') || value == ".." {
        return Err(ConfigError::Invalid {
            var,
            reason: format!("{value:?} is not a plain file name"),
        });
    }
    Ok(value)
}

/// Artifacts on the local file system.
#[derive(Debug, Clone)]
pub struct FsCircuitStorage {
    config: CircuitStorageConfig,
}

impl FsCircuitStorage {
    /// Storage over `config`.
    pub fn new(config: CircuitStorageConfig) -> Self {
        Self { config }
    }

    /// Storage configured from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(CircuitStorageConfig::from_env()?))
    }

    /// The configuration in use.
    pub fn config(&self) -> &CircuitStorageConfig {
        &self.config
    }

    fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn write(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        std::fs::write(path, bytes).map_err(|source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl CircuitStorage for FsCircuitStorage {
    fn storage_name(&self) -> &str {
        "fs"
    }

    fn load_circuit_data(&self, circuit: CircuitId) -> Result<CircuitData, StorageError> {
        let dir = self.config.circuit_dir(circuit);
        if !dir.is_dir() {
            return Err(StorageError::NotFound(circuit));
        }
        let data = CircuitData {
            circuit_id: circuit,
            wasm: Self::read_optional(&dir.join(&self.config.wasm_file))?,
            proving_key: Self::read_optional(&dir.join(&self.config.proving_key_file))?,
            verification_key: Self::read_optional(&dir.join(&self.config.verification_key_file))?,
        };
        debug!(circuit = %circuit, dir = %dir.display(), "loaded circuit artifacts");
        Ok(data)
    }

    fn save_circuit_data(&self, data: &CircuitData) -> Result<(), StorageError> {
        let dir = self.config.circuit_dir(data.circuit_id);
        std::fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
            path: dir.clone(),
            source,
        })?;
        let files = [
            (&data.wasm, &self.config.wasm_file),
            (&data.proving_key, &self.config.proving_key_file),
            (&data.verification_key, &self.config.verification_key_file),
        ];
        for (blob, name) in files {
            if let Some(bytes) = blob {
                Self::write(&dir.join(name), bytes)?;
            }
        }
        Ok(())
    }

    fn load_verification_key(&self, circuit: CircuitId) -> Result<Vec<u8>, StorageError> {
        let path = self.config.circuit_dir(circuit).join(&self.config.verification_key_file);
        Self::read_optional(&path)?.ok_or(StorageError::MissingArtifact {
            circuit,
            artifact: "verification key",
        })
    }
}

/// Artifacts held in memory.
#[derive(Debug, Default)]
pub struct MemoryCircuitStorage {
    circuits: RwLock<HashMap<CircuitId, CircuitData>>,
}

impl MemoryCircuitStorage {
    /// Empty storage.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CircuitStorage for MemoryCircuitStorage {
    fn storage_name(&self) -> &str {
        "memory"
    }

    fn load_circuit_data(&self, circuit: CircuitId) -> Result<CircuitData, StorageError> {
        self.circuits
            .read()
            .get(&circuit)
            .cloned()
            .ok_or(StorageError::NotFound(circuit))
    }

    fn save_circuit_data(&self, data: &CircuitData) -> Result<(), StorageError> {
        self.circuits.write().insert(data.circuit_id, data.clone());
        Ok(())
    }
}

/// Read-through cache in front of another store. Artifacts are immutable
/// per circuit id, so entries never expire; saves write through and
/// replace the cached entry.
pub struct CachedCircuitStorage<S> {
    inner: S,
    cache: RwLock<HashMap<CircuitId, Arc<CircuitData>>>,
}

impl<S: CircuitStorage> CachedCircuitStorage<S> {
    /// Cache in front of `inner`.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Number of cached circuits.
    pub fn cached(&self) -> usize {
        self.cache.read().len()
    }
}

impl<S: CircuitStorage> CircuitStorage for CachedCircuitStorage<S> {
    fn storage_name(&self) -> &str {
        self.inner.storage_name()
    }

    fn load_circuit_data(&self, circuit: CircuitId) -> Result<CircuitData, StorageError> {
        if let Some(hit) = self.cache.read().get(&circuit) {
            return Ok(CircuitData::clone(hit));
        }
        let data = Arc::new(self.inner.load_circuit_data(circuit)?);
        self.cache.write().insert(circuit, Arc::clone(&data));
        Ok(CircuitData::clone(&data))
    }

    fn save_circuit_data(&self, data: &CircuitData) -> Result<(), StorageError> {
        self.inner.save_circuit_data(data)?;
        self.cache.write().insert(data.circuit_id, Arc::new(data.clone()));
        Ok(())
    }
}
