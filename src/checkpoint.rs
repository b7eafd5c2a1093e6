//! Checkpoint system for saving and resuming evolutionary runs.

use crate::config::Config;
use crate::critter::Critter;
use crate::innovation::CounterState;
use crate::population::Population;
use crate::stats::ReportHistory;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

const MAGIC: &[u8; 4] = b"TWNN";

/// Complete run state for checkpointing
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Version for compatibility checking
    pub version: u32,
    pub generation: u64,
    pub config: Config,
    /// Latest population; phenotypes are rebuilt on resume
    pub population: Population,
    /// Innovation and name counters
    pub counters: CounterState,
    pub random_seed: u64,
    pub history: ReportHistory,
}

impl Checkpoint {
    /// Current checkpoint version
    pub const VERSION: u32 = 1;

    pub fn new(
        config: Config,
        population: Population,
        counters: CounterState,
        random_seed: u64,
        history: ReportHistory,
    ) -> Self {
        Self {
            version: Self::VERSION,
            generation: population.generation,
            config,
            population,
            counters,
            random_seed,
            history,
        }
    }

    /// Save checkpoint to binary file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CheckpointError> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);

        writer.write_all(MAGIC)?;
        let encoded = bincode::serialize(self)?;
        writer.write_all(&encoded)?;
        writer.flush()?;

        log::info!(
            "checkpoint: generation {} saved to {}",
            self.generation,
            path.as_ref().display()
        );
        Ok(())
    }

    /// Load checkpoint from binary file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CheckpointError> {
        let file = File::open(path.as_ref())?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(CheckpointError::InvalidFormat("Invalid magic bytes".to_string()));
        }

        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;
        let checkpoint: Checkpoint = bincode::deserialize(&buffer)?;

        if checkpoint.version != Self::VERSION {
            return Err(CheckpointError::VersionMismatch {
                expected: Self::VERSION,
                found: checkpoint.version,
            });
        }

        log::info!(
            "checkpoint: generation {} loaded from {}",
            checkpoint.generation,
            path.as_ref().display()
        );
        Ok(checkpoint)
    }

    /// Best critter of the latest evaluated generation, when it was carried
    /// over into the saved population. Saved critters are unevaluated, so
    /// their own fitness says nothing.
    pub fn best_critter(&self) -> Option<&Critter> {
        let report = self.history.latest()?;
        self.population
            .critters
            .iter()
            .find(|c| c.name == report.best_critter)
    }

    /// Approximate encoded size in bytes
    pub fn size_bytes(&self) -> usize {
        bincode::serialized_size(self).unwrap_or(0) as usize
    }
}

/// Errors that can occur during checkpoint operations
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Periodic checkpoints in one directory, oldest pruned first
pub struct CheckpointManager {
    pub base_dir: PathBuf,
    /// Generations between checkpoints
    pub interval: u64,
    /// Maximum checkpoints to keep
    pub max_checkpoints: usize,
    last_generation: Option<u64>,
}

impl CheckpointManager {
    pub fn new<P: Into<PathBuf>>(
        base_dir: P,
        interval: u64,
        max_checkpoints: usize,
    ) -> Result<Self, CheckpointError> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self {
            base_dir,
            interval: interval.max(1),
            max_checkpoints,
            last_generation: None,
        })
    }

    /// Check if a checkpoint should be saved
    pub fn should_save(&self, generation: u64) -> bool {
        generation > 0
            && generation % self.interval == 0
            && self.last_generation != Some(generation)
    }

    pub fn checkpoint_path(&self, generation: u64) -> PathBuf {
        self.base_dir
            .join(format!("checkpoint_{:08}.bin", generation))
    }

    /// Save checkpoint and prune old ones
    pub fn save(&mut self, checkpoint: &Checkpoint) -> Result<PathBuf, CheckpointError> {
        let path = self.checkpoint_path(checkpoint.generation);
        checkpoint.save(&path)?;
        self.last_generation = Some(checkpoint.generation);
        self.cleanup()?;
        Ok(path)
    }

    fn checkpoints(&self) -> Result<Vec<std::fs::DirEntry>, CheckpointError> {
        let mut entries: Vec<_> = std::fs::read_dir(&self.base_dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with("checkpoint_")
            })
            .collect();
        entries.sort_by_key(|e| e.file_name());
        Ok(entries)
    }

    fn cleanup(&self) -> Result<(), CheckpointError> {
        let checkpoints = self.checkpoints()?;
        if checkpoints.len() > self.max_checkpoints {
            let to_remove = checkpoints.len() - self.max_checkpoints;
            for entry in checkpoints.into_iter().take(to_remove) {
                std::fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }

    /// Find latest checkpoint in directory
    pub fn find_latest(&self) -> Option<PathBuf> {
        self.checkpoints()
            .ok()?
            .last()
            .map(|entry| entry.path())
    }
}
