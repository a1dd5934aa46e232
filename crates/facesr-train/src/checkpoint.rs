//! Training checkpoints.
//!
//! A checkpoint is a numbered directory holding the weights of both
//! networks and the loop state needed to resume:
//!
//! ```text
//! ckpt-<n>/generator.safetensors
//! ckpt-<n>/discriminator.safetensors
//! ckpt-<n>/state.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use candle_nn::VarMap;
use serde::{Deserialize, Serialize};

use facesr_core::{Error, Result, RunId};

const PREFIX: &str = "ckpt-";
const GENERATOR_FILE: &str = "generator.safetensors";
const DISCRIMINATOR_FILE: &str = "discriminator.safetensors";
const STATE_FILE: &str = "state.json";

/// Loop state stored alongside the weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingState {
    /// Next epoch to run
    pub epoch: usize,
    /// Number of update steps taken
    pub global_step: u64,
    /// Lowest perceptual loss seen so far
    pub best_loss: Option<f32>,
    /// Run that produced the checkpoint
    pub run_id: RunId,
}

impl TrainingState {
    pub fn new(run_id: RunId) -> Self {
        Self {
            epoch: 0,
            global_step: 0,
            best_loss: None,
            run_id,
        }
    }
}

/// Numbered checkpoint directories under one root
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save both networks and the state as the next numbered checkpoint
    pub fn save(
        &self,
        generator: &VarMap,
        discriminator: &VarMap,
        state: &TrainingState,
    ) -> Result<PathBuf> {
        let index = self.latest_index()?.map_or(1, |i| i + 1);
        let path = self.dir.join(format!("{}{}", PREFIX, index));
        fs::create_dir_all(&path)?;

        generator
            .save(path.join(GENERATOR_FILE))
            .map_err(|e| Error::Checkpoint(format!("saving generator: {}", e)))?;
        discriminator
            .save(path.join(DISCRIMINATOR_FILE))
            .map_err(|e| Error::Checkpoint(format!("saving discriminator: {}", e)))?;
        fs::write(path.join(STATE_FILE), serde_json::to_vec_pretty(state)?)?;

        tracing::info!(path = %path.display(), epoch = state.epoch, "Saved checkpoint");
        Ok(path)
    }

    /// Path of the highest-numbered checkpoint, if any
    pub fn latest(&self) -> Result<Option<PathBuf>> {
        Ok(self
            .latest_index()?
            .map(|i| self.dir.join(format!("{}{}", PREFIX, i))))
    }

    fn latest_index(&self) -> Result<Option<usize>> {
        let mut latest = None;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let index = name
                .to_str()
                .and_then(|n| n.strip_prefix(PREFIX))
                .and_then(|n| n.parse::<usize>().ok());
            if let Some(i) = index {
                latest = latest.max(Some(i));
            }
        }
        Ok(latest)
    }

    /// Load a checkpoint into existing var maps and return its state.
    ///
    /// The var maps must already hold variables with the checkpoint's names
    /// and shapes, i.e. the networks must be built first.
    pub fn restore(
        &self,
        path: &Path,
        generator: &mut VarMap,
        discriminator: &mut VarMap,
    ) -> Result<TrainingState> {
        generator
            .load(path.join(GENERATOR_FILE))
            .map_err(|e| Error::Checkpoint(format!("loading generator: {}", e)))?;
        discriminator
            .load(path.join(DISCRIMINATOR_FILE))
            .map_err(|e| Error::Checkpoint(format!("loading discriminator: {}", e)))?;
        let state: TrainingState = serde_json::from_slice(&fs::read(path.join(STATE_FILE))?)?;

        tracing::info!(path = %path.display(), epoch = state.epoch, "Restored checkpoint");
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device, Tensor};
    use candle_nn::{Init, VarBuilder};

    fn var_map(value: f64) -> Result<VarMap> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        vb.get_with_hints(4, "weight", Init::Const(value))?;
        Ok(varmap)
    }

    fn weight(varmap: &VarMap) -> Result<Vec<f32>> {
        let data = varmap.data().lock().unwrap();
        let tensor: &Tensor = data["weight"].as_tensor();
        Ok(tensor.to_vec1()?)
    }

    #[test]
    fn test_save_latest_restore() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let manager = CheckpointManager::new(dir.path().join("training_checkpoints"))?;
        assert!(manager.latest()?.is_none());

        let generator = var_map(1.0)?;
        let discriminator = var_map(2.0)?;
        let mut state = TrainingState::new(RunId("20240101-000000".into()));
        state.epoch = 10;
        state.best_loss = Some(0.5);

        let first = manager.save(&generator, &discriminator, &state)?;
        state.epoch = 20;
        let second = manager.save(&generator, &discriminator, &state)?;
        assert!(first.ends_with("ckpt-1"));
        assert!(second.ends_with("ckpt-2"));
        assert_eq!(manager.latest()?, Some(second.clone()));

        let mut g = var_map(0.0)?;
        let mut d = var_map(0.0)?;
        let restored = manager.restore(&second, &mut g, &mut d)?;

        assert_eq!(restored.epoch, 20);
        assert_eq!(restored.best_loss, Some(0.5));
        assert_eq!(weight(&g)?, vec![1.0; 4]);
        assert_eq!(weight(&d)?, vec![2.0; 4]);
        Ok(())
    }
}
