//! Adversarial training loop.
//!
//! Each step updates both networks from one forward pass:
//! - the generator on L_perceptual = L_content + w_adv * L_adv,
//! - the discriminator on L_D = BCE(D(hr), 1) + BCE(D(sr), 0).
//!
//! Gradients for both losses are computed before either optimizer steps, so
//! neither update sees the other's new weights within a step.

use std::path::{Path, PathBuf};

use candle_core::{DType, Device, Tensor};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use rand::rngs::StdRng;
use rand::SeedableRng;

use facesr_core::{Error, Result, RunId};
use facesr_data::{list_images, shuffle_paths, DatasetSplit, SampleMode, Sampler};
use facesr_model::{
    build_generator, Discriminator, DiscriminatorConfig, LossComponents, LossConfig, SrganLoss,
    StepLosses, SuperResolver, VggFeatures,
};

use crate::checkpoint::{CheckpointManager, TrainingState};
use crate::config::TrainConfig;
use crate::preview::generate_images;
use crate::summary::SummaryWriter;
use crate::tensors::{batch_tensors, sample_tensors};

/// Adam epsilon (Keras default)
const ADAM_EPS: f64 = 1e-7;

/// Outcome of a training run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub run_id: RunId,
    pub epochs_run: usize,
    pub best_perceptual_loss: Option<f32>,
    pub last: Option<StepLosses>,
    /// Best generator weights, if any were saved
    pub best_generator: Option<PathBuf>,
}

/// Quality of the generator on held-out images
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalReport {
    pub images: usize,
    /// Mean pixel MSE in normalized `[-1, 1]` units
    pub mse: f32,
    /// Mean PSNR in dB
    pub psnr: f32,
}

/// List, shuffle and split the configured dataset roots
pub fn load_dataset(config: &TrainConfig, rng: &mut StdRng) -> Result<DatasetSplit> {
    if config.dataset_dirs.is_empty() {
        return Err(Error::Config("dataset_dirs is empty".into()));
    }

    let mut paths = list_images(config.dataset_dirs.as_slice())?;
    tracing::info!(images = paths.len(), "Listed dataset");

    shuffle_paths(&mut paths, rng);
    DatasetSplit::new(paths, config.split_ratio, config.validation_size)
}

/// Seeded RNG, or one seeded from entropy
pub fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// SRGAN / EDSR adversarial trainer
pub struct Trainer {
    config: TrainConfig,
    device: Device,
    generator: Box<dyn SuperResolver>,
    discriminator: Discriminator,
    generator_vars: VarMap,
    discriminator_vars: VarMap,
    generator_opt: AdamW,
    discriminator_opt: AdamW,
    loss: SrganLoss,
    train_sampler: Sampler,
    eval_sampler: Sampler,
    rng: StdRng,
    state: TrainingState,
}

impl Trainer {
    /// Build both networks, their optimizers and the loss
    pub fn new(config: TrainConfig) -> Result<Self> {
        config.validate()?;

        let device = config.device.device()?;
        let hr_shape = config.hr_shape();
        let lr_shape = config.lr_shape()?;
        tracing::info!(
            network = %config.network,
            low_resolution = %lr_shape,
            high_resolution = %hr_shape,
            device = %config.device,
            "Building networks"
        );

        let generator_vars = VarMap::new();
        let vb = VarBuilder::from_varmap(&generator_vars, DType::F32, &device);
        let generator = build_generator(
            config.network,
            config.scale,
            config.filters,
            config.res_blocks,
            vb,
        )?;

        let discriminator_vars = VarMap::new();
        let vb = VarBuilder::from_varmap(&discriminator_vars, DType::F32, &device);
        let discriminator = Discriminator::new(DiscriminatorConfig::new(hr_shape), vb)?;

        let params = ParamsAdamW {
            lr: config.learning_rate,
            beta1: config.beta1,
            beta2: 0.999,
            eps: ADAM_EPS,
            weight_decay: 0.0,
        };
        let generator_opt = AdamW::new(generator_vars.all_vars(), params.clone())?;
        let discriminator_opt = AdamW::new(discriminator_vars.all_vars(), params)?;

        let mut loss = SrganLoss::new(LossConfig {
            adversarial_weight: config.adversarial_weight,
        });
        if let Some(path) = &config.vgg_weights {
            loss = loss.with_features(VggFeatures::load(path, &device)?);
        }

        let train_sampler = Sampler::new(hr_shape, config.scale)?;
        let eval_sampler = train_sampler.clone();
        let rng = make_rng(config.seed);

        Ok(Self {
            config,
            device,
            generator,
            discriminator,
            generator_vars,
            discriminator_vars,
            generator_opt,
            discriminator_opt,
            loss,
            train_sampler,
            eval_sampler,
            rng,
            state: TrainingState::new(RunId::now()),
        })
    }

    /// Subtract a dataset RGB mean from training samples
    pub fn with_rgb_mean(mut self, mean: [f32; 3]) -> Self {
        self.train_sampler = self.train_sampler.with_rgb_mean(mean);
        self
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn state(&self) -> &TrainingState {
        &self.state
    }

    pub fn generator(&self) -> &dyn SuperResolver {
        self.generator.as_ref()
    }

    pub fn generator_vars(&self) -> &VarMap {
        &self.generator_vars
    }

    fn output_path(&self, parts: &[&str]) -> PathBuf {
        parts
            .iter()
            .fold(self.config.output_dir.clone(), |path, part| path.join(part))
    }

    fn checkpoints(&self) -> Result<CheckpointManager> {
        CheckpointManager::new(self.output_path(&["training_checkpoints"]))
    }

    /// Restore the latest checkpoint, if one exists
    pub fn resume(&mut self) -> Result<bool> {
        let checkpoints = self.checkpoints()?;
        match checkpoints.latest()? {
            Some(path) => {
                self.state = checkpoints.restore(
                    &path,
                    &mut self.generator_vars,
                    &mut self.discriminator_vars,
                )?;
                Ok(true)
            }
            None => {
                tracing::info!("No checkpoint to resume from");
                Ok(false)
            }
        }
    }

    /// One adversarial update on an LR/HR pair
    pub fn train_step(&mut self, lr: &Tensor, hr: &Tensor) -> Result<StepLosses> {
        let sr = self.generator.forward_t(lr, true)?;
        let hr_logits = self.discriminator.forward_t(hr, true)?;
        let sr_logits = self.discriminator.forward_t(&sr, true)?;

        let content = self.loss.content_loss(hr, &sr)?;
        let adversarial = self.loss.generator_loss(&sr_logits)?;
        let perceptual = self.loss.perceptual_loss(&content, &adversarial)?;
        let discriminator = self.loss.discriminator_loss(&hr_logits, &sr_logits)?;

        let generator_grads = perceptual.backward()?;
        let discriminator_grads = discriminator.backward()?;

        self.generator_opt.step(&generator_grads)?;
        self.discriminator_opt.step(&discriminator_grads)?;
        self.state.global_step += 1;

        let losses = LossComponents {
            content,
            adversarial,
            perceptual,
            discriminator,
        };
        Ok(losses.values()?)
    }

    /// Run the remaining epochs of training on `split`
    pub fn run(&mut self, split: &DatasetSplit) -> Result<TrainingReport> {
        let eval_paths = if !split.test.is_empty() {
            &split.test
        } else if !split.validation.is_empty() {
            tracing::warn!("Test split is empty, previewing validation images");
            &split.validation
        } else {
            tracing::warn!("Test and validation splits are empty, previewing training images");
            &split.train
        };

        let run_id = self.state.run_id.clone();
        let mut summary = SummaryWriter::create(self.output_path(&["logs", run_id.as_str()]))?;
        let checkpoints = self.checkpoints()?;
        let best_path = self.output_path(&["results", &format!("generator_{}.safetensors", run_id)]);

        let start_epoch = self.state.epoch;
        let mut last = None;
        let mut best_generator = None;

        tracing::info!(
            run = %run_id,
            start_epoch,
            epochs = self.config.epochs,
            perceptual_content = self.loss.is_perceptual(),
            "Starting training"
        );

        for epoch in start_epoch..self.config.epochs {
            tracing::debug!(epoch, "Epoch");

            let test_batch = self.eval_sampler.sample(
                eval_paths,
                self.config.batch_size,
                SampleMode::Resize,
                &mut self.rng,
            )?;
            let train_batch = self.train_sampler.sample(
                &split.train,
                self.config.batch_size,
                SampleMode::RandomCrop,
                &mut self.rng,
            )?;

            if self.config.preview_every > 0 && epoch % self.config.preview_every == 0 {
                let path = self.output_path(&["previews", &format!("epoch_{:06}.png", epoch)]);
                generate_images(self.generator.as_ref(), &test_batch, &self.device, &path)?;
            }

            let mut epoch_last = None;
            for i in 0..train_batch.len {
                let (lr, hr) = sample_tensors(&train_batch, i, &self.device)?;
                let losses = self.train_step(&lr, &hr)?;

                for (tag, value) in losses.scalars() {
                    summary.scalar(tag, value, self.state.global_step)?;
                }
                epoch_last = Some(losses);
            }
            summary.flush()?;

            if let Some(losses) = epoch_last {
                let improved = self
                    .state
                    .best_loss
                    .map_or(true, |best| losses.perceptual < best);
                if improved {
                    save_weights(&self.generator_vars, &best_path)?;
                    self.state.best_loss = Some(losses.perceptual);
                    best_generator = Some(best_path.clone());
                    tracing::info!(
                        epoch,
                        perc_loss = losses.perceptual,
                        path = %best_path.display(),
                        "Model saved"
                    );
                }
                tracing::info!(
                    epoch,
                    con_loss = losses.content,
                    gen_loss = losses.adversarial,
                    perc_loss = losses.perceptual,
                    disc_loss = losses.discriminator,
                    "Epoch finished"
                );
                last = epoch_last;
            }

            self.state.epoch = epoch + 1;
            if (epoch + 1) % self.config.checkpoint_every == 0 {
                checkpoints.save(&self.generator_vars, &self.discriminator_vars, &self.state)?;
            }
        }

        Ok(TrainingReport {
            run_id,
            epochs_run: self.state.epoch - start_epoch,
            best_perceptual_loss: self.state.best_loss,
            last,
            best_generator,
        })
    }

    /// Pixel MSE and PSNR of the generator on `paths`, in inference mode
    pub fn evaluate(&mut self, paths: &[PathBuf]) -> Result<EvalReport> {
        if paths.is_empty() {
            return Err(Error::InsufficientData {
                required: 1,
                available: 0,
            });
        }

        let mut total_mse = 0.0f64;
        let mut total_psnr = 0.0f64;

        for chunk in paths.chunks(self.config.batch_size) {
            let batch = self
                .eval_sampler
                .batch_from(chunk, SampleMode::Resize, &mut self.rng)?;
            let (lr, hr) = batch_tensors(&batch, 0..batch.len, &self.device)?;
            let sr = self.generator.forward_t(&lr, false)?;

            // Per-image MSE: [batch]
            let mse = (sr - hr)?.sqr()?.flatten_from(1)?.mean(1)?;
            for value in mse.to_vec1::<f32>()? {
                total_mse += value as f64;
                total_psnr += psnr(value) as f64;
            }
        }

        let n = paths.len() as f64;
        let report = EvalReport {
            images: paths.len(),
            mse: (total_mse / n) as f32,
            psnr: (total_psnr / n) as f32,
        };
        tracing::info!(
            images = report.images,
            mse = report.mse,
            psnr = report.psnr,
            "Evaluated generator"
        );
        Ok(report)
    }
}

/// PSNR in dB for an MSE over values in `[-1, 1]` (peak-to-peak range 2)
pub fn psnr(mse: f32) -> f32 {
    if mse <= 0.0 {
        return f32::INFINITY;
    }
    10.0 * (4.0 / mse).log10()
}

/// Save a var map to a safetensors file, creating parent directories
pub fn save_weights(vars: &VarMap, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    vars.save(path)
        .map_err(|e| Error::Checkpoint(format!("{}: {}", path.display(), e)))
}
