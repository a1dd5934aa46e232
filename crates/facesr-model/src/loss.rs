//! Adversarial and perceptual losses.
//!
//! Generator objective: L_perceptual = L_content + w_adv * L_adv
//! Discriminator objective: L_D = BCE(D(hr), 1) + BCE(D(sr), 0)
//!
//! The discriminator emits logits; the sigmoid is folded into the binary
//! cross-entropy.

use candle_core::{Result, Tensor};
use candle_nn::loss::mse;

use crate::vgg::VggFeatures;

/// Loss weighting
#[derive(Debug, Clone)]
pub struct LossConfig {
    /// Weight of the adversarial term in the perceptual loss
    pub adversarial_weight: f64,
}

impl Default for LossConfig {
    fn default() -> Self {
        Self {
            adversarial_weight: 1e-3,
        }
    }
}

/// SRGAN loss calculator
pub struct SrganLoss {
    config: LossConfig,
    features: Option<VggFeatures>,
}

impl SrganLoss {
    pub fn new(config: LossConfig) -> Self {
        Self {
            config,
            features: None,
        }
    }

    /// Compute the content loss on VGG features instead of pixels
    pub fn with_features(mut self, features: VggFeatures) -> Self {
        self.features = Some(features);
        self
    }

    pub fn is_perceptual(&self) -> bool {
        self.features.is_some()
    }

    /// Mean squared error between HR and SR, on VGG features if available
    pub fn content_loss(&self, hr: &Tensor, sr: &Tensor) -> Result<Tensor> {
        match &self.features {
            Some(vgg) => {
                let hr_features = vgg.forward(hr)?.detach();
                let sr_features = vgg.forward(sr)?;
                mse(&sr_features, &hr_features)
            }
            None => mse(sr, hr),
        }
    }

    /// Generator adversarial loss: the discriminator should call SR real
    pub fn generator_loss(&self, sr_logits: &Tensor) -> Result<Tensor> {
        bce_with_logits(sr_logits, &sr_logits.ones_like()?)
    }

    /// Discriminator loss: HR real, SR fake
    pub fn discriminator_loss(&self, hr_logits: &Tensor, sr_logits: &Tensor) -> Result<Tensor> {
        let real = bce_with_logits(hr_logits, &hr_logits.ones_like()?)?;
        let fake = bce_with_logits(sr_logits, &sr_logits.zeros_like()?)?;
        real + fake
    }

    /// Content loss plus weighted adversarial loss
    pub fn perceptual_loss(&self, content: &Tensor, adversarial: &Tensor) -> Result<Tensor> {
        content + (adversarial * self.config.adversarial_weight)?
    }

    pub fn config(&self) -> &LossConfig {
        &self.config
    }
}

/// Mean binary cross-entropy between `logits` and `target` probabilities.
///
/// Evaluated as `max(x, 0) - x * t + ln(1 + exp(-|x|))`, which stays finite
/// (value and gradient) for saturated logits.
pub fn bce_with_logits(logits: &Tensor, target: &Tensor) -> Result<Tensor> {
    let positive = logits.relu()?;
    let matched = (logits * target)?;
    let softplus = (logits.abs()?.neg()?.exp()? + 1.0)?.log()?;
    ((positive - matched)? + softplus)?.mean_all()
}

/// Loss tensors of one training step
pub struct LossComponents {
    pub content: Tensor,
    pub adversarial: Tensor,
    pub perceptual: Tensor,
    pub discriminator: Tensor,
}

impl LossComponents {
    /// Extract scalar values for logging
    pub fn values(&self) -> Result<StepLosses> {
        Ok(StepLosses {
            content: self.content.to_scalar::<f32>()?,
            adversarial: self.adversarial.to_scalar::<f32>()?,
            perceptual: self.perceptual.to_scalar::<f32>()?,
            discriminator: self.discriminator.to_scalar::<f32>()?,
        })
    }
}

/// Scalar losses of one training step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepLosses {
    pub content: f32,
    pub adversarial: f32,
    pub perceptual: f32,
    pub discriminator: f32,
}

impl StepLosses {
    /// Summary tags paired with values
    pub fn scalars(&self) -> [(&'static str, f32); 4] {
        [
            ("con_loss", self.content),
            ("gen_loss", self.adversarial),
            ("perc_loss", self.perceptual),
            ("disc_loss", self.discriminator),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device, Var};
    use candle_nn::{VarBuilder, VarMap};

    fn grad_values(grads: &candle_core::backprop::GradStore, var: &Var) -> Result<Vec<f32>> {
        match grads.get(var.as_tensor()) {
            Some(g) => g.flatten_all()?.to_vec1(),
            None => candle_core::bail!("no gradient"),
        }
    }

    #[test]
    fn test_saturated_logits_stay_finite() -> Result<()> {
        let device = Device::Cpu;
        let loss = SrganLoss::new(LossConfig::default());

        let real = Var::new(&[[30.0f32], [-30.0]], &device)?;
        let fake = Var::new(&[[-30.0f32], [30.0]], &device)?;

        let disc = loss.discriminator_loss(real.as_tensor(), fake.as_tensor())?;
        let disc_value: f32 = disc.to_scalar()?;
        assert!(disc_value.is_finite());
        // One confident hit and one confident miss per side: (0 + 30) / 2 twice
        assert!((disc_value - 30.0).abs() < 1e-3);

        let grads = disc.backward()?;
        for g in grad_values(&grads, &real)?
            .into_iter()
            .chain(grad_values(&grads, &fake)?)
        {
            assert!(g.is_finite());
        }

        let adv = loss.generator_loss(fake.as_tensor())?;
        let adv_value: f32 = adv.to_scalar()?;
        assert!((adv_value - 15.0).abs() < 1e-3);

        // d/dx of mean BCE(x, 1) is (sigmoid(x) - 1) / n
        let grads = adv.backward()?;
        let g = grad_values(&grads, &fake)?;
        assert!((g[0] + 0.5).abs() < 1e-4);
        assert!(g[1].abs() < 1e-4);
        Ok(())
    }

    #[test]
    fn test_bce_matches_reference_values() -> Result<()> {
        let device = Device::Cpu;
        let logits = Tensor::new(&[2.0f32, -1.0], &device)?;
        let target = Tensor::new(&[1.0f32, 0.0], &device)?;
        let value: f32 = bce_with_logits(&logits, &target)?.to_scalar()?;

        // -ln(sigmoid(2)) = ln(1 + e^-2); -ln(1 - sigmoid(-1)) = ln(1 + e^-1)
        let direct = ((1.0 + (-2.0f32).exp()).ln() + (1.0 + (-1.0f32).exp()).ln()) / 2.0;
        assert!((value - direct).abs() < 1e-5);
        Ok(())
    }

    #[test]
    fn test_perceptual_content_loss_uses_features() -> Result<()> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let loss = SrganLoss::new(LossConfig::default()).with_features(VggFeatures::new(vb)?);
        assert!(loss.is_perceptual());

        let hr = Var::rand(-1f32, 1.0, (1, 3, 32, 32), &device)?;
        let sr = Var::rand(-1f32, 1.0, (1, 3, 32, 32), &device)?;

        let same: f32 = loss.content_loss(hr.as_tensor(), hr.as_tensor())?.to_scalar()?;
        assert_eq!(same, 0.0);

        let content = loss.content_loss(hr.as_tensor(), sr.as_tensor())?;
        let feature_value: f32 = content.to_scalar()?;
        let pixel_value: f32 = mse(sr.as_tensor(), hr.as_tensor())?.to_scalar()?;
        assert!(feature_value.is_finite());
        assert!((feature_value - pixel_value).abs() > 1e-6);

        // Gradients reach SR only; the HR features are a constant target
        let grads = content.backward()?;
        assert!(grads.get(sr.as_tensor()).is_some());
        assert!(grads.get(hr.as_tensor()).is_none());
        Ok(())
    }

    #[test]
    fn test_pixel_content_loss() -> Result<()> {
        let device = Device::Cpu;
        let loss = SrganLoss::new(LossConfig::default());
        assert!(!loss.is_perceptual());

        let hr = Tensor::new(&[0.0f32, 1.0, -1.0, 0.5], &device)?;
        let sr = Tensor::new(&[0.0f32, 0.0, -1.0, 0.5], &device)?;
        let value: f32 = loss.content_loss(&hr, &sr)?.to_scalar()?;

        assert!((value - 0.25).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_adversarial_losses() -> Result<()> {
        let device = Device::Cpu;
        let loss = SrganLoss::new(LossConfig::default());

        // Logit 0 is probability 0.5: BCE = ln 2 for either target
        let zeros = Tensor::zeros((4, 1), candle_core::DType::F32, &device)?;
        let adv: f32 = loss.generator_loss(&zeros)?.to_scalar()?;
        assert!((adv - std::f32::consts::LN_2).abs() < 1e-5);

        let disc: f32 = loss.discriminator_loss(&zeros, &zeros)?.to_scalar()?;
        assert!((disc - 2.0 * std::f32::consts::LN_2).abs() < 1e-5);

        // A confident, correct discriminator has a small loss
        let real = Tensor::new(&[[10.0f32]], &device)?;
        let fake = Tensor::new(&[[-10.0f32]], &device)?;
        let disc: f32 = loss.discriminator_loss(&real, &fake)?.to_scalar()?;
        assert!(disc < 1e-3);

        // ...and the generator is penalized for it
        let adv: f32 = loss.generator_loss(&fake)?.to_scalar()?;
        assert!(adv > 9.0);
        Ok(())
    }

    #[test]
    fn test_perceptual_weighting() -> Result<()> {
        let device = Device::Cpu;
        let loss = SrganLoss::new(LossConfig {
            adversarial_weight: 0.001,
        });

        let content = Tensor::new(2.0f32, &device)?;
        let adversarial = Tensor::new(100.0f32, &device)?;
        let components = LossComponents {
            perceptual: loss.perceptual_loss(&content, &adversarial)?,
            content,
            adversarial,
            discriminator: Tensor::new(1.0f32, &device)?,
        };

        let values = components.values()?;
        assert!((values.perceptual - 2.1).abs() < 1e-5);
        assert_eq!(values.scalars()[2].0, "perc_loss");
        Ok(())
    }
}
