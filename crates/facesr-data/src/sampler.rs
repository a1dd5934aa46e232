//! Random batch sampling of (low resolution, high resolution) image pairs.
//!
//! Every sample is produced from one source image:
//! - the HR target is a crop (training) or a resize (evaluation) of the
//!   source at the configured HR shape,
//! - the LR input is the HR target downsampled by the scale factor with a
//!   bicubic filter.
//!
//! Pixel values are normalized to `[-1, 1]` to match the `tanh` output of
//! the generators, and stored channel-first (CHW).

use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::RgbImage;
use rand::Rng;

use facesr_core::{Error, ImageShape, Result};

/// How a source image is turned into an HR target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleMode {
    /// Random HR-sized crop with random horizontal flip (training)
    RandomCrop,
    /// Resize the whole image to the HR shape (evaluation / previews)
    Resize,
}

/// A batch of LR/HR pairs in normalized CHW layout
#[derive(Debug, Clone)]
pub struct ImageBatch {
    /// LR samples, `len * lr_shape.len()` values
    pub lr: Vec<f32>,
    /// HR samples, `len * hr_shape.len()` values
    pub hr: Vec<f32>,
    pub lr_shape: ImageShape,
    pub hr_shape: ImageShape,
    /// Number of samples
    pub len: usize,
    /// Source files, one per sample
    pub sources: Vec<PathBuf>,
    /// RGB mean subtracted from both LR and HR, if any
    pub rgb_mean: Option<[f32; 3]>,
}

impl ImageBatch {
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// LR values of sample `i`
    pub fn sample_lr(&self, i: usize) -> &[f32] {
        let n = self.lr_shape.len();
        &self.lr[i * n..(i + 1) * n]
    }

    /// HR values of sample `i`
    pub fn sample_hr(&self, i: usize) -> &[f32] {
        let n = self.hr_shape.len();
        &self.hr[i * n..(i + 1) * n]
    }
}

/// Batch sampler for a fixed HR shape and scale factor
#[derive(Debug, Clone)]
pub struct Sampler {
    hr_shape: ImageShape,
    lr_shape: ImageShape,
    scale: usize,
    rgb_mean: Option<[f32; 3]>,
}

impl Sampler {
    pub fn new(hr_shape: ImageShape, scale: usize) -> Result<Self> {
        if hr_shape.channels != 3 {
            return Err(Error::InvalidInput(format!(
                "only RGB images are supported, got {} channels",
                hr_shape.channels
            )));
        }
        let lr_shape = hr_shape.downsample(scale)?;

        Ok(Self {
            hr_shape,
            lr_shape,
            scale,
            rgb_mean: None,
        })
    }

    /// Subtract a per-channel mean from every sample
    pub fn with_rgb_mean(mut self, mean: [f32; 3]) -> Self {
        self.rgb_mean = Some(mean);
        self
    }

    pub fn hr_shape(&self) -> ImageShape {
        self.hr_shape
    }

    pub fn lr_shape(&self) -> ImageShape {
        self.lr_shape
    }

    pub fn scale(&self) -> usize {
        self.scale
    }

    /// Draw `batch_size` images uniformly at random (with replacement)
    pub fn sample<R: Rng + ?Sized>(
        &self,
        paths: &[PathBuf],
        batch_size: usize,
        mode: SampleMode,
        rng: &mut R,
    ) -> Result<ImageBatch> {
        if paths.is_empty() {
            return Err(Error::InsufficientData {
                required: 1,
                available: 0,
            });
        }

        let chosen: Vec<PathBuf> = (0..batch_size)
            .map(|_| paths[rng.gen_range(0..paths.len())].clone())
            .collect();

        tracing::debug!(batch_size, ?mode, "Sampled batch");
        self.batch_from(&chosen, mode, rng)
    }

    /// Build a batch from exactly these paths, in order
    pub fn batch_from<R: Rng + ?Sized>(
        &self,
        paths: &[PathBuf],
        mode: SampleMode,
        rng: &mut R,
    ) -> Result<ImageBatch> {
        let mut lr = Vec::with_capacity(paths.len() * self.lr_shape.len());
        let mut hr = Vec::with_capacity(paths.len() * self.hr_shape.len());

        for path in paths {
            let image = load_rgb(path)?;
            let (hr_img, lr_img) = self.prepare(&image, mode, rng);

            hr.extend(to_chw(&hr_img, self.rgb_mean));
            lr.extend(to_chw(&lr_img, self.rgb_mean));
        }

        Ok(ImageBatch {
            lr,
            hr,
            lr_shape: self.lr_shape,
            hr_shape: self.hr_shape,
            len: paths.len(),
            sources: paths.to_vec(),
            rgb_mean: self.rgb_mean,
        })
    }

    /// Produce the (HR, LR) image pair for one source image
    pub fn prepare<R: Rng + ?Sized>(
        &self,
        image: &RgbImage,
        mode: SampleMode,
        rng: &mut R,
    ) -> (RgbImage, RgbImage) {
        let (hr_w, hr_h) = (self.hr_shape.width as u32, self.hr_shape.height as u32);

        let hr_img = match mode {
            SampleMode::Resize => imageops::resize(image, hr_w, hr_h, FilterType::CatmullRom),
            SampleMode::RandomCrop => {
                let source = cover(image, hr_w, hr_h);
                let x = rng.gen_range(0..=source.width() - hr_w);
                let y = rng.gen_range(0..=source.height() - hr_h);
                let crop = imageops::crop_imm(&source, x, y, hr_w, hr_h).to_image();
                if rng.gen_bool(0.5) {
                    imageops::flip_horizontal(&crop)
                } else {
                    crop
                }
            }
        };

        let lr_img = imageops::resize(
            &hr_img,
            self.lr_shape.width as u32,
            self.lr_shape.height as u32,
            FilterType::CatmullRom,
        );

        (hr_img, lr_img)
    }
}

/// Scale an image up (keeping aspect ratio) until it covers `width x height`
fn cover(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    if image.width() >= width && image.height() >= height {
        return image.clone();
    }

    let factor = f64::max(
        width as f64 / image.width().max(1) as f64,
        height as f64 / image.height().max(1) as f64,
    );
    let new_w = ((image.width() as f64 * factor).ceil() as u32).max(width);
    let new_h = ((image.height() as f64 * factor).ceil() as u32).max(height);

    imageops::resize(image, new_w, new_h, FilterType::CatmullRom)
}

/// Decode an image file as 8-bit RGB
pub fn load_rgb(path: &Path) -> Result<RgbImage> {
    let image = image::open(path)
        .map_err(|e| Error::Image(format!("{}: {}", path.display(), e)))?;
    Ok(image.to_rgb8())
}

/// Normalize an RGB image to `[-1, 1]` CHW values, minus an optional mean
pub fn to_chw(image: &RgbImage, mean: Option<[f32; 3]>) -> Vec<f32> {
    let (w, h) = (image.width() as usize, image.height() as usize);
    let mean = mean.unwrap_or([0.0; 3]);
    let mut data = vec![0.0f32; 3 * h * w];

    for (x, y, pixel) in image.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            data[c * h * w + y * w + x] = pixel[c] as f32 / 127.5 - 1.0 - mean[c];
        }
    }

    data
}

/// Convert normalized CHW values back to an RGB image.
///
/// Values are clamped to the displayable range.
pub fn to_rgb_image(data: &[f32], shape: ImageShape, mean: Option<[f32; 3]>) -> Result<RgbImage> {
    if shape.channels != 3 || data.len() != shape.len() {
        return Err(Error::InvalidInput(format!(
            "expected {} values for shape {}, got {}",
            shape.len(),
            shape,
            data.len()
        )));
    }

    let (h, w) = (shape.height, shape.width);
    let mean = mean.unwrap_or([0.0; 3]);
    let mut raw = vec![0u8; h * w * 3];

    for y in 0..h {
        for x in 0..w {
            for c in 0..3 {
                let v = data[c * h * w + y * w + x] + mean[c];
                raw[(y * w + x) * 3 + c] = ((v + 1.0) * 127.5).round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    RgbImage::from_raw(w as u32, h as u32, raw)
        .ok_or_else(|| Error::Image("pixel buffer does not match dimensions".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn gradient(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]))
    }

    #[test]
    fn test_normalization_roundtrip() -> Result<()> {
        let img = gradient(8, 4);
        let data = to_chw(&img, None);
        assert_eq!(data.len(), 3 * 8 * 4);
        assert!(data.iter().all(|v| (-1.0..=1.0).contains(v)));

        let back = to_rgb_image(&data, ImageShape::rgb(4, 8), None)?;
        assert_eq!(back, img);
        Ok(())
    }

    #[test]
    fn test_channel_first_layout() {
        let img = RgbImage::from_pixel(2, 2, Rgb([255, 0, 0]));
        let data = to_chw(&img, None);
        // Red plane is all 1.0, green and blue planes all -1.0
        assert!(data[..4].iter().all(|&v| (v - 1.0).abs() < 1e-6));
        assert!(data[4..].iter().all(|&v| (v + 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_prepare_shapes() -> Result<()> {
        let sampler = Sampler::new(ImageShape::rgb(32, 32), 4)?;
        let mut rng = StdRng::seed_from_u64(1);

        // Smaller than the crop: must be scaled up first
        let small = gradient(20, 40);
        let (hr, lr) = sampler.prepare(&small, SampleMode::RandomCrop, &mut rng);
        assert_eq!(hr.dimensions(), (32, 32));
        assert_eq!(lr.dimensions(), (8, 8));

        let large = gradient(100, 60);
        let (hr, lr) = sampler.prepare(&large, SampleMode::Resize, &mut rng);
        assert_eq!(hr.dimensions(), (32, 32));
        assert_eq!(lr.dimensions(), (8, 8));
        Ok(())
    }

    #[test]
    fn test_sample_from_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut paths = Vec::new();
        for i in 0..3 {
            let path = dir.path().join(format!("{i}.png"));
            gradient(48, 48).save(&path)?;
            paths.push(path);
        }

        let sampler = Sampler::new(ImageShape::rgb(16, 16), 2)?.with_rgb_mean([0.1, 0.2, 0.3]);
        let mut rng = StdRng::seed_from_u64(3);
        let batch = sampler.sample(&paths, 5, SampleMode::RandomCrop, &mut rng)?;

        assert_eq!(batch.len, 5);
        assert_eq!(batch.sources.len(), 5);
        assert_eq!(batch.hr.len(), 5 * 3 * 16 * 16);
        assert_eq!(batch.lr.len(), 5 * 3 * 8 * 8);
        assert_eq!(batch.sample_lr(4).len(), 3 * 8 * 8);
        assert_eq!(batch.rgb_mean, Some([0.1, 0.2, 0.3]));
        Ok(())
    }

    #[test]
    fn test_batch_from_keeps_order() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        RgbImage::from_pixel(16, 16, Rgb([255, 255, 255])).save(&a)?;
        RgbImage::from_pixel(16, 16, Rgb([0, 0, 0])).save(&b)?;

        let sampler = Sampler::new(ImageShape::rgb(8, 8), 2)?;
        let mut rng = StdRng::seed_from_u64(0);
        let batch = sampler.batch_from(&[a.clone(), b.clone()], SampleMode::Resize, &mut rng)?;

        assert_eq!(batch.sources, vec![a, b]);
        assert!(batch.sample_hr(0).iter().all(|&v| (v - 1.0).abs() < 1e-6));
        assert!(batch.sample_hr(1).iter().all(|&v| (v + 1.0).abs() < 1e-6));
        Ok(())
    }

    #[test]
    fn test_sample_empty_listing() {
        let sampler = Sampler::new(ImageShape::rgb(16, 16), 4).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let result = sampler.sample(&[], 4, SampleMode::Resize, &mut rng);
        assert!(matches!(result, Err(Error::InsufficientData { .. })));
    }

    #[test]
    fn test_rgb_image_rejects_wrong_length() {
        let result = to_rgb_image(&[0.0; 10], ImageShape::rgb(2, 2), None);
        assert!(result.is_err());
    }
}
